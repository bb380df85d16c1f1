//! Platform gateway boundary and the step library built on it.
//!
//! The engine never talks to a cluster directly. Steps receive a
//! [`SharedGateway`] through the `platform` session fixture and call the
//! synchronous, namespace-scoped operations of [`PlatformGateway`]. Any
//! waiting for convergence happens inside the gateway.

mod error;
pub mod keys;
pub mod steps;
mod types;

pub use error::GatewayError;
pub use types::{
    CommandOutput, Convergence, Deployment, ExecTarget, Pod, Service, ServicePort, StatefulSet,
};

use std::sync::Arc;

use crate::config::EngineConfig;
use crate::fixture::{FixtureError, FixtureRegistry, Scope};

/// Name of the session fixture holding the gateway.
pub const PLATFORM: &str = "platform";

/// Name of the session fixture holding the [`EngineConfig`].
pub const CONFIG: &str = "config";

/// Gateway handle shared by every scenario of a run.
pub type SharedGateway = Arc<dyn PlatformGateway>;

/// Operations the step library needs from a cluster.
///
/// Calls may block. Failures carry the platform's message unchanged.
pub trait PlatformGateway: Send + Sync {
    /// Check that the cluster answers.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError`] when the cluster is unreachable.
    fn ping(&self) -> Result<(), GatewayError>;

    /// Fetch a deployment.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::NotFound`] when it does not exist.
    fn get_deployment(&self, name: &str, namespace: &str) -> Result<Deployment, GatewayError>;

    /// Add one replica to a deployment.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError`] when the update fails.
    fn scale_up_deployment(&self, name: &str, namespace: &str) -> Result<(), GatewayError>;

    /// Remove one replica from a deployment.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError`] when the update fails.
    fn scale_down_deployment(&self, name: &str, namespace: &str) -> Result<(), GatewayError>;

    /// Set the desired replica count of a deployment.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError`] when the update fails.
    fn set_deployment_replicas(
        &self,
        name: &str,
        namespace: &str,
        replicas: u32,
    ) -> Result<(), GatewayError>;

    /// Count deployments selected by a service.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError`] when the listing fails.
    fn deployment_count_for_service(&self, service: &str, namespace: &str) -> Result<usize, GatewayError>;

    /// Count deployments selected by a service whose replicas are all ready.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError`] when the listing fails.
    fn active_deployment_count_for_service(
        &self,
        service: &str,
        namespace: &str,
    ) -> Result<usize, GatewayError>;

    /// Names of the pods owned by a deployment.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError`] when the deployment is missing.
    fn deployment_pod_names(&self, name: &str, namespace: &str) -> Result<Vec<String>, GatewayError>;

    /// Fetch a stateful set.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::NotFound`] when it does not exist.
    fn get_stateful_set(&self, name: &str, namespace: &str) -> Result<StatefulSet, GatewayError>;

    /// Set the desired replica count of a stateful set.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError`] when the update fails.
    fn set_stateful_set_replicas(
        &self,
        name: &str,
        namespace: &str,
        replicas: u32,
    ) -> Result<(), GatewayError>;

    /// Names of the stateful sets selected by a service.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError`] when the listing fails.
    fn stateful_set_names_for_service(
        &self,
        service: &str,
        namespace: &str,
    ) -> Result<Vec<String>, GatewayError>;

    /// Scale every stateful set of a service to zero.
    ///
    /// With [`Convergence::wait`] set, blocks until the pods are gone or
    /// the timeout elapses.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Timeout`] when convergence is not observed
    /// in time.
    fn scale_down_stateful_sets_for_service(
        &self,
        service: &str,
        namespace: &str,
        convergence: Convergence,
    ) -> Result<(), GatewayError>;

    /// Pod names of a stateful set, ordinal order.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError`] when the stateful set is missing.
    fn stateful_set_pod_names(&self, name: &str, namespace: &str) -> Result<Vec<String>, GatewayError>;

    /// Fetch a service.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::NotFound`] when it does not exist.
    fn get_service(&self, name: &str, namespace: &str) -> Result<Service, GatewayError>;

    /// Fetch a pod.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::NotFound`] when it does not exist.
    fn get_pod(&self, name: &str, namespace: &str) -> Result<Pod, GatewayError>;

    /// Pods selected by a service.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError`] when the listing fails.
    fn pods_for_service(&self, service: &str, namespace: &str) -> Result<Vec<Pod>, GatewayError>;

    /// Number of ready pods selected by a service.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError`] when the listing fails.
    fn ready_pod_count_for_service(&self, service: &str, namespace: &str) -> Result<usize, GatewayError>;

    /// Run a shell command in a pod.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError`] when the command cannot be started.
    fn exec_in_pod(&self, target: &ExecTarget, command: &str) -> Result<CommandOutput, GatewayError>;

    /// Name of the pod that owns `ip`, if any.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError`] when the listing fails.
    fn pod_name_by_ip(&self, ip: &str, namespace: &str) -> Result<Option<String>, GatewayError>;

    /// Request deletion of a pod.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError`] when the request is rejected.
    fn delete_pod(&self, name: &str, namespace: &str) -> Result<(), GatewayError>;
}

/// Declare the `platform` session fixture.
///
/// `connect` receives the run's [`EngineConfig`] and is called once, the
/// first time a step needs the gateway.
///
/// # Errors
///
/// Returns [`FixtureError::Duplicate`] when `platform` is already declared.
pub fn declare_gateway<F>(fixtures: &mut FixtureRegistry, connect: F) -> Result<(), FixtureError>
where
    F: Fn(&EngineConfig) -> anyhow::Result<SharedGateway> + Send + Sync + 'static,
{
    fixtures.declare(PLATFORM, Scope::Session, &[CONFIG], move |deps| {
        let config = deps.get::<EngineConfig>(CONFIG)?;
        tracing::debug!(
            kubeconfig = ?config.kubeconfig_file,
            context = ?config.kubeconfig_context,
            "connecting platform gateway"
        );
        connect(config)
    })
}
