//! Plain data returned by the gateway.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Deployment summary.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Deployment {
    /// Name.
    pub name: String,
    /// Namespace.
    pub namespace: String,
    /// Desired replicas.
    pub replicas: u32,
    /// Ready replicas.
    pub ready_replicas: u32,
}

/// Stateful set summary.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatefulSet {
    /// Name.
    pub name: String,
    /// Namespace.
    pub namespace: String,
    /// Desired replicas.
    pub replicas: u32,
    /// Ready replicas.
    pub ready_replicas: u32,
}

/// Service port.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServicePort {
    /// Port number.
    pub port: u16,
    /// Protocol, such as `TCP`.
    pub protocol: String,
}

/// Service summary.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Service {
    /// Name.
    pub name: String,
    /// Namespace.
    pub namespace: String,
    /// Service type, such as `ClusterIP`.
    #[serde(rename = "type")]
    pub service_type: String,
    /// Cluster IP, absent for headless services.
    pub cluster_ip: Option<String>,
    /// Exposed ports.
    #[serde(default)]
    pub ports: Vec<ServicePort>,
}

/// Pod summary.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pod {
    /// Name.
    pub name: String,
    /// Namespace.
    pub namespace: String,
    /// Pod IP, once assigned.
    pub ip: Option<String>,
    /// Whether every container is ready.
    pub ready: bool,
}

/// Where to run a command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecTarget {
    /// Pod name.
    pub pod: String,
    /// Namespace.
    pub namespace: String,
    /// Container, or the pod's default container when `None`.
    pub container: Option<String>,
}

/// Captured output of a command.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandOutput {
    /// Standard output.
    pub stdout: String,
    /// Standard error.
    pub stderr: String,
}

/// Whether and how long to wait for a mutation to take effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Convergence {
    /// Block until the target state is observed.
    pub wait: bool,
    /// Longest time to block.
    pub timeout: Duration,
}

impl Convergence {
    /// Return immediately after the request is accepted.
    #[must_use]
    pub const fn no_wait() -> Self {
        Self {
            wait: false,
            timeout: Duration::ZERO,
        }
    }

    /// Block for at most `timeout`.
    #[must_use]
    pub const fn within(timeout: Duration) -> Self {
        Self {
            wait: true,
            timeout,
        }
    }
}
