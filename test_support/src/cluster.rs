//! In-memory cluster implementing [`PlatformGateway`].
//!
//! Workloads own pods named `<workload>-<ordinal>`. Scaling reconciles those
//! pods immediately, so every convergence wait succeeds unless a failure is
//! injected with [`FakeCluster::fail`].

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use scenarist::platform::{
    CommandOutput, Convergence, Deployment, ExecTarget, GatewayError, PlatformGateway, Pod,
    Service, ServicePort, SharedGateway, StatefulSet,
};

type Key = (String, String);

fn key(namespace: &str, name: &str) -> Key {
    (namespace.to_owned(), name.to_owned())
}

#[derive(Debug, Clone)]
struct Workload {
    replicas: u32,
    ready: u32,
    service: Option<String>,
}

#[derive(Debug, Clone)]
struct PodEntry {
    pod: Pod,
    service: Option<String>,
    owner: Option<String>,
}

#[derive(Debug, Default)]
struct State {
    reachable: bool,
    deployments: BTreeMap<Key, Workload>,
    stateful_sets: BTreeMap<Key, Workload>,
    services: BTreeMap<Key, Service>,
    pods: BTreeMap<Key, PodEntry>,
    exec: HashMap<String, CommandOutput>,
    failures: HashMap<String, GatewayError>,
    calls: Vec<String>,
    convergence: Option<Convergence>,
}

impl State {
    fn reconcile(&mut self, namespace: &str, owner: &str, workload: &Workload) {
        self.pods.retain(|(ns, _), entry| {
            ns != namespace || entry.owner.as_deref() != Some(owner)
        });
        for ordinal in 0..workload.replicas {
            let name = format!("{owner}-{ordinal}");
            self.pods.insert(
                key(namespace, &name),
                PodEntry {
                    pod: Pod {
                        name,
                        namespace: namespace.to_owned(),
                        ip: None,
                        ready: ordinal < workload.ready,
                    },
                    service: workload.service.clone(),
                    owner: Some(owner.to_owned()),
                },
            );
        }
    }

    fn selected<'a>(
        workloads: &'a BTreeMap<Key, Workload>,
        service: &'a str,
        namespace: &'a str,
    ) -> impl Iterator<Item = (&'a str, &'a Workload)> + 'a {
        workloads.iter().filter_map(move |((ns, name), workload)| {
            (ns == namespace && workload.service.as_deref() == Some(service))
                .then_some((name.as_str(), workload))
        })
    }
}

/// An in-memory cluster.
#[derive(Debug)]
pub struct FakeCluster {
    state: Mutex<State>,
}

impl Default for FakeCluster {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeCluster {
    /// An empty, reachable cluster.
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State {
                reachable: true,
                ..State::default()
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Add a fully ready deployment, optionally selected by `service`.
    #[must_use]
    pub fn deployment(self, namespace: &str, name: &str, replicas: u32, service: Option<&str>) -> Self {
        self.deployment_with_ready(namespace, name, replicas, replicas, service)
    }

    /// Add a deployment with only `ready` of its replicas ready.
    #[must_use]
    pub fn deployment_with_ready(
        self,
        namespace: &str,
        name: &str,
        replicas: u32,
        ready: u32,
        service: Option<&str>,
    ) -> Self {
        {
            let mut state = self.lock();
            let workload = Workload {
                replicas,
                ready,
                service: service.map(str::to_owned),
            };
            state.reconcile(namespace, name, &workload);
            state.deployments.insert(key(namespace, name), workload);
        }
        self
    }

    /// Add a stateful set with `ready` of its replicas ready.
    #[must_use]
    pub fn stateful_set(
        self,
        namespace: &str,
        name: &str,
        replicas: u32,
        ready: u32,
        service: Option<&str>,
    ) -> Self {
        {
            let mut state = self.lock();
            let workload = Workload {
                replicas,
                ready,
                service: service.map(str::to_owned),
            };
            state.reconcile(namespace, name, &workload);
            state.stateful_sets.insert(key(namespace, name), workload);
        }
        self
    }

    /// Add a service exposing TCP `ports`.
    #[must_use]
    pub fn service(self, namespace: &str, name: &str, service_type: &str, ports: &[u16]) -> Self {
        self.lock().services.insert(
            key(namespace, name),
            Service {
                name: name.to_owned(),
                namespace: namespace.to_owned(),
                service_type: service_type.to_owned(),
                cluster_ip: Some("10.96.0.10".to_owned()),
                ports: ports
                    .iter()
                    .map(|port| ServicePort {
                        port: *port,
                        protocol: "TCP".to_owned(),
                    })
                    .collect(),
            },
        );
        self
    }

    /// Add a standalone pod, optionally selected by `service`.
    #[must_use]
    pub fn pod(self, pod: Pod, service: Option<&str>) -> Self {
        self.lock().pods.insert(
            key(&pod.namespace, &pod.name),
            PodEntry {
                pod,
                service: service.map(str::to_owned),
                owner: None,
            },
        );
        self
    }

    /// Answer `command` with `stdout` in every pod.
    #[must_use]
    pub fn exec_output(self, command: &str, stdout: &str) -> Self {
        self.lock().exec.insert(
            command.to_owned(),
            CommandOutput {
                stdout: stdout.to_owned(),
                stderr: String::new(),
            },
        );
        self
    }

    /// Make every call to `operation` fail with `error`.
    #[must_use]
    pub fn fail(self, operation: &str, error: GatewayError) -> Self {
        self.lock().failures.insert(operation.to_owned(), error);
        self
    }

    /// Make [`PlatformGateway::ping`] fail.
    #[must_use]
    pub fn unreachable(self) -> Self {
        self.lock().reachable = false;
        self
    }

    /// Wrap in an [`Arc`] so the cluster can be inspected after a run.
    pub fn into_shared(self) -> Arc<Self> {
        Arc::new(self)
    }

    /// Coerce a shared cluster into a gateway handle.
    pub fn gateway(cluster: &Arc<Self>) -> SharedGateway {
        cluster.clone()
    }

    /// Operations called so far, in order.
    pub fn calls(&self) -> Vec<String> {
        self.lock().calls.clone()
    }

    /// How many times `operation` was called.
    pub fn call_count(&self, operation: &str) -> usize {
        self.lock().calls.iter().filter(|call| *call == operation).count()
    }

    /// Convergence requested by the latest stateful-set scale down.
    pub fn last_convergence(&self) -> Option<Convergence> {
        self.lock().convergence
    }

    /// Current desired replicas of a deployment.
    pub fn deployment_replicas(&self, namespace: &str, name: &str) -> Option<u32> {
        self.lock()
            .deployments
            .get(&key(namespace, name))
            .map(|workload| workload.replicas)
    }

    /// Whether a pod exists.
    pub fn has_pod(&self, namespace: &str, name: &str) -> bool {
        self.lock().pods.contains_key(&key(namespace, name))
    }

    fn enter(&self, operation: &str) -> Result<MutexGuard<'_, State>, GatewayError> {
        let mut state = self.lock();
        state.calls.push(operation.to_owned());
        if let Some(error) = state.failures.get(operation).cloned() {
            return Err(error);
        }
        Ok(state)
    }

    fn resize_deployment(
        &self,
        operation: &str,
        name: &str,
        namespace: &str,
        resize: impl FnOnce(u32) -> u32,
    ) -> Result<(), GatewayError> {
        let mut state = self.enter(operation)?;
        let workload = state
            .deployments
            .get_mut(&key(namespace, name))
            .ok_or_else(|| GatewayError::not_found("deployment", name, namespace))?;
        workload.replicas = resize(workload.replicas);
        workload.ready = workload.replicas;
        let snapshot = workload.clone();
        state.reconcile(namespace, name, &snapshot);
        Ok(())
    }

    fn pod_names(state: &State, owner: &str, namespace: &str) -> Vec<String> {
        let mut names: Vec<(u32, String)> = state
            .pods
            .iter()
            .filter(|((ns, _), entry)| ns == namespace && entry.owner.as_deref() == Some(owner))
            .map(|((_, name), _)| {
                let ordinal = name
                    .rsplit('-')
                    .next()
                    .and_then(|n| n.parse().ok())
                    .unwrap_or(u32::MAX);
                (ordinal, name.clone())
            })
            .collect();
        names.sort();
        names.into_iter().map(|(_, name)| name).collect()
    }
}

impl PlatformGateway for FakeCluster {
    fn ping(&self) -> Result<(), GatewayError> {
        let state = self.enter("ping")?;
        if state.reachable {
            Ok(())
        } else {
            Err(GatewayError::api("connection refused"))
        }
    }

    fn get_deployment(&self, name: &str, namespace: &str) -> Result<Deployment, GatewayError> {
        let state = self.enter("get_deployment")?;
        state
            .deployments
            .get(&key(namespace, name))
            .map(|workload| Deployment {
                name: name.to_owned(),
                namespace: namespace.to_owned(),
                replicas: workload.replicas,
                ready_replicas: workload.ready,
            })
            .ok_or_else(|| GatewayError::not_found("deployment", name, namespace))
    }

    fn scale_up_deployment(&self, name: &str, namespace: &str) -> Result<(), GatewayError> {
        self.resize_deployment("scale_up_deployment", name, namespace, |n| n.saturating_add(1))
    }

    fn scale_down_deployment(&self, name: &str, namespace: &str) -> Result<(), GatewayError> {
        self.resize_deployment("scale_down_deployment", name, namespace, |n| n.saturating_sub(1))
    }

    fn set_deployment_replicas(
        &self,
        name: &str,
        namespace: &str,
        replicas: u32,
    ) -> Result<(), GatewayError> {
        self.resize_deployment("set_deployment_replicas", name, namespace, |_| replicas)
    }

    fn deployment_count_for_service(&self, service: &str, namespace: &str) -> Result<usize, GatewayError> {
        let state = self.enter("deployment_count_for_service")?;
        Ok(State::selected(&state.deployments, service, namespace).count())
    }

    fn active_deployment_count_for_service(
        &self,
        service: &str,
        namespace: &str,
    ) -> Result<usize, GatewayError> {
        let state = self.enter("active_deployment_count_for_service")?;
        Ok(State::selected(&state.deployments, service, namespace)
            .filter(|(_, workload)| workload.replicas > 0 && workload.ready == workload.replicas)
            .count())
    }

    fn deployment_pod_names(&self, name: &str, namespace: &str) -> Result<Vec<String>, GatewayError> {
        let state = self.enter("deployment_pod_names")?;
        if !state.deployments.contains_key(&key(namespace, name)) {
            return Err(GatewayError::not_found("deployment", name, namespace));
        }
        Ok(Self::pod_names(&state, name, namespace))
    }

    fn get_stateful_set(&self, name: &str, namespace: &str) -> Result<StatefulSet, GatewayError> {
        let state = self.enter("get_stateful_set")?;
        state
            .stateful_sets
            .get(&key(namespace, name))
            .map(|workload| StatefulSet {
                name: name.to_owned(),
                namespace: namespace.to_owned(),
                replicas: workload.replicas,
                ready_replicas: workload.ready,
            })
            .ok_or_else(|| GatewayError::not_found("statefulset", name, namespace))
    }

    fn set_stateful_set_replicas(
        &self,
        name: &str,
        namespace: &str,
        replicas: u32,
    ) -> Result<(), GatewayError> {
        let mut state = self.enter("set_stateful_set_replicas")?;
        let workload = state
            .stateful_sets
            .get_mut(&key(namespace, name))
            .ok_or_else(|| GatewayError::not_found("statefulset", name, namespace))?;
        workload.replicas = replicas;
        workload.ready = replicas;
        let snapshot = workload.clone();
        state.reconcile(namespace, name, &snapshot);
        Ok(())
    }

    fn stateful_set_names_for_service(
        &self,
        service: &str,
        namespace: &str,
    ) -> Result<Vec<String>, GatewayError> {
        let state = self.enter("stateful_set_names_for_service")?;
        Ok(State::selected(&state.stateful_sets, service, namespace)
            .map(|(name, _)| name.to_owned())
            .collect())
    }

    fn scale_down_stateful_sets_for_service(
        &self,
        service: &str,
        namespace: &str,
        convergence: Convergence,
    ) -> Result<(), GatewayError> {
        let mut state = self.enter("scale_down_stateful_sets_for_service")?;
        state.convergence = Some(convergence);
        let names: Vec<String> = State::selected(&state.stateful_sets, service, namespace)
            .map(|(name, _)| name.to_owned())
            .collect();
        for name in names {
            let snapshot = match state.stateful_sets.get_mut(&key(namespace, &name)) {
                Some(workload) => {
                    workload.replicas = 0;
                    workload.ready = 0;
                    workload.clone()
                }
                None => continue,
            };
            state.reconcile(namespace, &name, &snapshot);
        }
        Ok(())
    }

    fn stateful_set_pod_names(&self, name: &str, namespace: &str) -> Result<Vec<String>, GatewayError> {
        let state = self.enter("stateful_set_pod_names")?;
        if !state.stateful_sets.contains_key(&key(namespace, name)) {
            return Err(GatewayError::not_found("statefulset", name, namespace));
        }
        Ok(Self::pod_names(&state, name, namespace))
    }

    fn get_service(&self, name: &str, namespace: &str) -> Result<Service, GatewayError> {
        let state = self.enter("get_service")?;
        state
            .services
            .get(&key(namespace, name))
            .cloned()
            .ok_or_else(|| GatewayError::not_found("service", name, namespace))
    }

    fn get_pod(&self, name: &str, namespace: &str) -> Result<Pod, GatewayError> {
        let state = self.enter("get_pod")?;
        state
            .pods
            .get(&key(namespace, name))
            .map(|entry| entry.pod.clone())
            .ok_or_else(|| GatewayError::not_found("pod", name, namespace))
    }

    fn pods_for_service(&self, service: &str, namespace: &str) -> Result<Vec<Pod>, GatewayError> {
        let state = self.enter("pods_for_service")?;
        Ok(state
            .pods
            .iter()
            .filter(|((ns, _), entry)| ns == namespace && entry.service.as_deref() == Some(service))
            .map(|(_, entry)| entry.pod.clone())
            .collect())
    }

    fn ready_pod_count_for_service(&self, service: &str, namespace: &str) -> Result<usize, GatewayError> {
        let state = self.enter("ready_pod_count_for_service")?;
        Ok(state
            .pods
            .iter()
            .filter(|((ns, _), entry)| {
                ns == namespace && entry.service.as_deref() == Some(service) && entry.pod.ready
            })
            .count())
    }

    fn exec_in_pod(&self, target: &ExecTarget, command: &str) -> Result<CommandOutput, GatewayError> {
        let state = self.enter("exec_in_pod")?;
        if !state.pods.contains_key(&key(&target.namespace, &target.pod)) {
            return Err(GatewayError::not_found("pod", &target.pod, &target.namespace));
        }
        Ok(state.exec.get(command).cloned().unwrap_or_default())
    }

    fn pod_name_by_ip(&self, ip: &str, namespace: &str) -> Result<Option<String>, GatewayError> {
        let state = self.enter("pod_name_by_ip")?;
        Ok(state
            .pods
            .iter()
            .find(|((ns, _), entry)| ns == namespace && entry.pod.ip.as_deref() == Some(ip))
            .map(|((_, name), _)| name.clone()))
    }

    fn delete_pod(&self, name: &str, namespace: &str) -> Result<(), GatewayError> {
        let mut state = self.enter("delete_pod")?;
        state
            .pods
            .remove(&key(namespace, name))
            .map(|_| ())
            .ok_or_else(|| GatewayError::not_found("pod", name, namespace))
    }
}
