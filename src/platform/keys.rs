//! Context keys written and read by the platform steps.

/// Deployment record.
pub const DEPLOYMENT: &str = "deployment";
/// Deployment name.
pub const DEPLOYMENT_NAME: &str = "deployment_name";
/// Namespace of the object under test.
pub const NAMESPACE: &str = "namespace";
/// Stateful set record.
pub const STATEFULSET: &str = "statefulset";
/// Stateful set name.
pub const STATEFULSET_NAME: &str = "statefulset_name";
/// Stateful set names selected by a service.
pub const STATEFULSET_NAMES: &str = "statefulset_names";
/// Service record.
pub const SERVICE: &str = "service";
/// Service name.
pub const SERVICE_NAME: &str = "service_name";
/// Pod record.
pub const POD: &str = "pod";
/// Pod name.
pub const POD_NAME: &str = "pod_name";
/// Pod IP supplied by the scenario.
pub const POD_IP: &str = "pod_ip";
/// Pod records.
pub const PODS: &str = "pods";
/// Pod names.
pub const POD_NAMES: &str = "pod_names";
/// Replica count before a scale operation.
pub const REPLICAS_BEFORE: &str = "replicas_before";
/// Replica count after a scale operation.
pub const REPLICAS_AFTER: &str = "replicas_after";
/// Ready replicas of a stateful set.
pub const READY_REPLICAS: &str = "ready_replicas";
/// Desired replicas of a stateful set.
pub const TOTAL_REPLICAS: &str = "total_replicas";
/// Active deployments of a service.
pub const ACTIVE_DEPLOYMENTS: &str = "active_deployments_count";
/// All deployments of a service.
pub const TOTAL_DEPLOYMENTS: &str = "total_deployments_count";
/// Ready pods of a service.
pub const READY_PODS: &str = "ready_pods_count";
/// All pods of a service.
pub const TOTAL_PODS: &str = "total_pods_count";
/// Command text.
pub const COMMAND: &str = "command";
/// Command stdout.
pub const COMMAND_RESULT: &str = "command_result";
/// Command stderr.
pub const COMMAND_ERRORS: &str = "command_errors";
/// Container the command ran in.
pub const CONTAINER: &str = "container";
/// Pod name found by IP lookup.
pub const FOUND_POD_NAME: &str = "found_pod_name";
/// IP used for the lookup.
pub const SEARCHED_IP: &str = "searched_ip";
/// Name of the deleted pod.
pub const DELETED_POD_NAME: &str = "deleted_pod_name";
/// Delete operation marker.
pub const DELETE_OPERATION: &str = "delete_operation";
/// Last scale operation on stateful sets.
pub const SCALE_OPERATION: &str = "scale_operation";
