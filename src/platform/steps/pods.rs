//! Pod lookup, command execution and deletion.

use crate::context::ContextValue;
use crate::dispatch::{StepError, StepWorld, ensure};
use crate::platform::{ExecTarget, PLATFORM, Pod, keys};
use crate::registry::{RegistrationError, StepRegistry};

use super::{gateway, target};

const DELETE_COMPLETED: &str = "completed";

pub(super) fn register(steps: &mut StepRegistry) -> Result<(), RegistrationError> {
    steps
        .when(r#"I get pods by service name "{service}" in namespace "{namespace}""#)
        .needs(&[PLATFORM])
        .example(r#"I get pods by service name "elasticsearch" in namespace "elasticsearch-ns""#)
        .run(|world| {
            let (service, namespace) = target(world, "service")?;
            let pods = gateway(world)?.pods_for_service(service, namespace)?;
            let context = world.context_mut();
            context.insert_record(keys::PODS, &pods)?;
            context.insert(keys::SERVICE_NAME, service);
            Ok(())
        })?;

    // The container form must precede the plain form, which would
    // otherwise swallow `container "..."` into the pod name.
    steps
        .when(r#"I execute command "{command}" in pod "{pod}" container "{container}" namespace "{namespace}""#)
        .needs(&[PLATFORM])
        .example(r#"I execute command "cat /etc/hosts" in pod "multi-container" container "app" namespace "my-ns""#)
        .run(|world| {
            let container = world.args().str("container")?;
            exec(world, Some(container))
        })?;

    steps
        .when(r#"I execute command "{command}" in pod "{pod}" namespace "{namespace}""#)
        .needs(&[PLATFORM])
        .example(r#"I execute command "ls -la" in pod "elasticsearch-0" namespace "elasticsearch-ns""#)
        .run(|world| exec(world, None))?;

    steps
        .when(r#"I count pods in ready status for service "{service}" in namespace "{namespace}""#)
        .needs(&[PLATFORM])
        .example(r#"I count pods in ready status for service "my-service" in namespace "my-ns""#)
        .run(|world| {
            let (service, namespace) = target(world, "service")?;
            let platform = gateway(world)?;
            let ready = platform.ready_pod_count_for_service(service, namespace)?;
            let total = platform.pods_for_service(service, namespace)?.len();
            let context = world.context_mut();
            context.insert(keys::READY_PODS, ready);
            context.insert(keys::TOTAL_PODS, total);
            Ok(())
        })?;

    steps
        .when(r#"I look up pod name by IP "{ip}" in namespace "{namespace}""#)
        .needs(&[PLATFORM])
        .example(r#"I look up pod name by IP "10.129.2.61" in namespace "my-ns""#)
        .run(|world| {
            let (ip, namespace) = target(world, "ip")?;
            let found = gateway(world)?.pod_name_by_ip(ip, namespace)?;
            let context = world.context_mut();
            if let Some(name) = found {
                context.insert(keys::FOUND_POD_NAME, name);
            } else {
                context.remove(keys::FOUND_POD_NAME);
            }
            context.insert(keys::SEARCHED_IP, ip);
            Ok(())
        })?;

    steps
        .when(r#"I delete pod "{name}" in namespace "{namespace}""#)
        .needs(&[PLATFORM])
        .example(r#"I delete pod "test-pod-12345" in namespace "my-ns""#)
        .run(|world| {
            let (name, namespace) = target(world, "name")?;
            gateway(world)?.delete_pod(name, namespace)?;
            let context = world.context_mut();
            context.insert(keys::DELETED_POD_NAME, name);
            context.insert(keys::DELETE_OPERATION, DELETE_COMPLETED);
            Ok(())
        })?;

    steps
        .then("I should receive a list of pods")
        .example("I should receive a list of pods")
        .run(|world| {
            let context = world.context();
            ensure(context.contains(keys::PODS), || "Pods list was not retrieved")?;
            let pods: Vec<Pod> = context.record_as(keys::PODS)?;
            let names: Vec<&str> = pods.iter().map(|pod| pod.name.as_str()).collect();
            tracing::info!(count = pods.len(), pods = ?names, "pods received");
            Ok(())
        })?;

    steps
        .then("command should execute successfully")
        .reads(&[keys::COMMAND])
        .example("command should execute successfully")
        .run(|world| {
            let context = world.context();
            let command = context.text(keys::COMMAND)?;
            ensure(context.contains(keys::COMMAND_RESULT), || {
                format!("Command '{command}' failed to execute")
            })?;
            tracing::info!(command, "command executed");
            Ok(())
        })?;

    steps
        .then("I should receive command output")
        .example("I should receive command output")
        .run(|world| {
            let context = world.context();
            let stdout = optional_text(context.get(keys::COMMAND_RESULT));
            let stderr = optional_text(context.get(keys::COMMAND_ERRORS));
            tracing::info!(output = stdout, "command output");
            if !stderr.is_empty() {
                tracing::warn!(stderr, "command wrote to stderr");
            }
            Ok(())
        })?;

    steps
        .then("ready pods count should match expected count")
        .example("ready pods count should match expected count")
        .run(|world| {
            let context = world.context();
            let ready = context.int_or(keys::READY_PODS, 0)?;
            let total = context.int_or(keys::TOTAL_PODS, 0)?;
            ensure(ready == total, || format!("Only {ready} of {total} pods are ready"))
        })?;

    steps
        .then("I should receive the pod name")
        .example("I should receive the pod name")
        .run(|world| {
            let context = world.context();
            let ip = optional_text(context.get(keys::SEARCHED_IP));
            ensure(context.contains(keys::FOUND_POD_NAME), || {
                format!("No pod found with IP {ip}")
            })?;
            let name = context.text(keys::FOUND_POD_NAME)?;
            tracing::info!(pod = name, ip, "pod found by IP");
            Ok(())
        })?;

    steps
        .then("pod should be deleted")
        .example("pod should be deleted")
        .run(|world| {
            let operation = optional_text(world.context().get(keys::DELETE_OPERATION));
            ensure(operation == DELETE_COMPLETED, || {
                "Delete operation was not completed"
            })
        })
}

fn exec(world: &mut StepWorld<'_>, container: Option<&str>) -> Result<(), StepError> {
    let args = world.args();
    let command = args.str("command")?;
    let (pod, namespace) = target(world, "pod")?;
    let exec_target = ExecTarget {
        pod: pod.to_owned(),
        namespace: namespace.to_owned(),
        container: container.map(str::to_owned),
    };
    let output = gateway(world)?.exec_in_pod(&exec_target, command)?;
    let context = world.context_mut();
    context.insert(keys::COMMAND_RESULT, output.stdout);
    context.insert(keys::COMMAND_ERRORS, output.stderr);
    context.insert(keys::COMMAND, command);
    if let Some(name) = container {
        context.insert(keys::CONTAINER, name);
    }
    Ok(())
}

fn optional_text(value: Option<&ContextValue>) -> &str {
    match value {
        Some(ContextValue::Text(text)) => text,
        _ => "",
    }
}
