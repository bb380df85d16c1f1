//! Background steps shared by every feature.

use crate::dispatch::ensure;
use crate::platform::{PLATFORM, keys};
use crate::registry::{RegistrationError, StepRegistry};

use super::{gateway, target};

pub(super) fn register(steps: &mut StepRegistry) -> Result<(), RegistrationError> {
    steps
        .given("Kubernetes cluster is available")
        .needs(&[PLATFORM])
        .example("Kubernetes cluster is available")
        .run(|world| Ok(gateway(world)?.ping()?))?;

    steps
        .given(r#"deployment "{name}" exists in namespace "{namespace}""#)
        .needs(&[PLATFORM])
        .example(r#"deployment "my-app" exists in namespace "my-namespace""#)
        .run(|world| {
            let (name, namespace) = target(world, "name")?;
            let deployment = gateway(world)?.get_deployment(name, namespace)?;
            let context = world.context_mut();
            context.insert_record(keys::DEPLOYMENT, &deployment)?;
            context.insert(keys::DEPLOYMENT_NAME, name);
            context.insert(keys::NAMESPACE, namespace);
            Ok(())
        })?;

    steps
        .given(r#"statefulset "{name}" exists in namespace "{namespace}""#)
        .needs(&[PLATFORM])
        .example(r#"statefulset "cassandra" exists in namespace "cassandra-ns""#)
        .run(|world| {
            let (name, namespace) = target(world, "name")?;
            let statefulset = gateway(world)?.get_stateful_set(name, namespace)?;
            let context = world.context_mut();
            context.insert_record(keys::STATEFULSET, &statefulset)?;
            context.insert(keys::STATEFULSET_NAME, name);
            context.insert(keys::NAMESPACE, namespace);
            Ok(())
        })?;

    steps
        .given(r#"service "{name}" exists in namespace "{namespace}""#)
        .needs(&[PLATFORM])
        .example(r#"service "elasticsearch" exists in namespace "elasticsearch-ns""#)
        .run(|world| {
            let (name, namespace) = target(world, "name")?;
            let service = gateway(world)?.get_service(name, namespace)?;
            let context = world.context_mut();
            context.insert_record(keys::SERVICE, &service)?;
            context.insert(keys::SERVICE_NAME, name);
            context.insert(keys::NAMESPACE, namespace);
            Ok(())
        })?;

    steps
        .given(r#"pod "{name}" exists in namespace "{namespace}""#)
        .needs(&[PLATFORM])
        .example(r#"pod "elasticsearch-0" exists in namespace "elasticsearch-ns""#)
        .run(|world| {
            let (name, namespace) = target(world, "name")?;
            let pod = gateway(world)?.get_pod(name, namespace)?;
            let context = world.context_mut();
            context.insert_record(keys::POD, &pod)?;
            context.insert(keys::POD_NAME, name);
            context.insert(keys::NAMESPACE, namespace);
            Ok(())
        })?;

    steps
        .given(r#"I have pod IP "{pod_ip}""#)
        .example(r#"I have pod IP "10.129.2.61""#)
        .run(|world| {
            let ip = world.args().str("pod_ip")?;
            ensure(!ip.is_empty(), || "pod IP must not be empty")?;
            world.context_mut().insert(keys::POD_IP, ip);
            Ok(())
        })
}
