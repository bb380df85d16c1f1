//! Service lookup and verification.

use itertools::Itertools;

use crate::context::Context;
use crate::dispatch::{StepError, ensure};
use crate::platform::{PLATFORM, Service, keys};
use crate::registry::{RegistrationError, StepRegistry};

use super::{gateway, target};

pub(super) fn register(steps: &mut StepRegistry) -> Result<(), RegistrationError> {
    steps
        .when(r#"I get service "{name}" in namespace "{namespace}""#)
        .needs(&[PLATFORM])
        .example(r#"I get service "elasticsearch" in namespace "elasticsearch-service""#)
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
        .then("service should be available")
        .example("service should be available")
        .run(|world| {
            let service = retrieved(world.context())?;
            ensure(!service.name.is_empty(), || "Service has no metadata")?;
            ensure(!service.service_type.is_empty(), || "Service has no spec")
        })?;

    steps
        .then("I log the service details")
        .example("I log the service details")
        .run(|world| {
            if world.context().contains(keys::SERVICE) {
                let service = retrieved(world.context())?;
                let ports = service
                    .ports
                    .iter()
                    .map(|p| format!("{}/{}", p.port, p.protocol))
                    .join(", ");
                tracing::info!(
                    name = %service.name,
                    namespace = %service.namespace,
                    cluster_ip = service.cluster_ip.as_deref().unwrap_or("None"),
                    service_type = %service.service_type,
                    ports = %ports,
                    "service details"
                );
            }
            Ok(())
        })?;

    steps
        .then(r#"service type should be "{expected_type}""#)
        .example(r#"service type should be "ClusterIP""#)
        .run(|world| {
            let expected = world.args().str("expected_type")?;
            let service = retrieved(world.context())?;
            ensure(service.service_type == expected, || {
                format!(
                    "Expected service type {expected}, got {}",
                    service.service_type
                )
            })
        })?;

    steps
        .then("service should have port {port:int}")
        .example("service should have port 9200")
        .run(|world| {
            let port = world.args().int("port")?;
            let service = retrieved(world.context())?;
            let ports: Vec<u16> = service.ports.iter().map(|p| p.port).collect();
            ensure(ports.iter().any(|p| i64::from(*p) == port), || {
                format!("Expected port {port} not found in service ports: {ports:?}")
            })
        })
}

fn retrieved(context: &Context) -> Result<Service, StepError> {
    ensure(context.contains(keys::SERVICE), || "Service was not retrieved")?;
    Ok(context.record_as(keys::SERVICE)?)
}
