//! Deployment scaling and inspection.

use crate::context::Context;
use crate::dispatch::{StepError, StepWorld, ensure};
use crate::platform::{GatewayError, PLATFORM, PlatformGateway, keys};
use crate::registry::{RegistrationError, StepRegistry};

use super::{gateway, replica_count, target};

pub(super) fn register(steps: &mut StepRegistry) -> Result<(), RegistrationError> {
    steps
        .when(r#"I scale up deployment "{name}" in namespace "{namespace}""#)
        .needs(&[PLATFORM])
        .example(r#"I scale up deployment "my-app" in namespace "my-namespace""#)
        .run(|world| scale(world, |gw, name, ns| gw.scale_up_deployment(name, ns)))?;

    steps
        .when(r#"I scale down deployment "{name}" in namespace "{namespace}""#)
        .needs(&[PLATFORM])
        .example(r#"I scale down deployment "my-app" in namespace "my-namespace""#)
        .run(|world| scale(world, |gw, name, ns| gw.scale_down_deployment(name, ns)))?;

    steps
        .when(r#"I set replicas to {count:int} for deployment "{name}" in namespace "{namespace}""#)
        .needs(&[PLATFORM])
        .example(r#"I set replicas to 3 for deployment "my-app" in namespace "my-namespace""#)
        .run(|world| {
            let (name, namespace) = target(world, "name")?;
            let replicas = replica_count(world)?;
            let platform = gateway(world)?;
            platform.set_deployment_replicas(name, namespace, replicas)?;
            let deployment = platform.get_deployment(name, namespace)?;
            let context = world.context_mut();
            context.insert(keys::REPLICAS_AFTER, deployment.replicas);
            context.insert_record(keys::DEPLOYMENT, &deployment)?;
            Ok(())
        })?;

    steps
        .when(r#"I get active deployments count for service "{service}" in namespace "{namespace}""#)
        .needs(&[PLATFORM])
        .example(r#"I get active deployments count for service "my-service" in namespace "my-namespace""#)
        .run(|world| {
            let (service, namespace) = target(world, "service")?;
            let platform = gateway(world)?;
            let active = platform.active_deployment_count_for_service(service, namespace)?;
            let total = platform.deployment_count_for_service(service, namespace)?;
            let context = world.context_mut();
            context.insert(keys::ACTIVE_DEPLOYMENTS, active);
            context.insert(keys::TOTAL_DEPLOYMENTS, total);
            Ok(())
        })?;

    steps
        .when(r#"I get pod names for deployment "{name}" in namespace "{namespace}""#)
        .needs(&[PLATFORM])
        .example(r#"I get pod names for deployment "my-app" in namespace "my-namespace""#)
        .run(|world| {
            let (name, namespace) = target(world, "name")?;
            let names = gateway(world)?.deployment_pod_names(name, namespace)?;
            world.context_mut().insert(keys::POD_NAMES, names);
            Ok(())
        })?;

    steps
        .then("deployment should have more replicas than before")
        .example("deployment should have more replicas than before")
        .run(|world| {
            let (before, after) = replicas_before_after(world.context())?;
            ensure(after > before, || {
                format!("Expected more replicas, but got {after} (was {before})")
            })
        })?;

    steps
        .then("deployment should have fewer replicas than before")
        .example("deployment should have fewer replicas than before")
        .run(|world| {
            let (before, after) = replicas_before_after(world.context())?;
            ensure(after < before, || {
                format!("Expected fewer replicas, but got {after} (was {before})")
            })
        })?;

    steps
        .then(r#"deployment "{name}" should have {count:int} replicas"#)
        .example(r#"deployment "my-app" should have 3 replicas"#)
        .run(|world| {
            let name = world.args().str("name")?;
            let expected = world.args().int("count")?;
            let actual = world.context().int_or(keys::REPLICAS_AFTER, 0)?;
            ensure(actual == expected, || {
                format!("Expected {expected} replicas for {name}, got {actual}")
            })
        })?;

    steps
        .then("all deployments should be active")
        .example("all deployments should be active")
        .run(|world| {
            let context = world.context();
            let active = context.int_or(keys::ACTIVE_DEPLOYMENTS, 0)?;
            let total = context.int_or(keys::TOTAL_DEPLOYMENTS, 0)?;
            ensure(active == total, || {
                format!("Only {active} of {total} deployments are active")
            })
        })?;

    steps
        .then("I should receive a list of pod names")
        .example("I should receive a list of pod names")
        .run(|world| {
            let context = world.context();
            ensure(context.contains(keys::POD_NAMES), || {
                "Pod names list was not retrieved"
            })?;
            let names = context.text_list(keys::POD_NAMES)?;
            tracing::info!(count = names.len(), pods = ?names, "pod names received");
            Ok(())
        })
}

fn scale<F>(world: &mut StepWorld<'_>, apply: F) -> Result<(), StepError>
where
    F: FnOnce(&dyn PlatformGateway, &str, &str) -> Result<(), GatewayError>,
{
    let (name, namespace) = target(world, "name")?;
    let platform = gateway(world)?;
    let before = platform.get_deployment(name, namespace)?;
    apply(platform, name, namespace)?;
    let after = platform.get_deployment(name, namespace)?;
    let context = world.context_mut();
    context.insert(keys::REPLICAS_BEFORE, before.replicas);
    context.insert(keys::REPLICAS_AFTER, after.replicas);
    context.insert_record(keys::DEPLOYMENT, &after)?;
    Ok(())
}

fn replicas_before_after(context: &Context) -> Result<(i64, i64), StepError> {
    Ok((
        context.int_or(keys::REPLICAS_BEFORE, 0)?,
        context.int_or(keys::REPLICAS_AFTER, 0)?,
    ))
}
