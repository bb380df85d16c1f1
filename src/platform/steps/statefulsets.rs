//! Stateful set scaling and inspection.

use crate::config::EngineConfig;
use crate::dispatch::ensure;
use crate::platform::{CONFIG, Convergence, PLATFORM, keys};
use crate::registry::{RegistrationError, StepRegistry};

use super::{gateway, replica_count, target};

pub(super) fn register(steps: &mut StepRegistry) -> Result<(), RegistrationError> {
    steps
        .when(r#"I check statefulset "{name}" ready replicas in namespace "{namespace}""#)
        .needs(&[PLATFORM])
        .example(r#"I check statefulset "cassandra" ready replicas in namespace "cassandra-ns""#)
        .run(|world| {
            let (name, namespace) = target(world, "name")?;
            let statefulset = gateway(world)?.get_stateful_set(name, namespace)?;
            let context = world.context_mut();
            context.insert(keys::READY_REPLICAS, statefulset.ready_replicas);
            context.insert(keys::TOTAL_REPLICAS, statefulset.replicas);
            context.insert(keys::STATEFULSET_NAME, name);
            Ok(())
        })?;

    steps
        .when(r#"I set replicas to {count:int} for statefulset "{name}" in namespace "{namespace}""#)
        .needs(&[PLATFORM])
        .example(r#"I set replicas to 3 for statefulset "cassandra" in namespace "cassandra-ns""#)
        .run(|world| {
            let (name, namespace) = target(world, "name")?;
            let replicas = replica_count(world)?;
            let platform = gateway(world)?;
            platform.set_stateful_set_replicas(name, namespace, replicas)?;
            let statefulset = platform.get_stateful_set(name, namespace)?;
            let context = world.context_mut();
            context.insert(keys::REPLICAS_AFTER, statefulset.replicas);
            context.insert_record(keys::STATEFULSET, &statefulset)?;
            Ok(())
        })?;

    steps
        .when(r#"I scale down statefulsets by service name "{service}" in namespace "{namespace}" with check"#)
        .needs(&[PLATFORM, CONFIG])
        .example(r#"I scale down statefulsets by service name "cassandra-svc" in namespace "cassandra-ns" with check"#)
        .run(|world| {
            let (service, namespace) = target(world, "service")?;
            let timeout = world.fixture::<EngineConfig>(CONFIG)?.convergence_timeout();
            let platform = gateway(world)?;
            let names = platform.stateful_set_names_for_service(service, namespace)?;
            world.context_mut().insert(keys::STATEFULSET_NAMES, names);
            platform.scale_down_stateful_sets_for_service(
                service,
                namespace,
                Convergence::within(timeout),
            )?;
            let context = world.context_mut();
            context.insert(keys::NAMESPACE, namespace);
            context.insert(keys::SCALE_OPERATION, "down");
            Ok(())
        })?;

    steps
        .when(r#"I get pod names for statefulset "{name}" in namespace "{namespace}""#)
        .needs(&[PLATFORM])
        .example(r#"I get pod names for statefulset "cassandra" in namespace "cassandra-ns""#)
        .run(|world| {
            let (name, namespace) = target(world, "name")?;
            let names = gateway(world)?.stateful_set_pod_names(name, namespace)?;
            let context = world.context_mut();
            context.insert(keys::POD_NAMES, names);
            context.insert(keys::STATEFULSET_NAME, name);
            Ok(())
        })?;

    steps
        .then("all replicas should be ready")
        .example("all replicas should be ready")
        .run(|world| {
            let context = world.context();
            let ready = context.int_or(keys::READY_REPLICAS, 0)?;
            let total = context.int_or(keys::TOTAL_REPLICAS, 0)?;
            let name = context.text(keys::STATEFULSET_NAME).unwrap_or("unknown");
            ensure(ready == total, || {
                format!("StatefulSet {name}: only {ready} of {total} replicas are ready")
            })
        })?;

    steps
        .then(r#"statefulset "{name}" should have {count:int} replicas"#)
        .example(r#"statefulset "cassandra" should have 3 replicas"#)
        .run(|world| {
            let name = world.args().str("name")?;
            let expected = world.args().int("count")?;
            let actual = world.context().int_or(keys::REPLICAS_AFTER, 0)?;
            ensure(actual == expected, || {
                format!("Expected {expected} replicas for {name}, got {actual}")
            })
        })?;

    steps
        .then("all related statefulsets should be scaled down")
        .needs(&[PLATFORM])
        .reads(&[keys::NAMESPACE])
        .example("all related statefulsets should be scaled down")
        .run(|world| {
            let platform = gateway(world)?;
            let context = world.context();
            let namespace = context.text(keys::NAMESPACE)?;
            let names = if context.contains(keys::STATEFULSET_NAMES) {
                context.text_list(keys::STATEFULSET_NAMES)?
            } else {
                Vec::new()
            };
            for name in &names {
                let replicas = platform.get_stateful_set(name, namespace)?.replicas;
                ensure(replicas == 0, || {
                    format!("StatefulSet {name} still has {replicas} replicas")
                })?;
            }
            tracing::info!(count = names.len(), "stateful sets scaled down to 0 replicas");
            Ok(())
        })?;

    steps
        .then(r#"I should receive a list of pod names with pattern "{pattern}""#)
        .example(r#"I should receive a list of pod names with pattern "cassandra-N""#)
        .run(|world| {
            let pattern = world.args().str("pattern")?;
            let context = world.context();
            ensure(context.contains(keys::POD_NAMES), || {
                "Pod names list was not retrieved"
            })?;
            let base = pattern.replace("-N", "");
            for (ordinal, pod) in context.text_list(keys::POD_NAMES)?.into_iter().enumerate() {
                let expected = format!("{base}-{ordinal}");
                ensure(pod == expected, || {
                    format!("Expected pod name {expected}, got {pod}")
                })?;
            }
            Ok(())
        })
}
