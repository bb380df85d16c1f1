//! Step vocabulary for cluster scenarios.
//!
//! Every step is a thin call into the [`PlatformGateway`] that records what
//! it saw in the scenario context under the names in [`keys`](super::keys).
//! Verification steps only read the context.

mod common;
mod deployments;
mod pods;
mod services;
mod statefulsets;

use crate::dispatch::{StepError, StepWorld};
use crate::registry::{RegistrationError, StepRegistry};

use super::{PlatformGateway, SharedGateway, PLATFORM};

/// Register the whole platform vocabulary.
///
/// # Errors
///
/// Returns [`RegistrationError`] when a template clashes with one already
/// present in `steps`.
pub fn register(steps: &mut StepRegistry) -> Result<(), RegistrationError> {
    common::register(steps)?;
    deployments::register(steps)?;
    pods::register(steps)?;
    services::register(steps)?;
    statefulsets::register(steps)?;
    Ok(())
}

fn gateway<'a>(world: &StepWorld<'a>) -> Result<&'a dyn PlatformGateway, StepError> {
    let shared = world.fixture::<SharedGateway>(PLATFORM)?;
    Ok(shared.as_ref())
}

fn replica_count(world: &StepWorld<'_>) -> Result<u32, StepError> {
    let count = world.args().int("count")?;
    u32::try_from(count)
        .map_err(|_| StepError::assertion(format!("replica count {count} is out of range")))
}

/// Bound `key` and `namespace` arguments of the step.
fn target<'a>(world: &StepWorld<'a>, key: &str) -> Result<(&'a str, &'a str), StepError> {
    let args = world.args();
    Ok((args.str(key)?, args.str("namespace")?))
}
