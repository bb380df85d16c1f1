//! Scenario execution.
//!
//! A [`Dispatcher`] runs scenarios one at a time. Each scenario moves from
//! pending to running and ends either passed or failed. Steps after the first
//! failure are skipped, and scenario fixtures and the context are discarded
//! on every exit path.

mod error;
mod outcome;

pub use error::{StepError, ensure};
pub use outcome::{
    FailureKind, RunReport, ScenarioResult, ScenarioStatus, StepFailure, StepOutcome, StepReport,
};

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};

use crate::context::{Context, ContextStore, ScenarioId};
use crate::fixture::{FixtureRegistry, FixtureResolver, FixtureSet};
use crate::hooks::{HookBus, StepErrorEvent};
use crate::pattern::Bindings;
use crate::registry::{BoundStep, NoMatch, StepRegistry};
use crate::step::{Scenario, StepInstance};

/// Everything a step handler may touch.
pub struct StepWorld<'a> {
    step: &'a StepInstance,
    args: &'a Bindings,
    context: &'a mut Context,
    fixtures: &'a FixtureSet,
    scenario: ScenarioId,
}

impl<'a> StepWorld<'a> {
    /// The step being executed.
    #[must_use]
    pub const fn step(&self) -> &'a StepInstance {
        self.step
    }

    /// Placeholder values bound from the step text.
    #[must_use]
    pub const fn args(&self) -> &'a Bindings {
        self.args
    }

    /// Scenario context.
    #[must_use]
    pub fn context(&self) -> &Context {
        self.context
    }

    /// Mutable scenario context.
    pub fn context_mut(&mut self) -> &mut Context {
        self.context
    }

    /// Declared fixture `name` as `T`.
    ///
    /// # Errors
    ///
    /// Returns [`StepError::Fixture`] when the step did not declare `name`
    /// or the fixture holds another type.
    pub fn fixture<T: Any>(&self, name: &str) -> Result<&'a T, StepError> {
        let fixtures: &'a FixtureSet = self.fixtures;
        Ok(fixtures.get::<T>(name)?)
    }

    /// Identifier of the running scenario.
    #[must_use]
    pub const fn scenario(&self) -> ScenarioId {
        self.scenario
    }
}

/// Runs scenarios against a step registry, fixtures and hooks.
pub struct Dispatcher<'e> {
    steps: &'e StepRegistry,
    fixtures: FixtureResolver<'e>,
    contexts: ContextStore,
    hooks: &'e HookBus,
    next_id: u64,
}

impl<'e> Dispatcher<'e> {
    /// Create a dispatcher. Session fixtures live as long as it does.
    #[must_use]
    pub fn new(steps: &'e StepRegistry, fixtures: &'e FixtureRegistry, hooks: &'e HookBus) -> Self {
        Self {
            steps,
            fixtures: FixtureResolver::new(fixtures),
            contexts: ContextStore::new(),
            hooks,
            next_id: 0,
        }
    }

    /// Number of contexts still alive. Zero between scenarios.
    #[must_use]
    pub fn active_contexts(&self) -> usize {
        self.contexts.active_count()
    }

    /// Tear down session fixtures.
    pub fn finish(mut self) {
        self.fixtures.teardown_session();
    }

    /// Execute `scenario` and return its result.
    pub fn run(&mut self, scenario: &Scenario) -> ScenarioResult {
        self.next_id += 1;
        let id = ScenarioId::new(self.next_id);
        let span = tracing::info_span!("scenario", name = scenario.name(), %id);
        let _entered = span.enter();
        tracing::info!(steps = scenario.steps().len(), "scenario started");

        self.contexts.create(id);
        let steps = self.steps;
        let bound: Vec<Result<BoundStep<'e>, NoMatch>> = scenario
            .steps()
            .iter()
            .map(|step| steps.find(step.phase(), step.text()))
            .collect();

        let mut result = ScenarioResult::new(id, scenario);
        match self.setup(scenario, &bound, id) {
            Ok(sets) => self.execute(scenario, &bound, sets, id, &mut result),
            Err((step, failure)) => {
                tracing::warn!(step = %step, error = %failure.message, "fixture setup failed");
                result.steps = scenario
                    .steps()
                    .iter()
                    .map(|s| StepReport::new(s, StepOutcome::Skipped))
                    .collect();
                let recorded = result.setup_failure.insert(failure);
                self.hooks.emit_step_error(&StepErrorEvent {
                    feature: scenario.feature(),
                    scenario: scenario.name(),
                    step,
                    failure: recorded,
                });
            }
        }

        self.fixtures.teardown_scenario(id);
        self.contexts.destroy(id);
        tracing::info!(status = %result.status(), "scenario finished");
        self.hooks.emit_scenario_end(&result);
        result
    }

    /// Resolve the fixtures of every step bound before the first undefined
    /// one.
    fn setup<'s>(
        &mut self,
        scenario: &'s Scenario,
        bound: &[Result<BoundStep<'e>, NoMatch>],
        id: ScenarioId,
    ) -> Result<Vec<FixtureSet>, (&'s StepInstance, StepFailure)> {
        let mut sets = Vec::new();
        for (step, binding) in scenario.steps().iter().zip(bound) {
            let Ok(bound_step) = binding else { break };
            let definition = bound_step.definition();
            let requester = definition.template().as_str();
            let fixtures = &mut self.fixtures;
            let resolved = panic::catch_unwind(AssertUnwindSafe(|| {
                fixtures.resolve_set(requester, definition.needs(), id)
            }));
            let failure = match resolved {
                Ok(Ok(set)) => {
                    sets.push(set);
                    continue;
                }
                Ok(Err(err)) => StepFailure::new(FailureKind::FixtureSetup, step, err.to_string()),
                Err(payload) => {
                    self.fixtures.clear_in_flight();
                    StepFailure::new(
                        FailureKind::FixtureSetup,
                        step,
                        format!("fixture factory panicked: {}", panic_message(payload.as_ref())),
                    )
                }
            };
            return Err((step, failure));
        }
        Ok(sets)
    }

    fn execute(
        &mut self,
        scenario: &Scenario,
        bound: &[Result<BoundStep<'e>, NoMatch>],
        sets: Vec<FixtureSet>,
        id: ScenarioId,
        result: &mut ScenarioResult,
    ) {
        let mut sets = sets.into_iter();
        let mut failed = false;
        for (step, binding) in scenario.steps().iter().zip(bound) {
            if failed {
                tracing::debug!(step = %step, "skipped");
                result.steps.push(StepReport::new(step, StepOutcome::Skipped));
                continue;
            }
            let outcome = match binding {
                Ok(bound_step) => {
                    let set = sets
                        .next()
                        .unwrap_or_else(|| FixtureSet::empty(bound_step.definition().template().as_str()));
                    self.invoke(step, bound_step, &set, id)
                }
                Err(no_match) => StepOutcome::Failed(StepFailure::new(
                    FailureKind::Undefined,
                    step,
                    no_match.to_string(),
                )),
            };
            result.steps.push(StepReport::new(step, outcome.clone()));
            if let Some(failure) = outcome.failure() {
                failed = true;
                tracing::warn!(step = %step, kind = %failure.kind, error = %failure.message, "step failed");
                self.hooks.emit_step_error(&StepErrorEvent {
                    feature: scenario.feature(),
                    scenario: scenario.name(),
                    step,
                    failure,
                });
            }
        }
    }

    fn invoke(
        &mut self,
        step: &StepInstance,
        bound: &BoundStep<'e>,
        fixtures: &FixtureSet,
        id: ScenarioId,
    ) -> StepOutcome {
        let context = match self.contexts.get_mut(id) {
            Ok(context) => context,
            Err(err) => {
                return StepOutcome::Failed(StepFailure::from_error(step, &err.into()));
            }
        };
        let definition = bound.definition();
        if let Some(key) = definition.reads().iter().find(|key| !context.contains(key)) {
            let err = StepError::MissingRead { key: key.clone() };
            return StepOutcome::Failed(StepFailure::from_error(step, &err));
        }
        tracing::debug!(step = %step, template = %definition.template(), "step bound");

        let mut world = StepWorld {
            step,
            args: bound.bindings(),
            context,
            fixtures,
            scenario: id,
        };
        match panic::catch_unwind(AssertUnwindSafe(|| definition.call(&mut world))) {
            Ok(Ok(())) => StepOutcome::Passed,
            Ok(Err(err)) => StepOutcome::Failed(StepFailure::from_error(step, &err)),
            Err(payload) => StepOutcome::Failed(StepFailure::new(
                FailureKind::Panic,
                step,
                panic_message(payload.as_ref()),
            )),
        }
    }
}

/// Best-effort text of a panic payload.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|msg| (*msg).to_owned())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "non-string panic payload".to_owned())
}
