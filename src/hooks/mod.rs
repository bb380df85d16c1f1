//! Lifecycle callbacks.
//!
//! Hooks observe outcomes after they are recorded. A failing or panicking
//! hook is logged and ignored; it never changes a result.

use std::fmt;
use std::panic::{self, AssertUnwindSafe};

use crate::dispatch::{RunReport, ScenarioResult, StepFailure};
use crate::step::StepInstance;

/// Details passed to step-error hooks.
#[derive(Debug, Clone, Copy)]
pub struct StepErrorEvent<'a> {
    /// Owning feature, if known.
    pub feature: Option<&'a str>,
    /// Scenario name.
    pub scenario: &'a str,
    /// The failing step.
    pub step: &'a StepInstance,
    /// The recorded failure.
    pub failure: &'a StepFailure,
}

type StepErrorHook = Box<dyn Fn(&StepErrorEvent<'_>) -> anyhow::Result<()> + Send + Sync>;
type ScenarioEndHook = Box<dyn Fn(&ScenarioResult) -> anyhow::Result<()> + Send + Sync>;
type RunEndHook = Box<dyn Fn(&RunReport) -> anyhow::Result<()> + Send + Sync>;

/// Registered lifecycle callbacks, invoked in registration order.
#[derive(Default)]
pub struct HookBus {
    step_error: Vec<StepErrorHook>,
    scenario_end: Vec<ScenarioEndHook>,
    run_end: Vec<RunEndHook>,
}

impl HookBus {
    /// Create a bus with no callbacks.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Call `hook` whenever a step failure is recorded.
    pub fn on_step_error<F>(&mut self, hook: F)
    where
        F: Fn(&StepErrorEvent<'_>) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.step_error.push(Box::new(hook));
    }

    /// Call `hook` after each scenario has been cleaned up.
    pub fn on_scenario_end<F>(&mut self, hook: F)
    where
        F: Fn(&ScenarioResult) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.scenario_end.push(Box::new(hook));
    }

    /// Call `hook` once every scenario of a run has finished.
    pub fn on_run_end<F>(&mut self, hook: F)
    where
        F: Fn(&RunReport) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.run_end.push(Box::new(hook));
    }

    pub(crate) fn emit_step_error(&self, event: &StepErrorEvent<'_>) {
        for (index, hook) in self.step_error.iter().enumerate() {
            guard("step_error", index, || hook(event));
        }
    }

    pub(crate) fn emit_scenario_end(&self, result: &ScenarioResult) {
        for (index, hook) in self.scenario_end.iter().enumerate() {
            guard("scenario_end", index, || hook(result));
        }
    }

    pub(crate) fn emit_run_end(&self, report: &RunReport) {
        for (index, hook) in self.run_end.iter().enumerate() {
            guard("run_end", index, || hook(report));
        }
    }
}

impl fmt::Debug for HookBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HookBus")
            .field("step_error", &self.step_error.len())
            .field("scenario_end", &self.scenario_end.len())
            .field("run_end", &self.run_end.len())
            .finish()
    }
}

fn guard(event: &'static str, index: usize, call: impl FnOnce() -> anyhow::Result<()>) {
    match panic::catch_unwind(AssertUnwindSafe(call)) {
        Ok(Ok(())) => {}
        Ok(Err(err)) => tracing::warn!(event, hook = index, error = %format!("{err:#}"), "hook failed"),
        Err(payload) => tracing::warn!(
            event,
            hook = index,
            panic = %crate::dispatch::panic_message(payload.as_ref()),
            "hook panicked"
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::ScenarioId;
    use crate::step::Scenario;
    use std::sync::{Arc, Mutex};

    fn result() -> ScenarioResult {
        let scenario = Scenario::builder("s").given("x").build().expect("scenario");
        ScenarioResult::new(ScenarioId::new(1), &scenario)
    }

    #[test]
    fn hooks_run_in_registration_order_despite_failures() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let mut bus = HookBus::new();
        let first = Arc::clone(&calls);
        bus.on_scenario_end(move |_| {
            first.lock().expect("lock").push(1);
            anyhow::bail!("first hook fails")
        });
        bus.on_scenario_end(|_| panic!("second hook panics"));
        let third = Arc::clone(&calls);
        bus.on_scenario_end(move |_| {
            third.lock().expect("lock").push(3);
            Ok(())
        });
        bus.emit_scenario_end(&result());
        assert_eq!(*calls.lock().expect("lock"), vec![1, 3]);
    }
}
