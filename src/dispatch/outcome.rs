//! Per-step outcomes and the reports built from them.

use std::fmt;

use itertools::Itertools;
use serde::Serialize;

use super::StepError;
use crate::context::ScenarioId;
use crate::step::{Phase, Scenario, StepInstance};

/// Why a step failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// No template matched the step text.
    Undefined,
    /// A fixture the step needs could not be created.
    FixtureSetup,
    /// A verification did not hold.
    Assertion,
    /// The platform gateway failed or timed out.
    Gateway,
    /// The handler panicked.
    Panic,
    /// Any other handler error.
    Error,
}

impl FailureKind {
    /// Classify a handler error.
    #[must_use]
    pub const fn of(error: &StepError) -> Self {
        match error {
            StepError::Assertion(_) => Self::Assertion,
            StepError::Gateway(_) => Self::Gateway,
            StepError::Context(_)
            | StepError::Binding(_)
            | StepError::Fixture(_)
            | StepError::MissingRead { .. }
            | StepError::Other(_) => Self::Error,
        }
    }

    /// Label used in reports.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Undefined => "step undefined",
            Self::FixtureSetup => "fixture setup failed",
            Self::Assertion => "assertion failed",
            Self::Gateway => "platform error",
            Self::Panic => "step panicked",
            Self::Error => "step error",
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A recorded failure with the step it originated from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StepFailure {
    /// Classification.
    pub kind: FailureKind,
    /// Error message, verbatim.
    pub message: String,
    /// Zero-based index of the failing step.
    pub step_index: usize,
    /// Step text including its keyword.
    pub step_text: String,
}

impl StepFailure {
    pub(crate) fn new(kind: FailureKind, step: &StepInstance, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            step_index: step.index(),
            step_text: step.to_string(),
        }
    }

    pub(crate) fn from_error(step: &StepInstance, error: &StepError) -> Self {
        Self::new(FailureKind::of(error), step, error.to_string())
    }
}

impl fmt::Display for StepFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {} ({})", self.step_text, self.message, self.kind)
    }
}

/// Outcome of one step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum StepOutcome {
    /// The handler returned successfully.
    Passed,
    /// The step failed; later steps were skipped.
    Failed(StepFailure),
    /// The step was not executed.
    Skipped,
}

impl StepOutcome {
    /// The failure, if any.
    #[must_use]
    pub const fn failure(&self) -> Option<&StepFailure> {
        match self {
            Self::Failed(failure) => Some(failure),
            Self::Passed | Self::Skipped => None,
        }
    }

    /// Whether the step passed.
    #[must_use]
    pub const fn is_passed(&self) -> bool {
        matches!(self, Self::Passed)
    }

    /// Whether the step was skipped.
    #[must_use]
    pub const fn is_skipped(&self) -> bool {
        matches!(self, Self::Skipped)
    }
}

/// A step and its outcome.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StepReport {
    /// Step text including its keyword.
    pub step: String,
    /// Resolved phase.
    pub phase: Phase,
    /// What happened.
    pub outcome: StepOutcome,
}

impl StepReport {
    pub(crate) fn new(step: &StepInstance, outcome: StepOutcome) -> Self {
        Self {
            step: step.to_string(),
            phase: step.phase(),
            outcome,
        }
    }
}

/// Overall status of a scenario.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ScenarioStatus {
    /// Every step passed.
    Passed,
    /// A step or its setup failed.
    Failed,
}

impl fmt::Display for ScenarioStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Passed => "passed",
            Self::Failed => "failed",
        })
    }
}

/// Result of one scenario.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScenarioResult {
    /// Identifier allocated for the execution.
    pub id: ScenarioId,
    /// Scenario name.
    pub name: String,
    /// Owning feature, if known.
    pub feature: Option<String>,
    /// Steps in declared order.
    pub steps: Vec<StepReport>,
    /// Fixture setup failure that prevented every step from running.
    pub setup_failure: Option<StepFailure>,
}

impl ScenarioResult {
    pub(crate) fn new(id: ScenarioId, scenario: &Scenario) -> Self {
        Self {
            id,
            name: scenario.name().to_owned(),
            feature: scenario.feature().map(str::to_owned),
            steps: Vec::with_capacity(scenario.steps().len()),
            setup_failure: None,
        }
    }

    /// `Failed` if setup or any step failed.
    #[must_use]
    pub fn status(&self) -> ScenarioStatus {
        if self.failure().is_some() {
            ScenarioStatus::Failed
        } else {
            ScenarioStatus::Passed
        }
    }

    /// The failure that ended the scenario, if any.
    #[must_use]
    pub fn failure(&self) -> Option<&StepFailure> {
        self.setup_failure
            .as_ref()
            .or_else(|| self.steps.iter().find_map(|report| report.outcome.failure()))
    }

    /// Number of passed steps.
    #[must_use]
    pub fn passed(&self) -> usize {
        self.steps.iter().filter(|r| r.outcome.is_passed()).count()
    }

    /// Number of failed steps.
    #[must_use]
    pub fn failed(&self) -> usize {
        self.steps
            .iter()
            .filter(|r| r.outcome.failure().is_some())
            .count()
    }

    /// Number of skipped steps.
    #[must_use]
    pub fn skipped(&self) -> usize {
        self.steps.iter().filter(|r| r.outcome.is_skipped()).count()
    }
}

/// Ordered results of a run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunReport {
    /// Scenario results in execution order.
    pub scenarios: Vec<ScenarioResult>,
}

impl RunReport {
    /// Number of passed scenarios.
    #[must_use]
    pub fn passed(&self) -> usize {
        self.scenarios
            .iter()
            .filter(|s| s.status() == ScenarioStatus::Passed)
            .count()
    }

    /// Number of failed scenarios.
    #[must_use]
    pub fn failed(&self) -> usize {
        self.scenarios.len() - self.passed()
    }

    /// Whether every scenario passed.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.failed() == 0
    }

    /// Failures in scenario order, paired with the scenario name.
    pub fn failures(&self) -> impl Iterator<Item = (&str, &StepFailure)> {
        self.scenarios
            .iter()
            .filter_map(|s| s.failure().map(|failure| (s.name.as_str(), failure)))
    }
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (passed, failed, skipped) = self.scenarios.iter().fold((0, 0, 0), |acc, s| {
            (acc.0 + s.passed(), acc.1 + s.failed(), acc.2 + s.skipped())
        });
        writeln!(
            f,
            "{} scenarios ({} passed, {} failed), {} steps ({passed} passed, {failed} failed, {skipped} skipped)",
            self.scenarios.len(),
            self.passed(),
            self.failed(),
            passed + failed + skipped,
        )?;
        let details = self
            .failures()
            .map(|(name, failure)| format!("  {name}: {failure}"))
            .join("\n");
        if !details.is_empty() {
            writeln!(f, "{details}")?;
        }
        Ok(())
    }
}
