//! The assembled engine.
//!
//! [`EngineBuilder`] collects steps, fixtures and hooks, checks them once,
//! and freezes them into an [`Engine`]. A run creates fresh session state;
//! nothing registered changes afterwards.

use miette::Diagnostic;
use thiserror::Error;

use crate::config::EngineConfig;
use crate::dispatch::{Dispatcher, RunReport};
use crate::fixture::{FixtureError, FixtureRegistry, Scope};
use crate::hooks::HookBus;
use crate::platform::CONFIG;
use crate::registry::{RegistrationError, StepRegistry};
use crate::step::Scenario;

/// Errors that prevent a run from starting.
#[derive(Debug, Error, Diagnostic)]
pub enum EngineError {
    /// A step could not be registered.
    #[error(transparent)]
    #[diagnostic(transparent)]
    Registration(#[from] RegistrationError),
    /// The fixture graph is invalid.
    #[error(transparent)]
    #[diagnostic(transparent)]
    Fixture(#[from] FixtureError),
    /// A step needs a fixture nobody declared.
    #[error("step '{template}' needs undeclared fixture '{fixture}'")]
    #[diagnostic(code(scenarist::engine::unknown_fixture))]
    UnknownFixture {
        /// Step template.
        template: String,
        /// Missing fixture.
        fixture: String,
    },
}

/// Collects registrations before the engine is frozen.
#[derive(Debug)]
pub struct EngineBuilder {
    config: EngineConfig,
    steps: StepRegistry,
    fixtures: FixtureRegistry,
    hooks: HookBus,
}

impl Default for EngineBuilder {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

impl EngineBuilder {
    /// Start a builder; `config` is exposed as the `config` session fixture.
    #[must_use]
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config,
            steps: StepRegistry::new(),
            fixtures: FixtureRegistry::new(),
            hooks: HookBus::new(),
        }
    }

    /// Step registry.
    pub fn steps(&mut self) -> &mut StepRegistry {
        &mut self.steps
    }

    /// Fixture registry.
    pub fn fixtures(&mut self) -> &mut FixtureRegistry {
        &mut self.fixtures
    }

    /// Lifecycle hooks.
    pub fn hooks(&mut self) -> &mut HookBus {
        &mut self.hooks
    }

    /// Validate every registration and freeze the engine.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError`] for fixture cycles, scope mismatches, unknown
    /// dependencies or steps that need undeclared fixtures.
    pub fn build(mut self) -> Result<Engine, EngineError> {
        if !self.fixtures.contains(CONFIG) {
            let config = self.config.clone();
            self.fixtures
                .declare(CONFIG, Scope::Session, &[], move |_| Ok(config.clone()))?;
        }
        self.fixtures.validate()?;
        for definition in self.steps.definitions() {
            if let Some(fixture) = definition
                .needs()
                .iter()
                .find(|name| !self.fixtures.contains(name))
            {
                return Err(EngineError::UnknownFixture {
                    template: definition.template().as_str().to_owned(),
                    fixture: fixture.clone(),
                });
            }
        }
        tracing::debug!(
            steps = self.steps.len(),
            fixtures = self.fixtures.definitions().len(),
            "engine ready"
        );
        Ok(Engine {
            config: self.config,
            steps: self.steps,
            fixtures: self.fixtures,
            hooks: self.hooks,
        })
    }
}

/// A validated, immutable engine.
#[derive(Debug)]
pub struct Engine {
    config: EngineConfig,
    steps: StepRegistry,
    fixtures: FixtureRegistry,
    hooks: HookBus,
}

impl Engine {
    /// Start building an engine with `config`.
    #[must_use]
    pub fn builder(config: EngineConfig) -> EngineBuilder {
        EngineBuilder::new(config)
    }

    /// Configuration the engine was built with.
    #[must_use]
    pub const fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Registered steps.
    #[must_use]
    pub const fn steps(&self) -> &StepRegistry {
        &self.steps
    }

    /// Declared fixtures.
    #[must_use]
    pub const fn fixtures(&self) -> &FixtureRegistry {
        &self.fixtures
    }

    /// Run `scenarios` in order as one session.
    ///
    /// Session fixtures are created on first use and torn down after the
    /// run-end hooks have seen the report.
    pub fn run(&self, scenarios: &[Scenario]) -> RunReport {
        let span = tracing::info_span!("run", scenarios = scenarios.len());
        let _entered = span.enter();
        let mut dispatcher = Dispatcher::new(&self.steps, &self.fixtures, &self.hooks);
        let report = RunReport {
            scenarios: scenarios
                .iter()
                .map(|scenario| dispatcher.run(scenario))
                .collect(),
        };
        tracing::info!(passed = report.passed(), failed = report.failed(), "run finished");
        self.hooks.emit_run_end(&report);
        dispatcher.finish();
        report
    }
}
