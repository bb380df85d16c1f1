//! Phase-keyed step registry.
//!
//! Templates are tried in registration order and the first match wins.
//! Two templates in the same phase whose skeletons are equal once
//! placeholder names and kinds are erased cannot both be registered.

use std::fmt;

use miette::Diagnostic;
use thiserror::Error;

use crate::dispatch::{StepError, StepWorld};
use crate::pattern::{Bindings, StepTemplate, TemplateError};
use crate::step::Phase;

/// Boxed step body.
pub type StepHandler = Box<dyn Fn(&mut StepWorld<'_>) -> Result<(), StepError> + Send + Sync>;

/// Errors raised while registering a step.
#[derive(Debug, Error, Diagnostic)]
pub enum RegistrationError {
    /// The template text is malformed.
    #[error(transparent)]
    #[diagnostic(transparent)]
    InvalidTemplate(#[from] TemplateError),
    /// A structurally identical template already exists in the phase.
    #[error("{phase} step '{template}' duplicates '{existing}'")]
    #[diagnostic(
        code(scenarist::registry::duplicate_template),
        help("templates that differ only in placeholder names or kinds are identical")
    )]
    DuplicateTemplate {
        /// Phase both templates belong to.
        phase: Phase,
        /// Template being registered.
        template: String,
        /// Template already registered.
        existing: String,
    },
    /// The documented example does not match its own template.
    #[error("example '{example}' does not match {phase} step '{template}'")]
    #[diagnostic(code(scenarist::registry::example_mismatch))]
    ExampleMismatch {
        /// Phase of the template.
        phase: Phase,
        /// Template text.
        template: String,
        /// Example text.
        example: String,
    },
}

/// No template of a phase matches the step text.
#[derive(Debug, Clone, PartialEq, Eq, Error, Diagnostic)]
#[error("no {phase} step matches '{text}'")]
#[diagnostic(
    code(scenarist::registry::undefined_step),
    help("run `scenarist steps` to list the available steps")
)]
pub struct NoMatch {
    /// Phase that was searched.
    pub phase: Phase,
    /// Trimmed step text.
    pub text: String,
}

/// A registered template with its handler and declared inputs.
pub struct StepDefinition {
    phase: Phase,
    template: StepTemplate,
    needs: Vec<String>,
    reads: Vec<String>,
    example: Option<String>,
    handler: StepHandler,
}

impl StepDefinition {
    /// Phase the template is registered under.
    #[must_use]
    pub const fn phase(&self) -> Phase {
        self.phase
    }

    /// Compiled template.
    #[must_use]
    pub const fn template(&self) -> &StepTemplate {
        &self.template
    }

    /// Fixtures resolved before the handler runs.
    #[must_use]
    pub fn needs(&self) -> &[String] {
        &self.needs
    }

    /// Context keys that must be present before the handler runs.
    #[must_use]
    pub fn reads(&self) -> &[String] {
        &self.reads
    }

    /// Literal example text, if documented.
    #[must_use]
    pub fn example(&self) -> Option<&str> {
        self.example.as_deref()
    }

    pub(crate) fn call(&self, world: &mut StepWorld<'_>) -> Result<(), StepError> {
        (self.handler)(world)
    }
}

impl fmt::Debug for StepDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StepDefinition")
            .field("phase", &self.phase)
            .field("template", &self.template.as_str())
            .field("needs", &self.needs)
            .field("reads", &self.reads)
            .finish_non_exhaustive()
    }
}

/// A step instance matched to a definition.
#[derive(Debug)]
pub struct BoundStep<'r> {
    definition: &'r StepDefinition,
    bindings: Bindings,
}

impl<'r> BoundStep<'r> {
    /// The matched definition.
    #[must_use]
    pub const fn definition(&self) -> &'r StepDefinition {
        self.definition
    }

    /// Converted placeholder values.
    #[must_use]
    pub const fn bindings(&self) -> &Bindings {
        &self.bindings
    }
}

/// Registered steps, grouped by phase.
#[derive(Debug, Default)]
pub struct StepRegistry {
    given: Vec<StepDefinition>,
    when: Vec<StepDefinition>,
    then: Vec<StepDefinition>,
}

impl StepRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Start registering a `Given` step.
    pub fn given(&mut self, template: &str) -> StepBuilder<'_> {
        self.step(Phase::Given, template)
    }

    /// Start registering a `When` step.
    pub fn when(&mut self, template: &str) -> StepBuilder<'_> {
        self.step(Phase::When, template)
    }

    /// Start registering a `Then` step.
    pub fn then(&mut self, template: &str) -> StepBuilder<'_> {
        self.step(Phase::Then, template)
    }

    /// Start registering a step under `phase`.
    pub fn step(&mut self, phase: Phase, template: &str) -> StepBuilder<'_> {
        StepBuilder {
            registry: self,
            phase,
            template: template.to_owned(),
            needs: Vec::new(),
            reads: Vec::new(),
            example: None,
        }
    }

    /// Register a handler with no declared inputs.
    ///
    /// # Errors
    ///
    /// See [`StepBuilder::run`].
    pub fn register<F>(&mut self, phase: Phase, template: &str, handler: F) -> Result<(), RegistrationError>
    where
        F: Fn(&mut StepWorld<'_>) -> Result<(), StepError> + Send + Sync + 'static,
    {
        self.step(phase, template).run(handler)
    }

    /// Find the first definition of `phase` matching `text`.
    ///
    /// # Errors
    ///
    /// Returns [`NoMatch`] when no template aligns and converts.
    pub fn find(&self, phase: Phase, text: &str) -> Result<BoundStep<'_>, NoMatch> {
        let trimmed = text.trim();
        self.bucket(phase)
            .iter()
            .find_map(|definition| {
                definition
                    .template
                    .match_text(trimmed)
                    .map(|bindings| BoundStep {
                        definition,
                        bindings,
                    })
            })
            .ok_or_else(|| NoMatch {
                phase,
                text: trimmed.to_owned(),
            })
    }

    /// Definitions of `phase` in registration order.
    #[must_use]
    pub fn phase(&self, phase: Phase) -> &[StepDefinition] {
        self.bucket(phase)
    }

    /// Every definition, `Given` first, then `When`, then `Then`.
    pub fn definitions(&self) -> impl Iterator<Item = &StepDefinition> {
        self.given.iter().chain(&self.when).chain(&self.then)
    }

    /// Total number of definitions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.given.len() + self.when.len() + self.then.len()
    }

    /// Whether nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    const fn bucket(&self, phase: Phase) -> &Vec<StepDefinition> {
        match phase {
            Phase::Given => &self.given,
            Phase::When => &self.when,
            Phase::Then => &self.then,
        }
    }

    const fn bucket_mut(&mut self, phase: Phase) -> &mut Vec<StepDefinition> {
        match phase {
            Phase::Given => &mut self.given,
            Phase::When => &mut self.when,
            Phase::Then => &mut self.then,
        }
    }

    fn insert(&mut self, definition: StepDefinition) -> Result<(), RegistrationError> {
        let skeleton = definition.template.skeleton();
        let phase = definition.phase;
        if let Some(existing) = self
            .bucket(phase)
            .iter()
            .find(|other| other.template.skeleton() == skeleton)
        {
            return Err(RegistrationError::DuplicateTemplate {
                phase,
                template: definition.template.as_str().to_owned(),
                existing: existing.template.as_str().to_owned(),
            });
        }
        tracing::debug!(%phase, template = %definition.template, "step registered");
        self.bucket_mut(phase).push(definition);
        Ok(())
    }
}

/// Builder returned by [`StepRegistry::given`] and friends.
#[must_use = "call `run` to register the step"]
pub struct StepBuilder<'r> {
    registry: &'r mut StepRegistry,
    phase: Phase,
    template: String,
    needs: Vec<String>,
    reads: Vec<String>,
    example: Option<String>,
}

impl StepBuilder<'_> {
    /// Declare fixtures the handler uses.
    pub fn needs(mut self, fixtures: &[&str]) -> Self {
        self.needs.extend(fixtures.iter().map(|name| (*name).to_owned()));
        self
    }

    /// Declare context keys that earlier steps must have written.
    pub fn reads(mut self, keys: &[&str]) -> Self {
        self.reads.extend(keys.iter().map(|key| (*key).to_owned()));
        self
    }

    /// Document a literal example of the step text.
    pub fn example(mut self, text: &str) -> Self {
        self.example = Some(text.to_owned());
        self
    }

    /// Compile the template and register `handler`.
    ///
    /// # Errors
    ///
    /// Returns [`RegistrationError`] when the template is malformed,
    /// duplicates an existing skeleton in the phase, or its example does not
    /// match.
    pub fn run<F>(self, handler: F) -> Result<(), RegistrationError>
    where
        F: Fn(&mut StepWorld<'_>) -> Result<(), StepError> + Send + Sync + 'static,
    {
        let template = StepTemplate::parse(&self.template)?;
        if let Some(example) = &self.example {
            if template.match_text(example).is_none() {
                return Err(RegistrationError::ExampleMismatch {
                    phase: self.phase,
                    template: self.template,
                    example: example.clone(),
                });
            }
        }
        self.registry.insert(StepDefinition {
            phase: self.phase,
            template,
            needs: self.needs,
            reads: self.reads,
            example: self.example,
            handler: Box::new(handler),
        })
    }
}
