//! Scenario and step instances.
//!
//! A [`Scenario`] owns its ordered [`StepInstance`]s. Conjunction keywords
//! (`And`, `But`) take the phase of the preceding concrete step when the
//! scenario is built, so every instance carries a resolved [`Phase`].

use std::fmt;
use std::str::FromStr;

use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Phase a step template is registered under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Phase {
    /// Preconditions.
    Given,
    /// Actions.
    When,
    /// Verifications.
    Then,
}

impl Phase {
    /// All phases in declaration order.
    pub const ALL: [Self; 3] = [Self::Given, Self::When, Self::Then];

    /// Keyword text for the phase.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Given => "Given",
            Self::When => "When",
            Self::Then => "Then",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Keyword as written in the scenario.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Keyword {
    /// `Given`.
    Given,
    /// `When`.
    When,
    /// `Then`.
    Then,
    /// `And`, continuing the previous phase.
    And,
    /// `But`, continuing the previous phase.
    But,
}

impl Keyword {
    /// The phase this keyword names directly, or `None` for conjunctions.
    #[must_use]
    pub const fn phase(self) -> Option<Phase> {
        match self {
            Self::Given => Some(Phase::Given),
            Self::When => Some(Phase::When),
            Self::Then => Some(Phase::Then),
            Self::And | Self::But => None,
        }
    }

    /// Keyword text.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Given => "Given",
            Self::When => "When",
            Self::Then => "Then",
            Self::And => "And",
            Self::But => "But",
        }
    }
}

impl fmt::Display for Keyword {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Keyword {
    type Err = ScenarioError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Given" => Ok(Self::Given),
            "When" => Ok(Self::When),
            "Then" => Ok(Self::Then),
            "And" => Ok(Self::And),
            "But" => Ok(Self::But),
            other => Err(ScenarioError::UnknownKeyword {
                line: other.to_owned(),
            }),
        }
    }
}

/// Errors raised while assembling a scenario.
#[derive(Debug, Error, Diagnostic, PartialEq, Eq)]
pub enum ScenarioError {
    /// The first step is `And` or `But`.
    #[error("scenario '{scenario}' starts with '{keyword}', which has no phase to continue")]
    #[diagnostic(code(scenarist::scenario::leading_conjunction))]
    LeadingConjunction {
        /// Scenario name.
        scenario: String,
        /// The offending keyword.
        keyword: Keyword,
    },
    /// A step has no text after its keyword.
    #[error("step {index} of scenario '{scenario}' has no text")]
    #[diagnostic(code(scenarist::scenario::empty_step))]
    EmptyStep {
        /// Scenario name.
        scenario: String,
        /// Zero-based step index.
        index: usize,
    },
    /// A step line does not start with a known keyword.
    #[error("'{line}' does not start with Given, When, Then, And or But")]
    #[diagnostic(code(scenarist::scenario::unknown_keyword))]
    UnknownKeyword {
        /// The offending line.
        line: String,
    },
}

/// One step of a scenario with its phase resolved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StepInstance {
    keyword: Keyword,
    phase: Phase,
    text: String,
    index: usize,
}

impl StepInstance {
    /// Keyword as written.
    #[must_use]
    pub const fn keyword(&self) -> Keyword {
        self.keyword
    }

    /// Resolved phase.
    #[must_use]
    pub const fn phase(&self) -> Phase {
        self.phase
    }

    /// Step text without the keyword.
    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Zero-based position within the owning scenario.
    #[must_use]
    pub const fn index(&self) -> usize {
        self.index
    }
}

impl fmt::Display for StepInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.keyword, self.text)
    }
}

/// An ordered sequence of steps sharing one context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Scenario {
    name: String,
    feature: Option<String>,
    steps: Vec<StepInstance>,
}

impl Scenario {
    /// Start building a scenario called `name`.
    #[must_use]
    pub fn builder(name: impl Into<String>) -> ScenarioBuilder {
        ScenarioBuilder {
            name: name.into(),
            feature: None,
            steps: Vec::new(),
        }
    }

    /// Build a scenario from keyword-prefixed lines such as
    /// `When I get service "db" in namespace "ns"`.
    ///
    /// # Errors
    ///
    /// Returns [`ScenarioError`] for unknown keywords, empty steps or a
    /// leading conjunction.
    pub fn from_lines<I, S>(name: impl Into<String>, lines: I) -> Result<Self, ScenarioError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut builder = Self::builder(name);
        for line in lines {
            let (keyword, text) = split_keyword(line.as_ref())?;
            builder = builder.step(keyword, text);
        }
        builder.build()
    }

    /// Scenario name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Name of the feature the scenario belongs to, if known.
    #[must_use]
    pub fn feature(&self) -> Option<&str> {
        self.feature.as_deref()
    }

    /// Steps in declared order.
    #[must_use]
    pub fn steps(&self) -> &[StepInstance] {
        &self.steps
    }
}

/// Split a step line into its keyword and trimmed text.
///
/// # Errors
///
/// Returns [`ScenarioError::UnknownKeyword`] when the line has no keyword.
pub fn split_keyword(line: &str) -> Result<(Keyword, &str), ScenarioError> {
    let trimmed = line.trim();
    let (head, rest) = trimmed.split_once(char::is_whitespace).unwrap_or((trimmed, ""));
    let keyword = head
        .parse::<Keyword>()
        .map_err(|_| ScenarioError::UnknownKeyword {
            line: trimmed.to_owned(),
        })?;
    Ok((keyword, rest.trim()))
}

/// Incremental [`Scenario`] construction.
#[derive(Debug, Clone)]
pub struct ScenarioBuilder {
    name: String,
    feature: Option<String>,
    steps: Vec<(Keyword, String)>,
}

impl ScenarioBuilder {
    /// Record the owning feature name.
    #[must_use]
    pub fn feature(mut self, feature: impl Into<String>) -> Self {
        self.feature = Some(feature.into());
        self
    }

    /// Append a step with an explicit keyword.
    #[must_use]
    pub fn step(mut self, keyword: Keyword, text: impl Into<String>) -> Self {
        self.steps.push((keyword, text.into()));
        self
    }

    /// Append a `Given` step.
    #[must_use]
    pub fn given(self, text: impl Into<String>) -> Self {
        self.step(Keyword::Given, text)
    }

    /// Append a `When` step.
    #[must_use]
    pub fn when(self, text: impl Into<String>) -> Self {
        self.step(Keyword::When, text)
    }

    /// Append a `Then` step.
    #[must_use]
    pub fn then(self, text: impl Into<String>) -> Self {
        self.step(Keyword::Then, text)
    }

    /// Append an `And` step.
    #[must_use]
    pub fn and(self, text: impl Into<String>) -> Self {
        self.step(Keyword::And, text)
    }

    /// Append a `But` step.
    #[must_use]
    pub fn but(self, text: impl Into<String>) -> Self {
        self.step(Keyword::But, text)
    }

    /// Resolve phases and freeze the scenario.
    ///
    /// # Errors
    ///
    /// Returns [`ScenarioError`] when a step is empty or the first step is a
    /// conjunction.
    pub fn build(self) -> Result<Scenario, ScenarioError> {
        let mut current: Option<Phase> = None;
        let mut steps = Vec::with_capacity(self.steps.len());
        for (index, (keyword, text)) in self.steps.into_iter().enumerate() {
            let text = text.trim().to_owned();
            if text.is_empty() {
                return Err(ScenarioError::EmptyStep {
                    scenario: self.name,
                    index,
                });
            }
            let phase = match (keyword.phase(), current) {
                (Some(phase), _) | (None, Some(phase)) => phase,
                (None, None) => {
                    return Err(ScenarioError::LeadingConjunction {
                        scenario: self.name,
                        keyword,
                    });
                }
            };
            current = Some(phase);
            steps.push(StepInstance {
                keyword,
                phase,
                text,
                index,
            });
        }
        Ok(Scenario {
            name: self.name,
            feature: self.feature,
            steps,
        })
    }
}
