//! Suite files: scenarios written as YAML.
//!
//! A suite names one feature, an optional background whose steps run before
//! every scenario, and the scenarios themselves:
//!
//! ```yaml
//! feature: Service checks
//! background:
//!   - Given Kubernetes cluster is available
//! scenarios:
//!   - name: Elasticsearch service exposes its port
//!     steps:
//!       - When I get service "elasticsearch" in namespace "search"
//!       - Then service should have port 9200
//! ```

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use miette::Diagnostic;
use serde::Deserialize;
use thiserror::Error;

use crate::step::{Scenario, ScenarioError, split_keyword};

mod diagnostics;
mod hints;

pub use diagnostics::map_yaml_error;

/// Errors raised while loading a suite.
#[derive(Debug, Error, Diagnostic)]
pub enum SuiteError {
    /// The file could not be read.
    #[error("failed to read suite {}", path.display())]
    #[diagnostic(code(scenarist::suite::read))]
    Read {
        /// Suite path.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },
    /// The YAML did not describe a suite.
    #[error("failed to parse suite {name}")]
    #[diagnostic(code(scenarist::suite::parse))]
    Parse {
        /// Suite name used in diagnostics.
        name: String,
        /// Spanned parser diagnostic.
        #[source]
        #[diagnostic_source]
        source: Box<dyn Diagnostic + Send + Sync + 'static>,
    },
    /// A scenario's steps are malformed.
    #[error("invalid scenario in suite {name}")]
    #[diagnostic(code(scenarist::suite::scenario))]
    Scenario {
        /// Suite name used in diagnostics.
        name: String,
        /// What was wrong with the scenario.
        #[source]
        #[diagnostic_source]
        source: ScenarioError,
    },
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct SuiteDocument {
    feature: String,
    #[serde(default)]
    background: Vec<String>,
    scenarios: Vec<ScenarioDocument>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ScenarioDocument {
    name: String,
    steps: Vec<String>,
}

/// A parsed suite.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Suite {
    name: String,
    feature: String,
    scenarios: Vec<Scenario>,
}

impl Suite {
    /// Parse `src`, naming it `name` in diagnostics.
    ///
    /// # Errors
    ///
    /// Returns [`SuiteError::Parse`] for malformed YAML and
    /// [`SuiteError::Scenario`] for step lines without a keyword.
    pub fn parse(src: &str, name: &str) -> Result<Self, SuiteError> {
        let document: SuiteDocument =
            serde_saphyr::from_str(src).map_err(|err| SuiteError::Parse {
                name: name.to_owned(),
                source: map_yaml_error(err, src, name),
            })?;
        let scenarios = document
            .scenarios
            .iter()
            .map(|entry| build_scenario(&document, entry))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|source| SuiteError::Scenario {
                name: name.to_owned(),
                source,
            })?;
        tracing::debug!(suite = name, scenarios = scenarios.len(), "suite loaded");
        Ok(Self {
            name: name.to_owned(),
            feature: document.feature,
            scenarios,
        })
    }

    /// Read and parse the suite at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`SuiteError::Read`] when the file is unreadable, otherwise
    /// as [`Suite::parse`].
    pub fn from_path(path: &Path) -> Result<Self, SuiteError> {
        let src = fs::read_to_string(path).map_err(|source| SuiteError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&src, &path.display().to_string())
    }

    /// Name used in diagnostics, usually the file path.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Feature title.
    #[must_use]
    pub fn feature(&self) -> &str {
        &self.feature
    }

    /// Scenarios with the background already prepended.
    #[must_use]
    pub fn scenarios(&self) -> &[Scenario] {
        &self.scenarios
    }
}

fn build_scenario(
    document: &SuiteDocument,
    entry: &ScenarioDocument,
) -> Result<Scenario, ScenarioError> {
    let mut builder = Scenario::builder(entry.name.as_str()).feature(document.feature.as_str());
    for line in document.background.iter().chain(&entry.steps) {
        let (keyword, text) = split_keyword(line)?;
        builder = builder.step(keyword, text);
    }
    builder.build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::step::Phase;
    use rstest::rstest;

    const SUITE: &str = r#"
feature: Deployment scaling
background:
  - Given Kubernetes cluster is available
scenarios:
  - name: Scale up
    steps:
      - When I scale up deployment "web" in namespace "shop"
      - Then deployment should have more replicas
  - name: Scale down
    steps:
      - When I scale down deployment "web" in namespace "shop"
      - And I get active deployments count for service "web" in namespace "shop"
      - Then deployment should have fewer replicas
"#;

    #[rstest]
    fn background_runs_before_each_scenario() {
        let suite = Suite::parse(SUITE, "scaling.yaml").expect("suite");
        assert_eq!(suite.feature(), "Deployment scaling");
        let [up, down] = suite.scenarios() else {
            panic!("expected two scenarios");
        };
        for scenario in [up, down] {
            let first = scenario.steps().first().expect("steps");
            assert_eq!(first.text(), "Kubernetes cluster is available");
            assert_eq!(scenario.feature(), Some("Deployment scaling"));
        }
        assert_eq!(down.steps().len(), 4);
    }

    #[rstest]
    fn conjunctions_inherit_the_previous_phase() {
        let suite = Suite::parse(SUITE, "scaling.yaml").expect("suite");
        let down = suite.scenarios().get(1).expect("second scenario");
        let phases: Vec<Phase> = down.steps().iter().map(|s| s.phase()).collect();
        assert_eq!(
            phases,
            [Phase::Given, Phase::When, Phase::When, Phase::Then]
        );
    }

    #[rstest]
    fn step_without_keyword_is_rejected() {
        let src = "feature: f\nscenarios:\n  - name: s\n    steps:\n      - scale up\n";
        let err = Suite::parse(src, "bad.yaml").expect_err("invalid scenario");
        assert!(matches!(
            err,
            SuiteError::Scenario {
                source: ScenarioError::UnknownKeyword { .. },
                ..
            }
        ));
    }

    #[rstest]
    #[case("feature: f\nscenarios: [\n")]
    #[case("feature: f\nsteps: []\nscenarios: []\n")]
    #[case("scenarios: []\n")]
    fn malformed_documents_are_parse_errors(#[case] src: &str) {
        let err = Suite::parse(src, "bad.yaml").expect_err("parse error");
        assert!(matches!(err, SuiteError::Parse { .. }), "{err:?}");
    }

    #[rstest]
    fn missing_file_reports_its_path() {
        let err = Suite::from_path(Path::new("/nonexistent/suite.yaml")).expect_err("read error");
        assert_eq!(err.to_string(), "failed to read suite /nonexistent/suite.yaml");
    }
}
