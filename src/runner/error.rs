//! Error types for the runner module.

// miette's derive trips `unused_assignments` on some toolchains only, so
// `#[expect]` cannot be used here.
#![allow(
    clippy::allow_attributes,
    clippy::allow_attributes_without_reason,
    unused_assignments
)]

use std::io;
use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

use crate::config::ConfigError;
use crate::registry::RegistrationError;
use crate::suite::SuiteError;

/// Errors raised during command execution.
#[derive(Debug, Error, Diagnostic)]
pub enum RunnerError {
    /// Configuration could not be loaded.
    #[error(transparent)]
    #[diagnostic(transparent)]
    Config(#[from] ConfigError),
    /// The step vocabulary failed to register.
    #[error(transparent)]
    #[diagnostic(transparent)]
    Registration(#[from] RegistrationError),
    /// A suite could not be loaded.
    #[error(transparent)]
    #[diagnostic(transparent)]
    Suite(#[from] SuiteError),
    /// A suite directory could not be walked.
    #[error("failed to search {} for suites", path.display())]
    #[diagnostic(code(scenarist::runner::discover))]
    Discover {
        /// Directory being searched.
        path: PathBuf,
        /// Underlying walk error.
        #[source]
        source: walkdir::Error,
    },
    /// Writing the report failed.
    #[error("failed to write output")]
    #[diagnostic(code(scenarist::runner::output))]
    Output(#[from] io::Error),
    /// Suites contain steps no template matches.
    #[error("{count} undefined step(s)")]
    #[diagnostic(
        code(scenarist::runner::undefined_steps),
        help("run `scenarist steps` to list the available templates")
    )]
    UndefinedSteps {
        /// Number of unmatched step lines.
        count: usize,
    },
}
