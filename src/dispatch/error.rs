//! Errors returned by step handlers.

use std::fmt;

use thiserror::Error;

use crate::context::ContextError;
use crate::fixture::FixtureError;
use crate::pattern::BindingError;
use crate::platform::GatewayError;

/// Failure raised by a step body.
#[derive(Debug, Error)]
pub enum StepError {
    /// A verification did not hold.
    #[error("{0}")]
    Assertion(String),
    /// The platform gateway failed.
    #[error(transparent)]
    Gateway(#[from] GatewayError),
    /// A context read failed.
    #[error(transparent)]
    Context(#[from] ContextError),
    /// A placeholder lookup failed.
    #[error(transparent)]
    Binding(#[from] BindingError),
    /// A fixture lookup failed.
    #[error(transparent)]
    Fixture(#[from] FixtureError),
    /// A declared context read was absent when the step started.
    #[error("context key '{key}' must be written by an earlier step")]
    MissingRead {
        /// The missing key.
        key: String,
    },
    /// Any other error.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl StepError {
    /// Build an assertion failure.
    pub fn assertion(message: impl fmt::Display) -> Self {
        Self::Assertion(message.to_string())
    }
}

/// Fail with an assertion unless `condition` holds.
///
/// The message is only built on failure.
///
/// # Errors
///
/// Returns [`StepError::Assertion`] when `condition` is false.
pub fn ensure<M, F>(condition: bool, message: F) -> Result<(), StepError>
where
    M: fmt::Display,
    F: FnOnce() -> M,
{
    if condition {
        Ok(())
    } else {
        Err(StepError::assertion(message()))
    }
}
