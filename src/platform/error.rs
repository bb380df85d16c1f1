//! Errors reported by a platform gateway.

use std::time::Duration;

use miette::Diagnostic;
use thiserror::Error;

/// Failure of a platform operation. Messages are kept verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Error, Diagnostic)]
pub enum GatewayError {
    /// The named object does not exist.
    #[error("{kind} '{name}' not found in namespace '{namespace}'")]
    #[diagnostic(code(scenarist::platform::not_found))]
    NotFound {
        /// Object kind, such as `deployment`.
        kind: String,
        /// Object name.
        name: String,
        /// Namespace searched.
        namespace: String,
    },
    /// A convergence wait ran out of time.
    #[error("{operation} did not converge within {}s", timeout.as_secs())]
    #[diagnostic(code(scenarist::platform::timeout))]
    Timeout {
        /// Operation that was waiting.
        operation: String,
        /// Time allowed.
        timeout: Duration,
    },
    /// Any other platform failure.
    #[error("{message}")]
    #[diagnostic(code(scenarist::platform::api))]
    Api {
        /// Message from the platform.
        message: String,
    },
}

impl GatewayError {
    /// Build a [`GatewayError::NotFound`].
    pub fn not_found(kind: &str, name: &str, namespace: &str) -> Self {
        Self::NotFound {
            kind: kind.to_owned(),
            name: name.to_owned(),
            namespace: namespace.to_owned(),
        }
    }

    /// Build a [`GatewayError::Api`].
    pub fn api(message: impl Into<String>) -> Self {
        Self::Api {
            message: message.into(),
        }
    }
}
