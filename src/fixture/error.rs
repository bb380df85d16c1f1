//! Fixture declaration and resolution errors.

use itertools::Itertools;
use miette::Diagnostic;
use thiserror::Error;

use super::Scope;

/// Boxed error produced by a fixture factory.
pub type FactoryError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors raised while declaring, validating or resolving fixtures.
#[derive(Debug, Error, Diagnostic)]
pub enum FixtureError {
    /// A fixture with this name already exists.
    #[error("fixture '{name}' is declared more than once")]
    #[diagnostic(code(scenarist::fixture::duplicate))]
    Duplicate {
        /// Fixture name.
        name: String,
    },
    /// No fixture with this name was declared.
    #[error("fixture '{name}' is not declared")]
    #[diagnostic(code(scenarist::fixture::unknown))]
    Unknown {
        /// Fixture name.
        name: String,
    },
    /// A declared dependency names an undeclared fixture.
    #[error("fixture '{fixture}' depends on undeclared fixture '{dependency}'")]
    #[diagnostic(code(scenarist::fixture::unknown_dependency))]
    UnknownDependency {
        /// Dependent fixture.
        fixture: String,
        /// Missing dependency.
        dependency: String,
    },
    /// Fixtures depend on each other in a loop.
    #[error("fixture dependency cycle: {}", cycle.iter().join(" -> "))]
    #[diagnostic(
        code(scenarist::fixture::cycle),
        help("break the cycle by removing one of the listed dependencies")
    )]
    Cycle {
        /// Closed cycle, first and last entries equal.
        cycle: Vec<String>,
    },
    /// A longer-lived fixture depends on a shorter-lived one.
    #[error("{scope} fixture '{fixture}' cannot depend on {dependency_scope} fixture '{dependency}'")]
    #[diagnostic(code(scenarist::fixture::scope_mismatch))]
    ScopeMismatch {
        /// Dependent fixture.
        fixture: String,
        /// Scope of the dependent fixture.
        scope: Scope,
        /// Dependency name.
        dependency: String,
        /// Scope of the dependency.
        dependency_scope: Scope,
    },
    /// The factory failed.
    #[error("fixture '{name}' failed to set up: {source}")]
    #[diagnostic(code(scenarist::fixture::setup))]
    Setup {
        /// Fixture name.
        name: String,
        /// Factory error.
        #[source]
        source: FactoryError,
    },
    /// A value was requested with a type other than the factory's.
    #[error("fixture '{name}' holds {actual}, not {requested}")]
    #[diagnostic(code(scenarist::fixture::type_mismatch))]
    TypeMismatch {
        /// Fixture name.
        name: String,
        /// Type produced by the factory.
        actual: &'static str,
        /// Type the caller asked for.
        requested: &'static str,
    },
    /// A factory or step used a fixture it did not declare.
    #[error("'{requester}' did not declare a dependency on fixture '{name}'")]
    #[diagnostic(
        code(scenarist::fixture::undeclared),
        help("add the fixture to the dependency list at registration time")
    )]
    Undeclared {
        /// Fixture or step that asked.
        requester: String,
        /// Fixture name.
        name: String,
    },
}
