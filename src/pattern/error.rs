//! Errors raised while parsing step templates.

use miette::Diagnostic;
use thiserror::Error;

/// A step template could not be parsed.
#[derive(Debug, Error, Diagnostic)]
pub enum TemplateError {
    /// A `{` was never closed.
    #[error("unclosed placeholder at byte {position} in template '{template}'")]
    #[diagnostic(code(scenarist::pattern::unclosed))]
    UnclosedPlaceholder {
        /// Offending template.
        template: String,
        /// Byte offset of the opening brace.
        position: usize,
    },
    /// A `}` appeared without an opening brace.
    #[error("stray '}}' at byte {position} in template '{template}'")]
    #[diagnostic(
        code(scenarist::pattern::stray_brace),
        help("write '}}}}' for a literal closing brace")
    )]
    StrayBrace {
        /// Offending template.
        template: String,
        /// Byte offset of the brace.
        position: usize,
    },
    /// The placeholder name is empty or not an identifier.
    #[error("invalid placeholder name '{name}' at byte {position} in template '{template}'")]
    #[diagnostic(code(scenarist::pattern::invalid_name))]
    InvalidPlaceholderName {
        /// Offending template.
        template: String,
        /// Byte offset of the opening brace.
        position: usize,
        /// Name as written.
        name: String,
    },
    /// The type hint is not one of `str`, `int` or `float`.
    #[error("unknown placeholder type '{hint}' for '{name}' in template '{template}'")]
    #[diagnostic(
        code(scenarist::pattern::unknown_kind),
        help("supported types are str (s), int (d) and float (f)")
    )]
    UnknownPlaceholderKind {
        /// Offending template.
        template: String,
        /// Placeholder name.
        name: String,
        /// Type hint as written.
        hint: String,
    },
    /// Two placeholders share a name.
    #[error("placeholder '{name}' appears more than once in template '{template}'")]
    #[diagnostic(code(scenarist::pattern::duplicate_placeholder))]
    DuplicatePlaceholder {
        /// Offending template.
        template: String,
        /// Repeated name.
        name: String,
    },
    /// The generated matcher failed to compile.
    #[error("template '{template}' produced an invalid matcher")]
    #[diagnostic(code(scenarist::pattern::regex))]
    Regex {
        /// Offending template.
        template: String,
        /// Underlying regex error.
        #[source]
        source: regex::Error,
    },
}
