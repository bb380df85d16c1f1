//! Step template parsing and matching.
//!
//! A [`StepTemplate`] is an ordered sequence of literal text and typed
//! placeholders such as `I set replicas to {count:int} for deployment
//! "{name}"`. Templates compile to anchored regular expressions; the captured
//! text is then converted to the placeholder's [`PlaceholderKind`]. A
//! conversion failure is a non-match, never an error.
//!
//! ```
//! use scenarist::pattern::{ParamValue, StepTemplate};
//!
//! let template = StepTemplate::parse(
//!     r#"I set replicas to {count:int} for deployment "{name:str}""#,
//! )
//! .expect("valid template");
//! let bindings = template
//!     .match_text(r#"I set replicas to 3 for deployment "my-app""#)
//!     .expect("matches");
//! assert_eq!(bindings.get("count"), Some(&ParamValue::Int(3)));
//! assert!(template
//!     .match_text(r#"I set replicas to abc for deployment "my-app""#)
//!     .is_none());
//! ```

mod bindings;
mod compile;
mod error;

pub use bindings::{BindingError, Bindings, ParamValue};
pub use error::TemplateError;

use regex::Regex;
use std::fmt;

/// Type of value a placeholder accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PlaceholderKind {
    /// Any non-empty text.
    Str,
    /// A signed 64-bit integer.
    Int,
    /// A 64-bit float.
    Float,
}

impl PlaceholderKind {
    /// Resolve a type hint such as `int` or `d` to a kind.
    ///
    /// A missing hint means [`PlaceholderKind::Str`].
    #[must_use]
    pub fn from_hint(hint: Option<&str>) -> Option<Self> {
        match hint {
            None | Some("str" | "s" | "string") => Some(Self::Str),
            Some("int" | "d" | "i64") => Some(Self::Int),
            Some("float" | "f" | "f64") => Some(Self::Float),
            Some(_) => None,
        }
    }

    /// Name used in diagnostics.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Str => "str",
            Self::Int => "int",
            Self::Float => "float",
        }
    }

    pub(crate) const fn capture_pattern(self) -> &'static str {
        match self {
            Self::Str => r".+?",
            Self::Int => r"[+-]?\d+",
            Self::Float => r"(?i:[+-]?(?:\d+\.\d*|\.\d+|\d+)(?:e[+-]?\d+)?|nan|inf|infinity)",
        }
    }

    pub(crate) fn convert(self, raw: &str) -> Option<ParamValue> {
        match self {
            Self::Str => Some(ParamValue::Str(raw.to_owned())),
            Self::Int => raw.parse().ok().map(ParamValue::Int),
            Self::Float => raw.parse().ok().map(ParamValue::Float),
        }
    }
}

impl fmt::Display for PlaceholderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One element of a parsed template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    /// Text that must appear verbatim.
    Literal(String),
    /// A typed slot bound to a name.
    Placeholder {
        /// Binding name.
        name: String,
        /// Accepted value type.
        kind: PlaceholderKind,
    },
}

/// Token sequence with placeholder names and kinds erased.
///
/// Two templates with equal skeletons are structurally identical and cannot
/// coexist within one phase.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Skeleton(Vec<SkeletonToken>);

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum SkeletonToken {
    Literal(String),
    Slot,
}

impl Skeleton {
    /// Number of placeholder slots.
    #[must_use]
    pub fn arity(&self) -> usize {
        self.0
            .iter()
            .filter(|token| matches!(token, SkeletonToken::Slot))
            .count()
    }
}

/// A compiled step template.
#[derive(Debug, Clone)]
pub struct StepTemplate {
    source: String,
    tokens: Vec<Token>,
    regex: Regex,
}

impl StepTemplate {
    /// Parse and compile `source`.
    ///
    /// # Errors
    ///
    /// Returns [`TemplateError`] when a placeholder is malformed, uses an
    /// unknown type hint or repeats a name.
    pub fn parse(source: &str) -> Result<Self, TemplateError> {
        let tokens = compile::tokenize(source)?;
        let regex = compile::to_regex(source, &tokens)?;
        Ok(Self {
            source: source.to_owned(),
            tokens,
            regex,
        })
    }

    /// Original template text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Parsed tokens in order.
    #[must_use]
    pub fn tokens(&self) -> &[Token] {
        &self.tokens
    }

    /// Placeholder names and kinds in order of appearance.
    pub fn placeholders(&self) -> impl Iterator<Item = (&str, PlaceholderKind)> {
        self.tokens.iter().filter_map(|token| match token {
            Token::Placeholder { name, kind } => Some((name.as_str(), *kind)),
            Token::Literal(_) => None,
        })
    }

    /// The structural skeleton used for duplicate detection.
    #[must_use]
    pub fn skeleton(&self) -> Skeleton {
        Skeleton(
            self.tokens
                .iter()
                .map(|token| match token {
                    Token::Literal(text) => SkeletonToken::Literal(text.clone()),
                    Token::Placeholder { .. } => SkeletonToken::Slot,
                })
                .collect(),
        )
    }

    /// Match `text` against the template and convert every placeholder.
    ///
    /// Returns `None` when the literals do not align or any placeholder fails
    /// to convert to its kind.
    #[must_use]
    pub fn match_text(&self, text: &str) -> Option<Bindings> {
        let captures = self.regex.captures(text)?;
        let mut bindings = Bindings::default();
        for (index, (name, kind)) in self.placeholders().enumerate() {
            let raw = captures.get(index + 1)?.as_str();
            bindings.insert(name, kind.convert(raw)?);
        }
        Some(bindings)
    }
}

impl fmt::Display for StepTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn template(source: &str) -> StepTemplate {
        StepTemplate::parse(source).expect("valid template")
    }

    #[rstest]
    fn binds_typed_placeholders() {
        let tmpl = template(r#"I set replicas to {count:int} for deployment "{name:str}""#);
        let bindings = tmpl
            .match_text(r#"I set replicas to 3 for deployment "my-app""#)
            .expect("match");
        assert_eq!(bindings.int("count").expect("count"), 3);
        assert_eq!(bindings.str("name").expect("name"), "my-app");
    }

    #[rstest]
    #[case("I set replicas to abc for deployment \"my-app\"")]
    #[case("I set replicas to 99999999999999999999 for deployment \"my-app\"")]
    #[case("I set replicas to 3 for deployment my-app")]
    fn rejects_unconvertible_or_misaligned_text(#[case] text: &str) {
        let tmpl = template(r#"I set replicas to {count:int} for deployment "{name:str}""#);
        assert!(tmpl.match_text(text).is_none(), "unexpected match: {text}");
    }

    #[rstest]
    fn literal_only_template_matches_exactly() {
        let tmpl = template("all replicas should be ready");
        assert!(tmpl.match_text("all replicas should be ready").is_some());
        assert!(tmpl.match_text("all replicas should be ready now").is_none());
    }

    #[rstest]
    fn float_placeholder_converts() {
        let tmpl = template("ratio is {value:float}");
        let bindings = tmpl.match_text("ratio is 0.75").expect("match");
        assert_eq!(bindings.get("value"), Some(&ParamValue::Float(0.75)));
    }

    #[rstest]
    fn python_style_hints_are_accepted() {
        let tmpl = template("service should have port {port:d}");
        assert_eq!(
            tmpl.placeholders().collect::<Vec<_>>(),
            vec![("port", PlaceholderKind::Int)]
        );
    }

    #[rstest]
    fn escaped_braces_are_literal() {
        let tmpl = template("value is {{{name}}}");
        let bindings = tmpl.match_text("value is {x}").expect("match");
        assert_eq!(bindings.str("name").expect("name"), "x");
    }

    #[rstest]
    fn skeleton_ignores_names_and_kinds() {
        let a = template("scale {name} to {count:int}");
        let b = template("scale {target} to {n:str}");
        let c = template("scale {name} up to {count:int}");
        assert_eq!(a.skeleton(), b.skeleton());
        assert_ne!(a.skeleton(), c.skeleton());
        assert_eq!(a.skeleton().arity(), 2);
    }

    #[rstest]
    fn regex_metacharacters_in_literals_are_escaped() {
        let tmpl = template("run (quick) check.*");
        assert!(tmpl.match_text("run (quick) check.*").is_some());
        assert!(tmpl.match_text("run quick check").is_none());
    }
}
