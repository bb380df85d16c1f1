//! Source-annotated diagnostics for suite files.

// miette's derive trips `unused_assignments` on some toolchains only, so
// `#[expect]` cannot be used here.
#![allow(clippy::allow_attributes, clippy::allow_attributes_without_reason)]

use miette::{Diagnostic, NamedSource, SourceSpan};
use serde_saphyr::{Error as YamlError, Location};
use thiserror::Error;

use super::hints::YAML_HINTS;

/// Byte offset of a one-based line and column, clamped to the line end.
fn byte_index(src: &str, line: u64, column: u64) -> usize {
    let target_line = usize::try_from(line.saturating_sub(1)).unwrap_or(usize::MAX);
    let target_column = usize::try_from(column.saturating_sub(1)).unwrap_or(usize::MAX);
    let mut offset = 0usize;
    for (idx, segment) in src.split_inclusive('\n').enumerate() {
        if idx == target_line {
            let without_newline = segment.strip_suffix('\n').unwrap_or(segment);
            let body = without_newline
                .strip_suffix('\r')
                .unwrap_or(without_newline);
            let column_offset = body
                .char_indices()
                .nth(target_column)
                .map_or(body.len(), |(byte_idx, _)| byte_idx);
            return offset + column_offset;
        }
        offset += segment.len();
    }
    src.len()
}

fn to_span(src: &str, loc: Location) -> SourceSpan {
    let at = byte_index(src, loc.line(), loc.column());
    let bytes = src.as_bytes();
    let is_line_break = |b: u8| b == b'\n' || b == b'\r';
    let (start, end) = match bytes.get(at) {
        Some(&b) if !is_line_break(b) => (at, at + 1),
        _ => {
            let previous = at.checked_sub(1);
            let start = match previous.and_then(|p| bytes.get(p)) {
                Some(&b) if !is_line_break(b) => at - 1,
                _ => at,
            };
            (start, at)
        }
    };
    SourceSpan::new(start.into(), end.saturating_sub(start))
}

#[allow(unused_assignments)]
#[derive(Debug, Error, Diagnostic)]
#[error("{message}")]
#[diagnostic(code(scenarist::suite::yaml))]
pub(crate) struct YamlDiagnostic {
    #[source_code]
    src: NamedSource<String>,
    #[label("here")]
    span: Option<SourceSpan>,
    #[help]
    help: Option<String>,
    #[source]
    source: YamlError,
    message: String,
}

fn has_tab_indent(src: &str, location: Option<Location>) -> bool {
    let Some(loc) = location else {
        return false;
    };
    let line_idx = usize::try_from(loc.line().saturating_sub(1)).unwrap_or(usize::MAX);
    src.lines()
        .nth(line_idx)
        .unwrap_or("")
        .chars()
        .take_while(|c| c.is_whitespace())
        .any(|c| c == '\t')
}

fn hint_for(err_str: &str, src: &str, loc: Option<Location>) -> Option<String> {
    if has_tab_indent(src, loc) {
        return Some("Indent with spaces; YAML rejects tabs.".into());
    }
    let lower = err_str.to_lowercase();
    YAML_HINTS
        .iter()
        .find(|(needle, _)| lower.contains(*needle))
        .map(|(_, hint)| (*hint).into())
}

/// Turn a YAML error in the suite `name` into a spanned diagnostic.
#[must_use]
pub fn map_yaml_error(
    err: YamlError,
    src: &str,
    name: &str,
) -> Box<dyn Diagnostic + Send + Sync + 'static> {
    let loc = err.location();
    let (line, col, span) = loc.map_or((1, 1, None), |l| {
        (l.line(), l.column(), Some(to_span(src, l)))
    });
    let err_str = err.to_string();
    let help = hint_for(&err_str, src, loc);
    Box::new(YamlDiagnostic {
        src: NamedSource::new(name, src.to_owned()),
        span,
        help,
        source: err,
        message: format!("{name}: YAML error at line {line}, column {col}: {err_str}"),
    })
}
