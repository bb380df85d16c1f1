//! Template tokenizer and regex compiler.

use std::collections::HashSet;

use regex::Regex;

use super::{PlaceholderKind, TemplateError, Token};

/// Split `source` into literal and placeholder tokens.
///
/// Adjacent literal text is merged so that the token sequence, and therefore
/// the skeleton, is canonical for a given template.
pub(super) fn tokenize(source: &str) -> Result<Vec<Token>, TemplateError> {
    let mut tokens = Vec::new();
    let mut literal = String::new();
    let mut seen = HashSet::new();
    let mut chars = source.char_indices().peekable();

    while let Some((position, ch)) = chars.next() {
        match ch {
            '{' if chars.peek().is_some_and(|(_, next)| *next == '{') => {
                chars.next();
                literal.push('{');
            }
            '}' if chars.peek().is_some_and(|(_, next)| *next == '}') => {
                chars.next();
                literal.push('}');
            }
            '{' => {
                let mut body = String::new();
                let mut closed = false;
                for (_, inner) in chars.by_ref() {
                    if inner == '}' {
                        closed = true;
                        break;
                    }
                    body.push(inner);
                }
                if !closed {
                    return Err(TemplateError::UnclosedPlaceholder {
                        template: source.to_owned(),
                        position,
                    });
                }
                let (name, kind) = parse_placeholder(source, position, &body)?;
                if !seen.insert(name.clone()) {
                    return Err(TemplateError::DuplicatePlaceholder {
                        template: source.to_owned(),
                        name,
                    });
                }
                if !literal.is_empty() {
                    tokens.push(Token::Literal(std::mem::take(&mut literal)));
                }
                tokens.push(Token::Placeholder { name, kind });
            }
            '}' => {
                return Err(TemplateError::StrayBrace {
                    template: source.to_owned(),
                    position,
                });
            }
            other => literal.push(other),
        }
    }
    if !literal.is_empty() {
        tokens.push(Token::Literal(literal));
    }
    Ok(tokens)
}

fn parse_placeholder(
    source: &str,
    position: usize,
    body: &str,
) -> Result<(String, PlaceholderKind), TemplateError> {
    let (name, hint) = match body.split_once(':') {
        Some((name, hint)) => (name.trim(), Some(hint.trim())),
        None => (body.trim(), None),
    };
    let valid_name = name
        .chars()
        .next()
        .is_some_and(|first| first.is_ascii_alphabetic() || first == '_')
        && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
    if !valid_name {
        return Err(TemplateError::InvalidPlaceholderName {
            template: source.to_owned(),
            position,
            name: name.to_owned(),
        });
    }
    let kind =
        PlaceholderKind::from_hint(hint).ok_or_else(|| TemplateError::UnknownPlaceholderKind {
            template: source.to_owned(),
            name: name.to_owned(),
            hint: hint.unwrap_or_default().to_owned(),
        })?;
    Ok((name.to_owned(), kind))
}

/// Build an anchored regex with one capture group per placeholder.
pub(super) fn to_regex(source: &str, tokens: &[Token]) -> Result<Regex, TemplateError> {
    let mut pattern = String::with_capacity(source.len().saturating_mul(2) + 2);
    pattern.push('^');
    for token in tokens {
        match token {
            Token::Literal(text) => pattern.push_str(&regex::escape(text)),
            Token::Placeholder { kind, .. } => {
                pattern.push('(');
                pattern.push_str(kind.capture_pattern());
                pattern.push(')');
            }
        }
    }
    pattern.push('$');
    Regex::new(&pattern).map_err(|source_err| TemplateError::Regex {
        template: source.to_owned(),
        source: source_err,
    })
}
