//! Parameter and optional-text parsing used by the expression lexer.

use std::iter::Peekable;
use std::str::CharIndices;

use crate::errors::{PatternError, expression_error};

pub(crate) type CharStream<'a> = Peekable<CharIndices<'a>>;

/// Consume a `{name}` parameter whose opening brace sat at `start`.
///
/// The stream must be positioned just after the opening brace. An empty name
/// denotes the anonymous parameter type.
pub(crate) fn parse_parameter(
    chars: &mut CharStream<'_>,
    start: usize,
) -> Result<String, PatternError> {
    let mut name = String::new();
    for (index, ch) in chars.by_ref() {
        match ch {
            '}' => return Ok(name),
            '{' | '(' | ')' | '\\' | '/' => {
                return Err(expression_error(
                    "invalid character in parameter name",
                    index,
                    Some(name),
                ));
            }
            c if c.is_whitespace() => {
                return Err(expression_error(
                    "parameter names may not contain whitespace",
                    index,
                    Some(name),
                ));
            }
            _ => name.push(ch),
        }
    }
    Err(expression_error(
        "missing closing '}' for parameter",
        start,
        Some(name),
    ))
}

/// Consume an `(optional)` text block whose opening parenthesis sat at `start`.
pub(crate) fn parse_optional(
    chars: &mut CharStream<'_>,
    start: usize,
) -> Result<String, PatternError> {
    let mut text = String::new();
    while let Some((index, ch)) = chars.next() {
        match ch {
            ')' if text.is_empty() => {
                return Err(expression_error(
                    "optional text may not be empty",
                    start,
                    None,
                ));
            }
            ')' => return Ok(text),
            '\\' => match chars.next() {
                Some((_, escaped)) => text.push(escaped),
                None => text.push('\\'),
            },
            '{' => {
                return Err(expression_error(
                    "optional text may not contain a parameter",
                    index,
                    None,
                ));
            }
            '(' => {
                return Err(expression_error(
                    "optional text may not be nested",
                    index,
                    None,
                ));
            }
            _ => text.push(ch),
        }
    }
    Err(expression_error(
        "missing closing ')' for optional text",
        start,
        None,
    ))
}
