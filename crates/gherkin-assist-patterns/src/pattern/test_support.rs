//! Test helpers for asserting expression parser outcomes.
use super::parameter::{parse_optional, parse_parameter};
use crate::errors::PatternError;

fn run<T>(
    pattern: &str,
    parse: impl FnOnce(&mut super::parameter::CharStream<'_>, usize) -> Result<T, PatternError>,
) -> Result<T, PatternError> {
    let mut chars = pattern.char_indices().peekable();
    // Skip the opening delimiter, as the lexer does before delegating.
    chars.next();
    parse(&mut chars, 0)
}

pub(crate) fn parameter_ok(pattern: &str) -> String {
    match run(pattern, parse_parameter) {
        Ok(name) => name,
        Err(err) => panic!("parameter should parse: {err}"),
    }
}

pub(crate) fn parameter_err(pattern: &str) -> PatternError {
    match run(pattern, parse_parameter) {
        Ok(_) => panic!("parameter parsing should fail"),
        Err(err) => err,
    }
}

pub(crate) fn optional_ok(pattern: &str) -> String {
    match run(pattern, parse_optional) {
        Ok(text) => text,
        Err(err) => panic!("optional text should parse: {err}"),
    }
}

pub(crate) fn optional_err(pattern: &str) -> PatternError {
    match run(pattern, parse_optional) {
        Ok(_) => panic!("optional parsing should fail"),
        Err(err) => err,
    }
}
