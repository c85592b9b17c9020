//! Scenario-outline placeholder helpers.
//!
//! Outline steps reference Examples columns as `<name>`. Before such a step is
//! matched literally it is rendered once per Examples row.

use std::sync::LazyLock;

use regex::{Captures, Regex};

static OUTLINE_PLACEHOLDER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<([^>]+)>").unwrap_or_else(|_| unreachable!()));

/// Whether `text` contains at least one `<name>` token.
///
/// # Examples
/// ```
/// use gherkin_assist_patterns::has_placeholders;
/// assert!(has_placeholders("the user <name>"));
/// assert!(!has_placeholders("the user Bob"));
/// ```
#[must_use]
pub fn has_placeholders(text: &str) -> bool {
    OUTLINE_PLACEHOLDER_RE.is_match(text)
}

/// Names of the `<name>` tokens in `text`, in order of appearance.
#[must_use]
pub fn placeholder_names(text: &str) -> Vec<&str> {
    OUTLINE_PLACEHOLDER_RE
        .captures_iter(text)
        .filter_map(|caps| caps.get(1).map(|m| m.as_str()))
        .collect()
}

/// Replace each `<name>` token with the value of the matching column.
///
/// Tokens naming a column absent from `header` are left untouched, as are
/// tokens whose column has no cell in `row`.
///
/// # Examples
/// ```
/// use gherkin_assist_patterns::substitute_placeholders;
/// let header = ["name".to_string(), "age".to_string()];
/// let row = ["Bob".to_string(), "42".to_string()];
/// assert_eq!(
///     substitute_placeholders("<name> is <age> in <unit>", &header, &row),
///     "Bob is 42 in <unit>"
/// );
/// ```
#[must_use]
pub fn substitute_placeholders(text: &str, header: &[String], row: &[String]) -> String {
    OUTLINE_PLACEHOLDER_RE
        .replace_all(text, |caps: &Captures<'_>| {
            let name = caps.get(1).map_or("", |m| m.as_str());
            header
                .iter()
                .position(|column| column == name)
                .and_then(|index| row.get(index))
                .map_or_else(
                    || caps.get(0).map_or_else(String::new, |m| m.as_str().to_owned()),
                    Clone::clone,
                )
        })
        .into_owned()
}
