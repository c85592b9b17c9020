//! Regex capture helpers used when recording matched step arguments.

use std::ops::Range;

use regex::Regex;

/// A value captured from step text by a parameter of the matching pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepArgument {
    /// The captured text; empty when an optional group did not participate.
    pub value: String,
    /// Byte range of the value within the matched text, when it participated.
    pub range: Option<Range<usize>>,
}

/// Extract the parameter capture groups when `text` matches `re`, returning
/// `None` otherwise.
///
/// Capture group 0 (the full match) is ignored so only parameters contribute
/// to the result, and optional groups that do not participate yield empty
/// values without a range to keep positional alignment.
///
/// # Examples
/// ```
/// # use regex::Regex;
/// # use gherkin_assist_patterns::extract_arguments;
/// let Ok(regex) = Regex::new(r"^(\d+)-(\w+)$") else { panic!("valid regex") };
/// let values: Vec<_> = extract_arguments(&regex, "42-answer")
///     .unwrap_or_default()
///     .into_iter()
///     .map(|arg| arg.value)
///     .collect();
/// assert_eq!(values, ["42", "answer"]);
/// assert!(extract_arguments(&regex, "nope").is_none());
/// ```
#[must_use]
pub fn extract_arguments(re: &Regex, text: &str) -> Option<Vec<StepArgument>> {
    let caps = re.captures(text)?;
    let arguments = caps
        .iter()
        .skip(1)
        .map(|capture| match capture {
            Some(m) => StepArgument {
                value: m.as_str().to_owned(),
                range: Some(m.range()),
            },
            None => StepArgument {
                value: String::new(),
                range: None,
            },
        })
        .collect();
    Some(arguments)
}
