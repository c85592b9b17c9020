//! Step-definition pattern syntaxes.

use std::fmt;

/// The syntax a step-definition pattern is written in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PatternKind {
    /// A regular expression, matched against the whole step text.
    Regex,
    /// A typed expression such as `I have {int} cucumber(s)`.
    TypedExpression,
}

impl PatternKind {
    /// Guess the syntax of a raw pattern.
    ///
    /// A pattern anchored with `^` or `$` is a regular expression; anything
    /// else is treated as a typed expression.
    ///
    /// # Examples
    ///
    /// ```
    /// use gherkin_assist_patterns::PatternKind;
    ///
    /// assert_eq!(PatternKind::infer(r"^I have (\d+)$"), PatternKind::Regex);
    /// assert_eq!(PatternKind::infer("I have {int}"), PatternKind::TypedExpression);
    /// ```
    #[must_use]
    pub fn infer(raw: &str) -> Self {
        if raw.starts_with('^') || raw.ends_with('$') {
            Self::Regex
        } else {
            Self::TypedExpression
        }
    }

    /// Parse a label produced by [`PatternKind::as_str`].
    ///
    /// # Examples
    ///
    /// ```
    /// use gherkin_assist_patterns::PatternKind;
    ///
    /// assert_eq!(PatternKind::from_label("regex"), Some(PatternKind::Regex));
    /// assert_eq!(PatternKind::from_label("glob"), None);
    /// ```
    #[must_use]
    pub fn from_label(label: &str) -> Option<Self> {
        match label {
            "regex" => Some(Self::Regex),
            "expression" => Some(Self::TypedExpression),
            _ => None,
        }
    }

    /// Return the kind as a lowercase label.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Regex => "regex",
            Self::TypedExpression => "expression",
        }
    }
}

impl fmt::Display for PatternKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
