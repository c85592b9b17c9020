//! Error types shared by the pattern compilation modules.

use std::fmt;
use thiserror::Error;

/// Additional context for typed-expression syntax errors.
///
/// # Examples
/// ```
/// use gherkin_assist_patterns::ExpressionErrorInfo;
/// let info = ExpressionErrorInfo::new("missing closing '}' for parameter", 3, Some("int".into()));
/// assert_eq!(info.parameter.as_deref(), Some("int"));
/// assert_eq!(info.position, 3);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpressionErrorInfo {
    /// Human readable description of the problem.
    pub message: &'static str,
    /// Zero-based byte offset into the pattern where the problem starts.
    pub position: usize,
    /// Parameter name involved in the failure, when there is one.
    pub parameter: Option<String>,
}

impl ExpressionErrorInfo {
    /// Create a new error description for an expression failure.
    ///
    /// # Examples
    /// ```
    /// use gherkin_assist_patterns::ExpressionErrorInfo;
    /// let info = ExpressionErrorInfo::new("invalid", 1, None);
    /// assert_eq!(info.message, "invalid");
    /// ```
    #[must_use]
    pub fn new(message: &'static str, position: usize, parameter: Option<String>) -> Self {
        Self {
            message,
            position,
            parameter,
        }
    }
}

impl fmt::Display for ExpressionErrorInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.parameter {
            Some(name) => write!(
                f,
                "{} for parameter `{{{}}}` at byte {} (zero-based)",
                self.message, name, self.position
            ),
            None => write!(f, "{} at byte {} (zero-based)", self.message, self.position),
        }
    }
}

/// Errors surfaced while converting step patterns into regular expressions.
///
/// # Examples
/// ```
/// use gherkin_assist_patterns::{ExpressionErrorInfo, PatternError};
/// let info = ExpressionErrorInfo::new("invalid", 2, Some("int".into()));
/// let err = PatternError::Expression(info.clone());
/// assert_eq!(err.to_string(), info.to_string());
/// ```
#[derive(Debug, Error)]
pub enum PatternError {
    /// The typed expression is syntactically malformed.
    #[error("{0}")]
    Expression(ExpressionErrorInfo),
    /// The typed expression names a parameter type nobody registered.
    #[error("undefined parameter type `{{{name}}}` at byte {position} (zero-based)")]
    UndefinedParameterType {
        /// The unknown parameter type name.
        name: String,
        /// Zero-based byte offset of the opening brace.
        position: usize,
    },
    /// The generated or supplied regular expression failed to compile.
    #[error(transparent)]
    Regex(#[from] regex::Error),
}

pub(crate) fn expression_error(
    message: &'static str,
    position: usize,
    parameter: Option<String>,
) -> PatternError {
    PatternError::Expression(ExpressionErrorInfo::new(message, position, parameter))
}
