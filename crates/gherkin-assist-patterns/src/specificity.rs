//! Pattern specificity calculation for disambiguation.
//!
//! When multiple step patterns match the same step text, this module provides
//! scoring to select the most specific match. More specific patterns have more
//! literal text and fewer parameters.

use std::cmp::Ordering;

use crate::PatternError;
use crate::kind::PatternKind;
use crate::literal::{expression_literals, regex_literals};
use crate::pattern::compiler::{Node, parse_expression};
use crate::pattern::groups::{count_captures, scan_groups};

/// Specificity score for a step pattern.
///
/// Used to rank patterns when multiple match the same step text. Higher scores
/// indicate more specific patterns that should take precedence.
///
/// # Ordering
///
/// Patterns are compared by:
/// 1. More literal characters → more specific
/// 2. Fewer parameters → more specific
/// 3. More typed parameters → more specific (tiebreaker)
///
/// # Examples
///
/// ```
/// use gherkin_assist_patterns::{PatternKind, SpecificityScore};
///
/// let specific = SpecificityScore::calculate("the output is foo", PatternKind::TypedExpression)
///     .unwrap_or_default();
/// let generic = SpecificityScore::calculate("the output is {word}", PatternKind::TypedExpression)
///     .unwrap_or_default();
/// assert!(specific > generic);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SpecificityScore {
    /// Total number of literal characters in the pattern.
    pub literal_chars: usize,
    /// Number of parameters (typed-expression parameters or regex capture
    /// groups) in the pattern.
    pub parameter_count: usize,
    /// Number of parameters constrained to a type (anything other than the
    /// anonymous `{}` parameter or an unconstrained `.*` group).
    pub typed_parameter_count: usize,
}

impl SpecificityScore {
    /// Calculate the specificity score for a pattern string.
    ///
    /// # Errors
    ///
    /// Returns [`PatternError`] if a typed expression contains invalid syntax.
    /// Regular expressions with unbalanced parentheses are scored on their
    /// literal characters alone.
    ///
    /// # Examples
    ///
    /// ```
    /// use gherkin_assist_patterns::{PatternKind, SpecificityScore};
    ///
    /// let score = SpecificityScore::calculate("I have {int} apples", PatternKind::TypedExpression)
    ///     .unwrap_or_default();
    /// assert_eq!(score.literal_chars, 14); // "I have " + " apples"
    /// assert_eq!(score.parameter_count, 1);
    /// assert_eq!(score.typed_parameter_count, 1);
    /// ```
    pub fn calculate(pattern: &str, kind: PatternKind) -> Result<Self, PatternError> {
        match kind {
            PatternKind::TypedExpression => {
                let nodes = parse_expression(pattern)?;
                Ok(Self::from_expression(&nodes))
            }
            PatternKind::Regex => Ok(Self::from_regex(pattern)),
        }
    }

    pub(crate) fn from_expression(nodes: &[Node]) -> Self {
        let literal_chars = expression_literals(nodes).text.chars().count();
        let mut parameter_count = 0usize;
        let mut typed_parameter_count = 0usize;
        for node in nodes {
            if let Node::Parameter { name, .. } = node {
                parameter_count += 1;
                if !name.is_empty() {
                    typed_parameter_count += 1;
                }
            }
        }
        Self {
            literal_chars,
            parameter_count,
            typed_parameter_count,
        }
    }

    pub(crate) fn from_regex(source: &str) -> Self {
        let groups = scan_groups(source).unwrap_or_default();
        let counts = count_captures(source, &groups);
        Self {
            literal_chars: regex_literals(source, &groups).text.chars().count(),
            parameter_count: counts.total,
            typed_parameter_count: counts.typed,
        }
    }
}

impl Ord for SpecificityScore {
    fn cmp(&self, other: &Self) -> Ordering {
        // More literal characters → more specific
        match self.literal_chars.cmp(&other.literal_chars) {
            Ordering::Equal => {}
            ord => return ord,
        }

        // Fewer parameters → more specific (reverse comparison)
        match other.parameter_count.cmp(&self.parameter_count) {
            Ordering::Equal => {}
            ord => return ord,
        }

        // More typed parameters → more specific (tiebreaker)
        self.typed_parameter_count
            .cmp(&other.typed_parameter_count)
    }
}

impl PartialOrd for SpecificityScore {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
