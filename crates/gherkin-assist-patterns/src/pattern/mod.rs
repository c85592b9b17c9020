//! Step-pattern lexing and compilation helpers.

pub(crate) mod compiler;
pub(crate) mod groups;
mod lexer;
mod parameter;
#[cfg(test)]
pub(crate) mod test_support;

use regex::Regex;

use crate::errors::PatternError;
use crate::kind::PatternKind;
use crate::literal::{LiteralText, expression_literals, regex_literals};
use crate::specificity::SpecificityScore;

pub use compiler::build_regex_from_expression;
pub use groups::tolerate_placeholders;

use compiler::{Flavour, emit_regex, parse_expression};
use groups::{relax_groups, scan_groups};

/// Regular expression accepting an unresolved `<name>` outline token.
pub const PLACEHOLDER_TOKEN: &str = "<[^>]+>";

/// Alternative inserted at the start of a group body so the group also
/// accepts an outline token.
pub(crate) const PLACEHOLDER_ALTERNATIVE: &str = "<[^>]+>|";

/// A step pattern compiled into its three matcher flavours.
///
/// * the exact matcher accepts concrete step text only;
/// * the placeholder-tolerant matcher additionally accepts `<name>` outline
///   tokens in every parameter slot;
/// * the relaxed matcher accepts any text in every parameter slot and is used
///   when ranking content-assist candidates.
///
/// All matchers are anchored at both ends.
#[derive(Debug, Clone)]
pub struct CompiledPattern {
    exact: Regex,
    placeholder_tolerant: Regex,
    relaxed: Regex,
    capture_count: usize,
    literal: LiteralText,
    specificity: SpecificityScore,
}

impl CompiledPattern {
    /// Compile a raw pattern of the given kind.
    ///
    /// # Errors
    /// Returns [`PatternError`] when a typed expression is malformed or uses an
    /// undefined parameter type, or when a regular expression fails to
    /// compile.
    ///
    /// # Examples
    /// ```
    /// use gherkin_assist_patterns::{CompiledPattern, PatternKind};
    ///
    /// let Ok(pattern) = CompiledPattern::compile(r"^a (\d+) item$", PatternKind::Regex) else {
    ///     panic!("valid pattern");
    /// };
    /// assert!(pattern.is_match("a 5 item"));
    /// assert!(!pattern.is_match("a five item"));
    /// assert!(pattern.is_placeholder_match("a <count> item"));
    /// ```
    pub fn compile(raw: &str, kind: PatternKind) -> Result<Self, PatternError> {
        match kind {
            PatternKind::TypedExpression => Self::compile_expression(raw),
            PatternKind::Regex => Self::compile_regex(raw),
        }
    }

    fn compile_expression(raw: &str) -> Result<Self, PatternError> {
        let nodes = parse_expression(raw)?;
        let exact = Regex::new(&emit_regex(&nodes, Flavour::Exact)?)?;
        let placeholder_tolerant =
            Regex::new(&emit_regex(&nodes, Flavour::PlaceholderTolerant)?)?;
        let relaxed = Regex::new(&emit_regex(&nodes, Flavour::Relaxed)?)?;
        Ok(Self {
            capture_count: exact.captures_len().saturating_sub(1),
            exact,
            placeholder_tolerant,
            relaxed,
            literal: expression_literals(&nodes),
            specificity: SpecificityScore::from_expression(&nodes),
        })
    }

    fn compile_regex(raw: &str) -> Result<Self, PatternError> {
        let exact = Regex::new(&anchor(raw))?;
        let placeholder_tolerant = Regex::new(&anchor(&tolerate_placeholders(raw)))?;
        let relaxed = Regex::new(&anchor(&relax_groups(raw)))?;
        let groups = scan_groups(raw).unwrap_or_default();
        Ok(Self {
            capture_count: exact.captures_len().saturating_sub(1),
            exact,
            placeholder_tolerant,
            relaxed,
            literal: regex_literals(raw, &groups),
            specificity: SpecificityScore::from_regex(raw),
        })
    }

    /// Whether concrete step text matches the pattern.
    #[must_use]
    pub fn is_match(&self, text: &str) -> bool {
        self.exact.is_match(text)
    }

    /// Whether step text, possibly containing `<name>` outline tokens,
    /// matches the pattern.
    #[must_use]
    pub fn is_placeholder_match(&self, text: &str) -> bool {
        self.placeholder_tolerant.is_match(text)
    }

    /// Whether step text matches the pattern once parameter types are
    /// ignored.
    #[must_use]
    pub fn is_relaxed_match(&self, text: &str) -> bool {
        self.relaxed.is_match(text)
    }

    /// The exact matcher.
    #[must_use]
    pub fn exact(&self) -> &Regex {
        &self.exact
    }

    /// The placeholder-tolerant matcher.
    #[must_use]
    pub fn placeholder_tolerant(&self) -> &Regex {
        &self.placeholder_tolerant
    }

    /// Number of capture groups exposed by the exact matcher.
    #[must_use]
    pub fn capture_count(&self) -> usize {
        self.capture_count
    }

    /// Literal text of the pattern with parameters removed.
    #[must_use]
    pub fn literal_text(&self) -> &str {
        &self.literal.text
    }

    /// Literal text before the first parameter.
    #[must_use]
    pub fn literal_prefix(&self) -> &str {
        &self.literal.prefix
    }

    /// Specificity used to break ties between matching patterns.
    #[must_use]
    pub fn specificity(&self) -> SpecificityScore {
        self.specificity
    }
}

/// Anchor a regex so it must match the whole step text, as a full-string
/// match would.
fn anchor(source: &str) -> String {
    format!("^(?:{source})$")
}
