//! Diagnostics derived from validation runs.
//!
//! Every validation generation produces the complete diagnostic set for a
//! document, which is handed to a [`DiagnosticSink`] with replace semantics:
//!
//! - **Unmatched steps** are warnings on the step's lines.
//! - **Parse errors** are errors on the offending line.
//! - **Pattern compile failures** collapse into one informational diagnostic
//!   per run, however many patterns failed.
//! - **Provider failures** surface as one informational diagnostic.

use std::ops::Range;
use std::sync::Arc;

use serde::Serialize;

use crate::cache::DocumentId;
use crate::feature::ParseError;
use crate::glue::ProviderError;
use crate::matching::MatchResult;
use crate::normalize::PatternCompileError;
use crate::position::LineIndex;

/// Diagnostic source identifier.
pub const DIAGNOSTIC_SOURCE: &str = "gherkin-assist";

/// Diagnostic code for steps without a matching definition.
pub const CODE_UNMATCHED_STEP: &str = "unmatched-step";

/// Diagnostic code for structural problems.
pub const CODE_PARSE_ERROR: &str = "parse-error";

/// Diagnostic code for step patterns that failed to compile.
pub const CODE_PATTERN_COMPILE_ERROR: &str = "pattern-compile-error";

/// Diagnostic code for a failed glue provider call.
pub const CODE_GLUE_VALIDATION_ERROR: &str = "glue-validation-error";

/// How serious a diagnostic is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// A structural problem.
    Error,
    /// A step without a definition.
    Warning,
    /// Glue-side problems reported once.
    Info,
}

impl Severity {
    /// Lowercase label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Error => "error",
            Self::Warning => "warning",
            Self::Info => "info",
        }
    }
}

/// A problem reported against a document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    /// Severity.
    pub severity: Severity,
    /// First and last 1-based line covered.
    pub line_range: (usize, usize),
    /// Byte span in the document text.
    pub span: Range<usize>,
    /// Human-readable message.
    pub message: String,
    /// Stable code, one of the `CODE_*` constants.
    pub code: &'static str,
    /// Always [`DIAGNOSTIC_SOURCE`].
    pub source: &'static str,
}

impl Diagnostic {
    fn new(
        severity: Severity,
        line_range: (usize, usize),
        span: Range<usize>,
        message: String,
        code: &'static str,
    ) -> Self {
        Self {
            severity,
            line_range,
            span,
            message,
            code,
            source: DIAGNOSTIC_SOURCE,
        }
    }
}

/// Receives the complete diagnostic set of each validation generation.
pub trait DiagnosticSink: Send + Sync {
    /// Replace the diagnostics published for `document`.
    ///
    /// The scheduler calls this while it holds the document's scheduling
    /// lock, so implementations must not call back into the scheduler or the
    /// document cache.
    fn publish(&self, document: &DocumentId, diagnostics: Vec<Diagnostic>);
}

/// Warning for a step no definition accepts.
#[must_use]
pub fn unmatched_step(result: &MatchResult, index: &LineIndex) -> Diagnostic {
    let location = result.step_location;
    let start = index.offset_of(location.line, location.column);
    let end = index.line_end(location.line);
    Diagnostic::new(
        Severity::Warning,
        (location.line, result.end_line.max(location.line)),
        start..end.max(start),
        format!("No step definition found for step: \"{}\"", result.statement),
        CODE_UNMATCHED_STEP,
    )
}

/// Error for a structural problem.
#[must_use]
pub fn parse_error(error: &ParseError, index: &LineIndex) -> Diagnostic {
    let line = error.location.line;
    let start = index.offset_of(line, error.location.column);
    let end = index.line_end(line);
    Diagnostic::new(
        Severity::Error,
        (line, line),
        start..end.max(start),
        error.kind.to_string(),
        CODE_PARSE_ERROR,
    )
}

/// One informational diagnostic summarising every compile failure of a run.
#[must_use]
pub fn pattern_compile_errors(
    errors: &[Arc<PatternCompileError>],
    index: &LineIndex,
) -> Option<Diagnostic> {
    let first = errors.first()?;
    let message = match errors.len() {
        1 => first.to_string(),
        n => format!("{n} step patterns failed to compile; first: {first}"),
    };
    Some(Diagnostic::new(
        Severity::Info,
        (1, 1),
        document_head(index),
        message,
        CODE_PATTERN_COMPILE_ERROR,
    ))
}

/// One informational diagnostic for a failed provider call.
#[must_use]
pub fn glue_validation_error(error: &ProviderError, index: &LineIndex) -> Diagnostic {
    Diagnostic::new(
        Severity::Info,
        (1, 1),
        document_head(index),
        format!("Step definitions could not be refreshed: {error}"),
        CODE_GLUE_VALIDATION_ERROR,
    )
}

fn document_head(index: &LineIndex) -> Range<usize> {
    index.line_offset(1)..index.line_end(1)
}

/// Diagnostics for one validation generation, in line order.
#[must_use]
pub fn collect(
    results: &[MatchResult],
    parse_errors: &[ParseError],
    compile_errors: &[Arc<PatternCompileError>],
    index: &LineIndex,
) -> Vec<Diagnostic> {
    let mut diagnostics: Vec<Diagnostic> = parse_errors
        .iter()
        .map(|error| parse_error(error, index))
        .chain(
            results
                .iter()
                .filter(|result| !result.is_matched())
                .map(|result| unmatched_step(result, index)),
        )
        .chain(pattern_compile_errors(compile_errors, index))
        .collect();
    diagnostics.sort_by_key(|d| (d.line_range.0, d.severity));
    diagnostics
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feature::parse_text;
    use crate::matching::match_feature;
    use crate::normalize::MatcherCache;
    use crate::test_support::regex_pattern;

    const TEXT: &str = "Feature: f\n  Scenario: s\n    Given a 5 item\n    Given a five item";

    #[test]
    fn unmatched_steps_are_warnings_spanning_the_step() {
        let prepared = MatcherCache::new().prepare(&[regex_pattern("item", r"^a (\d+) item$")]);
        let (feature, errors) = parse_text(TEXT);
        let results = feature.map_or_else(Vec::new, |f| match_feature(&f, &prepared.patterns));
        let index = LineIndex::new(TEXT);
        let diagnostics = collect(&results, &errors, &prepared.errors, &index);

        let [diagnostic] = diagnostics.as_slice() else {
            panic!("expected one diagnostic, got {diagnostics:?}");
        };
        assert_eq!(diagnostic.severity, Severity::Warning);
        assert_eq!(diagnostic.code, CODE_UNMATCHED_STEP);
        assert_eq!(diagnostic.line_range, (4, 4));
        assert_eq!(TEXT.get(diagnostic.span.clone()), Some("Given a five item"));
        assert_eq!(diagnostic.source, "gherkin-assist");
    }

    #[test]
    fn compile_failures_collapse_into_one_info() {
        let prepared = MatcherCache::new().prepare(&[
            regex_pattern("bad", "Given (unterminated"),
            regex_pattern("worse", "a [b"),
        ]);
        let index = LineIndex::new(TEXT);
        let diagnostics = collect(&[], &[], &prepared.errors, &index);
        let [diagnostic] = diagnostics.as_slice() else {
            panic!("expected one diagnostic");
        };
        assert_eq!(diagnostic.severity, Severity::Info);
        assert_eq!(diagnostic.code, CODE_PATTERN_COMPILE_ERROR);
        assert!(diagnostic.message.starts_with("2 step patterns failed to compile"));
    }

    #[test]
    fn parse_errors_are_errors() {
        let text = "Feature: f\n  | orphan |\n";
        let (_, errors) = parse_text(text);
        let index = LineIndex::new(text);
        let diagnostics = collect(&[], &errors, &[], &index);
        assert!(!diagnostics.is_empty());
        assert!(
            diagnostics
                .iter()
                .all(|d| d.severity == Severity::Error && d.code == CODE_PARSE_ERROR)
        );
    }

    #[test]
    fn provider_failures_report_on_the_first_line() {
        let index = LineIndex::new(TEXT);
        let diagnostic =
            glue_validation_error(&ProviderError::Backend("dry run failed".into()), &index);
        assert_eq!(diagnostic.line_range, (1, 1));
        assert_eq!(TEXT.get(diagnostic.span.clone()), Some("Feature: f"));
        assert!(diagnostic.message.contains("dry run failed"));
    }

    #[test]
    fn diagnostics_serialise_with_lowercase_severity() {
        let index = LineIndex::new(TEXT);
        let diagnostic = glue_validation_error(&ProviderError::Cancelled, &index);
        let json = serde_json::to_value(&diagnostic).unwrap_or_default();
        assert_eq!(
            json.get("severity").and_then(|v| v.as_str()),
            Some("info")
        );
        assert_eq!(
            json.get("code").and_then(|v| v.as_str()),
            Some(CODE_GLUE_VALIDATION_ERROR)
        );
    }
}
