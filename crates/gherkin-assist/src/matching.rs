//! Matching parsed steps against prepared step definitions.
//!
//! Validation asks a boolean question per step line: does the exact matcher
//! of some definition accept the keyword-stripped statement? When several
//! definitions accept, the most specific one wins and declaration order
//! breaks remaining ties. Every accepting definition is still listed in
//! [`MatchResult::alternatives`].
//!
//! Outline steps are rendered once per examples row before matching. Until an
//! outline has rows, its raw text is checked with the placeholder-tolerant
//! matcher instead.

use gherkin_assist_patterns::{SpecificityScore, StepArgument, has_placeholders, substitute_placeholders};
use tracing::trace;

use crate::dialect::Dialect;
use crate::feature::{Examples, Feature, Location, StepContext};
use crate::glue::PatternId;
use crate::normalize::PreparedPattern;

/// Strip the longest step keyword of `dialect` from a trimmed line.
///
/// Lines without a step keyword are returned trimmed.
///
/// # Examples
/// ```
/// use gherkin_assist::dialect::resolve_tag;
/// use gherkin_assist::matching::text_statement;
///
/// let en = resolve_tag("en");
/// assert_eq!(text_statement("    Given a 5 item", &en), "a 5 item");
/// assert_eq!(text_statement("* a wildcard step", &en), "a wildcard step");
/// ```
#[must_use]
pub fn text_statement<'a>(line: &'a str, dialect: &Dialect) -> &'a str {
    let trimmed = line.trim();
    dialect
        .match_step_keyword(trimmed)
        .and_then(|keyword| trimmed.strip_prefix(keyword.text.as_str()))
        .map_or(trimmed, str::trim_start)
}

/// A definition that accepted a statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Alternative {
    /// The accepting definition.
    pub pattern_id: PatternId,
    /// Its specificity; higher ranks first.
    pub specificity: SpecificityScore,
}

/// Whether a statement found a definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchOutcome {
    /// A definition accepted the statement.
    Matched {
        /// The chosen definition.
        pattern_id: PatternId,
        /// Arguments captured from the statement.
        captures: Vec<StepArgument>,
    },
    /// No definition accepted the statement.
    Unmatched,
}

impl MatchOutcome {
    /// Whether a definition was found.
    #[must_use]
    pub fn is_matched(&self) -> bool {
        matches!(self, Self::Matched { .. })
    }

    /// The chosen definition, if any.
    #[must_use]
    pub fn pattern_id(&self) -> Option<&PatternId> {
        match self {
            Self::Matched { pattern_id, .. } => Some(pattern_id),
            Self::Unmatched => None,
        }
    }
}

/// Outcome for one examples row of an outline step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowOutcome {
    /// Line of the examples row.
    pub line: usize,
    /// Statement with placeholders substituted from the row.
    pub rendered: String,
    /// Result for the rendered statement.
    pub outcome: MatchOutcome,
}

/// Result of matching one step line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchResult {
    /// Where the step starts.
    pub step_location: Location,
    /// Last line covered by the step.
    pub end_line: usize,
    /// Keyword-stripped statement as written.
    pub statement: String,
    /// Aggregate outcome; outline steps match when any row matches.
    pub outcome: MatchOutcome,
    /// Every accepting definition, best first.
    pub alternatives: Vec<Alternative>,
    /// Per-row outcomes for outline steps rendered against examples rows.
    pub rows: Vec<RowOutcome>,
}

impl MatchResult {
    /// Whether the step found a definition.
    #[must_use]
    pub fn is_matched(&self) -> bool {
        self.outcome.is_matched()
    }
}

#[derive(Clone, Copy)]
enum Mode {
    Exact,
    PlaceholderTolerant,
}

/// Match a rendered statement against `candidates` with their exact
/// matchers.
///
/// Returns the chosen outcome and every accepting definition, best first.
///
/// # Examples
/// ```
/// use gherkin_assist::glue::{PatternId, SourceLocation, StepDefinitionPattern};
/// use gherkin_assist::matching::match_statement;
/// use gherkin_assist::normalize::MatcherCache;
/// use gherkin_assist_patterns::PatternKind;
///
/// let pattern = StepDefinitionPattern {
///     id: PatternId::from("item"),
///     raw_pattern: r"^a (\d+) item$".into(),
///     kind: PatternKind::Regex,
///     source_location: SourceLocation { path: "steps.rs".into(), line: 3 },
///     owner_label: "items".into(),
/// };
/// let prepared = MatcherCache::new().prepare(&[pattern]);
/// assert!(match_statement("a 5 item", &prepared.patterns).0.is_matched());
/// assert!(!match_statement("a five item", &prepared.patterns).0.is_matched());
/// ```
#[must_use]
pub fn match_statement(
    statement: &str,
    candidates: &[PreparedPattern],
) -> (MatchOutcome, Vec<Alternative>) {
    select(statement, candidates, Mode::Exact)
}

fn select(
    statement: &str,
    candidates: &[PreparedPattern],
    mode: Mode,
) -> (MatchOutcome, Vec<Alternative>) {
    let accepts = |candidate: &PreparedPattern| match mode {
        Mode::Exact => candidate.matcher.is_match(statement),
        Mode::PlaceholderTolerant => candidate.matcher.is_placeholder_match(statement),
    };
    let mut accepting: Vec<(usize, &PreparedPattern)> = candidates
        .iter()
        .enumerate()
        .filter(|(_, candidate)| accepts(candidate))
        .collect();
    accepting.sort_by(|(a_index, a), (b_index, b)| {
        b.matcher
            .specificity()
            .cmp(&a.matcher.specificity())
            .then(a_index.cmp(b_index))
    });
    let alternatives: Vec<Alternative> = accepting
        .iter()
        .map(|(_, candidate)| Alternative {
            pattern_id: candidate.pattern.id.clone(),
            specificity: candidate.matcher.specificity(),
        })
        .collect();
    let outcome = accepting
        .first()
        .map_or(MatchOutcome::Unmatched, |(_, best)| {
            let captures = match mode {
                Mode::Exact => best.matcher.captures(statement),
                Mode::PlaceholderTolerant => best.matcher.placeholder_captures(statement),
            };
            MatchOutcome::Matched {
                pattern_id: best.pattern.id.clone(),
                captures: captures.unwrap_or_default(),
            }
        });
    (outcome, alternatives)
}

/// Match one step, rendering outline steps against their examples rows.
#[must_use]
pub fn match_step(context: StepContext<'_>, candidates: &[PreparedPattern]) -> MatchResult {
    let step = context.step;
    let statement = step.text.trim();
    let outline = context
        .scenario
        .filter(|scenario| scenario.is_outline() && has_placeholders(statement));

    let (outcome, alternatives, rows) = match outline {
        None => {
            let (outcome, alternatives) = select(statement, candidates, Mode::Exact);
            (outcome, alternatives, Vec::new())
        }
        Some(scenario) => {
            let rows = render_rows(statement, &scenario.examples, candidates);
            if rows.is_empty() {
                let (outcome, alternatives) =
                    select(statement, candidates, Mode::PlaceholderTolerant);
                (outcome, alternatives, Vec::new())
            } else {
                let (outcome, alternatives) = rows
                    .iter()
                    .find(|row| row.0.outcome.is_matched())
                    .map_or((MatchOutcome::Unmatched, Vec::new()), |row| {
                        (row.0.outcome.clone(), row.1.clone())
                    });
                (outcome, alternatives, rows.into_iter().map(|(row, _)| row).collect())
            }
        }
    };
    trace!(
        line = step.location.line,
        statement,
        matched = outcome.is_matched(),
        "matched step"
    );
    MatchResult {
        step_location: step.location,
        end_line: step.end_line,
        statement: statement.to_owned(),
        outcome,
        alternatives,
        rows,
    }
}

fn render_rows(
    statement: &str,
    examples: &[Examples],
    candidates: &[PreparedPattern],
) -> Vec<(RowOutcome, Vec<Alternative>)> {
    examples
        .iter()
        .flat_map(|block| {
            let columns = block.columns();
            block.body.iter().map(move |row| {
                let rendered = substitute_placeholders(statement, columns, &row.cells);
                let (outcome, alternatives) = select(&rendered, candidates, Mode::Exact);
                (
                    RowOutcome {
                        line: row.location.line,
                        rendered,
                        outcome,
                    },
                    alternatives,
                )
            })
        })
        .collect()
}

/// Match every step of `feature` in document order.
///
/// A failure to match one step never affects its siblings.
#[must_use]
pub fn match_feature(feature: &Feature, candidates: &[PreparedPattern]) -> Vec<MatchResult> {
    feature
        .steps()
        .map(|context| match_step(context, candidates))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialect::resolve_tag;
    use crate::feature::parse_text;
    use crate::normalize::MatcherCache;
    use crate::test_support::{expression_pattern, regex_pattern};
    use rstest::rstest;

    fn results(text: &str, patterns: &[crate::glue::StepDefinitionPattern]) -> Vec<MatchResult> {
        let prepared = MatcherCache::new().prepare(patterns);
        let (feature, _) = parse_text(text);
        feature.map_or_else(Vec::new, |f| match_feature(&f, &prepared.patterns))
    }

    #[rstest]
    #[case("en", "Given a 5 item", "a 5 item")]
    #[case("en", "  And   spaced", "spaced")]
    #[case("fr", "Étant donné que x", "x")]
    #[case("fr", "Soit y", "y")]
    #[case("en", "no keyword here", "no keyword here")]
    fn strips_longest_keyword(#[case] tag: &str, #[case] line: &str, #[case] expected: &str) {
        assert_eq!(text_statement(line, &resolve_tag(tag)), expected);
    }

    #[rstest]
    #[case("Given a 5 item", true)]
    #[case("Given a five item", false)]
    fn validates_concrete_steps(#[case] step: &str, #[case] matched: bool) {
        let text = format!("Feature: f\n  Scenario: s\n    {step}\n");
        let results = results(&text, &[regex_pattern("item", r"^a (\d+) item$")]);
        let [result] = results.as_slice() else {
            panic!("expected one result");
        };
        assert_eq!(result.is_matched(), matched);
    }

    #[test]
    fn captures_are_reported_for_matches() {
        let results = results(
            "Feature: f\n  Scenario: s\n    Given I have 12 cukes\n",
            &[expression_pattern("cukes", "I have {int} cukes")],
        );
        let Some(MatchOutcome::Matched { captures, .. }) = results.first().map(|r| &r.outcome)
        else {
            panic!("expected a match");
        };
        let values: Vec<_> = captures.iter().map(|c| c.value.as_str()).collect();
        assert_eq!(values, ["12"]);
    }

    #[test]
    fn most_specific_definition_wins_then_declaration_order() {
        let results = results(
            "Feature: f\n  Scenario: s\n    Given the output is foo\n",
            &[
                expression_pattern("generic", "the output is {word}"),
                expression_pattern("any", "the output is {}"),
                expression_pattern("literal", "the output is foo"),
                expression_pattern("literal-again", "the output is foo"),
            ],
        );
        let Some(result) = results.first() else {
            panic!("expected a result");
        };
        assert_eq!(result.outcome.pattern_id(), Some(&PatternId::from("literal")));
        let order: Vec<_> = result
            .alternatives
            .iter()
            .map(|a| a.pattern_id.to_string())
            .collect();
        assert_eq!(order, ["literal", "literal-again", "generic", "any"]);
    }

    const OUTLINE: &str = "\
Feature: f
  Scenario Outline: o
    Given the user <name>
    Examples:
      | name |
      | Bob  |
      | b-b  |
";

    #[test]
    fn outline_steps_match_through_rendered_rows_only() {
        let results = results(OUTLINE, &[regex_pattern("user", r"^the user (\w+)$")]);
        let Some(result) = results.first() else {
            panic!("expected a result");
        };
        assert!(result.is_matched());
        let rendered: Vec<_> = result.rows.iter().map(|r| r.rendered.as_str()).collect();
        assert_eq!(rendered, ["the user Bob", "the user b-b"]);
        let flags: Vec<_> = result.rows.iter().map(|r| r.outcome.is_matched()).collect();
        assert_eq!(flags, [true, false]);
        assert_eq!(result.rows.first().map(|r| r.line), Some(6));
    }

    #[test]
    fn outline_without_rows_uses_placeholder_tolerant_matching() {
        let text = "\
Feature: f
  Scenario Outline: o
    Given the <count> items
    Examples:
      | count |
";
        let results = results(text, &[regex_pattern("items", r"^the (\d+) items$")]);
        assert_eq!(results.first().map(MatchResult::is_matched), Some(true));
        assert!(results.first().is_some_and(|r| r.rows.is_empty()));
    }

    #[test]
    fn placeholder_text_outside_outlines_is_matched_literally() {
        let results = results(
            "Feature: f\n  Scenario: s\n    Given the <count> items\n",
            &[regex_pattern("items", r"^the (\d+) items$")],
        );
        assert_eq!(results.first().map(MatchResult::is_matched), Some(false));
    }

    #[test]
    fn disabled_patterns_never_match() {
        let results = results(
            "Feature: f\n  Scenario: s\n    Given (unterminated\n    Given a 1 item\n",
            &[
                regex_pattern("bad", "Given (unterminated"),
                regex_pattern("item", r"^a (\d+) item$"),
            ],
        );
        let flags: Vec<_> = results.iter().map(MatchResult::is_matched).collect();
        assert_eq!(flags, [false, true]);
    }
}
