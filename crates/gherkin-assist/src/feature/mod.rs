//! Positioned feature trees and their recovering parser.
//!
//! [`parse`] turns document text and a resolved [`Dialect`](crate::dialect::Dialect) into a
//! [`Feature`] tree plus the structural problems found on the way. Problems
//! never abort parsing; the parser records a [`ParseError`] and resumes at the
//! next recognisable line so one typo does not blank the whole tree.
//!
//! Trees are immutable once built. Every node carries the 1-based
//! [`Location`] of its first line, and containers carry the last line they
//! cover.

mod docstring;
mod parser;
mod table;

use thiserror::Error;

use crate::dialect::Role;
pub use crate::position::Location;

pub use parser::parse;

/// A `@tag` attached to a feature, rule, scenario or examples block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tag {
    /// Where the tag starts.
    pub location: Location,
    /// Tag text including the leading `@`.
    pub name: String,
}

/// A row of a data table or examples table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableRow {
    /// Where the row starts.
    pub location: Location,
    /// Unescaped, trimmed cell values.
    pub cells: Vec<String>,
}

/// A data table attached to a step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataTable {
    /// Where the first row starts.
    pub location: Location,
    /// Rows in document order.
    pub rows: Vec<TableRow>,
}

/// A doc string attached to a step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocString {
    /// Where the opening delimiter starts.
    pub location: Location,
    /// `"""` or three backticks.
    pub delimiter: String,
    /// Media type written after the opening delimiter.
    pub media_type: Option<String>,
    /// Content with the delimiter indentation removed.
    pub content: String,
    /// Line of the closing delimiter, or the last line when unterminated.
    pub end_line: usize,
}

/// A single step line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Step {
    /// Where the keyword starts.
    pub location: Location,
    /// The keyword exactly as written, including any trailing space.
    pub keyword: String,
    /// Role of the keyword in the document's dialect.
    pub role: Role,
    /// Text after the keyword. Wrapped continuation lines are appended after a
    /// single space.
    pub text: String,
    /// Attached data table.
    pub data_table: Option<DataTable>,
    /// Attached doc string.
    pub doc_string: Option<DocString>,
    /// Last line covered by the step and its arguments.
    pub end_line: usize,
}

impl Step {
    /// Keyword and text joined back into the statement as written.
    #[must_use]
    pub fn statement(&self) -> String {
        format!("{}{}", self.keyword, self.text)
    }
}

/// An `Examples:` block of a scenario outline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Examples {
    /// Where the keyword starts.
    pub location: Location,
    /// Keyword as written.
    pub keyword: String,
    /// Tags preceding the block.
    pub tags: Vec<Tag>,
    /// Name after the colon.
    pub name: String,
    /// Free text under the header.
    pub description: Option<String>,
    /// Column names; `None` until the first row is written.
    pub header: Option<TableRow>,
    /// Substitution rows.
    pub body: Vec<TableRow>,
    /// Last line of the block.
    pub end_line: usize,
}

impl Examples {
    /// Column names, empty when the table has no header yet.
    #[must_use]
    pub fn columns(&self) -> &[String] {
        self.header.as_ref().map_or(&[], |row| row.cells.as_slice())
    }
}

/// A `Background:` block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Background {
    /// Where the keyword starts.
    pub location: Location,
    /// Keyword as written.
    pub keyword: String,
    /// Name after the colon.
    pub name: String,
    /// Free text under the header.
    pub description: Option<String>,
    /// Steps in document order.
    pub steps: Vec<Step>,
    /// Last line of the block.
    pub end_line: usize,
}

/// A scenario or scenario outline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Scenario {
    /// Where the keyword starts.
    pub location: Location,
    /// Keyword as written.
    pub keyword: String,
    /// Whether the header used an outline keyword.
    pub outline_keyword: bool,
    /// Tags preceding the header.
    pub tags: Vec<Tag>,
    /// Name after the colon.
    pub name: String,
    /// Free text under the header.
    pub description: Option<String>,
    /// Steps in document order.
    pub steps: Vec<Step>,
    /// Examples blocks; non-empty for outlines.
    pub examples: Vec<Examples>,
    /// Last line of the scenario including its examples.
    pub end_line: usize,
}

impl Scenario {
    /// Whether steps must be rendered against examples rows before matching.
    #[must_use]
    pub fn is_outline(&self) -> bool {
        self.outline_keyword || !self.examples.is_empty()
    }
}

/// Children of a rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuleChild {
    /// A background scoped to the rule.
    Background(Background),
    /// A scenario or outline.
    Scenario(Scenario),
}

/// A `Rule:` block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rule {
    /// Where the keyword starts.
    pub location: Location,
    /// Keyword as written.
    pub keyword: String,
    /// Tags preceding the header.
    pub tags: Vec<Tag>,
    /// Name after the colon.
    pub name: String,
    /// Free text under the header.
    pub description: Option<String>,
    /// Children in document order.
    pub children: Vec<RuleChild>,
    /// Last line of the rule.
    pub end_line: usize,
}

/// Children of a feature.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeatureChild {
    /// A background.
    Background(Background),
    /// A rule.
    Rule(Rule),
    /// A scenario or outline.
    Scenario(Scenario),
}

/// Root of a parsed document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Feature {
    /// Where the keyword starts. Synthesised features use the location of the
    /// line that forced them.
    pub location: Location,
    /// Language tag of the dialect used for parsing.
    pub language: String,
    /// Keyword as written, or the dialect's first feature keyword when
    /// synthesised.
    pub keyword: String,
    /// Tags preceding the header.
    pub tags: Vec<Tag>,
    /// Name after the colon.
    pub name: String,
    /// Free text under the header.
    pub description: Option<String>,
    /// Children in document order.
    pub children: Vec<FeatureChild>,
    /// Last line of the feature.
    pub end_line: usize,
}

/// A step together with the scenario and rule that own it.
#[derive(Debug, Clone, Copy)]
pub struct StepContext<'a> {
    /// The step.
    pub step: &'a Step,
    /// Owning scenario; `None` for background steps.
    pub scenario: Option<&'a Scenario>,
    /// Enclosing rule, if any.
    pub rule: Option<&'a Rule>,
}

impl Feature {
    /// Every step in document order with its owners.
    pub fn steps(&self) -> impl Iterator<Item = StepContext<'_>> {
        let mut collected = Vec::new();
        for child in &self.children {
            match child {
                FeatureChild::Background(background) => {
                    push_steps(&mut collected, &background.steps, None, None);
                }
                FeatureChild::Scenario(scenario) => {
                    push_steps(&mut collected, &scenario.steps, Some(scenario), None);
                }
                FeatureChild::Rule(rule) => {
                    for rule_child in &rule.children {
                        match rule_child {
                            RuleChild::Background(background) => {
                                push_steps(&mut collected, &background.steps, None, Some(rule));
                            }
                            RuleChild::Scenario(scenario) => push_steps(
                                &mut collected,
                                &scenario.steps,
                                Some(scenario),
                                Some(rule),
                            ),
                        }
                    }
                }
            }
        }
        collected.into_iter()
    }

    /// Every scenario in document order, including those inside rules.
    pub fn scenarios(&self) -> impl Iterator<Item = &Scenario> {
        self.children.iter().flat_map(|child| {
            let scenarios: Vec<&Scenario> = match child {
                FeatureChild::Scenario(scenario) => vec![scenario],
                FeatureChild::Rule(rule) => rule
                    .children
                    .iter()
                    .filter_map(|c| match c {
                        RuleChild::Scenario(s) => Some(s),
                        RuleChild::Background(_) => None,
                    })
                    .collect(),
                FeatureChild::Background(_) => Vec::new(),
            };
            scenarios
        })
    }
}

fn push_steps<'a>(
    out: &mut Vec<StepContext<'a>>,
    steps: &'a [Step],
    scenario: Option<&'a Scenario>,
    rule: Option<&'a Rule>,
) {
    out.extend(steps.iter().map(|step| StepContext {
        step,
        scenario,
        rule,
    }));
}

/// What went wrong on a line the parser could not place.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseErrorKind {
    /// A block appeared before any feature header; an anonymous feature was
    /// assumed.
    #[error("expected a feature header before this line")]
    MissingFeature,
    /// A second feature header.
    #[error("only one feature is allowed per document")]
    DuplicateFeature,
    /// An `Examples:` header outside a scenario.
    #[error("examples are only allowed inside a scenario outline")]
    MisplacedExamples,
    /// A step outside a scenario or background, or after examples.
    #[error("step is not inside a scenario or background")]
    MisplacedStep,
    /// A table row with nothing to attach to.
    #[error("table row is not attached to a step or examples header")]
    OrphanTableRow,
    /// A doc string with nothing to attach to.
    #[error("doc string is not attached to a step")]
    OrphanDocString,
    /// A doc string missing its closing delimiter.
    #[error("doc string opened here is never closed")]
    UnterminatedDocString,
    /// A table row whose cell count differs from the first row.
    #[error("expected {expected} cells but found {found}")]
    InconsistentCellCount {
        /// Cells in the first row.
        expected: usize,
        /// Cells in this row.
        found: usize,
    },
    /// A line that is not a keyword, row, tag or comment.
    #[error("unexpected text `{0}`")]
    UnexpectedText(String),
}

/// A recoverable structural problem.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{location}: {kind}")]
pub struct ParseError {
    /// Where the problem was found.
    pub location: Location,
    /// What went wrong.
    pub kind: ParseErrorKind,
}

/// Parse with the dialect declared by the text itself.
///
/// # Examples
/// ```
/// use gherkin_assist::feature::parse_text;
/// let (feature, errors) = parse_text("Feature: f\n  Scenario: s\n    Given a step\n");
/// assert!(errors.is_empty());
/// assert_eq!(feature.map(|f| f.steps().count()), Some(1));
/// ```
#[must_use]
pub fn parse_text(text: &str) -> (Option<Feature>, Vec<ParseError>) {
    let dialect = crate::dialect::resolve(text);
    parse(text, &dialect)
}

