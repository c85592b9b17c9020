//! Single-pass, line-oriented parser with error recovery.
//!
//! Open constructs are owned by the parser and attached to their parent when
//! the next sibling or ancestor keyword closes them, or at end of input.

use crate::dialect::{Dialect, Role};
use crate::position::{Location, Terminator, split_lines};

use super::docstring::{DocStringBuilder, opening};
use super::table::split_cells;
use super::{
    Background, DataTable, DocString, Examples, Feature, FeatureChild, ParseError,
    ParseErrorKind, Rule, RuleChild, Scenario, Step, TableRow, Tag,
};

/// Parse `text` with `dialect`.
///
/// Returns the recovered tree, which is `None` only when the text has no
/// structural keyword at all, and every problem found in document order.
/// Constructs still open at the end are closed at the last line; the empty
/// remainder after a final line terminator does not count as a line.
#[must_use]
pub fn parse(text: &str, dialect: &Dialect) -> (Option<Feature>, Vec<ParseError>) {
    let mut parser = Parser::new(dialect);
    let mut last_line = 1;
    for (index, line) in split_lines(text).enumerate() {
        let number = index + 1;
        if number > 1 && line.terminator == Terminator::None && line.content.is_empty() {
            break;
        }
        last_line = number;
        parser.line(number, line.content);
    }
    parser.finish(last_line)
}

#[derive(Debug)]
enum Block {
    Background(Background),
    Scenario(Scenario),
}

#[derive(Debug, Clone, Copy)]
enum DescriptionTarget {
    Feature,
    Rule,
    Block,
    Examples,
}

struct Parser<'d> {
    dialect: &'d Dialect,
    feature: Option<Feature>,
    rule: Option<Rule>,
    block: Option<Block>,
    examples: Option<Examples>,
    step: Option<Step>,
    step_column: usize,
    doc: Option<DocStringBuilder>,
    tags: Vec<Tag>,
    description: Option<DescriptionTarget>,
    last_content_line: usize,
    errors: Vec<ParseError>,
}

impl<'d> Parser<'d> {
    fn new(dialect: &'d Dialect) -> Self {
        Self {
            dialect,
            feature: None,
            rule: None,
            block: None,
            examples: None,
            step: None,
            step_column: 0,
            doc: None,
            tags: Vec::new(),
            description: None,
            last_content_line: 0,
            errors: Vec::new(),
        }
    }

    fn error(&mut self, location: Location, kind: ParseErrorKind) {
        self.errors.push(ParseError { location, kind });
    }

    fn line(&mut self, number: usize, raw: &str) {
        if let Some(doc) = self.doc.as_mut() {
            if doc.is_closing(raw.trim()) {
                self.close_doc(number);
            } else {
                doc.push_line(raw);
            }
            return;
        }

        let trimmed = raw.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            return;
        }
        let column = raw.chars().take_while(|c| c.is_whitespace()).count() + 1;
        let location = Location::new(number, column);
        let dialect = self.dialect;

        if trimmed.starts_with('@') {
            self.description = None;
            self.tag_line(number, raw);
        } else if trimmed.starts_with('|') {
            self.description = None;
            self.table_row(location, trimmed);
        } else if let Some((delimiter, media_type)) = opening(trimmed) {
            self.description = None;
            self.open_doc(location, delimiter, media_type);
        } else if let Some((role, keyword, rest)) = dialect.match_structural_keyword(trimmed) {
            self.description = None;
            self.header(location, role, keyword, rest.trim());
        } else if let Some(keyword) = dialect.match_step_keyword(trimmed) {
            self.description = None;
            let text = trimmed.get(keyword.text.len()..).unwrap_or_default();
            self.step_line(location, &keyword.text, keyword.role, text);
        } else {
            self.free_text(location, trimmed);
        }
    }

    fn tag_line(&mut self, line: usize, raw: &str) {
        let mut current: Option<(usize, String)> = None;
        for (index, ch) in raw.chars().enumerate() {
            if ch.is_whitespace() {
                if let Some((column, name)) = current.take() {
                    self.push_tag(line, column, name);
                }
                continue;
            }
            match current.as_mut() {
                Some((_, name)) => name.push(ch),
                None if ch == '#' => break,
                None => current = Some((index + 1, ch.to_string())),
            }
        }
        if let Some((column, name)) = current {
            self.push_tag(line, column, name);
        }
    }

    fn push_tag(&mut self, line: usize, column: usize, name: String) {
        if name.starts_with('@') {
            self.tags.push(Tag {
                location: Location::new(line, column),
                name,
            });
        }
    }

    fn table_row(&mut self, location: Location, trimmed: &str) {
        let row = TableRow {
            location,
            cells: split_cells(trimmed),
        };
        let found = row.cells.len();
        let mut expected = None;
        let mut placed = false;

        if let Some(step) = self.step.as_mut().filter(|s| s.doc_string.is_none()) {
            let table = step.data_table.get_or_insert_with(|| DataTable {
                location,
                rows: Vec::new(),
            });
            expected = table.rows.first().map(|first| first.cells.len());
            table.rows.push(row);
            step.end_line = location.line;
            placed = true;
        } else if let Some(examples) = self.examples.as_mut() {
            match examples.header.as_ref().map(|header| header.cells.len()) {
                None => examples.header = Some(row),
                Some(columns) => {
                    expected = Some(columns);
                    examples.body.push(row);
                }
            }
            examples.end_line = location.line;
            placed = true;
        }

        if !placed {
            self.error(location, ParseErrorKind::OrphanTableRow);
            return;
        }
        self.last_content_line = location.line;
        if let Some(expected) = expected.filter(|&n| n != found) {
            self.error(
                location,
                ParseErrorKind::InconsistentCellCount { expected, found },
            );
        }
    }

    fn open_doc(&mut self, location: Location, delimiter: &'static str, media_type: Option<String>) {
        let attached = self
            .step
            .as_ref()
            .is_some_and(|s| s.doc_string.is_none() && s.data_table.is_none());
        if !attached {
            self.error(location, ParseErrorKind::OrphanDocString);
        }
        self.doc = Some(DocStringBuilder::new(
            delimiter,
            media_type,
            location.line,
            location.column,
            attached,
        ));
    }

    fn close_doc(&mut self, end_line: usize) {
        let Some(doc) = self.doc.take() else {
            return;
        };
        if !doc.attached {
            return;
        }
        if let Some(step) = self.step.as_mut() {
            step.doc_string = Some(DocString {
                location: Location::new(doc.line, doc.column),
                delimiter: doc.delimiter.to_owned(),
                media_type: doc.media_type.clone(),
                content: doc.content(),
                end_line,
            });
            step.end_line = end_line;
        }
        self.last_content_line = end_line;
    }

    fn header(&mut self, location: Location, role: Role, keyword: &str, name: &str) {
        let end = self.last_content_line;
        let keyword = keyword.to_owned();
        let name = name.to_owned();
        match role {
            Role::Feature => {
                if self.feature.is_some() {
                    self.error(location, ParseErrorKind::DuplicateFeature);
                    return;
                }
                self.feature = Some(Feature {
                    location,
                    language: self.dialect.language().to_owned(),
                    keyword,
                    tags: std::mem::take(&mut self.tags),
                    name,
                    description: None,
                    children: Vec::new(),
                    end_line: location.line,
                });
                self.description = Some(DescriptionTarget::Feature);
            }
            Role::Rule => {
                self.ensure_feature(location);
                self.close_rule(end);
                self.rule = Some(Rule {
                    location,
                    keyword,
                    tags: std::mem::take(&mut self.tags),
                    name,
                    description: None,
                    children: Vec::new(),
                    end_line: location.line,
                });
                self.description = Some(DescriptionTarget::Rule);
            }
            Role::Background => {
                self.ensure_feature(location);
                self.close_block(end);
                self.tags.clear();
                self.block = Some(Block::Background(Background {
                    location,
                    keyword,
                    name,
                    description: None,
                    steps: Vec::new(),
                    end_line: location.line,
                }));
                self.description = Some(DescriptionTarget::Block);
            }
            Role::Examples => {
                if !matches!(self.block, Some(Block::Scenario(_))) {
                    self.error(location, ParseErrorKind::MisplacedExamples);
                    return;
                }
                self.close_step(end);
                self.close_examples(end);
                self.examples = Some(Examples {
                    location,
                    keyword,
                    tags: std::mem::take(&mut self.tags),
                    name,
                    description: None,
                    header: None,
                    body: Vec::new(),
                    end_line: location.line,
                });
                self.description = Some(DescriptionTarget::Examples);
            }
            _ => {
                self.ensure_feature(location);
                self.close_block(end);
                self.block = Some(Block::Scenario(Scenario {
                    location,
                    keyword,
                    outline_keyword: role == Role::ScenarioOutline,
                    tags: std::mem::take(&mut self.tags),
                    name,
                    description: None,
                    steps: Vec::new(),
                    examples: Vec::new(),
                    end_line: location.line,
                }));
                self.description = Some(DescriptionTarget::Block);
            }
        }
        self.last_content_line = location.line;
    }

    /// Synthesise an anonymous feature when a block appears before any
    /// feature header.
    fn ensure_feature(&mut self, location: Location) {
        if self.feature.is_some() {
            return;
        }
        self.error(location, ParseErrorKind::MissingFeature);
        self.feature = Some(Feature {
            location,
            language: self.dialect.language().to_owned(),
            keyword: self
                .dialect
                .structural_keyword(Role::Feature)
                .unwrap_or_default()
                .to_owned(),
            tags: Vec::new(),
            name: String::new(),
            description: None,
            children: Vec::new(),
            end_line: location.line,
        });
    }

    fn step_line(&mut self, location: Location, keyword: &str, role: Role, text: &str) {
        if self.block.is_none() || self.examples.is_some() {
            self.error(location, ParseErrorKind::MisplacedStep);
            return;
        }
        let end = self.last_content_line;
        self.close_step(end);
        self.tags.clear();
        self.step = Some(Step {
            location,
            keyword: keyword.to_owned(),
            role,
            text: text.to_owned(),
            data_table: None,
            doc_string: None,
            end_line: location.line,
        });
        self.step_column = location.column;
        self.last_content_line = location.line;
    }

    fn free_text(&mut self, location: Location, trimmed: &str) {
        if let Some(target) = self.description {
            self.append_description(target, trimmed);
            self.last_content_line = location.line;
            return;
        }
        let step_column = self.step_column;
        if let Some(step) = self.step.as_mut().filter(|s| {
            location.column > step_column && s.data_table.is_none() && s.doc_string.is_none()
        }) {
            step.text.push(' ');
            step.text.push_str(trimmed);
            step.end_line = location.line;
            self.last_content_line = location.line;
            return;
        }
        self.error(location, ParseErrorKind::UnexpectedText(trimmed.to_owned()));
    }

    fn append_description(&mut self, target: DescriptionTarget, text: &str) {
        let slot = match target {
            DescriptionTarget::Feature => self.feature.as_mut().map(|f| &mut f.description),
            DescriptionTarget::Rule => self.rule.as_mut().map(|r| &mut r.description),
            DescriptionTarget::Examples => self.examples.as_mut().map(|e| &mut e.description),
            DescriptionTarget::Block => match self.block.as_mut() {
                Some(Block::Background(b)) => Some(&mut b.description),
                Some(Block::Scenario(s)) => Some(&mut s.description),
                None => None,
            },
        };
        let Some(slot) = slot else {
            return;
        };
        match slot {
            Some(description) => {
                description.push('\n');
                description.push_str(text);
            }
            None => *slot = Some(text.to_owned()),
        }
    }

    fn close_step(&mut self, end: usize) {
        let Some(mut step) = self.step.take() else {
            return;
        };
        step.end_line = step.end_line.max(end);
        match self.block.as_mut() {
            Some(Block::Background(background)) => background.steps.push(step),
            Some(Block::Scenario(scenario)) => scenario.steps.push(step),
            None => {}
        }
    }

    fn close_examples(&mut self, end: usize) {
        let Some(mut examples) = self.examples.take() else {
            return;
        };
        examples.end_line = examples.end_line.max(end);
        if let Some(Block::Scenario(scenario)) = self.block.as_mut() {
            scenario.examples.push(examples);
        }
    }

    fn close_block(&mut self, end: usize) {
        self.close_step(end);
        self.close_examples(end);
        let Some(block) = self.block.take() else {
            return;
        };
        if let Some(rule) = self.rule.as_mut() {
            rule.children.push(match block {
                Block::Background(mut b) => {
                    b.end_line = b.end_line.max(end);
                    RuleChild::Background(b)
                }
                Block::Scenario(mut s) => {
                    s.end_line = s.end_line.max(end);
                    RuleChild::Scenario(s)
                }
            });
        } else if let Some(feature) = self.feature.as_mut() {
            feature.children.push(match block {
                Block::Background(mut b) => {
                    b.end_line = b.end_line.max(end);
                    FeatureChild::Background(b)
                }
                Block::Scenario(mut s) => {
                    s.end_line = s.end_line.max(end);
                    FeatureChild::Scenario(s)
                }
            });
        }
    }

    fn close_rule(&mut self, end: usize) {
        self.close_block(end);
        let Some(mut rule) = self.rule.take() else {
            return;
        };
        rule.end_line = rule.end_line.max(end);
        if let Some(feature) = self.feature.as_mut() {
            feature.children.push(FeatureChild::Rule(rule));
        }
    }

    /// Force-close every open construct at the last line of the document.
    fn finish(mut self, last_line: usize) -> (Option<Feature>, Vec<ParseError>) {
        if let Some(doc) = self.doc.as_ref() {
            let location = Location::new(doc.line, doc.column);
            self.error(location, ParseErrorKind::UnterminatedDocString);
            self.close_doc(last_line);
        }
        self.close_rule(last_line);
        if let Some(feature) = self.feature.as_mut() {
            feature.end_line = feature.end_line.max(last_line);
        }
        (self.feature, self.errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialect::resolve_tag;
    use crate::feature::{FeatureChild, parse_text};
    use rstest::rstest;

    fn parse_en(text: &str) -> (Feature, Vec<ParseError>) {
        let (feature, errors) = parse(text, &resolve_tag("en"));
        let Some(feature) = feature else {
            panic!("expected a feature for {text:?}");
        };
        (feature, errors)
    }

    fn only_scenario(feature: &Feature) -> &Scenario {
        let mut scenarios = feature.scenarios();
        let Some(scenario) = scenarios.next() else {
            panic!("expected a scenario");
        };
        assert!(scenarios.next().is_none(), "expected a single scenario");
        scenario
    }

    const FULL: &str = "\
@billing @smoke
Feature: Checkout
  As a shopper
  I want to pay

  Background:
    Given an empty basket

  Rule: Discounts apply
    @outline
    Scenario Outline: buying <count> items
      Given I add <count> items
      When I check out
        \"\"\"json
        {\"express\": true}
        \"\"\"
      Then I pay <price>

      Examples: small
        | count | price |
        | 1     | 10    |
        | 2     | 20    |

  Scenario: with a table
    Given the prices:
      | item | cost |
      | tea  | 3    |
    But nothing else
";

    #[test]
    fn parses_a_complete_feature() {
        let (feature, errors) = parse_en(FULL);
        assert!(errors.is_empty(), "unexpected errors: {errors:?}");
        assert_eq!(feature.name, "Checkout");
        assert_eq!(feature.language, "en");
        assert_eq!(feature.description.as_deref(), Some("As a shopper\nI want to pay"));
        let tags: Vec<_> = feature.tags.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(tags, ["@billing", "@smoke"]);
        assert_eq!(feature.children.len(), 2);

        let Some(FeatureChild::Rule(rule)) = feature.children.get(1) else {
            panic!("expected a rule");
        };
        assert_eq!(rule.name, "Discounts apply");
        let Some(RuleChild::Scenario(outline)) = rule.children.first() else {
            panic!("expected an outline");
        };
        assert!(outline.is_outline());
        assert_eq!(outline.tags.first().map(|t| t.name.as_str()), Some("@outline"));
        assert_eq!(outline.steps.len(), 3);
        let Some(examples) = outline.examples.first() else {
            panic!("expected examples");
        };
        assert_eq!(examples.columns(), ["count", "price"]);
        assert_eq!(examples.body.len(), 2);
        let Some(doc) = outline.steps.get(1).and_then(|s| s.doc_string.as_ref()) else {
            panic!("expected a doc string");
        };
        assert_eq!(doc.media_type.as_deref(), Some("json"));
        assert_eq!(doc.content, "{\"express\": true}");
        assert_eq!(outline.end_line, 22);
        assert_eq!(rule.children.len(), 2);
        assert_eq!(rule.end_line, 28);

        let steps: Vec<_> = feature.steps().map(|c| c.step.text.as_str()).collect();
        assert_eq!(
            steps,
            [
                "an empty basket",
                "I add <count> items",
                "I check out",
                "I pay <price>",
                "the prices:",
                "nothing else"
            ]
        );
    }

    #[test]
    fn step_statements_round_trip() {
        let (feature, _) = parse_en(FULL);
        let lines: Vec<&str> = FULL.lines().collect();
        for context in feature.steps() {
            let step = context.step;
            let Some(line) = lines.get(step.location.line - 1) else {
                panic!("step line out of range");
            };
            assert_eq!(step.statement(), line.trim());
        }
    }

    #[test]
    fn locations_never_go_backwards() {
        let (feature, _) = parse_en(FULL);
        let lines: Vec<usize> = feature.steps().map(|c| c.step.location.line).collect();
        assert!(lines.windows(2).all(|w| matches!(w, [a, b] if a <= b)));
    }

    #[test]
    fn data_tables_attach_to_their_step() {
        let (feature, _) = parse_en(FULL);
        let Some(context) = feature.steps().find(|c| c.step.text == "the prices:") else {
            panic!("expected the table step");
        };
        let Some(table) = context.step.data_table.as_ref() else {
            panic!("expected a data table");
        };
        assert_eq!(table.rows.len(), 2);
        assert_eq!(context.step.end_line, 27);
    }

    #[test]
    fn scenario_before_feature_synthesises_one() {
        let (feature, errors) = parse_en("Scenario: loose\n  Given a step\n");
        assert_eq!(errors.len(), 1);
        assert!(matches!(
            errors.first().map(|e| &e.kind),
            Some(ParseErrorKind::MissingFeature)
        ));
        assert_eq!(feature.keyword, "Feature");
        assert_eq!(only_scenario(&feature).steps.len(), 1);
    }

    #[test]
    fn deeper_text_wraps_the_previous_step() {
        let (feature, errors) =
            parse_en("Feature: f\n  Scenario: s\n    Given a very long\n      step text\n");
        assert!(errors.is_empty());
        let scenario = only_scenario(&feature);
        let Some(step) = scenario.steps.first() else {
            panic!("expected a step");
        };
        assert_eq!(step.text, "a very long step text");
        assert_eq!(step.end_line, 4);
    }

    #[test]
    fn text_at_step_indentation_is_an_error_and_parsing_continues() {
        let (feature, errors) = parse_en(
            "Feature: f\n  Scenario: s\n    Given one\n    Gvien typo\n    Then two\n",
        );
        assert_eq!(errors.len(), 1);
        let Some(error) = errors.first() else {
            panic!("expected an error");
        };
        assert_eq!(error.location, Location::new(4, 5));
        assert_eq!(only_scenario(&feature).steps.len(), 2);
    }

    #[rstest]
    #[case("Feature: f\n  | a | b |\n", ParseErrorKind::OrphanTableRow)]
    #[case("Feature: f\n  Given loose\n", ParseErrorKind::MisplacedStep)]
    #[case("Feature: f\nFeature: g\n", ParseErrorKind::DuplicateFeature)]
    #[case("Feature: f\n  Examples:\n", ParseErrorKind::MisplacedExamples)]
    #[case(
        "Feature: f\n  Scenario: s\n    Given t\n      | a | b |\n      | c |\n",
        ParseErrorKind::InconsistentCellCount { expected: 2, found: 1 }
    )]
    fn records_structural_errors(#[case] text: &str, #[case] expected: ParseErrorKind) {
        let (_, errors) = parse_en(text);
        let kinds: Vec<_> = errors.into_iter().map(|e| e.kind).collect();
        assert_eq!(kinds, [expected]);
    }

    #[test]
    fn unterminated_doc_string_closes_at_eof() {
        let text = "Feature: f\n  Scenario: s\n    Given t\n      \"\"\"\n      body\n";
        let (feature, errors) = parse_en(text);
        assert!(matches!(
            errors.first().map(|e| &e.kind),
            Some(ParseErrorKind::UnterminatedDocString)
        ));
        let scenario = only_scenario(&feature);
        assert_eq!(scenario.end_line, 5);
        assert_eq!(feature.end_line, 5);
        let Some(doc) = scenario.steps.first().and_then(|s| s.doc_string.as_ref()) else {
            panic!("expected a doc string");
        };
        assert_eq!(doc.content, "body");
    }

    #[test]
    fn open_constructs_end_at_the_last_line() {
        let (feature, errors) = parse_en("Feature: f\r\n  Scenario: s\r\n    Given t");
        assert!(errors.is_empty());
        assert_eq!(only_scenario(&feature).end_line, 3);
        assert_eq!(feature.end_line, 3);
    }

    #[test]
    fn scenarios_close_at_the_next_sibling() {
        let (feature, _) = parse_en(
            "Feature: f\n  Scenario: a\n    Given x\n  Scenario: b\n    Given y\n",
        );
        let names: Vec<_> = feature.scenarios().map(|s| s.name.as_str()).collect();
        assert_eq!(names, ["a", "b"]);
        let ends: Vec<_> = feature.scenarios().map(|s| s.end_line).collect();
        assert_eq!(ends, [3, 5]);
    }

    #[rstest]
    #[case("Feature: f\n  Scenario: s\n    Given t\n", 3)]
    #[case("Feature: f\n  Scenario: s\n    Given t\r\n\r\n", 4)]
    #[case("Feature: f\n  Scenario: s\n    Given t", 3)]
    fn a_final_terminator_does_not_add_a_line(#[case] text: &str, #[case] end: usize) {
        let (feature, _) = parse_en(text);
        let scenario = only_scenario(&feature);
        assert_eq!(scenario.end_line, end);
        assert_eq!(scenario.steps.first().map(|s| s.end_line), Some(end));
        assert_eq!(feature.end_line, end);
    }

    #[test]
    fn parses_declared_dialects() {
        let (feature, errors) = parse_text(
            "# language: fr\nFonctionnalité: panier\n  Scénario: vide\n    Soit un panier\n    Et qu'il est vide\n",
        );
        assert!(errors.is_empty());
        let Some(feature) = feature else {
            panic!("expected a feature");
        };
        assert_eq!(feature.language, "fr");
        let keywords: Vec<_> = feature.steps().map(|c| c.step.keyword.clone()).collect();
        assert_eq!(keywords, ["Soit ", "Et qu'"]);

        let (feature, _) = parse_text("# language: zh-CN\n功能: 计算\n  场景: 加法\n    当执行\n");
        let Some(feature) = feature else {
            panic!("expected a feature");
        };
        let Some(step) = feature.steps().next() else {
            panic!("expected a step");
        };
        assert_eq!(step.step.keyword, "当");
        assert_eq!(step.step.text, "执行");
    }

    #[test]
    fn english_keywords_are_not_steps_in_other_dialects() {
        let (_, errors) = parse_text(
            "# language: de\nFunktionalität: f\n  Szenario: s\n    Angenommen y\n    Given x\n",
        );
        assert!(matches!(
            errors.first().map(|e| &e.kind),
            Some(ParseErrorKind::UnexpectedText(_))
        ));
    }

    #[test]
    fn text_without_keywords_has_no_tree() {
        let (feature, errors) = parse("just prose", &resolve_tag("en"));
        assert!(feature.is_none());
        assert_eq!(errors.len(), 1);
    }
}
