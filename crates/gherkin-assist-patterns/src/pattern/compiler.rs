//! Convert lexed expression tokens into anchored regular-expression sources.

use crate::errors::{PatternError, expression_error};
use crate::parameter::parameter_type_pattern;

use super::PLACEHOLDER_TOKEN;
use super::lexer::{Token, lex_expression};

/// Structural node of a typed expression after alternations are grouped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Node {
    Text(String),
    Optional(String),
    Alternation(Vec<Vec<Node>>),
    Parameter { start: usize, name: String },
}

/// Which matcher flavour a regex source is generated for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Flavour {
    /// Parameters accept only values of their declared type.
    Exact,
    /// Parameters also accept an unresolved `<name>` outline token.
    PlaceholderTolerant,
    /// Parameters accept any text.
    Relaxed,
}

pub(crate) fn parse_expression(pattern: &str) -> Result<Vec<Node>, PatternError> {
    let tokens = lex_expression(pattern)?;
    let mut nodes = Vec::with_capacity(tokens.len());
    let mut segment: Vec<Token> = Vec::new();

    for token in tokens {
        match token {
            Token::Text(_) | Token::Optional { .. } | Token::Slash { .. } => segment.push(token),
            Token::Whitespace(run) => {
                flush_segment(&mut segment, &mut nodes)?;
                nodes.push(Node::Text(run));
            }
            Token::Parameter { start, name } => {
                flush_segment(&mut segment, &mut nodes)?;
                nodes.push(Node::Parameter { start, name });
            }
        }
    }
    flush_segment(&mut segment, &mut nodes)?;
    Ok(nodes)
}

/// Turn a whitespace-delimited run of tokens into nodes, grouping `a/b`
/// alternations.
fn flush_segment(segment: &mut Vec<Token>, nodes: &mut Vec<Node>) -> Result<(), PatternError> {
    let tokens = std::mem::take(segment);
    if !tokens.iter().any(|t| matches!(t, Token::Slash { .. })) {
        nodes.extend(tokens.into_iter().filter_map(simple_node));
        return Ok(());
    }

    let mut alternatives = Vec::new();
    let mut current: Vec<Node> = Vec::new();
    let mut last_slash = 0usize;
    for token in tokens {
        if let Token::Slash { index } = token {
            alternatives.push(checked_alternative(std::mem::take(&mut current), index)?);
            last_slash = index;
        } else if let Some(node) = simple_node(token) {
            current.push(node);
        }
    }
    alternatives.push(checked_alternative(current, last_slash)?);
    nodes.push(Node::Alternation(alternatives));
    Ok(())
}

fn simple_node(token: Token) -> Option<Node> {
    match token {
        Token::Text(text) | Token::Whitespace(text) => Some(Node::Text(text)),
        Token::Optional { text, .. } => Some(Node::Optional(text)),
        Token::Parameter { start, name } => Some(Node::Parameter { start, name }),
        Token::Slash { .. } => None,
    }
}

fn checked_alternative(alternative: Vec<Node>, index: usize) -> Result<Vec<Node>, PatternError> {
    if alternative.is_empty() {
        return Err(expression_error("alternative may not be empty", index, None));
    }
    if alternative.iter().all(|n| matches!(n, Node::Optional(_))) {
        return Err(expression_error(
            "alternative may not exclusively contain optional text",
            index,
            None,
        ));
    }
    Ok(alternative)
}

/// Emit an anchored regex source for already-parsed nodes.
pub(crate) fn emit_regex(nodes: &[Node], flavour: Flavour) -> Result<String, PatternError> {
    let mut regex = String::with_capacity(nodes.len().saturating_mul(8).saturating_add(2));
    regex.push('^');
    emit_nodes(nodes, flavour, &mut regex)?;
    regex.push('$');
    Ok(regex)
}

fn emit_nodes(nodes: &[Node], flavour: Flavour, regex: &mut String) -> Result<(), PatternError> {
    for node in nodes {
        match node {
            Node::Text(text) => regex.push_str(&regex::escape(text)),
            Node::Optional(text) => {
                regex.push_str("(?:");
                regex.push_str(&regex::escape(text));
                regex.push_str(")?");
            }
            Node::Alternation(alternatives) => {
                regex.push_str("(?:");
                for (i, alternative) in alternatives.iter().enumerate() {
                    if i > 0 {
                        regex.push('|');
                    }
                    emit_nodes(alternative, flavour, regex)?;
                }
                regex.push(')');
            }
            Node::Parameter { start, name } => {
                let fragment = parameter_type_pattern(name).ok_or_else(|| {
                    PatternError::UndefinedParameterType {
                        name: name.clone(),
                        position: *start,
                    }
                })?;
                regex.push('(');
                match flavour {
                    Flavour::Exact => regex.push_str(fragment),
                    Flavour::PlaceholderTolerant => {
                        regex.push_str(PLACEHOLDER_TOKEN);
                        regex.push('|');
                        regex.push_str(fragment);
                    }
                    Flavour::Relaxed => regex.push_str(".*?"),
                }
                regex.push(')');
            }
        }
    }
    Ok(())
}

/// Build an anchored regular expression from a typed step expression.
///
/// # Errors
/// Returns [`PatternError`] when the expression is malformed or names an
/// undefined parameter type.
///
/// # Examples
/// ```
/// use gherkin_assist_patterns::build_regex_from_expression;
/// let regex = build_regex_from_expression("I have {int} cucumber(s)")
///     .unwrap_or_default();
/// assert_eq!(regex, r"^I have ([+-]?\d+) cucumber(?:s)?$");
/// ```
pub fn build_regex_from_expression(pattern: &str) -> Result<String, PatternError> {
    let nodes = parse_expression(pattern)?;
    emit_regex(&nodes, Flavour::Exact)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build(pattern: &str, flavour: Flavour) -> String {
        let nodes = parse_expression(pattern)
            .unwrap_or_else(|err| panic!("expression should parse: {err}"));
        emit_regex(&nodes, flavour).unwrap_or_else(|err| panic!("regex should build: {err}"))
    }

    #[test]
    fn builds_literal_expression() {
        assert_eq!(build("I run a test", Flavour::Exact), "^I run a test$");
    }

    #[test]
    fn escapes_regex_metacharacters_in_text() {
        assert_eq!(build("costs $5.00?", Flavour::Exact), r"^costs \$5\.00\?$");
    }

    #[test]
    fn groups_word_alternations() {
        assert_eq!(
            build("I eat cucumber/gherkin", Flavour::Exact),
            "^I eat (?:cucumber|gherkin)$"
        );
    }

    #[test]
    fn tolerant_flavour_accepts_outline_tokens() {
        assert_eq!(
            build("I have {int}", Flavour::PlaceholderTolerant),
            r"^I have (<[^>]+>|[+-]?\d+)$"
        );
    }

    #[test]
    fn relaxed_flavour_ignores_parameter_types() {
        assert_eq!(build("I have {int}", Flavour::Relaxed), "^I have (.*?)$");
    }

    #[test]
    fn errors_on_undefined_parameter_type() {
        let Err(err) = build_regex_from_expression("I have a {color} ball") else {
            panic!("should fail");
        };
        assert!(matches!(
            err,
            PatternError::UndefinedParameterType { ref name, position: 9 } if name == "color"
        ));
    }

    #[test]
    fn errors_on_empty_alternative() {
        let Err(err) = build_regex_from_expression("a/ b") else {
            panic!("should fail");
        };
        assert!(err.to_string().contains("alternative may not be empty"));
    }

    #[test]
    fn errors_on_unterminated_parameter() {
        let Err(err) = build_regex_from_expression("broken {int") else {
            panic!("should fail");
        };
        assert!(err.to_string().contains("missing closing '}' for parameter"));
    }
}
