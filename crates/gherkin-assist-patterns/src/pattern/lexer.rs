//! Expression lexer converting typed step expressions into semantic tokens.

use crate::errors::{PatternError, expression_error};

use super::parameter::{parse_optional, parse_parameter};

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Token {
    Text(String),
    Whitespace(String),
    Parameter { start: usize, name: String },
    Optional { start: usize, text: String },
    Slash { index: usize },
}

pub(crate) fn lex_expression(pattern: &str) -> Result<Vec<Token>, PatternError> {
    let mut tokens = Vec::new();
    let mut text = String::new();
    let mut chars = pattern.char_indices().peekable();

    let flush_text = |text: &mut String, tokens: &mut Vec<Token>| {
        if !text.is_empty() {
            tokens.push(Token::Text(std::mem::take(text)));
        }
    };

    while let Some((index, ch)) = chars.next() {
        match ch {
            '\\' => match chars.next() {
                Some((_, escaped)) => text.push(escaped),
                None => text.push('\\'),
            },
            '{' => {
                flush_text(&mut text, &mut tokens);
                let name = parse_parameter(&mut chars, index)?;
                tokens.push(Token::Parameter { start: index, name });
            }
            '}' => {
                return Err(expression_error(
                    "unmatched closing brace '}' in step pattern",
                    index,
                    None,
                ));
            }
            '(' => {
                flush_text(&mut text, &mut tokens);
                let optional = parse_optional(&mut chars, index)?;
                tokens.push(Token::Optional {
                    start: index,
                    text: optional,
                });
            }
            ')' => {
                return Err(expression_error(
                    "unmatched closing parenthesis ')' in step pattern",
                    index,
                    None,
                ));
            }
            '/' => {
                flush_text(&mut text, &mut tokens);
                tokens.push(Token::Slash { index });
            }
            c if c.is_whitespace() => {
                flush_text(&mut text, &mut tokens);
                let mut run = String::from(c);
                while let Some(&(_, next)) = chars.peek() {
                    if !next.is_whitespace() {
                        break;
                    }
                    run.push(next);
                    chars.next();
                }
                tokens.push(Token::Whitespace(run));
            }
            _ => text.push(ch),
        }
    }

    flush_text(&mut text, &mut tokens);
    Ok(tokens)
}

#[cfg(test)]
#[expect(clippy::unwrap_used, reason = "tests exercise lexing fallibility")]
mod tests {
    use super::*;

    #[test]
    fn tokenises_text_whitespace_and_parameters() {
        let tokens = lex_expression("I have {int} cukes").unwrap();
        assert_eq!(
            tokens,
            vec![
                Token::Text("I".into()),
                Token::Whitespace(" ".into()),
                Token::Text("have".into()),
                Token::Whitespace(" ".into()),
                Token::Parameter {
                    start: 7,
                    name: "int".into(),
                },
                Token::Whitespace(" ".into()),
                Token::Text("cukes".into()),
            ]
        );
    }

    #[test]
    fn recognises_optional_text_and_slashes() {
        let tokens = lex_expression("cucumber(s)/gherkin").unwrap();
        assert_eq!(
            tokens,
            vec![
                Token::Text("cucumber".into()),
                Token::Optional {
                    start: 8,
                    text: "s".into(),
                },
                Token::Slash { index: 11 },
                Token::Text("gherkin".into()),
            ]
        );
    }

    #[test]
    fn escapes_produce_literal_text() {
        let tokens = lex_expression(r"a \{b\} \(c\) d\/e").unwrap();
        assert_eq!(
            tokens,
            vec![
                Token::Text("a".into()),
                Token::Whitespace(" ".into()),
                Token::Text("{b}".into()),
                Token::Whitespace(" ".into()),
                Token::Text("(c)".into()),
                Token::Whitespace(" ".into()),
                Token::Text("d/e".into()),
            ]
        );
    }

    #[test]
    fn handles_multibyte_text() {
        let tokens = lex_expression("执行 {word}").unwrap();
        assert_eq!(
            tokens,
            vec![
                Token::Text("执行".into()),
                Token::Whitespace(" ".into()),
                Token::Parameter {
                    start: 7,
                    name: "word".into(),
                },
            ]
        );
    }

    #[test]
    fn rejects_stray_closing_brace() {
        let err = lex_expression("broken}").unwrap_err();
        assert!(err.to_string().contains("unmatched closing brace"));
    }

    #[test]
    fn rejects_stray_closing_parenthesis() {
        let err = lex_expression("broken)").unwrap_err();
        assert!(err.to_string().contains("unmatched closing parenthesis"));
    }
}
