//! Literal (parameter-free) text of step patterns.
//!
//! Content assist ranks candidates by comparing typed text with the literal
//! text of each pattern, so both the full literal text and the literal prefix
//! before the first parameter are extracted here.

use crate::pattern::compiler::Node;
use crate::pattern::groups::Group;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct LiteralText {
    /// All literal characters with parameters removed.
    pub text: String,
    /// Literal characters before the first parameter or regex construct.
    pub prefix: String,
}

struct Collector {
    literal: LiteralText,
    prefix_open: bool,
}

impl Collector {
    fn new() -> Self {
        Self {
            literal: LiteralText::default(),
            prefix_open: true,
        }
    }

    fn push_str(&mut self, s: &str) {
        self.literal.text.push_str(s);
        if self.prefix_open {
            self.literal.prefix.push_str(s);
        }
    }

    fn push(&mut self, ch: char) {
        self.literal.text.push(ch);
        if self.prefix_open {
            self.literal.prefix.push(ch);
        }
    }

    fn close_prefix(&mut self) {
        self.prefix_open = false;
    }

    /// A quantifier makes the preceding character optional or repeated, so
    /// it no longer belongs to a guaranteed prefix.
    fn quantified(&mut self) {
        if self.prefix_open {
            self.literal.prefix.pop();
        }
        self.close_prefix();
    }

    fn finish(self) -> LiteralText {
        self.literal
    }
}

pub(crate) fn expression_literals(nodes: &[Node]) -> LiteralText {
    let mut collector = Collector::new();
    for node in nodes {
        match node {
            Node::Text(text) => collector.push_str(text),
            Node::Optional(_) | Node::Parameter { .. } => collector.close_prefix(),
            Node::Alternation(alternatives) => {
                collector.close_prefix();
                for node in alternatives.first().map_or(&[][..], Vec::as_slice) {
                    if let Node::Text(text) = node {
                        collector.push_str(text);
                    }
                }
            }
        }
    }
    collector.finish()
}

pub(crate) fn regex_literals(source: &str, groups: &[Group]) -> LiteralText {
    let body = source.strip_prefix('^').unwrap_or(source);
    let offset = source.len().saturating_sub(body.len());
    let body = strip_end_anchor(body);

    let mut collector = Collector::new();
    let mut chars = body.char_indices().peekable();
    let mut class_depth = 0usize;

    while let Some((index, ch)) = chars.next() {
        if class_depth > 0 {
            match ch {
                '\\' => {
                    chars.next();
                }
                '[' => class_depth += 1,
                ']' => class_depth -= 1,
                _ => {}
            }
            continue;
        }
        let absolute = index.saturating_add(offset);
        if let Some(group) = groups.iter().find(|g| g.open == absolute) {
            collector.close_prefix();
            while chars
                .peek()
                .is_some_and(|&(i, _)| i.saturating_add(offset) <= group.close)
            {
                chars.next();
            }
            continue;
        }
        match ch {
            '\\' => match chars.next() {
                Some((_, escaped)) if escaped.is_alphanumeric() => collector.close_prefix(),
                Some((_, escaped)) => collector.push(escaped),
                None => {}
            },
            '[' => {
                collector.close_prefix();
                class_depth = 1;
                if chars.peek().is_some_and(|&(_, c)| c == '^') {
                    chars.next();
                }
                if chars.peek().is_some_and(|&(_, c)| c == ']') {
                    chars.next();
                }
            }
            '*' | '+' | '?' => collector.quantified(),
            '{' if is_counted_repetition(body, index) => {
                collector.quantified();
                for (_, c) in chars.by_ref() {
                    if c == '}' {
                        break;
                    }
                }
            }
            '.' | '|' | '^' | '$' => collector.close_prefix(),
            _ => collector.push(ch),
        }
    }
    collector.finish()
}

fn strip_end_anchor(body: &str) -> &str {
    let Some(stripped) = body.strip_suffix('$') else {
        return body;
    };
    let backslashes = stripped.chars().rev().take_while(|&c| c == '\\').count();
    if backslashes % 2 == 0 { stripped } else { body }
}

fn is_counted_repetition(body: &str, open: usize) -> bool {
    let Some(rest) = body.get(open.saturating_add(1)..) else {
        return false;
    };
    let Some(end) = rest.find('}') else {
        return false;
    };
    let inner = rest.get(..end).unwrap_or_default();
    !inner.is_empty()
        && inner.chars().any(|c| c.is_ascii_digit())
        && inner.chars().all(|c| c.is_ascii_digit() || c == ',')
}
