//! Doc string delimiters and content assembly.

/// Delimiters accepted for doc strings.
const DELIMITERS: [&str; 2] = ["\"\"\"", "```"];

/// The delimiter opening `trimmed`, with the media type written after it.
pub(super) fn opening(trimmed: &str) -> Option<(&'static str, Option<String>)> {
    DELIMITERS.iter().find_map(|&delimiter| {
        trimmed.strip_prefix(delimiter).map(|rest| {
            let media_type = rest.trim();
            let media_type = (!media_type.is_empty()).then(|| media_type.to_owned());
            (delimiter, media_type)
        })
    })
}

/// A doc string being collected line by line.
#[derive(Debug)]
pub(super) struct DocStringBuilder {
    pub(super) delimiter: &'static str,
    pub(super) media_type: Option<String>,
    pub(super) line: usize,
    pub(super) column: usize,
    /// Content lines with the delimiter's indentation removed.
    lines: Vec<String>,
    /// Whether the doc string belongs to a step; orphans are consumed and
    /// dropped.
    pub(super) attached: bool,
}

impl DocStringBuilder {
    pub(super) fn new(
        delimiter: &'static str,
        media_type: Option<String>,
        line: usize,
        column: usize,
        attached: bool,
    ) -> Self {
        Self {
            delimiter,
            media_type,
            line,
            column,
            lines: Vec::new(),
            attached,
        }
    }

    /// Whether `trimmed` closes this doc string.
    pub(super) fn is_closing(&self, trimmed: &str) -> bool {
        trimmed == self.delimiter
    }

    /// Append a raw content line.
    ///
    /// Up to the opening delimiter's indentation is stripped, and escaped
    /// delimiters are unescaped.
    pub(super) fn push_line(&mut self, raw: &str) {
        let indent = self.column.saturating_sub(1);
        let mut stripped = raw;
        for _ in 0..indent {
            let mut chars = stripped.chars();
            match chars.next() {
                Some(c) if c.is_whitespace() => stripped = chars.as_str(),
                _ => break,
            }
        }
        let escaped = match self.delimiter {
            "```" => "\\`\\`\\`",
            _ => "\\\"\\\"\\\"",
        };
        self.lines.push(stripped.replace(escaped, self.delimiter));
    }

    pub(super) fn content(&self) -> String {
        self.lines.join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recognises_delimiters_and_media_types() {
        assert_eq!(opening("\"\"\""), Some(("\"\"\"", None)));
        assert_eq!(opening("``` json "), Some(("```", Some("json".to_owned()))));
        assert_eq!(opening("\"\" nope"), None);
    }

    #[test]
    fn strips_indentation_up_to_the_delimiter_column() {
        let mut builder = DocStringBuilder::new("\"\"\"", None, 3, 5, true);
        builder.push_line("      indented");
        builder.push_line("    flush");
        builder.push_line("  shallow");
        assert_eq!(builder.content(), "  indented\nflush\nshallow");
    }

    #[test]
    fn unescapes_delimiters() {
        let mut builder = DocStringBuilder::new("\"\"\"", None, 1, 1, true);
        builder.push_line(r#"say \"\"\" here"#);
        assert_eq!(builder.content(), "say \"\"\" here");
        assert!(builder.is_closing("\"\"\""));
        assert!(!builder.is_closing("```"));
    }
}
