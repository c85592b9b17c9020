//! Line and column bookkeeping for document text.
//!
//! [`LineIndex`] is a read-only projection of one text buffer. It is rebuilt
//! whenever the buffer changes. Lines end at `\n`, `\r\n` or a lone `\r`; the
//! parser splits text with the same [`split_lines`] so both agree on line
//! numbers.
//!
//! Lines and columns are 1-based, columns count characters. Every query clamps
//! out-of-range input because editors routinely ask about stale positions
//! while the user types; the `checked_*` variants report the problem instead.

use std::fmt;
use std::sync::Arc;

use crate::error::BadPositionError;

/// A 1-based line and character column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Location {
    /// 1-based line number.
    pub line: usize,
    /// 1-based character column.
    pub column: usize,
}

impl Location {
    /// Create a location.
    #[must_use]
    pub fn new(line: usize, column: usize) -> Self {
        Self { line, column }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// How a line is terminated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Terminator {
    /// `\n`
    Lf,
    /// `\r\n`
    CrLf,
    /// A lone `\r`.
    Cr,
    /// The final line of a buffer without a trailing newline.
    None,
}

impl Terminator {
    /// Width of the terminator in bytes.
    #[must_use]
    pub fn width(self) -> usize {
        match self {
            Self::Lf | Self::Cr => 1,
            Self::CrLf => 2,
            Self::None => 0,
        }
    }
}

/// One line of a buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Line<'a> {
    /// Line content without its terminator.
    pub content: &'a str,
    /// Byte offset of the first content byte.
    pub start: usize,
    /// The terminator ending the line.
    pub terminator: Terminator,
}

/// Iterator returned by [`split_lines`].
#[derive(Debug, Clone)]
pub struct Lines<'a> {
    text: &'a str,
    pos: usize,
    done: bool,
}

impl<'a> Iterator for Lines<'a> {
    type Item = Line<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let start = self.pos;
        let rest = self.text.get(start..).unwrap_or_default();
        let Some(break_at) = rest.find(['\n', '\r']) else {
            self.done = true;
            return Some(Line {
                content: rest,
                start,
                terminator: Terminator::None,
            });
        };
        let content = rest.get(..break_at).unwrap_or_default();
        let after = rest.get(break_at..).unwrap_or_default();
        let terminator = if after.starts_with("\r\n") {
            Terminator::CrLf
        } else if after.starts_with('\r') {
            Terminator::Cr
        } else {
            Terminator::Lf
        };
        self.pos = start + break_at + terminator.width();
        Some(Line {
            content,
            start,
            terminator,
        })
    }
}

/// Split `text` into lines, accepting `\n`, `\r\n` and `\r` terminators.
///
/// Always yields at least one line; text ending in a terminator yields a
/// final empty line.
///
/// # Examples
/// ```
/// use gherkin_assist::position::split_lines;
/// let lines: Vec<_> = split_lines("a\r\nb\rc\n").map(|l| l.content).collect();
/// assert_eq!(lines, ["a", "b", "c", ""]);
/// ```
#[must_use]
pub fn split_lines(text: &str) -> Lines<'_> {
    Lines {
        text,
        pos: 0,
        done: false,
    }
}

#[derive(Debug, Clone, Copy)]
struct LineSpan {
    start: usize,
    len: usize,
    terminator: Terminator,
}

/// Offsets of every line of a text buffer.
#[derive(Debug, Clone)]
pub struct LineIndex {
    text: Arc<str>,
    lines: Vec<LineSpan>,
}

impl LineIndex {
    /// Index `text`.
    #[must_use]
    pub fn new(text: impl Into<Arc<str>>) -> Self {
        let text = text.into();
        let lines = split_lines(&text)
            .map(|line| LineSpan {
                start: line.start,
                len: line.content.len(),
                terminator: line.terminator,
            })
            .collect();
        Self { text, lines }
    }

    /// The indexed text.
    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Number of lines; never zero.
    #[must_use]
    pub fn line_count(&self) -> usize {
        self.lines.len()
    }

    fn span(&self, line: usize) -> LineSpan {
        let index = line.clamp(1, self.line_count()) - 1;
        self.lines.get(index).copied().unwrap_or(LineSpan {
            start: 0,
            len: 0,
            terminator: Terminator::None,
        })
    }

    /// Byte offset where `line` starts, clamped to the buffer.
    #[must_use]
    pub fn line_offset(&self, line: usize) -> usize {
        self.span(line).start
    }

    /// Byte offset where `line` starts.
    ///
    /// # Errors
    ///
    /// Returns [`BadPositionError::Line`] when `line` is zero or past the last
    /// line.
    pub fn checked_line_offset(&self, line: usize) -> Result<usize, BadPositionError> {
        if line == 0 || line > self.line_count() {
            return Err(BadPositionError::Line {
                line,
                line_count: self.line_count(),
            });
        }
        Ok(self.line_offset(line))
    }

    /// Content length of `line` in bytes, excluding its terminator.
    #[must_use]
    pub fn line_length(&self, line: usize) -> usize {
        self.span(line).len
    }

    /// Byte offset just past the content of `line`.
    #[must_use]
    pub fn line_end(&self, line: usize) -> usize {
        let span = self.span(line);
        span.start + span.len
    }

    /// Width of the terminator of `line`: 2 for `\r\n`, otherwise 1.
    ///
    /// The last line has no terminator; it reports 1 so callers can always
    /// place an end-of-line position.
    #[must_use]
    pub fn eol_width(&self, line: usize) -> usize {
        match self.span(line).terminator {
            Terminator::CrLf => 2,
            Terminator::Lf | Terminator::Cr | Terminator::None => 1,
        }
    }

    /// Content of `line` without its terminator.
    #[must_use]
    pub fn line_text(&self, line: usize) -> &str {
        let span = self.span(line);
        self.text
            .get(span.start..span.start + span.len)
            .unwrap_or_default()
    }

    /// Byte offset of the character at 1-based `column` on `line`.
    ///
    /// Columns past the end of the line clamp to the line end.
    #[must_use]
    pub fn offset_of(&self, line: usize, column: usize) -> usize {
        let start = self.line_offset(line);
        let content = self.line_text(line);
        let skip = column.saturating_sub(1);
        content
            .char_indices()
            .nth(skip)
            .map_or(start + content.len(), |(byte, _)| start + byte)
    }

    /// Location of the character containing byte `offset`, clamped to the
    /// buffer.
    #[must_use]
    pub fn position_of(&self, offset: usize) -> Location {
        let offset = offset.min(self.text.len());
        let index = self
            .lines
            .partition_point(|span| span.start <= offset)
            .max(1);
        let line = index;
        let span = self.span(line);
        let within = offset.saturating_sub(span.start).min(span.len);
        let content = self.line_text(line);
        let column = content
            .char_indices()
            .take_while(|(byte, _)| *byte < within)
            .count();
        Location::new(line, column + 1)
    }

    /// Location of byte `offset`.
    ///
    /// # Errors
    ///
    /// Returns [`BadPositionError::Offset`] when `offset` lies past the end of
    /// the buffer.
    pub fn checked_position_of(&self, offset: usize) -> Result<Location, BadPositionError> {
        if offset > self.text.len() {
            return Err(BadPositionError::Offset {
                offset,
                len: self.text.len(),
            });
        }
        Ok(self.position_of(offset))
    }

    /// UTF-16 code units before 1-based `column` on `line`, as editors speaking
    /// UTF-16 positions expect.
    #[must_use]
    pub fn utf16_column(&self, line: usize, column: usize) -> u32 {
        self.line_text(line)
            .chars()
            .take(column.saturating_sub(1))
            .map(utf16_code_units)
            .sum()
    }
}

/// Calculate UTF-16 code units for a character.
///
/// # Examples
///
/// ```
/// use gherkin_assist::position::utf16_code_units;
///
/// assert_eq!(utf16_code_units('a'), 1);
/// assert_eq!(utf16_code_units('é'), 1);
/// assert_eq!(utf16_code_units('😀'), 2);
/// ```
#[inline]
#[must_use]
pub fn utf16_code_units(ch: char) -> u32 {
    if u32::from(ch) <= 0xFFFF { 1 } else { 2 }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn splits_mixed_terminators() {
        let lines: Vec<_> = split_lines("a\nb\r\nc\rd").collect();
        let contents: Vec<_> = lines.iter().map(|l| l.content).collect();
        let terminators: Vec<_> = lines.iter().map(|l| l.terminator).collect();
        assert_eq!(contents, ["a", "b", "c", "d"]);
        assert_eq!(
            terminators,
            [
                Terminator::Lf,
                Terminator::CrLf,
                Terminator::Cr,
                Terminator::None
            ]
        );
    }

    #[test]
    fn empty_text_has_one_line() {
        let index = LineIndex::new("");
        assert_eq!(index.line_count(), 1);
        assert_eq!(index.line_end(1), 0);
        assert_eq!(index.eol_width(1), 1);
    }

    #[rstest]
    #[case("a\nb", 2, 2, 3, 1)]
    #[case("a\r\nb", 1, 0, 1, 2)]
    #[case("a\r\n\r\nb", 2, 3, 3, 2)]
    #[case("a\n\n", 2, 2, 2, 1)]
    #[case("a\rb", 2, 2, 3, 1)]
    fn line_geometry(
        #[case] text: &str,
        #[case] line: usize,
        #[case] offset: usize,
        #[case] end: usize,
        #[case] eol: usize,
    ) {
        let index = LineIndex::new(text);
        assert_eq!(index.line_offset(line), offset);
        assert_eq!(index.line_end(line), end);
        assert_eq!(index.eol_width(line), eol);
    }

    #[test]
    fn last_line_without_newline_has_valid_end() {
        let text = "Feature: f\n  Scenario: s\n    Given a 5 item";
        let index = LineIndex::new(text);
        assert_eq!(index.line_count(), 3);
        assert_eq!(index.line_end(3), text.len());
        assert_eq!(index.eol_width(3), 1);
        assert_eq!(index.line_text(3), "    Given a 5 item");
    }

    #[test]
    fn queries_clamp_out_of_range_lines() {
        let index = LineIndex::new("one\ntwo");
        assert_eq!(index.line_offset(0), 0);
        assert_eq!(index.line_offset(99), 4);
        assert_eq!(index.line_length(99), 3);
        assert_eq!(index.position_of(1000), Location::new(2, 4));
    }

    #[test]
    fn checked_queries_report_bad_positions() {
        let index = LineIndex::new("one\ntwo");
        assert_eq!(index.checked_line_offset(2), Ok(4));
        assert_eq!(
            index.checked_line_offset(3),
            Err(BadPositionError::Line {
                line: 3,
                line_count: 2
            })
        );
        assert!(index.checked_line_offset(0).is_err());
        assert_eq!(
            index.checked_position_of(8),
            Err(BadPositionError::Offset { offset: 8, len: 7 })
        );
    }

    #[test]
    fn columns_count_characters() {
        let index = LineIndex::new("x\ncafé 😀 ok");
        assert_eq!(index.offset_of(2, 5), 2 + "café".len());
        assert_eq!(index.position_of(2 + "café ".len()), Location::new(2, 6));
        assert_eq!(index.utf16_column(2, 8), 8);
        assert_eq!(index.offset_of(2, 100), index.line_end(2));
    }

    #[test]
    fn offsets_inside_terminators_map_to_line_end() {
        let index = LineIndex::new("ab\r\ncd");
        assert_eq!(index.position_of(3), Location::new(1, 3));
        assert_eq!(index.position_of(4), Location::new(2, 1));
    }
}
