//! Table row cell splitting.

/// Split a trimmed `| a | b |` row into unescaped, trimmed cells.
///
/// `\|` yields a literal bar, `\\` a backslash and `\n` a newline; any other
/// escape is kept verbatim. Text after the last unescaped bar is ignored.
pub(super) fn split_cells(row: &str) -> Vec<String> {
    let Some(body) = row.strip_prefix('|') else {
        return Vec::new();
    };
    let mut cells = Vec::new();
    let mut cell = String::new();
    let mut chars = body.chars();
    while let Some(ch) = chars.next() {
        match ch {
            '|' => cells.push(std::mem::take(&mut cell).trim().to_owned()),
            '\\' => match chars.next() {
                Some('|') => cell.push('|'),
                Some('\\') => cell.push('\\'),
                Some('n') => cell.push('\n'),
                Some(other) => {
                    cell.push('\\');
                    cell.push(other);
                }
                None => cell.push('\\'),
            },
            _ => cell.push(ch),
        }
    }
    cells
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("| a | b |", &["a", "b"])]
    #[case("|a|b", &["a"])]
    #[case("| |", &[""])]
    #[case(r"| a \| b | c |", &["a | b", "c"])]
    #[case(r"| back\\slash | new\nline |", &["back\\slash", "new\nline"])]
    #[case(r"| \x |", &[r"\x"])]
    #[case("no bars", &[])]
    fn splits_cells(#[case] row: &str, #[case] expected: &[&str]) {
        assert_eq!(split_cells(row), expected);
    }
}
