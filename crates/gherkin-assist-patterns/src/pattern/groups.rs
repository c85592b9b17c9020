//! Group scanning for regular-expression step patterns.
//!
//! The scanner walks a regex source once, honouring escapes and character
//! classes, and records every group with the byte offset where its body
//! starts. Rewrites (placeholder tolerance, relaxed parameters) insert text at
//! those offsets instead of reparsing the pattern.

use super::{PLACEHOLDER_ALTERNATIVE, PLACEHOLDER_TOKEN};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum GroupKind {
    /// `( ... )`
    Capturing,
    /// `(?P<name> ... )` or `(?<name> ... )`
    Named,
    /// `(?: ... )` or `(?flags: ... )`
    NonCapturing,
    /// Lookaround, atomic and bare flag groups.
    Other,
}

impl GroupKind {
    pub(crate) fn is_capturing(self) -> bool {
        matches!(self, Self::Capturing | Self::Named)
    }

    fn accepts_placeholder(self) -> bool {
        !matches!(self, Self::Other)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Group {
    pub open: usize,
    pub body_start: usize,
    pub close: usize,
    pub kind: GroupKind,
    pub children: Vec<Group>,
}

/// Scan `source` for groups, returning the top-level groups in order.
///
/// Returns `None` when parentheses are unbalanced.
pub(crate) fn scan_groups(source: &str) -> Option<Vec<Group>> {
    let bytes = source.as_bytes();
    let mut stack: Vec<Group> = Vec::new();
    let mut roots = Vec::new();
    let mut escaping = false;
    let mut class_depth = 0usize;
    let mut index = 0usize;

    while let Some(&b) = bytes.get(index) {
        if escaping {
            escaping = false;
            index += 1;
            continue;
        }
        match b {
            b'\\' => escaping = true,
            b'[' => {
                class_depth = class_depth.saturating_add(1);
                index = skip_class_prefix(bytes, index + 1);
                continue;
            }
            b']' if class_depth > 0 => class_depth -= 1,
            b'(' if class_depth == 0 => {
                let (kind, body_start) = classify_group(bytes, index);
                stack.push(Group {
                    open: index,
                    body_start,
                    close: index,
                    kind,
                    children: Vec::new(),
                });
                index = body_start;
                continue;
            }
            b')' if class_depth == 0 => {
                let mut group = stack.pop()?;
                group.close = index;
                match stack.last_mut() {
                    Some(parent) => parent.children.push(group),
                    None => roots.push(group),
                }
            }
            _ => {}
        }
        index += 1;
    }

    stack.is_empty().then_some(roots)
}

/// A leading `^` negation and a leading `]` are literal parts of a class.
fn skip_class_prefix(bytes: &[u8], mut index: usize) -> usize {
    if bytes.get(index) == Some(&b'^') {
        index += 1;
    }
    if bytes.get(index) == Some(&b']') {
        index += 1;
    }
    index
}

fn classify_group(bytes: &[u8], open: usize) -> (GroupKind, usize) {
    if bytes.get(open + 1) != Some(&b'?') {
        return (GroupKind::Capturing, open + 1);
    }
    match bytes.get(open + 2) {
        Some(b':') => (GroupKind::NonCapturing, open + 3),
        Some(b'P') if bytes.get(open + 3) == Some(&b'<') => named_group(bytes, open + 4),
        Some(b'<') => match bytes.get(open + 3) {
            Some(b'=' | b'!') => (GroupKind::Other, open + 4),
            _ => named_group(bytes, open + 3),
        },
        Some(b'=' | b'!' | b'>') => (GroupKind::Other, open + 3),
        _ => flag_group(bytes, open + 2),
    }
}

fn named_group(bytes: &[u8], name_start: usize) -> (GroupKind, usize) {
    bytes
        .get(name_start..)
        .and_then(|rest| rest.iter().position(|&b| b == b'>'))
        .map_or((GroupKind::Other, name_start), |offset| {
            (GroupKind::Named, name_start + offset + 1)
        })
}

fn flag_group(bytes: &[u8], flags_start: usize) -> (GroupKind, usize) {
    let mut index = flags_start;
    while bytes
        .get(index)
        .is_some_and(|b| b.is_ascii_alphabetic() || *b == b'-')
    {
        index += 1;
    }
    if bytes.get(index) == Some(&b':') {
        (GroupKind::NonCapturing, index + 1)
    } else {
        (GroupKind::Other, index)
    }
}

/// Insert the outline placeholder alternative at the start of every
/// capturing and non-capturing group body.
///
/// Groups whose body already begins with the alternative are left alone, so
/// applying the rewrite twice is the same as applying it once. Sources with
/// unbalanced parentheses are returned unchanged.
///
/// # Examples
/// ```
/// use gherkin_assist_patterns::tolerate_placeholders;
/// assert_eq!(
///     tolerate_placeholders(r"^there are (\d+) and (?:two|ten)$"),
///     r"^there are (<[^>]+>|\d+) and (?:<[^>]+>|two|ten)$"
/// );
/// let once = tolerate_placeholders(r"(\w+)");
/// assert_eq!(tolerate_placeholders(&once), once);
/// ```
#[must_use]
pub fn tolerate_placeholders(source: &str) -> String {
    let Some(groups) = scan_groups(source) else {
        return source.to_owned();
    };
    let mut insertions = Vec::new();
    collect_insertions(source, &groups, &mut insertions);
    insertions.sort_unstable();

    let mut out = String::with_capacity(
        source
            .len()
            .saturating_add(insertions.len().saturating_mul(PLACEHOLDER_ALTERNATIVE.len())),
    );
    let mut last = 0usize;
    for at in insertions {
        out.push_str(source.get(last..at).unwrap_or_default());
        out.push_str(PLACEHOLDER_ALTERNATIVE);
        last = at;
    }
    out.push_str(source.get(last..).unwrap_or_default());
    out
}

fn collect_insertions(source: &str, groups: &[Group], insertions: &mut Vec<usize>) {
    for group in groups {
        let already_tolerant = source
            .get(group.body_start..)
            .is_some_and(|body| body.starts_with(PLACEHOLDER_ALTERNATIVE));
        if group.kind.accepts_placeholder() && !already_tolerant {
            insertions.push(group.body_start);
        }
        collect_insertions(source, &group.children, insertions);
    }
}

/// Replace the body of every outermost capturing group with `.*?`.
pub(crate) fn relax_groups(source: &str) -> String {
    let Some(groups) = scan_groups(source) else {
        return source.to_owned();
    };
    let mut out = String::with_capacity(source.len());
    let mut last = 0usize;
    relax_into(source, &groups, &mut last, &mut out);
    out.push_str(source.get(last..).unwrap_or_default());
    out
}

fn relax_into(source: &str, groups: &[Group], last: &mut usize, out: &mut String) {
    for group in groups {
        if group.kind.is_capturing() {
            out.push_str(source.get(*last..group.body_start).unwrap_or_default());
            out.push_str(".*?");
            *last = group.close;
        } else {
            relax_into(source, &group.children, last, out);
        }
    }
}

/// Counts of capturing groups and of those constraining their input.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct CaptureCounts {
    pub total: usize,
    pub typed: usize,
}

pub(crate) fn count_captures(source: &str, groups: &[Group]) -> CaptureCounts {
    let mut counts = CaptureCounts::default();
    for group in groups {
        if group.kind.is_capturing() {
            counts.total += 1;
            let body = source.get(group.body_start..group.close).unwrap_or_default();
            let body = body
                .strip_prefix(PLACEHOLDER_ALTERNATIVE)
                .unwrap_or(body);
            if !matches!(body, ".*" | ".+" | ".*?" | ".+?" | PLACEHOLDER_TOKEN) {
                counts.typed += 1;
            }
        }
        let nested = count_captures(source, &group.children);
        counts.total += nested.total;
        counts.typed += nested.typed;
    }
    counts
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn groups(source: &str) -> Vec<Group> {
        scan_groups(source).unwrap_or_else(|| panic!("{source:?} should be balanced"))
    }

    #[rstest]
    #[case(r"(a)", GroupKind::Capturing, 1)]
    #[case(r"(?:a)", GroupKind::NonCapturing, 3)]
    #[case(r"(?P<n>a)", GroupKind::Named, 6)]
    #[case(r"(?<n>a)", GroupKind::Named, 5)]
    #[case(r"(?i:a)", GroupKind::NonCapturing, 4)]
    #[case(r"(?=a)", GroupKind::Other, 3)]
    #[case(r"(?<!a)", GroupKind::Other, 4)]
    fn classifies_group_prefixes(
        #[case] source: &str,
        #[case] kind: GroupKind,
        #[case] body_start: usize,
    ) {
        let scanned = groups(source);
        let [group] = scanned.as_slice() else {
            panic!("expected a single group in {source:?}");
        };
        assert_eq!(group.kind, kind);
        assert_eq!(group.body_start, body_start);
    }

    #[test]
    fn ignores_parentheses_in_classes_and_escapes() {
        let scanned = groups(r"[(]\((x)[^)]");
        assert_eq!(scanned.len(), 1);
        assert!(scanned.iter().all(|g| g.kind == GroupKind::Capturing));
    }

    #[test]
    fn reports_unbalanced_sources() {
        assert!(scan_groups("(unterminated").is_none());
        assert!(scan_groups("extra)").is_none());
    }

    #[test]
    fn tolerates_named_and_nested_groups() {
        assert_eq!(
            tolerate_placeholders(r"(?P<n>(\d)+)"),
            r"(?P<n><[^>]+>|(<[^>]+>|\d)+)"
        );
    }

    #[test]
    fn leaves_flag_groups_alone() {
        assert_eq!(tolerate_placeholders(r"(?i)abc"), r"(?i)abc");
    }

    #[test]
    fn tolerance_is_idempotent() {
        let source = r"^there are (?:two|ten) cucumbers and (five|fifteen) gherkins$";
        let once = tolerate_placeholders(source);
        assert_eq!(tolerate_placeholders(&once), once);
    }

    #[test]
    fn relaxes_capturing_groups_only() {
        assert_eq!(
            relax_groups(r"^a (\d+) and (?:x|y) (?P<n>\w+)$"),
            r"^a (.*?) and (?:x|y) (?P<n>.*?)$"
        );
    }

    #[test]
    fn counts_typed_captures() {
        let source = r"^(.*) has (\d+) and ((?:a|b))$";
        let counts = count_captures(source, &groups(source));
        assert_eq!(counts, CaptureCounts { total: 3, typed: 2 });
    }
}
