//! Built-in parameter types for typed step expressions.

/// Regular-expression fragment accepted for an integer parameter.
const INTEGER: &str = r"[+-]?\d+";

/// Regular-expression fragment accepted for a decimal parameter.
const DECIMAL: &str = r"[+-]?(?:\d+\.\d*|\.\d+|\d+)(?:[eE][+-]?\d+)?";

/// Regular-expression fragment accepted for a quoted string parameter.
const QUOTED: &str = r#"(?:"[^"\\]*(?:\\.[^"\\]*)*"|'[^'\\]*(?:\\.[^'\\]*)*')"#;

/// Translate a parameter type name into a regular-expression fragment.
///
/// Returns `None` for parameter types that are not built in. Every fragment is
/// self-contained, so callers may wrap it in a group or follow it with an
/// alternation without changing its meaning.
///
/// # Examples
/// ```
/// use gherkin_assist_patterns::parameter_type_pattern;
/// assert_eq!(parameter_type_pattern("int"), Some(r"[+-]?\d+"));
/// assert_eq!(parameter_type_pattern("word"), Some(r"[^\s]+"));
/// assert_eq!(parameter_type_pattern(""), Some(".*"));
/// assert_eq!(parameter_type_pattern("color"), None);
/// ```
#[must_use]
pub fn parameter_type_pattern(name: &str) -> Option<&'static str> {
    match name {
        "int" | "byte" | "short" | "long" | "biginteger" => Some(INTEGER),
        "float" | "double" | "bigdecimal" => Some(DECIMAL),
        "word" => Some(r"[^\s]+"),
        "string" => Some(QUOTED),
        "" => Some(".*"),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use regex::Regex;
    use rstest::rstest;

    #[rstest]
    #[case("int")]
    #[case("long")]
    #[case("biginteger")]
    fn integer_types_share_a_pattern(#[case] name: &str) {
        assert_eq!(parameter_type_pattern(name), Some(INTEGER));
    }

    #[test]
    fn returns_decimal_pattern() {
        assert_eq!(parameter_type_pattern("float"), Some(DECIMAL));
        assert_eq!(parameter_type_pattern("double"), Some(DECIMAL));
    }

    #[test]
    fn unknown_types_are_undefined() {
        assert_eq!(parameter_type_pattern("color"), None);
        assert_eq!(parameter_type_pattern("Int"), None);
    }

    #[rstest]
    #[case("\"hello\"", true)]
    #[case("'single'", true)]
    #[case(r#""with \" escape""#, true)]
    #[case("bare", false)]
    fn quoted_string_pattern_requires_quotes(#[case] input: &str, #[case] matches: bool) {
        #[expect(clippy::expect_used, reason = "fragment is a constant")]
        let re = Regex::new(&format!("^{QUOTED}$")).expect("quoted pattern compiles");
        assert_eq!(re.is_match(input), matches);
    }
}
