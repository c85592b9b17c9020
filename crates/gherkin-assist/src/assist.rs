//! Content assist: ranking step definitions against typed text.
//!
//! Interactive lookups rank every enabled definition in three tiers:
//!
//! 1. the definition's literal text starts with the typed statement;
//! 2. the relaxed matcher, which ignores parameter types, accepts the whole
//!    statement;
//! 3. the Jaro-Winkler similarity between the statement and the definition's
//!    literal text clears the configured threshold.
//!
//! Definitions reaching no tier are not offered.

use std::cmp::Ordering;

use crate::dialect::{Dialect, StepKeyword};
use crate::glue::StepDefinitionPattern;
use crate::normalize::PreparedPattern;

/// Why a candidate was offered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Tier {
    /// Literal text continues the typed statement.
    Prefix,
    /// The statement matches once parameter types are ignored.
    Relaxed,
    /// The statement is similar to the literal text.
    Similar,
}

/// A ranked content-assist candidate.
#[derive(Debug, Clone, PartialEq)]
pub struct RankedCandidate {
    /// The offered definition.
    pub pattern: StepDefinitionPattern,
    /// Tier reached; lower tiers rank first.
    pub tier: Tier,
    /// Similarity between the statement and the literal text, in `0.0..=1.0`.
    pub score: f64,
}

/// Rank `candidates` against a typed step line.
///
/// The line's step keyword is stripped with `dialect` first. Results are
/// ordered by tier, then by descending similarity, then by declaration
/// order.
#[must_use]
pub fn rank_candidates(
    typed_line: &str,
    dialect: &Dialect,
    candidates: &[PreparedPattern],
    threshold: f64,
) -> Vec<RankedCandidate> {
    let statement = typed_statement(typed_line, dialect);
    let mut ranked: Vec<(usize, RankedCandidate)> = candidates
        .iter()
        .enumerate()
        .filter(|(_, candidate)| candidate.matcher.is_enabled())
        .filter_map(|(index, candidate)| {
            let literal = candidate.matcher.literal_text();
            let score = strsim::jaro_winkler(statement, literal);
            let tier = classify(statement, candidate, score, threshold)?;
            Some((
                index,
                RankedCandidate {
                    pattern: candidate.pattern.clone(),
                    tier,
                    score,
                },
            ))
        })
        .collect();
    ranked.sort_by(|(a_index, a), (b_index, b)| {
        a.tier
            .cmp(&b.tier)
            .then_with(|| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal))
            .then(a_index.cmp(b_index))
    });
    ranked.into_iter().map(|(_, candidate)| candidate).collect()
}

fn classify(
    statement: &str,
    candidate: &PreparedPattern,
    score: f64,
    threshold: f64,
) -> Option<Tier> {
    let matcher = &candidate.matcher;
    if matcher.literal_text().starts_with(statement) {
        Some(Tier::Prefix)
    } else if matcher.is_relaxed_match(statement) {
        Some(Tier::Relaxed)
    } else if score >= threshold {
        Some(Tier::Similar)
    } else {
        None
    }
}

// Unlike `text_statement`, trailing whitespace is kept: the cursor sits
// after it.
fn typed_statement<'a>(line: &'a str, dialect: &Dialect) -> &'a str {
    let line = line.trim_start();
    dialect
        .match_step_keyword(line)
        .and_then(|keyword| line.strip_prefix(keyword.text.as_str()))
        .map_or(line, str::trim_start)
}

/// Step keywords to offer at the start of a line whose text so far is
/// `typed`, longest first. The wildcard keyword is never offered.
///
/// # Examples
/// ```
/// use gherkin_assist::assist::complete_keywords;
/// use gherkin_assist::dialect::resolve_tag;
///
/// let en = resolve_tag("en");
/// let offered: Vec<_> = complete_keywords("  Th", &en).map(|k| k.text.as_str()).collect();
/// assert_eq!(offered, ["Then "]);
/// ```
pub fn complete_keywords<'d>(
    typed: &str,
    dialect: &'d Dialect,
) -> impl Iterator<Item = &'d StepKeyword> {
    let typed = typed.trim_start().to_owned();
    dialect
        .completion_keywords()
        .filter(move |keyword| keyword.text.starts_with(typed.as_str()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialect::resolve_tag;
    use crate::normalize::MatcherCache;
    use crate::test_support::{expression_pattern, regex_pattern};
    use rstest::rstest;

    fn ranked_ids(typed: &str, patterns: &[StepDefinitionPattern]) -> Vec<(String, Tier)> {
        let prepared = MatcherCache::new().prepare(patterns);
        rank_candidates(typed, &resolve_tag("en"), &prepared.patterns, 0.8)
            .into_iter()
            .map(|c| (c.pattern.id.to_string(), c.tier))
            .collect()
    }

    #[test]
    fn literal_prefix_outranks_unrelated_definitions() {
        let ranked = ranked_ids(
            "Given a ",
            &[
                expression_pattern("another", "another item"),
                regex_pattern("item", r"^a (\d+) item$"),
            ],
        );
        let Some((first, tier)) = ranked.first() else {
            panic!("expected candidates");
        };
        assert_eq!(first, "item");
        assert_eq!(*tier, Tier::Prefix);
        let position = |id: &str| ranked.iter().position(|(r, _)| r == id);
        if let Some(another) = position("another") {
            assert!(position("item") < Some(another));
        }
    }

    #[test]
    fn relaxed_matches_rank_after_prefix_matches() {
        let ranked = ranked_ids(
            "When I pay five dollars",
            &[
                expression_pattern("pay", "I pay {int} dollars"),
                expression_pattern("pay-exact", "I pay five dollars"),
            ],
        );
        assert_eq!(
            ranked,
            [
                ("pay-exact".to_owned(), Tier::Prefix),
                ("pay".to_owned(), Tier::Relaxed),
            ]
        );
    }

    #[rstest]
    #[case("Then the reslt is shown", true)]
    #[case("Then 42", false)]
    fn similarity_threshold_filters_candidates(#[case] typed: &str, #[case] offered: bool) {
        let ranked = ranked_ids(typed, &[expression_pattern("result", "the result is shown")]);
        assert_eq!(!ranked.is_empty(), offered);
        if offered {
            assert_eq!(ranked.first().map(|(_, t)| *t), Some(Tier::Similar));
        }
    }

    #[test]
    fn disabled_definitions_are_never_offered() {
        let ranked = ranked_ids("Given (", &[regex_pattern("bad", "Given (unterminated")]);
        assert!(ranked.is_empty());
    }

    #[test]
    fn keyword_completion_skips_the_wildcard() {
        let en = resolve_tag("en");
        let offered: Vec<_> = complete_keywords("", &en).map(|k| k.text.clone()).collect();
        assert!(!offered.iter().any(|k| k == "* "));
        assert!(offered.iter().any(|k| k == "Given "));
    }
}
