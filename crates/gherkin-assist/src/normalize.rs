//! Normalised matchers for step-definition patterns.
//!
//! Each [`StepDefinitionPattern`] is compiled once into an immutable
//! [`NormalizedMatcher`] and cached by pattern id. The cache entry is reused
//! while the pattern's raw text and kind stay the same, so matching never
//! rewrites patterns as a side effect.
//!
//! A pattern that fails to compile yields a disabled matcher that reports no
//! match for every input, together with a [`PatternCompileError`] attributed
//! to the pattern's declaration. One bad pattern never aborts a batch.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use gherkin_assist_patterns::{
    CompiledPattern, PatternError, PatternKind, SpecificityScore, StepArgument, extract_arguments,
};
use parking_lot::Mutex;
use thiserror::Error;
use tracing::{debug, instrument, warn};

use crate::glue::{PatternId, SourceLocation, StepDefinitionPattern};

/// Error raised when a step pattern cannot be compiled.
#[derive(Debug, Error)]
#[error("failed to compile step pattern '{pattern}' ({pattern_id}) declared at {location}: {source}")]
pub struct PatternCompileError {
    /// Identifier of the failing pattern.
    pub pattern_id: PatternId,
    /// The raw pattern text.
    pub pattern: String,
    /// Declaration site of the pattern.
    pub location: SourceLocation,
    /// The underlying compilation error.
    #[source]
    pub source: PatternError,
}

/// Matchers derived from one step-definition pattern.
#[derive(Debug, Clone)]
pub struct NormalizedMatcher {
    compiled: Option<CompiledPattern>,
}

impl NormalizedMatcher {
    /// Compile `pattern`.
    ///
    /// On failure the returned matcher is disabled and the error describes
    /// the problem; callers record it rather than propagating it.
    #[must_use]
    pub fn normalize(pattern: &StepDefinitionPattern) -> (Self, Option<PatternCompileError>) {
        match CompiledPattern::compile(&pattern.raw_pattern, pattern.kind) {
            Ok(compiled) => (
                Self {
                    compiled: Some(compiled),
                },
                None,
            ),
            Err(source) => (
                Self { compiled: None },
                Some(PatternCompileError {
                    pattern_id: pattern.id.clone(),
                    pattern: pattern.raw_pattern.clone(),
                    location: pattern.source_location.clone(),
                    source,
                }),
            ),
        }
    }

    /// Whether the pattern compiled.
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.compiled.is_some()
    }

    /// Whether the exact matcher accepts concrete step text.
    #[must_use]
    pub fn is_match(&self, text: &str) -> bool {
        self.compiled.as_ref().is_some_and(|c| c.is_match(text))
    }

    /// Whether the placeholder-tolerant matcher accepts text that may still
    /// contain `<name>` outline tokens.
    #[must_use]
    pub fn is_placeholder_match(&self, text: &str) -> bool {
        self.compiled
            .as_ref()
            .is_some_and(|c| c.is_placeholder_match(text))
    }

    /// Whether the text matches once parameter types are ignored.
    #[must_use]
    pub fn is_relaxed_match(&self, text: &str) -> bool {
        self.compiled
            .as_ref()
            .is_some_and(|c| c.is_relaxed_match(text))
    }

    /// Arguments captured by the exact matcher, if it accepts `text`.
    #[must_use]
    pub fn captures(&self, text: &str) -> Option<Vec<StepArgument>> {
        self.compiled
            .as_ref()
            .and_then(|c| extract_arguments(c.exact(), text))
    }

    /// Arguments captured by the placeholder-tolerant matcher.
    #[must_use]
    pub fn placeholder_captures(&self, text: &str) -> Option<Vec<StepArgument>> {
        self.compiled
            .as_ref()
            .and_then(|c| extract_arguments(c.placeholder_tolerant(), text))
    }

    /// Number of parameters; zero for disabled matchers.
    #[must_use]
    pub fn capture_count(&self) -> usize {
        self.compiled.as_ref().map_or(0, CompiledPattern::capture_count)
    }

    /// Literal text of the pattern with parameters removed.
    #[must_use]
    pub fn literal_text(&self) -> &str {
        self.compiled
            .as_ref()
            .map_or("", CompiledPattern::literal_text)
    }

    /// Literal text before the first parameter.
    #[must_use]
    pub fn literal_prefix(&self) -> &str {
        self.compiled
            .as_ref()
            .map_or("", CompiledPattern::literal_prefix)
    }

    /// Specificity used to break ties between accepting patterns.
    #[must_use]
    pub fn specificity(&self) -> SpecificityScore {
        self.compiled
            .as_ref()
            .map(CompiledPattern::specificity)
            .unwrap_or_default()
    }
}

/// A provider pattern paired with its cached matcher.
#[derive(Debug, Clone)]
pub struct PreparedPattern {
    /// The pattern as fetched.
    pub pattern: StepDefinitionPattern,
    /// Its matcher; disabled when compilation failed.
    pub matcher: Arc<NormalizedMatcher>,
}

/// Matchers prepared for one validation run, in provider declaration order.
#[derive(Debug, Clone, Default)]
pub struct PreparedPatterns {
    /// Every pattern, enabled or not.
    pub patterns: Vec<PreparedPattern>,
    /// Compilation failures, one per failing pattern.
    pub errors: Vec<Arc<PatternCompileError>>,
}

#[derive(Debug)]
struct CacheEntry {
    raw: String,
    kind: PatternKind,
    matcher: Arc<NormalizedMatcher>,
    error: Option<Arc<PatternCompileError>>,
}

/// Matchers cached by pattern id.
#[derive(Debug, Default)]
pub struct MatcherCache {
    entries: Mutex<HashMap<PatternId, CacheEntry>>,
}

impl MatcherCache {
    /// Create an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Prepare matchers for a freshly fetched pattern set.
    ///
    /// Entries whose raw text and kind are unchanged are reused, changed ones
    /// are recompiled and entries for ids no longer reported are evicted.
    #[instrument(level = "debug", skip_all, fields(patterns = patterns.len()))]
    pub fn prepare(&self, patterns: &[StepDefinitionPattern]) -> PreparedPatterns {
        let mut entries = self.entries.lock();
        let live: HashSet<&PatternId> = patterns.iter().map(|p| &p.id).collect();
        entries.retain(|id, _| live.contains(id));

        let mut prepared = PreparedPatterns::default();
        let mut compiled = 0usize;
        for pattern in patterns {
            let fresh = entries
                .get(&pattern.id)
                .is_some_and(|e| e.raw == pattern.raw_pattern && e.kind == pattern.kind);
            if !fresh {
                let (matcher, error) = NormalizedMatcher::normalize(pattern);
                if let Some(err) = error.as_ref() {
                    warn!(pattern = %err.pattern_id, error = %err, "disabling step pattern");
                }
                compiled += 1;
                entries.insert(
                    pattern.id.clone(),
                    CacheEntry {
                        raw: pattern.raw_pattern.clone(),
                        kind: pattern.kind,
                        matcher: Arc::new(matcher),
                        error: error.map(Arc::new),
                    },
                );
            }
            let Some(entry) = entries.get(&pattern.id) else {
                continue;
            };
            if let Some(error) = entry.error.as_ref() {
                prepared.errors.push(Arc::clone(error));
            }
            prepared.patterns.push(PreparedPattern {
                pattern: pattern.clone(),
                matcher: Arc::clone(&entry.matcher),
            });
        }
        debug!(
            compiled,
            failed = prepared.errors.len(),
            "prepared step matchers"
        );
        prepared
    }

    /// Number of cached matchers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Whether the cache is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Drop every cached matcher.
    pub fn clear(&self) {
        self.entries.lock().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{expression_pattern, regex_pattern};
    use gherkin_assist_patterns::tolerate_placeholders;
    use rstest::rstest;

    #[test]
    fn malformed_pattern_is_disabled_with_one_error() {
        let cache = MatcherCache::new();
        let prepared = cache.prepare(&[
            regex_pattern("bad", "Given (unterminated"),
            regex_pattern("good", r"^a (\d+) item$"),
        ]);
        assert_eq!(prepared.errors.len(), 1);
        let Some(error) = prepared.errors.first() else {
            panic!("expected an error");
        };
        assert_eq!(error.pattern_id, PatternId::from("bad"));
        assert_eq!(error.location.line, 1);

        let matchers: Vec<_> = prepared.patterns.iter().map(|p| &p.matcher).collect();
        let [bad, good] = matchers.as_slice() else {
            panic!("expected two matchers");
        };
        assert!(!bad.is_enabled());
        assert!(!bad.is_match("Given (unterminated"));
        assert!(!bad.is_placeholder_match("Given <x>"));
        assert!(good.is_match("a 5 item"));
    }

    #[test]
    fn unchanged_patterns_reuse_their_matcher() {
        let cache = MatcherCache::new();
        let first = cache.prepare(&[regex_pattern("p", r"^a (\d+) item$")]);
        let second = cache.prepare(&[regex_pattern("p", r"^a (\d+) item$")]);
        let (Some(a), Some(b)) = (first.patterns.first(), second.patterns.first()) else {
            panic!("expected prepared patterns");
        };
        assert!(Arc::ptr_eq(&a.matcher, &b.matcher));

        let third = cache.prepare(&[regex_pattern("p", r"^a (\w+) item$")]);
        let Some(c) = third.patterns.first() else {
            panic!("expected prepared pattern");
        };
        assert!(!Arc::ptr_eq(&a.matcher, &c.matcher));
        assert!(c.matcher.is_match("a five item"));
    }

    #[test]
    fn vanished_patterns_are_evicted() {
        let cache = MatcherCache::new();
        let _ = cache.prepare(&[
            regex_pattern("a", "^a$"),
            expression_pattern("b", "b {int}"),
        ]);
        assert_eq!(cache.len(), 2);
        let _ = cache.prepare(&[regex_pattern("a", "^a$")]);
        assert_eq!(cache.len(), 1);
        cache.clear();
        assert!(cache.is_empty());
    }

    #[rstest]
    #[case("the 5 items", true)]
    #[case("the <count> items", true)]
    #[case("the many items", false)]
    fn renormalising_tolerant_output_changes_nothing(#[case] text: &str, #[case] tolerant: bool) {
        let raw = r"^the (\d+) items$";
        let (once, _) = NormalizedMatcher::normalize(&regex_pattern("p", raw));
        let (twice, _) =
            NormalizedMatcher::normalize(&regex_pattern("p", &tolerate_placeholders(raw)));
        assert_eq!(once.is_placeholder_match(text), tolerant);
        assert_eq!(twice.is_placeholder_match(text), tolerant);
    }

    #[test]
    fn captures_report_argument_values() {
        let (matcher, _) = NormalizedMatcher::normalize(&expression_pattern("p", "I have {int} cukes"));
        let values: Vec<_> = matcher
            .captures("I have 7 cukes")
            .unwrap_or_default()
            .into_iter()
            .map(|a| a.value)
            .collect();
        assert_eq!(values, ["7"]);
        assert_eq!(matcher.capture_count(), 1);
        assert_eq!(matcher.literal_prefix(), "I have ");
    }
}
