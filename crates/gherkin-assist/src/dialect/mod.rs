//! Keyword dialects for feature documents.
//!
//! A dialect is the keyword vocabulary of one natural language. The built-in
//! table is embedded as JSON and parsed once; custom tables can be loaded with
//! [`DialectTable::from_json`]. A document selects its dialect with a
//! `# language: <tag>` marker on its first non-blank line. Absent or unknown
//! tags fall back to English.
//!
//! Keyword lookups are case-sensitive and never fall back to another
//! dialect's vocabulary once a dialect has been resolved.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, LazyLock};

use regex::Regex;
use serde::Deserialize;
use thiserror::Error;

/// Tag of the dialect used when a document does not declare one.
pub const DEFAULT_LANGUAGE: &str = "en";

/// The wildcard step keyword, accepted for matching but never offered for
/// completion.
pub const WILDCARD_KEYWORD: &str = "* ";

static BUILTIN_JSON: &str = include_str!("languages.json");

static BUILTIN: LazyLock<DialectTable> = LazyLock::new(|| {
    DialectTable::from_json(BUILTIN_JSON)
        .unwrap_or_else(|err| unreachable!("built-in dialect table must load: {err}"))
});

static LANGUAGE_MARKER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*#\s*language\s*:\s*(\S+)\s*$")
        .unwrap_or_else(|_| unreachable!("language marker regex must compile"))
});

/// Keyword role within a dialect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Role {
    /// `Feature:` headers.
    Feature,
    /// `Background:` headers.
    Background,
    /// `Rule:` headers.
    Rule,
    /// `Scenario:` headers.
    Scenario,
    /// `Scenario Outline:` headers.
    ScenarioOutline,
    /// `Examples:` headers.
    Examples,
    /// `Given` steps.
    Given,
    /// `When` steps.
    When,
    /// `Then` steps.
    Then,
    /// `And` steps.
    And,
    /// `But` steps.
    But,
}

impl Role {
    /// Every role, structural roles first.
    pub const ALL: [Self; 11] = [
        Self::Feature,
        Self::Background,
        Self::Rule,
        Self::Scenario,
        Self::ScenarioOutline,
        Self::Examples,
        Self::Given,
        Self::When,
        Self::Then,
        Self::And,
        Self::But,
    ];

    /// Whether keywords of this role introduce steps.
    #[must_use]
    pub fn is_step(self) -> bool {
        matches!(
            self,
            Self::Given | Self::When | Self::Then | Self::And | Self::But
        )
    }

    /// Name of the role as it appears in dialect JSON.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Feature => "feature",
            Self::Background => "background",
            Self::Rule => "rule",
            Self::Scenario => "scenario",
            Self::ScenarioOutline => "scenarioOutline",
            Self::Examples => "examples",
            Self::Given => "given",
            Self::When => "when",
            Self::Then => "then",
            Self::And => "and",
            Self::But => "but",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A step keyword together with the role it introduces.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepKeyword {
    /// Keyword text including any trailing space.
    pub text: String,
    /// Role of the keyword. The wildcard reports the first role listing it.
    pub role: Role,
}

/// Errors raised while loading a dialect table.
#[derive(Debug, Error)]
pub enum DialectError {
    /// The JSON document could not be decoded.
    #[error("invalid dialect table: {0}")]
    Json(#[from] serde_json::Error),
    /// A role has no keyword other than the wildcard.
    #[error("dialect `{language}` has no keywords for role `{role}`")]
    MissingKeywords {
        /// Tag of the offending dialect.
        language: String,
        /// Role without keywords.
        role: Role,
    },
    /// The table has no dialect for the default language.
    #[error("dialect table has no `{0}` dialect to fall back to")]
    MissingDefault(String),
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawDialect {
    name: String,
    native: String,
    feature: Vec<String>,
    background: Vec<String>,
    rule: Vec<String>,
    scenario: Vec<String>,
    scenario_outline: Vec<String>,
    examples: Vec<String>,
    given: Vec<String>,
    when: Vec<String>,
    then: Vec<String>,
    and: Vec<String>,
    but: Vec<String>,
}

impl RawDialect {
    fn into_lists(self) -> (String, String, BTreeMap<Role, Vec<String>>) {
        let lists = BTreeMap::from([
            (Role::Feature, self.feature),
            (Role::Background, self.background),
            (Role::Rule, self.rule),
            (Role::Scenario, self.scenario),
            (Role::ScenarioOutline, self.scenario_outline),
            (Role::Examples, self.examples),
            (Role::Given, self.given),
            (Role::When, self.when),
            (Role::Then, self.then),
            (Role::And, self.and),
            (Role::But, self.but),
        ]);
        (self.name, self.native, lists)
    }
}

/// The keyword vocabulary of one language.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dialect {
    language: String,
    name: String,
    native: String,
    keywords: BTreeMap<Role, Vec<String>>,
    step_keywords: Vec<StepKeyword>,
    structural_keywords: Vec<(String, Role)>,
}

impl Dialect {
    fn new(
        language: String,
        name: String,
        native: String,
        keywords: BTreeMap<Role, Vec<String>>,
    ) -> Result<Self, DialectError> {
        for role in Role::ALL {
            let has_keyword = keywords
                .get(&role)
                .is_some_and(|list| list.iter().any(|k| k != WILDCARD_KEYWORD && !k.is_empty()));
            if !has_keyword {
                return Err(DialectError::MissingKeywords { language, role });
            }
        }

        let mut step_keywords: Vec<StepKeyword> = Vec::new();
        let mut structural_keywords = Vec::new();
        for (&role, list) in &keywords {
            for keyword in list {
                if role.is_step() {
                    if !step_keywords.iter().any(|k| &k.text == keyword) {
                        step_keywords.push(StepKeyword {
                            text: keyword.clone(),
                            role,
                        });
                    }
                } else {
                    structural_keywords.push((keyword.clone(), role));
                }
            }
        }
        // Longest first so a short keyword never shadows a longer one.
        step_keywords.sort_by(|a, b| b.text.len().cmp(&a.text.len()));
        structural_keywords.sort_by(|a, b| b.0.len().cmp(&a.0.len()));

        Ok(Self {
            language,
            name,
            native,
            keywords,
            step_keywords,
            structural_keywords,
        })
    }

    /// Language tag, for example `en` or `zh-CN`.
    #[must_use]
    pub fn language(&self) -> &str {
        &self.language
    }

    /// English name of the language.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Native name of the language.
    #[must_use]
    pub fn native(&self) -> &str {
        &self.native
    }

    /// Keywords of `role` in declaration order.
    #[must_use]
    pub fn keywords(&self, role: Role) -> &[String] {
        self.keywords.get(&role).map_or(&[], Vec::as_slice)
    }

    /// The first declared keyword of a structural role, used when a header is
    /// synthesised.
    #[must_use]
    pub fn structural_keyword(&self, role: Role) -> Option<&str> {
        self.keywords(role)
            .iter()
            .find(|k| k.as_str() != WILDCARD_KEYWORD)
            .map(String::as_str)
    }

    /// All step keywords, wildcard included, longest first.
    #[must_use]
    pub fn step_keywords(&self) -> &[StepKeyword] {
        &self.step_keywords
    }

    /// Step keywords offered for completion: the wildcard is excluded.
    pub fn completion_keywords(&self) -> impl Iterator<Item = &StepKeyword> {
        self.step_keywords
            .iter()
            .filter(|k| k.text != WILDCARD_KEYWORD)
    }

    /// The longest step keyword that prefixes `line`.
    #[must_use]
    pub fn match_step_keyword(&self, line: &str) -> Option<&StepKeyword> {
        self.step_keywords
            .iter()
            .find(|k| line.starts_with(k.text.as_str()))
    }

    /// The longest structural keyword introducing `line` as `Keyword:`.
    ///
    /// Returns the role, the keyword and the text after the colon.
    #[must_use]
    pub fn match_structural_keyword<'l>(&self, line: &'l str) -> Option<(Role, &str, &'l str)> {
        self.structural_keywords.iter().find_map(|(keyword, role)| {
            line.strip_prefix(keyword.as_str())
                .and_then(|rest| rest.strip_prefix(':'))
                .map(|rest| (*role, keyword.as_str(), rest))
        })
    }
}

/// A set of dialects keyed by language tag.
#[derive(Debug, Clone)]
pub struct DialectTable {
    dialects: BTreeMap<String, Arc<Dialect>>,
    default: Arc<Dialect>,
}

impl DialectTable {
    /// Load a table from JSON keyed by language tag.
    ///
    /// # Errors
    ///
    /// Returns [`DialectError`] when the JSON is malformed, when a role other
    /// than the wildcard has no keyword, or when the table lacks the default
    /// `en` dialect.
    pub fn from_json(json: &str) -> Result<Self, DialectError> {
        let raw: BTreeMap<String, RawDialect> = serde_json::from_str(json)?;
        let mut dialects = BTreeMap::new();
        for (language, dialect) in raw {
            let (name, native, lists) = dialect.into_lists();
            let dialect = Dialect::new(language.clone(), name, native, lists)?;
            dialects.insert(language, Arc::new(dialect));
        }
        let default = dialects
            .get(DEFAULT_LANGUAGE)
            .cloned()
            .ok_or_else(|| DialectError::MissingDefault(DEFAULT_LANGUAGE.to_owned()))?;
        Ok(Self { dialects, default })
    }

    /// The built-in table.
    #[must_use]
    pub fn builtin() -> &'static Self {
        &BUILTIN
    }

    /// The dialect with exactly `tag`, if the table has one.
    #[must_use]
    pub fn get(&self, tag: &str) -> Option<&Arc<Dialect>> {
        self.dialects.get(tag)
    }

    /// The fallback dialect.
    #[must_use]
    pub fn default_dialect(&self) -> &Arc<Dialect> {
        &self.default
    }

    /// Language tags in sorted order.
    pub fn languages(&self) -> impl Iterator<Item = &str> {
        self.dialects.keys().map(String::as_str)
    }

    /// The dialect for `tag`, or the default when the tag is unknown.
    #[must_use]
    pub fn resolve_tag(&self, tag: &str) -> Arc<Dialect> {
        Arc::clone(self.get(tag).unwrap_or(&self.default))
    }

    /// The dialect declared by `text`, or the default.
    #[must_use]
    pub fn resolve(&self, text: &str) -> Arc<Dialect> {
        language_marker(text).map_or_else(|| Arc::clone(&self.default), |tag| self.resolve_tag(tag))
    }
}

/// The tag of a `# language: <tag>` marker on the first non-blank line.
///
/// # Examples
/// ```
/// use gherkin_assist::dialect::language_marker;
/// assert_eq!(language_marker("\n# language: fr\nFonctionnalité: x"), Some("fr"));
/// assert_eq!(language_marker("Feature: x\n# language: fr"), None);
/// ```
#[must_use]
pub fn language_marker(text: &str) -> Option<&str> {
    let first = crate::position::split_lines(text)
        .map(|line| line.content)
        .find(|line| !line.trim().is_empty())?;
    LANGUAGE_MARKER_RE
        .captures(first)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}

/// Resolve the dialect of `text` against the built-in table.
#[must_use]
pub fn resolve(text: &str) -> Arc<Dialect> {
    DialectTable::builtin().resolve(text)
}

/// Resolve a language tag against the built-in table.
#[must_use]
pub fn resolve_tag(tag: &str) -> Arc<Dialect> {
    DialectTable::builtin().resolve_tag(tag)
}
