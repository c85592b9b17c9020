//! Step definitions and the providers that enumerate them.
//!
//! A glue backend (annotated methods, lambda glue, another language's step
//! registry) is represented by a single [`GlueProvider`] capability. Given a
//! project handle it yields the current step-definition patterns; the core
//! never mutates what a provider returned and fetches a fresh set on every
//! validation run.

use std::fmt;

use camino::Utf8PathBuf;
use derive_more::{Deref, From};
use gherkin_assist_patterns::PatternKind;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Stable identifier of a step definition within one provider.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Deref, From, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PatternId(String);

impl From<&str> for PatternId {
    fn from(value: &str) -> Self {
        Self(value.to_owned())
    }
}

impl fmt::Display for PatternId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Where a step definition is declared.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SourceLocation {
    /// Source file of the glue code.
    pub path: Utf8PathBuf,
    /// 1-based line of the declaration.
    pub line: usize,
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.path, self.line)
    }
}

/// A step-definition pattern as reported by a provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepDefinitionPattern {
    /// Identifier used to cache the compiled matcher.
    pub id: PatternId,
    /// The pattern exactly as written in the glue code.
    pub raw_pattern: String,
    /// Syntax of the pattern.
    pub kind: PatternKind,
    /// Declaration site.
    pub source_location: SourceLocation,
    /// Human-readable owner, for example a class and method name.
    pub owner_label: String,
}

/// The project whose glue code should be enumerated.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ProjectHandle {
    /// Root directory of the project.
    pub root: Utf8PathBuf,
}

impl ProjectHandle {
    /// Create a handle rooted at `root`.
    #[must_use]
    pub fn new(root: impl Into<Utf8PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

/// Progress reporting and cooperative cancellation for slow providers.
pub trait Progress: Send + Sync {
    /// A unit of work finished.
    fn advance(&self, _message: &str) {}

    /// Whether the caller no longer needs the result.
    fn is_cancelled(&self) -> bool {
        false
    }
}

/// Progress sink that ignores everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProgress;

impl Progress for NoProgress {}

/// Failure of a glue backend.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// The backend could not enumerate its step definitions.
    #[error("glue backend failed: {0}")]
    Backend(String),
    /// The provider observed cancellation and stopped early.
    #[error("step definition lookup was cancelled")]
    Cancelled,
    /// Reading glue sources failed.
    #[error("I/O error while reading glue: {0}")]
    Io(#[from] std::io::Error),
    /// A glue manifest could not be decoded.
    #[error("invalid glue manifest {path}: {source}")]
    Manifest {
        /// Path of the offending manifest.
        path: Utf8PathBuf,
        /// The underlying decoding error.
        #[source]
        source: serde_json::Error,
    },
}

/// A backend able to enumerate step definitions.
///
/// Calls may be slow, for example when the backend dry-runs the glue code, and
/// may have side effects; the scheduler therefore never aborts one midway.
pub trait GlueProvider: Send + Sync {
    /// Enumerate every step definition visible in `project`.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError`] when the backend fails or is cancelled.
    fn find_step_definitions(
        &self,
        project: &ProjectHandle,
        progress: &dyn Progress,
    ) -> Result<Vec<StepDefinitionPattern>, ProviderError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pattern_ids_display_and_deref() {
        let id = PatternId::from("steps.rs:12");
        assert_eq!(id.to_string(), "steps.rs:12");
        assert_eq!(id.len(), 11);
    }

    #[test]
    fn source_locations_display_path_and_line() {
        let location = SourceLocation {
            path: Utf8PathBuf::from("glue/steps.rs"),
            line: 7,
        };
        assert_eq!(location.to_string(), "glue/steps.rs:7");
    }

    #[test]
    fn no_progress_is_never_cancelled() {
        NoProgress.advance("ignored");
        assert!(!NoProgress.is_cancelled());
    }
}
