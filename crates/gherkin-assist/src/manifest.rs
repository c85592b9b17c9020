//! A glue provider backed by a JSON manifest.
//!
//! Build tooling that already knows the project's step definitions can dump
//! them as a JSON array:
//!
//! ```json
//! [
//!   { "pattern": "I have {int} cukes", "source": { "path": "steps.rs", "line": 12 } },
//!   { "id": "pay", "pattern": "^I pay (\\d+)$", "kind": "regex",
//!     "source": { "path": "steps.rs", "line": 30 }, "owner": "Steps::pay" }
//! ]
//! ```
//!
//! `id` defaults to `path:line`, `kind` is inferred from the pattern when
//! absent and `owner` defaults to an empty label. The manifest is re-read on
//! every validation run.

use camino::{Utf8Path, Utf8PathBuf};
use gherkin_assist_patterns::PatternKind;
use serde::Deserialize;
use tracing::debug;

use crate::glue::{
    GlueProvider, PatternId, ProjectHandle, Progress, ProviderError, SourceLocation,
    StepDefinitionPattern,
};

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ManifestEntry {
    id: Option<String>,
    pattern: String,
    kind: Option<String>,
    source: SourceLocation,
    owner: Option<String>,
}

impl ManifestEntry {
    fn into_pattern(self) -> Result<StepDefinitionPattern, ProviderError> {
        let kind = match self.kind.as_deref() {
            None => PatternKind::infer(&self.pattern),
            Some(label) => PatternKind::from_label(label).ok_or_else(|| {
                ProviderError::Backend(format!(
                    "unknown pattern kind `{label}` for step declared at {}",
                    self.source
                ))
            })?,
        };
        let id = self
            .id
            .map_or_else(|| PatternId::from(self.source.to_string()), PatternId::from);
        Ok(StepDefinitionPattern {
            id,
            raw_pattern: self.pattern,
            kind,
            source_location: self.source,
            owner_label: self.owner.unwrap_or_default(),
        })
    }
}

/// Reads step definitions from a JSON manifest file.
#[derive(Debug, Clone)]
pub struct ManifestGlueProvider {
    path: Utf8PathBuf,
}

impl ManifestGlueProvider {
    /// Read the manifest at `path`; relative paths resolve against the
    /// project root.
    #[must_use]
    pub fn new(path: impl Into<Utf8PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Decode manifest text; `path` is only used in error messages.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError::Manifest`] when the JSON is malformed and
    /// [`ProviderError::Backend`] when an entry names an unknown kind.
    pub fn parse(json: &str, path: &Utf8Path) -> Result<Vec<StepDefinitionPattern>, ProviderError> {
        let entries: Vec<ManifestEntry> =
            serde_json::from_str(json).map_err(|source| ProviderError::Manifest {
                path: path.to_owned(),
                source,
            })?;
        entries.into_iter().map(ManifestEntry::into_pattern).collect()
    }
}

impl GlueProvider for ManifestGlueProvider {
    fn find_step_definitions(
        &self,
        project: &ProjectHandle,
        progress: &dyn Progress,
    ) -> Result<Vec<StepDefinitionPattern>, ProviderError> {
        if progress.is_cancelled() {
            return Err(ProviderError::Cancelled);
        }
        let path = project.root.join(&self.path);
        let json = std::fs::read_to_string(&path)?;
        let patterns = Self::parse(&json, &path)?;
        progress.advance("read glue manifest");
        debug!(manifest = %path, patterns = patterns.len(), "loaded glue manifest");
        Ok(patterns)
    }
}
