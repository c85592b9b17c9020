//! Shared test support utilities for gherkin-assist tests.
//!
//! This module provides common infrastructure for both unit and integration
//! tests, including:
//! - Step-definition pattern builders
//! - A diagnostic sink and a lifecycle listener that record what they receive
//! - A scripted glue provider with call accounting
//! - Temporary workspaces holding feature files and glue manifests

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use camino::{Utf8Path, Utf8PathBuf};
use gherkin_assist_patterns::PatternKind;
use parking_lot::Mutex;
use tempfile::TempDir;

use crate::cache::{DocumentId, LifecycleListener};
use crate::diagnostics::{Diagnostic, DiagnosticSink};
use crate::glue::{
    GlueProvider, PatternId, ProjectHandle, Progress, ProviderError, SourceLocation,
    StepDefinitionPattern,
};

/// Build a pattern of `kind` declared at `steps.rs:line`.
#[must_use]
pub fn pattern_at(id: &str, raw: &str, kind: PatternKind, line: usize) -> StepDefinitionPattern {
    StepDefinitionPattern {
        id: PatternId::from(id),
        raw_pattern: raw.to_owned(),
        kind,
        source_location: SourceLocation {
            path: Utf8PathBuf::from("steps.rs"),
            line,
        },
        owner_label: format!("steps::{id}"),
    }
}

/// Build a regular-expression pattern declared at `steps.rs:1`.
#[must_use]
pub fn regex_pattern(id: &str, raw: &str) -> StepDefinitionPattern {
    pattern_at(id, raw, PatternKind::Regex, 1)
}

/// Build a typed-expression pattern declared at `steps.rs:1`.
#[must_use]
pub fn expression_pattern(id: &str, raw: &str) -> StepDefinitionPattern {
    pattern_at(id, raw, PatternKind::TypedExpression, 1)
}

/// Records every diagnostic set published to it.
#[derive(Debug, Default)]
pub struct RecordingSink {
    published: Mutex<Vec<(DocumentId, Vec<Diagnostic>)>>,
}

impl RecordingSink {
    /// Every publication in order.
    #[must_use]
    pub fn published(&self) -> Vec<(DocumentId, Vec<Diagnostic>)> {
        self.published.lock().clone()
    }

    /// The most recent diagnostic set published for `document`.
    #[must_use]
    pub fn last_for(&self, document: &DocumentId) -> Option<Vec<Diagnostic>> {
        self.published
            .lock()
            .iter()
            .rev()
            .find(|(id, _)| id == document)
            .map(|(_, diagnostics)| diagnostics.clone())
    }

    /// Number of publications for `document`.
    #[must_use]
    pub fn count_for(&self, document: &DocumentId) -> usize {
        self.published
            .lock()
            .iter()
            .filter(|(id, _)| id == document)
            .count()
    }
}

impl DiagnosticSink for RecordingSink {
    fn publish(&self, document: &DocumentId, diagnostics: Vec<Diagnostic>) {
        self.published.lock().push((document.clone(), diagnostics));
    }
}

/// A lifecycle notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LifecycleEvent {
    /// `on_created`.
    Created(DocumentId),
    /// `on_changed`.
    Changed(DocumentId),
    /// `on_removed`.
    Removed(DocumentId),
}

/// Records lifecycle notifications.
#[derive(Debug, Default)]
pub struct RecordingListener {
    events: Mutex<Vec<LifecycleEvent>>,
}

impl RecordingListener {
    /// Every event in order.
    #[must_use]
    pub fn events(&self) -> Vec<LifecycleEvent> {
        self.events.lock().clone()
    }
}

impl LifecycleListener for RecordingListener {
    fn on_created(&self, document: &DocumentId) {
        self.events
            .lock()
            .push(LifecycleEvent::Created(document.clone()));
    }

    fn on_changed(&self, document: &DocumentId) {
        self.events
            .lock()
            .push(LifecycleEvent::Changed(document.clone()));
    }

    fn on_removed(&self, document: &DocumentId) {
        self.events
            .lock()
            .push(LifecycleEvent::Removed(document.clone()));
    }
}

/// A provider answering from a script, then from a fixed pattern set.
///
/// Each call pops the next scripted answer; once the script is exhausted the
/// fallback patterns are returned. Calls may be slowed down with real sleeps
/// to exercise run chaining.
#[derive(Debug, Default)]
pub struct ScriptedProvider {
    fallback: Vec<StepDefinitionPattern>,
    script: Mutex<VecDeque<Result<Vec<StepDefinitionPattern>, String>>>,
    delay: Duration,
    calls: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl ScriptedProvider {
    /// Always answer with `patterns`.
    #[must_use]
    pub fn new(patterns: Vec<StepDefinitionPattern>) -> Self {
        Self {
            fallback: patterns,
            ..Self::default()
        }
    }

    /// Answer the next call with a backend failure.
    #[must_use]
    pub fn then_fail(self, message: &str) -> Self {
        self.script.lock().push_back(Err(message.to_owned()));
        self
    }

    /// Answer the next call with `patterns`.
    #[must_use]
    pub fn then_answer(self, patterns: Vec<StepDefinitionPattern>) -> Self {
        self.script.lock().push_back(Ok(patterns));
        self
    }

    /// Block each call for `delay` of real time.
    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Number of calls so far.
    #[must_use]
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Largest number of overlapping calls observed.
    #[must_use]
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

impl GlueProvider for ScriptedProvider {
    fn find_step_definitions(
        &self,
        _project: &ProjectHandle,
        progress: &dyn Progress,
    ) -> Result<Vec<StepDefinitionPattern>, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        if !self.delay.is_zero() {
            std::thread::sleep(self.delay);
        }
        progress.advance("scripted answer");
        let answer = self
            .script
            .lock()
            .pop_front()
            .unwrap_or_else(|| Ok(self.fallback.clone()));
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        answer.map_err(ProviderError::Backend)
    }
}

/// A temporary directory holding feature files and glue manifests.
#[derive(Debug)]
pub struct TempWorkspace {
    dir: TempDir,
    root: Utf8PathBuf,
}

impl TempWorkspace {
    /// Create an empty workspace.
    ///
    /// # Panics
    ///
    /// Panics when the directory cannot be created or is not valid UTF-8.
    #[must_use]
    pub fn new() -> Self {
        let dir = tempfile::tempdir().unwrap_or_else(|e| panic!("create temp dir: {e}"));
        let root = Utf8PathBuf::from_path_buf(dir.path().to_path_buf())
            .unwrap_or_else(|p| panic!("non-UTF-8 temp dir {}", p.display()));
        Self { dir, root }
    }

    /// Root directory.
    #[must_use]
    pub fn root(&self) -> &Utf8Path {
        &self.root
    }

    /// Write `content` to `name` under the root and return its path.
    ///
    /// # Panics
    ///
    /// Panics when the file cannot be written.
    pub fn write(&self, name: &str, content: &str) -> Utf8PathBuf {
        let path = self.root.join(name);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .unwrap_or_else(|e| panic!("create {parent}: {e}"));
        }
        std::fs::write(&path, content).unwrap_or_else(|e| panic!("write {path}: {e}"));
        path
    }

    /// Path of the underlying temporary directory.
    #[must_use]
    pub fn path(&self) -> &std::path::Path {
        self.dir.path()
    }
}

impl Default for TempWorkspace {
    fn default() -> Self {
        Self::new()
    }
}

/// Shared handles for scheduler tests.
#[derive(Debug, Clone)]
pub struct Harness {
    /// The recording sink.
    pub sink: Arc<RecordingSink>,
    /// The scripted provider.
    pub provider: Arc<ScriptedProvider>,
}

impl Harness {
    /// Wrap `provider` with a fresh sink.
    #[must_use]
    pub fn new(provider: ScriptedProvider) -> Self {
        Self {
            sink: Arc::new(RecordingSink::default()),
            provider: Arc::new(provider),
        }
    }
}
