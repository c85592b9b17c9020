//! Debounced background validation.
//!
//! Each document moves through `Idle → Scheduled → Running → (Idle |
//! Scheduled)`. Requests arriving within the debounce window coalesce into
//! one run. A run that is already talking to the glue provider is never
//! aborted: a newer request waits for it and then supersedes its output with
//! a fresh run, so at most one run per document is in flight.
//!
//! Finished runs publish a [`ValidationReport`] through a `watch` channel in
//! one step and hand the complete diagnostic set to the [`DiagnosticSink`].
//! Generations come from one counter shared by every document, so they keep
//! increasing for a document that is removed and opened again.
//!
//! While a run is pending the scheduler [holds](DocumentCache::hold) its
//! document, so closing it does not drop the snapshot the run needs. A run
//! whose document is removed before it finishes publishes nothing.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, trace, warn};

use crate::assist::{RankedCandidate, rank_candidates};
use crate::cache::{DocumentCache, DocumentId, LifecycleListener};
use crate::config::AssistConfig;
use crate::diagnostics::{self, Diagnostic, DiagnosticSink};
use crate::feature::ParseError;
use crate::glue::{GlueProvider, ProjectHandle, Progress, ProviderError, StepDefinitionPattern};
use crate::matching::{MatchResult, match_feature};
use crate::normalize::{MatcherCache, PatternCompileError, PreparedPattern};

/// Where a document is in its validation cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ValidationState {
    /// Nothing pending.
    #[default]
    Idle,
    /// A run is waiting for its debounce timer or for the current run.
    Scheduled,
    /// A run is in flight and nothing newer is pending.
    Running,
}

/// Results of one validation run.
#[derive(Debug, Clone)]
pub struct ValidationReport {
    /// The validated document.
    pub document: DocumentId,
    /// Document version the results describe.
    pub version: u64,
    /// Strictly increasing per document, even across removal.
    pub generation: u64,
    /// One result per step, in document order.
    pub results: Vec<MatchResult>,
    /// Structural problems of the validated snapshot.
    pub parse_errors: Arc<[ParseError]>,
    /// Patterns that failed to compile during the run.
    pub compile_errors: Vec<Arc<PatternCompileError>>,
    /// The diagnostic set published for this generation.
    pub diagnostics: Vec<Diagnostic>,
    /// Patterns the results were matched against.
    pub patterns: Vec<PreparedPattern>,
}

impl ValidationReport {
    /// The result for the step covering `line`.
    #[must_use]
    pub fn result_at(&self, line: usize) -> Option<&MatchResult> {
        self.results
            .iter()
            .find(|result| result.step_location.line <= line && line <= result.end_line)
    }

    /// The definition matched by the step covering `line`, for hyperlinks.
    #[must_use]
    pub fn definition_at(&self, line: usize) -> Option<&StepDefinitionPattern> {
        let id = self.result_at(line)?.outcome.pattern_id()?;
        self.patterns
            .iter()
            .map(|prepared| &prepared.pattern)
            .find(|pattern| &pattern.id == id)
    }

    /// Steps without a definition.
    pub fn unmatched(&self) -> impl Iterator<Item = &MatchResult> {
        self.results.iter().filter(|result| !result.is_matched())
    }
}

/// What subscribers observe for a document.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    /// Latest published report.
    pub report: Option<Arc<ValidationReport>>,
    /// Current phase.
    pub state: ValidationState,
}

#[derive(Default)]
struct Control {
    timer: Option<(u64, JoinHandle<()>)>,
    running: bool,
    rerun: bool,
    /// Bumped on removal; runs started under an older epoch are discarded.
    epoch: u64,
    /// Removed from the cache while a run was in flight.
    removed: bool,
    /// Holding the document in the cache.
    held: bool,
}

impl Control {
    fn state(&self) -> ValidationState {
        if self.timer.is_some() || self.rerun {
            ValidationState::Scheduled
        } else if self.running {
            ValidationState::Running
        } else {
            ValidationState::Idle
        }
    }
}

struct DocumentSlot {
    control: Mutex<Control>,
    snapshot: watch::Sender<Snapshot>,
}

impl DocumentSlot {
    fn new() -> Self {
        Self {
            control: Mutex::new(Control::default()),
            snapshot: watch::Sender::new(Snapshot::default()),
        }
    }

    fn publish_state(&self, control: &Control) {
        let state = control.state();
        self.snapshot.send_if_modified(|snapshot| {
            let changed = snapshot.state != state;
            snapshot.state = state;
            changed
        });
    }
}

struct Inner {
    cache: Arc<DocumentCache>,
    provider: Arc<dyn GlueProvider>,
    project: ProjectHandle,
    sink: Arc<dyn DiagnosticSink>,
    matchers: MatcherCache,
    debounce: Duration,
    join_timeout: Duration,
    similarity_threshold: f64,
    runtime: Handle,
    documents: Mutex<HashMap<DocumentId, Arc<DocumentSlot>>>,
    next_timer: AtomicU64,
    next_generation: AtomicU64,
    shut_down: Arc<AtomicBool>,
}

/// Progress handed to the provider; reports cancellation after shutdown.
struct RunProgress {
    document: DocumentId,
    shut_down: Arc<AtomicBool>,
}

impl Progress for RunProgress {
    fn advance(&self, message: &str) {
        trace!(document = %self.document, message, "glue provider progress");
    }

    fn is_cancelled(&self) -> bool {
        self.shut_down.load(Ordering::SeqCst)
    }
}

/// Schedules validation runs on a tokio runtime.
#[derive(Clone)]
pub struct ValidationScheduler {
    inner: Arc<Inner>,
}

impl fmt::Debug for ValidationScheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ValidationScheduler")
            .field("project", &self.inner.project)
            .field("debounce", &self.inner.debounce)
            .field("documents", &self.inner.documents.lock().len())
            .finish_non_exhaustive()
    }
}

impl ValidationScheduler {
    /// Create a scheduler validating documents of `cache` against the
    /// definitions of `provider`.
    ///
    /// Timers and runs are spawned on `runtime`. Debounce, join timeout and
    /// similarity threshold come from `config`. Call
    /// [`attach`](Self::attach) to validate on every cache edit.
    #[must_use]
    pub fn new(
        runtime: Handle,
        cache: Arc<DocumentCache>,
        provider: Arc<dyn GlueProvider>,
        sink: Arc<dyn DiagnosticSink>,
        config: &AssistConfig,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                cache,
                provider,
                project: ProjectHandle::new("."),
                sink,
                matchers: MatcherCache::new(),
                debounce: config.debounce(),
                join_timeout: config.join_timeout(),
                similarity_threshold: config.similarity_threshold,
                runtime,
                documents: Mutex::new(HashMap::new()),
                next_timer: AtomicU64::new(0),
                next_generation: AtomicU64::new(0),
                shut_down: Arc::new(AtomicBool::new(false)),
            }),
        }
    }

    /// Hand `project` to the provider instead of the current directory.
    ///
    /// Only takes effect before the scheduler is cloned or attached.
    #[must_use]
    pub fn with_project(mut self, project: ProjectHandle) -> Self {
        if let Some(inner) = Arc::get_mut(&mut self.inner) {
            inner.project = project;
        }
        self
    }

    /// Register with the document cache so edits schedule validation and
    /// removals cancel it.
    ///
    /// The cache holds the scheduler weakly.
    pub fn attach(&self) {
        let listener = AttachedListener(Arc::downgrade(&self.inner));
        self.inner.cache.add_listener(Arc::new(listener));
    }

    /// Schedule validation of `document` after the debounce delay.
    ///
    /// Requests arriving before the timer fires restart it and coalesce into
    /// one run.
    pub fn request(&self, document: &DocumentId) {
        self.inner.schedule(document, self.inner.debounce);
    }

    /// Schedule validation of `document` without debouncing.
    pub fn revalidate(&self, document: &DocumentId) {
        self.inner.schedule(document, Duration::ZERO);
    }

    /// Revalidate every document tracked by the cache.
    pub fn revalidate_all(&self) {
        for document in self.inner.cache.documents() {
            self.revalidate(&document);
        }
    }

    /// Drop a pending run of `document`. A run already in flight finishes.
    pub fn cancel(&self, document: &DocumentId) {
        self.inner.cancel(document);
    }

    /// Stop accepting requests and drop every pending run.
    ///
    /// Runs already in flight finish; their provider sees cancellation
    /// through [`Progress::is_cancelled`].
    pub fn shutdown(&self) {
        self.inner.shut_down.store(true, Ordering::SeqCst);
        let documents: Vec<DocumentId> = self.inner.documents.lock().keys().cloned().collect();
        for document in &documents {
            self.inner.cancel(document);
        }
        info!(documents = documents.len(), "validation scheduler shut down");
    }

    /// Current phase of `document`.
    #[must_use]
    pub fn state(&self, document: &DocumentId) -> ValidationState {
        self.inner
            .existing(document)
            .map_or(ValidationState::Idle, |slot| slot.control.lock().state())
    }

    /// Latest published report of `document`.
    #[must_use]
    pub fn latest(&self, document: &DocumentId) -> Option<Arc<ValidationReport>> {
        self.inner
            .existing(document)
            .and_then(|slot| slot.snapshot.borrow().report.clone())
    }

    /// Observe reports and phase changes of `document`.
    #[must_use]
    pub fn subscribe(&self, document: &DocumentId) -> watch::Receiver<Snapshot> {
        self.inner.slot(document).snapshot.subscribe()
    }

    /// Wait until `document` is idle, for at most `timeout`.
    ///
    /// Returns the latest report either way, so a slow provider yields stale
    /// results rather than an error.
    pub async fn join(
        &self,
        document: &DocumentId,
        timeout: Duration,
    ) -> Option<Arc<ValidationReport>> {
        let mut receiver = self.subscribe(document);
        let settled = tokio::time::timeout(
            timeout,
            receiver.wait_for(|snapshot| snapshot.state == ValidationState::Idle),
        )
        .await
        .is_ok_and(|waited| waited.is_ok());
        if !settled {
            warn!(document = %document, ?timeout, "validation still pending; returning latest results");
        }
        self.latest(document)
    }

    /// [`join`](Self::join) with the configured timeout, blocking the calling
    /// thread.
    ///
    /// Must be called from outside the scheduler's runtime.
    #[must_use]
    pub fn join_blocking(&self, document: &DocumentId) -> Option<Arc<ValidationReport>> {
        self.inner
            .runtime
            .block_on(self.join(document, self.inner.join_timeout))
    }

    /// Configured join timeout.
    #[must_use]
    pub fn join_timeout(&self) -> Duration {
        self.inner.join_timeout
    }

    /// Rank the definitions of the latest report against a typed step line.
    #[must_use]
    pub fn complete(&self, document: &DocumentId, typed_line: &str) -> Vec<RankedCandidate> {
        let (Some(doc), Some(report)) = (self.inner.cache.get(document), self.latest(document))
        else {
            return Vec::new();
        };
        rank_candidates(
            typed_line,
            &doc.dialect,
            &report.patterns,
            self.inner.similarity_threshold,
        )
    }
}

impl Inner {
    fn slot(&self, document: &DocumentId) -> Arc<DocumentSlot> {
        Arc::clone(
            self.documents
                .lock()
                .entry(document.clone())
                .or_insert_with(|| Arc::new(DocumentSlot::new())),
        )
    }

    fn existing(&self, document: &DocumentId) -> Option<Arc<DocumentSlot>> {
        self.documents.lock().get(document).cloned()
    }

    fn schedule(self: &Arc<Self>, document: &DocumentId, delay: Duration) {
        if self.shut_down.load(Ordering::SeqCst) {
            debug!(document = %document, "scheduler shut down; ignoring request");
            return;
        }
        let mut documents = self.documents.lock();
        let slot = Arc::clone(
            documents
                .entry(document.clone())
                .or_insert_with(|| Arc::new(DocumentSlot::new())),
        );
        let mut control = slot.control.lock();
        drop(documents);
        let token = self.next_timer.fetch_add(1, Ordering::Relaxed);
        if let Some((_, timer)) = control.timer.take() {
            timer.abort();
        }
        control.removed = false;
        if !control.held {
            control.held = self.cache.hold(document);
        }
        let inner = Arc::clone(self);
        let id = document.clone();
        let timer = self.runtime.spawn(async move {
            tokio::time::sleep(delay).await;
            inner.fire(&id, token);
        });
        control.timer = Some((token, timer));
        slot.publish_state(&control);
        debug!(document = %document, ?delay, "validation scheduled");
    }

    fn fire(self: &Arc<Self>, document: &DocumentId, token: u64) {
        let Some(slot) = self.existing(document) else {
            return;
        };
        let mut control = slot.control.lock();
        if control.timer.as_ref().map(|(current, _)| *current) != Some(token) {
            return;
        }
        control.timer = None;
        if control.running {
            control.rerun = true;
            slot.publish_state(&control);
            debug!(document = %document, "validation queued behind running run");
            return;
        }
        control.running = true;
        slot.publish_state(&control);
        drop(control);

        let inner = Arc::clone(self);
        let id = document.clone();
        self.runtime.spawn(async move { inner.drive(id, slot).await });
    }

    async fn drive(self: Arc<Self>, document: DocumentId, slot: Arc<DocumentSlot>) {
        loop {
            self.run_once(&document, &slot).await;
            let mut control = slot.control.lock();
            if control.rerun && !self.shut_down.load(Ordering::SeqCst) {
                control.rerun = false;
                slot.publish_state(&control);
                continue;
            }
            control.rerun = false;
            control.running = false;
            self.settle(&document, &mut control);
            slot.publish_state(&control);
            let retired = control.removed && control.state() == ValidationState::Idle;
            drop(control);
            if retired {
                self.retire(&document, &slot);
            }
            break;
        }
    }

    #[instrument(level = "debug", skip_all, fields(document = %document))]
    async fn run_once(&self, document: &DocumentId, slot: &DocumentSlot) {
        let epoch = slot.control.lock().epoch;
        let Some(snapshot) = self.cache.get(document) else {
            debug!(document = %document, "document vanished before validation");
            return;
        };
        let provider = Arc::clone(&self.provider);
        let project = self.project.clone();
        let progress = RunProgress {
            document: document.clone(),
            shut_down: Arc::clone(&self.shut_down),
        };
        let fetched = tokio::task::spawn_blocking(move || {
            provider.find_step_definitions(&project, &progress)
        })
        .await
        .unwrap_or_else(|error| {
            Err(ProviderError::Backend(format!(
                "glue provider task failed: {error}"
            )))
        });

        match fetched {
            Ok(patterns) => {
                let prepared = self.matchers.prepare(&patterns);
                let results = snapshot
                    .tree
                    .as_deref()
                    .map_or_else(Vec::new, |feature| match_feature(feature, &prepared.patterns));
                let diagnostics = diagnostics::collect(
                    &results,
                    &snapshot.parse_errors,
                    &prepared.errors,
                    &snapshot.index,
                );
                let control = slot.control.lock();
                if control.epoch != epoch {
                    debug!(document = %document, "document removed during validation; discarding results");
                    return;
                }
                let report = Arc::new(ValidationReport {
                    document: document.clone(),
                    version: snapshot.version,
                    generation: self.next_generation.fetch_add(1, Ordering::Relaxed) + 1,
                    results,
                    parse_errors: Arc::clone(&snapshot.parse_errors),
                    compile_errors: prepared.errors,
                    diagnostics,
                    patterns: prepared.patterns,
                });
                slot.snapshot
                    .send_modify(|published| published.report = Some(Arc::clone(&report)));
                self.sink.publish(document, report.diagnostics.clone());
                drop(control);
                debug!(
                    document = %document,
                    generation = report.generation,
                    version = report.version,
                    steps = report.results.len(),
                    unmatched = report.unmatched().count(),
                    "published validation results"
                );
            }
            Err(error) => {
                let control = slot.control.lock();
                if control.epoch != epoch {
                    debug!(document = %document, %error, "document removed during validation; discarding failure");
                    return;
                }
                warn!(document = %document, %error, "glue provider failed; keeping previous results");
                let previous = slot.snapshot.borrow().report.clone();
                let mut published = previous.map_or_else(
                    || diagnostics::collect(&[], &snapshot.parse_errors, &[], &snapshot.index),
                    |report| report.diagnostics.clone(),
                );
                published.push(diagnostics::glue_validation_error(&error, &snapshot.index));
                self.sink.publish(document, published);
                drop(control);
            }
        }
    }

    fn cancel(&self, document: &DocumentId) {
        let Some(slot) = self.existing(document) else {
            return;
        };
        let mut control = slot.control.lock();
        let pending = control.timer.is_some() || control.rerun;
        if let Some((_, timer)) = control.timer.take() {
            timer.abort();
        }
        control.rerun = false;
        self.settle(document, &mut control);
        slot.publish_state(&control);
        if pending {
            debug!(document = %document, "pending validation cancelled");
        }
    }

    /// Release the cache hold once nothing is pending or running.
    fn settle(&self, document: &DocumentId, control: &mut Control) {
        if control.held && control.state() == ValidationState::Idle {
            control.held = false;
            self.cache.release(document);
        }
    }

    /// Drop `document` after its removal from the cache.
    ///
    /// A slot with a run in flight stays until the run finishes, so a reopened
    /// document chains behind it instead of starting a second run.
    fn forget(&self, document: &DocumentId) {
        let mut documents = self.documents.lock();
        let Some(slot) = documents.get(document).cloned() else {
            return;
        };
        let mut control = slot.control.lock();
        if let Some((_, timer)) = control.timer.take() {
            timer.abort();
        }
        control.rerun = false;
        control.epoch += 1;
        control.removed = true;
        control.held = false;
        slot.snapshot.send_modify(|published| published.report = None);
        slot.publish_state(&control);
        if control.running {
            debug!(document = %document, "document removed during validation");
            return;
        }
        drop(control);
        documents.remove(document);
    }

    fn retire(&self, document: &DocumentId, slot: &Arc<DocumentSlot>) {
        let mut documents = self.documents.lock();
        let current = documents
            .get(document)
            .is_some_and(|existing| Arc::ptr_eq(existing, slot));
        if !current {
            return;
        }
        let control = slot.control.lock();
        if control.removed && control.state() == ValidationState::Idle {
            drop(control);
            documents.remove(document);
        }
    }
}

struct AttachedListener(Weak<Inner>);

impl LifecycleListener for AttachedListener {
    fn on_created(&self, document: &DocumentId) {
        if let Some(inner) = self.0.upgrade() {
            inner.schedule(document, inner.debounce);
        }
    }

    fn on_changed(&self, document: &DocumentId) {
        self.on_created(document);
    }

    fn on_removed(&self, document: &DocumentId) {
        if let Some(inner) = self.0.upgrade() {
            inner.forget(document);
        }
    }
}

impl LifecycleListener for ValidationScheduler {
    fn on_created(&self, document: &DocumentId) {
        self.request(document);
    }

    fn on_changed(&self, document: &DocumentId) {
        self.request(document);
    }

    fn on_removed(&self, document: &DocumentId) {
        self.inner.forget(document);
    }
}
