//! Parsed documents keyed by identity.
//!
//! Published [`Document`] values are immutable. Edits and reparses build a new
//! value and swap it into the document's slot, so readers holding an
//! `Arc<Document>` never observe a half-updated tree.
//!
//! Open documents are held strongly, and so are documents a pending
//! validation has [held](DocumentCache::hold). Closing an unheld document
//! demotes its slot to a weak reference: the parsed tree lives on while
//! someone still references it and is reloaded from a [`DocumentSource`]
//! afterwards.

use std::collections::HashMap;
use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::{Arc, Weak};

use arc_swap::ArcSwap;
use camino::{Utf8Path, Utf8PathBuf};
use derive_more::{Deref, From};
use parking_lot::RwLock;
use serde::Serialize;
use tracing::{debug, instrument, warn};

use crate::dialect::{Dialect, DialectTable};
use crate::feature::{Feature, ParseError, parse};
use crate::position::LineIndex;

/// Stable identity of a document across edits, usually its path or URI.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Deref, From, Serialize)]
#[serde(transparent)]
pub struct DocumentId(String);

impl From<&str> for DocumentId {
    fn from(value: &str) -> Self {
        Self(value.to_owned())
    }
}

impl From<&Utf8Path> for DocumentId {
    fn from(value: &Utf8Path) -> Self {
        Self(value.as_str().to_owned())
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A document snapshot.
#[derive(Debug, Clone)]
pub struct Document {
    /// Identity of the document.
    pub id: DocumentId,
    /// Raw text.
    pub text: Arc<str>,
    /// Dialect resolved from the text's language marker.
    pub dialect: Arc<Dialect>,
    /// Tree of the last parse; stale while `dirty`.
    pub tree: Option<Arc<Feature>>,
    /// Problems found by the last parse.
    pub parse_errors: Arc<[ParseError]>,
    /// Set when the text changed after the last parse.
    pub dirty: bool,
    /// Incremented on every text change.
    pub version: u64,
    /// Line offsets of `text`.
    pub index: Arc<LineIndex>,
}

impl Document {
    fn parsed(id: DocumentId, text: Arc<str>, version: u64, dialects: &DialectTable) -> Self {
        let dialect = dialects.resolve(&text);
        let (tree, errors) = parse(&text, &dialect);
        debug!(
            document = %id,
            version,
            language = dialect.language(),
            errors = errors.len(),
            "parsed document"
        );
        Self {
            index: Arc::new(LineIndex::new(Arc::clone(&text))),
            id,
            text,
            dialect,
            tree: tree.map(Arc::new),
            parse_errors: errors.into(),
            dirty: false,
            version,
        }
    }

    fn edited(&self, text: Arc<str>) -> Self {
        Self {
            index: Arc::new(LineIndex::new(Arc::clone(&text))),
            text,
            dirty: true,
            version: self.version + 1,
            ..self.clone()
        }
    }
}

/// Receives document lifecycle events.
pub trait LifecycleListener: Send + Sync {
    /// A document was first observed.
    fn on_created(&self, _document: &DocumentId) {}

    /// A document's text changed or was invalidated.
    fn on_changed(&self, _document: &DocumentId) {}

    /// A document was dropped from the cache.
    fn on_removed(&self, _document: &DocumentId) {}
}

/// Backing storage for documents that are not open.
pub trait DocumentSource: Send + Sync {
    /// Load the current text of `document`.
    ///
    /// # Errors
    ///
    /// Returns an I/O error when the document cannot be read.
    fn load(&self, document: &DocumentId) -> std::io::Result<String>;
}

/// Loads documents from the filesystem, resolving identities relative to a
/// root directory.
#[derive(Debug, Clone)]
pub struct FileSystemSource {
    root: Utf8PathBuf,
}

impl FileSystemSource {
    /// Resolve identities relative to `root`; absolute identities are used
    /// as-is.
    #[must_use]
    pub fn new(root: impl Into<Utf8PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl DocumentSource for FileSystemSource {
    fn load(&self, document: &DocumentId) -> std::io::Result<String> {
        std::fs::read_to_string(self.root.join(document.as_str()))
    }
}

enum Slot {
    Strong(ArcSwap<Document>),
    Weak(Weak<Document>),
}

/// A tracked document. The slot is strong while the document is open or
/// held, weak otherwise.
struct Entry {
    slot: Slot,
    open: bool,
    holds: usize,
}

impl Entry {
    fn opened(snapshot: Arc<Document>, holds: usize) -> Self {
        Self {
            slot: Slot::Strong(ArcSwap::new(snapshot)),
            open: true,
            holds,
        }
    }

    fn current(&self) -> Option<Arc<Document>> {
        match &self.slot {
            Slot::Strong(swap) => Some(swap.load_full()),
            Slot::Weak(weak) => weak.upgrade(),
        }
    }

    /// Promote or demote the slot after `open` or `holds` changed.
    fn settle(&mut self) {
        let strong = self.open || self.holds > 0;
        let replacement = match &self.slot {
            Slot::Weak(weak) if strong => weak.upgrade().map(|doc| Slot::Strong(ArcSwap::new(doc))),
            Slot::Strong(swap) if !strong => Some(Slot::Weak(Arc::downgrade(&swap.load_full()))),
            _ => None,
        };
        if let Some(slot) = replacement {
            self.slot = slot;
        }
    }
}

#[derive(Clone, Copy)]
enum Event {
    Created,
    Changed,
    Removed,
}

/// Documents keyed by [`DocumentId`].
pub struct DocumentCache {
    entries: RwLock<HashMap<DocumentId, Entry>>,
    listeners: RwLock<Vec<Arc<dyn LifecycleListener>>>,
    source: Option<Arc<dyn DocumentSource>>,
    dialects: DialectTable,
}

impl fmt::Debug for DocumentCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DocumentCache")
            .field("documents", &self.entries.read().len())
            .field("listeners", &self.listeners.read().len())
            .field("has_source", &self.source.is_some())
            .finish()
    }
}

impl Default for DocumentCache {
    fn default() -> Self {
        Self::new()
    }
}

impl DocumentCache {
    /// Create a cache using the built-in dialects and no backing storage.
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            listeners: RwLock::new(Vec::new()),
            source: None,
            dialects: DialectTable::builtin().clone(),
        }
    }

    /// Reload closed documents from `source`.
    #[must_use]
    pub fn with_source(mut self, source: Arc<dyn DocumentSource>) -> Self {
        self.source = Some(source);
        self
    }

    /// Resolve dialects against `dialects` instead of the built-in table.
    #[must_use]
    pub fn with_dialects(mut self, dialects: DialectTable) -> Self {
        self.dialects = dialects;
        self
    }

    /// Register a lifecycle listener.
    pub fn add_listener(&self, listener: Arc<dyn LifecycleListener>) {
        self.listeners.write().push(listener);
    }

    /// Open `document` with `text`, parsing it immediately.
    ///
    /// Reopening a known document counts as a change.
    #[instrument(level = "debug", skip_all, fields(document = %document))]
    pub fn open(&self, document: DocumentId, text: impl Into<Arc<str>>) -> Arc<Document> {
        let text = text.into();
        let (snapshot, existed) = {
            let mut entries = self.entries.write();
            let previous = entries.get(&document);
            let version = previous
                .and_then(Entry::current)
                .map_or(1, |doc| doc.version + 1);
            let holds = previous.map_or(0, |entry| entry.holds);
            let snapshot = Arc::new(Document::parsed(
                document.clone(),
                text,
                version,
                &self.dialects,
            ));
            let existed = entries
                .insert(document.clone(), Entry::opened(Arc::clone(&snapshot), holds))
                .is_some();
            (snapshot, existed)
        };
        self.notify(&document, if existed { Event::Changed } else { Event::Created });
        snapshot
    }

    /// Replace the text of `document`.
    ///
    /// The new snapshot is marked dirty and reparsed by the next
    /// [`get`](Self::get). Documents that are not open are opened instead.
    pub fn change(&self, document: &DocumentId, text: impl Into<Arc<str>>) -> Arc<Document> {
        let text = text.into();
        let edited = {
            let entries = self.entries.write();
            match entries.get(document) {
                Some(Entry {
                    slot: Slot::Strong(swap),
                    open: true,
                    ..
                }) => {
                    let edited = Arc::new(swap.load().edited(Arc::clone(&text)));
                    swap.store(Arc::clone(&edited));
                    Some(edited)
                }
                Some(_) | None => None,
            }
        };
        match edited {
            Some(snapshot) => {
                debug!(document = %document, version = snapshot.version, "document changed");
                self.notify(document, Event::Changed);
                snapshot
            }
            None => self.open(document.clone(), text),
        }
    }

    /// Stop holding `document` strongly on behalf of the editor.
    ///
    /// A document that is still [held](Self::hold) stays strong until it is
    /// released. Otherwise snapshots still referenced elsewhere stay reachable
    /// through [`get`](Self::get) until they are dropped.
    pub fn close(&self, document: &DocumentId) {
        let mut entries = self.entries.write();
        let Some(entry) = entries.get_mut(document) else {
            return;
        };
        entry.open = false;
        entry.settle();
        debug!(document = %document, holds = entry.holds, "document closed");
    }

    /// Keep `document` strongly referenced, even once closed, until a
    /// matching [`release`](Self::release).
    ///
    /// Returns `false`, and holds nothing, for unknown documents.
    pub fn hold(&self, document: &DocumentId) -> bool {
        let mut entries = self.entries.write();
        let Some(entry) = entries.get_mut(document) else {
            return false;
        };
        entry.holds += 1;
        entry.settle();
        true
    }

    /// Undo one [`hold`](Self::hold).
    pub fn release(&self, document: &DocumentId) {
        let mut entries = self.entries.write();
        let Some(entry) = entries.get_mut(document) else {
            return;
        };
        entry.holds = entry.holds.saturating_sub(1);
        entry.settle();
    }

    /// Drop `document` from the cache.
    pub fn remove(&self, document: &DocumentId) -> bool {
        let removed = self.entries.write().remove(document).is_some();
        if removed {
            self.notify(document, Event::Removed);
        }
        removed
    }

    /// Latest parsed snapshot of `document`.
    ///
    /// Dirty snapshots are reparsed first. Closed documents whose snapshot was
    /// dropped, and unknown documents, are loaded from the backing source
    /// when one is configured.
    pub fn get(&self, document: &DocumentId) -> Option<Arc<Document>> {
        enum Found {
            Fresh(Arc<Document>),
            Missing { known: bool },
        }
        let found = {
            let entries = self.entries.read();
            match entries.get(document).map(|entry| &entry.slot) {
                Some(Slot::Strong(swap)) => Found::Fresh(self.reparse_if_dirty(swap)),
                Some(Slot::Weak(weak)) => weak
                    .upgrade()
                    .map_or(Found::Missing { known: true }, |doc| {
                        Found::Fresh(self.reparsed(doc))
                    }),
                None => Found::Missing { known: false },
            }
        };
        match found {
            Found::Fresh(doc) => Some(doc),
            Found::Missing { known } => self.load(document, known),
        }
    }

    fn reparsed(&self, doc: Arc<Document>) -> Arc<Document> {
        if !doc.dirty {
            return doc;
        }
        Arc::new(Document::parsed(
            doc.id.clone(),
            Arc::clone(&doc.text),
            doc.version,
            &self.dialects,
        ))
    }

    fn reparse_if_dirty(&self, swap: &ArcSwap<Document>) -> Arc<Document> {
        loop {
            let current = swap.load_full();
            if !current.dirty {
                return current;
            }
            let fresh = self.reparsed(Arc::clone(&current));
            let previous = swap.compare_and_swap(&current, Arc::clone(&fresh));
            if Arc::ptr_eq(&previous, &current) {
                return fresh;
            }
        }
    }

    fn load(&self, document: &DocumentId, known: bool) -> Option<Arc<Document>> {
        let source = self.source.as_ref()?;
        let text = match source.load(document) {
            Ok(text) => text,
            Err(error) => {
                warn!(document = %document, %error, "failed to load document");
                return None;
            }
        };
        let snapshot = Arc::new(Document::parsed(
            document.clone(),
            text.into(),
            1,
            &self.dialects,
        ));
        {
            let mut entries = self.entries.write();
            let holds = match entries.get(document) {
                Some(Entry {
                    slot: Slot::Strong(swap),
                    ..
                }) => return Some(swap.load_full()),
                Some(entry) => entry.holds,
                None => 0,
            };
            let slot = if holds > 0 {
                Slot::Strong(ArcSwap::new(Arc::clone(&snapshot)))
            } else {
                Slot::Weak(Arc::downgrade(&snapshot))
            };
            entries.insert(
                document.clone(),
                Entry {
                    slot,
                    open: false,
                    holds,
                },
            );
        }
        if !known {
            self.notify(document, Event::Created);
        }
        Some(snapshot)
    }

    /// Force `document` to be reparsed or reloaded on next access.
    pub fn invalidate(&self, document: &DocumentId) {
        let known = {
            let mut entries = self.entries.write();
            match entries.get_mut(document) {
                Some(Entry {
                    slot: Slot::Strong(swap),
                    ..
                }) => {
                    let current = swap.load_full();
                    swap.store(Arc::new(Document {
                        dirty: true,
                        ..Document::clone(&current)
                    }));
                    true
                }
                Some(entry) => {
                    entry.slot = Slot::Weak(Weak::new());
                    true
                }
                None => false,
            }
        };
        if known {
            self.notify(document, Event::Changed);
        }
    }

    /// Drop closed, unheld documents whose snapshots are no longer
    /// referenced.
    ///
    /// Returns the identities removed.
    pub fn purge(&self) -> Vec<DocumentId> {
        let removed: Vec<DocumentId> = {
            let mut entries = self.entries.write();
            let dead: Vec<DocumentId> = entries
                .iter()
                .filter(|(_, entry)| {
                    entry.holds == 0
                        && matches!(&entry.slot, Slot::Weak(weak) if weak.strong_count() == 0)
                })
                .map(|(id, _)| id.clone())
                .collect();
            for id in &dead {
                entries.remove(id);
            }
            dead
        };
        for id in &removed {
            self.notify(id, Event::Removed);
        }
        removed
    }

    /// Identities of every tracked document, sorted.
    #[must_use]
    pub fn documents(&self) -> Vec<DocumentId> {
        let mut ids: Vec<_> = self.entries.read().keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Whether `document` is open.
    #[must_use]
    pub fn is_open(&self, document: &DocumentId) -> bool {
        self.entries.read().get(document).is_some_and(|entry| entry.open)
    }

    fn notify(&self, document: &DocumentId, event: Event) {
        let listeners = self.listeners.read().clone();
        for listener in listeners {
            let outcome = catch_unwind(AssertUnwindSafe(|| match event {
                Event::Created => listener.on_created(document),
                Event::Changed => listener.on_changed(document),
                Event::Removed => listener.on_removed(document),
            }));
            if outcome.is_err() {
                warn!(document = %document, "lifecycle listener panicked");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{LifecycleEvent, RecordingListener};
    use rstest::{fixture, rstest};

    const TEXT: &str = "Feature: f\n  Scenario: s\n    Given a step\n";

    #[fixture]
    fn recorded() -> (DocumentCache, Arc<RecordingListener>) {
        let cache = DocumentCache::new();
        let listener = Arc::new(RecordingListener::default());
        cache.add_listener(Arc::clone(&listener) as Arc<dyn LifecycleListener>);
        (cache, listener)
    }

    #[rstest]
    fn open_parses_and_announces(recorded: (DocumentCache, Arc<RecordingListener>)) {
        let (cache, listener) = recorded;
        let id = DocumentId::from("a.feature");
        let doc = cache.open(id.clone(), TEXT);
        assert!(!doc.dirty);
        assert_eq!(doc.version, 1);
        assert_eq!(doc.tree.as_ref().map(|f| f.steps().count()), Some(1));
        assert_eq!(listener.events(), [LifecycleEvent::Created(id)]);
    }

    #[rstest]
    fn change_marks_dirty_until_the_next_get(recorded: (DocumentCache, Arc<RecordingListener>)) {
        let (cache, listener) = recorded;
        let id = DocumentId::from("a.feature");
        let before = cache.open(id.clone(), TEXT);
        let edited = cache.change(&id, format!("{TEXT}    Then another\n"));
        assert!(edited.dirty);
        assert_eq!(edited.version, 2);

        let after = cache.get(&id);
        let Some(after) = after else {
            panic!("document should be cached");
        };
        assert!(!after.dirty);
        assert_eq!(after.version, 2);
        assert_eq!(after.tree.as_ref().map(|f| f.steps().count()), Some(2));
        // Earlier snapshots are never mutated.
        assert_eq!(before.tree.as_ref().map(|f| f.steps().count()), Some(1));
        assert_eq!(
            listener.events(),
            [LifecycleEvent::Created(id.clone()), LifecycleEvent::Changed(id)]
        );
    }

    #[test]
    fn language_marker_selects_the_dialect() {
        let cache = DocumentCache::new();
        let doc = cache.open(
            DocumentId::from("fr.feature"),
            "# language: fr\nFonctionnalité: f\n  Scénario: s\n    Soit un pas\n",
        );
        assert_eq!(doc.dialect.language(), "fr");
        assert!(doc.parse_errors.is_empty());
    }

    #[test]
    fn closed_documents_live_while_referenced() {
        let cache = DocumentCache::new();
        let id = DocumentId::from("a.feature");
        let held = cache.open(id.clone(), TEXT);
        cache.close(&id);
        assert!(!cache.is_open(&id));
        assert!(cache.get(&id).is_some_and(|doc| Arc::ptr_eq(&doc, &held)));
        assert!(cache.purge().is_empty());

        drop(held);
        assert!(cache.get(&id).is_none());
        assert_eq!(cache.purge(), [id]);
        assert!(cache.documents().is_empty());
    }

    #[test]
    fn held_documents_survive_close_until_released() {
        let cache = DocumentCache::new();
        let id = DocumentId::from("a.feature");
        cache.open(id.clone(), TEXT);
        assert!(cache.hold(&id));
        cache.close(&id);
        assert!(!cache.is_open(&id));
        assert!(cache.get(&id).is_some());
        assert!(cache.purge().is_empty());

        cache.release(&id);
        assert!(cache.get(&id).is_none());
        assert_eq!(cache.purge(), [id.clone()]);
        assert!(!cache.hold(&id));
    }

    #[test]
    fn concurrent_edits_get_distinct_versions() {
        let cache = Arc::new(DocumentCache::new());
        let id = DocumentId::from("a.feature");
        cache.open(id.clone(), TEXT);
        let versions: Vec<u64> = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..8)
                .map(|n| {
                    let cache = Arc::clone(&cache);
                    let id = id.clone();
                    scope.spawn(move || cache.change(&id, format!("{TEXT}# edit {n}\n")).version)
                })
                .collect();
            handles
                .into_iter()
                .map(|h| h.join().unwrap_or_else(|_| panic!("editor thread panicked")))
                .collect()
        });
        let mut sorted = versions.clone();
        sorted.sort_unstable();
        sorted.dedup();
        assert_eq!(sorted, (2..=9).collect::<Vec<u64>>(), "{versions:?}");
    }

    #[test]
    fn closed_documents_reload_from_storage() {
        let dir = tempfile::tempdir().unwrap_or_else(|e| panic!("tempdir: {e}"));
        let root = Utf8PathBuf::from_path_buf(dir.path().to_path_buf())
            .unwrap_or_else(|p| panic!("non-UTF-8 path {}", p.display()));
        std::fs::write(root.join("b.feature"), TEXT).unwrap_or_else(|e| panic!("write: {e}"));
        let cache = DocumentCache::new().with_source(Arc::new(FileSystemSource::new(root)));
        let id = DocumentId::from("b.feature");

        let loaded = cache.get(&id);
        assert_eq!(
            loaded.as_ref().and_then(|d| d.tree.as_ref()).map(|f| f.name.as_str()),
            Some("f")
        );
        assert_eq!(cache.documents(), [id.clone()]);
        assert!(!cache.is_open(&id));
        assert!(cache.get(&DocumentId::from("missing.feature")).is_none());
    }

    #[rstest]
    fn invalidate_forces_a_reparse(recorded: (DocumentCache, Arc<RecordingListener>)) {
        let (cache, listener) = recorded;
        let id = DocumentId::from("a.feature");
        let first = cache.open(id.clone(), TEXT);
        cache.invalidate(&id);
        let second = cache.get(&id);
        assert!(second.is_some_and(|doc| !Arc::ptr_eq(&doc, &first) && doc.version == 1));
        assert_eq!(listener.events().len(), 2);
    }

    #[rstest]
    fn remove_announces_removal(recorded: (DocumentCache, Arc<RecordingListener>)) {
        let (cache, listener) = recorded;
        let id = DocumentId::from("a.feature");
        cache.open(id.clone(), TEXT);
        assert!(cache.remove(&id));
        assert!(!cache.remove(&id));
        assert_eq!(listener.events().last(), Some(&LifecycleEvent::Removed(id)));
    }

    struct Panicking;

    impl LifecycleListener for Panicking {
        fn on_created(&self, _document: &DocumentId) {
            panic!("listener failure");
        }
    }

    #[test]
    fn a_panicking_listener_does_not_starve_the_others() {
        let cache = DocumentCache::new();
        let listener = Arc::new(RecordingListener::default());
        cache.add_listener(Arc::new(Panicking));
        cache.add_listener(Arc::clone(&listener) as Arc<dyn LifecycleListener>);
        let id = DocumentId::from("a.feature");
        cache.open(id.clone(), TEXT);
        assert_eq!(listener.events(), [LifecycleEvent::Created(id)]);
    }
}
