//! Shared test support utilities for gherkin-assist integration tests.
//!
//! This module re-exports utilities from the crate's `test_support` module,
//! providing a single source of truth for test infrastructure.

#![allow(
    unused_imports,
    dead_code,
    reason = "each test binary uses a different subset of helpers"
)]

// Integration tests cannot reach #[cfg(test)] items, so the helpers come
// through the crate's `test-support` feature.
pub use gherkin_assist::test_support::{
    Harness, LifecycleEvent, RecordingListener, RecordingSink, ScriptedProvider, TempWorkspace,
    expression_pattern, pattern_at, regex_pattern,
};
