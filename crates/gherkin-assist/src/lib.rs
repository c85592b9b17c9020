//! Dialect-aware Gherkin parsing, step matching and background validation.
//!
//! This crate answers two questions an editor asks continuously about a
//! feature file: what is its structure, and does every step line have a
//! matching step definition?
//!
//! # Overview
//!
//! - [`dialect`] resolves the keyword vocabulary declared by a
//!   `# language: <tag>` marker.
//! - [`feature`] parses text into a positioned tree, recovering from
//!   structural errors.
//! - [`position`] maps lines and columns to byte offsets.
//! - [`glue`] models step definitions and the providers enumerating them.
//! - [`normalize`] compiles definitions into cached matchers, including the
//!   placeholder-tolerant variant used for scenario outlines.
//! - [`matching`] and [`assist`] validate steps and rank candidates for
//!   content assist.
//! - [`cache`] keeps parsed documents and announces their lifecycle.
//! - [`scheduler`] debounces validation runs and publishes
//!   [`diagnostics`].
//!
//! # Configuration
//!
//! The core can be configured via environment variables:
//!
//! - `GHERKIN_ASSIST_LOG_LEVEL`: Log verbosity (trace, debug, info, warn,
//!   error)
//! - `GHERKIN_ASSIST_DEBOUNCE_MS`: Delay before validating an edited document
//! - `GHERKIN_ASSIST_JOIN_TIMEOUT_MS`: Upper bound for blocking joins
//! - `GHERKIN_ASSIST_SIMILARITY_THRESHOLD`: Content-assist similarity cut-off
//!
//! # Example
//!
//! ```
//! use gherkin_assist::feature::parse_text;
//!
//! let (feature, errors) = parse_text("Feature: Cart\n  Scenario: Add\n    Given an empty cart\n");
//! assert!(errors.is_empty());
//! assert_eq!(feature.map(|f| f.name), Some("Cart".to_owned()));
//! ```

pub mod assist;
pub mod cache;
pub mod config;
pub mod diagnostics;
pub mod dialect;
pub mod error;
pub mod feature;
pub mod glue;
pub mod logging;
pub mod manifest;
pub mod matching;
pub mod normalize;
pub mod position;
pub mod scheduler;

/// Test support utilities for unit and integration tests.
///
/// This module is hidden from documentation as it's intended for internal
/// test use only.
#[cfg(any(test, feature = "test-support"))]
#[doc(hidden)]
pub mod test_support;
