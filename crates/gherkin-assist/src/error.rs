//! Semantic error types for the assist core.
//!
//! Errors are designed to be inspectable by callers. Recoverable problems
//! found while parsing documents or compiling patterns are collected rather
//! than returned; see [`crate::feature::ParseError`] and
//! [`crate::normalize::PatternCompileError`].

use thiserror::Error;

use crate::glue::ProviderError;

/// Errors that can occur while configuring or driving the assist core.
#[derive(Debug, Error)]
pub enum AssistError {
    /// An invalid configuration value was provided.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The glue provider failed.
    #[error(transparent)]
    Provider(#[from] ProviderError),
}

/// A line or offset query fell outside the current buffer.
///
/// Only the checked Position Index queries return this; their clamping
/// counterparts never fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum BadPositionError {
    /// The 1-based line does not exist.
    #[error("line {line} is outside the buffer ({line_count} lines)")]
    Line {
        /// The requested line.
        line: usize,
        /// Number of lines in the buffer.
        line_count: usize,
    },
    /// The byte offset lies past the end of the buffer.
    #[error("offset {offset} is outside the buffer ({len} bytes)")]
    Offset {
        /// The requested byte offset.
        offset: usize,
        /// Buffer length in bytes.
        len: usize,
    },
}
