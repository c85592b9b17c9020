//! Assist configuration parsed from environment variables.
//!
//! All settings can be overridden via environment variables prefixed with
//! `GHERKIN_ASSIST_`, and the binary layers its command-line flags on top.

use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::error::AssistError;

/// Log level enumeration matching tracing crate levels.
///
/// Defaults to `Info` when not specified.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogLevel {
    /// Most verbose logging, includes all trace spans.
    Trace,
    /// Debug-level information for development.
    Debug,
    /// Standard informational messages.
    #[default]
    Info,
    /// Warning messages for potentially problematic situations.
    Warn,
    /// Error messages for failures.
    Error,
}

impl FromStr for LogLevel {
    type Err = AssistError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "trace" => Ok(Self::Trace),
            "debug" => Ok(Self::Debug),
            "info" => Ok(Self::Info),
            "warn" | "warning" => Ok(Self::Warn),
            "error" => Ok(Self::Error),
            _ => Err(AssistError::InvalidConfig(format!(
                "unknown log level '{s}', expected one of: trace, debug, info, warn, error"
            ))),
        }
    }
}

impl LogLevel {
    /// Convert to a tracing filter directive string.
    #[must_use]
    pub fn as_filter_str(&self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }
}

const ENV_LOG_LEVEL: &str = "GHERKIN_ASSIST_LOG_LEVEL";
const ENV_DEBOUNCE_MS: &str = "GHERKIN_ASSIST_DEBOUNCE_MS";
const ENV_JOIN_TIMEOUT_MS: &str = "GHERKIN_ASSIST_JOIN_TIMEOUT_MS";
const ENV_SIMILARITY_THRESHOLD: &str = "GHERKIN_ASSIST_SIMILARITY_THRESHOLD";

/// Default debounce interval in milliseconds.
const DEFAULT_DEBOUNCE_MS: u64 = 300;

/// Default upper bound for a blocking join in milliseconds.
const DEFAULT_JOIN_TIMEOUT_MS: u64 = 30_000;

/// Default minimum Jaro-Winkler similarity for fuzzy assist candidates.
const DEFAULT_SIMILARITY_THRESHOLD: f64 = 0.8;

/// Configuration for the assist core.
///
/// # Environment Variables
///
/// - `GHERKIN_ASSIST_LOG_LEVEL`: Sets the log level (trace, debug, info, warn,
///   error)
/// - `GHERKIN_ASSIST_DEBOUNCE_MS`: Delay between an edit and its validation run
/// - `GHERKIN_ASSIST_JOIN_TIMEOUT_MS`: Upper bound for joins on running
///   validation
/// - `GHERKIN_ASSIST_SIMILARITY_THRESHOLD`: Minimum similarity (0.0 to 1.0)
///   for fuzzy content-assist candidates
#[derive(Debug, Clone, PartialEq)]
pub struct AssistConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: LogLevel,
    /// Debounce interval for document edits in milliseconds.
    pub debounce_ms: u64,
    /// Maximum time a join waits for running validation, in milliseconds.
    pub join_timeout_ms: u64,
    /// Minimum similarity for the fuzzy content-assist tier.
    pub similarity_threshold: f64,
}

impl Default for AssistConfig {
    fn default() -> Self {
        Self {
            log_level: LogLevel::default(),
            debounce_ms: DEFAULT_DEBOUNCE_MS,
            join_timeout_ms: DEFAULT_JOIN_TIMEOUT_MS,
            similarity_threshold: DEFAULT_SIMILARITY_THRESHOLD,
        }
    }
}

impl AssistConfig {
    /// Load configuration from environment variables.
    ///
    /// Falls back to defaults for missing values.
    ///
    /// # Errors
    ///
    /// Returns `AssistError::InvalidConfig` if an environment variable contains
    /// an invalid value.
    pub fn from_env() -> Result<Self, AssistError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    ///
    /// [`AssistConfig::from_env`] delegates here with the process
    /// environment; callers embedding the core may supply their own settings
    /// store.
    ///
    /// # Errors
    ///
    /// Returns `AssistError::InvalidConfig` if a variable contains an invalid
    /// value.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, AssistError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let log_level = match lookup(ENV_LOG_LEVEL) {
            Some(val) => val.parse()?,
            None => LogLevel::default(),
        };
        let debounce_ms = parse_millis(lookup(ENV_DEBOUNCE_MS), "debounce", DEFAULT_DEBOUNCE_MS)?;
        let join_timeout_ms = parse_millis(
            lookup(ENV_JOIN_TIMEOUT_MS),
            "join timeout",
            DEFAULT_JOIN_TIMEOUT_MS,
        )?;
        let similarity_threshold = match lookup(ENV_SIMILARITY_THRESHOLD) {
            Some(val) => parse_threshold(&val)?,
            None => DEFAULT_SIMILARITY_THRESHOLD,
        };

        Ok(Self {
            log_level,
            debounce_ms,
            join_timeout_ms,
            similarity_threshold,
        })
    }

    /// Apply optional overrides to an existing configuration.
    ///
    /// This is intended for CLI overrides that should take precedence over
    /// environment-based defaults.
    #[must_use]
    pub fn apply_overrides(
        mut self,
        log_level: Option<LogLevel>,
        debounce_ms: Option<u64>,
    ) -> Self {
        if let Some(level) = log_level {
            self.log_level = level;
        }

        if let Some(ms) = debounce_ms {
            self.debounce_ms = ms;
        }

        self
    }

    /// Create a new configuration with the specified log level.
    #[must_use]
    pub fn with_log_level(mut self, level: LogLevel) -> Self {
        self.log_level = level;
        self
    }

    /// Create a new configuration with the specified debounce interval.
    #[must_use]
    pub fn with_debounce(mut self, debounce_ms: u64) -> Self {
        self.debounce_ms = debounce_ms;
        self
    }

    /// Debounce interval as a [`Duration`].
    #[must_use]
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    /// Join timeout as a [`Duration`].
    #[must_use]
    pub fn join_timeout(&self) -> Duration {
        Duration::from_millis(self.join_timeout_ms)
    }
}

fn parse_millis(value: Option<String>, what: &str, default: u64) -> Result<u64, AssistError> {
    let Some(val) = value else {
        return Ok(default);
    };
    val.parse().map_err(|_| {
        AssistError::InvalidConfig(format!(
            "invalid {what} value '{val}', expected a positive integer"
        ))
    })
}

fn parse_threshold(val: &str) -> Result<f64, AssistError> {
    match val.parse::<f64>() {
        Ok(threshold) if (0.0..=1.0).contains(&threshold) => Ok(threshold),
        _ => Err(AssistError::InvalidConfig(format!(
            "invalid similarity threshold '{val}', expected a number between 0.0 and 1.0"
        ))),
    }
}

#[cfg(test)]
#[expect(
    clippy::unwrap_used,
    reason = "tests require explicit panic messages for debugging failures"
)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::collections::HashMap;

    fn lookup_from<'a>(
        vars: &'a [(&'a str, &'a str)],
    ) -> impl Fn(&str) -> Option<String> + 'a {
        let map: HashMap<&str, &str> = vars.iter().copied().collect();
        move |name| map.get(name).map(|value| (*value).to_owned())
    }

    #[rstest]
    #[case("trace", LogLevel::Trace)]
    #[case("debug", LogLevel::Debug)]
    #[case("info", LogLevel::Info)]
    #[case("warn", LogLevel::Warn)]
    #[case("warning", LogLevel::Warn)]
    #[case("error", LogLevel::Error)]
    #[case("TRACE", LogLevel::Trace)]
    #[case("Debug", LogLevel::Debug)]
    fn log_level_parses_valid_values(#[case] input: &str, #[case] expected: LogLevel) {
        assert_eq!(input.parse::<LogLevel>().ok(), Some(expected));
    }

    #[test]
    fn log_level_rejects_invalid_values() {
        let result = "invalid".parse::<LogLevel>();
        assert!(result.unwrap_err().to_string().contains("unknown log level"));
    }

    #[test]
    fn assist_config_default_values() {
        let config = AssistConfig::default();
        assert_eq!(config.log_level, LogLevel::Info);
        assert_eq!(config.debounce_ms, 300);
        assert_eq!(config.join_timeout(), Duration::from_secs(30));
        assert_eq!(config.similarity_threshold.to_bits(), 0.8_f64.to_bits());
    }

    #[test]
    fn apply_overrides_updates_selected_fields() {
        let config = AssistConfig::default().apply_overrides(Some(LogLevel::Error), Some(42));
        assert_eq!(config.log_level, LogLevel::Error);
        assert_eq!(config.debounce(), Duration::from_millis(42));

        let config = AssistConfig::default().apply_overrides(None, None);
        assert_eq!(config, AssistConfig::default());
    }

    #[test]
    fn builders_replace_fields() {
        let config = AssistConfig::default()
            .with_log_level(LogLevel::Debug)
            .with_debounce(5);
        assert_eq!(config.log_level, LogLevel::Debug);
        assert_eq!(config.debounce_ms, 5);
    }

    #[test]
    fn lookup_reads_all_variables() {
        let config = AssistConfig::from_lookup(lookup_from(&[
            (ENV_LOG_LEVEL, "debug"),
            (ENV_DEBOUNCE_MS, "50"),
            (ENV_JOIN_TIMEOUT_MS, "1000"),
            (ENV_SIMILARITY_THRESHOLD, "0.5"),
        ]))
        .unwrap();
        assert_eq!(config.log_level, LogLevel::Debug);
        assert_eq!(config.debounce_ms, 50);
        assert_eq!(config.join_timeout_ms, 1000);
        assert_eq!(config.similarity_threshold.to_bits(), 0.5_f64.to_bits());
    }

    #[test]
    fn lookup_falls_back_to_defaults() {
        let config = AssistConfig::from_lookup(lookup_from(&[])).unwrap();
        assert_eq!(config, AssistConfig::default());
    }

    #[rstest]
    #[case(ENV_DEBOUNCE_MS, "soon", "invalid debounce value")]
    #[case(ENV_JOIN_TIMEOUT_MS, "-1", "invalid join timeout value")]
    #[case(ENV_SIMILARITY_THRESHOLD, "1.5", "invalid similarity threshold")]
    #[case(ENV_SIMILARITY_THRESHOLD, "often", "invalid similarity threshold")]
    #[case(ENV_LOG_LEVEL, "chatty", "unknown log level")]
    fn lookup_rejects_invalid_values(
        #[case] var: &str,
        #[case] value: &str,
        #[case] message: &str,
    ) {
        let err = AssistConfig::from_lookup(lookup_from(&[(var, value)])).unwrap_err();
        assert!(err.to_string().contains(message), "unexpected error: {err}");
    }
}
