//! Structured logging for the validation core and its binary.
//!
//! Logs go to stderr so the binary's diagnostic report on stdout stays
//! machine-readable. The configured level applies to this workspace's own
//! targets; dependencies only report warnings.
//!
//! Validation runs, document opens and matcher preparation are recorded as
//! spans. Their close events carry the elapsed time, which is how slow glue
//! providers show up in the log.

use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::format::FmtSpan;

use crate::config::{AssistConfig, LogLevel};

/// Targets that follow the configured level.
const TARGETS: [&str; 2] = ["gherkin_assist", "gherkin_assist_patterns"];

fn directives(level: LogLevel) -> String {
    let level = level.as_filter_str();
    TARGETS
        .iter()
        .fold(String::from("warn"), |mut acc, target| {
            acc.push(',');
            acc.push_str(target);
            acc.push('=');
            acc.push_str(level);
            acc
        })
}

fn filter_from_config(config: &AssistConfig) -> EnvFilter {
    EnvFilter::new(directives(config.log_level))
}

/// Install the stderr subscriber.
///
/// The level comes from `--log-level`, then `GHERKIN_ASSIST_LOG_LEVEL`, then
/// the default. Span close events are logged with their busy and idle time.
///
/// A subscriber that is already installed, by a test or by an embedding
/// editor, is left in place.
pub fn init_logging(config: &AssistConfig) {
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter_from_config(config))
        .with_writer(std::io::stderr)
        .with_span_events(FmtSpan::CLOSE)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .finish();

    let _ = tracing::subscriber::set_global_default(subscriber);
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use serial_test::serial;

    #[test]
    #[serial]
    fn init_logging_is_idempotent() {
        let config = AssistConfig::default();
        init_logging(&config);
        init_logging(&config);
    }

    #[rstest]
    #[case(LogLevel::Debug, "warn,gherkin_assist=debug,gherkin_assist_patterns=debug")]
    #[case(LogLevel::Error, "warn,gherkin_assist=error,gherkin_assist_patterns=error")]
    fn level_applies_to_workspace_targets(#[case] level: LogLevel, #[case] expected: &str) {
        assert_eq!(directives(level), expected);
    }

    #[test]
    fn filter_parses_the_directives() {
        let config = AssistConfig::default().with_log_level(LogLevel::Trace);
        let rendered = filter_from_config(&config).to_string();
        assert!(rendered.contains("gherkin_assist=trace"), "{rendered}");
    }
}
