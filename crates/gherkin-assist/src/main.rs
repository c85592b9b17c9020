//! Command-line validator for Gherkin feature files.
//!
//! Opens each feature file, validates its steps against the step definitions
//! listed in a JSON glue manifest and writes the resulting diagnostics to
//! stdout. Exits with status 1 when any warning or error was reported, or
//! when the manifest could not be read.

use std::collections::BTreeMap;
use std::io::Write;
use std::process::ExitCode;
use std::sync::Arc;

use camino::Utf8PathBuf;
use clap::{Parser, ValueEnum};
use eyre::WrapErr;
use parking_lot::Mutex;
use serde::Serialize;
use tracing::{info, warn};

use gherkin_assist::cache::{DocumentCache, DocumentId, FileSystemSource};
use gherkin_assist::config::{AssistConfig, LogLevel};
use gherkin_assist::diagnostics::{
    CODE_GLUE_VALIDATION_ERROR, Diagnostic, DiagnosticSink, Severity,
};
use gherkin_assist::glue::{
    GlueProvider, ProjectHandle, Progress, ProviderError, StepDefinitionPattern,
};
use gherkin_assist::logging::init_logging;
use gherkin_assist::manifest::ManifestGlueProvider;
use gherkin_assist::scheduler::ValidationScheduler;

/// Validate Gherkin steps against known step definitions.
#[derive(Parser, Debug)]
#[command(name = "gherkin-assist", version, about)]
struct Args {
    /// JSON manifest listing step definitions.
    #[arg(long)]
    glue: Option<Utf8PathBuf>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long)]
    log_level: Option<LogLevel>,

    /// Delay before a document is validated.
    #[arg(long)]
    debounce_ms: Option<u64>,

    /// Output format.
    #[arg(long, value_enum, default_value_t = Format::Text)]
    format: Format,

    /// Feature files to validate.
    #[arg(required = true)]
    files: Vec<Utf8PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Format {
    Text,
    Json,
}

/// Used when no manifest is given: every step is reported unmatched.
struct NoGlue;

impl GlueProvider for NoGlue {
    fn find_step_definitions(
        &self,
        _project: &ProjectHandle,
        _progress: &dyn Progress,
    ) -> Result<Vec<StepDefinitionPattern>, ProviderError> {
        Ok(Vec::new())
    }
}

#[derive(Default)]
struct CollectingSink {
    latest: Mutex<BTreeMap<DocumentId, Vec<Diagnostic>>>,
}

impl DiagnosticSink for CollectingSink {
    fn publish(&self, document: &DocumentId, diagnostics: Vec<Diagnostic>) {
        self.latest.lock().insert(document.clone(), diagnostics);
    }
}

#[derive(Serialize)]
struct FileReport<'a> {
    path: &'a DocumentId,
    diagnostics: &'a [Diagnostic],
}

fn main() -> eyre::Result<ExitCode> {
    let args = Args::parse();
    let config = AssistConfig::from_env()
        .wrap_err("invalid configuration")?
        .apply_overrides(args.log_level, args.debounce_ms);
    init_logging(&config);
    info!(version = env!("CARGO_PKG_VERSION"), files = args.files.len(), "starting gherkin-assist");

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .wrap_err("failed to start the runtime")?;

    let provider: Arc<dyn GlueProvider> = match &args.glue {
        Some(path) => Arc::new(ManifestGlueProvider::new(path.clone())),
        None => Arc::new(NoGlue),
    };
    let cache = Arc::new(DocumentCache::new().with_source(Arc::new(FileSystemSource::new("."))));
    let sink = Arc::new(CollectingSink::default());
    let scheduler = ValidationScheduler::new(
        runtime.handle().clone(),
        Arc::clone(&cache),
        provider,
        Arc::clone(&sink) as Arc<dyn DiagnosticSink>,
        &config,
    );
    scheduler.attach();

    let mut documents = Vec::with_capacity(args.files.len());
    for path in &args.files {
        let text = std::fs::read_to_string(path).wrap_err_with(|| format!("failed to read {path}"))?;
        let document = DocumentId::from(path.as_path());
        cache.open(document.clone(), text);
        documents.push(document);
    }
    for document in &documents {
        if scheduler.join_blocking(document).is_none() {
            warn!(document = %document, "no validation results");
        }
    }
    scheduler.shutdown();

    let latest = sink.latest.lock().clone();
    let mut stdout = std::io::stdout().lock();
    let mut failed = false;
    let mut reports = Vec::with_capacity(documents.len());
    for document in &documents {
        let diagnostics = latest.get(document).map_or(&[][..], Vec::as_slice);
        failed |= diagnostics.iter().any(|d| {
            matches!(d.severity, Severity::Error | Severity::Warning)
                || d.code == CODE_GLUE_VALIDATION_ERROR
        });
        match args.format {
            Format::Text => {
                for diagnostic in diagnostics {
                    writeln!(
                        stdout,
                        "{document}:{}: {} [{}] {}",
                        diagnostic.line_range.0,
                        diagnostic.severity.as_str(),
                        diagnostic.code,
                        diagnostic.message
                    )?;
                }
            }
            Format::Json => reports.push(FileReport {
                path: document,
                diagnostics,
            }),
        }
    }
    if args.format == Format::Json {
        serde_json::to_writer_pretty(&mut stdout, &reports)?;
        writeln!(stdout)?;
    }

    Ok(if failed {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    })
}
