//! Ingestion progress reporting.
//!
//! Reports which document is being processed and how it ended (pages
//! written or skip reason). Output goes to **stderr** so stdout stays
//! parseable for scripts.

use std::io::Write;

/// A single progress event for an ingestion run.
#[derive(Clone, Debug)]
pub enum IngestProgressEvent {
    /// Starting document `n` of `total`.
    Processing { file: String, n: usize, total: usize },
    /// All pages of the document were written.
    Written { slug: String, pages: usize },
    /// The document produced no pages.
    Skipped { slug: String, reason: String },
    /// Writing the document's pages failed.
    Failed { slug: String, reason: String },
}

/// Reports ingestion progress. Implementations write to stderr (human or JSON).
pub trait IngestProgressReporter: Send + Sync {
    fn report(&self, event: IngestProgressEvent);
}

/// Human-friendly progress on stderr: "ingest  3 / 12  catalog.pdf".
pub struct StderrProgress;

impl IngestProgressReporter for StderrProgress {
    fn report(&self, event: IngestProgressEvent) {
        let line = match &event {
            IngestProgressEvent::Processing { file, n, total } => {
                format!("ingest  {} / {}  {}\n", n, total, file)
            }
            IngestProgressEvent::Written { slug, pages } => {
                format!("  -> {}: wrote {} pages\n", slug, pages)
            }
            IngestProgressEvent::Skipped { slug, reason } => {
                format!("  -> {}: skipped ({})\n", slug, reason)
            }
            IngestProgressEvent::Failed { slug, reason } => {
                format!("  -> {}: FAILED ({})\n", slug, reason)
            }
        };
        let _ = std::io::stderr().lock().write_all(line.as_bytes());
        let _ = std::io::stderr().lock().flush();
    }
}

/// Machine-readable progress: one JSON object per line on stderr.
pub struct JsonProgress;

impl IngestProgressReporter for JsonProgress {
    fn report(&self, event: IngestProgressEvent) {
        let obj = match &event {
            IngestProgressEvent::Processing { file, n, total } => serde_json::json!({
                "event": "processing",
                "file": file,
                "n": n,
                "total": total
            }),
            IngestProgressEvent::Written { slug, pages } => serde_json::json!({
                "event": "written",
                "slug": slug,
                "pages": pages
            }),
            IngestProgressEvent::Skipped { slug, reason } => serde_json::json!({
                "event": "skipped",
                "slug": slug,
                "reason": reason
            }),
            IngestProgressEvent::Failed { slug, reason } => serde_json::json!({
                "event": "failed",
                "slug": slug,
                "reason": reason
            }),
        };
        if let Ok(line) = serde_json::to_string(&obj) {
            let _ = writeln!(std::io::stderr().lock(), "{}", line);
            let _ = std::io::stderr().lock().flush();
        }
    }
}

/// No-op reporter when progress is disabled.
pub struct NoProgress;

impl IngestProgressReporter for NoProgress {
    fn report(&self, _event: IngestProgressEvent) {}
}

/// Progress mode for the CLI: off, human (stderr), or JSON (stderr).
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ProgressMode {
    Off,
    Human,
    Json,
}

impl ProgressMode {
    /// Default: human progress when stderr is a TTY, otherwise off.
    pub fn default_for_tty() -> Self {
        if atty::is(atty::Stream::Stderr) {
            ProgressMode::Human
        } else {
            ProgressMode::Off
        }
    }

    pub fn reporter(&self) -> Box<dyn IngestProgressReporter> {
        match self {
            ProgressMode::Off => Box::new(NoProgress),
            ProgressMode::Human => Box::new(StderrProgress),
            ProgressMode::Json => Box::new(JsonProgress),
        }
    }
}

impl std::str::FromStr for ProgressMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "off" => Ok(ProgressMode::Off),
            "human" => Ok(ProgressMode::Human),
            "json" => Ok(ProgressMode::Json),
            other => Err(format!("unknown progress mode '{}': use off, human, or json", other)),
        }
    }
}
