//! # Kiosk assistant CLI (`kiosk`)
//!
//! Ingests catalog PDFs into per-page text units and answers product
//! questions from them.
//!
//! ## Usage
//!
//! ```bash
//! kiosk --config ./config/kiosk.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `kiosk ingest` | Turn every PDF in `paths.pdf_dir` into page units |
//! | `kiosk search "<query>"` | Show the ranked local fragments for a query |
//! | `kiosk ask "<query>"` | Answer a question (catalog entries or LLM text) |
//! | `kiosk units` | List persisted page units |
//!
//! ## Examples
//!
//! ```bash
//! kiosk ingest --progress json
//! kiosk search "cod ciocan" --mode gated --limit 5
//! kiosk ask "cât costă ciocanul de 500g?"
//! ```

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};

use kiosk_assistant::answer::{AnswerComposer, AnswerOutcome};
use kiosk_assistant::config::{load_config, Config, RetrievalMode};
use kiosk_assistant::ingest::{DocumentOutcome, IngestPipeline};
use kiosk_assistant::llm::create_model;
use kiosk_assistant::models::CatalogEntry;
use kiosk_assistant::progress::ProgressMode;
use kiosk_assistant::search::{SearchOptions, SnippetIndex};
use kiosk_assistant::store::PageStore;
use kiosk_assistant::telemetry;

/// Catalog question answering over ingested PDF catalogs.
///
/// All commands accept `--config` pointing to a TOML file. When the file
/// does not exist, built-in defaults are used.
#[derive(Parser)]
#[command(name = "kiosk", version, about = "Answer product questions from ingested PDF catalogs")]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/kiosk.toml")]
    config: PathBuf,

    /// Emit logs as JSON lines on stderr.
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Ingest every PDF in the source directory.
    ///
    /// Writes one text unit per page (and optionally one PNG per page).
    /// Re-running overwrites previously derived files.
    Ingest {
        /// Progress on stderr: human, json, or off. Default: human if stderr is a TTY.
        #[arg(long)]
        progress: Option<ProgressMode>,

        /// Read PDFs from this directory instead of `paths.pdf_dir`.
        #[arg(long)]
        source_dir: Option<PathBuf>,
    },

    /// Rank local fragments for a query without calling the language model.
    Search {
        query: String,

        /// Retrieval mode: `permissive` or `gated`. Defaults to `retrieval.mode`.
        #[arg(long)]
        mode: Option<RetrievalMode>,

        /// Maximum number of fragments. Defaults to `retrieval.top_k`.
        #[arg(long)]
        limit: Option<usize>,

        /// Print results as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Answer a question from the ingested catalogs.
    Ask {
        query: String,

        /// Print the outcome as JSON.
        #[arg(long)]
        json: bool,
    },

    /// List persisted page units.
    Units,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    telemetry::init_tracing(cli.log_json);

    let cfg = load_or_default(&cli.config)?;

    match cli.command {
        Commands::Ingest {
            progress,
            source_dir,
        } => {
            let mode = progress.unwrap_or_else(ProgressMode::default_for_tty);
            let reporter = mode.reporter();
            let pdf_dir = source_dir.unwrap_or_else(|| cfg.paths.pdf_dir.clone());

            let report =
                IngestPipeline::from_config(&cfg).ingest_dir(&pdf_dir, reporter.as_ref())?;
            if report.outcomes.is_empty() {
                println!("No PDFs found in {}", pdf_dir.display());
                return Ok(());
            }
            for outcome in &report.outcomes {
                let status = match outcome {
                    DocumentOutcome::Written { pages, .. } => format!("{} pages", pages),
                    DocumentOutcome::Skipped { reason, .. } => format!("skipped ({})", reason),
                    DocumentOutcome::Failed { reason, .. } => format!("failed ({})", reason),
                };
                println!("{}: {}", outcome.slug(), status);
            }
            println!(
                "Ingested {} of {} documents, {} pages into {}",
                report.documents_written(),
                report.outcomes.len(),
                report.pages_written(),
                cfg.paths.text_dir.display()
            );
        }
        Commands::Search {
            query,
            mode,
            limit,
            json,
        } => {
            let mut options = SearchOptions::from(&cfg.retrieval);
            if let Some(mode) = mode {
                options.mode = mode;
            }
            if let Some(limit) = limit {
                options.top_k = limit.max(1);
            }

            let index = SnippetIndex::new(store(&cfg));
            let results = index.search(&query, &options)?;

            if json {
                println!("{}", serde_json::to_string_pretty(&results.fragments)?);
            } else if results.is_empty() {
                println!("No matching fragments.");
            } else {
                for (i, fragment) in results.fragments.iter().enumerate() {
                    println!(
                        "{}. [{} p.{}] score={}",
                        i + 1,
                        fragment.slug,
                        fragment.page,
                        fragment.score
                    );
                    for line in fragment.text.lines() {
                        println!("    {}", line);
                    }
                    println!();
                }
            }
        }
        Commands::Ask { query, json } => {
            let model = create_model(&cfg.llm)?;
            let composer = AnswerComposer::from_config(&cfg, model);
            let outcome = composer.answer(&query).await?;

            if json {
                println!("{}", serde_json::to_string_pretty(&outcome)?);
            } else {
                println!("{}", render_outcome(&outcome));
            }
        }
        Commands::Units => {
            let store = store(&cfg);
            let paths = store.list_unit_paths()?;
            for path in &paths {
                println!("{}", path.display());
            }
            println!("{} page units in {}", paths.len(), store.text_dir().display());
        }
    }

    Ok(())
}

fn load_or_default(path: &Path) -> Result<Config> {
    if path.exists() {
        load_config(path)
    } else {
        tracing::info!(path = %path.display(), "config file not found, using defaults");
        Ok(Config::default())
    }
}

fn store(cfg: &Config) -> PageStore {
    PageStore::new(&cfg.paths.text_dir, &cfg.paths.image_dir)
}

fn render_outcome(outcome: &AnswerOutcome) -> String {
    match outcome {
        AnswerOutcome::Catalog { entries } => entries
            .iter()
            .enumerate()
            .map(|(i, entry)| format!("{}. {}", i + 1, render_entry(entry)))
            .collect::<Vec<_>>()
            .join("\n"),
        AnswerOutcome::Composed { text } => text.clone(),
        AnswerOutcome::CollaboratorFailure { message } => message.clone(),
        other => other.fixed_message().unwrap_or_default().to_string(),
    }
}

fn render_entry(entry: &CatalogEntry) -> String {
    let mut parts = vec![entry.name.clone()];
    if let Some(price) = &entry.price {
        parts.push(format!("preț: {}", price));
    }
    if let Some(code) = &entry.code {
        parts.push(format!("cod: {}", code));
    }
    parts.join(" | ")
}
