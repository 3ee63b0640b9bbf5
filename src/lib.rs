//! # Kiosk Assistant
//!
//! Answers product questions from a fixed set of catalog PDFs, using only
//! facts present in those catalogs.
//!
//! Two pieces do the work. The ingestion pipeline turns PDFs into one
//! normalized text unit per page. The retrieval engine ranks fragments of
//! those pages against a query by word overlap and, where possible, reads
//! structured catalog entries (name, price, code) out of them before any
//! language model is involved.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌───────────────────┐   ┌────────────────┐
//! │  PDFs    │──▶│ IngestPipeline     │──▶│ <slug>_pNNN.txt │
//! │          │   │ extract/OCR/norm   │   │ (+ PNG per page)│
//! └──────────┘   └───────────────────┘   └───────┬────────┘
//!                                                 │ re-read per query
//!                                                 ▼
//!                ┌──────────────┐   ┌──────────────────┐
//!   question ───▶│ SnippetIndex │──▶│ CatalogExtractor │──▶ entries
//!                └──────────────┘   └────────┬─────────┘
//!                                            │ nothing structured
//!                                            ▼
//!                                     LanguageModel ──▶ text
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing and validation |
//! | [`models`] | Core data types |
//! | [`normalize`] | Text normalization, page-noise removal, slugs |
//! | [`extract`] | PDF text-layer extraction |
//! | [`capability`] | Optional page rendering and OCR |
//! | [`store`] | On-disk layout of page units and images |
//! | [`ingest`] | Ingestion pipeline |
//! | [`progress`] | Ingestion progress reporting |
//! | [`segment`] | Fragment segmentation and tokenization |
//! | [`search`] | Word-overlap retrieval (permissive and gated) |
//! | [`catalog`] | Structured catalog entry extraction |
//! | [`llm`] | Language-model collaborator |
//! | [`answer`] | Query boundary: `answer(user_text)` |
//! | [`telemetry`] | Tracing subscriber setup |

pub mod answer;
pub mod capability;
pub mod catalog;
pub mod config;
pub mod extract;
pub mod ingest;
pub mod llm;
pub mod models;
pub mod normalize;
pub mod progress;
pub mod search;
pub mod segment;
pub mod store;
pub mod telemetry;
