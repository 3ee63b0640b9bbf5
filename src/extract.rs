//! Per-page text-layer extraction from PDF bytes.
//!
//! Extraction reads the PDF text layer only; nothing is rasterized here.
//! An unreadable document yields an [`ExtractError`], which the ingestion
//! pipeline logs before moving on to the next file.

use std::panic::{self, AssertUnwindSafe};
use std::path::Path;
use thiserror::Error;

/// A PDF could not be turned into page text.
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("PDF extraction failed: {0}")]
    Pdf(String),
    #[error("PDF extraction panicked (malformed document)")]
    Panicked,
}

/// Source of ordered per-page text for one PDF.
pub trait PageExtractor: Send + Sync {
    /// Returns one string per physical page, in page order.
    fn extract_pages(&self, pdf: &[u8]) -> Result<Vec<String>, ExtractError>;
}

/// Text-layer extractor backed by `pdf-extract`.
pub struct PdfTextExtractor;

impl PageExtractor for PdfTextExtractor {
    fn extract_pages(&self, pdf: &[u8]) -> Result<Vec<String>, ExtractError> {
        // pdf-extract panics on some malformed inputs instead of returning errors.
        let result = panic::catch_unwind(AssertUnwindSafe(|| {
            pdf_extract::extract_text_from_mem_by_pages(pdf)
        }));
        match result {
            Ok(Ok(pages)) => Ok(pages),
            Ok(Err(e)) => Err(ExtractError::Pdf(e.to_string())),
            Err(_) => Err(ExtractError::Panicked),
        }
    }
}

/// Read a PDF from disk and extract its pages.
pub fn extract_file(
    extractor: &dyn PageExtractor,
    path: &Path,
) -> Result<Vec<String>, ExtractError> {
    let bytes = std::fs::read(path).map_err(|source| ExtractError::Io {
        path: path.display().to_string(),
        source,
    })?;
    extractor.extract_pages(&bytes)
}
