//! Core data models shared by ingestion and retrieval.
//!
//! Documents, page units, and page images live on disk between the ingestion
//! batch and queries. Fragments and catalog entries exist only while a single
//! query is being answered.

use serde::Serialize;

/// One source PDF.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    /// File-name-derived identifier restricted to `[A-Za-z0-9._-]`.
    pub slug: String,
    pub page_count: usize,
}

/// Normalized text of exactly one PDF page, keyed by `(slug, page)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageTextUnit {
    pub slug: String,
    /// 1-based.
    pub page: usize,
    /// Body text without the header lines.
    pub text: String,
}

/// A rendered page raster, PNG-encoded.
#[derive(Debug, Clone)]
pub struct PageImage {
    pub png: Vec<u8>,
}

/// A paragraph or line-window span of a page's text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fragment {
    pub slug: String,
    pub page: usize,
    pub text: String,
}

/// A fragment that survived top-K selection, with its ranking score.
#[derive(Debug, Clone, Serialize)]
pub struct ScoredFragment {
    pub slug: String,
    pub page: usize,
    pub score: usize,
    pub text: String,
}

/// A structured product record pulled out of a fragment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CatalogEntry {
    pub name: String,
    /// Amount plus a 3-letter currency code, when a price label was found.
    pub price: Option<String>,
    pub code: Option<String>,
}
