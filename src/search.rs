//! Word-overlap snippet retrieval over persisted page units.
//!
//! Every query re-reads all page units from the [`PageSource`]; there is no
//! persistent index. Cost is O(total fragments × tokens per fragment) per
//! query, which is the main scalability limit of this engine.
//!
//! # Scoring
//!
//! A fragment's score is the number of distinct query tokens it contains.
//! Only the best `top_k` fragments are kept, using a bounded min-heap that
//! evicts the current minimum on overflow.
//!
//! Two modes exist:
//! - **permissive**: any fragment with a positive overlap is a candidate.
//! - **gated**: overlap must reach `min_overlap` *and* the fragment must
//!   mention a price or code; fragments that mention a price get +1 for
//!   ranking only.
//!
//! Ties between equal scores are resolved by scan order (earlier units and
//! fragments win). That ordering is an implementation detail, not a contract.

use anyhow::Result;
use regex::Regex;
use std::cmp::{Ordering, Reverse};
use std::collections::{BinaryHeap, HashSet};
use std::sync::LazyLock;
use unicode_normalization::UnicodeNormalization;

use crate::config::{RetrievalConfig, RetrievalMode};
use crate::models::ScoredFragment;
use crate::segment::{fragment_unit, tokenize};
use crate::store::PageSource;

/// Separator between fragments in the joined context string.
pub const FRAGMENT_SEPARATOR: &str = "\n\n---\n\n";

/// Price- or code-labelled text in the supported locales (ro, hu, en).
pub static CATALOG_SIGNAL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:pre[țţt]|pre[țţt]ul|price|ár|cod|codul|code|kód|cikkszám)\b")
        .expect("valid regex")
});

/// Price-labelled text only.
pub static PRICE_SIGNAL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:pre[țţt]|pre[țţt]ul|price|ár)\b").expect("valid regex")
});

/// Parameters for one search call.
#[derive(Debug, Clone)]
pub struct SearchOptions {
    pub mode: RetrievalMode,
    pub top_k: usize,
    pub window: usize,
    pub min_paragraphs: usize,
    pub min_overlap: usize,
}

impl From<&RetrievalConfig> for SearchOptions {
    fn from(config: &RetrievalConfig) -> Self {
        Self {
            mode: config.mode,
            top_k: config.top_k,
            window: config.window,
            min_paragraphs: config.min_paragraphs,
            min_overlap: config.min_overlap,
        }
    }
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self::from(&RetrievalConfig::default())
    }
}

/// Ranked fragments for one query.
#[derive(Debug, Clone, Default)]
pub struct SearchResults {
    /// Best first.
    pub fragments: Vec<ScoredFragment>,
    /// Number of page units scanned (0 when the query had no tokens).
    pub units_scanned: usize,
}

impl SearchResults {
    pub fn is_empty(&self) -> bool {
        self.fragments.is_empty()
    }

    /// Fragment texts joined with [`FRAGMENT_SEPARATOR`]; empty when nothing matched.
    pub fn joined(&self) -> String {
        self.fragments
            .iter()
            .map(|f| f.text.as_str())
            .collect::<Vec<_>>()
            .join(FRAGMENT_SEPARATOR)
    }
}

/// Retrieval engine over a source of page units.
pub struct SnippetIndex<S: PageSource> {
    source: S,
}

impl<S: PageSource> SnippetIndex<S> {
    pub fn new(source: S) -> Self {
        Self { source }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// Rank fragments of every page unit against `query`.
    ///
    /// The query is NFKC-folded like page text. A query without tokens
    /// returns an empty result without touching the source.
    pub fn search(&self, query: &str, options: &SearchOptions) -> Result<SearchResults> {
        let folded: String = query.nfkc().collect();
        let query_tokens = tokenize(&folded);
        if query_tokens.is_empty() {
            return Ok(SearchResults::default());
        }

        let units = self.source.load_units()?;
        let mut selector = TopK::new(options.top_k);
        let mut scored = 0usize;

        for unit in &units {
            for fragment in fragment_unit(unit, options.window, options.min_paragraphs) {
                let Some(score) = score_fragment(&fragment.text, &query_tokens, options) else {
                    continue;
                };
                scored += 1;
                selector.push(ScoredFragment {
                    slug: fragment.slug,
                    page: fragment.page,
                    score,
                    text: fragment.text,
                });
            }
        }

        let fragments = selector.into_sorted_vec();
        tracing::debug!(
            query_tokens = query_tokens.len(),
            units = units.len(),
            candidates = scored,
            kept = fragments.len(),
            mode = options.mode.as_str(),
            "snippet search"
        );

        Ok(SearchResults {
            fragments,
            units_scanned: units.len(),
        })
    }
}

/// Score one fragment, or `None` if it is not eligible in this mode.
pub fn score_fragment(
    text: &str,
    query_tokens: &HashSet<String>,
    options: &SearchOptions,
) -> Option<usize> {
    let overlap = overlap(&tokenize(text), query_tokens);
    match options.mode {
        RetrievalMode::Permissive => (overlap > 0).then_some(overlap),
        RetrievalMode::Gated => {
            if overlap < options.min_overlap.max(1) {
                return None;
            }
            let lower = text.to_lowercase();
            if !CATALOG_SIGNAL.is_match(&lower) {
                return None;
            }
            let bonus = usize::from(PRICE_SIGNAL.is_match(&lower));
            Some(overlap + bonus)
        }
    }
}

/// Number of distinct tokens shared by both sets.
pub fn overlap(fragment_tokens: &HashSet<String>, query_tokens: &HashSet<String>) -> usize {
    fragment_tokens.intersection(query_tokens).count()
}

/// Candidate ordering for the heap: higher score is greater; among equal
/// scores the earlier-scanned candidate is greater.
struct Candidate {
    seq: usize,
    fragment: ScoredFragment,
}

impl Candidate {
    fn key(&self) -> (usize, Reverse<usize>) {
        (self.fragment.score, Reverse(self.seq))
    }
}

impl PartialEq for Candidate {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl Eq for Candidate {}

impl PartialOrd for Candidate {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Candidate {
    fn cmp(&self, other: &Self) -> Ordering {
        self.key().cmp(&other.key())
    }
}

/// Fixed-capacity best-k selector backed by a min-heap.
struct TopK {
    capacity: usize,
    next_seq: usize,
    heap: BinaryHeap<Reverse<Candidate>>,
}

impl TopK {
    fn new(capacity: usize) -> Self {
        Self {
            capacity,
            next_seq: 0,
            heap: BinaryHeap::with_capacity(capacity.saturating_add(1).min(1024)),
        }
    }

    /// Push a candidate; zero scores are never kept.
    fn push(&mut self, fragment: ScoredFragment) {
        if fragment.score == 0 || self.capacity == 0 {
            return;
        }
        let seq = self.next_seq;
        self.next_seq += 1;
        self.heap.push(Reverse(Candidate { seq, fragment }));
        if self.heap.len() > self.capacity {
            self.heap.pop();
        }
    }

    /// Survivors, best first.
    fn into_sorted_vec(self) -> Vec<ScoredFragment> {
        // Ascending order of Reverse<Candidate> is descending candidate order.
        self.heap
            .into_sorted_vec()
            .into_iter()
            .map(|Reverse(c)| c.fragment)
            .collect()
    }
}
