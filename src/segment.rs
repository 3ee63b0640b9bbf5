//! Query-time segmentation of page text into fragments, and tokenization.
//!
//! A page is split on blank lines into paragraphs. Pages with too few
//! paragraphs (scanned catalogs often come out as one long column of lines)
//! are instead cut into fixed-size windows of non-empty lines.

use regex::Regex;
use std::collections::HashSet;
use std::sync::LazyLock;

use crate::models::{Fragment, PageTextUnit};

static PARAGRAPH_BREAK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n\s*\n+").expect("valid regex"));

/// Lowercase word tokens: ASCII letters and digits, Romanian and Hungarian
/// accented letters (both comma- and cedilla-below forms), and hyphens.
static TOKEN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[a-z0-9ăâîșşțţáéíóöőúüű\-]+").expect("valid regex")
});

/// Split text into fragment texts.
///
/// With at least `min_paragraphs` paragraphs, each paragraph is a fragment.
/// Otherwise the non-empty lines are grouped `window` at a time.
pub fn split_text(text: &str, window: usize, min_paragraphs: usize) -> Vec<String> {
    let paragraphs: Vec<String> = PARAGRAPH_BREAK
        .split(text)
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(str::to_string)
        .collect();

    if paragraphs.len() >= min_paragraphs {
        return paragraphs;
    }

    let lines: Vec<&str> = text
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect();
    lines
        .chunks(window.max(1))
        .map(|chunk| chunk.join("\n"))
        .collect()
}

/// Fragments of one page unit, attributed to its `(slug, page)`.
pub fn fragment_unit(unit: &PageTextUnit, window: usize, min_paragraphs: usize) -> Vec<Fragment> {
    split_text(&unit.text, window, min_paragraphs)
        .into_iter()
        .map(|text| Fragment {
            slug: unit.slug.clone(),
            page: unit.page,
            text,
        })
        .collect()
}

/// Distinct lowercase tokens of `text`.
pub fn tokenize(text: &str) -> HashSet<String> {
    let lower = text.to_lowercase();
    TOKEN
        .find_iter(&lower)
        .map(|m| m.as_str().to_string())
        .collect()
}
