//! Text cleanup for extracted and OCR'd page text.
//!
//! [`normalize`] folds compatibility glyphs, rejoins words hyphenated at a
//! line break, and collapses whitespace. [`remove_page_noise`] then drops
//! lines that are nothing but a page number. Both are pure.

use regex::Regex;
use std::sync::LazyLock;
use unicode_normalization::UnicodeNormalization;

static HYPHEN_NEWLINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\w)-\n(\w)").expect("valid regex"));
static HORIZONTAL_SPACE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[ \t]+").expect("valid regex"));
static SPACE_AROUND_NEWLINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r" ?\n ?").expect("valid regex"));
static EXCESS_BLANK_LINES: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n{3,}").expect("valid regex"));
static PAGE_MARKER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?:pag(?:ina)?\.?\s*)?\d{1,4}$").expect("valid regex"));
static SLUG_INVALID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^a-zA-Z0-9._-]+").expect("valid regex"));

/// Normalize raw page text. Idempotent.
pub fn normalize(raw: &str) -> String {
    let folded: String = raw.nfkc().collect();
    let text = folded
        .replace('\u{00A0}', " ")
        .replace("\r\n", "\n")
        .replace('\r', "\n");

    // Whitespace is collapsed before and after the hyphen rejoin so that
    // "cate- \ngorie" and the output of a previous pass agree.
    let text = HORIZONTAL_SPACE.replace_all(&text, " ");
    let text = SPACE_AROUND_NEWLINE.replace_all(&text, "\n");
    let text = rejoin_hyphenated(&text);
    // Rejoining can bring a base character next to a combining one.
    let text: String = text.nfkc().collect();
    let text = EXCESS_BLANK_LINES.replace_all(&text, "\n\n");

    text.trim().to_string()
}

fn rejoin_hyphenated(text: &str) -> String {
    // A single replace_all skips overlapping matches such as "a-\nb-\nc".
    let mut current = text.to_string();
    loop {
        let next = HYPHEN_NEWLINE.replace_all(&current, "$1$2").into_owned();
        if next == current {
            return current;
        }
        current = next;
    }
}

/// Drop lines that are only a page number, optionally prefixed by "pag",
/// "pag." or "pagina". Lines with any other content are kept.
pub fn remove_page_noise(text: &str) -> String {
    let kept: Vec<&str> = text
        .lines()
        .map(str::trim)
        .filter(|line| !PAGE_MARKER.is_match(&line.to_lowercase()))
        .collect();

    kept.join("\n").trim().to_string()
}

/// Turn a file stem into a document slug: runs of characters outside
/// `[A-Za-z0-9._-]` become a single `_`, surrounding `_` are trimmed.
pub fn slugify(stem: &str) -> String {
    SLUG_INVALID
        .replace_all(stem, "_")
        .trim_matches('_')
        .to_string()
}
