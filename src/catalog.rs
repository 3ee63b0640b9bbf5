//! Structured catalog entries (name, price, code) from ranked fragment text.
//!
//! Each block of the ranked context is handed to three independent field
//! extractors. A block becomes a [`CatalogEntry`] only if it carries a price
//! or code keyword and at least one field could be read from it. Rendering
//! the entries for a user is left to the caller.

use regex::Regex;
use std::sync::LazyLock;

use crate::models::CatalogEntry;
use crate::search::CATALOG_SIGNAL;

/// Placeholder name when a block has no usable line.
pub const NO_NAME: &str = "(fără denumire)";

static BLOCK_BREAK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n\s*\n+").expect("valid regex"));

/// Currency codes accepted after a price amount. Any other word is not a
/// currency and the amount gets the default one.
pub const KNOWN_CURRENCIES: &[&str] = &["RON", "LEI", "EUR", "USD", "HUF", "GBP"];

static NAME_FIELD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(concat!(
        r"(?im)^[ \t]*(?:denumire|produs|articol|product|item|article|termék|megnevezés)",
        r"[ \t]*[:\-][ \t]*([^\n]+)",
    ))
    .expect("valid regex")
});

// The currency must follow the amount on the same line.
static PRICE_FIELD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(concat!(
        r"(?i:\b(?:pre[țţt]ul|pre[țţt]|price|ár))\s*[:\-]?\s*(\d[\d., ]*\d|\d)",
        r"(?:[ \t]*((?-i:[A-Z]{3}))\b)?",
    ))
    .expect("valid regex")
});

static CODE_FIELD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(concat!(
        r"(?i)\b(?:codul|cod|code|kód|cikkszám)(?:\s+(?:produs|articol))?",
        r"\s*[:#\-]?\s*([a-z0-9][a-z0-9\-/.]*)",
    ))
    .expect("valid regex")
});

/// Extracts catalog entries, normalizing prices to carry a currency code.
#[derive(Debug, Clone)]
pub struct CatalogExtractor {
    default_currency: String,
}

impl CatalogExtractor {
    pub fn new(default_currency: &str) -> Self {
        Self {
            default_currency: default_currency.to_string(),
        }
    }

    /// Entries in block order, which is fragment rank order.
    pub fn extract(&self, ranked_text: &str) -> Vec<CatalogEntry> {
        split_blocks(ranked_text)
            .into_iter()
            .filter_map(|block| self.extract_block(block))
            .collect()
    }

    /// One entry from one block, or `None` when the block is not a catalog item.
    pub fn extract_block(&self, block: &str) -> Option<CatalogEntry> {
        if !CATALOG_SIGNAL.is_match(block) {
            return None;
        }

        let name = extract_name(block);
        let price = extract_price(block, &self.default_currency);
        let code = extract_code(block);

        if name.is_none() && price.is_none() && code.is_none() {
            return None;
        }

        Some(CatalogEntry {
            name: name.unwrap_or_else(|| NO_NAME.to_string()),
            price,
            code,
        })
    }
}

/// Blank-line separated blocks; the `---` fragment separators drop out as
/// their own blocks and never carry a catalog signal.
fn split_blocks(text: &str) -> Vec<&str> {
    BLOCK_BREAK
        .split(text)
        .map(str::trim)
        .filter(|b| !b.is_empty() && *b != "---")
        .collect()
}

/// Labelled name, else the first non-empty line.
pub fn extract_name(block: &str) -> Option<String> {
    if let Some(caps) = NAME_FIELD.captures(block) {
        let value = caps[1].trim();
        if !value.is_empty() {
            return Some(value.to_string());
        }
    }
    block
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .map(str::to_string)
}

/// First labelled price, suffixed with `default_currency` when no known
/// currency code follows the amount.
pub fn extract_price(block: &str, default_currency: &str) -> Option<String> {
    let caps = PRICE_FIELD.captures(block)?;
    let amount = caps[1].trim();
    let currency = caps
        .get(2)
        .map(|m| m.as_str())
        .filter(|code| KNOWN_CURRENCIES.contains(code))
        .unwrap_or(default_currency);
    Some(format!("{} {}", amount, currency))
}

/// First labelled code token that contains a digit.
pub fn extract_code(block: &str) -> Option<String> {
    CODE_FIELD
        .captures_iter(block)
        .map(|caps| {
            caps[1]
                .trim_end_matches(|c: char| c == '.' || c == '/' || c == '-')
                .to_string()
        })
        .find(|code| code.chars().any(|c| c.is_ascii_digit()))
}
