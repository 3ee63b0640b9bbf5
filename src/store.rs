//! On-disk layout of page text units and page images.
//!
//! Each page is one UTF-8 file `<slug>_p<NNN>.txt` whose first two lines are
//! `[SOURCE:<slug>]` and `[PAGE:<n>]`, followed by the normalized body.
//! Images use the same key with a `.png` extension in a separate directory.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

use crate::models::{PageImage, PageTextUnit};

/// File stem shared by a page's text unit and image: `<slug>_p<NNN>`.
pub fn unit_key(slug: &str, page: usize) -> String {
    format!("{}_p{:03}", slug, page)
}

/// Fixed header lines identifying a unit's source and page.
pub fn unit_header(slug: &str, page: usize) -> String {
    format!("[SOURCE:{}]\n[PAGE:{}]\n", slug, page)
}

/// Serialize a unit to its file contents.
pub fn render_unit(unit: &PageTextUnit) -> String {
    let mut out = unit_header(&unit.slug, unit.page);
    out.push_str(&unit.text);
    out
}

/// Parse file contents back into a unit.
///
/// Files without a recognizable header are still readable: the whole text
/// becomes the body and the attribution falls back to `fallback_slug`, page 0.
pub fn parse_unit(contents: &str, fallback_slug: &str) -> PageTextUnit {
    let mut lines = contents.splitn(3, '\n');
    let first = lines.next().unwrap_or_default().trim_end_matches('\r');
    let second = lines.next().unwrap_or_default().trim_end_matches('\r');

    let source = first
        .strip_prefix("[SOURCE:")
        .and_then(|rest| rest.strip_suffix(']'));
    let page = second
        .strip_prefix("[PAGE:")
        .and_then(|rest| rest.strip_suffix(']'))
        .and_then(|n| n.parse::<usize>().ok());

    match (source, page) {
        (Some(slug), Some(page)) => PageTextUnit {
            slug: slug.to_string(),
            page,
            text: lines.next().unwrap_or_default().to_string(),
        },
        _ => PageTextUnit {
            slug: fallback_slug.to_string(),
            page: 0,
            text: contents.to_string(),
        },
    }
}

/// Where ingestion writes and retrieval reads persisted pages.
#[derive(Debug, Clone)]
pub struct PageStore {
    text_dir: PathBuf,
    image_dir: PathBuf,
}

impl PageStore {
    pub fn new(text_dir: impl Into<PathBuf>, image_dir: impl Into<PathBuf>) -> Self {
        Self {
            text_dir: text_dir.into(),
            image_dir: image_dir.into(),
        }
    }

    pub fn text_dir(&self) -> &Path {
        &self.text_dir
    }

    pub fn unit_path(&self, slug: &str, page: usize) -> PathBuf {
        self.text_dir.join(format!("{}.txt", unit_key(slug, page)))
    }

    pub fn image_path(&self, slug: &str, page: usize) -> PathBuf {
        self.image_dir.join(format!("{}.png", unit_key(slug, page)))
    }

    /// Write (or overwrite) one page text unit.
    pub fn write_unit(&self, unit: &PageTextUnit) -> Result<PathBuf> {
        std::fs::create_dir_all(&self.text_dir).with_context(|| {
            format!("Failed to create text dir: {}", self.text_dir.display())
        })?;
        let path = self.unit_path(&unit.slug, unit.page);
        std::fs::write(&path, render_unit(unit))
            .with_context(|| format!("Failed to write page unit: {}", path.display()))?;
        Ok(path)
    }

    /// Write (or overwrite) one page image.
    pub fn write_image(&self, slug: &str, page: usize, image: &PageImage) -> Result<PathBuf> {
        std::fs::create_dir_all(&self.image_dir).with_context(|| {
            format!("Failed to create image dir: {}", self.image_dir.display())
        })?;
        let path = self.image_path(slug, page);
        std::fs::write(&path, &image.png)
            .with_context(|| format!("Failed to write page image: {}", path.display()))?;
        Ok(path)
    }

    /// Paths of all persisted units, sorted by file name.
    ///
    /// A missing text directory is an empty knowledge base, not an error.
    pub fn list_unit_paths(&self) -> Result<Vec<PathBuf>> {
        if !self.text_dir.exists() {
            return Ok(Vec::new());
        }
        let mut paths: Vec<PathBuf> = walkdir::WalkDir::new(&self.text_dir)
            .min_depth(1)
            .max_depth(1)
            .into_iter()
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().is_file())
            .map(|entry| entry.into_path())
            .filter(|path| path.extension().is_some_and(|ext| ext == "txt"))
            .collect();
        paths.sort();
        Ok(paths)
    }
}

/// Supplies the full set of page units for one query.
pub trait PageSource: Send + Sync {
    /// Load every currently persisted unit.
    fn load_units(&self) -> Result<Vec<PageTextUnit>>;

    /// Whether anything has been ingested at all.
    fn has_units(&self) -> Result<bool> {
        Ok(!self.load_units()?.is_empty())
    }
}

impl PageSource for PageStore {
    fn load_units(&self) -> Result<Vec<PageTextUnit>> {
        let mut units = Vec::new();
        for path in self.list_unit_paths()? {
            // Unreadable files are skipped; one bad unit does not fail the query.
            let bytes = match std::fs::read(&path) {
                Ok(bytes) => bytes,
                Err(e) => {
                    tracing::warn!(
                        path = %path.display(),
                        error = %e,
                        "skipping unreadable page unit"
                    );
                    continue;
                }
            };
            let contents = String::from_utf8_lossy(&bytes);
            let stem = path
                .file_stem()
                .map(|s| s.to_string_lossy().to_string())
                .unwrap_or_default();
            units.push(parse_unit(&contents, &stem));
        }
        Ok(units)
    }

    fn has_units(&self) -> Result<bool> {
        Ok(!self.list_unit_paths()?.is_empty())
    }
}

/// In-memory page source, mainly for tests and embedding the engine.
impl PageSource for Vec<PageTextUnit> {
    fn load_units(&self) -> Result<Vec<PageTextUnit>> {
        Ok(self.clone())
    }
}
