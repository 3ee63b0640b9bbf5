//! Ingestion pipeline orchestration.
//!
//! Turns every PDF in the source directory into one persisted text unit per
//! page: extract → normalize → strip page noise → optional OCR fallback →
//! write. Documents are processed strictly in sequence and independently;
//! a document that fails is reported and the run moves on.

use anyhow::{bail, Result};
use globset::{Glob, GlobSet, GlobSetBuilder};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::capability::Capabilities;
use crate::config::{Config, IngestConfig};
use crate::extract::{extract_file, PageExtractor, PdfTextExtractor};
use crate::models::{Document, PageImage, PageTextUnit};
use crate::normalize::{normalize, remove_page_noise, slugify};
use crate::progress::{IngestProgressEvent, IngestProgressReporter};
use crate::store::PageStore;

/// How one document's ingestion ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocumentOutcome {
    Written { slug: String, pages: usize },
    /// Nothing could be extracted or rendered.
    Skipped { slug: String, reason: String },
    /// Writing the derived artifacts failed part-way.
    Failed { slug: String, reason: String },
}

impl DocumentOutcome {
    pub fn slug(&self) -> &str {
        match self {
            DocumentOutcome::Written { slug, .. }
            | DocumentOutcome::Skipped { slug, .. }
            | DocumentOutcome::Failed { slug, .. } => slug,
        }
    }
}

/// Per-document results of one ingestion run, in processing order.
#[derive(Debug, Clone, Default)]
pub struct IngestReport {
    pub outcomes: Vec<DocumentOutcome>,
}

impl IngestReport {
    pub fn documents_written(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o, DocumentOutcome::Written { .. }))
            .count()
    }

    pub fn pages_written(&self) -> usize {
        self.outcomes
            .iter()
            .map(|o| match o {
                DocumentOutcome::Written { pages, .. } => *pages,
                _ => 0,
            })
            .sum()
    }
}

pub struct IngestPipeline {
    config: IngestConfig,
    store: PageStore,
    extractor: Box<dyn PageExtractor>,
    capabilities: Capabilities,
}

impl IngestPipeline {
    pub fn new(
        config: IngestConfig,
        store: PageStore,
        extractor: Box<dyn PageExtractor>,
        capabilities: Capabilities,
    ) -> Self {
        Self {
            config,
            store,
            extractor,
            capabilities,
        }
    }

    /// Pipeline with the `pdf-extract` text layer and capabilities chosen
    /// from the config flags.
    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config.ingest.clone(),
            PageStore::new(&config.paths.text_dir, &config.paths.image_dir),
            Box::new(PdfTextExtractor),
            Capabilities::from_config(&config.ingest),
        )
    }

    /// Ingest every matching PDF directly inside `pdf_dir`.
    pub fn ingest_dir(
        &self,
        pdf_dir: &Path,
        reporter: &dyn IngestProgressReporter,
    ) -> Result<IngestReport> {
        let pdfs = discover_pdfs(pdf_dir, &self.config.include_globs)?;
        if pdfs.is_empty() {
            tracing::warn!(dir = %pdf_dir.display(), "no PDF files found");
            return Ok(IngestReport::default());
        }

        let total = pdfs.len();
        let mut report = IngestReport::default();

        for (i, pdf) in pdfs.iter().enumerate() {
            let file = pdf
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_default();
            reporter.report(IngestProgressEvent::Processing {
                file,
                n: i + 1,
                total,
            });

            let outcome = self.ingest_document(pdf);
            match &outcome {
                DocumentOutcome::Written { slug, pages } => {
                    tracing::info!(slug = %slug, pages = *pages, "document ingested");
                    reporter.report(IngestProgressEvent::Written {
                        slug: slug.clone(),
                        pages: *pages,
                    });
                }
                DocumentOutcome::Skipped { slug, reason } => {
                    tracing::warn!(slug = %slug, reason = %reason, "document skipped");
                    reporter.report(IngestProgressEvent::Skipped {
                        slug: slug.clone(),
                        reason: reason.clone(),
                    });
                }
                DocumentOutcome::Failed { slug, reason } => {
                    tracing::warn!(slug = %slug, reason = %reason, "document failed");
                    reporter.report(IngestProgressEvent::Failed {
                        slug: slug.clone(),
                        reason: reason.clone(),
                    });
                }
            }
            report.outcomes.push(outcome);
        }

        Ok(report)
    }

    /// Ingest a single PDF. Never panics or returns early on a bad file.
    pub fn ingest_document(&self, pdf: &Path) -> DocumentOutcome {
        let slug = document_slug(pdf);

        let raw_pages = match extract_file(self.extractor.as_ref(), pdf) {
            Ok(pages) => pages,
            Err(e) => {
                tracing::warn!(slug = %slug, error = %e, "text extraction failed");
                Vec::new()
            }
        };

        let images = self.capabilities.renderer.render(pdf, self.config.dpi);

        // Text extraction and rendering can each fail independently.
        let document = Document {
            slug: slug.clone(),
            page_count: raw_pages.len().max(images.len()),
        };
        if document.page_count == 0 {
            return DocumentOutcome::Skipped {
                slug,
                reason: "no pages extracted (check PDF integrity)".to_string(),
            };
        }

        for idx in 0..document.page_count {
            let page = idx + 1;
            let raw = raw_pages.get(idx).map(String::as_str).unwrap_or_default();
            let image = images.get(idx);

            let unit = PageTextUnit {
                slug: document.slug.clone(),
                page,
                text: self.page_text(raw, image),
            };
            if let Err(e) = self.store.write_unit(&unit) {
                return DocumentOutcome::Failed {
                    slug,
                    reason: format!("{:#}", e),
                };
            }

            if let Some(image) = image {
                if let Err(e) = self.store.write_image(&document.slug, page, image) {
                    tracing::warn!(
                        slug = %document.slug,
                        page,
                        error = %e,
                        "could not save page image"
                    );
                }
            }
        }

        DocumentOutcome::Written {
            slug,
            pages: document.page_count,
        }
    }

    /// Normalized body text for one page, with the OCR fallback applied.
    fn page_text(&self, raw: &str, image: Option<&PageImage>) -> String {
        let text = remove_page_noise(&normalize(raw));

        let too_short = text.chars().count() < self.config.text_min_len_for_skip_ocr;
        match image {
            Some(image) if self.config.ocr_empty_pages && too_short => {
                let ocr_text = normalize(&self.capabilities.ocr.recognize(image));
                if ocr_text.chars().count() > text.chars().count() {
                    tracing::debug!(chars = ocr_text.chars().count(), "using OCR text for page");
                    ocr_text
                } else {
                    text
                }
            }
            _ => text,
        }
    }
}

/// Slug for a PDF path, from its file stem.
pub fn document_slug(pdf: &Path) -> String {
    let stem = pdf
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default();
    let slug = slugify(&stem);
    if slug.is_empty() {
        "document".to_string()
    } else {
        slug
    }
}

/// PDFs directly inside `dir` whose file name matches `include_globs`,
/// sorted by path.
pub fn discover_pdfs(dir: &Path, include_globs: &[String]) -> Result<Vec<PathBuf>> {
    if !dir.exists() {
        bail!("PDF source directory does not exist: {}", dir.display());
    }

    let include_set = build_globset(include_globs)?;
    let mut pdfs = Vec::new();

    for entry in WalkDir::new(dir).min_depth(1).max_depth(1) {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().to_string();
        if include_set.is_match(&name) {
            pdfs.push(entry.into_path());
        }
    }

    pdfs.sort();
    Ok(pdfs)
}

fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(Glob::new(pattern)?);
    }
    Ok(builder.build()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::{OcrEngine, PageRenderer};
    use crate::extract::ExtractError;
    use crate::progress::NoProgress;
    use crate::store::{parse_unit, PageSource};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tempfile::TempDir;

    /// Returns canned pages keyed by file stem; `None` simulates a corrupt PDF.
    struct CannedExtractor {
        pages: Vec<(&'static str, Option<Vec<&'static str>>)>,
    }

    impl PageExtractor for CannedExtractor {
        fn extract_pages(&self, pdf: &[u8]) -> Result<Vec<String>, ExtractError> {
            let key = String::from_utf8_lossy(pdf).to_string();
            match self.pages.iter().find(|(k, _)| *k == key) {
                Some((_, Some(pages))) => Ok(pages.iter().map(|p| p.to_string()).collect()),
                _ => Err(ExtractError::Pdf("corrupt".to_string())),
            }
        }
    }

    struct FixedRenderer(usize);

    impl PageRenderer for FixedRenderer {
        fn render(&self, _pdf_path: &Path, _dpi: u32) -> Vec<PageImage> {
            (0..self.0).map(|i| PageImage { png: vec![i as u8] }).collect()
        }
    }

    /// Returns the same text for every image and counts the calls.
    struct FixedOcr {
        text: &'static str,
        calls: Arc<AtomicUsize>,
    }

    impl FixedOcr {
        fn new(text: &'static str) -> Self {
            Self {
                text,
                calls: Arc::new(AtomicUsize::new(0)),
            }
        }
    }

    impl OcrEngine for FixedOcr {
        fn recognize(&self, _image: &PageImage) -> String {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.text.to_string()
        }
    }

    struct Fixture {
        _tmp: TempDir,
        pdf_dir: PathBuf,
        store: PageStore,
    }

    /// Each PDF file's bytes are its own key for [`CannedExtractor`].
    fn fixture(files: &[&str]) -> Fixture {
        let tmp = TempDir::new().unwrap();
        let pdf_dir = tmp.path().join("pdfs");
        std::fs::create_dir_all(&pdf_dir).unwrap();
        for name in files {
            let key = Path::new(name).file_stem().unwrap().to_string_lossy().to_string();
            std::fs::write(pdf_dir.join(name), key).unwrap();
        }
        let store = PageStore::new(tmp.path().join("txt"), tmp.path().join("img"));
        Fixture {
            _tmp: tmp,
            pdf_dir,
            store,
        }
    }

    fn pipeline(
        store: &PageStore,
        config: IngestConfig,
        extractor: CannedExtractor,
        capabilities: Capabilities,
    ) -> IngestPipeline {
        IngestPipeline::new(config, store.clone(), Box::new(extractor), capabilities)
    }

    #[test]
    fn writes_one_unit_per_page_with_header() {
        let fx = fixture(&["unior.pdf"]);
        let extractor = CannedExtractor {
            pages: vec![("unior", Some(vec!["Ciocan 500g Cod: C-100 Preț: 25 RON", ""]))],
        };
        let p = pipeline(&fx.store, IngestConfig::default(), extractor, Capabilities::none());

        let report = p.ingest_dir(&fx.pdf_dir, &NoProgress).unwrap();
        assert_eq!(
            report.outcomes,
            vec![DocumentOutcome::Written {
                slug: "unior".to_string(),
                pages: 2
            }]
        );

        let page1 = std::fs::read_to_string(fx.store.unit_path("unior", 1)).unwrap();
        assert_eq!(
            page1,
            "[SOURCE:unior]\n[PAGE:1]\nCiocan 500g Cod: C-100 Preț: 25 RON"
        );
        let page2 = std::fs::read_to_string(fx.store.unit_path("unior", 2)).unwrap();
        assert_eq!(page2, "[SOURCE:unior]\n[PAGE:2]\n");
    }

    #[test]
    fn corrupt_pdf_is_skipped_and_batch_continues() {
        let fx = fixture(&["a_bad.pdf", "b_good.pdf"]);
        let extractor = CannedExtractor {
            pages: vec![("a_bad", None), ("b_good", Some(vec!["Șurubelniță"]))],
        };
        let p = pipeline(&fx.store, IngestConfig::default(), extractor, Capabilities::none());

        let report = p.ingest_dir(&fx.pdf_dir, &NoProgress).unwrap();
        assert_eq!(report.outcomes.len(), 2);
        assert!(matches!(
            &report.outcomes[0],
            DocumentOutcome::Skipped { slug, .. } if slug == "a_bad"
        ));
        assert_eq!(report.outcomes[1].slug(), "b_good");
        assert_eq!(report.documents_written(), 1);
        assert_eq!(report.pages_written(), 1);
        assert_eq!(fx.store.load_units().unwrap().len(), 1);
    }

    #[test]
    fn rendered_pages_extend_page_count() {
        let fx = fixture(&["scan.pdf"]);
        let extractor = CannedExtractor {
            pages: vec![("scan", None)],
        };
        let caps = Capabilities {
            renderer: Box::new(FixedRenderer(3)),
            ocr: Box::new(FixedOcr::new("")),
        };
        let p = pipeline(&fx.store, IngestConfig::default(), extractor, caps);

        let outcome = p.ingest_document(&fx.pdf_dir.join("scan.pdf"));
        assert_eq!(
            outcome,
            DocumentOutcome::Written {
                slug: "scan".to_string(),
                pages: 3
            }
        );
        assert!(fx.store.image_path("scan", 3).exists());
    }

    #[test]
    fn ocr_replaces_short_text_only_when_longer() {
        let fx = fixture(&["cat.pdf"]);
        let extractor = CannedExtractor {
            pages: vec![("cat", Some(vec!["scurt", "x"]))],
        };
        let caps = Capabilities {
            renderer: Box::new(FixedRenderer(1)),
            ocr: Box::new(FixedOcr::new("Cheie fixă 13mm\nCod: U-13  Preț: 40")),
        };
        let config = IngestConfig {
            ocr_empty_pages: true,
            ..IngestConfig::default()
        };
        let p = pipeline(&fx.store, config, extractor, caps);
        p.ingest_document(&fx.pdf_dir.join("cat.pdf"));

        let page1 = std::fs::read_to_string(fx.store.unit_path("cat", 1)).unwrap();
        assert_eq!(parse_unit(&page1, "").text, "Cheie fixă 13mm\nCod: U-13 Preț: 40");
        // Page 2 has no image, so OCR is not attempted.
        let page2 = std::fs::read_to_string(fx.store.unit_path("cat", 2)).unwrap();
        assert_eq!(parse_unit(&page2, "").text, "x");
    }

    /// Runs a one-page document with one rendered image through `config`
    /// and returns the persisted body text and the number of OCR calls.
    fn ingest_with_ocr(
        config: IngestConfig,
        extracted: &'static str,
        ocr: &'static str,
    ) -> (String, usize) {
        let fx = fixture(&["cat.pdf"]);
        let extractor = CannedExtractor {
            pages: vec![("cat", Some(vec![extracted]))],
        };
        let engine = FixedOcr::new(ocr);
        let calls = Arc::clone(&engine.calls);
        let caps = Capabilities {
            renderer: Box::new(FixedRenderer(1)),
            ocr: Box::new(engine),
        };
        let p = pipeline(&fx.store, config, extractor, caps);
        p.ingest_document(&fx.pdf_dir.join("cat.pdf"));

        let page1 = std::fs::read_to_string(fx.store.unit_path("cat", 1)).unwrap();
        (parse_unit(&page1, "").text, calls.load(Ordering::SeqCst))
    }

    fn ocr_enabled() -> IngestConfig {
        IngestConfig {
            ocr_empty_pages: true,
            ..IngestConfig::default()
        }
    }

    #[test]
    fn ocr_not_used_when_shorter() {
        let (text, calls) = ingest_with_ocr(ocr_enabled(), "text destul de lung", "scurt");
        assert_eq!(text, "text destul de lung");
        assert_eq!(calls, 1);
    }

    #[test]
    fn ocr_of_equal_length_keeps_extracted_text() {
        let (text, calls) = ingest_with_ocr(ocr_enabled(), "abcde", "vwxyz");
        assert_eq!(text, "abcde");
        assert_eq!(calls, 1);
    }

    #[test]
    fn ocr_disabled_never_calls_engine() {
        let config = IngestConfig {
            ocr_empty_pages: false,
            ..IngestConfig::default()
        };
        let (text, calls) = ingest_with_ocr(config, "x", "Cheie fixă 13mm Cod: U-13");
        assert_eq!(text, "x");
        assert_eq!(calls, 0);
    }

    #[test]
    fn text_at_threshold_skips_ocr() {
        let config = IngestConfig {
            text_min_len_for_skip_ocr: 5,
            ..ocr_enabled()
        };
        let (text, calls) = ingest_with_ocr(config, "abcde", "Cheie fixă 13mm Cod: U-13");
        assert_eq!(text, "abcde");
        assert_eq!(calls, 0);
    }

    #[test]
    fn page_noise_is_stripped_before_write() {
        let fx = fixture(&["n.pdf"]);
        let extractor = CannedExtractor {
            pages: vec![("n", Some(vec!["Pag. 7", "Clește\n42\nCod: K-1"]))],
        };
        let p = pipeline(&fx.store, IngestConfig::default(), extractor, Capabilities::none());
        p.ingest_document(&fx.pdf_dir.join("n.pdf"));
        let units = fx.store.load_units().unwrap();
        assert_eq!(units[0].text, "");
        assert_eq!(units[1].text, "Clește\nCod: K-1");
    }

    #[test]
    fn empty_source_dir_reports_nothing() {
        let fx = fixture(&[]);
        let p = pipeline(
            &fx.store,
            IngestConfig::default(),
            CannedExtractor { pages: vec![] },
            Capabilities::none(),
        );
        let report = p.ingest_dir(&fx.pdf_dir, &NoProgress).unwrap();
        assert!(report.outcomes.is_empty());
    }

    #[test]
    fn discovery_filters_and_sorts() {
        let fx = fixture(&["b.pdf", "a.PDF", "notes.txt"]);
        let found = discover_pdfs(&fx.pdf_dir, &IngestConfig::default().include_globs).unwrap();
        let names: Vec<String> = found
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec!["a.PDF", "b.pdf"]);
    }

    #[test]
    fn missing_source_dir_is_an_error() {
        assert!(discover_pdfs(Path::new("/nonexistent/pdfs"), &["*.pdf".to_string()]).is_err());
    }

    #[test]
    fn slug_comes_from_file_stem() {
        assert_eq!(document_slug(Path::new("/x/Catalog Unior 2024.pdf")), "Catalog_Unior_2024");
        assert_eq!(document_slug(Path::new("/x/șș.pdf")), "document");
    }
}
