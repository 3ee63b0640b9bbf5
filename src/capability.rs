//! Optional page rasterization and OCR.
//!
//! Both capabilities are external programs (`pdftoppm`, `tesseract`) that
//! may not be installed. Each is modelled as a trait whose implementations
//! never fail the batch: a missing or broken tool produces no images or no
//! text and a logged warning. [`Capabilities::from_config`] decides once,
//! up front, which implementation to use.

use std::path::{Path, PathBuf};
use std::process::Command;
use thiserror::Error;

use crate::config::IngestConfig;
use crate::models::PageImage;

/// Failure inside an optional capability. Only ever logged.
#[derive(Debug, Error)]
pub enum CapabilityError {
    #[error("{0} is not available")]
    Unavailable(String),
    #[error("{tool} failed: {message}")]
    Failed { tool: String, message: String },
}

/// Rasterizes every page of a PDF.
pub trait PageRenderer: Send + Sync {
    /// Try to render; an empty vector means "no images".
    fn render(&self, pdf_path: &Path, dpi: u32) -> Vec<PageImage>;
}

/// Recognizes text in a page image.
pub trait OcrEngine: Send + Sync {
    /// Try to recognize; an empty string means "no OCR text".
    fn recognize(&self, image: &PageImage) -> String;
}

/// Renderer used when rendering is disabled or unavailable.
pub struct NoRenderer;

impl PageRenderer for NoRenderer {
    fn render(&self, _pdf_path: &Path, _dpi: u32) -> Vec<PageImage> {
        Vec::new()
    }
}

/// OCR engine used when OCR is disabled or unavailable.
pub struct NoOcr;

impl OcrEngine for NoOcr {
    fn recognize(&self, _image: &PageImage) -> String {
        String::new()
    }
}

/// Renders pages with poppler's `pdftoppm`.
pub struct PdftoppmRenderer;

impl PageRenderer for PdftoppmRenderer {
    fn render(&self, pdf_path: &Path, dpi: u32) -> Vec<PageImage> {
        match render_with_pdftoppm(pdf_path, dpi) {
            Ok(images) => images,
            Err(e) => {
                tracing::warn!(pdf = %pdf_path.display(), error = %e, "image generation skipped");
                Vec::new()
            }
        }
    }
}

fn render_with_pdftoppm(pdf_path: &Path, dpi: u32) -> Result<Vec<PageImage>, CapabilityError> {
    let temp_dir = tempfile::Builder::new()
        .prefix("kiosk_render_")
        .tempdir()
        .map_err(|e| failed("pdftoppm", e))?;
    let prefix = temp_dir.path().join("page");

    let output = Command::new("pdftoppm")
        .arg("-png")
        .arg("-r")
        .arg(dpi.to_string())
        .arg(pdf_path)
        .arg(&prefix)
        .output()
        .map_err(|_| CapabilityError::Unavailable("pdftoppm".to_string()))?;

    if !output.status.success() {
        return Err(CapabilityError::Failed {
            tool: "pdftoppm".to_string(),
            message: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }

    // pdftoppm zero-pads the page suffix to the width of the page count,
    // so files are ordered by the parsed number rather than by name.
    let mut pages: Vec<(u32, PathBuf)> = std::fs::read_dir(temp_dir.path())
        .map_err(|e| failed("pdftoppm", e))?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter_map(|path| page_number_of(&path).map(|n| (n, path)))
        .collect();
    pages.sort_by_key(|(n, _)| *n);

    let mut images = Vec::with_capacity(pages.len());
    for (_, path) in pages {
        let png = std::fs::read(&path).map_err(|e| failed("pdftoppm", e))?;
        images.push(PageImage { png });
    }
    Ok(images)
}

fn page_number_of(path: &Path) -> Option<u32> {
    if path.extension()? != "png" {
        return None;
    }
    let stem = path.file_stem()?.to_str()?;
    stem.strip_prefix("page-")?.parse().ok()
}

/// Recognizes text with the `tesseract` CLI.
pub struct TesseractOcr {
    lang: String,
}

impl TesseractOcr {
    pub fn new(lang: &str) -> Self {
        Self {
            lang: lang.to_string(),
        }
    }
}

impl OcrEngine for TesseractOcr {
    fn recognize(&self, image: &PageImage) -> String {
        match recognize_with_tesseract(image, &self.lang) {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!(error = %e, "OCR skipped");
                String::new()
            }
        }
    }
}

fn recognize_with_tesseract(image: &PageImage, lang: &str) -> Result<String, CapabilityError> {
    let file = tempfile::Builder::new()
        .prefix("kiosk_ocr_")
        .suffix(".png")
        .tempfile()
        .map_err(|e| failed("tesseract", e))?;
    std::fs::write(file.path(), &image.png).map_err(|e| failed("tesseract", e))?;

    let output = Command::new("tesseract")
        .arg(file.path())
        .arg("stdout")
        .arg("-l")
        .arg(lang)
        .output()
        .map_err(|_| CapabilityError::Unavailable("tesseract".to_string()))?;

    if !output.status.success() {
        return Err(CapabilityError::Failed {
            tool: "tesseract".to_string(),
            message: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

fn failed(tool: &str, e: std::io::Error) -> CapabilityError {
    CapabilityError::Failed {
        tool: tool.to_string(),
        message: e.to_string(),
    }
}

/// Returns true if `program` can be spawned and exits successfully for `arg`.
pub fn command_available(program: &str, arg: &str) -> bool {
    Command::new(program)
        .arg(arg)
        .output()
        .map(|out| out.status.success())
        .unwrap_or(false)
}

/// The renderer and OCR engine an ingestion run will use.
pub struct Capabilities {
    pub renderer: Box<dyn PageRenderer>,
    pub ocr: Box<dyn OcrEngine>,
}

impl Capabilities {
    /// Both capabilities switched off.
    pub fn none() -> Self {
        Self {
            renderer: Box::new(NoRenderer),
            ocr: Box::new(NoOcr),
        }
    }

    /// Pick implementations from the config flags and what is installed.
    ///
    /// A flag that is on but whose tool is missing degrades to the no-op
    /// implementation with a warning.
    pub fn from_config(config: &IngestConfig) -> Self {
        let renderer: Box<dyn PageRenderer> = if !config.generate_images {
            Box::new(NoRenderer)
        } else if command_available("pdftoppm", "-v") {
            Box::new(PdftoppmRenderer)
        } else {
            tracing::warn!("generate_images is on but pdftoppm is not installed; images disabled");
            Box::new(NoRenderer)
        };

        let ocr: Box<dyn OcrEngine> = if !config.ocr_empty_pages {
            Box::new(NoOcr)
        } else if command_available("tesseract", "--version") {
            if !config.generate_images {
                tracing::warn!("ocr_empty_pages needs page images; enable generate_images");
            }
            Box::new(TesseractOcr::new(&config.ocr_lang))
        } else {
            tracing::warn!("ocr_empty_pages is on but tesseract is not installed; OCR disabled");
            Box::new(NoOcr)
        };

        Self { renderer, ocr }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_numbers_parse_from_pdftoppm_names() {
        assert_eq!(page_number_of(Path::new("/tmp/x/page-1.png")), Some(1));
        assert_eq!(page_number_of(Path::new("/tmp/x/page-012.png")), Some(12));
        assert_eq!(page_number_of(Path::new("/tmp/x/page-1.ppm")), None);
        assert_eq!(page_number_of(Path::new("/tmp/x/other.png")), None);
    }

    #[test]
    fn disabled_flags_give_no_ops() {
        let caps = Capabilities::from_config(&IngestConfig::default());
        assert!(caps.renderer.render(Path::new("missing.pdf"), 200).is_empty());
        assert!(caps.ocr.recognize(&PageImage { png: vec![] }).is_empty());
    }

    #[test]
    fn missing_program_is_unavailable() {
        assert!(!command_available("kiosk-definitely-not-installed", "--version"));
    }

    #[test]
    fn missing_pdf_renders_nothing() {
        // Either pdftoppm is absent or it fails on the missing file.
        let images = PdftoppmRenderer.render(Path::new("/nonexistent/catalog.pdf"), 72);
        assert!(images.is_empty());
    }
}
