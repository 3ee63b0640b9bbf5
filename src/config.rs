//! TOML configuration for ingestion, retrieval, and the answer boundary.
//!
//! The configuration is an explicit value passed to every entry point;
//! nothing here is read from or written to process-wide state. Every
//! section has defaults so a minimal file (or no file at all) works.

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub paths: PathsConfig,
    #[serde(default)]
    pub ingest: IngestConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub catalog: CatalogConfig,
    #[serde(default)]
    pub llm: LlmConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct PathsConfig {
    #[serde(default = "default_pdf_dir")]
    pub pdf_dir: PathBuf,
    #[serde(default = "default_text_dir")]
    pub text_dir: PathBuf,
    #[serde(default = "default_image_dir")]
    pub image_dir: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            pdf_dir: default_pdf_dir(),
            text_dir: default_text_dir(),
            image_dir: default_image_dir(),
        }
    }
}

fn default_pdf_dir() -> PathBuf {
    PathBuf::from("media/knowledge")
}
fn default_text_dir() -> PathBuf {
    PathBuf::from("media/knowledge_txt")
}
fn default_image_dir() -> PathBuf {
    PathBuf::from("static/page_images")
}

#[derive(Debug, Deserialize, Clone)]
pub struct IngestConfig {
    /// Rasterize every page to PNG (needs `pdftoppm`).
    #[serde(default)]
    pub generate_images: bool,
    /// OCR pages whose text layer is too short (needs `tesseract` and images).
    #[serde(default)]
    pub ocr_empty_pages: bool,
    #[serde(default = "default_dpi")]
    pub dpi: u32,
    #[serde(default = "default_text_min_len")]
    pub text_min_len_for_skip_ocr: usize,
    #[serde(default = "default_ocr_lang")]
    pub ocr_lang: String,
    #[serde(default = "default_include_globs")]
    pub include_globs: Vec<String>,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            generate_images: false,
            ocr_empty_pages: false,
            dpi: default_dpi(),
            text_min_len_for_skip_ocr: default_text_min_len(),
            ocr_lang: default_ocr_lang(),
            include_globs: default_include_globs(),
        }
    }
}

fn default_dpi() -> u32 {
    200
}
fn default_text_min_len() -> usize {
    60
}
fn default_ocr_lang() -> String {
    "ron+eng".to_string()
}
fn default_include_globs() -> Vec<String> {
    vec!["*.pdf".to_string(), "*.PDF".to_string()]
}

/// Which of the two retrieval variants answers a query.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum RetrievalMode {
    /// Any fragment with a positive word overlap is a candidate.
    #[default]
    Permissive,
    /// Overlap must reach `min_overlap` and the fragment must carry a catalog signal.
    Gated,
}

impl RetrievalMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            RetrievalMode::Permissive => "permissive",
            RetrievalMode::Gated => "gated",
        }
    }
}

impl std::str::FromStr for RetrievalMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "permissive" => Ok(RetrievalMode::Permissive),
            "gated" => Ok(RetrievalMode::Gated),
            other => Err(format!(
                "unknown retrieval mode '{}': use permissive or gated",
                other
            )),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    #[serde(default)]
    pub mode: RetrievalMode,
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    /// Lines per window when a page is paragraph-poor.
    #[serde(default = "default_window")]
    pub window: usize,
    /// Below this many paragraphs a page is split into line windows instead.
    #[serde(default = "default_min_paragraphs")]
    pub min_paragraphs: usize,
    #[serde(default = "default_min_overlap")]
    pub min_overlap: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            mode: RetrievalMode::default(),
            top_k: default_top_k(),
            window: default_window(),
            min_paragraphs: default_min_paragraphs(),
            min_overlap: default_min_overlap(),
        }
    }
}

fn default_top_k() -> usize {
    40
}
fn default_window() -> usize {
    6
}
fn default_min_paragraphs() -> usize {
    4
}
fn default_min_overlap() -> usize {
    2
}

#[derive(Debug, Deserialize, Clone)]
pub struct CatalogConfig {
    #[serde(default = "default_true")]
    pub extract: bool,
    #[serde(default = "default_currency")]
    pub default_currency: String,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            extract: true,
            default_currency: default_currency(),
        }
    }
}

fn default_true() -> bool {
    true
}
fn default_currency() -> String {
    "RON".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct LlmConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default)]
    pub use_system_proxy: bool,
    #[serde(default)]
    pub system_prompt: Option<String>,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: default_model(),
            base_url: default_base_url(),
            api_key_env: default_api_key_env(),
            timeout_secs: default_timeout_secs(),
            temperature: default_temperature(),
            use_system_proxy: false,
            system_prompt: None,
        }
    }
}

fn default_provider() -> String {
    "disabled".to_string()
}
fn default_model() -> String {
    "gpt-4o-mini".to_string()
}
fn default_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}
fn default_api_key_env() -> String {
    "OPENAI_API_KEY".to_string()
}
fn default_timeout_secs() -> u64 {
    60
}
fn default_temperature() -> f32 {
    0.2
}

impl LlmConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    parse_config(&content)
}

/// Parse and validate configuration from a TOML string.
pub fn parse_config(content: &str) -> Result<Config> {
    let config: Config = toml::from_str(content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

fn validate(config: &Config) -> Result<()> {
    if config.ingest.dpi == 0 {
        bail!("ingest.dpi must be > 0");
    }

    if config.retrieval.top_k == 0 {
        bail!("retrieval.top_k must be >= 1");
    }
    if config.retrieval.window == 0 {
        bail!("retrieval.window must be >= 1");
    }
    if config.retrieval.min_overlap == 0 {
        bail!("retrieval.min_overlap must be >= 1");
    }

    let currency = &config.catalog.default_currency;
    if currency.len() != 3 || !currency.chars().all(|c| c.is_ascii_alphabetic()) {
        bail!(
            "catalog.default_currency must be a 3-letter code, got '{}'",
            currency
        );
    }

    match config.llm.provider.as_str() {
        "disabled" | "openai" => {}
        other => bail!(
            "Unknown llm provider: '{}'. Must be disabled or openai.",
            other
        ),
    }
    if config.llm.timeout_secs == 0 {
        bail!("llm.timeout_secs must be > 0");
    }
    if !(0.0..=2.0).contains(&config.llm.temperature) {
        bail!("llm.temperature must be in [0.0, 2.0]");
    }

    Ok(())
}
