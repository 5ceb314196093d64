//! Configuration types for the ingestion pipeline.
//!
//! All pipeline behaviour is controlled through [`PipelineConfig`], built via
//! its [`PipelineConfigBuilder`] and passed by reference into every stage's
//! entry point. There is no process-wide settings object: two batches with
//! different output directories can run side by side in one process.
//!
//! [`OutputLayout`] derives every on-disk artifact path from `output_dir`, so
//! the stage directory names live in exactly one place.

use crate::error::IngestError;
use edgequake_llm::LLMProvider;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Default endpoint of the hosted partitioning API.
pub const DEFAULT_UNSTRUCTURED_URL: &str = "https://api.unstructuredapp.io/general/v0/general";

/// Default vision model used for image summaries.
pub const DEFAULT_VISION_MODEL: &str = "gpt-4o";

/// Configuration for an ingestion run.
///
/// # Example
/// ```rust
/// use pdf_ingest::PipelineConfig;
///
/// let config = PipelineConfig::builder()
///     .input_dir("pdfs")
///     .output_dir("out")
///     .chunk_max_characters(1200)
///     .build()
///     .unwrap();
/// assert_eq!(config.chunk_overlap, 150);
/// ```
#[derive(Clone)]
pub struct PipelineConfig {
    /// Directory scanned for `*.pdf` inputs.
    pub input_dir: PathBuf,

    /// Root of the per-stage output directories (see [`OutputLayout`]).
    pub output_dir: PathBuf,

    /// Partitioning endpoint. Default: [`DEFAULT_UNSTRUCTURED_URL`].
    pub unstructured_url: String,

    /// API key sent as the `unstructured-api-key` header.
    pub unstructured_api_key: Option<String>,

    /// Partitioning strategy. Default: [`PartitionStrategy::HiRes`].
    ///
    /// Only `hi_res` returns element coordinates precise enough for the
    /// bounding-box overlay and inline image payloads.
    pub strategy: PartitionStrategy,

    /// Element types whose raster is inlined as base64. Default: `Image`, `Table`.
    pub extract_image_block_types: Vec<String>,

    /// Page-split concurrency requested from the partitioner. Default: 15.
    pub split_pdf_concurrency: usize,

    /// Documents partitioned at once. Default: 3.
    pub partition_workers: usize,

    /// Per-document partitioning timeout in seconds. Default: 300.
    pub partition_timeout_secs: u64,

    /// Soft upper bound on chunk text length. Default: 1500.
    pub chunk_max_characters: usize,

    /// Characters carried over when an oversized element is split. Default: 150.
    pub chunk_overlap: usize,

    /// Vision model identifier. If None, [`DEFAULT_VISION_MODEL`].
    pub model: Option<String>,

    /// LLM provider name (e.g. "openai", "anthropic", "ollama").
    pub provider_name: Option<String>,

    /// Pre-constructed LLM provider. Takes precedence over `provider_name`.
    pub provider: Option<Arc<dyn LLMProvider>>,

    /// Token budget for one image description. Default: 300.
    pub summary_max_tokens: usize,

    /// Sampling temperature for image descriptions. Default: 0.2.
    pub temperature: f32,

    /// Retries per image on a failed summary call. Default: 0.
    ///
    /// A failed image is simply left without a description; re-running the
    /// batch picks it up again, so automatic retries are opt-in.
    pub max_retries: u32,

    /// Initial retry delay in milliseconds, doubled per attempt. Default: 500.
    pub retry_backoff_ms: u64,

    /// Custom summary prompt. If None, uses [`crate::prompts::IMAGE_SUMMARY_PROMPT`].
    pub system_prompt: Option<String>,

    /// Longest edge of a rasterised page, in pixels. Default: 2000.
    pub max_rendered_pixels: u32,

    /// Outline thickness of annotation polygons. Range 1–10. Default: 2.
    pub line_thickness: u32,

    /// TrueType font used for legend labels. Without one, the legend shows
    /// colour swatches only.
    pub legend_font: Option<PathBuf>,

    /// Explicit pdfium library path; otherwise the system library is used.
    pub pdfium_lib_path: Option<PathBuf>,

    /// What to do with markdown outputs that already exist. Default: Skip.
    pub overwrite: OverwritePolicy,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            input_dir: PathBuf::from("input"),
            output_dir: PathBuf::from("output"),
            unstructured_url: DEFAULT_UNSTRUCTURED_URL.to_string(),
            unstructured_api_key: None,
            strategy: PartitionStrategy::default(),
            extract_image_block_types: vec!["Image".to_string(), "Table".to_string()],
            split_pdf_concurrency: 15,
            partition_workers: 3,
            partition_timeout_secs: 300,
            chunk_max_characters: 1500,
            chunk_overlap: 150,
            model: None,
            provider_name: None,
            provider: None,
            summary_max_tokens: 300,
            temperature: 0.2,
            max_retries: 0,
            retry_backoff_ms: 500,
            system_prompt: None,
            max_rendered_pixels: 2000,
            line_thickness: 2,
            legend_font: None,
            pdfium_lib_path: None,
            overwrite: OverwritePolicy::default(),
        }
    }
}

impl fmt::Debug for PipelineConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PipelineConfig")
            .field("input_dir", &self.input_dir)
            .field("output_dir", &self.output_dir)
            .field("unstructured_url", &self.unstructured_url)
            .field(
                "unstructured_api_key",
                &self.unstructured_api_key.as_ref().map(|_| "<redacted>"),
            )
            .field("strategy", &self.strategy)
            .field("partition_workers", &self.partition_workers)
            .field("chunk_max_characters", &self.chunk_max_characters)
            .field("chunk_overlap", &self.chunk_overlap)
            .field("model", &self.model)
            .field("provider_name", &self.provider_name)
            .field("provider", &self.provider.as_ref().map(|_| "<dyn LLMProvider>"))
            .field("summary_max_tokens", &self.summary_max_tokens)
            .field("max_retries", &self.max_retries)
            .field("max_rendered_pixels", &self.max_rendered_pixels)
            .field("overwrite", &self.overwrite)
            .finish()
    }
}

impl PipelineConfig {
    /// Create a new builder for `PipelineConfig`.
    pub fn builder() -> PipelineConfigBuilder {
        PipelineConfigBuilder {
            config: Self::default(),
        }
    }

    /// Artifact paths under `output_dir`.
    pub fn layout(&self) -> OutputLayout {
        OutputLayout::new(&self.output_dir)
    }

    /// The vision model to use, falling back to [`DEFAULT_VISION_MODEL`].
    pub fn vision_model(&self) -> &str {
        self.model.as_deref().unwrap_or(DEFAULT_VISION_MODEL)
    }

    /// Fail fast when the input directory is unusable.
    pub fn check_input_dir(&self) -> Result<(), IngestError> {
        if self.input_dir.is_dir() {
            Ok(())
        } else {
            Err(IngestError::InvalidDirectory {
                path: self.input_dir.clone(),
            })
        }
    }

    /// The partitioning API key, or a [`IngestError::MissingCredential`].
    pub fn require_unstructured_key(&self) -> Result<&str, IngestError> {
        self.unstructured_api_key
            .as_deref()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| IngestError::MissingCredential {
                name: "UNSTRUCTURED_API_KEY".to_string(),
                hint: "Set UNSTRUCTURED_API_KEY in the environment or in a .env file.".to_string(),
            })
    }
}

/// Builder for [`PipelineConfig`].
#[derive(Debug)]
pub struct PipelineConfigBuilder {
    config: PipelineConfig,
}

impl PipelineConfigBuilder {
    pub fn input_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.input_dir = dir.into();
        self
    }

    pub fn output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.output_dir = dir.into();
        self
    }

    pub fn unstructured_url(mut self, url: impl Into<String>) -> Self {
        self.config.unstructured_url = url.into();
        self
    }

    pub fn unstructured_api_key(mut self, key: impl Into<String>) -> Self {
        self.config.unstructured_api_key = Some(key.into());
        self
    }

    pub fn strategy(mut self, strategy: PartitionStrategy) -> Self {
        self.config.strategy = strategy;
        self
    }

    pub fn extract_image_block_types(mut self, types: Vec<String>) -> Self {
        self.config.extract_image_block_types = types;
        self
    }

    pub fn split_pdf_concurrency(mut self, n: usize) -> Self {
        self.config.split_pdf_concurrency = n.max(1);
        self
    }

    pub fn partition_workers(mut self, n: usize) -> Self {
        self.config.partition_workers = n.max(1);
        self
    }

    pub fn partition_timeout_secs(mut self, secs: u64) -> Self {
        self.config.partition_timeout_secs = secs;
        self
    }

    pub fn chunk_max_characters(mut self, n: usize) -> Self {
        self.config.chunk_max_characters = n;
        self
    }

    pub fn chunk_overlap(mut self, n: usize) -> Self {
        self.config.chunk_overlap = n;
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = Some(model.into());
        self
    }

    pub fn provider_name(mut self, name: impl Into<String>) -> Self {
        self.config.provider_name = Some(name.into());
        self
    }

    pub fn provider(mut self, provider: Arc<dyn LLMProvider>) -> Self {
        self.config.provider = Some(provider);
        self
    }

    pub fn summary_max_tokens(mut self, n: usize) -> Self {
        self.config.summary_max_tokens = n;
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn max_retries(mut self, n: u32) -> Self {
        self.config.max_retries = n;
        self
    }

    pub fn retry_backoff_ms(mut self, ms: u64) -> Self {
        self.config.retry_backoff_ms = ms;
        self
    }

    pub fn system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.config.system_prompt = Some(prompt.into());
        self
    }

    pub fn max_rendered_pixels(mut self, px: u32) -> Self {
        self.config.max_rendered_pixels = px.max(100);
        self
    }

    pub fn line_thickness(mut self, px: u32) -> Self {
        self.config.line_thickness = px;
        self
    }

    pub fn legend_font(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.legend_font = Some(path.into());
        self
    }

    pub fn pdfium_lib_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.pdfium_lib_path = Some(path.into());
        self
    }

    pub fn overwrite(mut self, policy: OverwritePolicy) -> Self {
        self.config.overwrite = policy;
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<PipelineConfig, IngestError> {
        let c = &self.config;
        if c.chunk_max_characters == 0 {
            return Err(IngestError::InvalidConfig(
                "chunk_max_characters must be ≥ 1".into(),
            ));
        }
        if c.chunk_overlap >= c.chunk_max_characters {
            return Err(IngestError::InvalidConfig(format!(
                "chunk_overlap ({}) must be smaller than chunk_max_characters ({})",
                c.chunk_overlap, c.chunk_max_characters
            )));
        }
        if !(1..=10).contains(&c.line_thickness) {
            return Err(IngestError::InvalidConfig(format!(
                "line_thickness must be 1–10, got {}",
                c.line_thickness
            )));
        }
        if c.summary_max_tokens == 0 {
            return Err(IngestError::InvalidConfig(
                "summary_max_tokens must be ≥ 1".into(),
            ));
        }
        Ok(self.config)
    }
}

// ── Enums ────────────────────────────────────────────────────────────────

/// Partitioning strategy passed to the extraction service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PartitionStrategy {
    Fast,
    /// Layout-model partitioning with coordinates and image payloads. (default)
    #[default]
    HiRes,
    Auto,
    OcrOnly,
}

impl PartitionStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            PartitionStrategy::Fast => "fast",
            PartitionStrategy::HiRes => "hi_res",
            PartitionStrategy::Auto => "auto",
            PartitionStrategy::OcrOnly => "ocr_only",
        }
    }
}

/// What a markdown stage does when its output file already exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum OverwritePolicy {
    /// Leave the existing file alone and report the document as skipped. (default)
    #[default]
    Skip,
    /// Regenerate and replace the file.
    Overwrite,
}

// ── Output layout ────────────────────────────────────────────────────────

/// Per-stage artifact paths, keyed by document base name.
///
/// ```text
/// <output_dir>/01_partitioned/<name>.json
/// <output_dir>/02_chunked/<name>.json
/// <output_dir>/02_bounding_boxes/<name>-<page>-annotated.jpg
/// <output_dir>/03_markdown/<name>.md
/// <output_dir>/04_markdown/<name>.md
/// <output_dir>/05_output/<name>_output.json
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputLayout {
    root: PathBuf,
}

impl OutputLayout {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn partitioned_dir(&self) -> PathBuf {
        self.root.join("01_partitioned")
    }

    pub fn chunked_dir(&self) -> PathBuf {
        self.root.join("02_chunked")
    }

    pub fn bounding_boxes_dir(&self) -> PathBuf {
        self.root.join("02_bounding_boxes")
    }

    pub fn markdown_dir(&self) -> PathBuf {
        self.root.join("03_markdown")
    }

    pub fn debug_markdown_dir(&self) -> PathBuf {
        self.root.join("04_markdown")
    }

    pub fn export_dir(&self) -> PathBuf {
        self.root.join("05_output")
    }

    pub fn partitioned(&self, name: &str) -> PathBuf {
        self.partitioned_dir().join(format!("{name}.json"))
    }

    pub fn chunked(&self, name: &str) -> PathBuf {
        self.chunked_dir().join(format!("{name}.json"))
    }

    /// `page` is 1-based.
    pub fn annotated_page(&self, name: &str, page: u32) -> PathBuf {
        self.bounding_boxes_dir()
            .join(format!("{name}-{page}-annotated.jpg"))
    }

    pub fn markdown(&self, name: &str) -> PathBuf {
        self.markdown_dir().join(format!("{name}.md"))
    }

    pub fn debug_markdown(&self, name: &str) -> PathBuf {
        self.debug_markdown_dir().join(format!("{name}.md"))
    }

    pub fn exported(&self, name: &str) -> PathBuf {
        self.export_dir().join(format!("{name}_output.json"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let c = PipelineConfig::default();
        assert_eq!(c.chunk_max_characters, 1500);
        assert_eq!(c.chunk_overlap, 150);
        assert_eq!(c.partition_workers, 3);
        assert_eq!(c.summary_max_tokens, 300);
        assert_eq!(c.strategy.as_str(), "hi_res");
        assert_eq!(c.vision_model(), "gpt-4o");
    }

    #[test]
    fn overlap_must_be_below_max() {
        let err = PipelineConfig::builder()
            .chunk_max_characters(100)
            .chunk_overlap(100)
            .build()
            .unwrap_err();
        assert!(matches!(err, IngestError::InvalidConfig(_)));
    }

    #[test]
    fn line_thickness_is_validated() {
        assert!(PipelineConfig::builder().line_thickness(0).build().is_err());
        assert!(PipelineConfig::builder().line_thickness(3).build().is_ok());
    }

    #[test]
    fn missing_key_is_a_credential_error() {
        let c = PipelineConfig::default();
        assert!(matches!(
            c.require_unstructured_key(),
            Err(IngestError::MissingCredential { .. })
        ));
        let c = PipelineConfig::builder()
            .unstructured_api_key("k")
            .build()
            .unwrap();
        assert_eq!(c.require_unstructured_key().unwrap(), "k");
    }

    #[test]
    fn debug_redacts_api_key() {
        let c = PipelineConfig::builder()
            .unstructured_api_key("secret-key")
            .build()
            .unwrap();
        let dbg = format!("{c:?}");
        assert!(!dbg.contains("secret-key"));
        assert!(dbg.contains("<redacted>"));
    }

    #[test]
    fn layout_paths() {
        let l = OutputLayout::new("/out");
        assert_eq!(l.partitioned("doc"), PathBuf::from("/out/01_partitioned/doc.json"));
        assert_eq!(l.chunked("doc"), PathBuf::from("/out/02_chunked/doc.json"));
        assert_eq!(
            l.annotated_page("doc", 4),
            PathBuf::from("/out/02_bounding_boxes/doc-4-annotated.jpg")
        );
        assert_eq!(l.markdown("doc"), PathBuf::from("/out/03_markdown/doc.md"));
        assert_eq!(l.debug_markdown("doc"), PathBuf::from("/out/04_markdown/doc.md"));
        assert_eq!(l.exported("doc"), PathBuf::from("/out/05_output/doc_output.json"));
    }
}
