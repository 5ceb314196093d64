//! # pdf-ingest
//!
//! Turn a directory of PDFs into paginated, navigable Markdown with
//! annotated page imagery.
//!
//! ## Why this crate?
//!
//! Layout-aware partitioners return a document as a flat list of typed
//! elements (titles, paragraphs, list items, tables, images) with a page
//! number and a bounding polygon each. That list is great for retrieval but
//! impossible to eyeball. This crate drives the partitioner, describes every
//! image with a vision model, chunks by title, and then rebuilds the document
//! as page-ordered Markdown plus one annotated JPEG per page, so you can see
//! exactly what was extracted and where.
//!
//! ## Pipeline Overview
//!
//! ```text
//! PDF
//!  │
//!  ├─ 1. Partition  Unstructured-compatible API → 01_partitioned/<name>.json
//!  ├─ 2. Enrich     vision summaries for images, checkpointed per image
//!  ├─ 3. Chunk      by title → 02_chunked/<name>.json
//!  ├─ 4. Export     flattened chunks → 05_output/<name>_output.json
//!  ├─ 5. Markdown   elements → 03_markdown/<name>.md
//!  ├─ 6. Annotate   polygons over pdfium rasters → 02_bounding_boxes/ (spawn_blocking)
//!  └─ 7. Debug      chunks → collapsible 04_markdown/<name>.md
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use pdf_ingest::batch::{ingest_pdfs, Collaborators};
//! use pdf_ingest::pipeline::{
//!     chunk::TitleChunker, partition::UnstructuredClient, render::PdfiumEngine,
//!     summarize::VisionSummarizer,
//! };
//! use pdf_ingest::{NoopProgressCallback, PipelineConfig};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = PipelineConfig::builder()
//!         .input_dir("pdfs")
//!         .output_dir("out")
//!         .unstructured_api_key(std::env::var("UNSTRUCTURED_API_KEY")?)
//!         .build()?;
//!
//!     let partitioner = UnstructuredClient::new(&config)?;
//!     let summarizer = VisionSummarizer::from_config(&config)?;
//!     let chunker = TitleChunker::from_config(&config);
//!     let engine = PdfiumEngine::bind(config.pdfium_lib_path.as_deref(), config.max_rendered_pixels)?;
//!
//!     let collaborators = Collaborators {
//!         partitioner: &partitioner,
//!         summarizer: &summarizer,
//!         chunker: &chunker,
//!         rasterizers: Arc::new(engine),
//!     };
//!     let report = ingest_pdfs(&config, collaborators, &NoopProgressCallback).await?;
//!     eprintln!("{} ok, {} failed", report.succeeded(), report.failed());
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `pdf-ingest` binary (clap + anyhow + tracing-subscriber) |

// ── Modules ──────────────────────────────────────────────────────────────

pub mod batch;
pub mod config;
pub mod error;
pub mod model;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod prompts;
pub mod store;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use batch::{create_debugging_markdown, ingest_pdfs, Collaborators};
pub use config::{OutputLayout, OverwritePolicy, PartitionStrategy, PipelineConfig, PipelineConfigBuilder};
pub use error::{ElementFault, IngestError, PageFault};
pub use model::{Category, Chunk, Element, ElementKind, RawElement};
pub use output::{BatchReport, DocumentOutcome, DocumentSummary};
pub use pipeline::reconstruct::{reconstruct, PageItem, Reconstruction};
pub use progress::{BatchProgressCallback, NoopProgressCallback, ProgressCallback, Stage};
