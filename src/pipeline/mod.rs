//! Pipeline stages for PDF ingestion.
//!
//! Each submodule implements exactly one step. The collaborators that talk
//! to the outside world (partitioning API, vision model, pdfium) sit behind
//! traits so the stages around them can be tested with fakes.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ partition ──▶ enrich ──▶ chunk ──▶ export
//! (*.pdf)   (HTTP API)    (VLM)      (by title) (05_output)
//!               │                      │
//!               ├──▶ annotate          └──▶ reconstruct (04_markdown)
//!               │    (pdfium + overlay)
//!               └──▶ reconstruct (03_markdown)
//! ```
//!
//! 1. [`input`]: find PDFs and chunk files, check magic bytes
//! 2. [`partition`]: [`partition::Partitioner`], Unstructured-compatible client
//! 3. [`enrich`]: describe undescribed images, checkpointing after each
//! 4. [`summarize`]: [`summarize::ImageSummarizer`], vision-model client
//! 5. [`chunk`]: [`chunk::Chunker`], local `by_title` chunker
//! 6. [`export`]: flatten chunks for downstream consumers
//! 7. [`reconstruct`]: page-ordered Markdown from elements or chunks
//! 8. [`annotate`]: bounding-box overlays on rasterised pages
//! 9. [`render`]: [`render::PageRasterizer`], pdfium rasteriser
//!
//! [`encode`] turns an inline payload into a vision-model image part.

pub mod annotate;
pub mod chunk;
pub mod encode;
pub mod enrich;
pub mod export;
pub mod input;
pub mod partition;
pub mod reconstruct;
pub mod render;
pub mod summarize;
