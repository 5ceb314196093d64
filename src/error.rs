//! Error types for the pdf-ingest library.
//!
//! Three error types reflect three failure scopes:
//!
//! * [`IngestError`]: **Fatal for one unit of work**: a task cannot start
//!   (bad directory, missing credentials) or one document / page cannot be
//!   processed (partitioning call failed, malformed JSON, raster failure).
//!   The batch loop in [`crate::batch`] catches it, records it in the
//!   [`crate::output::BatchReport`] and moves on to the next document.
//!
//! * [`ElementFault`]: **Non-fatal, per item**: an element or chunk carried
//!   malformed metadata. The item is still rendered with fallback text and
//!   the fault is returned next to the output so callers can report it.
//!
//! * [`PageFault`]: **Non-fatal, per annotated page**: one page of the
//!   bounding-box overlay failed; the remaining pages are still drawn.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that abort one task, one document or one page.
#[derive(Debug, Error)]
pub enum IngestError {
    // ── Configuration / environment ───────────────────────────────────────
    /// A configured directory does not exist or is not a directory.
    #[error("Directory '{path}' does not exist or is not a directory")]
    InvalidDirectory { path: PathBuf },

    /// A credential needed by a collaborator is not set.
    #[error("Missing credential '{name}'\n{hint}")]
    MissingCredential { name: String, hint: String },

    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// The configured vision provider could not be created.
    #[error("LLM provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("File not found: '{path}'")]
    FileNotFound { path: PathBuf },

    /// The file exists but is not a PDF.
    #[error("File is not a valid PDF: '{path}'\nFirst bytes: {magic:?}")]
    NotAPdf { path: PathBuf, magic: [u8; 4] },

    /// A stage artifact could not be read.
    #[error("Failed to read '{path}': {source}")]
    ReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A stage artifact is not the JSON shape we expect.
    #[error("Malformed JSON in '{path}': {detail}")]
    MalformedJson { path: PathBuf, detail: String },

    // ── Collaborator errors ───────────────────────────────────────────────
    /// The partitioning service could not be reached or rejected the request.
    #[error("Partitioning failed for '{path}': {reason}")]
    PartitionFailed { path: PathBuf, reason: String },

    /// The vision model returned an error or an empty description.
    #[error("Image summarisation failed: {message}")]
    SummaryFailed { message: String },

    /// pdfium could not be bound or could not open the document.
    #[error("Could not open '{path}' for rendering: {detail}")]
    PdfOpenFailed { path: PathBuf, detail: String },

    /// pdfium returned an error for a specific page.
    #[error("Rasterisation failed for page {page}: {detail}")]
    RasterisationFailed { page: u32, detail: String },

    /// Encoding or drawing of an annotated page failed.
    #[error("Image encoding failed for '{path}': {detail}")]
    ImageEncodeFailed { path: PathBuf, detail: String },

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create or write an output artifact.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A non-fatal fault attached to one element or chunk.
///
/// Produced by the validating parse in [`crate::model`] and by the
/// reconstructor; the offending item is still rendered.
#[derive(Debug, Clone, PartialEq, Eq, Error, serde::Serialize, serde::Deserialize)]
pub enum ElementFault {
    /// The element carried no `page_number`; it was placed on `assumed_page`.
    #[error("Element {id}: missing page number, assumed page {assumed_page}")]
    MissingPageNumber { id: String, assumed_page: u32 },

    /// The element's coordinates were absent or had no points.
    #[error("Element {id}: missing coordinates")]
    MissingCoordinates { id: String },

    /// The coordinate space had a zero width or height.
    #[error("Element {id}: degenerate layout space {width}x{height}")]
    DegenerateLayout { id: String, width: u64, height: u64 },

    /// An image payload declared no MIME type; `image/jpeg` was assumed.
    #[error("Element {id}: image payload without MIME type")]
    MissingMimeType { id: String },

    /// A chunk carried no original elements, so its page is unknown.
    #[error("Chunk {id}: no original elements")]
    EmptyChunk { id: String },

    /// `orig_elements` could not be decoded.
    #[error("Chunk {id}: undecodable orig_elements: {detail}")]
    UndecodableOrigElements { id: String, detail: String },

    /// The input went back to a page it had already left.
    #[error("Item {id}: page {page} follows page {previous}; page regrouped")]
    PageRegression { id: String, page: u32, previous: u32 },
}

/// A non-fatal fault for one annotated page.
#[derive(Debug, Clone, Error, serde::Serialize, serde::Deserialize)]
pub enum PageFault {
    /// The page could not be rasterised, drawn or written.
    #[error("Page {page}: annotation failed: {detail}")]
    AnnotationFailed { page: u32, detail: String },
}
