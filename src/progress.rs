//! Progress-callback trait for batch events.
//!
//! Pass any [`BatchProgressCallback`] into [`crate::batch::ingest_pdfs`] or
//! [`crate::batch::create_debugging_markdown`] to receive events as documents
//! move through the stages. The CLI implements it with `indicatif`; library
//! callers can forward events anywhere without the pipeline knowing how.
//!
//! # Example
//!
//! ```rust
//! use pdf_ingest::BatchProgressCallback;
//! use std::sync::atomic::{AtomicUsize, Ordering};
//!
//! #[derive(Default)]
//! struct CountImages(AtomicUsize);
//!
//! impl BatchProgressCallback for CountImages {
//!     fn on_image_summarised(&self, _document: &str, _done: usize, _total: usize) {
//!         self.0.fetch_add(1, Ordering::SeqCst);
//!     }
//! }
//! ```

use std::fmt;
use std::sync::Arc;

/// Stages a document passes through during ingestion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Partition,
    Enrich,
    Chunk,
    Export,
    Annotate,
    Markdown,
    DebugMarkdown,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Stage::Partition => "partitioning",
            Stage::Enrich => "summarising images",
            Stage::Chunk => "chunking",
            Stage::Export => "exporting chunks",
            Stage::Annotate => "annotating pages",
            Stage::Markdown => "writing markdown",
            Stage::DebugMarkdown => "writing debug markdown",
        };
        f.write_str(s)
    }
}

/// Called by the batch runners as they process each document.
///
/// Partitioning runs several documents at once, so implementations must be
/// `Send + Sync` and may see events for different documents interleaved.
/// All methods default to no-ops.
pub trait BatchProgressCallback: Send + Sync {
    /// Called once with the number of documents found.
    fn on_batch_start(&self, total_documents: usize) {
        let _ = total_documents;
    }

    /// A document entered `stage`.
    fn on_stage(&self, document: &str, stage: Stage) {
        let _ = (document, stage);
    }

    /// One image of `document` was described and persisted.
    fn on_image_summarised(&self, document: &str, done: usize, total: usize) {
        let _ = (document, done, total);
    }

    /// An Image element carried no payload and cannot be summarised.
    fn on_image_skipped(&self, document: &str, element_id: &str) {
        let _ = (document, element_id);
    }

    /// A stage output already existed and was left alone.
    fn on_document_skipped(&self, document: &str, stage: Stage) {
        let _ = (document, stage);
    }

    fn on_document_complete(&self, document: &str) {
        let _ = document;
    }

    /// `document` failed; the batch continues with the next one.
    fn on_document_error(&self, document: &str, error: &str) {
        let _ = (document, error);
    }

    fn on_batch_complete(&self, succeeded: usize, failed: usize) {
        let _ = (succeeded, failed);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl BatchProgressCallback for NoopProgressCallback {}

pub type ProgressCallback = Arc<dyn BatchProgressCallback>;
