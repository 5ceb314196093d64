//! Data model: what the partitioner and chunker hand us, and what the rest
//! of the pipeline works on.
//!
//! ```text
//! JSON file ──▶ wire::RawElement ──▶ parse ──▶ Element / Chunk
//!               (loose, lossless)             (closed, validated)
//! ```
//!
//! Enrichment edits [`RawElement`]s so it can rewrite partition files without
//! loss. Reconstruction and annotation only ever see validated [`Element`]s
//! and [`Chunk`]s, so they never re-check whether a key is present.

pub mod chunk;
pub mod element;
pub mod wire;

pub use chunk::{parse_chunks, Chunk};
pub use element::{
    parse_elements, Category, Coordinates, Element, ElementKind, EmbeddedImage, Figure, MimeType,
    Parsed, Point,
};
pub use wire::{OrigElements, RawCoordinates, RawElement, RawMetadata};

use crate::error::IngestError;
use crate::store;
use std::path::Path;

/// Read and validate a partition file.
pub fn load_elements(path: &Path) -> Result<Parsed<Element>, IngestError> {
    let raw = store::read_raw(path)?;
    Ok(parse_elements(&raw))
}

/// Read and validate a chunk file.
pub fn load_chunks(path: &Path) -> Result<Parsed<Chunk>, IngestError> {
    let raw = store::read_raw(path)?;
    Ok(parse_chunks(&raw))
}
