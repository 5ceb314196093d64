//! Flattened chunk export (`05_output/<name>_output.json`).
//!
//! Consumers of the export (retrieval indexers, spreadsheets) get each chunk
//! with its constituent elements already decoded, so they never need to know
//! about the compressed `orig_elements` wire format.

use crate::error::ElementFault;
use crate::model::{Parsed, RawCoordinates, RawElement};
use serde::{Deserialize, Serialize};
use tracing::warn;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportedChunk {
    pub id: String,
    pub text: String,
    #[serde(rename = "type")]
    pub chunk_type: String,
    /// `None` when the chunk carried no decodable originals.
    pub orig_elements: Option<Vec<ExportedElement>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportedElement {
    pub id: String,
    #[serde(rename = "type")]
    pub element_type: String,
    pub coordinates: Option<RawCoordinates>,
    pub text: Option<String>,
    pub page_number: Option<u32>,
    /// Present for Image and Table elements only.
    #[serde(flatten, default, skip_serializing_if = "Option::is_none")]
    pub figure: Option<FigurePayload>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FigurePayload {
    pub image: Option<String>,
    pub image_mime_type: Option<String>,
}

fn export_element(raw: RawElement) -> ExportedElement {
    let figure = matches!(raw.element_type.as_str(), "Image" | "Table").then(|| FigurePayload {
        image: raw.metadata.image_base64.clone(),
        image_mime_type: raw.metadata.image_mime_type.clone(),
    });
    ExportedElement {
        id: raw.element_id,
        element_type: raw.element_type,
        coordinates: raw.metadata.coordinates,
        text: raw.text,
        page_number: raw.metadata.page_number,
        figure,
    }
}

/// Flatten a chunk file for export.
pub fn export_chunks(chunks: &[RawElement]) -> Parsed<ExportedChunk> {
    let mut faults = Vec::new();
    let items = chunks
        .iter()
        .map(|chunk| {
            let orig_elements = chunk.metadata.orig_elements.as_ref().and_then(|o| match o.decode() {
                Ok(elements) => Some(elements.into_iter().map(export_element).collect()),
                Err(detail) => {
                    warn!("Chunk {}: cannot decode orig_elements: {}", chunk.element_id, detail);
                    faults.push(ElementFault::UndecodableOrigElements {
                        id: chunk.element_id.clone(),
                        detail,
                    });
                    None
                }
            });
            ExportedChunk {
                id: chunk.element_id.clone(),
                text: chunk.text.clone().unwrap_or_default(),
                chunk_type: chunk.element_type.clone(),
                orig_elements,
            }
        })
        .collect();

    Parsed { items, faults }
}
