//! Image payloads → `ImageData` for the vision API.
//!
//! The partitioner already ships every figure as base64, so no re-encoding is
//! needed on the way out; only the payload is checked for being decodable so
//! a corrupt element fails locally instead of as an opaque provider error.
//! `detail: "high"` keeps small print inside diagrams legible to the model.

use crate::error::IngestError;
use crate::model::MimeType;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use edgequake_llm::ImageData;
use tracing::debug;

/// Wrap an inline payload for a multimodal request.
pub fn encode_payload(image_base64: &str, mime: &MimeType) -> Result<ImageData, IngestError> {
    let trimmed = image_base64.trim();
    let bytes = STANDARD
        .decode(trimmed)
        .map_err(|e| IngestError::SummaryFailed {
            message: format!("image payload is not valid base64: {e}"),
        })?;
    if bytes.is_empty() {
        return Err(IngestError::SummaryFailed {
            message: "image payload is empty".to_string(),
        });
    }
    debug!("Image payload: {} bytes ({})", bytes.len(), mime);

    Ok(ImageData::new(trimmed.to_string(), mime.as_str()).with_detail("high"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_payload_keeps_mime() {
        let data = encode_payload("iVBORw0KGgo=", &MimeType::new("image/png")).expect("encode");
        assert_eq!(data.mime_type, "image/png");
        assert_eq!(data.data, "iVBORw0KGgo=");
    }

    #[test]
    fn garbage_payload_is_rejected() {
        let err = encode_payload("***", &MimeType::default()).unwrap_err();
        assert!(matches!(err, IngestError::SummaryFailed { .. }));
    }
}
