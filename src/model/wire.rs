//! Wire types mirroring the partitioning service's JSON.
//!
//! These structs are deliberately loose: every field is optional and unknown
//! keys are preserved through `#[serde(flatten)]`, so the enrichment stage can
//! read, modify and rewrite a partition file without dropping anything the
//! service emitted. Later stages never touch these types directly; they go
//! through the validating parse in [`super::element`] first.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use flate2::read::{GzDecoder, ZlibDecoder};
use flate2::write::ZlibEncoder;
use flate2::Compression;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::io::{Read, Write};

/// One element (or chunk) exactly as the service serialises it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawElement {
    #[serde(rename = "type", default)]
    pub element_type: String,

    #[serde(default)]
    pub element_id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,

    #[serde(default)]
    pub metadata: RawMetadata,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_number: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coordinates: Option<RawCoordinates>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_base64: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_mime_type: Option<String>,

    /// Written by the enrichment stage; its presence marks an image as done.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_description: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub orig_elements: Option<OrigElements>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawCoordinates {
    #[serde(default)]
    pub points: Vec<(f64, f64)>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub layout_width: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub layout_height: Option<f64>,
}

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// The constituent elements of a chunk.
///
/// The chunking service ships them as `base64(zlib(json array))`. Gzip
/// payloads (leading `1f 8b`) are also read, and files produced by hand or by
/// older tooling may inline the array instead.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OrigElements {
    Encoded(String),
    Inline(Vec<RawElement>),
}

impl OrigElements {
    /// Compress and encode `elements` the way the chunking service does.
    pub fn encode(elements: &[RawElement]) -> Result<Self, String> {
        let json = serde_json::to_vec(elements).map_err(|e| e.to_string())?;
        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(&json).map_err(|e| e.to_string())?;
        let compressed = encoder.finish().map_err(|e| e.to_string())?;
        Ok(OrigElements::Encoded(STANDARD.encode(compressed)))
    }

    /// Decode to the element list regardless of representation.
    pub fn decode(&self) -> Result<Vec<RawElement>, String> {
        match self {
            OrigElements::Inline(elements) => Ok(elements.clone()),
            OrigElements::Encoded(b64) => {
                let compressed = STANDARD
                    .decode(b64.trim())
                    .map_err(|e| format!("base64: {e}"))?;
                let mut json = Vec::new();
                if compressed.starts_with(&GZIP_MAGIC) {
                    GzDecoder::new(compressed.as_slice())
                        .read_to_end(&mut json)
                        .map_err(|e| format!("gzip: {e}"))?;
                } else {
                    ZlibDecoder::new(compressed.as_slice())
                        .read_to_end(&mut json)
                        .map_err(|e| format!("zlib: {e}"))?;
                }
                serde_json::from_slice(&json).map_err(|e| format!("json: {e}"))
            }
        }
    }
}

impl RawElement {
    /// Whether this element already carries a non-empty image description.
    pub fn has_description(&self) -> bool {
        self.metadata
            .image_description
            .as_deref()
            .is_some_and(|d| !d.trim().is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "type": "Image",
        "element_id": "img-1",
        "text": "",
        "metadata": {
            "page_number": 2,
            "filename": "manual.pdf",
            "coordinates": {
                "points": [[10.0, 20.0], [10.0, 80.0], [90.0, 80.0], [90.0, 20.0]],
                "system": "PixelSpace",
                "layout_width": 1700,
                "layout_height": 2200
            },
            "image_base64": "AAAA",
            "image_mime_type": "image/png"
        }
    }"#;

    #[test]
    fn unknown_keys_survive_rewrite() {
        let raw: RawElement = serde_json::from_str(SAMPLE).expect("parse");
        assert_eq!(
            raw.metadata.extra.get("filename"),
            Some(&Value::String("manual.pdf".into()))
        );
        let back = serde_json::to_value(&raw).expect("serialise");
        assert_eq!(back["metadata"]["filename"], "manual.pdf");
        assert_eq!(back["metadata"]["coordinates"]["points"][2][0], 90.0);
        assert!(back["metadata"].get("image_description").is_none());
    }

    #[test]
    fn has_description_ignores_blank() {
        let mut raw: RawElement = serde_json::from_str(SAMPLE).expect("parse");
        assert!(!raw.has_description());
        raw.metadata.image_description = Some("   ".into());
        assert!(!raw.has_description());
        raw.metadata.image_description = Some("A logo: acme".into());
        assert!(raw.has_description());
    }

    #[test]
    fn encoded_orig_elements_decode() {
        let inner = vec![RawElement {
            element_type: "Title".into(),
            element_id: "t1".into(),
            text: Some("Intro".into()),
            ..Default::default()
        }];
        let encoded = OrigElements::encode(&inner).expect("encode");
        assert!(matches!(encoded, OrigElements::Encoded(_)));
        assert_eq!(encoded.decode().expect("decode"), inner);
    }

    /// `base64(zlib.compress(json))` as the hosted chunker writes it.
    const SERVICE_ORIG_ELEMENTS: &str = "eJyFjsEKwjAQRH8l7Ln01JM3f8BTbiJlJVMJJGuMm9JS8u82XkQ8eJw3MG/OG+maQAdD1msAdYYQECE6etewDo0pFm3pmBLE+aWxCGXHyjvfKPENo5R4Rd7zsNeTDxCO7+3IUjj0yU1Ua2c+0hPnzOpn2Cb4kcuX3N7zo8DMHAqe/b8LtV5em+ZHKA==";

    #[test]
    fn service_zlib_orig_elements_decode() {
        let decoded = OrigElements::Encoded(SERVICE_ORIG_ELEMENTS.into())
            .decode()
            .expect("decode");
        assert_eq!(decoded.len(), 2);
        assert_eq!(decoded[0].element_id, "t4");
        assert_eq!(decoded[0].metadata.page_number, Some(4));
        assert_eq!(
            decoded[0].metadata.extra.get("filename"),
            Some(&Value::String("manual.pdf".into()))
        );
    }

    #[test]
    fn local_encoding_matches_service_format() {
        let OrigElements::Encoded(b64) = OrigElements::encode(&[]).expect("encode") else {
            panic!("expected encoded form");
        };
        let bytes = STANDARD.decode(b64).expect("base64");
        // zlib header: CMF 0x78
        assert_eq!(bytes[0], 0x78);
    }

    #[test]
    fn gzip_orig_elements_still_decode() {
        use flate2::write::GzEncoder;

        let inner = vec![RawElement {
            element_type: "ListItem".into(),
            element_id: "l1".into(),
            ..Default::default()
        }];
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder
            .write_all(&serde_json::to_vec(&inner).unwrap())
            .unwrap();
        let b64 = STANDARD.encode(encoder.finish().unwrap());
        assert_eq!(OrigElements::Encoded(b64).decode().unwrap(), inner);
    }

    #[test]
    fn garbage_orig_elements_report_stage() {
        let err = OrigElements::Encoded("not base64!!".into())
            .decode()
            .unwrap_err();
        assert!(err.starts_with("base64"), "got: {err}");
    }
}
