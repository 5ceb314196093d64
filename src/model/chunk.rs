//! Chunks: title-bounded groups of elements that keep their originals.

use super::element::{Element, ParseCursor, Parsed};
use super::wire::RawElement;
use crate::error::ElementFault;
use serde::Serialize;
use tracing::warn;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Chunk {
    pub id: String,
    pub text: String,
    /// Chunk type as emitted by the chunker (`CompositeElement`, `Table`, …).
    pub chunk_type: String,
    /// Constituent elements in extraction order.
    pub orig_elements: Vec<Element>,
}

impl Chunk {
    /// The page of the first constituent element.
    pub fn first_page(&self) -> Option<u32> {
        self.orig_elements.first().map(|e| e.page_number)
    }
}

/// Parse a chunk file. Page inheritance for elements without a page number
/// runs across chunk boundaries, in document order.
pub fn parse_chunks(raw: &[RawElement]) -> Parsed<Chunk> {
    let mut cursor = ParseCursor::default();
    let mut items = Vec::with_capacity(raw.len());

    for r in raw {
        let orig = match r.metadata.orig_elements.as_ref() {
            Some(encoded) => match encoded.decode() {
                Ok(elements) => elements,
                Err(detail) => {
                    warn!("Chunk {}: cannot decode orig_elements: {}", r.element_id, detail);
                    cursor.faults.push(ElementFault::UndecodableOrigElements {
                        id: r.element_id.clone(),
                        detail,
                    });
                    Vec::new()
                }
            },
            None => {
                cursor.faults.push(ElementFault::EmptyChunk {
                    id: r.element_id.clone(),
                });
                Vec::new()
            }
        };

        let orig_elements: Vec<Element> = orig.iter().map(|e| cursor.element(e)).collect();

        items.push(Chunk {
            id: r.element_id.clone(),
            text: r.text.clone().unwrap_or_default(),
            chunk_type: r.element_type.clone(),
            orig_elements,
        });
    }

    Parsed {
        items,
        faults: cursor.faults,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::wire::{OrigElements, RawMetadata};

    fn element(id: &str, page: u32) -> RawElement {
        RawElement {
            element_type: "NarrativeText".into(),
            element_id: id.into(),
            text: Some(format!("text {id}")),
            metadata: RawMetadata {
                page_number: Some(page),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    fn chunk(id: &str, orig: Option<OrigElements>) -> RawElement {
        RawElement {
            element_type: "CompositeElement".into(),
            element_id: id.into(),
            text: Some(format!("chunk {id}")),
            metadata: RawMetadata {
                orig_elements: orig,
                ..Default::default()
            },
            ..Default::default()
        }
    }

    #[test]
    fn encoded_and_inline_originals_parse() {
        let encoded = OrigElements::encode(&[element("a", 1), element("b", 2)]).expect("encode");
        let parsed = parse_chunks(&[
            chunk("c1", Some(encoded)),
            chunk("c2", Some(OrigElements::Inline(vec![element("c", 3)]))),
        ]);
        assert!(parsed.faults.is_empty());
        assert_eq!(parsed.items[0].orig_elements.len(), 2);
        assert_eq!(parsed.items[0].first_page(), Some(1));
        assert_eq!(parsed.items[1].first_page(), Some(3));
        assert_eq!(parsed.items[1].chunk_type, "CompositeElement");
    }

    #[test]
    fn service_encoded_originals_give_the_chunk_its_page() {
        // base64(zlib.compress(json)): Title "t4" and NarrativeText "n4" on page 4.
        let service = OrigElements::Encoded(
            "eJyFjsEKwjAQRH8l7Ln01JM3f8BTbiJlJVMJJGuMm9JS8u82XkQ8eJw3MG/OG+maQAdD1msAdYYQECE6etewDo0pFm3pmBLE+aWxCGXHyjvfKPENo5R4Rd7zsNeTDxCO7+3IUjj0yU1Ua2c+0hPnzOpn2Cb4kcuX3N7zo8DMHAqe/b8LtV5em+ZHKA=="
                .into(),
        );
        let parsed = parse_chunks(&[chunk("c1", Some(service))]);
        assert!(parsed.faults.is_empty(), "{:?}", parsed.faults);
        assert_eq!(parsed.items[0].first_page(), Some(4));
        assert_eq!(parsed.items[0].orig_elements.len(), 2);
    }

    #[test]
    fn chunk_without_originals_has_no_page() {
        let parsed = parse_chunks(&[chunk("c1", None)]);
        assert_eq!(parsed.items[0].first_page(), None);
        assert_eq!(parsed.faults, vec![ElementFault::EmptyChunk { id: "c1".into() }]);
    }

    #[test]
    fn undecodable_originals_are_a_fault() {
        let parsed = parse_chunks(&[chunk("bad", Some(OrigElements::Encoded("%%%".into())))]);
        assert!(parsed.items[0].orig_elements.is_empty());
        assert!(matches!(
            parsed.faults[0],
            ElementFault::UndecodableOrigElements { .. }
        ));
    }
}
