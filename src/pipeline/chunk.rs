//! Title-bounded chunking of a partitioned element list.
//!
//! Output chunks use the same wire shape as the Unstructured chunker:
//! `type` is `CompositeElement` (or `Table`), `text` is the joined element
//! text, and `metadata.orig_elements` holds the constituent elements as
//! base64(zlib(json)). Files written here and files written by the hosted
//! chunker are interchangeable downstream.

use crate::config::PipelineConfig;
use crate::model::{OrigElements, RawElement, RawMetadata};
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

/// Groups elements into chunks.
pub trait Chunker: Send + Sync {
    fn chunk(&self, elements: &[RawElement]) -> Vec<RawElement>;
}

/// `by_title` chunking with a soft character limit.
///
/// * every `Title` opens a new chunk;
/// * a chunk is closed when the next element would push it past
///   `max_characters`;
/// * a single element longer than `max_characters` is cut into windows of
///   that size, each repeating the last `overlap` characters of the previous;
/// * `Table` elements always form a chunk of their own.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TitleChunker {
    pub max_characters: usize,
    pub overlap: usize,
}

impl TitleChunker {
    pub fn new(max_characters: usize, overlap: usize) -> Self {
        let max_characters = max_characters.max(1);
        Self {
            max_characters,
            overlap: overlap.min(max_characters - 1),
        }
    }

    pub fn from_config(config: &PipelineConfig) -> Self {
        Self::new(config.chunk_max_characters, config.chunk_overlap)
    }

    fn windows(&self, text: &str) -> Vec<String> {
        let chars: Vec<char> = text.chars().collect();
        let step = self.max_characters - self.overlap;
        let mut out = Vec::new();
        let mut start = 0;
        loop {
            let end = (start + self.max_characters).min(chars.len());
            out.push(chars[start..end].iter().collect());
            if end == chars.len() {
                break;
            }
            start += step;
        }
        out
    }
}

#[derive(Default)]
struct Pending {
    elements: Vec<RawElement>,
    texts: Vec<String>,
    len: usize,
}

impl Pending {
    fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    fn len_with(&self, text_len: usize) -> usize {
        if self.len == 0 || text_len == 0 {
            self.len + text_len
        } else {
            self.len + 2 + text_len
        }
    }

    fn push(&mut self, element: &RawElement, text: &str) {
        let len = text.chars().count();
        self.len = self.len_with(len);
        if !text.is_empty() {
            self.texts.push(text.to_string());
        }
        self.elements.push(element.clone());
    }

    fn flush(&mut self, out: &mut Vec<RawElement>) {
        if self.is_empty() {
            return;
        }
        let pending = std::mem::take(self);
        out.push(build_chunk(
            "CompositeElement",
            &pending.elements,
            pending.texts.join("\n\n"),
            None,
        ));
    }
}

impl Chunker for TitleChunker {
    fn chunk(&self, elements: &[RawElement]) -> Vec<RawElement> {
        let mut out = Vec::new();
        let mut pending = Pending::default();

        for element in elements {
            let text = element.text.as_deref().unwrap_or("").trim();
            let len = text.chars().count();

            match element.element_type.as_str() {
                "Title" => pending.flush(&mut out),
                "Table" => {
                    pending.flush(&mut out);
                    out.push(build_chunk("Table", std::slice::from_ref(element), text.to_string(), None));
                    continue;
                }
                _ => {}
            }

            if len > self.max_characters {
                pending.flush(&mut out);
                let windows = self.windows(text);
                debug!("Element {} split into {} windows", element.element_id, windows.len());
                for (i, window) in windows.into_iter().enumerate() {
                    out.push(build_chunk(
                        "CompositeElement",
                        std::slice::from_ref(element),
                        window,
                        Some(i),
                    ));
                }
                continue;
            }

            if !pending.is_empty() && pending.len_with(len) > self.max_characters {
                pending.flush(&mut out);
            }
            pending.push(element, text);
        }
        pending.flush(&mut out);

        debug!("{} elements → {} chunks", elements.len(), out.len());
        out
    }
}

fn chunk_id(elements: &[RawElement], window: Option<usize>) -> String {
    let mut hasher = Sha256::new();
    for element in elements {
        hasher.update(element.element_id.as_bytes());
        hasher.update([0u8]);
    }
    if let Some(i) = window {
        hasher.update(i.to_le_bytes());
    }
    let mut id = hex::encode(hasher.finalize());
    id.truncate(32);
    id
}

fn build_chunk(
    chunk_type: &str,
    elements: &[RawElement],
    text: String,
    window: Option<usize>,
) -> RawElement {
    let orig_elements = OrigElements::encode(elements).unwrap_or_else(|e| {
        warn!("Cannot compress orig_elements ({}); storing them inline", e);
        OrigElements::Inline(elements.to_vec())
    });

    RawElement {
        element_type: chunk_type.to_string(),
        element_id: chunk_id(elements, window),
        text: Some(text),
        metadata: RawMetadata {
            page_number: elements.first().and_then(|e| e.metadata.page_number),
            orig_elements: Some(orig_elements),
            ..Default::default()
        },
        ..Default::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::parse_chunks;

    fn el(kind: &str, id: &str, page: u32, text: &str) -> RawElement {
        RawElement {
            element_type: kind.into(),
            element_id: id.into(),
            text: Some(text.into()),
            metadata: RawMetadata {
                page_number: Some(page),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    fn originals(chunk: &RawElement) -> Vec<String> {
        chunk
            .metadata
            .orig_elements
            .as_ref()
            .expect("orig_elements")
            .decode()
            .expect("decode")
            .into_iter()
            .map(|e| e.element_id)
            .collect()
    }

    #[test]
    fn titles_open_new_chunks() {
        let chunks = TitleChunker::new(1500, 150).chunk(&[
            el("Title", "t1", 1, "Intro"),
            el("NarrativeText", "n1", 1, "Body one"),
            el("Title", "t2", 2, "Setup"),
            el("ListItem", "l1", 2, "Step"),
        ]);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].text.as_deref(), Some("Intro\n\nBody one"));
        assert_eq!(originals(&chunks[0]), vec!["t1", "n1"]);
        assert_eq!(originals(&chunks[1]), vec!["t2", "l1"]);
        assert_eq!(chunks[1].metadata.page_number, Some(2));
    }

    #[test]
    fn chunk_closes_at_limit() {
        let chunks = TitleChunker::new(20, 5).chunk(&[
            el("NarrativeText", "a", 1, "aaaaaaaaaa"),
            el("NarrativeText", "b", 1, "bbbbbbbbbb"),
        ]);
        // 10 + 2 + 10 > 20
        assert_eq!(chunks.len(), 2);
    }

    #[test]
    fn oversized_element_is_windowed_with_overlap() {
        let text: String = ('a'..='y').collect(); // 25 chars
        let chunks = TitleChunker::new(10, 3).chunk(&[el("NarrativeText", "long", 1, &text)]);
        let texts: Vec<&str> = chunks.iter().filter_map(|c| c.text.as_deref()).collect();
        assert_eq!(texts, vec!["abcdefghij", "hijklmnopq", "opqrstuvwx", "vwxy"]);
        let ids: std::collections::HashSet<_> = chunks.iter().map(|c| &c.element_id).collect();
        assert_eq!(ids.len(), 4);
    }

    #[test]
    fn tables_stand_alone() {
        let chunks = TitleChunker::new(1500, 150).chunk(&[
            el("NarrativeText", "n", 1, "before"),
            el("Table", "t", 1, "a | b"),
            el("NarrativeText", "m", 1, "after"),
        ]);
        let types: Vec<&str> = chunks.iter().map(|c| c.element_type.as_str()).collect();
        assert_eq!(types, vec!["CompositeElement", "Table", "CompositeElement"]);
    }

    #[test]
    fn ids_are_deterministic() {
        let input = [el("Title", "t", 1, "T"), el("NarrativeText", "n", 1, "N")];
        let chunker = TitleChunker::new(100, 10);
        assert_eq!(chunker.chunk(&input), chunker.chunk(&input));
        assert_eq!(chunker.chunk(&input)[0].element_id.len(), 32);
    }

    #[test]
    fn output_parses_as_chunks() {
        let chunks = TitleChunker::new(1500, 150).chunk(&[
            el("Title", "t", 3, "Pump"),
            el("NarrativeText", "n", 3, "Prime it."),
        ]);
        let parsed = parse_chunks(&chunks);
        assert!(parsed.faults.is_empty());
        assert_eq!(parsed.items[0].first_page(), Some(3));
        assert_eq!(parsed.items[0].orig_elements.len(), 2);
    }
}
