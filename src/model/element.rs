//! Validated element types and the parse step that builds them.

use super::wire::{RawCoordinates, RawElement};
use crate::error::ElementFault;
use serde::Serialize;
use std::fmt;
use tracing::warn;

/// Element categories the pipeline knows how to render and colour.
///
/// Anything else the partitioner emits (`FigureCaption`, `Formula`, …) is kept
/// verbatim in [`Category::Unknown`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub enum Category {
    Title,
    Header,
    Footer,
    NarrativeText,
    UncategorizedText,
    ListItem,
    Table,
    Image,
    Unknown(String),
}

impl Category {
    pub fn parse(s: &str) -> Self {
        match s {
            "Title" => Category::Title,
            "Header" => Category::Header,
            "Footer" => Category::Footer,
            "NarrativeText" => Category::NarrativeText,
            "UncategorizedText" => Category::UncategorizedText,
            "ListItem" => Category::ListItem,
            "Table" => Category::Table,
            "Image" => Category::Image,
            other => Category::Unknown(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Category::Title => "Title",
            Category::Header => "Header",
            Category::Footer => "Footer",
            Category::NarrativeText => "NarrativeText",
            Category::UncategorizedText => "UncategorizedText",
            Category::ListItem => "ListItem",
            Category::Table => "Table",
            Category::Image => "Image",
            Category::Unknown(s) => s,
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

/// A bounding polygon in the element's own layout space.
///
/// `layout_width`/`layout_height` are guaranteed non-zero by the parse step.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Coordinates {
    pub points: Vec<Point>,
    pub layout_width: f64,
    pub layout_height: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MimeType(String);

impl MimeType {
    pub const JPEG: &'static str = "image/jpeg";

    pub fn new(s: impl Into<String>) -> Self {
        MimeType(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for MimeType {
    fn default() -> Self {
        MimeType(Self::JPEG.to_string())
    }
}

impl fmt::Display for MimeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Raster payload inlined by the partitioner for Image/Table elements.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EmbeddedImage {
    pub data_base64: String,
    pub mime: MimeType,
}

impl EmbeddedImage {
    pub fn data_uri(&self) -> String {
        format!("data:{};base64,{}", self.mime, self.data_base64)
    }
}

/// Content of an Image or Table element.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct Figure {
    /// Caption, extracted table text or generated summary.
    pub text: Option<String>,
    pub image: Option<EmbeddedImage>,
}

/// Per-category payload. Text categories always carry a string (possibly
/// empty); only figures may carry an image.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum ElementKind {
    Title(String),
    Header(String),
    Footer(String),
    NarrativeText(String),
    UncategorizedText(String),
    ListItem(String),
    Table(Figure),
    Image(Figure),
    Other { category: String, text: String },
}

impl ElementKind {
    pub fn category(&self) -> Category {
        match self {
            ElementKind::Title(_) => Category::Title,
            ElementKind::Header(_) => Category::Header,
            ElementKind::Footer(_) => Category::Footer,
            ElementKind::NarrativeText(_) => Category::NarrativeText,
            ElementKind::UncategorizedText(_) => Category::UncategorizedText,
            ElementKind::ListItem(_) => Category::ListItem,
            ElementKind::Table(_) => Category::Table,
            ElementKind::Image(_) => Category::Image,
            ElementKind::Other { category, .. } => Category::Unknown(category.clone()),
        }
    }

    pub fn text(&self) -> Option<&str> {
        match self {
            ElementKind::Title(t)
            | ElementKind::Header(t)
            | ElementKind::Footer(t)
            | ElementKind::NarrativeText(t)
            | ElementKind::UncategorizedText(t)
            | ElementKind::ListItem(t)
            | ElementKind::Other { text: t, .. } => Some(t),
            ElementKind::Table(f) | ElementKind::Image(f) => f.text.as_deref(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Element {
    pub id: String,
    /// 1-based.
    pub page_number: u32,
    pub coordinates: Option<Coordinates>,
    pub kind: ElementKind,
}

impl Element {
    pub fn category(&self) -> Category {
        self.kind.category()
    }
}

/// Items produced by a parse, plus the faults met along the way.
#[derive(Debug, Clone, Default)]
pub struct Parsed<T> {
    pub items: Vec<T>,
    pub faults: Vec<ElementFault>,
}

/// Running state of a parse: the last page seen is inherited by elements
/// that lack one.
#[derive(Debug, Default)]
pub(crate) struct ParseCursor {
    pub last_page: Option<u32>,
    pub faults: Vec<ElementFault>,
}

impl ParseCursor {
    pub fn element(&mut self, raw: &RawElement) -> Element {
        let id = raw.element_id.clone();

        let page_number = match raw.metadata.page_number {
            Some(p) => p,
            None => {
                let assumed_page = self.last_page.unwrap_or(1);
                warn!("Element {}: no page_number, assuming page {}", id, assumed_page);
                self.faults.push(ElementFault::MissingPageNumber {
                    id: id.clone(),
                    assumed_page,
                });
                assumed_page
            }
        };
        self.last_page = Some(page_number);

        let coordinates = raw
            .metadata
            .coordinates
            .as_ref()
            .and_then(|c| self.coordinates(&id, c));

        let kind = self.kind(raw);

        Element {
            id,
            page_number,
            coordinates,
            kind,
        }
    }

    fn coordinates(&mut self, id: &str, raw: &RawCoordinates) -> Option<Coordinates> {
        if raw.points.is_empty() {
            return None;
        }
        let width = raw.layout_width.unwrap_or(0.0);
        let height = raw.layout_height.unwrap_or(0.0);
        if !(width > 0.0 && height > 0.0) {
            warn!("Element {}: degenerate layout space {}x{}", id, width, height);
            self.faults.push(ElementFault::DegenerateLayout {
                id: id.to_string(),
                width: width.max(0.0) as u64,
                height: height.max(0.0) as u64,
            });
            return None;
        }
        Some(Coordinates {
            points: raw.points.iter().map(|&(x, y)| Point { x, y }).collect(),
            layout_width: width,
            layout_height: height,
        })
    }

    fn kind(&mut self, raw: &RawElement) -> ElementKind {
        let text = || raw.text.clone().unwrap_or_default();
        match Category::parse(&raw.element_type) {
            Category::Title => ElementKind::Title(text()),
            Category::Header => ElementKind::Header(text()),
            Category::Footer => ElementKind::Footer(text()),
            Category::NarrativeText => ElementKind::NarrativeText(text()),
            Category::UncategorizedText => ElementKind::UncategorizedText(text()),
            Category::ListItem => ElementKind::ListItem(text()),
            Category::Table => ElementKind::Table(self.figure(raw)),
            Category::Image => ElementKind::Image(self.figure(raw)),
            Category::Unknown(category) => ElementKind::Other {
                category,
                text: text(),
            },
        }
    }

    fn figure(&mut self, raw: &RawElement) -> Figure {
        let image = raw
            .metadata
            .image_base64
            .as_deref()
            .filter(|b64| !b64.is_empty())
            .map(|b64| {
                let mime = match raw.metadata.image_mime_type.as_deref() {
                    Some(m) if !m.is_empty() => MimeType::new(m),
                    _ => {
                        self.faults.push(ElementFault::MissingMimeType {
                            id: raw.element_id.clone(),
                        });
                        MimeType::default()
                    }
                };
                EmbeddedImage {
                    data_base64: b64.to_string(),
                    mime,
                }
            });

        // A generated description wins over whatever the partitioner extracted.
        let text = raw
            .metadata
            .image_description
            .clone()
            .filter(|d| !d.trim().is_empty())
            .or_else(|| raw.text.clone().filter(|t| !t.is_empty()));

        Figure { text, image }
    }
}

/// Parse a flat element list (a partition file).
pub fn parse_elements(raw: &[RawElement]) -> Parsed<Element> {
    let mut cursor = ParseCursor::default();
    let items = raw.iter().map(|r| cursor.element(r)).collect();
    Parsed {
        items,
        faults: cursor.faults,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::wire::RawMetadata;

    fn raw(kind: &str, id: &str, page: Option<u32>, text: Option<&str>) -> RawElement {
        RawElement {
            element_type: kind.into(),
            element_id: id.into(),
            text: text.map(Into::into),
            metadata: RawMetadata {
                page_number: page,
                ..Default::default()
            },
            ..Default::default()
        }
    }

    #[test]
    fn categories_round_trip_names() {
        for name in ["Title", "Header", "Footer", "ListItem", "Table", "Image"] {
            assert_eq!(Category::parse(name).as_str(), name);
        }
        assert_eq!(
            Category::parse("FigureCaption"),
            Category::Unknown("FigureCaption".into())
        );
    }

    #[test]
    fn missing_page_inherits_previous() {
        let parsed = parse_elements(&[
            raw("Title", "a", Some(3), Some("A")),
            raw("NarrativeText", "b", None, Some("B")),
        ]);
        assert_eq!(parsed.items[1].page_number, 3);
        assert_eq!(
            parsed.faults,
            vec![ElementFault::MissingPageNumber {
                id: "b".into(),
                assumed_page: 3
            }]
        );
    }

    #[test]
    fn first_element_without_page_lands_on_page_one() {
        let parsed = parse_elements(&[raw("Title", "a", None, Some("A"))]);
        assert_eq!(parsed.items[0].page_number, 1);
    }

    #[test]
    fn image_without_mime_defaults_to_jpeg() {
        let mut r = raw("Image", "i", Some(1), None);
        r.metadata.image_base64 = Some("QUJD".into());
        let parsed = parse_elements(&[r]);
        match &parsed.items[0].kind {
            ElementKind::Image(f) => {
                let img = f.image.as_ref().expect("payload");
                assert_eq!(img.mime.as_str(), "image/jpeg");
                assert_eq!(img.data_uri(), "data:image/jpeg;base64,QUJD");
            }
            other => panic!("unexpected kind {other:?}"),
        }
        assert!(matches!(
            parsed.faults[0],
            ElementFault::MissingMimeType { .. }
        ));
    }

    #[test]
    fn description_preferred_over_text() {
        let mut r = raw("Image", "i", Some(1), Some("raw ocr"));
        r.metadata.image_description = Some("A diagram: pump".into());
        let parsed = parse_elements(&[r]);
        assert_eq!(parsed.items[0].kind.text(), Some("A diagram: pump"));
    }

    #[test]
    fn zero_layout_drops_coordinates() {
        let mut r = raw("Title", "t", Some(1), Some("T"));
        r.metadata.coordinates = Some(RawCoordinates {
            points: vec![(0.0, 0.0), (1.0, 1.0)],
            system: None,
            layout_width: Some(0.0),
            layout_height: Some(100.0),
        });
        let parsed = parse_elements(&[r]);
        assert!(parsed.items[0].coordinates.is_none());
        assert!(matches!(
            parsed.faults[0],
            ElementFault::DegenerateLayout { .. }
        ));
    }

    #[test]
    fn null_text_on_text_category_is_empty() {
        let parsed = parse_elements(&[raw("ListItem", "l", Some(1), None)]);
        assert_eq!(parsed.items[0].kind, ElementKind::ListItem(String::new()));
    }
}
