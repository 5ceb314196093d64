//! Document reconstruction: flat, page-ordered items → paginated Markdown.
//!
//! Items are grouped by page in input order. The grouping is a single pass
//! with one buffer: when the page changes, the buffer is flushed followed by
//! a page marker stamped with the page that just ended. Nothing is ever
//! re-sorted, so the output order is the input order.
//!
//! ```text
//! [A p1] [B p1] [C p2]  ──▶  "\n" A B ─Page 1─ C ─Page 2─
//! ```
//!
//! Rendering is pure string building; callers decide where the result goes.

use crate::error::ElementFault;
use crate::model::{Chunk, Element, ElementKind, Figure};
use std::fmt::Write as _;
use tracing::warn;

const HEADER_STYLE: &str =
    "background-color: #f7facc;color: #000;padding: 12px 2px 2px 4px; border-bottom: 1px solid #000;";
const FOOTER_STYLE: &str =
    "background-color: #f7facc;color: #000;padding: 12px 2px 2px 4px; border-top: 1px solid #000;";

/// Anything that sits on a page and knows how to render itself.
pub trait PageItem {
    fn id(&self) -> &str;

    /// 1-based page, or `None` when it cannot be determined.
    fn page_number(&self) -> Option<u32>;

    /// Append this item's Markdown to `out`.
    fn render(&self, out: &mut String);
}

impl PageItem for Element {
    fn id(&self) -> &str {
        &self.id
    }

    fn page_number(&self) -> Option<u32> {
        Some(self.page_number)
    }

    fn render(&self, out: &mut String) {
        render_element(self, out);
    }
}

impl PageItem for Chunk {
    fn id(&self) -> &str {
        &self.id
    }

    fn page_number(&self) -> Option<u32> {
        self.first_page()
    }

    fn render(&self, out: &mut String) {
        render_chunk(self, out);
    }
}

/// Result of [`reconstruct`].
#[derive(Debug, Clone, Default)]
pub struct Reconstruction {
    pub markdown: String,
    pub faults: Vec<ElementFault>,
}

/// The page-boundary marker written after each page's content.
pub fn page_marker(page: u32) -> String {
    format!("\n\n---\nPage {page}\n\n---\n\n")
}

/// Reassemble `items` into one Markdown document.
///
/// A page that reappears after the sequence has moved past it starts a new
/// group (and gets a second marker); the regression is reported as a fault.
pub fn reconstruct<T: PageItem>(items: &[T]) -> Reconstruction {
    let mut markdown = String::from("\n");
    let mut faults = Vec::new();
    let mut buffer = String::new();
    let mut current_page: Option<u32> = None;

    for item in items {
        let page = match item.page_number() {
            Some(p) => p,
            None => {
                let assumed_page = current_page.unwrap_or(1);
                warn!("Item {}: no page number, assuming page {}", item.id(), assumed_page);
                faults.push(ElementFault::MissingPageNumber {
                    id: item.id().to_string(),
                    assumed_page,
                });
                assumed_page
            }
        };

        if let Some(previous) = current_page {
            if page != previous {
                if page < previous {
                    warn!("Item {}: page {} follows page {}", item.id(), page, previous);
                    faults.push(ElementFault::PageRegression {
                        id: item.id().to_string(),
                        page,
                        previous,
                    });
                }
                flush(&mut markdown, &mut buffer, previous);
            }
        }

        current_page = Some(page);
        item.render(&mut buffer);
    }

    if let Some(last) = current_page {
        if !buffer.is_empty() {
            flush(&mut markdown, &mut buffer, last);
        }
    }

    Reconstruction { markdown, faults }
}

fn flush(markdown: &mut String, buffer: &mut String, page: u32) {
    markdown.push_str(buffer);
    markdown.push_str(&page_marker(page));
    buffer.clear();
}

/// Render one element by category.
pub fn render_element(element: &Element, out: &mut String) {
    match &element.kind {
        ElementKind::Title(t) => {
            let _ = write!(out, "# {t}\n\n");
        }
        ElementKind::Header(t) => {
            let _ = write!(out, "<div style='{HEADER_STYLE}'> {t}\n\n</div>\n\n");
        }
        ElementKind::Footer(t) => {
            let _ = write!(out, "<div style='{FOOTER_STYLE}'> {t}\n\n</div>\n\n");
        }
        ElementKind::NarrativeText(t) | ElementKind::UncategorizedText(t) => {
            out.push_str(&quote(t));
            out.push_str("\n\n");
        }
        ElementKind::ListItem(t) => {
            let _ = writeln!(out, "> - {t}");
        }
        ElementKind::Table(f) => render_figure(f, "Table", out),
        ElementKind::Image(f) => render_figure(f, "Image", out),
        ElementKind::Other { text, .. } => {
            let _ = write!(out, "{text}\n\n");
        }
    }
}

fn render_figure(figure: &Figure, label: &str, out: &mut String) {
    let text = figure.text.as_deref().unwrap_or("");
    match &figure.image {
        Some(image) => {
            let _ = write!(
                out,
                "| ![IMAGE:]({})  |\n|:--:|\n| <p style=\"line-height:.9; bgcolor: #000\"><span style=\"font-family:Tahoma; font-size:.7em; color: #24a8fb\">{}</span></p> |\n\n",
                image.data_uri(),
                table_cell(text)
            );
        }
        None => {
            let shown = if text.trim().is_empty() { "Unknown" } else { text };
            let _ = write!(out, "> {label}: {shown}\n\n");
        }
    }
}

fn render_chunk(chunk: &Chunk, out: &mut String) {
    let _ = write!(
        out,
        "<details style='weight:bold'>\n<summary>Chunk {}</summary>\n\n",
        chunk.id
    );
    let _ = write!(
        out,
        "<details style='color: #583;weight:bold;padding-left: 1em;'>\n<summary>Chunk Text</summary>\n\n{}\n\n</details>\n\n",
        quote(&chunk.text)
    );
    out.push_str(
        "<details style='color: #1010e0;weight:bold;padding-left: 1em;'>\n<summary>Original Elements</summary>\n\n",
    );
    for element in &chunk.orig_elements {
        let _ = write!(
            out,
            "<div style='font-size: 10px; color: lightgrey; display: block;'>{} | ID: {}</div>\n\n",
            element.category(),
            element.id
        );
        render_element(element, out);
    }
    out.push_str("</details>\n\n</details>\n\n");
}

/// Make `text` safe inside a one-line Markdown table cell.
fn table_cell(text: &str) -> String {
    text.trim()
        .lines()
        .map(|l| l.replace('|', "\\|"))
        .collect::<Vec<_>>()
        .join("<br>")
}

/// Blockquote every line of `text`.
fn quote(text: &str) -> String {
    if text.is_empty() {
        return ">".to_string();
    }
    text.lines()
        .map(|l| format!("> {l}"))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{EmbeddedImage, MimeType};

    fn el(id: &str, page: u32, kind: ElementKind) -> Element {
        Element {
            id: id.into(),
            page_number: page,
            coordinates: None,
            kind,
        }
    }

    #[test]
    fn two_pages_in_order() {
        let items = vec![
            el("a", 1, ElementKind::Title("A".into())),
            el("b", 1, ElementKind::NarrativeText("B".into())),
            el("c", 2, ElementKind::Title("C".into())),
        ];
        let out = reconstruct(&items);
        assert!(out.faults.is_empty());
        let expected = format!(
            "\n# A\n\n> B\n\n{}# C\n\n{}",
            page_marker(1),
            page_marker(2)
        );
        assert_eq!(out.markdown, expected);
    }

    #[test]
    fn one_marker_per_distinct_page() {
        let items: Vec<Element> = [1, 1, 2, 3, 3, 3, 5]
            .iter()
            .enumerate()
            .map(|(i, &p)| el(&i.to_string(), p, ElementKind::NarrativeText("x".into())))
            .collect();
        let md = reconstruct(&items).markdown;
        assert_eq!(md.matches("\n---\nPage ").count(), 4);
        let p1 = md.find("Page 1").unwrap();
        let p2 = md.find("Page 2").unwrap();
        let p3 = md.find("Page 3").unwrap();
        let p5 = md.find("Page 5").unwrap();
        assert!(p1 < p2 && p2 < p3 && p3 < p5);
    }

    #[test]
    fn empty_input_is_just_a_newline() {
        let out = reconstruct::<Element>(&[]);
        assert_eq!(out.markdown, "\n");
    }

    #[test]
    fn figure_data_uri_uses_declared_mime() {
        let figure = Figure {
            text: Some("A diagram: pump".into()),
            image: Some(EmbeddedImage {
                data_base64: "iVBORw0".into(),
                mime: MimeType::new("image/png"),
            }),
        };
        let mut out = String::new();
        render_element(&el("i", 1, ElementKind::Image(figure)), &mut out);
        assert!(out.contains("](data:image/png;base64,iVBORw0)"), "got: {out}");
        assert!(out.contains("A diagram: pump"));
        assert!(out.starts_with("| ![IMAGE:]("));
    }

    #[test]
    fn multi_paragraph_caption_stays_in_its_cell() {
        let figure = Figure {
            text: Some("A pump.\n\nFlow | pressure curve.\n".into()),
            image: Some(EmbeddedImage {
                data_base64: "iVBORw0".into(),
                mime: MimeType::new("image/png"),
            }),
        };
        let mut out = String::new();
        render_element(&el("i", 1, ElementKind::Image(figure)), &mut out);

        let rows: Vec<&str> = out.trim_end().lines().collect();
        assert_eq!(rows.len(), 3, "got: {out}");
        assert!(rows[2].contains("A pump.<br><br>Flow \\| pressure curve."), "got: {out}");
        assert!(rows[2].ends_with("</p> |"));
    }

    #[test]
    fn figure_without_payload_is_unknown_placeholder() {
        let mut out = String::new();
        render_element(&el("i", 1, ElementKind::Image(Figure::default())), &mut out);
        assert_eq!(out, "> Image: Unknown\n\n");

        let mut out = String::new();
        let table = Figure {
            text: Some("Q1 | 42".into()),
            image: None,
        };
        render_element(&el("t", 1, ElementKind::Table(table)), &mut out);
        assert_eq!(out, "> Table: Q1 | 42\n\n");
    }

    #[test]
    fn list_items_are_tight() {
        let items = vec![
            el("1", 1, ElementKind::ListItem("one".into())),
            el("2", 1, ElementKind::ListItem("two".into())),
        ];
        let md = reconstruct(&items).markdown;
        assert!(md.contains("> - one\n> - two\n"));
    }

    #[test]
    fn header_and_footer_borders() {
        let mut out = String::new();
        render_element(&el("h", 1, ElementKind::Header("Manual".into())), &mut out);
        assert!(out.contains("border-bottom"));
        let mut out = String::new();
        render_element(&el("f", 1, ElementKind::Footer("p. 3".into())), &mut out);
        assert!(out.contains("border-top"));
    }

    #[test]
    fn regression_starts_new_group_and_reports() {
        let items = vec![
            el("a", 1, ElementKind::NarrativeText("a".into())),
            el("b", 2, ElementKind::NarrativeText("b".into())),
            el("c", 1, ElementKind::NarrativeText("c".into())),
        ];
        let out = reconstruct(&items);
        assert_eq!(out.markdown.matches("\n---\nPage 1\n").count(), 2);
        assert_eq!(
            out.faults,
            vec![ElementFault::PageRegression {
                id: "c".into(),
                page: 1,
                previous: 2
            }]
        );
    }

    #[test]
    fn chunk_renders_wrapper_and_originals() {
        let chunk = Chunk {
            id: "c1".into(),
            text: "Intro\nBody".into(),
            chunk_type: "CompositeElement".into(),
            orig_elements: vec![
                el("t", 3, ElementKind::Title("Intro".into())),
                el("n", 3, ElementKind::NarrativeText("Body".into())),
            ],
        };
        let md = reconstruct(&[chunk]).markdown;
        assert!(md.contains("<summary>Chunk c1</summary>"));
        assert!(md.contains("> Intro\n> Body"));
        assert!(md.contains("Title | ID: t"));
        assert!(md.contains("NarrativeText | ID: n"));
        assert!(md.ends_with(&page_marker(3)));
    }

    #[test]
    fn chunk_without_page_uses_current() {
        let with_page = Chunk {
            id: "c1".into(),
            text: "x".into(),
            chunk_type: "CompositeElement".into(),
            orig_elements: vec![el("e", 4, ElementKind::NarrativeText("x".into()))],
        };
        let without = Chunk {
            id: "c2".into(),
            text: "y".into(),
            chunk_type: "CompositeElement".into(),
            orig_elements: vec![],
        };
        let out = reconstruct(&[with_page, without]);
        assert_eq!(out.markdown.matches("Page 4").count(), 1);
        assert_eq!(
            out.faults,
            vec![ElementFault::MissingPageNumber {
                id: "c2".into(),
                assumed_page: 4
            }]
        );
    }
}
