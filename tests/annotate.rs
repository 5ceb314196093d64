//! Annotation resume behaviour, observed through the log stream.

use image::{Rgb, RgbImage};
use pdf_ingest::model::{parse_elements, RawCoordinates, RawElement, RawMetadata};
use pdf_ingest::pipeline::annotate::{
    annotate_document, annotate_page, AnnotateOptions, AnnotationOutcome,
};
use pdf_ingest::pipeline::render::PageRasterizer;
use pdf_ingest::{IngestError, OutputLayout};
use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

struct CountingPages {
    pages: usize,
    renders: AtomicUsize,
}

impl PageRasterizer for CountingPages {
    fn page_count(&self) -> Result<usize, IngestError> {
        Ok(self.pages)
    }

    fn render_page(&self, _page: u32) -> Result<RgbImage, IngestError> {
        self.renders.fetch_add(1, Ordering::SeqCst);
        Ok(RgbImage::from_pixel(170, 220, Rgb([255, 255, 255])))
    }
}

#[derive(Clone, Default)]
struct Captured(Arc<Mutex<Vec<u8>>>);

impl io::Write for Captured {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Captured {
    fn take(&self) -> String {
        let bytes = std::mem::take(&mut *self.0.lock().unwrap());
        String::from_utf8_lossy(&bytes).into_owned()
    }
}

fn boxed(kind: &str, id: &str, page: u32) -> RawElement {
    RawElement {
        element_type: kind.into(),
        element_id: id.into(),
        text: Some(id.into()),
        metadata: RawMetadata {
            page_number: Some(page),
            coordinates: Some(RawCoordinates {
                points: vec![(170.0, 220.0), (170.0, 440.0), (850.0, 440.0), (850.0, 220.0)],
                system: Some("PixelSpace".into()),
                layout_width: Some(1700.0),
                layout_height: Some(2200.0),
            }),
            ..Default::default()
        },
        ..Default::default()
    }
}

#[test]
fn second_pass_writes_nothing_and_logs_no_counts() {
    let dir = tempfile::tempdir().expect("tempdir");
    let layout = OutputLayout::new(dir.path());
    let parsed = parse_elements(&[
        boxed("Title", "t", 1),
        boxed("NarrativeText", "n", 1),
        boxed("Table", "tbl", 2),
    ]);
    let rasterizer = CountingPages {
        pages: 2,
        renders: AtomicUsize::new(0),
    };
    let options = AnnotateOptions::default();

    let captured = Captured::default();
    let sink = captured.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_writer(move || sink.clone())
        .with_ansi(false)
        .with_max_level(tracing::Level::INFO)
        .finish();

    tracing::subscriber::with_default(subscriber, || {
        let first = annotate_document(&rasterizer, &parsed.items, "manual", &layout, &options).unwrap();
        assert!(matches!(
            first[0].result,
            Ok(AnnotationOutcome::Rendered { polygons: 2, .. })
        ));
        assert!(matches!(
            first[1].result,
            Ok(AnnotationOutcome::Rendered { polygons: 1, .. })
        ));
        let log = captured.take();
        assert!(log.contains("2 annotations on page 1 of: manual"), "{log}");
        assert!(log.contains("1 annotations on page 2 of: manual"), "{log}");

        let written = std::fs::metadata(layout.annotated_page("manual", 1))
            .and_then(|m| m.modified())
            .unwrap();

        let second = annotate_document(&rasterizer, &parsed.items, "manual", &layout, &options).unwrap();
        assert!(second
            .iter()
            .all(|p| matches!(p.result, Ok(AnnotationOutcome::Skipped))));
        let log = captured.take();
        assert!(!log.contains("annotations on page"), "{log}");

        let after = std::fs::metadata(layout.annotated_page("manual", 1))
            .and_then(|m| m.modified())
            .unwrap();
        assert_eq!(written, after);
    });

    assert_eq!(rasterizer.renders.load(Ordering::SeqCst), 2);
}

#[test]
fn single_page_logs_its_own_count() {
    let dir = tempfile::tempdir().expect("tempdir");
    let layout = OutputLayout::new(dir.path());
    let parsed = parse_elements(&[boxed("Title", "t", 3), boxed("Table", "tbl", 3)]);
    let on_page: Vec<_> = parsed.items.iter().collect();

    let captured = Captured::default();
    let sink = captured.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_writer(move || sink.clone())
        .with_ansi(false)
        .with_max_level(tracing::Level::INFO)
        .finish();

    tracing::subscriber::with_default(subscriber, || {
        let outcome = annotate_page(
            || Ok(RgbImage::from_pixel(170, 220, Rgb([255, 255, 255]))),
            &on_page,
            "report",
            3,
            &layout.annotated_page("report", 3),
            &AnnotateOptions::default(),
        )
        .unwrap();
        assert!(matches!(outcome, AnnotationOutcome::Rendered { polygons: 2, .. }));
    });

    let log = captured.take();
    assert!(log.contains("2 annotations on page 3 of: report"), "{log}");
}
