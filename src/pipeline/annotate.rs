//! Bounding-box overlay: draw every element's polygon onto its rasterised page.
//!
//! Coordinates arrive in the partitioner's layout space, which is unrelated
//! to the raster's size. Each point is rescaled per axis as
//! `(x * W / layout_width, y * H / layout_height)` against the raster actually
//! returned by the [`PageRasterizer`], so a change in render resolution never
//! misplaces a box.
//!
//! Output files double as the resume marker: a page whose JPEG already exists
//! is skipped before anything is rasterised.

use crate::config::{OutputLayout, PipelineConfig};
use crate::error::{ElementFault, IngestError, PageFault};
use crate::model::{Category, Coordinates, Element};
use crate::pipeline::render::PageRasterizer;
use crate::store;
use ab_glyph::{FontArc, PxScale};
use image::{ImageFormat, Rgb, RgbImage};
use imageproc::drawing::{
    draw_filled_rect_mut, draw_hollow_rect_mut, draw_line_segment_mut, draw_text_mut,
};
use imageproc::rect::Rect;
use std::io::Cursor;
use std::path::Path;
use tracing::{debug, error, info, warn};

// ── Palette ──────────────────────────────────────────────────────────────

pub const ORCHID: Rgb<u8> = Rgb([218, 112, 214]);
pub const FOREST_GREEN: Rgb<u8> = Rgb([34, 139, 34]);
pub const TOMATO: Rgb<u8> = Rgb([255, 99, 71]);
pub const GOLD: Rgb<u8> = Rgb([255, 215, 0]);
pub const DEEP_SKY_BLUE: Rgb<u8> = Rgb([0, 191, 255]);

/// Category colours, in legend order.
pub const PALETTE: [(&str, Rgb<u8>); 5] = [
    ("Title", ORCHID),
    ("Image", FOREST_GREEN),
    ("Table", TOMATO),
    ("ListItem", GOLD),
    ("NarrativeText", DEEP_SKY_BLUE),
];

/// Colour for categories outside [`PALETTE`].
pub const DEFAULT_COLOR: Rgb<u8> = DEEP_SKY_BLUE;

pub fn color_for(category: &Category) -> Rgb<u8> {
    match category {
        Category::Title => ORCHID,
        Category::Image => FOREST_GREEN,
        Category::Table => TOMATO,
        Category::ListItem => GOLD,
        Category::NarrativeText => DEEP_SKY_BLUE,
        _ => DEFAULT_COLOR,
    }
}

// ── Options ──────────────────────────────────────────────────────────────

/// DejaVu Sans Mono, compiled in so the legend is labelled on every host.
static BUNDLED_FONT: &[u8] = include_bytes!("../../assets/DejaVuSansMono.ttf");

#[derive(Clone)]
pub struct AnnotateOptions {
    pub line_thickness: u32,
    /// Without a font the legend shows colour swatches only.
    pub font: Option<FontArc>,
}

impl Default for AnnotateOptions {
    fn default() -> Self {
        Self {
            line_thickness: 2,
            font: bundled_font(),
        }
    }
}

impl AnnotateOptions {
    /// Thickness from the config; the legend font from `legend_font`, or the
    /// bundled font when that is unset or unusable.
    pub fn from_config(config: &PipelineConfig) -> Self {
        let font = config
            .legend_font
            .as_deref()
            .and_then(load_font)
            .or_else(bundled_font);

        Self {
            line_thickness: config.line_thickness,
            font,
        }
    }
}

fn bundled_font() -> Option<FontArc> {
    match FontArc::try_from_slice(BUNDLED_FONT) {
        Ok(font) => Some(font),
        Err(e) => {
            warn!("Bundled legend font is unreadable: {}", e);
            None
        }
    }
}

fn load_font(path: &Path) -> Option<FontArc> {
    let bytes = match std::fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) => {
            warn!("Cannot read font {}: {}; using the bundled font", path.display(), e);
            return None;
        }
    };
    match FontArc::try_from_vec(bytes) {
        Ok(font) => Some(font),
        Err(e) => {
            warn!("Cannot use font {}: {}; using the bundled font", path.display(), e);
            None
        }
    }
}

// ── Outcomes ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub enum AnnotationOutcome {
    /// The output already existed; nothing was rasterised or written.
    Skipped,
    Rendered {
        polygons: usize,
        /// Elements on the page that had no usable coordinates.
        faults: Vec<ElementFault>,
    },
}

#[derive(Debug, Clone)]
pub struct PageOutcome {
    /// 1-based.
    pub page: u32,
    pub result: Result<AnnotationOutcome, PageFault>,
}

// ── Drawing ──────────────────────────────────────────────────────────────

/// Rescale polygon points from layout space into a `width × height` raster.
pub fn scale_points(coordinates: &Coordinates, width: u32, height: u32) -> Vec<(f32, f32)> {
    let sx = width as f64 / coordinates.layout_width;
    let sy = height as f64 / coordinates.layout_height;
    coordinates
        .points
        .iter()
        .map(|p| ((p.x * sx) as f32, (p.y * sy) as f32))
        .collect()
}

fn draw_polygon_outline(img: &mut RgbImage, points: &[(f32, f32)], color: Rgb<u8>, thickness: u32) {
    if points.len() < 2 {
        return;
    }
    let half = thickness as f32 / 2.0;
    for i in 0..points.len() {
        let (x0, y0) = points[i];
        let (x1, y1) = points[(i + 1) % points.len()];
        for t in 0..thickness.max(1) {
            let o = t as f32 - half + 0.5;
            draw_line_segment_mut(img, (x0 + o, y0), (x1 + o, y1), color);
            draw_line_segment_mut(img, (x0, y0 + o), (x1, y1 + o), color);
        }
    }
}

fn draw_legend(img: &mut RgbImage, font: Option<&FontArc>) {
    const ROW: u32 = 22;
    const SWATCH: u32 = 14;
    const PAD: u32 = 6;

    let width = if font.is_some() { 150 } else { SWATCH + 2 * PAD };
    let height = ROW * PALETTE.len() as u32 + PAD;
    if img.width() < width + 2 * PAD || img.height() < height + 2 * PAD {
        return;
    }
    let left = img.width() - width - 2 * PAD;
    let top = 2 * PAD;

    let frame = Rect::at(left as i32, top as i32).of_size(width, height);
    draw_filled_rect_mut(img, frame, Rgb([255, 255, 255]));
    draw_hollow_rect_mut(img, frame, Rgb([80, 80, 80]));

    for (row, (label, color)) in PALETTE.iter().enumerate() {
        let y = top + PAD + row as u32 * ROW;
        let swatch = Rect::at((left + PAD) as i32, y as i32).of_size(SWATCH, SWATCH);
        draw_filled_rect_mut(img, swatch, *color);
        if let Some(font) = font {
            draw_text_mut(
                img,
                Rgb([0, 0, 0]),
                (left + PAD + SWATCH + PAD) as i32,
                y as i32,
                PxScale::from(15.0),
                font,
                label,
            );
        }
    }
}

/// Annotate one page of document `name`, logging how many polygons were drawn.
///
/// `render` is only called when `output_path` does not exist yet. Elements
/// are expected to belong to this page; those without coordinates are
/// reported and skipped.
pub fn annotate_page<F>(
    render: F,
    elements: &[&Element],
    name: &str,
    page: u32,
    output_path: &Path,
    options: &AnnotateOptions,
) -> Result<AnnotationOutcome, IngestError>
where
    F: FnOnce() -> Result<RgbImage, IngestError>,
{
    if output_path.exists() {
        debug!("Skipping existing file: {}", output_path.display());
        return Ok(AnnotationOutcome::Skipped);
    }

    let mut img = render()?;
    let (width, height) = img.dimensions();

    let mut polygons = 0;
    let mut faults = Vec::new();
    for element in elements {
        match &element.coordinates {
            Some(coords) => {
                let points = scale_points(coords, width, height);
                draw_polygon_outline(&mut img, &points, color_for(&element.category()), options.line_thickness);
                polygons += 1;
            }
            None => faults.push(ElementFault::MissingCoordinates {
                id: element.id.clone(),
            }),
        }
    }

    draw_legend(&mut img, options.font.as_ref());

    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), ImageFormat::Jpeg)
        .map_err(|e| IngestError::ImageEncodeFailed {
            path: output_path.to_path_buf(),
            detail: e.to_string(),
        })?;
    store::write_atomic(output_path, &buf)?;
    info!("{} annotations on page {} of: {}", polygons, page, name);

    Ok(AnnotationOutcome::Rendered { polygons, faults })
}

/// Annotate every page of one document.
///
/// A failure on one page is recorded in its [`PageOutcome`] and the next
/// page is attempted; only an unreadable page count aborts the document.
pub fn annotate_document(
    rasterizer: &dyn PageRasterizer,
    elements: &[Element],
    name: &str,
    layout: &OutputLayout,
    options: &AnnotateOptions,
) -> Result<Vec<PageOutcome>, IngestError> {
    let page_count = rasterizer.page_count()?;
    let mut outcomes = Vec::with_capacity(page_count);

    for page in 1..=page_count as u32 {
        let on_page: Vec<&Element> = elements.iter().filter(|e| e.page_number == page).collect();
        let output_path = layout.annotated_page(name, page);

        let result = annotate_page(
            || rasterizer.render_page(page),
            &on_page,
            name,
            page,
            &output_path,
            options,
        )
        .map_err(|e| {
            error!("Annotation of page {} of {} failed: {}", page, name, e);
            PageFault::AnnotationFailed {
                page,
                detail: e.to_string(),
            }
        });
        outcomes.push(PageOutcome { page, result });
    }

    Ok(outcomes)
}
