//! Page rasterisation for the bounding-box overlay.
//!
//! The annotation stage only needs "page N as an RGB buffer", expressed by
//! [`PageRasterizer`]. The production implementation wraps pdfium; tests plug
//! in synthetic rasters.
//!
//! pdfium calls and JPEG encoding are blocking, CPU-bound work. The batch
//! runner opens documents and annotates them inside
//! `tokio::task::spawn_blocking`, which is why factories are shared as
//! `Arc<dyn RasterizerFactory>` and must be `Send + Sync`.
//!
//! ## Why cap pixels, not DPI?
//!
//! Page sizes vary wildly: an A0 poster at 150 DPI would produce a
//! 12,000 × 17,000 px image. `max_rendered_pixels` caps the longest edge
//! regardless of physical size. Element coordinates are rescaled against
//! whatever size comes back, so the cap never shifts a polygon.

use crate::error::IngestError;
use image::RgbImage;
use pdfium_render::prelude::*;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// One opened document that can rasterise its pages.
pub trait PageRasterizer {
    fn page_count(&self) -> Result<usize, IngestError>;

    /// Render a 1-based page.
    fn render_page(&self, page: u32) -> Result<RgbImage, IngestError>;
}

/// Opens documents for rasterisation. Implemented by [`PdfiumEngine`].
pub trait RasterizerFactory: Send + Sync {
    fn open<'a>(&'a self, pdf: &Path) -> Result<Box<dyn PageRasterizer + 'a>, IngestError>;
}

/// A bound pdfium library. `Send + Sync` through pdfium-render's `sync`
/// feature, which serialises every call into the library.
pub struct PdfiumEngine {
    pdfium: Pdfium,
    max_pixels: u32,
}

impl PdfiumEngine {
    /// Bind pdfium from `lib_path` (a file or a directory holding the
    /// platform library), or from the system library search path.
    pub fn bind(lib_path: Option<&Path>, max_pixels: u32) -> Result<Self, IngestError> {
        let bindings = match lib_path {
            Some(path) => {
                let file: PathBuf = if path.is_dir() {
                    Pdfium::pdfium_platform_library_name_at_path(path)
                } else {
                    path.to_path_buf()
                };
                Pdfium::bind_to_library(&file)
            }
            None => Pdfium::bind_to_system_library(),
        }
        .map_err(|e| IngestError::PdfOpenFailed {
            path: lib_path.map(Path::to_path_buf).unwrap_or_default(),
            detail: format!("cannot bind pdfium: {e:?}"),
        })?;

        Ok(Self {
            pdfium: Pdfium::new(bindings),
            max_pixels,
        })
    }

    pub fn open_document<'a>(
        &'a self,
        path: &Path,
        password: Option<&'a str>,
    ) -> Result<PdfiumDocument<'a>, IngestError> {
        let document = self
            .pdfium
            .load_pdf_from_file(path, password)
            .map_err(|e| IngestError::PdfOpenFailed {
                path: path.to_path_buf(),
                detail: format!("{e:?}"),
            })?;
        info!("PDF loaded for rendering: {} ({} pages)", path.display(), document.pages().len());
        Ok(PdfiumDocument {
            document,
            max_pixels: self.max_pixels,
        })
    }
}

impl RasterizerFactory for PdfiumEngine {
    fn open<'a>(&'a self, pdf: &Path) -> Result<Box<dyn PageRasterizer + 'a>, IngestError> {
        Ok(Box::new(self.open_document(pdf, None)?))
    }
}

/// An opened PDF borrowed from its [`PdfiumEngine`].
pub struct PdfiumDocument<'a> {
    document: PdfDocument<'a>,
    max_pixels: u32,
}

impl PageRasterizer for PdfiumDocument<'_> {
    fn page_count(&self) -> Result<usize, IngestError> {
        Ok(self.document.pages().len() as usize)
    }

    fn render_page(&self, page: u32) -> Result<RgbImage, IngestError> {
        let raster_err = |detail: String| IngestError::RasterisationFailed { page, detail };

        let total = self.document.pages().len() as u32;
        if page == 0 || page > total {
            return Err(raster_err(format!("out of range (document has {total} pages)")));
        }

        let render_config = PdfRenderConfig::new()
            .set_target_width(self.max_pixels as i32)
            .set_maximum_height(self.max_pixels as i32);

        let pdf_page = self
            .document
            .pages()
            .get((page - 1) as u16)
            .map_err(|e| raster_err(format!("{e:?}")))?;

        let bitmap = pdf_page
            .render_with_config(&render_config)
            .map_err(|e| raster_err(format!("{e:?}")))?;

        let image = bitmap.as_image().to_rgb8();
        debug!("Rendered page {} → {}x{} px", page, image.width(), image.height());
        Ok(image)
    }
}
