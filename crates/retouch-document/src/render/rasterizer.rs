// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Page rasterisation. PDFium is bound at runtime; callers that cannot load
// it get a render error and carry on without pixels.

use image::RgbaImage;
use pdfium_render::prelude::*;
use retouch_core::error::{Result, RetouchError};
use tracing::{debug, info, instrument};

/// Points per inch in PDF user space.
pub const POINTS_PER_INCH: f32 = 72.0;

/// Pixels per point at `dpi`.
pub fn scale_for(dpi: u32) -> f32 {
    dpi.max(1) as f32 / POINTS_PER_INCH
}

/// Renders whole pages of a serialised document to RGBA pixels.
pub trait PageRasterizer {
    /// Render the 0-based `page` at `dpi`. Pixel `(0, 0)` is the top-left
    /// corner of the page.
    fn render_page(&self, document: &[u8], page: usize, dpi: u32) -> Result<RgbaImage>;
}

/// [`PageRasterizer`] backed by a dynamically loaded PDFium.
pub struct PdfiumRasterizer {
    pdfium: Pdfium,
}

impl PdfiumRasterizer {
    /// Bind PDFium from the working directory, `vendor/pdfium/lib/`, or the
    /// system library path, in that order.
    pub fn bind() -> Result<Self> {
        let bindings = Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path("./"))
            .or_else(|_| {
                Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path(
                    "./vendor/pdfium/lib/",
                ))
            })
            .or_else(|_| Pdfium::bind_to_system_library())
            .map_err(|err| RetouchError::RenderError(format!("failed to load PDFium library: {err:?}")))?;

        info!("PDFium bound");
        Ok(Self {
            pdfium: Pdfium::new(bindings),
        })
    }
}

impl PageRasterizer for PdfiumRasterizer {
    #[instrument(skip_all, fields(page = page, dpi = dpi, input_bytes = document.len()))]
    fn render_page(&self, document: &[u8], page: usize, dpi: u32) -> Result<RgbaImage> {
        let pdf = self
            .pdfium
            .load_pdf_from_byte_slice(document, None)
            .map_err(|err| RetouchError::RenderError(format!("PDFium cannot open document: {err:?}")))?;

        let index = PdfPageIndex::try_from(page)
            .map_err(|_| RetouchError::RenderError(format!("page index {page} too large")))?;
        let pdf_page = pdf
            .pages()
            .get(index)
            .map_err(|err| RetouchError::RenderError(format!("page {page}: {err:?}")))?;

        let config = PdfRenderConfig::new().scale_page_by_factor(scale_for(dpi));
        let bitmap = pdf_page
            .render_with_config(&config)
            .map_err(|err| RetouchError::RenderError(format!("page {page} render failed: {err:?}")))?;

        let width = u32::try_from(bitmap.width())
            .map_err(|_| RetouchError::RenderError("negative bitmap width".into()))?;
        let height = u32::try_from(bitmap.height())
            .map_err(|_| RetouchError::RenderError("negative bitmap height".into()))?;
        let image = RgbaImage::from_raw(width, height, bitmap.as_rgba_bytes())
            .ok_or_else(|| RetouchError::RenderError("bitmap size does not match its pixels".into()))?;

        debug!(width, height, "page rendered");
        Ok(image)
    }
}
