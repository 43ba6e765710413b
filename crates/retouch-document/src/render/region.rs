// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Region snapshots: the edit rectangle plus surrounding context, cropped
// from a rendered page and encoded as PNG.

use image::{DynamicImage, ImageFormat, imageops};
use retouch_core::config::RenderConfig;
use retouch_core::error::{Result, RetouchError};
use retouch_core::types::Rect;
use tracing::{debug, instrument};

use super::rasterizer::{PageRasterizer, scale_for};
use crate::pdf::{load_document, page::page_bounds};

/// A rendered page region.
#[derive(Debug, Clone, PartialEq)]
pub struct RasterRegion {
    /// PNG-encoded pixels.
    pub png: Vec<u8>,
    /// Region covered, in top-left page coordinates, after padding and
    /// clamping.
    pub rect: Rect,
    pub width: u32,
    pub height: u32,
}

/// Renders padded regions of document pages.
pub struct RegionRenderer<'a> {
    rasterizer: &'a dyn PageRasterizer,
    margin: f32,
    dpi: u32,
}

impl<'a> RegionRenderer<'a> {
    pub fn new(rasterizer: &'a dyn PageRasterizer, config: &RenderConfig) -> Self {
        Self {
            rasterizer,
            margin: config.context_margin.max(0.0),
            dpi: config.dpi,
        }
    }

    /// The region that will be rendered for `rect` on a page with `bounds`.
    pub fn padded(&self, rect: &Rect, bounds: &Rect) -> Rect {
        rect.expand(self.margin).clamp_to(bounds)
    }

    /// Render `rect` on the 0-based `page` with the configured margin.
    #[instrument(skip_all, fields(page = page, dpi = self.dpi))]
    pub fn render(&self, document: &[u8], page: usize, rect: &Rect) -> Result<RasterRegion> {
        let bounds = page_bounds(&load_document(document)?, page)?;
        let region = self.padded(rect, &bounds);
        if region.is_empty() {
            return Err(RetouchError::RenderError(format!(
                "region {rect:?} lies outside page {page}"
            )));
        }

        let page_image = self.rasterizer.render_page(document, page, self.dpi)?;
        let scale = scale_for(self.dpi);
        let (image_width, image_height) = page_image.dimensions();

        let px0 = ((region.x0 * scale).floor().max(0.0) as u32).min(image_width.saturating_sub(1));
        let py0 = ((region.y0 * scale).floor().max(0.0) as u32).min(image_height.saturating_sub(1));
        let px1 = ((region.x1 * scale).ceil().max(0.0) as u32).min(image_width);
        let py1 = ((region.y1 * scale).ceil().max(0.0) as u32).min(image_height);
        let width = px1.saturating_sub(px0).max(1);
        let height = py1.saturating_sub(py0).max(1);

        let cropped = imageops::crop_imm(&page_image, px0, py0, width, height).to_image();
        let png = encode_png(&DynamicImage::ImageRgba8(cropped))?;

        debug!(?region, width, height, png_bytes = png.len(), "region rendered");
        Ok(RasterRegion {
            png,
            rect: region,
            width,
            height,
        })
    }
}

fn encode_png(image: &DynamicImage) -> Result<Vec<u8>> {
    let mut buffer = Vec::new();
    let mut cursor = std::io::Cursor::new(&mut buffer);
    image
        .write_to(&mut cursor, ImageFormat::Png)
        .map_err(|err| RetouchError::ImageError(format!("PNG encoding failed: {err}")))?;
    Ok(buffer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pdf::fixtures;
    use image::{Rgba, RgbaImage};
    use std::cell::Cell;

    /// Blank Letter page at the requested resolution.
    struct BlankPages {
        calls: Cell<usize>,
    }

    impl BlankPages {
        fn new() -> Self {
            Self { calls: Cell::new(0) }
        }
    }

    impl PageRasterizer for BlankPages {
        fn render_page(&self, _document: &[u8], _page: usize, dpi: u32) -> Result<RgbaImage> {
            self.calls.set(self.calls.get() + 1);
            let scale = scale_for(dpi);
            let width = (fixtures::PAGE_WIDTH * scale).round() as u32;
            let height = (fixtures::PAGE_HEIGHT * scale).round() as u32;
            Ok(RgbaImage::from_pixel(width, height, Rgba([255, 255, 255, 255])))
        }
    }

    fn config(margin: f32, dpi: u32) -> RenderConfig {
        RenderConfig {
            context_margin: margin,
            dpi,
        }
    }

    #[test]
    fn region_is_padded_and_cropped_at_scale() {
        let pages = BlankPages::new();
        let renderer = RegionRenderer::new(&pages, &config(30.0, 144));
        let region = renderer
            .render(&fixtures::invoice(), 0, &fixtures::INVOICE_AMOUNT)
            .unwrap();

        assert_eq!(region.rect, Rect::new(70.0, 170.0, 210.0, 245.0));
        assert_eq!((region.width, region.height), (280, 150));
        let decoded = image::load_from_memory(&region.png).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (280, 150));
        assert_eq!(pages.calls.get(), 1);
    }

    #[test]
    fn padding_is_clamped_to_the_page() {
        let pages = BlankPages::new();
        let renderer = RegionRenderer::new(&pages, &config(30.0, 72));
        let region = renderer
            .render(&fixtures::invoice(), 0, &Rect::new(10.0, 10.0, 50.0, 30.0))
            .unwrap();
        assert_eq!(region.rect, Rect::new(0.0, 0.0, 80.0, 60.0));
        assert_eq!((region.width, region.height), (80, 60));
    }

    #[test]
    fn off_page_regions_and_bad_pages_fail() {
        let pages = BlankPages::new();
        let renderer = RegionRenderer::new(&pages, &config(0.0, 72));
        assert!(matches!(
            renderer.render(&fixtures::invoice(), 0, &Rect::new(700.0, 10.0, 750.0, 30.0)),
            Err(RetouchError::RenderError(_))
        ));
        assert!(matches!(
            renderer.render(&fixtures::invoice(), 5, &fixtures::INVOICE_AMOUNT),
            Err(RetouchError::PageOutOfRange { page: 5, .. })
        ));
        assert_eq!(pages.calls.get(), 0);
    }
}
