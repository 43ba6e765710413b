// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// retouch-document: PDF overlay editing for Retouch.
//
// Covers regions of existing pages, writes replacement text on the original
// baseline with the best available font, strips signature locks, extracts
// embedded font programs, and rasterises page regions for comparison.

pub mod pdf;
pub mod render;

pub use pdf::editor::{EditOutcome, EditResult, OverlayEditor};
pub use pdf::font_extract::{ExtractedFont, extract_fonts};
pub use pdf::fonts::{BuiltinFont, FontSelection, clean_font_name, resolve_font};
pub use render::rasterizer::{PageRasterizer, PdfiumRasterizer};
pub use render::region::{RasterRegion, RegionRenderer};
