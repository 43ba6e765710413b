// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Region covering. Paints an opaque rectangle over the edit region and
// empties glyph runs that start inside it, so the old value neither shows
// nor extracts.
//
// The cover is trimmed vertically by a small inset and never horizontally:
// edit boxes come from text bounding boxes that sit flush against table
// rules, and the inset keeps rules just above or below the box visible.

use std::collections::HashSet;

use lopdf::content::{Content, Operation};
use lopdf::{Document, Object, ObjectId};
use retouch_core::error::{Result, RetouchError};
use retouch_core::types::{Rect, Rgb};
use tracing::{debug, warn};

use super::content::{ContentState, is_show_operator};
use super::page::{self, PageGeometry};

/// Distance (points) a glyph origin may sit outside the edit rectangle and
/// still count as inside.
pub const SCRUB_TOLERANCE: f32 = 1.0;

/// What a cover call did to the page.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CoverOutcome {
    /// Painted rectangle in top-left coordinates, `None` when degenerate.
    pub painted: Option<Rect>,
    /// Glyph runs emptied by the scrub.
    pub scrubbed: usize,
}

/// The rectangle actually painted for `rect`: the same horizontal extent,
/// `inset` trimmed from top and bottom. `None` when nothing would remain.
pub fn cover_rect(rect: &Rect, inset: f32) -> Option<Rect> {
    let r = rect.normalized();
    let inset = inset.max(0.0);
    if r.width() <= 0.0 || r.height() <= 2.0 * inset {
        return None;
    }
    Some(Rect::new(r.x0, r.y0 + inset, r.x1, r.y1 - inset))
}

/// Fill operations for a painted rectangle, in PDF user space.
pub fn cover_operations(geometry: &PageGeometry, painted: &Rect, fill: Rgb) -> Vec<Operation> {
    let x = geometry.pdf_x(painted.x0);
    let y = geometry.pdf_y(painted.y1);
    vec![
        Operation::new("q", vec![]),
        Operation::new("rg", vec![Object::Real(fill.r), Object::Real(fill.g), Object::Real(fill.b)]),
        Operation::new(
            "re",
            vec![
                Object::Real(x),
                Object::Real(y),
                Object::Real(painted.width()),
                Object::Real(painted.height()),
            ],
        ),
        Operation::new("f", vec![]),
        Operation::new("Q", vec![]),
    ]
}

/// Empty the string operands of a show operation. Returns whether any
/// glyphs were removed.
fn empty_show_operands(operation: &mut Operation) -> bool {
    let index = match operation.operator.as_str() {
        "Tj" | "'" | "TJ" => 0,
        "\"" => 2,
        _ => return false,
    };
    let Some(operand) = operation.operands.get_mut(index) else {
        return false;
    };
    match operand {
        Object::String(bytes, _) => {
            let had_glyphs = !bytes.is_empty();
            bytes.clear();
            had_glyphs
        }
        Object::Array(items) => {
            let had_glyphs = items
                .iter()
                .any(|item| matches!(item, Object::String(bytes, _) if !bytes.is_empty()));
            items.clear();
            had_glyphs
        }
        _ => false,
    }
}

/// Empty every glyph run whose origin lies inside `rect` (plus tolerance).
///
/// Returns the re-encoded content and the number of runs emptied, or `None`
/// when nothing matched. Runs whose position is unknown (they follow another
/// run without repositioning) are left alone.
pub fn scrub_text(content: &[u8], geometry: &PageGeometry, rect: &Rect) -> Result<Option<(Vec<u8>, usize)>> {
    let mut decoded = Content::decode(content)
        .map_err(|err| RetouchError::PdfError(format!("cannot decode content stream: {err}")))?;
    let zone = rect.expand(SCRUB_TOLERANCE);

    let mut state = ContentState::new();
    let mut emptied = 0;
    for operation in decoded.operations.iter_mut() {
        if is_show_operator(&operation.operator) {
            state.before_show(operation);
            if state.text.positioned {
                let (x, y) = state.text_origin();
                let (left, top) = geometry.to_top_left(x, y);
                if zone.contains_point(left, top) && empty_show_operands(operation) {
                    emptied += 1;
                }
            }
        }
        state.apply(operation);
    }

    if emptied == 0 {
        return Ok(None);
    }
    let encoded = decoded
        .encode()
        .map_err(|err| RetouchError::PdfError(format!("cannot encode content stream: {err}")))?;
    Ok(Some((encoded, emptied)))
}

/// Paints covers on pages of one document, isolating each page's original
/// content in `q … Q` the first time the page is touched.
#[derive(Debug, Clone)]
pub struct RegionCoverer {
    inset: f32,
    fill: Rgb,
    isolated: HashSet<ObjectId>,
}

impl RegionCoverer {
    pub fn new(inset: f32) -> Self {
        Self {
            inset,
            fill: Rgb::WHITE,
            isolated: HashSet::new(),
        }
    }

    pub fn with_fill(mut self, fill: Rgb) -> Self {
        self.fill = fill;
        self
    }

    /// Cover `rect` (top-left coordinates) on the page. When the page content
    /// cannot be decoded the cover is still painted but nothing is scrubbed.
    pub fn cover(&mut self, document: &mut Document, page_id: ObjectId, rect: &Rect) -> Result<CoverOutcome> {
        let geometry = PageGeometry::of(document, page_id);
        let scrubbed = match page::page_content(document, page_id) {
            Ok(content) => self.scrub(document, page_id, content, &geometry, rect)?,
            Err(err) => {
                warn!(?page_id, error = %err, "page content unreadable, cover painted without scrub");
                0
            }
        };

        let painted = cover_rect(rect, self.inset);
        if let Some(painted) = painted {
            let operations = cover_operations(&geometry, &painted, self.fill);
            let bytes = Content { operations }
                .encode()
                .map_err(|err| RetouchError::PdfError(format!("cannot encode cover: {err}")))?;
            page::append_content(document, page_id, bytes)?;
        } else {
            debug!(?rect, "degenerate rectangle, nothing painted");
        }

        Ok(CoverOutcome { painted, scrubbed })
    }

    /// Isolate the page on first touch and empty runs inside `rect`, writing
    /// the content back when either changed it.
    fn scrub(
        &mut self,
        document: &mut Document,
        page_id: ObjectId,
        mut content: Vec<u8>,
        geometry: &PageGeometry,
        rect: &Rect,
    ) -> Result<usize> {
        let mut rewrite = false;
        if self.isolated.insert(page_id) {
            content = page::isolate_content(&content);
            rewrite = true;
        }

        let mut scrubbed = 0;
        match scrub_text(&content, geometry, rect) {
            Ok(Some((cleaned, count))) => {
                content = cleaned;
                scrubbed = count;
                rewrite = true;
            }
            Ok(None) => {}
            Err(err) => warn!(?page_id, error = %err, "text scrub skipped"),
        }

        if rewrite {
            page::set_page_content(document, page_id, content)?;
        }
        Ok(scrubbed)
    }
}
