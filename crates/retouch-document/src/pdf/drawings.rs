// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Vector drawings on a page: straight-line paths and rectangles collected
// from the content stream, and redrawing them onto another page.
//
// Curves only move the current point. Form XObjects are not entered.

use lopdf::content::{Content, Operation};
use lopdf::{Document, Object, ObjectId};
use retouch_core::error::{Result, RetouchError};
use retouch_core::types::{Rect, Rgb};
use tracing::debug;

use super::content::{ContentState, numbers, scale_of, transform};
use super::page::{self, PageGeometry};

/// One path segment in PDF user space, already mapped through the CTM.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Segment {
    Line([(f32, f32); 2]),
    /// Closed quadrilateral from a `re` operator.
    Quad([(f32, f32); 4]),
}

impl Segment {
    fn points(&self) -> &[(f32, f32)] {
        match self {
            Segment::Line(points) => points,
            Segment::Quad(points) => points,
        }
    }
}

/// A painted path with the state needed to paint it again.
#[derive(Debug, Clone, PartialEq)]
pub struct Drawing {
    pub segments: Vec<Segment>,
    /// Stroke colour, when the path was stroked.
    pub stroke: Option<Rgb>,
    /// Fill colour, when the path was filled.
    pub fill: Option<Rgb>,
    /// Stroke width in page units.
    pub width: f32,
    /// Bounding box in top-left coordinates, grown by half the stroke width.
    pub bounds: Rect,
}

/// Path under construction.
#[derive(Debug, Default)]
struct PathBuilder {
    segments: Vec<Segment>,
    current: Option<(f32, f32)>,
    start: Option<(f32, f32)>,
}

impl PathBuilder {
    fn move_to(&mut self, point: (f32, f32)) {
        self.current = Some(point);
        self.start = Some(point);
    }

    fn line_to(&mut self, point: (f32, f32)) {
        if let Some(from) = self.current {
            self.segments.push(Segment::Line([from, point]));
        }
        self.current = Some(point);
    }

    fn close(&mut self) {
        if let (Some(from), Some(start)) = (self.current, self.start) {
            if from != start {
                self.segments.push(Segment::Line([from, start]));
            }
            self.current = Some(start);
        }
    }

    fn take(&mut self) -> Vec<Segment> {
        self.current = None;
        self.start = None;
        std::mem::take(&mut self.segments)
    }
}

/// Which parts of a path a painting operator draws.
fn paint_mode(operator: &str) -> Option<(bool, bool, bool)> {
    // (close, stroke, fill)
    match operator {
        "S" => Some((false, true, false)),
        "s" => Some((true, true, false)),
        "f" | "F" | "f*" => Some((false, false, true)),
        "B" | "B*" => Some((false, true, true)),
        "b" | "b*" => Some((true, true, true)),
        "n" => Some((false, false, false)),
        _ => None,
    }
}

fn drawing_bounds(geometry: &PageGeometry, segments: &[Segment], width: f32) -> Option<Rect> {
    let points = segments
        .iter()
        .flat_map(|segment| segment.points().iter().copied())
        .map(|(x, y)| geometry.to_top_left(x, y));
    Rect::bounding(points).map(|r| r.expand(width / 2.0))
}

/// Collect the stroked and filled straight-line paths of a page.
pub fn page_drawings(document: &Document, page_id: ObjectId) -> Result<Vec<Drawing>> {
    let geometry = PageGeometry::of(document, page_id);
    let content = page::page_content(document, page_id)?;
    let decoded = Content::decode(&content)
        .map_err(|err| RetouchError::PdfError(format!("cannot decode content stream: {err}")))?;

    let mut state = ContentState::new();
    let mut path = PathBuilder::default();
    let mut drawings = Vec::new();

    for operation in &decoded.operations {
        let ctm = state.graphics.ctm;
        let values = numbers(&operation.operands);
        let point = |i: usize| values.as_ref().and_then(|v| Some(transform(&ctm, *v.get(i)?, *v.get(i + 1)?)));

        match operation.operator.as_str() {
            "m" => {
                if let Some(p) = point(0) {
                    path.move_to(p);
                }
            }
            "l" => {
                if let Some(p) = point(0) {
                    path.line_to(p);
                }
            }
            "c" => {
                if let Some(p) = point(4) {
                    path.current = Some(p);
                }
            }
            "v" | "y" => {
                if let Some(p) = point(2) {
                    path.current = Some(p);
                }
            }
            "h" => path.close(),
            "re" => {
                if let Some([x, y, w, h]) = values.as_deref().and_then(|v| <[f32; 4]>::try_from(v).ok()) {
                    let corners = [
                        transform(&ctm, x, y),
                        transform(&ctm, x + w, y),
                        transform(&ctm, x + w, y + h),
                        transform(&ctm, x, y + h),
                    ];
                    path.segments.push(Segment::Quad(corners));
                    path.move_to(corners[0]);
                }
            }
            operator => {
                if let Some((close, stroke, fill)) = paint_mode(operator) {
                    if close {
                        path.close();
                    }
                    let segments = path.take();
                    if segments.is_empty() || !(stroke || fill) {
                        continue;
                    }
                    let width = if stroke {
                        state.graphics.line_width.max(0.0) * scale_of(&ctm)
                    } else {
                        0.0
                    };
                    if let Some(bounds) = drawing_bounds(&geometry, &segments, width) {
                        drawings.push(Drawing {
                            segments,
                            stroke: stroke.then(|| state.graphics.stroke.unwrap_or(Rgb::BLACK)),
                            fill: fill.then(|| state.graphics.fill.unwrap_or(Rgb::BLACK)),
                            width,
                            bounds,
                        });
                    }
                }
            }
        }
        state.apply(operation);
    }

    debug!(?page_id, count = drawings.len(), "vector drawings collected");
    Ok(drawings)
}

fn reals(values: &[f32]) -> Vec<Object> {
    values.iter().copied().map(Object::Real).collect()
}

/// Operations that repaint `drawing` in an untransformed graphics state.
pub fn drawing_operations(drawing: &Drawing) -> Vec<Operation> {
    let mut ops = vec![Operation::new("q", vec![])];
    if let Some(stroke) = drawing.stroke {
        ops.push(Operation::new("RG", reals(&[stroke.r, stroke.g, stroke.b])));
        ops.push(Operation::new("w", reals(&[drawing.width])));
    }
    if let Some(fill) = drawing.fill {
        ops.push(Operation::new("rg", reals(&[fill.r, fill.g, fill.b])));
    }

    for segment in &drawing.segments {
        match segment {
            Segment::Line([(x0, y0), (x1, y1)]) => {
                ops.push(Operation::new("m", reals(&[*x0, *y0])));
                ops.push(Operation::new("l", reals(&[*x1, *y1])));
            }
            Segment::Quad([first, rest @ ..]) => {
                ops.push(Operation::new("m", reals(&[first.0, first.1])));
                for (x, y) in rest {
                    ops.push(Operation::new("l", reals(&[*x, *y])));
                }
                ops.push(Operation::new("h", vec![]));
            }
        }
    }

    let paint = match (drawing.stroke.is_some(), drawing.fill.is_some()) {
        (true, true) => "B",
        (true, false) => "S",
        _ => "f",
    };
    ops.push(Operation::new(paint, vec![]));
    ops.push(Operation::new("Q", vec![]));
    ops
}

/// Append `drawings` to the page as a separate content stream.
pub fn redraw(document: &mut Document, page_id: ObjectId, drawings: &[Drawing]) -> Result<()> {
    if drawings.is_empty() {
        return Ok(());
    }
    let operations: Vec<Operation> = drawings.iter().flat_map(drawing_operations).collect();
    let bytes = Content { operations }
        .encode()
        .map_err(|err| RetouchError::PdfError(format!("cannot encode drawings: {err}")))?;
    page::append_content(document, page_id, bytes)?;
    debug!(?page_id, count = drawings.len(), "drawings repainted");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pdf::fixtures::{self, DocumentBuilder, INVOICE_AMOUNT, INVOICE_RULE_Y};
    use crate::pdf::{load_document, page_id};

    #[test]
    fn invoice_rule_and_frame_are_found() {
        let doc = load_document(&fixtures::invoice()).unwrap();
        let id = page_id(&doc, 0).unwrap();
        let drawings = page_drawings(&doc, id).unwrap();
        assert_eq!(drawings.len(), 2);

        let rule = &drawings[0];
        assert_eq!(rule.segments.len(), 1);
        assert_eq!(rule.stroke, Some(Rgb::BLACK));
        assert_eq!(rule.fill, None);
        assert!((rule.width - 1.0).abs() < 1e-4);
        assert!((rule.bounds.y0 - (INVOICE_RULE_Y - 0.5)).abs() < 1e-3);
        assert!(rule.bounds.intersects(&INVOICE_AMOUNT.expand(30.0)));

        assert!(matches!(drawings[1].segments[0], Segment::Quad(_)));
    }

    #[test]
    fn ctm_is_applied_to_points_and_width() {
        let ops = vec![
            Operation::new("q", vec![]),
            Operation::new("cm", reals(&[2.0, 0.0, 0.0, 2.0, 10.0, 10.0])),
            Operation::new("w", reals(&[0.5])),
            Operation::new("m", reals(&[0.0, 0.0])),
            Operation::new("l", reals(&[50.0, 0.0])),
            Operation::new("S", vec![]),
            Operation::new("Q", vec![]),
        ];
        let doc = DocumentBuilder::new().page(|p| p.operations(ops)).build_document();
        let id = page_id(&doc, 0).unwrap();
        let drawings = page_drawings(&doc, id).unwrap();

        assert_eq!(drawings[0].segments, vec![Segment::Line([(10.0, 10.0), (110.0, 10.0)])]);
        assert!((drawings[0].width - 1.0).abs() < 1e-4);
    }

    #[test]
    fn discarded_and_clipping_paths_are_ignored() {
        let ops = vec![
            Operation::new("re", reals(&[0.0, 0.0, 100.0, 100.0])),
            Operation::new("W", vec![]),
            Operation::new("n", vec![]),
            Operation::new("rg", reals(&[1.0, 0.0, 0.0])),
            Operation::new("re", reals(&[10.0, 10.0, 20.0, 20.0])),
            Operation::new("f", vec![]),
        ];
        let doc = DocumentBuilder::new().page(|p| p.operations(ops)).build_document();
        let id = page_id(&doc, 0).unwrap();
        let drawings = page_drawings(&doc, id).unwrap();

        assert_eq!(drawings.len(), 1);
        assert_eq!(drawings[0].fill, Some(Rgb::new(1.0, 0.0, 0.0)));
        assert_eq!(drawings[0].stroke, None);
    }

    #[test]
    fn redraw_appends_identical_geometry() {
        let source = load_document(&fixtures::invoice()).unwrap();
        let source_id = page_id(&source, 0).unwrap();
        let drawings = page_drawings(&source, source_id).unwrap();

        let mut target = DocumentBuilder::new().page(|p| p).build_document();
        let target_id = page_id(&target, 0).unwrap();
        redraw(&mut target, target_id, &drawings).unwrap();

        let copied = page_drawings(&target, target_id).unwrap();
        assert_eq!(copied.len(), drawings.len());
        for (a, b) in copied.iter().zip(&drawings) {
            assert_eq!(a.stroke, b.stroke);
            assert!((a.width - b.width).abs() < 1e-4);
            assert!((a.bounds.x0 - b.bounds.x0).abs() < 1e-3);
            assert!((a.bounds.y1 - b.bounds.y1).abs() < 1e-3);
        }
    }
}
