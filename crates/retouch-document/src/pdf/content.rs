// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Content-stream interpretation: graphics state stack, text positioning and
// colour operators. Shared by the text scrub and drawing enumeration.

use lopdf::Object;
use lopdf::content::Operation;
use retouch_core::types::Rgb;

use super::page::number;

/// Affine matrix `[a b c d e f]` as used by `cm` and `Tm`.
pub type Matrix = [f32; 6];

pub const IDENTITY: Matrix = [1.0, 0.0, 0.0, 1.0, 0.0, 0.0];

/// `first` followed by `second` (PDF row-vector convention: `first × second`).
pub fn concat(first: &Matrix, second: &Matrix) -> Matrix {
    let [a1, b1, c1, d1, e1, f1] = *first;
    let [a2, b2, c2, d2, e2, f2] = *second;
    [
        a1 * a2 + b1 * c2,
        a1 * b2 + b1 * d2,
        c1 * a2 + d1 * c2,
        c1 * b2 + d1 * d2,
        e1 * a2 + f1 * c2 + e2,
        e1 * b2 + f1 * d2 + f2,
    ]
}

/// Map a point through `m`.
pub fn transform(m: &Matrix, x: f32, y: f32) -> (f32, f32) {
    (m[0] * x + m[2] * y + m[4], m[1] * x + m[3] * y + m[5])
}

/// Uniform scale factor of `m`, used to convert line widths to page units.
pub fn scale_of(m: &Matrix) -> f32 {
    (m[0] * m[3] - m[1] * m[2]).abs().sqrt()
}

/// Numeric operands of an operation; `None` if any operand is not a number.
pub fn numbers(operands: &[Object]) -> Option<Vec<f32>> {
    operands.iter().map(number).collect()
}

fn pair(operands: &[Object]) -> Option<[f32; 2]> {
    numbers(operands).and_then(|v| <[f32; 2]>::try_from(v.as_slice()).ok())
}

/// Device colour approximated as RGB.
fn colour_from(values: &[f32]) -> Option<Rgb> {
    match *values {
        [g] => Some(Rgb::gray(g)),
        [r, g, b] => Some(Rgb::new(r, g, b)),
        [c, m, y, k] => Some(Rgb::new(
            (1.0 - c) * (1.0 - k),
            (1.0 - m) * (1.0 - k),
            (1.0 - y) * (1.0 - k),
        )),
        _ => None,
    }
}

/// Graphics state tracked per `q`/`Q` level.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GraphicsState {
    pub ctm: Matrix,
    pub stroke: Option<Rgb>,
    pub fill: Option<Rgb>,
    pub line_width: f32,
}

impl Default for GraphicsState {
    fn default() -> Self {
        Self {
            ctm: IDENTITY,
            stroke: Some(Rgb::BLACK),
            fill: Some(Rgb::BLACK),
            line_width: 1.0,
        }
    }
}

/// Text positioning state inside a `BT`/`ET` object.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TextState {
    pub text_matrix: Matrix,
    pub line_matrix: Matrix,
    pub leading: f32,
    /// True while the text matrix is known exactly, i.e. no glyphs have been
    /// shown since the last positioning operator.
    pub positioned: bool,
}

impl Default for TextState {
    fn default() -> Self {
        Self {
            text_matrix: IDENTITY,
            line_matrix: IDENTITY,
            leading: 0.0,
            positioned: true,
        }
    }
}

impl TextState {
    fn translate_line(&mut self, tx: f32, ty: f32) {
        self.line_matrix = concat(&[1.0, 0.0, 0.0, 1.0, tx, ty], &self.line_matrix);
        self.text_matrix = self.line_matrix;
        self.positioned = true;
    }

    fn next_line(&mut self) {
        self.translate_line(0.0, -self.leading);
    }
}

/// Interpreter for the state-changing operators of a content stream.
///
/// Callers feed operations one at a time with [`ContentState::apply`] and
/// inspect the state around the operators they care about.
#[derive(Debug, Clone, Default)]
pub struct ContentState {
    pub graphics: GraphicsState,
    stack: Vec<GraphicsState>,
    pub text: TextState,
}

impl ContentState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Text-space origin of the next glyph, in PDF user space.
    pub fn text_origin(&self) -> (f32, f32) {
        let m = concat(&self.text.text_matrix, &self.graphics.ctm);
        (m[4], m[5])
    }

    /// Update positioning before a show operator runs. `'` and `"` move to
    /// the next line first.
    pub fn before_show(&mut self, operation: &Operation) {
        if matches!(operation.operator.as_str(), "'" | "\"") {
            self.text.next_line();
        }
    }

    /// Apply one operation's effect on graphics and text state. Show
    /// operators only clear `positioned`; advance widths are not tracked.
    pub fn apply(&mut self, operation: &Operation) {
        let operands = &operation.operands;
        match operation.operator.as_str() {
            "q" => self.stack.push(self.graphics),
            "Q" => {
                if let Some(saved) = self.stack.pop() {
                    self.graphics = saved;
                }
            }
            "cm" => {
                if let Some(v) = numbers(operands).filter(|v| v.len() == 6) {
                    let m = [v[0], v[1], v[2], v[3], v[4], v[5]];
                    self.graphics.ctm = concat(&m, &self.graphics.ctm);
                }
            }
            "w" => {
                if let Some(width) = operands.first().and_then(number) {
                    self.graphics.line_width = width;
                }
            }
            // Pattern and named colours have non-numeric operands and are
            // ignored.
            "G" | "RG" | "K" | "SC" | "SCN" => {
                if let Some(colour) = numbers(operands).as_deref().and_then(colour_from) {
                    self.graphics.stroke = Some(colour);
                }
            }
            "g" | "rg" | "k" | "sc" | "scn" => {
                if let Some(colour) = numbers(operands).as_deref().and_then(colour_from) {
                    self.graphics.fill = Some(colour);
                }
            }
            "CS" => self.graphics.stroke = Some(Rgb::BLACK),
            "cs" => self.graphics.fill = Some(Rgb::BLACK),

            "BT" => self.text = TextState {
                leading: self.text.leading,
                ..TextState::default()
            },
            "Tm" => {
                if let Some(v) = numbers(operands).filter(|v| v.len() == 6) {
                    self.text.text_matrix = [v[0], v[1], v[2], v[3], v[4], v[5]];
                    self.text.line_matrix = self.text.text_matrix;
                    self.text.positioned = true;
                }
            }
            "Td" => {
                if let Some([tx, ty]) = pair(operands) {
                    self.text.translate_line(tx, ty);
                }
            }
            "TD" => {
                if let Some([tx, ty]) = pair(operands) {
                    self.text.leading = -ty;
                    self.text.translate_line(tx, ty);
                }
            }
            "TL" => {
                if let Some(leading) = operands.first().and_then(number) {
                    self.text.leading = leading;
                }
            }
            "T*" => self.text.next_line(),
            "Tj" | "TJ" | "'" | "\"" => self.text.positioned = false,
            _ => {}
        }
    }
}

/// Whether the operator paints glyphs.
pub fn is_show_operator(operator: &str) -> bool {
    matches!(operator, "Tj" | "TJ" | "'" | "\"")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn op(operator: &str, operands: Vec<Object>) -> Operation {
        Operation::new(operator, operands)
    }

    fn nums(values: &[f32]) -> Vec<Object> {
        values.iter().map(|v| Object::Real(*v)).collect()
    }

    #[test]
    fn concat_applies_translation_after_scale() {
        let scale = [2.0, 0.0, 0.0, 2.0, 0.0, 0.0];
        let translate = [1.0, 0.0, 0.0, 1.0, 10.0, 20.0];
        let m = concat(&scale, &translate);
        assert_eq!(transform(&m, 1.0, 1.0), (12.0, 22.0));
    }

    #[test]
    fn text_origin_follows_td_and_ctm() {
        let mut state = ContentState::new();
        state.apply(&op("cm", nums(&[1.0, 0.0, 0.0, 1.0, 0.0, 100.0])));
        state.apply(&op("BT", vec![]));
        state.apply(&op("Td", nums(&[72.0, 500.0])));
        assert_eq!(state.text_origin(), (72.0, 600.0));
        assert!(state.text.positioned);

        state.apply(&op("Tj", vec![Object::string_literal("x")]));
        assert!(!state.text.positioned);
    }

    #[test]
    fn td_leading_drives_next_line() {
        let mut state = ContentState::new();
        state.apply(&op("BT", vec![]));
        state.apply(&op("Td", nums(&[50.0, 700.0])));
        state.apply(&op("TD", nums(&[0.0, -14.0])));
        assert_eq!(state.text_origin(), (50.0, 686.0));

        let quote = op("'", vec![Object::string_literal("next")]);
        state.before_show(&quote);
        assert_eq!(state.text_origin(), (50.0, 672.0));
    }

    #[test]
    fn q_restores_graphics_state() {
        let mut state = ContentState::new();
        state.apply(&op("q", vec![]));
        state.apply(&op("RG", nums(&[1.0, 0.0, 0.0])));
        state.apply(&op("w", nums(&[3.0])));
        assert_eq!(state.graphics.stroke, Some(Rgb::new(1.0, 0.0, 0.0)));
        state.apply(&op("Q", vec![]));
        assert_eq!(state.graphics, GraphicsState::default());
    }

    #[test]
    fn cmyk_black_is_black() {
        let mut state = ContentState::new();
        state.apply(&op("k", nums(&[0.0, 0.0, 0.0, 1.0])));
        assert_eq!(state.graphics.fill, Some(Rgb::BLACK));
    }

    #[test]
    fn scale_of_uniform_matrix() {
        assert_eq!(scale_of(&[2.0, 0.0, 0.0, 2.0, 5.0, 5.0]), 2.0);
    }
}
