// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Core domain types for the Retouch edit pipeline.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::{RetouchError, Result};

/// Content-addressed identifier for a stored document.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DocumentId(pub String);

impl DocumentId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for DocumentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

// -- Geometry -----------------------------------------------------------------

/// Axis-aligned rectangle in page space: origin top-left, y grows downward,
/// units are PDF points.
///
/// Callers may hand over inverted or zero-area rectangles; every geometric
/// helper normalises first instead of assuming `x0 <= x1`.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Rect {
    pub x0: f32,
    pub y0: f32,
    pub x1: f32,
    pub y1: f32,
}

impl Rect {
    pub const fn new(x0: f32, y0: f32, x1: f32, y1: f32) -> Self {
        Self { x0, y0, x1, y1 }
    }

    /// Same rectangle with ordered corners.
    pub fn normalized(&self) -> Self {
        Self {
            x0: self.x0.min(self.x1),
            y0: self.y0.min(self.y1),
            x1: self.x0.max(self.x1),
            y1: self.y0.max(self.y1),
        }
    }

    pub fn width(&self) -> f32 {
        (self.x1 - self.x0).abs()
    }

    pub fn height(&self) -> f32 {
        (self.y1 - self.y0).abs()
    }

    /// True when the rectangle encloses no area.
    pub fn is_empty(&self) -> bool {
        !(self.width() > 0.0 && self.height() > 0.0)
    }

    /// Whether all four coordinates are finite numbers.
    pub fn is_finite(&self) -> bool {
        self.x0.is_finite() && self.y0.is_finite() && self.x1.is_finite() && self.y1.is_finite()
    }

    /// Intersection test that treats touching edges as intersecting, which is
    /// what a one-dimensional rule line lying on a box edge needs.
    pub fn intersects(&self, other: &Rect) -> bool {
        let a = self.normalized();
        let b = other.normalized();
        a.x0 <= b.x1 && b.x0 <= a.x1 && a.y0 <= b.y1 && b.y0 <= a.y1
    }

    /// Strict overlap: the intersection has positive area.
    pub fn overlaps(&self, other: &Rect) -> bool {
        let a = self.normalized();
        let b = other.normalized();
        a.x0 < b.x1 && b.x0 < a.x1 && a.y0 < b.y1 && b.y0 < a.y1
    }

    /// Whether the point lies inside, edges included.
    pub fn contains_point(&self, x: f32, y: f32) -> bool {
        let r = self.normalized();
        x >= r.x0 && x <= r.x1 && y >= r.y0 && y <= r.y1
    }

    /// Grow by `margin` on every side.
    pub fn expand(&self, margin: f32) -> Self {
        let r = self.normalized();
        Self {
            x0: r.x0 - margin,
            y0: r.y0 - margin,
            x1: r.x1 + margin,
            y1: r.y1 + margin,
        }
    }

    /// Clamp into `bounds`. A rectangle entirely outside collapses onto the
    /// nearest bounds edge rather than inverting.
    pub fn clamp_to(&self, bounds: &Rect) -> Self {
        let r = self.normalized();
        let b = bounds.normalized();
        let x0 = r.x0.clamp(b.x0, b.x1);
        let y0 = r.y0.clamp(b.y0, b.y1);
        Self {
            x0,
            y0,
            x1: r.x1.clamp(x0, b.x1),
            y1: r.y1.clamp(y0, b.y1),
        }
    }

    /// Bounding box of a set of points, or `None` for an empty set.
    pub fn bounding(points: impl IntoIterator<Item = (f32, f32)>) -> Option<Self> {
        points.into_iter().fold(None, |acc, (x, y)| {
            Some(match acc {
                None => Self::new(x, y, x, y),
                Some(r) => Self::new(r.x0.min(x), r.y0.min(y), r.x1.max(x), r.y1.max(y)),
            })
        })
    }
}

// -- Colour and style -----------------------------------------------------------

/// RGB colour with channels in `0.0..=1.0`, as PDF colour operators expect.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rgb {
    pub r: f32,
    pub g: f32,
    pub b: f32,
}

impl Rgb {
    pub const BLACK: Rgb = Rgb { r: 0.0, g: 0.0, b: 0.0 };
    pub const WHITE: Rgb = Rgb { r: 1.0, g: 1.0, b: 1.0 };

    pub const fn new(r: f32, g: f32, b: f32) -> Self {
        Self { r, g, b }
    }

    pub fn gray(level: f32) -> Self {
        Self::new(level, level, level)
    }

    /// Parse `#RRGGBB` (the leading `#` is optional).
    pub fn from_hex(hex: &str) -> Option<Self> {
        let digits = hex.trim().trim_start_matches('#');
        if digits.len() != 6 || !digits.is_ascii() {
            return None;
        }
        let channel = |range: std::ops::Range<usize>| {
            u8::from_str_radix(&digits[range], 16)
                .ok()
                .map(|v| f32::from(v) / 255.0)
        };
        Some(Self::new(channel(0..2)?, channel(2..4)?, channel(4..6)?))
    }

    /// Render back to `#RRGGBB`.
    pub fn to_hex(&self) -> String {
        let byte = |c: f32| (c.clamp(0.0, 1.0) * 255.0).round() as u8;
        format!("#{:02X}{:02X}{:02X}", byte(self.r), byte(self.g), byte(self.b))
    }
}

/// Span style flags as produced by text extraction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StyleFlags(pub u32);

impl StyleFlags {
    pub const SUPERSCRIPT: u32 = 1;
    pub const ITALIC: u32 = 1 << 1;
    pub const SERIF: u32 = 1 << 2;
    pub const MONOSPACE: u32 = 1 << 3;
    pub const BOLD: u32 = 1 << 4;

    pub const fn empty() -> Self {
        Self(0)
    }

    pub const fn contains(&self, bit: u32) -> bool {
        self.0 & bit == bit
    }

    pub const fn is_bold(&self) -> bool {
        self.contains(Self::BOLD)
    }

    pub const fn is_italic(&self) -> bool {
        self.contains(Self::ITALIC)
    }

    pub const fn with(self, bit: u32) -> Self {
        Self(self.0 | bit)
    }
}

// -- Edits -----------------------------------------------------------------------

/// One overlay edit as it arrives on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EditOperation {
    /// 0-based page number.
    pub page: usize,
    pub rect: Rect,
    /// Advisory only; the engine never reads it.
    #[serde(default)]
    pub original_text: String,
    pub new_text: String,
    /// Cleaned font family name, possibly empty.
    #[serde(default = "default_font")]
    pub font: String,
    #[serde(default = "default_font_size")]
    pub font_size: f32,
    /// `#RRGGBB`.
    #[serde(default = "default_color")]
    pub color: String,
    #[serde(default, alias = "flags")]
    pub style_flags: u32,
    /// True glyph baseline from extraction; `0` means unset.
    #[serde(default, alias = "origin_y")]
    pub baseline_y: f32,
}

fn default_font() -> String {
    "helv".to_string()
}

fn default_font_size() -> f32 {
    11.0
}

fn default_color() -> String {
    "#000000".to_string()
}

/// Decoded edit used internally by the pipeline.
#[derive(Debug, Clone, PartialEq)]
pub struct Edit {
    pub page: usize,
    pub rect: Rect,
    pub new_text: String,
    pub font: String,
    pub font_size: f32,
    pub color: Rgb,
    pub style: StyleFlags,
    /// Caller-supplied baseline, present only when positive.
    pub baseline: Option<f32>,
}

impl EditOperation {
    /// Decode the wire representation. `index` is the edit's position in the
    /// request and is only used for error reporting.
    pub fn decode(&self, index: usize) -> Result<Edit> {
        let invalid = |reason: String| RetouchError::InvalidEdit { index, reason };

        if !self.font_size.is_finite() || self.font_size <= 0.0 {
            return Err(invalid(format!("font size must be positive, got {}", self.font_size)));
        }
        if !self.rect.is_finite() {
            return Err(invalid("rectangle has non-finite coordinates".into()));
        }
        let color = Rgb::from_hex(&self.color)
            .ok_or_else(|| invalid(format!("colour {:?} is not #RRGGBB", self.color)))?;
        let baseline = (self.baseline_y.is_finite() && self.baseline_y > 0.0).then_some(self.baseline_y);

        Ok(Edit {
            page: self.page,
            rect: self.rect,
            new_text: self.new_text.clone(),
            font: self.font.trim().to_string(),
            font_size: self.font_size,
            color,
            style: StyleFlags(self.style_flags),
            baseline,
        })
    }
}

/// Decode a whole request, failing on the first malformed edit.
pub fn decode_edits(ops: &[EditOperation]) -> Result<Vec<Edit>> {
    ops.iter().enumerate().map(|(i, op)| op.decode(i)).collect()
}

// -- Fonts -------------------------------------------------------------------------

/// A font program extracted from a document and stored on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FontAsset {
    pub family: String,
    pub path: PathBuf,
}

/// Lookup of embedded font assets for the document being edited.
pub trait FontLookup {
    fn find(&self, family: &str) -> Option<FontAsset>;
}

/// Lookup that never finds anything, forcing builtin fonts.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoEmbeddedFonts;

impl FontLookup for NoEmbeddedFonts {
    fn find(&self, _family: &str) -> Option<FontAsset> {
        None
    }
}

// -- Quality reports -------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    #[default]
    Low,
    Medium,
    High,
}

impl Severity {
    /// Lenient parse; anything unrecognised is `Low`.
    pub fn parse_lenient(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "high" | "critical" | "severe" => Self::High,
            "medium" | "moderate" => Self::Medium,
            _ => Self::Low,
        }
    }
}

/// Structured class of a visual defect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IssueCategory {
    Border,
    Alignment,
    Font,
    Color,
    Artifact,
    Other,
}

impl IssueCategory {
    pub fn parse_lenient(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "border" | "line" | "rule" | "borders" | "lines" => Self::Border,
            "alignment" | "misalignment" | "position" => Self::Alignment,
            "font" | "weight" | "style" | "size" => Self::Font,
            "color" | "colour" => Self::Color,
            "artifact" | "artefact" => Self::Artifact,
            _ => Self::Other,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityIssue {
    pub severity: Severity,
    pub description: String,
    pub suggestion: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<IssueCategory>,
}

impl QualityIssue {
    /// Whether the issue describes lost vector strokes (borders, rules, lines).
    ///
    /// A structured category wins; free-text matching is the fallback for
    /// verdicts that carry no category.
    pub fn is_border_damage(&self) -> bool {
        if self.category == Some(IssueCategory::Border) {
            return true;
        }
        let text = self.description.to_lowercase();
        ["border", "line", "rule"].iter().any(|needle| text.contains(needle))
    }
}

/// Verdict for one edit, in request order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityReport {
    pub edit_index: usize,
    pub page: usize,
    pub passed: bool,
    pub issues: Vec<QualityIssue>,
    #[serde(skip)]
    pub raw_response: String,
}

impl QualityReport {
    /// A passing report with no issues.
    pub fn pass(edit_index: usize, page: usize) -> Self {
        Self {
            edit_index,
            page,
            passed: true,
            issues: Vec::new(),
            raw_response: String::new(),
        }
    }

    pub fn has_border_damage(&self) -> bool {
        !self.passed && self.issues.iter().any(QualityIssue::is_border_damage)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rect_helpers_tolerate_inverted_input() {
        let r = Rect::new(50.0, 40.0, 10.0, 20.0);
        assert_eq!(r.normalized(), Rect::new(10.0, 20.0, 50.0, 40.0));
        assert_eq!(r.width(), 40.0);
        assert!(r.intersects(&Rect::new(0.0, 0.0, 15.0, 25.0)));
    }

    #[test]
    fn zero_area_rect_is_empty_but_still_intersects_on_edge() {
        let line = Rect::new(0.0, 100.0, 200.0, 100.0);
        assert!(line.is_empty());
        assert!(line.intersects(&Rect::new(50.0, 90.0, 60.0, 100.0)));
        assert!(!line.intersects(&Rect::new(50.0, 101.0, 60.0, 110.0)));
    }

    #[test]
    fn clamp_never_exceeds_bounds() {
        let page = Rect::new(0.0, 0.0, 612.0, 792.0);
        let padded = Rect::new(90.0, 190.0, 190.0, 225.0).expand(120.0);
        let clamped = padded.clamp_to(&page);
        assert_eq!(clamped, Rect::new(0.0, 70.0, 310.0, 345.0));

        let outside = Rect::new(700.0, 800.0, 900.0, 900.0).clamp_to(&page);
        assert!(outside.is_empty());
        assert!(outside.x0 <= outside.x1 && outside.y0 <= outside.y1);
    }

    #[test]
    fn hex_colour_parsing() {
        assert_eq!(Rgb::from_hex("#FF0000"), Some(Rgb::new(1.0, 0.0, 0.0)));
        assert_eq!(Rgb::from_hex("000000"), Some(Rgb::BLACK));
        assert_eq!(Rgb::from_hex("#12345"), None);
        assert_eq!(Rgb::from_hex("#GG0000"), None);
        assert_eq!(Rgb::from_hex("#1A2B3C").map(|c| c.to_hex()), Some("#1A2B3C".into()));
    }

    #[test]
    fn style_flags_bits() {
        let flags = StyleFlags(StyleFlags::BOLD | StyleFlags::SERIF);
        assert!(flags.is_bold());
        assert!(!flags.is_italic());
        assert!(StyleFlags::empty().with(StyleFlags::ITALIC).is_italic());
    }

    #[test]
    fn edit_operation_accepts_extraction_field_names() {
        let json = r##"{
            "page": 0,
            "rect": {"x0": 100, "y0": 200, "x1": 180, "y1": 215},
            "new_text": "36500001",
            "font": "ArialMT",
            "font_size": 9.5,
            "color": "#333333",
            "flags": 16,
            "origin_y": 212.4
        }"##;
        let op: EditOperation = serde_json::from_str(json).unwrap();
        assert_eq!(op.style_flags, 16);
        assert_eq!(op.baseline_y, 212.4);

        let edit = op.decode(0).unwrap();
        assert!(edit.style.is_bold());
        assert_eq!(edit.baseline, Some(212.4));
        assert_eq!(edit.color, Rgb::from_hex("#333333").unwrap());
    }

    #[test]
    fn edit_operation_defaults() {
        let json = r#"{"page": 1, "rect": {"x0": 0, "y0": 0, "x1": 1, "y1": 1}, "new_text": "x"}"#;
        let op: EditOperation = serde_json::from_str(json).unwrap();
        assert_eq!(op.font, "helv");
        assert_eq!(op.font_size, 11.0);
        assert_eq!(op.color, "#000000");
        assert_eq!(op.decode(0).unwrap().baseline, None);
    }

    #[test]
    fn negative_page_is_rejected_on_the_wire() {
        let json = r#"{"page": -1, "rect": {"x0": 0, "y0": 0, "x1": 1, "y1": 1}, "new_text": "x"}"#;
        assert!(serde_json::from_str::<EditOperation>(json).is_err());
    }

    #[test]
    fn malformed_edits_are_input_errors() {
        let base: EditOperation = serde_json::from_str(
            r#"{"page": 0, "rect": {"x0": 0, "y0": 0, "x1": 1, "y1": 1}, "new_text": "x"}"#,
        )
        .unwrap();

        let bad_colour = EditOperation { color: "red".into(), ..base.clone() };
        let err = decode_edits(&[base.clone(), bad_colour]).unwrap_err();
        assert!(matches!(err, RetouchError::InvalidEdit { index: 1, .. }));

        let bad_size = EditOperation { font_size: 0.0, ..base };
        assert!(bad_size.decode(0).unwrap_err().is_input_error());
    }

    #[test]
    fn border_damage_detection() {
        let issue = |description: &str, category| QualityIssue {
            severity: Severity::High,
            description: description.into(),
            suggestion: String::new(),
            category,
        };
        assert!(issue("The table Border below the cell is gone", None).is_border_damage());
        assert!(issue("horizontal rule cut short", None).is_border_damage());
        assert!(issue("stroke missing", Some(IssueCategory::Border)).is_border_damage());
        assert!(!issue("text is bolder than before", Some(IssueCategory::Font)).is_border_damage());
    }

    #[test]
    fn report_wire_shape() {
        let mut report = QualityReport::pass(2, 0);
        report.raw_response = "internal".into();
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"edit_index": 2, "page": 0, "passed": true, "issues": []})
        );
        assert_eq!(Severity::parse_lenient("HIGH"), Severity::High);
        assert_eq!(Severity::parse_lenient("whatever"), Severity::Low);
    }
}
