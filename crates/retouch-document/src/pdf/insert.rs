// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Baseline text insertion. Each edit either updates the form field under
// it, or covers the region and writes the replacement on the baseline with
// the resolved font, falling back to Helvetica once.

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::io;
use std::path::PathBuf;

use lopdf::content::{Content, Operation};
use lopdf::{Document, Object, ObjectId, StringFormat};
use retouch_core::config::OverlayConfig;
use retouch_core::error::RetouchError;
use retouch_core::types::Edit;
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use super::cover::RegionCoverer;
use super::embed::{GlyphCoverage, builtin_font_dict, embed_font_file};
use super::fonts::{BuiltinFont, FontSelection};
use super::page::{self, PageGeometry};
use super::widgets::{find_widget, set_widget_value};
use super::winansi;

/// Failure to place text for one edit.
#[derive(Debug, Error)]
pub enum InsertError {
    #[error("cannot read font file {path}: {source}")]
    FontRead {
        path: String,
        #[source]
        source: io::Error,
    },

    #[error("font {0} is not usable: {1}")]
    UnsupportedFont(String, String),

    #[error("PDF operation failed: {0}")]
    Pdf(String),
}

impl From<RetouchError> for InsertError {
    fn from(err: RetouchError) -> Self {
        InsertError::Pdf(err.to_string())
    }
}

/// What happened to one edit.
#[derive(Debug, Clone, PartialEq)]
pub enum InsertOutcome {
    /// A form field sat under the edit and took the new value.
    Widget { field: String },
    /// A form field sat under the edit but could not take the value; the
    /// page is unchanged.
    WidgetFailed { field: String, reason: String },
    /// Region covered and text written with the resolved font.
    Text { font: String, scrubbed: usize },
    /// Resolved font failed; text written with Helvetica instead.
    Fallback { font: String, reason: String },
}

// -- Font registry -----------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum FontKey {
    Builtin(BuiltinFont),
    Embedded(PathBuf),
}

impl From<&FontSelection> for FontKey {
    fn from(selection: &FontSelection) -> Self {
        match selection {
            FontSelection::Builtin(font) => FontKey::Builtin(*font),
            FontSelection::Embedded(asset) => FontKey::Embedded(asset.path.clone()),
        }
    }
}

/// A font object in the document. Standard fonts carry no coverage and
/// draw every WinAnsi code.
#[derive(Debug, Clone)]
struct RegisteredFont {
    id: ObjectId,
    coverage: Option<GlyphCoverage>,
}

/// Font objects added to one document and the resource names under which
/// each page refers to them.
#[derive(Debug, Default)]
pub struct FontRegistry {
    fonts: HashMap<FontKey, RegisteredFont>,
    names: HashMap<(ObjectId, ObjectId), Vec<u8>>,
    next: usize,
}

impl FontRegistry {
    /// Font dictionary id for `selection`, creating it on first use. An
    /// embedded program without a glyph for some character of `text` is
    /// unsupported for that text.
    pub fn font_object(
        &mut self,
        document: &mut Document,
        selection: &FontSelection,
        text: &str,
    ) -> Result<ObjectId, InsertError> {
        let font = match self.fonts.entry(FontKey::from(selection)) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => {
                let font = match selection {
                    FontSelection::Builtin(font) => RegisteredFont {
                        id: document.add_object(builtin_font_dict(*font)),
                        coverage: None,
                    },
                    FontSelection::Embedded(asset) => {
                        let (id, coverage) = embed_font_file(document, asset)?;
                        RegisteredFont {
                            id,
                            coverage: Some(coverage),
                        }
                    }
                };
                entry.insert(font)
            }
        };

        if let Some(ch) = font.coverage.as_ref().and_then(|coverage| coverage.missing(text)) {
            return Err(InsertError::UnsupportedFont(
                selection.describe(),
                format!("no glyph for {ch:?}"),
            ));
        }
        Ok(font.id)
    }

    /// Resource name for `font_id` on the page, registering it once.
    pub fn resource_name(
        &mut self,
        document: &mut Document,
        page_id: ObjectId,
        font_id: ObjectId,
    ) -> Result<Vec<u8>, InsertError> {
        if let Some(name) = self.names.get(&(page_id, font_id)) {
            return Ok(name.clone());
        }
        let taken = page::font_names(document, page_id);
        let name = loop {
            self.next += 1;
            let candidate = format!("RtF{}", self.next).into_bytes();
            if !taken.contains(&candidate) {
                break candidate;
            }
        };
        page::add_font_resource(document, page_id, &name, font_id)?;
        self.names.insert((page_id, font_id), name.clone());
        Ok(name)
    }
}

// -- Inserter ----------------------------------------------------------------

/// Applies edits to pages of one open document.
#[derive(Debug)]
pub struct BaselineTextInserter {
    coverer: RegionCoverer,
    registry: FontRegistry,
    descender_ratio: f32,
}

impl BaselineTextInserter {
    pub fn new(config: &OverlayConfig) -> Self {
        Self {
            coverer: RegionCoverer::new(config.cover_inset),
            registry: FontRegistry::default(),
            descender_ratio: config.descender_ratio,
        }
    }

    /// Baseline in top-left coordinates: the supplied one, or an estimate
    /// a descender above the bottom of the rectangle.
    pub fn baseline(&self, edit: &Edit) -> f32 {
        edit.baseline
            .unwrap_or_else(|| edit.rect.normalized().y1 - edit.font_size * self.descender_ratio)
    }

    #[instrument(skip_all, fields(page = edit.page, font = %selection.describe()))]
    pub fn insert(
        &mut self,
        document: &mut Document,
        page_id: ObjectId,
        edit: &Edit,
        selection: &FontSelection,
    ) -> Result<InsertOutcome, InsertError> {
        if let Some(hit) = find_widget(document, page_id, &edit.rect) {
            return Ok(match set_widget_value(document, &hit, &edit.new_text) {
                Ok(()) => InsertOutcome::Widget { field: hit.name },
                Err(err) => {
                    warn!(field = %hit.name, error = %err, "form field update failed, edit skipped");
                    InsertOutcome::WidgetFailed {
                        field: hit.name,
                        reason: err.to_string(),
                    }
                }
            });
        }

        let covered = self.coverer.cover(document, page_id, &edit.rect)?;
        let baseline = self.baseline(edit);

        match self.write_text(document, page_id, edit, selection, baseline) {
            Ok(()) => {
                debug!(baseline, scrubbed = covered.scrubbed, "text inserted");
                Ok(InsertOutcome::Text {
                    font: selection.describe(),
                    scrubbed: covered.scrubbed,
                })
            }
            Err(err) => {
                warn!(error = %err, "insertion failed, retrying with Helvetica");
                let fallback = FontSelection::Builtin(BuiltinFont::Helvetica);
                self.write_text(document, page_id, edit, &fallback, baseline)?;
                info!("text inserted with fallback font");
                Ok(InsertOutcome::Fallback {
                    font: fallback.describe(),
                    reason: err.to_string(),
                })
            }
        }
    }

    fn write_text(
        &mut self,
        document: &mut Document,
        page_id: ObjectId,
        edit: &Edit,
        selection: &FontSelection,
        baseline: f32,
    ) -> Result<(), InsertError> {
        let font_id = self.registry.font_object(document, selection, &edit.new_text)?;
        let name = self.registry.resource_name(document, page_id, font_id)?;

        let geometry = PageGeometry::of(document, page_id);
        let x = geometry.pdf_x(edit.rect.normalized().x0);
        let y = geometry.pdf_y(baseline);
        let colour = edit.color;

        let operations = vec![
            Operation::new("q", vec![]),
            Operation::new(
                "rg",
                vec![Object::Real(colour.r), Object::Real(colour.g), Object::Real(colour.b)],
            ),
            Operation::new("BT", vec![]),
            Operation::new("Tf", vec![Object::Name(name), Object::Real(edit.font_size)]),
            Operation::new(
                "Tm",
                vec![
                    Object::Integer(1),
                    Object::Integer(0),
                    Object::Integer(0),
                    Object::Integer(1),
                    Object::Real(x),
                    Object::Real(y),
                ],
            ),
            Operation::new(
                "Tj",
                vec![Object::String(winansi::encode(&edit.new_text), StringFormat::Literal)],
            ),
            Operation::new("ET", vec![]),
            Operation::new("Q", vec![]),
        ];
        let bytes = Content { operations }
            .encode()
            .map_err(|err| InsertError::Pdf(format!("cannot encode text: {err}")))?;
        page::append_content(document, page_id, bytes)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pdf::fixtures::{self, DocumentBuilder, INVOICE_AMOUNT, INVOICE_BASELINE};
    use crate::pdf::{load_document, page_id};
    use retouch_core::types::{FontAsset, Rect, Rgb, StyleFlags};

    fn edit(rect: Rect, text: &str, baseline: Option<f32>) -> Edit {
        Edit {
            page: 0,
            rect,
            new_text: text.to_string(),
            font: "helv".into(),
            font_size: 11.0,
            color: Rgb::BLACK,
            style: StyleFlags::empty(),
            baseline,
        }
    }

    fn helvetica() -> FontSelection {
        FontSelection::Builtin(BuiltinFont::Helvetica)
    }

    fn operations(doc: &Document, id: ObjectId) -> Vec<Operation> {
        let raw = page::page_content(doc, id).unwrap();
        Content::decode(&raw).unwrap().operations
    }

    fn text_position(ops: &[Operation]) -> Vec<f32> {
        ops.iter()
            .rev()
            .find(|op| op.operator == "Tm")
            .map(|op| op.operands.iter().filter_map(page::number).collect())
            .unwrap_or_default()
    }

    #[test]
    fn writes_on_supplied_baseline() {
        let mut doc = load_document(&fixtures::invoice()).unwrap();
        let id = page_id(&doc, 0).unwrap();
        let mut inserter = BaselineTextInserter::new(&OverlayConfig::default());

        let outcome = inserter
            .insert(&mut doc, id, &edit(INVOICE_AMOUNT, "36500001", Some(INVOICE_BASELINE)), &helvetica())
            .unwrap();
        assert_eq!(
            outcome,
            InsertOutcome::Text {
                font: "Helvetica".into(),
                scrubbed: 1
            }
        );

        let position = text_position(&operations(&doc, id));
        assert_eq!(position[4], 100.0);
        assert!((position[5] - (792.0 - INVOICE_BASELINE)).abs() < 1e-3);
    }

    #[test]
    fn estimates_baseline_from_descender() {
        let inserter = BaselineTextInserter::new(&OverlayConfig::default());
        let estimated = inserter.baseline(&edit(INVOICE_AMOUNT, "x", None));
        assert!((estimated - (215.0 - 11.0 * 0.2)).abs() < 1e-4);
        assert_eq!(inserter.baseline(&edit(INVOICE_AMOUNT, "x", Some(212.0))), 212.0);
    }

    #[test]
    fn font_resource_is_registered_once_per_page() {
        let mut doc = load_document(&fixtures::invoice()).unwrap();
        let id = page_id(&doc, 0).unwrap();
        let mut inserter = BaselineTextInserter::new(&OverlayConfig::default());

        inserter
            .insert(&mut doc, id, &edit(INVOICE_AMOUNT, "1", None), &helvetica())
            .unwrap();
        inserter
            .insert(&mut doc, id, &edit(Rect::new(300.0, 300.0, 350.0, 315.0), "2", None), &helvetica())
            .unwrap();

        let mut names = page::font_names(&doc, id);
        names.sort();
        assert_eq!(names, vec![b"F1".to_vec(), b"RtF1".to_vec()]);
    }

    #[test]
    fn unreadable_embedded_font_falls_back_to_helvetica() {
        let mut doc = load_document(&fixtures::invoice()).unwrap();
        let id = page_id(&doc, 0).unwrap();
        let mut inserter = BaselineTextInserter::new(&OverlayConfig::default());
        let missing = FontSelection::Embedded(FontAsset {
            family: "ArialMT".into(),
            path: PathBuf::from("/nonexistent/ArialMT.ttf"),
        });

        let outcome = inserter
            .insert(&mut doc, id, &edit(INVOICE_AMOUNT, "36500001", None), &missing)
            .unwrap();
        assert!(matches!(outcome, InsertOutcome::Fallback { ref font, .. } if font == "Helvetica"));

        let raw = page::page_content(&doc, id).unwrap();
        assert!(String::from_utf8_lossy(&raw).contains("(36500001) Tj"));
    }

    fn subset(dir: &std::path::Path, chars: &str) -> FontSelection {
        let path = dir.join("Subset.ttf");
        std::fs::write(&path, fixtures::truetype_font(chars)).unwrap();
        FontSelection::Embedded(FontAsset {
            family: "Subset".into(),
            path,
        })
    }

    #[test]
    fn embedded_font_covering_the_text_is_used() {
        let dir = tempfile::tempdir().unwrap();
        let mut doc = load_document(&fixtures::invoice()).unwrap();
        let id = page_id(&doc, 0).unwrap();
        let mut inserter = BaselineTextInserter::new(&OverlayConfig::default());

        let outcome = inserter
            .insert(&mut doc, id, &edit(INVOICE_AMOUNT, "36500000", None), &subset(dir.path(), "0356"))
            .unwrap();
        assert_eq!(
            outcome,
            InsertOutcome::Text {
                font: "embedded Subset".into(),
                scrubbed: 1
            }
        );
    }

    #[test]
    fn glyph_missing_from_subset_falls_back_to_helvetica() {
        let dir = tempfile::tempdir().unwrap();
        let mut doc = load_document(&fixtures::invoice()).unwrap();
        let id = page_id(&doc, 0).unwrap();
        let mut inserter = BaselineTextInserter::new(&OverlayConfig::default());

        let outcome = inserter
            .insert(&mut doc, id, &edit(INVOICE_AMOUNT, "36500001", None), &subset(dir.path(), "0356"))
            .unwrap();
        assert!(matches!(
            outcome,
            InsertOutcome::Fallback { ref font, ref reason } if font == "Helvetica" && reason.contains("'1'")
        ));

        let raw = page::page_content(&doc, id).unwrap();
        assert!(String::from_utf8_lossy(&raw).contains("(36500001) Tj"));
        let mut names = page::font_names(&doc, id);
        names.sort();
        assert_eq!(names, vec![b"F1".to_vec(), b"RtF1".to_vec()]);
    }

    #[test]
    fn widget_under_edit_takes_value_without_overlay() {
        let mut doc = load_document(&fixtures::signed_form()).unwrap();
        let id = page_id(&doc, 0).unwrap();
        let before = operations(&doc, id).len();
        let mut inserter = BaselineTextInserter::new(&OverlayConfig::default());

        let outcome = inserter
            .insert(&mut doc, id, &edit(Rect::new(150.0, 82.0, 300.0, 102.0), "250", None), &helvetica())
            .unwrap();
        assert_eq!(outcome, InsertOutcome::Widget { field: "amount".into() });
        assert_eq!(operations(&doc, id).len(), before);
    }

    #[test]
    fn unsupported_widget_degrades_to_no_op() {
        let mut doc = DocumentBuilder::new()
            .page(|p| p.checkbox("agree", [100.0, 100.0, 112.0, 112.0]))
            .build_document();
        let id = page_id(&doc, 0).unwrap();
        let mut inserter = BaselineTextInserter::new(&OverlayConfig::default());

        let outcome = inserter
            .insert(&mut doc, id, &edit(Rect::new(95.0, 675.0, 120.0, 700.0), "x", None), &helvetica())
            .unwrap();
        assert!(matches!(outcome, InsertOutcome::WidgetFailed { ref field, .. } if field == "agree"));
        assert!(operations(&doc, id).is_empty());
    }
}
