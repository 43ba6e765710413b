// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Overlay editor: the export path. Opens a document, strips signature
// locks, applies every edit in order and serialises the result.

use retouch_core::config::OverlayConfig;
use retouch_core::error::Result;
use retouch_core::types::{Edit, FontLookup};
use serde::Serialize;
use tracing::{info, instrument, warn};

use super::fonts::{clean_font_name, resolve_font};
use super::insert::{BaselineTextInserter, InsertOutcome};
use super::signature::SignatureStripper;
use super::{load_document, page_id, save_document};

/// Per-edit result, in request order.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum EditResult {
    Widget { field: String },
    Overlay { font: String, scrubbed: usize },
    Fallback { font: String, reason: String },
    Failed { reason: String },
}

impl From<InsertOutcome> for EditResult {
    fn from(outcome: InsertOutcome) -> Self {
        match outcome {
            InsertOutcome::Widget { field } => EditResult::Widget { field },
            InsertOutcome::WidgetFailed { field, reason } => EditResult::Failed {
                reason: format!("field {field}: {reason}"),
            },
            InsertOutcome::Text { font, scrubbed } => EditResult::Overlay { font, scrubbed },
            InsertOutcome::Fallback { font, reason } => EditResult::Fallback { font, reason },
        }
    }
}

/// Edited document plus what happened along the way.
#[derive(Debug, Clone)]
pub struct EditOutcome {
    pub bytes: Vec<u8>,
    pub signatures_removed: usize,
    pub results: Vec<EditResult>,
}

impl EditOutcome {
    pub fn failed(&self) -> usize {
        self.results
            .iter()
            .filter(|r| matches!(r, EditResult::Failed { .. }))
            .count()
    }
}

/// Applies overlay edits to documents.
pub struct OverlayEditor<'a> {
    fonts: &'a dyn FontLookup,
    overlay: OverlayConfig,
}

impl<'a> OverlayEditor<'a> {
    // -- Construction ---------------------------------------------------------

    pub fn new(fonts: &'a dyn FontLookup, overlay: OverlayConfig) -> Self {
        Self { fonts, overlay }
    }

    // -- Editing --------------------------------------------------------------

    /// Apply `edits` and return the new document bytes.
    pub fn apply(&self, document: &[u8], edits: &[Edit]) -> Result<Vec<u8>> {
        self.apply_detailed(document, edits).map(|outcome| outcome.bytes)
    }

    /// Apply `edits` and report the outcome of each one.
    ///
    /// Unreadable input and out-of-range pages fail the whole call before
    /// anything is changed. Individual edits that cannot be placed are
    /// recorded as [`EditResult::Failed`] and the rest still apply.
    #[instrument(skip_all, fields(edits = edits.len(), input_bytes = document.len()))]
    pub fn apply_detailed(&self, document: &[u8], edits: &[Edit]) -> Result<EditOutcome> {
        let mut doc = load_document(document)?;
        let page_ids = edits
            .iter()
            .map(|edit| page_id(&doc, edit.page))
            .collect::<Result<Vec<_>>>()?;

        let signatures_removed = SignatureStripper.strip(&mut doc);
        let mut inserter = BaselineTextInserter::new(&self.overlay);
        let mut results = Vec::with_capacity(edits.len());

        for (index, (edit, page)) in edits.iter().zip(page_ids).enumerate() {
            let family = clean_font_name(&edit.font);
            let embedded = if family.is_empty() {
                None
            } else {
                self.fonts.find(family)
            };
            let selection = resolve_font(family, edit.style, embedded.as_ref());

            let result = match inserter.insert(&mut doc, page, edit, &selection) {
                Ok(outcome) => EditResult::from(outcome),
                Err(err) => {
                    warn!(index, page = edit.page, error = %err, "edit could not be applied");
                    EditResult::Failed {
                        reason: err.to_string(),
                    }
                }
            };
            results.push(result);
        }

        let bytes = save_document(&mut doc)?;

        let outcome = EditOutcome {
            bytes,
            signatures_removed,
            results,
        };
        info!(
            signatures_removed,
            failed = outcome.failed(),
            output_bytes = outcome.bytes.len(),
            "edits applied"
        );
        Ok(outcome)
    }
}
