// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Automatic repair of border damage: vector strokes near a failing edit are
// copied from the original page and painted again on top of the edited one.

use std::collections::BTreeMap;

use lopdf::Document;
use retouch_core::config::RenderConfig;
use retouch_core::error::Result;
use retouch_core::types::{Edit, QualityReport, Rect};
use retouch_document::pdf::drawings::{Drawing, page_drawings, redraw};
use retouch_document::pdf::{load_document, page_id, save_document};
use tracing::{debug, info, instrument, warn};

/// Redraws lost borders for edits whose reports flag border damage.
#[derive(Debug, Clone, Copy)]
pub struct AutoRepairer {
    margin: f32,
}

impl AutoRepairer {
    /// Uses the render context margin, so the repaired area matches what the
    /// oracle was shown.
    pub fn new(config: &RenderConfig) -> Self {
        Self {
            margin: config.context_margin.max(0.0),
        }
    }

    /// Returns repaired bytes, or `None` when every report passed or no
    /// failing report concerns borders.
    #[instrument(skip_all, fields(edits = edits.len(), reports = reports.len()))]
    pub fn repair(
        &self,
        original: &[u8],
        edited: &[u8],
        edits: &[Edit],
        reports: &[QualityReport],
    ) -> Result<Option<Vec<u8>>> {
        if reports.iter().all(|report| report.passed) {
            debug!("all edits passed, nothing to repair");
            return Ok(None);
        }

        let mut regions: BTreeMap<usize, Vec<Rect>> = BTreeMap::new();
        for report in reports.iter().filter(|report| report.has_border_damage()) {
            match edits.get(report.edit_index) {
                Some(edit) => regions
                    .entry(edit.page)
                    .or_default()
                    .push(edit.rect.normalized().expand(self.margin)),
                None => warn!(edit_index = report.edit_index, "report refers to an unknown edit"),
            }
        }
        if regions.is_empty() {
            info!("failing reports carry no border damage, nothing to repair");
            return Ok(None);
        }

        let source = load_document(original)?;
        let mut target = load_document(edited)?;

        for (page, areas) in &regions {
            match self.repair_page(&source, &mut target, *page, areas) {
                Ok(count) => debug!(page, redrawn = count, "page repaired"),
                Err(err) => warn!(page, error = %err, "page repair skipped"),
            }
        }

        let bytes = save_document(&mut target)?;
        info!(pages = regions.len(), output_bytes = bytes.len(), "border repair applied");
        Ok(Some(bytes))
    }

    fn repair_page(&self, source: &Document, target: &mut Document, page: usize, areas: &[Rect]) -> Result<usize> {
        let source_page = page_id(source, page)?;
        let target_page = page_id(target, page)?;

        // Repainted after the new text, so fills would hide it.
        let lost: Vec<Drawing> = page_drawings(source, source_page)?
            .into_iter()
            .filter(|drawing| drawing.stroke.is_some())
            .filter(|drawing| areas.iter().any(|area| drawing.bounds.intersects(area)))
            .map(|drawing| Drawing { fill: None, ..drawing })
            .collect();

        redraw(target, target_page, &lost)?;
        Ok(lost.len())
    }
}
