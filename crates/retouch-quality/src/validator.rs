// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Visual diff validation: one oracle verdict per edit, comparing the edited
// region before and after.

use retouch_core::error::RetouchError;
use retouch_core::types::{Edit, QualityReport};
use retouch_document::RegionRenderer;
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use crate::oracle::{OracleError, VisualJudge, parse_verdict};

/// Why a report was not produced from a verdict.
#[derive(Debug, Error)]
enum Skipped {
    #[error("region render failed: {0}")]
    Render(RetouchError),
    #[error("{0}")]
    Oracle(OracleError),
}

/// Produces a [`QualityReport`] for each edit.
///
/// Anything that prevents a verdict (rendering, the oracle, an unparseable
/// answer) yields a passing report, so validation never blocks an export.
pub struct VisualDiffValidator<'a> {
    renderer: RegionRenderer<'a>,
    judge: Option<&'a dyn VisualJudge>,
}

impl<'a> VisualDiffValidator<'a> {
    // -- Construction ---------------------------------------------------------

    pub fn new(renderer: RegionRenderer<'a>, judge: &'a dyn VisualJudge) -> Self {
        Self {
            renderer,
            judge: Some(judge),
        }
    }

    /// A validator with no oracle: every edit passes.
    pub fn unconfigured(renderer: RegionRenderer<'a>) -> Self {
        Self { renderer, judge: None }
    }

    pub fn is_configured(&self) -> bool {
        self.judge.is_some()
    }

    // -- Validation -----------------------------------------------------------

    /// One report per edit, in edit order.
    #[instrument(skip_all, fields(edits = edits.len(), configured = self.judge.is_some()))]
    pub fn validate(&self, original: &[u8], edited: &[u8], edits: &[Edit]) -> Vec<QualityReport> {
        let Some(judge) = self.judge else {
            debug!("no oracle configured, every edit passes");
            return edits
                .iter()
                .enumerate()
                .map(|(index, edit)| QualityReport::pass(index, edit.page))
                .collect();
        };

        let reports: Vec<QualityReport> = edits
            .iter()
            .enumerate()
            .map(|(index, edit)| self.check(judge, original, edited, index, edit))
            .collect();

        info!(
            failed = reports.iter().filter(|r| !r.passed).count(),
            "visual validation finished"
        );
        reports
    }

    fn ask(&self, judge: &dyn VisualJudge, original: &[u8], edited: &[u8], edit: &Edit) -> Result<String, Skipped> {
        let before = self
            .renderer
            .render(original, edit.page, &edit.rect)
            .map_err(Skipped::Render)?;
        let after = self
            .renderer
            .render(edited, edit.page, &edit.rect)
            .map_err(Skipped::Render)?;
        judge.judge(&before.png, &after.png).map_err(Skipped::Oracle)
    }

    fn check(&self, judge: &dyn VisualJudge, original: &[u8], edited: &[u8], index: usize, edit: &Edit) -> QualityReport {
        let raw = match self.ask(judge, original, edited, edit) {
            Ok(raw) => raw,
            Err(skipped) => {
                warn!(index, page = edit.page, reason = %skipped, "edit not validated, treated as passed");
                return QualityReport::pass(index, edit.page);
            }
        };

        match parse_verdict(&raw) {
            Ok(verdict) => {
                debug!(index, passed = verdict.passed, issues = verdict.issues.len(), "verdict received");
                QualityReport {
                    edit_index: index,
                    page: edit.page,
                    passed: verdict.passed,
                    issues: verdict.issues,
                    raw_response: raw,
                }
            }
            Err(err) => {
                warn!(index, error = %err, "unparseable verdict, treated as passed");
                QualityReport {
                    raw_response: raw,
                    ..QualityReport::pass(index, edit.page)
                }
            }
        }
    }
}
