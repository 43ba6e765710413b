// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Subcommand implementations. Each returns a serialisable summary that the
// entry point prints.

use std::fs;
use std::path::Path;

use image::RgbaImage;
use retouch_core::RetouchConfig;
use retouch_core::error::{Result, RetouchError};
use retouch_core::types::{DocumentId, Edit, EditOperation, QualityReport, decode_edits};
use retouch_document::{EditResult, OverlayEditor, PageRasterizer, PdfiumRasterizer, RegionRenderer, extract_fonts};
use retouch_quality::{AutoRepairer, OpenAiJudge, VisualDiffValidator, VisualJudge};
use retouch_store::{AssetStore, DocumentFonts, FsStore};
use serde::Serialize;
use tracing::{info, instrument, warn};

#[derive(Debug, Serialize)]
pub struct ImportSummary {
    pub document_id: DocumentId,
    pub pages: usize,
    pub fonts: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct ExportSummary {
    pub document_id: DocumentId,
    pub output: String,
    pub signatures_removed: usize,
    pub results: Vec<EditResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reports: Option<Vec<QualityReport>>,
    pub repaired: bool,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ExportOptions {
    pub validate: bool,
    pub repair: bool,
}

/// Stand-in when PDFium cannot be bound; every render fails, so every
/// verdict degrades to a pass.
struct Unavailable(String);

impl PageRasterizer for Unavailable {
    fn render_page(&self, _document: &[u8], _page: usize, _dpi: u32) -> Result<RgbaImage> {
        Err(RetouchError::RenderError(self.0.clone()))
    }
}

fn read_edits(path: &Path) -> Result<Vec<Edit>> {
    let ops: Vec<EditOperation> = serde_json::from_slice(&fs::read(path)?)?;
    decode_edits(&ops)
}

// -- Import ------------------------------------------------------------------

/// Store `input` and file every embedded font program it carries.
#[instrument(skip_all, fields(input = %input.display()))]
pub fn import(config: &RetouchConfig, input: &Path) -> Result<ImportSummary> {
    let bytes = fs::read(input)?;
    let document = retouch_document::pdf::load_document(&bytes)?;
    let pages = document.get_pages().len();

    let store = FsStore::new(&config.data_dir);
    let document_id = store.put_document(&bytes)?;

    let mut fonts = Vec::new();
    for font in extract_fonts(&bytes)? {
        match store.put_font(&document_id, &font.family, font.extension, &font.bytes) {
            Ok(asset) => fonts.push(asset.family),
            Err(err) => warn!(family = %font.family, error = %err, "font not stored"),
        }
    }
    fonts.sort();
    fonts.dedup();

    info!(document_id = %document_id, pages, fonts = fonts.len(), "document imported");
    Ok(ImportSummary {
        document_id,
        pages,
        fonts,
    })
}

pub fn fonts(config: &RetouchConfig, id: &DocumentId) -> Result<Vec<String>> {
    let store = FsStore::new(&config.data_dir);
    store.document(id)?;
    store.fonts(id)
}

// -- Validation --------------------------------------------------------------

/// Validate `edited` against `original`. Without an oracle credential every
/// edit passes and PDFium is never loaded.
fn run_validation(config: &RetouchConfig, original: &[u8], edited: &[u8], edits: &[Edit]) -> Vec<QualityReport> {
    let judge = match OpenAiJudge::from_config(&config.oracle) {
        Ok(judge) => Some(judge),
        Err(err) => {
            info!(reason = %err, "visual validation disabled");
            None
        }
    };

    let rasterizer: Box<dyn PageRasterizer> = match &judge {
        None => Box::new(Unavailable("validation disabled".into())),
        Some(_) => match PdfiumRasterizer::bind() {
            Ok(pdfium) => Box::new(pdfium),
            Err(err) => {
                warn!(error = %err, "PDFium unavailable, edits will not be inspected");
                Box::new(Unavailable(err.to_string()))
            }
        },
    };

    let renderer = RegionRenderer::new(rasterizer.as_ref(), &config.render);
    let validator = match &judge {
        Some(judge) => VisualDiffValidator::new(renderer, judge as &dyn VisualJudge),
        None => VisualDiffValidator::unconfigured(renderer),
    };
    validator.validate(original, edited, edits)
}

#[instrument(skip_all, fields(document_id = %id))]
pub fn validate(config: &RetouchConfig, id: &DocumentId, edited: &Path, edits: &Path) -> Result<Vec<QualityReport>> {
    let store = FsStore::new(&config.data_dir);
    let original = store.document(id)?;
    let edited = fs::read(edited)?;
    let edits = read_edits(edits)?;
    Ok(run_validation(config, &original, &edited, &edits))
}

// -- Export ------------------------------------------------------------------

/// Apply the edits in `edits_path` to the stored document and write the
/// result to `out`.
#[instrument(skip_all, fields(document_id = %id, out = %out.display()))]
pub fn export(
    config: &RetouchConfig,
    id: &DocumentId,
    edits_path: &Path,
    out: &Path,
    options: ExportOptions,
) -> Result<ExportSummary> {
    let store = FsStore::new(&config.data_dir);
    let original = store.document(id)?;
    let edits = read_edits(edits_path)?;

    let fonts = DocumentFonts::new(&store, id.clone());
    let outcome = OverlayEditor::new(&fonts, config.overlay).apply_detailed(&original, &edits)?;
    let mut bytes = outcome.bytes;

    let mut reports = None;
    let mut repaired = false;
    if options.validate {
        let found = run_validation(config, &original, &bytes, &edits);
        if options.repair {
            match AutoRepairer::new(&config.render).repair(&original, &bytes, &edits, &found) {
                Ok(Some(patched)) => {
                    bytes = patched;
                    repaired = true;
                }
                Ok(None) => {}
                Err(err) => warn!(error = %err, "repair failed, keeping unrepaired output"),
            }
        }
        reports = Some(found);
    }

    fs::write(out, &bytes)?;
    info!(output_bytes = bytes.len(), repaired, "export written");

    Ok(ExportSummary {
        document_id: id.clone(),
        output: out.display().to_string(),
        signatures_removed: outcome.signatures_removed,
        results: outcome.results,
        reports,
        repaired,
    })
}
