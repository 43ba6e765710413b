// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// PDF module: loading, saving and in-place mutation through `lopdf`.

pub mod content;
pub mod cover;
pub mod drawings;
pub mod editor;
pub mod embed;
pub mod font_extract;
pub mod fonts;
pub mod insert;
pub mod page;
pub mod signature;
pub mod widgets;
pub mod winansi;

#[cfg(any(test, feature = "fixtures"))]
pub mod fixtures;

use lopdf::{Document, ObjectId};
use retouch_core::error::{Result, RetouchError};
use tracing::debug;

/// Parse a document from memory. Failure is an input error.
pub fn load_document(bytes: &[u8]) -> Result<Document> {
    let document = Document::load_mem(bytes)
        .map_err(|err| RetouchError::InvalidDocument(format!("failed to load PDF: {err}")))?;
    debug!(pages = document.get_pages().len(), "PDF loaded from bytes");
    Ok(document)
}

/// Object id of the 0-based `page`.
pub fn page_id(document: &Document, page: usize) -> Result<ObjectId> {
    let pages = document.get_pages();
    page.checked_add(1)
        .and_then(|number| u32::try_from(number).ok())
        .and_then(|number| pages.get(&number).copied())
        .ok_or(RetouchError::PageOutOfRange {
            page,
            count: pages.len(),
        })
}

/// Serialise with unreferenced objects pruned and streams compressed.
pub fn save_document(document: &mut Document) -> Result<Vec<u8>> {
    let pruned = document.prune_objects();
    document.compress();

    let mut output = Vec::new();
    document
        .save_to(&mut output)
        .map_err(|err| RetouchError::PdfError(format!("failed to serialise PDF: {err}")))?;

    debug!(pruned = pruned.len(), output_bytes = output.len(), "PDF serialised");
    Ok(output)
}
