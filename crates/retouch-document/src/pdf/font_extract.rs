// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Embedded font extraction. Pulls font programs out of page resources so
// later edits can write with the document's own fonts.

use std::collections::HashSet;

use lopdf::{Dictionary, Document, Object, ObjectId};
use retouch_core::error::Result;
use tracing::{debug, info, instrument};

use super::fonts::clean_font_name;
use super::load_document;
use super::page::{page_resources, resolve};

/// A font program found in a document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedFont {
    /// Family name with any subset prefix removed.
    pub family: String,
    /// File extension matching the program format.
    pub extension: &'static str,
    pub bytes: Vec<u8>,
}

/// Font dictionaries reachable from a font resource: the font itself and,
/// for composite fonts, its descendants.
fn font_dicts<'a>(document: &'a Document, font: &'a Dictionary) -> Vec<&'a Dictionary> {
    let mut dicts = vec![font];
    if let Ok(descendants) = font.get(b"DescendantFonts") {
        if let Ok(items) = resolve(document, descendants).as_array() {
            dicts.extend(items.iter().filter_map(|item| resolve(document, item).as_dict().ok()));
        }
    }
    dicts
}

/// Font file reference and extension from a font descriptor.
fn font_file(document: &Document, descriptor: &Dictionary) -> Option<(ObjectId, &'static str)> {
    if let Ok(id) = descriptor.get(b"FontFile2").and_then(Object::as_reference) {
        return Some((id, "ttf"));
    }
    if let Ok(id) = descriptor.get(b"FontFile3").and_then(Object::as_reference) {
        let opentype = document
            .get_object(id)
            .and_then(Object::as_stream)
            .and_then(|stream| stream.dict.get(b"Subtype"))
            .and_then(Object::as_name)
            .is_ok_and(|subtype| subtype == b"OpenType");
        return Some((id, if opentype { "otf" } else { "cff" }));
    }
    descriptor
        .get(b"FontFile")
        .and_then(Object::as_reference)
        .ok()
        .map(|id| (id, "pfb"))
}

fn family_name(document: &Document, font: &Dictionary, descriptor: &Dictionary) -> Option<String> {
    let raw = font
        .get(b"BaseFont")
        .or_else(|_| descriptor.get(b"FontName"))
        .map(|name| resolve(document, name))
        .and_then(Object::as_name)
        .ok()?;
    let cleaned = clean_font_name(&String::from_utf8_lossy(raw)).trim().to_string();
    (!cleaned.is_empty()).then_some(cleaned)
}

/// Decoded bytes of a font program stream, or `None` if a filter fails.
fn program_bytes(document: &Document, id: ObjectId) -> Option<Vec<u8>> {
    let stream = document.get_object(id).and_then(Object::as_stream).ok()?;
    if stream.dict.has(b"Filter") {
        stream.decompressed_content().ok()
    } else {
        Some(stream.content.clone())
    }
}

/// Every embedded font program used by page resources, once per program.
///
/// Fonts that cannot be read are skipped.
#[instrument(skip_all, fields(input_bytes = bytes.len()))]
pub fn extract_fonts(bytes: &[u8]) -> Result<Vec<ExtractedFont>> {
    let document = load_document(bytes)?;
    let mut seen = HashSet::new();
    let mut fonts = Vec::new();

    for (number, page_id) in document.get_pages() {
        let resources = page_resources(&document, page_id);
        let Some(entries) = resources
            .get(b"Font")
            .ok()
            .and_then(|fonts| resolve(&document, fonts).as_dict().ok())
        else {
            continue;
        };

        for (_, entry) in entries.iter() {
            let Ok(font) = resolve(&document, entry).as_dict() else {
                continue;
            };
            for dict in font_dicts(&document, font) {
                let Some(descriptor) = dict
                    .get(b"FontDescriptor")
                    .ok()
                    .and_then(|d| resolve(&document, d).as_dict().ok())
                else {
                    continue;
                };
                let Some((file_id, extension)) = font_file(&document, descriptor) else {
                    continue;
                };
                if !seen.insert(file_id) {
                    continue;
                }
                let Some(family) = family_name(&document, dict, descriptor) else {
                    debug!(page = number, ?file_id, "font program without a usable name skipped");
                    continue;
                };
                match program_bytes(&document, file_id) {
                    Some(bytes) if !bytes.is_empty() => {
                        debug!(page = number, %family, extension, len = bytes.len(), "font program extracted");
                        fonts.push(ExtractedFont {
                            family,
                            extension,
                            bytes,
                        });
                    }
                    _ => debug!(page = number, %family, "font program unreadable, skipped"),
                }
            }
        }
    }

    info!(count = fonts.len(), "embedded fonts extracted");
    Ok(fonts)
}
