// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Form-field widgets: page annotation lists, the AcroForm dictionary, and
// value updates for fields that sit under an edit.

use lopdf::{Dictionary, Document, Object, ObjectId};
use retouch_core::types::Rect;
use thiserror::Error;
use tracing::{debug, info, instrument};

use super::page::{PageGeometry, inherited, number_array};

/// Failure to update a widget's field value.
#[derive(Debug, Error)]
pub enum WidgetError {
    #[error("field type {0} does not take a text value")]
    UnsupportedFieldType(String),

    #[error("PDF operation failed: {0}")]
    Pdf(String),
}

/// A form-field widget located on a page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WidgetHit {
    pub widget_id: ObjectId,
    /// Terminal field carrying `/T` and `/V`; the widget itself when merged.
    pub field_id: ObjectId,
    pub name: String,
    pub field_type: Option<String>,
}

// -- Annotations -----------------------------------------------------------

/// Indirect annotation ids listed in the page's `/Annots`.
pub fn annotation_ids(document: &Document, page_id: ObjectId) -> Vec<ObjectId> {
    let Ok(page) = document.get_dictionary(page_id) else {
        return Vec::new();
    };
    let annots = match page.get(b"Annots") {
        Ok(Object::Reference(id)) => document.get_object(*id).ok(),
        Ok(other) => Some(other),
        Err(_) => None,
    };
    annots
        .and_then(|object| object.as_array().ok())
        .map(|items| items.iter().filter_map(|item| item.as_reference().ok()).collect())
        .unwrap_or_default()
}

/// Remove `annot_id` from the page's `/Annots`. Returns whether it was listed.
pub fn remove_annotation(document: &mut Document, page_id: ObjectId, annot_id: ObjectId) -> bool {
    let holder = match document.get_dictionary(page_id).and_then(|page| page.get(b"Annots")) {
        Ok(Object::Reference(id)) => Some(*id),
        Ok(_) => None,
        Err(_) => return false,
    };
    let items = match holder {
        Some(array_id) => document.get_object_mut(array_id).and_then(Object::as_array_mut),
        None => document
            .get_dictionary_mut(page_id)
            .and_then(|page| page.get_mut(b"Annots"))
            .and_then(Object::as_array_mut),
    };
    items.map(|items| remove_reference(items, annot_id)).unwrap_or(false)
}

/// Drop every reference to `id` from an array.
pub fn remove_reference(items: &mut Vec<Object>, id: ObjectId) -> bool {
    let before = items.len();
    items.retain(|item| item.as_reference().ok() != Some(id));
    items.len() != before
}

/// Widget subtype check.
pub fn is_widget(dict: &Dictionary) -> bool {
    dict.get(b"Subtype")
        .and_then(Object::as_name)
        .is_ok_and(|name| name == b"Widget")
}

/// Text string value decoded as PDFDocEncoding or UTF-16BE.
pub fn text_string(object: &Object) -> Option<String> {
    let Object::String(bytes, _) = object else {
        return None;
    };
    if let Some(utf16) = bytes.strip_prefix(&[0xFE, 0xFF]) {
        let units: Vec<u16> = utf16
            .chunks_exact(2)
            .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
            .collect();
        return Some(String::from_utf16_lossy(&units));
    }
    Some(bytes.iter().map(|&b| char::from(b)).collect())
}

/// Encode a value as a PDF text string: a literal when ASCII, otherwise
/// UTF-16BE with a byte order mark.
pub fn encode_text_string(value: &str) -> Object {
    if value.chars().all(|c| u32::from(c) < 0x80) {
        return Object::string_literal(value);
    }
    let mut bytes = vec![0xFE, 0xFF];
    for unit in value.encode_utf16() {
        bytes.extend_from_slice(&unit.to_be_bytes());
    }
    Object::String(bytes, lopdf::StringFormat::Hexadecimal)
}

/// Terminal field of a widget: the nearest dictionary in the `/Parent`
/// chain that carries a `/T`.
fn terminal_field(document: &Document, widget_id: ObjectId) -> ObjectId {
    let mut current = widget_id;
    for _ in 0..32 {
        let Ok(dict) = document.get_dictionary(current) else {
            break;
        };
        if dict.has(b"T") {
            return current;
        }
        match dict.get(b"Parent").and_then(Object::as_reference) {
            Ok(parent) => current = parent,
            Err(_) => break,
        }
    }
    widget_id
}

fn widget_hit(document: &Document, widget_id: ObjectId) -> Option<WidgetHit> {
    let widget = document.get_dictionary(widget_id).ok()?;
    let field_type = inherited(document, widget, b"FT")
        .and_then(|ft| ft.as_name().ok())
        .map(|name| String::from_utf8_lossy(name).into_owned());
    let name = inherited(document, widget, b"T")
        .and_then(text_string)
        .unwrap_or_default();
    Some(WidgetHit {
        widget_id,
        field_id: terminal_field(document, widget_id),
        name,
        field_type,
    })
}

/// First widget on the page whose rectangle overlaps `rect` (top-left
/// coordinates).
pub fn find_widget(document: &Document, page_id: ObjectId, rect: &Rect) -> Option<WidgetHit> {
    let geometry = PageGeometry::of(document, page_id);
    annotation_ids(document, page_id).into_iter().find_map(|id| {
        let dict = document.get_dictionary(id).ok()?;
        if !is_widget(dict) {
            return None;
        }
        let widget_rect = dict
            .get(b"Rect")
            .ok()
            .and_then(|r| number_array(document, r))
            .and_then(|values| geometry.rect_from_pdf(&values))?;
        widget_rect.overlaps(rect).then(|| widget_hit(document, id)).flatten()
    })
}

// -- AcroForm --------------------------------------------------------------

/// The document's AcroForm dictionary, wherever it lives.
pub fn acroform_mut(document: &mut Document) -> Option<&mut Dictionary> {
    let root = document.trailer.get(b"Root").ok()?.as_reference().ok()?;
    let indirect = match document.get_dictionary(root).ok()?.get(b"AcroForm").ok()? {
        Object::Reference(id) => Some(*id),
        Object::Dictionary(_) => None,
        _ => return None,
    };
    match indirect {
        Some(id) => document.get_dictionary_mut(id).ok(),
        None => document
            .get_dictionary_mut(root)
            .ok()?
            .get_mut(b"AcroForm")
            .ok()?
            .as_dict_mut()
            .ok(),
    }
}

/// The AcroForm `/Fields` array, resolving an indirect array.
pub fn acroform_fields_mut(document: &mut Document) -> Option<&mut Vec<Object>> {
    let fields = acroform_mut(document)?.get(b"Fields").ok()?.clone();
    match fields {
        Object::Reference(id) => document.get_object_mut(id).ok()?.as_array_mut().ok(),
        Object::Array(_) => acroform_mut(document)?.get_mut(b"Fields").ok()?.as_array_mut().ok(),
        _ => None,
    }
}

// -- Value updates ---------------------------------------------------------

/// Set the field value behind a widget and ask viewers to regenerate
/// appearances.
#[instrument(skip_all, fields(field = %hit.name))]
pub fn set_widget_value(document: &mut Document, hit: &WidgetHit, value: &str) -> Result<(), WidgetError> {
    match hit.field_type.as_deref() {
        None | Some("Tx") | Some("Ch") => {}
        Some(other) => return Err(WidgetError::UnsupportedFieldType(other.to_string())),
    }

    document
        .get_dictionary_mut(hit.field_id)
        .map_err(|err| WidgetError::Pdf(format!("field {:?}: {err}", hit.field_id)))?
        .set("V", encode_text_string(value));

    // The stored appearance shows the old value.
    if let Ok(widget) = document.get_dictionary_mut(hit.widget_id) {
        widget.remove(b"AP");
    }

    match acroform_mut(document) {
        Some(acroform) => acroform.set("NeedAppearances", Object::Boolean(true)),
        None => debug!("document has no AcroForm dictionary"),
    }

    info!(value, "form field updated");
    Ok(())
}
