// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Signature lock removal. Signature widgets and fields whose name starts
// with "sig" are deleted from page annotations and the AcroForm field tree.

use lopdf::{Document, ObjectId};
use tracing::{debug, info, instrument, warn};

use super::page::inherited;
use super::widgets::{
    acroform_fields_mut, acroform_mut, annotation_ids, is_widget, remove_annotation, remove_reference, text_string,
};

/// Depth limit when climbing from a widget to its root field.
const MAX_FIELD_DEPTH: usize = 32;

/// Whether a widget belongs to a signature field or is named like one.
fn is_signature_widget(document: &Document, widget_id: ObjectId) -> bool {
    let Ok(widget) = document.get_dictionary(widget_id) else {
        return false;
    };
    if !is_widget(widget) {
        return false;
    }
    let is_sig_field = inherited(document, widget, b"FT")
        .and_then(|ft| ft.as_name().ok())
        .is_some_and(|name| name == b"Sig");
    let has_sig_name = inherited(document, widget, b"T")
        .and_then(text_string)
        .is_some_and(|title| title.to_ascii_lowercase().starts_with("sig"));
    is_sig_field || has_sig_name
}

fn parent_of(document: &Document, id: ObjectId) -> Option<ObjectId> {
    document
        .get_dictionary(id)
        .ok()?
        .get(b"Parent")
        .ok()?
        .as_reference()
        .ok()
}

/// Detach `id` from the field tree, removing parents left without kids.
fn detach_field(document: &mut Document, id: ObjectId) {
    let mut current = id;
    for _ in 0..MAX_FIELD_DEPTH {
        let Some(parent) = parent_of(document, current) else {
            if let Some(fields) = acroform_fields_mut(document) {
                remove_reference(fields, current);
            }
            return;
        };

        let emptied = document
            .get_dictionary_mut(parent)
            .ok()
            .and_then(|dict| dict.get_mut(b"Kids").ok())
            .and_then(|kids| kids.as_array_mut().ok())
            .map(|kids| {
                remove_reference(kids, current);
                kids.is_empty()
            })
            .unwrap_or(false);
        if !emptied {
            return;
        }
        current = parent;
    }
    warn!(?id, "field tree deeper than expected, stopped detaching");
}

/// Strip signature widgets and their fields from every page.
#[derive(Debug, Clone, Copy, Default)]
pub struct SignatureStripper;

impl SignatureStripper {
    /// Remove signature widgets in place. Returns how many were removed.
    #[instrument(skip_all)]
    pub fn strip(&self, document: &mut Document) -> usize {
        let mut removed = 0;

        for (number, page_id) in document.get_pages() {
            let targets: Vec<ObjectId> = annotation_ids(document, page_id)
                .into_iter()
                .filter(|&id| is_signature_widget(document, id))
                .collect();

            for widget_id in targets {
                if !remove_annotation(document, page_id, widget_id) {
                    warn!(page = number, ?widget_id, "signature widget not removable from page");
                    continue;
                }
                detach_field(document, widget_id);
                debug!(page = number, ?widget_id, "signature widget removed");
                removed += 1;
            }
        }

        if removed > 0 {
            if let Some(acroform) = acroform_mut(document) {
                acroform.remove(b"SigFlags");
            }
            info!(removed, "signature locks stripped");
        }
        removed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pdf::fixtures::{self, DocumentBuilder};
    use crate::pdf::{load_document, page_id, save_document};

    fn field_names(document: &mut Document) -> Vec<String> {
        let fields = acroform_fields_mut(document).cloned().unwrap_or_default();
        fields
            .iter()
            .filter_map(|f| f.as_reference().ok())
            .filter_map(|id| document.get_dictionary(id).ok())
            .filter_map(|dict| dict.get(b"T").ok().and_then(text_string))
            .collect()
    }

    #[test]
    fn removes_signature_and_sig_named_widgets() {
        let mut doc = load_document(&fixtures::signed_form()).unwrap();
        let removed = SignatureStripper.strip(&mut doc);
        assert_eq!(removed, 2);

        let id = page_id(&doc, 0).unwrap();
        assert_eq!(annotation_ids(&doc, id).len(), 1);
        assert_eq!(field_names(&mut doc), vec!["amount".to_string()]);
        assert!(acroform_mut(&mut doc).unwrap().get(b"SigFlags").is_err());
    }

    #[test]
    fn stripped_document_saves_and_reloads() {
        let mut doc = load_document(&fixtures::signed_form()).unwrap();
        SignatureStripper.strip(&mut doc);
        let bytes = save_document(&mut doc).unwrap();
        let mut reopened = load_document(&bytes).unwrap();
        assert_eq!(field_names(&mut reopened), vec!["amount".to_string()]);
    }

    #[test]
    fn unsigned_documents_are_untouched() {
        let mut doc = DocumentBuilder::new()
            .page(|p| p.text_field("name", [100.0, 100.0, 200.0, 120.0], Some("x")))
            .build_document();
        assert_eq!(SignatureStripper.strip(&mut doc), 0);
        let id = page_id(&doc, 0).unwrap();
        assert_eq!(annotation_ids(&doc, id).len(), 1);
    }

    #[test]
    fn title_match_is_case_insensitive() {
        let mut doc = DocumentBuilder::new()
            .page(|p| {
                p.text_field("SIGNER_NAME", [100.0, 100.0, 200.0, 120.0], None)
                    .text_field("design", [100.0, 200.0, 200.0, 220.0], None)
            })
            .build_document();
        assert_eq!(SignatureStripper.strip(&mut doc), 1);
        assert_eq!(field_names(&mut doc), vec!["design".to_string()]);
    }
}
