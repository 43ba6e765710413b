// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Page-level helpers: inherited attributes, geometry, content streams and
// resource registration.

use lopdf::{Dictionary, Document, Object, ObjectId, Stream};
use retouch_core::error::{Result, RetouchError};
use retouch_core::types::Rect;
use tracing::warn;

/// Depth limit when walking `/Parent` chains.
const MAX_TREE_DEPTH: usize = 32;

/// US Letter, used when a page carries no usable `/MediaBox`.
const DEFAULT_MEDIA_BOX: [f32; 4] = [0.0, 0.0, 612.0, 792.0];

/// Numeric value of an integer or real object.
pub fn number(object: &Object) -> Option<f32> {
    match object {
        Object::Integer(i) => Some(*i as f32),
        Object::Real(r) => Some(*r as f32),
        _ => None,
    }
}

/// Follow a reference to the object it names; other objects pass through.
pub fn resolve<'a>(document: &'a Document, object: &'a Object) -> &'a Object {
    match object {
        Object::Reference(id) => document.get_object(*id).unwrap_or(object),
        other => other,
    }
}

/// Look up `key` on `dict` or the nearest ancestor that defines it.
pub fn inherited<'a>(document: &'a Document, dict: &'a Dictionary, key: &[u8]) -> Option<&'a Object> {
    let mut current = dict;
    for _ in 0..MAX_TREE_DEPTH {
        if let Ok(value) = current.get(key) {
            return Some(resolve(document, value));
        }
        let parent = current.get(b"Parent").ok()?.as_reference().ok()?;
        current = document.get_dictionary(parent).ok()?;
    }
    None
}

/// Array of numbers, resolving the array itself if indirect.
pub fn number_array(document: &Document, object: &Object) -> Option<Vec<f32>> {
    let items = resolve(document, object).as_array().ok()?;
    items
        .iter()
        .map(|item| number(resolve(document, item)))
        .collect()
}

// -- Geometry --------------------------------------------------------------

/// Page box in PDF user space plus conversions to and from the top-left
/// coordinate system edits are expressed in.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageGeometry {
    /// Normalised `[llx, lly, urx, ury]`.
    pub media_box: [f32; 4],
}

impl PageGeometry {
    pub fn of(document: &Document, page_id: ObjectId) -> Self {
        let media_box = document
            .get_dictionary(page_id)
            .ok()
            .and_then(|page| inherited(document, page, b"MediaBox"))
            .and_then(|object| number_array(document, object))
            .filter(|values| values.len() == 4)
            .map(|v| [v[0].min(v[2]), v[1].min(v[3]), v[0].max(v[2]), v[1].max(v[3])])
            .unwrap_or_else(|| {
                warn!(?page_id, "page has no usable MediaBox, assuming US Letter");
                DEFAULT_MEDIA_BOX
            });
        Self { media_box }
    }

    pub fn width(&self) -> f32 {
        self.media_box[2] - self.media_box[0]
    }

    pub fn height(&self) -> f32 {
        self.media_box[3] - self.media_box[1]
    }

    /// Page bounds in top-left coordinates.
    pub fn bounds(&self) -> Rect {
        Rect::new(0.0, 0.0, self.width(), self.height())
    }

    /// Top-left `x` to PDF user space.
    pub fn pdf_x(&self, x: f32) -> f32 {
        self.media_box[0] + x
    }

    /// Top-left `y` to PDF user space.
    pub fn pdf_y(&self, y: f32) -> f32 {
        self.media_box[3] - y
    }

    /// PDF user-space point to top-left coordinates.
    pub fn to_top_left(&self, x: f32, y: f32) -> (f32, f32) {
        (x - self.media_box[0], self.media_box[3] - y)
    }

    /// PDF `[llx lly urx ury]` rectangle to a top-left [`Rect`].
    pub fn rect_from_pdf(&self, values: &[f32]) -> Option<Rect> {
        let [llx, lly, urx, ury] = <[f32; 4]>::try_from(values).ok()?;
        let (x0, y0) = self.to_top_left(llx.min(urx), lly.max(ury));
        let (x1, y1) = self.to_top_left(llx.max(urx), lly.min(ury));
        Some(Rect::new(x0, y0, x1, y1))
    }
}

/// Geometry of the 0-based `page` in a serialised document.
pub fn page_bounds(document: &Document, page: usize) -> Result<Rect> {
    let id = super::page_id(document, page)?;
    Ok(PageGeometry::of(document, id).bounds())
}

// -- Content streams ---------------------------------------------------------

/// Object ids of the page's content streams, in paint order.
fn content_stream_ids(document: &Document, page_id: ObjectId) -> Vec<ObjectId> {
    let Ok(page) = document.get_dictionary(page_id) else {
        return Vec::new();
    };
    match page.get(b"Contents") {
        Ok(Object::Reference(id)) => match document.get_object(*id) {
            Ok(Object::Array(items)) => items.iter().filter_map(|o| o.as_reference().ok()).collect(),
            _ => vec![*id],
        },
        Ok(Object::Array(items)) => items.iter().filter_map(|o| o.as_reference().ok()).collect(),
        _ => Vec::new(),
    }
}

/// Decompressed page content, streams joined with a newline so tokens from
/// neighbouring streams never fuse. A stream whose filter cannot be undone
/// is an error.
pub fn page_content(document: &Document, page_id: ObjectId) -> Result<Vec<u8>> {
    let mut content = Vec::new();
    for id in content_stream_ids(document, page_id) {
        let stream = document
            .get_object(id)
            .and_then(Object::as_stream)
            .map_err(|err| RetouchError::PdfError(format!("content stream {id:?}: {err}")))?;
        let data = if stream.dict.has(b"Filter") {
            stream
                .decompressed_content()
                .map_err(|err| RetouchError::PdfError(format!("cannot decode content stream {id:?}: {err}")))?
        } else {
            stream.content.clone()
        };
        content.extend_from_slice(&data);
        content.push(b'\n');
    }
    Ok(content)
}

/// Replace the page's content with a single new stream.
pub fn set_page_content(document: &mut Document, page_id: ObjectId, content: Vec<u8>) -> Result<()> {
    let stream_id = document.add_object(Stream::new(Dictionary::new(), content));
    let page = document
        .get_dictionary_mut(page_id)
        .map_err(|err| RetouchError::PdfError(format!("page {page_id:?}: {err}")))?;
    page.set("Contents", Object::Reference(stream_id));
    Ok(())
}

/// Wrap existing content in `q … Q` so graphics state left behind by the
/// original page cannot leak into anything appended afterwards.
pub fn isolate_content(content: &[u8]) -> Vec<u8> {
    let mut wrapped = Vec::with_capacity(content.len() + 6);
    wrapped.extend_from_slice(b"q\n");
    wrapped.extend_from_slice(content);
    if !content.ends_with(b"\n") {
        wrapped.push(b'\n');
    }
    wrapped.extend_from_slice(b"Q\n");
    wrapped
}

/// Append a content stream to the page.
pub fn append_content(document: &mut Document, page_id: ObjectId, content: Vec<u8>) -> Result<()> {
    let stream_id = document.add_object(Stream::new(Dictionary::new(), content));
    let existing = document
        .get_dictionary(page_id)
        .map_err(|err| RetouchError::PdfError(format!("page {page_id:?}: {err}")))?
        .get(b"Contents")
        .ok()
        .cloned();

    let contents = match existing {
        Some(Object::Reference(id)) => match document.get_object(id) {
            Ok(Object::Array(items)) => {
                let mut items = items.clone();
                items.push(Object::Reference(stream_id));
                Object::Array(items)
            }
            _ => Object::Array(vec![Object::Reference(id), Object::Reference(stream_id)]),
        },
        Some(Object::Array(mut items)) => {
            items.push(Object::Reference(stream_id));
            Object::Array(items)
        }
        _ => Object::Reference(stream_id),
    };

    document
        .get_dictionary_mut(page_id)
        .map_err(|err| RetouchError::PdfError(format!("page {page_id:?}: {err}")))?
        .set("Contents", contents);
    Ok(())
}

// -- Resources ---------------------------------------------------------------

/// Effective (possibly inherited) resource dictionary of a page, by value.
pub fn page_resources(document: &Document, page_id: ObjectId) -> Dictionary {
    document
        .get_dictionary(page_id)
        .ok()
        .and_then(|page| inherited(document, page, b"Resources"))
        .and_then(|object| object.as_dict().ok())
        .cloned()
        .unwrap_or_default()
}

/// Font resource names already used on the page.
pub fn font_names(document: &Document, page_id: ObjectId) -> Vec<Vec<u8>> {
    page_resources(document, page_id)
        .get(b"Font")
        .ok()
        .map(|fonts| resolve(document, fonts))
        .and_then(|fonts| fonts.as_dict().ok())
        .map(|fonts| fonts.iter().map(|(name, _)| name.clone()).collect())
        .unwrap_or_default()
}

/// Register `font_id` under `name` in the page's font resources.
///
/// The page gets its own resource dictionary so shared or inherited
/// resources of other pages are never touched.
pub fn add_font_resource(
    document: &mut Document,
    page_id: ObjectId,
    name: &[u8],
    font_id: ObjectId,
) -> Result<()> {
    let mut resources = page_resources(document, page_id);
    let mut fonts = resources
        .get(b"Font")
        .ok()
        .map(|fonts| resolve(document, fonts))
        .and_then(|fonts| fonts.as_dict().ok())
        .cloned()
        .unwrap_or_default();

    fonts.set(name.to_vec(), Object::Reference(font_id));
    resources.set("Font", Object::Dictionary(fonts));

    document
        .get_dictionary_mut(page_id)
        .map_err(|err| RetouchError::PdfError(format!("page {page_id:?}: {err}")))?
        .set("Resources", Object::Dictionary(resources));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pdf::fixtures;

    #[test]
    fn geometry_converts_between_coordinate_systems() {
        let geometry = PageGeometry {
            media_box: [0.0, 0.0, 612.0, 792.0],
        };
        assert_eq!(geometry.pdf_y(200.0), 592.0);
        assert_eq!(geometry.to_top_left(100.0, 592.0), (100.0, 200.0));
        assert_eq!(
            geometry.rect_from_pdf(&[100.0, 577.0, 180.0, 592.0]),
            Some(Rect::new(100.0, 200.0, 180.0, 215.0))
        );
    }

    #[test]
    fn geometry_honours_offset_media_box() {
        let geometry = PageGeometry {
            media_box: [10.0, 20.0, 622.0, 812.0],
        };
        assert_eq!(geometry.width(), 612.0);
        assert_eq!(geometry.pdf_x(0.0), 10.0);
        assert_eq!(geometry.pdf_y(0.0), 812.0);
    }

    #[test]
    fn media_box_is_inherited_from_page_tree() {
        let doc = fixtures::DocumentBuilder::new().inherit_media_box().page(|p| p).build_document();
        let id = crate::pdf::page_id(&doc, 0).unwrap();
        assert_eq!(PageGeometry::of(&doc, id).media_box, [0.0, 0.0, 612.0, 792.0]);
    }

    #[test]
    fn append_content_turns_contents_into_array() {
        let mut doc = fixtures::DocumentBuilder::new()
            .page(|p| p.text("F1", 12.0, 72.0, 720.0, "Hello"))
            .build_document();
        let id = crate::pdf::page_id(&doc, 0).unwrap();

        append_content(&mut doc, id, b"q Q".to_vec()).unwrap();
        let content = page_content(&doc, id).unwrap();
        let text = String::from_utf8_lossy(&content);
        assert!(text.contains("(Hello) Tj"));
        assert!(text.trim_end().ends_with("q Q"));
    }

    #[test]
    fn undecodable_stream_is_an_error() {
        let mut doc = fixtures::DocumentBuilder::new()
            .page(|p| p.text("F1", 12.0, 72.0, 720.0, "Hello"))
            .build_document();
        let id = crate::pdf::page_id(&doc, 0).unwrap();
        fixtures::corrupt_contents(&mut doc, id);

        let err = page_content(&doc, id).unwrap_err();
        assert!(matches!(err, RetouchError::PdfError(_)));
    }

    #[test]
    fn isolate_wraps_content() {
        assert_eq!(isolate_content(b"1 0 0 RG"), b"q\n1 0 0 RG\nQ\n".to_vec());
    }

    #[test]
    fn font_resource_is_added_without_losing_existing_fonts() {
        let mut doc = fixtures::DocumentBuilder::new()
            .page(|p| p.text("F1", 12.0, 72.0, 720.0, "Hello"))
            .build_document();
        let id = crate::pdf::page_id(&doc, 0).unwrap();
        let font_id = doc.add_object(lopdf::dictionary! { "Type" => "Font" });

        add_font_resource(&mut doc, id, b"RtF1", font_id).unwrap();
        let mut names = font_names(&doc, id);
        names.sort();
        assert_eq!(names, vec![b"F1".to_vec(), b"RtF1".to_vec()]);
    }

    #[test]
    fn out_of_range_page_is_reported() {
        let doc = fixtures::DocumentBuilder::new().page(|p| p).build_document();
        let err = page_bounds(&doc, 3).unwrap_err();
        assert!(matches!(err, RetouchError::PageOutOfRange { page: 3, count: 1 }));
    }
}
