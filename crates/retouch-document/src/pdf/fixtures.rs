// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// In-memory PDF builders for tests and benchmarks.
//
// Page content is written in PDF user space (origin bottom-left) on a US
// Letter page, so fixtures read like the content streams they produce.

use lopdf::content::{Content, Operation};
use lopdf::{Dictionary, Document, Object, ObjectId, Stream, dictionary};
use retouch_core::types::Rect;

pub const PAGE_WIDTH: f32 = 612.0;
pub const PAGE_HEIGHT: f32 = 792.0;

fn real(v: f32) -> Object {
    Object::Real(v)
}

fn rect_array(r: [f32; 4]) -> Object {
    Object::Array(r.iter().copied().map(real).collect())
}

#[derive(Debug, Clone)]
enum FieldSpec {
    /// Field merged with its widget annotation.
    Merged {
        name: String,
        field_type: &'static str,
        rect: [f32; 4],
        value: Option<String>,
    },
    /// Field dictionary with a single kid widget.
    Parented {
        name: String,
        field_type: &'static str,
        rect: [f32; 4],
    },
}

/// Builder for one page.
#[derive(Debug, Clone, Default)]
pub struct PageBuilder {
    operations: Vec<Operation>,
    fields: Vec<FieldSpec>,
}

impl PageBuilder {
    /// Show `text` with font resource `font` at PDF point `(x, y)`.
    pub fn text(mut self, font: &str, size: f32, x: f32, y: f32, text: &str) -> Self {
        self.operations.extend([
            Operation::new("BT", vec![]),
            Operation::new("Tf", vec![Object::Name(font.as_bytes().to_vec()), real(size)]),
            Operation::new("Td", vec![real(x), real(y)]),
            Operation::new("Tj", vec![Object::string_literal(text)]),
            Operation::new("ET", vec![]),
        ]);
        self
    }

    /// Black stroked line.
    pub fn line(mut self, x0: f32, y0: f32, x1: f32, y1: f32, width: f32) -> Self {
        self.operations.extend([
            Operation::new("q", vec![]),
            Operation::new("w", vec![real(width)]),
            Operation::new("RG", vec![real(0.0), real(0.0), real(0.0)]),
            Operation::new("m", vec![real(x0), real(y0)]),
            Operation::new("l", vec![real(x1), real(y1)]),
            Operation::new("S", vec![]),
            Operation::new("Q", vec![]),
        ]);
        self
    }

    /// Stroked rectangle in the given grey level.
    pub fn frame(mut self, x: f32, y: f32, w: f32, h: f32, gray: f32) -> Self {
        self.operations.extend([
            Operation::new("q", vec![]),
            Operation::new("G", vec![real(gray)]),
            Operation::new("re", vec![real(x), real(y), real(w), real(h)]),
            Operation::new("S", vec![]),
            Operation::new("Q", vec![]),
        ]);
        self
    }

    /// Filled rectangle in the given grey level, no stroke.
    pub fn shade(mut self, x: f32, y: f32, w: f32, h: f32, gray: f32) -> Self {
        self.operations.extend([
            Operation::new("q", vec![]),
            Operation::new("g", vec![real(gray)]),
            Operation::new("re", vec![real(x), real(y), real(w), real(h)]),
            Operation::new("f", vec![]),
            Operation::new("Q", vec![]),
        ]);
        self
    }

    /// Raw operations appended to the page content.
    pub fn operations(mut self, operations: Vec<Operation>) -> Self {
        self.operations.extend(operations);
        self
    }

    /// Text form field with a merged widget.
    pub fn text_field(mut self, name: &str, rect: [f32; 4], value: Option<&str>) -> Self {
        self.fields.push(FieldSpec::Merged {
            name: name.to_string(),
            field_type: "Tx",
            rect,
            value: value.map(str::to_string),
        });
        self
    }

    /// Checkbox field with a merged widget.
    pub fn checkbox(mut self, name: &str, rect: [f32; 4]) -> Self {
        self.fields.push(FieldSpec::Merged {
            name: name.to_string(),
            field_type: "Btn",
            rect,
            value: None,
        });
        self
    }

    /// Signature field whose widget is a kid of the field, so `/FT` is
    /// inherited.
    pub fn signature_field(mut self, name: &str, rect: [f32; 4]) -> Self {
        self.fields.push(FieldSpec::Parented {
            name: name.to_string(),
            field_type: "Sig",
            rect,
        });
        self
    }
}

/// Builder for a whole document.
#[derive(Debug, Clone, Default)]
pub struct DocumentBuilder {
    pages: Vec<PageBuilder>,
    inherit_media_box: bool,
}

impl DocumentBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Put `/MediaBox` on the page tree root instead of each page.
    pub fn inherit_media_box(mut self) -> Self {
        self.inherit_media_box = true;
        self
    }

    pub fn page(mut self, build: impl FnOnce(PageBuilder) -> PageBuilder) -> Self {
        self.pages.push(build(PageBuilder::default()));
        self
    }

    pub fn build_document(self) -> Document {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica",
            "Encoding" => "WinAnsiEncoding",
        });
        let media_box = rect_array([0.0, 0.0, PAGE_WIDTH, PAGE_HEIGHT]);

        let mut kids = Vec::new();
        let mut fields = Vec::new();
        let mut has_signature = false;

        for page in self.pages {
            let content = Content {
                operations: page.operations,
            };
            let content_id = doc.add_object(Stream::new(
                Dictionary::new(),
                content.encode().unwrap_or_default(),
            ));
            let page_id = doc.new_object_id();

            let mut annots = Vec::new();
            for field in page.fields {
                let (field_id, widget_id) = add_field(&mut doc, page_id, &field);
                has_signature |= matches!(field, FieldSpec::Parented { field_type: "Sig", .. });
                fields.push(Object::Reference(field_id));
                annots.push(Object::Reference(widget_id));
            }

            let mut dict = dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "Contents" => content_id,
                "Resources" => dictionary! {
                    "Font" => dictionary! { "F1" => font_id },
                },
            };
            if !self.inherit_media_box {
                dict.set("MediaBox", media_box.clone());
            }
            if !annots.is_empty() {
                dict.set("Annots", Object::Array(annots));
            }
            doc.objects.insert(page_id, Object::Dictionary(dict));
            kids.push(Object::Reference(page_id));
        }

        let mut pages = dictionary! {
            "Type" => "Pages",
            "Count" => kids.len() as i64,
            "Kids" => kids,
        };
        if self.inherit_media_box {
            pages.set("MediaBox", media_box);
        }
        doc.objects.insert(pages_id, Object::Dictionary(pages));

        let mut catalog = dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        };
        if !fields.is_empty() {
            let mut acroform = dictionary! { "Fields" => fields };
            if has_signature {
                acroform.set("SigFlags", 3);
            }
            let acroform_id = doc.add_object(acroform);
            catalog.set("AcroForm", acroform_id);
        }
        let catalog_id = doc.add_object(catalog);
        doc.trailer.set("Root", catalog_id);
        doc
    }

    pub fn build(self) -> Vec<u8> {
        let mut doc = self.build_document();
        let mut out = Vec::new();
        doc.save_to(&mut out).unwrap_or_default();
        out
    }
}

fn add_field(doc: &mut Document, page_id: ObjectId, field: &FieldSpec) -> (ObjectId, ObjectId) {
    match field {
        FieldSpec::Merged {
            name,
            field_type,
            rect,
            value,
        } => {
            let mut dict = dictionary! {
                "Type" => "Annot",
                "Subtype" => "Widget",
                "FT" => *field_type,
                "T" => Object::string_literal(name.as_str()),
                "Rect" => rect_array(*rect),
                "P" => page_id,
                "F" => 4,
            };
            if let Some(value) = value {
                dict.set("V", Object::string_literal(value.as_str()));
            }
            let id = doc.add_object(dict);
            (id, id)
        }
        FieldSpec::Parented {
            name,
            field_type,
            rect,
        } => {
            let field_id = doc.new_object_id();
            let widget_id = doc.add_object(dictionary! {
                "Type" => "Annot",
                "Subtype" => "Widget",
                "Parent" => field_id,
                "Rect" => rect_array(*rect),
                "P" => page_id,
                "F" => 4,
            });
            doc.objects.insert(
                field_id,
                Object::Dictionary(dictionary! {
                    "FT" => *field_type,
                    "T" => Object::string_literal(name.as_str()),
                    "Kids" => vec![Object::Reference(widget_id)],
                }),
            );
            (field_id, widget_id)
        }
    }
}

// -- Scenarios -----------------------------------------------------------------

/// Top-left rectangle of the amount cell in [`invoice`].
pub const INVOICE_AMOUNT: Rect = Rect::new(100.0, 200.0, 180.0, 215.0);

/// Baseline of the amount text in top-left coordinates.
pub const INVOICE_BASELINE: f32 = 212.0;

/// Top-left `y` of the table rule just below the amount cell.
pub const INVOICE_RULE_Y: f32 = 216.0;

/// One page with an amount `36500000` in a table cell, a horizontal rule
/// one point below the cell and a frame around the table.
pub fn invoice() -> Vec<u8> {
    DocumentBuilder::new()
        .page(|p| {
            p.text("F1", 14.0, 72.0, 720.0, "INVOICE")
                .text("F1", 11.0, 100.0, PAGE_HEIGHT - INVOICE_BASELINE, "36500000")
                .line(90.0, PAGE_HEIGHT - INVOICE_RULE_Y, 400.0, PAGE_HEIGHT - INVOICE_RULE_Y, 1.0)
                .frame(90.0, PAGE_HEIGHT - 240.0, 310.0, 50.0, 0.0)
        })
        .build()
}

/// A form page with a text field, a signature field and a signature-date
/// field whose name starts with "sig".
pub fn signed_form() -> Vec<u8> {
    DocumentBuilder::new()
        .page(|p| {
            p.text("F1", 11.0, 72.0, 700.0, "Amount:")
                .text_field("amount", [150.0, 690.0, 300.0, 710.0], Some("100"))
                .signature_field("Signature1", [72.0, 100.0, 272.0, 140.0])
                .text_field("SigDate", [300.0, 100.0, 400.0, 120.0], None)
        })
        .build()
}

/// A document with `count` pages of body text.
pub fn multi_page(count: usize) -> Vec<u8> {
    (0..count)
        .fold(DocumentBuilder::new(), |builder, n| {
            builder.page(|p| p.text("F1", 12.0, 72.0, 720.0, &format!("Page {}", n + 1)))
        })
        .build()
}

/// Point the page at a single FlateDecode stream whose data does not inflate.
/// Returns the stream id.
pub fn corrupt_contents(document: &mut Document, page_id: ObjectId) -> ObjectId {
    let stream = Stream::new(
        dictionary! { "Filter" => "FlateDecode" },
        b"BT (36500000) Tj ET, not deflated".to_vec(),
    );
    let stream_id = document.add_object(stream);
    if let Ok(page) = document.get_dictionary_mut(page_id) {
        page.set("Contents", Object::Reference(stream_id));
    }
    stream_id
}

fn push16(out: &mut Vec<u8>, values: &[u16]) {
    for value in values {
        out.extend_from_slice(&value.to_be_bytes());
    }
}

/// A TrueType program with a blank glyph for each character of `chars`
/// (BMP only) and no other glyphs besides `.notdef`.
pub fn truetype_font(chars: &str) -> Vec<u8> {
    let mut codes: Vec<u16> = chars.chars().filter_map(|ch| u16::try_from(u32::from(ch)).ok()).collect();
    codes.sort_unstable();
    codes.dedup();
    let glyphs = codes.len() as u16 + 1;

    // Format 4 subtable, one segment per code plus the closing 0xFFFF one.
    let ends: Vec<u16> = codes.iter().copied().chain([0xFFFF]).collect();
    let deltas: Vec<u16> = (1u16..).zip(&codes).map(|(gid, code)| gid.wrapping_sub(*code)).chain([1]).collect();
    let segments = ends.len() as u16;
    let mut cmap = Vec::new();
    push16(&mut cmap, &[0, 1, 3, 1]);
    cmap.extend_from_slice(&12u32.to_be_bytes());
    push16(&mut cmap, &[4, 16 + 8 * segments, 0, segments * 2, 0, 0, 0]);
    push16(&mut cmap, &ends);
    push16(&mut cmap, &[0]);
    push16(&mut cmap, &ends);
    push16(&mut cmap, &deltas);
    push16(&mut cmap, &vec![0; ends.len()]);

    let mut head = Vec::new();
    head.extend_from_slice(&0x0001_0000u32.to_be_bytes());
    head.extend_from_slice(&0x0001_0000u32.to_be_bytes());
    head.extend_from_slice(&0u32.to_be_bytes());
    head.extend_from_slice(&0x5F0F_3CF5u32.to_be_bytes());
    push16(&mut head, &[0, 1000]);
    head.extend_from_slice(&[0; 16]);
    push16(&mut head, &[0, (-200i16) as u16, 500, 800, 0, 8, 2, 0, 0]);

    let mut hhea = Vec::new();
    hhea.extend_from_slice(&0x0001_0000u32.to_be_bytes());
    push16(&mut hhea, &[800, (-200i16) as u16, 0, 500, 0, 0, 500, 1, 0, 0, 0, 0, 0, 0, 0, glyphs]);

    let mut maxp = Vec::new();
    maxp.extend_from_slice(&0x0000_5000u32.to_be_bytes());
    push16(&mut maxp, &[glyphs]);

    let mut hmtx = Vec::new();
    for _ in 0..glyphs {
        push16(&mut hmtx, &[500, 0]);
    }

    let mut loca = Vec::new();
    push16(&mut loca, &vec![0; usize::from(glyphs) + 1]);

    // Table records must be sorted by tag.
    let tables: [(&[u8; 4], Vec<u8>); 7] = [
        (b"cmap", cmap),
        (b"glyf", vec![0; 4]),
        (b"head", head),
        (b"hhea", hhea),
        (b"hmtx", hmtx),
        (b"loca", loca),
        (b"maxp", maxp),
    ];

    let directory = 12 + 16 * tables.len();
    let mut font = Vec::new();
    font.extend_from_slice(&0x0001_0000u32.to_be_bytes());
    push16(&mut font, &[tables.len() as u16, 64, 2, 48]);
    let mut body = Vec::new();
    for (tag, data) in &tables {
        font.extend_from_slice(*tag);
        font.extend_from_slice(&0u32.to_be_bytes());
        font.extend_from_slice(&((directory + body.len()) as u32).to_be_bytes());
        font.extend_from_slice(&(data.len() as u32).to_be_bytes());
        body.extend_from_slice(data);
        body.resize(body.len().next_multiple_of(4), 0);
    }
    font.extend_from_slice(&body);
    font
}

/// Strings shown on the 0-based `page`, in content order, joined by spaces.
/// Empty runs are skipped.
pub fn page_text(bytes: &[u8], page: usize) -> String {
    let Ok(document) = super::load_document(bytes) else {
        return String::new();
    };
    let Ok(id) = super::page_id(&document, page) else {
        return String::new();
    };
    let content = super::page::page_content(&document, id).unwrap_or_default();
    let operations = Content::decode(&content).map(|c| c.operations).unwrap_or_default();

    let mut runs = Vec::new();
    for operation in &operations {
        let shown = match operation.operator.as_str() {
            "Tj" | "TJ" | "'" => operation.operands.first(),
            "\"" => operation.operands.get(2),
            _ => None,
        };
        let bytes: Vec<u8> = match shown {
            Some(Object::String(bytes, _)) => bytes.clone(),
            Some(Object::Array(items)) => items
                .iter()
                .filter_map(|item| match item {
                    Object::String(bytes, _) => Some(bytes.as_slice()),
                    _ => None,
                })
                .flatten()
                .copied()
                .collect(),
            _ => continue,
        };
        if !bytes.is_empty() {
            runs.push(String::from_utf8_lossy(&bytes).into_owned());
        }
    }
    runs.join(" ")
}
