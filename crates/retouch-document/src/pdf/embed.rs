// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Font dictionaries for overlay text: standard Type1 fonts by name, and
// extracted TrueType/OpenType programs embedded as simple fonts with
// WinAnsi encoding.

use std::fs;

use lopdf::{Dictionary, Document, Object, ObjectId, Stream, dictionary};
use retouch_core::types::FontAsset;
use tracing::{debug, instrument};

use super::fonts::BuiltinFont;
use super::insert::InsertError;
use super::winansi;

/// First and last character codes described by `/Widths`.
const FIRST_CHAR: u8 = 32;
const LAST_CHAR: u8 = 255;

/// Font descriptor flag bits.
const FLAG_FIXED_PITCH: i64 = 1;
const FLAG_NONSYMBOLIC: i64 = 1 << 5;
const FLAG_ITALIC: i64 = 1 << 6;

/// Font dictionary for a standard font.
pub fn builtin_font_dict(font: BuiltinFont) -> Dictionary {
    let mut dict = dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => font.base_font(),
    };
    if !font.is_symbolic() {
        dict.set("Encoding", "WinAnsiEncoding");
    }
    dict
}

/// WinAnsi codes a font program has glyphs for.
#[derive(Debug, Clone)]
pub struct GlyphCoverage {
    codes: [bool; 256],
}

impl GlyphCoverage {
    fn of(face: &ttf_parser::Face<'_>) -> Self {
        let mut codes = [false; 256];
        for (code, covered) in (0u8..=u8::MAX).zip(codes.iter_mut()) {
            *covered = winansi::char_for(code).and_then(|ch| face.glyph_index(ch)).is_some();
        }
        Self { codes }
    }

    /// First character of `text` that would be drawn as `.notdef`.
    pub fn missing(&self, text: &str) -> Option<char> {
        missing_glyph(text, |code| self.codes[usize::from(code)])
    }
}

/// First character of `text` whose WinAnsi code fails `has_glyph`. Codes are
/// the ones actually written, so unmappable characters are checked as `?`.
pub fn missing_glyph(text: &str, has_glyph: impl Fn(u8) -> bool) -> Option<char> {
    text.chars()
        .zip(winansi::encode(text))
        .find(|(_, code)| !has_glyph(*code))
        .map(|(ch, _)| ch)
}

/// Outline flavour of a parsed font program.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outlines {
    TrueType,
    Cff,
}

/// Everything the PDF font objects need from a font program.
#[derive(Debug, Clone)]
struct FontMetrics {
    postscript_name: String,
    outlines: Outlines,
    widths: Vec<i64>,
    bbox: [i64; 4],
    ascent: i64,
    descent: i64,
    cap_height: i64,
    italic: bool,
    monospaced: bool,
    coverage: GlyphCoverage,
}

fn read_metrics(data: &[u8], family: &str) -> Result<FontMetrics, InsertError> {
    let face = ttf_parser::Face::parse(data, 0)
        .map_err(|err| InsertError::UnsupportedFont(family.to_string(), err.to_string()))?;

    let outlines = if face.tables().glyf.is_some() {
        Outlines::TrueType
    } else if face.tables().cff.is_some() {
        Outlines::Cff
    } else {
        return Err(InsertError::UnsupportedFont(
            family.to_string(),
            "no glyf or CFF outlines".into(),
        ));
    };

    let units_per_em = f32::from(face.units_per_em());
    if units_per_em <= 0.0 {
        return Err(InsertError::UnsupportedFont(family.to_string(), "zero unitsPerEm".into()));
    }
    let scale = |value: f32| (value * 1000.0 / units_per_em).round() as i64;

    let widths = (FIRST_CHAR..=LAST_CHAR)
        .map(|code| {
            winansi::char_for(code)
                .and_then(|ch| face.glyph_index(ch))
                .and_then(|gid| face.glyph_hor_advance(gid))
                .map(|advance| scale(f32::from(advance)))
                .unwrap_or(0)
        })
        .collect();

    let bb = face.global_bounding_box();
    let postscript_name = face
        .names()
        .into_iter()
        .filter(|name| name.name_id == ttf_parser::name_id::POST_SCRIPT_NAME)
        .find_map(|name| name.to_string())
        .unwrap_or_else(|| family.to_string());

    Ok(FontMetrics {
        postscript_name: pdf_name(&postscript_name),
        outlines,
        widths,
        bbox: [
            scale(f32::from(bb.x_min)),
            scale(f32::from(bb.y_min)),
            scale(f32::from(bb.x_max)),
            scale(f32::from(bb.y_max)),
        ],
        ascent: scale(f32::from(face.ascender())),
        descent: scale(f32::from(face.descender())),
        cap_height: scale(f32::from(face.capital_height().unwrap_or(face.ascender()))),
        italic: face.is_italic(),
        monospaced: face.is_monospaced(),
        coverage: GlyphCoverage::of(&face),
    })
}

/// Characters allowed in a `/BaseFont` name.
fn pdf_name(raw: &str) -> String {
    let name: String = raw
        .chars()
        .filter(|c| c.is_ascii_graphic() && !"()<>[]{}/%#".contains(*c))
        .collect();
    if name.is_empty() { "EmbeddedFont".to_string() } else { name }
}

/// Embed the font program at `asset.path` and return the font dictionary id
/// with the codes the program can draw.
#[instrument(skip_all, fields(family = %asset.family, path = %asset.path.display()))]
pub fn embed_font_file(
    document: &mut Document,
    asset: &FontAsset,
) -> Result<(ObjectId, GlyphCoverage), InsertError> {
    let data = fs::read(&asset.path).map_err(|source| InsertError::FontRead {
        path: asset.path.display().to_string(),
        source,
    })?;
    let metrics = read_metrics(&data, &asset.family)?;
    let data_len = data.len() as i64;

    let (file_key, file_stream, subtype) = match metrics.outlines {
        Outlines::TrueType => (
            "FontFile2",
            Stream::new(dictionary! { "Length1" => data_len }, data),
            "TrueType",
        ),
        Outlines::Cff => (
            "FontFile3",
            Stream::new(dictionary! { "Subtype" => "OpenType" }, data),
            "Type1",
        ),
    };
    let file_id = document.add_object(file_stream);

    let mut flags = FLAG_NONSYMBOLIC;
    if metrics.italic {
        flags |= FLAG_ITALIC;
    }
    if metrics.monospaced {
        flags |= FLAG_FIXED_PITCH;
    }

    let descriptor_id = document.add_object(dictionary! {
        "Type" => "FontDescriptor",
        "FontName" => Object::Name(metrics.postscript_name.clone().into_bytes()),
        "Flags" => flags,
        "FontBBox" => metrics.bbox.iter().copied().map(Object::Integer).collect::<Vec<_>>(),
        "ItalicAngle" => if metrics.italic { -12 } else { 0 },
        "Ascent" => metrics.ascent,
        "Descent" => metrics.descent,
        "CapHeight" => metrics.cap_height,
        "StemV" => 80,
        file_key => file_id,
    });

    let font_id = document.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => subtype,
        "BaseFont" => Object::Name(metrics.postscript_name.clone().into_bytes()),
        "FirstChar" => i64::from(FIRST_CHAR),
        "LastChar" => i64::from(LAST_CHAR),
        "Widths" => metrics.widths.iter().copied().map(Object::Integer).collect::<Vec<_>>(),
        "Encoding" => "WinAnsiEncoding",
        "FontDescriptor" => descriptor_id,
    });

    debug!(?font_id, name = %metrics.postscript_name, "font program embedded");
    Ok((font_id, metrics.coverage))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pdf::fixtures;
    use std::path::PathBuf;

    #[test]
    fn builtin_dict_uses_winansi_except_for_symbol_fonts() {
        let helv = builtin_font_dict(BuiltinFont::HelveticaBold);
        assert_eq!(helv.get(b"BaseFont").unwrap().as_name().unwrap(), b"Helvetica-Bold");
        assert_eq!(helv.get(b"Encoding").unwrap().as_name().unwrap(), b"WinAnsiEncoding");

        let symbol = builtin_font_dict(BuiltinFont::ZapfDingbats);
        assert!(symbol.get(b"Encoding").is_err());
    }

    #[test]
    fn missing_font_file_is_a_read_error() {
        let mut doc = Document::with_version("1.5");
        let asset = FontAsset {
            family: "Ghost".into(),
            path: PathBuf::from("/nonexistent/Ghost.ttf"),
        };
        assert!(matches!(
            embed_font_file(&mut doc, &asset),
            Err(InsertError::FontRead { .. })
        ));
    }

    #[test]
    fn garbage_font_file_is_unsupported() {
        let dir = std::env::temp_dir().join(format!("retouch-embed-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("Broken.ttf");
        std::fs::write(&path, b"not a font").unwrap();

        let mut doc = Document::with_version("1.5");
        let asset = FontAsset {
            family: "Broken".into(),
            path,
        };
        assert!(matches!(
            embed_font_file(&mut doc, &asset),
            Err(InsertError::UnsupportedFont(..))
        ));
        let _ = std::fs::remove_dir_all(dir);
    }

    #[test]
    fn coverage_finds_the_first_character_without_a_glyph() {
        let program = fixtures::truetype_font("0356");
        let face = ttf_parser::Face::parse(&program, 0).unwrap();
        let coverage = GlyphCoverage::of(&face);

        assert_eq!(coverage.missing("36500000"), None);
        assert_eq!(coverage.missing("36500001"), Some('1'));
        assert_eq!(coverage.missing("3 6"), Some(' '));
    }

    #[test]
    fn glyph_check_uses_written_codes() {
        assert_eq!(missing_glyph("a\u{4e2d}", |code| code != b'?'), Some('\u{4e2d}'));
        assert_eq!(missing_glyph("a\tb", |code| code != b'\t'), None);
        assert_eq!(missing_glyph("", |_| false), None);
    }

    #[test]
    fn embedded_font_reports_its_coverage() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Digits.ttf");
        std::fs::write(&path, fixtures::truetype_font("0123456789")).unwrap();

        let mut doc = Document::with_version("1.5");
        let asset = FontAsset {
            family: "Digits".into(),
            path,
        };
        let (font_id, coverage) = embed_font_file(&mut doc, &asset).unwrap();
        assert_eq!(coverage.missing("36500001"), None);
        assert_eq!(coverage.missing("$1"), Some('$'));

        let font = doc.get_dictionary(font_id).unwrap();
        assert_eq!(font.get(b"Subtype").unwrap().as_name().unwrap(), b"TrueType");
        assert_eq!(font.get(b"BaseFont").unwrap().as_name().unwrap(), b"Digits");
    }

    #[test]
    fn pdf_names_drop_delimiters() {
        assert_eq!(pdf_name("Arial Bold(MT)"), "ArialBoldMT");
        assert_eq!(pdf_name("   "), "EmbeddedFont");
    }
}
