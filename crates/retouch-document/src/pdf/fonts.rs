// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Font resolution: pick the embedded font program extracted from the
// document when there is one, otherwise map the family name onto one of the
// fourteen standard PDF fonts.

use retouch_core::types::{FontAsset, StyleFlags};
use serde::Serialize;
use tracing::debug;

/// The standard fonts every PDF viewer provides without embedding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum BuiltinFont {
    Helvetica,
    HelveticaBold,
    HelveticaOblique,
    HelveticaBoldOblique,
    TimesRoman,
    TimesBold,
    TimesItalic,
    TimesBoldItalic,
    Courier,
    CourierBold,
    CourierOblique,
    CourierBoldOblique,
    Symbol,
    ZapfDingbats,
}

impl BuiltinFont {
    /// `/BaseFont` name.
    pub const fn base_font(self) -> &'static str {
        match self {
            Self::Helvetica => "Helvetica",
            Self::HelveticaBold => "Helvetica-Bold",
            Self::HelveticaOblique => "Helvetica-Oblique",
            Self::HelveticaBoldOblique => "Helvetica-BoldOblique",
            Self::TimesRoman => "Times-Roman",
            Self::TimesBold => "Times-Bold",
            Self::TimesItalic => "Times-Italic",
            Self::TimesBoldItalic => "Times-BoldItalic",
            Self::Courier => "Courier",
            Self::CourierBold => "Courier-Bold",
            Self::CourierOblique => "Courier-Oblique",
            Self::CourierBoldOblique => "Courier-BoldOblique",
            Self::Symbol => "Symbol",
            Self::ZapfDingbats => "ZapfDingbats",
        }
    }

    /// Four-letter identifier, also accepted as a family name.
    pub const fn code(self) -> &'static str {
        match self {
            Self::Helvetica => "helv",
            Self::HelveticaBold => "hebo",
            Self::HelveticaOblique => "heit",
            Self::HelveticaBoldOblique => "hebi",
            Self::TimesRoman => "tiro",
            Self::TimesBold => "tibo",
            Self::TimesItalic => "tiit",
            Self::TimesBoldItalic => "tibi",
            Self::Courier => "cour",
            Self::CourierBold => "cobo",
            Self::CourierOblique => "coit",
            Self::CourierBoldOblique => "cobi",
            Self::Symbol => "symb",
            Self::ZapfDingbats => "zadb",
        }
    }

    /// Symbol and ZapfDingbats use their own builtin encodings.
    pub const fn is_symbolic(self) -> bool {
        matches!(self, Self::Symbol | Self::ZapfDingbats)
    }

    const fn helvetica(bold: bool, italic: bool) -> Self {
        match (bold, italic) {
            (false, false) => Self::Helvetica,
            (true, false) => Self::HelveticaBold,
            (false, true) => Self::HelveticaOblique,
            (true, true) => Self::HelveticaBoldOblique,
        }
    }
}

/// Outcome of font resolution for one edit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FontSelection {
    Embedded(FontAsset),
    Builtin(BuiltinFont),
}

impl FontSelection {
    pub fn describe(&self) -> String {
        match self {
            Self::Embedded(asset) => format!("embedded {}", asset.family),
            Self::Builtin(font) => font.base_font().to_string(),
        }
    }
}

/// Normalised family names (lowercase, no whitespace) with an exact builtin
/// mapping.
const KNOWN_FAMILIES: &[(&str, BuiltinFont)] = &[
    ("helvetica", BuiltinFont::Helvetica),
    ("arial", BuiltinFont::Helvetica),
    ("arialmt", BuiltinFont::Helvetica),
    ("helvetica-bold", BuiltinFont::HelveticaBold),
    ("arial-bold", BuiltinFont::HelveticaBold),
    ("arial-boldmt", BuiltinFont::HelveticaBold),
    ("arial,bold", BuiltinFont::HelveticaBold),
    ("helvetica-oblique", BuiltinFont::HelveticaOblique),
    ("helvetica-italic", BuiltinFont::HelveticaOblique),
    ("arial-italic", BuiltinFont::HelveticaOblique),
    ("arial-italicmt", BuiltinFont::HelveticaOblique),
    ("arial,italic", BuiltinFont::HelveticaOblique),
    ("helvetica-boldoblique", BuiltinFont::HelveticaBoldOblique),
    ("helvetica-bolditalic", BuiltinFont::HelveticaBoldOblique),
    ("arial-bolditalic", BuiltinFont::HelveticaBoldOblique),
    ("arial-bolditalicmt", BuiltinFont::HelveticaBoldOblique),
    ("arial,bolditalic", BuiltinFont::HelveticaBoldOblique),
    ("times", BuiltinFont::TimesRoman),
    ("times-roman", BuiltinFont::TimesRoman),
    ("timesroman", BuiltinFont::TimesRoman),
    ("timesnewroman", BuiltinFont::TimesRoman),
    ("timesnewromanps", BuiltinFont::TimesRoman),
    ("timesnewromanpsmt", BuiltinFont::TimesRoman),
    ("times-bold", BuiltinFont::TimesBold),
    ("timesnewroman-bold", BuiltinFont::TimesBold),
    ("timesnewroman,bold", BuiltinFont::TimesBold),
    ("timesnewromanps-boldmt", BuiltinFont::TimesBold),
    ("times-italic", BuiltinFont::TimesItalic),
    ("timesnewroman-italic", BuiltinFont::TimesItalic),
    ("timesnewroman,italic", BuiltinFont::TimesItalic),
    ("timesnewromanps-italicmt", BuiltinFont::TimesItalic),
    ("times-bolditalic", BuiltinFont::TimesBoldItalic),
    ("timesnewroman-bolditalic", BuiltinFont::TimesBoldItalic),
    ("timesnewroman,bolditalic", BuiltinFont::TimesBoldItalic),
    ("timesnewromanps-bolditalicmt", BuiltinFont::TimesBoldItalic),
    ("courier", BuiltinFont::Courier),
    ("couriernew", BuiltinFont::Courier),
    ("couriernewpsmt", BuiltinFont::Courier),
    ("courier-bold", BuiltinFont::CourierBold),
    ("couriernew-bold", BuiltinFont::CourierBold),
    ("couriernew,bold", BuiltinFont::CourierBold),
    ("couriernewps-boldmt", BuiltinFont::CourierBold),
    ("courier-oblique", BuiltinFont::CourierOblique),
    ("courier-italic", BuiltinFont::CourierOblique),
    ("couriernew-italic", BuiltinFont::CourierOblique),
    ("couriernew,italic", BuiltinFont::CourierOblique),
    ("couriernewps-italicmt", BuiltinFont::CourierOblique),
    ("courier-boldoblique", BuiltinFont::CourierBoldOblique),
    ("courier-bolditalic", BuiltinFont::CourierBoldOblique),
    ("couriernew-bolditalic", BuiltinFont::CourierBoldOblique),
    ("couriernewps-bolditalicmt", BuiltinFont::CourierBoldOblique),
    ("symbol", BuiltinFont::Symbol),
    ("symbolmt", BuiltinFont::Symbol),
    ("zapfdingbats", BuiltinFont::ZapfDingbats),
    ("dingbats", BuiltinFont::ZapfDingbats),
];

/// Strip a six-letter subset tag: `ABCDEF+ArialMT` becomes `ArialMT`.
pub fn clean_font_name(raw: &str) -> &str {
    match raw.split_once('+') {
        Some((tag, rest)) if tag.len() == 6 && tag.bytes().all(|b| b.is_ascii_uppercase()) => rest,
        _ => raw,
    }
}

fn normalise(family: &str) -> String {
    clean_font_name(family.trim())
        .chars()
        .filter(|c| !c.is_whitespace())
        .flat_map(char::to_lowercase)
        .collect()
}

/// Exact table lookup, also accepting the four-letter codes.
fn lookup(normalised: &str) -> Option<BuiltinFont> {
    KNOWN_FAMILIES
        .iter()
        .find(|(name, _)| *name == normalised)
        .map(|(_, font)| *font)
        .or_else(|| ALL_BUILTINS.iter().copied().find(|font| font.code() == normalised))
}

const ALL_BUILTINS: [BuiltinFont; 14] = [
    BuiltinFont::Helvetica,
    BuiltinFont::HelveticaBold,
    BuiltinFont::HelveticaOblique,
    BuiltinFont::HelveticaBoldOblique,
    BuiltinFont::TimesRoman,
    BuiltinFont::TimesBold,
    BuiltinFont::TimesItalic,
    BuiltinFont::TimesBoldItalic,
    BuiltinFont::Courier,
    BuiltinFont::CourierBold,
    BuiltinFont::CourierOblique,
    BuiltinFont::CourierBoldOblique,
    BuiltinFont::Symbol,
    BuiltinFont::ZapfDingbats,
];

/// Map a family name and style onto a builtin font. Never fails; anything
/// unrecognised becomes a Helvetica variant.
pub fn builtin_for(family: &str, style: StyleFlags) -> BuiltinFont {
    let name = normalise(family);
    if let Some(font) = lookup(&name) {
        return font;
    }
    let bold = name.contains("bold") || style.is_bold();
    let italic = name.contains("italic") || name.contains("oblique") || style.is_italic();
    BuiltinFont::helvetica(bold, italic)
}

/// Choose the font for an edit. An embedded asset always wins, whatever
/// the style flags say.
pub fn resolve_font(family: &str, style: StyleFlags, embedded: Option<&FontAsset>) -> FontSelection {
    let selection = match embedded {
        Some(asset) => FontSelection::Embedded(asset.clone()),
        None => FontSelection::Builtin(builtin_for(family, style)),
    };
    debug!(family, flags = style.0, font = %selection.describe(), "font resolved");
    selection
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn asset() -> FontAsset {
        FontAsset {
            family: "ArialMT".into(),
            path: PathBuf::from("/tmp/ArialMT.ttf"),
        }
    }

    #[test]
    fn embedded_asset_wins_regardless_of_flags() {
        let bold_italic = StyleFlags(StyleFlags::BOLD | StyleFlags::ITALIC);
        assert_eq!(
            resolve_font("ArialMT", bold_italic, Some(&asset())),
            FontSelection::Embedded(asset())
        );
    }

    #[test]
    fn arial_bold_maps_to_bold_helvetica() {
        assert_eq!(
            resolve_font("Arial-BoldMT", StyleFlags::empty(), None),
            FontSelection::Builtin(BuiltinFont::HelveticaBold)
        );
    }

    #[test]
    fn empty_name_is_helvetica() {
        assert_eq!(
            resolve_font("", StyleFlags::empty(), None),
            FontSelection::Builtin(BuiltinFont::Helvetica)
        );
    }

    #[test]
    fn table_covers_standard_families() {
        assert_eq!(builtin_for("Times New Roman", StyleFlags::empty()), BuiltinFont::TimesRoman);
        assert_eq!(builtin_for("TimesNewRomanPS-BoldMT", StyleFlags::empty()), BuiltinFont::TimesBold);
        assert_eq!(builtin_for("CourierNewPSMT", StyleFlags::empty()), BuiltinFont::Courier);
        assert_eq!(builtin_for("Symbol", StyleFlags::empty()), BuiltinFont::Symbol);
        assert_eq!(builtin_for("ZapfDingbats", StyleFlags::empty()), BuiltinFont::ZapfDingbats);
        assert_eq!(builtin_for("helv", StyleFlags::empty()), BuiltinFont::Helvetica);
        assert_eq!(builtin_for("tibi", StyleFlags::empty()), BuiltinFont::TimesBoldItalic);
    }

    #[test]
    fn unknown_names_use_name_and_flag_heuristics() {
        assert_eq!(builtin_for("Calibri-Bold", StyleFlags::empty()), BuiltinFont::HelveticaBold);
        assert_eq!(builtin_for("Garamond-Oblique", StyleFlags::empty()), BuiltinFont::HelveticaOblique);
        assert_eq!(
            builtin_for("Verdana", StyleFlags(StyleFlags::BOLD | StyleFlags::ITALIC)),
            BuiltinFont::HelveticaBoldOblique
        );
        assert_eq!(builtin_for("Verdana", StyleFlags(StyleFlags::SERIF)), BuiltinFont::Helvetica);
    }

    #[test]
    fn subset_prefix_is_ignored() {
        assert_eq!(clean_font_name("BCDEEE+ArialMT"), "ArialMT");
        assert_eq!(clean_font_name("Abcdef+ArialMT"), "Abcdef+ArialMT");
        assert_eq!(clean_font_name("ABC+Font"), "ABC+Font");
        assert_eq!(builtin_for("ABCDEF+Arial-BoldMT", StyleFlags::empty()), BuiltinFont::HelveticaBold);
    }
}
