// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// WinAnsiEncoding (PDF 1.7, Annex D) for simple fonts.

/// Unicode values for codes 0x80..=0x9F; zero marks an unused code.
const HIGH_CONTROL: [u16; 32] = [
    0x20AC, 0, 0x201A, 0x0192, 0x201E, 0x2026, 0x2020, 0x2021, 0x02C6, 0x2030, 0x0160, 0x2039,
    0x0152, 0, 0x017D, 0, 0, 0x2018, 0x2019, 0x201C, 0x201D, 0x2022, 0x2013, 0x2014, 0x02DC,
    0x2122, 0x0161, 0x203A, 0x0153, 0, 0x017E, 0x0178,
];

/// Byte substituted for characters the encoding cannot represent.
pub const REPLACEMENT: u8 = b'?';

/// Character for a WinAnsi code, if the code is printable.
pub fn char_for(code: u8) -> Option<char> {
    match code {
        0x20..=0x7E | 0xA0..=0xFF => Some(char::from(code)),
        0x80..=0x9F => match HIGH_CONTROL[usize::from(code - 0x80)] {
            0 => None,
            unicode => char::from_u32(u32::from(unicode)),
        },
        _ => None,
    }
}

/// WinAnsi code for a character.
pub fn code_for(ch: char) -> Option<u8> {
    let value = u32::from(ch);
    match value {
        0x20..=0x7E | 0xA0..=0xFF => u8::try_from(value).ok(),
        _ => HIGH_CONTROL
            .iter()
            .position(|&unicode| unicode != 0 && u32::from(unicode) == value)
            .and_then(|index| u8::try_from(index + 0x80).ok()),
    }
}

/// Encode text, replacing unmappable characters with `?`. Tabs and other
/// whitespace controls become spaces.
pub fn encode(text: &str) -> Vec<u8> {
    text.chars()
        .map(|ch| match ch {
            '\t' | '\n' | '\r' => b' ',
            ch => code_for(ch).unwrap_or(REPLACEMENT),
        })
        .collect()
}
