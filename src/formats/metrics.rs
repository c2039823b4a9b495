//! Standard Type 1 font faces, WinAnsi encoding and glyph widths.
//!
//! Widths are the AFM advance widths (1/1000 em) for printable ASCII. Other
//! WinAnsi code points fall back to a representative width, which is close
//! enough for line breaking.

/// One of the four faces embedded by name in exported PDFs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Face {
    /// Helvetica.
    Regular,
    /// Helvetica-Bold.
    Bold,
    /// Helvetica-Oblique.
    Oblique,
    /// Courier.
    Mono,
}

impl Face {
    /// All faces, in resource order.
    pub const ALL: [Face; 4] = [Face::Regular, Face::Bold, Face::Oblique, Face::Mono];

    /// Map a typography font name onto a face.
    pub fn from_font_name(name: &str) -> Self {
        match name {
            "Helvetica-Bold" => Face::Bold,
            "Helvetica-Oblique" => Face::Oblique,
            "Courier" => Face::Mono,
            _ => Face::Regular,
        }
    }

    /// Resource name inside the page resources dictionary.
    pub fn resource(self) -> &'static str {
        match self {
            Face::Regular => "F1",
            Face::Bold => "F2",
            Face::Oblique => "F3",
            Face::Mono => "F4",
        }
    }

    /// PostScript base font name.
    pub fn base_font(self) -> &'static str {
        match self {
            Face::Regular => "Helvetica",
            Face::Bold => "Helvetica-Bold",
            Face::Oblique => "Helvetica-Oblique",
            Face::Mono => "Courier",
        }
    }

    /// Advance width of one encoded byte, in 1/1000 em.
    pub fn width(self, byte: u8) -> u16 {
        if self == Face::Mono {
            return 600;
        }
        let bold = self == Face::Bold;
        match byte {
            0x20..=0x7e => {
                let table = if bold { &HELVETICA_BOLD } else { &HELVETICA };
                table[usize::from(byte - 0x20)]
            }
            0x95 => 350,
            0x85 | 0x97 => 1000,
            0x91 | 0x92 => {
                if bold {
                    278
                } else {
                    222
                }
            }
            0x93 | 0x94 => {
                if bold {
                    500
                } else {
                    333
                }
            }
            _ => {
                if bold {
                    611
                } else {
                    556
                }
            }
        }
    }

    /// Width of `text` at `size` points.
    pub fn text_width(self, text: &str, size: f32) -> f32 {
        let units: u32 = encode_win_ansi(text)
            .into_iter()
            .map(|byte| u32::from(self.width(byte)))
            .sum();
        units as f32 * size / 1000.0
    }
}

/// Encode text for a WinAnsiEncoding simple font.
///
/// Latin-1 maps directly; typographic punctuation maps to its WinAnsi slot;
/// anything else becomes `?`.
pub fn encode_win_ansi(text: &str) -> Vec<u8> {
    text.chars()
        .map(|ch| match ch {
            '\t' | '\n' | '\r' => b' ',
            ' '..='~' | '\u{a0}'..='\u{ff}' => ch as u8,
            '\u{20ac}' => 0x80,
            '\u{2026}' => 0x85,
            '\u{2018}' => 0x91,
            '\u{2019}' => 0x92,
            '\u{201c}' => 0x93,
            '\u{201d}' => 0x94,
            '\u{2022}' => 0x95,
            '\u{2013}' => 0x96,
            '\u{2014}' => 0x97,
            '\u{2122}' => 0x99,
            _ => b'?',
        })
        .collect()
}

#[rustfmt::skip]
const HELVETICA: [u16; 95] = [
    278, 278, 355, 556, 556, 889, 667, 191, 333, 333, 389, 584, 278, 333, 278, 278,
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556,
    278, 278, 584, 584, 584, 556, 1015,
    667, 667, 722, 722, 667, 611, 778, 722, 278, 500, 667, 556, 833,
    722, 778, 667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611,
    278, 278, 278, 469, 556, 333,
    556, 556, 500, 556, 556, 278, 556, 556, 222, 222, 500, 222, 833,
    556, 556, 556, 556, 333, 500, 278, 556, 500, 722, 500, 500, 500,
    334, 260, 334, 584,
];

#[rustfmt::skip]
const HELVETICA_BOLD: [u16; 95] = [
    278, 333, 474, 556, 556, 889, 722, 238, 333, 333, 389, 584, 278, 333, 278, 278,
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556,
    333, 333, 584, 584, 584, 611, 975,
    722, 722, 722, 722, 667, 611, 778, 722, 278, 556, 722, 611, 833,
    722, 778, 667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611,
    333, 278, 333, 584, 556, 333,
    556, 611, 556, 611, 556, 333, 611, 611, 278, 278, 556, 278, 889,
    611, 611, 611, 611, 389, 556, 333, 611, 556, 778, 556, 556, 500,
    389, 280, 389, 584,
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_win_ansi() {
        assert_eq!(encode_win_ansi("Ab 1"), b"Ab 1".to_vec());
        assert_eq!(encode_win_ansi("café"), vec![b'c', b'a', b'f', 0xe9]);
        assert_eq!(encode_win_ansi("\u{2022} \u{2014}"), vec![0x95, b' ', 0x97]);
        assert_eq!(encode_win_ansi("日"), vec![b'?']);
    }

    #[test]
    fn test_widths() {
        assert_eq!(Face::Regular.width(b' '), 278);
        assert_eq!(Face::Regular.width(b'W'), 944);
        assert_eq!(Face::Bold.width(b'b'), 611);
        assert_eq!(Face::Mono.width(b'i'), 600);
        assert_eq!(Face::Regular.width(b'~'), 584);
        assert_eq!(Face::Bold.width(b'~'), 584);
    }

    #[test]
    fn test_text_width() {
        // 600 units per glyph.
        assert_eq!(Face::Mono.text_width("abcd", 10.0), 24.0);
        assert!(Face::Bold.text_width("bold", 11.0) > Face::Regular.text_width("bold", 11.0));
    }

    #[test]
    fn test_face_from_font_name() {
        assert_eq!(Face::from_font_name("Helvetica"), Face::Regular);
        assert_eq!(Face::from_font_name("Helvetica-Bold"), Face::Bold);
        assert_eq!(Face::from_font_name("Courier"), Face::Mono);
        assert_eq!(Face::Oblique.resource(), "F3");
    }
}
