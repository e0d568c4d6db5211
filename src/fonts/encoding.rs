//! Simple font encodings.
//!
//! Non-symbolic TrueType fonts select glyphs by name: a character code is
//! mapped through the font's base encoding and `/Differences` to a glyph
//! name, then to Unicode, and the Unicode value is looked up in the font
//! program's cmap.

use std::collections::{BTreeMap, HashMap};

use lazy_static::lazy_static;

use crate::holder::IndirectObjectHolder;
use crate::object::{Dictionary, Object};

lazy_static! {
    static ref GLYPH_NAMES: HashMap<&'static str, char> = build_glyph_names();
}

/// WinAnsiEncoding 0x80..=0x9F; 0 marks an undefined code.
const WIN_ANSI_CONTROL: [u16; 32] = [
    0x20AC, 0, 0x201A, 0x0192, 0x201E, 0x2026, 0x2020, 0x2021, 0x02C6, 0x2030, 0x0160, 0x2039, 0x0152, 0,
    0x017D, 0, 0, 0x2018, 0x2019, 0x201C, 0x201D, 0x2022, 0x2013, 0x2014, 0x02DC, 0x2122, 0x0161, 0x203A,
    0x0153, 0, 0x017E, 0x0178,
];

/// MacRomanEncoding 0x80..=0xFF; 0 marks an undefined code.
const MAC_ROMAN_HIGH: [u16; 128] = [
    0x00C4, 0x00C5, 0x00C7, 0x00C9, 0x00D1, 0x00D6, 0x00DC, 0x00E1, 0x00E0, 0x00E2, 0x00E4, 0x00E3, 0x00E5,
    0x00E7, 0x00E9, 0x00E8, 0x00EA, 0x00EB, 0x00ED, 0x00EC, 0x00EE, 0x00EF, 0x00F1, 0x00F3, 0x00F2, 0x00F4,
    0x00F6, 0x00F5, 0x00FA, 0x00F9, 0x00FB, 0x00FC, 0x2020, 0x00B0, 0x00A2, 0x00A3, 0x00A7, 0x2022, 0x00B6,
    0x00DF, 0x00AE, 0x00A9, 0x2122, 0x00B4, 0x00A8, 0x2260, 0x00C6, 0x00D8, 0x221E, 0x00B1, 0x2264, 0x2265,
    0x00A5, 0x00B5, 0x2202, 0x2211, 0x220F, 0x03C0, 0x222B, 0x00AA, 0x00BA, 0x03A9, 0x00E6, 0x00F8, 0x00BF,
    0x00A1, 0x00AC, 0x221A, 0x0192, 0x2248, 0x2206, 0x00AB, 0x00BB, 0x2026, 0x00A0, 0x00C0, 0x00C3, 0x00D5,
    0x0152, 0x0153, 0x2013, 0x2014, 0x201C, 0x201D, 0x2018, 0x2019, 0x00F7, 0x25CA, 0x00FF, 0x0178, 0x2044,
    0x00A4, 0x2039, 0x203A, 0xFB01, 0xFB02, 0x2021, 0x00B7, 0x201A, 0x201E, 0x2030, 0x00C2, 0x00CA, 0x00C1,
    0x00CB, 0x00C8, 0x00CD, 0x00CE, 0x00CF, 0x00CC, 0x00D3, 0x00D4, 0, 0x00D2, 0x00DA, 0x00DB, 0x00D9,
    0x0131, 0x02C6, 0x02DC, 0x00AF, 0x02D8, 0x02D9, 0x02DA, 0x00B8, 0x02DD, 0x02DB, 0x02C7,
];

/// StandardEncoding codes above 0x7F.
const STANDARD_HIGH: [(u8, u16); 56] = [
    (0xA1, 0x00A1), (0xA2, 0x00A2), (0xA3, 0x00A3), (0xA4, 0x2044), (0xA5, 0x00A5), (0xA6, 0x0192),
    (0xA7, 0x00A7), (0xA8, 0x00A4), (0xA9, 0x0027), (0xAA, 0x201C), (0xAB, 0x00AB), (0xAC, 0x2039),
    (0xAD, 0x203A), (0xAE, 0xFB01), (0xAF, 0xFB02), (0xB1, 0x2013), (0xB2, 0x2020), (0xB3, 0x2021),
    (0xB4, 0x00B7), (0xB6, 0x00B6), (0xB7, 0x2022), (0xB8, 0x201A), (0xB9, 0x201E), (0xBA, 0x201D),
    (0xBB, 0x00BB), (0xBC, 0x2026), (0xBD, 0x2030), (0xBF, 0x00BF), (0xC1, 0x0060), (0xC2, 0x00B4),
    (0xC3, 0x02C6), (0xC4, 0x02DC), (0xC5, 0x00AF), (0xC6, 0x02D8), (0xC7, 0x02D9), (0xC8, 0x00A8),
    (0xCA, 0x02DA), (0xCB, 0x00B8), (0xCD, 0x02DD), (0xCE, 0x02DB), (0xCF, 0x02C7), (0xD0, 0x2014),
    (0xE1, 0x00C6), (0xE3, 0x00AA), (0xE8, 0x0141), (0xE9, 0x00D8), (0xEA, 0x0152), (0xEB, 0x00BA),
    (0xF1, 0x00E6), (0xF5, 0x0131), (0xF8, 0x0142), (0xF9, 0x00F8), (0xFA, 0x0153), (0xFB, 0x00DF),
    (0x27, 0x2019), (0x60, 0x2018),
];

const ASCII_NAMES: [&str; 95] = [
    "space", "exclam", "quotedbl", "numbersign", "dollar", "percent", "ampersand", "quotesingle",
    "parenleft", "parenright", "asterisk", "plus", "comma", "hyphen", "period", "slash", "zero", "one",
    "two", "three", "four", "five", "six", "seven", "eight", "nine", "colon", "semicolon", "less", "equal",
    "greater", "question", "at", "A", "B", "C", "D", "E", "F", "G", "H", "I", "J", "K", "L", "M", "N", "O",
    "P", "Q", "R", "S", "T", "U", "V", "W", "X", "Y", "Z", "bracketleft", "backslash", "bracketright",
    "asciicircum", "underscore", "grave", "a", "b", "c", "d", "e", "f", "g", "h", "i", "j", "k", "l", "m",
    "n", "o", "p", "q", "r", "s", "t", "u", "v", "w", "x", "y", "z", "braceleft", "bar", "braceright",
    "asciitilde",
];

/// Names of U+00A1..=U+00FF in order.
const LATIN1_NAMES: [&str; 95] = [
    "exclamdown", "cent", "sterling", "currency", "yen", "brokenbar", "section", "dieresis", "copyright",
    "ordfeminine", "guillemotleft", "logicalnot", "sfthyphen", "registered", "macron", "degree",
    "plusminus", "twosuperior", "threesuperior", "acute", "mu", "paragraph", "periodcentered", "cedilla",
    "onesuperior", "ordmasculine", "guillemotright", "onequarter", "onehalf", "threequarters",
    "questiondown", "Agrave", "Aacute", "Acircumflex", "Atilde", "Adieresis", "Aring", "AE", "Ccedilla",
    "Egrave", "Eacute", "Ecircumflex", "Edieresis", "Igrave", "Iacute", "Icircumflex", "Idieresis", "Eth",
    "Ntilde", "Ograve", "Oacute", "Ocircumflex", "Otilde", "Odieresis", "multiply", "Oslash", "Ugrave",
    "Uacute", "Ucircumflex", "Udieresis", "Yacute", "Thorn", "germandbls", "agrave", "aacute",
    "acircumflex", "atilde", "adieresis", "aring", "ae", "ccedilla", "egrave", "eacute", "ecircumflex",
    "edieresis", "igrave", "iacute", "icircumflex", "idieresis", "eth", "ntilde", "ograve", "oacute",
    "ocircumflex", "otilde", "odieresis", "divide", "oslash", "ugrave", "uacute", "ucircumflex",
    "udieresis", "yacute", "thorn", "ydieresis",
];

const OTHER_NAMES: [(&str, u16); 50] = [
    ("Euro", 0x20AC), ("quotesinglbase", 0x201A), ("florin", 0x0192), ("quotedblbase", 0x201E),
    ("ellipsis", 0x2026), ("dagger", 0x2020), ("daggerdbl", 0x2021), ("circumflex", 0x02C6),
    ("perthousand", 0x2030), ("Scaron", 0x0160), ("guilsinglleft", 0x2039), ("OE", 0x0152),
    ("Zcaron", 0x017D), ("quoteleft", 0x2018), ("quoteright", 0x2019), ("quotedblleft", 0x201C),
    ("quotedblright", 0x201D), ("bullet", 0x2022), ("endash", 0x2013), ("emdash", 0x2014),
    ("tilde", 0x02DC), ("trademark", 0x2122), ("scaron", 0x0161), ("guilsinglright", 0x203A),
    ("oe", 0x0153), ("zcaron", 0x017E), ("Ydieresis", 0x0178), ("fraction", 0x2044), ("fi", 0xFB01),
    ("fl", 0xFB02), ("dotlessi", 0x0131), ("Lslash", 0x0141), ("lslash", 0x0142), ("breve", 0x02D8),
    ("dotaccent", 0x02D9), ("ring", 0x02DA), ("hungarumlaut", 0x02DD), ("ogonek", 0x02DB),
    ("caron", 0x02C7), ("notequal", 0x2260), ("infinity", 0x221E), ("lessequal", 0x2264),
    ("greaterequal", 0x2265), ("partialdiff", 0x2202), ("summation", 0x2211), ("product", 0x220F),
    ("pi", 0x03C0), ("integral", 0x222B), ("Omega", 0x03A9), ("minus", 0x2212),
];

fn build_glyph_names() -> HashMap<&'static str, char> {
    let mut names = HashMap::new();
    for (name, c) in ASCII_NAMES.iter().zip(' '..='~') {
        names.insert(*name, c);
    }
    for (name, c) in LATIN1_NAMES.iter().zip('\u{A1}'..='\u{FF}') {
        names.insert(*name, c);
    }
    for (name, code) in OTHER_NAMES {
        if let Some(c) = char::from_u32(u32::from(code)) {
            names.insert(name, c);
        }
    }
    for (name, code) in [("radical", 0x221A), ("approxequal", 0x2248), ("Delta", 0x2206), ("lozenge", 0x25CA)] {
        if let Some(c) = char::from_u32(code) {
            names.insert(name, c);
        }
    }
    names.insert("nbspace", '\u{A0}');
    names
}

/// Unicode value of a glyph name.
///
/// Accepts the standard Latin names plus the `uniXXXX` and `uXXXX[XX]`
/// forms.
pub fn glyph_name_to_unicode(name: &str) -> Option<char> {
    if let Some(c) = GLYPH_NAMES.get(name) {
        return Some(*c);
    }
    let hex = match name.strip_prefix("uni") {
        Some(hex) if hex.len() == 4 => hex,
        _ => name.strip_prefix('u').filter(|hex| (4..=6).contains(&hex.len()))?,
    };
    u32::from_str_radix(hex, 16).ok().and_then(char::from_u32)
}

/// Code of `c` in MacRomanEncoding.
pub fn unicode_to_mac_roman(c: char) -> Option<u8> {
    if (' '..='~').contains(&c) {
        return Some(c as u8);
    }
    let code = u16::try_from(u32::from(c)).ok().filter(|code| *code != 0)?;
    MAC_ROMAN_HIGH
        .iter()
        .position(|u| *u == code)
        .map(|i| 0x80 + i as u8)
}

/// Predefined single-byte encodings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BaseEncoding {
    /// StandardEncoding
    Standard,
    /// WinAnsiEncoding
    WinAnsi,
    /// MacRomanEncoding
    MacRoman,
}

impl BaseEncoding {
    /// Encoding named `name`, if it is one of the predefined ones.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "StandardEncoding" => Some(Self::Standard),
            "WinAnsiEncoding" => Some(Self::WinAnsi),
            "MacRomanEncoding" => Some(Self::MacRoman),
            _ => None,
        }
    }

    /// Unicode value of `code`, `None` if the code is undefined.
    pub fn unicode(self, code: u8) -> Option<char> {
        let value = match self {
            Self::Standard => match STANDARD_HIGH.iter().find(|(c, _)| *c == code) {
                Some((_, u)) => u32::from(*u),
                None if (0x20..0x7F).contains(&code) => u32::from(code),
                None => return None,
            },
            Self::WinAnsi => match code {
                0x20..=0x7E | 0xA0..=0xFF => u32::from(code),
                0x80..=0x9F => u32::from(WIN_ANSI_CONTROL[usize::from(code - 0x80)]),
                _ => return None,
            },
            Self::MacRoman => match code {
                0x20..=0x7E => u32::from(code),
                0x80..=0xFF => u32::from(MAC_ROMAN_HIGH[usize::from(code - 0x80)]),
                _ => return None,
            },
        };
        char::from_u32(value).filter(|c| *c != '\0')
    }
}

/// A simple font's `/Encoding`: a base encoding plus differences.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FontEncoding {
    base: BaseEncoding,
    differences: BTreeMap<u8, String>,
}

impl FontEncoding {
    /// Plain `base` without differences.
    pub fn new(base: BaseEncoding) -> Self {
        Self {
            base,
            differences: BTreeMap::new(),
        }
    }

    /// Read the `/Encoding` entry of `font`.
    ///
    /// Returns `None` when the entry is absent. Unknown encoding names and
    /// a missing `/BaseEncoding` fall back to StandardEncoding.
    pub fn load(font: &Dictionary, holder: &dyn IndirectObjectHolder) -> Option<Self> {
        let encoding = font.get_direct("Encoding", holder)?;
        if let Some(name) = encoding.as_name() {
            return Some(Self::new(BaseEncoding::from_name(name).unwrap_or(BaseEncoding::Standard)));
        }
        let dict = encoding.as_dict()?;
        let base = dict
            .get_name_for("BaseEncoding", holder)
            .and_then(|name| BaseEncoding::from_name(&name))
            .unwrap_or(BaseEncoding::Standard);
        let mut result = Self::new(base);
        if let Some(differences) = dict.get_array_for("Differences", holder) {
            result.apply_differences(&differences.to_vec(), holder);
        }
        Some(result)
    }

    fn apply_differences(&mut self, items: &[Object], holder: &dyn IndirectObjectHolder) {
        let mut code: Option<i64> = None;
        for item in items {
            let Some(item) = item.get_direct(holder) else {
                continue;
            };
            if let Some(start) = item.as_integer() {
                code = Some(start);
            } else if let (Some(name), Some(current)) = (item.as_name(), code) {
                match u8::try_from(current) {
                    Ok(c) => {
                        self.differences.insert(c, name.to_string());
                    },
                    Err(_) => log::debug!("Ignoring /Differences entry for code {}", current),
                }
                code = Some(current + 1);
            }
        }
    }

    /// The base encoding.
    pub fn base(&self) -> BaseEncoding {
        self.base
    }

    /// Unicode value that `code` selects.
    pub fn unicode(&self, code: u8) -> Option<char> {
        match self.differences.get(&code) {
            Some(name) => glyph_name_to_unicode(name),
            None => self.base.unicode(code),
        }
    }
}
