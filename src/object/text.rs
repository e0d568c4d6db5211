//! PDF text strings.
//!
//! Text strings are either UTF-16BE with a byte order mark or
//! PDFDocEncoding. Some producers also write UTF-8 with a BOM or
//! little-endian UTF-16, which are accepted on input.

use lazy_static::lazy_static;

lazy_static! {
    /// PDFDocEncoding byte to Unicode scalar; `None` for undefined codes.
    static ref PDF_DOC_ENCODING: [Option<char>; 256] = build_pdf_doc_encoding();
}

const HIGH_RANGE: [char; 31] = [
    '\u{2022}', '\u{2020}', '\u{2021}', '\u{2026}', '\u{2014}', '\u{2013}', '\u{0192}',
    '\u{2044}', '\u{2039}', '\u{203A}', '\u{2212}', '\u{2030}', '\u{201E}', '\u{201C}',
    '\u{201D}', '\u{2018}', '\u{2019}', '\u{201A}', '\u{2122}', '\u{FB01}', '\u{FB02}',
    '\u{0141}', '\u{0152}', '\u{0160}', '\u{0178}', '\u{017D}', '\u{0131}', '\u{0142}',
    '\u{0153}', '\u{0161}', '\u{017E}',
];

const ACCENT_RANGE: [char; 8] = [
    '\u{02D8}', '\u{02C7}', '\u{02C6}', '\u{02D9}', '\u{02DD}', '\u{02DB}', '\u{02DA}', '\u{02DC}',
];

fn build_pdf_doc_encoding() -> [Option<char>; 256] {
    let mut table = [None; 256];
    for (byte, slot) in table.iter_mut().enumerate() {
        *slot = char::from_u32(byte as u32);
    }
    for (i, ch) in ACCENT_RANGE.iter().enumerate() {
        table[0x18 + i] = Some(*ch);
    }
    for (i, ch) in HIGH_RANGE.iter().enumerate() {
        table[0x80 + i] = Some(*ch);
    }
    table[0x7F] = None;
    table[0x9F] = None;
    table[0xA0] = Some('\u{20AC}');
    table[0xAD] = None;
    table
}

/// Decode a PDF text string to Rust `String`.
pub fn decode_text_string(bytes: &[u8]) -> String {
    if let Some(rest) = bytes.strip_prefix(&[0xFE, 0xFF]) {
        return decode_utf16(rest, u16::from_be_bytes);
    }
    if let Some(rest) = bytes.strip_prefix(&[0xFF, 0xFE]) {
        return decode_utf16(rest, u16::from_le_bytes);
    }
    if let Some(rest) = bytes.strip_prefix(&[0xEF, 0xBB, 0xBF]) {
        return String::from_utf8_lossy(rest).into_owned();
    }
    bytes
        .iter()
        .filter_map(|b| PDF_DOC_ENCODING[*b as usize])
        .collect()
}

fn decode_utf16(bytes: &[u8], unit: fn([u8; 2]) -> u16) -> String {
    let units: Vec<u16> = bytes.chunks_exact(2).map(|c| unit([c[0], c[1]])).collect();
    char::decode_utf16(units)
        .map(|r| r.unwrap_or(char::REPLACEMENT_CHARACTER))
        .collect()
}

/// Encode `text` as a PDF text string.
///
/// PDFDocEncoding is used when every character has a code; otherwise the
/// result is UTF-16BE with a leading byte order mark.
pub fn encode_text_string(text: &str) -> Vec<u8> {
    let mut doc_encoded = Vec::with_capacity(text.len());
    for ch in text.chars() {
        match encode_pdf_doc_char(ch) {
            Some(b) => doc_encoded.push(b),
            None => return encode_utf16be(text),
        }
    }
    doc_encoded
}

fn encode_pdf_doc_char(ch: char) -> Option<u8> {
    // Codes whose PDFDocEncoding meaning differs from Latin-1 are looked up.
    (0u16..256)
        .find(|b| PDF_DOC_ENCODING[*b as usize] == Some(ch))
        .map(|b| b as u8)
}

fn encode_utf16be(text: &str) -> Vec<u8> {
    let mut out = vec![0xFE, 0xFF];
    for unit in text.encode_utf16() {
        out.extend_from_slice(&unit.to_be_bytes());
    }
    out
}

/// Encode `text` as NUL-terminated UTF-16LE, the layout of wide-string buffers.
pub fn encode_utf16le_nul(text: &str) -> Vec<u8> {
    let mut out = Vec::with_capacity((text.len() + 1) * 2);
    for unit in text.encode_utf16() {
        out.extend_from_slice(&unit.to_le_bytes());
    }
    out.extend_from_slice(&[0, 0]);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_pdf_doc_encoding() {
        assert_eq!(decode_text_string(b"Hello"), "Hello");
        assert_eq!(decode_text_string(&[0x80, 0x92, 0xA0]), "\u{2022}\u{2122}\u{20AC}");
        assert_eq!(decode_text_string(&[0x18]), "\u{02D8}");
    }

    #[test]
    fn test_decode_utf16_variants() {
        assert_eq!(decode_text_string(&[0xFE, 0xFF, 0x04, 0x1F, 0x00, 0x21]), "П!");
        assert_eq!(decode_text_string(&[0xFF, 0xFE, 0x41, 0x00]), "A");
        assert_eq!(decode_text_string(&[0xEF, 0xBB, 0xBF, b'o', b'k']), "ok");
    }

    #[test]
    fn test_encode_prefers_pdf_doc_encoding() {
        assert_eq!(encode_text_string("en-US"), b"en-US");
        assert_eq!(encode_text_string("\u{2022}"), vec![0x80]);
        assert_eq!(encode_text_string("caf\u{e9}"), vec![b'c', b'a', b'f', 0xE9]);
    }

    #[test]
    fn test_encode_falls_back_to_utf16() {
        assert_eq!(encode_text_string("日"), vec![0xFE, 0xFF, 0x65, 0xE5]);
    }

    #[test]
    fn test_utf16le_nul() {
        let encoded = encode_utf16le_nul("en-US");
        assert_eq!(encoded.len(), 12);
        assert_eq!(&encoded[..2], &[b'e', 0]);
        assert_eq!(&encoded[10..], &[0, 0]);
        assert_eq!(encode_utf16le_nul("").len(), 2);
    }
}
