//! PDF font dictionaries.
//!
//! A [`PdfFont`] resolves the pieces of a font dictionary needed to turn
//! shown strings into glyph IDs: the font kind, its descriptor, the
//! embedded TrueType program and, for composite fonts, the CID to GID map.

use std::cell::OnceCell;
use std::rc::Rc;

use crate::fonts::encoding::{unicode_to_mac_roman, BaseEncoding, FontEncoding};
use crate::fonts::truetype_parser::TrueTypeFont;
use crate::holder::IndirectObjectHolder;
use crate::object::{Dictionary, Stream};

/// Font dictionary subtype.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FontKind {
    /// Simple TrueType font
    TrueType,
    /// Type 1 or multiple master font
    Type1,
    /// Type 3 font
    Type3,
    /// Composite font with a descendant CIDFont
    Type0,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum CidToGid {
    Identity,
    Table(Vec<u16>),
}

/// A font used by text on a page.
#[derive(Debug)]
pub struct PdfFont {
    dict: Rc<Dictionary>,
    kind: FontKind,
    descriptor: Option<Rc<Dictionary>>,
    font_file: Option<Rc<Stream>>,
    cid_to_gid: CidToGid,
    encoding: Option<FontEncoding>,
    program: OnceCell<Option<Vec<u8>>>,
}

/// Font descriptor flag for fonts outside the standard Latin set.
const FLAG_SYMBOLIC: i64 = 1 << 2;

impl PdfFont {
    /// Resolve `dict` against `holder`.
    pub fn load(dict: Rc<Dictionary>, holder: &dyn IndirectObjectHolder) -> Self {
        let kind = match dict.get_name_for("Subtype", holder).as_deref() {
            Some("TrueType") => FontKind::TrueType,
            Some("Type0") => FontKind::Type0,
            Some("Type3") => FontKind::Type3,
            _ => FontKind::Type1,
        };

        let mut cid_to_gid = CidToGid::Identity;
        let descriptor = if kind == FontKind::Type0 {
            let cid_font = dict
                .get_array_for("DescendantFonts", holder)
                .and_then(|fonts| fonts.get_dict_at(0, holder));
            let map = cid_font
                .as_ref()
                .and_then(|f| f.get_stream_for("CIDToGIDMap", holder));
            if let Some(map) = map {
                match map.decoded_data() {
                    Ok(data) => {
                        let table = data
                            .chunks_exact(2)
                            .map(|p| u16::from_be_bytes([p[0], p[1]]))
                            .collect();
                        cid_to_gid = CidToGid::Table(table);
                    },
                    Err(e) => log::warn!("Ignoring undecodable CIDToGIDMap: {}", e),
                }
            }
            cid_font.and_then(|f| f.get_dict_for("FontDescriptor", holder))
        } else {
            dict.get_dict_for("FontDescriptor", holder)
        };
        let font_file = descriptor.as_ref().and_then(|d| d.get_stream_for("FontFile2", holder));

        // Symbolic fonts without an /Encoding address their cmap by code.
        let encoding = if kind == FontKind::TrueType {
            let flags = descriptor
                .as_ref()
                .and_then(|d| d.get_integer_for("Flags", holder))
                .unwrap_or(0);
            FontEncoding::load(&dict, holder).or_else(|| {
                (flags & FLAG_SYMBOLIC == 0).then(|| FontEncoding::new(BaseEncoding::Standard))
            })
        } else {
            None
        };

        Self {
            dict,
            kind,
            descriptor,
            font_file,
            cid_to_gid,
            encoding,
            program: OnceCell::new(),
        }
    }

    /// The font dictionary itself.
    pub fn dict(&self) -> &Rc<Dictionary> {
        &self.dict
    }

    /// Object number of the font dictionary, 0 if inline.
    pub fn obj_num(&self) -> u32 {
        self.dict.obj_num()
    }

    /// Font kind.
    pub fn kind(&self) -> FontKind {
        self.kind
    }

    /// True for composite (Type0) fonts.
    pub fn is_cid_font(&self) -> bool {
        self.kind == FontKind::Type0
    }

    /// The font descriptor; for composite fonts, the descendant's.
    pub fn descriptor(&self) -> Option<&Rc<Dictionary>> {
        self.descriptor.as_ref()
    }

    /// Embedded TrueType program stream (`/FontFile2`).
    pub fn font_file2(&self) -> Option<&Rc<Stream>> {
        self.font_file.as_ref()
    }

    /// Split shown bytes into character codes.
    ///
    /// Composite fonts use two-byte codes; a trailing odd byte is dropped.
    pub fn char_codes(&self, text: &[u8]) -> Vec<u32> {
        if self.is_cid_font() {
            text.chunks_exact(2)
                .map(|p| u32::from(u16::from_be_bytes([p[0], p[1]])))
                .collect()
        } else {
            text.iter().map(|b| u32::from(*b)).collect()
        }
    }

    /// Glyph ID that `code` selects, or `None` if it has no glyph.
    pub fn glyph_for_char_code(&self, code: u32) -> Option<u16> {
        match self.kind {
            FontKind::Type0 => {
                let cid = u16::try_from(code).ok()?;
                let gid = match &self.cid_to_gid {
                    CidToGid::Identity => cid,
                    CidToGid::Table(table) => *table.get(cid as usize)?,
                };
                match self.program() {
                    Some(font) if gid >= font.num_glyphs() => None,
                    _ => Some(gid),
                }
            },
            FontKind::TrueType => self.truetype_glyph(code),
            FontKind::Type1 | FontKind::Type3 => None,
        }
    }

    // Encoded fonts go through Unicode: the (3,1) table, or the (1,0)
    // table via the MacRoman code. Symbolic fonts use the (3,0) table,
    // where codes often live at 0xF000 + code. Raw codes are the fallback.
    fn truetype_glyph(&self, code: u32) -> Option<u16> {
        let font = self.program()?;
        let code = u8::try_from(code).ok()?;
        if !font.has_any_cmap() {
            return Some(u16::from(code)).filter(|g| *g < font.num_glyphs());
        }
        let raw = u32::from(code);
        self.encoding
            .as_ref()
            .and_then(|encoding| encoding.unicode(code))
            .and_then(|unicode| {
                font.glyph_in_cmap(3, 1, u32::from(unicode)).or_else(|| {
                    unicode_to_mac_roman(unicode).and_then(|mac| font.glyph_in_cmap(1, 0, u32::from(mac)))
                })
            })
            .or_else(|| font.glyph_in_cmap(3, 0, raw))
            .or_else(|| font.glyph_in_cmap(3, 0, 0xF000 + raw))
            .or_else(|| font.glyph_in_cmap(1, 0, raw))
            .or_else(|| font.glyph_in_cmap(3, 1, raw))
    }

    fn program(&self) -> Option<TrueTypeFont<'_>> {
        let bytes = self.program.get_or_init(|| {
            let stream = self.font_file.as_ref()?;
            match stream.decoded_data() {
                Ok(data) => Some(data),
                Err(e) => {
                    log::warn!("Font program of font object {} is undecodable: {}", self.obj_num(), e);
                    None
                },
            }
        });
        TrueTypeFont::parse(bytes.as_deref()?).ok()
    }
}

#[cfg(test)]
mod tests {
    use crate::fonts::ttf_builder::TtfBuilder;
    use super::*;
    use crate::holder::MemoryHolder;
    use crate::object::{Array, Object};

    fn truetype_font(holder: &MemoryHolder, program: Vec<u8>) -> Rc<Dictionary> {
        let (file, _) = holder.new_indirect(Object::Stream(Rc::new(Stream::with_data(program))));
        let descriptor = holder.new_indirect_dictionary();
        descriptor.set_for("FontFile2", Object::reference(file));
        let font = holder.new_indirect_dictionary();
        font.set_for("Subtype", Object::name("TrueType"));
        font.set_for("FontDescriptor", Object::reference(descriptor.obj_num()));
        font
    }

    #[test]
    fn test_simple_truetype_mapping() {
        let holder = MemoryHolder::new();
        let program = TtfBuilder::new(10).map_symbol(0xF041, 4).map_mac(0x42, 6).map_unicode('C', 7).build();
        let font = PdfFont::load(truetype_font(&holder, program), &holder);
        assert_eq!(font.kind(), FontKind::TrueType);
        assert!(font.font_file2().is_some());
        assert_eq!(font.char_codes(b"AB"), vec![0x41, 0x42]);
        assert_eq!(font.glyph_for_char_code(0x41), Some(4));
        assert_eq!(font.glyph_for_char_code(0x42), Some(6));
        assert_eq!(font.glyph_for_char_code(0x43), Some(7));
        assert_eq!(font.glyph_for_char_code(0x44), None);
    }

    #[test]
    fn test_win_ansi_codes_resolve_through_unicode() {
        let holder = MemoryHolder::new();
        let program = TtfBuilder::new(10)
            .map_unicode('A', 3)
            .map_unicode('\u{2014}', 7)
            .map_unicode('\u{20AC}', 8)
            .build();
        let dict = truetype_font(&holder, program);
        dict.set_for("Encoding", Object::name("WinAnsiEncoding"));
        let font = PdfFont::load(dict, &holder);
        assert_eq!(font.glyph_for_char_code(0x41), Some(3));
        assert_eq!(font.glyph_for_char_code(0x97), Some(7));
        assert_eq!(font.glyph_for_char_code(0x80), Some(8));
        assert_eq!(font.glyph_for_char_code(0x96), None);
    }

    #[test]
    fn test_differences_and_mac_table() {
        let holder = MemoryHolder::new();
        let program = TtfBuilder::new(10).map_unicode('\u{2022}', 5).map_mac(0x8E, 6).build();
        let dict = truetype_font(&holder, program);
        let encoding = dict.set_new_dictionary_for("Encoding");
        encoding.set_for(
            "Differences",
            Object::Array(Rc::new(Array::from_objects(vec![
                Object::Integer(1),
                Object::name("bullet"),
                Object::name("eacute"),
            ]))),
        );
        let font = PdfFont::load(dict, &holder);
        assert_eq!(font.glyph_for_char_code(1), Some(5));
        assert_eq!(font.glyph_for_char_code(2), Some(6));
    }

    #[test]
    fn test_symbolic_font_ignores_standard_encoding() {
        let holder = MemoryHolder::new();
        let program = TtfBuilder::new(10).map_symbol(0xF027, 4).map_unicode('\u{2019}', 5).build();
        let dict = truetype_font(&holder, program);
        let descriptor = dict.get_dict_for("FontDescriptor", &holder).unwrap();
        descriptor.set_for("Flags", Object::Integer(4));
        let font = PdfFont::load(dict, &holder);
        assert_eq!(font.glyph_for_char_code(0x27), Some(4));
    }

    #[test]
    fn test_no_cmap_uses_code() {
        let holder = MemoryHolder::new();
        let font = PdfFont::load(truetype_font(&holder, TtfBuilder::new(5).build()), &holder);
        assert_eq!(font.glyph_for_char_code(3), Some(3));
        assert_eq!(font.glyph_for_char_code(9), None);
    }

    #[test]
    fn test_cid_font() {
        let holder = MemoryHolder::new();
        let (file, _) = holder.new_indirect(Object::Stream(Rc::new(Stream::with_data(TtfBuilder::new(300).build()))));
        let (map, _) = holder.new_indirect(Object::Stream(Rc::new(Stream::with_data(vec![0, 9, 0, 200, 1, 0]))));
        let descriptor = Rc::new(Dictionary::new());
        descriptor.set_for("FontFile2", Object::reference(file));
        let cid_font = Rc::new(Dictionary::new());
        cid_font.set_for("FontDescriptor", Object::Dictionary(descriptor));
        cid_font.set_for("CIDToGIDMap", Object::reference(map));
        let font = holder.new_indirect_dictionary();
        font.set_for("Subtype", Object::name("Type0"));
        font.set_for(
            "DescendantFonts",
            Object::Array(Rc::new(Array::from_objects(vec![Object::Dictionary(cid_font)]))),
        );

        let font = PdfFont::load(font, &holder);
        assert!(font.is_cid_font());
        assert!(font.descriptor().is_some());
        assert_eq!(font.char_codes(&[0, 1, 0, 2, 7]), vec![1, 2]);
        assert_eq!(font.glyph_for_char_code(0), Some(9));
        assert_eq!(font.glyph_for_char_code(1), Some(200));
        assert_eq!(font.glyph_for_char_code(2), Some(256));
        assert_eq!(font.glyph_for_char_code(3), None);
    }

    #[test]
    fn test_type1_has_no_glyphs() {
        let holder = MemoryHolder::new();
        let font = holder.new_indirect_dictionary();
        font.set_for("Subtype", Object::name("Type1"));
        let font = PdfFont::load(font, &holder);
        assert_eq!(font.kind(), FontKind::Type1);
        assert!(font.font_file2().is_none());
        assert_eq!(font.glyph_for_char_code(65), None);
    }
}
