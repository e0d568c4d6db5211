//! Font subsetting as part of a save.

mod common;

use std::rc::Rc;

use common::ttf_builder::TtfBuilder;
use common::{init_logging, save_to_vec};
use pdf_creator::fonts::{FontSubsetter, TrueTypeFont};
use pdf_creator::io::MemoryStream;
use pdf_creator::writer::{save_with_options, CreatorOptions, SaveFlags};
use pdf_creator::{Dictionary, IndirectObjectHolder, Object, PdfDocument, Stream};

fn latin_program() -> Vec<u8> {
    let mut builder = TtfBuilder::new(100).padding(16 * 1024);
    for (i, ch) in (' '..='~').enumerate() {
        builder = builder.map_unicode(ch, i as u16 + 1);
    }
    builder.build()
}

fn page_with_text(doc: &PdfDocument, content: &[u8]) -> Rc<Dictionary> {
    let page = doc.create_new_page(doc.page_count(), 612.0, 792.0);
    let (stream_num, _) = doc.new_indirect(Object::Stream(Rc::new(Stream::with_data(content.to_vec()))));
    page.set_for("Contents", Object::reference(stream_num));
    page
}

fn register_font(doc: &PdfDocument, page: &Dictionary, name: &str, font: &Dictionary) {
    let resources = page.get_dict_for("Resources", doc).unwrap();
    let fonts = match resources.get_dict_for("Font", doc) {
        Some(fonts) => fonts,
        None => resources.set_new_dictionary_for("Font"),
    };
    fonts.set_for(name, Object::reference(font.obj_num()));
}

fn descriptor_for(doc: &PdfDocument, program: Vec<u8>) -> (Rc<Dictionary>, u32) {
    let (file, _) = doc.new_indirect(Object::Stream(Rc::new(Stream::with_data(program))));
    let descriptor = doc.new_indirect_dictionary();
    descriptor.set_for("Type", Object::name("FontDescriptor"));
    descriptor.set_for("FontFile2", Object::reference(file));
    (descriptor, file)
}

/// Simple TrueType font on `page` as `name`; returns the font file number.
fn add_truetype(doc: &PdfDocument, page: &Dictionary, name: &str, program: Vec<u8>) -> u32 {
    let (descriptor, file_num) = descriptor_for(doc, program);
    let font = doc.new_indirect_dictionary();
    font.set_for("Type", Object::name("Font"));
    font.set_for("Subtype", Object::name("TrueType"));
    font.set_for("FontDescriptor", Object::reference(descriptor.obj_num()));
    register_font(doc, page, name, &font);
    file_num
}

/// Composite font with an identity CID to GID map.
fn add_type0(doc: &PdfDocument, page: &Dictionary, name: &str, program: Vec<u8>) -> u32 {
    let (descriptor, file_num) = descriptor_for(doc, program);
    let cid_font = doc.new_indirect_dictionary();
    cid_font.set_for("Type", Object::name("Font"));
    cid_font.set_for("Subtype", Object::name("CIDFontType2"));
    cid_font.set_for("FontDescriptor", Object::reference(descriptor.obj_num()));
    let font = doc.new_indirect_dictionary();
    font.set_for("Type", Object::name("Font"));
    font.set_for("Subtype", Object::name("Type0"));
    font.set_for("Encoding", Object::name("Identity-H"));
    let descendants = font.set_new_array_for("DescendantFonts");
    descendants.append(Object::reference(cid_font.obj_num()));
    register_font(doc, page, name, &font);
    file_num
}

fn stream_bytes(doc: &PdfDocument, obj_num: u32) -> Vec<u8> {
    let obj = doc.get_or_parse_indirect_object(obj_num).unwrap();
    obj.as_stream().unwrap().decoded_data().unwrap()
}

#[test]
fn test_hello_world_subset_shrinks_font() {
    init_logging();
    let doc = PdfDocument::new();
    let page = page_with_text(&doc, b"BT /F1 24 Tf 72 700 Td (Hello world) Tj ET");
    let program = latin_program();
    let file_num = add_truetype(&doc, &page, "F1", program.clone());

    let bytes = save_to_vec(&doc, SaveFlags::SUBSET_NEW_FONTS);
    let reopened = PdfDocument::from_bytes(bytes).unwrap();
    let subset = stream_bytes(&reopened, file_num);
    assert!(subset.len() < program.len() / 4, "{} of {} bytes", subset.len(), program.len());

    let original = TrueTypeFont::parse(&program).unwrap();
    let trimmed = TrueTypeFont::parse(&subset).unwrap();
    assert_eq!(trimmed.num_glyphs(), original.num_glyphs());
    for ch in "Helowrd".chars() {
        let gid = original.glyph_id(ch as u32).unwrap();
        assert_eq!(trimmed.glyph_bbox(gid), original.glyph_bbox(gid), "glyph for {:?}", ch);
    }
    let unused = original.glyph_id('Z' as u32).unwrap();
    assert_eq!(trimmed.glyph_bbox(unused), None);

    // The in-memory document still holds the full program.
    assert_eq!(stream_bytes(&doc, file_num), program);
}

#[test]
fn test_without_flag_fonts_are_untouched() {
    let doc = PdfDocument::new();
    let page = page_with_text(&doc, b"BT /F1 24 Tf (Hi) Tj ET");
    let program = latin_program();
    let file_num = add_truetype(&doc, &page, "F1", program.clone());

    let reopened = PdfDocument::from_bytes(save_to_vec(&doc, SaveFlags::empty())).unwrap();
    assert_eq!(stream_bytes(&reopened, file_num), program);
}

#[test]
fn test_two_fonts_two_overrides() {
    let doc = PdfDocument::new();
    let page = page_with_text(&doc, b"BT /F1 12 Tf (AB) Tj /F2 12 Tf <00050007> Tj ET");
    let first = add_truetype(&doc, &page, "F1", latin_program());
    let second = add_type0(&doc, &page, "F2", TtfBuilder::new(30).padding(8 * 1024).build());

    let overrides = FontSubsetter::new(&doc).generate_object_overrides(&doc.new_obj_nums());
    let mut keys: Vec<u32> = overrides.keys().copied().collect();
    keys.sort_unstable();
    let mut expected = vec![first, second];
    expected.sort_unstable();
    assert_eq!(keys, expected);

    let mut out = MemoryStream::new();
    let report = save_with_options(&doc, &mut out, SaveFlags::SUBSET_NEW_FONTS, CreatorOptions::default()).unwrap();
    assert_eq!(report.overrides_written, 2);

    let reopened = PdfDocument::from_bytes(out.into_bytes()).unwrap();
    let cid_subset = stream_bytes(&reopened, second);
    let font = TrueTypeFont::parse(&cid_subset).unwrap();
    assert!(font.glyph_bbox(5).is_some());
    assert!(font.glyph_bbox(7).is_some());
    assert_eq!(font.glyph_bbox(6), None);
}

#[test]
fn test_empty_new_set_parses_nothing() {
    let doc = PdfDocument::new();
    let page = page_with_text(&doc, b"BT /F1 12 Tf (A) Tj ET");
    add_truetype(&doc, &page, "F1", latin_program());
    assert!(FontSubsetter::new(&doc).generate_object_overrides(&[]).is_empty());
    assert_eq!(doc.content_parse_count(), 0);
}

#[test]
fn test_incremental_subset_appends_override() {
    let base = PdfDocument::new();
    base.create_new_page(0, 612.0, 792.0);
    let original = save_to_vec(&base, SaveFlags::empty());

    let doc = PdfDocument::from_bytes(original.clone()).unwrap();
    let page = page_with_text(&doc, b"BT /F1 12 Tf (Q) Tj ET");
    let program = latin_program();
    let file_num = add_truetype(&doc, &page, "F1", program.clone());

    let bytes = save_to_vec(&doc, SaveFlags::INCREMENTAL | SaveFlags::SUBSET_NEW_FONTS);
    assert!(bytes.starts_with(&original));
    let reopened = PdfDocument::from_bytes(bytes).unwrap();
    assert_eq!(reopened.page_count(), 2);
    assert!(stream_bytes(&reopened, file_num).len() < program.len());
}

#[test]
fn test_win_ansi_punctuation_survives_subset() {
    let doc = PdfDocument::new();
    let page = page_with_text(&doc, b"BT /F1 12 Tf (A\\227\\200) Tj ET");
    let program = TtfBuilder::new(20)
        .map_unicode('A', 3)
        .map_unicode('B', 4)
        .map_unicode('\u{2014}', 7)
        .map_unicode('\u{20AC}', 9)
        .padding(4 * 1024)
        .build();
    let file_num = add_truetype(&doc, &page, "F1", program.clone());
    let font = page
        .get_dict_for("Resources", &doc)
        .and_then(|r| r.get_dict_for("Font", &doc))
        .and_then(|f| f.get_dict_for("F1", &doc))
        .unwrap();
    font.set_for("Encoding", Object::name("WinAnsiEncoding"));

    let reopened = PdfDocument::from_bytes(save_to_vec(&doc, SaveFlags::SUBSET_NEW_FONTS)).unwrap();
    let original = TrueTypeFont::parse(&program).unwrap();
    let subset = stream_bytes(&reopened, file_num);
    let trimmed = TrueTypeFont::parse(&subset).unwrap();
    for gid in [3, 7, 9] {
        assert_eq!(trimmed.glyph_bbox(gid), original.glyph_bbox(gid), "glyph {}", gid);
    }
    assert_eq!(trimmed.glyph_bbox(4), None);
}
