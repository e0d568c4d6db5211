//! Page objects.
//!
//! Interprets a page's content stream far enough to know which text each
//! show-text operator draws and in which font. Form XObjects are not
//! entered; their text belongs to the form, not the page.

use std::collections::HashMap;
use std::rc::Rc;

use crate::content::operators::Operator;
use crate::content::parser::parse_content_stream;
use crate::document::PdfDocument;
use crate::fonts::PdfFont;
use crate::object::{Dictionary, Object};

/// A text run drawn by one show-text operator.
#[derive(Debug, Clone)]
pub struct TextObject {
    font: Option<Rc<PdfFont>>,
    char_codes: Vec<u32>,
}

impl TextObject {
    /// The font selected by the last `Tf`, if it resolved.
    pub fn font(&self) -> Option<&Rc<PdfFont>> {
        self.font.as_ref()
    }

    /// Character codes shown, split according to the font.
    pub fn char_codes(&self) -> &[u32] {
        &self.char_codes
    }
}

/// An object drawn by a page's content stream.
#[derive(Debug, Clone)]
pub enum PageObject {
    /// Text
    Text(TextObject),
    /// XObject painted with `Do`
    XObject(String),
    /// Inline image
    InlineImage,
}

impl PageObject {
    /// The text run, for text objects.
    pub fn as_text(&self) -> Option<&TextObject> {
        match self {
            PageObject::Text(text) => Some(text),
            _ => None,
        }
    }
}

/// The page's `/Resources`, inherited through `/Parent` if needed.
pub fn page_resources(doc: &PdfDocument, page: &Dictionary) -> Option<Rc<Dictionary>> {
    if let Some(resources) = page.get_dict_for("Resources", doc) {
        return Some(resources);
    }
    let mut node = page.get_dict_for("Parent", doc);
    for _ in 0..doc.options().max_recursion_depth {
        let current = node?;
        if let Some(resources) = current.get_dict_for("Resources", doc) {
            return Some(resources);
        }
        node = current.get_dict_for("Parent", doc);
    }
    None
}

/// Decoded content of the page, with multiple streams joined by a space.
pub fn page_content(doc: &PdfDocument, page: &Dictionary) -> Vec<u8> {
    let streams = match page.get_direct("Contents", doc) {
        Some(Object::Stream(stream)) => vec![stream],
        Some(Object::Array(arr)) => (0..arr.len()).filter_map(|i| arr.get_stream_at(i, doc)).collect(),
        _ => Vec::new(),
    };
    let mut content = Vec::new();
    for stream in streams {
        match stream.decoded_data() {
            Ok(data) => {
                content.extend_from_slice(&data);
                content.push(b' ');
            },
            Err(e) => log::warn!("Skipping undecodable content stream {}: {}", stream.obj_num(), e),
        }
    }
    content
}

/// Parse the page's content into page objects.
pub fn parse_page_objects(doc: &PdfDocument, page: &Dictionary) -> Vec<PageObject> {
    doc.note_content_parse();
    let content = page_content(doc, page);
    let operators = match parse_content_stream(&content) {
        Ok(ops) => ops,
        Err(e) => {
            log::warn!("Failed to parse content of page {}: {}", page.obj_num(), e);
            return Vec::new();
        },
    };
    let font_resources = page_resources(doc, page).and_then(|r| r.get_dict_for("Font", doc));

    let mut fonts: HashMap<String, Option<Rc<PdfFont>>> = HashMap::new();
    let mut current: Option<Rc<PdfFont>> = None;
    let mut saved = Vec::new();
    let mut objects = Vec::new();

    for op in &operators {
        match op {
            Operator::SaveState => saved.push(current.clone()),
            Operator::RestoreState => {
                if let Some(font) = saved.pop() {
                    current = font;
                }
            },
            Operator::Tf { font, .. } => {
                current = fonts
                    .entry(font.clone())
                    .or_insert_with(|| {
                        let dict = font_resources.as_ref().and_then(|r| r.get_dict_for(font, doc));
                        if dict.is_none() {
                            log::debug!("Font resource /{} not found", font);
                        }
                        dict.map(|d| Rc::new(PdfFont::load(d, doc)))
                    })
                    .clone();
            },
            Operator::Do { name } => objects.push(PageObject::XObject(name.clone())),
            Operator::InlineImage { .. } => objects.push(PageObject::InlineImage),
            _ => {
                if let Some(text) = op.shown_text() {
                    let char_codes = match &current {
                        Some(font) => font.char_codes(&text),
                        None => text.iter().map(|b| u32::from(*b)).collect(),
                    };
                    objects.push(PageObject::Text(TextObject {
                        font: current.clone(),
                        char_codes,
                    }));
                }
            },
        }
    }
    objects
}
