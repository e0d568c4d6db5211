//! Fonts and font subsetting.
//!
//! [`PdfFont`] resolves a font dictionary to its embedded program and maps
//! character codes to glyph IDs. [`FontSubsetter`] uses that mapping to
//! shrink embedded TrueType programs to the glyphs a document shows.

mod encoding;
mod font;
mod font_subsetter;
mod subset;
mod truetype_parser;

#[cfg(test)]
#[path = "../../tests/common/ttf_builder.rs"]
pub(crate) mod ttf_builder;

pub use encoding::{glyph_name_to_unicode, BaseEncoding, FontEncoding};
pub use font::{FontKind, PdfFont};
pub use font_subsetter::FontSubsetter;
pub use subset::subset_retain_gids;
pub use truetype_parser::TrueTypeFont;
