//! TrueType font program access.
//!
//! Wraps the `ttf-parser` crate for the lookups needed when mapping PDF
//! character codes to glyph IDs in an embedded font program.

use ttf_parser::{cmap::Subtable, Face, GlyphId, PlatformId};

use crate::error::{Error, Result};

/// Parsed TrueType font program.
pub struct TrueTypeFont<'a> {
    face: Face<'a>,
    data: &'a [u8],
}

impl std::fmt::Debug for TrueTypeFont<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TrueTypeFont")
            .field("num_glyphs", &self.num_glyphs())
            .field("len", &self.data.len())
            .finish_non_exhaustive()
    }
}

impl<'a> TrueTypeFont<'a> {
    /// Parse a TrueType or OpenType font program.
    pub fn parse(data: &'a [u8]) -> Result<Self> {
        if data.is_empty() {
            return Err(Error::Font("Font program is empty".to_string()));
        }
        let face = Face::parse(data, 0).map_err(|e| Error::Font(format!("Failed to parse font program: {}", e)))?;
        Ok(Self { face, data })
    }

    /// Number of glyphs declared by `maxp`.
    pub fn num_glyphs(&self) -> u16 {
        self.face.number_of_glyphs()
    }

    /// Raw font program bytes.
    pub fn raw_data(&self) -> &[u8] {
        self.data
    }

    /// True for CFF-flavored OpenType programs.
    pub fn is_cff(&self) -> bool {
        self.data.get(..4) == Some(b"OTTO")
    }

    /// Glyph for a Unicode code point.
    pub fn glyph_id(&self, codepoint: u32) -> Option<u16> {
        char::from_u32(codepoint)
            .and_then(|c| self.face.glyph_index(c))
            .map(|g| g.0)
    }

    /// True if the font has a `cmap` subtable for `(platform, encoding)`.
    pub fn has_cmap(&self, platform: u16, encoding: u16) -> bool {
        self.subtable(platform, encoding).is_some()
    }

    /// True if the font has any `cmap` subtable.
    pub fn has_any_cmap(&self) -> bool {
        self.face
            .tables()
            .cmap
            .is_some_and(|cmap| cmap.subtables.into_iter().next().is_some())
    }

    /// Look `code` up in the `(platform, encoding)` subtable.
    ///
    /// Glyph 0 counts as a miss.
    pub fn glyph_in_cmap(&self, platform: u16, encoding: u16, code: u32) -> Option<u16> {
        self.subtable(platform, encoding)?
            .glyph_index(code)
            .map(|g| g.0)
            .filter(|g| *g != 0)
    }

    fn subtable(&self, platform: u16, encoding: u16) -> Option<Subtable<'a>> {
        self.face
            .tables()
            .cmap?
            .subtables
            .into_iter()
            .find(|s| platform_number(s.platform_id) == platform && s.encoding_id == encoding)
    }

    /// Bounding box of glyph `gid` as `(x_min, y_min, x_max, y_max)`.
    ///
    /// `None` for empty glyphs.
    pub fn glyph_bbox(&self, gid: u16) -> Option<(i16, i16, i16, i16)> {
        self.face
            .glyph_bounding_box(GlyphId(gid))
            .map(|r| (r.x_min, r.y_min, r.x_max, r.y_max))
    }
}

fn platform_number(id: PlatformId) -> u16 {
    match id {
        PlatformId::Unicode => 0,
        PlatformId::Macintosh => 1,
        PlatformId::Iso => 2,
        PlatformId::Windows => 3,
        PlatformId::Custom => 4,
    }
}
