//! Minimal TrueType font builder for tests.
//!
//! Produces fonts with square outlines whose bounding box encodes the glyph
//! ID, so a test can tell glyphs apart after subsetting.
#![allow(dead_code)]

use std::collections::BTreeMap;

/// Builder for a synthetic TrueType font program.
pub struct TtfBuilder {
    num_glyphs: u16,
    cmaps: BTreeMap<(u16, u16), BTreeMap<u16, u16>>,
    composites: BTreeMap<u16, Vec<u16>>,
    padding: usize,
}

impl TtfBuilder {
    /// Font with `num_glyphs` simple glyphs, including `.notdef`.
    pub fn new(num_glyphs: u16) -> Self {
        Self {
            num_glyphs,
            cmaps: BTreeMap::new(),
            composites: BTreeMap::new(),
            padding: 0,
        }
    }

    /// Map a Unicode character to `gid` in a (3,1) subtable.
    pub fn map_unicode(self, ch: char, gid: u16) -> Self {
        self.map(3, 1, ch as u16, gid)
    }

    /// Map `code` to `gid` in a (3,0) symbol subtable.
    pub fn map_symbol(self, code: u16, gid: u16) -> Self {
        self.map(3, 0, code, gid)
    }

    /// Map `code` to `gid` in a (1,0) Macintosh subtable.
    pub fn map_mac(self, code: u8, gid: u16) -> Self {
        self.map(1, 0, code as u16, gid)
    }

    fn map(mut self, platform: u16, encoding: u16, code: u16, gid: u16) -> Self {
        self.cmaps.entry((platform, encoding)).or_default().insert(code, gid);
        self
    }

    /// Make `gid` a composite of `components`.
    pub fn composite(mut self, gid: u16, components: &[u16]) -> Self {
        self.composites.insert(gid, components.to_vec());
        self
    }

    /// Add an unused table of `bytes` bytes, standing in for layout data.
    pub fn padding(mut self, bytes: usize) -> Self {
        self.padding = bytes;
        self
    }

    /// Bounding box `(x_min, y_min, x_max, y_max)` of simple glyph `gid`.
    pub fn glyph_box(gid: u16) -> (i16, i16, i16, i16) {
        if gid == 0 {
            (50, 0, 450, 700)
        } else {
            (10, 0, 100 + 7 * gid as i16, 500 + 3 * gid as i16)
        }
    }

    /// Serialize the font.
    pub fn build(&self) -> Vec<u8> {
        let mut glyf = Vec::new();
        let mut loca = Vec::new();
        for gid in 0..self.num_glyphs {
            loca.extend_from_slice(&(glyf.len() as u32).to_be_bytes());
            match self.composites.get(&gid) {
                Some(components) => glyf.extend(composite_glyph(components)),
                None => glyf.extend(square_glyph(Self::glyph_box(gid))),
            }
            while glyf.len() % 4 != 0 {
                glyf.push(0);
            }
        }
        loca.extend_from_slice(&(glyf.len() as u32).to_be_bytes());

        let mut tables: Vec<(&[u8; 4], Vec<u8>)> = vec![
            (b"cmap", self.cmap()),
            (b"glyf", glyf),
            (b"head", head()),
            (b"hhea", hhea(self.num_glyphs)),
            (b"hmtx", self.hmtx()),
            (b"loca", loca),
            (b"maxp", maxp(self.num_glyphs)),
        ];
        if self.padding > 0 {
            tables.push((b"GSUB", vec![0xAB; self.padding]));
        }
        tables.sort_by_key(|(tag, _)| **tag);
        write_font(tables)
    }

    fn hmtx(&self) -> Vec<u8> {
        let mut out = Vec::new();
        for _ in 0..self.num_glyphs {
            out.extend_from_slice(&600u16.to_be_bytes());
            out.extend_from_slice(&0i16.to_be_bytes());
        }
        out
    }

    fn cmap(&self) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&0u16.to_be_bytes());
        out.extend_from_slice(&(self.cmaps.len() as u16).to_be_bytes());
        let mut offset = 4 + 8 * self.cmaps.len();
        let subtables: Vec<Vec<u8>> = self.cmaps.values().map(format4).collect();
        for ((platform, encoding), subtable) in self.cmaps.keys().zip(&subtables) {
            out.extend_from_slice(&platform.to_be_bytes());
            out.extend_from_slice(&encoding.to_be_bytes());
            out.extend_from_slice(&(offset as u32).to_be_bytes());
            offset += subtable.len();
        }
        for subtable in subtables {
            out.extend(subtable);
        }
        out
    }
}

fn format4(mapping: &BTreeMap<u16, u16>) -> Vec<u8> {
    let mut segments: Vec<(u16, u16)> = mapping.iter().map(|(c, g)| (*c, *g)).collect();
    segments.push((0xFFFF, 0));
    let seg_count = segments.len() as u16;
    let entry_selector = 15 - seg_count.leading_zeros() as u16;
    let search_range = 2 * (1u16 << entry_selector);

    let mut out = Vec::new();
    for v in [
        4,
        16 + 8 * seg_count,
        0,
        seg_count * 2,
        search_range,
        entry_selector,
        seg_count * 2 - search_range,
    ] {
        out.extend_from_slice(&v.to_be_bytes());
    }
    for (code, _) in &segments {
        out.extend_from_slice(&code.to_be_bytes());
    }
    out.extend_from_slice(&0u16.to_be_bytes());
    for (code, _) in &segments {
        out.extend_from_slice(&code.to_be_bytes());
    }
    for (code, gid) in &segments {
        let delta = if *code == 0xFFFF { 1 } else { gid.wrapping_sub(*code) };
        out.extend_from_slice(&delta.to_be_bytes());
    }
    for _ in &segments {
        out.extend_from_slice(&0u16.to_be_bytes());
    }
    out
}

fn square_glyph((x0, y0, x1, y1): (i16, i16, i16, i16)) -> Vec<u8> {
    let mut out = Vec::new();
    for v in [1, x0, y0, x1, y1] {
        out.extend_from_slice(&v.to_be_bytes());
    }
    out.extend_from_slice(&3u16.to_be_bytes());
    out.extend_from_slice(&0u16.to_be_bytes());
    out.extend_from_slice(&[1, 1, 1, 1]);
    for dx in [x0, x1 - x0, 0, x0 - x1] {
        out.extend_from_slice(&dx.to_be_bytes());
    }
    for dy in [y0, 0, y1 - y0, 0] {
        out.extend_from_slice(&dy.to_be_bytes());
    }
    out
}

fn composite_glyph(components: &[u16]) -> Vec<u8> {
    let mut out = Vec::new();
    for v in [-1i16, 0, 0, 1000, 1000] {
        out.extend_from_slice(&v.to_be_bytes());
    }
    for (i, gid) in components.iter().enumerate() {
        let more = if i + 1 < components.len() { 0x0020 } else { 0 };
        out.extend_from_slice(&(0x0003u16 | more).to_be_bytes());
        out.extend_from_slice(&gid.to_be_bytes());
        out.extend_from_slice(&0i16.to_be_bytes());
        out.extend_from_slice(&0i16.to_be_bytes());
    }
    out
}

fn head() -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(&0x0001_0000u32.to_be_bytes());
    out.extend_from_slice(&0x0001_0000u32.to_be_bytes());
    out.extend_from_slice(&0u32.to_be_bytes());
    out.extend_from_slice(&0x5F0F_3CF5u32.to_be_bytes());
    out.extend_from_slice(&0u16.to_be_bytes());
    out.extend_from_slice(&1000u16.to_be_bytes());
    out.extend_from_slice(&[0; 16]);
    for v in [0i16, 0, 1000, 1000] {
        out.extend_from_slice(&v.to_be_bytes());
    }
    for v in [0u16, 8, 2, 1, 0] {
        out.extend_from_slice(&v.to_be_bytes());
    }
    out
}

fn hhea(num_glyphs: u16) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(&0x0001_0000u32.to_be_bytes());
    for v in [800i16, -200, 0, 1000, 0, 0, 1000, 1, 0, 0, 0, 0, 0, 0, 0] {
        out.extend_from_slice(&v.to_be_bytes());
    }
    out.extend_from_slice(&num_glyphs.to_be_bytes());
    out
}

fn maxp(num_glyphs: u16) -> Vec<u8> {
    let mut out = 0x0000_5000u32.to_be_bytes().to_vec();
    out.extend_from_slice(&num_glyphs.to_be_bytes());
    out
}

fn write_font(tables: Vec<(&[u8; 4], Vec<u8>)>) -> Vec<u8> {
    let mut out = Vec::new();
    let num_tables = tables.len() as u16;
    let entry_selector = 15 - num_tables.leading_zeros() as u16;
    let search_range = 16 * (1u16 << entry_selector);
    out.extend_from_slice(&0x0001_0000u32.to_be_bytes());
    for v in [num_tables, search_range, entry_selector, num_tables * 16 - search_range] {
        out.extend_from_slice(&v.to_be_bytes());
    }
    let mut offset = 12 + 16 * tables.len();
    for (tag, data) in &tables {
        out.extend_from_slice(*tag);
        out.extend_from_slice(&0u32.to_be_bytes());
        out.extend_from_slice(&(offset as u32).to_be_bytes());
        out.extend_from_slice(&(data.len() as u32).to_be_bytes());
        offset += data.len().next_multiple_of(4);
    }
    for (_, data) in &tables {
        out.extend_from_slice(data);
        out.resize(out.len().next_multiple_of(4), 0);
    }
    out
}
