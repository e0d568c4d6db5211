//! Retain-GID TrueType subsetting.
//!
//! The subset keeps the original glyph count and numbering. Unused glyphs
//! become empty `glyf` entries (equal consecutive `loca` offsets), so any
//! glyph ID that appears elsewhere in the document still selects the same
//! outline. Glyph 0 (`.notdef`) and every component of a used composite
//! glyph are always kept.

use std::collections::BTreeSet;

use byteorder::{BigEndian, ByteOrder, WriteBytesExt};

use crate::error::{Error, Result};

/// Tables copied into the subset. Everything else (layout, kerning,
/// bitmaps, signatures) is dropped.
const KEPT_TABLES: [&[u8; 4]; 13] = [
    b"OS/2", b"cmap", b"cvt ", b"fpgm", b"glyf", b"head", b"hhea", b"hmtx", b"loca", b"maxp", b"name", b"post",
    b"prep",
];

const ARG_1_AND_2_ARE_WORDS: u16 = 0x0001;
const WE_HAVE_A_SCALE: u16 = 0x0008;
const MORE_COMPONENTS: u16 = 0x0020;
const WE_HAVE_AN_X_AND_Y_SCALE: u16 = 0x0040;
const WE_HAVE_A_TWO_BY_TWO: u16 = 0x0080;

/// A table of an sfnt file.
#[derive(Debug, Clone, Copy)]
struct TableRecord<'a> {
    tag: [u8; 4],
    data: &'a [u8],
}

/// Subset `font` to `glyphs`, preserving glyph IDs.
///
/// # Errors
///
/// Fails for CFF-flavored or otherwise unparseable fonts and fonts missing
/// `head`, `maxp`, `loca` or `glyf`.
pub fn subset_retain_gids(font: &[u8], glyphs: &BTreeSet<u16>) -> Result<Vec<u8>> {
    ttf_parser::Face::parse(font, 0).map_err(|e| Error::Font(format!("Unparseable font program: {}", e)))?;
    if font.get(..4) == Some(b"OTTO") {
        return Err(Error::Font("CFF-flavored OpenType is not subset".to_string()));
    }

    let tables = read_table_directory(font)?;
    let find = |tag: &[u8; 4]| tables.iter().find(|t| &t.tag == tag).map(|t| t.data);
    let head = find(b"head").filter(|h| h.len() >= 54).ok_or_else(|| missing("head"))?;
    let maxp = find(b"maxp").filter(|m| m.len() >= 6).ok_or_else(|| missing("maxp"))?;
    let loca = find(b"loca").ok_or_else(|| missing("loca"))?;
    let glyf = find(b"glyf").ok_or_else(|| missing("glyf"))?;

    let num_glyphs = BigEndian::read_u16(&maxp[4..]);
    let long_loca = BigEndian::read_i16(&head[50..]) != 0;
    let offsets = parse_loca(loca, long_loca, num_glyphs);

    let mut needed: BTreeSet<u16> = glyphs.iter().copied().filter(|g| *g < num_glyphs).collect();
    needed.insert(0);
    add_composite_components(glyf, &offsets, &mut needed);

    let mut new_glyf = Vec::new();
    let mut new_offsets = Vec::with_capacity(offsets.len());
    for gid in 0..num_glyphs {
        new_offsets.push(new_glyf.len() as u32);
        if needed.contains(&gid) {
            if let Some(outline) = glyph_data(glyf, &offsets, gid) {
                new_glyf.extend_from_slice(outline);
                new_glyf.resize(new_glyf.len().next_multiple_of(4), 0);
            }
        }
    }
    new_offsets.push(new_glyf.len() as u32);

    let new_long_loca = new_glyf.len() > 0x1FFFE;
    let mut new_loca = Vec::with_capacity(new_offsets.len() * 4);
    for offset in &new_offsets {
        if new_long_loca {
            new_loca.write_u32::<BigEndian>(*offset)?;
        } else {
            new_loca.write_u16::<BigEndian>((*offset / 2) as u16)?;
        }
    }

    let mut new_head = head.to_vec();
    BigEndian::write_u32(&mut new_head[8..], 0);
    BigEndian::write_i16(&mut new_head[50..], i16::from(new_long_loca));

    let mut out_tables: Vec<([u8; 4], Vec<u8>)> = Vec::new();
    for table in &tables {
        if !KEPT_TABLES.contains(&&table.tag) {
            continue;
        }
        let data = match &table.tag {
            b"glyf" => std::mem::take(&mut new_glyf),
            b"loca" => std::mem::take(&mut new_loca),
            b"head" => std::mem::take(&mut new_head),
            b"post" => post_without_names(table.data),
            _ => table.data.to_vec(),
        };
        out_tables.push((table.tag, data));
    }
    out_tables.sort_by_key(|(tag, _)| *tag);

    let output = write_sfnt(out_tables)?;
    log::debug!(
        "Subset font program: {} of {} glyphs kept, {} -> {} bytes",
        needed.len(),
        num_glyphs,
        font.len(),
        output.len()
    );
    Ok(output)
}

fn missing(tag: &str) -> Error {
    Error::Font(format!("Font program has no usable '{}' table", tag))
}

fn read_table_directory(font: &[u8]) -> Result<Vec<TableRecord<'_>>> {
    if font.len() < 12 {
        return Err(Error::Font("Font program shorter than its header".to_string()));
    }
    let num_tables = BigEndian::read_u16(&font[4..]) as usize;
    let mut tables = Vec::with_capacity(num_tables);
    for i in 0..num_tables {
        let Some(record) = font.get(12 + i * 16..28 + i * 16) else {
            break;
        };
        let offset = BigEndian::read_u32(&record[8..]) as usize;
        let length = BigEndian::read_u32(&record[12..]) as usize;
        let Some(data) = offset.checked_add(length).and_then(|end| font.get(offset..end)) else {
            log::warn!("Skipping font table {:?} outside the file", String::from_utf8_lossy(&record[..4]));
            continue;
        };
        tables.push(TableRecord {
            tag: [record[0], record[1], record[2], record[3]],
            data,
        });
    }
    Ok(tables)
}

fn parse_loca(loca: &[u8], long: bool, num_glyphs: u16) -> Vec<u32> {
    let count = num_glyphs as usize + 1;
    let entry = if long { 4 } else { 2 };
    let mut offsets = Vec::with_capacity(count);
    for i in 0..count {
        let value = match loca.get(i * entry..(i + 1) * entry) {
            Some(bytes) if long => BigEndian::read_u32(bytes),
            Some(bytes) => u32::from(BigEndian::read_u16(bytes)) * 2,
            None => offsets.last().copied().unwrap_or(0),
        };
        offsets.push(value);
    }
    offsets
}

fn glyph_data<'a>(glyf: &'a [u8], offsets: &[u32], gid: u16) -> Option<&'a [u8]> {
    let start = *offsets.get(gid as usize)? as usize;
    let end = *offsets.get(gid as usize + 1)? as usize;
    if start >= end {
        return None;
    }
    glyf.get(start..end.min(glyf.len()))
}

fn add_composite_components(glyf: &[u8], offsets: &[u32], needed: &mut BTreeSet<u16>) {
    let mut pending: Vec<u16> = needed.iter().copied().collect();
    while let Some(gid) = pending.pop() {
        let Some(data) = glyph_data(glyf, offsets, gid) else {
            continue;
        };
        if data.len() < 10 || BigEndian::read_i16(data) >= 0 {
            continue;
        }
        let mut pos = 10;
        while let Some(header) = data.get(pos..pos + 4) {
            let flags = BigEndian::read_u16(header);
            let component = BigEndian::read_u16(&header[2..]);
            if needed.insert(component) {
                pending.push(component);
            }
            pos += 4;
            pos += if flags & ARG_1_AND_2_ARE_WORDS != 0 { 4 } else { 2 };
            if flags & WE_HAVE_A_SCALE != 0 {
                pos += 2;
            } else if flags & WE_HAVE_AN_X_AND_Y_SCALE != 0 {
                pos += 4;
            } else if flags & WE_HAVE_A_TWO_BY_TWO != 0 {
                pos += 8;
            }
            if flags & MORE_COMPONENTS == 0 {
                break;
            }
        }
    }
}

// Format 3 post table: same header, no glyph names.
fn post_without_names(post: &[u8]) -> Vec<u8> {
    let mut data = post.get(..32).map_or_else(|| vec![0; 32], <[u8]>::to_vec);
    BigEndian::write_u32(&mut data, 0x0003_0000);
    data
}

fn write_sfnt(mut tables: Vec<([u8; 4], Vec<u8>)>) -> Result<Vec<u8>> {
    let num_tables = tables.len() as u16;
    let entry_selector = if num_tables > 0 { 15 - num_tables.leading_zeros() as u16 } else { 0 };
    let search_range = (1u16 << entry_selector) * 16;
    let range_shift = (num_tables * 16).saturating_sub(search_range);

    let mut out = Vec::new();
    out.write_u32::<BigEndian>(0x0001_0000)?;
    out.write_u16::<BigEndian>(num_tables)?;
    out.write_u16::<BigEndian>(search_range)?;
    out.write_u16::<BigEndian>(entry_selector)?;
    out.write_u16::<BigEndian>(range_shift)?;

    let mut offset = 12 + tables.len() * 16;
    let mut head_offset = None;
    for (tag, data) in &mut tables {
        let length = data.len();
        data.resize(length.next_multiple_of(4), 0);
        if tag == b"head" {
            head_offset = Some(offset);
        }
        out.extend_from_slice(tag);
        out.write_u32::<BigEndian>(checksum(data))?;
        out.write_u32::<BigEndian>(offset as u32)?;
        out.write_u32::<BigEndian>(length as u32)?;
        offset += data.len();
    }
    for (_, data) in &tables {
        out.extend_from_slice(data);
    }

    // checkSumAdjustment makes the whole file sum to 0xB1B0AFBA.
    if let Some(head) = head_offset {
        let adjustment = 0xB1B0_AFBAu32.wrapping_sub(checksum(&out));
        BigEndian::write_u32(&mut out[head + 8..], adjustment);
    }
    Ok(out)
}

fn checksum(data: &[u8]) -> u32 {
    data.chunks(4).fold(0u32, |sum, chunk| {
        let mut word = [0u8; 4];
        word[..chunk.len()].copy_from_slice(chunk);
        sum.wrapping_add(u32::from_be_bytes(word))
    })
}
