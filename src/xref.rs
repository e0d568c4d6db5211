//! Cross-reference table parser.
//!
//! The xref table maps object numbers to byte offsets in the PDF file,
//! enabling random access to PDF objects.
//!
//! Supports traditional xref tables, cross-reference streams, hybrid files
//! (`/XRefStm`) and `/Prev` chains left by incremental updates. When the
//! table is unusable a lenient caller can rebuild it by scanning the file
//! for `N G obj` headers.

use std::collections::{BTreeMap, HashSet};
use std::rc::Rc;

use crate::config::ParserOptions;
use crate::error::{Error, Result};
use crate::io::{read_all, read_range, SeekableReadStream};
use crate::lexer::{is_regular, skip_ws, token, Token};
use crate::object::{Dictionary, Object};
use crate::parser::{parse_indirect_object, parse_object, rfind_keyword};

/// Cross-reference table entry type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum XRefEntryType {
    /// Entry for a free object
    Free,
    /// Entry for an uncompressed object at a byte offset
    Uncompressed,
    /// Entry for an object stored in an object stream
    Compressed,
}

/// Cross-reference table entry.
///
/// For compressed entries `offset` holds the object stream number and
/// `generation` the index inside that stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct XRefEntry {
    /// Type of entry
    pub entry_type: XRefEntryType,
    /// Byte offset (uncompressed) or object stream number (compressed)
    pub offset: u64,
    /// Generation number (uncompressed) or index within stream (compressed)
    pub generation: u16,
}

impl XRefEntry {
    /// Create a new uncompressed entry.
    pub fn uncompressed(offset: u64, generation: u16) -> Self {
        Self {
            entry_type: XRefEntryType::Uncompressed,
            offset,
            generation,
        }
    }

    /// Create a new compressed entry.
    pub fn compressed(stream_obj_num: u64, index_in_stream: u16) -> Self {
        Self {
            entry_type: XRefEntryType::Compressed,
            offset: stream_obj_num,
            generation: index_in_stream,
        }
    }

    /// Create a new free entry.
    pub fn free(next_free: u64, generation: u16) -> Self {
        Self {
            entry_type: XRefEntryType::Free,
            offset: next_free,
            generation,
        }
    }

    /// True unless the entry is free.
    pub fn in_use(&self) -> bool {
        self.entry_type != XRefEntryType::Free
    }
}

/// Merged cross-reference data for one file.
#[derive(Debug, Clone, Default)]
pub struct CrossRefTable {
    entries: BTreeMap<u32, XRefEntry>,
    trailer: Option<Rc<Dictionary>>,
    offsets: Vec<u64>,
}

impl CrossRefTable {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the trailer dictionary.
    pub fn set_trailer(&mut self, trailer: Rc<Dictionary>) {
        self.trailer = Some(trailer);
    }

    /// Trailer of the most recent section.
    pub fn trailer(&self) -> Option<&Rc<Dictionary>> {
        self.trailer.as_ref()
    }

    /// Add or replace the entry for `object_number`.
    pub fn add_entry(&mut self, object_number: u32, entry: XRefEntry) {
        self.entries.insert(object_number, entry);
        self.offsets.clear();
    }

    /// Entry for `object_number`.
    pub fn get(&self, object_number: u32) -> Option<&XRefEntry> {
        self.entries.get(&object_number)
    }

    /// True if an entry exists for `object_number`.
    pub fn contains(&self, object_number: u32) -> bool {
        self.entries.contains_key(&object_number)
    }

    /// Object numbers with entries, ascending.
    pub fn all_object_numbers(&self) -> impl Iterator<Item = u32> + '_ {
        self.entries.keys().copied()
    }

    /// Highest object number with an entry.
    pub fn max_object_number(&self) -> u32 {
        self.entries.keys().next_back().copied().unwrap_or(0)
    }

    /// Merge an older section: entries already present win.
    pub fn merge_from(&mut self, older: CrossRefTable) {
        for (num, entry) in older.entries {
            self.entries.entry(num).or_insert(entry);
        }
        if self.trailer.is_none() {
            self.trailer = older.trailer;
        }
        self.offsets.clear();
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True if there are no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// End of the object starting at `offset`: the next recorded object
    /// offset, or `limit` when none follows.
    pub fn object_end(&mut self, offset: u64, limit: u64) -> u64 {
        if self.offsets.is_empty() {
            self.offsets = self
                .entries
                .values()
                .filter(|e| e.entry_type == XRefEntryType::Uncompressed)
                .map(|e| e.offset)
                .collect();
            self.offsets.sort_unstable();
            self.offsets.dedup();
        }
        let idx = self.offsets.partition_point(|o| *o <= offset);
        self.offsets.get(idx).copied().unwrap_or(limit).min(limit)
    }
}

/// Find the byte offset named by the final `startxref` keyword.
///
/// # Errors
///
/// Returns `Error::InvalidXref` when the keyword or its offset is missing.
pub fn find_startxref(stream: &dyn SeekableReadStream) -> Result<u64> {
    let size = stream.get_size();
    let tail_len = size.min(1024);
    let tail = read_range(stream, size - tail_len, tail_len).ok_or(Error::DataNotAvailable {
        offset: size - tail_len,
        len: tail_len,
    })?;
    let pos = rfind_keyword(&tail, b"startxref").ok_or(Error::InvalidXref)?;
    match token(&tail[pos + b"startxref".len()..]) {
        Ok((_, Token::Integer(offset))) if offset >= 0 => Ok(offset as u64),
        _ => Err(Error::InvalidXref),
    }
}

/// Parse the cross-reference data starting at `offset`, following `/Prev`.
///
/// Newer sections override older ones; the newest trailer is kept.
pub fn parse_xref(stream: &dyn SeekableReadStream, offset: u64, options: &ParserOptions) -> Result<CrossRefTable> {
    let mut table = CrossRefTable::new();
    let mut visited = HashSet::new();
    let mut next = Some(offset);

    while let Some(offset) = next.take() {
        if !visited.insert(offset) {
            log::warn!("Circular /Prev chain at offset {}", offset);
            break;
        }
        if visited.len() as u32 > options.max_recursion_depth {
            return Err(Error::RecursionLimitExceeded(options.max_recursion_depth));
        }

        let section = parse_xref_section(stream, offset, options)?;
        log::debug!("Parsed xref section at {} with {} entries", offset, section.len());
        next = section
            .trailer()
            .and_then(|t| t.get("Prev"))
            .and_then(|p| p.as_integer())
            .and_then(|p| u64::try_from(p).ok());
        table.merge_from(section);
    }

    if table.trailer().is_none() {
        return Err(Error::InvalidXref);
    }
    Ok(table)
}

fn parse_xref_section(stream: &dyn SeekableReadStream, offset: u64, options: &ParserOptions) -> Result<CrossRefTable> {
    let size = stream.get_size();
    if offset >= size {
        return Err(Error::InvalidXref);
    }
    let data = read_range(stream, offset, size - offset).ok_or(Error::DataNotAvailable {
        offset,
        len: size - offset,
    })?;

    let start = skip_ws(&data);
    if start.starts_with(b"xref") {
        let mut section = parse_xref_table(start, options)?;
        let hybrid = section
            .trailer()
            .and_then(|t| t.get("XRefStm"))
            .and_then(|o| o.as_integer())
            .and_then(|o| u64::try_from(o).ok());
        if let Some(stm_offset) = hybrid {
            match read_range(stream, stm_offset, size.saturating_sub(stm_offset))
                .ok_or(Error::InvalidXref)
                .and_then(|d| parse_xref_stream(&d))
            {
                Ok(mut stm) => {
                    stm.trailer = None;
                    section.merge_from(stm);
                },
                Err(e) => log::warn!("Ignoring unreadable /XRefStm at {}: {}", stm_offset, e),
            }
        }
        Ok(section)
    } else {
        parse_xref_stream(start)
    }
}

/// Parse a traditional `xref ... trailer << >>` section.
fn parse_xref_table(input: &[u8], options: &ParserOptions) -> Result<CrossRefTable> {
    let mut table = CrossRefTable::new();
    let mut rest = match token(input) {
        Ok((rest, tok)) if tok.is_keyword(b"xref") => rest,
        _ => return Err(Error::InvalidXref),
    };

    loop {
        let (after, tok) = token(rest).map_err(|_| Error::InvalidXref)?;
        let start = match tok {
            Token::Keyword(b"trailer") => {
                rest = after;
                break;
            },
            Token::Integer(start) if start >= 0 => start as u32,
            _ => return Err(Error::InvalidXref),
        };
        let (after, count) = match token(after) {
            Ok((after, Token::Integer(count))) if count >= 0 => (after, count as u32),
            _ => return Err(Error::InvalidXref),
        };
        if count > options.max_xref_subsection_count {
            return Err(Error::InvalidPdf("xref subsection count exceeds limit".to_string()));
        }
        rest = after;

        for i in 0..count {
            let (after, entry) = match parse_table_entry(rest) {
                Some(parsed) => parsed,
                None if options.strict => return Err(Error::InvalidXref),
                None => {
                    log::warn!("Expected {} xref entries but only found {}", count, i);
                    break;
                },
            };
            rest = after;
            // Object 0 heads the free list and never names a real object.
            let num = start.saturating_add(i);
            if num != 0 {
                table.entries.entry(num).or_insert(entry);
            }
        }
    }

    match parse_object(rest) {
        Ok((_, Object::Dictionary(trailer))) => table.set_trailer(trailer),
        _ => return Err(Error::InvalidPdf("missing trailer dictionary".to_string())),
    }
    Ok(table)
}

fn parse_table_entry(input: &[u8]) -> Option<(&[u8], XRefEntry)> {
    let (rest, offset) = match token(input).ok()? {
        (rest, Token::Integer(n)) if n >= 0 => (rest, n as u64),
        _ => return None,
    };
    let (rest, gen) = match token(rest).ok()? {
        (rest, Token::Integer(n)) => (rest, n.clamp(0, u16::MAX as i64) as u16),
        _ => return None,
    };
    match token(rest).ok()? {
        (rest, Token::Keyword(b"n")) => Some((rest, XRefEntry::uncompressed(offset, gen))),
        (rest, Token::Keyword(b"f")) => Some((rest, XRefEntry::free(offset, gen))),
        _ => None,
    }
}

/// Parse a cross-reference stream object (`/Type /XRef`).
fn parse_xref_stream(input: &[u8]) -> Result<CrossRefTable> {
    let parsed = parse_indirect_object(input, None)?;
    let stream = parsed
        .object
        .as_stream()
        .ok_or_else(|| Error::InvalidPdf("xref stream is not a stream object".to_string()))?;
    let dict = stream.dict();
    if let Some(ty) = dict.get("Type").as_ref().and_then(|t| t.as_name()) {
        if ty != "XRef" {
            return Err(Error::InvalidPdf(format!("expected /Type /XRef, got /Type /{}", ty)));
        }
    }

    let widths: Vec<usize> = dict
        .get("W")
        .as_ref()
        .and_then(|w| w.as_array())
        .map(|w| w.to_vec().iter().map(|o| o.as_integer().unwrap_or(-1)).collect::<Vec<_>>())
        .filter(|w| w.len() == 3 && w.iter().all(|n| (0..=8).contains(n)))
        .map(|w| w.into_iter().map(|n| n as usize).collect())
        .ok_or_else(|| Error::InvalidPdf("invalid /W array in xref stream".to_string()))?;

    let size = dict
        .get("Size")
        .and_then(|o| o.as_integer())
        .filter(|n| *n >= 0)
        .ok_or_else(|| Error::InvalidPdf("missing /Size in xref stream".to_string()))?;
    let ranges: Vec<(u64, u64)> = match dict.get("Index").as_ref().and_then(|o| o.as_array()) {
        Some(index) => index
            .to_vec()
            .chunks(2)
            .filter_map(|pair| match pair {
                [start, count] => Some((start.as_integer()?.max(0) as u64, count.as_integer()?.max(0) as u64)),
                _ => None,
            })
            .collect(),
        None => vec![(0, size as u64)],
    };

    let data = stream.decoded_data()?;
    let entry_size: usize = widths.iter().sum();
    if entry_size == 0 {
        return Err(Error::InvalidPdf("zero-width xref stream entries".to_string()));
    }

    let mut table = CrossRefTable::new();
    let mut records = data.chunks_exact(entry_size);
    'ranges: for (start, count) in ranges {
        for i in 0..count {
            let Some(record) = records.next() else {
                log::warn!("Xref stream data ends before /Index is exhausted");
                break 'ranges;
            };
            let (f1, rest) = record.split_at(widths[0]);
            let (f2, f3) = rest.split_at(widths[1]);
            // A missing type field means type 1.
            let ty = if widths[0] == 0 { 1 } else { be_field(f1) };
            let (a, b) = (be_field(f2), be_field(f3));
            let Ok(num) = u32::try_from(start + i) else {
                continue;
            };
            let entry = match ty {
                0 => XRefEntry::free(a, b.min(u16::MAX as u64) as u16),
                1 => XRefEntry::uncompressed(a, b.min(u16::MAX as u64) as u16),
                2 => XRefEntry::compressed(a, b.min(u16::MAX as u64) as u16),
                _ => continue,
            };
            if num != 0 {
                table.entries.entry(num).or_insert(entry);
            }
        }
    }

    table.set_trailer(stream.dict_rc());
    Ok(table)
}

fn be_field(bytes: &[u8]) -> u64 {
    bytes.iter().fold(0u64, |acc, b| (acc << 8) | *b as u64)
}

/// Rebuild the cross-reference table by scanning for `N G obj` headers.
///
/// The last definition of an object number wins. The trailer is the last
/// `trailer` dictionary in the file, or a synthesized one pointing at the
/// last catalog found.
pub fn reconstruct_xref(stream: &dyn SeekableReadStream) -> Result<CrossRefTable> {
    log::info!("Reconstructing xref table by scanning file");
    let data = read_all(stream).ok_or(Error::DataNotAvailable {
        offset: 0,
        len: stream.get_size(),
    })?;

    let mut table = CrossRefTable::new();
    let mut catalog = None;
    let mut pos = 0;
    while let Some(found) = data[pos..].windows(3).position(|w| w == b"obj") {
        let obj_pos = pos + found;
        pos = obj_pos + 3;
        if data.get(pos).is_some_and(|c| is_regular(*c)) {
            continue;
        }
        let Some(start) = scan_object_header(&data, obj_pos) else {
            continue;
        };
        let Ok(parsed) = parse_indirect_object(&data[start..], None) else {
            continue;
        };
        if parsed
            .object
            .as_dict()
            .and_then(|d| d.get("Type"))
            .is_some_and(|t| t.as_name() == Some("Catalog"))
        {
            catalog = Some(parsed.reference);
        }
        table.add_entry(
            parsed.reference.id,
            XRefEntry::uncompressed(start as u64, parsed.reference.gen),
        );
    }

    if table.is_empty() {
        return Err(Error::InvalidPdf("no objects found while reconstructing xref".to_string()));
    }

    let trailer = rfind_keyword(&data, b"trailer")
        .and_then(|p| parse_object(&data[p + b"trailer".len()..]).ok())
        .and_then(|(_, obj)| match obj {
            Object::Dictionary(d) if d.contains_key("Root") => Some(d),
            _ => None,
        });
    let trailer = match (trailer, catalog) {
        (Some(t), _) => t,
        (None, Some(root)) => {
            let t = Rc::new(Dictionary::new());
            t.set_for("Root", Object::Reference(root));
            t
        },
        (None, None) => return Err(Error::InvalidPdf("no catalog found while reconstructing xref".to_string())),
    };
    trailer.set_for("Size", Object::Integer(table.max_object_number() as i64 + 1));
    table.set_trailer(trailer);
    log::info!("Reconstructed {} objects", table.len());
    Ok(table)
}

/// Start of `N G` preceding the `obj` keyword at `obj_pos`.
fn scan_object_header(data: &[u8], obj_pos: usize) -> Option<usize> {
    let mut i = obj_pos;
    let mut fields = 0;
    while fields < 2 {
        while i > 0 && crate::lexer::is_whitespace(data[i - 1]) {
            i -= 1;
        }
        let end = i;
        while i > 0 && data[i - 1].is_ascii_digit() {
            i -= 1;
        }
        if i == end {
            return None;
        }
        fields += 1;
    }
    if i > 0 && is_regular(data[i - 1]) {
        return None;
    }
    Some(i)
}
