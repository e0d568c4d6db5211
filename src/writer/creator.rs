//! Document serialization.
//!
//! [`Creator`] writes a [`PdfDocument`] either as a complete new file or as
//! an incremental update appended to the bytes it was loaded from. Override
//! objects (for example subsetted font programs) replace the serialized form
//! of an object number without touching the in-memory graph.

use std::collections::{BTreeMap, BTreeSet};
use std::rc::Rc;

use md5::{Digest, Md5};
use serde::Serialize;

use super::object_serializer::{hex_upper, ObjectSerializer, EOL};
use crate::decoders::flate_encode;
use crate::document::PdfDocument;
use crate::error::{Error, Result};
use crate::holder::IndirectObjectHolder;
use crate::io::{read_all, CountingWriter, WriteStream};
use crate::object::{Dictionary, Object, Stream};

/// Trailer keys that are recomputed on every save, or that only make sense
/// in a cross-reference stream dictionary.
const REGENERATED_TRAILER_KEYS: &[&str] = &[
    "Size", "Prev", "ID", "XRefStm", "Type", "Length", "Filter", "DecodeParms", "Index", "W",
];

/// Options for a save.
///
/// # Example
///
/// ```
/// use pdf_creator::writer::CreatorOptions;
///
/// let options = CreatorOptions::default()
///     .with_version(14)
///     .with_compress_new_streams(true);
/// assert_eq!(options.version, 14);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CreatorOptions {
    /// File version as `major * 10 + minor`; 0 keeps the document's version
    pub version: u32,
    /// Flate-compress unfiltered streams that exist only in memory
    pub compress_new_streams: bool,
    /// Bytes hashed into the first `/ID` element when the document has none
    pub id_seed: Option<Vec<u8>>,
}

impl CreatorOptions {
    /// Set the header version (`17` writes `%PDF-1.7`).
    pub fn with_version(mut self, version: u32) -> Self {
        self.version = version;
        self
    }

    /// Enable or disable compression of new streams.
    pub fn with_compress_new_streams(mut self, compress: bool) -> Self {
        self.compress_new_streams = compress;
        self
    }

    /// Seed for the permanent half of the file identifier.
    pub fn with_id_seed(mut self, seed: impl Into<Vec<u8>>) -> Self {
        self.id_seed = Some(seed.into());
        self
    }
}

/// Summary of a completed save.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SaveReport {
    /// True if the output is an incremental update
    pub incremental: bool,
    /// Header version, `major * 10 + minor`
    pub version: u32,
    /// Indirect objects serialized by this save
    pub objects_written: usize,
    /// Objects written from the override map
    pub overrides_written: usize,
    /// Offset of the new cross-reference section
    pub xref_offset: u64,
    /// Total bytes written, including any copied original bytes
    pub file_size: u64,
    /// `/Size` recorded in the trailer
    pub trailer_size: u32,
}

/// One row of the cross-reference table.
#[derive(Debug, Clone, Copy)]
enum XRefRow {
    InUse { offset: u64, gen: u16 },
    Free,
}

/// Output sink that tracks offsets and hashes everything written after
/// the copied original bytes.
struct Output<'a> {
    out: CountingWriter<'a>,
    digest: Md5,
}

impl<'a> Output<'a> {
    fn write(&mut self, data: &[u8]) -> Result<()> {
        self.digest.update(data);
        if self.out.write(data) {
            Ok(())
        } else {
            Err(Error::Write(format!("write of {} bytes failed at offset {}", data.len(), self.out.offset())))
        }
    }

    fn offset(&self) -> u64 {
        self.out.offset()
    }
}

/// Serializes a document to a [`WriteStream`].
pub struct Creator<'a> {
    doc: &'a PdfDocument,
    options: CreatorOptions,
    overrides: BTreeMap<u32, Object>,
    remove_security: bool,
    serializer: ObjectSerializer,
}

impl<'a> Creator<'a> {
    /// Creator for `doc` with default options.
    pub fn new(doc: &'a PdfDocument) -> Self {
        Self {
            doc,
            options: CreatorOptions::default(),
            overrides: BTreeMap::new(),
            remove_security: false,
            serializer: ObjectSerializer::new(),
        }
    }

    /// Replace the options.
    pub fn with_options(mut self, options: CreatorOptions) -> Self {
        self.options = options;
        self
    }

    /// Serialize `overrides[n]` in place of object `n`.
    pub fn set_object_overrides(&mut self, overrides: BTreeMap<u32, Object>) {
        self.overrides = overrides;
    }

    /// Drop the `/Encrypt` dictionary from the output.
    pub fn set_remove_security(&mut self, remove: bool) {
        self.remove_security = remove;
    }

    fn encrypt_obj_num(&self) -> Option<u32> {
        self.doc.trailer().get("Encrypt").and_then(|e| e.as_reference()).map(|r| r.id)
    }

    /// True when the document carries an `/Encrypt` entry that this save drops.
    fn drops_encryption(&self) -> bool {
        self.remove_security && self.doc.trailer().contains_key("Encrypt")
    }

    /// Write the document. `incremental` is honored only for documents loaded
    /// from a source and not forced into a rewrite by security removal.
    pub fn create(&self, out: &mut dyn WriteStream, incremental: bool) -> Result<SaveReport> {
        let incremental = if incremental && self.doc.original().is_none() {
            log::info!("Document has no source file, writing a full copy");
            false
        } else if incremental && self.drops_encryption() {
            log::info!("Removing security requires a full rewrite");
            false
        } else {
            incremental
        };

        let mut output = Output {
            out: CountingWriter::new(out, 0),
            digest: Md5::new(),
        };
        let report = if incremental {
            self.write_incremental(&mut output)?
        } else {
            self.write_full(&mut output)?
        };
        if !output.out.flush() {
            return Err(Error::Write("flush failed".to_string()));
        }
        log::info!(
            "Saved {} objects ({} bytes, xref at {}, incremental: {})",
            report.objects_written,
            report.file_size,
            report.xref_offset,
            report.incremental
        );
        Ok(report)
    }

    fn write_full(&self, output: &mut Output<'_>) -> Result<SaveReport> {
        let version = match self.options.version {
            0 => self.doc.file_version(),
            v => v,
        };
        let header = format!("%PDF-{}.{}", version / 10, version % 10);
        output.write(header.as_bytes())?;
        output.write(EOL)?;
        output.write(b"%\xA1\xB3\xC5\xD7")?;
        output.write(EOL)?;

        let last = self.last_obj_num();
        let skip = if self.remove_security { self.encrypt_obj_num() } else { None };
        let mut rows = Vec::with_capacity(last as usize);
        let mut written = 0;
        let mut overrides_written = 0;
        for obj_num in 1..=last {
            if Some(obj_num) == skip {
                rows.push(XRefRow::Free);
                continue;
            }
            let from_override = self.overrides.contains_key(&obj_num);
            let Some(obj) = self.object_for(obj_num) else {
                rows.push(XRefRow::Free);
                continue;
            };
            if is_cross_reference_structure(&obj) {
                log::debug!("Dropping object stream or xref stream {}", obj_num);
                rows.push(XRefRow::Free);
                continue;
            }
            let gen = self.gen_num(obj_num);
            rows.push(XRefRow::InUse {
                offset: output.offset(),
                gen,
            });
            self.write_indirect(output, obj_num, gen, &obj)?;
            written += 1;
            if from_override {
                overrides_written += 1;
            }
        }

        let xref_offset = output.offset();
        log::debug!("Writing xref with {} entries at {}", last + 1, xref_offset);
        let mut xref = format!("xref\r\n0 {}\r\n0000000000 65535 f\r\n", last + 1);
        for row in &rows {
            xref.push_str(&row.format());
        }
        output.write(xref.as_bytes())?;

        let size = last + 1;
        self.write_trailer(output, size, None, xref_offset)?;
        Ok(SaveReport {
            incremental: false,
            version,
            objects_written: written,
            overrides_written,
            xref_offset,
            file_size: output.offset(),
            trailer_size: size,
        })
    }

    fn write_incremental(&self, output: &mut Output<'_>) -> Result<SaveReport> {
        let (original, source) = match (self.doc.original(), self.doc.source()) {
            (Some(original), Some(source)) => (*original, Rc::clone(source)),
            _ => return Err(Error::InvalidPdf("incremental save needs a source file".to_string())),
        };
        let bytes = read_all(source.as_ref()).ok_or(Error::DataNotAvailable {
            offset: 0,
            len: original.size,
        })?;

        // The original bytes are not part of the body digest.
        if !output.out.write(&bytes) {
            return Err(Error::Write("copying original file failed".to_string()));
        }
        if !matches!(bytes.last(), Some(b'\n') | Some(b'\r')) {
            output.write(EOL)?;
        }

        let mut obj_nums: BTreeSet<u32> = self.doc.new_obj_nums().into_iter().collect();
        obj_nums.extend(self.doc.modified_obj_nums());
        obj_nums.extend(self.overrides.keys().copied());

        let mut rows: Vec<(u32, XRefRow)> = Vec::with_capacity(obj_nums.len());
        let mut overrides_written = 0;
        for obj_num in obj_nums {
            let Some(obj) = self.object_for(obj_num) else {
                log::warn!("Object {} vanished before the incremental save", obj_num);
                continue;
            };
            let gen = self.gen_num(obj_num);
            rows.push((
                obj_num,
                XRefRow::InUse {
                    offset: output.offset(),
                    gen,
                },
            ));
            self.write_indirect(output, obj_num, gen, &obj)?;
            if self.overrides.contains_key(&obj_num) {
                overrides_written += 1;
            }
        }

        let xref_offset = output.offset();
        let mut xref = String::from("xref\r\n");
        for run in contiguous_runs(&rows) {
            xref.push_str(&format!("{} {}\r\n", run[0].0, run.len()));
            for (_, row) in run {
                xref.push_str(&row.format());
            }
        }
        output.write(xref.as_bytes())?;
        log::debug!("Appended {} objects, xref at {}", rows.len(), xref_offset);

        let size = self.last_obj_num().max(original.last_obj_num) + 1;
        self.write_trailer(output, size, Some(original.startxref), xref_offset)?;
        Ok(SaveReport {
            incremental: true,
            version: self.doc.file_version(),
            objects_written: rows.len(),
            overrides_written,
            xref_offset,
            file_size: output.offset(),
            trailer_size: size,
        })
    }

    fn write_trailer(&self, output: &mut Output<'_>, size: u32, prev: Option<u64>, xref_offset: u64) -> Result<()> {
        let mut buf = b"trailer".to_vec();
        buf.extend_from_slice(EOL);
        buf.extend_from_slice(b"<<");
        let drop_encrypt = self.remove_security;
        self.serializer.write_dictionary_entries(&mut buf, self.doc.trailer(), |key| {
            REGENERATED_TRAILER_KEYS.contains(&key) || (drop_encrypt && key == "Encrypt")
        });
        buf.extend_from_slice(format!("/Size {}", size).as_bytes());
        if let Some(prev) = prev {
            buf.extend_from_slice(format!("/Prev {}", prev).as_bytes());
        }

        let (permanent, changing) = self.file_ids(&output.digest);
        buf.extend_from_slice(format!("/ID[<{}><{}>]>>", hex_upper(&permanent), hex_upper(&changing)).as_bytes());
        buf.extend_from_slice(EOL);
        buf.extend_from_slice(format!("startxref\r\n{}\r\n%%EOF\r\n", xref_offset).as_bytes());
        output.write(&buf)
    }

    /// The two `/ID` elements: a permanent one derived from the document and
    /// a fresh random one.
    fn file_ids(&self, body_digest: &Md5) -> (Vec<u8>, Vec<u8>) {
        let existing = self
            .doc
            .trailer()
            .get_array_for("ID", self.doc)
            .and_then(|ids| ids.get_direct_object_at(0, self.doc))
            .and_then(|id| id.as_string().map(<[u8]>::to_vec));
        let permanent = match existing {
            Some(id) if !id.is_empty() => id,
            _ => {
                if let Some(seed) = &self.options.id_seed {
                    Md5::digest(seed).to_vec()
                } else if let Some(bytes) = self.doc.source().and_then(|s| read_all(s.as_ref())) {
                    Md5::digest(&bytes).to_vec()
                } else {
                    body_digest.clone().finalize().to_vec()
                }
            },
        };
        let changing = uuid::Uuid::new_v4().as_bytes().to_vec();
        (permanent, changing)
    }

    fn last_obj_num(&self) -> u32 {
        let overridden = self.overrides.keys().next_back().copied().unwrap_or(0);
        self.doc.last_obj_num().max(overridden)
    }

    fn gen_num(&self, obj_num: u32) -> u16 {
        self.doc.indirect_objects().gen_num(obj_num).unwrap_or(0)
    }

    fn object_for(&self, obj_num: u32) -> Option<Object> {
        match self.overrides.get(&obj_num) {
            Some(obj) => Some(obj.clone()),
            None => self.doc.get_or_parse_indirect_object(obj_num),
        }
    }

    fn write_indirect(&self, output: &mut Output<'_>, obj_num: u32, gen: u16, obj: &Object) -> Result<()> {
        let compressed = match obj {
            Object::Stream(stream)
                if self.options.compress_new_streams
                    && !stream.has_filter()
                    && !self.doc.is_original_object(obj_num) =>
            {
                Some(compress_stream(stream)?)
            },
            _ => None,
        };
        let bytes = self.serializer.serialize_indirect(obj_num, gen, compressed.as_ref().unwrap_or(obj));
        #[cfg(feature = "logging")]
        log::trace!(
            "Object {} {} at {}: {} bytes{}",
            obj_num,
            gen,
            output.offset(),
            bytes.len(),
            if compressed.is_some() { ", deflated" } else { "" }
        );
        output.write(&bytes)
    }
}

impl XRefRow {
    fn format(&self) -> String {
        match self {
            XRefRow::InUse { offset, gen } => format!("{:010} {:05} n\r\n", offset, gen),
            XRefRow::Free => "0000000000 65535 f\r\n".to_string(),
        }
    }
}

/// Copy of `stream` with its data flate-compressed. The source stream and
/// its dictionary are left untouched.
fn compress_stream(stream: &Stream) -> Result<Object> {
    let compressed = flate_encode(&stream.raw_data())?;
    let dict = Dictionary::new();
    for (key, value) in stream.dict().entries() {
        dict.set_for(key, value);
    }
    dict.set_for("Filter", Object::name("FlateDecode"));
    dict.remove_for("DecodeParms");
    Ok(Object::Stream(Rc::new(Stream::new(Rc::new(dict), compressed))))
}

fn is_cross_reference_structure(obj: &Object) -> bool {
    let Object::Stream(stream) = obj else {
        return false;
    };
    let ty = stream.dict().get("Type");
    matches!(ty.as_ref().and_then(|t| t.as_name()), Some("ObjStm") | Some("XRef"))
}

/// Split sorted rows into runs of consecutive object numbers.
fn contiguous_runs(rows: &[(u32, XRefRow)]) -> Vec<&[(u32, XRefRow)]> {
    let mut runs = Vec::new();
    let mut start = 0;
    for i in 1..=rows.len() {
        if i == rows.len() || rows[i].0 != rows[i - 1].0 + 1 {
            if i > start {
                runs.push(&rows[start..i]);
            }
            start = i;
        }
    }
    runs
}
