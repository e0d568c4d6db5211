//! Font subsetting for newly added text.
//!
//! When a document is saved with font subsetting enabled, every embedded
//! TrueType program referenced by a new font dictionary is replaced by a
//! copy that keeps only the glyphs the document's text actually shows.
//! Glyph IDs are preserved, so widths, CID maps and content streams that
//! refer to glyphs stay valid.
//!
//! The subsetter never modifies the document. It returns override objects
//! that the writer serializes in place of the original font file streams.

use std::collections::{BTreeMap, BTreeSet};
use std::rc::Rc;

use crate::content::parse_page_objects;
use crate::document::PdfDocument;
use crate::fonts::subset::subset_retain_gids;
use crate::object::{Object, Stream};

/// Glyphs used from one embedded font program.
#[derive(Debug)]
struct SubsetCandidate {
    stream: Rc<Stream>,
    used_glyphs: BTreeSet<u16>,
}

/// Produces subsetted font file streams for new fonts in a document.
#[derive(Debug)]
pub struct FontSubsetter<'a> {
    doc: &'a PdfDocument,
}

impl<'a> FontSubsetter<'a> {
    /// Create a subsetter over `doc`.
    pub fn new(doc: &'a PdfDocument) -> Self {
        Self { doc }
    }

    /// Map font file stream object numbers to subsetted replacement streams.
    ///
    /// Only fonts whose dictionary object number is in `new_obj_nums` are
    /// considered. `new_obj_nums` must be sorted ascending; an empty slice
    /// returns an empty map without touching any page.
    pub fn generate_object_overrides(&self, new_obj_nums: &[u32]) -> BTreeMap<u32, Object> {
        let mut overrides = BTreeMap::new();
        if new_obj_nums.is_empty() {
            return overrides;
        }

        for candidate in self.find_candidates(new_obj_nums).into_values() {
            if candidate.used_glyphs.is_empty() {
                continue;
            }
            let obj_num = candidate.stream.obj_num();
            if let Some(stream) = Self::subset_stream(&candidate) {
                log::debug!(
                    "Subsetted font program {} to {} glyphs ({} -> {} bytes)",
                    obj_num,
                    candidate.used_glyphs.len(),
                    candidate.stream.raw_size(),
                    stream.raw_size()
                );
                overrides.insert(obj_num, Object::Stream(Rc::new(stream)));
            }
        }
        overrides
    }

    fn find_candidates(&self, new_obj_nums: &[u32]) -> BTreeMap<u32, SubsetCandidate> {
        let mut candidates: BTreeMap<u32, SubsetCandidate> = BTreeMap::new();
        for page in self.doc.pages() {
            for object in parse_page_objects(self.doc, &page) {
                let Some(text) = object.as_text() else {
                    continue;
                };
                let Some(font) = text.font() else {
                    continue;
                };
                if new_obj_nums.binary_search(&font.obj_num()).is_err() {
                    continue;
                }
                // CFF programs live in FontFile3 and are left alone.
                let Some(font_file) = font.font_file2() else {
                    log::debug!("Font {} has no embedded TrueType program", font.obj_num());
                    continue;
                };
                if font_file.obj_num() == 0 {
                    continue;
                }

                let candidate = candidates.entry(font_file.obj_num()).or_insert_with(|| SubsetCandidate {
                    stream: Rc::clone(font_file),
                    used_glyphs: BTreeSet::new(),
                });
                candidate
                    .used_glyphs
                    .extend(text.char_codes().iter().filter_map(|code| font.glyph_for_char_code(*code)));
            }
        }
        candidates
    }

    fn subset_stream(candidate: &SubsetCandidate) -> Option<Stream> {
        let obj_num = candidate.stream.obj_num();
        let program = match candidate.stream.decoded_data() {
            Ok(data) => data,
            Err(e) => {
                log::warn!("Cannot decode font program {}: {}", obj_num, e);
                return None;
            },
        };
        let subset = match subset_retain_gids(&program, &candidate.used_glyphs) {
            Ok(subset) => subset,
            Err(e) => {
                log::warn!("Skipping font program {}: {}", obj_num, e);
                return None;
            },
        };
        let length = subset.len() as i64;
        let stream = Stream::with_data(subset);
        stream.dict().set_for("Length1", Object::Integer(length));
        Some(stream)
    }
}
