//! PDF document model.
//!
//! A [`PdfDocument`] owns the object-number space of one file. Objects are
//! parsed lazily through the cross-reference table the first time they are
//! dereferenced; objects created or changed in memory are tracked so that
//! an incremental save can append just those.

use std::cell::{Cell, RefCell};
use std::collections::{BTreeSet, HashMap, HashSet};
use std::path::Path;
use std::rc::Rc;

use crate::config::ParserOptions;
use crate::error::{Error, Result};
use crate::holder::{IndirectObjectHolder, IndirectObjects};
use crate::io::{read_range, FileStream, MemoryStream, SeekableReadStream};
use crate::object::{Array, Dictionary, Object};
use crate::objstm::ObjectStream;
use crate::parser::{find_keyword, parse_indirect_object};
use crate::xref::{find_startxref, parse_xref, reconstruct_xref, CrossRefTable, XRefEntryType};

/// Version written for documents created from scratch (PDF 1.7).
pub const DEFAULT_FILE_VERSION: u32 = 17;

/// Facts about the file a document was loaded from, needed for
/// incremental saves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OriginalFile {
    /// Size of the source in bytes
    pub size: u64,
    /// Offset named by the final `startxref`
    pub startxref: u64,
    /// Highest object number defined by the source
    pub last_obj_num: u32,
    /// True if the newest xref section is a cross-reference stream
    pub xref_is_stream: bool,
}

/// An open PDF document.
///
/// # Example
///
/// ```
/// use pdf_creator::document::PdfDocument;
/// use pdf_creator::holder::IndirectObjectHolder;
///
/// let doc = PdfDocument::new();
/// doc.create_new_page(0, 612.0, 792.0);
/// assert_eq!(doc.page_count(), 1);
/// assert!(doc.root().is_some());
/// ```
pub struct PdfDocument {
    objects: IndirectObjects,
    source: Option<Rc<dyn SeekableReadStream>>,
    xref: RefCell<CrossRefTable>,
    trailer: Rc<Dictionary>,
    file_version: Cell<u32>,
    original: Option<OriginalFile>,
    modified: RefCell<BTreeSet<u32>>,
    object_streams: RefCell<HashMap<u32, Rc<ObjectStream>>>,
    options: ParserOptions,
    content_parses: Cell<usize>,
}

impl std::fmt::Debug for PdfDocument {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PdfDocument")
            .field("file_version", &self.file_version.get())
            .field("xref_entries", &self.xref.borrow().len())
            .field("resident_objects", &self.objects.len())
            .field("original", &self.original)
            .finish_non_exhaustive()
    }
}

impl Default for PdfDocument {
    fn default() -> Self {
        Self::new()
    }
}

impl PdfDocument {
    /// Create a blank document: catalog, empty page tree and info dictionary.
    pub fn new() -> Self {
        let doc = Self {
            objects: IndirectObjects::new(),
            source: None,
            xref: RefCell::new(CrossRefTable::new()),
            trailer: Rc::new(Dictionary::new()),
            file_version: Cell::new(DEFAULT_FILE_VERSION),
            original: None,
            modified: RefCell::new(BTreeSet::new()),
            object_streams: RefCell::new(HashMap::new()),
            options: ParserOptions::default(),
            content_parses: Cell::new(0),
        };

        let root = doc.new_indirect_dictionary();
        root.set_for("Type", Object::name("Catalog"));
        let pages = doc.new_indirect_dictionary();
        pages.set_for("Type", Object::name("Pages"));
        pages.set_for("Count", Object::Integer(0));
        pages.set_new_array_for("Kids");
        root.set_for("Pages", Object::reference(pages.obj_num()));
        let info = doc.new_indirect_dictionary();

        doc.trailer.set_for("Root", Object::reference(root.obj_num()));
        doc.trailer.set_for("Info", Object::reference(info.obj_num()));
        doc
    }

    /// Load a document held in memory.
    pub fn from_bytes(data: impl Into<Vec<u8>>) -> Result<Self> {
        Self::from_stream(Rc::new(MemoryStream::from_bytes(data)))
    }

    /// Open a document on disk.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::from_stream(Rc::new(FileStream::open(path)?))
    }

    /// Load a document from any seekable stream with default options.
    pub fn from_stream(source: Rc<dyn SeekableReadStream>) -> Result<Self> {
        Self::from_stream_with_options(source, ParserOptions::default())
    }

    /// Load a document from any seekable stream.
    ///
    /// Reads the header, the cross-reference chain and the trailer. In
    /// lenient mode a damaged cross-reference table is rebuilt by scanning
    /// the file. Objects themselves are parsed on first use.
    ///
    /// # Errors
    ///
    /// Fails when the header is missing, the bytes needed for the xref are
    /// not available, or the xref cannot be parsed or rebuilt.
    pub fn from_stream_with_options(source: Rc<dyn SeekableReadStream>, options: ParserOptions) -> Result<Self> {
        let size = source.get_size();
        let file_version = parse_header(source.as_ref())?;

        let parsed = find_startxref(source.as_ref())
            .and_then(|offset| parse_xref(source.as_ref(), offset, &options).map(|xref| (xref, offset)));
        let (xref, startxref) = match parsed {
            Ok(found) => found,
            Err(e @ Error::DataNotAvailable { .. }) => return Err(e),
            Err(e) if options.strict => return Err(e),
            Err(e) => {
                log::warn!("Cross-reference data unusable ({}), reconstructing", e);
                (reconstruct_xref(source.as_ref())?, 0)
            },
        };

        let trailer = xref.trailer().cloned().ok_or(Error::InvalidXref)?;
        let xref_is_stream = trailer.get("Type").is_some_and(|t| t.as_name() == Some("XRef"));
        let declared = trailer
            .get("Size")
            .and_then(|s| s.as_integer())
            .and_then(|s| u32::try_from(s - 1).ok())
            .unwrap_or(0);
        let last_obj_num = xref.max_object_number().max(declared);

        log::info!(
            "Loaded PDF {}.{} with {} xref entries, last object {}",
            file_version / 10,
            file_version % 10,
            xref.len(),
            last_obj_num
        );

        let doc = Self {
            objects: IndirectObjects::new(),
            source: Some(source),
            xref: RefCell::new(xref),
            trailer,
            file_version: Cell::new(file_version),
            original: Some(OriginalFile {
                size,
                startxref,
                last_obj_num,
                xref_is_stream,
            }),
            modified: RefCell::new(BTreeSet::new()),
            object_streams: RefCell::new(HashMap::new()),
            options,
            content_parses: Cell::new(0),
        };
        doc.set_last_obj_num(last_obj_num);
        Ok(doc)
    }

    /// Parser options the document was loaded with.
    pub fn options(&self) -> &ParserOptions {
        &self.options
    }

    /// File version as `major * 10 + minor`, e.g. 17 for PDF 1.7.
    pub fn file_version(&self) -> u32 {
        self.file_version.get()
    }

    /// Override the file version.
    pub fn set_file_version(&self, version: u32) {
        self.file_version.set(version);
    }

    /// The trailer dictionary.
    pub fn trailer(&self) -> &Rc<Dictionary> {
        &self.trailer
    }

    /// Object number of the document catalog, 0 if unknown.
    pub fn root_obj_num(&self) -> u32 {
        self.trailer.get("Root").and_then(|r| r.as_reference()).map_or(0, |r| r.id)
    }

    /// Object number of the info dictionary, 0 if absent.
    pub fn info_obj_num(&self) -> u32 {
        self.trailer.get("Info").and_then(|r| r.as_reference()).map_or(0, |r| r.id)
    }

    /// The document catalog.
    pub fn root(&self) -> Option<Rc<Dictionary>> {
        self.trailer.get_dict_for("Root", self)
    }

    /// The document information dictionary.
    pub fn info(&self) -> Option<Rc<Dictionary>> {
        self.trailer.get_dict_for("Info", self)
    }

    /// Source stream for loaded documents.
    pub fn source(&self) -> Option<&Rc<dyn SeekableReadStream>> {
        self.source.as_ref()
    }

    /// Facts about the source file, `None` for documents built in memory.
    pub fn original(&self) -> Option<&OriginalFile> {
        self.original.as_ref()
    }

    /// Highest object number present in the source file.
    pub fn original_last_obj_num(&self) -> u32 {
        self.original.map_or(0, |o| o.last_obj_num)
    }

    /// True if `obj_num` names an in-use object of the source file.
    pub fn is_original_object(&self, obj_num: u32) -> bool {
        self.xref.borrow().get(obj_num).is_some_and(|e| e.in_use())
    }

    /// True if the source stores `obj_num` inside an object stream.
    pub fn is_compressed_object(&self, obj_num: u32) -> bool {
        self.xref
            .borrow()
            .get(obj_num)
            .is_some_and(|e| e.entry_type == XRefEntryType::Compressed)
    }

    /// Object numbers defined by the source cross-reference data.
    pub fn original_obj_nums(&self) -> Vec<u32> {
        let xref = self.xref.borrow();
        xref.all_object_numbers()
            .filter(|n| xref.get(*n).is_some_and(|e| e.in_use()))
            .collect()
    }

    /// Record that object `obj_num` was changed in memory.
    pub fn mark_modified(&self, obj_num: u32) {
        if obj_num != 0 {
            self.modified.borrow_mut().insert(obj_num);
        }
    }

    /// Object numbers recorded by [`mark_modified`](Self::mark_modified).
    pub fn modified_obj_nums(&self) -> Vec<u32> {
        self.modified.borrow().iter().copied().collect()
    }

    /// Object numbers that exist only in memory, ascending.
    pub fn new_obj_nums(&self) -> Vec<u32> {
        let original_last = self.original_last_obj_num();
        self.objects
            .obj_nums()
            .into_iter()
            .filter(|n| *n > original_last || (self.original.is_some() && !self.is_original_object(*n)))
            .collect()
    }

    /// Number of content streams parsed into page objects so far.
    pub fn content_parse_count(&self) -> usize {
        self.content_parses.get()
    }

    pub(crate) fn note_content_parse(&self) {
        self.content_parses.set(self.content_parses.get() + 1);
    }

    /// Page dictionaries in document order.
    ///
    /// Page tree nodes that were already visited, or that nest deeper than
    /// the configured recursion limit, are skipped.
    pub fn pages(&self) -> Vec<Rc<Dictionary>> {
        let mut pages = Vec::new();
        if let Some(root) = self.root().and_then(|r| r.get_dict_for("Pages", self)) {
            let mut visited = HashSet::new();
            self.collect_pages(&root, 0, &mut visited, &mut pages);
        }
        pages
    }

    fn collect_pages(
        &self,
        node: &Rc<Dictionary>,
        depth: u32,
        visited: &mut HashSet<usize>,
        pages: &mut Vec<Rc<Dictionary>>,
    ) {
        if depth > self.options.max_recursion_depth || !visited.insert(Rc::as_ptr(node) as usize) {
            log::warn!("Skipping cyclic or too deep page tree node");
            return;
        }
        let Some(kids) = node.get_array_for("Kids", self) else {
            if node.is_type("Page", self) || !node.contains_key("Type") {
                pages.push(Rc::clone(node));
            }
            return;
        };
        if node.is_type("Page", self) {
            pages.push(Rc::clone(node));
            return;
        }
        for i in 0..kids.len() {
            if let Some(kid) = kids.get_dict_at(i, self) {
                self.collect_pages(&kid, depth + 1, visited, pages);
            }
        }
    }

    /// Number of pages found by walking the page tree.
    pub fn page_count(&self) -> usize {
        self.pages().len()
    }

    /// Page dictionary at `index`.
    pub fn page(&self, index: usize) -> Option<Rc<Dictionary>> {
        self.pages().into_iter().nth(index)
    }

    /// Insert a new empty page at `index` (clamped to the page count).
    ///
    /// The page is added as a kid of the page tree node that holds the page
    /// currently at `index`, or of the root node when appending. Ancestor
    /// `/Count` values are updated and every touched node is marked
    /// modified.
    pub fn create_new_page(&self, index: usize, width: f64, height: f64) -> Rc<Dictionary> {
        let page = self.new_indirect_dictionary();
        page.set_for("Type", Object::name("Page"));
        let media_box = page.set_new_array_for("MediaBox");
        for v in [0.0, 0.0, width, height] {
            media_box.append(number(v));
        }
        page.set_new_dictionary_for("Resources");

        let root_pages = match self.root().and_then(|r| r.get_dict_for("Pages", self)) {
            Some(pages) => pages,
            None => self.create_page_tree(),
        };
        let mut path = Vec::new();
        let mut visited = HashSet::new();
        let placed = index < self.page_count()
            && self.insert_page(&root_pages, index, &page, 0, &mut visited, &mut path);
        if !placed {
            let kids = match root_pages.get_array_for("Kids", self) {
                Some(kids) => kids,
                None => root_pages.set_new_array_for("Kids"),
            };
            kids.append(Object::reference(page.obj_num()));
            page.set_for("Parent", Object::reference(root_pages.obj_num()));
            path = vec![Rc::clone(&root_pages)];
        }
        for node in &path {
            let count = node.get_integer_for("Count", self).unwrap_or(0);
            node.set_for("Count", Object::Integer(count + 1));
            self.mark_modified(node.obj_num());
        }
        log::debug!("Created page object {} at index {}", page.obj_num(), index);
        page
    }

    fn create_page_tree(&self) -> Rc<Dictionary> {
        let pages = self.new_indirect_dictionary();
        pages.set_for("Type", Object::name("Pages"));
        pages.set_new_array_for("Kids");
        pages.set_for("Count", Object::Integer(0));
        let root = match self.root() {
            Some(root) => root,
            None => {
                let root = self.new_indirect_dictionary();
                root.set_for("Type", Object::name("Catalog"));
                self.trailer.set_for("Root", Object::reference(root.obj_num()));
                root
            },
        };
        root.set_for("Pages", Object::reference(pages.obj_num()));
        self.mark_modified(root.obj_num());
        pages
    }

    // Find the node holding page `index` and insert `page` before it. On
    // success `path` holds the nodes from the root down to the parent.
    fn insert_page(
        &self,
        node: &Rc<Dictionary>,
        mut index: usize,
        page: &Rc<Dictionary>,
        depth: u32,
        visited: &mut HashSet<usize>,
        path: &mut Vec<Rc<Dictionary>>,
    ) -> bool {
        if depth > self.options.max_recursion_depth || !visited.insert(Rc::as_ptr(node) as usize) {
            return false;
        }
        let Some(kids) = node.get_array_for("Kids", self) else {
            return false;
        };
        path.push(Rc::clone(node));
        for i in 0..kids.len() {
            let Some(kid) = kids.get_dict_at(i, self) else {
                continue;
            };
            if kid.is_type("Page", self) || !kid.contains_key("Kids") {
                if index == 0 {
                    kids.insert_at(i, Object::reference(page.obj_num()));
                    page.set_for("Parent", Object::reference(node.obj_num()));
                    return true;
                }
                index -= 1;
                continue;
            }
            let count = kid.get_integer_for("Count", self).unwrap_or(0).max(0) as usize;
            if index < count {
                return self.insert_page(&kid, index, page, depth + 1, visited, path);
            }
            index -= count;
        }
        path.pop();
        false
    }

    fn load_from_object_stream(&self, stream_num: u32, index: u16, obj_num: u32) -> Option<Object> {
        let cached = self.object_streams.borrow().get(&stream_num).cloned();
        let objstm = match cached {
            Some(objstm) => objstm,
            None => {
                let stream = self.get_or_parse_indirect_object(stream_num)?;
                let parsed = match ObjectStream::parse(stream.as_stream()?) {
                    Ok(parsed) => Rc::new(parsed),
                    Err(e) => {
                        log::warn!("Object stream {} unusable: {}", stream_num, e);
                        return None;
                    },
                };
                self.object_streams.borrow_mut().insert(stream_num, Rc::clone(&parsed));
                parsed
            },
        };
        objstm.object(obj_num, index as usize)
    }

    fn load_at_offset(&self, offset: u64, obj_num: u32) -> Option<Object> {
        let source = self.source.as_ref()?;
        let size = source.get_size();
        let end = self.xref.borrow_mut().object_end(offset, size);
        let mut data = read_range(source.as_ref(), offset, end.saturating_sub(offset))?;

        // The next xref offset may not bound this object, e.g. when free
        // space or an xref section follows; retry with the rest of the file.
        if end < size && find_keyword(&data, b"endobj").is_none() {
            data = read_range(source.as_ref(), offset, size - offset)?;
        }

        match parse_indirect_object(&data, Some(self)) {
            Ok(parsed) if parsed.reference.id == obj_num => Some(parsed.object),
            Ok(parsed) => {
                log::warn!("Expected object {} at offset {}, found {}", obj_num, offset, parsed.reference);
                None
            },
            Err(e) => {
                log::warn!("Failed to parse object {} at offset {}: {}", obj_num, offset, e);
                None
            },
        }
    }
}

impl IndirectObjectHolder for PdfDocument {
    fn indirect_objects(&self) -> &IndirectObjects {
        &self.objects
    }

    fn parse_indirect_object(&self, obj_num: u32) -> Option<Object> {
        let entry = *self.xref.borrow().get(obj_num)?;
        match entry.entry_type {
            XRefEntryType::Free => None,
            XRefEntryType::Uncompressed => self.load_at_offset(entry.offset, obj_num),
            XRefEntryType::Compressed => {
                let stream_num = u32::try_from(entry.offset).ok()?;
                self.load_from_object_stream(stream_num, entry.generation, obj_num)
            },
        }
    }
}

fn number(v: f64) -> Object {
    if v.fract() == 0.0 && v.abs() < i64::MAX as f64 {
        Object::Integer(v as i64)
    } else {
        Object::Real(v)
    }
}

/// Parse the `%PDF-x.y` header in the first KB of `source`.
///
/// Returns the version as `major * 10 + minor`.
///
/// # Errors
///
/// Returns `Error::InvalidHeader` when no header is found.
pub fn parse_header(source: &dyn SeekableReadStream) -> Result<u32> {
    let head = read_range(source, 0, 1024).ok_or(Error::DataNotAvailable {
        offset: 0,
        len: source.get_size().min(1024),
    })?;
    let pos = find_keyword(&head, b"%PDF-").ok_or_else(|| {
        Error::InvalidHeader(String::from_utf8_lossy(&head[..head.len().min(8)]).into_owned())
    })?;
    let digits = &head[pos + 5..];
    match digits {
        [major @ b'0'..=b'9', b'.', minor @ b'0'..=b'9', ..] => Ok(((major - b'0') * 10 + (minor - b'0')) as u32),
        _ => {
            log::warn!("Unreadable header version, assuming 1.4");
            Ok(14)
        },
    }
}

/// Build a page-tree array holding references to `pages`.
pub(crate) fn reference_array(obj_nums: &[u32]) -> Rc<Array> {
    Rc::new(Array::from_objects(obj_nums.iter().map(|n| Object::reference(*n)).collect()))
}
