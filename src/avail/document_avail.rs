//! Whole-document availability.

use std::cell::RefCell;
use std::rc::Rc;

use super::{DocAvailStatus, FileAvail, ObjectAvail, PageObjectAvail, ReadValidator};
use crate::document::{parse_header, PdfDocument};
use crate::error::Error;
use crate::holder::IndirectObjectHolder;
use crate::io::SeekableReadStream;
use crate::object::Object;

/// Byte ranges a host has downloaded so far.
///
/// Ranges are kept sorted and merged, so lookups are a binary search.
#[derive(Debug, Default)]
pub struct LoadedRanges {
    ranges: RefCell<Vec<(u64, u64)>>,
}

impl LoadedRanges {
    /// No bytes loaded.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `len` bytes at `offset` as downloaded.
    pub fn add(&self, offset: u64, len: u64) {
        if len == 0 {
            return;
        }
        let mut ranges = self.ranges.borrow_mut();
        let mut start = offset;
        let mut end = offset.saturating_add(len);
        ranges.retain(|&(s, e)| {
            if s <= end && start <= e {
                start = start.min(s);
                end = end.max(e);
                false
            } else {
                true
            }
        });
        let pos = ranges.partition_point(|&(s, _)| s < start);
        ranges.insert(pos, (start, end));
    }

    /// Merged `(start, end)` ranges, ascending.
    pub fn ranges(&self) -> Vec<(u64, u64)> {
        self.ranges.borrow().clone()
    }
}

impl FileAvail for LoadedRanges {
    fn is_data_avail(&self, offset: u64, size: u64) -> bool {
        let Some(end) = offset.checked_add(size) else {
            return false;
        };
        let ranges = self.ranges.borrow();
        let pos = ranges.partition_point(|&(s, _)| s <= offset);
        pos > 0 && ranges[pos - 1].1 >= end
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    Header,
    CrossRef,
    Root,
    FirstPage,
    Done,
    Error,
}

/// Staged check that a partially downloaded document can be opened.
///
/// The stages are: the header, the cross-reference data and trailer, the
/// catalog with everything it references except the page tree, and the
/// first page. Each call to [`is_doc_avail`](Self::is_doc_avail) resumes at
/// the first stage that has not passed yet.
pub struct DocumentAvail {
    validator: Rc<ReadValidator>,
    stage: Stage,
    document: Option<PdfDocument>,
    first_page: Option<u32>,
}

impl DocumentAvail {
    /// Check the file behind `validator`.
    pub fn new(validator: Rc<ReadValidator>) -> Self {
        Self {
            validator,
            stage: Stage::Header,
            document: None,
            first_page: None,
        }
    }

    /// Advance through the stages as far as the downloaded bytes allow.
    pub fn is_doc_avail(&mut self) -> DocAvailStatus {
        loop {
            let status = match self.stage {
                Stage::Header => self.check_header(),
                Stage::CrossRef => self.check_cross_ref(),
                Stage::Root => self.check_root(),
                Stage::FirstPage => self.check_first_page(),
                Stage::Done => return DocAvailStatus::DataAvailable,
                Stage::Error => return DocAvailStatus::DataError,
            };
            match status {
                DocAvailStatus::DataAvailable => continue,
                DocAvailStatus::DataError => {
                    self.stage = Stage::Error;
                    return status;
                },
                DocAvailStatus::DataNotAvailable => return status,
            }
        }
    }

    /// The document, once the cross-reference stage has passed.
    pub fn document(&self) -> Option<&PdfDocument> {
        self.document.as_ref()
    }

    /// Take the document out of the checker.
    pub fn into_document(self) -> Option<PdfDocument> {
        self.document
    }

    /// Availability of page `index`, ignoring other pages.
    ///
    /// Only meaningful after [`is_doc_avail`](Self::is_doc_avail) passed.
    pub fn is_page_avail(&self, index: usize) -> DocAvailStatus {
        let Some(doc) = self.document.as_ref() else {
            return DocAvailStatus::DataNotAvailable;
        };
        let page = {
            let _session = self.validator.scoped_session();
            let page = doc.page(index);
            if self.validator.has_read_problems() {
                return DocAvailStatus::DataNotAvailable;
            }
            page
        };
        match page {
            Some(page) if page.obj_num() != 0 => {
                PageObjectAvail::new(self.validator.clone(), doc, page.obj_num()).check_avail()
            },
            Some(page) => {
                PageObjectAvail::with_root(self.validator.clone(), doc, Object::Dictionary(page)).check_avail()
            },
            None => DocAvailStatus::DataError,
        }
    }

    fn check_header(&mut self) -> DocAvailStatus {
        let _session = self.validator.scoped_session();
        match parse_header(self.validator.as_ref()) {
            Ok(version) => {
                log::debug!("Header available, version {}", version);
                self.stage = Stage::CrossRef;
                DocAvailStatus::DataAvailable
            },
            Err(Error::DataNotAvailable { .. }) => DocAvailStatus::DataNotAvailable,
            Err(e) => {
                log::warn!("Document header unusable: {}", e);
                DocAvailStatus::DataError
            },
        }
    }

    fn check_cross_ref(&mut self) -> DocAvailStatus {
        let _session = self.validator.scoped_session();
        let source: Rc<dyn SeekableReadStream> = self.validator.clone();
        match PdfDocument::from_stream(source) {
            Ok(doc) if !self.validator.has_read_problems() => {
                log::debug!("Cross-reference data available, {} objects", doc.original_last_obj_num());
                self.document = Some(doc);
                self.stage = Stage::Root;
                DocAvailStatus::DataAvailable
            },
            Ok(_) | Err(Error::DataNotAvailable { .. }) => DocAvailStatus::DataNotAvailable,
            Err(_) if self.validator.has_read_problems() => DocAvailStatus::DataNotAvailable,
            Err(e) => {
                log::warn!("Cross-reference data unusable: {}", e);
                DocAvailStatus::DataError
            },
        }
    }

    fn check_root(&mut self) -> DocAvailStatus {
        let Some(doc) = self.document.as_ref() else {
            return DocAvailStatus::DataError;
        };
        let root = doc.root_obj_num();
        if root == 0 {
            log::warn!("Trailer has no /Root");
            return DocAvailStatus::DataError;
        }
        let status = ObjectAvail::new(self.validator.clone(), doc, root)
            .with_exclusion(is_page_tree_node)
            .check_avail();
        if status == DocAvailStatus::DataAvailable {
            self.stage = Stage::FirstPage;
        }
        status
    }

    fn check_first_page(&mut self) -> DocAvailStatus {
        let Some(doc) = self.document.as_ref() else {
            return DocAvailStatus::DataError;
        };
        let page = match self.first_page {
            Some(page) => page,
            None => match self.find_first_page(doc) {
                Ok(Some(page)) => {
                    self.first_page = Some(page);
                    page
                },
                Ok(None) => {
                    // An empty page tree is a valid document.
                    self.stage = Stage::Done;
                    return DocAvailStatus::DataAvailable;
                },
                Err(status) => return status,
            },
        };
        let status = PageObjectAvail::new(self.validator.clone(), doc, page).check_avail();
        if status == DocAvailStatus::DataAvailable {
            log::debug!("First page (object {}) available", page);
            self.stage = Stage::Done;
        }
        status
    }

    // Follows the first kid of each node down to a leaf.
    fn find_first_page(&self, doc: &PdfDocument) -> Result<Option<u32>, DocAvailStatus> {
        let _session = self.validator.scoped_session();
        let pending = || self.validator.has_read_problems();

        let mut node = match doc.root().and_then(|root| root.get("Pages")) {
            Some(node) => node,
            None if pending() => return Err(DocAvailStatus::DataNotAvailable),
            None => return Ok(None),
        };
        for _ in 0..doc.options().max_recursion_depth {
            let Some(obj_num) = node.as_reference().map(|r| r.id) else {
                log::warn!("Page tree node is not an indirect object");
                return Err(DocAvailStatus::DataError);
            };
            let dict = doc.get_or_parse_indirect_object(obj_num).and_then(|o| o.as_dict_rc());
            if pending() {
                return Err(DocAvailStatus::DataNotAvailable);
            }
            let Some(dict) = dict else {
                return Err(DocAvailStatus::DataError);
            };
            if !dict.is_type("Pages", doc) {
                return Ok(Some(obj_num));
            }
            let first = dict.get_array_for("Kids", doc).and_then(|kids| kids.get_object_at(0));
            if pending() {
                return Err(DocAvailStatus::DataNotAvailable);
            }
            match first {
                Some(kid) => node = kid,
                None => return Ok(None),
            }
        }
        Err(DocAvailStatus::DataError)
    }
}

fn is_page_tree_node(obj: &Object, holder: &dyn IndirectObjectHolder) -> bool {
    obj.get_dict(holder)
        .is_some_and(|dict| dict.is_type("Pages", holder) || dict.is_type("Page", holder))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::MemoryStream;
    use crate::pdf_builder::PdfBuilder;

    fn checker(data: Vec<u8>) -> (DocumentAvail, Rc<LoadedRanges>) {
        let loaded = Rc::new(LoadedRanges::new());
        let validator = ReadValidator::new(
            Rc::new(MemoryStream::from_bytes(data)),
            Some(loaded.clone() as Rc<dyn FileAvail>),
        );
        (DocumentAvail::new(Rc::new(validator)), loaded)
    }

    #[test]
    fn test_loaded_ranges_merge() {
        let ranges = LoadedRanges::new();
        ranges.add(10, 10);
        ranges.add(40, 10);
        assert!(ranges.is_data_avail(12, 5));
        assert!(!ranges.is_data_avail(15, 10));
        ranges.add(18, 25);
        assert_eq!(ranges.ranges(), vec![(10, 50)]);
        assert!(ranges.is_data_avail(15, 30));
        assert!(!ranges.is_data_avail(0, 1));
        ranges.add(0, 0);
        assert_eq!(ranges.ranges().len(), 1);
    }

    #[test]
    fn test_progressive_document() {
        let padding = format!("<< /Title ({}) >>", "x".repeat(1500));
        let built = PdfBuilder::new("1.4")
            .object("<< /Type /Catalog /Pages 3 0 R >>")
            .object(&padding)
            .object("<< /Type /Pages /Kids [4 0 R] /Count 1 >>")
            .object("<< /Type /Page /Parent 3 0 R /MediaBox [0 0 612 792] >>")
            .object(&padding)
            .trailer("/Root 1 0 R /Info 2 0 R")
            .build_with_offsets();
        let len = built.data.len() as u64;
        let (mut avail, loaded) = checker(built.data.clone());

        assert_eq!(avail.is_doc_avail(), DocAvailStatus::DataNotAvailable);
        loaded.add(0, 1024);
        assert_eq!(avail.is_doc_avail(), DocAvailStatus::DataNotAvailable);
        assert!(avail.document().is_none());

        // Tail with startxref, the xref table and trailer.
        loaded.add(len - 1024, 1024);
        assert_eq!(avail.is_doc_avail(), DocAvailStatus::DataNotAvailable);
        assert!(avail.document().is_some());

        // Deciding that /Pages may be skipped needs the page tree node itself.
        assert_eq!(avail.is_doc_avail(), DocAvailStatus::DataNotAvailable);
        let (pages, page) = (built.offsets[2] as u64, built.offsets[3] as u64);
        loaded.add(pages, page - pages);
        assert_eq!(avail.is_doc_avail(), DocAvailStatus::DataNotAvailable);

        loaded.add(0, len);
        assert_eq!(avail.is_doc_avail(), DocAvailStatus::DataAvailable);
        assert_eq!(avail.is_doc_avail(), DocAvailStatus::DataAvailable);
        assert_eq!(avail.is_page_avail(0), DocAvailStatus::DataAvailable);
        let doc = avail.into_document().unwrap();
        assert_eq!(doc.page_count(), 1);
    }

    #[test]
    fn test_missing_header_is_error() {
        let (mut avail, loaded) = checker(b"this is not a pdf file at all".to_vec());
        loaded.add(0, 1024);
        assert_eq!(avail.is_doc_avail(), DocAvailStatus::DataError);
        assert_eq!(avail.is_doc_avail(), DocAvailStatus::DataError);
    }

    #[test]
    fn test_empty_page_tree() {
        let data = PdfBuilder::new("1.7")
            .object("<< /Type /Catalog /Pages 2 0 R >>")
            .object("<< /Type /Pages /Kids [] /Count 0 >>")
            .trailer("/Root 1 0 R")
            .build();
        let len = data.len() as u64;
        let (mut avail, loaded) = checker(data);
        loaded.add(0, len);
        assert_eq!(avail.is_doc_avail(), DocAvailStatus::DataAvailable);
    }
}
