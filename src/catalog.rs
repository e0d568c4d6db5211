//! Document catalog accessors.
//!
//! Language strings cross the API boundary as NUL-terminated UTF-16LE,
//! filled with the usual two-call pattern: ask for the length with an
//! empty buffer, then call again with a buffer of that size.

use crate::document::PdfDocument;
use crate::object::text::encode_utf16le_nul;

/// True if the catalog's `/MarkInfo` dictionary has `/Marked true`.
pub fn is_tagged(doc: &PdfDocument) -> bool {
    doc.root()
        .and_then(|root| root.get_dict_for("MarkInfo", doc))
        .and_then(|mark_info| mark_info.get_boolean_for("Marked", doc))
        .unwrap_or(false)
}

/// Copy the catalog `/Lang` entry into `buffer` as UTF-16LE with a NUL.
///
/// Returns the number of bytes the encoded string needs, 0 when the
/// document has no catalog. A missing `/Lang` encodes as the empty string
/// (2 bytes). The buffer is only written when it is large enough.
///
/// ```
/// use pdf_creator::catalog::{get_language, set_language};
/// use pdf_creator::document::PdfDocument;
///
/// let doc = PdfDocument::new();
/// assert_eq!(get_language(&doc, None), 2);
/// assert!(set_language(&doc, "en-US"));
/// let mut buf = vec![0u8; get_language(&doc, None)];
/// assert_eq!(get_language(&doc, Some(&mut buf)), 12);
/// assert_eq!(&buf[..4], &[b'e', 0, b'n', 0]);
/// ```
pub fn get_language(doc: &PdfDocument, buffer: Option<&mut [u8]>) -> usize {
    let Some(root) = doc.root() else {
        return 0;
    };
    let encoded = encode_utf16le_nul(&root.get_unicode_text_for("Lang", doc));
    if let Some(buffer) = buffer {
        if buffer.len() >= encoded.len() {
            buffer[..encoded.len()].copy_from_slice(&encoded);
        }
    }
    encoded.len()
}

/// Set the catalog `/Lang` entry. Returns false when there is no catalog.
pub fn set_language(doc: &PdfDocument, language: &str) -> bool {
    let Some(root) = doc.root() else {
        return false;
    };
    root.set_text_for("Lang", language);
    doc.mark_modified(root.obj_num());
    log::debug!("Catalog language set to {:?}", language);
    true
}
