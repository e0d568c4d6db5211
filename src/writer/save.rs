//! Save entry points.

use bitflags::bitflags;

use super::creator::{Creator, CreatorOptions, SaveReport};
use crate::document::PdfDocument;
use crate::error::{Error, Result};
use crate::fonts::FontSubsetter;
use crate::io::WriteStream;

bitflags! {
    /// Flags accepted by [`save_as_copy`].
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct SaveFlags: u32 {
        /// Append changes to the original bytes
        const INCREMENTAL = 1;
        /// Rewrite the whole file
        const NO_INCREMENTAL = 2;
        /// Drop the `/Encrypt` dictionary
        const REMOVE_SECURITY = 4;
        /// Subset fonts embedded for new text before writing
        const SUBSET_NEW_FONTS = 8;
    }
}

/// Write `doc` to `out`. Returns `false` on any failure, which is logged.
///
/// # Example
///
/// ```
/// use pdf_creator::document::PdfDocument;
/// use pdf_creator::io::MemoryStream;
/// use pdf_creator::writer::{save_as_copy, SaveFlags};
///
/// let doc = PdfDocument::new();
/// doc.create_new_page(0, 612.0, 792.0);
/// let mut out = MemoryStream::new();
/// assert!(save_as_copy(&doc, &mut out, SaveFlags::NO_INCREMENTAL));
/// assert!(out.as_bytes().starts_with(b"%PDF-1.7"));
/// ```
pub fn save_as_copy(doc: &PdfDocument, out: &mut dyn WriteStream, flags: SaveFlags) -> bool {
    save_with_version(doc, out, flags, 0)
}

/// Like [`save_as_copy`], writing header version `version`
/// (`major * 10 + minor`, 0 keeps the document's version).
pub fn save_with_version(doc: &PdfDocument, out: &mut dyn WriteStream, flags: SaveFlags, version: u32) -> bool {
    match save_with_options(doc, out, flags, CreatorOptions::default().with_version(version)) {
        Ok(_) => true,
        Err(e) => {
            log::error!("Save failed: {}", e);
            false
        },
    }
}

/// Save with full control over the creator options, returning a report.
///
/// # Errors
///
/// Returns `Error::InvalidPdf` when both incremental flags are set and
/// `Error::Write` when the output stream rejects a block.
pub fn save_with_options(
    doc: &PdfDocument,
    out: &mut dyn WriteStream,
    flags: SaveFlags,
    options: CreatorOptions,
) -> Result<SaveReport> {
    if flags.contains(SaveFlags::INCREMENTAL | SaveFlags::NO_INCREMENTAL) {
        return Err(Error::InvalidPdf("INCREMENTAL and NO_INCREMENTAL are mutually exclusive".to_string()));
    }

    let mut creator = Creator::new(doc).with_options(options);
    if flags.contains(SaveFlags::SUBSET_NEW_FONTS) {
        let overrides = FontSubsetter::new(doc).generate_object_overrides(&doc.new_obj_nums());
        log::debug!("Font subsetting produced {} overrides", overrides.len());
        creator.set_object_overrides(overrides);
    }
    creator.set_remove_security(flags.contains(SaveFlags::REMOVE_SECURITY));
    creator.create(out, flags.contains(SaveFlags::INCREMENTAL))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::{MemoryStream, WriteCallback};

    #[test]
    fn test_flag_values() {
        assert_eq!(SaveFlags::INCREMENTAL.bits(), 1);
        assert_eq!(SaveFlags::NO_INCREMENTAL.bits(), 2);
        assert_eq!(SaveFlags::REMOVE_SECURITY.bits(), 4);
        assert_eq!(SaveFlags::SUBSET_NEW_FONTS.bits(), 8);
    }

    #[test]
    fn test_conflicting_flags_rejected() {
        let doc = PdfDocument::new();
        let mut out = MemoryStream::new();
        assert!(!save_as_copy(&doc, &mut out, SaveFlags::INCREMENTAL | SaveFlags::NO_INCREMENTAL));
        assert!(out.as_bytes().is_empty());
    }

    #[test]
    fn test_version_variant() {
        let doc = PdfDocument::new();
        let mut out = MemoryStream::new();
        assert!(save_with_version(&doc, &mut out, SaveFlags::empty(), 20));
        assert!(out.as_bytes().starts_with(b"%PDF-2.0\r\n"));
    }

    #[test]
    fn test_callback_failure_returns_false() {
        let doc = PdfDocument::new();
        let mut out = WriteCallback::new(|_: &[u8]| false);
        assert!(!save_as_copy(&doc, &mut out, SaveFlags::empty()));
    }

    #[test]
    fn test_subset_flag_without_fonts() {
        let doc = PdfDocument::new();
        doc.create_new_page(0, 100.0, 100.0);
        let mut out = MemoryStream::new();
        let report = save_with_options(&doc, &mut out, SaveFlags::SUBSET_NEW_FONTS, CreatorOptions::default()).unwrap();
        assert_eq!(report.overrides_written, 0);
        assert_eq!(report.objects_written, 4);
    }
}
