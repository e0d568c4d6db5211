//! Fixture builders shared by the integration tests.
#![allow(dead_code)]

pub mod pdf_builder;
pub mod ttf_builder;

use pdf_creator::io::MemoryStream;
use pdf_creator::writer::{save_as_copy, SaveFlags};
use pdf_creator::PdfDocument;

/// Save `doc` into memory, panicking on failure.
pub fn save_to_vec(doc: &PdfDocument, flags: SaveFlags) -> Vec<u8> {
    let mut out = MemoryStream::new();
    assert!(save_as_copy(doc, &mut out, flags), "save failed with {:?}", flags);
    out.into_bytes()
}

/// Text of the final `trailer` through the end of the file.
pub fn trailer_of(bytes: &[u8]) -> String {
    let text = String::from_utf8_lossy(bytes);
    let pos = text.rfind("trailer").expect("output has a trailer");
    text[pos..].to_string()
}

/// Enable log output for a test run; repeated calls are fine.
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}
