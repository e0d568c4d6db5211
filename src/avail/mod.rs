//! Availability checks for progressively downloaded documents.
//!
//! A host that downloads a PDF in pieces wraps the partial file in a
//! [`ReadValidator`] and asks whether enough bytes have arrived to load a
//! given object graph. Each check answers with a [`DocAvailStatus`]; a
//! `DataNotAvailable` verdict comes with download hints for the missing
//! ranges, and the host calls the check again once they arrive.

mod document_avail;
mod object_avail;
mod validator;
mod walker;

pub use document_avail::{DocumentAvail, LoadedRanges};
pub use object_avail::{ExcludeFn, ObjectAvail, PageObjectAvail};
pub use validator::{DownloadHints, FileAvail, ReadValidator, ScopedSession};
pub use walker::ObjectWalker;

/// Verdict of an availability check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocAvailStatus {
    /// The data is present but cannot be parsed.
    DataError,
    /// More bytes are needed; retry after they arrive.
    DataNotAvailable,
    /// Everything the check covers is present.
    DataAvailable,
}
