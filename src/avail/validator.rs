//! Read validation for progressively downloaded files.

use std::cell::Cell;
use std::rc::Rc;

use crate::io::SeekableReadStream;

/// Reports which byte ranges of a partially downloaded file are present.
pub trait FileAvail {
    /// True when `size` bytes starting at `offset` have been downloaded.
    fn is_data_avail(&self, offset: u64, size: u64) -> bool;
}

/// Receives requests for byte ranges the reader needs next.
pub trait DownloadHints {
    /// Ask the host to download `size` bytes at `offset`.
    fn add_segment(&self, offset: u64, size: u64);
}

// Requests are widened to this alignment so the host downloads in chunks.
const ALIGN_BLOCK: u64 = 512;

/// Read stream wrapper that records missing data instead of failing hard.
///
/// Every read checks the [`FileAvail`] first. A read of bytes that have not
/// arrived yet sets `has_unavailable_data` and asks the [`DownloadHints`]
/// for the range; a read that fails in the underlying stream sets
/// `read_error`. Callers bracket a unit of work with a [`ScopedSession`]
/// and inspect [`has_read_problems`](Self::has_read_problems) afterwards.
pub struct ReadValidator {
    file_read: Rc<dyn SeekableReadStream>,
    file_avail: Option<Rc<dyn FileAvail>>,
    hints: Option<Rc<dyn DownloadHints>>,
    file_size: u64,
    read_error: Cell<bool>,
    has_unavailable_data: Cell<bool>,
    whole_file_already_available: Cell<bool>,
}

impl ReadValidator {
    /// Wrap `file_read`. With no `file_avail` the whole file counts as present.
    pub fn new(file_read: Rc<dyn SeekableReadStream>, file_avail: Option<Rc<dyn FileAvail>>) -> Self {
        let file_size = file_read.get_size();
        Self {
            file_read,
            file_avail,
            hints: None,
            file_size,
            read_error: Cell::new(false),
            has_unavailable_data: Cell::new(false),
            whole_file_already_available: Cell::new(false),
        }
    }

    /// Install (or clear) the download hint sink.
    pub fn set_download_hints(&mut self, hints: Option<Rc<dyn DownloadHints>>) {
        self.hints = hints;
    }

    /// True after a read failed in the underlying stream.
    pub fn read_error(&self) -> bool {
        self.read_error.get()
    }

    /// True after a read touched bytes that have not been downloaded.
    pub fn has_unavailable_data(&self) -> bool {
        self.has_unavailable_data.get()
    }

    /// True if either flag is set.
    pub fn has_read_problems(&self) -> bool {
        self.read_error() || self.has_unavailable_data()
    }

    /// Clear both flags.
    pub fn reset_errors(&self) {
        self.read_error.set(false);
        self.has_unavailable_data.set(false);
    }

    /// Start a session; flags raised inside it are merged back on drop.
    pub fn scoped_session(&self) -> ScopedSession<'_> {
        ScopedSession::new(self)
    }

    /// Check that `[offset, offset + size)` is present, requesting it if not.
    pub fn check_data_range_and_request_if_unavailable(&self, offset: u64, size: u64) -> bool {
        if offset > self.file_size {
            return true;
        }
        let end = offset.saturating_add(size).min(self.file_size);
        let size = end - offset;
        if self.is_data_range_available(offset, size) {
            return true;
        }
        self.schedule_download(offset, size);
        false
    }

    /// Check that the whole file is present, requesting it if not.
    pub fn check_whole_file_and_request_if_unavailable(&self) -> bool {
        if self.whole_file_already_available.get() {
            return true;
        }
        if self.check_data_range_and_request_if_unavailable(0, self.file_size) {
            self.whole_file_already_available.set(true);
            return true;
        }
        false
    }

    fn is_data_range_available(&self, offset: u64, size: u64) -> bool {
        self.whole_file_already_available.get()
            || self
                .file_avail
                .as_ref()
                .map_or(true, |avail| avail.is_data_avail(offset, size))
    }

    fn schedule_download(&self, offset: u64, size: u64) {
        self.has_unavailable_data.set(true);
        let Some(hints) = &self.hints else {
            return;
        };
        if size == 0 {
            return;
        }
        let start = offset - offset % ALIGN_BLOCK;
        let end = offset.saturating_add(size).saturating_add(ALIGN_BLOCK - 1) / ALIGN_BLOCK * ALIGN_BLOCK;
        let end = end.min(self.file_size);
        log::debug!("Requesting bytes {}..{}", start, end);
        hints.add_segment(start, end - start);
    }
}

impl SeekableReadStream for ReadValidator {
    fn get_size(&self) -> u64 {
        self.file_size
    }

    fn get_position(&self) -> u64 {
        self.file_read.get_position()
    }

    fn read_block_at_offset(&self, buffer: &mut [u8], offset: u64) -> bool {
        let Some(end) = offset.checked_add(buffer.len() as u64) else {
            return false;
        };
        if end > self.file_size {
            return false;
        }
        if !self.is_data_range_available(offset, buffer.len() as u64) {
            self.schedule_download(offset, buffer.len() as u64);
            return false;
        }
        if self.file_read.read_block_at_offset(buffer, offset) {
            return true;
        }
        self.read_error.set(true);
        self.schedule_download(offset, buffer.len() as u64);
        false
    }
}

impl std::fmt::Debug for ReadValidator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReadValidator")
            .field("file_size", &self.file_size)
            .field("read_error", &self.read_error.get())
            .field("has_unavailable_data", &self.has_unavailable_data.get())
            .field("whole_file_available", &self.whole_file_already_available.get())
            .finish()
    }
}

/// Guard that isolates validator flags for one unit of work.
///
/// Creating the session stashes and clears the flags; dropping it ORs the
/// stashed values back in, so problems seen inside the session stay visible
/// to the enclosing one.
pub struct ScopedSession<'a> {
    validator: &'a ReadValidator,
    saved_read_error: bool,
    saved_has_unavailable_data: bool,
}

impl<'a> ScopedSession<'a> {
    fn new(validator: &'a ReadValidator) -> Self {
        let session = Self {
            validator,
            saved_read_error: validator.read_error(),
            saved_has_unavailable_data: validator.has_unavailable_data(),
        };
        validator.reset_errors();
        session
    }
}

impl Drop for ScopedSession<'_> {
    fn drop(&mut self) {
        let v = self.validator;
        v.read_error.set(v.read_error.get() || self.saved_read_error);
        v.has_unavailable_data
            .set(v.has_unavailable_data.get() || self.saved_has_unavailable_data);
    }
}
