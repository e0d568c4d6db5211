//! PDF writing.
//!
//! ## Architecture
//!
//! ```text
//! save_as_copy(doc, out, flags)
//!     ↓
//! [FontSubsetter] (optional: override objects for new fonts)
//!     ↓
//! [Creator] (full rewrite or incremental update, xref, trailer)
//!     ↓
//! [ObjectSerializer] (serializes PDF objects)
//!     ↓
//! WriteStream
//! ```
//!
//! A full rewrite emits every object of the document under its existing
//! number. An incremental update copies the source bytes unchanged and
//! appends new and modified objects with a cross-reference section whose
//! `/Prev` points at the source's.

mod creator;
mod object_serializer;
mod save;

pub use creator::{Creator, CreatorOptions, SaveReport};
pub use object_serializer::ObjectSerializer;
pub use save::{save_as_copy, save_with_options, save_with_version, SaveFlags};
