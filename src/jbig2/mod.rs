//! JBIG2 region coding.
//!
//! Arithmetic-coded bitmap regions as they appear in JBIG2 image streams:
//!
//! - [`GenericRegionDecoder`] decodes generic regions with any of the four
//!   context templates, either in one shot or progressively with a
//!   [`PauseIndicator`] deciding when to yield between rows.
//! - [`GenericRegionEncoder`] produces generic region data from a bitmap.
//! - [`RefinementRegionDecoder`] refines a bitmap against a reference.
//! - [`HalftoneRegionDecoder`] renders gray-coded pattern grids.
//!
//! Segment headers and the symbol/text region machinery are out of scope;
//! callers hand in the region parameters and the arithmetic-coded bytes.

pub mod arith;
mod generic;
mod generic_encoder;
mod halftone;
mod image;
mod refinement;

pub use arith::{ArithCtx, ArithDecoder, ArithEncoder};
pub use generic::{GenericRegionDecoder, GenericRegionParams, ReplaceRect};
pub use generic_encoder::GenericRegionEncoder;
pub use halftone::{HalftoneParams, HalftoneRegionDecoder};
pub use image::{ComposeOp, Image};
pub use refinement::{RefinementParams, RefinementRegionDecoder};

/// Largest region width or height a decoder accepts.
pub const MAX_IMAGE_SIZE: u32 = 65535;

/// True when a `width` x `height` region may be decoded.
pub fn is_valid_image_size(width: u32, height: u32) -> bool {
    width > 0 && width <= MAX_IMAGE_SIZE && height > 0 && height <= MAX_IMAGE_SIZE
}

/// Progress of a region decode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub enum DecodeStatus {
    /// Nothing decoded yet.
    Ready,
    /// Paused between rows; call `continue_decode`.
    ToBeContinued,
    /// All rows decoded.
    Finished,
    /// The data was corrupt or ran out.
    Error,
}

/// Asked between rows whether a progressive decode should yield.
pub trait PauseIndicator {
    /// Return true to stop after the row just finished.
    fn need_to_pause_now(&self) -> bool;
}

impl<F: Fn() -> bool> PauseIndicator for F {
    fn need_to_pause_now(&self) -> bool {
        self()
    }
}
