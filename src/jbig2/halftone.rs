//! Halftone region decoding.
//!
//! A halftone region is a grid of pattern indices placed on a skewed
//! lattice. The indices are coded as Gray-coded bit planes, each plane a
//! generic region; the decoded patterns are then composed onto a page-sized
//! bitmap one grid cell at a time.

use serde::Serialize;

use super::arith::{ArithCtx, ArithDecoder};
use super::generic::{GenericRegionDecoder, GenericRegionParams};
use super::image::{ComposeOp, Image};
use super::{DecodeStatus, PauseIndicator};
use crate::error::{Error, Result};

/// Parameters of one halftone region.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HalftoneParams {
    /// Region width.
    pub width: u32,
    /// Region height.
    pub height: u32,
    /// MMR-coded gray planes.
    pub mmr: bool,
    /// Generic template for the gray planes.
    pub template: u8,
    /// Skip grid cells whose pattern lands outside the region.
    pub enable_skip: bool,
    /// How patterns combine with the region.
    pub combine_op: ComposeOp,
    /// Initial value of every region pixel.
    pub default_pixel: bool,
    /// Grid width in cells.
    pub grid_width: u32,
    /// Grid height in cells.
    pub grid_height: u32,
    /// Grid origin x, in 1/256 pixel.
    pub grid_x: i32,
    /// Grid origin y, in 1/256 pixel.
    pub grid_y: i32,
    /// Grid vector x component, in 1/256 pixel.
    pub grid_vector_x: u16,
    /// Grid vector y component, in 1/256 pixel.
    pub grid_vector_y: u16,
}

impl HalftoneParams {
    /// Top-left corner of grid cell (`mg`, `ng`) in region pixels.
    fn cell_origin(&self, mg: u32, ng: u32) -> (i64, i64) {
        let (mg, ng) = (i64::from(mg), i64::from(ng));
        let (rx, ry) = (i64::from(self.grid_vector_x), i64::from(self.grid_vector_y));
        let x = (i64::from(self.grid_x) + mg * ry + ng * rx) >> 8;
        let y = (i64::from(self.grid_y) + mg * rx - ng * ry) >> 8;
        (x, y)
    }

    /// Gray plane count for `pattern_count` patterns.
    fn bits_per_value(pattern_count: usize) -> u32 {
        let mut bits = 1u32;
        while (1usize << bits) < pattern_count {
            bits += 1;
        }
        bits
    }
}

/// Decoder for halftone regions over a fixed pattern dictionary.
#[derive(Debug, Clone)]
pub struct HalftoneRegionDecoder {
    params: HalftoneParams,
    patterns: Vec<Image>,
}

impl HalftoneRegionDecoder {
    /// Decoder drawing from `patterns`, which must all share one size.
    pub fn new(params: HalftoneParams, patterns: Vec<Image>) -> Self {
        Self { params, patterns }
    }

    fn skip_mask(&self) -> Image {
        let params = &self.params;
        let (pattern_width, pattern_height) = self
            .patterns
            .first()
            .map_or((0, 0), |p| (i64::from(p.width()), i64::from(p.height())));
        let mut skip = Image::new(params.grid_width, params.grid_height);
        for mg in 0..params.grid_height {
            for ng in 0..params.grid_width {
                let (x, y) = params.cell_origin(mg, ng);
                let outside = x + pattern_width <= 0
                    || x >= i64::from(params.width)
                    || y + pattern_height <= 0
                    || y >= i64::from(params.height);
                if outside {
                    skip.set_pixel(ng as i32, mg as i32, 1);
                }
            }
        }
        skip
    }

    /// Decode the gray planes from `arith` and render the region.
    pub fn decode_arith(
        &self,
        arith: &mut ArithDecoder<'_>,
        contexts: &mut [ArithCtx],
        pause: Option<&dyn PauseIndicator>,
    ) -> Result<Image> {
        let params = &self.params;
        if params.mmr {
            return Err(Error::Unsupported("MMR-coded halftone regions".to_string()));
        }
        if self.patterns.is_empty() {
            return Err(Error::Jbig2("halftone region without patterns".to_string()));
        }

        let mut plane_decoder = GenericRegionDecoder::new(GenericRegionParams::new(
            params.grid_width,
            params.grid_height,
            params.template,
        ));
        if params.enable_skip {
            plane_decoder = plane_decoder.with_skip(self.skip_mask());
        }

        let bits = HalftoneParams::bits_per_value(self.patterns.len());
        let mut planes: Vec<Image> = Vec::with_capacity(bits as usize);
        for i in (0..bits).rev() {
            let mut status = plane_decoder.start_decode_arith(arith, contexts, None);
            while status == DecodeStatus::ToBeContinued {
                status = plane_decoder.continue_decode(arith, contexts, pause);
            }
            let mut plane = match (status, plane_decoder.take_image()) {
                (DecodeStatus::Finished, Some(plane)) => plane,
                _ => return Err(Error::Jbig2(format!("gray plane {} failed to decode", i))),
            };
            if let Some(higher) = planes.last() {
                higher.compose_to(&mut plane, 0, 0, ComposeOp::Xor);
            }
            planes.push(plane);
        }
        // Most significant plane first; flip to index by bit.
        planes.reverse();
        log::debug!(
            "Decoded {} gray planes for a {}x{} halftone grid",
            bits,
            params.grid_width,
            params.grid_height
        );
        Ok(self.render(&planes))
    }

    /// Compose the pattern chosen by each gray value onto a fresh region.
    fn render(&self, planes: &[Image]) -> Image {
        let params = &self.params;
        let mut region = Image::new(params.width, params.height);
        region.fill(params.default_pixel);
        let last = self.patterns.len() - 1;
        for mg in 0..params.grid_height {
            for ng in 0..params.grid_width {
                let gray = planes
                    .iter()
                    .enumerate()
                    .fold(0usize, |acc, (i, plane)| acc | usize::from(plane.get_pixel(ng as i32, mg as i32)) << i);
                let (x, y) = params.cell_origin(mg, ng);
                self.patterns[gray.min(last)].compose_to(&mut region, x, y, params.combine_op);
            }
        }
        region
    }
}
