//! Refinement region decoding.
//!
//! A refinement region is coded relative to a reference bitmap. Contexts
//! mix already decoded pixels of the region with pixels of the reference
//! around the corresponding position, shifted by the reference offset.
//! Reference rows or columns outside the reference bitmap read as 0.

use serde::Serialize;

use super::arith::{new_contexts, ArithCtx, ArithDecoder};
use super::image::Image;
use super::is_valid_image_size;
use crate::error::{Error, Result};

/// Parameters of one refinement region.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RefinementParams {
    /// Region width in pixels.
    pub width: u32,
    /// Region height in pixels.
    pub height: u32,
    /// Context template, 0 or 1.
    pub template: u8,
    /// Typical prediction for refinement.
    pub tpgron: bool,
    /// Horizontal offset of the reference.
    pub dx: i32,
    /// Vertical offset of the reference.
    pub dy: i32,
    /// Adaptive pixels of template 0: region (x, y) then reference (x, y).
    pub grat: [i8; 4],
}

impl RefinementParams {
    /// Region with nominal adaptive pixels and no offset.
    pub fn new(width: u32, height: u32, template: u8) -> Self {
        Self {
            width,
            height,
            template: template.min(1),
            tpgron: false,
            dx: 0,
            dy: 0,
            grat: [-1, -1, -1, -1],
        }
    }

    /// Set the reference offset.
    pub fn with_offset(mut self, dx: i32, dy: i32) -> Self {
        self.dx = dx;
        self.dy = dy;
        self
    }

    /// Enable or disable typical prediction.
    pub fn with_tpgron(mut self, tpgron: bool) -> Self {
        self.tpgron = tpgron;
        self
    }

    /// Number of contexts the template addresses.
    pub fn context_count(&self) -> usize {
        if self.template == 0 {
            1 << 13
        } else {
            1 << 10
        }
    }

    /// A fresh context table sized for this region.
    pub fn new_contexts(&self) -> Vec<ArithCtx> {
        new_contexts(self.context_count())
    }

    pub(crate) fn tp_context(&self) -> usize {
        if self.template == 0 {
            0x0010
        } else {
            0x0008
        }
    }

    pub(crate) fn context_at(&self, region: &Image, reference: &Image, x: i32, y: i32) -> usize {
        let (rx, ry) = (x - self.dx, y - self.dy);
        let r = |dx: i32, dy: i32| u32::from(reference.get_pixel(rx + dx, ry + dy));
        let g = |dx: i32, dy: i32| u32::from(region.get_pixel(x + dx, y + dy));
        let ctx = if self.template == 0 {
            r(1, 1)
                | r(0, 1) << 1
                | r(-1, 1) << 2
                | r(1, 0) << 3
                | r(0, 0) << 4
                | r(-1, 0) << 5
                | r(1, -1) << 6
                | r(0, -1) << 7
                | r(i32::from(self.grat[2]), i32::from(self.grat[3])) << 8
                | g(-1, 0) << 9
                | g(1, -1) << 10
                | g(0, -1) << 11
                | g(i32::from(self.grat[0]), i32::from(self.grat[1])) << 12
        } else {
            r(1, 1)
                | r(0, 1) << 1
                | r(1, 0) << 2
                | r(0, 0) << 3
                | r(-1, 0) << 4
                | r(0, -1) << 5
                | g(-1, 0) << 6
                | g(1, -1) << 7
                | g(0, -1) << 8
                | g(-1, -1) << 9
        };
        ctx as usize
    }

    /// Value of the reference around (`x`, `y`) when its 3x3 block is uniform.
    pub(crate) fn typical_value(&self, reference: &Image, x: i32, y: i32) -> Option<u8> {
        let (rx, ry) = (x - self.dx, y - self.dy);
        let value = reference.get_pixel(rx, ry);
        for dy in -1..=1 {
            for dx in -1..=1 {
                if reference.get_pixel(rx + dx, ry + dy) != value {
                    return None;
                }
            }
        }
        Some(value)
    }
}

/// Decoder for refinement regions.
#[derive(Debug, Clone)]
pub struct RefinementRegionDecoder {
    params: RefinementParams,
}

impl RefinementRegionDecoder {
    /// Decoder for the region `params` describes.
    pub fn new(params: RefinementParams) -> Self {
        Self { params }
    }

    /// Decode the region against `reference`.
    ///
    /// Regions with invalid dimensions produce an empty image.
    pub fn decode(
        &self,
        reference: &Image,
        arith: &mut ArithDecoder<'_>,
        contexts: &mut [ArithCtx],
    ) -> Result<Image> {
        let params = &self.params;
        if !is_valid_image_size(params.width, params.height) {
            return Ok(Image::default());
        }
        if contexts.len() < params.context_count() {
            return Err(Error::Jbig2(format!(
                "refinement template {} needs {} contexts",
                params.template,
                params.context_count()
            )));
        }

        let mut region = Image::new(params.width, params.height);
        let mut ltp = false;
        for y in 0..params.height as i32 {
            if params.tpgron {
                ltp ^= decode_bit(arith, &mut contexts[params.tp_context()])? != 0;
            }
            for x in 0..params.width as i32 {
                let predicted = if ltp {
                    params.typical_value(reference, x, y)
                } else {
                    None
                };
                let bit = match predicted {
                    Some(value) => value,
                    None => {
                        let ctx = params.context_at(&region, reference, x, y);
                        decode_bit(arith, &mut contexts[ctx])? as u8
                    },
                };
                if bit != 0 {
                    region.set_pixel(x, y, 1);
                }
            }
        }
        Ok(region)
    }
}

fn decode_bit(arith: &mut ArithDecoder<'_>, cx: &mut ArithCtx) -> Result<u32> {
    if arith.is_complete() {
        return Err(Error::Jbig2("arithmetic data exhausted in refinement region".to_string()));
    }
    Ok(arith.decode(cx))
}
