//! Generic region encoding.

use super::arith::{ArithCtx, ArithEncoder};
use super::generic::GenericRegionParams;
use super::image::Image;
use crate::error::{Error, Result};

/// Encodes a bitmap as an arithmetic-coded generic region.
///
/// The output decodes with [`GenericRegionDecoder`](super::GenericRegionDecoder)
/// under the same parameters. Pixels covered by the skip mask are not coded
/// and decode as 0 unless typical prediction copies the row above.
#[derive(Debug, Clone)]
pub struct GenericRegionEncoder {
    params: GenericRegionParams,
    skip: Option<Image>,
}

impl GenericRegionEncoder {
    /// Encoder for regions described by `params`.
    pub fn new(params: GenericRegionParams) -> Self {
        Self { params, skip: None }
    }

    /// Leave pixels set in `skip` uncoded.
    pub fn with_skip(mut self, skip: Image) -> Self {
        self.skip = Some(skip);
        self
    }

    /// Encode `image`, whose size must match the region.
    pub fn encode(&self, image: &Image) -> Result<Vec<u8>> {
        let mut contexts = self.params.new_contexts();
        let mut encoder = ArithEncoder::new();
        self.encode_into(image, &mut encoder, &mut contexts)?;
        let data = encoder.finish();
        log::debug!(
            "Encoded {}x{} region with template {} into {} bytes",
            self.params.width,
            self.params.height,
            self.params.template,
            data.len()
        );
        Ok(data)
    }

    /// Encode `image` into a running coder, for streams that carry several
    /// regions back to back with shared contexts.
    pub fn encode_into(&self, image: &Image, encoder: &mut ArithEncoder, contexts: &mut [ArithCtx]) -> Result<()> {
        let params = &self.params;
        if params.mmr {
            return Err(Error::Unsupported("MMR-coded generic regions".to_string()));
        }
        if image.width() != params.width || image.height() != params.height || !image.has_data() {
            return Err(Error::Jbig2(format!(
                "bitmap is {}x{}, region is {}x{}",
                image.width(),
                image.height(),
                params.width,
                params.height
            )));
        }
        if contexts.len() < params.context_count() {
            return Err(Error::Jbig2(format!("template {} needs {} contexts", params.template, params.context_count())));
        }

        // What the decoder will have reconstructed so far.
        let mut decoded = Image::new(params.width, params.height);
        let mut ltp = false;
        let mut typical_rows = 0usize;

        for y in 0..params.height {
            if params.tpgdon {
                let above = y.checked_sub(1).and_then(|prev| decoded.line(prev as i32));
                let typical = match (image.line(y as i32), above) {
                    (Some(row), Some(above)) => row == above,
                    (Some(row), None) => row.iter().all(|b| *b == 0),
                    _ => false,
                };
                encoder.encode(&mut contexts[params.tp_context()], u32::from(typical != ltp));
                ltp = typical;
                if ltp {
                    decoded.copy_line(y, y.checked_sub(1));
                    typical_rows += 1;
                    continue;
                }
            }
            let y = y as i32;
            for x in 0..params.width as i32 {
                if self.skip.as_ref().is_some_and(|skip| skip.get_pixel(x, y) != 0) {
                    continue;
                }
                let ctx = params.context_at(&decoded, x, y);
                let bit = image.get_pixel(x, y);
                encoder.encode(&mut contexts[ctx], u32::from(bit));
                if bit != 0 {
                    decoded.set_pixel(x, y, 1);
                }
            }
        }
        log::trace!("{} of {} rows coded as typical", typical_rows, params.height);
        Ok(())
    }
}
