//! Generic region decoding.
//!
//! Each pixel is decoded with a context built from already decoded
//! neighbours. Four templates define the neighbourhood; templates 0 and 1
//! also take adaptive pixels anywhere above or to the left.
//!
//! When the adaptive pixels sit at their nominal positions and no skip
//! mask is in use, rows are decoded a byte at a time with the context
//! updated from shifted copies of the rows above. Otherwise every pixel's
//! context is gathered individually. Both paths produce identical bitmaps.

use serde::Serialize;

use super::arith::{new_contexts, ArithCtx, ArithDecoder};
use super::image::Image;
use super::{is_valid_image_size, DecodeStatus, PauseIndicator};
use crate::error::{Error, Result};

/// Context used for the typical prediction bit, per template.
const TP_CONTEXT: [usize; 4] = [0x9b25, 0x0795, 0x00e5, 0x0195];

/// Context table size per template.
const CONTEXT_COUNT: [usize; 4] = [1 << 16, 1 << 13, 1 << 10, 1 << 10];

// Byte-wise row constants for templates 0, 1 and 2.
const PREV2_SHIFT: [u32; 3] = [6, 4, 1];
const PREV2_CONTEXT_MASK: [u32; 3] = [0xf800, 0x1e00, 0x0380];
const PREV1_SHIFT: [u32; 3] = [0, 1, 3];
const PREV1_CONTEXT_MASK: [u32; 3] = [0x07f0, 0x01f8, 0x007c];
const CONTEXT_MASK: [u32; 3] = [0x7bf7, 0x0efb, 0x01bd];
const PREV2_BIT_MASK: [u32; 3] = [0x0800, 0x0200, 0x0080];
const PREV1_BIT_MASK: [u32; 3] = [0x0010, 0x0008, 0x0004];

/// Parameters of one generic region.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GenericRegionParams {
    /// Region width in pixels.
    pub width: u32,
    /// Region height in pixels.
    pub height: u32,
    /// Context template, 0 to 3.
    pub template: u8,
    /// Typical prediction: rows may be flagged as copies of the row above.
    pub tpgdon: bool,
    /// MMR coding instead of arithmetic coding.
    pub mmr: bool,
    /// Adaptive pixel offsets as (x, y) pairs. Template 0 uses four pairs,
    /// the others one.
    pub at: [i8; 8],
}

impl GenericRegionParams {
    /// Arithmetic-coded region with the nominal adaptive pixels.
    pub fn new(width: u32, height: u32, template: u8) -> Self {
        Self {
            width,
            height,
            template: template.min(3),
            tpgdon: false,
            mmr: false,
            at: Self::default_at(template),
        }
    }

    /// Enable or disable typical prediction.
    pub fn with_tpgdon(mut self, tpgdon: bool) -> Self {
        self.tpgdon = tpgdon;
        self
    }

    /// Replace the adaptive pixel offsets.
    pub fn with_at(mut self, at: [i8; 8]) -> Self {
        self.at = at;
        self
    }

    /// Nominal adaptive pixel offsets of `template`.
    pub fn default_at(template: u8) -> [i8; 8] {
        match template {
            0 => [3, -1, -3, -1, 2, -2, -2, -2],
            1 => [3, -1, 0, 0, 0, 0, 0, 0],
            _ => [2, -1, 0, 0, 0, 0, 0, 0],
        }
    }

    /// Number of contexts the template addresses.
    pub fn context_count(&self) -> usize {
        CONTEXT_COUNT[self.template as usize & 3]
    }

    /// A fresh context table sized for this region.
    pub fn new_contexts(&self) -> Vec<ArithCtx> {
        new_contexts(self.context_count())
    }

    pub(crate) fn tp_context(&self) -> usize {
        TP_CONTEXT[self.template as usize & 3]
    }

    /// True when the byte-wise row decoder applies.
    pub(crate) fn nominal_at(&self) -> bool {
        let nominal = Self::default_at(self.template);
        match self.template {
            0 => self.at == nominal,
            _ => self.at[..2] == nominal[..2],
        }
    }

    /// Context of the pixel at (`x`, `y`) given the pixels decoded so far.
    pub(crate) fn context_at(&self, image: &Image, x: i32, y: i32) -> usize {
        let p = |dx: i32, dy: i32| u32::from(image.get_pixel(x + dx, y + dy));
        let a = |i: usize| p(i32::from(self.at[2 * i]), i32::from(self.at[2 * i + 1]));
        let ctx = match self.template {
            0 => {
                p(-1, 0)
                    | p(-2, 0) << 1
                    | p(-3, 0) << 2
                    | p(-4, 0) << 3
                    | a(0) << 4
                    | p(2, -1) << 5
                    | p(1, -1) << 6
                    | p(0, -1) << 7
                    | p(-1, -1) << 8
                    | p(-2, -1) << 9
                    | a(1) << 10
                    | a(2) << 11
                    | p(1, -2) << 12
                    | p(0, -2) << 13
                    | p(-1, -2) << 14
                    | a(3) << 15
            },
            1 => {
                p(-1, 0)
                    | p(-2, 0) << 1
                    | p(-3, 0) << 2
                    | a(0) << 3
                    | p(2, -1) << 4
                    | p(1, -1) << 5
                    | p(0, -1) << 6
                    | p(-1, -1) << 7
                    | p(-2, -1) << 8
                    | p(2, -2) << 9
                    | p(1, -2) << 10
                    | p(0, -2) << 11
                    | p(-1, -2) << 12
            },
            2 => {
                p(-1, 0)
                    | p(-2, 0) << 1
                    | a(0) << 2
                    | p(1, -1) << 3
                    | p(0, -1) << 4
                    | p(-1, -1) << 5
                    | p(-2, -1) << 6
                    | p(1, -2) << 7
                    | p(0, -2) << 8
                    | p(-1, -2) << 9
            },
            _ => {
                p(-1, 0)
                    | p(-2, 0) << 1
                    | p(-3, 0) << 2
                    | p(-4, 0) << 3
                    | a(0) << 4
                    | p(1, -1) << 5
                    | p(0, -1) << 6
                    | p(-1, -1) << 7
                    | p(-2, -1) << 8
                    | p(-3, -1) << 9
            },
        };
        ctx as usize
    }
}

/// Rows updated by the last decode call, full width.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReplaceRect {
    /// Always 0.
    pub left: u32,
    /// First updated row.
    pub top: u32,
    /// Region width.
    pub right: u32,
    /// One past the last updated row.
    pub bottom: u32,
}

/// Decoder for one generic region.
///
/// The arithmetic decoder and context table belong to the caller and are
/// passed to every call, so a progressive decode resumes with exactly the
/// coder state it paused with. The decoder keeps the bitmap, the row
/// cursor and the typical prediction flag between calls.
#[derive(Debug, Clone)]
pub struct GenericRegionDecoder {
    params: GenericRegionParams,
    skip: Option<Image>,
    fast_path: bool,
    image: Option<Image>,
    line: u32,
    ltp: bool,
    status: DecodeStatus,
    replace_rect: ReplaceRect,
}

impl GenericRegionDecoder {
    /// Decoder for the region `params` describes.
    pub fn new(params: GenericRegionParams) -> Self {
        Self {
            params,
            skip: None,
            fast_path: true,
            image: None,
            line: 0,
            ltp: false,
            status: DecodeStatus::Ready,
            replace_rect: ReplaceRect::default(),
        }
    }

    /// Pixels set in `skip` decode as 0 without consuming data.
    pub fn with_skip(mut self, skip: Image) -> Self {
        self.skip = Some(skip);
        self
    }

    /// Allow or forbid the byte-wise row decoder. Output is the same
    /// either way.
    pub fn with_fast_path(mut self, enabled: bool) -> Self {
        self.fast_path = enabled;
        self
    }

    /// Region parameters.
    pub fn params(&self) -> &GenericRegionParams {
        &self.params
    }

    /// Status after the last call.
    pub fn status(&self) -> DecodeStatus {
        self.status
    }

    /// Rows touched by the last progressive call.
    pub fn replace_rect(&self) -> ReplaceRect {
        self.replace_rect
    }

    /// The bitmap decoded so far.
    pub fn image(&self) -> Option<&Image> {
        self.image.as_ref()
    }

    /// Take the bitmap out of the decoder.
    pub fn take_image(&mut self) -> Option<Image> {
        self.image.take()
    }

    fn uses_fast_path(&self) -> bool {
        self.fast_path && self.skip.is_none() && self.params.nominal_at()
    }

    fn check_contexts(&self, contexts: &[ArithCtx]) -> Result<()> {
        if contexts.len() < self.params.context_count() {
            return Err(Error::Jbig2(format!(
                "template {} needs {} contexts, got {}",
                self.params.template,
                self.params.context_count(),
                contexts.len()
            )));
        }
        Ok(())
    }

    /// Decode the whole region in one call.
    ///
    /// Regions with invalid dimensions produce an empty image. The status
    /// ends as `Finished` or `Error`.
    pub fn decode_arith(&mut self, arith: &mut ArithDecoder<'_>, contexts: &mut [ArithCtx]) -> Result<Image> {
        let result = self.decode_all_rows(arith, contexts);
        self.status = match result {
            Ok(_) => DecodeStatus::Finished,
            Err(_) => DecodeStatus::Error,
        };
        result
    }

    fn decode_all_rows(&mut self, arith: &mut ArithDecoder<'_>, contexts: &mut [ArithCtx]) -> Result<Image> {
        if self.params.mmr {
            return Err(Error::Unsupported("MMR-coded generic regions".to_string()));
        }
        if !is_valid_image_size(self.params.width, self.params.height) {
            log::debug!(
                "Generic region {}x{} out of range",
                self.params.width,
                self.params.height
            );
            return Ok(Image::default());
        }
        self.check_contexts(contexts)?;

        let mut image = Image::new(self.params.width, self.params.height);
        let mut ltp = false;
        for y in 0..self.params.height {
            self.decode_row(&mut image, y, &mut ltp, arith, contexts)?;
        }
        Ok(image)
    }

    /// Begin a progressive decode. Returns after the last row, on error,
    /// or when `pause` asks to yield.
    pub fn start_decode_arith(
        &mut self,
        arith: &mut ArithDecoder<'_>,
        contexts: &mut [ArithCtx],
        pause: Option<&dyn PauseIndicator>,
    ) -> DecodeStatus {
        if !is_valid_image_size(self.params.width, self.params.height) {
            self.status = DecodeStatus::Finished;
            return self.status;
        }
        if self.params.mmr || self.check_contexts(contexts).is_err() {
            log::warn!("Cannot decode generic region with {:?}", self.params);
            self.status = DecodeStatus::Error;
            return self.status;
        }
        let image = Image::new(self.params.width, self.params.height);
        if !image.has_data() {
            self.status = DecodeStatus::Error;
            return self.status;
        }
        self.image = Some(image);
        self.line = 0;
        self.ltp = false;
        self.status = DecodeStatus::Ready;
        self.progressive_decode(arith, contexts, pause)
    }

    /// Resume a paused decode. Any other state is returned unchanged.
    pub fn continue_decode(
        &mut self,
        arith: &mut ArithDecoder<'_>,
        contexts: &mut [ArithCtx],
        pause: Option<&dyn PauseIndicator>,
    ) -> DecodeStatus {
        if self.status != DecodeStatus::ToBeContinued {
            return self.status;
        }
        self.progressive_decode(arith, contexts, pause)
    }

    fn progressive_decode(
        &mut self,
        arith: &mut ArithDecoder<'_>,
        contexts: &mut [ArithCtx],
        pause: Option<&dyn PauseIndicator>,
    ) -> DecodeStatus {
        let Some(mut image) = self.image.take() else {
            self.status = DecodeStatus::Error;
            return self.status;
        };
        let top = self.line;
        let mut ltp = self.ltp;
        let mut status = DecodeStatus::Finished;
        while self.line < self.params.height {
            if let Err(e) = self.decode_row(&mut image, self.line, &mut ltp, arith, contexts) {
                log::warn!("Generic region decode failed: {}", e);
                status = DecodeStatus::Error;
                break;
            }
            self.line += 1;
            if self.line < self.params.height && pause.is_some_and(|p| p.need_to_pause_now()) {
                status = DecodeStatus::ToBeContinued;
                break;
            }
        }
        self.ltp = ltp;
        self.replace_rect = ReplaceRect {
            left: 0,
            top,
            right: image.width(),
            bottom: self.line,
        };
        log::trace!("Generic region rows {}..{} -> {:?}", top, self.line, status);
        if status == DecodeStatus::Finished {
            self.line = 0;
        }
        self.image = Some(image);
        self.status = status;
        status
    }

    fn decode_row(
        &self,
        image: &mut Image,
        y: u32,
        ltp: &mut bool,
        arith: &mut ArithDecoder<'_>,
        contexts: &mut [ArithCtx],
    ) -> Result<()> {
        if self.params.tpgdon {
            let bit = decode_bit(arith, contexts, self.params.tp_context())?;
            *ltp ^= bit != 0;
            if *ltp {
                image.copy_line(y, y.checked_sub(1));
                return Ok(());
            }
        }
        if self.uses_fast_path() {
            if self.params.template == 3 {
                decode_row_template3(image, y, arith, contexts)
            } else {
                decode_row_template012(self.params.template as usize, image, y, arith, contexts)
            }
        } else {
            self.decode_row_per_pixel(image, y, arith, contexts)
        }
    }

    fn decode_row_per_pixel(
        &self,
        image: &mut Image,
        y: u32,
        arith: &mut ArithDecoder<'_>,
        contexts: &mut [ArithCtx],
    ) -> Result<()> {
        let y = y as i32;
        for x in 0..self.params.width as i32 {
            if self.skip.as_ref().is_some_and(|skip| skip.get_pixel(x, y) != 0) {
                continue;
            }
            let ctx = self.params.context_at(image, x, y);
            if decode_bit(arith, contexts, ctx)? != 0 {
                image.set_pixel(x, y, 1);
            }
        }
        Ok(())
    }
}

fn decode_bit(arith: &mut ArithDecoder<'_>, contexts: &mut [ArithCtx], ctx: usize) -> Result<u32> {
    if arith.is_complete() {
        return Err(Error::Jbig2("arithmetic data exhausted".to_string()));
    }
    Ok(arith.decode(&mut contexts[ctx]))
}

fn row_geometry(image: &Image) -> (usize, u32) {
    let width = image.width();
    let line_bytes = ((width + 7) >> 3) as usize - 1;
    let bits_left = width - (line_bytes as u32) * 8;
    (line_bytes, bits_left)
}

fn decode_row_template012(
    t: usize,
    image: &mut Image,
    y: u32,
    arith: &mut ArithDecoder<'_>,
    contexts: &mut [ArithCtx],
) -> Result<()> {
    let (line_bytes, bits_left) = row_geometry(image);
    let (prev2, prev1, row) = image.rows_for_decode(y);

    if y < 2 {
        let second_line = y == 1;
        let mut prev = if second_line { u32::from(prev1[0]) } else { 0 };
        let mut ctx = (prev >> PREV1_SHIFT[t]) & PREV1_CONTEXT_MASK[t];
        for cc in 0..line_bytes {
            if second_line {
                prev = (prev << 8) | u32::from(prev1[cc + 1]);
            }
            let mut byte = 0u8;
            for k in (0..8).rev() {
                let bit = decode_bit(arith, contexts, ctx as usize)?;
                byte |= (bit as u8) << k;
                ctx = ((ctx & CONTEXT_MASK[t]) << 1) | bit | ((prev >> (k + PREV1_SHIFT[t])) & PREV1_BIT_MASK[t]);
            }
            row[cc] = byte;
        }
        prev <<= 8;
        let mut byte = 0u8;
        for k in 0..bits_left {
            let bit = decode_bit(arith, contexts, ctx as usize)?;
            byte |= (bit as u8) << (7 - k);
            ctx = ((ctx & CONTEXT_MASK[t]) << 1)
                | bit
                | ((prev >> (7 + PREV1_SHIFT[t] - k)) & PREV1_BIT_MASK[t]);
        }
        row[line_bytes] = byte;
        return Ok(());
    }

    let mut above2 = u32::from(prev2[0]) << PREV2_SHIFT[t];
    let mut above1 = u32::from(prev1[0]);
    let mut ctx = (above2 & PREV2_CONTEXT_MASK[t]) | ((above1 >> PREV1_SHIFT[t]) & PREV1_CONTEXT_MASK[t]);
    for cc in 0..line_bytes {
        above2 = (above2 << 8) | (u32::from(prev2[cc + 1]) << PREV2_SHIFT[t]);
        above1 = (above1 << 8) | u32::from(prev1[cc + 1]);
        let mut byte = 0u8;
        for k in (0..8).rev() {
            let bit = decode_bit(arith, contexts, ctx as usize)?;
            byte |= (bit as u8) << k;
            ctx = ((ctx & CONTEXT_MASK[t]) << 1)
                | bit
                | ((above2 >> k) & PREV2_BIT_MASK[t])
                | ((above1 >> (k + PREV1_SHIFT[t])) & PREV1_BIT_MASK[t]);
        }
        row[cc] = byte;
    }
    above2 <<= 8;
    above1 <<= 8;
    let mut byte = 0u8;
    for k in 0..bits_left {
        let bit = decode_bit(arith, contexts, ctx as usize)?;
        byte |= (bit as u8) << (7 - k);
        ctx = ((ctx & CONTEXT_MASK[t]) << 1)
            | bit
            | ((above2 >> (7 - k)) & PREV2_BIT_MASK[t])
            | ((above1 >> (7 + PREV1_SHIFT[t] - k)) & PREV1_BIT_MASK[t]);
    }
    row[line_bytes] = byte;
    Ok(())
}

fn decode_row_template3(
    image: &mut Image,
    y: u32,
    arith: &mut ArithDecoder<'_>,
    contexts: &mut [ArithCtx],
) -> Result<()> {
    let (line_bytes, bits_left) = row_geometry(image);
    let (_, prev1, row) = image.rows_for_decode(y);

    if y == 0 {
        let mut ctx = 0u32;
        for cc in 0..line_bytes {
            let mut byte = 0u8;
            for k in (0..8).rev() {
                let bit = decode_bit(arith, contexts, ctx as usize)?;
                byte |= (bit as u8) << k;
                ctx = ((ctx & 0x01f7) << 1) | bit;
            }
            row[cc] = byte;
        }
        let mut byte = 0u8;
        for k in 0..bits_left {
            let bit = decode_bit(arith, contexts, ctx as usize)?;
            byte |= (bit as u8) << (7 - k);
            ctx = ((ctx & 0x01f7) << 1) | bit;
        }
        row[line_bytes] = byte;
        return Ok(());
    }

    let mut above = u32::from(prev1[0]);
    let mut ctx = (above >> 1) & 0x03f0;
    for cc in 0..line_bytes {
        above = (above << 8) | u32::from(prev1[cc + 1]);
        let mut byte = 0u8;
        for k in (0..8).rev() {
            let bit = decode_bit(arith, contexts, ctx as usize)?;
            byte |= (bit as u8) << k;
            ctx = ((ctx & 0x01f7) << 1) | bit | ((above >> (k + 1)) & 0x0010);
        }
        row[cc] = byte;
    }
    above <<= 8;
    let mut byte = 0u8;
    for k in 0..bits_left {
        let bit = decode_bit(arith, contexts, ctx as usize)?;
        byte |= (bit as u8) << (7 - k);
        ctx = ((ctx & 0x01f7) << 1) | bit | ((above >> (8 - k)) & 0x0010);
    }
    row[line_bytes] = byte;
    Ok(())
}
