//! One-bit-per-pixel bitmaps.

/// Largest pixel count an [`Image`] may hold.
const MAX_IMAGE_PIXELS: u64 = (i32::MAX - 31) as u64;

/// Largest offset accepted by [`Image::compose_to`].
const MAX_COMPOSE_OFFSET: i64 = 1 << 20;

/// How source pixels combine with destination pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub enum ComposeOp {
    /// `dst | src`
    Or,
    /// `dst & src`
    And,
    /// `dst ^ src`
    Xor,
    /// `!(dst ^ src)`
    Xnor,
    /// `src`
    Replace,
}

impl ComposeOp {
    /// Operator for a combination code as stored in region segment flags.
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(ComposeOp::Or),
            1 => Some(ComposeOp::And),
            2 => Some(ComposeOp::Xor),
            3 => Some(ComposeOp::Xnor),
            4 => Some(ComposeOp::Replace),
            _ => None,
        }
    }

    fn apply(self, src: u8, dst: u8) -> u8 {
        match self {
            ComposeOp::Or => src | dst,
            ComposeOp::And => src & dst,
            ComposeOp::Xor => src ^ dst,
            ComposeOp::Xnor => 1 - (src ^ dst),
            ComposeOp::Replace => src,
        }
    }
}

/// Monochrome bitmap, MSB first, rows padded to a 32-bit boundary.
///
/// A 1 bit is a black pixel. Padding bits past the width stay zero.
/// Construction never fails: invalid or oversized dimensions produce an
/// empty image, so check [`has_data`](Self::has_data) before use.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Image {
    width: u32,
    height: u32,
    stride: usize,
    data: Vec<u8>,
}

impl Image {
    /// A zero-filled `width` x `height` image.
    pub fn new(width: u32, height: u32) -> Self {
        if width == 0 || height == 0 || u64::from(width) > MAX_IMAGE_PIXELS {
            return Self::default();
        }
        let stride_pixels = (u64::from(width) + 31) & !31;
        if u64::from(height) > MAX_IMAGE_PIXELS / stride_pixels {
            log::debug!("Rejecting {}x{} bitmap", width, height);
            return Self::default();
        }
        let stride = (stride_pixels / 8) as usize;
        Self {
            width,
            height,
            stride,
            data: vec![0; stride * height as usize],
        }
    }

    /// Width in pixels.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Height in pixels.
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Bytes per row.
    pub fn stride(&self) -> usize {
        self.stride
    }

    /// False for the empty image produced by rejected dimensions.
    pub fn has_data(&self) -> bool {
        !self.data.is_empty()
    }

    /// All rows, including padding.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Pixel at (`x`, `y`); anything outside the image reads as 0.
    #[inline]
    pub fn get_pixel(&self, x: i32, y: i32) -> u8 {
        if x < 0 || y < 0 || x as u32 >= self.width || y as u32 >= self.height {
            return 0;
        }
        let byte = self.data[y as usize * self.stride + (x as usize >> 3)];
        (byte >> (7 - (x & 7))) & 1
    }

    /// Set the pixel at (`x`, `y`); writes outside the image are dropped.
    #[inline]
    pub fn set_pixel(&mut self, x: i32, y: i32, value: u8) {
        if x < 0 || y < 0 || x as u32 >= self.width || y as u32 >= self.height {
            return;
        }
        let idx = y as usize * self.stride + (x as usize >> 3);
        let mask = 0x80u8 >> (x & 7);
        if value != 0 {
            self.data[idx] |= mask;
        } else {
            self.data[idx] &= !mask;
        }
    }

    /// Row `y`, or `None` when it does not exist.
    pub fn line(&self, y: i32) -> Option<&[u8]> {
        if y < 0 || y as u32 >= self.height {
            return None;
        }
        let start = y as usize * self.stride;
        Some(&self.data[start..start + self.stride])
    }

    /// Mutable row `y`, or `None` when it does not exist.
    pub fn line_mut(&mut self, y: i32) -> Option<&mut [u8]> {
        if y < 0 || y as u32 >= self.height {
            return None;
        }
        let start = y as usize * self.stride;
        Some(&mut self.data[start..start + self.stride])
    }

    /// Rows `y - 2` and `y - 1` (empty when absent) and row `y` mutably.
    pub(crate) fn rows_for_decode(&mut self, y: u32) -> (&[u8], &[u8], &mut [u8]) {
        let stride = self.stride;
        let start = y as usize * stride;
        let (above, rest) = self.data.split_at_mut(start);
        let above: &[u8] = above;
        let current = &mut rest[..stride];
        let prev1 = if y >= 1 { &above[start - stride..] } else { &above[..0] };
        let prev2 = if y >= 2 {
            &above[start - 2 * stride..start - stride]
        } else {
            &above[..0]
        };
        (prev2, prev1, current)
    }

    /// Copy row `src` over row `dst`; a missing source zero-fills.
    pub fn copy_line(&mut self, dst: u32, src: Option<u32>) {
        let stride = self.stride;
        let dst_start = dst as usize * stride;
        if dst >= self.height {
            return;
        }
        match src.filter(|s| *s < self.height) {
            Some(s) => {
                let src_start = s as usize * stride;
                self.data.copy_within(src_start..src_start + stride, dst_start);
            },
            None => self.data[dst_start..dst_start + stride].fill(0),
        }
    }

    /// Set every pixel to `value`.
    pub fn fill(&mut self, value: bool) {
        if !value {
            self.data.fill(0);
            return;
        }
        self.data.fill(0xFF);
        self.clear_padding();
    }

    fn clear_padding(&mut self) {
        let tail = self.width as usize % 8;
        let full = self.width as usize / 8;
        for row in self.data.chunks_mut(self.stride.max(1)) {
            let mut start = full;
            if tail != 0 {
                row[full] &= 0xFFu8 << (8 - tail);
                start += 1;
            }
            row[start..].fill(0);
        }
    }

    /// Combine this image into `dst` with its top-left corner at (`x`, `y`).
    ///
    /// Pixels falling outside `dst` are skipped individually. Returns false
    /// when either image is empty or the offset is absurdly large.
    pub fn compose_to(&self, dst: &mut Image, x: i64, y: i64, op: ComposeOp) -> bool {
        if !self.has_data() || !dst.has_data() {
            return false;
        }
        if x.abs() > MAX_COMPOSE_OFFSET || y.abs() > MAX_COMPOSE_OFFSET {
            log::warn!("Compose offset ({}, {}) out of range", x, y);
            return false;
        }
        let x0 = x.max(0);
        let y0 = y.max(0);
        let x1 = (x + i64::from(self.width)).min(i64::from(dst.width));
        let y1 = (y + i64::from(self.height)).min(i64::from(dst.height));
        for dy in y0..y1 {
            for dx in x0..x1 {
                let src = self.get_pixel((dx - x) as i32, (dy - y) as i32);
                let old = dst.get_pixel(dx as i32, dy as i32);
                dst.set_pixel(dx as i32, dy as i32, op.apply(src, old));
            }
        }
        true
    }

    /// Copy of the `width` x `height` area at (`x`, `y`); outside pixels read as 0.
    pub fn sub_image(&self, x: i32, y: i32, width: u32, height: u32) -> Image {
        let mut out = Image::new(width, height);
        if !out.has_data() || !self.has_data() {
            return out;
        }
        for row in 0..height as i32 {
            for col in 0..width as i32 {
                if self.get_pixel(x + col, y + row) != 0 {
                    out.set_pixel(col, row, 1);
                }
            }
        }
        out
    }

    /// Grow to `height` rows, filling new rows with `value`.
    pub fn expand(&mut self, height: u32, value: bool) {
        if !self.has_data() || height <= self.height {
            return;
        }
        if u64::from(height) > MAX_IMAGE_PIXELS / (self.stride as u64 * 8) {
            log::warn!("Cannot expand bitmap to {} rows", height);
            return;
        }
        let old_len = self.data.len();
        self.data.resize(self.stride * height as usize, 0);
        if value {
            let mut grown = Image {
                width: self.width,
                height: height - self.height,
                stride: self.stride,
                data: vec![0; self.data.len() - old_len],
            };
            grown.fill(true);
            self.data[old_len..].copy_from_slice(&grown.data);
        }
        self.height = height;
    }

    /// Number of black pixels.
    pub fn count_ones(&self) -> usize {
        self.data.iter().map(|b| b.count_ones() as usize).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stride_is_word_aligned() {
        assert_eq!(Image::new(1, 1).stride(), 4);
        assert_eq!(Image::new(32, 1).stride(), 4);
        assert_eq!(Image::new(33, 2).stride(), 8);
        assert_eq!(Image::new(33, 2).data().len(), 16);
    }

    #[test]
    fn test_invalid_sizes_are_empty() {
        assert!(!Image::new(0, 10).has_data());
        assert!(!Image::new(10, 0).has_data());
        assert!(!Image::new(65536, 65536).has_data());
        assert!(Image::new(65535, 16).has_data());
    }

    #[test]
    fn test_pixels() {
        let mut image = Image::new(10, 3);
        image.set_pixel(9, 2, 1);
        image.set_pixel(10, 2, 1);
        image.set_pixel(-1, 0, 1);
        assert_eq!(image.get_pixel(9, 2), 1);
        assert_eq!(image.get_pixel(10, 2), 0);
        assert_eq!(image.get_pixel(-1, 0), 0);
        assert_eq!(image.line(2).unwrap()[1], 0x40);
        assert_eq!(image.count_ones(), 1);
        image.set_pixel(9, 2, 0);
        assert_eq!(image.count_ones(), 0);
    }

    #[test]
    fn test_fill_keeps_padding_clear() {
        let mut image = Image::new(10, 2);
        image.fill(true);
        assert_eq!(image.line(0).unwrap(), &[0xFF, 0xC0, 0, 0]);
        assert_eq!(image.count_ones(), 20);
    }

    #[test]
    fn test_copy_line() {
        let mut image = Image::new(8, 3);
        image.line_mut(0).unwrap()[0] = 0xA5;
        image.copy_line(1, Some(0));
        assert_eq!(image.line(1).unwrap()[0], 0xA5);
        image.copy_line(1, None);
        assert_eq!(image.line(1).unwrap()[0], 0);
        image.copy_line(2, Some(7));
        assert_eq!(image.line(2).unwrap()[0], 0);
    }

    #[test]
    fn test_compose_ops() {
        let mut src = Image::new(2, 1);
        src.set_pixel(0, 0, 1);
        for (op, expected) in [
            (ComposeOp::Or, [1, 1]),
            (ComposeOp::And, [1, 0]),
            (ComposeOp::Xor, [0, 1]),
            (ComposeOp::Xnor, [1, 0]),
            (ComposeOp::Replace, [1, 0]),
        ] {
            let mut dst = Image::new(2, 1);
            dst.fill(true);
            assert!(src.compose_to(&mut dst, 0, 0, op));
            assert_eq!([dst.get_pixel(0, 0), dst.get_pixel(1, 0)], expected, "{:?}", op);
        }
    }

    #[test]
    fn test_compose_clips_per_pixel() {
        let mut src = Image::new(4, 4);
        src.fill(true);
        let mut dst = Image::new(4, 4);
        assert!(src.compose_to(&mut dst, -2, 3, ComposeOp::Or));
        assert_eq!(dst.count_ones(), 2);
        assert_eq!(dst.get_pixel(0, 3), 1);
        assert_eq!(dst.get_pixel(1, 3), 1);
        assert!(!src.compose_to(&mut dst, 1 << 21, 0, ComposeOp::Or));
    }

    #[test]
    fn test_sub_image_and_expand() {
        let mut image = Image::new(16, 4);
        image.set_pixel(5, 1, 1);
        image.set_pixel(15, 3, 1);
        let sub = image.sub_image(4, 1, 3, 5);
        assert_eq!(sub.get_pixel(1, 0), 1);
        assert_eq!(sub.count_ones(), 1);
        assert_eq!(sub.line(0).unwrap()[0] & 0x1F, 0);

        image.expand(6, true);
        assert_eq!(image.height(), 6);
        assert_eq!(image.count_ones(), 2 + 32);
        image.expand(2, false);
        assert_eq!(image.height(), 6);
    }

    #[test]
    fn test_rows_for_decode() {
        let mut image = Image::new(8, 3);
        image.line_mut(0).unwrap()[0] = 1;
        image.line_mut(1).unwrap()[0] = 2;
        let (prev2, prev1, current) = image.rows_for_decode(2);
        assert_eq!(prev2[0], 1);
        assert_eq!(prev1[0], 2);
        assert_eq!(current.len(), 4);
        let (prev2, prev1, _) = image.rows_for_decode(0);
        assert!(prev2.is_empty() && prev1.is_empty());
    }
}
