//! TIFF and PNG predictors applied after Flate or LZW decoding.

use crate::error::{Error, Result};
use crate::object::Dictionary;

/// Predictor parameters from a `/DecodeParms` dictionary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodeParams {
    /// Predictor algorithm (1 = none, 2 = TIFF, 10-15 = PNG)
    pub predictor: i64,
    /// Samples per row
    pub columns: usize,
    /// Color components per sample
    pub colors: usize,
    /// Bits per component
    pub bits_per_component: usize,
}

impl Default for DecodeParams {
    fn default() -> Self {
        Self {
            predictor: 1,
            columns: 1,
            colors: 1,
            bits_per_component: 8,
        }
    }
}

impl DecodeParams {
    /// Read the predictor entries of `dict`, defaulting missing ones.
    pub fn from_dict(dict: &Dictionary) -> Self {
        let get = |key: &str, default: i64| dict.get(key).and_then(|o| o.as_integer()).unwrap_or(default);
        Self {
            predictor: get("Predictor", 1),
            columns: get("Columns", 1).clamp(1, 1 << 20) as usize,
            colors: get("Colors", 1).clamp(1, 32) as usize,
            bits_per_component: get("BitsPerComponent", 8).clamp(1, 16) as usize,
        }
    }

    /// Bytes of sample data per row.
    pub fn row_bytes(&self) -> usize {
        (self.columns * self.colors * self.bits_per_component).div_ceil(8)
    }

    /// Bytes per complete pixel, at least one.
    pub fn pixel_bytes(&self) -> usize {
        (self.colors * self.bits_per_component).div_ceil(8)
    }
}

/// Undo the predictor described by `params`.
pub fn decode_predictor(data: &[u8], params: &DecodeParams) -> Result<Vec<u8>> {
    match params.predictor {
        1 => Ok(data.to_vec()),
        2 => Ok(decode_tiff(data, params)),
        10..=15 => decode_png(data, params),
        other => Err(Error::Decode(format!("Unsupported predictor: {}", other))),
    }
}

fn decode_tiff(data: &[u8], params: &DecodeParams) -> Vec<u8> {
    // Only 8-bit components are differenced; other depths pass through.
    if params.bits_per_component != 8 {
        return data.to_vec();
    }
    let mut output = data.to_vec();
    for row in output.chunks_mut(params.row_bytes()) {
        for i in params.colors..row.len() {
            row[i] = row[i].wrapping_add(row[i - params.colors]);
        }
    }
    output
}

fn decode_png(data: &[u8], params: &DecodeParams) -> Result<Vec<u8>> {
    let row_bytes = params.row_bytes();
    let bpp = params.pixel_bytes();
    let mut output = Vec::with_capacity(data.len());
    let mut prev = vec![0u8; row_bytes];

    for chunk in data.chunks(row_bytes + 1) {
        let (&tag, encoded) = chunk
            .split_first()
            .ok_or_else(|| Error::Decode("empty PNG predictor row".to_string()))?;
        let mut row = encoded.to_vec();
        // A short final row is decoded as far as it goes.
        row.resize(row_bytes, 0);
        for i in 0..row_bytes {
            let left = if i >= bpp { row[i - bpp] } else { 0 };
            let up = prev[i];
            let up_left = if i >= bpp { prev[i - bpp] } else { 0 };
            let predicted = match tag {
                0 => 0,
                1 => left,
                2 => up,
                3 => ((left as u16 + up as u16) / 2) as u8,
                4 => paeth(left, up, up_left),
                _ => return Err(Error::Decode(format!("Invalid PNG predictor tag: {}", tag))),
            };
            row[i] = row[i].wrapping_add(predicted);
        }
        output.extend_from_slice(&row[..encoded.len().min(row_bytes)]);
        prev = row;
    }
    Ok(output)
}

fn paeth(a: u8, b: u8, c: u8) -> u8 {
    let p = a as i16 + b as i16 - c as i16;
    let pa = (p - a as i16).abs();
    let pb = (p - b as i16).abs();
    let pc = (p - c as i16).abs();
    if pa <= pb && pa <= pc {
        a
    } else if pb <= pc {
        b
    } else {
        c
    }
}
