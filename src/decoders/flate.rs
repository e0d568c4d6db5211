//! FlateDecode (zlib/deflate).
//!
//! Decoding tries flate2's zlib reader first and falls back to raw deflate,
//! the `inflate` crate and `libflate` for streams with damaged headers or
//! checksums. Whatever was recovered before a mid-stream error is kept.

use std::io::{Read, Write};

use flate2::read::{DeflateDecoder, ZlibDecoder};
use flate2::write::ZlibEncoder;
use flate2::Compression;
use inflate::inflate_bytes_zlib;
use libflate::zlib::Decoder as LibflateDecoder;

use crate::decoders::StreamDecoder;
use crate::error::{Error, Result};

/// FlateDecode filter implementation.
pub struct FlateDecoder;

fn read_partial(mut reader: impl Read, what: &str) -> Option<Vec<u8>> {
    let mut output = Vec::new();
    match reader.read_to_end(&mut output) {
        Ok(_) => Some(output),
        Err(e) if !output.is_empty() => {
            log::warn!("{} recovered {} bytes before corruption: {}", what, output.len(), e);
            Some(output)
        },
        Err(_) => None,
    }
}

impl StreamDecoder for FlateDecoder {
    fn decode(&self, input: &[u8]) -> Result<Vec<u8>> {
        if let Some(output) = read_partial(ZlibDecoder::new(input), "zlib") {
            return Ok(output);
        }

        log::info!("Zlib decode failed, trying raw deflate");
        if let Some(output) = read_partial(DeflateDecoder::new(input), "raw deflate") {
            return Ok(output);
        }
        if input.len() > 2 {
            if let Some(output) = read_partial(DeflateDecoder::new(&input[2..]), "deflate after header") {
                return Ok(output);
            }
        }

        match inflate_bytes_zlib(input) {
            Ok(data) => return Ok(data),
            Err(e) => log::info!("inflate crate failed: {}", e),
        }

        if let Ok(decoder) = LibflateDecoder::new(input) {
            if let Some(output) = read_partial(decoder, "libflate").filter(|o| !o.is_empty()) {
                return Ok(output);
            }
        }

        Err(Error::Decode("FlateDecode: all decompression strategies failed".to_string()))
    }

    fn name(&self) -> &str {
        "FlateDecode"
    }
}

/// Compress `data` with zlib at the default level.
pub fn flate_encode(data: &[u8]) -> Result<Vec<u8>> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data)?;
    Ok(encoder.finish()?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip() {
        let original = b"BT /F1 12 Tf (Hello) Tj ET".repeat(20);
        let compressed = flate_encode(&original).unwrap();
        assert!(compressed.len() < original.len());
        assert_eq!(FlateDecoder.decode(&compressed).unwrap(), original);
    }

    #[test]
    fn test_truncated_stream_keeps_prefix() {
        let original: Vec<u8> = (0..4000u32).map(|i| (i * 7 % 251) as u8).collect();
        let compressed = flate_encode(&original).unwrap();
        let truncated = &compressed[..compressed.len() - 4];
        let decoded = FlateDecoder.decode(truncated).unwrap();
        assert!(!decoded.is_empty());
        assert_eq!(&original[..decoded.len()], &decoded[..]);
    }

    #[test]
    fn test_raw_deflate_fallback() {
        let mut encoder = flate2::write::DeflateEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(b"raw deflate body").unwrap();
        let raw = encoder.finish().unwrap();
        assert_eq!(FlateDecoder.decode(&raw).unwrap(), b"raw deflate body");
    }

    #[test]
    fn test_garbage_fails() {
        assert!(FlateDecoder.decode(&[0xFF; 8]).is_err());
    }
}
