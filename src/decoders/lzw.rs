//! LZWDecode via the weezl crate.
//!
//! PDF LZW uses MSB-first codes starting at 9 bits and, by default, switches
//! code width one code early (`/EarlyChange 1`), which is the TIFF variant.

use weezl::{decode::Decoder as WeezlDecoder, BitOrder, LzwStatus};

use crate::decoders::StreamDecoder;
use crate::error::{Error, Result};

/// LZWDecode filter implementation.
pub struct LzwDecoder;

impl StreamDecoder for LzwDecoder {
    fn decode(&self, input: &[u8]) -> Result<Vec<u8>> {
        let mut decoder = WeezlDecoder::with_tiff_size_switch(BitOrder::Msb, 8);
        let mut output = Vec::new();
        let result = decoder.into_vec(&mut output).decode(input);
        match result.status {
            Ok(LzwStatus::Ok) | Ok(LzwStatus::Done) | Ok(LzwStatus::NoProgress) => Ok(output),
            Err(e) if !output.is_empty() => {
                log::warn!("LZWDecode recovered {} bytes before error: {:?}", output.len(), e);
                Ok(output)
            },
            Err(e) => Err(Error::Decode(format!("LZWDecode error: {:?}", e))),
        }
    }

    fn name(&self) -> &str {
        "LZWDecode"
    }
}
