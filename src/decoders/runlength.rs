//! RunLengthDecode.
//!
//! A length byte `n` below 128 copies the next `n + 1` bytes, above 128
//! repeats the next byte `257 - n` times, and 128 ends the data.

use crate::decoders::StreamDecoder;
use crate::error::{Error, Result};

/// RunLengthDecode filter implementation.
pub struct RunLengthDecoder;

impl StreamDecoder for RunLengthDecoder {
    fn decode(&self, input: &[u8]) -> Result<Vec<u8>> {
        let mut output = Vec::new();
        let mut rest = input;
        while let Some((&length, tail)) = rest.split_first() {
            match length {
                0..=127 => {
                    let count = length as usize + 1;
                    let literal = tail
                        .get(..count)
                        .ok_or_else(|| Error::Decode("RunLengthDecode: truncated literal run".to_string()))?;
                    output.extend_from_slice(literal);
                    rest = &tail[count..];
                },
                128 => break,
                _ => {
                    let (&byte, tail) = tail
                        .split_first()
                        .ok_or_else(|| Error::Decode("RunLengthDecode: missing byte for run".to_string()))?;
                    output.resize(output.len() + 257 - length as usize, byte);
                    rest = tail;
                },
            }
        }
        Ok(output)
    }

    fn name(&self) -> &str {
        "RunLengthDecode"
    }
}
