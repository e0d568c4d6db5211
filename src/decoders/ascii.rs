//! ASCIIHexDecode and ASCII85Decode.

use crate::decoders::StreamDecoder;
use crate::error::{Error, Result};
use crate::lexer::is_whitespace;

/// ASCIIHexDecode filter implementation.
///
/// Whitespace is ignored, `>` ends the data and an odd final digit is
/// treated as if followed by `0`.
pub struct AsciiHexDecoder;

impl StreamDecoder for AsciiHexDecoder {
    fn decode(&self, input: &[u8]) -> Result<Vec<u8>> {
        let mut output = Vec::with_capacity(input.len() / 2);
        let mut high: Option<u8> = None;
        for &c in input {
            if c == b'>' {
                break;
            }
            if is_whitespace(c) {
                continue;
            }
            let digit = (c as char)
                .to_digit(16)
                .ok_or_else(|| Error::Decode(format!("ASCIIHexDecode: invalid character '{}'", c as char)))?
                as u8;
            match high.take() {
                Some(h) => output.push((h << 4) | digit),
                None => high = Some(digit),
            }
        }
        if let Some(h) = high {
            output.push(h << 4);
        }
        Ok(output)
    }

    fn name(&self) -> &str {
        "ASCIIHexDecode"
    }
}

/// ASCII85Decode filter implementation.
///
/// Groups of five characters in `!`..=`u` encode four bytes; `z` stands
/// for four zero bytes and `~>` ends the data.
pub struct Ascii85Decoder;

impl StreamDecoder for Ascii85Decoder {
    fn decode(&self, input: &[u8]) -> Result<Vec<u8>> {
        let mut output = Vec::with_capacity(input.len() * 4 / 5);
        let mut group = [0u8; 5];
        let mut count = 0;

        for &c in input {
            match c {
                b'~' => break,
                b'z' if count == 0 => output.extend_from_slice(&[0; 4]),
                b'z' => return Err(Error::Decode("ASCII85Decode: 'z' inside a group".to_string())),
                b'!'..=b'u' => {
                    group[count] = c - b'!';
                    count += 1;
                    if count == 5 {
                        output.extend_from_slice(&group_value(&group)?.to_be_bytes());
                        count = 0;
                    }
                },
                _ if is_whitespace(c) => {},
                _ => return Err(Error::Decode(format!("ASCII85Decode: invalid character '{}'", c as char))),
            }
        }

        match count {
            0 => {},
            1 => return Err(Error::Decode("ASCII85Decode: dangling single character".to_string())),
            n => {
                // Pad with 'u' and keep n - 1 bytes.
                group[n..].fill(84);
                output.extend_from_slice(&group_value(&group)?.to_be_bytes()[..n - 1]);
            },
        }
        Ok(output)
    }

    fn name(&self) -> &str {
        "ASCII85Decode"
    }
}

fn group_value(group: &[u8; 5]) -> Result<u32> {
    let value = group.iter().fold(0u64, |acc, d| acc * 85 + *d as u64);
    u32::try_from(value).map_err(|_| Error::Decode("ASCII85Decode: group overflow".to_string()))
}
