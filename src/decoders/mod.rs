//! Stream filters.
//!
//! Decoders for the filters a saved document needs to read back:
//! - FlateDecode (zlib/deflate), also used to compress new streams
//! - ASCIIHexDecode and ASCII85Decode
//! - LZWDecode
//! - RunLengthDecode
//!
//! Filters are applied in the order the stream's `/Filter` array names them,
//! each with its matching `/DecodeParms` entry. Image codecs (DCT, CCITT,
//! JPX, JBIG2 streams) are not handled here and report `UnsupportedFilter`.

use crate::config::ParserOptions;
use crate::error::{Error, Result};
use crate::object::{Dictionary, Object};

mod ascii;
mod flate;
mod lzw;
mod predictor;
mod runlength;

pub use ascii::{Ascii85Decoder, AsciiHexDecoder};
pub use flate::{flate_encode, FlateDecoder};
pub use lzw::LzwDecoder;
pub use predictor::{decode_predictor, DecodeParams};
pub use runlength::RunLengthDecoder;

/// Trait for PDF stream decoders.
pub trait StreamDecoder {
    /// Decode the input data.
    fn decode(&self, input: &[u8]) -> Result<Vec<u8>>;

    /// Filter name, e.g. `FlateDecode`.
    fn name(&self) -> &str;
}

fn decoder_for(name: &str) -> Option<Box<dyn StreamDecoder>> {
    let decoder: Box<dyn StreamDecoder> = match name {
        "FlateDecode" | "Fl" => Box::new(FlateDecoder),
        "ASCIIHexDecode" | "AHx" => Box::new(AsciiHexDecoder),
        "ASCII85Decode" | "A85" => Box::new(Ascii85Decoder),
        "LZWDecode" | "LZW" => Box::new(LzwDecoder),
        "RunLengthDecode" | "RL" => Box::new(RunLengthDecoder),
        _ => return None,
    };
    Some(decoder)
}

/// Filter names and their parameter dictionaries, in application order.
pub fn filter_chain(dict: &Dictionary) -> Vec<(String, Option<DecodeParams>)> {
    let names: Vec<String> = match dict.get("Filter") {
        Some(Object::Name(name)) => vec![name],
        Some(Object::Array(arr)) => arr.to_vec().iter().filter_map(|o| o.as_name().map(String::from)).collect(),
        _ => Vec::new(),
    };
    let params: Vec<Option<DecodeParams>> = match dict.get("DecodeParms") {
        Some(Object::Dictionary(d)) => vec![Some(DecodeParams::from_dict(&d))],
        Some(Object::Array(arr)) => arr
            .to_vec()
            .iter()
            .map(|o| o.as_dict().map(DecodeParams::from_dict))
            .collect(),
        _ => Vec::new(),
    };
    names
        .into_iter()
        .enumerate()
        .map(|(i, name)| (name, params.get(i).cloned().flatten()))
        .collect()
}

/// Decode stream data according to the filters named in `dict`.
pub fn decode_stream(dict: &Dictionary, data: &[u8]) -> Result<Vec<u8>> {
    decode_stream_with_options(dict, data, &ParserOptions::default())
}

/// Decode stream data, enforcing the decompressed size limit in `options`.
pub fn decode_stream_with_options(dict: &Dictionary, data: &[u8], options: &ParserOptions) -> Result<Vec<u8>> {
    let mut current = data.to_vec();
    for (name, params) in filter_chain(dict) {
        let decoder = decoder_for(&name).ok_or_else(|| Error::UnsupportedFilter(name.clone()))?;
        current = decoder.decode(&current)?;
        if let Some(params) = params.filter(|p| p.predictor > 1) {
            current = decode_predictor(&current, &params)?;
        }
        if !options.allows_decompressed_size(current.len()) {
            return Err(Error::Decode(format!(
                "decompressed size {} bytes exceeds limit {} bytes",
                current.len(),
                options.max_decompressed_size
            )));
        }
    }
    Ok(current)
}
