//! PDF object parser.
//!
//! Recursive descent over lexer tokens. Values inside arrays and
//! dictionaries are parsed by [`parse_object`]; a complete `N G obj ... endobj`
//! body, which is the only place a stream may appear, is parsed by
//! [`parse_indirect_object`].

use std::rc::Rc;

use nom::IResult;

use crate::error::{Error, Result};
use crate::holder::IndirectObjectHolder;
use crate::lexer::{is_whitespace, skip_ws, token, Token};
use crate::object::{Array, Dictionary, Object, ObjectRef, Stream};

/// Maximum container nesting accepted by the parser.
pub const MAX_NESTING_DEPTH: usize = 64;

/// Decode escape sequences in PDF literal strings.
///
/// Handles `\n \r \t \b \f \( \) \\`, one to three digit octal escapes and
/// line continuations. Unknown escapes keep the backslash.
///
/// ```
/// # use pdf_creator::parser::decode_literal_string_escapes;
/// assert_eq!(decode_literal_string_escapes(b"Section \\247"), b"Section \xa7");
/// ```
pub fn decode_literal_string_escapes(raw: &[u8]) -> Vec<u8> {
    let mut result = Vec::with_capacity(raw.len());
    let mut i = 0;

    while i < raw.len() {
        if raw[i] != b'\\' || i + 1 >= raw.len() {
            // An end-of-line inside the string is normalized to LF.
            if raw[i] == b'\r' {
                result.push(b'\n');
                if raw.get(i + 1) == Some(&b'\n') {
                    i += 1;
                }
            } else {
                result.push(raw[i]);
            }
            i += 1;
            continue;
        }
        let escaped = raw[i + 1];
        i += 2;
        match escaped {
            b'n' => result.push(b'\n'),
            b'r' => result.push(b'\r'),
            b't' => result.push(b'\t'),
            b'b' => result.push(8),
            b'f' => result.push(12),
            b'(' | b')' | b'\\' => result.push(escaped),
            b'\n' => {},
            b'\r' => {
                if raw.get(i) == Some(&b'\n') {
                    i += 1;
                }
            },
            b'0'..=b'7' => {
                let mut octal = (escaped - b'0') as u32;
                let mut digits = 1;
                while digits < 3 {
                    match raw.get(i) {
                        Some(d @ b'0'..=b'7') => {
                            octal = octal * 8 + (d - b'0') as u32;
                            i += 1;
                            digits += 1;
                        },
                        _ => break,
                    }
                }
                result.push((octal & 0xFF) as u8);
            },
            other => {
                result.push(b'\\');
                result.push(other);
            },
        }
    }

    result
}

/// Decode hex string digits. Whitespace is ignored and an odd final digit
/// is padded with `0`.
pub fn decode_hex(hex_bytes: &[u8]) -> Result<Vec<u8>> {
    let digits: Vec<u8> = hex_bytes.iter().copied().filter(|c| !is_whitespace(*c)).collect();
    let mut result = Vec::with_capacity(digits.len() / 2 + 1);
    for chunk in digits.chunks(2) {
        let hi = hex_value(chunk[0])?;
        let lo = match chunk.get(1) {
            Some(c) => hex_value(*c)?,
            None => 0,
        };
        result.push((hi << 4) | lo);
    }
    Ok(result)
}

fn hex_value(c: u8) -> Result<u8> {
    (c as char)
        .to_digit(16)
        .map(|d| d as u8)
        .ok_or_else(|| Error::ParseError {
            offset: 0,
            reason: format!("invalid hex digit {:?}", c as char),
        })
}

fn nom_error(input: &[u8], kind: nom::error::ErrorKind) -> nom::Err<nom::error::Error<&[u8]>> {
    nom::Err::Error(nom::error::Error::new(input, kind))
}

/// Parse a direct PDF object (no streams).
///
/// `N G R` sequences become references. Arrays and dictionaries that hit
/// the end of input are returned with what was read so far.
pub fn parse_object(input: &[u8]) -> IResult<&[u8], Object> {
    parse_object_at_depth(input, 0)
}

fn parse_object_at_depth(input: &[u8], depth: usize) -> IResult<&[u8], Object> {
    if depth > MAX_NESTING_DEPTH {
        return Err(nom_error(input, nom::error::ErrorKind::TooLarge));
    }
    let (rest, tok) = token(input)?;
    match tok {
        Token::Null => Ok((rest, Object::Null)),
        Token::True => Ok((rest, Object::Boolean(true))),
        Token::False => Ok((rest, Object::Boolean(false))),
        Token::Real(r) => Ok((rest, Object::Real(r))),
        Token::Name(n) => Ok((rest, Object::Name(n))),
        Token::LiteralString(raw) => Ok((rest, Object::String(decode_literal_string_escapes(raw)))),
        Token::HexString(raw) => match decode_hex(raw) {
            Ok(bytes) => Ok((rest, Object::String(bytes))),
            Err(_) => Err(nom_error(input, nom::error::ErrorKind::HexDigit)),
        },
        Token::Integer(i) => Ok(try_reference(rest, i).unwrap_or((rest, Object::Integer(i)))),
        Token::ArrayStart => parse_array(rest, depth),
        Token::DictStart => parse_dictionary(rest, depth),
        _ => Err(nom_error(input, nom::error::ErrorKind::Alt)),
    }
}

fn try_reference(input: &[u8], num: i64) -> Option<(&[u8], Object)> {
    let (rest, gen) = match token(input).ok()? {
        (rest, Token::Integer(gen)) => (rest, gen),
        _ => return None,
    };
    let (rest, r) = token(rest).ok()?;
    if !r.is_keyword(b"R") {
        return None;
    }
    let id = u32::try_from(num).ok()?;
    let gen = u16::try_from(gen).ok()?;
    Some((rest, Object::Reference(ObjectRef::new(id, gen))))
}

fn parse_array(input: &[u8], depth: usize) -> IResult<&[u8], Object> {
    let array = Array::new();
    let mut remaining = input;
    loop {
        let after_ws = skip_ws(remaining);
        if after_ws.is_empty() {
            break;
        }
        if let Ok((rest, Token::ArrayEnd)) = token(after_ws) {
            remaining = rest;
            break;
        }
        match parse_object_at_depth(after_ws, depth + 1) {
            Ok((rest, obj)) => {
                array.append(obj);
                remaining = rest;
            },
            Err(nom::Err::Error(e)) if e.code == nom::error::ErrorKind::TooLarge => {
                return Err(nom::Err::Error(e));
            },
            // Skip a token that does not start a value.
            Err(_) => match token(after_ws) {
                Ok((rest, _)) => remaining = rest,
                Err(_) => remaining = &after_ws[1..],
            },
        }
    }
    Ok((remaining, Object::Array(Rc::new(array))))
}

fn parse_dictionary(input: &[u8], depth: usize) -> IResult<&[u8], Object> {
    let dict = Dictionary::new();
    let mut remaining = input;
    loop {
        let after_ws = skip_ws(remaining);
        if after_ws.is_empty() {
            break;
        }
        let (rest, key) = match token(after_ws) {
            Ok((rest, Token::DictEnd)) => {
                remaining = rest;
                break;
            },
            Ok((rest, Token::Name(key))) => (rest, key),
            Ok((rest, _)) => {
                remaining = rest;
                continue;
            },
            Err(_) => {
                remaining = &after_ws[1..];
                continue;
            },
        };
        match parse_object_at_depth(rest, depth + 1) {
            Ok((rest, Object::Null)) => {
                // A null value is the same as an absent key.
                remaining = rest;
            },
            Ok((rest, value)) => {
                dict.set_for(key, value);
                remaining = rest;
            },
            Err(nom::Err::Error(e)) if e.code == nom::error::ErrorKind::TooLarge => {
                return Err(nom::Err::Error(e));
            },
            Err(_) => remaining = rest,
        }
    }
    Ok((remaining, Object::Dictionary(Rc::new(dict))))
}

/// Result of parsing one `N G obj ... endobj` body.
#[derive(Debug)]
pub struct ParsedIndirectObject {
    /// Object number and generation from the header
    pub reference: ObjectRef,
    /// The object value
    pub object: Object,
    /// Bytes consumed from the start of the input
    pub consumed: usize,
}

/// Parse an indirect object body at the start of `input`.
///
/// A stream `/Length` given as a reference is resolved through `holder`.
/// When the declared length does not land on `endstream`, the data is
/// delimited by searching for the keyword instead.
pub fn parse_indirect_object(
    input: &[u8],
    holder: Option<&dyn IndirectObjectHolder>,
) -> Result<ParsedIndirectObject> {
    let err = |reason: &str, at: &[u8]| Error::ParseError {
        offset: input.len() - at.len(),
        reason: reason.to_string(),
    };

    let (rest, num) = match token(input) {
        Ok((rest, Token::Integer(n))) if n >= 0 => (rest, n),
        _ => return Err(err("expected object number", input)),
    };
    let (rest, gen) = match token(rest) {
        Ok((rest, Token::Integer(g))) if g >= 0 => (rest, g),
        _ => return Err(err("expected generation number", rest)),
    };
    let rest = match token(rest) {
        Ok((rest, tok)) if tok.is_keyword(b"obj") => rest,
        _ => return Err(err("expected 'obj' keyword", rest)),
    };
    let reference = ObjectRef::new(
        u32::try_from(num).map_err(|_| err("object number out of range", input))?,
        u16::try_from(gen).map_err(|_| err("generation out of range", input))?,
    );

    let (mut rest, mut object) = parse_object(rest).map_err(|_| err("malformed object value", rest))?;

    if let Object::Dictionary(dict) = &object {
        let after = skip_ws(rest);
        if let Ok((data_start, tok)) = token(after) {
            if tok.is_keyword(b"stream") {
                let (after_stream, data) = read_stream_data(data_start, dict, holder)
                    .ok_or_else(|| err("unterminated stream", data_start))?;
                object = Object::Stream(Rc::new(Stream::new(Rc::clone(dict), data)));
                rest = after_stream;
            }
        }
    }

    let after = skip_ws(rest);
    if let Ok((after_end, tok)) = token(after) {
        if tok.is_keyword(b"endobj") {
            rest = after_end;
        }
    }

    Ok(ParsedIndirectObject {
        reference,
        object,
        consumed: input.len() - rest.len(),
    })
}

fn read_stream_data<'a>(
    input: &'a [u8],
    dict: &Dictionary,
    holder: Option<&dyn IndirectObjectHolder>,
) -> Option<(&'a [u8], Vec<u8>)> {
    let data = if let Some(rest) = input.strip_prefix(b"\r\n") {
        rest
    } else if let Some(rest) = input.strip_prefix(b"\n") {
        rest
    } else if let Some(rest) = input.strip_prefix(b"\r") {
        log::warn!("Stream keyword followed by CR alone");
        rest
    } else {
        input
    };

    let declared = match (dict.get("Length"), holder) {
        (Some(Object::Integer(n)), _) => Some(n),
        (Some(Object::Reference(r)), Some(h)) => h
            .get_or_parse_indirect_object(r.id)
            .and_then(|o| o.as_integer()),
        _ => None,
    };

    if let Some(len) = declared.and_then(|n| usize::try_from(n).ok()) {
        if len <= data.len() {
            let after = skip_ws(&data[len..]);
            if let Ok((rest, tok)) = token(after) {
                if tok.is_keyword(b"endstream") {
                    return Some((rest, data[..len].to_vec()));
                }
            }
        }
        log::warn!("Stream /Length {} does not match data, scanning for endstream", len);
    }

    let pos = find_keyword(data, b"endstream")?;
    let mut end = pos;
    if end > 0 && data[end - 1] == b'\n' {
        end -= 1;
    }
    if end > 0 && data[end - 1] == b'\r' {
        end -= 1;
    }
    Some((&data[pos + b"endstream".len()..], data[..end].to_vec()))
}

/// Position of the first occurrence of `keyword` in `input`.
pub fn find_keyword(input: &[u8], keyword: &[u8]) -> Option<usize> {
    input.windows(keyword.len()).position(|window| window == keyword)
}

/// Position of the last occurrence of `keyword` in `input`.
pub fn rfind_keyword(input: &[u8], keyword: &[u8]) -> Option<usize> {
    input.windows(keyword.len()).rposition(|window| window == keyword)
}
