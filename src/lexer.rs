//! PDF lexer (tokenizer).
//!
//! Splits PDF bytes into tokens: numbers, literal and hex strings, names,
//! delimiters and bare keywords. Bare keywords cover the object syntax
//! (`obj`, `endobj`, `stream`, `R`, `xref`, `trailer`, ...) as well as
//! content stream operators (`BT`, `Tj`, `T*`, `'`, ...), so the same lexer
//! serves the file parser and the content parser.
//!
//! Whitespace (space, \t, \r, \n, \0, \f) and comments (% to EOL) are skipped.

use nom::{
    branch::alt,
    bytes::complete::{tag, take_till, take_while, take_while1},
    character::complete::{char, digit1, one_of},
    combinator::{map, opt, value},
    sequence::preceded,
    IResult,
};

/// Token types recognized by the PDF lexer.
#[derive(Debug, PartialEq, Clone)]
pub enum Token<'a> {
    /// Integer number (e.g., 42, -123)
    Integer(i64),

    /// Real (floating-point) number (e.g., 3.14, -2.5, .5)
    Real(f64),

    /// Literal string bytes, escapes not yet decoded
    LiteralString(&'a [u8]),

    /// Hexadecimal string digits, whitespace preserved
    HexString(&'a [u8]),

    /// Name with `#XX` escapes decoded
    Name(String),

    /// Boolean true keyword
    True,

    /// Boolean false keyword
    False,

    /// Null keyword
    Null,

    /// Array start delimiter [
    ArrayStart,

    /// Array end delimiter ]
    ArrayEnd,

    /// Dictionary start delimiter <<
    DictStart,

    /// Dictionary end delimiter >>
    DictEnd,

    /// Any other run of regular characters (`obj`, `R`, `Tj`, ...)
    Keyword(&'a [u8]),
}

impl Token<'_> {
    /// True if this is the bare keyword `kw`.
    pub fn is_keyword(&self, kw: &[u8]) -> bool {
        matches!(self, Token::Keyword(k) if *k == kw)
    }
}

/// PDF whitespace: space, tab, CR, LF, NUL, form feed.
pub fn is_whitespace(c: u8) -> bool {
    matches!(c, b' ' | b'\t' | b'\r' | b'\n' | 0x00 | 0x0C)
}

/// PDF delimiter characters.
pub fn is_delimiter(c: u8) -> bool {
    matches!(c, b'(' | b')' | b'<' | b'>' | b'[' | b']' | b'{' | b'}' | b'/' | b'%')
}

/// Neither whitespace nor delimiter.
pub fn is_regular(c: u8) -> bool {
    !is_whitespace(c) && !is_delimiter(c)
}

fn comment(input: &[u8]) -> IResult<&[u8], ()> {
    value((), preceded(char('%'), take_till(|c| c == b'\r' || c == b'\n')))(input)
}

/// Skip all whitespace and comments.
pub fn skip_ws(input: &[u8]) -> &[u8] {
    let mut remaining = input;
    loop {
        let before = remaining.len();
        let start = remaining.iter().position(|c| !is_whitespace(*c)).unwrap_or(remaining.len());
        remaining = &remaining[start..];
        if let Ok((rest, _)) = comment(remaining) {
            remaining = rest;
        }
        if remaining.len() == before {
            return remaining;
        }
    }
}

/// Parse an integer or real number.
///
/// Accepts a leading sign and reals without an integer or fraction part
/// (`.5`, `5.`). A number must not run straight into a regular character,
/// which keeps operator names like `1d0` out of the number path.
fn parse_number(input: &[u8]) -> IResult<&[u8], Token<'_>> {
    let start = input;
    let (input, sign) = opt(one_of("+-"))(input)?;
    let (input, int_part) = opt(digit1)(input)?;
    let (input, frac_part) = opt(preceded(char('.'), opt(digit1)))(input)?;

    if int_part.is_none() && !matches!(frac_part, Some(Some(_))) {
        return Err(nom::Err::Error(nom::error::Error::new(start, nom::error::ErrorKind::Digit)));
    }
    if input.first().is_some_and(|c| is_regular(*c)) {
        return Err(nom::Err::Error(nom::error::Error::new(start, nom::error::ErrorKind::Digit)));
    }

    let digits = &start[..start.len() - input.len()];
    let text = std::str::from_utf8(digits)
        .map_err(|_| nom::Err::Error(nom::error::Error::new(start, nom::error::ErrorKind::Digit)))?;

    if frac_part.is_some() {
        let mut normalized = text.trim_start_matches('+').to_string();
        if normalized.ends_with('.') {
            normalized.push('0');
        }
        if let Some(rest) = normalized.strip_prefix("-.") {
            normalized = format!("-0.{}", rest);
        } else if normalized.starts_with('.') {
            normalized.insert(0, '0');
        }
        let num: f64 = normalized
            .parse()
            .map_err(|_| nom::Err::Error(nom::error::Error::new(start, nom::error::ErrorKind::Digit)))?;
        return Ok((input, Token::Real(num)));
    }

    let magnitude: i64 = match int_part.and_then(|d| std::str::from_utf8(d).ok()).map(str::parse::<i64>) {
        Some(Ok(v)) => v,
        // Out-of-range integers degrade to reals.
        _ => {
            let num: f64 = text.trim_start_matches('+').parse().unwrap_or(0.0);
            return Ok((input, Token::Real(num)));
        },
    };
    let num = if sign == Some('-') { -magnitude } else { magnitude };
    Ok((input, Token::Integer(num)))
}

/// Parse a literal string enclosed in balanced parentheses.
///
/// Returns the raw bytes between the outer parentheses; escapes are decoded
/// by [`crate::parser::decode_literal_string_escapes`].
fn parse_literal_string(input: &[u8]) -> IResult<&[u8], Token<'_>> {
    let (remaining, _) = char('(')(input)?;
    let mut depth = 1;
    let mut pos = 0;

    while depth > 0 && pos < remaining.len() {
        match remaining[pos] {
            b'\\' => pos += 2,
            b'(' => {
                depth += 1;
                pos += 1;
            },
            b')' => {
                depth -= 1;
                pos += 1;
            },
            _ => pos += 1,
        }
    }

    if depth != 0 || pos > remaining.len() {
        return Err(nom::Err::Error(nom::error::Error::new(input, nom::error::ErrorKind::Tag)));
    }

    Ok((&remaining[pos..], Token::LiteralString(&remaining[..pos - 1])))
}

/// Parse a hexadecimal string `<...>`.
fn parse_hex_string(input: &[u8]) -> IResult<&[u8], Token<'_>> {
    if input.starts_with(b"<<") {
        return Err(nom::Err::Error(nom::error::Error::new(input, nom::error::ErrorKind::Tag)));
    }
    let (rest, _) = char('<')(input)?;
    let (rest, digits) = take_while(|c: u8| c.is_ascii_hexdigit() || is_whitespace(c))(rest)?;
    let (rest, _) = char('>')(rest)?;
    Ok((rest, Token::HexString(digits)))
}

/// Decode `#XX` escape sequences in PDF names.
///
/// Invalid sequences are kept literally.
///
/// ```
/// # use pdf_creator::lexer::decode_name_escapes;
/// assert_eq!(decode_name_escapes(b"A#20B#23C"), "A B#C");
/// assert_eq!(decode_name_escapes(b"A#"), "A#");
/// ```
pub fn decode_name_escapes(name: &[u8]) -> String {
    let mut result = String::with_capacity(name.len());
    let mut i = 0;
    while i < name.len() {
        let c = name[i];
        if c == b'#' && i + 2 < name.len() {
            let hex = &name[i + 1..i + 3];
            if let Some(byte) = std::str::from_utf8(hex).ok().and_then(|h| u8::from_str_radix(h, 16).ok()) {
                result.push(byte as char);
                i += 3;
                continue;
            }
        }
        result.push(c as char);
        i += 1;
    }
    result
}

/// Parse a name starting with `/`.
fn parse_name(input: &[u8]) -> IResult<&[u8], Token<'_>> {
    preceded(
        char('/'),
        map(take_while(is_regular), |bytes: &[u8]| Token::Name(decode_name_escapes(bytes))),
    )(input)
}

fn parse_delimiter(input: &[u8]) -> IResult<&[u8], Token<'_>> {
    alt((
        value(Token::DictStart, tag(b"<<")),
        value(Token::DictEnd, tag(b">>")),
        value(Token::ArrayStart, tag(b"[")),
        value(Token::ArrayEnd, tag(b"]")),
    ))(input)
}

fn parse_keyword(input: &[u8]) -> IResult<&[u8], Token<'_>> {
    map(take_while1(is_regular), |word: &[u8]| match word {
        b"true" => Token::True,
        b"false" => Token::False,
        b"null" => Token::Null,
        other => Token::Keyword(other),
    })(input)
}

/// Parse a single PDF token after skipping whitespace and comments.
pub fn token(input: &[u8]) -> IResult<&[u8], Token<'_>> {
    let input = skip_ws(input);
    alt((
        parse_delimiter,
        parse_name,
        parse_literal_string,
        parse_hex_string,
        parse_number,
        parse_keyword,
    ))(input)
}

/// Tokenize the whole input, stopping at the first unrecognized byte.
pub fn tokens(input: &[u8]) -> IResult<&[u8], Vec<Token<'_>>> {
    let mut out = Vec::new();
    let mut remaining = input;
    while let Ok((rest, tok)) = token(remaining) {
        out.push(tok);
        remaining = rest;
    }
    Ok((skip_ws(remaining), out))
}
