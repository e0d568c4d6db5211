//! Content stream parser.
//!
//! Content streams are postfix: operands are pushed until an operator
//! keyword consumes them.
//!
//! ```text
//! BT
//!   /F1 12 Tf
//!   100 700 Td
//!   (Hello, World!) Tj
//! ET
//! ```

use std::collections::HashMap;

use crate::content::operators::Operator;
use crate::error::Result;
use crate::lexer::{is_whitespace, skip_ws, token, Token};
use crate::object::Object;
use crate::parser::parse_object;

// Operand stacks deeper than this are garbage; drop the oldest entries.
const MAX_OPERANDS: usize = 64;

/// Parse a content stream into a sequence of operators.
///
/// Unparseable bytes are skipped so that one bad token does not lose the
/// rest of the page.
///
/// # Examples
///
/// ```
/// use pdf_creator::content::{parse_content_stream, Operator};
///
/// let ops = parse_content_stream(b"BT /F1 12 Tf (Hello) Tj ET").unwrap();
/// assert_eq!(ops.len(), 4);
/// assert_eq!(ops[2], Operator::Tj { text: b"Hello".to_vec() });
/// ```
pub fn parse_content_stream(data: &[u8]) -> Result<Vec<Operator>> {
    let mut operators = Vec::new();
    let mut operands: Vec<Object> = Vec::new();
    let mut input = skip_ws(data);

    while !input.is_empty() {
        match token(input) {
            Ok((rest, Token::Keyword(name))) => {
                if name == b"BI" {
                    match parse_inline_image(rest) {
                        Some((rest, op)) => {
                            operators.push(op);
                            input = rest;
                        },
                        None => {
                            log::warn!("Unterminated inline image, dropping rest of stream");
                            break;
                        },
                    }
                    operands.clear();
                } else {
                    operators.push(Operator::from_parts(name, std::mem::take(&mut operands)));
                    input = rest;
                }
            },
            Ok(_) => match parse_object(input) {
                Ok((rest, obj)) => {
                    if operands.len() == MAX_OPERANDS {
                        operands.remove(0);
                    }
                    operands.push(obj);
                    input = rest;
                },
                Err(_) => input = &input[1..],
            },
            Err(_) => input = &input[1..],
        }
        input = skip_ws(input);
    }

    Ok(operators)
}

// BI <key value>* ID <data> EI, where EI must be delimited by whitespace.
fn parse_inline_image(input: &[u8]) -> Option<(&[u8], Operator)> {
    let mut dict = HashMap::new();
    let mut remaining = input;
    loop {
        let (rest, tok) = token(remaining).ok()?;
        if tok.is_keyword(b"ID") {
            remaining = rest;
            break;
        }
        let (rest, key) = parse_object(remaining).ok()?;
        let (rest, value) = parse_object(rest).ok()?;
        if let Object::Name(key) = key {
            dict.insert(key, value);
        }
        remaining = rest;
    }

    // A single whitespace byte separates ID from the data.
    let data_start = usize::from(remaining.first().is_some_and(|c| is_whitespace(*c)));
    let body = &remaining[data_start..];
    let end = (0..body.len().saturating_sub(2)).find(|&i| {
        is_whitespace(body[i])
            && &body[i + 1..i + 3] == b"EI"
            && body.get(i + 3).map_or(true, |c| is_whitespace(*c))
    })?;
    Some((
        &body[end + 3..],
        Operator::InlineImage {
            dict,
            data: body[..end].to_vec(),
        },
    ))
}
