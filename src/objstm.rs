//! Object stream parsing (PDF 1.5+).
//!
//! Object streams (/Type /ObjStm) pack several objects into one compressed
//! stream:
//! ```text
//! N 0 obj
//! << /Type /ObjStm /N 2 /First 10 /Filter /FlateDecode >>
//! stream
//! 10 0 11 15      % Pairs: (obj_num, offset relative to /First)
//! <dict>          % Object 10
//! <array>         % Object 11
//! endstream
//! ```
//!
//! The stream is decoded once and individual objects are parsed on demand.

use crate::error::{Error, Result};
use crate::lexer::{token, Token};
use crate::object::{Object, Stream};
use crate::parser::parse_object;

/// A decoded object stream.
#[derive(Debug, Clone)]
pub struct ObjectStream {
    data: Vec<u8>,
    first: usize,
    // (object number, offset relative to `first`)
    index: Vec<(u32, usize)>,
}

impl ObjectStream {
    /// Decode `stream` and read its offset table.
    ///
    /// # Errors
    ///
    /// Fails when the stream is not an object stream, `/N` or `/First` is
    /// missing, or the data cannot be decoded.
    pub fn parse(stream: &Stream) -> Result<Self> {
        let dict = stream.dict();
        if let Some(ty) = dict.get("Type").as_ref().and_then(|t| t.as_name()) {
            if ty != "ObjStm" {
                return Err(Error::InvalidPdf(format!("expected /Type /ObjStm, got /Type /{}", ty)));
            }
        }
        let n = dict
            .get("N")
            .and_then(|o| o.as_integer())
            .filter(|n| *n >= 0)
            .ok_or_else(|| Error::InvalidPdf("object stream missing /N entry".to_string()))?;
        let first = dict
            .get("First")
            .and_then(|o| o.as_integer())
            .filter(|f| *f >= 0)
            .ok_or_else(|| Error::InvalidPdf("object stream missing /First entry".to_string()))?
            as usize;

        let data = stream.decoded_data()?;
        if first > data.len() {
            return Err(Error::InvalidPdf("object stream /First beyond data".to_string()));
        }

        let mut index = Vec::with_capacity(n.min(10_000) as usize);
        let mut rest = &data[..first];
        for _ in 0..n {
            let (after, num) = match token(rest) {
                Ok((after, Token::Integer(num))) => (after, num),
                _ => break,
            };
            let (after, offset) = match token(after) {
                Ok((after, Token::Integer(offset))) => (after, offset),
                _ => break,
            };
            rest = after;
            if let (Ok(num), Ok(offset)) = (u32::try_from(num), usize::try_from(offset)) {
                index.push((num, offset));
            }
        }
        if (index.len() as i64) < n {
            log::warn!("Object stream declares {} objects but lists {}", n, index.len());
        }

        Ok(Self { data, first, index })
    }

    /// Number of objects listed in the stream.
    pub fn len(&self) -> usize {
        self.index.len()
    }

    /// True if the stream lists no objects.
    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Object numbers in stream order.
    pub fn obj_nums(&self) -> impl Iterator<Item = u32> + '_ {
        self.index.iter().map(|(num, _)| *num)
    }

    /// Parse object `obj_num` stored at `index`.
    ///
    /// When `index` does not name `obj_num` the table is searched instead.
    pub fn object(&self, obj_num: u32, index: usize) -> Option<Object> {
        let offset = match self.index.get(index) {
            Some((num, offset)) if *num == obj_num => *offset,
            _ => self.index.iter().find(|(num, _)| *num == obj_num)?.1,
        };
        let start = self.first.checked_add(offset)?;
        let input = self.data.get(start..)?;
        match parse_object(input) {
            Ok((_, obj)) => Some(obj),
            Err(_) => {
                log::warn!("Malformed object {} in object stream", obj_num);
                None
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::Dictionary;
    use std::rc::Rc;

    fn objstm(n: i64, first: i64, body: &[u8]) -> Stream {
        let dict = Rc::new(Dictionary::new());
        dict.set_for("Type", Object::name("ObjStm"));
        dict.set_for("N", Object::Integer(n));
        dict.set_for("First", Object::Integer(first));
        Stream::new(dict, body.to_vec())
    }

    #[test]
    fn test_parse_object_stream() {
        let body = b"10 0 11 15 << /A 1 >>     [1 2 3]";
        let stm = ObjectStream::parse(&objstm(2, 11, body)).unwrap();
        assert_eq!(stm.len(), 2);
        assert_eq!(stm.obj_nums().collect::<Vec<_>>(), vec![10, 11]);
        let dict = stm.object(10, 0).unwrap();
        assert_eq!(dict.as_dict().unwrap().get("A"), Some(Object::Integer(1)));
        let arr = stm.object(11, 1).unwrap();
        assert_eq!(arr.as_array().unwrap().len(), 3);
    }

    #[test]
    fn test_wrong_index_falls_back_to_search() {
        let body = b"10 0 11 4 true false";
        let stm = ObjectStream::parse(&objstm(2, 10, body)).unwrap();
        assert_eq!(stm.object(11, 0), Some(Object::Boolean(false)));
        assert_eq!(stm.object(12, 0), None);
    }

    #[test]
    fn test_missing_entries() {
        let dict = Rc::new(Dictionary::new());
        dict.set_for("Type", Object::name("ObjStm"));
        assert!(ObjectStream::parse(&Stream::new(dict, Vec::new())).is_err());
        assert!(ObjectStream::parse(&objstm(1, 100, b"1 0")).is_err());
    }

    #[test]
    fn test_wrong_type_rejected() {
        let stream = objstm(0, 0, b"");
        stream.dict().set_for("Type", Object::name("XRef"));
        assert!(ObjectStream::parse(&stream).is_err());
    }
}
