//! PDF object serialization.
//!
//! Objects are written in the compact classic form: numbers, booleans and
//! references carry a leading space, names and delimiters none, so
//! `<< /Size 36 >>` comes out as `<</Size 36>>`. Dictionary keys are
//! written in sorted order so that saving the same graph twice produces
//! the same bytes.

use crate::object::{Array, Dictionary, Object};

/// Line terminator used throughout written files.
pub const EOL: &[u8] = b"\r\n";

/// Serializer for PDF objects.
#[derive(Debug, Clone, Copy, Default)]
pub struct ObjectSerializer;

impl ObjectSerializer {
    /// Create a serializer.
    pub fn new() -> Self {
        Self
    }

    /// Serialize an object to bytes.
    pub fn serialize(&self, obj: &Object) -> Vec<u8> {
        let mut buf = Vec::new();
        self.write_object(&mut buf, obj);
        buf
    }

    /// Serialize an object to a string (for debugging).
    pub fn serialize_to_string(&self, obj: &Object) -> String {
        String::from_utf8_lossy(&self.serialize(obj)).to_string()
    }

    /// Serialize an indirect object definition:
    /// `{num} {gen} obj\r\n{object}\r\nendobj\r\n`.
    pub fn serialize_indirect(&self, obj_num: u32, gen: u16, obj: &Object) -> Vec<u8> {
        let mut buf = format!("{} {} obj", obj_num, gen).into_bytes();
        buf.extend_from_slice(EOL);
        self.write_object(&mut buf, obj);
        buf.extend_from_slice(EOL);
        buf.extend_from_slice(b"endobj");
        buf.extend_from_slice(EOL);
        buf
    }

    /// Append `obj` to `out`.
    pub fn write_object(&self, out: &mut Vec<u8>, obj: &Object) {
        match obj {
            Object::Null => out.extend_from_slice(b" null"),
            Object::Boolean(b) => out.extend_from_slice(if *b { b" true" } else { b" false" }),
            Object::Integer(i) => out.extend_from_slice(format!(" {}", i).as_bytes()),
            Object::Real(r) => {
                out.push(b' ');
                write_real(out, *r);
            },
            Object::String(s) => write_string(out, s),
            Object::Name(n) => write_name(out, n),
            Object::Array(arr) => self.write_array(out, arr),
            Object::Dictionary(dict) => self.write_dictionary(out, dict, None),
            Object::Stream(stream) => {
                let data = stream.raw_data();
                self.write_dictionary(out, stream.dict(), Some(data.len()));
                out.extend_from_slice(b"stream");
                out.extend_from_slice(EOL);
                out.extend_from_slice(&data);
                out.extend_from_slice(EOL);
                out.extend_from_slice(b"endstream");
            },
            Object::Reference(r) => out.extend_from_slice(format!(" {} {} R ", r.id, r.gen).as_bytes()),
        }
    }

    fn write_array(&self, out: &mut Vec<u8>, arr: &Array) {
        out.push(b'[');
        for obj in arr.to_vec() {
            self.write_object(out, &obj);
        }
        out.push(b']');
    }

    /// Write a dictionary; `stream_length` replaces any `/Length` entry.
    fn write_dictionary(&self, out: &mut Vec<u8>, dict: &Dictionary, stream_length: Option<usize>) {
        out.extend_from_slice(b"<<");
        let mut entries = dict.entries();
        if let Some(length) = stream_length {
            entries.retain(|(key, _)| key != "Length");
            entries.push(("Length".to_string(), Object::Integer(length as i64)));
        }
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        for (key, value) in &entries {
            write_name(out, key);
            self.write_object(out, value);
        }
        out.extend_from_slice(b">>");
    }

    /// Write a dictionary's entries without the `<<` `>>` delimiters,
    /// skipping keys for which `skip` returns true.
    pub fn write_dictionary_entries(&self, out: &mut Vec<u8>, dict: &Dictionary, skip: impl Fn(&str) -> bool) {
        let mut entries = dict.entries();
        entries.retain(|(key, _)| !skip(key));
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        for (key, value) in &entries {
            write_name(out, key);
            self.write_object(out, value);
        }
    }
}

/// Write a real number, trimming trailing zeros.
fn write_real(out: &mut Vec<u8>, value: f64) {
    if !value.is_finite() {
        out.push(b'0');
    } else if value.fract() == 0.0 && value.abs() < 1e15 {
        out.extend_from_slice(format!("{}", value as i64).as_bytes());
    } else {
        let formatted = format!("{:.5}", value);
        let trimmed = formatted.trim_end_matches('0').trim_end_matches('.');
        out.extend_from_slice(trimmed.as_bytes());
    }
}

/// Write a string, literal when printable and hex otherwise.
fn write_string(out: &mut Vec<u8>, data: &[u8]) {
    let is_printable = data
        .iter()
        .all(|&b| b == b'\n' || b == b'\r' || b == b'\t' || (0x20..=0x7E).contains(&b));

    if is_printable {
        out.push(b'(');
        for &byte in data {
            match byte {
                b'(' => out.extend_from_slice(b"\\("),
                b')' => out.extend_from_slice(b"\\)"),
                b'\\' => out.extend_from_slice(b"\\\\"),
                b'\n' => out.extend_from_slice(b"\\n"),
                b'\r' => out.extend_from_slice(b"\\r"),
                b'\t' => out.extend_from_slice(b"\\t"),
                _ => out.push(byte),
            }
        }
        out.push(b')');
    } else {
        out.push(b'<');
        out.extend_from_slice(hex_upper(data).as_bytes());
        out.push(b'>');
    }
}

/// Uppercase hex digits of `data`.
pub fn hex_upper(data: &[u8]) -> String {
    data.iter().map(|b| format!("{:02X}", b)).collect()
}

/// Write a name, escaping delimiters and non-regular bytes as `#xx`.
fn write_name(out: &mut Vec<u8>, name: &str) {
    out.push(b'/');
    for byte in name.bytes() {
        match byte {
            b'!'
            | b'"'
            | b'$'..=b'&'
            | b'\''
            | b'*'..=b'.'
            | b'0'..=b'9'
            | b';'
            | b'='
            | b'?'
            | b'@'
            | b'A'..=b'Z'
            | b'^'..=b'z'
            | b'|'
            | b'~' => out.push(byte),
            _ => out.extend_from_slice(format!("#{:02X}", byte).as_bytes()),
        }
    }
}
