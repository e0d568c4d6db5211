//! PDF stream object: a dictionary plus a raw byte payload.

use std::cell::{Cell, RefCell};
use std::collections::HashSet;
use std::rc::Rc;

use bytes::Bytes;

use super::{Dictionary, Object};
use crate::error::Result;
use crate::holder::IndirectObjectHolder;

/// Stream object.
///
/// The payload is stored exactly as it appears in the file (still encoded
/// with the filters named by `/Filter`). Streams are always indirect.
#[derive(Debug)]
pub struct Stream {
    dict: Rc<Dictionary>,
    data: RefCell<Bytes>,
    obj_num: Cell<u32>,
}

impl Stream {
    /// Create a stream over `data` described by `dict`.
    pub fn new(dict: Rc<Dictionary>, data: impl Into<Bytes>) -> Self {
        Self {
            dict,
            data: RefCell::new(data.into()),
            obj_num: Cell::new(0),
        }
    }

    /// Create a stream with a fresh dictionary whose `/Length` matches `data`.
    pub fn with_data(data: impl Into<Bytes>) -> Self {
        let stream = Self::new(Rc::new(Dictionary::new()), Bytes::new());
        stream.set_data(data);
        stream
    }

    /// Stream dictionary.
    pub fn dict(&self) -> &Dictionary {
        &self.dict
    }

    /// Shared handle to the stream dictionary.
    pub fn dict_rc(&self) -> Rc<Dictionary> {
        Rc::clone(&self.dict)
    }

    /// Object number, `0` until the stream is added to a holder.
    pub fn obj_num(&self) -> u32 {
        self.obj_num.get()
    }

    pub(crate) fn set_obj_num(&self, obj_num: u32) {
        self.obj_num.set(obj_num);
    }

    /// Encoded payload.
    pub fn raw_data(&self) -> Bytes {
        self.data.borrow().clone()
    }

    /// Size of the encoded payload.
    pub fn raw_size(&self) -> usize {
        self.data.borrow().len()
    }

    /// Replace the payload and update `/Length`. Filters are left untouched.
    pub fn set_data(&self, data: impl Into<Bytes>) {
        let data = data.into();
        self.dict.set_for("Length", Object::Integer(data.len() as i64));
        *self.data.borrow_mut() = data;
    }

    /// Replace the payload with already-decoded bytes and drop the filter chain.
    pub fn set_data_and_remove_filter(&self, data: impl Into<Bytes>) {
        self.dict.remove_for("Filter");
        self.dict.remove_for("DecodeParms");
        self.set_data(data);
    }

    /// True if `/Filter` names at least one filter.
    pub fn has_filter(&self) -> bool {
        match self.dict.get("Filter") {
            Some(Object::Name(_)) => true,
            Some(Object::Array(arr)) => !arr.is_empty(),
            _ => false,
        }
    }

    /// Payload with the `/Filter` chain applied.
    pub fn decoded_data(&self) -> Result<Vec<u8>> {
        crate::decoders::decode_stream(&self.dict, &self.data.borrow())
    }

    /// Copy the stream, cloning the dictionary without revisiting the path.
    pub fn clone_non_cyclic(
        &self,
        holder: Option<&dyn IndirectObjectHolder>,
        visited: &mut HashSet<usize>,
    ) -> Stream {
        visited.insert(self as *const Stream as *const u8 as usize);
        let dict = self.dict.clone_non_cyclic(holder, visited);
        Stream::new(Rc::new(dict), self.raw_data())
    }
}

impl PartialEq for Stream {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self, other) || (*self.dict == *other.dict && *self.data.borrow() == *other.data.borrow())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_data_updates_length() {
        let stream = Stream::with_data(b"hello".to_vec());
        assert_eq!(stream.dict().get("Length"), Some(Object::Integer(5)));
        stream.set_data(Bytes::from_static(b"hi"));
        assert_eq!(stream.dict().get("Length"), Some(Object::Integer(2)));
        assert_eq!(stream.raw_data().as_ref(), b"hi");
    }

    #[test]
    fn test_decoded_data_without_filter() {
        let stream = Stream::with_data(b"BT ET".to_vec());
        assert!(!stream.has_filter());
        assert_eq!(stream.decoded_data().unwrap(), b"BT ET");
    }

    #[test]
    fn test_decoded_data_with_hex_filter() {
        let stream = Stream::with_data(b"48656C6C6F>".to_vec());
        stream.dict().set_for("Filter", Object::name("ASCIIHexDecode"));
        assert!(stream.has_filter());
        assert_eq!(stream.decoded_data().unwrap(), b"Hello");
    }

    #[test]
    fn test_set_data_and_remove_filter() {
        let stream = Stream::with_data(b"x".to_vec());
        stream.dict().set_for("Filter", Object::name("FlateDecode"));
        stream.set_data_and_remove_filter(b"plain".to_vec());
        assert!(!stream.has_filter());
        assert_eq!(stream.decoded_data().unwrap(), b"plain");
    }
}
