//! PDF object types.
//!
//! Objects are a closed sum type. Containers (arrays, dictionaries and
//! streams) are shared through [`Rc`] and use interior mutability, so a
//! container reachable from several places is edited in place. Indirect
//! references never point at their target directly; they carry the object
//! number and are resolved through an [`IndirectObjectHolder`].
//!
//! Every container remembers the indirect object number it was stored under.
//! `0` means the container is inline (owned by another container), and
//! [`INVALID_OBJ_NUM`] marks a container that has been detached from its
//! holder or is being torn down.

mod array;
mod dictionary;
mod stream;
pub mod text;

use std::collections::HashSet;
use std::rc::Rc;

pub use array::{Array, ArrayLocker};
pub use dictionary::{Dictionary, DictionaryLocker};
pub use stream::Stream;

use crate::holder::IndirectObjectHolder;

/// Object number used for objects that are detached or being destroyed.
pub const INVALID_OBJ_NUM: u32 = u32::MAX;

/// PDF object representation.
#[derive(Debug, Clone, PartialEq)]
pub enum Object {
    /// Null object
    Null,
    /// Boolean value
    Boolean(bool),
    /// Integer value
    Integer(i64),
    /// Real (floating-point) value
    Real(f64),
    /// String (byte array)
    String(Vec<u8>),
    /// Name (starting with /)
    Name(String),
    /// Array of objects
    Array(Rc<Array>),
    /// Dictionary (key-value pairs)
    Dictionary(Rc<Dictionary>),
    /// Stream (dictionary + data)
    Stream(Rc<Stream>),
    /// Indirect object reference
    Reference(ObjectRef),
}

/// Reference to an indirect object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectRef {
    /// Object number
    pub id: u32,
    /// Generation number
    pub gen: u16,
}

impl ObjectRef {
    /// Create a new object reference.
    pub fn new(id: u32, gen: u16) -> Self {
        Self { id, gen }
    }
}

impl std::fmt::Display for ObjectRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {} R", self.id, self.gen)
    }
}

impl Object {
    /// Create a name object.
    pub fn name(name: impl Into<String>) -> Self {
        Object::Name(name.into())
    }

    /// Create a string object from raw bytes.
    pub fn string(bytes: impl Into<Vec<u8>>) -> Self {
        Object::String(bytes.into())
    }

    /// Create a reference to generation 0 of `obj_num`.
    pub fn reference(obj_num: u32) -> Self {
        Object::Reference(ObjectRef::new(obj_num, 0))
    }

    /// Get the type name of this object (without data).
    pub fn type_name(&self) -> &'static str {
        match self {
            Object::Null => "Null",
            Object::Boolean(_) => "Boolean",
            Object::Integer(_) => "Integer",
            Object::Real(_) => "Real",
            Object::String(_) => "String",
            Object::Name(_) => "Name",
            Object::Array(_) => "Array",
            Object::Dictionary(_) => "Dictionary",
            Object::Stream(_) => "Stream",
            Object::Reference(_) => "Reference",
        }
    }

    /// Try to cast to integer.
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Object::Integer(i) => Some(*i),
            _ => None,
        }
    }

    /// Try to cast to a number. Integers are widened to `f64`.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Object::Integer(i) => Some(*i as f64),
            Object::Real(r) => Some(*r),
            _ => None,
        }
    }

    /// Try to cast to real number.
    pub fn as_real(&self) -> Option<f64> {
        match self {
            Object::Real(r) => Some(*r),
            _ => None,
        }
    }

    /// Try to cast to boolean.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Object::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    /// Try to cast to name.
    pub fn as_name(&self) -> Option<&str> {
        match self {
            Object::Name(s) => Some(s),
            _ => None,
        }
    }

    /// Try to cast to string (bytes).
    pub fn as_string(&self) -> Option<&[u8]> {
        match self {
            Object::String(s) => Some(s),
            _ => None,
        }
    }

    /// Try to cast to array.
    pub fn as_array(&self) -> Option<&Rc<Array>> {
        match self {
            Object::Array(arr) => Some(arr),
            _ => None,
        }
    }

    /// Try to cast to dictionary. Works for both Dictionary and Stream objects.
    pub fn as_dict(&self) -> Option<&Dictionary> {
        match self {
            Object::Dictionary(d) => Some(d),
            Object::Stream(s) => Some(s.dict()),
            _ => None,
        }
    }

    /// Shared handle to the dictionary of a Dictionary or Stream object.
    pub fn as_dict_rc(&self) -> Option<Rc<Dictionary>> {
        match self {
            Object::Dictionary(d) => Some(Rc::clone(d)),
            Object::Stream(s) => Some(s.dict_rc()),
            _ => None,
        }
    }

    /// Try to cast to stream.
    pub fn as_stream(&self) -> Option<&Rc<Stream>> {
        match self {
            Object::Stream(s) => Some(s),
            _ => None,
        }
    }

    /// Try to cast to reference.
    pub fn as_reference(&self) -> Option<ObjectRef> {
        match self {
            Object::Reference(r) => Some(*r),
            _ => None,
        }
    }

    /// Check if object is null.
    pub fn is_null(&self) -> bool {
        matches!(self, Object::Null)
    }

    /// Check if object is a reference.
    pub fn is_reference(&self) -> bool {
        matches!(self, Object::Reference(_))
    }

    /// Check if object is a dictionary (streams excluded).
    pub fn is_dictionary(&self) -> bool {
        matches!(self, Object::Dictionary(_))
    }

    /// Check if object is an array.
    pub fn is_array(&self) -> bool {
        matches!(self, Object::Array(_))
    }

    /// Check if object is a stream.
    pub fn is_stream(&self) -> bool {
        matches!(self, Object::Stream(_))
    }

    /// Object number this value is stored under, `0` when inline.
    ///
    /// Scalars are values, so they always report `0`.
    pub fn obj_num(&self) -> u32 {
        match self {
            Object::Array(a) => a.obj_num(),
            Object::Dictionary(d) => d.obj_num(),
            Object::Stream(s) => s.obj_num(),
            _ => 0,
        }
    }

    /// Record the object number this value is stored under.
    pub(crate) fn set_obj_num(&self, obj_num: u32) {
        match self {
            Object::Array(a) => a.set_obj_num(obj_num),
            Object::Dictionary(d) => d.set_obj_num(obj_num),
            Object::Stream(s) => s.set_obj_num(obj_num),
            _ => {},
        }
    }

    /// True when the object may be stored directly in a container slot.
    pub fn is_inline(&self) -> bool {
        self.obj_num() == 0
    }

    /// Pointer identity for containers. Scalars never compare identical.
    pub fn ptr_eq(&self, other: &Object) -> bool {
        match (self, other) {
            (Object::Array(a), Object::Array(b)) => Rc::ptr_eq(a, b),
            (Object::Dictionary(a), Object::Dictionary(b)) => Rc::ptr_eq(a, b),
            (Object::Stream(a), Object::Stream(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }

    /// Identity key used by visited sets during cycle-safe cloning.
    pub(crate) fn identity(&self) -> Option<usize> {
        match self {
            Object::Array(a) => Some(Rc::as_ptr(a) as *const u8 as usize),
            Object::Dictionary(d) => Some(Rc::as_ptr(d) as *const u8 as usize),
            Object::Stream(s) => Some(Rc::as_ptr(s) as *const u8 as usize),
            _ => None,
        }
    }

    /// Resolve a reference through `holder`. Non-references resolve to themselves.
    pub fn get_direct(&self, holder: &dyn IndirectObjectHolder) -> Option<Object> {
        match self {
            Object::Reference(r) => holder.get_or_parse_indirect_object(r.id),
            other => Some(other.clone()),
        }
    }

    /// Dictionary behind this object, following one reference if needed.
    pub fn get_dict(&self, holder: &dyn IndirectObjectHolder) -> Option<Rc<Dictionary>> {
        self.get_direct(holder)?.as_dict_rc()
    }

    /// Decode a text string value (`String` objects, or names taken verbatim).
    pub fn get_unicode_text(&self) -> String {
        match self {
            Object::String(bytes) => text::decode_text_string(bytes),
            Object::Name(name) => name.clone(),
            _ => String::new(),
        }
    }

    /// Deep copy of this object. References are copied as references.
    pub fn clone_object(&self) -> Object {
        let mut visited = HashSet::new();
        self.clone_non_cyclic(None, &mut visited).unwrap_or(Object::Null)
    }

    /// Deep copy with references replaced by copies of their targets.
    ///
    /// Any branch that would revisit an object already on the current path
    /// is dropped from the copy.
    pub fn clone_direct_object(&self, holder: &dyn IndirectObjectHolder) -> Object {
        let mut visited = HashSet::new();
        self.clone_non_cyclic(Some(holder), &mut visited).unwrap_or(Object::Null)
    }

    /// Copy this object, omitting any child already present in `visited`.
    ///
    /// With `holder` set, references are followed and replaced by copies of
    /// their targets. `visited` holds the containers on the current recursion
    /// path; each child gets its own copy so siblings are cloned independently.
    pub fn clone_non_cyclic(
        &self,
        holder: Option<&dyn IndirectObjectHolder>,
        visited: &mut HashSet<usize>,
    ) -> Option<Object> {
        match self {
            Object::Array(a) => Some(Object::Array(Rc::new(a.clone_non_cyclic(holder, visited)))),
            Object::Dictionary(d) => {
                Some(Object::Dictionary(Rc::new(d.clone_non_cyclic(holder, visited))))
            },
            Object::Stream(s) => Some(Object::Stream(Rc::new(s.clone_non_cyclic(holder, visited)))),
            Object::Reference(r) => match holder {
                None => Some(Object::Reference(*r)),
                Some(h) => {
                    let direct = h.get_or_parse_indirect_object(r.id)?;
                    match direct.identity() {
                        Some(id) if visited.contains(&id) => None,
                        _ => direct.clone_non_cyclic(holder, visited),
                    }
                },
            },
            scalar => Some(scalar.clone()),
        }
    }
}

/// Release a batch of container children without recursing.
///
/// Containers that are uniquely owned are unwrapped and their children are
/// pushed onto a work list, so dropping a deeply nested graph uses constant
/// stack depth. Shared containers just lose one strong count.
pub(crate) fn release_children(children: Vec<Object>) {
    let mut pending = children;
    while let Some(obj) = pending.pop() {
        match obj {
            Object::Array(rc) => {
                if let Ok(array) = Rc::try_unwrap(rc) {
                    pending.extend(array.take_all());
                }
            },
            Object::Dictionary(rc) => {
                if let Ok(dict) = Rc::try_unwrap(rc) {
                    pending.extend(dict.take_all());
                }
            },
            Object::Stream(rc) => {
                if let Ok(stream) = Rc::try_unwrap(rc) {
                    pending.push(Object::Dictionary(stream.dict_rc()));
                }
            },
            _ => {},
        }
    }
}

impl From<bool> for Object {
    fn from(value: bool) -> Self {
        Object::Boolean(value)
    }
}

impl From<i64> for Object {
    fn from(value: i64) -> Self {
        Object::Integer(value)
    }
}

impl From<i32> for Object {
    fn from(value: i32) -> Self {
        Object::Integer(value as i64)
    }
}

impl From<f64> for Object {
    fn from(value: f64) -> Self {
        Object::Real(value)
    }
}

impl From<ObjectRef> for Object {
    fn from(value: ObjectRef) -> Self {
        Object::Reference(value)
    }
}

impl From<Rc<Array>> for Object {
    fn from(value: Rc<Array>) -> Self {
        Object::Array(value)
    }
}

impl From<Rc<Dictionary>> for Object {
    fn from(value: Rc<Dictionary>) -> Self {
        Object::Dictionary(value)
    }
}

impl From<Rc<Stream>> for Object {
    fn from(value: Rc<Stream>) -> Self {
        Object::Stream(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::holder::{IndirectObjectHolder, MemoryHolder};

    #[test]
    fn test_object_integer() {
        let obj = Object::Integer(42);
        assert_eq!(obj.as_integer(), Some(42));
        assert_eq!(obj.as_number(), Some(42.0));
        assert!(obj.as_name().is_none());
        assert!(!obj.is_null());
    }

    #[test]
    fn test_object_name() {
        let obj = Object::name("Type");
        assert_eq!(obj.as_name(), Some("Type"));
        assert!(obj.as_integer().is_none());
    }

    #[test]
    fn test_object_ref_display() {
        let obj_ref = ObjectRef::new(10, 0);
        assert_eq!(format!("{}", obj_ref), "10 0 R");
    }

    #[test]
    fn test_mismatched_accessors_return_none() {
        let obj = Object::string(b"abc".to_vec());
        assert!(obj.as_array().is_none());
        assert!(obj.as_dict().is_none());
        assert!(obj.as_stream().is_none());
        assert!(obj.as_reference().is_none());
        assert_eq!(obj.as_string(), Some(&b"abc"[..]));
    }

    #[test]
    fn test_stream_exposes_dictionary() {
        let dict = Rc::new(Dictionary::new());
        dict.set_for("Length1", Object::Integer(100));
        let obj = Object::Stream(Rc::new(Stream::new(dict, b"data".to_vec())));
        let d = obj.as_dict().unwrap();
        assert_eq!(d.get("Length1").and_then(|o| o.as_integer()), Some(100));
    }

    #[test]
    fn test_inline_tracking() {
        let dict = Rc::new(Dictionary::new());
        let obj = Object::Dictionary(Rc::clone(&dict));
        assert!(obj.is_inline());
        obj.set_obj_num(5);
        assert_eq!(dict.obj_num(), 5);
        assert!(!obj.is_inline());
        assert!(Object::Integer(1).is_inline());
    }

    #[test]
    fn test_ptr_eq_is_identity() {
        let a = Object::Dictionary(Rc::new(Dictionary::new()));
        let b = Object::Dictionary(Rc::new(Dictionary::new()));
        assert!(a.ptr_eq(&a.clone()));
        assert!(!a.ptr_eq(&b));
        assert_eq!(a, b);
        assert!(!Object::Integer(1).ptr_eq(&Object::Integer(1)));
    }

    #[test]
    fn test_clone_object_is_deep() {
        let inner = Rc::new(Array::new());
        inner.append(Object::Integer(1));
        let outer = Rc::new(Dictionary::new());
        outer.set_for("A", Object::Array(Rc::clone(&inner)));

        let copy = Object::Dictionary(Rc::clone(&outer)).clone_object();
        inner.append(Object::Integer(2));

        let copied_inner = copy.as_dict().unwrap().get("A").unwrap();
        assert_eq!(copied_inner.as_array().unwrap().len(), 1);
    }

    #[test]
    fn test_clone_direct_object_breaks_reference_cycle() {
        let holder = MemoryHolder::new();
        let first = Rc::new(Dictionary::new());
        let second = Rc::new(Dictionary::new());
        holder.add_indirect_object(Object::Dictionary(Rc::clone(&first)));
        holder.add_indirect_object(Object::Dictionary(Rc::clone(&second)));
        first.set_for("Next", Object::reference(2));
        second.set_for("Next", Object::reference(1));

        let copy = Object::Dictionary(Rc::clone(&first)).clone_direct_object(&holder);
        let level1 = copy.as_dict().unwrap();
        let level2 = level1.get("Next").unwrap();
        // The back edge to the first dictionary is omitted.
        assert!(level2.as_dict().unwrap().get("Next").is_none());
    }

    #[test]
    fn test_siblings_clone_independently() {
        let holder = MemoryHolder::new();
        let shared = Rc::new(Dictionary::new());
        shared.set_for("Value", Object::Integer(7));
        holder.add_indirect_object(Object::Dictionary(shared));

        let root = Rc::new(Array::new());
        root.append(Object::reference(1));
        root.append(Object::reference(1));

        let copy = Object::Array(root).clone_direct_object(&holder);
        let arr = copy.as_array().unwrap();
        assert_eq!(arr.len(), 2);
        for i in 0..2 {
            let item = arr.get_object_at(i).unwrap();
            assert_eq!(item.as_dict().unwrap().get("Value"), Some(Object::Integer(7)));
        }
    }

    #[test]
    fn test_deeply_nested_drop() {
        let mut current = Rc::new(Array::new());
        for _ in 0..200_000 {
            let parent = Rc::new(Array::new());
            parent.append(Object::Array(current));
            current = parent;
        }
        drop(current);
    }

    #[test]
    fn test_unicode_text_of_name_and_string() {
        assert_eq!(Object::name("en-US").get_unicode_text(), "en-US");
        assert_eq!(
            Object::string(vec![0xFE, 0xFF, 0x00, 0x41]).get_unicode_text(),
            "A"
        );
        assert_eq!(Object::Integer(3).get_unicode_text(), "");
    }
}
