//! PDF dictionary object.

use std::cell::{Cell, Ref, RefCell};
use std::collections::HashSet;
use std::rc::Rc;

use indexmap::IndexMap;

use super::{release_children, text, Array, Object, Stream, INVALID_OBJ_NUM};
use crate::holder::IndirectObjectHolder;

/// Mapping from names to PDF objects.
///
/// Insertion order is preserved for stable output; the serializer sorts keys
/// when writing. Like [`Array`], a dictionary refuses structural mutation
/// while a [`DictionaryLocker`] is alive.
#[derive(Debug, Default)]
pub struct Dictionary {
    map: RefCell<IndexMap<String, Object>>,
    obj_num: Cell<u32>,
    lock_count: Cell<u32>,
}

impl Dictionary {
    /// Create an empty inline dictionary.
    pub fn new() -> Self {
        Self::default()
    }

    /// Object number, `0` when inline.
    pub fn obj_num(&self) -> u32 {
        self.obj_num.get()
    }

    pub(crate) fn set_obj_num(&self, obj_num: u32) {
        self.obj_num.set(obj_num);
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.map.borrow().len()
    }

    /// True if there are no entries.
    pub fn is_empty(&self) -> bool {
        self.map.borrow().is_empty()
    }

    /// True while a [`DictionaryLocker`] is alive.
    pub fn is_locked(&self) -> bool {
        self.lock_count.get() > 0
    }

    /// True if `key` is present.
    pub fn contains_key(&self, key: &str) -> bool {
        self.map.borrow().contains_key(key)
    }

    /// Keys in insertion order.
    pub fn keys(&self) -> Vec<String> {
        self.map.borrow().keys().cloned().collect()
    }

    /// Snapshot of the entries in insertion order.
    pub fn entries(&self) -> Vec<(String, Object)> {
        self.map
            .borrow()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    /// Raw value for `key` (references are not resolved).
    pub fn get(&self, key: &str) -> Option<Object> {
        self.map.borrow().get(key).cloned()
    }

    /// Value for `key` with references resolved through `holder`.
    pub fn get_direct(&self, key: &str, holder: &dyn IndirectObjectHolder) -> Option<Object> {
        self.get(key)?.get_direct(holder)
    }

    /// Dictionary (or stream dictionary) for `key`.
    pub fn get_dict_for(&self, key: &str, holder: &dyn IndirectObjectHolder) -> Option<Rc<Dictionary>> {
        self.get_direct(key, holder)?.as_dict_rc()
    }

    /// Array for `key`.
    pub fn get_array_for(&self, key: &str, holder: &dyn IndirectObjectHolder) -> Option<Rc<Array>> {
        self.get_direct(key, holder)?.as_array().cloned()
    }

    /// Stream for `key`.
    pub fn get_stream_for(&self, key: &str, holder: &dyn IndirectObjectHolder) -> Option<Rc<Stream>> {
        self.get_direct(key, holder)?.as_stream().cloned()
    }

    /// Integer for `key`; reals are truncated.
    pub fn get_integer_for(&self, key: &str, holder: &dyn IndirectObjectHolder) -> Option<i64> {
        self.get_direct(key, holder)?.as_number().map(|n| n as i64)
    }

    /// Number for `key`.
    pub fn get_number_for(&self, key: &str, holder: &dyn IndirectObjectHolder) -> Option<f64> {
        self.get_direct(key, holder)?.as_number()
    }

    /// Boolean for `key`.
    pub fn get_boolean_for(&self, key: &str, holder: &dyn IndirectObjectHolder) -> Option<bool> {
        self.get_direct(key, holder)?.as_bool()
    }

    /// Name for `key`.
    pub fn get_name_for(&self, key: &str, holder: &dyn IndirectObjectHolder) -> Option<String> {
        self.get_direct(key, holder)?.as_name().map(str::to_string)
    }

    /// Raw string bytes for `key`.
    pub fn get_string_for(&self, key: &str, holder: &dyn IndirectObjectHolder) -> Option<Vec<u8>> {
        self.get_direct(key, holder)?.as_string().map(<[u8]>::to_vec)
    }

    /// Decoded text string for `key`, empty when absent.
    pub fn get_unicode_text_for(&self, key: &str, holder: &dyn IndirectObjectHolder) -> String {
        self.get_direct(key, holder)
            .map(|obj| obj.get_unicode_text())
            .unwrap_or_default()
    }

    /// True when `/Type` resolves to the name `ty`.
    pub fn is_type(&self, ty: &str, holder: &dyn IndirectObjectHolder) -> bool {
        self.get_name_for("Type", holder).as_deref() == Some(ty)
    }

    /// Set `key` to `obj`, replacing any previous value.
    ///
    /// # Panics
    ///
    /// Panics if the dictionary is locked or `obj` is a stream or an
    /// indirect container.
    pub fn set_for(&self, key: impl Into<String>, obj: Object) {
        self.check_unlocked();
        assert!(!obj.is_stream(), "streams must be stored indirectly");
        assert!(obj.is_inline(), "only inline objects may be stored in a container");
        let old = self.map.borrow_mut().insert(key.into(), obj);
        if let Some(old) = old {
            release_children(vec![old]);
        }
    }

    /// Store a text string, encoded as PDFDocEncoding or UTF-16BE.
    pub fn set_text_for(&self, key: impl Into<String>, value: &str) {
        self.set_for(key, Object::String(text::encode_text_string(value)));
    }

    /// Insert a fresh inline dictionary under `key` and return it.
    pub fn set_new_dictionary_for(&self, key: impl Into<String>) -> Rc<Dictionary> {
        let dict = Rc::new(Dictionary::new());
        self.set_for(key, Object::Dictionary(Rc::clone(&dict)));
        dict
    }

    /// Insert a fresh inline array under `key` and return it.
    pub fn set_new_array_for(&self, key: impl Into<String>) -> Rc<Array> {
        let arr = Rc::new(Array::new());
        self.set_for(key, Object::Array(Rc::clone(&arr)));
        arr
    }

    /// Remove `key`, returning its previous value.
    pub fn remove_for(&self, key: &str) -> Option<Object> {
        self.check_unlocked();
        self.map.borrow_mut().shift_remove(key)
    }

    /// Copy the dictionary, skipping values already on the current clone path.
    pub fn clone_non_cyclic(
        &self,
        holder: Option<&dyn IndirectObjectHolder>,
        visited: &mut HashSet<usize>,
    ) -> Dictionary {
        visited.insert(self as *const Dictionary as *const u8 as usize);
        let copy = Dictionary::new();
        for (key, value) in self.entries() {
            if value.identity().is_some_and(|id| visited.contains(&id)) {
                continue;
            }
            let mut branch = visited.clone();
            if let Some(obj) = value.clone_non_cyclic(holder, &mut branch) {
                copy.map.borrow_mut().insert(key, obj);
            }
        }
        copy
    }

    pub(super) fn take_all(mut self) -> Vec<Object> {
        std::mem::take(self.map.get_mut()).into_values().collect()
    }

    fn check_unlocked(&self) {
        assert!(!self.is_locked(), "cannot mutate a locked dictionary");
    }
}

impl PartialEq for Dictionary {
    fn eq(&self, other: &Self) -> bool {
        if std::ptr::eq(self, other) {
            return true;
        }
        let a = self.map.borrow();
        let b = other.map.borrow();
        a.len() == b.len() && a.iter().all(|(k, v)| b.get(k) == Some(v))
    }
}

impl Drop for Dictionary {
    fn drop(&mut self) {
        self.obj_num.set(INVALID_OBJ_NUM);
        let children = std::mem::take(self.map.get_mut()).into_values().collect();
        release_children(children);
    }
}

/// Scoped iteration lock on a [`Dictionary`].
pub struct DictionaryLocker {
    dict: Rc<Dictionary>,
}

impl DictionaryLocker {
    /// Lock `dict` until the locker is dropped.
    pub fn new(dict: &Rc<Dictionary>) -> Self {
        dict.lock_count.set(dict.lock_count.get() + 1);
        Self {
            dict: Rc::clone(dict),
        }
    }

    /// Borrow the locked entries.
    pub fn map(&self) -> Ref<'_, IndexMap<String, Object>> {
        self.dict.map.borrow()
    }
}

impl Drop for DictionaryLocker {
    fn drop(&mut self) {
        self.dict.lock_count.set(self.dict.lock_count.get() - 1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::holder::{IndirectObjectHolder, MemoryHolder};

    #[test]
    fn test_set_and_get() {
        let dict = Dictionary::new();
        dict.set_for("Type", Object::name("Catalog"));
        dict.set_for("Count", Object::Integer(3));
        assert_eq!(dict.get("Type"), Some(Object::name("Catalog")));
        assert_eq!(dict.keys(), vec!["Type".to_string(), "Count".to_string()]);
        dict.set_for("Type", Object::name("Pages"));
        assert_eq!(dict.len(), 2);
        assert_eq!(dict.get("Type"), Some(Object::name("Pages")));
    }

    #[test]
    fn test_remove_for() {
        let dict = Dictionary::new();
        dict.set_for("A", Object::Integer(1));
        assert_eq!(dict.remove_for("A"), Some(Object::Integer(1)));
        assert_eq!(dict.remove_for("A"), None);
        assert!(dict.is_empty());
    }

    #[test]
    fn test_typed_getters_follow_references() {
        let holder = MemoryHolder::new();
        let target = Rc::new(Dictionary::new());
        target.set_for("Type", Object::name("Font"));
        let num = holder.add_indirect_object(Object::Dictionary(target));

        let dict = Dictionary::new();
        dict.set_for("Font", Object::reference(num));
        dict.set_for("Size", Object::Real(12.5));
        dict.set_for("Marked", Object::Boolean(true));

        let font = dict.get_dict_for("Font", &holder).unwrap();
        assert!(font.is_type("Font", &holder));
        assert_eq!(dict.get_integer_for("Size", &holder), Some(12));
        assert_eq!(dict.get_number_for("Size", &holder), Some(12.5));
        assert_eq!(dict.get_boolean_for("Marked", &holder), Some(true));
        assert!(dict.get_array_for("Font", &holder).is_none());
        assert!(dict.get_name_for("Missing", &holder).is_none());
    }

    #[test]
    fn test_text_round_trip() {
        let holder = MemoryHolder::new();
        let dict = Dictionary::new();
        dict.set_text_for("Lang", "en-US");
        assert_eq!(dict.get_string_for("Lang", &holder), Some(b"en-US".to_vec()));
        dict.set_text_for("Title", "Привет");
        assert_eq!(dict.get_unicode_text_for("Title", &holder), "Привет");
        assert_eq!(dict.get_unicode_text_for("Nothing", &holder), "");
    }

    #[test]
    fn test_equality_ignores_order() {
        let a = Dictionary::new();
        a.set_for("A", Object::Integer(1));
        a.set_for("B", Object::Integer(2));
        let b = Dictionary::new();
        b.set_for("B", Object::Integer(2));
        b.set_for("A", Object::Integer(1));
        assert_eq!(a, b);
    }

    #[test]
    #[should_panic(expected = "locked dictionary")]
    fn test_set_while_locked_panics() {
        let dict = Rc::new(Dictionary::new());
        let _locker = DictionaryLocker::new(&dict);
        dict.set_for("A", Object::Null);
    }

    #[test]
    fn test_clone_non_cyclic_drops_self_reference() {
        let holder = MemoryHolder::new();
        let dict = Rc::new(Dictionary::new());
        let num = holder.add_indirect_object(Object::Dictionary(Rc::clone(&dict)));
        dict.set_for("Self", Object::reference(num));
        dict.set_for("Value", Object::Integer(1));

        let copy = Object::Dictionary(dict).clone_direct_object(&holder);
        let copy = copy.as_dict().unwrap();
        assert!(copy.get("Self").is_none());
        assert_eq!(copy.get("Value"), Some(Object::Integer(1)));
        assert_eq!(copy.obj_num(), 0);
    }
}
