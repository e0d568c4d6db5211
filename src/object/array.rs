//! PDF array object with an iteration lock.

use std::cell::{Cell, Ref, RefCell};
use std::collections::HashSet;
use std::rc::Rc;

use super::{release_children, Dictionary, Object, Stream, INVALID_OBJ_NUM};
use crate::holder::IndirectObjectHolder;

/// Ordered sequence of PDF objects.
///
/// Structural mutation is forbidden while any [`ArrayLocker`] is alive for
/// the array; attempting it is a programming error and panics.
#[derive(Debug, Default)]
pub struct Array {
    objects: RefCell<Vec<Object>>,
    obj_num: Cell<u32>,
    lock_count: Cell<u32>,
}

impl Array {
    /// Create an empty inline array.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an inline array from existing objects.
    ///
    /// # Panics
    ///
    /// Panics if any object is a stream or an indirect container.
    pub fn from_objects(objects: Vec<Object>) -> Self {
        for obj in &objects {
            check_insertable(obj);
        }
        let array = Self::default();
        *array.objects.borrow_mut() = objects;
        array
    }

    /// Object number, `0` when inline.
    pub fn obj_num(&self) -> u32 {
        self.obj_num.get()
    }

    pub(crate) fn set_obj_num(&self, obj_num: u32) {
        self.obj_num.set(obj_num);
    }

    /// Number of elements.
    pub fn len(&self) -> usize {
        self.objects.borrow().len()
    }

    /// True if the array has no elements.
    pub fn is_empty(&self) -> bool {
        self.objects.borrow().is_empty()
    }

    /// True while at least one [`ArrayLocker`] is alive.
    pub fn is_locked(&self) -> bool {
        self.lock_count.get() > 0
    }

    /// Element at `index`, or `None` when out of range.
    pub fn get_object_at(&self, index: usize) -> Option<Object> {
        self.objects.borrow().get(index).cloned()
    }

    /// Element at `index` with references resolved through `holder`.
    pub fn get_direct_object_at(
        &self,
        index: usize,
        holder: &dyn IndirectObjectHolder,
    ) -> Option<Object> {
        self.get_object_at(index)?.get_direct(holder)
    }

    /// Dictionary at `index` (stream dictionaries included).
    pub fn get_dict_at(&self, index: usize, holder: &dyn IndirectObjectHolder) -> Option<Rc<Dictionary>> {
        self.get_direct_object_at(index, holder)?.as_dict_rc()
    }

    /// Array at `index`.
    pub fn get_array_at(&self, index: usize, holder: &dyn IndirectObjectHolder) -> Option<Rc<Array>> {
        self.get_direct_object_at(index, holder)?.as_array().cloned()
    }

    /// Stream at `index`.
    pub fn get_stream_at(&self, index: usize, holder: &dyn IndirectObjectHolder) -> Option<Rc<Stream>> {
        self.get_direct_object_at(index, holder)?.as_stream().cloned()
    }

    /// Integer at `index`, `0` when missing or not a number.
    pub fn get_integer_at(&self, index: usize, holder: &dyn IndirectObjectHolder) -> i64 {
        self.get_direct_object_at(index, holder)
            .and_then(|obj| obj.as_number())
            .map(|n| n as i64)
            .unwrap_or(0)
    }

    /// Number at `index`, `0.0` when missing or not a number.
    pub fn get_number_at(&self, index: usize, holder: &dyn IndirectObjectHolder) -> f64 {
        self.get_direct_object_at(index, holder)
            .and_then(|obj| obj.as_number())
            .unwrap_or(0.0)
    }

    /// Name at `index`.
    pub fn get_name_at(&self, index: usize, holder: &dyn IndirectObjectHolder) -> Option<String> {
        self.get_direct_object_at(index, holder)?
            .as_name()
            .map(str::to_string)
    }

    /// Index of the first element identical to `obj`.
    ///
    /// Containers match by identity, scalars by value.
    pub fn find(&self, obj: &Object) -> Option<usize> {
        self.objects.borrow().iter().position(|candidate| match obj.identity() {
            Some(_) => candidate.ptr_eq(obj),
            None => candidate == obj,
        })
    }

    /// True if [`find`](Self::find) would succeed.
    pub fn contains(&self, obj: &Object) -> bool {
        self.find(obj).is_some()
    }

    /// Remove every element.
    pub fn clear(&self) {
        self.check_unlocked();
        let removed = std::mem::take(&mut *self.objects.borrow_mut());
        release_children(removed);
    }

    /// Remove the element at `index`. Out-of-range indices are ignored.
    pub fn remove_at(&self, index: usize) {
        self.check_unlocked();
        let removed = {
            let mut objects = self.objects.borrow_mut();
            if index >= objects.len() {
                return;
            }
            objects.remove(index)
        };
        release_children(vec![removed]);
    }

    /// Replace the element at `index`. Returns `false` when out of range.
    ///
    /// # Panics
    ///
    /// Panics if the array is locked or `obj` is a stream or indirect container.
    pub fn set_at(&self, index: usize, obj: Object) -> bool {
        self.check_unlocked();
        check_insertable(&obj);
        let old = {
            let mut objects = self.objects.borrow_mut();
            match objects.get_mut(index) {
                Some(slot) => std::mem::replace(slot, obj),
                None => return false,
            }
        };
        release_children(vec![old]);
        true
    }

    /// Insert before `index`; `index == len()` appends. Returns `false`
    /// when `index > len()`.
    ///
    /// # Panics
    ///
    /// Panics if the array is locked or `obj` is a stream or indirect container.
    pub fn insert_at(&self, index: usize, obj: Object) -> bool {
        self.check_unlocked();
        check_insertable(&obj);
        let mut objects = self.objects.borrow_mut();
        if index > objects.len() {
            return false;
        }
        objects.insert(index, obj);
        true
    }

    /// Append an element.
    ///
    /// # Panics
    ///
    /// Panics if the array is locked or `obj` is a stream or indirect container.
    pub fn append(&self, obj: Object) {
        self.check_unlocked();
        check_insertable(&obj);
        self.objects.borrow_mut().push(obj);
    }

    /// Snapshot of the elements.
    pub fn to_vec(&self) -> Vec<Object> {
        self.objects.borrow().clone()
    }

    /// Copy the array, skipping children already on the current clone path.
    pub fn clone_non_cyclic(
        &self,
        holder: Option<&dyn IndirectObjectHolder>,
        visited: &mut HashSet<usize>,
    ) -> Array {
        visited.insert(self as *const Array as *const u8 as usize);
        let copy = Array::new();
        for value in self.objects.borrow().iter() {
            if value.identity().is_some_and(|id| visited.contains(&id)) {
                continue;
            }
            let mut branch = visited.clone();
            if let Some(obj) = value.clone_non_cyclic(holder, &mut branch) {
                copy.objects.borrow_mut().push(obj);
            }
        }
        copy
    }

    pub(super) fn take_all(mut self) -> Vec<Object> {
        std::mem::take(self.objects.get_mut())
    }

    fn check_unlocked(&self) {
        assert!(!self.is_locked(), "cannot mutate a locked array");
    }
}

fn check_insertable(obj: &Object) {
    assert!(!obj.is_stream(), "streams must be stored indirectly");
    assert!(obj.is_inline(), "only inline objects may be stored in a container");
}

impl PartialEq for Array {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self, other) || *self.objects.borrow() == *other.objects.borrow()
    }
}

impl Drop for Array {
    fn drop(&mut self) {
        self.obj_num.set(INVALID_OBJ_NUM);
        release_children(std::mem::take(self.objects.get_mut()));
    }
}

/// Scoped iteration lock on an [`Array`].
///
/// While the locker is alive the array cannot be structurally modified.
pub struct ArrayLocker {
    array: Rc<Array>,
}

impl ArrayLocker {
    /// Lock `array` until the locker is dropped.
    pub fn new(array: &Rc<Array>) -> Self {
        array.lock_count.set(array.lock_count.get() + 1);
        Self {
            array: Rc::clone(array),
        }
    }

    /// Borrow the locked elements.
    pub fn objects(&self) -> Ref<'_, [Object]> {
        Ref::map(self.array.objects.borrow(), |v| v.as_slice())
    }

    /// Iterate over a snapshot of the locked elements.
    pub fn iter(&self) -> std::vec::IntoIter<Object> {
        self.array.to_vec().into_iter()
    }
}

impl Drop for ArrayLocker {
    fn drop(&mut self) {
        self.array.lock_count.set(self.array.lock_count.get() - 1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::holder::{IndirectObjectHolder, MemoryHolder};
    use proptest::prelude::*;

    fn int_array(values: &[i64]) -> Rc<Array> {
        let arr = Rc::new(Array::new());
        for v in values {
            arr.append(Object::Integer(*v));
        }
        arr
    }

    #[test]
    fn test_get_object_at_out_of_range() {
        let arr = int_array(&[1, 2, 3]);
        assert_eq!(arr.get_object_at(2), Some(Object::Integer(3)));
        assert_eq!(arr.get_object_at(3), None);
        assert_eq!(arr.get_object_at(usize::MAX), None);
    }

    #[test]
    fn test_remove_at() {
        let arr = int_array(&[1, 2, 3, 4]);
        arr.remove_at(1);
        assert_eq!(arr.to_vec(), vec![Object::Integer(1), Object::Integer(3), Object::Integer(4)]);
        arr.remove_at(10);
        assert_eq!(arr.len(), 3);
    }

    #[test]
    fn test_insert_at() {
        let arr = int_array(&[1, 3]);
        assert!(arr.insert_at(1, Object::Integer(2)));
        assert!(arr.insert_at(3, Object::Integer(4)));
        assert!(!arr.insert_at(10, Object::Integer(5)));
        assert_eq!(
            arr.to_vec(),
            vec![Object::Integer(1), Object::Integer(2), Object::Integer(3), Object::Integer(4)]
        );
    }

    #[test]
    fn test_set_at() {
        let arr = int_array(&[1, 2]);
        assert!(arr.set_at(0, Object::name("First")));
        assert!(!arr.set_at(2, Object::Null));
        assert_eq!(arr.get_object_at(0), Some(Object::name("First")));
    }

    #[test]
    fn test_clear() {
        let arr = int_array(&[1, 2, 3]);
        arr.clear();
        assert!(arr.is_empty());
    }

    #[test]
    fn test_from_objects_keeps_order() {
        let arr = Array::from_objects(vec![Object::Integer(7), Object::name("N"), Object::reference(3)]);
        assert_eq!(arr.len(), 3);
        assert_eq!(arr.obj_num(), 0);
        assert_eq!(arr.get_object_at(0), Some(Object::Integer(7)));
        assert_eq!(arr.get_object_at(2), Some(Object::reference(3)));
    }

    #[test]
    #[should_panic(expected = "only inline objects")]
    fn test_from_objects_rejects_indirect_containers() {
        let holder = MemoryHolder::new();
        let dict = holder.new_indirect_dictionary();
        Array::from_objects(vec![Object::Dictionary(dict)]);
    }

    #[test]
    fn test_find_and_contains() {
        let arr = int_array(&[5, 6]);
        let dict = Object::Dictionary(Rc::new(Dictionary::new()));
        arr.append(dict.clone());
        assert_eq!(arr.find(&Object::Integer(6)), Some(1));
        assert_eq!(arr.find(&dict), Some(2));
        assert!(!arr.contains(&Object::Dictionary(Rc::new(Dictionary::new()))));
    }

    #[test]
    fn test_typed_getters_resolve_references() {
        let holder = MemoryHolder::new();
        let num = holder.add_indirect_object(Object::Integer(42));
        let arr = Rc::new(Array::new());
        arr.append(Object::reference(num));
        arr.append(Object::Real(1.5));
        arr.append(Object::name("Fit"));
        assert_eq!(arr.get_integer_at(0, &holder), 42);
        assert_eq!(arr.get_number_at(1, &holder), 1.5);
        assert_eq!(arr.get_name_at(2, &holder).as_deref(), Some("Fit"));
        assert!(arr.get_dict_at(0, &holder).is_none());
        assert_eq!(arr.get_integer_at(9, &holder), 0);
    }

    #[test]
    fn test_locker_lifetime() {
        let arr = int_array(&[1]);
        {
            let locker = ArrayLocker::new(&arr);
            assert!(arr.is_locked());
            assert_eq!(locker.objects().len(), 1);
            let nested = ArrayLocker::new(&arr);
            drop(nested);
            assert!(arr.is_locked());
        }
        assert!(!arr.is_locked());
        arr.append(Object::Integer(2));
        assert_eq!(arr.len(), 2);
    }

    #[test]
    #[should_panic(expected = "locked array")]
    fn test_append_while_locked_panics() {
        let arr = int_array(&[1]);
        let _locker = ArrayLocker::new(&arr);
        arr.append(Object::Integer(2));
    }

    #[test]
    #[should_panic(expected = "locked array")]
    fn test_clear_while_locked_panics() {
        let arr = int_array(&[1]);
        let _locker = ArrayLocker::new(&arr);
        arr.clear();
    }

    #[test]
    #[should_panic(expected = "streams must be stored indirectly")]
    fn test_append_stream_panics() {
        let arr = Array::new();
        let stream = Stream::new(Rc::new(Dictionary::new()), Vec::new());
        arr.append(Object::Stream(Rc::new(stream)));
    }

    #[test]
    #[should_panic(expected = "only inline objects")]
    fn test_append_indirect_container_panics() {
        let holder = MemoryHolder::new();
        let dict = Rc::new(Dictionary::new());
        holder.add_indirect_object(Object::Dictionary(Rc::clone(&dict)));
        Array::new().append(Object::Dictionary(dict));
    }

    #[test]
    fn test_clone_skips_visited_children() {
        let holder = MemoryHolder::new();
        let arr = Rc::new(Array::new());
        let num = holder.add_indirect_object(Object::Array(Rc::clone(&arr)));
        arr.append(Object::Integer(1));
        arr.append(Object::reference(num));

        let copy = Object::Array(Rc::clone(&arr)).clone_direct_object(&holder);
        assert_eq!(copy.as_array().unwrap().to_vec(), vec![Object::Integer(1)]);

        let shallow = Object::Array(arr).clone_object();
        assert_eq!(shallow.as_array().unwrap().len(), 2);
    }

    #[derive(Debug, Clone)]
    enum Mutation {
        Clear,
        RemoveAt(usize),
        SetAt(usize),
        InsertAt(usize),
        Append,
    }

    fn mutation_strategy() -> impl Strategy<Value = Mutation> {
        prop_oneof![
            Just(Mutation::Clear),
            (0usize..8).prop_map(Mutation::RemoveAt),
            (0usize..8).prop_map(Mutation::SetAt),
            (0usize..8).prop_map(Mutation::InsertAt),
            Just(Mutation::Append),
        ]
    }

    proptest! {
        #[test]
        fn test_locked_array_rejects_every_mutation(
            len in 0usize..6,
            mutation in mutation_strategy(),
        ) {
            let values: Vec<i64> = (0..len as i64).collect();
            let arr = int_array(&values);
            let _locker = ArrayLocker::new(&arr);
            let target = Rc::clone(&arr);
            let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(move || {
                match mutation {
                    Mutation::Clear => target.clear(),
                    Mutation::RemoveAt(i) => target.remove_at(i),
                    Mutation::SetAt(i) => {
                        target.set_at(i, Object::Null);
                    },
                    Mutation::InsertAt(i) => {
                        target.insert_at(i, Object::Null);
                    },
                    Mutation::Append => target.append(Object::Null),
                }
            }));
            prop_assert!(result.is_err());
            prop_assert_eq!(arr.len(), len);
        }
    }
}
