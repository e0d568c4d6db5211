//! Availability of an object and everything it references.

use std::collections::BTreeSet;
use std::rc::Rc;

use super::{DocAvailStatus, ObjectWalker, ReadValidator};
use crate::holder::IndirectObjectHolder;
use crate::object::{Object, INVALID_OBJ_NUM};

/// Predicate deciding whether an object (and its subtree) may be ignored.
///
/// The predicate may dereference objects through the holder; if that read
/// hits missing data the verdict is treated as pending.
pub type ExcludeFn<'h> = Box<dyn Fn(&Object, &dyn IndirectObjectHolder) -> bool + 'h>;

/// Incremental checker for "is this object fully downloaded".
///
/// Each [`check_avail`](Self::check_avail) call loads whatever has become
/// readable since the previous call and remembers the objects that are still
/// missing. Objects reached through a `/Parent` key are not required.
pub struct ObjectAvail<'h> {
    validator: Rc<ReadValidator>,
    holder: &'h dyn IndirectObjectHolder,
    root: Option<Object>,
    parsed_objnums: BTreeSet<u32>,
    non_parsed_objects: Vec<u32>,
    exclude: Option<ExcludeFn<'h>>,
}

impl<'h> ObjectAvail<'h> {
    /// Check indirect object `obj_num`.
    pub fn new(validator: Rc<ReadValidator>, holder: &'h dyn IndirectObjectHolder, obj_num: u32) -> Self {
        Self::with_root(validator, holder, Object::reference(obj_num))
    }

    /// Check `root`, which may be an inline object.
    pub fn with_root(validator: Rc<ReadValidator>, holder: &'h dyn IndirectObjectHolder, root: Object) -> Self {
        let mut parsed_objnums = BTreeSet::new();
        let num = root.obj_num();
        if num != 0 && num != INVALID_OBJ_NUM {
            parsed_objnums.insert(num);
        }
        Self {
            validator,
            holder,
            root: Some(root),
            parsed_objnums,
            non_parsed_objects: Vec::new(),
            exclude: None,
        }
    }

    /// Install an exclusion predicate. The root is never excluded.
    pub fn with_exclusion(
        mut self,
        exclude: impl Fn(&Object, &dyn IndirectObjectHolder) -> bool + 'h,
    ) -> Self {
        self.exclude = Some(Box::new(exclude));
        self
    }

    /// Current verdict. Calling it again without new data gives the same answer.
    pub fn check_avail(&mut self) -> DocAvailStatus {
        if !self.load_root_object() {
            return DocAvailStatus::DataNotAvailable;
        }
        if self.check_objects() {
            self.clean_memory();
            return DocAvailStatus::DataAvailable;
        }
        DocAvailStatus::DataNotAvailable
    }

    fn load_root_object(&mut self) -> bool {
        if !self.non_parsed_objects.is_empty() {
            return true;
        }
        while let Some(Object::Reference(r)) = &self.root {
            let ref_obj_num = r.id;
            if self.has_object_parsed(ref_obj_num) {
                self.root = None;
                return true;
            }
            let direct = {
                let _session = self.validator.scoped_session();
                let direct = self.holder.get_or_parse_indirect_object(ref_obj_num);
                if self.validator.has_read_problems() {
                    return false;
                }
                direct
            };
            self.parsed_objnums.insert(ref_obj_num);
            self.root = direct;
        }

        let mut refs = Vec::new();
        if self.append_object_sub_refs(self.root.clone(), &mut refs) {
            self.non_parsed_objects = refs;
            return true;
        }
        false
    }

    fn check_objects(&mut self) -> bool {
        let mut checked = BTreeSet::new();
        let mut to_check = std::mem::take(&mut self.non_parsed_objects);
        while let Some(obj_num) = to_check.pop() {
            if self.has_object_parsed(obj_num) || !checked.insert(obj_num) {
                continue;
            }
            let session = self.validator.scoped_session();
            let direct = self.holder.get_or_parse_indirect_object(obj_num);
            if let (Some(d), Some(root)) = (&direct, &self.root) {
                if d.ptr_eq(root) {
                    continue;
                }
            }
            if self.validator.has_read_problems() || !self.append_object_sub_refs(direct, &mut to_check) {
                log::trace!("Object {} is not available yet", obj_num);
                self.non_parsed_objects.push(obj_num);
                continue;
            }
            drop(session);
            self.parsed_objnums.insert(obj_num);
        }
        self.non_parsed_objects.is_empty()
    }

    fn append_object_sub_refs(&self, object: Option<Object>, refs: &mut Vec<u32>) -> bool {
        let Some(object) = object else {
            return true;
        };
        let mut walker = ObjectWalker::new(object);
        while let Some(obj) = walker.next_object() {
            let _session = self.validator.scoped_session();
            let is_root = self.root.as_ref().is_some_and(|root| obj.ptr_eq(root));
            // The exclusion predicate may read from the file, so its result
            // only counts if no read problem occurred while computing it.
            let skip = (walker.parent().is_some() && is_root)
                || walker.dictionary_key() == "Parent"
                || (!is_root && self.exclude_object(&obj));
            if self.validator.has_read_problems() {
                return false;
            }
            if skip {
                walker.skip_walk_into_current_object();
                continue;
            }
            if let Object::Reference(r) = obj {
                if r.id != 0 && !self.has_object_parsed(r.id) {
                    refs.push(r.id);
                }
            }
        }
        true
    }

    fn exclude_object(&self, obj: &Object) -> bool {
        self.exclude.as_ref().is_some_and(|exclude| exclude(obj, self.holder))
    }

    fn has_object_parsed(&self, obj_num: u32) -> bool {
        self.parsed_objnums.contains(&obj_num)
    }

    fn clean_memory(&mut self) {
        self.root = None;
        self.parsed_objnums.clear();
    }
}

/// Availability of a single page, ignoring every other page it links to.
pub struct PageObjectAvail;

impl PageObjectAvail {
    /// Checker for the page stored as `obj_num`.
    pub fn new<'h>(
        validator: Rc<ReadValidator>,
        holder: &'h dyn IndirectObjectHolder,
        obj_num: u32,
    ) -> ObjectAvail<'h> {
        ObjectAvail::new(validator, holder, obj_num).with_exclusion(is_page_dictionary)
    }

    /// Checker for an already loaded page dictionary.
    pub fn with_root<'h>(
        validator: Rc<ReadValidator>,
        holder: &'h dyn IndirectObjectHolder,
        root: Object,
    ) -> ObjectAvail<'h> {
        ObjectAvail::with_root(validator, holder, root).with_exclusion(is_page_dictionary)
    }
}

fn is_page_dictionary(obj: &Object, holder: &dyn IndirectObjectHolder) -> bool {
    obj.get_dict(holder).is_some_and(|dict| dict.is_type("Page", holder))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::holder::IndirectObjects;
    use crate::io::SeekableReadStream;
    use crate::object::{Array, Dictionary};
    use std::cell::RefCell;
    use std::collections::BTreeMap;

    struct InvalidReadStream;

    impl SeekableReadStream for InvalidReadStream {
        fn get_size(&self) -> u64 {
            100
        }

        fn read_block_at_offset(&self, _buffer: &mut [u8], _offset: u64) -> bool {
            false
        }
    }

    #[derive(Clone, Copy, PartialEq)]
    enum State {
        Unavailable,
        Available,
    }

    struct TestHolder {
        objects: IndirectObjects,
        validator: Rc<ReadValidator>,
        data: RefCell<BTreeMap<u32, (Object, State)>>,
    }

    impl TestHolder {
        fn new() -> Self {
            Self {
                objects: IndirectObjects::new(),
                validator: Rc::new(ReadValidator::new(Rc::new(InvalidReadStream), None)),
                data: RefCell::new(BTreeMap::new()),
            }
        }

        fn add_object(&self, num: u32, obj: Object, state: State) {
            self.data.borrow_mut().insert(num, (obj, state));
        }

        fn set_state(&self, num: u32, state: State) {
            if let Some(entry) = self.data.borrow_mut().get_mut(&num) {
                entry.1 = state;
            }
        }

        fn dict(&self, num: u32) -> Rc<Dictionary> {
            self.data.borrow()[&num].0.as_dict_rc().unwrap()
        }

        fn array(&self, num: u32) -> Rc<Array> {
            self.data.borrow()[&num].0.as_array().unwrap().clone()
        }

        fn simulate_read_error(&self) {
            self.validator.read_block_at_offset(&mut [], 0);
        }
    }

    impl IndirectObjectHolder for TestHolder {
        fn indirect_objects(&self) -> &IndirectObjects {
            &self.objects
        }

        fn parse_indirect_object(&self, obj_num: u32) -> Option<Object> {
            let (obj, state) = self.data.borrow().get(&obj_num).cloned()?;
            if state == State::Unavailable {
                self.simulate_read_error();
                return None;
            }
            Some(obj)
        }
    }

    fn new_dict() -> Object {
        Object::Dictionary(Rc::new(Dictionary::new()))
    }

    fn new_string(s: &str) -> Object {
        Object::string(s.as_bytes().to_vec())
    }

    fn exclude_type_key(obj: &Object, holder: &dyn IndirectObjectHolder) -> bool {
        match obj {
            Object::Dictionary(dict) => dict
                .get_direct("Type", holder)
                .is_some_and(|ty| ty.get_unicode_text() == "Exclude me"),
            _ => false,
        }
    }

    #[test]
    fn test_one_object() {
        let holder = TestHolder::new();
        holder.add_object(1, new_string("string"), State::Unavailable);
        let mut avail = ObjectAvail::new(holder.validator.clone(), &holder, 1);
        assert_eq!(avail.check_avail(), DocAvailStatus::DataNotAvailable);
        holder.set_state(1, State::Available);
        assert_eq!(avail.check_avail(), DocAvailStatus::DataAvailable);
    }

    #[test]
    fn test_one_referenced_object() {
        let holder = TestHolder::new();
        holder.add_object(1, Object::reference(2), State::Unavailable);
        holder.add_object(2, new_string("Data"), State::Unavailable);
        let mut avail = ObjectAvail::new(holder.validator.clone(), &holder, 1);
        assert_eq!(avail.check_avail(), DocAvailStatus::DataNotAvailable);

        holder.set_state(1, State::Available);
        assert_eq!(avail.check_avail(), DocAvailStatus::DataNotAvailable);

        holder.set_state(2, State::Available);
        assert_eq!(avail.check_avail(), DocAvailStatus::DataAvailable);
    }

    #[test]
    fn test_cycled_references() {
        let holder = TestHolder::new();
        holder.add_object(1, Object::reference(2), State::Unavailable);
        holder.add_object(2, Object::reference(3), State::Unavailable);
        holder.add_object(3, Object::reference(1), State::Unavailable);

        let mut avail = ObjectAvail::new(holder.validator.clone(), &holder, 1);
        assert_eq!(avail.check_avail(), DocAvailStatus::DataNotAvailable);

        holder.set_state(1, State::Available);
        assert_eq!(avail.check_avail(), DocAvailStatus::DataNotAvailable);

        holder.set_state(2, State::Available);
        assert_eq!(avail.check_avail(), DocAvailStatus::DataNotAvailable);

        holder.set_state(3, State::Available);
        assert_eq!(avail.check_avail(), DocAvailStatus::DataAvailable);
    }

    #[test]
    fn test_do_not_check_parent() {
        let holder = TestHolder::new();
        holder.add_object(1, new_dict(), State::Unavailable);
        holder.add_object(2, new_dict(), State::Unavailable);
        holder.dict(2).set_for("Parent", Object::reference(1));

        let mut avail = ObjectAvail::new(holder.validator.clone(), &holder, 2);
        assert_eq!(avail.check_avail(), DocAvailStatus::DataNotAvailable);

        holder.set_state(2, State::Available);
        // Available even though the parent is still missing.
        assert_eq!(avail.check_avail(), DocAvailStatus::DataAvailable);
    }

    #[test]
    fn test_generic() {
        let holder = TestHolder::new();
        const DEPTH: u32 = 100;
        for i in 1..DEPTH {
            holder.add_object(i, new_dict(), State::Unavailable);
            holder.dict(i).set_for("Child", Object::reference(i + 1));
        }
        holder.add_object(DEPTH, new_dict(), State::Unavailable);

        let mut avail = ObjectAvail::new(holder.validator.clone(), &holder, 1);
        for i in 1..=DEPTH {
            assert_eq!(avail.check_avail(), DocAvailStatus::DataNotAvailable);
            holder.set_state(i, State::Available);
        }
        assert_eq!(avail.check_avail(), DocAvailStatus::DataAvailable);
    }

    #[test]
    fn test_not_exclude_root() {
        let holder = TestHolder::new();
        holder.add_object(1, new_dict(), State::Available);
        holder.dict(1).set_for("Type", new_string("Exclude me"));
        holder.dict(1).set_for("OtherData", Object::reference(2));
        holder.add_object(2, new_string("Data"), State::Unavailable);

        let mut avail =
            ObjectAvail::new(holder.validator.clone(), &holder, 1).with_exclusion(exclude_type_key);
        assert_eq!(avail.check_avail(), DocAvailStatus::DataNotAvailable);
        holder.set_state(2, State::Available);
        assert_eq!(avail.check_avail(), DocAvailStatus::DataAvailable);
    }

    #[test]
    fn test_not_exclude_refered_root() {
        let holder = TestHolder::new();
        holder.add_object(1, Object::reference(2), State::Available);
        holder.add_object(2, new_dict(), State::Available);
        holder.dict(2).set_for("Type", new_string("Exclude me"));
        holder.dict(2).set_for("OtherData", Object::reference(3));
        holder.add_object(3, new_string("Data"), State::Unavailable);

        let mut avail =
            ObjectAvail::new(holder.validator.clone(), &holder, 1).with_exclusion(exclude_type_key);
        assert_eq!(avail.check_avail(), DocAvailStatus::DataNotAvailable);
        holder.set_state(3, State::Available);
        assert_eq!(avail.check_avail(), DocAvailStatus::DataAvailable);
    }

    #[test]
    fn test_exclude() {
        let holder = TestHolder::new();
        holder.add_object(1, new_dict(), State::Available);
        holder.dict(1).set_for("ArrayRef", Object::reference(2));
        holder.add_object(2, Object::Array(Rc::new(Array::new())), State::Available);
        holder.array(2).append(Object::reference(3));
        // Only reachable through the excluded array.
        holder.add_object(3, new_string("Not available string"), State::Unavailable);

        let mut avail = ObjectAvail::new(holder.validator.clone(), &holder, 1)
            .with_exclusion(|obj, _| obj.is_array());
        assert_eq!(avail.check_avail(), DocAvailStatus::DataAvailable);
    }

    #[test]
    fn test_read_error_on_exclude() {
        let holder = TestHolder::new();
        holder.add_object(1, new_dict(), State::Available);
        holder.dict(1).set_for("DictRef", Object::reference(2));
        holder.add_object(2, new_dict(), State::Available);
        holder.dict(2).set_for("Type", Object::reference(3));
        // The exclusion check needs object 3.
        holder.add_object(3, new_string("Exclude me"), State::Unavailable);
        holder.dict(2).set_for("OtherData", Object::reference(4));
        holder.add_object(4, new_string("Data"), State::Unavailable);

        let mut avail =
            ObjectAvail::new(holder.validator.clone(), &holder, 1).with_exclusion(exclude_type_key);
        assert_eq!(avail.check_avail(), DocAvailStatus::DataNotAvailable);

        holder.set_state(3, State::Available);
        // Object 4 sits inside the excluded dictionary.
        assert_eq!(avail.check_avail(), DocAvailStatus::DataAvailable);
    }

    #[test]
    fn test_ignore_not_exists_object() {
        let holder = TestHolder::new();
        holder.add_object(1, new_dict(), State::Available);
        holder.dict(1).set_for("NotExistsObjRef", Object::reference(2));
        let mut avail = ObjectAvail::new(holder.validator.clone(), &holder, 1);
        assert_eq!(avail.check_avail(), DocAvailStatus::DataAvailable);
    }

    #[test]
    fn test_check_twice() {
        let holder = TestHolder::new();
        holder.add_object(1, new_string("string"), State::Unavailable);
        let mut avail = ObjectAvail::new(holder.validator.clone(), &holder, 1);
        let first = avail.check_avail();
        assert_eq!(first, avail.check_avail());

        holder.set_state(1, State::Available);
        let first = avail.check_avail();
        assert_eq!(first, avail.check_avail());
    }

    #[test]
    fn test_self_refered_inlined_object() {
        let holder = TestHolder::new();
        holder.add_object(1, new_dict(), State::Available);
        holder.dict(1).set_for("Data", Object::reference(2));
        let root = holder.dict(1).set_new_dictionary_for("Dict");
        root.set_for("Self", Object::reference(1));
        holder.add_object(2, new_string("Data"), State::Unavailable);

        let mut avail = ObjectAvail::with_root(holder.validator.clone(), &holder, Object::Dictionary(root));
        assert_eq!(avail.check_avail(), DocAvailStatus::DataNotAvailable);

        holder.set_state(2, State::Available);
        assert_eq!(avail.check_avail(), DocAvailStatus::DataAvailable);
    }

    #[test]
    fn test_page_avail_skips_sibling_pages() {
        let holder = TestHolder::new();
        holder.add_object(1, new_dict(), State::Available);
        holder.dict(1).set_for("Type", Object::name("Page"));
        holder.dict(1).set_for("Next", Object::reference(2));
        holder.dict(1).set_for("Contents", Object::reference(3));
        holder.add_object(2, new_dict(), State::Available);
        holder.dict(2).set_for("Type", Object::name("Page"));
        holder.dict(2).set_for("Contents", Object::reference(4));
        holder.add_object(3, new_string("content"), State::Unavailable);
        holder.add_object(4, new_string("other"), State::Unavailable);

        let mut avail = PageObjectAvail::new(holder.validator.clone(), &holder, 1);
        assert_eq!(avail.check_avail(), DocAvailStatus::DataNotAvailable);
        holder.set_state(3, State::Available);
        assert_eq!(avail.check_avail(), DocAvailStatus::DataAvailable);
    }
}
