//! Indirect object storage.
//!
//! An [`IndirectObjectHolder`] maps object numbers to objects. Objects that
//! are not resident yet are produced on demand by
//! [`parse_indirect_object`](IndirectObjectHolder::parse_indirect_object),
//! which documents implement by reading from the cross-reference table.

use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::rc::Rc;

use crate::object::{Array, Dictionary, Object, INVALID_OBJ_NUM};

#[derive(Debug, Clone)]
struct Slot {
    // `None` while the object is being parsed.
    object: Option<Object>,
    gen: u16,
}

/// Object table shared by every holder implementation.
#[derive(Debug, Default)]
pub struct IndirectObjects {
    slots: RefCell<BTreeMap<u32, Slot>>,
    last_obj_num: Cell<u32>,
}

impl IndirectObjects {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Resident object numbers in ascending order.
    pub fn obj_nums(&self) -> Vec<u32> {
        self.slots
            .borrow()
            .iter()
            .filter(|(_, slot)| slot.object.is_some())
            .map(|(num, _)| *num)
            .collect()
    }

    /// Number of resident objects.
    pub fn len(&self) -> usize {
        self.slots.borrow().values().filter(|s| s.object.is_some()).count()
    }

    /// True when no object is resident.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Generation number recorded for `obj_num`.
    pub fn gen_num(&self, obj_num: u32) -> Option<u16> {
        self.slots.borrow().get(&obj_num).map(|s| s.gen)
    }

    fn bump_last(&self, obj_num: u32) {
        if obj_num > self.last_obj_num.get() {
            self.last_obj_num.set(obj_num);
        }
    }
}

/// Owner of a PDF object-number space.
///
/// All operations take `&self`; the table lives in a [`RefCell`] so that
/// lazily parsing one object may dereference others.
pub trait IndirectObjectHolder {
    /// Object table backing this holder.
    fn indirect_objects(&self) -> &IndirectObjects;

    /// Produce object `obj_num` from the underlying file.
    ///
    /// Called at most once per object number while no parse is in flight for
    /// that number. The default holder has no backing file.
    fn parse_indirect_object(&self, _obj_num: u32) -> Option<Object> {
        None
    }

    /// Resident object `obj_num`, without parsing.
    fn get_indirect_object(&self, obj_num: u32) -> Option<Object> {
        self.indirect_objects()
            .slots
            .borrow()
            .get(&obj_num)
            .and_then(|slot| slot.object.clone())
    }

    /// Resident object `obj_num`, parsing it first if necessary.
    ///
    /// Re-entrant requests for an object that is still being parsed return
    /// `None`, which breaks reference cycles during loading.
    fn get_or_parse_indirect_object(&self, obj_num: u32) -> Option<Object> {
        if obj_num == 0 || obj_num == INVALID_OBJ_NUM {
            return None;
        }
        let table = self.indirect_objects();
        {
            let mut slots = table.slots.borrow_mut();
            if let Some(slot) = slots.get(&obj_num) {
                return slot.object.clone();
            }
            slots.insert(obj_num, Slot { object: None, gen: 0 });
        }

        let parsed = self.parse_indirect_object(obj_num);
        let mut slots = table.slots.borrow_mut();
        match parsed {
            Some(obj) => {
                obj.set_obj_num(obj_num);
                table.bump_last(obj_num);
                let gen = slots.get(&obj_num).map(|s| s.gen).unwrap_or(0);
                slots.insert(
                    obj_num,
                    Slot {
                        object: Some(obj.clone()),
                        gen,
                    },
                );
                log::debug!("Parsed indirect object {}", obj_num);
                Some(obj)
            },
            None => {
                slots.remove(&obj_num);
                None
            },
        }
    }

    /// Store `obj` under the next free object number and return that number.
    ///
    /// # Panics
    ///
    /// Panics if `obj` is already stored under an object number.
    fn add_indirect_object(&self, obj: Object) -> u32 {
        assert!(obj.is_inline(), "object is already indirect");
        let table = self.indirect_objects();
        let obj_num = table.last_obj_num.get() + 1;
        table.last_obj_num.set(obj_num);
        obj.set_obj_num(obj_num);
        table.slots.borrow_mut().insert(
            obj_num,
            Slot {
                object: Some(obj),
                gen: 0,
            },
        );
        obj_num
    }

    /// Add `obj` as a new indirect object.
    ///
    /// Returns the new object number with the stored handle. Scalars are
    /// values and carry no number of their own, so reference them through
    /// the returned number.
    fn new_indirect(&self, obj: Object) -> (u32, Object) {
        let handle = obj.clone();
        let obj_num = self.add_indirect_object(obj);
        (obj_num, handle)
    }

    /// Add a fresh empty dictionary as a new indirect object.
    fn new_indirect_dictionary(&self) -> Rc<Dictionary> {
        let dict = Rc::new(Dictionary::new());
        self.add_indirect_object(Object::Dictionary(Rc::clone(&dict)));
        dict
    }

    /// Add a fresh empty array as a new indirect object.
    fn new_indirect_array(&self) -> Rc<Array> {
        let arr = Rc::new(Array::new());
        self.add_indirect_object(Object::Array(Rc::clone(&arr)));
        arr
    }

    /// Store `obj` as `obj_num` if the slot is empty or holds an older generation.
    ///
    /// Returns `true` when the object was stored.
    fn replace_indirect_object_if_higher_generation(&self, obj_num: u32, gen: u16, obj: Object) -> bool {
        if obj_num == 0 || obj_num == INVALID_OBJ_NUM {
            return false;
        }
        let table = self.indirect_objects();
        let mut slots = table.slots.borrow_mut();
        if let Some(existing) = slots.get(&obj_num) {
            if existing.object.is_some() && gen <= existing.gen {
                return false;
            }
        }
        if let Some(old) = slots.get(&obj_num).and_then(|s| s.object.as_ref()) {
            old.set_obj_num(INVALID_OBJ_NUM);
        }
        obj.set_obj_num(obj_num);
        slots.insert(
            obj_num,
            Slot {
                object: Some(obj),
                gen,
            },
        );
        table.bump_last(obj_num);
        true
    }

    /// Remove object `obj_num` from the table.
    fn delete_indirect_object(&self, obj_num: u32) {
        let removed = self.indirect_objects().slots.borrow_mut().remove(&obj_num);
        if let Some(obj) = removed.and_then(|slot| slot.object) {
            obj.set_obj_num(INVALID_OBJ_NUM);
        }
    }

    /// Highest object number ever stored or parsed.
    fn last_obj_num(&self) -> u32 {
        self.indirect_objects().last_obj_num.get()
    }

    /// Raise the highest object number, e.g. from a trailer `/Size`.
    fn set_last_obj_num(&self, obj_num: u32) {
        self.indirect_objects().bump_last(obj_num);
    }
}

/// In-memory holder with no backing file.
#[derive(Debug, Default)]
pub struct MemoryHolder {
    objects: IndirectObjects,
}

impl MemoryHolder {
    /// Create an empty holder.
    pub fn new() -> Self {
        Self::default()
    }
}

impl IndirectObjectHolder for MemoryHolder {
    fn indirect_objects(&self) -> &IndirectObjects {
        &self.objects
    }
}
