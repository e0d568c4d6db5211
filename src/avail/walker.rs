//! Pre-order traversal of a direct object tree.
//!
//! The walker visits a root object and then every object stored inside it,
//! depth first. References are yielded but not followed.

use crate::object::Object;

struct SubobjectIterator {
    object: Object,
    children: Vec<(String, Object)>,
    index: usize,
}

impl SubobjectIterator {
    fn new(object: &Object) -> Option<Self> {
        let children = match object {
            Object::Array(arr) => arr.to_vec().into_iter().map(|o| (String::new(), o)).collect(),
            Object::Dictionary(dict) => dict.entries(),
            Object::Stream(stream) => vec![(String::new(), Object::Dictionary(stream.dict_rc()))],
            _ => return None,
        };
        Some(Self {
            object: object.clone(),
            children,
            index: 0,
        })
    }

    fn is_started(&self) -> bool {
        self.index > 0
    }

    fn is_finished(&self) -> bool {
        self.index >= self.children.len()
    }

    fn increment(&mut self) -> (String, Object) {
        let item = self.children[self.index].clone();
        self.index += 1;
        item
    }
}

/// Depth-first walker over an object and its direct children.
pub struct ObjectWalker {
    next_object: Option<Object>,
    parent: Option<Object>,
    dict_key: String,
    depth: usize,
    stack: Vec<SubobjectIterator>,
}

impl ObjectWalker {
    /// Walk `root` and everything it contains.
    pub fn new(root: Object) -> Self {
        Self {
            next_object: Some(root),
            parent: None,
            dict_key: String::new(),
            depth: 0,
            stack: Vec::new(),
        }
    }

    /// Next object in pre-order, or `None` when the walk is complete.
    pub fn next_object(&mut self) -> Option<Object> {
        loop {
            if let Some(obj) = self.next_object.take() {
                if let Some(it) = SubobjectIterator::new(&obj) {
                    self.stack.push(it);
                }
                return Some(obj);
            }
            let top = self.stack.last_mut()?;
            if top.is_finished() {
                self.stack.pop();
                if self.stack.is_empty() {
                    self.parent = None;
                    self.dict_key.clear();
                    self.depth = 0;
                    return None;
                }
                continue;
            }
            let (key, child) = top.increment();
            self.dict_key = if top.object.is_dictionary() { key } else { String::new() };
            self.parent = Some(top.object.clone());
            self.next_object = Some(child);
            self.depth = self.stack.len();
        }
    }

    /// Do not descend into the object most recently returned.
    ///
    /// Has no effect when that object is not a container.
    pub fn skip_walk_into_current_object(&mut self) {
        if self.stack.last().is_some_and(|top| !top.is_started()) {
            self.stack.pop();
        }
    }

    /// Container holding the object most recently returned.
    pub fn parent(&self) -> Option<&Object> {
        self.parent.as_ref()
    }

    /// Key under which the current object is stored, empty outside dictionaries.
    pub fn dictionary_key(&self) -> &str {
        &self.dict_key
    }

    /// Nesting depth of the current object; the root is at depth 0.
    pub fn current_depth(&self) -> usize {
        self.depth
    }
}

impl Iterator for ObjectWalker {
    type Item = Object;

    fn next(&mut self) -> Option<Object> {
        self.next_object()
    }
}
