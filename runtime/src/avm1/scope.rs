//! The AVM1 scope chain (§4.6.3's `GetVariable`/`SetVariable`/`DefineLocal`
//! rules): an ordered list of variable objects, searched innermost-first.
//! The outermost entry is the clip's persistent variable scope; deeper
//! entries are pushed by `with`/function-call constructs.

use crate::gc::{GcPtr, Heap};

use super::value::Value;

/// A chain of `ScriptObject` variable frames, innermost last. Cloning a
/// `Scope` clones the `Vec` of pointers, not the objects they point at — two
/// clones still see writes through either one, since both point into the
/// same heap slots.
#[derive(Debug, Clone)]
pub struct Scope {
    chain: Vec<GcPtr>,
}

impl Scope {
    /// A scope with just the clip's persistent variable object as its sole,
    /// outermost (and innermost) frame.
    pub fn new(persistent: GcPtr) -> Self {
        Self { chain: vec![persistent] }
    }

    pub fn push(&mut self, frame: GcPtr) {
        self.chain.push(frame);
    }

    pub fn pop(&mut self) -> Option<GcPtr> {
        if self.chain.len() > 1 {
            self.chain.pop()
        } else {
            None
        }
    }

    /// The clip's persistent variable object: the chain's first (outermost)
    /// frame, rooted in the heap for as long as the owning node is alive.
    pub fn outermost(&self) -> Option<GcPtr> {
        self.chain.first().copied()
    }

    /// Searches innermost-to-outermost for `name`, returning the first hit.
    /// Absent everywhere yields `None` (the caller maps that to `undefined`).
    pub fn get(&self, heap: &Heap, name: &str) -> Option<Value> {
        for ptr in self.chain.iter().rev() {
            if let Some(object) = heap.get(*ptr) {
                if let Some(value) = object.get(name) {
                    return Some(value);
                }
            }
        }
        None
    }

    /// Sets `name` on the innermost frame that already defines it; if no
    /// frame defines it, creates it on the outermost (global-like) frame.
    pub fn set(&self, heap: &Heap, name: &str, value: Value) {
        for ptr in self.chain.iter().rev() {
            if let Some(object) = heap.get(*ptr) {
                if object.get(name).is_some() {
                    object.set(name, value);
                    return;
                }
            }
        }
        if let Some(outermost) = self.chain.first() {
            if let Some(object) = heap.get(*outermost) {
                object.set(name, value);
            }
        }
    }

    /// Always defines on the innermost frame, shadowing any outer variable
    /// of the same name — distinct from `set`, which updates an existing
    /// outer binding in place.
    pub fn define_local(&self, heap: &Heap, name: &str, value: Value) {
        if let Some(innermost) = self.chain.last() {
            if let Some(object) = heap.get(*innermost) {
                object.set(name, value);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::avm1::object::ScriptObject;

    #[test]
    fn define_local_shadows_then_pop_restores_outer_binding() {
        let heap = Heap::new();
        let global = heap.allocate(ScriptObject::new());
        heap.get(global).unwrap().set("x", Value::Number(1.0));

        let mut scope = Scope::new(global);
        let inner = heap.allocate(ScriptObject::new());
        scope.push(inner);
        scope.define_local(&heap, "x", Value::Number(2.0));

        assert!(matches!(scope.get(&heap, "x"), Some(Value::Number(n)) if n == 2.0));
        scope.pop();
        assert!(matches!(scope.get(&heap, "x"), Some(Value::Number(n)) if n == 1.0));
    }

    #[test]
    fn set_updates_existing_outer_binding_without_shadowing() {
        let heap = Heap::new();
        let global = heap.allocate(ScriptObject::new());
        heap.get(global).unwrap().set("x", Value::Number(1.0));

        let mut scope = Scope::new(global);
        let inner = heap.allocate(ScriptObject::new());
        scope.push(inner);
        scope.set(&heap, "x", Value::Number(9.0));

        assert!(matches!(heap.get(global).unwrap().get("x"), Some(Value::Number(n)) if n == 9.0));
        assert!(heap.get(inner).unwrap().get("x").is_none());
    }

    #[test]
    fn missing_variable_resolves_to_none() {
        let heap = Heap::new();
        let global = heap.allocate(ScriptObject::new());
        let scope = Scope::new(global);
        assert!(scope.get(&heap, "nope").is_none());
    }
}
