//! `ScriptObject`: the single GC-managed value kind. Its property map uses
//! interior mutability since multiple `Value::Object`s (and the scope
//! chain) can alias the same arena slot.

use std::cell::RefCell;
use std::collections::HashMap;

use super::value::Value;
use crate::gc::{GcPtr, Heap, Trace};

#[derive(Debug, Default)]
pub struct ScriptObject {
    properties: RefCell<HashMap<String, Value>>,
    prototype: RefCell<Option<GcPtr>>,
}

impl ScriptObject {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<Value> {
        self.properties.borrow().get(name).cloned()
    }

    pub fn set(&self, name: &str, value: Value) {
        self.properties.borrow_mut().insert(name.to_string(), value);
    }

    pub fn delete(&self, name: &str) -> bool {
        self.properties.borrow_mut().remove(name).is_some()
    }

    pub fn set_prototype(&self, prototype: Option<GcPtr>) {
        *self.prototype.borrow_mut() = prototype;
    }

    pub fn prototype(&self) -> Option<GcPtr> {
        *self.prototype.borrow()
    }
}

impl Trace for ScriptObject {
    fn trace(&self, heap: &Heap) {
        for value in self.properties.borrow().values() {
            value.trace(heap);
        }
        if let Some(proto) = *self.prototype.borrow() {
            heap.mark(proto);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_then_get_round_trips() {
        let obj = ScriptObject::new();
        obj.set("x", Value::Number(3.0));
        assert!(matches!(obj.get("x"), Some(Value::Number(n)) if n == 3.0));
        assert!(obj.get("missing").is_none());
    }
}
