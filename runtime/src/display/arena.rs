//! A generational-index arena for movie-clip nodes, the sibling of
//! [`crate::gc::Heap`] for the display tree: parent→child edges are owned
//! (the parent's `ChildContainer`), child→parent edges are weak `NodeId`s
//! that resolve to `None` once the parent slot has been reused.

use std::cell::RefCell;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct NodeId {
    index: u32,
    generation: u32,
}

struct Slot<T> {
    generation: u32,
    value: Option<T>,
}

pub struct NodeArena<T> {
    slots: RefCell<Vec<Slot<T>>>,
    free: RefCell<Vec<u32>>,
}

impl<T> NodeArena<T> {
    pub fn new() -> Self {
        Self { slots: RefCell::new(Vec::new()), free: RefCell::new(Vec::new()) }
    }

    pub fn insert(&self, value: T) -> NodeId {
        let mut slots = self.slots.borrow_mut();
        if let Some(index) = self.free.borrow_mut().pop() {
            let slot = &mut slots[index as usize];
            slot.value = Some(value);
            NodeId { index, generation: slot.generation }
        } else {
            let index = slots.len() as u32;
            slots.push(Slot { generation: 0, value: Some(value) });
            NodeId { index, generation: 0 }
        }
    }

    pub fn remove(&self, id: NodeId) -> Option<T> {
        let mut slots = self.slots.borrow_mut();
        let slot = slots.get_mut(id.index as usize)?;
        if slot.generation != id.generation {
            return None;
        }
        slot.generation = slot.generation.wrapping_add(1);
        self.free.borrow_mut().push(id.index);
        slot.value.take()
    }

    pub fn get(&self, id: NodeId) -> Option<std::cell::Ref<'_, T>> {
        let slots = self.slots.borrow();
        let valid = matches!(slots.get(id.index as usize), Some(s) if s.generation == id.generation && s.value.is_some());
        if !valid {
            return None;
        }
        Some(std::cell::Ref::map(slots, |s| s[id.index as usize].value.as_ref().unwrap()))
    }

    pub fn get_mut(&self, id: NodeId) -> Option<std::cell::RefMut<'_, T>> {
        let slots = self.slots.borrow_mut();
        let valid = matches!(slots.get(id.index as usize), Some(s) if s.generation == id.generation && s.value.is_some());
        if !valid {
            return None;
        }
        Some(std::cell::RefMut::map(slots, |s| s[id.index as usize].value.as_mut().unwrap()))
    }

    pub fn contains(&self, id: NodeId) -> bool {
        matches!(self.slots.borrow().get(id.index as usize), Some(s) if s.generation == id.generation && s.value.is_some())
    }
}

impl<T> Default for NodeArena<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stale_id_resolves_to_absent_after_removal_and_reuse() {
        let arena: NodeArena<i32> = NodeArena::new();
        let first = arena.insert(1);
        arena.remove(first);
        let second = arena.insert(2);
        assert!(arena.get(first).is_none());
        assert_eq!(*arena.get(second).unwrap(), 2);
    }
}
