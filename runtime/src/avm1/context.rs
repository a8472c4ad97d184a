//! The per-clip AVM1 execution container (§4.6.4): a scope chain rooted at
//! the owning clip's persistent variable object, a constant pool populated
//! by the most recent `ConstantPool` action, and the node identities needed
//! for `SetTarget`/`SetTarget2` retargeting.
//!
//! A `Context` is a plain, non-GC-resident struct — only the `GcPtr`s it
//! carries (by way of its `Scope`) are heap-resident, and those are rooted
//! in [`crate::gc::Heap`] for as long as the owning clip node is alive.

use crate::display::arena::NodeId;

use super::scope::Scope;

/// A per-clip execution container. `owning_clip` never changes once
/// constructed; `current_clip` is retargeted by `SetTarget`/`SetTarget2` and
/// determines which clip's display-list operations (`GotoFrame`, `Play`,
/// property gets/sets, ...) subsequent actions in this record affect.
#[derive(Debug, Clone)]
pub struct Context {
    pub scope: Scope,
    pub constant_pool: Vec<String>,
    owning_clip: NodeId,
    current_clip: NodeId,
}

impl Context {
    pub fn new(owning_clip: NodeId, scope: Scope) -> Self {
        Self { scope, constant_pool: Vec::new(), owning_clip, current_clip: owning_clip }
    }

    pub fn owning_clip(&self) -> NodeId {
        self.owning_clip
    }

    pub fn current_clip(&self) -> NodeId {
        self.current_clip
    }

    /// `SetTarget`/`SetTarget2`: retarget subsequent display-list-affecting
    /// actions in this record at `target`. An empty path (`SetTarget("")`)
    /// resets the target back to the owning clip.
    pub fn set_target(&mut self, target: NodeId) {
        self.current_clip = target;
    }

    pub fn reset_target(&mut self) {
        self.current_clip = self.owning_clip;
    }

    /// Fixes up `owning_clip`/`current_clip` once the node this context
    /// belongs to has actually been assigned an id by the arena — a
    /// context is built before its owning node exists, so construction
    /// starts with a placeholder that this corrects immediately after
    /// insertion.
    pub fn rebind_owner(&mut self, owner: NodeId) {
        self.owning_clip = owner;
        self.current_clip = owner;
    }

    pub fn constant(&self, index: usize) -> Option<&str> {
        self.constant_pool.get(index).map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::display::arena::NodeArena;
    use crate::gc::Heap;

    #[test]
    fn set_target_then_reset_returns_to_owning_clip() {
        let arena: NodeArena<()> = NodeArena::new();
        let owner = arena.insert(());
        let other = arena.insert(());
        let heap = Heap::new();
        let persistent = heap.allocate(crate::avm1::object::ScriptObject::new());

        let mut ctx = Context::new(owner, Scope::new(persistent));
        assert_eq!(ctx.current_clip(), owner);

        ctx.set_target(other);
        assert_eq!(ctx.current_clip(), other);

        ctx.reset_target();
        assert_eq!(ctx.current_clip(), owner);
    }
}
