//! A live movie-clip instance (C5): the depth-keyed child container, the
//! deprecated-instance cache that preserves identity across a timeline
//! rewind, and per-frame placement/action execution (§4.5).

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use crate::avm1::context::Context;
use crate::avm1::scope::Scope;
use crate::character::{Character, Dictionary};
use crate::display::arena::{NodeArena, NodeId};
use crate::display::command::{Command, PlaceCommand};
use crate::display::definition::MovieClipDefinition;
use crate::gc::Heap;
use crate::types::{CharacterId, ColorTransform, Depth, FrameNumber, Matrix};

/// A placed shape/morph-shape/bitmap: unlike a `MovieClipNode` it has no
/// arena slot, no timeline, no children of its own - just the fields a
/// `PlaceObject` record can carry for a non-sprite character (§3's "display
/// node (leaf)").
#[derive(Debug, Clone)]
pub struct LeafNode {
    pub character_id: CharacterId,
    pub matrix: Matrix,
    pub color_transform: ColorTransform,
    pub ratio: Option<u16>,
    pub name: Option<String>,
    pub clip_depth: Option<Depth>,
}

/// One depth slot: either a live movie-clip instance (owned by the arena) or
/// a leaf display node (owned inline, since it has no identity to share).
#[derive(Debug, Clone)]
pub enum DisplayChild {
    Clip(NodeId),
    Leaf(LeafNode),
}

impl DisplayChild {
    pub fn as_clip(&self) -> Option<NodeId> {
        match self {
            DisplayChild::Clip(id) => Some(*id),
            DisplayChild::Leaf(_) => None,
        }
    }
}

/// Depth-keyed ownership of a clip's children, the same structure as the
/// source's `ChildContainer`: children are rendered and updated in
/// ascending depth order (§5's ordering guarantee (b)).
#[derive(Debug, Default)]
pub struct ChildContainer {
    depth_list: BTreeMap<Depth, DisplayChild>,
}

impl ChildContainer {
    pub fn get(&self, depth: Depth) -> Option<DisplayChild> {
        self.depth_list.get(&depth).cloned()
    }

    pub fn get_mut(&mut self, depth: Depth) -> Option<&mut DisplayChild> {
        self.depth_list.get_mut(&depth)
    }

    pub fn insert(&mut self, depth: Depth, child: DisplayChild) -> Option<DisplayChild> {
        self.depth_list.insert(depth, child)
    }

    pub fn remove(&mut self, depth: Depth) -> Option<DisplayChild> {
        self.depth_list.remove(&depth)
    }

    /// Children in ascending depth order.
    pub fn iter(&self) -> impl Iterator<Item = (Depth, &DisplayChild)> + '_ {
        self.depth_list.iter().map(|(&d, c)| (d, c))
    }

    /// Just the clip children, in ascending depth order - what timeline
    /// recursion and rewind bookkeeping walk, since leaves have no `update`
    /// or AVM1 identity of their own.
    pub fn clips(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.depth_list.values().filter_map(DisplayChild::as_clip)
    }

    pub fn by_name<'a>(&'a self, arena: &'a NodeArena<MovieClipNode>, name: &str) -> Option<NodeId> {
        self.clips().find(|&id| arena.get(id).is_some_and(|n| n.name.as_deref() == Some(name)))
    }
}

/// A live instance of a `MovieClipDefinition`. The character a given depth
/// holds can change frame to frame; `character_id` and `depth` together are
/// the deprecated-cache key that decides whether a rewind can re-promote
/// this exact instance instead of rebuilding it (§4.5.1).
pub struct MovieClipNode {
    pub definition: Arc<MovieClipDefinition>,
    pub character_id: CharacterId,
    pub depth: Depth,
    pub parent: Option<NodeId>,
    pub name: Option<String>,
    pub matrix: Matrix,
    pub color_transform: ColorTransform,

    pub current_frame: FrameNumber,
    target_frame: FrameNumber,
    frame_accumulator: f32,
    pub playing: bool,

    pub children: ChildContainer,
    /// Instances removed by a rewind-to-earlier-frame step, keyed by the
    /// depth/character-id pair they'd need to match to be re-promoted
    /// instead of recreated. Drained (destroyed) at the end of whichever
    /// `step_to_frame` call leaves them unclaimed.
    deprecated: HashMap<(Depth, CharacterId), NodeId>,

    pub context: Context,
}

impl MovieClipNode {
    /// Builds a node with a placeholder owning-clip id; callers must call
    /// [`Self::bind_id`] with the id the arena actually assigned right
    /// after inserting it, since `Context` needs a real `NodeId` for
    /// `SetTarget`'s default-reset behavior.
    pub fn new(
        definition: Arc<MovieClipDefinition>,
        character_id: CharacterId,
        depth: Depth,
        parent: Option<NodeId>,
        persistent_scope: crate::gc::GcPtr,
    ) -> Self {
        Self {
            definition,
            character_id,
            depth,
            parent,
            name: None,
            matrix: Matrix::IDENTITY,
            color_transform: ColorTransform::IDENTITY,
            current_frame: 0,
            target_frame: 0,
            frame_accumulator: 0.0,
            playing: true,
            children: ChildContainer::default(),
            deprecated: HashMap::new(),
            context: Context::new(NodeId::default(), Scope::new(persistent_scope)),
        }
    }

    pub fn bind_id(&mut self, id: NodeId) {
        self.context.rebind_owner(id);
    }

    pub fn frame_count(&self) -> u16 {
        self.definition.frame_count()
    }

    /// §4.5.2: accumulates `dt` against the movie's frame interval and
    /// advances `target_frame`, wrapping past the last frame back to frame 1
    /// (frame 0 is the "nothing placed yet" pre-roll state).
    pub fn update(&mut self, dt: f32, frame_interval: f32) {
        if !self.playing || self.frame_count() == 0 {
            return;
        }
        self.frame_accumulator += dt;
        while self.frame_accumulator >= frame_interval {
            self.frame_accumulator -= frame_interval;
            self.target_frame = if self.target_frame >= self.frame_count() { 1 } else { self.target_frame + 1 };
        }
    }

    pub fn target_frame(&self) -> FrameNumber {
        self.target_frame
    }

    pub fn set_target_frame(&mut self, frame: FrameNumber) {
        self.target_frame = frame.clamp(1, self.frame_count().max(1));
    }
}

/// Runs every command in `frame`'s command list against `node`'s child
/// container, instantiating, replacing, modifying or removing per §4.5.1.
#[allow(clippy::too_many_arguments)]
pub fn execute_frame_commands(
    node_id: NodeId,
    frame: FrameNumber,
    arena: &NodeArena<MovieClipNode>,
    dictionary: &Arc<Dictionary>,
    heap: &Heap,
) {
    let Some(node) = arena.get(node_id) else { return };
    let Some(frame_data) = node.definition.frames.get(frame.saturating_sub(1) as usize).cloned() else { return };
    drop(node);

    for command in &frame_data.commands {
        match command {
            Command::Remove { depth } => remove_at_depth(node_id, *depth, arena, heap),
            Command::Place(place) => apply_place_command(node_id, place, arena, dictionary, heap),
        }
    }
}

fn remove_at_depth(node_id: NodeId, depth: Depth, arena: &NodeArena<MovieClipNode>, heap: &Heap) {
    let Some(mut node) = arena.get_mut(node_id) else { return };
    let removed = node.children.remove(depth);
    drop(node);
    if let Some(DisplayChild::Clip(child_id)) = removed {
        destroy(child_id, arena, heap);
    }
}

fn apply_place_command(
    node_id: NodeId,
    place: &PlaceCommand,
    arena: &NodeArena<MovieClipNode>,
    dictionary: &Arc<Dictionary>,
    heap: &Heap,
) {
    let Some(character_id) = place.character_id else {
        apply_transform_at_depth(node_id, place, arena);
        return;
    };

    // Every step below borrows the arena at most once per statement: this
    // arena guards its whole slot vector with a single `RefCell`, so a
    // `RefMut` held across a nested `get`/`get_mut` call would panic.
    let existing = arena.get(node_id).and_then(|n| n.children.get(place.depth));
    let existing_character = match &existing {
        Some(DisplayChild::Clip(id)) => arena.get(*id).map(|c| c.character_id),
        Some(DisplayChild::Leaf(leaf)) => Some(leaf.character_id),
        None => None,
    };

    if existing_character == Some(character_id) {
        match &existing {
            Some(DisplayChild::Clip(id)) => apply_transform(*id, place, arena),
            Some(DisplayChild::Leaf(_)) => apply_leaf_transform(node_id, place.depth, place, arena),
            None => {}
        }
        return;
    }

    // Re-promote a deprecated clip instance at the same (depth, id) pair if
    // the last rewind left one parked there, instead of building a fresh
    // instance (§4.5.1's rewind-identity rule). Leaves have no AVM1 identity
    // worth preserving this way, so they never enter `deprecated`.
    let reused = arena.get_mut(node_id).and_then(|mut n| n.deprecated.remove(&(place.depth, character_id)));

    if let Some(reused_id) = reused {
        apply_transform(reused_id, place, arena);
        let old = arena.get_mut(node_id).and_then(|mut n| n.children.insert(place.depth, DisplayChild::Clip(reused_id)));
        if let Some(DisplayChild::Clip(old_id)) = old {
            if old_id != reused_id {
                destroy(old_id, arena, heap);
            }
        }
        return;
    }

    if let Some(DisplayChild::Clip(old_id)) = existing {
        destroy(old_id, arena, heap);
    }

    let Some(character) = dictionary.get(character_id) else {
        tracing::warn!(character_id, "placement referenced unknown character id");
        return;
    };

    match character {
        Character::MovieClip(definition) => {
            let persistent_scope = heap.allocate(crate::avm1::object::ScriptObject::new());
            heap.add_root(persistent_scope);
            let mut child =
                MovieClipNode::new(definition.clone(), character_id, place.depth, Some(node_id), persistent_scope);
            child.matrix = place.matrix.unwrap_or_default();
            child.color_transform = place.color_transform.clone().unwrap_or_default();
            child.name = place.name.clone();
            let child_id = arena.insert(child);
            if let Some(mut inserted) = arena.get_mut(child_id) {
                inserted.bind_id(child_id);
            }
            if let Some(mut node) = arena.get_mut(node_id) {
                node.children.insert(place.depth, DisplayChild::Clip(child_id));
            }
        }
        Character::Shape(_) | Character::MorphShape(_) | Character::Bitmap(_) => {
            let leaf = LeafNode {
                character_id,
                matrix: place.matrix.unwrap_or_default(),
                color_transform: place.color_transform.clone().unwrap_or_default(),
                ratio: place.ratio,
                name: place.name.clone(),
                clip_depth: place.clip_depth,
            };
            if let Some(mut node) = arena.get_mut(node_id) {
                node.children.insert(place.depth, DisplayChild::Leaf(leaf));
            }
        }
    }
}

fn apply_transform(child_id: NodeId, place: &PlaceCommand, arena: &NodeArena<MovieClipNode>) {
    let Some(mut child) = arena.get_mut(child_id) else { return };
    if let Some(matrix) = place.matrix {
        child.matrix = matrix;
    }
    if let Some(ct) = place.color_transform.clone() {
        child.color_transform = ct;
    }
    if place.name.is_some() {
        child.name = place.name.clone();
    }
}

fn apply_leaf_transform(node_id: NodeId, depth: Depth, place: &PlaceCommand, arena: &NodeArena<MovieClipNode>) {
    let Some(mut node) = arena.get_mut(node_id) else { return };
    let Some(DisplayChild::Leaf(leaf)) = node.children.get_mut(depth) else { return };
    if let Some(matrix) = place.matrix {
        leaf.matrix = matrix;
    }
    if let Some(ct) = place.color_transform.clone() {
        leaf.color_transform = ct;
    }
    if place.ratio.is_some() {
        leaf.ratio = place.ratio;
    }
    if place.name.is_some() {
        leaf.name = place.name.clone();
    }
}

fn apply_transform_at_depth(node_id: NodeId, place: &PlaceCommand, arena: &NodeArena<MovieClipNode>) {
    let Some(node) = arena.get(node_id) else { return };
    let child = node.children.get(place.depth);
    drop(node);
    match child {
        Some(DisplayChild::Clip(child_id)) => apply_transform(child_id, place, arena),
        Some(DisplayChild::Leaf(_)) => apply_leaf_transform(node_id, place.depth, place, arena),
        None => {}
    }
}

/// Tears down `node_id` and, recursively, every descendant still attached;
/// each removed clip's persistent scope is unrooted so the next GC pass can
/// reclaim it (§4.6.4).
pub fn destroy(node_id: NodeId, arena: &NodeArena<MovieClipNode>, heap: &Heap) {
    let Some(node) = arena.remove(node_id) else { return };
    for child_id in node.children.clips() {
        destroy(child_id, arena, heap);
    }
    if let Some(root) = node.context.scope.outermost() {
        heap.remove_root(root);
    }
}

/// §4.5.2: rewinds to frame 0 (parking every live child in the deprecated
/// cache for possible re-promotion), then steps forward to `target`,
/// running each frame's commands then its actions, finally destroying
/// whatever is left unclaimed in the deprecated cache.
pub fn step_to_frame(
    node_id: NodeId,
    target: FrameNumber,
    arena: &NodeArena<MovieClipNode>,
    dictionary: &Arc<Dictionary>,
    heap: &Heap,
    mut run_actions: impl FnMut(NodeId, &[Vec<u8>]),
) {
    let Some(node) = arena.get(node_id) else { return };
    let current = node.current_frame;
    drop(node);

    if target == current {
        return;
    }

    if target < current {
        rewind_to_deprecated(node_id, arena);
    }

    let Some(node) = arena.get(node_id) else { return };
    let start = if target < current { 1 } else { current + 1 };
    drop(node);

    for frame in start..=target {
        execute_frame_commands(node_id, frame, arena, dictionary, heap);
        if let Some(node) = arena.get(node_id) {
            let actions = node.definition.frames.get(frame.saturating_sub(1) as usize).map(|f| f.actions.clone());
            drop(node);
            if let Some(actions) = actions {
                run_actions(node_id, &actions);
            }
        }
        if let Some(mut node) = arena.get_mut(node_id) {
            node.current_frame = frame;
        }
    }

    drain_deprecated(node_id, arena, heap);
}

fn rewind_to_deprecated(node_id: NodeId, arena: &NodeArena<MovieClipNode>) {
    // Gather (depth, child, character) triples for clips, and the depths of
    // any leaves, under one immutable borrow (several simultaneous `Ref`s
    // are fine; it's `Ref` + `RefMut` that would panic) before taking the
    // mutable borrow below.
    let Some((clips, leaf_depths)) = arena.get(node_id).map(|node| {
        let clips: Vec<_> = node
            .children
            .iter()
            .filter_map(|(depth, child)| match child {
                DisplayChild::Clip(id) => arena.get(*id).map(|c| (depth, *id, c.character_id)),
                DisplayChild::Leaf(_) => None,
            })
            .collect();
        let leaf_depths: Vec<_> = node
            .children
            .iter()
            .filter_map(|(depth, child)| matches!(child, DisplayChild::Leaf(_)).then_some(depth))
            .collect();
        (clips, leaf_depths)
    }) else {
        return;
    };

    let Some(mut node) = arena.get_mut(node_id) else { return };
    node.current_frame = 0;
    // Leaves have no identity worth preserving across a rewind; drop them
    // outright rather than parking them alongside clips.
    for depth in leaf_depths {
        node.children.remove(depth);
    }
    for (depth, child_id, character_id) in clips {
        node.children.remove(depth);
        node.deprecated.insert((depth, character_id), child_id);
    }
}

fn drain_deprecated(node_id: NodeId, arena: &NodeArena<MovieClipNode>, heap: &Heap) {
    let Some(mut node) = arena.get_mut(node_id) else { return };
    let leftover: Vec<NodeId> = node.deprecated.drain().map(|(_, id)| id).collect();
    drop(node);
    for id in leftover {
        destroy(id, arena, heap);
    }
}

/// §4.5.3: resolves a `"/a/b"`-style slash path (or a bare name, for a
/// single-segment relative lookup) by walking named children from `from`.
/// Total: any missing segment yields `None` rather than an error.
pub fn resolve_path(from: NodeId, path: &str, arena: &NodeArena<MovieClipNode>, root: NodeId) -> Option<NodeId> {
    if path.is_empty() {
        return Some(from);
    }
    let (mut current, rest) = if let Some(rest) = path.strip_prefix('/') {
        (root, rest)
    } else {
        (from, path)
    };
    if rest.is_empty() {
        return Some(current);
    }
    for segment in rest.split('/') {
        if segment.is_empty() || segment == "." {
            continue;
        }
        let node = arena.get(current)?;
        current = node.children.by_name(arena, segment)?;
    }
    Some(current)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::display::definition::Frame;

    fn empty_definition(frames: usize) -> Arc<MovieClipDefinition> {
        Arc::new(MovieClipDefinition { frames: vec![Frame::default(); frames], frame_labels: HashMap::new() })
    }

    #[test]
    fn update_wraps_past_last_frame() {
        let arena: NodeArena<MovieClipNode> = NodeArena::new();
        let heap = Heap::new();
        let persistent = heap.allocate(crate::avm1::object::ScriptObject::new());
        let root = arena.insert(MovieClipNode::new(empty_definition(3), 1, 0, None, persistent));
        // Starting from frame 0 (nothing placed yet), four update(1.0) calls
        // at 1fps visit 1, 2, 3, then wrap back to 1.
        for expected in [1, 2, 3, 1] {
            arena.get_mut(root).unwrap().update(1.0, 1.0);
            assert_eq!(arena.get(root).unwrap().target_frame(), expected);
        }
    }
}
