//! The player (C5's driving loop): ties the parsed movie's character
//! dictionary, display-tree arena, GC heap, and AVM1 interpreter together
//! behind a single `update(dt)` / `render()` tick (§5's scheduling model).

use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{anyhow, Context as _};
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

use crate::avm1::interpreter::{self, ClipHost, ClipProperty, FrameTarget};
use crate::avm1::object::ScriptObject;
use crate::avm1::opcode::Opcode;
use crate::avm1::value::Value;
use crate::character::{Character, Dictionary};
use crate::display::arena::{NodeArena, NodeId};
use crate::display::node::{self, DisplayChild, LeafNode, MovieClipNode};
use crate::gc::{GcPtr, Heap};
use crate::parser::{parse_movie, ParsedMovie, ScriptLimits};
use crate::render::{self, DrawQueue, NullRenderer, RenderBackend};
use crate::types::{Color, ColorTransform, Depth, FrameNumber, Matrix};

/// Construction-time overrides collected by [`PlayerBuilder`], consumed
/// once at `build()`.
#[derive(Debug, Clone, Copy)]
pub struct PlayerConfig {
    pub frame_rate_override: Option<f32>,
    pub max_execution_duration: Duration,
    pub max_call_depth: u16,
    pub initial_gc_threshold: Option<usize>,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            frame_rate_override: None,
            max_execution_duration: Duration::from_secs(15),
            max_call_depth: 256,
            initial_gc_threshold: None,
        }
    }
}

pub struct Player {
    arena: NodeArena<MovieClipNode>,
    dictionary: Arc<Dictionary>,
    heap: Heap,
    root: NodeId,
    script_limits: ScriptLimits,
    background_color: Color,
    swf_version: u8,
    frame_rate: f32,
    rng: SmallRng,
    start_time: Instant,
    renderer: Box<dyn RenderBackend>,
    draw_queue: DrawQueue,
}

impl Player {
    fn from_parsed(movie: ParsedMovie, config: PlayerConfig, renderer: Box<dyn RenderBackend>) -> Self {
        let heap = match config.initial_gc_threshold {
            Some(threshold) => Heap::with_threshold(threshold),
            None => Heap::new(),
        };
        let persistent = heap.allocate(ScriptObject::new());
        heap.add_root(persistent);

        let arena = NodeArena::new();
        let mut root_node = MovieClipNode::new(movie.root.clone(), 0, 0, None, persistent);
        root_node.set_target_frame(1);
        let root = arena.insert(root_node);
        if let Some(mut node) = arena.get_mut(root) {
            node.bind_id(root);
        }

        let mut script_limits = movie.script_limits;
        script_limits.max_recursion_depth = config.max_call_depth;
        script_limits.script_timeout_seconds =
            script_limits.script_timeout_seconds.min(config.max_execution_duration.as_secs() as u16);

        Self {
            arena,
            dictionary: Arc::new(movie.dictionary),
            heap,
            root,
            script_limits,
            background_color: movie.background_color,
            swf_version: movie.header.version,
            frame_rate: config.frame_rate_override.unwrap_or(movie.header.frame_rate),
            rng: seed_rng(),
            start_time: Instant::now(),
            renderer,
            draw_queue: DrawQueue::new(),
        }
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Advances every live clip by `dt` seconds: frame-interval accumulation,
    /// placement-command execution, and action dispatch, depth-first from
    /// the root (§4.5.2, §5's ordering guarantees).
    pub fn update(&mut self, dt: f32) {
        let frame_interval = 1.0 / self.frame_rate.max(1.0);
        self.update_node(self.root, dt, frame_interval);
        if self.heap.should_collect() {
            let stats = self.heap.collect();
            tracing::debug!(live = stats.live, freed = stats.freed, "garbage collected");
        }
    }

    fn update_node(&mut self, node_id: NodeId, dt: f32, frame_interval: f32) {
        let Some(mut node) = self.arena.get_mut(node_id) else { return };
        node.update(dt, frame_interval);
        let target = node.target_frame();
        drop(node);

        // Splits `self` into disjoint field borrows: `arena`/`dictionary`/
        // `heap` stay shared so `step_to_frame`'s callback can run actions
        // through a `PlayerHost` at the same time, without going through a
        // `&mut self` method call that would claim the whole struct.
        let Player { ref arena, ref dictionary, ref heap, ref mut rng, root, start_time, swf_version, script_limits, .. } =
            *self;
        let mut host = PlayerHost { arena, dictionary, heap, root, rng, start_time, swf_version };

        node::step_to_frame(node_id, target, arena, dictionary, heap, |clip, actions| {
            for action in actions {
                let Some(mut ctx) = arena.get(clip).map(|n| n.context.clone()) else { continue };
                let outcome = interpreter::execute(action, &mut ctx, heap, &mut host, swf_version, &script_limits, 0);
                if let Some(mut n) = arena.get_mut(clip) {
                    n.context = ctx;
                }
                if let interpreter::ExecutionOutcome::Aborted(err) = outcome {
                    tracing::warn!(%err, "AVM1 action record aborted");
                }
            }
        });

        let children: Vec<NodeId> = match arena.get(node_id) {
            Some(node) => node.children.clips().collect(),
            None => return,
        };
        for child in children {
            self.update_node(child, dt, frame_interval);
        }
    }

    /// Walks the display tree from the root, composing each clip's matrix
    /// and color transform down through its children, and submits every
    /// leaf's tesselated shape to the renderer in depth order (§2's "C5
    /// emits draw calls to C8", §4.8).
    pub fn render(&mut self) {
        self.renderer.begin_frame(self.background_color);
        render_node(
            self.root,
            Matrix::IDENTITY,
            ColorTransform::IDENTITY,
            &self.arena,
            &self.dictionary,
            &mut self.draw_queue,
            &mut *self.renderer,
        );
        self.draw_queue.flush(&mut *self.renderer);
        self.renderer.end_frame();
    }
}

fn render_node(
    node_id: NodeId,
    parent_transform: Matrix,
    parent_color_transform: ColorTransform,
    arena: &NodeArena<MovieClipNode>,
    dictionary: &Dictionary,
    queue: &mut DrawQueue,
    backend: &mut dyn RenderBackend,
) {
    let Some(node) = arena.get(node_id) else { return };
    let transform = parent_transform.multiply(&node.matrix);
    let color_transform = parent_color_transform.compose(&node.color_transform);
    // Clone the depth-ordered child list out from under the borrow before
    // recursing, since a descendant's own `arena.get` would otherwise
    // overlap this `Ref` of the same `RefCell`-guarded slot vector.
    let children: Vec<DisplayChild> = node.children.iter().map(|(_, child)| child.clone()).collect();
    drop(node);

    for child in children {
        match child {
            DisplayChild::Clip(child_id) => {
                render_node(child_id, transform, color_transform, arena, dictionary, queue, backend)
            }
            DisplayChild::Leaf(leaf) => render_leaf(&leaf, transform, color_transform, dictionary, queue, backend),
        }
    }
}

fn render_leaf(
    leaf: &LeafNode,
    parent_transform: Matrix,
    parent_color_transform: ColorTransform,
    dictionary: &Dictionary,
    queue: &mut DrawQueue,
    backend: &mut dyn RenderBackend,
) {
    let Some(character) = dictionary.get(leaf.character_id) else { return };
    let transform = parent_transform.multiply(&leaf.matrix);
    let color_transform = parent_color_transform.compose(&leaf.color_transform);
    match character {
        Character::Shape(shape) => render::submit_shape(shape, transform, color_transform, queue, backend),
        Character::MorphShape(morph) => {
            let interpolated = morph.interpolate(leaf.ratio.unwrap_or(0));
            render::submit_shape(&interpolated, transform, color_transform, queue, backend);
        }
        // Bitmap characters have no tesselated mesh and no texture-minting
        // pipeline yet; movie clips never appear as leaves (§3).
        Character::Bitmap(_) | Character::MovieClip(_) => {}
    }
}

fn seed_rng() -> SmallRng {
    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or(0);
    SmallRng::seed_from_u64(nanos)
}

fn resolve_frame_target(node: &MovieClipNode, target: &FrameTarget) -> Option<FrameNumber> {
    match target {
        FrameTarget::Number(n) => Some(*n),
        FrameTarget::Label(label) => node.definition.resolve_label(label),
    }
}

/// Implements [`ClipHost`] over borrowed slices of a [`Player`] rather than
/// `Player` itself, so the interpreter's callbacks can run while the
/// frame-stepping walk in [`Player::update_node`] still holds its own
/// shared borrows of the same arena/heap.
struct PlayerHost<'a> {
    arena: &'a NodeArena<MovieClipNode>,
    dictionary: &'a Arc<Dictionary>,
    heap: &'a Heap,
    root: NodeId,
    rng: &'a mut SmallRng,
    start_time: Instant,
    swf_version: u8,
}

impl<'a> ClipHost for PlayerHost<'a> {
    fn goto_frame(&mut self, clip: NodeId, target: FrameTarget, stop: bool) {
        let Some(mut node) = self.arena.get_mut(clip) else { return };
        let Some(frame_number) = resolve_frame_target(&node, &target) else { return };
        node.set_target_frame(frame_number);
        node.playing = !stop;
    }

    fn next_frame(&mut self, clip: NodeId) {
        if let Some(mut node) = self.arena.get_mut(clip) {
            let next = node.target_frame().saturating_add(1);
            node.set_target_frame(next);
        }
    }

    fn prev_frame(&mut self, clip: NodeId) {
        if let Some(mut node) = self.arena.get_mut(clip) {
            let prev = node.target_frame().saturating_sub(1).max(1);
            node.set_target_frame(prev);
        }
    }

    fn play(&mut self, clip: NodeId) {
        if let Some(mut node) = self.arena.get_mut(clip) {
            node.playing = true;
        }
    }

    fn stop(&mut self, clip: NodeId) {
        if let Some(mut node) = self.arena.get_mut(clip) {
            node.playing = false;
        }
    }

    fn get_property(&self, clip: NodeId, property: ClipProperty) -> Value {
        let Some(node) = self.arena.get(clip) else { return Value::Undefined };
        match property {
            ClipProperty::X => Value::Number(node.matrix.tx as f64),
            ClipProperty::Y => Value::Number(node.matrix.ty as f64),
            ClipProperty::XScale => Value::Number(node.matrix.a as f64 * 100.0),
            ClipProperty::YScale => Value::Number(node.matrix.d as f64 * 100.0),
            ClipProperty::CurrentFrame => Value::Number(node.current_frame as f64),
            ClipProperty::TotalFrames => Value::Number(node.frame_count() as f64),
            ClipProperty::Alpha => Value::Number(node.color_transform.a_mult as f64 * 100.0),
            ClipProperty::Visible => Value::Boolean(true),
            ClipProperty::Rotation => Value::Number((node.matrix.b.atan2(node.matrix.a) as f64).to_degrees()),
            ClipProperty::Name | ClipProperty::Target => Value::String(node.name.clone().unwrap_or_default()),
            _ => Value::Undefined,
        }
    }

    fn set_property(&mut self, clip: NodeId, property: ClipProperty, value: Value) {
        let Some(mut node) = self.arena.get_mut(clip) else { return };
        match property {
            ClipProperty::X => node.matrix.tx = value.to_number(self.swf_version) as f32,
            ClipProperty::Y => node.matrix.ty = value.to_number(self.swf_version) as f32,
            ClipProperty::XScale => node.matrix.a = (value.to_number(self.swf_version) / 100.0) as f32,
            ClipProperty::YScale => node.matrix.d = (value.to_number(self.swf_version) / 100.0) as f32,
            ClipProperty::Alpha => node.color_transform.a_mult = (value.to_number(self.swf_version) / 100.0) as f32,
            ClipProperty::Name => {
                if let Value::String(s) = value {
                    node.name = Some(s);
                }
            }
            _ => {}
        }
    }

    fn resolve_path(&self, from: NodeId, path: &str) -> Option<NodeId> {
        node::resolve_path(from, path, self.arena, self.root)
    }

    fn variable_scope(&self, clip: NodeId) -> Option<GcPtr> {
        self.arena.get(clip).and_then(|n| n.context.scope.outermost())
    }

    fn frame_actions(&self, clip: NodeId, target: &FrameTarget) -> Vec<u8> {
        let Some(node) = self.arena.get(clip) else { return Vec::new() };
        let Some(frame_number) = resolve_frame_target(&node, target) else { return Vec::new() };
        let Some(frame) = node.definition.frames.get(frame_number.saturating_sub(1) as usize) else {
            return Vec::new();
        };
        if frame.actions.is_empty() {
            return Vec::new();
        }
        // Each DoAction record's bytes end with its own End (0x00) opcode;
        // concatenating them unmodified would stop the interpreter's reader
        // at the first one. Strip each record's terminator before joining
        // so `Call`'s "actions only" semantics (§4.5.3) run the frame's
        // whole action list as one stream, then close it with one
        // terminator of our own.
        let mut actions = Vec::new();
        for record in &frame.actions {
            actions.extend_from_slice(record.strip_suffix(&[Opcode::End as u8]).unwrap_or(record));
        }
        actions.push(Opcode::End as u8);
        actions
    }

    fn clone_sprite(&mut self, source: NodeId, target_path: &str, depth: i32) {
        let Some(parent_id) = self.arena.get(source).and_then(|n| n.parent) else { return };
        let Some((definition, character_id, matrix, color_transform)) =
            self.arena.get(source).map(|n| (n.definition.clone(), n.character_id, n.matrix, n.color_transform))
        else {
            return;
        };

        let persistent_scope = self.heap.allocate(ScriptObject::new());
        self.heap.add_root(persistent_scope);
        let depth = depth as Depth;
        let mut clone = MovieClipNode::new(definition, character_id, depth, Some(parent_id), persistent_scope);
        clone.matrix = matrix;
        clone.color_transform = color_transform;
        clone.name = Some(target_path.to_string());
        let clone_id = self.arena.insert(clone);
        if let Some(mut c) = self.arena.get_mut(clone_id) {
            c.bind_id(clone_id);
        }

        let displaced = self.arena.get_mut(parent_id).and_then(|mut p| p.children.insert(depth, DisplayChild::Clip(clone_id)));
        if let Some(DisplayChild::Clip(displaced_id)) = displaced {
            if displaced_id != clone_id {
                node::destroy(displaced_id, self.arena, self.heap);
            }
        }
    }

    fn remove_sprite(&mut self, target_path: &str) {
        let Some(target) = node::resolve_path(self.root, target_path, self.arena, self.root) else { return };
        if target == self.root {
            return;
        }
        let location = self.arena.get(target).map(|n| (n.parent, n.depth));
        let Some((Some(parent_id), depth)) = location else { return };
        if let Some(mut parent) = self.arena.get_mut(parent_id) {
            parent.children.remove(depth);
        }
        node::destroy(target, self.arena, self.heap);
    }

    fn current_time_millis(&self) -> u64 {
        self.start_time.elapsed().as_millis() as u64
    }

    fn random(&mut self, bound: i32) -> i32 {
        if bound <= 0 {
            0
        } else {
            self.rng.gen_range(0..bound)
        }
    }

    fn trace(&mut self, message: &str) {
        tracing::info!(target: "avm1::trace", "{message}");
    }
}

pub struct PlayerBuilder {
    movie_data: Option<Vec<u8>>,
    renderer: Option<Box<dyn RenderBackend>>,
    config: PlayerConfig,
}

impl PlayerBuilder {
    pub fn new() -> Self {
        Self { movie_data: None, renderer: None, config: PlayerConfig::default() }
    }

    pub fn with_movie(mut self, data: impl Into<Vec<u8>>) -> Self {
        self.movie_data = Some(data.into());
        self
    }

    pub fn with_renderer(mut self, renderer: impl RenderBackend + 'static) -> Self {
        self.renderer = Some(Box::new(renderer));
        self
    }

    pub fn with_frame_rate(mut self, frame_rate: f32) -> Self {
        self.config.frame_rate_override = Some(frame_rate);
        self
    }

    pub fn with_max_execution_duration(mut self, duration: Duration) -> Self {
        self.config.max_execution_duration = duration;
        self
    }

    pub fn with_max_call_depth(mut self, depth: u16) -> Self {
        self.config.max_call_depth = depth;
        self
    }

    pub fn with_initial_gc_threshold(mut self, threshold: usize) -> Self {
        self.config.initial_gc_threshold = Some(threshold);
        self
    }

    pub fn build(self) -> anyhow::Result<Player> {
        let data = self.movie_data.ok_or_else(|| anyhow!("PlayerBuilder::build called without a movie"))?;
        let movie = parse_movie(&data).context("failed to parse movie")?;
        let renderer = self.renderer.unwrap_or_else(|| Box::new(NullRenderer));
        Ok(Player::from_parsed(movie, self.config, renderer))
    }
}

impl Default for PlayerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn empty_movie_bytes() -> Vec<u8> {
        // "FWS", version 6, placeholder file length, then a minimal body:
        // a zero rect, 24.0 fps (8.8 fixed), 0 frames, then End (tag 0).
        let mut body = Vec::new();
        body.push(0x08); // RECT nbits=0 packed into the top bits, all zero
        body.extend_from_slice(&0x1800u16.to_le_bytes()); // frame rate 24.0 as 8.8 fixed, little-endian
        body.extend_from_slice(&0u16.to_le_bytes()); // num_frames
        body.extend_from_slice(&0u16.to_le_bytes()); // End tag (code 0, length 0)

        let mut out = vec![b'F', b'W', b'S', 6];
        out.extend_from_slice(&((8 + body.len()) as u32).to_le_bytes());
        out.extend_from_slice(&body);
        out
    }

    #[test]
    fn builder_without_movie_fails() {
        assert!(PlayerBuilder::new().build().is_err());
    }

    #[test]
    fn update_on_an_empty_movie_does_not_panic() {
        let mut player = PlayerBuilder::new().with_movie(empty_movie_bytes()).build().unwrap();
        player.update(1.0 / 24.0);
        player.render();
    }

    #[test]
    fn max_call_depth_override_is_applied() {
        let player = PlayerBuilder::new().with_movie(empty_movie_bytes()).with_max_call_depth(8).build().unwrap();
        assert_eq!(player.script_limits.max_recursion_depth, 8);
    }
}
