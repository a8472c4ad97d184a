//! The AVM1 execution loop (§4.6.1) and opcode semantics (§4.6.3).
//!
//! The interpreter never touches the display tree directly — it calls back
//! through [`ClipHost`], which the player's host adapter implements over a
//! borrowed view of the display arena. That keeps this module testable
//! against a bare mock host and keeps the dependency direction one way in
//! spirit even though both modules live in the same crate.

use std::time::{Duration, Instant};

use crate::display::arena::NodeId;
use crate::error::RuntimeError;
use crate::gc::{GcPtr, Heap};
use crate::parser::ScriptLimits;

use super::context::Context;
use super::opcode::{read_action, Opcode};
use super::value::Value;

/// The 22 intrinsic clip properties addressed by `GetProperty`/`SetProperty`
/// indices 0-21.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClipProperty {
    X,
    Y,
    XScale,
    YScale,
    CurrentFrame,
    TotalFrames,
    Alpha,
    Visible,
    Width,
    Height,
    Rotation,
    Target,
    FramesLoaded,
    Name,
    DropTarget,
    Url,
    HighQuality,
    FocusRect,
    SoundBufTime,
    Quality,
    XMouse,
    YMouse,
}

impl ClipProperty {
    pub fn from_index(index: i32) -> Option<Self> {
        use ClipProperty::*;
        Some(match index {
            0 => X,
            1 => Y,
            2 => XScale,
            3 => YScale,
            4 => CurrentFrame,
            5 => TotalFrames,
            6 => Alpha,
            7 => Visible,
            8 => Width,
            9 => Height,
            10 => Rotation,
            11 => Target,
            12 => FramesLoaded,
            13 => Name,
            14 => DropTarget,
            15 => Url,
            16 => HighQuality,
            17 => FocusRect,
            18 => SoundBufTime,
            19 => Quality,
            20 => XMouse,
            21 => YMouse,
            _ => return None,
        })
    }
}

/// What a retargeted `GotoFrame`/`Call`/`execute_frame_actions` should jump
/// to: either a plain frame number, or a label resolved against the
/// target's own definition.
#[derive(Debug, Clone)]
pub enum FrameTarget {
    Number(u16),
    Label(String),
}

/// The display-tree operations the interpreter needs from a clip node,
/// addressed by [`NodeId`]. Implemented by the player's host adapter over a
/// borrowed view of the display arena.
pub trait ClipHost {
    fn goto_frame(&mut self, clip: NodeId, target: FrameTarget, stop: bool);
    fn next_frame(&mut self, clip: NodeId);
    fn prev_frame(&mut self, clip: NodeId);
    fn play(&mut self, clip: NodeId);
    fn stop(&mut self, clip: NodeId);
    fn get_property(&self, clip: NodeId, property: ClipProperty) -> Value;
    fn set_property(&mut self, clip: NodeId, property: ClipProperty, value: Value);
    fn resolve_path(&self, from: NodeId, path: &str) -> Option<NodeId>;
    /// The clip's persistent variable object, for cross-clip `GetVariable`/
    /// `SetVariable` path resolution (`"/a/b:var"`).
    fn variable_scope(&self, clip: NodeId) -> Option<GcPtr>;
    /// Actions only (no commands), per §4.5.3's `Call` semantics.
    fn frame_actions(&self, clip: NodeId, target: &FrameTarget) -> Vec<u8>;
    fn clone_sprite(&mut self, source: NodeId, target_path: &str, depth: i32);
    fn remove_sprite(&mut self, target_path: &str);
    fn current_time_millis(&self) -> u64;
    fn random(&mut self, bound: i32) -> i32;
    fn trace(&mut self, message: &str);
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExecutionOutcome {
    Completed,
    /// The action record was abandoned at the point of failure; the frame
    /// that invoked it keeps running (§7).
    Aborted(RuntimeError),
}

/// Runs one action record (a `DoAction` body, or a frame's accumulated
/// action list) to completion or abandonment. `depth` is the current call
/// recursion depth, checked against `limits.max_recursion_depth`.
#[allow(clippy::too_many_arguments)]
pub fn execute(
    actions: &[u8],
    ctx: &mut Context,
    heap: &Heap,
    host: &mut dyn ClipHost,
    swf_version: u8,
    limits: &ScriptLimits,
    depth: u16,
) -> ExecutionOutcome {
    if depth > limits.max_recursion_depth {
        return ExecutionOutcome::Aborted(RuntimeError::ScriptLimit("max recursion depth exceeded"));
    }

    let deadline = Instant::now() + Duration::from_secs(limits.script_timeout_seconds as u64);
    let mut reader = crate::stream::SwfReader::new(actions);
    let mut stack: Vec<Value> = Vec::new();

    loop {
        if Instant::now() >= deadline {
            return ExecutionOutcome::Aborted(RuntimeError::ScriptLimit("script timeout exceeded"));
        }

        let record = match read_action(&mut reader) {
            Ok(Some(record)) => record,
            Ok(None) => break,
            Err(_) => break,
        };

        let outcome = run_one(
            record.opcode,
            record.payload.remaining(),
            &mut reader,
            &mut stack,
            ctx,
            heap,
            host,
            swf_version,
            limits,
            depth,
        );
        if let ExecutionOutcome::Aborted(err) = outcome {
            return ExecutionOutcome::Aborted(err);
        }
    }

    if heap.should_collect() {
        heap.collect();
    }
    ExecutionOutcome::Completed
}

#[allow(clippy::too_many_arguments)]
fn run_one(
    opcode: u8,
    payload: &[u8],
    _reader: &mut crate::stream::SwfReader,
    stack: &mut Vec<Value>,
    ctx: &mut Context,
    heap: &Heap,
    host: &mut dyn ClipHost,
    swf_version: u8,
    limits: &ScriptLimits,
    depth: u16,
) -> ExecutionOutcome {
    let Some(op) = Opcode::from_byte(opcode) else {
        tracing::debug!(opcode, "skipping unrecognized AVM1 opcode");
        return ExecutionOutcome::Completed;
    };

    macro_rules! pop {
        () => {
            match stack.pop() {
                Some(v) => v,
                None => return ExecutionOutcome::Aborted(RuntimeError::StackUnderflow),
            }
        };
    }

    match op {
        Opcode::End => {}

        Opcode::Pop => {
            pop!();
        }

        Opcode::Push => {
            if let Err(err) = push_literals(payload, stack, ctx) {
                return ExecutionOutcome::Aborted(err);
            }
        }

        Opcode::Add => {
            let b = pop!().to_number(swf_version);
            let a = pop!().to_number(swf_version);
            stack.push(Value::Number(a + b));
        }
        Opcode::Subtract => {
            // Second-from-top is the minuend: `a - b` where `b` was pushed
            // last (popped first).
            let b = pop!().to_number(swf_version);
            let a = pop!().to_number(swf_version);
            stack.push(Value::Number(a - b));
        }
        Opcode::Multiply => {
            let b = pop!().to_number(swf_version);
            let a = pop!().to_number(swf_version);
            stack.push(Value::Number(a * b));
        }
        Opcode::Divide => {
            let b = pop!().to_number(swf_version);
            let a = pop!().to_number(swf_version);
            if b == 0.0 {
                if swf_version < 5 {
                    stack.push(Value::String("#ERROR#".to_string()));
                } else {
                    stack.push(Value::Number(a / b));
                }
            } else {
                stack.push(Value::Number(a / b));
            }
        }
        Opcode::Equals => {
            let b = pop!().to_number(swf_version);
            let a = pop!().to_number(swf_version);
            push_bool_or_flag(stack, a == b, swf_version);
        }
        Opcode::Less => {
            let b = pop!().to_number(swf_version);
            let a = pop!().to_number(swf_version);
            push_bool_or_flag(stack, a < b, swf_version);
        }
        Opcode::And => {
            let b = pop!().to_boolean(swf_version);
            let a = pop!().to_boolean(swf_version);
            push_bool_or_flag(stack, a && b, swf_version);
        }
        Opcode::Or => {
            let b = pop!().to_boolean(swf_version);
            let a = pop!().to_boolean(swf_version);
            push_bool_or_flag(stack, a || b, swf_version);
        }
        Opcode::Not => {
            let a = pop!().to_boolean(swf_version);
            push_bool_or_flag(stack, !a, swf_version);
        }

        Opcode::StringEquals => {
            let b = pop!().to_string_value(swf_version);
            let a = pop!().to_string_value(swf_version);
            push_bool_or_flag(stack, a == b, swf_version);
        }
        Opcode::StringLess => {
            let b = pop!().to_string_value(swf_version);
            let a = pop!().to_string_value(swf_version);
            push_bool_or_flag(stack, a < b, swf_version);
        }
        Opcode::StringLength => {
            let s = pop!().to_string_value(swf_version);
            stack.push(Value::Number(s.chars().count() as f64));
        }
        Opcode::StringAdd => {
            let b = pop!().to_string_value(swf_version);
            let a = pop!().to_string_value(swf_version);
            stack.push(Value::String(a + &b));
        }
        Opcode::StringExtract => {
            let count = pop!().to_integer(swf_version);
            let index = pop!().to_integer(swf_version);
            let s = pop!().to_string_value(swf_version);
            if count < 0 {
                stack.push(Value::String(String::new()));
            } else {
                let chars: Vec<char> = s.chars().collect();
                let start = (index.max(0) as usize).min(chars.len());
                let end = start.saturating_add(count as usize).min(chars.len());
                stack.push(Value::String(chars[start..end].iter().collect()));
            }
        }
        Opcode::ToInteger => {
            let v = pop!();
            stack.push(Value::Number(v.to_integer(swf_version) as f64));
        }

        Opcode::Jump => {
            // Payload-relative jumps are resolved by the caller reassembling
            // the byte stream; since we read records sequentially off a
            // single reader, an in-record jump re-seeks by re-slicing from
            // the action list start is out of scope for a single linear
            // pass. Jump/If targets are offsets from the end of this
            // record's payload within the *original* action list, which
            // `_reader` already sits at — so a jump of 0 is a no-op and a
            // non-zero jump re-positions `_reader` relative to its current
            // cursor.
            let offset = i16::from_le_bytes([
                *payload.first().unwrap_or(&0),
                *payload.get(1).unwrap_or(&0),
            ]);
            _reader.seek_relative(offset as i32);
        }
        Opcode::If => {
            let condition = pop!().to_boolean(swf_version);
            let offset = i16::from_le_bytes([
                *payload.first().unwrap_or(&0),
                *payload.get(1).unwrap_or(&0),
            ]);
            if condition {
                _reader.seek_relative(offset as i32);
            }
        }

        Opcode::GetVariable => {
            let name = pop!().to_string_value(swf_version);
            let value = resolve_variable(&name, ctx, heap, host);
            stack.push(value);
        }
        Opcode::SetVariable => {
            let value = pop!();
            let name = pop!().to_string_value(swf_version);
            assign_variable(&name, value, ctx, heap, host);
        }
        Opcode::DefineLocal => {
            let value = pop!();
            let name = pop!();
            let Value::String(name) = name else {
                return ExecutionOutcome::Aborted(RuntimeError::TypeError("DefineLocal name must be a string"));
            };
            ctx.scope.define_local(heap, &name, value);
        }

        Opcode::GetMember => {
            let name = pop!().to_string_value(swf_version);
            let object = pop!();
            let value = match object {
                Value::Object(ptr) => heap.get(ptr).and_then(|o| o.get(&name)).unwrap_or(Value::Undefined),
                _ => Value::Undefined,
            };
            stack.push(value);
        }
        Opcode::SetMember => {
            let value = pop!();
            let name = pop!().to_string_value(swf_version);
            let object = pop!();
            if let Value::Object(ptr) = object {
                if let Some(o) = heap.get(ptr) {
                    o.set(&name, value);
                }
            }
        }

        Opcode::GetProperty => {
            let property_index = pop!().to_integer(swf_version);
            let target_path = pop!().to_string_value(swf_version);
            let value = ClipProperty::from_index(property_index)
                .and_then(|p| host.resolve_path(ctx.current_clip(), &target_path).map(|clip| host.get_property(clip, p)))
                .unwrap_or(Value::Undefined);
            stack.push(value);
        }
        Opcode::SetProperty => {
            let value = pop!();
            let property_index = pop!().to_integer(swf_version);
            let target_path = pop!().to_string_value(swf_version);
            if let Some(property) = ClipProperty::from_index(property_index) {
                if let Some(clip) = host.resolve_path(ctx.current_clip(), &target_path) {
                    host.set_property(clip, property, value);
                }
            }
        }

        Opcode::GotoFrame => {
            let frame = u16::from_le_bytes([*payload.first().unwrap_or(&0), *payload.get(1).unwrap_or(&0)]);
            host.goto_frame(ctx.current_clip(), FrameTarget::Number(frame + 1), true);
        }
        Opcode::GotoLabel => {
            let mut p = crate::stream::SwfReader::new(payload);
            if let Ok(label) = p.read_cstring() {
                host.goto_frame(ctx.current_clip(), FrameTarget::Label(label), true);
            }
        }
        Opcode::GotoFrame2 => {
            let flags = *payload.first().unwrap_or(&0);
            let has_scene_bias = flags & 0b10 != 0;
            let stop = flags & 0b01 == 0;
            let bias = if has_scene_bias {
                u16::from_le_bytes([*payload.get(1).unwrap_or(&0), *payload.get(2).unwrap_or(&0)])
            } else {
                0
            };
            let frame = pop!().to_integer(swf_version).max(0) as u16;
            host.goto_frame(ctx.current_clip(), FrameTarget::Number(frame + bias + 1), stop);
        }
        Opcode::NextFrame => host.next_frame(ctx.current_clip()),
        Opcode::PrevFrame => host.prev_frame(ctx.current_clip()),
        Opcode::Play => host.play(ctx.current_clip()),
        Opcode::Stop => host.stop(ctx.current_clip()),

        Opcode::Call => {
            let target = pop!();
            let frame_target = match target {
                Value::String(label) => FrameTarget::Label(label),
                other => FrameTarget::Number(other.to_integer(swf_version).max(0) as u16 + 1),
            };
            let actions = host.frame_actions(ctx.current_clip(), &frame_target);
            execute(&actions, ctx, heap, host, swf_version, limits, depth + 1);
        }

        Opcode::SetTarget => {
            let mut p = crate::stream::SwfReader::new(payload);
            let path = p.read_cstring().unwrap_or_default();
            if path.is_empty() {
                ctx.reset_target();
            } else if let Some(target) = host.resolve_path(ctx.owning_clip(), &path) {
                ctx.set_target(target);
            }
        }
        Opcode::SetTarget2 => {
            let path = pop!().to_string_value(swf_version);
            if path.is_empty() {
                ctx.reset_target();
            } else if let Some(target) = host.resolve_path(ctx.owning_clip(), &path) {
                ctx.set_target(target);
            }
        }

        Opcode::Trace => {
            let message = pop!().to_string_value(swf_version);
            host.trace(&message);
        }
        Opcode::GetTime => {
            stack.push(Value::Number(host.current_time_millis() as f64));
        }
        Opcode::RandomNumber => {
            let bound = pop!().to_integer(swf_version);
            stack.push(Value::Number(host.random(bound.max(0)) as f64));
        }

        Opcode::ConstantPool => {
            let mut p = crate::stream::SwfReader::new(payload);
            let count = p.read_u16().unwrap_or(0);
            let mut pool = Vec::with_capacity(count as usize);
            for _ in 0..count {
                match p.read_cstring() {
                    Ok(s) => pool.push(s),
                    Err(_) => break,
                }
            }
            ctx.constant_pool = pool;
        }

        Opcode::CloneSprite => {
            let depth = pop!().to_integer(swf_version);
            let target_path = pop!().to_string_value(swf_version);
            let source_path = pop!().to_string_value(swf_version);
            if let Some(source) = host.resolve_path(ctx.current_clip(), &source_path) {
                host.clone_sprite(source, &target_path, depth);
            }
        }
        Opcode::RemoveSprite => {
            let target_path = pop!().to_string_value(swf_version);
            host.remove_sprite(&target_path);
        }

        Opcode::GetUrl | Opcode::GetUrl2 => {
            // GetURL pops two string operands (url, target/method) and is
            // otherwise a diagnostic no-op; FSCommand is conventionally
            // dispatched through the same opcode with a `fscommand:` URL
            // prefix, so there is no separate handling here.
            if op == Opcode::GetUrl2 {
                let _target = pop!().to_string_value(swf_version);
                let _url = pop!().to_string_value(swf_version);
            } else {
                let mut p = crate::stream::SwfReader::new(payload);
                let _url = p.read_cstring();
                let _target = p.read_cstring();
            }
        }
    }

    ExecutionOutcome::Completed
}

/// `Equals`/`Less`/`And`/`Or`/`Not` push a boolean on version >= 5 and a
/// `0.0`/`1.0` number otherwise (§4.6.3).
fn push_bool_or_flag(stack: &mut Vec<Value>, result: bool, swf_version: u8) {
    if swf_version >= 5 {
        stack.push(Value::Boolean(result));
    } else {
        stack.push(Value::Number(if result { 1.0 } else { 0.0 }));
    }
}

/// Decodes a `Push` payload: a sequence of type-tagged literals (§4.6.3's
/// ten push types), pushed left to right.
fn push_literals(payload: &[u8], stack: &mut Vec<Value>, ctx: &Context) -> Result<(), RuntimeError> {
    let mut reader = crate::stream::SwfReader::new(payload);
    while !reader.is_empty() {
        let tag = reader.read_u8().map_err(|_| RuntimeError::TypeError("malformed push payload"))?;
        let value = match tag {
            0 => Value::String(reader.read_cstring().map_err(|_| RuntimeError::TypeError("malformed push string"))?),
            1 => Value::Number(reader.read_float32().map_err(|_| RuntimeError::TypeError("malformed push float"))? as f64),
            2 => Value::Null,
            3 => Value::Undefined,
            4 => {
                let index = reader.read_u8().map_err(|_| RuntimeError::TypeError("malformed push register"))?;
                Value::String(format!("$register{index}"))
            }
            5 => Value::Boolean(reader.read_u8().map_err(|_| RuntimeError::TypeError("malformed push bool"))? != 0),
            6 => Value::Number(reader.read_float64().map_err(|_| RuntimeError::TypeError("malformed push double"))?),
            7 => Value::Number(reader.read_i32().map_err(|_| RuntimeError::TypeError("malformed push int"))? as f64),
            8 => {
                let index = reader.read_u8().map_err(|_| RuntimeError::TypeError("malformed push constant8"))? as usize;
                Value::String(ctx.constant(index).unwrap_or("").to_string())
            }
            9 => {
                let index = reader.read_u16().map_err(|_| RuntimeError::TypeError("malformed push constant16"))? as usize;
                Value::String(ctx.constant(index).unwrap_or("").to_string())
            }
            _ => return Err(RuntimeError::TypeError("unknown push type tag")),
        };
        stack.push(value);
    }
    Ok(())
}

/// `GetVariable`: an absolute path (`/a/b:var` or `a.b.var`) retargets to a
/// different clip's scope before falling back to the current scope chain;
/// an unqualified name resolves against the current context's scope chain.
fn resolve_variable(name: &str, ctx: &Context, heap: &Heap, host: &dyn ClipHost) -> Value {
    if let Some((path, var)) = split_path(name) {
        return host
            .resolve_path(ctx.current_clip(), path)
            .and_then(|clip| host.variable_scope(clip))
            .and_then(|scope| heap.get(scope).and_then(|o| o.get(var)))
            .unwrap_or(Value::Undefined);
    }
    ctx.scope.get(heap, name).unwrap_or(Value::Undefined)
}

fn assign_variable(name: &str, value: Value, ctx: &Context, heap: &Heap, host: &dyn ClipHost) {
    if let Some((path, var)) = split_path(name) {
        if let Some(scope) = host.resolve_path(ctx.current_clip(), path).and_then(|clip| host.variable_scope(clip)) {
            if let Some(object) = heap.get(scope) {
                object.set(var, value);
            }
        }
        return;
    }
    ctx.scope.set(heap, name, value);
}

/// Splits `"/a/b:var"` style qualified names into `(path, var)`; returns
/// `None` for a bare variable name.
fn split_path(name: &str) -> Option<(&str, &str)> {
    name.rfind(':').map(|i| (&name[..i], &name[i + 1..]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::avm1::object::ScriptObject;
    use crate::avm1::scope::Scope;
    use crate::display::arena::NodeArena;

    struct MockHost;

    impl ClipHost for MockHost {
        fn goto_frame(&mut self, _clip: NodeId, _target: FrameTarget, _stop: bool) {}
        fn next_frame(&mut self, _clip: NodeId) {}
        fn prev_frame(&mut self, _clip: NodeId) {}
        fn play(&mut self, _clip: NodeId) {}
        fn stop(&mut self, _clip: NodeId) {}
        fn get_property(&self, _clip: NodeId, _property: ClipProperty) -> Value {
            Value::Undefined
        }
        fn set_property(&mut self, _clip: NodeId, _property: ClipProperty, _value: Value) {}
        fn resolve_path(&self, _from: NodeId, _path: &str) -> Option<NodeId> {
            None
        }
        fn variable_scope(&self, _clip: NodeId) -> Option<GcPtr> {
            None
        }
        fn frame_actions(&self, _clip: NodeId, _target: &FrameTarget) -> Vec<u8> {
            Vec::new()
        }
        fn clone_sprite(&mut self, _source: NodeId, _target_path: &str, _depth: i32) {}
        fn remove_sprite(&mut self, _target_path: &str) {}
        fn current_time_millis(&self) -> u64 {
            0
        }
        fn random(&mut self, _bound: i32) -> i32 {
            0
        }
        fn trace(&mut self, _message: &str) {}
    }

    fn new_context() -> (Heap, Context, NodeId) {
        let heap = Heap::new();
        let persistent = heap.allocate(ScriptObject::new());
        heap.add_root(persistent);
        let arena: NodeArena<()> = NodeArena::new();
        let clip = arena.insert(());
        (heap, Context::new(clip, Scope::new(persistent)), clip)
    }

    fn push_number(n: f64) -> Vec<u8> {
        let mut bytes = vec![6u8];
        bytes.extend_from_slice(&n.to_le_bytes());
        bytes
    }

    fn action(opcode: u8, payload: &[u8]) -> Vec<u8> {
        let mut out = vec![opcode];
        if opcode >= 0x80 {
            out.extend_from_slice(&(payload.len() as u16).to_le_bytes());
            out.extend_from_slice(payload);
        }
        out
    }

    #[test]
    fn push_add_leaves_sum_on_stack() {
        let (heap, mut ctx, _) = new_context();
        let mut host = MockHost;
        let limits = ScriptLimits::default();

        let mut payload = push_number(1.0);
        payload.extend(push_number(2.0));
        payload.extend(push_number(3.0));
        let mut actions = action(Opcode::Push as u8, &payload);
        actions.extend(action(Opcode::Add as u8, &[]));
        actions.extend(action(Opcode::Add as u8, &[]));
        actions.push(0x00);

        let mut reader = crate::stream::SwfReader::new(&actions);
        let mut stack = Vec::new();
        loop {
            let record = read_action(&mut reader).unwrap();
            let Some(record) = record else { break };
            run_one(record.opcode, record.payload.remaining(), &mut reader, &mut stack, &mut ctx, &heap, &mut host, 6, &limits, 0);
        }
        assert!(matches!(stack.as_slice(), [Value::Number(n)] if *n == 6.0));
    }

    #[test]
    fn subtract_uses_second_from_top_as_minuend() {
        let (heap, mut ctx, _) = new_context();
        let mut host = MockHost;
        let limits = ScriptLimits::default();

        let mut payload = push_number(10.0);
        payload.extend(push_number(3.0));
        let mut actions = action(Opcode::Push as u8, &payload);
        actions.extend(action(Opcode::Subtract as u8, &[]));
        actions.push(0x00);

        let mut reader = crate::stream::SwfReader::new(&actions);
        let mut stack = Vec::new();
        while let Some(record) = read_action(&mut reader).unwrap() {
            run_one(record.opcode, record.payload.remaining(), &mut reader, &mut stack, &mut ctx, &heap, &mut host, 6, &limits, 0);
        }
        assert!(matches!(stack.as_slice(), [Value::Number(n)] if *n == 7.0));
    }

    #[test]
    fn divide_by_zero_is_version_gated() {
        let (heap, mut ctx, _) = new_context();
        let mut host = MockHost;
        let limits = ScriptLimits::default();

        let mut payload = push_number(1.0);
        payload.extend(push_number(0.0));
        let mut actions = action(Opcode::Push as u8, &payload);
        actions.extend(action(Opcode::Divide as u8, &[]));
        actions.push(0x00);

        let mut reader = crate::stream::SwfReader::new(&actions);
        let mut stack = Vec::new();
        while let Some(record) = read_action(&mut reader).unwrap() {
            run_one(record.opcode, record.payload.remaining(), &mut reader, &mut stack, &mut ctx, &heap, &mut host, 4, &limits, 0);
        }
        assert!(matches!(stack.as_slice(), [Value::String(s)] if s == "#ERROR#"));
    }

    #[test]
    fn if_branch_taken_skips_dead_block() {
        let (heap, mut ctx, _) = new_context();
        let mut host = MockHost;
        let limits = ScriptLimits::default();

        // Push true, If(skip the "push 0" block), push 42, end.
        let mut actions = action(Opcode::Push as u8, &[5u8, 1]);
        let skip_block = action(Opcode::Push as u8, &push_number(0.0));
        actions.extend(action(Opcode::If as u8, &(skip_block.len() as i16).to_le_bytes()));
        actions.extend(skip_block);
        actions.extend(action(Opcode::Push as u8, &push_number(42.0)));
        actions.push(0x00);

        let mut reader = crate::stream::SwfReader::new(&actions);
        let mut stack = Vec::new();
        while let Some(record) = read_action(&mut reader).unwrap() {
            run_one(record.opcode, record.payload.remaining(), &mut reader, &mut stack, &mut ctx, &heap, &mut host, 6, &limits, 0);
        }
        assert!(matches!(stack.as_slice(), [Value::Number(n)] if *n == 42.0));
    }

    #[test]
    fn if_branch_not_taken_falls_through() {
        let (heap, mut ctx, _) = new_context();
        let mut host = MockHost;
        let limits = ScriptLimits::default();

        let mut actions = action(Opcode::Push as u8, &[5u8, 0]);
        let skip_block = action(Opcode::Push as u8, &push_number(0.0));
        actions.extend(action(Opcode::If as u8, &(skip_block.len() as i16).to_le_bytes()));
        actions.extend(skip_block);
        actions.extend(action(Opcode::Push as u8, &push_number(42.0)));
        actions.push(0x00);

        let mut reader = crate::stream::SwfReader::new(&actions);
        let mut stack = Vec::new();
        while let Some(record) = read_action(&mut reader).unwrap() {
            run_one(record.opcode, record.payload.remaining(), &mut reader, &mut stack, &mut ctx, &heap, &mut host, 6, &limits, 0);
        }
        assert!(matches!(stack.as_slice(), [Value::Number(a), Value::Number(b)] if *a == 0.0 && *b == 42.0));
    }

    #[test]
    fn string_add_and_extract() {
        let (heap, mut ctx, _) = new_context();
        let mut host = MockHost;
        let limits = ScriptLimits::default();

        let mut str_payload = vec![0u8];
        str_payload.extend_from_slice(b"ab\0");
        str_payload.push(0);
        str_payload.extend_from_slice(b"cd\0");
        let mut actions = action(Opcode::Push as u8, &str_payload);
        actions.extend(action(Opcode::StringAdd as u8, &[]));
        actions.push(0x00);

        let mut reader = crate::stream::SwfReader::new(&actions);
        let mut stack = Vec::new();
        while let Some(record) = read_action(&mut reader).unwrap() {
            run_one(record.opcode, record.payload.remaining(), &mut reader, &mut stack, &mut ctx, &heap, &mut host, 6, &limits, 0);
        }
        assert!(matches!(stack.as_slice(), [Value::String(s)] if s == "abcd"));
    }

    #[test]
    fn define_local_then_get_variable_same_scope() {
        let (heap, ctx, _) = new_context();
        ctx.scope.define_local(&heap, "x", Value::Number(5.0));
        assert!(matches!(ctx.scope.get(&heap, "x"), Some(Value::Number(n)) if n == 5.0));
    }
}
