//! The render adapter (C8): a stateless vertex-push interface a host
//! implements. The core never owns GPU resources — texture ids are opaque
//! handles minted by the backend and only ever retained here.

use crate::shape::{FillStyle, ShapeDefinition};
use crate::types::{Color, ColorTransform, Matrix};

/// An opaque handle to a backend-resident texture (a bitmap fill or an
/// image character's decoded pixels). The core never inspects its value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextureId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlendMode {
    Normal,
    Layer,
    Multiply,
    Screen,
    Lighten,
    Darken,
    Add,
    Subtract,
    Difference,
    Invert,
    Alpha,
    Erase,
}

impl Default for BlendMode {
    fn default() -> Self {
        BlendMode::Normal
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Vertex {
    pub x: f32,
    pub y: f32,
    pub u: f32,
    pub v: f32,
}

/// One tesselated mesh plus the state it must be drawn under. Vertices are
/// already in the emitting clip's local pixel space; `transform` carries
/// them into stage space.
#[derive(Debug, Clone)]
pub struct DrawCommand {
    pub vertices: Vec<Vertex>,
    pub indices: Vec<u32>,
    pub texture: Option<TextureId>,
    pub transform: Matrix,
    pub color_transform: ColorTransform,
    pub blend_mode: BlendMode,
}

/// The interface a render host implements. The core calls `begin_frame`,
/// some number of `submit`s in display order, then `end_frame`; a host is
/// free to batch however it likes behind this boundary.
pub trait RenderBackend {
    fn begin_frame(&mut self, background_color: Color);
    fn submit(&mut self, command: DrawCommand);
    fn end_frame(&mut self);
}

/// A backend that drops every command; the default when a player is built
/// without `with_renderer`, and a baseline for headless script-only runs.
#[derive(Debug, Default)]
pub struct NullRenderer;

impl RenderBackend for NullRenderer {
    fn begin_frame(&mut self, _background_color: Color) {}
    fn submit(&mut self, _command: DrawCommand) {}
    fn end_frame(&mut self) {}
}

/// Splits a tesselated shape into one `DrawCommand` per contour group (each
/// group already shares a single fill style) and pushes them onto `queue` in
/// the order the tesselator produced them. `transform`/`color_transform` are
/// the full stage-space transform for the character carrying this shape;
/// the shape's own vertices stay in its local pixel space, per
/// `DrawCommand`'s contract.
pub fn submit_shape(
    shape: &ShapeDefinition,
    transform: Matrix,
    color_transform: ColorTransform,
    queue: &mut DrawQueue,
    backend: &mut dyn RenderBackend,
) {
    let mut vertex_offset = 0usize;
    let mut index_offset = 0usize;
    for ((&vertex_count, &index_count), &style_index) in
        shape.contour_vertex_counts.iter().zip(&shape.contour_index_counts).zip(&shape.contour_style)
    {
        let vertex_count = vertex_count as usize;
        let index_count = index_count as usize;
        let vertices: Vec<Vertex> = shape.vertices[vertex_offset..vertex_offset + vertex_count]
            .iter()
            .map(|v| Vertex { x: v.x, y: v.y, u: v.u, v: v.v })
            .collect();
        let base = vertex_offset as u32;
        let indices: Vec<u32> =
            shape.indices[index_offset..index_offset + index_count].iter().map(|&i| i - base).collect();
        let texture = match shape.fill_styles.get(style_index) {
            Some(FillStyle::Bitmap { character_id, .. }) => Some(TextureId(*character_id as u32)),
            _ => None,
        };
        let command =
            DrawCommand { vertices, indices, texture, transform, color_transform, blend_mode: BlendMode::Normal };
        queue.push(command, backend);
        vertex_offset += vertex_count;
        index_offset += index_count;
    }
}

/// Coalesces consecutive draw commands that share texture and blend state
/// into a single submission, flushing at a state-affecting boundary
/// (texture, blend mode, or the configured vertex capacity) so the backend
/// sees fewer, larger draw calls than the display tree emits.
pub struct DrawQueue {
    pending: Option<DrawCommand>,
    capacity: usize,
}

impl DrawQueue {
    pub const DEFAULT_CAPACITY: usize = 4096;

    pub fn new() -> Self {
        Self { pending: None, capacity: Self::DEFAULT_CAPACITY }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self { pending: None, capacity }
    }

    /// Pushes one mesh onto the queue, flushing whatever was pending to
    /// `backend` first if it can't be merged with this one.
    pub fn push(&mut self, command: DrawCommand, backend: &mut dyn RenderBackend) {
        let mergeable = self.pending.as_ref().is_some_and(|p| {
            p.texture == command.texture
                && p.blend_mode == command.blend_mode
                && p.transform == command.transform
                && p.color_transform == command.color_transform
                && p.vertices.len() + command.vertices.len() <= self.capacity
        });
        if mergeable {
            let pending = self.pending.as_mut().unwrap();
            let base = pending.vertices.len() as u32;
            pending.vertices.extend(command.vertices);
            pending.indices.extend(command.indices.into_iter().map(|i| i + base));
        } else {
            self.flush(backend);
            self.pending = Some(command);
        }
    }

    pub fn flush(&mut self, backend: &mut dyn RenderBackend) {
        if let Some(command) = self.pending.take() {
            backend.submit(command);
        }
    }
}

impl Default for DrawQueue {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct RecordingBackend {
        submitted: Vec<DrawCommand>,
    }

    impl RenderBackend for RecordingBackend {
        fn begin_frame(&mut self, _background_color: Color) {}
        fn submit(&mut self, command: DrawCommand) {
            self.submitted.push(command);
        }
        fn end_frame(&mut self) {}
    }

    fn triangle(texture: Option<TextureId>) -> DrawCommand {
        DrawCommand {
            vertices: vec![
                Vertex { x: 0.0, y: 0.0, u: 0.0, v: 0.0 },
                Vertex { x: 1.0, y: 0.0, u: 1.0, v: 0.0 },
                Vertex { x: 0.0, y: 1.0, u: 0.0, v: 1.0 },
            ],
            indices: vec![0, 1, 2],
            texture,
            transform: Matrix::IDENTITY,
            color_transform: ColorTransform::IDENTITY,
            blend_mode: BlendMode::Normal,
        }
    }

    #[test]
    fn same_state_commands_merge_into_one_submission() {
        let mut backend = RecordingBackend::default();
        let mut queue = DrawQueue::new();
        queue.push(triangle(Some(TextureId(1))), &mut backend);
        queue.push(triangle(Some(TextureId(1))), &mut backend);
        queue.flush(&mut backend);
        assert_eq!(backend.submitted.len(), 1);
        assert_eq!(backend.submitted[0].vertices.len(), 6);
        assert_eq!(backend.submitted[0].indices, vec![0, 1, 2, 3, 4, 5]);
    }

    #[test]
    fn texture_change_flushes_the_pending_submission() {
        let mut backend = RecordingBackend::default();
        let mut queue = DrawQueue::new();
        queue.push(triangle(Some(TextureId(1))), &mut backend);
        queue.push(triangle(Some(TextureId(2))), &mut backend);
        queue.flush(&mut backend);
        assert_eq!(backend.submitted.len(), 2);
    }

    #[test]
    fn capacity_overflow_flushes_the_pending_submission() {
        let mut backend = RecordingBackend::default();
        let mut queue = DrawQueue::with_capacity(4);
        queue.push(triangle(None), &mut backend);
        queue.push(triangle(None), &mut backend);
        queue.flush(&mut backend);
        assert_eq!(backend.submitted.len(), 2);
    }
}
