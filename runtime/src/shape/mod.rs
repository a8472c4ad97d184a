//! Shape records (C2's `DefineShape` payload) and the tesselator that turns
//! them into renderable meshes (C4).

mod tessellate;

pub use tessellate::{tessellate, TesselationError};

use crate::types::{Color, Matrix, Rectangle};

/// One stop in a gradient fill.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GradientRecord {
    pub ratio: u8,
    pub color: Color,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GradientSpread {
    Pad,
    Reflect,
    Repeat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GradientInterpolation {
    Rgb,
    LinearRgb,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Gradient {
    pub records: Vec<GradientRecord>,
    pub spread: GradientSpread,
    pub interpolation: GradientInterpolation,
    /// Only meaningful for radial gradients (`FillStyle::RadialGradient`).
    pub focal_point: f32,
}

/// A fill style, one side of one edge. The coordinate matrix maps the
/// gradient square `[-16384, 16384]^2` (or the bitmap's own pixel rect) into
/// shape space; the tesselator inverts it per-vertex to produce texcoords.
#[derive(Debug, Clone, PartialEq)]
pub enum FillStyle {
    Solid(Color),
    LinearGradient { matrix: Matrix, gradient: Gradient },
    RadialGradient { matrix: Matrix, gradient: Gradient },
    Bitmap { character_id: u16, matrix: Matrix, smoothed: bool, repeating: bool },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LineStyle {
    pub width: crate::types::Twips,
    pub color: Color,
}

/// One edge of a path: either a straight segment to `to`, or a quadratic
/// Bezier through `control` to `to`. Coordinates are in twips, relative to
/// the shape's own origin (absolute, not delta - already resolved from the
/// wire's delta-encoded edge records by the tag decoder).
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Edge {
    Straight { to: (f32, f32) },
    Curve { control: (f32, f32), to: (f32, f32) },
}

/// A single sub-path as emitted by the wire format: a pen-down position and
/// a sequence of edges, each carrying up to three style references into the
/// shape's style arrays. The wire format's 1-based indices (0 = no style)
/// are folded to 0-based `Option`s by the tag decoder immediately on read,
/// so downstream code never sees the "0 means absent" ambiguity.
#[derive(Debug, Clone, PartialEq)]
pub struct PathRecord {
    pub start: (f32, f32),
    pub edges: Vec<Edge>,
    pub left_fill: Option<u32>,
    pub right_fill: Option<u32>,
    pub line: Option<u32>,
}

/// The raw, pre-tesselation shape as read from a `DefineShape*` tag body:
/// style tables plus the path records referencing them by (folded) 0-based
/// index.
#[derive(Debug, Clone, PartialEq)]
pub struct ShapeRecord {
    pub bounds: Rectangle,
    pub fill_styles: Vec<FillStyle>,
    pub line_styles: Vec<LineStyle>,
    pub paths: Vec<PathRecord>,
}

/// A single renderer-ready vertex: position in pixels plus a fill-style
/// texture coordinate (unused but present for solid fills).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShapeVertex {
    pub x: f32,
    pub y: f32,
    pub u: f32,
    pub v: f32,
}

/// The tesselated form of a shape: a concatenated vertex buffer and index
/// buffer, partitioned into per-fill-style contour groups by a parallel
/// size-prefix list, per the data model's "shape definition" invariant.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ShapeDefinition {
    pub fill_styles: Vec<FillStyle>,
    pub vertices: Vec<ShapeVertex>,
    pub indices: Vec<u32>,
    /// Vertex count contributed by each contour group, parallel to
    /// `contour_style` and summing to `vertices.len()`.
    pub contour_vertex_counts: Vec<u32>,
    /// Index count contributed by each contour group, summing to
    /// `indices.len()`.
    pub contour_index_counts: Vec<u32>,
    /// 0-based fill style index for each contour group.
    pub contour_style: Vec<usize>,
}

/// Two topologically-identical tesselated shapes plus a 0-65535 blend
/// parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct MorphShapeDefinition {
    pub start: ShapeDefinition,
    pub end: ShapeDefinition,
}

impl MorphShapeDefinition {
    /// Linearly blends vertex positions between `start` and `end` at
    /// `ratio / 65535`. Topology (style list, contour structure, indices)
    /// is taken from `start` since both ends share it by construction.
    pub fn interpolate(&self, ratio: u16) -> ShapeDefinition {
        let t = ratio as f32 / 65535.0;
        let vertices = self
            .start
            .vertices
            .iter()
            .zip(self.end.vertices.iter())
            .map(|(s, e)| ShapeVertex {
                x: s.x + (e.x - s.x) * t,
                y: s.y + (e.y - s.y) * t,
                u: s.u + (e.u - s.u) * t,
                v: s.v + (e.v - s.v) * t,
            })
            .collect();
        ShapeDefinition {
            fill_styles: self.start.fill_styles.clone(),
            vertices,
            indices: self.start.indices.clone(),
            contour_vertex_counts: self.start.contour_vertex_counts.clone(),
            contour_index_counts: self.start.contour_index_counts.clone(),
            contour_style: self.start.contour_style.clone(),
        }
    }
}
