//! The shape tesselator (C4): Bezier flattening, per-style contour merging,
//! polygon tesselation and texture-coordinate generation.

use std::collections::HashMap;

use lyon_tessellation::{
    geom::point, path::Path, BuffersBuilder, FillOptions, FillRule, FillTessellator, FillVertex,
    FillVertexConstructor, VertexBuffers,
};
use thiserror::Error;

use super::{Edge, FillStyle, Gradient, PathRecord, ShapeDefinition, ShapeRecord, ShapeVertex};
use crate::types::Matrix;

/// L1-norm flatness tolerance in twips (0.2px), per the curve-flattening step.
const FLATTEN_TOLERANCE: f32 = 4.0;
const MAX_FLATTEN_DEPTH: u32 = 10;

/// Half-extent of the gradient reference square, in twips.
const GRADIENT_SQUARE_TWIPS: f32 = 16384.0;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum TesselationError {
    #[error("contour for fill style {0} could not be closed")]
    UnclosedContour(usize),
}

struct VertexCtor;

impl FillVertexConstructor<(f32, f32)> for VertexCtor {
    fn new_vertex(&mut self, vertex: FillVertex) -> (f32, f32) {
        let p = vertex.position();
        (p.x, p.y)
    }
}

/// Step A: recursively subdivide a quadratic Bezier until its midpoint
/// deviation falls below `FLATTEN_TOLERANCE` (L1 norm) or the recursion
/// depth reaches `MAX_FLATTEN_DEPTH`, appending flattened points to `out`.
fn flatten_quadratic(p0: (f32, f32), control: (f32, f32), p1: (f32, f32), depth: u32, out: &mut Vec<(f32, f32)>) {
    let mid_endpoints = ((p0.0 + p1.0) * 0.5, (p0.1 + p1.1) * 0.5);
    let deviation = (mid_endpoints.0 - control.0).abs() + (mid_endpoints.1 - control.1).abs();
    if depth >= MAX_FLATTEN_DEPTH || deviation < FLATTEN_TOLERANCE {
        out.push(p1);
        return;
    }
    let mid01 = ((p0.0 + control.0) * 0.5, (p0.1 + control.1) * 0.5);
    let mid_cp1 = ((control.0 + p1.0) * 0.5, (control.1 + p1.1) * 0.5);
    let mid = ((mid01.0 + mid_cp1.0) * 0.5, (mid01.1 + mid_cp1.1) * 0.5);
    flatten_quadratic(p0, mid01, mid, depth + 1, out);
    flatten_quadratic(mid, mid_cp1, p1, depth + 1, out);
}

/// Flattens a whole path record into a polyline in twips, starting at
/// `path.start`.
fn flatten_path(path: &PathRecord) -> Vec<(f32, f32)> {
    let mut points = vec![path.start];
    let mut cursor = path.start;
    for edge in &path.edges {
        match *edge {
            Edge::Straight { to } => {
                points.push(to);
                cursor = to;
            }
            Edge::Curve { control, to } => {
                flatten_quadratic(cursor, control, to, 0, &mut points);
                cursor = to;
            }
        }
    }
    points
}

fn point_key(p: (f32, f32)) -> (u32, u32) {
    (p.0.to_bits(), p.1.to_bits())
}

/// Step B: merges directed polyline fragments contributed by every path
/// that references `style_index` (on either fill side) into closed
/// contours by end-point matching.
fn merge_contours(mut fragments: Vec<Vec<(f32, f32)>>, style_index: usize) -> Result<Vec<Vec<(f32, f32)>>, TesselationError> {
    let mut contours = Vec::new();
    let mut used = vec![false; fragments.len()];

    loop {
        let Some(start_idx) = used.iter().position(|&u| !u) else { break };
        used[start_idx] = true;
        let mut contour = std::mem::take(&mut fragments[start_idx]);
        let contour_start = contour[0];
        let mut cursor = *contour.last().unwrap();

        let mut guard = fragments.len() + 1;
        while cursor != contour_start {
            guard -= 1;
            if guard == 0 {
                return Err(TesselationError::UnclosedContour(style_index));
            }
            let mut advanced = false;
            for i in 0..fragments.len() {
                if used[i] {
                    continue;
                }
                let frag = &fragments[i];
                if frag.is_empty() {
                    continue;
                }
                if point_key(frag[0]) == point_key(cursor) {
                    used[i] = true;
                    cursor = *frag.last().unwrap();
                    contour.extend(frag.iter().skip(1).copied());
                    advanced = true;
                    break;
                }
                if point_key(*frag.last().unwrap()) == point_key(cursor) {
                    used[i] = true;
                    cursor = frag[0];
                    contour.extend(frag.iter().rev().skip(1).copied());
                    advanced = true;
                    break;
                }
            }
            if !advanced {
                return Err(TesselationError::UnclosedContour(style_index));
            }
        }
        contours.push(contour);
    }
    Ok(contours)
}

/// Maps a reference rectangle of half-extent `half_extent` through the
/// inverse of `matrix` to produce a normalized `[0, 1]` texcoord for `point`
/// (already in pixels, same space as `matrix`'s translation).
fn gradient_texcoord(matrix: &Matrix, point_px: (f32, f32)) -> (f32, f32) {
    let inv = matrix.inverse();
    let (lx, ly) = inv.transform_point(point_px.0, point_px.1);
    let half = GRADIENT_SQUARE_TWIPS / 20.0;
    ((lx + half) / (2.0 * half), (ly + half) / (2.0 * half))
}

fn bitmap_texcoord(matrix: &Matrix, point_px: (f32, f32)) -> (f32, f32) {
    let inv = matrix.inverse();
    inv.transform_point(point_px.0, point_px.1)
}

/// Tesselates a raw `ShapeRecord` into a renderer-ready `ShapeDefinition`.
pub fn tessellate(shape: &ShapeRecord) -> Result<ShapeDefinition, TesselationError> {
    let num_styles = shape.fill_styles.len();
    let mut fragments_by_style: Vec<Vec<Vec<(f32, f32)>>> = vec![Vec::new(); num_styles];

    for path in &shape.paths {
        let polyline = flatten_path(path);
        // `left_fill`/`right_fill` are already folded to 0-based indices by
        // the tag decoder (§9 design notes); `None` means "no style".
        if let Some(right) = path.right_fill.filter(|&r| (r as usize) < num_styles) {
            fragments_by_style[right as usize].push(polyline.clone());
        }
        if let Some(left) = path.left_fill.filter(|&l| (l as usize) < num_styles) {
            let mut reversed = polyline.clone();
            reversed.reverse();
            fragments_by_style[left as usize].push(reversed);
        }
    }

    let mut def = ShapeDefinition { fill_styles: shape.fill_styles.clone(), ..Default::default() };

    for (style_index, fragments) in fragments_by_style.into_iter().enumerate() {
        if fragments.is_empty() {
            continue;
        }
        let contours = merge_contours(fragments, style_index)?;
        let style = &shape.fill_styles[style_index];
        for contour_twips in contours {
            tessellate_contour(style, &contour_twips, style_index, &mut def)?;
        }
    }

    Ok(def)
}

fn tessellate_contour(
    style: &FillStyle,
    contour_twips: &[(f32, f32)],
    style_index: usize,
    def: &mut ShapeDefinition,
) -> Result<(), TesselationError> {
    if contour_twips.len() < 3 {
        return Ok(());
    }
    // Step C: convert to pixels and hand the closed polyline to the polygon
    // tesselator (non-zero winding).
    let contour_px: Vec<(f32, f32)> = contour_twips.iter().map(|p| (p.0 / 20.0, p.1 / 20.0)).collect();

    let mut path_builder = Path::builder();
    path_builder.begin(point(contour_px[0].0, contour_px[0].1));
    for &(x, y) in &contour_px[1..] {
        path_builder.line_to(point(x, y));
    }
    path_builder.end(true);
    let path = path_builder.build();

    let mut buffers: VertexBuffers<(f32, f32), u32> = VertexBuffers::new();
    let mut tessellator = FillTessellator::new();
    tessellator
        .tessellate_path(
            &path,
            &FillOptions::default().with_fill_rule(FillRule::NonZero),
            &mut BuffersBuilder::new(&mut buffers, VertexCtor),
        )
        .map_err(|_| TesselationError::UnclosedContour(style_index))?;

    let base_vertex = def.vertices.len() as u32;
    // Step D: per-vertex texcoord generation.
    for &(x, y) in &buffers.vertices {
        let (u, v) = match style {
            FillStyle::Solid(_) => (0.0, 0.0),
            FillStyle::LinearGradient { matrix, .. } | FillStyle::RadialGradient { matrix, .. } => {
                gradient_texcoord(matrix, (x, y))
            }
            FillStyle::Bitmap { matrix, .. } => bitmap_texcoord(matrix, (x, y)),
        };
        def.vertices.push(ShapeVertex { x, y, u, v });
    }
    def.indices.extend(buffers.indices.iter().map(|&i| base_vertex + i));
    def.contour_vertex_counts.push(buffers.vertices.len() as u32);
    def.contour_index_counts.push(buffers.indices.len() as u32);
    def.contour_style.push(style_index);
    Ok(())
}

#[allow(dead_code)]
fn unused_gradient_hint(_: &Gradient) {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Color, Rectangle, Twips};

    fn rect_shape() -> ShapeRecord {
        // A 100x50 twip rectangle, fill style 0 (the only one) on the right
        // (interior) side.
        let path = PathRecord {
            start: (0.0, 0.0),
            edges: vec![
                Edge::Straight { to: (100.0, 0.0) },
                Edge::Straight { to: (100.0, 50.0) },
                Edge::Straight { to: (0.0, 50.0) },
                Edge::Straight { to: (0.0, 0.0) },
            ],
            left_fill: None,
            right_fill: Some(0),
            line: None,
        };
        ShapeRecord {
            bounds: Rectangle { x_min: Twips::new(0), x_max: Twips::new(100), y_min: Twips::new(0), y_max: Twips::new(50) },
            fill_styles: vec![FillStyle::Solid(Color::BLACK)],
            line_styles: vec![],
            paths: vec![path],
        }
    }

    #[test]
    fn rectangle_area_preserved_within_one_percent() {
        let shape = rect_shape();
        let def = tessellate(&shape).unwrap();
        let mut area = 0.0f64;
        let mut idx = 0;
        for tri in def.indices.chunks(3) {
            let a = def.vertices[tri[0] as usize];
            let b = def.vertices[tri[1] as usize];
            let c = def.vertices[tri[2] as usize];
            area += ((b.x - a.x) as f64 * (c.y - a.y) as f64 - (c.x - a.x) as f64 * (b.y - a.y) as f64).abs() * 0.5;
            idx += 1;
        }
        assert!(idx > 0);
        // 100x50 twips == 5x2.5 px -> area 12.5 px^2.
        assert!((area - 12.5).abs() / 12.5 < 0.01);
    }

    #[test]
    fn solid_fill_uses_constant_texcoord() {
        let def = tessellate(&rect_shape()).unwrap();
        assert!(def.vertices.iter().all(|v| v.u == 0.0 && v.v == 0.0));
    }
}
