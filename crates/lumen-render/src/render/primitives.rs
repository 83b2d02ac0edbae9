use std::f32::consts::TAU;

use crate::coords::{OBox, Vec2};
use crate::device::GraphicsDevice;
use crate::paint::{BlendMode, Rgba, Smoothing};

use super::{BitmapId, RenderError, Renderer, Topology, Vertex};

/// Segments approximating a circle outline.
pub const CIRCLE_SEGMENTS: usize = 32;

/// Triangle-fan indices over a convex outline, as a triangle list.
fn fan_indices(count: usize) -> Vec<u16> {
    (1..count.saturating_sub(1))
        .flat_map(|i| [0, i as u16, i as u16 + 1])
        .collect()
}

/// Line-list indices over consecutive points, optionally closing the loop.
fn segment_indices(count: usize, closed: bool) -> Vec<u16> {
    let segments = if closed { count } else { count.saturating_sub(1) };
    (0..segments)
        .flat_map(|i| [i as u16, ((i + 1) % count) as u16])
        .collect()
}

impl<D: GraphicsDevice> Renderer<D> {
    pub fn draw_line(&mut self, from: Vec2, to: Vec2, color: Rgba) -> Result<(), RenderError> {
        self.push_primitive(&[from, to], &[0, 1], Topology::LineList, color)
    }

    /// Open chain of segments through `points`.
    pub fn draw_polyline(&mut self, points: &[Vec2], color: Rgba) -> Result<(), RenderError> {
        if points.len() < 2 {
            return Ok(());
        }
        let indices = segment_indices(points.len(), false);
        self.push_primitive(points, &indices, Topology::LineList, color)
    }

    /// Closed outline, or a filled convex polygon.
    pub fn draw_polygon(
        &mut self,
        points: &[Vec2],
        color: Rgba,
        fill: bool,
    ) -> Result<(), RenderError> {
        if fill {
            if points.len() < 3 {
                return Ok(());
            }
            let indices = fan_indices(points.len());
            self.push_primitive(points, &indices, Topology::TriangleList, color)
        } else {
            if points.len() < 2 {
                return Ok(());
            }
            let indices = segment_indices(points.len(), true);
            self.push_primitive(points, &indices, Topology::LineList, color)
        }
    }

    pub fn draw_circle(
        &mut self,
        center: Vec2,
        radius: f32,
        color: Rgba,
        fill: bool,
    ) -> Result<(), RenderError> {
        let points: Vec<Vec2> = (0..CIRCLE_SEGMENTS)
            .map(|i| center.on_circle(radius, TAU * i as f32 / CIRCLE_SEGMENTS as f32))
            .collect();
        self.draw_polygon(&points, color, fill)
    }

    pub fn draw_obox(&mut self, obox: &OBox, color: Rgba, fill: bool) -> Result<(), RenderError> {
        self.draw_polygon(&obox.corners(), color, fill)
    }

    /// Draws caller-built geometry as its own submission.
    ///
    /// Queued geometry is flushed first; the mesh never joins the batch.
    /// With a bitmap, vertex UVs in `0..=1` are mapped onto its clip.
    pub fn draw_mesh(
        &mut self,
        bitmap: Option<BitmapId>,
        vertices: &[Vertex],
        indices: &[u16],
        topology: Topology,
        smoothing: Smoothing,
        blend: BlendMode,
    ) -> Result<(), RenderError> {
        if indices.is_empty() {
            return Ok(());
        }
        debug_assert!(
            indices.iter().all(|&i| (i as usize) < vertices.len()),
            "mesh index out of range"
        );

        let mut result = self.set_blend_mode(blend);
        let source = match bitmap {
            Some(id) => {
                result = result.and(self.apply_smoothing(id, smoothing));
                let b = self.bitmap_entry(id);
                Some((b.texture, b.uv_rect()))
            }
            None => None,
        };
        result = result.and(self.flush());

        let submitted = match source {
            Some((texture, uv)) => {
                let span = uv.size();
                let mapped: Vec<Vertex> = vertices
                    .iter()
                    .map(|v| Vertex {
                        uv: [uv.tl.x + v.uv[0] * span.x, uv.tl.y + v.uv[1] * span.y],
                        ..*v
                    })
                    .collect();
                self.submit(&mapped, indices, topology, Some(texture))
            }
            None => self.submit(vertices, indices, topology, None),
        };
        result.and(submitted)
    }

    fn push_primitive(
        &mut self,
        points: &[Vec2],
        indices: &[u16],
        topology: Topology,
        color: Rgba,
    ) -> Result<(), RenderError> {
        self.check_room(points.len())?;
        let blended = self.set_blend_mode(BlendMode::for_primitive(color));
        let reserved = self.reserve(None, points.len(), topology);

        let vertices: Vec<Vertex> = points.iter().map(|p| Vertex::colored(*p, color)).collect();
        self.batch_mut().push_indexed(&vertices, indices, topology);
        blended.and(reserved)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fan_covers_convex_polygon() {
        assert_eq!(fan_indices(4), vec![0, 1, 2, 0, 2, 3]);
        assert!(fan_indices(2).is_empty());
    }

    #[test]
    fn segments_close_only_when_asked() {
        assert_eq!(segment_indices(3, false), vec![0, 1, 1, 2]);
        assert_eq!(segment_indices(3, true), vec![0, 1, 1, 2, 2, 0]);
    }
}
