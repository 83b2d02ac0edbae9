use bytemuck::{Pod, Zeroable};

use crate::coords::Vec2;
use crate::paint::Rgba;

/// Batched vertex: position in target pixels, normalized texture coordinate,
/// straight-alpha color.
#[repr(C)]
#[derive(Debug, Copy, Clone, Default, PartialEq, Pod, Zeroable)]
pub struct Vertex {
    pub pos: [f32; 2],
    pub uv: [f32; 2],
    pub color: Rgba,
}

impl Vertex {
    #[inline]
    pub fn new(pos: Vec2, uv: Vec2, color: Rgba) -> Self {
        Self {
            pos: [pos.x, pos.y],
            uv: [uv.x, uv.y],
            color,
        }
    }

    /// Untextured vertex (UV at the origin).
    #[inline]
    pub fn colored(pos: Vec2, color: Rgba) -> Self {
        Self::new(pos, Vec2::zero(), color)
    }
}

/// How submitted indices are assembled into primitives.
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq, Hash)]
pub enum Topology {
    PointList,
    LineList,
    LineStrip,
    #[default]
    TriangleList,
    TriangleStrip,
}

impl Topology {
    /// Strip topologies cannot be concatenated without restart indices,
    /// so geometry using them is never merged into an ongoing batch.
    #[inline]
    pub fn is_strip(self) -> bool {
        matches!(self, Topology::LineStrip | Topology::TriangleStrip)
    }
}
