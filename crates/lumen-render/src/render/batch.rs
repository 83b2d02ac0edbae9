use crate::coords::{Affine2, Rect, Vec2};
use crate::paint::Rgba;

use super::{Topology, Vertex};

/// Indices of the two triangles of a quad whose corners are stored as
/// top-left, top-right, bottom-left, bottom-right.
const QUAD_INDICES: [u16; 6] = [0, 1, 2, 2, 1, 3];

/// Vertices kept free beyond the largest single quad push.
///
/// A push is accepted only while strictly more slots remain than it needs,
/// so the backing store carries one extra quad of headroom to let
/// `quad_capacity` quads fit between flushes.
const HEADROOM: usize = 4;

/// Fixed-capacity accumulation buffer for batched geometry.
///
/// Lifecycle:
/// - empty on construction and after every [`clear`](Self::clear)
/// - grows only through pushes; never shrinks mid-accumulation
/// - storage is allocated once; pushes never reallocate
#[derive(Debug)]
pub struct VertexBatch {
    vertices: Vec<Vertex>,
    indices: Vec<u16>,
    vertex_capacity: usize,
    topology: Topology,
}

impl VertexBatch {
    /// Creates a batch holding up to `quad_capacity` quads between flushes.
    ///
    /// # Panics
    /// Panics if the capacity is zero or would overflow 16-bit indices.
    pub fn with_quad_capacity(quad_capacity: usize) -> Self {
        assert!(quad_capacity > 0, "batch capacity must be non-zero");
        let vertex_capacity = quad_capacity * 4 + HEADROOM;
        assert!(
            vertex_capacity <= u16::MAX as usize + 1,
            "batch capacity {quad_capacity} overflows 16-bit indices"
        );

        Self {
            vertices: Vec::with_capacity(vertex_capacity),
            indices: Vec::with_capacity(quad_capacity * 6 + HEADROOM * 2),
            vertex_capacity,
            topology: Topology::TriangleList,
        }
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    #[inline]
    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    #[inline]
    pub fn index_count(&self) -> usize {
        self.indices.len()
    }

    #[inline]
    pub fn topology(&self) -> Topology {
        self.topology
    }

    #[inline]
    pub fn vertices(&self) -> &[Vertex] {
        &self.vertices
    }

    #[inline]
    pub fn indices(&self) -> &[u16] {
        &self.indices
    }

    #[inline]
    pub fn free_vertices(&self) -> usize {
        self.vertex_capacity - self.vertices.len()
    }

    /// Largest vertex count a single push can ever be accepted with.
    #[inline]
    pub fn max_push(&self) -> usize {
        self.vertex_capacity - 1
    }

    /// True when `vertex_count` more vertices can be appended without a flush.
    #[inline]
    pub fn fits(&self, vertex_count: usize) -> bool {
        self.free_vertices() > vertex_count
    }

    /// True when geometry of `topology` can be appended to the current contents.
    #[inline]
    pub fn accepts(&self, topology: Topology) -> bool {
        self.is_empty() || (self.topology == topology && !topology.is_strip())
    }

    /// Appends a quad of `size` placed by `affine`, sampling `uv`.
    ///
    /// Callers must have checked [`fits`](Self::fits)`(4)` and
    /// [`accepts`](Self::accepts)`(TriangleList)`.
    pub fn push_quad(&mut self, affine: &Affine2, size: Vec2, uv: Rect, color: Rgba) {
        debug_assert!(self.fits(4), "push_quad without room; flush first");
        debug_assert!(self.accepts(Topology::TriangleList));

        self.topology = Topology::TriangleList;
        let base = self.vertices.len() as u16;

        let corners = [
            (Vec2::new(0.0, 0.0), Vec2::new(uv.tl.x, uv.tl.y)),
            (Vec2::new(size.x, 0.0), Vec2::new(uv.br.x, uv.tl.y)),
            (Vec2::new(0.0, size.y), Vec2::new(uv.tl.x, uv.br.y)),
            (Vec2::new(size.x, size.y), Vec2::new(uv.br.x, uv.br.y)),
        ];
        for (local, tex) in corners {
            self.vertices.push(Vertex::new(affine.apply(local), tex, color));
        }
        self.indices.extend(QUAD_INDICES.iter().map(|i| base + i));
    }

    /// Appends arbitrary geometry; `indices` are relative to `vertices`.
    ///
    /// Callers must have checked [`fits`](Self::fits) and [`accepts`](Self::accepts).
    pub fn push_indexed(&mut self, vertices: &[Vertex], indices: &[u16], topology: Topology) {
        debug_assert!(self.fits(vertices.len()), "push_indexed without room; flush first");
        debug_assert!(self.accepts(topology));
        debug_assert!(indices.iter().all(|&i| (i as usize) < vertices.len()));

        self.topology = topology;
        let base = self.vertices.len() as u16;
        self.vertices.extend_from_slice(vertices);
        self.indices.extend(indices.iter().map(|i| base + i));
    }

    /// Resets fill and index counts; keeps the allocation.
    #[inline]
    pub fn clear(&mut self) {
        self.vertices.clear();
        self.indices.clear();
    }

    /// Moves the accumulated geometry out for submission, leaving the batch empty.
    ///
    /// Hand the storage back with [`recycle`](Self::recycle) to keep the allocation.
    pub fn take(&mut self) -> (Vec<Vertex>, Vec<u16>) {
        (std::mem::take(&mut self.vertices), std::mem::take(&mut self.indices))
    }

    /// Reinstalls storage obtained from [`take`](Self::take), cleared.
    pub fn recycle(&mut self, mut vertices: Vec<Vertex>, mut indices: Vec<u16>) {
        debug_assert!(self.is_empty(), "recycling into a non-empty batch");
        vertices.clear();
        indices.clear();
        self.vertices = vertices;
        self.indices = indices;
    }
}
