use super::Vec2;

/// Oriented box: a parallelogram spanned by `x` and `y` from `position - pivot`.
#[derive(Debug, Copy, Clone, Default, PartialEq)]
pub struct OBox {
    pub position: Vec2,
    pub pivot: Vec2,
    pub x: Vec2,
    pub y: Vec2,
}

impl OBox {
    /// Axis-aligned box of the given size with its pivot at the top-left corner.
    #[inline]
    pub fn axis_aligned(position: Vec2, size: Vec2) -> Self {
        Self {
            position,
            pivot: Vec2::zero(),
            x: Vec2::new(size.x, 0.0),
            y: Vec2::new(0.0, size.y),
        }
    }

    /// Corners in winding order: origin, +x, +x+y, +y.
    pub fn corners(&self) -> [Vec2; 4] {
        let origin = self.position - self.pivot;
        [origin, origin + self.x, origin + self.x + self.y, origin + self.y]
    }
}
