use super::Vec2;

/// Axis-aligned rectangle stored as its top-left and bottom-right corners.
///
/// Used for texel clipping of bitmaps, scissor rectangles and UV ranges.
/// The bottom-right corner is exclusive.
#[derive(Debug, Copy, Clone, Default, PartialEq)]
pub struct Rect {
    pub tl: Vec2,
    pub br: Vec2,
}

impl Rect {
    #[inline]
    pub const fn new(x: f32, y: f32, w: f32, h: f32) -> Self {
        Self {
            tl: Vec2::new(x, y),
            br: Vec2::new(x + w, y + h),
        }
    }

    #[inline]
    pub const fn from_corners(tl: Vec2, br: Vec2) -> Self {
        Self { tl, br }
    }

    #[inline]
    pub fn width(self) -> f32 {
        self.br.x - self.tl.x
    }

    #[inline]
    pub fn height(self) -> f32 {
        self.br.y - self.tl.y
    }

    #[inline]
    pub fn size(self) -> Vec2 {
        Vec2::new(self.width(), self.height())
    }

    #[inline]
    pub fn is_finite(self) -> bool {
        self.tl.is_finite() && self.br.is_finite()
    }

    /// Shrinks the rectangle by `amount` on every edge.
    #[inline]
    pub fn inset(self, amount: f32) -> Self {
        Self {
            tl: Vec2::new(self.tl.x + amount, self.tl.y + amount),
            br: Vec2::new(self.br.x - amount, self.br.y - amount),
        }
    }

    /// Scales both corners component-wise, e.g. texels to normalized UVs.
    #[inline]
    pub fn scaled(self, sx: f32, sy: f32) -> Self {
        Self {
            tl: Vec2::new(self.tl.x * sx, self.tl.y * sy),
            br: Vec2::new(self.br.x * sx, self.br.y * sy),
        }
    }
}
