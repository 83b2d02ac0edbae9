use super::Vec2;

/// Placement of a quad: where its pivot lands, how it is scaled and rotated.
///
/// `pivot` is expressed in the quad's local (unscaled) space; the pivot point
/// is mapped exactly onto `position`.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Transform2D {
    pub position: Vec2,
    pub scale: Vec2,
    /// Radians, clockwise on screen (+Y down).
    pub rotation: f32,
    pub pivot: Vec2,
}

impl Default for Transform2D {
    fn default() -> Self {
        Self {
            position: Vec2::zero(),
            scale: Vec2::splat(1.0),
            rotation: 0.0,
            pivot: Vec2::zero(),
        }
    }
}

impl Transform2D {
    #[inline]
    pub fn at(position: Vec2) -> Self {
        Self { position, ..Self::default() }
    }

    #[inline]
    pub fn with_scale(mut self, scale: Vec2) -> Self {
        self.scale = scale;
        self
    }

    #[inline]
    pub fn with_rotation(mut self, rotation: f32) -> Self {
        self.rotation = rotation;
        self
    }

    #[inline]
    pub fn with_pivot(mut self, pivot: Vec2) -> Self {
        self.pivot = pivot;
        self
    }

    /// Builds the 2x3 affine matrix for this placement.
    pub fn to_affine(&self) -> Affine2 {
        let (sin, cos) = if self.rotation != 0.0 {
            self.rotation.sin_cos()
        } else {
            (0.0, 1.0)
        };

        let scos_x = self.scale.x * cos;
        let scos_y = self.scale.y * cos;
        let ssin_x = self.scale.x * sin;
        let ssin_y = self.scale.y * sin;

        let tx = self.position.x - self.pivot.x * scos_x + self.pivot.y * ssin_y;
        let ty = self.position.y - self.pivot.x * ssin_x - self.pivot.y * scos_y;

        Affine2 {
            x: [scos_x, -ssin_y, tx],
            y: [ssin_x, scos_y, ty],
        }
    }
}

/// Row-major 2x3 affine matrix.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Affine2 {
    pub x: [f32; 3],
    pub y: [f32; 3],
}

impl Affine2 {
    pub const IDENTITY: Affine2 = Affine2 {
        x: [1.0, 0.0, 0.0],
        y: [0.0, 1.0, 0.0],
    };

    #[inline]
    pub fn apply(&self, p: Vec2) -> Vec2 {
        Vec2::new(
            self.x[0] * p.x + self.x[1] * p.y + self.x[2],
            self.y[0] * p.x + self.y[1] * p.y + self.y[2],
        )
    }
}
