use bytemuck::{Pod, Zeroable};

/// Straight-alpha RGBA color packed into four bytes.
///
/// This is the per-vertex color format uploaded to the device, so it is
/// `Pod` and laid out exactly as `[r, g, b, a]`.
#[repr(C)]
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash, Pod, Zeroable)]
pub struct Rgba {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Rgba {
    pub const WHITE: Rgba = Rgba::new(0xFF, 0xFF, 0xFF, 0xFF);
    pub const BLACK: Rgba = Rgba::new(0x00, 0x00, 0x00, 0xFF);
    pub const TRANSPARENT: Rgba = Rgba::new(0x00, 0x00, 0x00, 0x00);

    #[inline]
    pub const fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    /// Builds a color from `f32` channels in `[0, 1]`; out-of-range values are clamped.
    #[inline]
    pub fn from_f32(r: f32, g: f32, b: f32, a: f32) -> Self {
        #[inline]
        fn quantize(v: f32) -> u8 {
            (v.clamp(0.0, 1.0) * 255.0).round() as u8
        }
        Self::new(quantize(r), quantize(g), quantize(b), quantize(a))
    }

    /// Returns the channels as `f32` in `[0, 1]`.
    #[inline]
    pub fn to_f32(self) -> [f32; 4] {
        [
            self.r as f32 / 255.0,
            self.g as f32 / 255.0,
            self.b as f32 / 255.0,
            self.a as f32 / 255.0,
        ]
    }

    #[inline]
    pub fn is_opaque(self) -> bool {
        self.a == 0xFF
    }

    /// Channel-wise product, as a tint applied on top of another color.
    #[inline]
    pub fn modulate(self, other: Rgba) -> Self {
        #[inline]
        fn mul(a: u8, b: u8) -> u8 {
            ((a as u16 * b as u16 + 127) / 255) as u8
        }
        Self::new(
            mul(self.r, other.r),
            mul(self.g, other.g),
            mul(self.b, other.b),
            mul(self.a, other.a),
        )
    }
}
