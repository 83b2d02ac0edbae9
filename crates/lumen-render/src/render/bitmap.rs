use crate::coords::Rect;
use crate::device::TextureId;
use crate::paint::Rgba;

/// Texels trimmed from every edge of a source rectangle when computing UVs,
/// so linear filtering never samples a neighboring sub-image.
pub const BORDER_FIX: f32 = 0.1;

/// Handle to a bitmap owned by the renderer.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct BitmapId(pub u32);

/// A device texture plus the sub-rectangle drawn from it.
///
/// `real_width`/`real_height` are the allocated texture size, which exceeds
/// the logical size when the device needs power-of-two textures.
#[derive(Debug, Clone)]
pub struct Bitmap {
    pub texture: TextureId,
    pub width: u32,
    pub height: u32,
    pub real_width: u32,
    pub real_height: u32,
    /// Source rectangle in texels.
    pub clip: Rect,
    /// Tint multiplied into every quad drawn from the bitmap.
    pub color: Rgba,
    /// Filter last applied to the texture; `None` until first draw.
    pub(crate) filter: Option<bool>,
}

impl Bitmap {
    /// Texture size backing a `width` x `height` bitmap.
    pub fn allocation_size(width: u32, height: u32, npot: bool) -> (u32, u32) {
        if npot {
            (width, height)
        } else {
            (width.next_power_of_two(), height.next_power_of_two())
        }
    }

    pub(crate) fn new(texture: TextureId, width: u32, height: u32, npot: bool) -> Self {
        let (real_width, real_height) = Self::allocation_size(width, height, npot);

        Self {
            texture,
            width,
            height,
            real_width,
            real_height,
            clip: Rect::new(0.0, 0.0, width as f32, height as f32),
            color: Rgba::WHITE,
            filter: None,
        }
    }

    /// Normalized texture coordinates of the clip, inset by [`BORDER_FIX`].
    pub fn uv_rect(&self) -> Rect {
        self.clip
            .inset(BORDER_FIX)
            .scaled(1.0 / self.real_width as f32, 1.0 / self.real_height as f32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn npot_sizes_round_up_without_support() {
        let b = Bitmap::new(TextureId(1), 100, 33, false);
        assert_eq!((b.real_width, b.real_height), (128, 64));
        assert_eq!(b.clip, Rect::new(0.0, 0.0, 100.0, 33.0));

        let b = Bitmap::new(TextureId(1), 100, 33, true);
        assert_eq!((b.real_width, b.real_height), (100, 33));
    }

    #[test]
    fn uv_rect_is_inset_and_normalized() {
        let mut b = Bitmap::new(TextureId(1), 64, 64, true);
        b.clip = Rect::new(16.0, 0.0, 16.0, 32.0);

        let uv = b.uv_rect();
        let eps = 1e-6;
        assert!((uv.tl.x - 16.1 / 64.0).abs() < eps);
        assert!((uv.tl.y - 0.1 / 64.0).abs() < eps);
        assert!((uv.br.x - 31.9 / 64.0).abs() < eps);
        assert!((uv.br.y - 31.9 / 64.0).abs() < eps);
    }
}
