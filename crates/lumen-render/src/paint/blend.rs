/// Blend equation used when compositing batched geometry into the bound targets.
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq, Hash)]
pub enum BlendMode {
    /// `src * src.a + dst * (1 - src.a)`
    #[default]
    Alpha,
    /// `dst * src`
    Multiply,
    /// `src * src.a + dst`
    Add,
    /// Blending disabled; source overwrites destination.
    None,
}

impl BlendMode {
    /// Blend used by untextured primitives: alpha only when the color is translucent.
    #[inline]
    pub fn for_primitive(color: crate::paint::Rgba) -> Self {
        if color.is_opaque() { BlendMode::None } else { BlendMode::Alpha }
    }
}

/// Texture sampling request for a draw.
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq, Hash)]
pub enum Smoothing {
    /// Use the renderer's configured default.
    #[default]
    Default,
    /// Linear filtering.
    On,
    /// Nearest filtering.
    Off,
}

impl Smoothing {
    /// Resolves to `true` for linear filtering.
    #[inline]
    pub fn resolve(self, default_smoothing: bool) -> bool {
        match self {
            Smoothing::On => true,
            Smoothing::Off => false,
            Smoothing::Default => default_smoothing,
        }
    }
}
