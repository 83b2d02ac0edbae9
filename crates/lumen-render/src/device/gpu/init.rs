/// Bootstrap parameters for the wgpu context.
#[derive(Debug, Clone)]
pub struct GpuInit {
    /// Prefer an sRGB surface format when available.
    ///
    /// Bitmap and vertex colors are stored already encoded, so the default
    /// writes them to a linear (non-sRGB) surface unchanged.
    pub prefer_srgb: bool,

    /// Present mode (swap behavior). `Fifo` waits for vertical sync.
    pub present_mode: wgpu::PresentMode,

    /// Optional alpha mode preference for the surface.
    ///
    /// If provided but unsupported on the current surface, a supported mode is selected.
    pub alpha_mode: Option<wgpu::CompositeAlphaMode>,

    pub required_features: wgpu::Features,
    pub required_limits: wgpu::Limits,

    /// Desired maximum frame latency for the surface; a hint.
    pub desired_maximum_frame_latency: u32,
}

impl Default for GpuInit {
    fn default() -> Self {
        Self {
            prefer_srgb: false,
            present_mode: wgpu::PresentMode::Fifo,
            alpha_mode: None,
            required_features: wgpu::Features::empty(),
            required_limits: wgpu::Limits::default(),
            desired_maximum_frame_latency: 2,
        }
    }
}

impl GpuInit {
    /// Defaults with the present mode following the vsync flag.
    pub fn with_vsync(vsync: bool) -> Self {
        Self {
            present_mode: if vsync {
                wgpu::PresentMode::AutoVsync
            } else {
                wgpu::PresentMode::AutoNoVsync
            },
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vsync_flag_selects_present_mode() {
        assert_eq!(GpuInit::with_vsync(true).present_mode, wgpu::PresentMode::AutoVsync);
        assert_eq!(GpuInit::with_vsync(false).present_mode, wgpu::PresentMode::AutoNoVsync);
    }
}
