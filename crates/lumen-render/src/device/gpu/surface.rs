use winit::dpi::PhysicalSize;

/// Window surface texture acquired for the current frame.
///
/// Held until [`present`](Self::present); draws to the window between two
/// presents all target this texture. Holding it prevents acquiring the next one.
pub struct SurfaceFrame {
    pub texture: wgpu::SurfaceTexture,
    pub view: wgpu::TextureView,
}

impl SurfaceFrame {
    #[inline]
    pub fn size(&self) -> (u32, u32) {
        let t = &self.texture.texture;
        (t.width(), t.height())
    }

    pub fn present(self) {
        drop(self.view);
        self.texture.present();
    }
}

/// Why no window frame could be acquired.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum FrameUnavailable {
    /// The surface was lost or outdated and has been reconfigured; retry next draw.
    Reconfigured,
    /// Timed out or otherwise transiently unavailable.
    Skipped,
    /// Out of memory; the window cannot be drawn to again.
    Fatal,
}

/// Non-sRGB formats first unless sRGB is requested; vertex and bitmap colors
/// are stored already encoded.
pub(crate) fn choose_surface_format(
    formats: &[wgpu::TextureFormat],
    prefer_srgb: bool,
) -> Option<wgpu::TextureFormat> {
    let preferred = if prefer_srgb {
        [wgpu::TextureFormat::Bgra8UnormSrgb, wgpu::TextureFormat::Rgba8UnormSrgb]
    } else {
        [wgpu::TextureFormat::Bgra8Unorm, wgpu::TextureFormat::Rgba8Unorm]
    };

    preferred
        .into_iter()
        .find(|f| formats.contains(f))
        .or_else(|| formats.first().copied())
}

pub(crate) fn choose_alpha_mode(
    modes: &[wgpu::CompositeAlphaMode],
    requested: Option<wgpu::CompositeAlphaMode>,
) -> wgpu::CompositeAlphaMode {
    requested
        .filter(|m| modes.contains(m))
        .or_else(|| modes.first().copied())
        .unwrap_or(wgpu::CompositeAlphaMode::Auto)
}

/// Size a surface can be configured with; wgpu rejects zero-area surfaces.
#[inline]
pub(crate) fn drawable(size: PhysicalSize<u32>) -> bool {
    size.width > 0 && size.height > 0
}

/// Recovery for a failed `get_current_texture`, reconfiguring where that helps.
pub(crate) fn recover(
    surface: &wgpu::Surface,
    device: &wgpu::Device,
    config: &wgpu::SurfaceConfiguration,
    err: wgpu::SurfaceError,
) -> FrameUnavailable {
    match err {
        wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated => {
            if config.width > 0 && config.height > 0 {
                surface.configure(device, config);
            }
            FrameUnavailable::Reconfigured
        }
        wgpu::SurfaceError::OutOfMemory => FrameUnavailable::Fatal,
        wgpu::SurfaceError::Timeout | wgpu::SurfaceError::Other => FrameUnavailable::Skipped,
    }
}
