/// Device capabilities, queried once when the renderer is created.
///
/// The renderer never re-queries these mid-frame; a change in capabilities
/// implies a new device context and therefore a new renderer.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct Capabilities {
    /// Programmable shaders can be compiled and activated.
    pub has_shader_support: bool,
    /// Geometry can be uploaded to device-side buffers instead of client memory.
    pub has_device_buffer_support: bool,
    /// Off-screen framebuffer objects are available.
    pub has_framebuffer_support: bool,
    /// Textures may have non-power-of-two dimensions.
    pub has_npot_support: bool,
    /// Number of hardware texture units.
    pub max_texture_units: u32,
    /// Number of simultaneous color attachments.
    pub max_draw_targets: u32,
}

impl Default for Capabilities {
    fn default() -> Self {
        Self {
            has_shader_support: true,
            has_device_buffer_support: true,
            has_framebuffer_support: true,
            has_npot_support: true,
            max_texture_units: 8,
            max_draw_targets: 4,
        }
    }
}

impl Capabilities {
    /// Lowest common denominator: fixed-function, client-side arrays, screen only.
    pub fn minimal() -> Self {
        Self {
            has_shader_support: false,
            has_device_buffer_support: false,
            has_framebuffer_support: false,
            has_npot_support: false,
            max_texture_units: 1,
            max_draw_targets: 1,
        }
    }
}
