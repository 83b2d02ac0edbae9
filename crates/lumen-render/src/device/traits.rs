use crate::paint::{BlendMode, Rgba};
use crate::render::{RenderError, Topology, Vertex};

use super::Capabilities;

/// Device texture handle.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct TextureId(pub u32);

/// Linked shader program handle.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct ProgramId(pub u32);

/// Framebuffer object handle. The window surface has no handle (`None`).
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct FramebufferId(pub u32);

/// Uniform location inside a program.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct ParamLocation(pub i32);

/// Where geometry lives when a draw is submitted.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum BufferMode {
    /// Vertices are read from client memory at draw time.
    Client,
    /// Vertices are uploaded into device buffers first.
    Device,
}

/// Integer viewport / scissor rectangle in target pixels.
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq, Hash)]
pub struct ViewportRect {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl ViewportRect {
    #[inline]
    pub const fn new(x: i32, y: i32, width: u32, height: u32) -> Self {
        Self { x, y, width, height }
    }
}

/// Orthographic projection volume.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Ortho {
    pub left: f32,
    pub right: f32,
    pub bottom: f32,
    pub top: f32,
    pub near: f32,
    pub far: f32,
}

impl Ortho {
    /// Top-left origin, +Y down, covering `width` x `height` pixels.
    pub fn for_target(width: u32, height: u32) -> Self {
        Self {
            left: 0.0,
            right: width as f32,
            bottom: height as f32,
            top: 0.0,
            near: -1.0,
            far: 1.0,
        }
    }

    /// Column-major 4x4 matrix mapping the volume to clip space with depth in `[0, 1]`.
    pub fn to_matrix(&self) -> [[f32; 4]; 4] {
        let rl = self.right - self.left;
        let tb = self.top - self.bottom;
        let fn_ = self.far - self.near;
        [
            [2.0 / rl, 0.0, 0.0, 0.0],
            [0.0, 2.0 / tb, 0.0, 0.0],
            [0.0, 0.0, 1.0 / fn_, 0.0],
            [
                -(self.right + self.left) / rl,
                -(self.top + self.bottom) / tb,
                -self.near / fn_,
                1.0,
            ],
        ]
    }
}

/// Uniform payload.
#[derive(Debug, Copy, Clone, PartialEq)]
pub enum UniformValue {
    Float(f32),
    Vec3([f32; 3]),
    /// Texture unit index for a sampler uniform.
    Unit(u32),
}

/// Program source handed to the device compiler.
#[derive(Debug, Copy, Clone)]
pub struct ShaderSource<'a> {
    /// Language version hint, prepended by backends that understand it.
    pub version: Option<&'a str>,
    pub code: &'a str,
}

/// One indexed draw over the most recently uploaded geometry.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct DrawCall {
    pub topology: Topology,
    pub index_count: u32,
    /// Unit holding the source texture, `None` for untextured geometry.
    pub source_unit: Option<u32>,
}

/// Result of a framebuffer completeness check.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum FramebufferStatus {
    Complete,
    Incomplete,
}

/// The verb set the batch engine needs from a graphics device.
///
/// Every method must be called from the thread owning the device context.
/// Implementations issue commands and return; only readback waits for the GPU.
pub trait GraphicsDevice {
    /// Capability flags; queried once by the renderer.
    fn capabilities(&self) -> Capabilities;

    // ── textures ──────────────────────────────────────────────────────────

    fn create_texture(&mut self, width: u32, height: u32) -> Result<TextureId, RenderError>;
    fn delete_texture(&mut self, texture: TextureId);
    /// Uploads tightly packed RGBA8 pixels covering `width` x `height` from the origin.
    fn upload_texture(&mut self, texture: TextureId, width: u32, height: u32, rgba: &[u8]);
    /// Reads back `width` x `height` pixels from the origin as tightly packed
    /// RGBA8, top row first. Waits for prior submissions to complete.
    fn read_texture(
        &mut self,
        texture: TextureId,
        width: u32,
        height: u32,
    ) -> Result<Vec<u8>, RenderError>;
    fn set_texture_filter(&mut self, texture: TextureId, smooth: bool);
    fn bind_texture(&mut self, unit: u32, texture: Option<TextureId>);

    // ── geometry ──────────────────────────────────────────────────────────

    fn set_buffer_mode(&mut self, mode: BufferMode);
    fn upload_geometry(&mut self, vertices: &[Vertex], indices: &[u16]);
    fn draw_indexed(&mut self, call: &DrawCall);

    // ── programs ──────────────────────────────────────────────────────────

    /// Compiles and links; the error string is the device's log.
    fn create_program(&mut self, source: &ShaderSource<'_>) -> Result<ProgramId, String>;
    fn delete_program(&mut self, program: ProgramId);
    /// `None` selects the built-in default program.
    fn use_program(&mut self, program: Option<ProgramId>);
    fn uniform_location(&mut self, program: ProgramId, name: &str) -> Option<ParamLocation>;
    /// Sets a uniform of the program currently in use.
    fn set_uniform(&mut self, location: ParamLocation, value: UniformValue);

    // ── framebuffers ──────────────────────────────────────────────────────

    fn create_framebuffer(&mut self) -> Result<FramebufferId, RenderError>;
    fn delete_framebuffer(&mut self, framebuffer: FramebufferId);
    /// `None` binds the window surface.
    fn bind_framebuffer(&mut self, framebuffer: Option<FramebufferId>);
    fn attach_color(&mut self, framebuffer: FramebufferId, slot: u32, texture: Option<TextureId>);
    fn framebuffer_status(&mut self, framebuffer: FramebufferId) -> FramebufferStatus;

    // ── fixed state ───────────────────────────────────────────────────────

    fn set_viewport(&mut self, viewport: ViewportRect);
    fn set_projection(&mut self, ortho: Ortho);
    fn set_blend(&mut self, mode: BlendMode);
    fn set_scissor(&mut self, clip: Option<ViewportRect>);
    fn set_clear_color(&mut self, color: Rgba);
    /// Clears every bound color target with the current clear color.
    fn clear(&mut self);
    fn present(&mut self);
}
