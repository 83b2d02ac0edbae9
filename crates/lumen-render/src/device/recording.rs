use std::collections::HashMap;

use crate::paint::{BlendMode, Rgba};
use crate::render::{RenderError, Vertex};

use super::{
    BufferMode, Capabilities, DrawCall, FramebufferId, FramebufferStatus, GraphicsDevice, Ortho,
    ParamLocation, ProgramId, ShaderSource, TextureId, UniformValue, ViewportRect,
};

/// One verb issued to a [`RecordingDevice`].
#[derive(Debug, Clone, PartialEq)]
pub enum DeviceCall {
    CreateTexture { texture: TextureId, width: u32, height: u32 },
    DeleteTexture(TextureId),
    UploadTexture { texture: TextureId, width: u32, height: u32 },
    ReadTexture { texture: TextureId, width: u32, height: u32 },
    SetTextureFilter { texture: TextureId, smooth: bool },
    BindTexture { unit: u32, texture: Option<TextureId> },
    SetBufferMode(BufferMode),
    UploadGeometry { vertices: Vec<Vertex>, indices: Vec<u16> },
    DrawIndexed(DrawCall),
    CreateProgram(ProgramId),
    DeleteProgram(ProgramId),
    UseProgram(Option<ProgramId>),
    SetUniform { location: ParamLocation, value: UniformValue },
    CreateFramebuffer(FramebufferId),
    DeleteFramebuffer(FramebufferId),
    BindFramebuffer(Option<FramebufferId>),
    AttachColor { framebuffer: FramebufferId, slot: u32, texture: Option<TextureId> },
    FramebufferStatus(FramebufferId),
    SetViewport(ViewportRect),
    SetProjection(Ortho),
    SetBlend(BlendMode),
    SetScissor(Option<ViewportRect>),
    SetClearColor(Rgba),
    Clear,
    Present,
}

impl DeviceCall {
    /// True for verbs that touch framebuffer objects.
    pub fn is_framebuffer_call(&self) -> bool {
        matches!(
            self,
            DeviceCall::CreateFramebuffer(_)
                | DeviceCall::DeleteFramebuffer(_)
                | DeviceCall::BindFramebuffer(_)
                | DeviceCall::AttachColor { .. }
                | DeviceCall::FramebufferStatus(_)
        )
    }
}

/// CPU copy of a texture's contents.
#[derive(Debug)]
struct TexturePixels {
    width: u32,
    rgba: Vec<u8>,
}

/// Headless device that records every call instead of touching a GPU.
///
/// Used by tests and by tools that want to inspect the exact command stream
/// the renderer produces. Failure injection covers the environmental
/// conditions a real driver can report.
///
/// Texture contents are kept on the CPU: uploads and clears of attached
/// textures are applied so readback returns what a device would. Draws do
/// not rasterize.
#[derive(Debug)]
pub struct RecordingDevice {
    caps: Capabilities,
    calls: Vec<DeviceCall>,
    pixels: HashMap<TextureId, TexturePixels>,
    attachments: HashMap<FramebufferId, Vec<Option<TextureId>>>,
    bound_framebuffer: Option<FramebufferId>,
    clear_color: Rgba,
    next_handle: u32,
    next_location: i32,
    locations: HashMap<(ProgramId, String), ParamLocation>,
    fail_next_compile: Option<String>,
    incomplete_framebuffers: bool,
    texture_budget: Option<usize>,
    live_textures: usize,
}

impl Default for RecordingDevice {
    fn default() -> Self {
        Self::new(Capabilities::default())
    }
}

impl RecordingDevice {
    pub fn new(caps: Capabilities) -> Self {
        Self {
            caps,
            calls: Vec::new(),
            pixels: HashMap::new(),
            attachments: HashMap::new(),
            bound_framebuffer: None,
            clear_color: Rgba::BLACK,
            next_handle: 1,
            next_location: 0,
            locations: HashMap::new(),
            fail_next_compile: None,
            incomplete_framebuffers: false,
            texture_budget: None,
            live_textures: 0,
        }
    }

    /// All calls recorded since creation or the last [`clear_calls`](Self::clear_calls).
    pub fn calls(&self) -> &[DeviceCall] {
        &self.calls
    }

    pub fn clear_calls(&mut self) {
        self.calls.clear();
    }

    /// Draw submissions, in order.
    pub fn draws(&self) -> impl Iterator<Item = &DrawCall> {
        self.calls.iter().filter_map(|c| match c {
            DeviceCall::DrawIndexed(d) => Some(d),
            _ => None,
        })
    }

    pub fn draw_count(&self) -> usize {
        self.draws().count()
    }

    pub fn count(&self, pred: impl Fn(&DeviceCall) -> bool) -> usize {
        self.calls.iter().filter(|c| pred(c)).count()
    }

    /// Geometry of the most recent upload.
    pub fn last_geometry(&self) -> Option<(&[Vertex], &[u16])> {
        self.calls.iter().rev().find_map(|c| match c {
            DeviceCall::UploadGeometry { vertices, indices } => {
                Some((vertices.as_slice(), indices.as_slice()))
            }
            _ => None,
        })
    }

    /// Makes the next `create_program` fail with `log`.
    pub fn fail_next_compile(&mut self, log: impl Into<String>) {
        self.fail_next_compile = Some(log.into());
    }

    /// Makes every completeness check report `Incomplete` while set.
    pub fn set_incomplete_framebuffers(&mut self, incomplete: bool) {
        self.incomplete_framebuffers = incomplete;
    }

    /// Caps the number of live textures; creation beyond it fails.
    pub fn set_texture_budget(&mut self, budget: Option<usize>) {
        self.texture_budget = budget;
    }

    fn handle(&mut self) -> u32 {
        let h = self.next_handle;
        self.next_handle += 1;
        h
    }
}

impl GraphicsDevice for RecordingDevice {
    fn capabilities(&self) -> Capabilities {
        self.caps
    }

    fn create_texture(&mut self, width: u32, height: u32) -> Result<TextureId, RenderError> {
        if self.texture_budget.is_some_and(|b| self.live_textures >= b) {
            return Err(RenderError::ResourceExhausted(format!(
                "texture memory ({width}x{height})"
            )));
        }
        let texture = TextureId(self.handle());
        self.live_textures += 1;
        self.pixels.insert(
            texture,
            TexturePixels {
                width,
                rgba: vec![0; (width * height * 4) as usize],
            },
        );
        self.calls.push(DeviceCall::CreateTexture { texture, width, height });
        Ok(texture)
    }

    fn delete_texture(&mut self, texture: TextureId) {
        self.live_textures = self.live_textures.saturating_sub(1);
        self.pixels.remove(&texture);
        for slots in self.attachments.values_mut() {
            for slot in slots.iter_mut().filter(|s| **s == Some(texture)) {
                *slot = None;
            }
        }
        self.calls.push(DeviceCall::DeleteTexture(texture));
    }

    fn upload_texture(&mut self, texture: TextureId, width: u32, height: u32, rgba: &[u8]) {
        debug_assert_eq!(rgba.len(), (width * height * 4) as usize);
        if let Some(t) = self.pixels.get_mut(&texture) {
            let row = (width * 4) as usize;
            let stride = (t.width * 4) as usize;
            for (y, src) in rgba.chunks_exact(row).enumerate() {
                t.rgba[y * stride..y * stride + row].copy_from_slice(src);
            }
        }
        self.calls.push(DeviceCall::UploadTexture { texture, width, height });
    }

    fn read_texture(
        &mut self,
        texture: TextureId,
        width: u32,
        height: u32,
    ) -> Result<Vec<u8>, RenderError> {
        self.calls.push(DeviceCall::ReadTexture { texture, width, height });
        let t = self
            .pixels
            .get(&texture)
            .unwrap_or_else(|| panic!("read of unknown texture {texture:?}"));

        let row = (width * 4) as usize;
        let stride = (t.width * 4) as usize;
        Ok(t.rgba
            .chunks_exact(stride)
            .take(height as usize)
            .flat_map(|line| &line[..row])
            .copied()
            .collect())
    }

    fn set_texture_filter(&mut self, texture: TextureId, smooth: bool) {
        self.calls.push(DeviceCall::SetTextureFilter { texture, smooth });
    }

    fn bind_texture(&mut self, unit: u32, texture: Option<TextureId>) {
        assert!(unit < self.caps.max_texture_units, "texture unit {unit} out of range");
        self.calls.push(DeviceCall::BindTexture { unit, texture });
    }

    fn set_buffer_mode(&mut self, mode: BufferMode) {
        self.calls.push(DeviceCall::SetBufferMode(mode));
    }

    fn upload_geometry(&mut self, vertices: &[Vertex], indices: &[u16]) {
        self.calls.push(DeviceCall::UploadGeometry {
            vertices: vertices.to_vec(),
            indices: indices.to_vec(),
        });
    }

    fn draw_indexed(&mut self, call: &DrawCall) {
        self.calls.push(DeviceCall::DrawIndexed(*call));
    }

    fn create_program(&mut self, source: &ShaderSource<'_>) -> Result<ProgramId, String> {
        if let Some(log) = self.fail_next_compile.take() {
            return Err(log);
        }
        if source.code.trim().is_empty() {
            return Err("empty shader source".to_string());
        }
        let program = ProgramId(self.handle());
        self.calls.push(DeviceCall::CreateProgram(program));
        Ok(program)
    }

    fn delete_program(&mut self, program: ProgramId) {
        self.locations.retain(|(p, _), _| *p != program);
        self.calls.push(DeviceCall::DeleteProgram(program));
    }

    fn use_program(&mut self, program: Option<ProgramId>) {
        self.calls.push(DeviceCall::UseProgram(program));
    }

    fn uniform_location(&mut self, program: ProgramId, name: &str) -> Option<ParamLocation> {
        let next = &mut self.next_location;
        let location = *self
            .locations
            .entry((program, name.to_string()))
            .or_insert_with(|| {
                let l = ParamLocation(*next);
                *next += 1;
                l
            });
        Some(location)
    }

    fn set_uniform(&mut self, location: ParamLocation, value: UniformValue) {
        self.calls.push(DeviceCall::SetUniform { location, value });
    }

    fn create_framebuffer(&mut self) -> Result<FramebufferId, RenderError> {
        let framebuffer = FramebufferId(self.handle());
        self.attachments.insert(framebuffer, Vec::new());
        self.calls.push(DeviceCall::CreateFramebuffer(framebuffer));
        Ok(framebuffer)
    }

    fn delete_framebuffer(&mut self, framebuffer: FramebufferId) {
        self.attachments.remove(&framebuffer);
        if self.bound_framebuffer == Some(framebuffer) {
            self.bound_framebuffer = None;
        }
        self.calls.push(DeviceCall::DeleteFramebuffer(framebuffer));
    }

    fn bind_framebuffer(&mut self, framebuffer: Option<FramebufferId>) {
        self.bound_framebuffer = framebuffer;
        self.calls.push(DeviceCall::BindFramebuffer(framebuffer));
    }

    fn attach_color(&mut self, framebuffer: FramebufferId, slot: u32, texture: Option<TextureId>) {
        assert!(slot < self.caps.max_draw_targets, "attachment slot {slot} out of range");
        if let Some(slots) = self.attachments.get_mut(&framebuffer) {
            let slot = slot as usize;
            if slots.len() <= slot {
                slots.resize(slot + 1, None);
            }
            slots[slot] = texture;
        }
        self.calls.push(DeviceCall::AttachColor { framebuffer, slot, texture });
    }

    fn framebuffer_status(&mut self, framebuffer: FramebufferId) -> FramebufferStatus {
        self.calls.push(DeviceCall::FramebufferStatus(framebuffer));
        if self.incomplete_framebuffers {
            FramebufferStatus::Incomplete
        } else {
            FramebufferStatus::Complete
        }
    }

    fn set_viewport(&mut self, viewport: ViewportRect) {
        self.calls.push(DeviceCall::SetViewport(viewport));
    }

    fn set_projection(&mut self, ortho: Ortho) {
        self.calls.push(DeviceCall::SetProjection(ortho));
    }

    fn set_blend(&mut self, mode: BlendMode) {
        self.calls.push(DeviceCall::SetBlend(mode));
    }

    fn set_scissor(&mut self, clip: Option<ViewportRect>) {
        self.calls.push(DeviceCall::SetScissor(clip));
    }

    fn set_clear_color(&mut self, color: Rgba) {
        self.clear_color = color;
        self.calls.push(DeviceCall::SetClearColor(color));
    }

    fn clear(&mut self) {
        let attached = self
            .bound_framebuffer
            .and_then(|fb| self.attachments.get(&fb))
            .into_iter()
            .flatten()
            .flatten();
        let fill = bytemuck::bytes_of(&self.clear_color);
        for texture in attached {
            if let Some(t) = self.pixels.get_mut(texture) {
                for px in t.rgba.chunks_exact_mut(4) {
                    px.copy_from_slice(fill);
                }
            }
        }
        self.calls.push(DeviceCall::Clear);
    }

    fn present(&mut self) {
        self.calls.push(DeviceCall::Present);
    }
}
