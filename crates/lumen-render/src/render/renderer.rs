use std::collections::HashMap;

use crate::coords::{Rect, Transform2D};
use crate::device::{
    BufferMode, Capabilities, DrawCall, GraphicsDevice, Ortho, ParamLocation, ProgramId,
    ShaderSource, TextureId, UniformValue, ViewportRect,
};
use crate::paint::{BlendMode, Rgba, Smoothing};

use super::{
    Bitmap, BitmapId, DestinationBindingCache, RenderError, RenderTarget, RendererConfig,
    ShaderDesc, ShaderId, ShaderRegistry, ShaderState, StateCache, TextureParam, TextureParamId,
    TextureUnitCache, Topology, Vertex, VertexBatch, TEXTURE_RECT_SUFFIXES, validate_targets,
};

/// Destination selector for [`Renderer::set_targets`].
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Target {
    Window,
    Bitmap(BitmapId),
}

/// Submission counters since construction.
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq)]
pub struct RenderStats {
    /// Non-empty batches submitted.
    pub flushes: u64,
    /// Indexed draws issued (one per active shader per submission).
    pub draws: u64,
}

/// Custom texture resolved for one submission pass.
struct PassTexture {
    sampler: Option<ParamLocation>,
    rect: [Option<ParamLocation>; 4],
    texture: TextureId,
    uv: Rect,
}

/// Batching renderer over a [`GraphicsDevice`].
///
/// Owns the vertex batch and every binding cache. Each state-changing call
/// compares against the caches, flushes queued geometry when the state really
/// changes, then applies it. Geometry reaches the device in push order.
///
/// Single-threaded: the renderer lives on the thread owning the device context.
pub struct Renderer<D: GraphicsDevice> {
    device: D,
    caps: Capabilities,
    config: RendererConfig,

    batch: VertexBatch,
    /// Texture sampled by queued geometry; `None` for untextured primitives.
    source: Option<TextureId>,

    state: StateCache,
    units: TextureUnitCache,
    targets: DestinationBindingCache,
    shaders: ShaderRegistry,

    bitmaps: HashMap<BitmapId, Bitmap>,
    next_bitmap: u32,

    screen_size: (u32, u32),
    stats: RenderStats,
}

impl<D: GraphicsDevice> Renderer<D> {
    /// Discovers device capabilities and binds the window surface.
    pub fn new(device: D, config: RendererConfig) -> Result<Self, RenderError> {
        let caps = device.capabilities();
        log::debug!("graphics device capabilities: {caps:?}");

        let mut renderer = Self {
            batch: VertexBatch::with_quad_capacity(config.batch_capacity),
            source: None,
            state: StateCache::default(),
            units: TextureUnitCache::new(caps.max_texture_units),
            targets: DestinationBindingCache::new(),
            shaders: ShaderRegistry::new(),
            bitmaps: HashMap::new(),
            next_bitmap: 0,
            screen_size: config.screen_size,
            stats: RenderStats::default(),
            device,
            caps,
            config,
        };

        renderer.apply_buffer_mode();
        renderer.set_blend_mode(BlendMode::Alpha)?;
        renderer.set_targets(&[Target::Window])?;
        renderer.set_clip(None)?;
        Ok(renderer)
    }

    // ── accessors ─────────────────────────────────────────────────────────

    #[inline]
    pub fn device(&self) -> &D {
        &self.device
    }

    #[inline]
    pub fn device_mut(&mut self) -> &mut D {
        &mut self.device
    }

    #[inline]
    pub fn capabilities(&self) -> &Capabilities {
        &self.caps
    }

    #[inline]
    pub fn config(&self) -> &RendererConfig {
        &self.config
    }

    #[inline]
    pub fn stats(&self) -> RenderStats {
        self.stats
    }

    #[inline]
    pub fn batch(&self) -> &VertexBatch {
        &self.batch
    }

    #[inline]
    pub(super) fn batch_mut(&mut self) -> &mut VertexBatch {
        &mut self.batch
    }

    #[inline]
    pub fn state(&self) -> &StateCache {
        &self.state
    }

    #[inline]
    pub fn texture_units(&self) -> &TextureUnitCache {
        &self.units
    }

    #[inline]
    pub fn bound_targets(&self) -> &[RenderTarget] {
        self.targets.current()
    }

    #[inline]
    pub fn screen_size(&self) -> (u32, u32) {
        self.screen_size
    }

    pub fn bitmap(&self, id: BitmapId) -> Option<&Bitmap> {
        self.bitmaps.get(&id)
    }

    pub fn shader_state(&self, id: ShaderId) -> ShaderState {
        self.shaders.get(id).state
    }

    /// Shaders applied to queued geometry, in activation order.
    pub fn active_shaders(&self) -> &[ShaderId] {
        self.shaders.active()
    }

    pub fn into_device(self) -> D {
        self.device
    }

    // ── flushing ──────────────────────────────────────────────────────────

    /// Submits queued geometry as one draw per active shader and empties the batch.
    ///
    /// No-op on an empty batch. Deferred shader deactivations complete here,
    /// after submission. The batch is empty afterwards even when submission
    /// fails.
    ///
    /// A state change that triggers a flush is applied even when the flush
    /// fails, and then returns the flush error.
    pub fn flush(&mut self) -> Result<(), RenderError> {
        if self.batch.is_empty() {
            return Ok(());
        }

        let topology = self.batch.topology();
        let (vertices, indices) = self.batch.take();
        let result = self.submit(&vertices, &indices, topology, self.source);
        let (vertex_count, index_count) = (vertices.len(), indices.len());
        self.batch.recycle(vertices, indices);

        self.stats.flushes += 1;
        let retired = self.shaders.drain_pending();
        log::trace!(
            "flush #{}: {vertex_count} vertices, {index_count} indices ({topology:?}), {retired} shader(s) retired",
            self.stats.flushes
        );
        result
    }

    /// Uploads geometry once and draws it under every active shader in order,
    /// or once under the default program when none is active.
    pub(super) fn submit(
        &mut self,
        vertices: &[Vertex],
        indices: &[u16],
        topology: Topology,
        source: Option<TextureId>,
    ) -> Result<(), RenderError> {
        self.ensure_destination()?;
        self.apply_buffer_mode();
        self.device.upload_geometry(vertices, indices);

        let passes: Vec<Option<ShaderId>> = if self.shaders.active().is_empty() {
            vec![None]
        } else {
            self.shaders.active().iter().copied().map(Some).collect()
        };

        let mut result = Ok(());
        for shader in passes {
            let pass = self.submit_pass(shader, topology, indices.len() as u32, source);
            result = result.and(pass);
        }
        result
    }

    fn submit_pass(
        &mut self,
        shader: Option<ShaderId>,
        topology: Topology,
        index_count: u32,
        source: Option<TextureId>,
    ) -> Result<(), RenderError> {
        let (program, params, custom) = match shader {
            Some(id) => {
                let s = self.shaders.get(id);
                let custom: Vec<PassTexture> = s
                    .textures
                    .iter()
                    .filter_map(|tp| {
                        let b = self.bitmaps.get(&tp.bitmap?)?;
                        Some(PassTexture {
                            sampler: tp.sampler,
                            rect: tp.rect,
                            texture: b.texture,
                            uv: b.uv_rect(),
                        })
                    })
                    .collect();
                (Some(s.program), s.params.clone(), custom)
            }
            None => (None, Vec::new(), Vec::new()),
        };

        // Every texture of the pass must be resident at once.
        let mut needed: Vec<TextureId> = source
            .into_iter()
            .chain(custom.iter().map(|t| t.texture))
            .collect();
        needed.sort_unstable();
        needed.dedup();
        if needed.len() > self.units.unit_count() as usize {
            log::warn!(
                "draw samples {} textures but the device has {} units; geometry dropped",
                needed.len(),
                self.units.unit_count()
            );
            return Err(RenderError::ResourceExhausted(format!(
                "{} textures in one draw, {} texture units",
                needed.len(),
                self.units.unit_count()
            )));
        }

        self.use_program(program);

        let source_unit = source.map(|t| self.units.bind(&mut self.device, t));
        for t in &custom {
            let unit = self.units.bind(&mut self.device, t.texture);
            if let Some(loc) = t.sampler {
                self.device.set_uniform(loc, UniformValue::Unit(unit));
            }
            let edges = [t.uv.tl.y, t.uv.tl.x, t.uv.br.y, t.uv.br.x];
            for (loc, edge) in t.rect.iter().zip(edges) {
                if let Some(loc) = *loc {
                    self.device.set_uniform(loc, UniformValue::Float(edge));
                }
            }
        }
        for (loc, value) in params {
            self.device.set_uniform(loc, value);
        }

        self.device.draw_indexed(&DrawCall {
            topology,
            index_count,
            source_unit,
        });
        self.stats.draws += 1;
        Ok(())
    }

    /// Fails when `vertex_count` vertices can never fit in one batch.
    pub(super) fn check_room(&self, vertex_count: usize) -> Result<(), RenderError> {
        if vertex_count > self.batch.max_push() {
            return Err(RenderError::ResourceExhausted(format!(
                "{vertex_count} vertices exceed the batch capacity of {}",
                self.batch.max_push()
            )));
        }
        Ok(())
    }

    /// Makes room for `vertex_count` vertices sampling `source` with `topology`,
    /// flushing when the batch cannot take them as-is.
    ///
    /// The batch takes the push afterwards even if the flush failed; the
    /// caller pushes, then reports the returned error.
    pub(super) fn reserve(
        &mut self,
        source: Option<TextureId>,
        vertex_count: usize,
        topology: Topology,
    ) -> Result<(), RenderError> {
        debug_assert!(vertex_count <= self.batch.max_push(), "reserve without check_room");

        let flushed = if !self.batch.is_empty()
            && (self.source != source
                || !self.batch.accepts(topology)
                || !self.batch.fits(vertex_count))
        {
            self.flush()
        } else {
            Ok(())
        };
        self.source = source;
        flushed
    }

    /// Flushes when queued geometry samples `texture`.
    fn flush_if_pending(&mut self, texture: TextureId) -> Result<(), RenderError> {
        if self.is_pending(texture) {
            self.flush()
        } else {
            Ok(())
        }
    }

    /// True when queued geometry samples `texture`, directly or through a shader.
    fn is_pending(&self, texture: TextureId) -> bool {
        if self.batch.is_empty() {
            return false;
        }
        if self.source == Some(texture) {
            return true;
        }
        self.shaders.active().iter().any(|&id| {
            self.shaders.get(id).textures.iter().any(|tp| {
                tp.bitmap
                    .and_then(|b| self.bitmaps.get(&b))
                    .is_some_and(|b| b.texture == texture)
            })
        })
    }

    // ── device state ──────────────────────────────────────────────────────

    fn apply_buffer_mode(&mut self) {
        let mode = if self.caps.has_device_buffer_support {
            BufferMode::Device
        } else {
            BufferMode::Client
        };
        if !self.state.buffer_mode.matches(mode) {
            self.device.set_buffer_mode(mode);
            self.state.buffer_mode.store(mode);
        }
    }

    fn use_program(&mut self, program: Option<ProgramId>) {
        if !self.state.program.matches(program) {
            self.device.use_program(program);
            self.state.program.store(program);
        }
    }

    /// Viewport and projection covering a `width` x `height` destination.
    fn apply_viewport(&mut self, width: u32, height: u32) {
        let viewport = ViewportRect::new(0, 0, width, height);
        if !self.state.viewport.matches(viewport) {
            self.device.set_viewport(viewport);
            self.state.viewport.store(viewport);
        }

        let ortho = Ortho::for_target(width, height);
        if !self.state.projection.matches(ortho) {
            self.device.set_projection(ortho);
            self.state.projection.store(ortho);
        }
    }

    pub fn set_blend_mode(&mut self, mode: BlendMode) -> Result<(), RenderError> {
        if self.state.blend.matches(mode) {
            return Ok(());
        }
        let flushed = self.flush();
        self.device.set_blend(mode);
        self.state.blend.store(mode);
        flushed
    }

    /// Restricts drawing to `clip` (target pixels), or lifts the restriction.
    pub fn set_clip(&mut self, clip: Option<Rect>) -> Result<(), RenderError> {
        let scissor = clip.map(|r| {
            let x = r.tl.x.floor();
            let y = r.tl.y.floor();
            ViewportRect::new(
                x as i32,
                y as i32,
                (r.br.x.ceil() - x).max(0.0) as u32,
                (r.br.y.ceil() - y).max(0.0) as u32,
            )
        });
        if self.state.clip.matches(scissor) {
            return Ok(());
        }
        let flushed = self.flush();
        self.device.set_scissor(scissor);
        self.state.clip.store(scissor);
        flushed
    }

    /// Applies the filter `smoothing` resolves to on a bitmap's texture.
    pub(super) fn apply_smoothing(
        &mut self,
        id: BitmapId,
        smoothing: Smoothing,
    ) -> Result<(), RenderError> {
        let smooth = smoothing.resolve(self.config.default_smoothing);
        let bitmap = self.bitmap_entry(id);
        if bitmap.filter == Some(smooth) {
            return Ok(());
        }

        let texture = bitmap.texture;
        let flushed = self.flush_if_pending(texture);
        self.device.set_texture_filter(texture, smooth);
        self.bitmap_entry_mut(id).filter = Some(smooth);
        flushed
    }

    // ── targets ───────────────────────────────────────────────────────────

    /// Selects the destinations of subsequent drawing.
    ///
    /// Re-selecting the bound list is free. Otherwise queued geometry is
    /// flushed, the targets are bound and the viewport follows their size.
    /// On a binding failure the previous binding stays in effect.
    pub fn set_targets(&mut self, targets: &[Target]) -> Result<(), RenderError> {
        let requested: Vec<RenderTarget> = targets.iter().map(|t| self.resolve_target(*t)).collect();
        self.bind_targets(&requested)
    }

    fn bind_targets(&mut self, requested: &[RenderTarget]) -> Result<(), RenderError> {
        validate_targets(requested, &self.caps)?;

        if self.targets.matches(requested) {
            return Ok(());
        }

        let flushed = self.flush();
        self.targets.bind(&mut self.device, requested)?;
        self.apply_viewport(requested[0].width, requested[0].height);
        flushed
    }

    fn resolve_target(&self, target: Target) -> RenderTarget {
        match target {
            Target::Window => RenderTarget::window(self.screen_size.0, self.screen_size.1),
            Target::Bitmap(id) => {
                let b = self.bitmap_entry(id);
                RenderTarget::offscreen(b.texture, b.width, b.height)
            }
        }
    }

    /// Rebinds the window surface if the binding was forgotten.
    fn ensure_destination(&mut self) -> Result<(), RenderError> {
        if !self.targets.current().is_empty() {
            return Ok(());
        }
        let (w, h) = self.screen_size;
        self.targets.bind(&mut self.device, &[RenderTarget::window(w, h)])?;
        self.apply_viewport(w, h);
        Ok(())
    }

    // ── bitmaps ───────────────────────────────────────────────────────────

    /// Allocates a `width` x `height` bitmap; its clip covers the whole image.
    ///
    /// # Panics
    /// Panics on a zero dimension.
    pub fn create_bitmap(&mut self, width: u32, height: u32) -> Result<BitmapId, RenderError> {
        assert!(width > 0 && height > 0, "empty bitmap {width}x{height}");

        let npot = self.caps.has_npot_support;
        let (real_w, real_h) = Bitmap::allocation_size(width, height, npot);
        let texture = self.device.create_texture(real_w, real_h).inspect_err(|e| {
            log::warn!("bitmap {width}x{height} not created: {e}");
        })?;

        let id = BitmapId(self.next_bitmap);
        self.next_bitmap += 1;
        self.bitmaps.insert(id, Bitmap::new(texture, width, height, npot));
        log::debug!("bitmap {id:?}: {width}x{height} on {real_w}x{real_h} texture {texture:?}");
        Ok(id)
    }

    /// Frees a bitmap after submitting any geometry that samples it.
    ///
    /// Shader parameters referring to it are cleared; if it is bound as a
    /// target, the window surface is bound instead.
    pub fn delete_bitmap(&mut self, id: BitmapId) -> Result<(), RenderError> {
        let texture = self.bitmap_entry(id).texture;

        let mut result = self.flush_if_pending(texture);
        if self.targets.binds_texture(texture) {
            result = result.and(self.set_targets(&[Target::Window]));
        }

        self.units.release(&mut self.device, texture);
        for shader in self.shaders.iter_mut() {
            for tp in shader.textures.iter_mut().filter(|tp| tp.bitmap == Some(id)) {
                tp.bitmap = None;
            }
        }
        if self.source == Some(texture) {
            self.source = None;
        }

        self.bitmaps.remove(&id);
        self.device.delete_texture(texture);
        result
    }

    /// Replaces the bitmap's pixels with tightly packed RGBA8 data.
    ///
    /// # Panics
    /// Panics if `rgba` does not hold exactly `width * height` pixels.
    pub fn set_bitmap_data(&mut self, id: BitmapId, rgba: &[u8]) -> Result<(), RenderError> {
        let (texture, width, height) = {
            let b = self.bitmap_entry(id);
            (b.texture, b.width, b.height)
        };
        assert_eq!(
            rgba.len(),
            (width * height * 4) as usize,
            "pixel data does not match bitmap {id:?} ({width}x{height})"
        );

        let flushed = self.flush_if_pending(texture);
        self.device.upload_texture(texture, width, height, rgba);
        flushed
    }

    /// Selects the texel rectangle drawn from the bitmap.
    pub fn set_bitmap_clipping(&mut self, id: BitmapId, clip: Rect) -> Result<(), RenderError> {
        assert!(clip.is_finite(), "non-finite clip {clip:?}");

        // Queued quads carry their UVs; only shader rect uniforms read the clip late.
        let texture = self.bitmap_entry(id).texture;
        let flushed = if self.source != Some(texture) {
            self.flush_if_pending(texture)
        } else {
            Ok(())
        };
        self.bitmap_entry_mut(id).clip = clip;
        flushed
    }

    /// Sets the tint multiplied into quads drawn from the bitmap from now on.
    pub fn set_bitmap_color(&mut self, id: BitmapId, color: Rgba) {
        self.bitmap_entry_mut(id).color = color;
    }

    /// Fills the whole bitmap with `color`.
    ///
    /// The bitmap is bound as the destination just long enough to clear it,
    /// then the previous destinations are bound again. A bitmap that cannot
    /// be bound has its pixels overwritten instead.
    pub fn clear_bitmap(&mut self, id: BitmapId, color: Rgba) -> Result<(), RenderError> {
        let (target, texture, real_width, real_height) = {
            let b = self.bitmap_entry(id);
            (
                RenderTarget::offscreen(b.texture, b.width, b.height),
                b.texture,
                b.real_width,
                b.real_height,
            )
        };

        let flushed = self.flush();
        let previous = match self.targets.current() {
            [] => vec![RenderTarget::window(self.screen_size.0, self.screen_size.1)],
            current => current.to_vec(),
        };

        match self.bind_targets(&[target]) {
            Ok(()) => {
                self.clear_bound(color);
                flushed.and(self.bind_targets(&previous))
            }
            Err(e) => {
                log::debug!("bitmap {id:?} cannot be bound ({e}); filling its pixels");
                let pixels = bytemuck::bytes_of(&color).repeat((real_width * real_height) as usize);
                self.device.upload_texture(texture, real_width, real_height, &pixels);
                flushed
            }
        }
    }

    /// Reads the bitmap's pixels back as tightly packed RGBA8, top row first.
    ///
    /// Geometry queued into the bitmap is submitted first.
    pub fn bitmap_data(&mut self, id: BitmapId) -> Result<Vec<u8>, RenderError> {
        let (texture, width, height) = {
            let b = self.bitmap_entry(id);
            (b.texture, b.width, b.height)
        };
        if self.targets.binds_texture(texture) {
            self.flush()?;
        }
        self.device.read_texture(texture, width, height)
    }

    /// Queues the bitmap's clip as a quad placed by `transform`.
    pub fn draw_bitmap(
        &mut self,
        id: BitmapId,
        transform: &Transform2D,
        color: Rgba,
        smoothing: Smoothing,
        blend: BlendMode,
    ) -> Result<(), RenderError> {
        let (texture, size, uv, tint) = {
            let b = self.bitmap_entry(id);
            (b.texture, b.clip.size(), b.uv_rect(), b.color)
        };

        let blended = self.set_blend_mode(blend);
        let smoothed = self.apply_smoothing(id, smoothing);
        let reserved = self.reserve(Some(texture), 4, Topology::TriangleList);
        self.batch.push_quad(&transform.to_affine(), size, uv, color.modulate(tint));
        blended.and(smoothed).and(reserved)
    }

    pub(super) fn bitmap_entry(&self, id: BitmapId) -> &Bitmap {
        self.bitmaps
            .get(&id)
            .unwrap_or_else(|| panic!("unknown bitmap {id:?}"))
    }

    fn bitmap_entry_mut(&mut self, id: BitmapId) -> &mut Bitmap {
        self.bitmaps
            .get_mut(&id)
            .unwrap_or_else(|| panic!("unknown bitmap {id:?}"))
    }

    // ── shaders ───────────────────────────────────────────────────────────

    /// Compiles a shader. A failed compile registers nothing.
    pub fn create_shader(&mut self, desc: &ShaderDesc) -> Result<ShaderId, RenderError> {
        if !self.caps.has_shader_support {
            return Err(RenderError::Unsupported("shader programs"));
        }

        let source = ShaderSource {
            version: self.config.shader_version.as_deref(),
            code: &desc.code,
        };
        let program = self.device.create_program(&source).map_err(|log| {
            log::warn!("shader compilation failed: {log}");
            RenderError::CompileFailure(log)
        })?;

        let id = self.shaders.insert(program, desc.uses_custom_params);
        log::debug!("shader {id:?} compiled as {program:?}");
        Ok(id)
    }

    /// Deactivates the shader (submitting its geometry) and frees its program.
    pub fn delete_shader(&mut self, id: ShaderId) -> Result<(), RenderError> {
        let mut flushed = Ok(());
        if self.shaders.get(id).is_contributing() {
            flushed = self.flush();
            if self.shaders.get(id).is_contributing() {
                self.shaders.deactivate(id);
            }
        }

        let shader = self.shaders.remove(id);
        if self.state.program.matches(Some(shader.program)) {
            self.state.program.forget();
        }
        self.device.delete_program(shader.program);
        flushed
    }

    /// Appends the shader to the active list.
    ///
    /// Queued geometry is flushed first unless the shader declares custom
    /// parameters. Restarting a shader awaiting removal flushes so the old
    /// activation retires.
    ///
    /// # Panics
    /// Panics if the shader is already active.
    pub fn start_shader(&mut self, id: ShaderId) -> Result<(), RenderError> {
        let shader = self.shaders.get(id);
        let must_flush = shader.state == ShaderState::PendingRemoval
            || (!self.batch.is_empty() && !shader.uses_custom_params);

        let flushed = if must_flush { self.flush() } else { Ok(()) };
        self.shaders.activate(id);
        flushed
    }

    /// Stops applying the shader.
    ///
    /// With queued geometry, a shader without custom parameters stays applied
    /// to it and leaves the active list at the next flush; one with custom
    /// parameters flushes now. Stopping a shader already awaiting removal
    /// does nothing.
    ///
    /// # Panics
    /// Panics if the shader is not active.
    pub fn stop_shader(&mut self, id: ShaderId) -> Result<(), RenderError> {
        let (state, uses_custom_params) = {
            let s = self.shaders.get(id);
            (s.state, s.uses_custom_params)
        };
        match state {
            ShaderState::Inactive => panic!("shader {id:?} stopped while inactive"),
            ShaderState::PendingRemoval => Ok(()),
            ShaderState::Active if self.batch.is_empty() => {
                self.shaders.deactivate(id);
                Ok(())
            }
            ShaderState::Active if uses_custom_params => {
                let flushed = self.flush();
                self.shaders.deactivate(id);
                flushed
            }
            ShaderState::Active => {
                self.shaders.defer_deactivation(id);
                Ok(())
            }
        }
    }

    /// Location of a scalar or vector parameter.
    pub fn param_id(&mut self, id: ShaderId, name: &str) -> Option<ParamLocation> {
        let program = self.shaders.get(id).program;
        self.device.uniform_location(program, name)
    }

    /// Declares (or finds) a texture parameter and its `_top/_left/_bottom/_right`
    /// clip companions.
    pub fn texture_param_id(
        &mut self,
        id: ShaderId,
        name: &str,
    ) -> Result<TextureParamId, RenderError> {
        let shader = self.shaders.get(id);
        if let Some(i) = shader.textures.iter().position(|tp| tp.name == name) {
            return Ok(TextureParamId(i as u32));
        }

        let count = shader.textures.len();
        if count >= self.units.unit_count() as usize {
            return Err(RenderError::ResourceExhausted(format!(
                "shader {id:?} already declares {count} texture parameters for {} units",
                self.units.unit_count()
            )));
        }

        let program = shader.program;
        let sampler = self.device.uniform_location(program, name);
        let rect = TEXTURE_RECT_SUFFIXES
            .map(|suffix| self.device.uniform_location(program, &format!("{name}{suffix}")));

        self.shaders.get_mut(id).textures.push(TextureParam {
            name: name.to_string(),
            sampler,
            rect,
            bitmap: None,
        });
        Ok(TextureParamId(count as u32))
    }

    pub fn set_shader_float(
        &mut self,
        id: ShaderId,
        location: ParamLocation,
        value: f32,
    ) -> Result<(), RenderError> {
        self.set_shader_param(id, location, UniformValue::Float(value))
    }

    pub fn set_shader_vec3(
        &mut self,
        id: ShaderId,
        location: ParamLocation,
        value: [f32; 3],
    ) -> Result<(), RenderError> {
        self.set_shader_param(id, location, UniformValue::Vec3(value))
    }

    /// Points a texture parameter at a bitmap, or at nothing.
    ///
    /// # Panics
    /// Panics on an unknown parameter or bitmap.
    pub fn set_shader_texture(
        &mut self,
        id: ShaderId,
        param: TextureParamId,
        bitmap: Option<BitmapId>,
    ) -> Result<(), RenderError> {
        if let Some(b) = bitmap {
            assert!(self.bitmaps.contains_key(&b), "unknown bitmap {b:?}");
        }
        let flushed = self.flush_if_contributing(id);

        let shader = self.shaders.get_mut(id);
        let tp = shader
            .textures
            .get_mut(param.0 as usize)
            .unwrap_or_else(|| panic!("unknown texture parameter {param:?} of {id:?}"));
        tp.bitmap = bitmap;
        flushed
    }

    fn set_shader_param(
        &mut self,
        id: ShaderId,
        location: ParamLocation,
        value: UniformValue,
    ) -> Result<(), RenderError> {
        let flushed = self.flush_if_contributing(id);
        self.shaders.get_mut(id).set_param(location, value);
        flushed
    }

    /// Submits queued geometry the shader applies to, so a parameter change
    /// only affects what is pushed next.
    fn flush_if_contributing(&mut self, id: ShaderId) -> Result<(), RenderError> {
        if self.shaders.get(id).is_contributing() && !self.batch.is_empty() {
            self.flush()
        } else {
            Ok(())
        }
    }

    // ── frame ─────────────────────────────────────────────────────────────

    /// Clears the bound targets.
    pub fn clear(&mut self, color: Rgba) -> Result<(), RenderError> {
        let flushed = self.flush();
        self.ensure_destination()?;
        self.clear_bound(color);
        flushed
    }

    fn clear_bound(&mut self, color: Rgba) {
        if !self.state.clear_color.matches(color) {
            self.device.set_clear_color(color);
            self.state.clear_color.store(color);
        }
        self.device.clear();
    }

    /// Submits queued geometry and presents the window surface.
    pub fn swap(&mut self) -> Result<(), RenderError> {
        let flushed = self.flush();
        self.device.present();
        flushed
    }

    /// Records a new window size; a bound window gets a matching viewport.
    pub fn resize_screen(&mut self, width: u32, height: u32) -> Result<(), RenderError> {
        self.screen_size = (width, height);
        if !self.targets.is_window_bound() || self.targets.size() == Some((width, height)) {
            return Ok(());
        }

        let flushed = self.flush();
        self.targets.resize_window(width, height);
        self.apply_viewport(width, height);
        log::debug!("window target resized to {width}x{height}");
        flushed
    }

    /// Forgets everything cached about the device after a context loss.
    ///
    /// Queued geometry is dropped unsubmitted and every shader is deactivated.
    /// The next submission rebinds the window surface unless targets are set.
    pub fn discard_device_state(&mut self) {
        let dropped = self.batch.vertex_count();
        self.batch.clear();
        self.source = None;

        self.state.forget();
        self.units.forget();
        self.targets.forget();
        self.shaders.reset_activation();
        for bitmap in self.bitmaps.values_mut() {
            bitmap.filter = None;
        }

        log::debug!("device state discarded; {dropped} queued vertices dropped");
    }
}
