use std::collections::HashMap;

use crate::device::{ParamLocation, ProgramId, UniformValue};

use super::BitmapId;

/// Edge names appended to a texture parameter to locate its clip-rect uniforms,
/// in the order they are uploaded.
pub const TEXTURE_RECT_SUFFIXES: [&str; 4] = ["_top", "_left", "_bottom", "_right"];

/// Handle to a shader owned by the renderer.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct ShaderId(pub u32);

/// Index of a texture parameter within its shader.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct TextureParamId(pub u32);

/// What to compile.
#[derive(Debug, Clone, Default)]
pub struct ShaderDesc {
    pub code: String,
    /// The shader's parameters change between draws. Such shaders never hold
    /// geometry across a parameter change: they flush on stop instead of
    /// deferring removal, and starting them does not flush.
    pub uses_custom_params: bool,
}

/// Activation state.
///
/// `Inactive -> Active -> {Inactive | PendingRemoval} -> Inactive`
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq)]
pub enum ShaderState {
    #[default]
    Inactive,
    Active,
    /// Still applied to queued geometry; removed by the next flush.
    PendingRemoval,
}

/// Sampler parameter plus its clip-rect companions.
#[derive(Debug, Clone)]
pub struct TextureParam {
    pub name: String,
    pub sampler: Option<ParamLocation>,
    pub rect: [Option<ParamLocation>; 4],
    pub bitmap: Option<BitmapId>,
}

/// A compiled program and the parameter values it carries to each draw.
#[derive(Debug)]
pub struct ShaderProgram {
    pub program: ProgramId,
    pub uses_custom_params: bool,
    pub state: ShaderState,
    /// Values set since creation, uploaded at every submission.
    pub params: Vec<(ParamLocation, UniformValue)>,
    pub textures: Vec<TextureParam>,
}

impl ShaderProgram {
    fn new(program: ProgramId, uses_custom_params: bool) -> Self {
        Self {
            program,
            uses_custom_params,
            state: ShaderState::Inactive,
            params: Vec::new(),
            textures: Vec::new(),
        }
    }

    /// Stores `value` for `location`, replacing any earlier one.
    pub fn set_param(&mut self, location: ParamLocation, value: UniformValue) {
        match self.params.iter_mut().find(|(l, _)| *l == location) {
            Some((_, v)) => *v = value,
            None => self.params.push((location, value)),
        }
    }

    #[inline]
    pub fn is_contributing(&self) -> bool {
        self.state != ShaderState::Inactive
    }
}

/// Owns every shader and the ordered list of those contributing to the batch.
///
/// The active list references shaders by id; a shader appears in it at most
/// once and exactly while its state is not `Inactive`.
#[derive(Debug, Default)]
pub struct ShaderRegistry {
    shaders: HashMap<ShaderId, ShaderProgram>,
    active: Vec<ShaderId>,
    pending_removal: Vec<ShaderId>,
    next_id: u32,
}

impl ShaderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, program: ProgramId, uses_custom_params: bool) -> ShaderId {
        let id = ShaderId(self.next_id);
        self.next_id += 1;
        self.shaders.insert(id, ShaderProgram::new(program, uses_custom_params));
        id
    }

    /// Drops an inactive shader, returning it so the caller can free the program.
    ///
    /// # Panics
    /// Panics if the shader is unknown or still contributing.
    pub fn remove(&mut self, id: ShaderId) -> ShaderProgram {
        let shader = self.shaders.remove(&id).unwrap_or_else(|| panic!("unknown shader {id:?}"));
        assert!(!shader.is_contributing(), "removing active shader {id:?}");
        shader
    }

    /// # Panics
    /// Panics if the shader is unknown.
    pub fn get(&self, id: ShaderId) -> &ShaderProgram {
        self.shaders.get(&id).unwrap_or_else(|| panic!("unknown shader {id:?}"))
    }

    /// # Panics
    /// Panics if the shader is unknown.
    pub fn get_mut(&mut self, id: ShaderId) -> &mut ShaderProgram {
        self.shaders.get_mut(&id).unwrap_or_else(|| panic!("unknown shader {id:?}"))
    }

    /// Shaders applied to the next submission, in activation order.
    #[inline]
    pub fn active(&self) -> &[ShaderId] {
        &self.active
    }

    #[inline]
    pub fn has_pending_removals(&self) -> bool {
        !self.pending_removal.is_empty()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut ShaderProgram> {
        self.shaders.values_mut()
    }

    /// Appends an inactive shader to the active list.
    ///
    /// # Panics
    /// Panics if the shader is not `Inactive`.
    pub fn activate(&mut self, id: ShaderId) {
        let shader = self.get_mut(id);
        assert_eq!(shader.state, ShaderState::Inactive, "shader {id:?} started twice");
        shader.state = ShaderState::Active;
        self.active.push(id);
    }

    /// Removes a contributing shader from the active list right away.
    pub fn deactivate(&mut self, id: ShaderId) {
        let shader = self.get_mut(id);
        debug_assert!(shader.is_contributing(), "shader {id:?} stopped while inactive");
        shader.state = ShaderState::Inactive;
        self.active.retain(|s| *s != id);
        self.pending_removal.retain(|s| *s != id);
    }

    /// Keeps an active shader applied until the next flush.
    pub fn defer_deactivation(&mut self, id: ShaderId) {
        let shader = self.get_mut(id);
        debug_assert_eq!(shader.state, ShaderState::Active);
        shader.state = ShaderState::PendingRemoval;
        self.pending_removal.push(id);
    }

    /// Completes every deferred deactivation. Returns how many were drained.
    pub fn drain_pending(&mut self) -> usize {
        let pending = std::mem::take(&mut self.pending_removal);
        for id in &pending {
            if let Some(shader) = self.shaders.get_mut(id) {
                shader.state = ShaderState::Inactive;
            }
        }
        self.active.retain(|s| !pending.contains(s));
        pending.len()
    }

    /// Deactivates everything without flushing (context loss).
    pub fn reset_activation(&mut self) {
        for shader in self.shaders.values_mut() {
            shader.state = ShaderState::Inactive;
        }
        self.active.clear();
        self.pending_removal.clear();
    }
}
