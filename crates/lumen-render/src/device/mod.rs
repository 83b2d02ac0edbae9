//! Graphics-device abstraction.
//!
//! This module is responsible for:
//! - the verb set the batch engine issues (`GraphicsDevice`)
//! - capability flags discovered once at context initialization
//! - the backends: a headless call recorder and a wgpu adapter

mod caps;
mod recording;
mod traits;
pub mod gpu;

pub use caps::Capabilities;
pub use recording::{DeviceCall, RecordingDevice};
pub use traits::{
    BufferMode, DrawCall, FramebufferId, FramebufferStatus, GraphicsDevice, Ortho, ParamLocation,
    ProgramId, ShaderSource, TextureId, UniformValue, ViewportRect,
};
