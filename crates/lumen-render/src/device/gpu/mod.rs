//! wgpu backend.
//!
//! [`Gpu`] owns the instance, device, queue and window surface;
//! [`WgpuDevice`] maps the [`GraphicsDevice`](crate::device::GraphicsDevice)
//! verb set onto it.

mod context;
mod device;
mod init;
mod surface;

pub use context::Gpu;
pub use device::{WgpuDevice, MAX_PARAMS, MAX_UNITS};
pub use init::GpuInit;
pub use surface::{FrameUnavailable, SurfaceFrame};
