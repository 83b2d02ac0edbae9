//! Lumen render crate.
//!
//! A batching 2D renderer: quads, primitives and meshes are accumulated and
//! submitted to a [`device::GraphicsDevice`] in as few draws as the bound
//! state allows, behind caches that suppress redundant device calls.

pub mod coords;
pub mod device;
pub mod logging;
pub mod paint;
pub mod render;

pub use device::{Capabilities, GraphicsDevice, RecordingDevice};
pub use render::{RenderError, Renderer, RendererConfig, Target};
