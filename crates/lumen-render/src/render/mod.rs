//! Batch engine.
//!
//! Geometry pushed through [`Renderer`] accumulates in a [`VertexBatch`] and
//! reaches the device in as few indexed draws as the state allows. Binding
//! caches ([`StateCache`], [`TextureUnitCache`], [`DestinationBindingCache`])
//! suppress redundant device calls and decide when a state change forces a
//! flush.
//!
//! Convention:
//! - positions are target pixels (top-left origin, +Y down)
//! - texture coordinates are normalized with a top-left origin

mod batch;
mod bitmap;
mod config;
mod error;
mod primitives;
mod renderer;
mod shader;
mod state;
mod targets;
mod texture_units;
mod vertex;

pub use batch::VertexBatch;
pub use bitmap::{Bitmap, BitmapId, BORDER_FIX};
pub use config::RendererConfig;
pub use error::RenderError;
pub use primitives::CIRCLE_SEGMENTS;
pub use renderer::{RenderStats, Renderer, Target};
pub use shader::{
    ShaderDesc, ShaderId, ShaderProgram, ShaderRegistry, ShaderState, TextureParam,
    TextureParamId, TEXTURE_RECT_SUFFIXES,
};
pub use state::{Cached, StateCache};
pub use targets::{validate_targets, DestinationBindingCache, RenderTarget};
pub use texture_units::TextureUnitCache;
pub use vertex::{Topology, Vertex};
