//! Paint model shared between the batch and the device adapters.
//!
//! Scope:
//! - packed vertex color
//! - blend equations applied when compositing into the bound targets
//! - texture sampling (smoothing) selection

pub mod blend;
pub mod color;

pub use blend::{BlendMode, Smoothing};
pub use color::Rgba;
