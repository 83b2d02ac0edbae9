//! Coordinate and geometry types shared by the batch and the caches.
//!
//! Canonical CPU space:
//! - Pixels of the bound render target
//! - Origin top-left
//! - +X right, +Y down
//!
//! The orthographic projection uploaded on target changes maps this space to
//! device clip space; nothing else in the crate converts coordinates.

mod obox;
mod rect;
mod transform;
mod vec2;

pub use obox::OBox;
pub use rect::Rect;
pub use transform::{Affine2, Transform2D};
pub use vec2::Vec2;
