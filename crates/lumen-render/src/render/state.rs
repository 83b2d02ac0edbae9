use crate::device::{BufferMode, Ortho, ProgramId, ViewportRect};
use crate::paint::{BlendMode, Rgba};

/// Last value handed to the device for one piece of state.
///
/// `None` means unknown: the next request always reaches the device.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Cached<T>(Option<T>);

impl<T> Default for Cached<T> {
    fn default() -> Self {
        Self(None)
    }
}

impl<T: Copy + PartialEq> Cached<T> {
    #[inline]
    pub fn get(&self) -> Option<T> {
        self.0
    }

    /// True when applying `value` would be redundant.
    #[inline]
    pub fn matches(&self, value: T) -> bool {
        self.0 == Some(value)
    }

    #[inline]
    pub fn store(&mut self, value: T) {
        self.0 = Some(value);
    }

    #[inline]
    pub fn forget(&mut self) {
        self.0 = None;
    }
}

/// Comparison keys for scalar and matrix device state.
///
/// The renderer consults a slot before every state change: a matching value
/// issues nothing, a differing one flushes the batch, reaches the device and
/// is stored here.
#[derive(Debug, Clone, Default)]
pub struct StateCache {
    pub blend: Cached<BlendMode>,
    pub buffer_mode: Cached<BufferMode>,
    pub viewport: Cached<ViewportRect>,
    pub projection: Cached<Ortho>,
    pub clear_color: Cached<Rgba>,
    /// Scissor rectangle; `Some(None)` is a known "no clipping".
    pub clip: Cached<Option<ViewportRect>>,
    /// Program in use; `Some(None)` is the built-in default program.
    pub program: Cached<Option<ProgramId>>,
}

impl StateCache {
    /// Forgets everything, e.g. after the device context was lost.
    pub fn forget(&mut self) {
        *self = Self::default();
    }
}
