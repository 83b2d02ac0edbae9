use crate::device::{
    Capabilities, FramebufferId, FramebufferStatus, GraphicsDevice, TextureId,
};

use super::RenderError;

/// A destination drawing commands write into.
///
/// `texture == None` is the window surface.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct RenderTarget {
    pub texture: Option<TextureId>,
    pub width: u32,
    pub height: u32,
}

impl RenderTarget {
    #[inline]
    pub fn window(width: u32, height: u32) -> Self {
        Self { texture: None, width, height }
    }

    #[inline]
    pub fn offscreen(texture: TextureId, width: u32, height: u32) -> Self {
        Self { texture: Some(texture), width, height }
    }

    #[inline]
    pub fn is_window(&self) -> bool {
        self.texture.is_none()
    }
}

/// Checks that `targets` can be bound together on a device with `caps`.
pub fn validate_targets(targets: &[RenderTarget], caps: &Capabilities) -> Result<(), RenderError> {
    let Some(first) = targets.first() else {
        return Err(RenderError::IncompatibleTarget("empty target list".into()));
    };

    if targets.iter().any(RenderTarget::is_window) {
        if targets.len() > 1 {
            return Err(RenderError::IncompatibleTarget(
                "window surface must be the only target".into(),
            ));
        }
        return Ok(());
    }

    if !caps.has_framebuffer_support {
        return Err(RenderError::Unsupported("off-screen render targets"));
    }
    if targets.len() > caps.max_draw_targets as usize {
        return Err(RenderError::IncompatibleTarget(format!(
            "{} targets requested, device draws to at most {}",
            targets.len(),
            caps.max_draw_targets
        )));
    }
    if let Some(t) = targets
        .iter()
        .find(|t| (t.width, t.height) != (first.width, first.height))
    {
        return Err(RenderError::IncompatibleTarget(format!(
            "mismatched target sizes {}x{} and {}x{}",
            first.width, first.height, t.width, t.height
        )));
    }
    Ok(())
}

/// Current destination binding and the single off-screen framebuffer object.
///
/// The framebuffer is created on first off-screen use and reused for every
/// later binding; only its color attachments change.
#[derive(Debug, Default)]
pub struct DestinationBindingCache {
    targets: Vec<RenderTarget>,
    framebuffer: Option<FramebufferId>,
    /// Texture attached to each framebuffer slot, as last told to the device.
    attachments: Vec<Option<TextureId>>,
}

impl DestinationBindingCache {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn current(&self) -> &[RenderTarget] {
        &self.targets
    }

    /// True when binding `requested` would be redundant.
    #[inline]
    pub fn matches(&self, requested: &[RenderTarget]) -> bool {
        self.targets == requested
    }

    #[inline]
    pub fn is_window_bound(&self) -> bool {
        self.targets.first().is_some_and(RenderTarget::is_window)
    }

    #[inline]
    pub fn binds_texture(&self, texture: TextureId) -> bool {
        self.targets.iter().any(|t| t.texture == Some(texture))
    }

    /// Size shared by the bound targets.
    pub fn size(&self) -> Option<(u32, u32)> {
        self.targets.first().map(|t| (t.width, t.height))
    }

    /// Updates the window target's size in place; no device call.
    pub fn resize_window(&mut self, width: u32, height: u32) {
        for t in self.targets.iter_mut().filter(|t| t.is_window()) {
            t.width = width;
            t.height = height;
        }
    }

    /// Binds `requested` on the device. Callers validate and flush first.
    ///
    /// On an incomplete attachment set the previous binding is restored on
    /// the device and kept here.
    pub fn bind<D: GraphicsDevice + ?Sized>(
        &mut self,
        device: &mut D,
        requested: &[RenderTarget],
    ) -> Result<(), RenderError> {
        debug_assert!(!requested.is_empty());

        if requested[0].is_window() {
            device.bind_framebuffer(None);
            self.targets = requested.to_vec();
            return Ok(());
        }

        let framebuffer = match self.framebuffer {
            Some(fb) => fb,
            None => {
                let fb = device.create_framebuffer()?;
                log::debug!("created off-screen framebuffer {fb:?}");
                self.framebuffer = Some(fb);
                fb
            }
        };

        let previous = self.attachments.clone();
        let wanted: Vec<Option<TextureId>> = requested.iter().map(|t| t.texture).collect();

        device.bind_framebuffer(Some(framebuffer));
        self.attach(device, framebuffer, &wanted);

        if device.framebuffer_status(framebuffer) == FramebufferStatus::Incomplete {
            log::warn!("framebuffer incomplete for {} target(s); keeping previous binding", requested.len());
            self.attach(device, framebuffer, &previous);
            let restore = if self.targets.first().is_some_and(|t| !t.is_window()) {
                Some(framebuffer)
            } else {
                None
            };
            device.bind_framebuffer(restore);
            return Err(RenderError::IncompatibleTarget(
                "incomplete framebuffer attachment".into(),
            ));
        }

        self.targets = requested.to_vec();
        Ok(())
    }

    /// Brings the attachment table to `wanted`, clearing stale slots.
    fn attach<D: GraphicsDevice + ?Sized>(
        &mut self,
        device: &mut D,
        framebuffer: FramebufferId,
        wanted: &[Option<TextureId>],
    ) {
        let slots = wanted.len().max(self.attachments.len());
        self.attachments.resize(slots, None);

        for slot in 0..slots {
            let texture = wanted.get(slot).copied().flatten();
            if self.attachments[slot] != texture {
                device.attach_color(framebuffer, slot as u32, texture);
                self.attachments[slot] = texture;
            }
        }
        while self.attachments.last() == Some(&None) {
            self.attachments.pop();
        }
    }

    /// Forgets the binding and the framebuffer without device calls (context loss).
    pub fn forget(&mut self) {
        self.framebuffer = None;
        self.attachments.clear();
        self.targets.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::{DeviceCall, RecordingDevice};

    fn off(id: u32, w: u32, h: u32) -> RenderTarget {
        RenderTarget::offscreen(TextureId(id), w, h)
    }

    // ── validation ────────────────────────────────────────────────────────

    #[test]
    fn window_must_be_alone() {
        let caps = Capabilities::default();
        let err = validate_targets(&[RenderTarget::window(8, 8), off(1, 8, 8)], &caps);
        assert!(matches!(err, Err(RenderError::IncompatibleTarget(_))));
        assert!(validate_targets(&[RenderTarget::window(8, 8)], &caps).is_ok());
    }

    #[test]
    fn sizes_must_agree() {
        let caps = Capabilities::default();
        let err = validate_targets(&[off(1, 8, 8), off(2, 8, 4)], &caps);
        assert!(matches!(err, Err(RenderError::IncompatibleTarget(_))));
    }

    #[test]
    fn offscreen_needs_framebuffers() {
        let err = validate_targets(&[off(1, 8, 8)], &Capabilities::minimal());
        assert_eq!(err, Err(RenderError::Unsupported("off-screen render targets")));
    }

    #[test]
    fn target_count_bounded_by_draw_buffers() {
        let caps = Capabilities { max_draw_targets: 2, ..Capabilities::default() };
        let err = validate_targets(&[off(1, 8, 8), off(2, 8, 8), off(3, 8, 8)], &caps);
        assert!(matches!(err, Err(RenderError::IncompatibleTarget(_))));
    }

    // ── binding ───────────────────────────────────────────────────────────

    #[test]
    fn framebuffer_is_created_once() {
        let mut d = RecordingDevice::default();
        let mut cache = DestinationBindingCache::new();

        cache.bind(&mut d, &[off(1, 8, 8)]).unwrap();
        cache.bind(&mut d, &[off(2, 8, 8)]).unwrap();
        assert_eq!(d.count(|c| matches!(c, DeviceCall::CreateFramebuffer(_))), 1);
    }

    #[test]
    fn stale_slots_are_cleared() {
        let mut d = RecordingDevice::default();
        let mut cache = DestinationBindingCache::new();

        cache.bind(&mut d, &[off(1, 8, 8), off(2, 8, 8)]).unwrap();
        d.clear_calls();
        cache.bind(&mut d, &[off(3, 8, 8)]).unwrap();

        let attaches: Vec<_> = d
            .calls()
            .iter()
            .filter_map(|c| match c {
                DeviceCall::AttachColor { slot, texture, .. } => Some((*slot, *texture)),
                _ => None,
            })
            .collect();
        assert_eq!(attaches, vec![(0, Some(TextureId(3))), (1, None)]);
    }

    #[test]
    fn incomplete_framebuffer_restores_previous_binding() {
        let mut d = RecordingDevice::default();
        let mut cache = DestinationBindingCache::new();
        cache.bind(&mut d, &[off(1, 8, 8)]).unwrap();

        d.set_incomplete_framebuffers(true);
        let err = cache.bind(&mut d, &[off(2, 8, 8)]);
        assert!(matches!(err, Err(RenderError::IncompatibleTarget(_))));
        assert_eq!(cache.current(), &[off(1, 8, 8)]);
        assert_eq!(
            d.calls()
                .iter()
                .rev()
                .find(|c| matches!(c, DeviceCall::AttachColor { .. })),
            Some(&DeviceCall::AttachColor {
                framebuffer: FramebufferId(1),
                slot: 0,
                texture: Some(TextureId(1)),
            })
        );
    }

    #[test]
    fn window_binding_uses_default_framebuffer() {
        let mut d = RecordingDevice::default();
        let mut cache = DestinationBindingCache::new();
        cache.bind(&mut d, &[RenderTarget::window(8, 8)]).unwrap();

        assert_eq!(d.calls(), &[DeviceCall::BindFramebuffer(None)]);
        assert!(cache.is_window_bound());
    }
}
