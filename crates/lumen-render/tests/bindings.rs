mod common;

use common::{bitmap, blit, caps_with_units, renderer, renderer_with};
use lumen_render::device::{BufferMode, Capabilities, DeviceCall, Ortho, ViewportRect};
use lumen_render::paint::Rgba;
use lumen_render::render::RenderTarget;
use lumen_render::{RenderError, RendererConfig, Target};

// ── destinations ──────────────────────────────────────────────────────────

#[test]
fn construction_binds_the_window() {
    let r = renderer();
    assert_eq!(r.bound_targets(), &[RenderTarget::window(800, 600)]);
    assert!(r.device().calls().contains(&DeviceCall::BindFramebuffer(None)));
    assert!(
        r.device()
            .calls()
            .contains(&DeviceCall::SetViewport(ViewportRect::new(0, 0, 800, 600)))
    );
    assert!(
        r.device()
            .calls()
            .contains(&DeviceCall::SetProjection(Ortho::for_target(800, 600)))
    );
}

#[test]
fn reselecting_bound_targets_costs_nothing() {
    let mut r = renderer();
    let a = bitmap(&mut r, 64, 32);

    r.set_targets(&[Target::Bitmap(a)]).unwrap();
    r.device_mut().clear_calls();
    r.set_targets(&[Target::Bitmap(a)]).unwrap();
    assert_eq!(r.device().count(DeviceCall::is_framebuffer_call), 0);

    r.set_targets(&[Target::Window]).unwrap();
    r.device_mut().clear_calls();
    r.set_targets(&[Target::Window]).unwrap();
    assert!(r.device().calls().is_empty());
}

#[test]
fn offscreen_target_uses_one_lazily_created_framebuffer() {
    let mut r = renderer();
    let a = bitmap(&mut r, 64, 32);
    let b = bitmap(&mut r, 64, 32);
    r.device_mut().clear_calls();

    r.set_targets(&[Target::Bitmap(a)]).unwrap();
    r.set_targets(&[Target::Bitmap(b)]).unwrap();
    r.set_targets(&[Target::Bitmap(a), Target::Bitmap(b)]).unwrap();

    let created = r
        .device()
        .count(|c| matches!(c, DeviceCall::CreateFramebuffer(_)));
    assert_eq!(created, 1);
    assert_eq!(r.bound_targets().len(), 2);
    assert_eq!(r.state().viewport.get(), Some(ViewportRect::new(0, 0, 64, 32)));
}

#[test]
fn shrinking_the_target_list_clears_stale_attachments() {
    let mut r = renderer();
    let a = bitmap(&mut r, 16, 16);
    let b = bitmap(&mut r, 16, 16);
    r.set_targets(&[Target::Bitmap(a), Target::Bitmap(b)]).unwrap();
    r.device_mut().clear_calls();

    r.set_targets(&[Target::Bitmap(b)]).unwrap();
    let texture_b = r.bitmap(b).unwrap().texture;
    let fb = r
        .device()
        .calls()
        .iter()
        .find_map(|c| match c {
            DeviceCall::AttachColor { framebuffer, .. } => Some(*framebuffer),
            _ => None,
        })
        .unwrap();
    assert!(r.device().calls().contains(&DeviceCall::AttachColor {
        framebuffer: fb,
        slot: 0,
        texture: Some(texture_b),
    }));
    assert!(r.device().calls().contains(&DeviceCall::AttachColor {
        framebuffer: fb,
        slot: 1,
        texture: None,
    }));
}

#[test]
fn target_change_flushes_pending_geometry_first() {
    let mut r = renderer();
    let a = bitmap(&mut r, 16, 16);
    let canvas = bitmap(&mut r, 32, 32);
    blit(&mut r, a, 0.0);
    r.device_mut().clear_calls();

    r.set_targets(&[Target::Bitmap(canvas)]).unwrap();
    let calls = r.device().calls();
    let draw = calls.iter().position(|c| matches!(c, DeviceCall::DrawIndexed(_))).unwrap();
    let bind = calls.iter().position(DeviceCall::is_framebuffer_call).unwrap();
    assert!(draw < bind);
}

#[test]
fn window_cannot_be_combined_with_bitmaps() {
    let mut r = renderer();
    let a = bitmap(&mut r, 16, 16);
    let err = r.set_targets(&[Target::Window, Target::Bitmap(a)]).unwrap_err();
    assert!(matches!(err, RenderError::IncompatibleTarget(_)));
    assert_eq!(r.bound_targets(), &[RenderTarget::window(800, 600)]);
}

#[test]
fn mismatched_target_sizes_are_rejected() {
    let mut r = renderer();
    let a = bitmap(&mut r, 16, 16);
    let b = bitmap(&mut r, 32, 16);
    let err = r.set_targets(&[Target::Bitmap(a), Target::Bitmap(b)]).unwrap_err();
    assert!(matches!(err, RenderError::IncompatibleTarget(_)));
}

#[test]
fn too_many_targets_are_rejected() {
    let caps = Capabilities {
        max_draw_targets: 1,
        ..Capabilities::default()
    };
    let mut r = renderer_with(caps, RendererConfig::default());
    let a = bitmap(&mut r, 16, 16);
    let b = bitmap(&mut r, 16, 16);
    let err = r.set_targets(&[Target::Bitmap(a), Target::Bitmap(b)]).unwrap_err();
    assert!(matches!(err, RenderError::IncompatibleTarget(_)));
}

#[test]
fn offscreen_targets_need_framebuffer_support() {
    let mut r = renderer_with(Capabilities::minimal(), RendererConfig::default());
    let a = bitmap(&mut r, 16, 16);
    let err = r.set_targets(&[Target::Bitmap(a)]).unwrap_err();
    assert!(matches!(err, RenderError::Unsupported(_)));
}

#[test]
fn incomplete_framebuffer_keeps_the_previous_binding() {
    let mut r = renderer();
    let a = bitmap(&mut r, 16, 16);
    r.device_mut().set_incomplete_framebuffers(true);

    let err = r.set_targets(&[Target::Bitmap(a)]).unwrap_err();
    assert!(matches!(err, RenderError::IncompatibleTarget(_)));
    assert_eq!(r.bound_targets(), &[RenderTarget::window(800, 600)]);
    assert_eq!(r.device().calls().last(), Some(&DeviceCall::BindFramebuffer(None)));

    r.device_mut().set_incomplete_framebuffers(false);
    r.set_targets(&[Target::Bitmap(a)]).unwrap();
    assert_eq!(r.bound_targets().len(), 1);
}

#[test]
fn deleting_a_bound_target_rebinds_the_window() {
    let mut r = renderer();
    let canvas = bitmap(&mut r, 32, 32);
    r.set_targets(&[Target::Bitmap(canvas)]).unwrap();

    r.delete_bitmap(canvas).unwrap();
    assert_eq!(r.bound_targets(), &[RenderTarget::window(800, 600)]);
    assert_eq!(r.state().viewport.get(), Some(ViewportRect::new(0, 0, 800, 600)));
}

#[test]
fn resizing_the_bound_window_updates_the_viewport() {
    let mut r = renderer();
    r.device_mut().clear_calls();
    r.resize_screen(1024, 768).unwrap();

    assert_eq!(r.bound_targets(), &[RenderTarget::window(1024, 768)]);
    assert_eq!(
        r.device().calls(),
        &[
            DeviceCall::SetViewport(ViewportRect::new(0, 0, 1024, 768)),
            DeviceCall::SetProjection(Ortho::for_target(1024, 768)),
        ]
    );
}

#[test]
fn resizing_while_offscreen_is_deferred() {
    let mut r = renderer();
    let canvas = bitmap(&mut r, 32, 32);
    r.set_targets(&[Target::Bitmap(canvas)]).unwrap();
    r.device_mut().clear_calls();

    r.resize_screen(1024, 768).unwrap();
    assert!(r.device().calls().is_empty());

    r.set_targets(&[Target::Window]).unwrap();
    assert_eq!(r.bound_targets(), &[RenderTarget::window(1024, 768)]);
}

// ── texture units ─────────────────────────────────────────────────────────

#[test]
fn least_recently_used_unit_is_evicted() {
    let mut r = renderer_with(caps_with_units(2), RendererConfig::default());
    let a = bitmap(&mut r, 8, 8);
    let b = bitmap(&mut r, 8, 8);
    let c = bitmap(&mut r, 8, 8);
    let ta = r.bitmap(a).unwrap().texture;
    let tb = r.bitmap(b).unwrap().texture;
    let tc = r.bitmap(c).unwrap().texture;

    for id in [a, b, c, a] {
        blit(&mut r, id, 0.0);
        r.flush().unwrap();
    }

    let units = r.texture_units();
    assert_eq!(units.unit_of(tc), Some(0));
    assert_eq!(units.unit_of(ta), Some(1));
    assert_eq!(units.unit_of(tb), None);
}

#[test]
fn resident_texture_is_not_rebound() {
    let mut r = renderer();
    let a = bitmap(&mut r, 8, 8);
    blit(&mut r, a, 0.0);
    r.flush().unwrap();
    r.device_mut().clear_calls();

    blit(&mut r, a, 0.0);
    r.flush().unwrap();
    assert_eq!(r.device().count(|c| matches!(c, DeviceCall::BindTexture { .. })), 0);
}

#[test]
fn released_unit_is_reused_before_evicting() {
    let mut r = renderer_with(caps_with_units(2), RendererConfig::default());
    let a = bitmap(&mut r, 8, 8);
    let b = bitmap(&mut r, 8, 8);
    let c = bitmap(&mut r, 8, 8);
    for id in [a, b] {
        blit(&mut r, id, 0.0);
        r.flush().unwrap();
    }

    // `a` is the oldest, but deleting `b` leaves its unit empty.
    r.delete_bitmap(b).unwrap();
    blit(&mut r, c, 0.0);
    r.flush().unwrap();

    let ta = r.bitmap(a).unwrap().texture;
    let tc = r.bitmap(c).unwrap().texture;
    assert_eq!(r.texture_units().unit_of(ta), Some(0));
    assert_eq!(r.texture_units().unit_of(tc), Some(1));
}

// ── frame ─────────────────────────────────────────────────────────────────

#[test]
fn clear_color_is_cached() {
    let mut r = renderer();
    r.device_mut().clear_calls();
    r.clear(Rgba::BLACK).unwrap();
    r.clear(Rgba::BLACK).unwrap();

    assert_eq!(
        r.device().calls(),
        &[DeviceCall::SetClearColor(Rgba::BLACK), DeviceCall::Clear, DeviceCall::Clear]
    );
}

#[test]
fn swap_flushes_then_presents() {
    let mut r = renderer();
    let a = bitmap(&mut r, 8, 8);
    blit(&mut r, a, 0.0);
    r.swap().unwrap();

    assert_eq!(r.device().draw_count(), 1);
    assert_eq!(r.device().calls().last(), Some(&DeviceCall::Present));
}

#[test]
fn discarded_state_is_reissued_on_next_submission() {
    let mut r = renderer();
    let a = bitmap(&mut r, 8, 8);
    blit(&mut r, a, 0.0);
    r.discard_device_state();
    assert!(r.batch().is_empty());

    r.device_mut().clear_calls();
    r.flush().unwrap();
    assert!(r.device().calls().is_empty(), "dropped geometry is never submitted");

    blit(&mut r, a, 0.0);
    r.flush().unwrap();
    let calls = r.device().calls();
    assert!(calls.contains(&DeviceCall::BindFramebuffer(None)));
    assert!(calls.iter().any(|c| matches!(c, DeviceCall::SetBufferMode(_))));
    assert!(calls.iter().any(|c| matches!(c, DeviceCall::SetTextureFilter { .. })));
    assert!(calls.iter().any(|c| matches!(c, DeviceCall::BindTexture { .. })));
    assert_eq!(r.device().draw_count(), 1);
}

#[test]
fn client_buffers_without_device_buffer_support() {
    let r = renderer_with(Capabilities::minimal(), RendererConfig::default());
    assert!(
        r.device()
            .calls()
            .contains(&DeviceCall::SetBufferMode(BufferMode::Client))
    );
}
