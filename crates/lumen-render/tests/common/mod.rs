#![allow(dead_code)]

use lumen_render::coords::{Transform2D, Vec2};
use lumen_render::device::{Capabilities, RecordingDevice};
use lumen_render::logging::{init_logging, LoggingConfig};
use lumen_render::paint::{BlendMode, Rgba, Smoothing};
use lumen_render::render::BitmapId;
use lumen_render::{Renderer, RendererConfig};

pub fn renderer() -> Renderer<RecordingDevice> {
    renderer_with(Capabilities::default(), RendererConfig::default())
}

pub fn renderer_with(caps: Capabilities, config: RendererConfig) -> Renderer<RecordingDevice> {
    init_logging(LoggingConfig::for_tests());
    Renderer::new(RecordingDevice::new(caps), config).expect("renderer")
}

pub fn caps_with_units(units: u32) -> Capabilities {
    Capabilities {
        max_texture_units: units,
        ..Capabilities::default()
    }
}

/// Queues one quad of `bitmap` at `(x, 0)` with default state.
pub fn blit(r: &mut Renderer<RecordingDevice>, bitmap: BitmapId, x: f32) {
    r.draw_bitmap(
        bitmap,
        &Transform2D::at(Vec2::new(x, 0.0)),
        Rgba::WHITE,
        Smoothing::Default,
        BlendMode::Alpha,
    )
    .expect("draw_bitmap");
}

/// Creates a `w` x `h` bitmap.
pub fn bitmap(r: &mut Renderer<RecordingDevice>, w: u32, h: u32) -> BitmapId {
    r.create_bitmap(w, h).expect("create_bitmap")
}
