use anyhow::{Context, Result};
use ouroboros::self_referencing;

use winit::application::ApplicationHandler;
use winit::dpi::LogicalSize;
use winit::event::WindowEvent;
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::window::{Window, WindowId};

use lumen_render::coords::{Transform2D, Vec2};
use lumen_render::device::gpu::WgpuDevice;
use lumen_render::device::ParamLocation;
use lumen_render::logging::{init_logging, LoggingConfig};
use lumen_render::paint::{BlendMode, Rgba, Smoothing};
use lumen_render::render::{BitmapId, ShaderDesc, ShaderId};
use lumen_render::{RenderError, Renderer, RendererConfig, Target};

const TINT_SHADER: &str = r#"
struct Params {
    tint: vec4<f32>,
}

@fragment
fn fs_main(in: VertexOut) -> @location(0) vec4<f32> {
    return sample_source(in.uv) * in.color * vec4<f32>(params.tint.rgb, 1.0);
}
"#;

const CHECKER_SIZE: u32 = 32;
const CANVAS_SIZE: u32 = 256;
const GRID: usize = 24;

#[self_referencing]
struct DemoWindow {
    window: Window,

    #[borrows(window)]
    #[not_covariant]
    renderer: Renderer<WgpuDevice<'this>>,
}

/// Resources created once the renderer exists.
struct Scene {
    checker: BitmapId,
    canvas: BitmapId,
    tint: ShaderId,
    tint_color: ParamLocation,
    frame: u64,
}

#[derive(Default)]
struct DemoApp {
    window: Option<DemoWindow>,
    scene: Option<Scene>,
    exit_requested: bool,
}

impl DemoApp {
    fn open(&mut self, event_loop: &ActiveEventLoop) -> Result<()> {
        let attrs = Window::default_attributes()
            .with_title("lumen")
            .with_inner_size(LogicalSize::new(960.0, 640.0));
        let window = event_loop
            .create_window(attrs)
            .context("failed to create window")?;

        let size = window.inner_size();
        let config = RendererConfig {
            screen_size: (size.width.max(1), size.height.max(1)),
            ..RendererConfig::default()
        };

        let mut entry = DemoWindowTryBuilder {
            window,
            renderer_builder: |w| {
                let device = WgpuDevice::for_window(w, &config)?;
                Ok::<_, anyhow::Error>(Renderer::new(device, config.clone())?)
            },
        }
        .try_build()?;

        let scene = entry.with_renderer_mut(|r| build_scene(r))?;
        self.window = Some(entry);
        self.scene = Some(scene);
        Ok(())
    }

    fn redraw(&mut self) {
        let (Some(entry), Some(scene)) = (self.window.as_mut(), self.scene.as_mut()) else {
            return;
        };
        if let Err(e) = entry.with_renderer_mut(|r| draw_frame(r, scene)) {
            log::error!("frame {} failed: {e}", scene.frame);
        }
        scene.frame += 1;
    }
}

fn build_scene<D: lumen_render::GraphicsDevice>(r: &mut Renderer<D>) -> Result<Scene, RenderError> {
    let checker = r.create_bitmap(CHECKER_SIZE, CHECKER_SIZE)?;
    let mut pixels = Vec::with_capacity((CHECKER_SIZE * CHECKER_SIZE * 4) as usize);
    for y in 0..CHECKER_SIZE {
        for x in 0..CHECKER_SIZE {
            let light = ((x / 8) + (y / 8)) % 2 == 0;
            let v = if light { 0xEE } else { 0x44 };
            pixels.extend_from_slice(&[v, v, v, 0xFF]);
        }
    }
    r.set_bitmap_data(checker, &pixels)?;

    let canvas = r.create_bitmap(CANVAS_SIZE, CANVAS_SIZE)?;

    let tint = r.create_shader(&ShaderDesc {
        code: TINT_SHADER.to_string(),
        uses_custom_params: true,
    })?;
    let tint_color = r
        .param_id(tint, "tint")
        .ok_or(RenderError::CompileFailure("tint shader lacks a `tint` parameter".into()))?;

    Ok(Scene {
        checker,
        canvas,
        tint,
        tint_color,
        frame: 0,
    })
}

fn draw_frame<D: lumen_render::GraphicsDevice>(
    r: &mut Renderer<D>,
    scene: &Scene,
) -> Result<(), RenderError> {
    let t = scene.frame as f32 / 60.0;

    // Off-screen pass: a pulsing target pattern.
    r.clear_bitmap(scene.canvas, Rgba::new(0x10, 0x14, 0x20, 0xFF))?;
    r.set_targets(&[Target::Bitmap(scene.canvas)])?;
    let center = Vec2::splat(CANVAS_SIZE as f32 / 2.0);
    for ring in 1..6 {
        let radius = ring as f32 * 20.0 + 6.0 * (t * 2.0 + ring as f32).sin();
        r.draw_circle(center, radius, Rgba::new(0x60, 0xC0, 0xFF, 0xC0), false)?;
    }
    r.draw_line(Vec2::zero(), Vec2::splat(CANVAS_SIZE as f32), Rgba::WHITE)?;

    // Window pass.
    r.set_targets(&[Target::Window])?;
    r.clear(Rgba::new(0x20, 0x20, 0x28, 0xFF))?;

    for i in 0..GRID * GRID {
        let (col, row) = ((i % GRID) as f32, (i / GRID) as f32);
        let transform = Transform2D::at(Vec2::new(16.0 + col * 24.0, 16.0 + row * 24.0))
            .with_scale(Vec2::splat(0.6))
            .with_rotation(t + i as f32 * 0.05)
            .with_pivot(Vec2::splat(16.0));
        r.draw_bitmap(
            scene.checker,
            &transform,
            Rgba::WHITE,
            Smoothing::On,
            BlendMode::Alpha,
        )?;
    }

    // The tint keeps queued geometry on start; submit the grid untinted first.
    r.flush()?;
    let phase = t.sin() * 0.5 + 0.5;
    r.set_shader_vec3(scene.tint, scene.tint_color, [1.0, phase, 1.0 - phase])?;
    r.start_shader(scene.tint)?;
    r.draw_bitmap(
        scene.canvas,
        &Transform2D::at(Vec2::new(620.0, 40.0)),
        Rgba::WHITE,
        Smoothing::Default,
        BlendMode::Alpha,
    )?;
    r.stop_shader(scene.tint)?;

    r.swap()
}

impl ApplicationHandler for DemoApp {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }
        if let Err(e) = self.open(event_loop) {
            log::error!("failed to open demo window: {e:#}");
            self.exit_requested = true;
            event_loop.exit();
        }
    }

    fn about_to_wait(&mut self, event_loop: &ActiveEventLoop) {
        if self.exit_requested {
            event_loop.exit();
            return;
        }
        event_loop.set_control_flow(ControlFlow::Wait);
        if let Some(entry) = &self.window {
            entry.with_window(|w| w.request_redraw());
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        match event {
            WindowEvent::CloseRequested => {
                self.scene = None;
                self.window = None;
                self.exit_requested = true;
                event_loop.exit();
            }
            WindowEvent::Resized(size) => {
                if size.width == 0 || size.height == 0 {
                    return;
                }
                if let Some(entry) = self.window.as_mut() {
                    let resized = entry.with_renderer_mut(|r| {
                        r.device_mut().resize(size);
                        r.resize_screen(size.width, size.height)
                    });
                    if let Err(e) = resized {
                        log::error!("resize to {}x{} failed: {e}", size.width, size.height);
                    }
                }
            }
            WindowEvent::RedrawRequested => self.redraw(),
            _ => {}
        }
    }
}

fn main() -> Result<()> {
    init_logging(LoggingConfig::default());

    let event_loop = EventLoop::new().context("failed to create winit EventLoop")?;
    let mut app = DemoApp::default();
    event_loop
        .run_app(&mut app)
        .context("winit event loop terminated with error")?;
    Ok(())
}
