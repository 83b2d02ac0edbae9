use std::collections::HashMap;

use anyhow::{anyhow, Context, Result};
use wgpu::util::DeviceExt;
use winit::dpi::PhysicalSize;
use winit::window::Window;

use crate::device::{
    BufferMode, Capabilities, DrawCall, FramebufferId, FramebufferStatus, GraphicsDevice, Ortho,
    ParamLocation, ProgramId, ShaderSource, TextureId, UniformValue, ViewportRect,
};
use crate::paint::{BlendMode, Rgba};
use crate::render::{RenderError, RendererConfig, Topology, Vertex};

use super::{FrameUnavailable, Gpu, GpuInit, SurfaceFrame};

const PRELUDE: &str = include_str!("shaders/prelude.wgsl");
const DEFAULT_PROGRAM: &str = include_str!("shaders/default.wgsl");
const EMPTY_PARAMS: &str = "struct Params {\n    unused: vec4<f32>,\n}\n";

/// Texture units visible to programs; one binding pair each in the prelude.
pub const MAX_UNITS: u32 = 8;
/// Parameter locations per program (`vec4<f32>` each).
pub const MAX_PARAMS: usize = 16;
const MAX_TARGETS: u32 = 4;

const OFFSCREEN_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;

// ── vertex layout ─────────────────────────────────────────────────────────

const VERTEX_ATTRS: [wgpu::VertexAttribute; 3] =
    wgpu::vertex_attr_array![0 => Float32x2, 1 => Float32x2, 2 => Unorm8x4];

fn vertex_layout() -> wgpu::VertexBufferLayout<'static> {
    wgpu::VertexBufferLayout {
        array_stride: std::mem::size_of::<Vertex>() as u64,
        step_mode: wgpu::VertexStepMode::Vertex,
        attributes: &VERTEX_ATTRS,
    }
}

// ── state mapping ─────────────────────────────────────────────────────────

fn blend_state(mode: BlendMode) -> Option<wgpu::BlendState> {
    use wgpu::{BlendComponent, BlendFactor, BlendOperation};

    let component = |src_factor, dst_factor| BlendComponent {
        src_factor,
        dst_factor,
        operation: BlendOperation::Add,
    };

    match mode {
        BlendMode::Alpha => Some(wgpu::BlendState {
            color: component(BlendFactor::SrcAlpha, BlendFactor::OneMinusSrcAlpha),
            alpha: component(BlendFactor::One, BlendFactor::OneMinusSrcAlpha),
        }),
        BlendMode::Multiply => Some(wgpu::BlendState {
            color: component(BlendFactor::Dst, BlendFactor::Zero),
            alpha: component(BlendFactor::DstAlpha, BlendFactor::Zero),
        }),
        BlendMode::Add => Some(wgpu::BlendState {
            color: component(BlendFactor::SrcAlpha, BlendFactor::One),
            alpha: component(BlendFactor::One, BlendFactor::One),
        }),
        BlendMode::None => None,
    }
}

fn primitive_topology(topology: Topology) -> wgpu::PrimitiveTopology {
    match topology {
        Topology::PointList => wgpu::PrimitiveTopology::PointList,
        Topology::LineList => wgpu::PrimitiveTopology::LineList,
        Topology::LineStrip => wgpu::PrimitiveTopology::LineStrip,
        Topology::TriangleList => wgpu::PrimitiveTopology::TriangleList,
        Topology::TriangleStrip => wgpu::PrimitiveTopology::TriangleStrip,
    }
}

/// Parameter names declared by `struct Params` in a program, in location order.
///
/// `Ok(None)` when the program declares no parameter block.
fn parse_params(code: &str) -> std::result::Result<Option<Vec<String>>, String> {
    let stripped: String = code
        .lines()
        .map(|l| l.split("//").next().unwrap_or(""))
        .collect::<Vec<_>>()
        .join("\n");

    let Some(start) = stripped.find("struct Params") else {
        return Ok(None);
    };
    let body = &stripped[start..];
    let (Some(open), Some(close)) = (body.find('{'), body.find('}')) else {
        return Err("malformed `struct Params`".to_string());
    };
    if close < open {
        return Err("malformed `struct Params`".to_string());
    }

    let mut names = Vec::new();
    for field in body[open + 1..close].split(',').map(str::trim).filter(|f| !f.is_empty()) {
        let Some((name, ty)) = field.split_once(':') else {
            return Err(format!("malformed parameter `{field}`"));
        };
        let ty: String = ty.chars().filter(|c| !c.is_whitespace()).collect();
        if ty != "vec4<f32>" && ty != "vec4f" {
            return Err(format!("parameter `{}` must be vec4<f32>, found {ty}", name.trim()));
        }
        names.push(name.trim().to_string());
    }

    if names.len() > MAX_PARAMS {
        return Err(format!("{} parameters declared, at most {MAX_PARAMS}", names.len()));
    }
    Ok(Some(names))
}

// ── resources ─────────────────────────────────────────────────────────────

struct GpuTexture {
    texture: wgpu::Texture,
    view: wgpu::TextureView,
    smooth: bool,
}

struct GpuProgram {
    module: wgpu::ShaderModule,
    params: Vec<String>,
}

struct Geometry {
    vertex: wgpu::Buffer,
    index: wgpu::Buffer,
}

#[derive(Debug, Clone, Eq, PartialEq, Hash)]
struct PipelineKey {
    program: Option<ProgramId>,
    blend: BlendMode,
    topology: Topology,
    formats: Vec<wgpu::TextureFormat>,
}

/// Color attachments of the current destination.
struct Destination {
    views: Vec<wgpu::TextureView>,
    formats: Vec<wgpu::TextureFormat>,
    size: (u32, u32),
}

/// [`GraphicsDevice`] over wgpu.
///
/// Every draw and clear is recorded into its own encoder and submitted right
/// away, so uniform writes made between two draws apply to the second one.
/// Window draws target a surface texture acquired on first use and presented
/// by [`present`](GraphicsDevice::present).
pub struct WgpuDevice<'w> {
    gpu: Gpu<'w>,
    caps: Capabilities,
    next_handle: u32,

    textures: HashMap<TextureId, GpuTexture>,
    /// Bound to units with no texture and to untextured draws.
    white: GpuTexture,
    /// Indexed by the `smooth` flag.
    samplers: [wgpu::Sampler; 2],
    units: [Option<TextureId>; MAX_UNITS as usize],

    programs: HashMap<ProgramId, GpuProgram>,
    default_module: wgpu::ShaderModule,
    current_program: Option<ProgramId>,
    params: [[f32; 4]; MAX_PARAMS],

    framebuffers: HashMap<FramebufferId, Vec<Option<TextureId>>>,
    bound_framebuffer: Option<FramebufferId>,

    bind_group_layout: wgpu::BindGroupLayout,
    pipeline_layout: wgpu::PipelineLayout,
    pipelines: HashMap<PipelineKey, wgpu::RenderPipeline>,

    projection_ubo: wgpu::Buffer,
    params_ubo: wgpu::Buffer,
    buffer_mode: BufferMode,
    geometry: Option<Geometry>,

    viewport: ViewportRect,
    scissor: Option<ViewportRect>,
    blend: BlendMode,
    clear_color: Rgba,

    frame: Option<SurfaceFrame>,
}

impl<'w> WgpuDevice<'w> {
    /// Creates the GPU context for `window` and the device on top of it.
    pub fn for_window(window: &'w Window, config: &RendererConfig) -> Result<Self> {
        let gpu = pollster::block_on(Gpu::new(window, GpuInit::with_vsync(config.vsync)))?;
        Self::new(gpu)
    }

    pub fn new(gpu: Gpu<'w>) -> Result<Self> {
        let limits = gpu.limits();
        let caps = Capabilities {
            has_shader_support: true,
            has_device_buffer_support: true,
            has_framebuffer_support: true,
            has_npot_support: true,
            max_texture_units: MAX_UNITS,
            max_draw_targets: limits.max_color_attachments.min(MAX_TARGETS),
        };

        let device = gpu.device();

        let (bind_group_layout, pipeline_layout) = create_layouts(device);

        let projection_ubo = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("lumen projection ubo"),
            contents: bytemuck::cast_slice(&Ortho::for_target(1, 1).to_matrix()),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });

        let params_ubo = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("lumen params ubo"),
            size: (MAX_PARAMS * std::mem::size_of::<[f32; 4]>()) as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let sampler = |filter: wgpu::FilterMode, label| {
            device.create_sampler(&wgpu::SamplerDescriptor {
                label: Some(label),
                address_mode_u: wgpu::AddressMode::ClampToEdge,
                address_mode_v: wgpu::AddressMode::ClampToEdge,
                mag_filter: filter,
                min_filter: filter,
                ..Default::default()
            })
        };
        let samplers = [
            sampler(wgpu::FilterMode::Nearest, "lumen nearest sampler"),
            sampler(wgpu::FilterMode::Linear, "lumen linear sampler"),
        ];

        let white = create_gpu_texture(device, 1, 1);
        gpu.queue().write_texture(
            white.texture.as_image_copy(),
            &[0xFF; 4],
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(4),
                rows_per_image: Some(1),
            },
            wgpu::Extent3d {
                width: 1,
                height: 1,
                depth_or_array_layers: 1,
            },
        );

        let default_source = program_source(None, DEFAULT_PROGRAM, true);
        let default_module = compile_checked(device, &pipeline_layout, &default_source)
            .map_err(|log| anyhow!(log))
            .context("built-in program failed to compile")?;

        let info = gpu.adapter_info();
        log::info!("wgpu device ready on {} ({:?}): {caps:?}", info.name, info.backend);

        Ok(Self {
            caps,
            next_handle: 1,
            textures: HashMap::new(),
            white,
            samplers,
            units: [None; MAX_UNITS as usize],
            programs: HashMap::new(),
            default_module,
            current_program: None,
            params: [[0.0; 4]; MAX_PARAMS],
            framebuffers: HashMap::new(),
            bound_framebuffer: None,
            bind_group_layout,
            pipeline_layout,
            pipelines: HashMap::new(),
            projection_ubo,
            params_ubo,
            buffer_mode: BufferMode::Device,
            geometry: None,
            viewport: ViewportRect::default(),
            scissor: None,
            blend: BlendMode::Alpha,
            clear_color: Rgba::BLACK,
            frame: None,
            gpu,
        })
    }

    pub fn gpu(&self) -> &Gpu<'w> {
        &self.gpu
    }

    /// Reconfigures the surface; an unpresented frame is discarded.
    pub fn resize(&mut self, size: PhysicalSize<u32>) {
        self.frame = None;
        self.gpu.resize(size);
    }

    fn handle(&mut self) -> u32 {
        let h = self.next_handle;
        self.next_handle += 1;
        h
    }

    /// Texture sampled through `unit`; the fallback when the unit is empty or
    /// holds a texture the bound framebuffer renders into.
    fn texture_for_unit(&self, unit: Option<u32>) -> &GpuTexture {
        let attached = self
            .bound_framebuffer
            .and_then(|fb| self.framebuffers.get(&fb))
            .map_or(&[][..], Vec::as_slice);
        sampled_texture(&self.units, unit, attached)
            .and_then(|t| self.textures.get(&t))
            .unwrap_or(&self.white)
    }

    fn sampler_for(&self, texture: &GpuTexture) -> &wgpu::Sampler {
        &self.samplers[texture.smooth as usize]
    }

    /// Attachments of the bound framebuffer, or the window frame (acquired lazily).
    fn destination(&mut self) -> Option<Destination> {
        match self.bound_framebuffer {
            Some(fb) => {
                let attachments = self.framebuffers.get(&fb)?;
                let textures: Vec<&GpuTexture> = attachments
                    .iter()
                    .map_while(|a| a.and_then(|t| self.textures.get(&t)))
                    .collect();
                let first = textures.first()?;
                Some(Destination {
                    size: (first.texture.width(), first.texture.height()),
                    formats: vec![OFFSCREEN_FORMAT; textures.len()],
                    views: textures.iter().map(|t| t.view.clone()).collect(),
                })
            }
            None => {
                if self.frame.is_none() {
                    match self.gpu.acquire_frame() {
                        Ok(frame) => self.frame = Some(frame),
                        Err(FrameUnavailable::Fatal) => {
                            log::error!("window surface out of memory; draw dropped");
                            return None;
                        }
                        Err(reason) => {
                            log::warn!("window frame unavailable ({reason:?}); draw skipped");
                            return None;
                        }
                    }
                }
                let frame = self.frame.as_ref()?;
                Some(Destination {
                    size: frame.size(),
                    formats: vec![self.gpu.surface_format()],
                    views: vec![frame.view.clone()],
                })
            }
        }
    }

    fn ensure_pipeline(&mut self, key: &PipelineKey) -> bool {
        if self.pipelines.contains_key(key) {
            return true;
        }

        let module = match key.program {
            None => &self.default_module,
            Some(p) => match self.programs.get(&p) {
                Some(program) => &program.module,
                None => {
                    log::warn!("draw with deleted program {p:?} ignored");
                    return false;
                }
            },
        };

        let pipeline = create_pipeline(self.gpu.device(), &self.pipeline_layout, module, key);
        self.pipelines.insert(key.clone(), pipeline);
        true
    }

    fn bind_group(&self, source_unit: Option<u32>) -> wgpu::BindGroup {
        let source = self.texture_for_unit(source_unit);

        let mut entries = vec![
            wgpu::BindGroupEntry {
                binding: 0,
                resource: self.projection_ubo.as_entire_binding(),
            },
            wgpu::BindGroupEntry {
                binding: 1,
                resource: self.params_ubo.as_entire_binding(),
            },
            wgpu::BindGroupEntry {
                binding: 2,
                resource: wgpu::BindingResource::TextureView(&source.view),
            },
            wgpu::BindGroupEntry {
                binding: 3,
                resource: wgpu::BindingResource::Sampler(self.sampler_for(source)),
            },
        ];
        for unit in 0..MAX_UNITS {
            let t = self.texture_for_unit(Some(unit));
            entries.push(wgpu::BindGroupEntry {
                binding: 4 + 2 * unit,
                resource: wgpu::BindingResource::TextureView(&t.view),
            });
            entries.push(wgpu::BindGroupEntry {
                binding: 5 + 2 * unit,
                resource: wgpu::BindingResource::Sampler(self.sampler_for(t)),
            });
        }

        self.gpu.device().create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("lumen bind group"),
            layout: &self.bind_group_layout,
            entries: &entries,
        })
    }
}

/// Texture a unit exposes to a draw.
///
/// A texture cannot be sampled and rendered into by the same pass, so one
/// attached to the destination reads as an empty unit.
fn sampled_texture(
    units: &[Option<TextureId>],
    unit: Option<u32>,
    attached: &[Option<TextureId>],
) -> Option<TextureId> {
    let texture = (*units.get(unit? as usize)?)?;
    (!attached.contains(&Some(texture))).then_some(texture)
}

/// Clamps `rect` to a `width` x `height` destination; `None` when nothing remains.
fn clamp_rect(rect: ViewportRect, (width, height): (u32, u32)) -> Option<(u32, u32, u32, u32)> {
    let x0 = rect.x.max(0) as u32;
    let y0 = rect.y.max(0) as u32;
    let x1 = ((rect.x as i64 + rect.width as i64).max(0) as u32).min(width);
    let y1 = ((rect.y as i64 + rect.height as i64).max(0) as u32).min(height);
    (x1 > x0 && y1 > y0).then(|| (x0, y0, x1 - x0, y1 - y0))
}

fn create_layouts(device: &wgpu::Device) -> (wgpu::BindGroupLayout, wgpu::PipelineLayout) {
    let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some("lumen bgl"),
        entries: &bind_group_layout_entries(),
    });
    let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
        label: Some("lumen pipeline layout"),
        bind_group_layouts: &[&bind_group_layout],
        immediate_size: 0,
    });
    (bind_group_layout, pipeline_layout)
}

fn bind_group_layout_entries() -> Vec<wgpu::BindGroupLayoutEntry> {
    let uniform = |binding| wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Uniform,
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    };
    let texture = |binding| wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::FRAGMENT,
        ty: wgpu::BindingType::Texture {
            sample_type: wgpu::TextureSampleType::Float { filterable: true },
            view_dimension: wgpu::TextureViewDimension::D2,
            multisampled: false,
        },
        count: None,
    };
    let sampler = |binding| wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::FRAGMENT,
        ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
        count: None,
    };

    let mut entries = vec![uniform(0), uniform(1), texture(2), sampler(3)];
    for unit in 0..MAX_UNITS {
        entries.push(texture(4 + 2 * unit));
        entries.push(sampler(5 + 2 * unit));
    }
    entries
}

fn create_gpu_texture(device: &wgpu::Device, width: u32, height: u32) -> GpuTexture {
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some("lumen texture"),
        size: wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: OFFSCREEN_FORMAT,
        usage: wgpu::TextureUsages::TEXTURE_BINDING
            | wgpu::TextureUsages::COPY_DST
            | wgpu::TextureUsages::COPY_SRC
            | wgpu::TextureUsages::RENDER_ATTACHMENT,
        view_formats: &[],
    });
    let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
    GpuTexture {
        texture,
        view,
        smooth: false,
    }
}

/// Copies the top-left `width` x `height` pixels of `texture` into a staging
/// buffer and waits for the copy, stripping row padding.
fn read_pixels(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    texture: &wgpu::Texture,
    width: u32,
    height: u32,
) -> std::result::Result<Vec<u8>, RenderError> {
    let row = width * 4;
    let align = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;
    let padded_row = row.div_ceil(align) * align;

    let staging = device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("lumen readback buffer"),
        size: padded_row as u64 * height as u64,
        usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
        mapped_at_creation: false,
    });

    let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
        label: Some("lumen readback encoder"),
    });
    encoder.copy_texture_to_buffer(
        texture.as_image_copy(),
        wgpu::TexelCopyBufferInfo {
            buffer: &staging,
            layout: wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(padded_row),
                rows_per_image: Some(height),
            },
        },
        wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        },
    );
    queue.submit(std::iter::once(encoder.finish()));

    let slice = staging.slice(..);
    let (tx, rx) = std::sync::mpsc::channel();
    slice.map_async(wgpu::MapMode::Read, move |result| {
        let _ = tx.send(result);
    });

    let lost = |what: String| RenderError::ResourceExhausted(format!("texture readback: {what}"));
    device
        .poll(wgpu::PollType::wait_indefinitely())
        .map_err(|e| lost(e.to_string()))?;
    rx.recv()
        .map_err(|e| lost(e.to_string()))?
        .map_err(|e| lost(e.to_string()))?;

    let mapped = slice.get_mapped_range();
    let pixels = mapped
        .chunks_exact(padded_row as usize)
        .flat_map(|line| &line[..row as usize])
        .copied()
        .collect();
    drop(mapped);
    staging.unmap();
    Ok(pixels)
}

/// Full module text: version line, prelude, parameter block, program body.
fn program_source(version: Option<&str>, code: &str, declares_params: bool) -> String {
    let mut source = String::with_capacity(PRELUDE.len() + code.len() + 64);
    if let Some(v) = version {
        source.push_str(v);
        source.push('\n');
    }
    source.push_str(PRELUDE);
    if !declares_params {
        source.push_str(EMPTY_PARAMS);
    }
    source.push_str(code);
    source
}

/// Compiles `source` and links a trial pipeline; returns the device log on failure.
fn compile_checked(
    device: &wgpu::Device,
    layout: &wgpu::PipelineLayout,
    source: &str,
) -> std::result::Result<wgpu::ShaderModule, String> {
    let scope = device.push_error_scope(wgpu::ErrorFilter::Validation);

    let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some("lumen program"),
        source: wgpu::ShaderSource::Wgsl(source.into()),
    });
    let info = pollster::block_on(module.get_compilation_info());
    let errors: Vec<String> = info
        .messages
        .iter()
        .filter(|m| matches!(m.message_type, wgpu::CompilationMessageType::Error))
        .map(|m| m.message.clone())
        .collect();

    if errors.is_empty() {
        let trial = PipelineKey {
            program: None,
            blend: BlendMode::Alpha,
            topology: Topology::TriangleList,
            formats: vec![OFFSCREEN_FORMAT],
        };
        create_pipeline(device, layout, &module, &trial);
    }

    let validation = pollster::block_on(scope.pop());
    if !errors.is_empty() {
        return Err(errors.join("\n"));
    }
    if let Some(err) = validation {
        return Err(err.to_string());
    }
    Ok(module)
}

fn create_pipeline(
    device: &wgpu::Device,
    layout: &wgpu::PipelineLayout,
    module: &wgpu::ShaderModule,
    key: &PipelineKey,
) -> wgpu::RenderPipeline {
    let targets: Vec<Option<wgpu::ColorTargetState>> = key
        .formats
        .iter()
        .map(|format| {
            Some(wgpu::ColorTargetState {
                format: *format,
                blend: blend_state(key.blend),
                write_mask: wgpu::ColorWrites::ALL,
            })
        })
        .collect();

    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some("lumen pipeline"),
        layout: Some(layout),

        vertex: wgpu::VertexState {
            module,
            entry_point: Some("vs_main"),
            compilation_options: Default::default(),
            buffers: &[vertex_layout()],
        },

        fragment: Some(wgpu::FragmentState {
            module,
            entry_point: Some("fs_main"),
            compilation_options: Default::default(),
            targets: &targets,
        }),

        primitive: wgpu::PrimitiveState {
            topology: primitive_topology(key.topology),
            strip_index_format: key.topology.is_strip().then_some(wgpu::IndexFormat::Uint16),
            front_face: wgpu::FrontFace::Ccw,
            cull_mode: None,
            polygon_mode: wgpu::PolygonMode::Fill,
            unclipped_depth: false,
            conservative: false,
        },

        depth_stencil: None,
        multisample: wgpu::MultisampleState::default(),
        multiview_mask: None,
        cache: None,
    })
}

impl GraphicsDevice for WgpuDevice<'_> {
    fn capabilities(&self) -> Capabilities {
        self.caps
    }

    // ── textures ──────────────────────────────────────────────────────────

    fn create_texture(&mut self, width: u32, height: u32) -> std::result::Result<TextureId, RenderError> {
        let max = self.gpu.limits().max_texture_dimension_2d;
        if width > max || height > max {
            return Err(RenderError::ResourceExhausted(format!(
                "texture {width}x{height} exceeds the device maximum of {max}"
            )));
        }

        let id = TextureId(self.handle());
        let texture = create_gpu_texture(self.gpu.device(), width, height);
        self.textures.insert(id, texture);
        Ok(id)
    }

    fn delete_texture(&mut self, texture: TextureId) {
        let Some(t) = self.textures.remove(&texture) else { return };
        for unit in self.units.iter_mut().filter(|u| **u == Some(texture)) {
            *unit = None;
        }
        for attachments in self.framebuffers.values_mut() {
            for a in attachments.iter_mut().filter(|a| **a == Some(texture)) {
                *a = None;
            }
        }
        t.texture.destroy();
    }

    fn upload_texture(&mut self, texture: TextureId, width: u32, height: u32, rgba: &[u8]) {
        let Some(t) = self.textures.get(&texture) else {
            log::warn!("upload to unknown texture {texture:?} ignored");
            return;
        };
        self.gpu.queue().write_texture(
            t.texture.as_image_copy(),
            rgba,
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(4 * width),
                rows_per_image: Some(height),
            },
            wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
        );
    }

    fn read_texture(
        &mut self,
        texture: TextureId,
        width: u32,
        height: u32,
    ) -> std::result::Result<Vec<u8>, RenderError> {
        let t = self
            .textures
            .get(&texture)
            .unwrap_or_else(|| panic!("read of unknown texture {texture:?}"));
        read_pixels(self.gpu.device(), self.gpu.queue(), &t.texture, width, height)
    }

    fn set_texture_filter(&mut self, texture: TextureId, smooth: bool) {
        if let Some(t) = self.textures.get_mut(&texture) {
            t.smooth = smooth;
        }
    }

    fn bind_texture(&mut self, unit: u32, texture: Option<TextureId>) {
        assert!(unit < MAX_UNITS, "texture unit {unit} out of range");
        self.units[unit as usize] = texture;
    }

    // ── geometry ──────────────────────────────────────────────────────────

    fn set_buffer_mode(&mut self, mode: BufferMode) {
        self.buffer_mode = mode;
        self.geometry = None;
    }

    fn upload_geometry(&mut self, vertices: &[Vertex], indices: &[u16]) {
        // Buffer copies must be 4-byte aligned.
        let mut padded = indices.to_vec();
        if padded.len() % 2 == 1 {
            padded.push(0);
        }
        let vertex_bytes: &[u8] = bytemuck::cast_slice(vertices);
        let index_bytes: &[u8] = bytemuck::cast_slice(&padded);

        let device = self.gpu.device();
        let reuse = self.buffer_mode == BufferMode::Device
            && self.geometry.as_ref().is_some_and(|g| {
                g.vertex.size() >= vertex_bytes.len() as u64 && g.index.size() >= index_bytes.len() as u64
            });

        if reuse {
            if let Some(g) = &self.geometry {
                self.gpu.queue().write_buffer(&g.vertex, 0, vertex_bytes);
                self.gpu.queue().write_buffer(&g.index, 0, index_bytes);
            }
            return;
        }

        let geometry = match self.buffer_mode {
            BufferMode::Client => Geometry {
                vertex: device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                    label: Some("lumen client vbo"),
                    contents: vertex_bytes,
                    usage: wgpu::BufferUsages::VERTEX,
                }),
                index: device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                    label: Some("lumen client ibo"),
                    contents: index_bytes,
                    usage: wgpu::BufferUsages::INDEX,
                }),
            },
            BufferMode::Device => {
                let buffer = |label, len: usize, usage| {
                    device.create_buffer(&wgpu::BufferDescriptor {
                        label: Some(label),
                        size: (len as u64).next_power_of_two().max(256),
                        usage: usage | wgpu::BufferUsages::COPY_DST,
                        mapped_at_creation: false,
                    })
                };
                let g = Geometry {
                    vertex: buffer("lumen vbo", vertex_bytes.len(), wgpu::BufferUsages::VERTEX),
                    index: buffer("lumen ibo", index_bytes.len(), wgpu::BufferUsages::INDEX),
                };
                self.gpu.queue().write_buffer(&g.vertex, 0, vertex_bytes);
                self.gpu.queue().write_buffer(&g.index, 0, index_bytes);
                g
            }
        };
        self.geometry = Some(geometry);
    }

    fn draw_indexed(&mut self, call: &DrawCall) {
        if self.geometry.is_none() || call.index_count == 0 {
            return;
        }
        let Some(dest) = self.destination() else { return };

        let Some(viewport) = clamp_rect(self.viewport, dest.size) else { return };
        let scissor = match self.scissor {
            Some(clip) => match clamp_rect(clip, dest.size) {
                Some(s) => s,
                None => return,
            },
            None => (0, 0, dest.size.0, dest.size.1),
        };

        let key = PipelineKey {
            program: self.current_program,
            blend: self.blend,
            topology: call.topology,
            formats: dest.formats.clone(),
        };
        if !self.ensure_pipeline(&key) {
            return;
        }

        self.gpu
            .queue()
            .write_buffer(&self.params_ubo, 0, bytemuck::cast_slice(&self.params));
        let bind_group = self.bind_group(call.source_unit);

        let (Some(pipeline), Some(geometry)) = (self.pipelines.get(&key), self.geometry.as_ref()) else {
            return;
        };

        let mut encoder = self
            .gpu
            .device()
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("lumen draw encoder"),
            });
        {
            let attachments: Vec<Option<wgpu::RenderPassColorAttachment>> = dest
                .views
                .iter()
                .map(|view| {
                    Some(wgpu::RenderPassColorAttachment {
                        view,
                        resolve_target: None,
                        ops: wgpu::Operations {
                            load: wgpu::LoadOp::Load,
                            store: wgpu::StoreOp::Store,
                        },
                        depth_slice: None,
                    })
                })
                .collect();

            let mut rpass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("lumen draw pass"),
                color_attachments: &attachments,
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
                multiview_mask: None,
            });

            let (vx, vy, vw, vh) = viewport;
            rpass.set_viewport(vx as f32, vy as f32, vw as f32, vh as f32, 0.0, 1.0);
            let (sx, sy, sw, sh) = scissor;
            rpass.set_scissor_rect(sx, sy, sw, sh);

            rpass.set_pipeline(pipeline);
            rpass.set_bind_group(0, &bind_group, &[]);
            rpass.set_vertex_buffer(0, geometry.vertex.slice(..));
            rpass.set_index_buffer(geometry.index.slice(..), wgpu::IndexFormat::Uint16);
            rpass.draw_indexed(0..call.index_count, 0, 0..1);
        }
        self.gpu.queue().submit(std::iter::once(encoder.finish()));
    }

    // ── programs ──────────────────────────────────────────────────────────

    fn create_program(&mut self, source: &ShaderSource<'_>) -> std::result::Result<ProgramId, String> {
        let declared = parse_params(source.code)?;
        let text = program_source(source.version, source.code, declared.is_some());
        let module = compile_checked(self.gpu.device(), &self.pipeline_layout, &text)?;

        let id = ProgramId(self.handle());
        self.programs.insert(
            id,
            GpuProgram {
                module,
                params: declared.unwrap_or_default(),
            },
        );
        Ok(id)
    }

    fn delete_program(&mut self, program: ProgramId) {
        self.programs.remove(&program);
        self.pipelines.retain(|k, _| k.program != Some(program));
        if self.current_program == Some(program) {
            self.current_program = None;
        }
    }

    fn use_program(&mut self, program: Option<ProgramId>) {
        if self.current_program != program {
            self.params = [[0.0; 4]; MAX_PARAMS];
        }
        self.current_program = program;
    }

    fn uniform_location(&mut self, program: ProgramId, name: &str) -> Option<ParamLocation> {
        self.programs
            .get(&program)?
            .params
            .iter()
            .position(|p| p == name)
            .map(|i| ParamLocation(i as i32))
    }

    fn set_uniform(&mut self, location: ParamLocation, value: UniformValue) {
        let Some(slot) = usize::try_from(location.0).ok().and_then(|i| self.params.get_mut(i)) else {
            debug_assert!(false, "parameter location {location:?} out of range");
            return;
        };
        *slot = match value {
            UniformValue::Float(v) => [v, 0.0, 0.0, 0.0],
            UniformValue::Vec3([x, y, z]) => [x, y, z, 0.0],
            UniformValue::Unit(u) => [u as f32, 0.0, 0.0, 0.0],
        };
    }

    // ── framebuffers ──────────────────────────────────────────────────────

    fn create_framebuffer(&mut self) -> std::result::Result<FramebufferId, RenderError> {
        let id = FramebufferId(self.handle());
        self.framebuffers.insert(id, Vec::new());
        Ok(id)
    }

    fn delete_framebuffer(&mut self, framebuffer: FramebufferId) {
        self.framebuffers.remove(&framebuffer);
        if self.bound_framebuffer == Some(framebuffer) {
            self.bound_framebuffer = None;
        }
    }

    fn bind_framebuffer(&mut self, framebuffer: Option<FramebufferId>) {
        self.bound_framebuffer = framebuffer;
    }

    fn attach_color(&mut self, framebuffer: FramebufferId, slot: u32, texture: Option<TextureId>) {
        assert!(slot < self.caps.max_draw_targets, "attachment slot {slot} out of range");
        let Some(attachments) = self.framebuffers.get_mut(&framebuffer) else { return };
        let slot = slot as usize;
        if attachments.len() <= slot {
            attachments.resize(slot + 1, None);
        }
        attachments[slot] = texture;
        while attachments.last() == Some(&None) {
            attachments.pop();
        }
    }

    fn framebuffer_status(&mut self, framebuffer: FramebufferId) -> FramebufferStatus {
        let Some(attachments) = self.framebuffers.get(&framebuffer) else {
            return FramebufferStatus::Incomplete;
        };

        let sizes: Option<Vec<(u32, u32)>> = attachments
            .iter()
            .map(|a| {
                a.and_then(|t| self.textures.get(&t))
                    .map(|t| (t.texture.width(), t.texture.height()))
            })
            .collect();

        match sizes {
            Some(sizes) if !sizes.is_empty() && sizes.iter().all(|s| *s == sizes[0]) => {
                FramebufferStatus::Complete
            }
            _ => FramebufferStatus::Incomplete,
        }
    }

    // ── fixed state ───────────────────────────────────────────────────────

    fn set_viewport(&mut self, viewport: ViewportRect) {
        self.viewport = viewport;
    }

    fn set_projection(&mut self, ortho: Ortho) {
        self.gpu
            .queue()
            .write_buffer(&self.projection_ubo, 0, bytemuck::cast_slice(&ortho.to_matrix()));
    }

    fn set_blend(&mut self, mode: BlendMode) {
        self.blend = mode;
    }

    fn set_scissor(&mut self, clip: Option<ViewportRect>) {
        self.scissor = clip;
    }

    fn set_clear_color(&mut self, color: Rgba) {
        self.clear_color = color;
    }

    fn clear(&mut self) {
        let Some(dest) = self.destination() else { return };
        let [r, g, b, a] = self.clear_color.to_f32();
        let color = wgpu::Color {
            r: r as f64,
            g: g as f64,
            b: b as f64,
            a: a as f64,
        };

        let mut encoder = self
            .gpu
            .device()
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("lumen clear encoder"),
            });
        {
            let attachments: Vec<Option<wgpu::RenderPassColorAttachment>> = dest
                .views
                .iter()
                .map(|view| {
                    Some(wgpu::RenderPassColorAttachment {
                        view,
                        resolve_target: None,
                        ops: wgpu::Operations {
                            load: wgpu::LoadOp::Clear(color),
                            store: wgpu::StoreOp::Store,
                        },
                        depth_slice: None,
                    })
                })
                .collect();

            let _rpass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("lumen clear pass"),
                color_attachments: &attachments,
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
                multiview_mask: None,
            });
        }
        self.gpu.queue().submit(std::iter::once(encoder.finish()));
    }

    fn present(&mut self) {
        if let Some(frame) = self.frame.take() {
            frame.present();
        }
    }
}
