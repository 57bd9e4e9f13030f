// SPDX-License-Identifier: MPL-2.0
//! YUV→RGB conversion programs and the plane textures they sample.
//!
//! One WGSL module carries a shared full-screen vertex stage and one
//! fragment entry point per chroma layout; [`YuvRenderer::init`] builds the
//! pipeline for the layout in use. Plane textures allocate lazily on first
//! upload and are reused in place afterwards, so steady-state playback does
//! no GPU allocation at all.

use crate::media::ChromaLayout;

/// Texture slot of the luma plane.
pub const PLANE_LUMA: usize = 0;
/// Texture slot of the U plane (or the interleaved UV/VU plane).
pub const PLANE_CHROMA_A: usize = 1;
/// Texture slot of the V plane (planar layout only).
pub const PLANE_CHROMA_B: usize = 2;

struct PlaneTexture {
    texture: wgpu::Texture,
    view: wgpu::TextureView,
    width: u32,
    height: u32,
    two_channel: bool,
}

struct RenderState {
    pipeline: wgpu::RenderPipeline,
    bind_group_layout: wgpu::BindGroupLayout,
    sampler: wgpu::Sampler,
    layout: ChromaLayout,
    planes: [Option<PlaneTexture>; 3],
    /// Rebuilt whenever a plane texture is (re)allocated.
    bind_group: Option<wgpu::BindGroup>,
}

/// Chroma-conversion renderer targeting one surface format.
///
/// All methods take `&mut self`; the owning presenter serializes access.
#[derive(Default)]
pub struct YuvRenderer {
    state: Option<RenderState>,
}

fn fragment_entry(layout: ChromaLayout) -> &'static str {
    match layout {
        ChromaLayout::Yuv420p => "fs_yuv420p",
        ChromaLayout::Nv12 => "fs_nv12",
        ChromaLayout::Nv21 => "fs_nv21",
    }
}

impl YuvRenderer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Compiles the conversion program for `layout` and builds the pipeline
    /// rendering to `format`. Any prior program and textures are dropped
    /// first.
    pub fn init(
        &mut self,
        device: &wgpu::Device,
        format: wgpu::TextureFormat,
        layout: ChromaLayout,
    ) {
        self.close();

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("yuv shader"),
            source: wgpu::ShaderSource::Wgsl(YUV_SHADER.into()),
        });

        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("yuv sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        });

        let texture_entry = |binding| wgpu::BindGroupLayoutEntry {
            binding,
            visibility: wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Texture {
                sample_type: wgpu::TextureSampleType::Float { filterable: true },
                view_dimension: wgpu::TextureViewDimension::D2,
                multisampled: false,
            },
            count: None,
        };
        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("yuv bind group layout"),
            entries: &[
                texture_entry(0),
                texture_entry(1),
                texture_entry(2),
                wgpu::BindGroupLayoutEntry {
                    binding: 3,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
            ],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("yuv pipeline layout"),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });

        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("yuv render pipeline"),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: Some("vs_main"),
                buffers: &[],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: Some(fragment_entry(layout)),
                targets: &[Some(wgpu::ColorTargetState {
                    format,
                    blend: Some(wgpu::BlendState::REPLACE),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleStrip,
                strip_index_format: None,
                front_face: wgpu::FrontFace::Ccw,
                cull_mode: None,
                polygon_mode: wgpu::PolygonMode::Fill,
                unclipped_depth: false,
                conservative: false,
            },
            depth_stencil: None,
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
            cache: None,
        });

        self.state = Some(RenderState {
            pipeline,
            bind_group_layout,
            sampler,
            layout,
            planes: [None, None, None],
            bind_group: None,
        });
    }

    /// Uploads one plane, allocating its texture on first use.
    ///
    /// The texture at `index` is reallocated when the dimensions or channel
    /// count change (a new source resolution); otherwise the upload goes to
    /// the existing texture in place. Undersized `data` is rejected with a
    /// log entry rather than a partial upload.
    pub fn upload_plane(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        index: usize,
        width: u32,
        height: u32,
        data: &[u8],
        two_channel: bool,
    ) {
        let Some(state) = self.state.as_mut() else {
            return;
        };
        if index >= state.planes.len() || width == 0 || height == 0 {
            return;
        }

        let bytes_per_pixel: u32 = if two_channel { 2 } else { 1 };
        let needed = (width * height * bytes_per_pixel) as usize;
        if data.len() < needed {
            log::warn!(
                "Plane {index} upload skipped: {} bytes for {width}x{height}x{bytes_per_pixel}",
                data.len()
            );
            return;
        }

        let stale = state.planes[index].as_ref().is_none_or(|plane| {
            plane.width != width || plane.height != height || plane.two_channel != two_channel
        });
        if stale {
            let format = if two_channel {
                wgpu::TextureFormat::Rg8Unorm
            } else {
                wgpu::TextureFormat::R8Unorm
            };
            let texture = device.create_texture(&wgpu::TextureDescriptor {
                label: Some("yuv plane texture"),
                size: wgpu::Extent3d {
                    width,
                    height,
                    depth_or_array_layers: 1,
                },
                mip_level_count: 1,
                sample_count: 1,
                dimension: wgpu::TextureDimension::D2,
                format,
                usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
                view_formats: &[],
            });
            let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
            state.planes[index] = Some(PlaneTexture {
                texture,
                view,
                width,
                height,
                two_channel,
            });
            state.bind_group = None;
        }

        if let Some(plane) = state.planes[index].as_ref() {
            queue.write_texture(
                wgpu::TexelCopyTextureInfo {
                    texture: &plane.texture,
                    mip_level: 0,
                    origin: wgpu::Origin3d::ZERO,
                    aspect: wgpu::TextureAspect::All,
                },
                &data[..needed],
                wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(width * bytes_per_pixel),
                    rows_per_image: Some(height),
                },
                wgpu::Extent3d {
                    width,
                    height,
                    depth_or_array_layers: 1,
                },
            );
        }
    }

    /// Issues the full-screen conversion draw into `target`.
    ///
    /// No-op until every plane the layout needs has been uploaded at least
    /// once.
    pub fn draw(&mut self, device: &wgpu::Device, queue: &wgpu::Queue, target: &wgpu::TextureView) {
        let Some(state) = self.state.as_mut() else {
            return;
        };

        if state.bind_group.is_none() {
            state.bind_group = build_bind_group(device, state);
        }
        let Some(bind_group) = state.bind_group.as_ref() else {
            return;
        };

        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("yuv draw"),
        });
        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("yuv render pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: target,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                        store: wgpu::StoreOp::Store,
                    },
                    depth_slice: None,
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });
            pass.set_pipeline(&state.pipeline);
            pass.set_bind_group(0, bind_group, &[]);
            pass.draw(0..4, 0..1);
        }
        queue.submit(Some(encoder.finish()));
    }

    /// Drops the program and every allocated texture; idempotent.
    pub fn close(&mut self) {
        self.state = None;
    }
}

/// Builds the bind group from the currently allocated planes, or `None`
/// while a required plane is missing. Semi-planar layouts bind the
/// interleaved chroma texture in both chroma slots; only the slots the
/// fragment program samples matter.
fn build_bind_group(device: &wgpu::Device, state: &RenderState) -> Option<wgpu::BindGroup> {
    let luma = state.planes[PLANE_LUMA].as_ref()?;
    let chroma_a = state.planes[PLANE_CHROMA_A].as_ref()?;
    let chroma_b = if state.layout.has_interleaved_chroma() {
        chroma_a
    } else {
        state.planes[PLANE_CHROMA_B].as_ref()?
    };

    Some(device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some("yuv bind group"),
        layout: &state.bind_group_layout,
        entries: &[
            wgpu::BindGroupEntry {
                binding: 0,
                resource: wgpu::BindingResource::TextureView(&luma.view),
            },
            wgpu::BindGroupEntry {
                binding: 1,
                resource: wgpu::BindingResource::TextureView(&chroma_a.view),
            },
            wgpu::BindGroupEntry {
                binding: 2,
                resource: wgpu::BindingResource::TextureView(&chroma_b.view),
            },
            wgpu::BindGroupEntry {
                binding: 3,
                resource: wgpu::BindingResource::Sampler(&state.sampler),
            },
        ],
    }))
}

/// WGSL for the conversion programs.
///
/// The vertex stage emits a full-screen triangle strip from the vertex
/// index alone; clip-space y runs bottom-up while image rows run top-down,
/// so the y mapping is flipped to land the first uploaded row at the top.
/// The fragment stages convert with the BT.601 coefficients and force the
/// alpha channel opaque.
const YUV_SHADER: &str = r#"
struct VertexOutput {
    @builtin(position) position: vec4<f32>,
    @location(0) tex_coord: vec2<f32>,
}

@vertex
fn vs_main(@builtin(vertex_index) vertex_index: u32) -> VertexOutput {
    let x = f32(vertex_index & 1u);        // 0, 1, 0, 1
    let y = f32(vertex_index >> 1u);       // 0, 0, 1, 1

    var output: VertexOutput;
    output.position = vec4<f32>(x * 2.0 - 1.0, 1.0 - y * 2.0, 0.0, 1.0);
    output.tex_coord = vec2<f32>(x, y);
    return output;
}

@group(0) @binding(0) var tex_y: texture_2d<f32>;
@group(0) @binding(1) var tex_u: texture_2d<f32>;
@group(0) @binding(2) var tex_v: texture_2d<f32>;
@group(0) @binding(3) var samp: sampler;

fn bt601(y: f32, u: f32, v: f32) -> vec4<f32> {
    let r = y + 1.13983 * (v - 0.5);
    let g = y - 0.39465 * (u - 0.5) - 0.58060 * (v - 0.5);
    let b = y + 2.03211 * (u - 0.5);
    return vec4<f32>(r, g, b, 1.0);
}

@fragment
fn fs_yuv420p(input: VertexOutput) -> @location(0) vec4<f32> {
    let y = textureSample(tex_y, samp, input.tex_coord).r;
    let u = textureSample(tex_u, samp, input.tex_coord).r;
    let v = textureSample(tex_v, samp, input.tex_coord).r;
    return bt601(y, u, v);
}

@fragment
fn fs_nv12(input: VertexOutput) -> @location(0) vec4<f32> {
    let y = textureSample(tex_y, samp, input.tex_coord).r;
    let uv = textureSample(tex_u, samp, input.tex_coord).rg;
    return bt601(y, uv.r, uv.g);
}

@fragment
fn fs_nv21(input: VertexOutput) -> @location(0) vec4<f32> {
    let y = textureSample(tex_y, samp, input.tex_coord).r;
    let vu = textureSample(tex_u, samp, input.tex_coord).rg;
    return bt601(y, vu.g, vu.r);
}
"#;
