//! wgpu Renderer module
//!
//! Uploads the static meshes and the sky box texture once, then draws the
//! scene's per-eye draw commands side by side into the surface. Designated
//! GPU calls are wrapped in error scopes; a reported error is fatal.

use std::collections::HashMap;
use std::num::NonZeroU64;

use bytemuck::{Pod, Zeroable};
use log::{error, info, warn};
use wgpu::util::DeviceExt;
use wgpu::{
    BindGroup, BindGroupLayout, Buffer, Device, DeviceDescriptor, Instance, Queue,
    RenderPipeline, Surface, SurfaceConfiguration, TextureUsages, TextureView,
};

use crate::config::RenderConfig;
use crate::error::{Result, VrError};
use crate::found_model::IndexedMesh;
use crate::scene::{EyeFrame, MeshKind, MeshUniforms};
use crate::shaders::ShaderSet;
use crate::skybox::{self, MipLevel};
use crate::world_layout::{self, MeshData};

const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth24Plus;
const INITIAL_DRAW_SLOTS: usize = 8;

const POSITION_ATTRS: [wgpu::VertexAttribute; 1] = wgpu::vertex_attr_array![0 => Float32x3];
const NORMAL_ATTRS: [wgpu::VertexAttribute; 1] = wgpu::vertex_attr_array![1 => Float32x3];
const COLOR_ATTRS: [wgpu::VertexAttribute; 1] = wgpu::vertex_attr_array![2 => Float32x4];
const UV_ATTRS: [wgpu::VertexAttribute; 1] = wgpu::vertex_attr_array![1 => Float32x2];

// Uniforms shared by all programs
#[repr(C)]
#[derive(Clone, Copy, Pod, Zeroable)]
struct MeshUniformsRaw {
    model: [[f32; 4]; 4],
    model_view: [[f32; 4]; 4],
    model_view_projection: [[f32; 4]; 4],
    light_pos: [f32; 4], // xyz = light in eye space
}

impl From<&MeshUniforms> for MeshUniformsRaw {
    fn from(u: &MeshUniforms) -> Self {
        Self {
            model: u.model.to_cols_array_2d(),
            model_view: u.model_view.to_cols_array_2d(),
            model_view_projection: u.model_view_projection.to_cols_array_2d(),
            light_pos: u.light_pos.extend(1.0).to_array(),
        }
    }
}

/// Which vertex buffers feed a draw, one per attribute slot
struct VertexArray {
    buffers: Vec<usize>,
    vertex_count: u32,
    /// Index buffer and index count, for indexed meshes
    indices: Option<(usize, u32)>,
}

impl VertexArray {
    fn new(buffers: Vec<usize>, vertex_count: u32) -> Self {
        Self { buffers, vertex_count, indices: None }
    }
}

fn vertex_layout(
    stride: usize,
    attributes: &'static [wgpu::VertexAttribute],
) -> wgpu::VertexBufferLayout<'static> {
    wgpu::VertexBufferLayout {
        array_stride: stride as u64,
        step_mode: wgpu::VertexStepMode::Vertex,
        attributes,
    }
}

fn lit_layouts() -> [wgpu::VertexBufferLayout<'static>; 3] {
    [
        vertex_layout(12, &POSITION_ATTRS),
        vertex_layout(12, &NORMAL_ATTRS),
        vertex_layout(16, &COLOR_ATTRS),
    ]
}

fn skybox_layouts() -> [wgpu::VertexBufferLayout<'static>; 2] {
    [vertex_layout(12, &POSITION_ATTRS), vertex_layout(8, &UV_ATTRS)]
}

fn align_to(value: u64, alignment: u64) -> u64 {
    value.div_ceil(alignment) * alignment
}

fn push_error_scope(device: &Device) {
    device.push_error_scope(wgpu::ErrorFilter::OutOfMemory);
    device.push_error_scope(wgpu::ErrorFilter::Validation);
}

/// Pops the scopes pushed by [`push_error_scope`].
async fn check_gpu_error(device: &Device, label: &str) -> Result<()> {
    let validation = device.pop_error_scope().await;
    let out_of_memory = device.pop_error_scope().await;
    match validation.or(out_of_memory) {
        Some(err) => {
            let err = VrError::from_gpu(label, err);
            error!("{}", err);
            Err(err)
        }
        None => Ok(()),
    }
}

pub struct Renderer {
    surface: Surface<'static>,
    device: Device,
    queue: Queue,
    config: SurfaceConfiguration,
    depth_view: TextureView,
    clear_color: wgpu::Color,

    lit_pipeline: RenderPipeline,
    grid_pipeline: RenderPipeline,
    skybox_pipeline: RenderPipeline,

    // Per-draw uniforms at dynamic offsets
    uniform_buffer: Buffer,
    uniform_bind_group: BindGroup,
    uniform_bind_group_layout: BindGroupLayout,
    uniform_stride: u64,
    draw_slots: usize,

    skybox_bind_group: BindGroup,

    // Owns every vertex buffer; vertex arrays index into it
    buffers: Vec<Buffer>,
    vertex_arrays: HashMap<MeshKind, VertexArray>,
}

impl Renderer {
    pub async fn new(
        instance: &Instance,
        surface: Surface<'static>,
        width: u32,
        height: u32,
        render_config: &RenderConfig,
        found_model: Option<&IndexedMesh>,
    ) -> Result<Self> {
        let shaders = ShaderSet::load(render_config.shader_dir.as_deref())?;

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .ok_or(VrError::NoAdapter)?;

        let (device, queue) = adapter
            .request_device(&DeviceDescriptor::default(), None)
            .await?;

        let surface_caps = surface.get_capabilities(&adapter);
        let surface_format = surface_caps
            .formats
            .first()
            .copied()
            .ok_or(VrError::NoAdapter)?;

        let config = SurfaceConfiguration {
            usage: TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width: width.max(1),
            height: height.max(1),
            present_mode: wgpu::PresentMode::Fifo,
            alpha_mode: surface_caps.alpha_modes[0],
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &config);
        let depth_view = create_depth_view(&device, config.width, config.height);

        // --- Programs ---
        push_error_scope(&device);

        let uniform_bind_group_layout =
            device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("Mesh Uniforms Layout"),
                entries: &[wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: true,
                        min_binding_size: NonZeroU64::new(
                            std::mem::size_of::<MeshUniformsRaw>() as u64,
                        ),
                    },
                    count: None,
                }],
            });

        let skybox_bind_group_layout =
            device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("Skybox Texture Layout"),
                entries: &[
                    wgpu::BindGroupLayoutEntry {
                        binding: 0,
                        visibility: wgpu::ShaderStages::FRAGMENT,
                        ty: wgpu::BindingType::Texture {
                            multisampled: false,
                            view_dimension: wgpu::TextureViewDimension::D2,
                            sample_type: wgpu::TextureSampleType::Float { filterable: true },
                        },
                        count: None,
                    },
                    wgpu::BindGroupLayoutEntry {
                        binding: 1,
                        visibility: wgpu::ShaderStages::FRAGMENT,
                        ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                        count: None,
                    },
                ],
            });

        let light_module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Light Shader"),
            source: wgpu::ShaderSource::Wgsl(shaders.light.as_str().into()),
        });
        let skybox_module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Skybox Shader"),
            source: wgpu::ShaderSource::Wgsl(shaders.skybox.as_str().into()),
        });

        let lit_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Lit Pipeline Layout"),
            bind_group_layouts: &[&uniform_bind_group_layout],
            push_constant_ranges: &[],
        });
        let skybox_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Skybox Pipeline Layout"),
            bind_group_layouts: &[&uniform_bind_group_layout, &skybox_bind_group_layout],
            push_constant_ranges: &[],
        });

        let lit_pipeline = create_pipeline(
            &device,
            "Cube Pipeline",
            &lit_layout,
            &light_module,
            "fs_passthrough",
            &lit_layouts(),
            surface_format,
        );
        let grid_pipeline = create_pipeline(
            &device,
            "Floor Pipeline",
            &lit_layout,
            &light_module,
            "fs_grid",
            &lit_layouts(),
            surface_format,
        );
        let skybox_pipeline = create_pipeline(
            &device,
            "Skybox Pipeline",
            &skybox_layout,
            &skybox_module,
            "fs_main",
            &skybox_layouts(),
            surface_format,
        );
        check_gpu_error(&device, "mesh programs").await?;
        info!("Programs created");

        // --- Meshes ---
        push_error_scope(&device);
        let mut buffers = Vec::new();
        let mut vertex_arrays = upload_meshes(&device, &mut buffers);
        if let Some(model) = found_model.filter(|m| !m.is_empty()) {
            vertex_arrays.insert(MeshKind::FoundModel, upload_indexed(&device, &mut buffers, model));
        }
        check_gpu_error(&device, "mesh upload").await?;

        // --- Sky box texture ---
        push_error_scope(&device);
        let levels = skybox::skybox_texture(&mut rand::thread_rng());
        let skybox_view = upload_texture(&device, &queue, &levels);
        let skybox_sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("Skybox Sampler"),
            address_mode_u: wgpu::AddressMode::Repeat,
            address_mode_v: wgpu::AddressMode::Repeat,
            address_mode_w: wgpu::AddressMode::Repeat,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        });
        let skybox_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Skybox Bind Group"),
            layout: &skybox_bind_group_layout,
            entries: &[
                wgpu::BindGroupEntry { binding: 0, resource: wgpu::BindingResource::TextureView(&skybox_view) },
                wgpu::BindGroupEntry { binding: 1, resource: wgpu::BindingResource::Sampler(&skybox_sampler) },
            ],
        });
        check_gpu_error(&device, "skybox texture").await?;

        let uniform_stride = align_to(
            std::mem::size_of::<MeshUniformsRaw>() as u64,
            device.limits().min_uniform_buffer_offset_alignment as u64,
        );
        push_error_scope(&device);
        let (uniform_buffer, uniform_bind_group) = create_uniform_slots(
            &device,
            &uniform_bind_group_layout,
            uniform_stride,
            INITIAL_DRAW_SLOTS,
        );
        check_gpu_error(&device, "uniform buffer").await?;

        let [r, g, b, a] = render_config.clear_color;
        info!("Renderer initialized ({}x{}, {:?})", config.width, config.height, surface_format);

        Ok(Self {
            surface,
            device,
            queue,
            config,
            depth_view,
            clear_color: wgpu::Color { r, g, b, a },
            lit_pipeline,
            grid_pipeline,
            skybox_pipeline,
            uniform_buffer,
            uniform_bind_group,
            uniform_bind_group_layout,
            uniform_stride,
            draw_slots: INITIAL_DRAW_SLOTS,
            skybox_bind_group,
            buffers,
            vertex_arrays,
        })
    }

    /// Whether [`MeshKind::FoundModel`] draws have something to draw
    pub fn has_found_model(&self) -> bool {
        self.vertex_arrays.contains_key(&MeshKind::FoundModel)
    }

    pub fn size(&self) -> (u32, u32) {
        (self.config.width, self.config.height)
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        if width > 0 && height > 0 {
            self.config.width = width;
            self.config.height = height;
            self.surface.configure(&self.device, &self.config);
            self.depth_view = create_depth_view(&self.device, width, height);
        }
    }

    /// Draws every eye's commands into its viewport and presents.
    pub fn render(&mut self, eyes: &[EyeFrame]) -> Result<()> {
        let output = match self.surface.get_current_texture() {
            Ok(output) => output,
            Err(e) => {
                if let Some(fatal) = VrError::from_surface("acquiring frame", &e) {
                    error!("{}", fatal);
                    return Err(fatal);
                }
                warn!("Surface lost ({:?}), reconfiguring", e);
                self.surface.configure(&self.device, &self.config);
                return Ok(());
            }
        };
        let view = output.texture.create_view(&wgpu::TextureViewDescriptor::default());

        push_error_scope(&self.device);

        let draw_count: usize = eyes.iter().map(|eye| eye.draws.len()).sum();
        self.ensure_draw_slots(draw_count);

        for (slot, draw) in eyes.iter().flat_map(|eye| &eye.draws).enumerate() {
            let raw = MeshUniformsRaw::from(&draw.uniforms);
            self.queue.write_buffer(
                &self.uniform_buffer,
                slot as u64 * self.uniform_stride,
                bytemuck::bytes_of(&raw),
            );
        }

        let mut encoder = self.device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("Render Encoder"),
        });

        {
            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Eye Render Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(self.clear_color),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &self.depth_view,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                timestamp_writes: None,
                occlusion_query_set: None,
            });

            let mut slot = 0u64;
            for eye in eyes {
                let vp = eye.eye.viewport;
                render_pass.set_viewport(
                    vp.x as f32,
                    vp.y as f32,
                    vp.width as f32,
                    vp.height as f32,
                    0.0,
                    1.0,
                );

                for draw in &eye.draws {
                    let offset = (slot * self.uniform_stride) as u32;
                    slot += 1;

                    let Some(vertex_array) = self.vertex_arrays.get(&draw.mesh) else {
                        continue;
                    };
                    let pipeline = match draw.mesh {
                        MeshKind::Cube | MeshKind::CubeFound | MeshKind::FoundModel => {
                            &self.lit_pipeline
                        }
                        MeshKind::Floor => &self.grid_pipeline,
                        MeshKind::Skybox => &self.skybox_pipeline,
                    };

                    render_pass.set_pipeline(pipeline);
                    render_pass.set_bind_group(0, &self.uniform_bind_group, &[offset]);
                    if draw.mesh == MeshKind::Skybox {
                        render_pass.set_bind_group(1, &self.skybox_bind_group, &[]);
                    }
                    for (index, &buffer) in vertex_array.buffers.iter().enumerate() {
                        render_pass.set_vertex_buffer(index as u32, self.buffers[buffer].slice(..));
                    }
                    match vertex_array.indices {
                        Some((buffer, count)) => {
                            render_pass.set_index_buffer(
                                self.buffers[buffer].slice(..),
                                wgpu::IndexFormat::Uint32,
                            );
                            render_pass.draw_indexed(0..count, 0, 0..1);
                        }
                        None => render_pass.draw(0..vertex_array.vertex_count, 0..1),
                    }
                }
            }
        }

        self.queue.submit(std::iter::once(encoder.finish()));
        output.present();

        pollster::block_on(check_gpu_error(&self.device, "drawing eyes"))
    }

    fn ensure_draw_slots(&mut self, needed: usize) {
        if needed <= self.draw_slots {
            return;
        }
        let slots = needed.next_power_of_two();
        let (buffer, bind_group) = create_uniform_slots(
            &self.device,
            &self.uniform_bind_group_layout,
            self.uniform_stride,
            slots,
        );
        self.uniform_buffer = buffer;
        self.uniform_bind_group = bind_group;
        self.draw_slots = slots;
    }
}

fn create_pipeline(
    device: &Device,
    label: &str,
    layout: &wgpu::PipelineLayout,
    module: &wgpu::ShaderModule,
    fragment_entry: &str,
    buffers: &[wgpu::VertexBufferLayout],
    format: wgpu::TextureFormat,
) -> RenderPipeline {
    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some(label),
        layout: Some(layout),
        vertex: wgpu::VertexState {
            module,
            entry_point: Some("vs_main"),
            buffers,
            compilation_options: Default::default(),
        },
        fragment: Some(wgpu::FragmentState {
            module,
            entry_point: Some(fragment_entry),
            targets: &[Some(wgpu::ColorTargetState {
                format,
                blend: Some(wgpu::BlendState::REPLACE),
                write_mask: wgpu::ColorWrites::ALL,
            })],
            compilation_options: Default::default(),
        }),
        // No culling: the sky box is seen from inside
        primitive: wgpu::PrimitiveState::default(),
        depth_stencil: Some(wgpu::DepthStencilState {
            format: DEPTH_FORMAT,
            depth_write_enabled: true,
            depth_compare: wgpu::CompareFunction::Less,
            stencil: wgpu::StencilState::default(),
            bias: wgpu::DepthBiasState::default(),
        }),
        multisample: wgpu::MultisampleState::default(),
        multiview: None,
        cache: None,
    })
}

fn create_depth_view(device: &Device, width: u32, height: u32) -> TextureView {
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some("Depth Texture"),
        size: wgpu::Extent3d { width, height, depth_or_array_layers: 1 },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: DEPTH_FORMAT,
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
        view_formats: &[],
    });
    texture.create_view(&wgpu::TextureViewDescriptor::default())
}

fn create_uniform_slots(
    device: &Device,
    layout: &BindGroupLayout,
    stride: u64,
    slots: usize,
) -> (Buffer, BindGroup) {
    let buffer = device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("Mesh Uniforms Buffer"),
        size: stride * slots as u64,
        usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        mapped_at_creation: false,
    });
    let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some("Mesh Uniforms Bind Group"),
        layout,
        entries: &[wgpu::BindGroupEntry {
            binding: 0,
            resource: wgpu::BindingResource::Buffer(wgpu::BufferBinding {
                buffer: &buffer,
                offset: 0,
                size: NonZeroU64::new(std::mem::size_of::<MeshUniformsRaw>() as u64),
            }),
        }],
    });
    (buffer, bind_group)
}

fn create_vertex_buffer<T: Pod>(
    device: &Device,
    buffers: &mut Vec<Buffer>,
    label: &str,
    data: &[T],
) -> usize {
    buffers.push(device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
        label: Some(label),
        contents: bytemuck::cast_slice(data),
        usage: wgpu::BufferUsages::VERTEX,
    }));
    buffers.len() - 1
}

/// Static geometry: cube (two colour sets), floor, and the sky box.
fn upload_meshes(device: &Device, buffers: &mut Vec<Buffer>) -> HashMap<MeshKind, VertexArray> {
    let cube: MeshData = world_layout::cube();
    let floor: MeshData = world_layout::floor();

    let cube_positions = create_vertex_buffer(device, buffers, "Cube Positions", &cube.positions);
    let cube_normals = create_vertex_buffer(device, buffers, "Cube Normals", &cube.normals);
    let cube_colors = create_vertex_buffer(device, buffers, "Cube Colors", &cube.colors);
    let cube_found_colors = create_vertex_buffer(
        device,
        buffers,
        "Cube Found Colors",
        &world_layout::cube_found_colors(),
    );
    let cube_uvs = create_vertex_buffer(
        device,
        buffers,
        "Cube UVs",
        &world_layout::cube_tex_coords(&cube),
    );

    let floor_positions = create_vertex_buffer(device, buffers, "Floor Positions", &floor.positions);
    let floor_normals = create_vertex_buffer(device, buffers, "Floor Normals", &floor.normals);
    let floor_colors = create_vertex_buffer(device, buffers, "Floor Colors", &floor.colors);

    let cube_count = cube.vertex_count() as u32;
    let mut arrays = HashMap::new();
    arrays.insert(
        MeshKind::Cube,
        VertexArray::new(vec![cube_positions, cube_normals, cube_colors], cube_count),
    );
    arrays.insert(
        MeshKind::CubeFound,
        VertexArray::new(vec![cube_positions, cube_normals, cube_found_colors], cube_count),
    );
    arrays.insert(
        MeshKind::Floor,
        VertexArray::new(
            vec![floor_positions, floor_normals, floor_colors],
            floor.vertex_count() as u32,
        ),
    );
    arrays.insert(
        MeshKind::Skybox,
        VertexArray::new(vec![cube_positions, cube_uvs], cube_count),
    );

    info!("Uploaded {} vertex buffers", buffers.len());
    arrays
}

fn upload_indexed(device: &Device, buffers: &mut Vec<Buffer>, model: &IndexedMesh) -> VertexArray {
    let positions = create_vertex_buffer(device, buffers, "Model Positions", &model.mesh.positions);
    let normals = create_vertex_buffer(device, buffers, "Model Normals", &model.mesh.normals);
    let colors = create_vertex_buffer(device, buffers, "Model Colors", &model.mesh.colors);

    buffers.push(device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
        label: Some("Model Indices"),
        contents: bytemuck::cast_slice(&model.indices),
        usage: wgpu::BufferUsages::INDEX,
    }));
    let index_buffer = buffers.len() - 1;

    VertexArray {
        buffers: vec![positions, normals, colors],
        vertex_count: model.mesh.vertex_count() as u32,
        indices: Some((index_buffer, model.indices.len() as u32)),
    }
}

fn upload_texture(device: &Device, queue: &Queue, levels: &[MipLevel]) -> TextureView {
    let (width, height) = levels.first().map(|l| (l.width, l.height)).unwrap_or((1, 1));
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some("Skybox Texture"),
        size: wgpu::Extent3d { width, height, depth_or_array_layers: 1 },
        mip_level_count: levels.len().max(1) as u32,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: wgpu::TextureFormat::Rgba8Unorm,
        usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
        view_formats: &[],
    });

    for (mip, level) in levels.iter().enumerate() {
        queue.write_texture(
            wgpu::ImageCopyTexture {
                texture: &texture,
                mip_level: mip as u32,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            &level.data,
            wgpu::ImageDataLayout {
                offset: 0,
                bytes_per_row: Some(level.width * 4),
                rows_per_image: Some(level.height),
            },
            wgpu::Extent3d { width: level.width, height: level.height, depth_or_array_layers: 1 },
        );
    }

    texture.create_view(&wgpu::TextureViewDescriptor::default())
}
