//! Rendering system: wgpu device, the four pass pipelines, and the fixed
//! per-frame stage sequence that composes them.

use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec3};
use wgpu::util::DeviceExt;

use crate::assets;
use crate::camera::CameraSystem;
use crate::caustics::CausticVertex;
use crate::params::{RenderConfig, SceneConstants};
use crate::wave::{SurfaceVertex, WaterGrid};

const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;
const CAUSTIC_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba16Float;

/// Pale sky color behind everything; the backdrop pass clears to this.
const CLEAR_COLOR: wgpu::Color = wgpu::Color {
    r: 0.8,
    g: 0.8,
    b: 1.0,
    a: 1.0,
};

/// The frame's pass sequence. The order is load-bearing: the caustic buffer
/// is written by `Caustics` and read by `Floor` and `Water`, and the
/// backdrop must be down before the depth-tested geometry composites over
/// it. `Present` is the terminal swap; the sequence restarts next frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineStage {
    Caustics,
    Backdrop,
    Floor,
    Water,
    Present,
}

impl PipelineStage {
    pub const SEQUENCE: [PipelineStage; 5] = [
        PipelineStage::Caustics,
        PipelineStage::Backdrop,
        PipelineStage::Floor,
        PipelineStage::Water,
        PipelineStage::Present,
    ];
}

/// Immutable snapshot of everything the passes read during one frame.
/// Computed once at frame start so every stage observes the same time and
/// camera.
#[derive(Debug, Clone, Copy)]
pub struct FrameContext {
    pub time: f32,
    pub view_proj: Mat4,
    /// Rotation-only view-projection for backdrop ray reconstruction
    pub backdrop_view_proj: Mat4,
    pub camera_position: Vec3,
}

impl FrameContext {
    pub fn new(time: f32, camera: &CameraSystem, config: &RenderConfig) -> Self {
        let (view_proj, backdrop_view_proj, camera_position) = camera.frame_matrices(config);
        Self {
            time,
            view_proj,
            backdrop_view_proj,
            camera_position,
        }
    }
}

/// Uniform block shared by the floor and water pipelines.
#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub struct SceneUniforms {
    pub view_proj: [[f32; 4]; 4],
    pub camera_pos: [f32; 3],
    pub time: f32,
    pub light_dir: [f32; 3],
    pub glossiness: f32,
    pub light_color: [f32; 3],
    pub roughness: f32,
    pub ambient: [f32; 3],
    pub _pad0: f32,
    pub floor_extent: [f32; 2],
    pub _pad1: [f32; 2],
}

/// Uniform block for the backdrop pipeline.
#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub struct BackdropUniforms {
    pub inv_view_proj: [[f32; 4]; 4],
}

/// Vertex data for the floor quad (position + normal + texture coordinates)
#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub struct FloorVertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    pub texcoord: [f32; 2],
}

/// Two triangles spanning the floor extent; texture repeats every 4 meters.
fn floor_mesh(scene: &SceneConstants) -> [FloorVertex; 6] {
    let w = scene.floor_width_m;
    let d = scene.floor_depth_m;
    let n = [0.0, 1.0, 0.0];
    let v = |x: f32, z: f32| FloorVertex {
        position: [x, 0.0, z],
        normal: n,
        texcoord: [x / 4.0, z / 4.0],
    };
    [v(0.0, 0.0), v(0.0, d), v(w, 0.0), v(w, 0.0), v(0.0, d), v(w, d)]
}

/// Rendering system managing the wgpu device, the four pass pipelines, and
/// their buffers and targets.
pub struct RenderSystem {
    surface: wgpu::Surface<'static>,
    device: wgpu::Device,
    queue: wgpu::Queue,
    config: wgpu::SurfaceConfiguration,
    depth_view: wgpu::TextureView,

    caustic_pipeline: wgpu::RenderPipeline,
    caustic_target_view: wgpu::TextureView,
    caustic_vertex_buffer: wgpu::Buffer,
    caustic_vertex_count: u32,
    caustic_capacity: u32,

    backdrop_pipeline: wgpu::RenderPipeline,
    backdrop_uniform_buffer: wgpu::Buffer,
    backdrop_bind_group: wgpu::BindGroup,

    floor_pipeline: wgpu::RenderPipeline,
    floor_vertex_buffer: wgpu::Buffer,
    floor_bind_group: wgpu::BindGroup,

    water_pipeline: wgpu::RenderPipeline,
    water_vertex_buffer: wgpu::Buffer,
    water_index_buffer: wgpu::Buffer,
    water_index_count: u32,
    water_bind_group: wgpu::BindGroup,

    scene_uniform_buffer: wgpu::Buffer,
    scene: SceneConstants,
}

impl RenderSystem {
    /// Create the rendering system. Any failure here (surface, adapter,
    /// device, offscreen target, texture decoding) is fatal to the run.
    pub async fn new(
        window: std::sync::Arc<winit::window::Window>,
        grid: &WaterGrid,
        scene: SceneConstants,
        render_config: &RenderConfig,
    ) -> Result<Self, String> {
        let size = window.inner_size();

        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });

        let surface = instance
            .create_surface(window)
            .map_err(|e| format!("Failed to create surface: {}", e))?;

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .ok_or("Failed to find suitable GPU adapter")?;

        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("Main Device"),
                    required_features: wgpu::Features::empty(),
                    required_limits: wgpu::Limits::default(),
                    memory_hints: Default::default(),
                },
                None,
            )
            .await
            .map_err(|e| format!("Failed to request device: {}", e))?;

        let surface_caps = surface.get_capabilities(&adapter);
        let surface_format = surface_caps
            .formats
            .iter()
            .find(|f| f.is_srgb())
            .copied()
            .unwrap_or(surface_caps.formats[0]);

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width: size.width.max(1),
            height: size.height.max(1),
            present_mode: wgpu::PresentMode::Fifo,
            alpha_mode: surface_caps.alpha_modes[0],
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &config);

        let depth_view = create_depth_texture(&device, config.width, config.height);

        // Offscreen caustic accumulation target
        let caustic_target = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("Caustic Buffer"),
            size: wgpu::Extent3d {
                width: render_config.caustic_width,
                height: render_config.caustic_height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: CAUSTIC_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING,
            view_formats: &[],
        });
        let caustic_target_view =
            caustic_target.create_view(&wgpu::TextureViewDescriptor::default());

        // Collaborator-provided images
        let floor_texture_view = assets::load_floor_texture(&device, &queue)?;
        let env_texture_view = assets::load_environment_cubemap(&device, &queue)?;

        let repeat_sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("Repeat Sampler"),
            address_mode_u: wgpu::AddressMode::Repeat,
            address_mode_v: wgpu::AddressMode::Repeat,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        });
        let clamp_sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("Clamp Sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        });

        // Shaders
        let caustic_shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Caustic Shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("caustics.wgsl").into()),
        });
        let backdrop_shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Backdrop Shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("backdrop.wgsl").into()),
        });
        let floor_shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Floor Shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("floor.wgsl").into()),
        });
        let water_shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Water Shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("water.wgsl").into()),
        });

        // Buffers
        let water_vertex_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Water Vertex Buffer"),
            contents: bytemuck::cast_slice(&grid.vertices),
            usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
        });
        let water_index_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Water Index Buffer"),
            contents: bytemuck::cast_slice(&grid.indices),
            usage: wgpu::BufferUsages::INDEX,
        });
        let floor_vertex_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Floor Vertex Buffer"),
            contents: bytemuck::cast_slice(&floor_mesh(&scene)),
            usage: wgpu::BufferUsages::VERTEX,
        });

        let caustic_capacity = grid.vertices.len() as u32;
        let caustic_vertex_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Caustic Vertex Buffer"),
            size: caustic_capacity as u64 * std::mem::size_of::<CausticVertex>() as u64,
            usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let scene_uniform_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Scene Uniform Buffer"),
            contents: bytemuck::cast_slice(&[SceneUniforms::zeroed()]),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });
        let backdrop_uniform_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Backdrop Uniform Buffer"),
            contents: bytemuck::cast_slice(&[BackdropUniforms::zeroed()]),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });

        // Bind group layouts
        let uniform_entry = |binding| wgpu::BindGroupLayoutEntry {
            binding,
            visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Uniform,
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            count: None,
        };
        let texture_entry = |binding, dimension| wgpu::BindGroupLayoutEntry {
            binding,
            visibility: wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Texture {
                sample_type: wgpu::TextureSampleType::Float { filterable: true },
                view_dimension: dimension,
                multisampled: false,
            },
            count: None,
        };
        let sampler_entry = |binding| wgpu::BindGroupLayoutEntry {
            binding,
            visibility: wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
            count: None,
        };

        let backdrop_bind_group_layout =
            device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("Backdrop Bind Group Layout"),
                entries: &[
                    uniform_entry(0),
                    texture_entry(1, wgpu::TextureViewDimension::Cube),
                    sampler_entry(2),
                ],
            });
        let floor_bind_group_layout =
            device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("Floor Bind Group Layout"),
                entries: &[
                    uniform_entry(0),
                    texture_entry(1, wgpu::TextureViewDimension::D2),
                    sampler_entry(2),
                    texture_entry(3, wgpu::TextureViewDimension::D2),
                    sampler_entry(4),
                ],
            });
        let water_bind_group_layout =
            device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("Water Bind Group Layout"),
                entries: &[
                    uniform_entry(0),
                    texture_entry(1, wgpu::TextureViewDimension::Cube),
                    sampler_entry(2),
                    texture_entry(3, wgpu::TextureViewDimension::D2),
                    sampler_entry(4),
                    texture_entry(5, wgpu::TextureViewDimension::D2),
                    sampler_entry(6),
                ],
            });

        let backdrop_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Backdrop Bind Group"),
            layout: &backdrop_bind_group_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: backdrop_uniform_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(&env_texture_view),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::Sampler(&clamp_sampler),
                },
            ],
        });
        let floor_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Floor Bind Group"),
            layout: &floor_bind_group_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: scene_uniform_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(&floor_texture_view),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::Sampler(&repeat_sampler),
                },
                wgpu::BindGroupEntry {
                    binding: 3,
                    resource: wgpu::BindingResource::TextureView(&caustic_target_view),
                },
                wgpu::BindGroupEntry {
                    binding: 4,
                    resource: wgpu::BindingResource::Sampler(&clamp_sampler),
                },
            ],
        });
        let water_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Water Bind Group"),
            layout: &water_bind_group_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: scene_uniform_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(&env_texture_view),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::Sampler(&clamp_sampler),
                },
                wgpu::BindGroupEntry {
                    binding: 3,
                    resource: wgpu::BindingResource::TextureView(&floor_texture_view),
                },
                wgpu::BindGroupEntry {
                    binding: 4,
                    resource: wgpu::BindingResource::Sampler(&repeat_sampler),
                },
                wgpu::BindGroupEntry {
                    binding: 5,
                    resource: wgpu::BindingResource::TextureView(&caustic_target_view),
                },
                wgpu::BindGroupEntry {
                    binding: 6,
                    resource: wgpu::BindingResource::Sampler(&clamp_sampler),
                },
            ],
        });

        // Pipelines
        let caustic_pipeline_layout =
            device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some("Caustic Pipeline Layout"),
                bind_group_layouts: &[],
                push_constant_ranges: &[],
            });
        let caustic_pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("Caustic Pipeline"),
            layout: Some(&caustic_pipeline_layout),
            vertex: wgpu::VertexState {
                module: &caustic_shader,
                entry_point: Some("vs_main"),
                buffers: &[wgpu::VertexBufferLayout {
                    array_stride: std::mem::size_of::<CausticVertex>() as wgpu::BufferAddress,
                    step_mode: wgpu::VertexStepMode::Vertex,
                    attributes: &[
                        wgpu::VertexAttribute {
                            offset: 0,
                            shader_location: 0,
                            format: wgpu::VertexFormat::Float32x2,
                        },
                        wgpu::VertexAttribute {
                            offset: std::mem::size_of::<[f32; 2]>() as wgpu::BufferAddress,
                            shader_location: 1,
                            format: wgpu::VertexFormat::Float32x3,
                        },
                    ],
                }],
                compilation_options: Default::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: &caustic_shader,
                entry_point: Some("fs_main"),
                targets: &[Some(wgpu::ColorTargetState {
                    format: CAUSTIC_FORMAT,
                    // Order-independent additive accumulation
                    blend: Some(wgpu::BlendState {
                        color: wgpu::BlendComponent {
                            src_factor: wgpu::BlendFactor::One,
                            dst_factor: wgpu::BlendFactor::One,
                            operation: wgpu::BlendOperation::Add,
                        },
                        alpha: wgpu::BlendComponent {
                            src_factor: wgpu::BlendFactor::One,
                            dst_factor: wgpu::BlendFactor::One,
                            operation: wgpu::BlendOperation::Add,
                        },
                    }),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: Default::default(),
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::PointList,
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

        let backdrop_pipeline_layout =
            device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some("Backdrop Pipeline Layout"),
                bind_group_layouts: &[&backdrop_bind_group_layout],
                push_constant_ranges: &[],
            });
        let backdrop_pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("Backdrop Pipeline"),
            layout: Some(&backdrop_pipeline_layout),
            vertex: wgpu::VertexState {
                module: &backdrop_shader,
                entry_point: Some("vs_main"),
                buffers: &[],
                compilation_options: Default::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: &backdrop_shader,
                entry_point: Some("fs_main"),
                targets: &[Some(wgpu::ColorTargetState {
                    format: config.format,
                    blend: None,
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: Default::default(),
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                strip_index_format: None,
                front_face: wgpu::FrontFace::Ccw,
                cull_mode: None,
                polygon_mode: wgpu::PolygonMode::Fill,
                unclipped_depth: false,
                conservative: false,
            },
            // The pass carries a depth attachment for the later stages;
            // the backdrop neither tests nor writes it.
            depth_stencil: Some(wgpu::DepthStencilState {
                format: DEPTH_FORMAT,
                depth_write_enabled: false,
                depth_compare: wgpu::CompareFunction::Always,
                stencil: wgpu::StencilState::default(),
                bias: wgpu::DepthBiasState::default(),
            }),
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
            cache: None,
        });

        let floor_pipeline_layout =
            device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some("Floor Pipeline Layout"),
                bind_group_layouts: &[&floor_bind_group_layout],
                push_constant_ranges: &[],
            });
        let floor_pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("Floor Pipeline"),
            layout: Some(&floor_pipeline_layout),
            vertex: wgpu::VertexState {
                module: &floor_shader,
                entry_point: Some("vs_main"),
                buffers: &[wgpu::VertexBufferLayout {
                    array_stride: std::mem::size_of::<FloorVertex>() as wgpu::BufferAddress,
                    step_mode: wgpu::VertexStepMode::Vertex,
                    attributes: &[
                        wgpu::VertexAttribute {
                            offset: 0,
                            shader_location: 0,
                            format: wgpu::VertexFormat::Float32x3,
                        },
                        wgpu::VertexAttribute {
                            offset: std::mem::size_of::<[f32; 3]>() as wgpu::BufferAddress,
                            shader_location: 1,
                            format: wgpu::VertexFormat::Float32x3,
                        },
                        wgpu::VertexAttribute {
                            offset: std::mem::size_of::<[f32; 6]>() as wgpu::BufferAddress,
                            shader_location: 2,
                            format: wgpu::VertexFormat::Float32x2,
                        },
                    ],
                }],
                compilation_options: Default::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: &floor_shader,
                entry_point: Some("fs_main"),
                targets: &[Some(wgpu::ColorTargetState {
                    format: config.format,
                    blend: None,
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: Default::default(),
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                strip_index_format: None,
                front_face: wgpu::FrontFace::Ccw,
                cull_mode: Some(wgpu::Face::Back),
                polygon_mode: wgpu::PolygonMode::Fill,
                unclipped_depth: false,
                conservative: false,
            },
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
        });

        let water_pipeline_layout =
            device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some("Water Pipeline Layout"),
                bind_group_layouts: &[&water_bind_group_layout],
                push_constant_ranges: &[],
            });
        let water_pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("Water Pipeline"),
            layout: Some(&water_pipeline_layout),
            vertex: wgpu::VertexState {
                module: &water_shader,
                entry_point: Some("vs_main"),
                buffers: &[wgpu::VertexBufferLayout {
                    array_stride: std::mem::size_of::<SurfaceVertex>() as wgpu::BufferAddress,
                    step_mode: wgpu::VertexStepMode::Vertex,
                    attributes: &[
                        wgpu::VertexAttribute {
                            offset: 0,
                            shader_location: 0,
                            format: wgpu::VertexFormat::Float32x3,
                        },
                        wgpu::VertexAttribute {
                            offset: std::mem::size_of::<[f32; 3]>() as wgpu::BufferAddress,
                            shader_location: 1,
                            format: wgpu::VertexFormat::Float32x3,
                        },
                    ],
                }],
                compilation_options: Default::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: &water_shader,
                entry_point: Some("fs_main"),
                targets: &[Some(wgpu::ColorTargetState {
                    format: config.format,
                    // The Fresnel split already blends reflection against
                    // transmission; framebuffer blending stays off.
                    blend: None,
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: Default::default(),
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                strip_index_format: None,
                front_face: wgpu::FrontFace::Ccw,
                cull_mode: Some(wgpu::Face::Back),
                polygon_mode: wgpu::PolygonMode::Fill,
                unclipped_depth: false,
                conservative: false,
            },
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
        });

        Ok(Self {
            surface,
            device,
            queue,
            config,
            depth_view,
            caustic_pipeline,
            caustic_target_view,
            caustic_vertex_buffer,
            caustic_vertex_count: 0,
            caustic_capacity,
            backdrop_pipeline,
            backdrop_uniform_buffer,
            backdrop_bind_group,
            floor_pipeline,
            floor_vertex_buffer,
            floor_bind_group,
            water_pipeline,
            water_vertex_buffer,
            water_index_buffer,
            water_index_count: grid.indices.len() as u32,
            water_bind_group,
            scene_uniform_buffer,
            scene,
        })
    }

    /// Reconfigure the swapchain and depth buffer after a window resize.
    pub fn resize(&mut self, width: u32, height: u32) {
        self.config.width = width.max(1);
        self.config.height = height.max(1);
        self.surface.configure(&self.device, &self.config);
        self.depth_view = create_depth_texture(&self.device, self.config.width, self.config.height);
    }

    /// Upload this frame's water surface vertices.
    pub fn update_water_vertices(&self, vertices: &[SurfaceVertex]) {
        self.queue
            .write_buffer(&self.water_vertex_buffer, 0, bytemuck::cast_slice(vertices));
    }

    /// Upload this frame's caustic samples. The buffer was sized for one
    /// sample per grid vertex, the projector's maximum.
    pub fn update_caustic_samples(&mut self, samples: &[CausticVertex]) {
        let count = (samples.len() as u32).min(self.caustic_capacity);
        self.queue.write_buffer(
            &self.caustic_vertex_buffer,
            0,
            bytemuck::cast_slice(&samples[..count as usize]),
        );
        self.caustic_vertex_count = count;
    }

    /// Upload the per-frame uniform state shared by the passes.
    pub fn update_uniforms(&self, ctx: &FrameContext) {
        let uniforms = SceneUniforms {
            view_proj: ctx.view_proj.to_cols_array_2d(),
            camera_pos: ctx.camera_position.to_array(),
            time: ctx.time,
            light_dir: self.scene.light_direction,
            glossiness: self.scene.glossiness,
            light_color: self.scene.sun_color,
            roughness: self.scene.roughness,
            ambient: self.scene.ambient_color,
            _pad0: 0.0,
            floor_extent: self.scene.floor_extent().to_array(),
            _pad1: [0.0; 2],
        };
        self.queue.write_buffer(
            &self.scene_uniform_buffer,
            0,
            bytemuck::cast_slice(&[uniforms]),
        );

        let backdrop = BackdropUniforms {
            inv_view_proj: ctx.backdrop_view_proj.inverse().to_cols_array_2d(),
        };
        self.queue.write_buffer(
            &self.backdrop_uniform_buffer,
            0,
            bytemuck::cast_slice(&[backdrop]),
        );
    }

    /// Drive one frame through the fixed stage sequence.
    pub fn render(&self) -> Result<(), wgpu::SurfaceError> {
        let output = self.surface.get_current_texture()?;
        let view = output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Frame Encoder"),
            });

        for stage in PipelineStage::SEQUENCE {
            match stage {
                PipelineStage::Caustics => self.caustics_pass(&mut encoder),
                PipelineStage::Backdrop => self.backdrop_pass(&mut encoder, &view),
                PipelineStage::Floor => self.floor_pass(&mut encoder, &view),
                PipelineStage::Water => self.water_pass(&mut encoder, &view),
                // Terminal stage: the encoder is submitted and the frame
                // swapped once recording ends, right below.
                PipelineStage::Present => {}
            }
        }

        self.queue.submit(std::iter::once(encoder.finish()));
        output.present();

        Ok(())
    }

    /// Additive accumulation of caustic samples into the offscreen buffer,
    /// cleared to zero first. Depth is off; order never matters.
    fn caustics_pass(&self, encoder: &mut wgpu::CommandEncoder) {
        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("Caustics Pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: &self.caustic_target_view,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(wgpu::Color::TRANSPARENT),
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: None,
            timestamp_writes: None,
            occlusion_query_set: None,
        });

        pass.set_pipeline(&self.caustic_pipeline);
        pass.set_vertex_buffer(0, self.caustic_vertex_buffer.slice(..));
        pass.draw(0..self.caustic_vertex_count, 0..1);
    }

    /// Clear color and depth, then fill the background with the environment.
    fn backdrop_pass(&self, encoder: &mut wgpu::CommandEncoder, view: &wgpu::TextureView) {
        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("Backdrop Pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(CLEAR_COLOR),
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

        pass.set_pipeline(&self.backdrop_pipeline);
        pass.set_bind_group(0, &self.backdrop_bind_group, &[]);
        pass.draw(0..3, 0..1); // Fullscreen triangle
    }

    fn floor_pass(&self, encoder: &mut wgpu::CommandEncoder, view: &wgpu::TextureView) {
        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("Floor Pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Load,
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                view: &self.depth_view,
                depth_ops: Some(wgpu::Operations {
                    load: wgpu::LoadOp::Load,
                    store: wgpu::StoreOp::Store,
                }),
                stencil_ops: None,
            }),
            timestamp_writes: None,
            occlusion_query_set: None,
        });

        pass.set_pipeline(&self.floor_pipeline);
        pass.set_bind_group(0, &self.floor_bind_group, &[]);
        pass.set_vertex_buffer(0, self.floor_vertex_buffer.slice(..));
        pass.draw(0..6, 0..1);
    }

    fn water_pass(&self, encoder: &mut wgpu::CommandEncoder, view: &wgpu::TextureView) {
        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("Water Pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Load,
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                view: &self.depth_view,
                depth_ops: Some(wgpu::Operations {
                    load: wgpu::LoadOp::Load,
                    store: wgpu::StoreOp::Store,
                }),
                stencil_ops: None,
            }),
            timestamp_writes: None,
            occlusion_query_set: None,
        });

        pass.set_pipeline(&self.water_pipeline);
        pass.set_bind_group(0, &self.water_bind_group, &[]);
        pass.set_vertex_buffer(0, self.water_vertex_buffer.slice(..));
        pass.set_index_buffer(self.water_index_buffer.slice(..), wgpu::IndexFormat::Uint32);
        pass.draw_indexed(0..self.water_index_count, 0, 0..1);
    }
}

fn create_depth_texture(device: &wgpu::Device, width: u32, height: u32) -> wgpu::TextureView {
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some("Depth Buffer"),
        size: wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: DEPTH_FORMAT,
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
        view_formats: &[],
    });
    texture.create_view(&wgpu::TextureViewDescriptor::default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::CameraParams;

    #[test]
    fn stage_sequence_is_fixed_and_terminal_in_present() {
        assert_eq!(
            PipelineStage::SEQUENCE,
            [
                PipelineStage::Caustics,
                PipelineStage::Backdrop,
                PipelineStage::Floor,
                PipelineStage::Water,
                PipelineStage::Present,
            ]
        );
        assert_eq!(PipelineStage::SEQUENCE.last(), Some(&PipelineStage::Present));
    }

    #[test]
    fn caustic_write_precedes_both_reads() {
        let position = |stage| {
            PipelineStage::SEQUENCE
                .iter()
                .position(|s| *s == stage)
                .unwrap()
        };
        assert!(position(PipelineStage::Caustics) < position(PipelineStage::Floor));
        assert!(position(PipelineStage::Caustics) < position(PipelineStage::Water));
        assert!(position(PipelineStage::Backdrop) < position(PipelineStage::Floor));
    }

    #[test]
    fn scene_uniforms_match_wgsl_layout() {
        // mat4 + four vec3/f32 rows + one vec2 row
        assert_eq!(std::mem::size_of::<SceneUniforms>(), 64 + 4 * 16 + 16);
        assert_eq!(std::mem::size_of::<BackdropUniforms>(), 64);
    }

    #[test]
    fn frame_context_snapshots_camera_and_time() {
        let camera = CameraSystem::new(CameraParams::default());
        let config = RenderConfig::default();
        let ctx = FrameContext::new(2.5, &camera, &config);

        assert_eq!(ctx.time, 2.5);
        assert_eq!(ctx.camera_position, camera.state.position);
        assert_ne!(ctx.view_proj, ctx.backdrop_view_proj);
        assert!(ctx.backdrop_view_proj.inverse().is_finite());
    }

    #[test]
    fn floor_mesh_spans_extent_with_tiled_uvs() {
        let scene = SceneConstants::default();
        let mesh = floor_mesh(&scene);

        assert_eq!(mesh.len(), 6);
        for v in &mesh {
            assert_eq!(v.position[1], 0.0);
            assert_eq!(v.normal, [0.0, 1.0, 0.0]);
            assert_eq!(v.texcoord, [v.position[0] / 4.0, v.position[2] / 4.0]);
        }
        let max_x = mesh.iter().map(|v| v.position[0]).fold(0.0, f32::max);
        let max_z = mesh.iter().map(|v| v.position[2]).fold(0.0, f32::max);
        assert_eq!(max_x, scene.floor_width_m);
        assert_eq!(max_z, scene.floor_depth_m);
    }
}
