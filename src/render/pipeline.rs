// SPDX-License-Identifier: GPL-3.0-only

//! Shared shading pipeline, per-draw uniforms and the depth attachment

use std::num::NonZeroU64;

use bytemuck::{Pod, Zeroable};
use glam::Mat4;
use tracing::{debug, info};

use super::{Topology, Vertex};
use crate::constants::rendering::DEPTH_FORMAT;
use crate::errors::RenderError;
use crate::gpu::{CachedDimensions, wgpu};
use crate::shaders::{FRAGMENT_ENTRY, PRIMITIVE_SHADER, VERTEX_ENTRY};

/// Uniform block consumed by the primitive shader
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Pod, Zeroable)]
pub struct DrawUniforms {
    pub model: [[f32; 4]; 4],
    pub view: [[f32; 4]; 4],
    pub projection: [[f32; 4]; 4],
    pub color: [f32; 4],
}

impl DrawUniforms {
    pub const SIZE: u64 = std::mem::size_of::<DrawUniforms>() as u64;

    pub fn new(model: Mat4, view: Mat4, projection: Mat4, color: [f32; 4]) -> Self {
        Self {
            model: model.to_cols_array_2d(),
            view: view.to_cols_array_2d(),
            projection: projection.to_cols_array_2d(),
            color,
        }
    }
}

/// One shader program, two primitive topologies
pub struct ShadingPipeline {
    triangles: wgpu::RenderPipeline,
    points: wgpu::RenderPipeline,
    bind_group_layout: wgpu::BindGroupLayout,
    color_format: wgpu::TextureFormat,
}

impl ShadingPipeline {
    pub fn new(
        device: &wgpu::Device,
        color_format: wgpu::TextureFormat,
    ) -> Result<Self, RenderError> {
        Self::from_source(device, color_format, PRIMITIVE_SHADER)
    }

    /// Build from WGSL source. Compile and link diagnostics are returned
    /// instead of reaching the device's uncaptured error handler.
    pub fn from_source(
        device: &wgpu::Device,
        color_format: wgpu::TextureFormat,
        source: &str,
    ) -> Result<Self, RenderError> {
        device.push_error_scope(wgpu::ErrorFilter::Validation);
        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("primitive shader"),
            source: wgpu::ShaderSource::Wgsl(source.into()),
        });
        if let Some(error) = pollster::block_on(device.pop_error_scope()) {
            return Err(RenderError::ShaderCompilation(error.to_string()));
        }

        device.push_error_scope(wgpu::ErrorFilter::Validation);
        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("primitive bind group layout"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: true,
                    min_binding_size: NonZeroU64::new(DrawUniforms::SIZE),
                },
                count: None,
            }],
        });

        let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("primitive pipeline layout"),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });

        let triangles = create_pipeline(device, &layout, &shader, color_format, Topology::Triangles);
        let points = create_pipeline(device, &layout, &shader, color_format, Topology::Points);
        if let Some(error) = pollster::block_on(device.pop_error_scope()) {
            return Err(RenderError::PipelineLink(error.to_string()));
        }

        info!(format = ?color_format, "Primitive shading pipeline ready");

        Ok(Self {
            triangles,
            points,
            bind_group_layout,
            color_format,
        })
    }

    pub fn color_format(&self) -> wgpu::TextureFormat {
        self.color_format
    }

    pub fn bind_group_layout(&self) -> &wgpu::BindGroupLayout {
        &self.bind_group_layout
    }

    /// Set the pipeline for `topology` and point the uniform binding at one
    /// arena slot.
    pub fn bind(
        &self,
        pass: &mut wgpu::RenderPass<'_>,
        topology: Topology,
        uniforms: &UniformArena,
        offset: u32,
    ) {
        let pipeline = match topology {
            Topology::Triangles => &self.triangles,
            Topology::Points => &self.points,
        };
        pass.set_pipeline(pipeline);
        pass.set_bind_group(0, &uniforms.bind_group, &[offset]);
    }
}

fn create_pipeline(
    device: &wgpu::Device,
    layout: &wgpu::PipelineLayout,
    shader: &wgpu::ShaderModule,
    color_format: wgpu::TextureFormat,
    topology: Topology,
) -> wgpu::RenderPipeline {
    // Opaque triangles; translucent points blend over them
    let (label, primitive_topology, blend) = match topology {
        Topology::Triangles => (
            "primitive triangles pipeline",
            wgpu::PrimitiveTopology::TriangleList,
            None,
        ),
        Topology::Points => (
            "primitive points pipeline",
            wgpu::PrimitiveTopology::PointList,
            Some(wgpu::BlendState::ALPHA_BLENDING),
        ),
    };

    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some(label),
        layout: Some(layout),
        vertex: wgpu::VertexState {
            module: shader,
            entry_point: Some(VERTEX_ENTRY),
            buffers: &[Vertex::layout()],
            compilation_options: Default::default(),
        },
        primitive: wgpu::PrimitiveState {
            topology: primitive_topology,
            cull_mode: None,
            ..Default::default()
        },
        depth_stencil: Some(wgpu::DepthStencilState {
            format: DEPTH_FORMAT,
            depth_write_enabled: true,
            depth_compare: wgpu::CompareFunction::Less,
            stencil: wgpu::StencilState::default(),
            bias: wgpu::DepthBiasState::default(),
        }),
        multisample: wgpu::MultisampleState::default(),
        fragment: Some(wgpu::FragmentState {
            module: shader,
            entry_point: Some(FRAGMENT_ENTRY),
            targets: &[Some(wgpu::ColorTargetState {
                format: color_format,
                blend,
                write_mask: wgpu::ColorWrites::ALL,
            })],
            compilation_options: Default::default(),
        }),
        multiview: None,
        cache: None,
    })
}

/// Per-frame uniform storage addressed with dynamic offsets
///
/// Every draw in a frame gets its own slot, so all uniform writes can be
/// queued before the single submit.
pub struct UniformArena {
    buffer: wgpu::Buffer,
    bind_group: wgpu::BindGroup,
    stride: u64,
    capacity: u32,
    used: u32,
}

impl UniformArena {
    pub fn new(device: &wgpu::Device, pipeline: &ShadingPipeline, capacity: u32) -> Self {
        let alignment = u64::from(device.limits().min_uniform_buffer_offset_alignment);
        let stride = DrawUniforms::SIZE.div_ceil(alignment) * alignment;
        let capacity = capacity.max(1);
        let (buffer, bind_group) = Self::allocate(device, pipeline, stride, capacity);
        Self {
            buffer,
            bind_group,
            stride,
            capacity,
            used: 0,
        }
    }

    fn allocate(
        device: &wgpu::Device,
        pipeline: &ShadingPipeline,
        stride: u64,
        capacity: u32,
    ) -> (wgpu::Buffer, wgpu::BindGroup) {
        let buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("draw uniforms"),
            size: stride * u64::from(capacity),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("draw uniforms bind group"),
            layout: pipeline.bind_group_layout(),
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: wgpu::BindingResource::Buffer(wgpu::BufferBinding {
                    buffer: &buffer,
                    offset: 0,
                    size: NonZeroU64::new(DrawUniforms::SIZE),
                }),
            }],
        });
        (buffer, bind_group)
    }

    /// Start a frame, making room for at least `slots` draws
    pub fn begin_frame(&mut self, device: &wgpu::Device, pipeline: &ShadingPipeline, slots: u32) {
        if slots > self.capacity {
            let capacity = slots.next_power_of_two();
            debug!(old = self.capacity, new = capacity, "Growing uniform arena");
            let (buffer, bind_group) = Self::allocate(device, pipeline, self.stride, capacity);
            self.buffer = buffer;
            self.bind_group = bind_group;
            self.capacity = capacity;
        }
        self.used = 0;
    }

    /// Queue `uniforms` into the next free slot and return its dynamic
    /// offset, or `None` when the frame has run out of slots.
    pub fn push(&mut self, queue: &wgpu::Queue, uniforms: &DrawUniforms) -> Option<u32> {
        if self.used >= self.capacity {
            return None;
        }
        let offset = self.stride * u64::from(self.used);
        queue.write_buffer(&self.buffer, offset, bytemuck::bytes_of(uniforms));
        self.used += 1;
        u32::try_from(offset).ok()
    }

    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    pub fn stride(&self) -> u64 {
        self.stride
    }
}

/// Depth attachment sized to the current render target
pub struct DepthTarget {
    view: wgpu::TextureView,
    dimensions: CachedDimensions,
}

impl DepthTarget {
    pub fn new(device: &wgpu::Device, width: u32, height: u32) -> Self {
        Self {
            view: Self::create(device, width, height),
            dimensions: CachedDimensions::new(width.max(1), height.max(1)),
        }
    }

    fn create(device: &wgpu::Device, width: u32, height: u32) -> wgpu::TextureView {
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("depth attachment"),
            size: wgpu::Extent3d {
                width: width.max(1),
                height: height.max(1),
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

    /// Reallocate when the target size changed
    pub fn ensure_size(&mut self, device: &wgpu::Device, width: u32, height: u32) {
        let (width, height) = (width.max(1), height.max(1));
        if !self.dimensions.needs_update(width, height) {
            return;
        }
        debug!(width, height, "Resizing depth attachment");
        self.view = Self::create(device, width, height);
        self.dimensions.update(width, height);
    }

    pub fn view(&self) -> &wgpu::TextureView {
        &self.view
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::orchestrator::{OffscreenTarget, RenderTarget};
    use crate::render::{CameraMatrices, DrawContext, Drawable, Mesh};

    #[test]
    fn test_draw_uniforms_layout() {
        assert_eq!(DrawUniforms::SIZE, 208);
        let uniforms = DrawUniforms::new(
            Mat4::from_translation(glam::Vec3::new(1.0, 2.0, 3.0)),
            Mat4::IDENTITY,
            Mat4::IDENTITY,
            [0.1, 0.2, 0.3, 0.4],
        );
        // Column-major, translation in the last column
        assert_eq!(uniforms.model[3], [1.0, 2.0, 3.0, 1.0]);
        assert_eq!(uniforms.color, [0.1, 0.2, 0.3, 0.4]);
    }

    struct Headless {
        adapter: wgpu::Adapter,
        device: Arc<wgpu::Device>,
        queue: Arc<wgpu::Queue>,
    }

    fn headless() -> Option<Headless> {
        let instance = crate::gpu::create_instance();
        match pollster::block_on(crate::gpu::create_device(&instance, None, "pipeline test")) {
            Ok((adapter, device, queue, _)) => Some(Headless {
                adapter,
                device,
                queue,
            }),
            Err(e) => {
                println!("Skipping test (no GPU): {}", e);
                None
            }
        }
    }

    fn headless_device() -> Option<Arc<wgpu::Device>> {
        headless().map(|gpu| gpu.device)
    }

    const READBACK_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba32Float;

    /// Draw one screen-covering triangle at view depth `z` with a constant
    /// `normal` and read back the single pixel it shades. Model, view and
    /// projection are identity, so the fragment sits at (0, 0, z) in view
    /// space and the light is `z` away from it.
    fn shade_pixel(gpu: &Headless, normal: [f32; 3], z: f32, color: [f32; 4]) -> [f32; 4] {
        let (device, queue) = (gpu.device.as_ref(), gpu.queue.as_ref());
        let pipeline = ShadingPipeline::new(device, READBACK_FORMAT).unwrap();
        let mut uniforms = UniformArena::new(device, &pipeline, 1);
        let depth = DepthTarget::new(device, 1, 1);
        let mut target = OffscreenTarget::new(device, 1, 1, READBACK_FORMAT);

        let mesh = Mesh::new(
            vec![
                Vertex::new([-1.0, -1.0, z], normal),
                Vertex::new([3.0, -1.0, z], normal),
                Vertex::new([-1.0, 3.0, z], normal),
            ],
            vec![0, 1, 2],
        )
        .unwrap();
        let triangle = Drawable::indexed(device, "shading test triangle", &mesh);

        let acquired = target.acquire().unwrap();
        uniforms.begin_frame(device, &pipeline, 1);
        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("shading test encoder"),
        });
        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("shading test pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &acquired.view,
                    depth_slice: None,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color::TRANSPARENT),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: depth.view(),
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Discard,
                    }),
                    stencil_ops: None,
                }),
                timestamp_writes: None,
                occlusion_query_set: None,
            });
            let mut ctx = DrawContext {
                device,
                queue,
                pass: &mut pass,
                pipeline: &pipeline,
                uniforms: &mut uniforms,
                camera: CameraMatrices::default(),
            };
            assert!(triangle.draw(&mut ctx, Mat4::IDENTITY, Mat4::IDENTITY, Mat4::IDENTITY, color));
        }

        // One RGBA32F texel, row padded to the copy alignment
        let readback = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("shading test readback"),
            size: u64::from(wgpu::COPY_BYTES_PER_ROW_ALIGNMENT),
            usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        encoder.copy_texture_to_buffer(
            wgpu::TexelCopyTextureInfo {
                texture: target.texture(),
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::TexelCopyBufferInfo {
                buffer: &readback,
                layout: wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(wgpu::COPY_BYTES_PER_ROW_ALIGNMENT),
                    rows_per_image: Some(1),
                },
            },
            wgpu::Extent3d {
                width: 1,
                height: 1,
                depth_or_array_layers: 1,
            },
        );
        queue.submit(std::iter::once(encoder.finish()));

        let slice = readback.slice(..);
        let (sender, receiver) = std::sync::mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = sender.send(result);
        });
        let _ = device.poll(wgpu::PollType::wait_indefinitely());
        receiver.recv().unwrap().unwrap();

        let data = slice.get_mapped_range();
        bytemuck::pod_read_unaligned::<[f32; 4]>(&data[..16])
    }

    fn assert_texel_close(actual: [f32; 4], expected: [f32; 4]) {
        for (a, e) in actual.iter().zip(expected) {
            assert!(
                (a - e).abs() <= 1e-3 * e.abs().max(1.0),
                "shaded {:?}, expected {:?}",
                actual,
                expected
            );
        }
    }

    fn float_target_supported(gpu: &Headless) -> bool {
        let features = gpu.adapter.get_texture_format_features(READBACK_FORMAT);
        let supported = features
            .allowed_usages
            .contains(wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_SRC);
        if !supported {
            println!("Skipping test ({:?} not renderable)", READBACK_FORMAT);
        }
        supported
    }

    #[test]
    fn test_diffuse_is_unsigned_inverse_square() {
        let Some(gpu) = headless() else {
            return;
        };
        if !float_target_supported(&gpu) {
            return;
        }
        let color = [0.25, 0.5, 0.125, 0.3];

        // |dot| = 0.8 at distance 0.5: 0.8 / 0.25, well above 1 and unclamped
        let toward_light = shade_pixel(&gpu, [0.0, 0.6, -0.8], 0.5, color);
        assert_texel_close(toward_light, [0.8, 1.6, 0.4, 0.3]);

        // Facing away gives the same intensity
        let away_from_light = shade_pixel(&gpu, [0.0, 0.6, 0.8], 0.5, color);
        assert_texel_close(away_from_light, toward_light);
    }

    #[test]
    fn test_diffuse_falls_off_with_squared_distance() {
        let Some(gpu) = headless() else {
            return;
        };
        if !float_target_supported(&gpu) {
            return;
        }
        let color = [1.0, 0.5, 0.25, 0.75];

        let shaded = shade_pixel(&gpu, [0.0, 0.0, -1.0], 0.8, color);
        let diffuse = 1.0 / (0.8 * 0.8);
        assert_texel_close(
            shaded,
            [diffuse, 0.5 * diffuse, 0.25 * diffuse, 0.75],
        );
    }

    #[test]
    fn test_pipeline_builds() {
        let Some(device) = headless_device() else {
            return;
        };
        let pipeline = ShadingPipeline::new(&device, wgpu::TextureFormat::Rgba8Unorm).unwrap();
        let arena = UniformArena::new(&device, &pipeline, 4);
        let alignment = u64::from(device.limits().min_uniform_buffer_offset_alignment);
        assert_eq!(arena.stride() % alignment, 0);
        assert!(arena.stride() >= DrawUniforms::SIZE);
    }

    #[test]
    fn test_shader_compile_error_is_reported() {
        let Some(device) = headless_device() else {
            return;
        };
        match ShadingPipeline::from_source(&device, wgpu::TextureFormat::Rgba8Unorm, "fn vs_main( {") {
            Err(RenderError::ShaderCompilation(diagnostic)) => assert!(!diagnostic.is_empty()),
            Err(e) => panic!("unexpected error: {}", e),
            Ok(_) => panic!("broken shader compiled"),
        }
    }

    #[test]
    fn test_missing_entry_point_fails_link() {
        let Some(device) = headless_device() else {
            return;
        };
        let vertex_only = PRIMITIVE_SHADER.replace("fn fs_main", "fn fs_unused");
        match ShadingPipeline::from_source(&device, wgpu::TextureFormat::Rgba8Unorm, &vertex_only) {
            Err(RenderError::PipelineLink(diagnostic)) => assert!(!diagnostic.is_empty()),
            Err(e) => panic!("unexpected error: {}", e),
            Ok(_) => panic!("pipeline linked without a fragment stage"),
        }
    }
}
