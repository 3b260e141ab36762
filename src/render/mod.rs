// SPDX-License-Identifier: GPL-3.0-only

//! Primitive renderer
//!
//! Point clouds, joint spheres and bone cylinders share one vertex layout
//! and one shading pipeline. Each is a [`Drawable`]: a vertex buffer plus
//! either an index buffer drawn as triangles or nothing, drawn as points.
//!
//! ```text
//! PointCloud ─┐                 ┌─ VertexBuffer (stream | static)
//! Sphere ─────┼─▶ Drawable ─────┤
//! Cylinder ───┘    upload/draw  └─ ShadingPipeline + UniformArena
//! ```

mod buffer;
mod cylinder;
mod drawable;
mod mesh;
mod pipeline;
mod point_cloud;
mod sphere;
mod vertex;

pub use buffer::{BufferUsage, VertexBuffer};
pub use cylinder::{BoneSegment, Cylinder, build_cylinder_mesh};
pub use drawable::{DrawKind, Drawable};
pub use mesh::{Mesh, validate_indices};
pub use pipeline::{DepthTarget, DrawUniforms, ShadingPipeline, UniformArena};
pub use point_cloud::PointCloud;
pub use sphere::{Sphere, build_sphere_mesh};
pub use vertex::Vertex;

use glam::Mat4;

use crate::gpu::wgpu;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Topology {
    Triangles,
    Points,
}

/// View and projection shared by every draw in a frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraMatrices {
    pub view: Mat4,
    pub projection: Mat4,
}

impl Default for CameraMatrices {
    fn default() -> Self {
        Self {
            view: Mat4::IDENTITY,
            projection: Mat4::IDENTITY,
        }
    }
}

/// Everything a drawable needs while a render pass is open
pub struct DrawContext<'a, 'pass> {
    pub device: &'a wgpu::Device,
    pub queue: &'a wgpu::Queue,
    pub pass: &'a mut wgpu::RenderPass<'pass>,
    pub pipeline: &'a ShadingPipeline,
    pub uniforms: &'a mut UniformArena,
    pub camera: CameraMatrices,
}
