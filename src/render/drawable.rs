// SPDX-License-Identifier: GPL-3.0-only

//! The two drawable variants behind one upload/draw capability

use glam::Mat4;
use tracing::warn;

use super::buffer::VertexBuffer;
use super::mesh::Mesh;
use super::pipeline::DrawUniforms;
use super::{DrawContext, Topology, Vertex};
use crate::errors::MeshError;
use crate::gpu::wgpu::{self, util::DeviceExt};

pub enum DrawKind {
    /// Triangle list through an index buffer
    IndexedTriangles {
        index_buffer: wgpu::Buffer,
        index_count: u32,
        /// Position and value of the largest index
        highest_index: Option<(usize, u32)>,
    },
    /// Every vertex drawn as an unconnected point
    Points,
}

pub struct Drawable {
    vertices: VertexBuffer,
    kind: DrawKind,
}

impl Drawable {
    /// Static indexed mesh. The mesh was validated when it was built.
    pub fn indexed(device: &wgpu::Device, label: &str, mesh: &Mesh) -> Self {
        let index_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(&format!("{label} indices")),
            contents: bytemuck::cast_slice(mesh.indices()),
            usage: wgpu::BufferUsages::INDEX,
        });
        Self {
            vertices: VertexBuffer::new_static(device, label, mesh.vertices()),
            kind: DrawKind::IndexedTriangles {
                index_buffer,
                index_count: mesh.index_count() as u32,
                highest_index: mesh.highest_index(),
            },
        }
    }

    /// Streaming point list with room for `capacity` points
    pub fn points(device: &wgpu::Device, label: &str, capacity: usize) -> Self {
        Self {
            vertices: VertexBuffer::new_stream(device, label, capacity),
            kind: DrawKind::Points,
        }
    }

    pub fn topology(&self) -> Topology {
        match self.kind {
            DrawKind::IndexedTriangles { .. } => Topology::Triangles,
            DrawKind::Points => Topology::Points,
        }
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    /// Replace the vertex data. Indexed drawables reject data their index
    /// buffer would read past.
    pub fn upload(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        vertices: &[Vertex],
    ) -> Result<(), MeshError> {
        if let DrawKind::IndexedTriangles {
            highest_index: Some((position, index)),
            ..
        } = self.kind
            && index as usize >= vertices.len()
        {
            return Err(MeshError::IndexOutOfRange {
                position,
                index,
                vertex_count: vertices.len(),
            });
        }
        self.vertices.upload(device, queue, vertices);
        Ok(())
    }

    /// Bind the shared pipeline, write the four uniforms and issue the draw.
    ///
    /// Returns `false` when nothing was drawn (no vertices, or the frame ran
    /// out of uniform slots).
    pub fn draw(
        &self,
        ctx: &mut DrawContext<'_, '_>,
        model: Mat4,
        view: Mat4,
        projection: Mat4,
        color: [f32; 4],
    ) -> bool {
        let no_triangles = matches!(
            self.kind,
            DrawKind::IndexedTriangles { index_count: 0, .. }
        );
        if self.vertices.is_empty() || no_triangles {
            return false;
        }

        let uniforms = DrawUniforms::new(model, view, projection, color);
        let Some(offset) = ctx.uniforms.push(ctx.queue, &uniforms) else {
            warn!(
                capacity = ctx.uniforms.capacity(),
                "Out of uniform slots, skipping draw"
            );
            return false;
        };

        ctx.pipeline
            .bind(ctx.pass, self.topology(), ctx.uniforms, offset);
        ctx.pass.set_vertex_buffer(0, self.vertices.slice());

        match &self.kind {
            DrawKind::IndexedTriangles {
                index_buffer,
                index_count,
                ..
            } => {
                ctx.pass
                    .set_index_buffer(index_buffer.slice(..), wgpu::IndexFormat::Uint32);
                ctx.pass.draw_indexed(0..*index_count, 0, 0..1);
            }
            DrawKind::Points => {
                ctx.pass.draw(0..self.vertices.len() as u32, 0..1);
            }
        }
        true
    }
}
