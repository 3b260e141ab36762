// SPDX-License-Identifier: GPL-3.0-only

//! GPU vertex storage

use tracing::debug;

use super::Vertex;
use crate::gpu::wgpu::{self, util::DeviceExt};

/// How a vertex buffer is updated over its lifetime
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferUsage {
    /// Uploaded once; replacing the data recreates the buffer
    Static,
    /// Fully rewritten every frame; grows on demand
    Stream,
}

pub struct VertexBuffer {
    buffer: wgpu::Buffer,
    label: String,
    usage: BufferUsage,
    /// Vertices the buffer can hold
    capacity: usize,
    /// Vertices currently uploaded
    len: usize,
}

impl VertexBuffer {
    /// Immutable buffer holding `vertices`
    pub fn new_static(device: &wgpu::Device, label: &str, vertices: &[Vertex]) -> Self {
        let buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(label),
            contents: bytemuck::cast_slice(vertices),
            usage: wgpu::BufferUsages::VERTEX,
        });
        Self {
            buffer,
            label: label.to_string(),
            usage: BufferUsage::Static,
            capacity: vertices.len(),
            len: vertices.len(),
        }
    }

    /// Empty streaming buffer with room for `capacity` vertices
    pub fn new_stream(device: &wgpu::Device, label: &str, capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            buffer: Self::create_stream_buffer(device, label, capacity),
            label: label.to_string(),
            usage: BufferUsage::Stream,
            capacity,
            len: 0,
        }
    }

    fn create_stream_buffer(device: &wgpu::Device, label: &str, capacity: usize) -> wgpu::Buffer {
        device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(label),
            size: capacity as wgpu::BufferAddress * Vertex::STRIDE,
            usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        })
    }

    /// Replace the vertex data
    pub fn upload(&mut self, device: &wgpu::Device, queue: &wgpu::Queue, vertices: &[Vertex]) {
        match self.usage {
            BufferUsage::Static => {
                *self = Self::new_static(device, &self.label, vertices);
            }
            BufferUsage::Stream => {
                if vertices.len() > self.capacity {
                    let capacity = vertices.len().next_power_of_two();
                    debug!(
                        label = %self.label,
                        old = self.capacity,
                        new = capacity,
                        "Growing vertex buffer"
                    );
                    self.buffer = Self::create_stream_buffer(device, &self.label, capacity);
                    self.capacity = capacity;
                }
                if !vertices.is_empty() {
                    queue.write_buffer(&self.buffer, 0, bytemuck::cast_slice(vertices));
                }
                self.len = vertices.len();
            }
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Slice covering the uploaded vertices. Callers skip empty buffers.
    pub fn slice(&self) -> wgpu::BufferSlice<'_> {
        self.buffer.slice(..self.len as wgpu::BufferAddress * Vertex::STRIDE)
    }
}
