// SPDX-License-Identifier: GPL-3.0-only

use glam::Mat4;

use super::{DrawContext, Drawable, Vertex};
use crate::gpu::wgpu;

/// Streaming point list, re-uploaded in full on every render
pub struct PointCloud {
    drawable: Drawable,
}

impl PointCloud {
    pub fn new(device: &wgpu::Device, capacity: usize) -> Self {
        Self {
            drawable: Drawable::points(device, "point cloud", capacity),
        }
    }

    /// Points uploaded by the last render
    pub fn len(&self) -> usize {
        self.drawable.vertex_count()
    }

    /// Upload `points` and draw them in sensor space
    pub fn render(
        &mut self,
        ctx: &mut DrawContext<'_, '_>,
        points: &[Vertex],
        color: [f32; 4],
    ) -> bool {
        // Point drawables have no index buffer to outgrow
        if self.drawable.upload(ctx.device, ctx.queue, points).is_err() {
            return false;
        }
        let camera = ctx.camera;
        self.drawable
            .draw(ctx, Mat4::IDENTITY, camera.view, camera.projection, color)
    }
}
