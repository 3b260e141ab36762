// SPDX-License-Identifier: GPL-3.0-only

//! Unit sphere for joint markers

use std::f32::consts::{FRAC_PI_2, PI, TAU};

use glam::{Mat4, Vec3};

use super::{DrawContext, Drawable, Mesh, Vertex};
use crate::constants::primitives::{MIN_SECTOR_COUNT, MIN_STACK_COUNT};
use crate::errors::{MeshError, RenderError};
use crate::gpu::wgpu;

/// Latitude/longitude sphere of radius 1 around the origin.
///
/// Stacks run from the +Z pole to the -Z pole, sectors around Z. Each ring
/// repeats its first vertex at the seam. Normals equal positions.
pub fn build_sphere_mesh(sectors: u32, stacks: u32) -> Result<Mesh, MeshError> {
    let sectors = sectors.max(MIN_SECTOR_COUNT);
    let stacks = stacks.max(MIN_STACK_COUNT);

    let mut vertices = Vec::with_capacity(((stacks + 1) * (sectors + 1)) as usize);
    for i in 0..=stacks {
        let stack_angle = FRAC_PI_2 - i as f32 * PI / stacks as f32;
        let ring = stack_angle.cos();
        let z = stack_angle.sin();
        for j in 0..=sectors {
            let sector_angle = j as f32 * TAU / sectors as f32;
            let p = Vec3::new(ring * sector_angle.cos(), ring * sector_angle.sin(), z);
            vertices.push(Vertex::new(p, p));
        }
    }

    let mut indices = Vec::with_capacity((6 * sectors * (stacks - 1)) as usize);
    for i in 0..stacks {
        let mut k1 = i * (sectors + 1);
        let mut k2 = k1 + sectors + 1;
        for _ in 0..sectors {
            // Pole stacks are fans of single triangles
            if i != 0 {
                indices.extend_from_slice(&[k1, k2, k1 + 1]);
            }
            if i != stacks - 1 {
                indices.extend_from_slice(&[k1 + 1, k2, k2 + 1]);
            }
            k1 += 1;
            k2 += 1;
        }
    }

    Mesh::new(vertices, indices)
}

pub struct Sphere {
    drawable: Drawable,
}

impl Sphere {
    pub fn new(device: &wgpu::Device, sectors: u32, stacks: u32) -> Result<Self, RenderError> {
        let mesh = build_sphere_mesh(sectors, stacks)?;
        Ok(Self {
            drawable: Drawable::indexed(device, "sphere", &mesh),
        })
    }

    /// Scale by `radius`, then move to `center`
    pub fn model_transform(center: Vec3, radius: f32) -> Mat4 {
        Mat4::from_translation(center) * Mat4::from_scale(Vec3::splat(radius))
    }

    pub fn render(
        &self,
        ctx: &mut DrawContext<'_, '_>,
        center: Vec3,
        radius: f32,
        color: [f32; 4],
    ) -> bool {
        let camera = ctx.camera;
        self.drawable.draw(
            ctx,
            Self::model_transform(center, radius),
            camera.view,
            camera.projection,
            color,
        )
    }
}
