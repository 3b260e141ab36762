// SPDX-License-Identifier: GPL-3.0-only

//! Open tube for bone segments

use std::f32::consts::TAU;

use glam::{Mat4, Quat, Vec3};

use super::{DrawContext, Drawable, Mesh, Vertex};
use crate::constants::primitives::{DEGENERATE_AXIS_EPSILON, MIN_SECTOR_COUNT};
use crate::errors::{MeshError, RenderError};
use crate::gpu::wgpu;

/// Radius 1, height 1 tube along Z centred on the origin, without caps.
///
/// Two rings of `sectors + 1` vertices at z = -0.5 and z = +0.5.
pub fn build_cylinder_mesh(sectors: u32) -> Result<Mesh, MeshError> {
    let sectors = sectors.max(MIN_SECTOR_COUNT);
    let ring = sectors + 1;

    let mut vertices = Vec::with_capacity(2 * ring as usize);
    for z in [-0.5f32, 0.5] {
        for j in 0..=sectors {
            let angle = j as f32 * TAU / sectors as f32;
            let (sin, cos) = angle.sin_cos();
            vertices.push(Vertex::new([cos, sin, z], [cos, sin, 0.0]));
        }
    }

    let mut indices = Vec::with_capacity(6 * sectors as usize);
    for j in 0..sectors {
        let (a, b) = (j, j + 1);
        let (c, d) = (j + ring, j + 1 + ring);
        indices.extend_from_slice(&[a, b, c, b, d, c]);
    }

    Mesh::new(vertices, indices)
}

/// Placement of one bone between two joints
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoneSegment {
    /// `start - end`
    pub axis: Vec3,
    pub length: f32,
    pub midpoint: Vec3,
    /// Takes +Z onto the negated axis
    pub orientation: Quat,
}

pub struct Cylinder {
    drawable: Drawable,
    radius: f32,
}

impl Cylinder {
    pub fn new(device: &wgpu::Device, sectors: u32, radius: f32) -> Result<Self, RenderError> {
        let mesh = build_cylinder_mesh(sectors)?;
        Ok(Self {
            drawable: Drawable::indexed(device, "cylinder", &mesh),
            radius,
        })
    }

    pub fn radius(&self) -> f32 {
        self.radius
    }

    pub fn segment(start: Vec3, end: Vec3) -> BoneSegment {
        let axis = start - end;
        let length = axis.length();
        let orientation = if length > DEGENERATE_AXIS_EPSILON {
            Quat::from_rotation_arc(Vec3::Z, -axis / length)
        } else {
            Quat::IDENTITY
        };
        BoneSegment {
            axis,
            length,
            midpoint: (start + end) * 0.5,
            orientation,
        }
    }

    /// Scale XY by `radius` and Z by the bone length, orient, then translate
    /// to the midpoint.
    pub fn model_transform(start: Vec3, end: Vec3, radius: f32) -> Mat4 {
        let segment = Self::segment(start, end);
        Mat4::from_scale_rotation_translation(
            Vec3::new(radius, radius, segment.length),
            segment.orientation,
            segment.midpoint,
        )
    }

    pub fn render(
        &self,
        ctx: &mut DrawContext<'_, '_>,
        start: Vec3,
        end: Vec3,
        color: [f32; 4],
    ) -> bool {
        let camera = ctx.camera;
        self.drawable.draw(
            ctx,
            Self::model_transform(start, end, self.radius),
            camera.view,
            camera.projection,
            color,
        )
    }
}
