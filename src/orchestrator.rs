// SPDX-License-Identifier: GPL-3.0-only

//! Per-tick frame rendering
//!
//! Each tick claims the newest handed-off frame, turns it into a
//! [`FramePlan`] (points plus one sphere per joint and one cylinder per
//! bone), records a single render pass for the plan and releases the frame.
//! A tick without a pending frame does nothing.

use std::sync::Arc;

use glam::Vec3;
use tracing::{debug, info, trace};

use crate::body::JointId;
use crate::config::RenderConfig;
use crate::constants::rendering::{CLEAR_COLOR, INITIAL_POINT_CAPACITY, INITIAL_UNIFORM_SLOTS};
use crate::constants::timing::STATS_LOG_INTERVAL;
use crate::depth::{DepthProjection, PointCloudEngine};
use crate::errors::{ReconstructError, RenderError};
use crate::gpu::wgpu;
use crate::handoff::{Frame, FrameSlot};
use crate::render::{
    CameraMatrices, Cylinder, DepthTarget, DrawContext, PointCloud, ShadingPipeline, Sphere,
    UniformArena, Vertex,
};

/// One skeleton primitive, in draw order
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SkeletonPrimitive {
    Joint { center: Vec3, color: [f32; 4] },
    Bone { start: Vec3, end: Vec3, color: [f32; 4] },
}

/// Everything one tick draws, independent of the GPU
#[derive(Debug, Default)]
pub struct FramePlan {
    pub points: Vec<Vertex>,
    pub skeleton: Vec<SkeletonPrimitive>,
    pub bodies: usize,
}

impl FramePlan {
    pub fn clear(&mut self) {
        self.points.clear();
        self.skeleton.clear();
        self.bodies = 0;
    }

    /// Uniform slots the plan needs
    pub fn draw_count(&self) -> u32 {
        1 + self.skeleton.len() as u32
    }

    pub fn joint_count(&self) -> usize {
        self.skeleton
            .iter()
            .filter(|p| matches!(p, SkeletonPrimitive::Joint { .. }))
            .count()
    }

    pub fn bone_count(&self) -> usize {
        self.skeleton.len() - self.joint_count()
    }
}

/// Fill `plan` from `frame`: the reconstructed points, then for every body
/// and every joint a sphere and, when the joint has a parent, a bone to it.
pub fn plan_frame(
    engine: &PointCloudEngine,
    frame: &Frame,
    plan: &mut FramePlan,
) -> Result<(), ReconstructError> {
    plan.clear();
    engine.reconstruct_into(frame.capture.depth(), &mut plan.points)?;

    let Some(body_frame) = frame.bodies.as_ref() else {
        return Ok(());
    };
    plan.bodies = body_frame.bodies.len();
    for body in &body_frame.bodies {
        let color = body.color();
        for joint in JointId::ALL {
            let center = body.joint(joint);
            plan.skeleton.push(SkeletonPrimitive::Joint { center, color });
            if let Some(parent) = joint.parent() {
                plan.skeleton.push(SkeletonPrimitive::Bone {
                    start: center,
                    end: body.joint(parent),
                    color,
                });
            }
        }
    }
    Ok(())
}

/// Color attachment acquired for one tick
pub struct AcquiredFrame {
    pub view: wgpu::TextureView,
    surface_texture: Option<wgpu::SurfaceTexture>,
}

impl AcquiredFrame {
    pub fn offscreen(view: wgpu::TextureView) -> Self {
        Self {
            view,
            surface_texture: None,
        }
    }

    pub fn surface(texture: wgpu::SurfaceTexture) -> Self {
        let view = texture
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());
        Self {
            view,
            surface_texture: Some(texture),
        }
    }

    fn present(self) {
        if let Some(texture) = self.surface_texture {
            texture.present();
        }
    }
}

/// Where a tick renders to
pub trait RenderTarget {
    /// Current size in physical pixels
    fn size(&self) -> (u32, u32);

    /// Color attachment for this tick, `None` to skip drawing
    fn acquire(&mut self) -> Option<AcquiredFrame>;
}

/// Texture target for headless rendering
pub struct OffscreenTarget {
    texture: wgpu::Texture,
}

impl OffscreenTarget {
    pub fn new(device: &wgpu::Device, width: u32, height: u32, format: wgpu::TextureFormat) -> Self {
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("offscreen target"),
            size: wgpu::Extent3d {
                width: width.max(1),
                height: height.max(1),
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_SRC,
            view_formats: &[],
        });
        Self { texture }
    }

    pub fn texture(&self) -> &wgpu::Texture {
        &self.texture
    }
}

impl RenderTarget for OffscreenTarget {
    fn size(&self) -> (u32, u32) {
        (self.texture.width(), self.texture.height())
    }

    fn acquire(&mut self) -> Option<AcquiredFrame> {
        Some(AcquiredFrame::offscreen(
            self.texture
                .create_view(&wgpu::TextureViewDescriptor::default()),
        ))
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickStats {
    pub sequence: u64,
    pub points: usize,
    pub bodies: usize,
    pub spheres: usize,
    pub cylinders: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// No frame was pending
    Skipped,
    /// A frame was claimed but the target had nothing to draw into
    TargetUnavailable,
    Rendered(TickStats),
}

pub struct FrameOrchestrator {
    engine: PointCloudEngine,
    slot: Arc<FrameSlot>,
    pipeline: ShadingPipeline,
    uniforms: UniformArena,
    depth: DepthTarget,
    point_cloud: PointCloud,
    sphere: Sphere,
    cylinder: Cylinder,
    point_color: [f32; 4],
    joint_radius: f32,
    plan: FramePlan,
    ticks: u64,
    rendered: u64,
}

impl FrameOrchestrator {
    /// Build the GPU side. The engine's cache must already be built.
    pub fn new(
        device: &wgpu::Device,
        color_format: wgpu::TextureFormat,
        engine: PointCloudEngine,
        slot: Arc<FrameSlot>,
        config: &RenderConfig,
    ) -> Result<Self, RenderError> {
        let pipeline = ShadingPipeline::new(device, color_format)?;
        let uniforms = UniformArena::new(device, &pipeline, INITIAL_UNIFORM_SLOTS);
        let point_capacity = engine
            .table()
            .map_or(INITIAL_POINT_CAPACITY, |table| table.len());

        let orchestrator = Self {
            depth: DepthTarget::new(device, 1, 1),
            point_cloud: PointCloud::new(device, point_capacity),
            sphere: Sphere::new(device, config.sphere_sectors, config.sphere_stacks)?,
            cylinder: Cylinder::new(device, config.cylinder_sectors, config.bone_radius_mm)?,
            point_color: config.point_color,
            joint_radius: config.joint_radius_mm,
            engine,
            slot,
            pipeline,
            uniforms,
            plan: FramePlan::default(),
            ticks: 0,
            rendered: 0,
        };
        info!(
            point_capacity,
            sphere_sectors = config.sphere_sectors,
            cylinder_sectors = config.cylinder_sectors,
            "Frame orchestrator ready"
        );
        Ok(orchestrator)
    }

    pub fn engine(&self) -> &PointCloudEngine {
        &self.engine
    }

    /// Replace the unprojection cache after a calibration change
    pub fn recalibrate<P: DepthProjection + ?Sized>(&mut self, projection: &P) {
        self.engine.build_cache(projection);
    }

    /// Render the newest pending frame, if any, and release it.
    pub fn tick(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        target: &mut dyn RenderTarget,
        camera: &CameraMatrices,
    ) -> Result<TickOutcome, ReconstructError> {
        self.ticks += 1;

        let Some(frame) = self.slot.take() else {
            trace!("No pending frame");
            return Ok(TickOutcome::Skipped);
        };
        plan_frame(&self.engine, &frame, &mut self.plan)?;

        let Some(acquired) = target.acquire() else {
            debug!(sequence = frame.capture.sequence(), "Render target unavailable");
            return Ok(TickOutcome::TargetUnavailable);
        };

        let (width, height) = target.size();
        self.depth.ensure_size(device, width, height);
        self.uniforms
            .begin_frame(device, &self.pipeline, self.plan.draw_count());

        let mut stats = TickStats {
            sequence: frame.capture.sequence(),
            bodies: self.plan.bodies,
            ..Default::default()
        };

        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("frame encoder"),
        });
        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("frame pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &acquired.view,
                    depth_slice: None,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(CLEAR_COLOR),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: self.depth.view(),
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
                pipeline: &self.pipeline,
                uniforms: &mut self.uniforms,
                camera: *camera,
            };

            if self
                .point_cloud
                .render(&mut ctx, &self.plan.points, self.point_color)
            {
                stats.points = self.point_cloud.len();
            }

            for primitive in &self.plan.skeleton {
                match *primitive {
                    SkeletonPrimitive::Joint { center, color } => {
                        if self.sphere.render(&mut ctx, center, self.joint_radius, color) {
                            stats.spheres += 1;
                        }
                    }
                    SkeletonPrimitive::Bone { start, end, color } => {
                        if self.cylinder.render(&mut ctx, start, end, color) {
                            stats.cylinders += 1;
                        }
                    }
                }
            }
        }

        queue.submit(Some(encoder.finish()));
        acquired.present();
        drop(frame);

        self.rendered += 1;
        if self.rendered % STATS_LOG_INTERVAL == 0 {
            info!(
                ticks = self.ticks,
                rendered = self.rendered,
                dropped = self.slot.dropped_count(),
                points = stats.points,
                bodies = stats.bodies,
                "Frame statistics"
            );
        }
        Ok(TickOutcome::Rendered(stats))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::{Capture, DepthImage, SyntheticTracker};
    use crate::depth::Calibration;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn engine() -> PointCloudEngine {
        PointCloudEngine::with_projection(&Calibration::kinect(32, 24))
    }

    fn frame(bodies: u32) -> Frame {
        let mut depth = DepthImage::filled(32, 24, 1500);
        depth.data_mut()[..32].fill(0);
        let capture = Capture::new(depth, 1, Duration::ZERO);
        let tracked = (bodies > 0).then(|| SyntheticTracker::new(bodies).pose(Duration::ZERO));
        Frame::new(capture, tracked)
    }

    #[test]
    fn test_plan_without_bodies_draws_points_only() {
        let mut plan = FramePlan::default();
        plan_frame(&engine(), &frame(0), &mut plan).unwrap();

        assert_eq!(plan.points.len(), 32 * 23);
        assert!(plan.skeleton.is_empty());
        assert_eq!(plan.draw_count(), 1);
    }

    #[test]
    fn test_plan_counts_per_body() {
        let mut plan = FramePlan::default();
        plan_frame(&engine(), &frame(2), &mut plan).unwrap();

        assert_eq!(plan.bodies, 2);
        assert_eq!(plan.joint_count(), 2 * JointId::COUNT);
        assert_eq!(plan.bone_count(), 2 * (JointId::COUNT - 1));
        assert_eq!(plan.draw_count() as usize, 1 + 2 * (2 * JointId::COUNT - 1));
    }

    #[test]
    fn test_plan_uses_body_color() {
        let mut plan = FramePlan::default();
        plan_frame(&engine(), &frame(2), &mut plan).unwrap();

        let second_body = &plan.skeleton[2 * JointId::COUNT - 1];
        match second_body {
            SkeletonPrimitive::Joint { color, .. } => {
                assert_eq!(*color, crate::constants::colors::body_color(1));
            }
            other => panic!("expected joint, got {:?}", other),
        }
    }

    #[test]
    fn test_plan_requires_cache() {
        let mut plan = FramePlan::default();
        assert_eq!(
            plan_frame(&PointCloudEngine::new(), &frame(0), &mut plan),
            Err(ReconstructError::CacheNotBuilt)
        );
    }

    #[test]
    fn test_tick_renders_releases_and_recalibrates() {
        let instance = crate::gpu::create_instance();
        let (_adapter, device, queue, _) =
            match pollster::block_on(crate::gpu::create_device(&instance, None, "tick test")) {
                Ok(created) => created,
                Err(e) => {
                    println!("Skipping test (no GPU): {}", e);
                    return;
                }
            };

        let format = wgpu::TextureFormat::Rgba8Unorm;
        let slot = Arc::new(FrameSlot::new());
        let mut orchestrator = FrameOrchestrator::new(
            &device,
            format,
            engine(),
            Arc::clone(&slot),
            &RenderConfig::default(),
        )
        .unwrap();
        let mut target = OffscreenTarget::new(&device, 64, 48, format);
        let camera = CameraMatrices::default();

        assert_eq!(
            orchestrator
                .tick(&device, &queue, &mut target, &camera)
                .unwrap(),
            TickOutcome::Skipped
        );

        let released = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&released);
        let tracked = frame(1);
        let capture = Capture::with_release(
            tracked.capture.depth().clone(),
            9,
            Duration::ZERO,
            Box::new(move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
            }),
        );
        slot.publish(Frame::new(capture, tracked.bodies.clone()));

        let outcome = orchestrator
            .tick(&device, &queue, &mut target, &camera)
            .unwrap();
        let TickOutcome::Rendered(stats) = outcome else {
            panic!("expected a rendered tick, got {:?}", outcome);
        };
        assert_eq!(stats.sequence, 9);
        assert_eq!(stats.points, 32 * 23);
        assert_eq!(stats.spheres, JointId::COUNT);
        assert_eq!(stats.cylinders, JointId::COUNT - 1);
        assert_eq!(released.load(Ordering::SeqCst), 1);
        assert!(slot.is_empty());

        // Higher resolution than the cache and point buffer were sized for
        orchestrator.recalibrate(&Calibration::kinect(48, 36));
        assert_eq!(
            orchestrator.engine().table().map(|t| t.dimensions()),
            Some((48, 36))
        );

        let capture = Capture::new(DepthImage::filled(48, 36, 1200), 10, Duration::ZERO);
        slot.publish(Frame::new(capture, None));
        let outcome = orchestrator
            .tick(&device, &queue, &mut target, &camera)
            .unwrap();
        let TickOutcome::Rendered(stats) = outcome else {
            panic!("expected a rendered tick, got {:?}", outcome);
        };
        assert_eq!(stats.sequence, 10);
        assert_eq!(stats.points, 48 * 36);
        assert_eq!(stats.spheres, 0);

        // Frames at the old resolution no longer match the cache
        slot.publish(frame(0));
        assert_eq!(
            orchestrator.tick(&device, &queue, &mut target, &camera),
            Err(ReconstructError::DimensionMismatch {
                expected: (48, 36),
                actual: (32, 24),
            })
        );
        assert!(slot.is_empty());
    }
}
