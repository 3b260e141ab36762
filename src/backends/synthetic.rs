// SPDX-License-Identifier: GPL-3.0-only

//! Synthetic depth sensor and body tracker
//!
//! Deterministic stand-ins for hardware. The sensor renders a small scene
//! (back wall, floor, a ball orbiting in front of the wall) by casting one
//! ray per pixel through the calibration, then knocks out a border and a few
//! columns the way real time-of-flight sensors lose returns. The tracker
//! animates walking skeletons standing on the same floor.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use glam::{Quat, Vec3};
use tracing::{debug, info};

use super::{
    BackendError, BackendResult, BodyTracker, Capture, DepthImage, DepthSensor, TrackerWait,
};
use crate::body::{Body, BodyFrame, JointId};
use crate::constants::synthetic::*;
use crate::depth::{Calibration, DepthProjection};

type BufferPool = Arc<Mutex<Vec<Vec<u16>>>>;

/// Depth source that renders a moving scene
pub struct SyntheticSensor {
    calibration: Calibration,
    /// `None` produces frames as fast as they are pulled
    frame_interval: Option<Duration>,
    next_deadline: Instant,
    sequence: u64,
    pool: BufferPool,
}

impl SyntheticSensor {
    /// Sensor paced at `fps` frames per second
    pub fn new(calibration: Calibration, fps: u32) -> Self {
        let interval = Duration::from_secs(1) / fps.max(1);
        info!(
            width = calibration.width,
            height = calibration.height,
            fps,
            "Synthetic depth sensor opened"
        );
        Self {
            calibration,
            frame_interval: Some(interval),
            next_deadline: Instant::now(),
            sequence: 0,
            pool: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Sensor that never sleeps
    pub fn unpaced(calibration: Calibration) -> Self {
        Self {
            calibration,
            frame_interval: None,
            next_deadline: Instant::now(),
            sequence: 0,
            pool: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Buffers currently waiting for reuse
    pub fn pooled_buffers(&self) -> usize {
        self.pool.lock().map_or(0, |pool| pool.len())
    }

    fn wait_for_deadline(&mut self, timeout: Duration) -> BackendResult<()> {
        let Some(interval) = self.frame_interval else {
            return Ok(());
        };
        let now = Instant::now();
        let wait = self.next_deadline.saturating_duration_since(now);
        if wait > timeout {
            std::thread::sleep(timeout);
            return Err(BackendError::Timeout);
        }
        std::thread::sleep(wait);

        self.next_deadline += interval;
        // Fell behind by more than a frame: resync instead of bursting
        if self.next_deadline < now {
            self.next_deadline = now + interval;
        }
        Ok(())
    }

    fn acquire_buffer(&self) -> Vec<u16> {
        let reused = self.pool.lock().ok().and_then(|mut pool| pool.pop());
        let mut buffer = reused.unwrap_or_default();
        buffer.clear();
        buffer.resize(self.calibration.pixel_count(), 0);
        buffer
    }

    /// Scene time for the current frame
    fn scene_time(&self) -> f32 {
        let interval = self.frame_interval.unwrap_or(Duration::from_secs(1) / 30);
        self.sequence as f32 * interval.as_secs_f32()
    }

    fn render_scene(&self, buffer: &mut [u16], time: f32) {
        let width = self.calibration.width;
        let height = self.calibration.height;
        let ball = Vec3::new(
            700.0 * (time * 0.8).sin(),
            -150.0 + 250.0 * (time * 1.3).cos(),
            BALL_DEPTH_MM + 400.0 * (time * 0.8).cos(),
        );

        for row in 0..height {
            for col in 0..width {
                let index = row as usize * width as usize + col as usize;
                let border = row < INVALID_BORDER_PX
                    || col < INVALID_BORDER_PX
                    || row + INVALID_BORDER_PX >= height
                    || col + INVALID_BORDER_PX >= width;
                if border || col % DROPOUT_COLUMN_STRIDE == 0 {
                    buffer[index] = 0;
                    continue;
                }

                // Ray with unit depth step, so the hit parameter is the depth
                let ray = self.calibration.unproject(col as f32, row as f32, 1.0);
                let mut depth = f32::from(WALL_DEPTH_MM);
                if ray.y > 0.0 {
                    depth = depth.min(FLOOR_HEIGHT_MM / ray.y);
                }
                if let Some(hit) = ray_sphere(ray, ball, BALL_RADIUS_MM) {
                    depth = depth.min(hit);
                }
                buffer[index] = depth.clamp(0.0, f32::from(u16::MAX)) as u16;
            }
        }
    }
}

/// Nearest positive hit of a ray from the origin along `dir`
fn ray_sphere(dir: Vec3, center: Vec3, radius: f32) -> Option<f32> {
    let a = dir.length_squared();
    let b = -2.0 * dir.dot(center);
    let c = center.length_squared() - radius * radius;
    let disc = b * b - 4.0 * a * c;
    if disc < 0.0 {
        return None;
    }
    let t = (-b - disc.sqrt()) / (2.0 * a);
    (t > 0.0).then_some(t)
}

impl DepthSensor for SyntheticSensor {
    fn calibration(&self) -> Calibration {
        self.calibration
    }

    fn next_capture(&mut self, timeout: Duration) -> BackendResult<Capture> {
        self.wait_for_deadline(timeout)?;

        let time = self.scene_time();
        let mut buffer = self.acquire_buffer();
        self.render_scene(&mut buffer, time);

        let depth = DepthImage::new(self.calibration.width, self.calibration.height, buffer)?;
        let sequence = self.sequence;
        self.sequence += 1;

        let pool = Arc::clone(&self.pool);
        let release = Box::new(move |buffer: Vec<u16>| {
            if let Ok(mut pool) = pool.lock()
                && pool.len() < BUFFER_POOL_SIZE
            {
                pool.push(buffer);
            }
        });

        Ok(Capture::with_release(
            depth,
            sequence,
            Duration::from_secs_f32(time),
            release,
        ))
    }
}

/// Joint offsets from the pelvis in a standing pose (millimetres, +Y down)
const REST_POSE: [[f32; 3]; JointId::COUNT] = [
    [0.0, 0.0, 0.0],
    [0.0, -200.0, 0.0],
    [0.0, -380.0, 0.0],
    [0.0, -560.0, 0.0],
    [-40.0, -520.0, 0.0],
    [-180.0, -500.0, 0.0],
    [-200.0, -240.0, 0.0],
    [-210.0, -10.0, 0.0],
    [-215.0, 60.0, 0.0],
    [-220.0, 130.0, 0.0],
    [-180.0, 60.0, -30.0],
    [40.0, -520.0, 0.0],
    [180.0, -500.0, 0.0],
    [200.0, -240.0, 0.0],
    [210.0, -10.0, 0.0],
    [215.0, 60.0, 0.0],
    [220.0, 130.0, 0.0],
    [180.0, 60.0, -30.0],
    [-100.0, 40.0, 0.0],
    [-105.0, 450.0, 0.0],
    [-110.0, 860.0, 0.0],
    [-110.0, 900.0, -120.0],
    [100.0, 40.0, 0.0],
    [105.0, 450.0, 0.0],
    [110.0, 860.0, 0.0],
    [110.0, 900.0, -120.0],
    [0.0, -680.0, 0.0],
    [0.0, -660.0, -90.0],
    [-35.0, -700.0, -75.0],
    [-75.0, -680.0, 0.0],
    [35.0, -700.0, -75.0],
    [75.0, -680.0, 0.0],
];

/// Limb pivot for the swing animation and the direction it swings in
fn swing_pivot(joint: JointId) -> Option<(JointId, f32)> {
    use JointId::*;
    match joint {
        ElbowLeft | WristLeft | HandLeft | HandTipLeft | ThumbLeft => Some((ShoulderLeft, 1.0)),
        ElbowRight | WristRight | HandRight | HandTipRight | ThumbRight => {
            Some((ShoulderRight, -1.0))
        }
        KneeLeft | AnkleLeft | FootLeft => Some((HipLeft, -0.8)),
        KneeRight | AnkleRight | FootRight => Some((HipRight, 0.8)),
        _ => None,
    }
}

/// Tracker that returns animated skeletons for every capture it is given
pub struct SyntheticTracker {
    max_bodies: u32,
    pending: VecDeque<Duration>,
    queue_depth: usize,
}

impl SyntheticTracker {
    pub fn new(max_bodies: u32) -> Self {
        info!(max_bodies, "Synthetic body tracker started");
        Self {
            max_bodies,
            pending: VecDeque::new(),
            queue_depth: 3,
        }
    }

    /// Pose every body at scene time `timestamp`
    pub fn pose(&self, timestamp: Duration) -> BodyFrame {
        let time = timestamp.as_secs_f32();
        let count = self.max_bodies as f32;
        let bodies = (0..self.max_bodies)
            .map(|id| {
                let lane = id as f32 - (count - 1.0) * 0.5;
                let root = Vec3::new(
                    lane * BODY_SPACING_MM + 150.0 * (time * 0.5 + id as f32).sin(),
                    0.0,
                    BODY_DEPTH_MM + id as f32 * 300.0,
                );
                let swing = 0.5 * (time * std::f32::consts::TAU * 0.8 + id as f32).sin();
                walking_body(id, root, swing)
            })
            .collect();
        BodyFrame::new(bodies, timestamp)
    }
}

fn walking_body(id: u32, root: Vec3, swing: f32) -> Body {
    let rest = REST_POSE.map(Vec3::from);
    let mut joints = [Vec3::ZERO; JointId::COUNT];

    for joint in JointId::ALL {
        let offset = rest[joint.index()];
        let posed = match swing_pivot(joint) {
            Some((pivot, direction)) => {
                let pivot = rest[pivot.index()];
                pivot + Quat::from_rotation_x(swing * direction) * (offset - pivot)
            }
            None => offset,
        };
        joints[joint.index()] = root + posed;
    }

    Body::new(id, joints)
}

impl BodyTracker for SyntheticTracker {
    fn enqueue(&mut self, capture: &Capture) -> BackendResult<()> {
        if self.pending.len() >= self.queue_depth {
            return Err(BackendError::Tracker("tracker queue is full".to_string()));
        }
        self.pending.push_back(capture.timestamp());
        Ok(())
    }

    fn pop_result(&mut self, wait: TrackerWait) -> BackendResult<Option<BodyFrame>> {
        let Some(timestamp) = self.pending.pop_front() else {
            if let TrackerWait::Timeout(duration) = wait {
                std::thread::sleep(duration);
            }
            debug!("No tracking result ready");
            return Ok(None);
        };
        Ok(Some(self.pose(timestamp)))
    }
}
