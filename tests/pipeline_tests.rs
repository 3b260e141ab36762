// SPDX-License-Identifier: MPL-2.0

//! Capture to reconstruction integration tests

use std::sync::Arc;
use std::time::Duration;

use depthcloud::backends::{CaptureSession, DepthSensor, SyntheticSensor, SyntheticTracker};
use depthcloud::body::JointId;
use depthcloud::depth::Calibration;
use depthcloud::orchestrator::{FramePlan, plan_frame};
use depthcloud::{FrameSlot, PointCloudEngine};

#[test]
fn test_synthetic_frame_reconstructs_valid_pixels_only() {
    let mut sensor = SyntheticSensor::unpaced(Calibration::kinect(320, 240));
    let engine = PointCloudEngine::with_projection(&sensor.calibration());

    let capture = sensor.next_capture(Duration::from_millis(100)).unwrap();
    let points = engine.reconstruct(capture.depth()).unwrap();

    assert_eq!(points.len(), capture.depth().valid_pixel_count());
    assert!(points.iter().all(|p| p.position[2] > 0.0));
}

#[test]
fn test_session_step_feeds_plan() {
    let calibration = Calibration::kinect(160, 120);
    let engine = PointCloudEngine::with_projection(&calibration);
    let slot = Arc::new(FrameSlot::new());
    let mut session = CaptureSession::new(
        Box::new(SyntheticSensor::unpaced(calibration)),
        Some(Box::new(SyntheticTracker::new(3))),
        Arc::clone(&slot),
    );

    session.step();
    let frame = slot.take().expect("frame published");
    assert!(slot.take().is_none());

    let mut plan = FramePlan::default();
    plan_frame(&engine, &frame, &mut plan).unwrap();
    assert_eq!(plan.points.len(), frame.capture.depth().valid_pixel_count());
    assert_eq!(plan.joint_count(), 3 * JointId::COUNT);
    assert_eq!(plan.bone_count(), 3 * (JointId::COUNT - 1));
}

#[test]
fn test_unclaimed_frames_are_replaced() {
    let calibration = Calibration::kinect(64, 48);
    let slot = Arc::new(FrameSlot::new());
    let mut session = CaptureSession::new(
        Box::new(SyntheticSensor::unpaced(calibration)),
        None,
        Arc::clone(&slot),
    );

    for _ in 0..5 {
        session.step();
    }

    assert_eq!(slot.published_count(), 5);
    assert_eq!(slot.dropped_count(), 4);
    let frame = slot.take().unwrap();
    assert_eq!(frame.capture.sequence(), 4);
    assert!(frame.bodies.is_none());
}
