// SPDX-License-Identifier: MPL-2.0

//! Integration tests for constants module

use depthcloud::constants::{colors, primitives, reconstruction, rendering};

#[test]
fn test_synthetic_depth_is_positive() {
    assert!(reconstruction::SYNTHETIC_DEPTH > 0.0);
}

#[test]
fn test_placeholder_normal_is_unit() {
    let [x, y, z] = reconstruction::PLACEHOLDER_NORMAL;
    assert!(((x * x + y * y + z * z).sqrt() - 1.0).abs() < 1e-6);
}

#[test]
fn test_clip_planes_ordered() {
    assert!(rendering::Z_NEAR > 0.0);
    assert!(rendering::Z_FAR > rendering::Z_NEAR);
}

#[test]
fn test_bones_thinner_than_joints() {
    assert!(primitives::BONE_RADIUS_MM < primitives::JOINT_RADIUS_MM);
}

#[test]
fn test_body_palette_is_opaque() {
    for color in colors::BODY_PALETTE {
        assert_eq!(color[3], 1.0, "Body colors should be opaque");
    }
}

#[test]
fn test_point_cloud_is_translucent() {
    assert!(colors::POINT_CLOUD[3] < 1.0);
}
