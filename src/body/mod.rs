// SPDX-License-Identifier: GPL-3.0-only

//! Tracked skeletons and joint topology
//!
//! Joints follow the 32-joint body tracking layout used by time-of-flight
//! depth cameras. Positions are in sensor space, millimetres.

use std::time::Duration;

use glam::Vec3;

/// Joint enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum JointId {
    Pelvis,
    SpineNavel,
    SpineChest,
    Neck,
    ClavicleLeft,
    ShoulderLeft,
    ElbowLeft,
    WristLeft,
    HandLeft,
    HandTipLeft,
    ThumbLeft,
    ClavicleRight,
    ShoulderRight,
    ElbowRight,
    WristRight,
    HandRight,
    HandTipRight,
    ThumbRight,
    HipLeft,
    KneeLeft,
    AnkleLeft,
    FootLeft,
    HipRight,
    KneeRight,
    AnkleRight,
    FootRight,
    Head,
    Nose,
    EyeLeft,
    EarLeft,
    EyeRight,
    EarRight,
}

impl JointId {
    pub const COUNT: usize = 32;

    /// Every joint in enumeration order
    pub const ALL: [JointId; Self::COUNT] = [
        JointId::Pelvis,
        JointId::SpineNavel,
        JointId::SpineChest,
        JointId::Neck,
        JointId::ClavicleLeft,
        JointId::ShoulderLeft,
        JointId::ElbowLeft,
        JointId::WristLeft,
        JointId::HandLeft,
        JointId::HandTipLeft,
        JointId::ThumbLeft,
        JointId::ClavicleRight,
        JointId::ShoulderRight,
        JointId::ElbowRight,
        JointId::WristRight,
        JointId::HandRight,
        JointId::HandTipRight,
        JointId::ThumbRight,
        JointId::HipLeft,
        JointId::KneeLeft,
        JointId::AnkleLeft,
        JointId::FootLeft,
        JointId::HipRight,
        JointId::KneeRight,
        JointId::AnkleRight,
        JointId::FootRight,
        JointId::Head,
        JointId::Nose,
        JointId::EyeLeft,
        JointId::EarLeft,
        JointId::EyeRight,
        JointId::EarRight,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    /// Parent joint, `None` for the root
    pub fn parent(self) -> Option<JointId> {
        use JointId::*;
        let parent = match self {
            Pelvis => return None,
            SpineNavel | HipLeft | HipRight => Pelvis,
            SpineChest => SpineNavel,
            Neck | ClavicleLeft | ClavicleRight => SpineChest,
            ShoulderLeft => ClavicleLeft,
            ElbowLeft => ShoulderLeft,
            WristLeft => ElbowLeft,
            HandLeft | ThumbLeft => WristLeft,
            HandTipLeft => HandLeft,
            ShoulderRight => ClavicleRight,
            ElbowRight => ShoulderRight,
            WristRight => ElbowRight,
            HandRight | ThumbRight => WristRight,
            HandTipRight => HandRight,
            KneeLeft => HipLeft,
            AnkleLeft => KneeLeft,
            FootLeft => AnkleLeft,
            KneeRight => HipRight,
            AnkleRight => KneeRight,
            FootRight => AnkleRight,
            Head => Neck,
            Nose | EyeLeft | EarLeft | EyeRight | EarRight => Head,
        };
        Some(parent)
    }
}

/// One tracked person
#[derive(Debug, Clone, PartialEq)]
pub struct Body {
    pub id: u32,
    pub joints: [Vec3; JointId::COUNT],
}

impl Body {
    pub fn new(id: u32, joints: [Vec3; JointId::COUNT]) -> Self {
        Self { id, joints }
    }

    pub fn joint(&self, joint: JointId) -> Vec3 {
        self.joints[joint.index()]
    }

    /// `(child, parent)` position pairs for every joint that has a parent
    pub fn bones(&self) -> impl Iterator<Item = (Vec3, Vec3)> + '_ {
        JointId::ALL.iter().filter_map(move |&joint| {
            joint
                .parent()
                .map(|parent| (self.joint(joint), self.joint(parent)))
        })
    }

    pub fn color(&self) -> [f32; 4] {
        crate::constants::colors::body_color(self.id)
    }
}

/// Skeletons extracted from one capture
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BodyFrame {
    pub bodies: Vec<Body>,
    /// Timestamp of the capture the result belongs to
    pub timestamp: Duration,
}

impl BodyFrame {
    pub fn new(bodies: Vec<Body>, timestamp: Duration) -> Self {
        Self { bodies, timestamp }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_joint_order_matches_index() {
        for (i, joint) in JointId::ALL.iter().enumerate() {
            assert_eq!(joint.index(), i);
        }
    }

    #[test]
    fn test_single_root() {
        let roots: Vec<_> = JointId::ALL.iter().filter(|j| j.parent().is_none()).collect();
        assert_eq!(roots, vec![&JointId::Pelvis]);
    }

    #[test]
    fn test_topology_reaches_root() {
        for joint in JointId::ALL {
            let mut current = joint;
            let mut hops = 0;
            while let Some(parent) = current.parent() {
                current = parent;
                hops += 1;
                assert!(hops < JointId::COUNT, "cycle at {:?}", joint);
            }
            assert_eq!(current, JointId::Pelvis);
        }
    }

    #[test]
    fn test_bone_count() {
        let body = Body::new(3, [Vec3::ZERO; JointId::COUNT]);
        assert_eq!(body.bones().count(), JointId::COUNT - 1);
    }
}
