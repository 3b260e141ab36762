// SPDX-License-Identifier: GPL-3.0-only

//! Depth image to point cloud reconstruction
//!
//! Unprojecting a pixel through the camera model is the expensive part of
//! turning a depth image into points, and for a fixed calibration it only
//! depends on the pixel. [`UnprojectionTable`] evaluates the model once per
//! pixel at a reference depth and stores the direction scaled to one unit of
//! depth, so each frame reduces to a lookup and a multiply per pixel.

mod calibration;
mod unprojection;

pub use calibration::{Calibration, DepthProjection, Intrinsics};
pub use unprojection::{PointCloudEngine, UnprojectionTable};
