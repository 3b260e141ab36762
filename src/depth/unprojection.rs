// SPDX-License-Identifier: GPL-3.0-only

//! Per-pixel unprojection cache and point cloud reconstruction

use glam::Vec3;
use tracing::{debug, info};

use super::calibration::DepthProjection;
use crate::backends::DepthImage;
use crate::constants::reconstruction::{PLACEHOLDER_NORMAL, SYNTHETIC_DEPTH};
use crate::errors::ReconstructError;
use crate::render::Vertex;

/// 3D offset per unit of depth for every pixel of one calibration
#[derive(Debug, Clone, PartialEq)]
pub struct UnprojectionTable {
    width: u32,
    height: u32,
    offsets: Vec<Vec3>,
}

impl UnprojectionTable {
    /// Evaluate the camera model at [`SYNTHETIC_DEPTH`] for every pixel and
    /// normalise each result to one unit of depth.
    pub fn build<P: DepthProjection + ?Sized>(projection: &P) -> Self {
        let (width, height) = projection.resolution();
        let mut offsets = Vec::with_capacity(width as usize * height as usize);

        for row in 0..height {
            for col in 0..width {
                let point = projection.unproject(col as f32, row as f32, SYNTHETIC_DEPTH);
                offsets.push(point / SYNTHETIC_DEPTH);
            }
        }

        Self {
            width,
            height,
            offsets,
        }
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn len(&self) -> usize {
        self.offsets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.offsets.is_empty()
    }

    /// Offset for `(row, col)`, or `None` outside the table
    pub fn get(&self, row: u32, col: u32) -> Option<Vec3> {
        if row >= self.height || col >= self.width {
            return None;
        }
        self.offsets
            .get(row as usize * self.width as usize + col as usize)
            .copied()
    }

    /// Append one vertex per nonzero depth sample to `out`.
    ///
    /// Returns the number of points written.
    pub fn reconstruct_into(
        &self,
        depth: &DepthImage,
        out: &mut Vec<Vertex>,
    ) -> Result<usize, ReconstructError> {
        if depth.dimensions() != self.dimensions() {
            return Err(ReconstructError::DimensionMismatch {
                expected: self.dimensions(),
                actual: depth.dimensions(),
            });
        }

        let start = out.len();
        out.extend(
            self.offsets
                .iter()
                .zip(depth.data())
                .filter(|(_, d)| **d > 0)
                .map(|(offset, &d)| Vertex::new(*offset * f32::from(d), PLACEHOLDER_NORMAL)),
        );
        Ok(out.len() - start)
    }
}

/// Owns the unprojection cache for the active calibration
///
/// Built once by setup code before capture starts and read-only while
/// frames are being reconstructed. A new calibration replaces the whole
/// table through [`build_cache`](Self::build_cache).
#[derive(Debug, Default)]
pub struct PointCloudEngine {
    table: Option<UnprojectionTable>,
}

impl PointCloudEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Engine with its cache already built for `projection`
    pub fn with_projection<P: DepthProjection + ?Sized>(projection: &P) -> Self {
        let mut engine = Self::new();
        engine.build_cache(projection);
        engine
    }

    pub fn build_cache<P: DepthProjection + ?Sized>(&mut self, projection: &P) {
        let table = UnprojectionTable::build(projection);
        let (width, height) = table.dimensions();
        if self.table.is_some() {
            info!(width, height, "Rebuilding unprojection table");
        } else {
            info!(width, height, "Unprojection table built");
        }
        self.table = Some(table);
    }

    pub fn is_ready(&self) -> bool {
        self.table.is_some()
    }

    pub fn table(&self) -> Option<&UnprojectionTable> {
        self.table.as_ref()
    }

    /// Point list for one depth frame
    pub fn reconstruct(&self, depth: &DepthImage) -> Result<Vec<Vertex>, ReconstructError> {
        let mut points = Vec::new();
        self.reconstruct_into(depth, &mut points)?;
        Ok(points)
    }

    /// Clear `out` and fill it with the points for `depth`, reusing its
    /// allocation.
    pub fn reconstruct_into(
        &self,
        depth: &DepthImage,
        out: &mut Vec<Vertex>,
    ) -> Result<usize, ReconstructError> {
        let table = self.table.as_ref().ok_or(ReconstructError::CacheNotBuilt)?;
        out.clear();
        let count = table.reconstruct_into(depth, out)?;
        debug!(
            points = count,
            pixels = table.len(),
            "Reconstructed point cloud"
        );
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::depth::{Calibration, Intrinsics};

    fn small_calibration() -> Calibration {
        Calibration::new(
            8,
            6,
            Intrinsics {
                fx: 5.0,
                fy: 5.0,
                cx: 3.5,
                cy: 2.5,
            },
        )
    }

    #[test]
    fn test_constant_depth_round_trip() {
        let calibration = small_calibration();
        let engine = PointCloudEngine::with_projection(&calibration);
        let table = engine.table().unwrap();

        let depth = DepthImage::filled(8, 6, 1234);
        let points = engine.reconstruct(&depth).unwrap();
        assert_eq!(points.len(), 48);

        for row in 0..6 {
            for col in 0..8 {
                let expected = table.get(row, col).unwrap() * 1234.0;
                let point = points[(row * 8 + col) as usize];
                assert_eq!(Vec3::from(point.position), expected);
                assert_eq!(point.normal, PLACEHOLDER_NORMAL);
            }
        }
    }

    #[test]
    fn test_zero_depth_pixels_are_omitted() {
        let engine = PointCloudEngine::with_projection(&small_calibration());
        let mut depth = DepthImage::filled(8, 6, 0);
        depth.data_mut()[3] = 800;
        depth.data_mut()[17] = 2000;
        depth.data_mut()[47] = 1;

        let points = engine.reconstruct(&depth).unwrap();
        assert_eq!(points.len(), depth.valid_pixel_count());
        assert_eq!(points.len(), 3);
        assert_eq!(points[1].position[2], 2000.0);
    }

    #[test]
    fn test_empty_frame_yields_no_points() {
        let engine = PointCloudEngine::with_projection(&small_calibration());
        let points = engine.reconstruct(&DepthImage::filled(8, 6, 0)).unwrap();
        assert!(points.is_empty());
    }

    #[test]
    fn test_reconstruct_before_cache_fails() {
        let engine = PointCloudEngine::new();
        assert!(!engine.is_ready());
        assert_eq!(
            engine.reconstruct(&DepthImage::filled(8, 6, 1000)),
            Err(ReconstructError::CacheNotBuilt)
        );
    }

    #[test]
    fn test_dimension_mismatch() {
        let engine = PointCloudEngine::with_projection(&small_calibration());
        let err = engine
            .reconstruct(&DepthImage::filled(4, 4, 1000))
            .unwrap_err();
        assert_eq!(
            err,
            ReconstructError::DimensionMismatch {
                expected: (8, 6),
                actual: (4, 4),
            }
        );
    }

    #[test]
    fn test_rebuild_replaces_table() {
        let mut engine = PointCloudEngine::with_projection(&small_calibration());
        engine.build_cache(&Calibration::kinect(64, 48));

        let table = engine.table().unwrap();
        assert_eq!(table.dimensions(), (64, 48));
        assert_eq!(table.len(), 64 * 48);
        assert!(engine.reconstruct(&DepthImage::filled(64, 48, 500)).is_ok());
        assert!(engine.reconstruct(&DepthImage::filled(8, 6, 500)).is_err());
    }

    #[test]
    fn test_table_entries_are_unit_depth() {
        let table = UnprojectionTable::build(&small_calibration());
        for row in 0..6 {
            for col in 0..8 {
                assert!((table.get(row, col).unwrap().z - 1.0).abs() < 1e-6);
            }
        }
        assert_eq!(table.get(6, 0), None);
    }

    #[test]
    fn test_reconstruct_into_reuses_buffer() {
        let engine = PointCloudEngine::with_projection(&small_calibration());
        let mut points = Vec::with_capacity(64);
        engine
            .reconstruct_into(&DepthImage::filled(8, 6, 900), &mut points)
            .unwrap();
        let count = engine
            .reconstruct_into(&DepthImage::filled(8, 6, 0), &mut points)
            .unwrap();
        assert_eq!(count, 0);
        assert!(points.is_empty());
    }
}
