// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! Common point cloud types and error handling for the segmentation stage.
//!
//! Point clouds use a structure-of-arrays (SoA) layout with a float
//! intensity channel. The projected grids reuse the same type with one cell
//! per `(row, column)` position; cells no return landed in hold a sentinel
//! point with NaN coordinates and intensity [`SENTINEL_INTENSITY`].

use serde::{Deserialize, Serialize};
use std::fmt;

/// Intensity value marking an empty grid cell.
pub const SENTINEL_INTENSITY: f32 = -1.0;

/// Structure-of-arrays point cloud with a float intensity channel.
///
/// The intensity carries different payloads depending on the owning cloud:
/// a packed `row + column/10000` grid index, a range in meters, or a cluster
/// id. All buffers are retained between sweeps to avoid steady-state
/// allocation.
#[derive(Clone, Debug, Default)]
pub struct PointCloud {
    pub x: Vec<f32>,
    pub y: Vec<f32>,
    pub z: Vec<f32>,
    pub intensity: Vec<f32>,
}

impl PointCloud {
    /// Create an empty cloud with pre-allocated capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            x: Vec::with_capacity(capacity),
            y: Vec::with_capacity(capacity),
            z: Vec::with_capacity(capacity),
            intensity: Vec::with_capacity(capacity),
        }
    }

    /// Create a grid cloud of `len` sentinel points.
    pub fn sentinel_grid(len: usize) -> Self {
        Self {
            x: vec![f32::NAN; len],
            y: vec![f32::NAN; len],
            z: vec![f32::NAN; len],
            intensity: vec![SENTINEL_INTENSITY; len],
        }
    }

    /// Number of points currently stored.
    #[inline]
    pub fn len(&self) -> usize {
        self.x.len()
    }

    /// Returns true if no points are stored.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.x.is_empty()
    }

    /// Clear all points while retaining capacity.
    pub fn clear(&mut self) {
        self.x.clear();
        self.y.clear();
        self.z.clear();
        self.intensity.clear();
    }

    /// Append a point.
    #[inline]
    pub fn push(&mut self, x: f32, y: f32, z: f32, intensity: f32) {
        self.x.push(x);
        self.y.push(y);
        self.z.push(z);
        self.intensity.push(intensity);
    }

    /// Append a copy of `src[idx]`.
    #[inline]
    pub fn push_from(&mut self, src: &PointCloud, idx: usize) {
        self.push(src.x[idx], src.y[idx], src.z[idx], src.intensity[idx]);
    }

    /// Overwrite the point at `idx` in place (grid clouds).
    #[inline]
    pub fn set(&mut self, idx: usize, x: f32, y: f32, z: f32, intensity: f32) {
        self.x[idx] = x;
        self.y[idx] = y;
        self.z[idx] = z;
        self.intensity[idx] = intensity;
    }

    /// Whether the grid cell at `idx` holds the sentinel point.
    #[inline]
    pub fn is_sentinel(&self, idx: usize) -> bool {
        self.intensity[idx] == SENTINEL_INTENSITY
    }

    /// Refill a grid cloud with sentinel points, keeping its length.
    pub fn fill_sentinel(&mut self) {
        self.x.fill(f32::NAN);
        self.y.fill(f32::NAN);
        self.z.fill(f32::NAN);
        self.intensity.fill(SENTINEL_INTENSITY);
    }
}

/// Per-sweep metadata mirroring the emitted segmented cloud.
///
/// The per-point arrays (`ground_flag`, `col_index`, `range`) are indexed
/// identically to the segmented cloud. `start_ring_index[r]` and
/// `end_ring_index[r]` bracket beam `r`'s contiguous run in that cloud,
/// inset by five points on each side so downstream curvature windows never
/// cross a beam boundary. An empty run is the pair `(4, -6)`.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct SegInfo {
    pub start_orientation: f32,
    pub end_orientation: f32,
    pub orientation_diff: f32,
    pub start_ring_index: Vec<i32>,
    pub end_ring_index: Vec<i32>,
    pub ground_flag: Vec<bool>,
    pub col_index: Vec<u32>,
    pub range: Vec<f32>,
}

impl SegInfo {
    /// Allocate the record for a sensor with `beams` rows and up to `cells`
    /// emitted points.
    pub fn with_capacity(beams: usize, cells: usize) -> Self {
        Self {
            start_orientation: 0.0,
            end_orientation: 0.0,
            orientation_diff: 0.0,
            start_ring_index: vec![0; beams],
            end_ring_index: vec![0; beams],
            ground_flag: Vec::with_capacity(cells),
            col_index: Vec::with_capacity(cells),
            range: Vec::with_capacity(cells),
        }
    }

    /// Clear the per-point arrays while retaining capacity.
    pub fn clear(&mut self) {
        self.start_orientation = 0.0;
        self.end_orientation = 0.0;
        self.orientation_diff = 0.0;
        self.start_ring_index.fill(0);
        self.end_ring_index.fill(0);
        self.ground_flag.clear();
        self.col_index.clear();
        self.range.clear();
    }
}

/// Common error type for the segmentation stage.
#[derive(Debug)]
pub enum Error {
    /// I/O error (socket, file operations)
    Io(std::io::Error),
    /// CDR payload could not be decoded
    Decode(String),
    /// Point cloud layout is missing or mismatching a required field
    PointLayout(String),
    /// Configuration error
    Config(String),
    /// Ring-bearing cloud contains removed points; the coordinate and ring
    /// views would desynchronize
    NonDenseRing,
}

impl std::error::Error for Error {}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Io(err) => write!(f, "I/O error: {}", err),
            Error::Decode(msg) => write!(f, "decode error: {}", msg),
            Error::PointLayout(msg) => write!(f, "point layout error: {}", msg),
            Error::Config(msg) => write!(f, "configuration error: {}", msg),
            Error::NonDenseRing => write!(
                f,
                "ring-bearing point cloud is not dense, remove NaN points first"
            ),
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_and_clear() {
        let mut cloud = PointCloud::with_capacity(4);
        cloud.push(1.0, 2.0, 3.0, 0.5);
        cloud.push(4.0, 5.0, 6.0, 7.25);
        assert_eq!(cloud.len(), 2);
        assert_eq!(cloud.y[1], 5.0);

        cloud.clear();
        assert!(cloud.is_empty());
    }

    #[test]
    fn test_sentinel_grid() {
        let mut grid = PointCloud::sentinel_grid(8);
        assert_eq!(grid.len(), 8);
        assert!(grid.is_sentinel(3));
        assert!(grid.x[3].is_nan());

        grid.set(3, 1.0, 2.0, 3.0, 0.0003);
        assert!(!grid.is_sentinel(3));

        grid.fill_sentinel();
        assert!(grid.is_sentinel(3));
        assert_eq!(grid.len(), 8);
    }

    #[test]
    fn test_seg_info_clear_keeps_ring_arrays() {
        let mut info = SegInfo::with_capacity(16, 64);
        info.ground_flag.push(true);
        info.col_index.push(10);
        info.range.push(4.5);
        info.start_ring_index[3] = 42;

        info.clear();
        assert_eq!(info.start_ring_index.len(), 16);
        assert_eq!(info.start_ring_index[3], 0);
        assert!(info.ground_flag.is_empty());
    }
}
