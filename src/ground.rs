// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! Inter-ring slope ground classification on the range image.
//!
//! For every column, the segment between vertically adjacent beams in the
//! lower part of the image is tested: if its elevation stays within
//! [`GROUND_ANGLE_TOLERANCE`] of the sensor mount angle, both cells are
//! ground. Comparing adjacent beams rather than fitting a global plane
//! tolerates curved ground and rolling terrain.

use crate::params::SensorParams;
use crate::range_image::RangeImage;
use ndarray::Array2;

/// Maximum deviation of the inter-ring segment from the mount angle for a
/// cell pair to count as ground, degrees. Absorbs sensor jitter and mild
/// terrain slope.
const GROUND_ANGLE_TOLERANCE: f32 = 10.0;

/// Ground/non-ground classification of range image cells.
///
/// Cell states: `-1` unknown (a neighbor is missing), `0` tested non-ground,
/// `1` ground. Only beams up to `ground_scan_max` participate; higher beams
/// point above the horizon and stay at `0`.
pub struct GroundClassifier {
    ground: Array2<i8>,
    ground_scan_max: usize,
    mount_angle: f32,
}

impl GroundClassifier {
    pub fn new(params: &SensorParams) -> Self {
        Self {
            ground: Array2::zeros((params.beams, params.columns)),
            ground_scan_max: params.ground_scan_max,
            mount_angle: params.mount_angle,
        }
    }

    /// Reset every cell to the untested state.
    pub fn reset(&mut self) {
        self.ground.fill(0);
    }

    /// Classify all columns of the projected sweep.
    pub fn classify(&mut self, image: &RangeImage) {
        let full = image.full_cloud();
        let cols = image.cols();

        for col in 0..cols {
            for beam in 0..self.ground_scan_max {
                let lower = beam * cols + col;
                let upper = (beam + 1) * cols + col;

                if full.is_sentinel(lower) || full.is_sentinel(upper) {
                    self.ground[[beam, col]] = -1;
                    continue;
                }

                let dx = full.x[upper] - full.x[lower];
                let dy = full.y[upper] - full.y[lower];
                let dz = full.z[upper] - full.z[lower];
                let angle = dz.atan2((dx * dx + dy * dy).sqrt()).to_degrees();

                if (angle - self.mount_angle).abs() <= GROUND_ANGLE_TOLERANCE {
                    self.ground[[beam, col]] = 1;
                    self.ground[[beam + 1, col]] = 1;
                }
            }
        }
    }

    #[inline]
    pub fn mat(&self) -> &Array2<i8> {
        &self.ground
    }

    #[inline]
    pub fn is_ground(&self, row: usize, col: usize) -> bool {
        self.ground[[row, col]] == 1
    }

    /// Highest beam index participating in classification.
    #[inline]
    pub fn ground_scan_max(&self) -> usize {
        self.ground_scan_max
    }
}
