// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! Sensor geometry parameters for the range-image pipeline.
//!
//! A [`SensorParams`] record describes the beam layout of a multi-beam
//! rotating scanner: how many beams it has, how many azimuth buckets a full
//! revolution spans, and the angular resolution in both directions. The
//! record is built once at startup (usually from a [`SensorModel`] preset),
//! validated, and then held immutable by the pipeline for its lifetime.

use crate::cloud::Error;
use clap::ValueEnum;
use std::fmt;

/// Sensor model presets for CLI dispatch.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum SensorModel {
    /// Velodyne VLP-16 (16 beams, 1800 columns)
    #[default]
    Vlp16,
    /// Velodyne HDL-32E (32 beams, 1800 columns)
    Hdl32e,
    /// Velodyne VLS-128 (128 beams, 1800 columns)
    Vls128,
    /// Ouster OS1-16 (16 beams, 1024 columns)
    Os1_16,
    /// Ouster OS1-64 (64 beams, 1024 columns)
    Os1_64,
}

impl fmt::Display for SensorModel {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            SensorModel::Vlp16 => write!(f, "vlp16"),
            SensorModel::Hdl32e => write!(f, "hdl32e"),
            SensorModel::Vls128 => write!(f, "vls128"),
            SensorModel::Os1_16 => write!(f, "os1-16"),
            SensorModel::Os1_64 => write!(f, "os1-64"),
        }
    }
}

/// Immutable sensor geometry for one scanner model.
///
/// Angles are degrees except [`segment_theta`](Self::segment_theta), which is
/// radians. Beam 0 is the lowest-elevation beam; rows in the range image run
/// from it upward.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SensorParams {
    /// Number of beams (rows of the range image).
    pub beams: usize,
    /// Azimuth buckets per revolution (columns of the range image).
    pub columns: usize,
    /// Horizontal angular resolution in degrees.
    pub ang_res_x: f32,
    /// Vertical angular resolution in degrees.
    pub ang_res_y: f32,
    /// Offset in degrees from the lowest beam up to horizontal.
    pub ang_bottom: f32,
    /// Highest beam index participating in ground classification.
    pub ground_scan_max: usize,
    /// Minimum valid return range in meters.
    pub min_range: f32,
    /// Sensor tilt from horizontal in degrees.
    pub mount_angle: f32,
    /// Angular-consistency threshold for segmentation, radians.
    pub segment_theta: f32,
    /// Take the row index from the per-point ring channel instead of
    /// deriving it from elevation. Requires a dense ring-bearing input.
    pub use_cloud_ring: bool,
}

impl SensorParams {
    /// Velodyne VLP-16.
    pub fn vlp16() -> Self {
        Self {
            beams: 16,
            columns: 1800,
            ang_res_x: 0.2,
            ang_res_y: 2.0,
            ang_bottom: 15.0 + 0.1,
            ground_scan_max: 7,
            ..Self::base()
        }
    }

    /// Velodyne HDL-32E.
    pub fn hdl32e() -> Self {
        Self {
            beams: 32,
            columns: 1800,
            ang_res_x: 360.0 / 1800.0,
            ang_res_y: 41.33 / 31.0,
            ang_bottom: 30.67,
            ground_scan_max: 20,
            ..Self::base()
        }
    }

    /// Velodyne VLS-128.
    pub fn vls128() -> Self {
        Self {
            beams: 128,
            columns: 1800,
            ang_res_x: 0.2,
            ang_res_y: 0.3,
            ang_bottom: 25.0,
            ground_scan_max: 10,
            ..Self::base()
        }
    }

    /// Ouster OS1-16.
    pub fn os1_16() -> Self {
        Self {
            beams: 16,
            columns: 1024,
            ang_res_x: 360.0 / 1024.0,
            ang_res_y: 33.2 / 15.0,
            ang_bottom: 16.6 + 0.1,
            ground_scan_max: 7,
            ..Self::base()
        }
    }

    /// Ouster OS1-64.
    pub fn os1_64() -> Self {
        Self {
            beams: 64,
            columns: 1024,
            ang_res_x: 360.0 / 1024.0,
            ang_res_y: 33.2 / 63.0,
            ang_bottom: 16.6 + 0.1,
            ground_scan_max: 15,
            ..Self::base()
        }
    }

    /// Shared defaults for every preset.
    fn base() -> Self {
        Self {
            beams: 0,
            columns: 0,
            ang_res_x: 0.0,
            ang_res_y: 0.0,
            ang_bottom: 0.0,
            ground_scan_max: 0,
            min_range: 1.0,
            mount_angle: 0.0,
            segment_theta: 60.0_f32.to_radians(),
            use_cloud_ring: false,
        }
    }

    /// Build parameters for a named preset.
    pub fn for_model(model: SensorModel) -> Self {
        match model {
            SensorModel::Vlp16 => Self::vlp16(),
            SensorModel::Hdl32e => Self::hdl32e(),
            SensorModel::Vls128 => Self::vls128(),
            SensorModel::Os1_16 => Self::os1_16(),
            SensorModel::Os1_64 => Self::os1_64(),
        }
    }

    /// Check the record once at construction time.
    pub fn validate(&self) -> Result<(), Error> {
        if self.beams == 0 || self.columns == 0 {
            return Err(Error::Config(format!(
                "sensor grid must be non-empty, got {}x{}",
                self.beams, self.columns
            )));
        }
        // Row and column indices travel through the BFS queues as u16.
        if self.beams > u16::MAX as usize || self.columns > u16::MAX as usize {
            return Err(Error::Config(format!(
                "sensor grid {}x{} exceeds the index range",
                self.beams, self.columns
            )));
        }
        if self.ground_scan_max >= self.beams {
            return Err(Error::Config(format!(
                "ground beam bound {} out of range for {} beams",
                self.ground_scan_max, self.beams
            )));
        }
        if !self.use_cloud_ring && (self.ang_res_y <= 0.0 || self.ang_res_x <= 0.0) {
            return Err(Error::Config(
                "angular resolution must be positive".to_string(),
            ));
        }
        if self.min_range < 0.0 {
            return Err(Error::Config(format!(
                "minimum range must be non-negative, got {}",
                self.min_range
            )));
        }
        if self.segment_theta <= 0.0 || self.segment_theta >= std::f32::consts::PI / 2.0 {
            return Err(Error::Config(format!(
                "segmentation threshold must lie in (0, pi/2), got {}",
                self.segment_theta
            )));
        }
        Ok(())
    }

    /// Horizontal angular resolution in radians.
    #[inline]
    pub fn alpha_x(&self) -> f32 {
        self.ang_res_x.to_radians()
    }

    /// Vertical angular resolution in radians.
    #[inline]
    pub fn alpha_y(&self) -> f32 {
        self.ang_res_y.to_radians()
    }

    /// Total cell count of the range image.
    #[inline]
    pub fn cells(&self) -> usize {
        self.beams * self.columns
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_presets_validate() {
        for model in [
            SensorModel::Vlp16,
            SensorModel::Hdl32e,
            SensorModel::Vls128,
            SensorModel::Os1_16,
            SensorModel::Os1_64,
        ] {
            let params = SensorParams::for_model(model);
            params.validate().unwrap_or_else(|e| {
                panic!("preset {model} should validate: {e}");
            });
        }
    }

    #[test]
    fn test_vlp16_geometry() {
        let p = SensorParams::vlp16();
        assert_eq!(p.beams, 16);
        assert_eq!(p.columns, 1800);
        assert_eq!(p.cells(), 28800);
        assert!((p.alpha_x() - 0.2_f32.to_radians()).abs() < 1e-7);
        assert!((p.segment_theta - std::f32::consts::PI / 3.0).abs() < 1e-6);
    }

    #[test]
    fn test_validate_rejects_bad_grid() {
        let mut p = SensorParams::vlp16();
        p.beams = 0;
        assert!(p.validate().is_err());

        let mut p = SensorParams::vlp16();
        p.ground_scan_max = 16;
        assert!(p.validate().is_err());

        let mut p = SensorParams::vlp16();
        p.segment_theta = 2.0;
        assert!(p.validate().is_err());
    }
}
