// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! Range-image projection of a single sweep.
//!
//! Each retained point is placed into a fixed `beams x columns` grid keyed by
//! beam elevation (row) and azimuth (column). Three views are maintained in
//! parallel:
//!
//! - `range`: the Euclidean range per cell, `f32::INFINITY` when empty
//! - `full_cloud`: the projected points with a packed `row + col/10000`
//!   intensity, sentinels for empty cells
//! - `full_info_cloud`: the same points with the range as intensity
//!
//! Rows run from the lowest-elevation beam upward. Column 0 sits at azimuth
//! -90 degrees from the forward (+y) axis, i.e. along -x, and columns
//! advance counter-clockwise. The sensor itself rotates clockwise viewed
//! from above, which is why the sweep azimuths below negate `atan2`.

use crate::cloud::PointCloud;
use crate::params::SensorParams;
use ndarray::Array2;
use std::f32::consts::PI;

/// Projected range image and sweep azimuth bounds.
///
/// All buffers are allocated once at construction and refilled per sweep via
/// [`reset`](Self::reset).
pub struct RangeImage {
    rows: usize,
    cols: usize,
    ang_res_x: f32,
    ang_res_y: f32,
    ang_bottom: f32,
    min_range: f32,
    range: Array2<f32>,
    full_cloud: PointCloud,
    full_info_cloud: PointCloud,
    start_orientation: f32,
    end_orientation: f32,
    orientation_diff: f32,
    dropped: usize,
}

impl RangeImage {
    pub fn new(params: &SensorParams) -> Self {
        let rows = params.beams;
        let cols = params.columns;
        Self {
            rows,
            cols,
            ang_res_x: params.ang_res_x,
            ang_res_y: params.ang_res_y,
            ang_bottom: params.ang_bottom,
            min_range: params.min_range,
            range: Array2::from_elem((rows, cols), f32::INFINITY),
            full_cloud: PointCloud::sentinel_grid(rows * cols),
            full_info_cloud: PointCloud::sentinel_grid(rows * cols),
            start_orientation: 0.0,
            end_orientation: 0.0,
            orientation_diff: 0.0,
            dropped: 0,
        }
    }

    /// Refill every buffer with its initial value for the next sweep.
    pub fn reset(&mut self) {
        self.range.fill(f32::INFINITY);
        self.full_cloud.fill_sentinel();
        self.full_info_cloud.fill_sentinel();
        self.start_orientation = 0.0;
        self.end_orientation = 0.0;
        self.orientation_diff = 0.0;
        self.dropped = 0;
    }

    /// Compute the start and end azimuth of this sweep from its first and
    /// last points, normalizing the span into `(pi, 3*pi)`.
    ///
    /// An empty sweep gets the neutral full-revolution bounds `(0, 2*pi)`.
    pub fn find_sweep_bounds(&mut self, cloud: &PointCloud) {
        if cloud.is_empty() {
            self.start_orientation = 0.0;
            self.end_orientation = 2.0 * PI;
            self.orientation_diff = 2.0 * PI;
            return;
        }

        let last = cloud.len() - 1;
        // The sensor spins clockwise; negating atan2 yields a non-decreasing
        // counter-clockwise azimuth within the sweep, modulo wrap.
        self.start_orientation = -cloud.y[0].atan2(cloud.x[0]);
        self.end_orientation = -cloud.y[last].atan2(cloud.x[last]) + 2.0 * PI;

        if self.end_orientation - self.start_orientation > 3.0 * PI {
            self.end_orientation -= 2.0 * PI;
        } else if self.end_orientation - self.start_orientation < PI {
            self.end_orientation += 2.0 * PI;
        }
        self.orientation_diff = self.end_orientation - self.start_orientation;
    }

    /// Project every retained point of the sweep into the grid.
    ///
    /// When `rings` is provided it must be aligned with `cloud` and supplies
    /// the row index directly; otherwise the row is derived from the beam
    /// elevation. Points that miss the grid, fall short of the minimum
    /// range, or carry non-finite coordinates are dropped; the count of
    /// drops is available from [`dropped`](Self::dropped).
    pub fn project(&mut self, cloud: &PointCloud, rings: Option<&[u16]>) {
        if let Some(rings) = rings {
            assert_eq!(rings.len(), cloud.len());
        }

        for i in 0..cloud.len() {
            let (x, y, z) = (cloud.x[i], cloud.y[i], cloud.z[i]);
            if !x.is_finite() || !y.is_finite() || !z.is_finite() {
                self.dropped += 1;
                continue;
            }

            let row = match rings {
                Some(rings) => rings[i] as i32,
                None => {
                    let vertical = z.atan2((x * x + y * y).sqrt()).to_degrees();
                    ((vertical + self.ang_bottom) / self.ang_res_y).floor() as i32
                }
            };
            if row < 0 || row >= self.rows as i32 {
                self.dropped += 1;
                continue;
            }
            let row = row as usize;

            // Angle from the +y axis, positive clockwise; column 0 lands at
            // azimuth -90 degrees and columns advance counter-clockwise.
            let horizon = x.atan2(y).to_degrees();
            let mut col = -((horizon - 90.0) / self.ang_res_x).round() as i32
                + self.cols as i32 / 2;
            if col >= self.cols as i32 {
                col -= self.cols as i32;
            }
            if col < 0 || col >= self.cols as i32 {
                self.dropped += 1;
                continue;
            }
            let col = col as usize;

            let range = (x * x + y * y + z * z).sqrt();
            if range < self.min_range {
                self.dropped += 1;
                continue;
            }

            // Within-cell collisions are near-identical returns; last wins.
            self.range[[row, col]] = range;
            let idx = row * self.cols + col;
            let packed = row as f32 + col as f32 / 10000.0;
            self.full_cloud.set(idx, x, y, z, packed);
            self.full_info_cloud.set(idx, x, y, z, range);
        }
    }

    #[inline]
    pub fn rows(&self) -> usize {
        self.rows
    }

    #[inline]
    pub fn cols(&self) -> usize {
        self.cols
    }

    /// Range matrix; `f32::INFINITY` marks cells no return landed in.
    #[inline]
    pub fn range(&self) -> &Array2<f32> {
        &self.range
    }

    /// Projected points with packed `row + col/10000` intensity.
    #[inline]
    pub fn full_cloud(&self) -> &PointCloud {
        &self.full_cloud
    }

    /// Projected points with the range as intensity.
    #[inline]
    pub fn full_info_cloud(&self) -> &PointCloud {
        &self.full_info_cloud
    }

    /// Whether the cell received at least one point.
    #[inline]
    pub fn is_valid(&self, row: usize, col: usize) -> bool {
        self.range[[row, col]].is_finite()
    }

    #[inline]
    pub fn start_orientation(&self) -> f32 {
        self.start_orientation
    }

    #[inline]
    pub fn end_orientation(&self) -> f32 {
        self.end_orientation
    }

    #[inline]
    pub fn orientation_diff(&self) -> f32 {
        self.orientation_diff
    }

    /// Points dropped by the last projection (degenerate or off-grid).
    #[inline]
    pub fn dropped(&self) -> usize {
        self.dropped
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params() -> SensorParams {
        SensorParams::vlp16()
    }

    /// Place a point at a given azimuth column, beam row, and range.
    fn beam_point(row: usize, col: usize, range: f32) -> (f32, f32, f32) {
        let elevation = (row as f32 * 2.0 - 15.0).to_radians();
        let theta = ((1350 - col as i32) as f32 / 5.0).to_radians();
        let horiz = range * elevation.cos();
        (
            horiz * theta.sin(),
            horiz * theta.cos(),
            range * elevation.sin(),
        )
    }

    #[test]
    fn test_projection_places_point() {
        let mut image = RangeImage::new(&params());
        let mut cloud = PointCloud::default();
        let (x, y, z) = beam_point(3, 640, 6.0);
        cloud.push(x, y, z, 0.0);

        image.project(&cloud, None);
        assert!(image.is_valid(3, 640));
        assert!((image.range()[[3, 640]] - 6.0).abs() < 1e-4);

        let idx = 3 * 1800 + 640;
        let packed = image.full_cloud().intensity[idx];
        assert_eq!(packed.floor() as usize, 3);
        assert_eq!(((packed - 3.0) * 10000.0).round() as usize, 640);
        assert!((image.full_info_cloud().intensity[idx] - 6.0).abs() < 1e-4);
        assert_eq!(image.dropped(), 0);
    }

    #[test]
    fn test_projection_ring_overrides_elevation() {
        let mut image = RangeImage::new(&params());
        let mut cloud = PointCloud::default();
        // Elevation maps this point to row 3; ring index says 9.
        let (x, y, z) = beam_point(3, 100, 5.0);
        cloud.push(x, y, z, 0.0);

        image.project(&cloud, Some(&[9]));
        assert!(image.is_valid(9, 100));
        assert!(!image.is_valid(3, 100));
    }

    #[test]
    fn test_projection_drops_degenerate_points() {
        let mut image = RangeImage::new(&params());
        let mut cloud = PointCloud::default();
        // Below minimum range.
        let (x, y, z) = beam_point(5, 10, 0.4);
        cloud.push(x, y, z, 0.0);
        // Above the top beam.
        cloud.push(0.0, 3.0, 4.0, 0.0);
        // Non-finite.
        cloud.push(f32::NAN, 1.0, 1.0, 0.0);

        image.project(&cloud, None);
        assert_eq!(image.dropped(), 3);
        for r in 0..16 {
            for c in 0..1800 {
                assert!(!image.is_valid(r, c));
            }
        }
    }

    #[test]
    fn test_last_point_wins_cell_collision() {
        let mut image = RangeImage::new(&params());
        let mut cloud = PointCloud::default();
        let (x, y, z) = beam_point(4, 900, 5.0);
        cloud.push(x, y, z, 0.0);
        let (x, y, z) = beam_point(4, 900, 5.02);
        cloud.push(x, y, z, 0.0);

        image.project(&cloud, None);
        assert!((image.range()[[4, 900]] - 5.02).abs() < 1e-4);
    }

    #[test]
    fn test_sweep_bounds_full_revolution() {
        let mut image = RangeImage::new(&params());
        let mut cloud = PointCloud::default();
        // Clockwise rotation: successive points move clockwise from +x.
        cloud.push(5.0, 0.0, 0.0, 0.0);
        cloud.push(5.0, -0.1, 0.0, 0.0);
        cloud.push(5.0, 0.1, 0.0, 0.0);

        image.find_sweep_bounds(&cloud);
        let diff = image.orientation_diff();
        assert!(diff > PI && diff < 3.0 * PI, "diff = {diff}");
        assert!((diff - 2.0 * PI).abs() < 0.1);
    }

    #[test]
    fn test_sweep_bounds_partial_sweep_normalized() {
        let mut image = RangeImage::new(&params());
        let mut cloud = PointCloud::default();
        // A sweep spanning just short of half a revolution still normalizes
        // into the (pi, 3*pi) window.
        cloud.push(5.0, 0.0, 0.0, 0.0);
        cloud.push(0.0, -5.0, 0.0, 0.0);

        image.find_sweep_bounds(&cloud);
        let diff = image.orientation_diff();
        assert!(diff > PI && diff < 3.0 * PI, "diff = {diff}");
    }

    #[test]
    fn test_sweep_bounds_empty_cloud() {
        let mut image = RangeImage::new(&params());
        image.find_sweep_bounds(&PointCloud::default());
        assert_eq!(image.start_orientation(), 0.0);
        assert!((image.orientation_diff() - 2.0 * PI).abs() < 1e-6);
    }

    #[test]
    fn test_reset_restores_initial_state() {
        let mut image = RangeImage::new(&params());
        let mut cloud = PointCloud::default();
        let (x, y, z) = beam_point(2, 50, 4.0);
        cloud.push(x, y, z, 0.0);
        image.find_sweep_bounds(&cloud);
        image.project(&cloud, None);
        assert!(image.is_valid(2, 50));

        image.reset();
        assert!(!image.is_valid(2, 50));
        assert!(image.full_cloud().is_sentinel(2 * 1800 + 50));
        assert_eq!(image.orientation_diff(), 0.0);
        assert_eq!(image.dropped(), 0);
    }
}
