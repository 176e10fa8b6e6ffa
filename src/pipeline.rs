// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! Per-sweep segmentation pipeline.
//!
//! [`SweepSegmenter`] runs the fixed stage order once per incoming sweep:
//!
//! 1. sweep azimuth bounds
//! 2. range-image projection
//! 3. ground classification
//! 4. BFS segmentation of the non-ground cells
//! 5. output assembly (four clouds + per-sweep metadata)
//!
//! Every buffer is allocated at construction and reused; a sweep begins by
//! returning all scratch state to its initial value, so nothing carries over
//! between sweeps. The outputs of the previous sweep stay readable until the
//! next call, mirroring the client-owned frame pattern used elsewhere in
//! this codebase.

use crate::cloud::{PointCloud, SegInfo};
use crate::ground::GroundClassifier;
use crate::params::SensorParams;
use crate::range_image::RangeImage;
use crate::segmentation::{ComponentLabeler, LABEL_REJECTED};
use std::time::{Duration, Instant};

/// Column stride of ground points retained in the segmented cloud. One
/// ground point in five is enough to constrain roll, pitch and z downstream.
const GROUND_STRIDE: usize = 5;
/// Column stride of rejected cells retained in the outlier cloud.
const OUTLIER_STRIDE: usize = 5;
/// Points trimmed from each end of a beam's run so downstream curvature
/// windows never cross into a neighboring beam.
const RING_MARGIN: i32 = 5;

/// The four emitted point sets and the metadata record of one sweep.
#[derive(Debug, Default)]
pub struct SweepOutput {
    /// Retained (downsampled) ground plus all segmented non-ground points,
    /// beam-then-column ordered; feeds feature extraction.
    pub segmented_cloud: PointCloud,
    /// Segmented non-ground points only, intensity overwritten with the
    /// cluster id.
    pub segmented_cloud_pure: PointCloud,
    /// Every ground cell.
    pub ground_cloud: PointCloud,
    /// Rejected non-ground cells kept as weak geometric evidence.
    pub outlier_cloud: PointCloud,
    /// Per-sweep metadata mirroring `segmented_cloud`.
    pub seg_info: SegInfo,
}

/// Wall-clock spent in each pipeline stage of the last sweep.
#[derive(Clone, Copy, Debug, Default)]
pub struct StageTimings {
    pub reset: Duration,
    pub project: Duration,
    pub ground: Duration,
    pub segment: Duration,
    pub assemble: Duration,
}

/// Single-threaded segmentation pipeline for one scanner.
pub struct SweepSegmenter {
    params: SensorParams,
    image: RangeImage,
    ground: GroundClassifier,
    labeler: ComponentLabeler,
    output: SweepOutput,
    timings: StageTimings,
}

impl SweepSegmenter {
    /// Build the pipeline, validating the sensor record once.
    pub fn new(params: SensorParams) -> Result<Self, crate::cloud::Error> {
        params.validate()?;
        let cells = params.cells();
        Ok(Self {
            params,
            image: RangeImage::new(&params),
            ground: GroundClassifier::new(&params),
            labeler: ComponentLabeler::new(&params),
            output: SweepOutput {
                segmented_cloud: PointCloud::with_capacity(cells),
                segmented_cloud_pure: PointCloud::with_capacity(cells),
                ground_cloud: PointCloud::with_capacity(cells),
                outlier_cloud: PointCloud::with_capacity(cells),
                seg_info: SegInfo::with_capacity(params.beams, cells),
            },
            timings: StageTimings::default(),
        })
    }

    /// Process one sanitized sweep.
    ///
    /// `rings`, when present, must be aligned with `cloud` and carries the
    /// physical beam index of each point. The results are available from
    /// [`output`](Self::output) and the grid accessors until the next call.
    pub fn process(&mut self, cloud: &PointCloud, rings: Option<&[u16]>) {
        let t0 = Instant::now();
        self.reset();
        self.timings.reset = t0.elapsed();

        let t0 = Instant::now();
        self.image.find_sweep_bounds(cloud);
        self.image.project(cloud, rings);
        self.timings.project = t0.elapsed();

        let t0 = Instant::now();
        self.ground.classify(&self.image);
        self.labeler.exclude(self.ground.mat(), self.image.range());
        self.timings.ground = t0.elapsed();

        let t0 = Instant::now();
        self.labeler.segment(self.image.range());
        self.timings.segment = t0.elapsed();

        let t0 = Instant::now();
        self.assemble();
        self.timings.assemble = t0.elapsed();
    }

    /// Return all scratch buffers and outputs to their initial state.
    fn reset(&mut self) {
        self.image.reset();
        self.ground.reset();
        self.labeler.reset();
        self.output.segmented_cloud.clear();
        self.output.segmented_cloud_pure.clear();
        self.output.ground_cloud.clear();
        self.output.outlier_cloud.clear();
        self.output.seg_info.clear();
    }

    /// Build the emitted clouds and the metadata record.
    fn assemble(&mut self) {
        let rows = self.params.beams;
        let cols = self.params.columns;
        let ground_scan_max = self.params.ground_scan_max;
        let full = self.image.full_cloud();
        let out = &mut self.output;

        out.seg_info.start_orientation = self.image.start_orientation();
        out.seg_info.end_orientation = self.image.end_orientation();
        out.seg_info.orientation_diff = self.image.orientation_diff();

        let mut size: i32 = 0;
        for row in 0..rows {
            out.seg_info.start_ring_index[row] = size - 1 + RING_MARGIN;

            for col in 0..cols {
                let label = self.labeler.label_at(row, col);
                let is_ground = self.ground.is_ground(row, col);
                if label <= 0 && !is_ground {
                    continue;
                }

                // Rejected cells never reach the segmented cloud, but the
                // upper beams keep a sparse sample as outliers.
                if label == LABEL_REJECTED {
                    if row > ground_scan_max && col % OUTLIER_STRIDE == 0 {
                        out.outlier_cloud.push_from(full, row * cols + col);
                    }
                    continue;
                }

                // Thin the ground to one column in five, away from the seam.
                if is_ground
                    && !(col % GROUND_STRIDE == 0
                        && col > GROUND_STRIDE
                        && col < cols - GROUND_STRIDE)
                {
                    continue;
                }

                out.seg_info.ground_flag.push(is_ground);
                out.seg_info.col_index.push(col as u32);
                out.seg_info.range.push(self.image.range()[[row, col]]);
                out.segmented_cloud.push_from(full, row * cols + col);
                size += 1;
            }

            out.seg_info.end_ring_index[row] = size - 1 - RING_MARGIN;
        }

        // Pure segmented view for visualization, intensity = cluster id.
        for row in 0..rows {
            for col in 0..cols {
                let label = self.labeler.label_at(row, col);
                if label > 0 && label != LABEL_REJECTED {
                    let idx = row * cols + col;
                    out.segmented_cloud_pure
                        .push(full.x[idx], full.y[idx], full.z[idx], label as f32);
                }
            }
        }

        // Ground view for visualization.
        for row in 0..=ground_scan_max {
            for col in 0..cols {
                if self.ground.is_ground(row, col) {
                    out.ground_cloud.push_from(full, row * cols + col);
                }
            }
        }
    }

    /// Outputs of the last processed sweep.
    #[inline]
    pub fn output(&self) -> &SweepOutput {
        &self.output
    }

    /// Projected grid of the last sweep (packed-index intensity).
    #[inline]
    pub fn full_cloud(&self) -> &PointCloud {
        self.image.full_cloud()
    }

    /// Projected grid of the last sweep (range intensity).
    #[inline]
    pub fn full_info_cloud(&self) -> &PointCloud {
        self.image.full_info_cloud()
    }

    /// The projected range image of the last sweep.
    #[inline]
    pub fn image(&self) -> &RangeImage {
        &self.image
    }

    /// The ground classification of the last sweep.
    #[inline]
    pub fn ground(&self) -> &GroundClassifier {
        &self.ground
    }

    /// The component labels of the last sweep.
    #[inline]
    pub fn labeler(&self) -> &ComponentLabeler {
        &self.labeler
    }

    /// Per-stage wall-clock of the last sweep.
    #[inline]
    pub fn timings(&self) -> &StageTimings {
        &self.timings
    }

    /// Points the last projection dropped as degenerate.
    #[inline]
    pub fn dropped_points(&self) -> usize {
        self.image.dropped()
    }

    #[inline]
    pub fn params(&self) -> &SensorParams {
        &self.params
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn segmenter() -> SweepSegmenter {
        SweepSegmenter::new(SensorParams::vlp16()).unwrap()
    }

    #[test]
    fn test_empty_sweep_yields_empty_ring_runs() {
        let mut seg = segmenter();
        seg.process(&PointCloud::default(), None);
        let out = seg.output();

        assert!(out.segmented_cloud.is_empty());
        assert!(out.segmented_cloud_pure.is_empty());
        assert!(out.ground_cloud.is_empty());
        assert!(out.outlier_cloud.is_empty());
        for row in 0..16 {
            assert_eq!(out.seg_info.start_ring_index[row], 4);
            assert_eq!(out.seg_info.end_ring_index[row], -6);
        }
        assert!(out.seg_info.orientation_diff > std::f32::consts::PI);
    }

    #[test]
    fn test_invalid_params_rejected_at_construction() {
        let mut params = SensorParams::vlp16();
        params.ground_scan_max = 99;
        assert!(SweepSegmenter::new(params).is_err());
    }

    #[test]
    fn test_outputs_reset_between_sweeps() {
        let mut seg = segmenter();

        // A pole: one return per beam in a single column at 5m.
        let mut cloud = PointCloud::default();
        for row in 0..16 {
            let elevation = (row as f32 * 2.0 - 15.0).to_radians();
            cloud.push(0.0, 5.0, 5.0 * elevation.tan(), 0.0);
        }
        seg.process(&cloud, None);
        assert_eq!(seg.output().segmented_cloud_pure.len(), 16);

        // The next (empty) sweep must not inherit anything.
        seg.process(&PointCloud::default(), None);
        assert!(seg.output().segmented_cloud_pure.is_empty());
        assert_eq!(seg.labeler().cluster_count(), 0);
        assert!(seg.full_cloud().is_sentinel(0));
    }

    #[test]
    fn test_ring_indices_margin_matches_emitted_counts() {
        let mut seg = segmenter();

        // A wide surface at constant 6m range covering 60 columns on every
        // beam.
        let mut cloud = PointCloud::default();
        for row in 0..16 {
            let elevation = (row as f32 * 2.0 - 15.0).to_radians();
            for col in 700..760 {
                let theta = ((1350 - col) as f32 / 5.0).to_radians();
                let horiz = 6.0 * elevation.cos();
                cloud.push(
                    horiz * theta.sin(),
                    horiz * theta.cos(),
                    6.0 * elevation.sin(),
                    0.0,
                );
            }
        }
        seg.process(&cloud, None);
        let out = seg.output();

        // Per-beam emitted counts from the packed grid index.
        let mut counts = [0i32; 16];
        for &packed in &out.segmented_cloud.intensity {
            counts[packed.floor() as usize] += 1;
        }
        for row in 0..16 {
            let span = out.seg_info.end_ring_index[row] - out.seg_info.start_ring_index[row];
            assert_eq!(span, counts[row] - 10, "beam {row}");
        }
    }
}
