// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! Angular-consistency BFS segmentation of the range image.
//!
//! Non-ground, non-empty cells are flood-filled over the 4-neighborhood
//! (columns wrap, rows do not). Two adjacent cells join the same component
//! when the angle `beta` at the farther point of the triangle they span with
//! the sensor origin exceeds a threshold: a large `beta` means the two sight
//! lines land on a nearly coplanar surface, a small one means an occlusion
//! boundary.
//!
//! The BFS runs over fixed-capacity index arrays rather than dynamic
//! containers; general-purpose queues measurably slow this loop and the
//! `rows * cols` bound is exact.

use crate::params::SensorParams;
use ndarray::Array2;

/// Label given to cells of clusters rejected as too small.
pub const LABEL_REJECTED: i32 = 999_999;

/// Clusters at least this large are accepted outright.
const MIN_CLUSTER_CELLS: usize = 30;
/// Smaller clusters are accepted from this size up...
const MIN_LINE_CLUSTER_CELLS: usize = 5;
/// ...provided they span at least this many distinct beams.
const MIN_CLUSTER_LINES: usize = 3;

/// Four-neighborhood offsets as (row, column) steps.
const NEIGHBORS: [(i8, i8); 4] = [(-1, 0), (0, 1), (0, -1), (1, 0)];

/// Connected-component labeler over the range image.
///
/// Cell labels: `0` untouched, `-1` excluded (ground or empty), positive =
/// cluster id, [`LABEL_REJECTED`] = visited but the cluster was discarded.
/// All scratch arrays are allocated once at construction.
pub struct ComponentLabeler {
    label: Array2<i32>,
    label_count: i32,
    theta: f32,
    sin_alpha_x: f32,
    cos_alpha_x: f32,
    sin_alpha_y: f32,
    cos_alpha_y: f32,
    queue_row: Vec<u16>,
    queue_col: Vec<u16>,
    visited_row: Vec<u16>,
    visited_col: Vec<u16>,
    line_touched: Vec<bool>,
}

impl ComponentLabeler {
    pub fn new(params: &SensorParams) -> Self {
        let cells = params.cells();
        Self {
            label: Array2::zeros((params.beams, params.columns)),
            label_count: 1,
            theta: params.segment_theta,
            sin_alpha_x: params.alpha_x().sin(),
            cos_alpha_x: params.alpha_x().cos(),
            sin_alpha_y: params.alpha_y().sin(),
            cos_alpha_y: params.alpha_y().cos(),
            queue_row: vec![0; cells],
            queue_col: vec![0; cells],
            visited_row: vec![0; cells],
            visited_col: vec![0; cells],
            line_touched: vec![false; params.beams],
        }
    }

    /// Reset labels and the id counter for the next sweep.
    pub fn reset(&mut self) {
        self.label.fill(0);
        self.label_count = 1;
    }

    /// Exclude ground and empty cells from segmentation.
    pub fn exclude(&mut self, ground: &Array2<i8>, range: &Array2<f32>) {
        ndarray::Zip::from(&mut self.label)
            .and(ground)
            .and(range)
            .for_each(|label, &ground, &range| {
                if ground == 1 || range.is_infinite() {
                    *label = -1;
                }
            });
    }

    /// Flood-fill every untouched cell of the range image.
    pub fn segment(&mut self, range: &Array2<f32>) {
        let (rows, cols) = self.label.dim();
        for row in 0..rows {
            for col in 0..cols {
                if self.label[[row, col]] == 0 {
                    self.label_components(row, col, range);
                }
            }
        }
    }

    /// Grow one component from `(row, col)`, then accept or reject it.
    fn label_components(&mut self, row: usize, col: usize, range: &Array2<f32>) {
        let (rows, cols) = self.label.dim();
        self.line_touched.fill(false);

        self.queue_row[0] = row as u16;
        self.queue_col[0] = col as u16;
        let mut queue_start = 0usize;
        let mut queue_end = 1usize;

        self.visited_row[0] = row as u16;
        self.visited_col[0] = col as u16;
        let mut visited = 1usize;

        self.label[[row, col]] = self.label_count;

        while queue_start < queue_end {
            let from_row = self.queue_row[queue_start] as usize;
            let from_col = self.queue_col[queue_start] as usize;
            queue_start += 1;

            for (d_row, d_col) in NEIGHBORS {
                let this_row = from_row as i32 + d_row as i32;
                if this_row < 0 || this_row >= rows as i32 {
                    continue;
                }
                let this_row = this_row as usize;

                // The image is a cylinder: columns wrap at both margins.
                let mut this_col = from_col as i32 + d_col as i32;
                if this_col < 0 {
                    this_col = cols as i32 - 1;
                } else if this_col >= cols as i32 {
                    this_col = 0;
                }
                let this_col = this_col as usize;

                if self.label[[this_row, this_col]] != 0 {
                    continue;
                }

                let from_range = range[[from_row, from_col]];
                let this_range = range[[this_row, this_col]];
                let d1 = from_range.max(this_range);
                let d2 = from_range.min(this_range);
                let (sin_alpha, cos_alpha) = if d_row == 0 {
                    (self.sin_alpha_x, self.cos_alpha_x)
                } else {
                    (self.sin_alpha_y, self.cos_alpha_y)
                };

                let beta = (d2 * sin_alpha).atan2(d1 - d2 * cos_alpha);
                if beta > self.theta {
                    self.queue_row[queue_end] = this_row as u16;
                    self.queue_col[queue_end] = this_col as u16;
                    queue_end += 1;

                    self.label[[this_row, this_col]] = self.label_count;
                    self.line_touched[this_row] = true;

                    self.visited_row[visited] = this_row as u16;
                    self.visited_col[visited] = this_col as u16;
                    visited += 1;
                }
            }
        }

        let feasible = if visited >= MIN_CLUSTER_CELLS {
            true
        } else if visited >= MIN_LINE_CLUSTER_CELLS {
            let lines = self.line_touched.iter().filter(|&&t| t).count();
            lines >= MIN_CLUSTER_LINES
        } else {
            false
        };

        if feasible {
            self.label_count += 1;
        } else {
            for i in 0..visited {
                let r = self.visited_row[i] as usize;
                let c = self.visited_col[i] as usize;
                self.label[[r, c]] = LABEL_REJECTED;
            }
        }
    }

    #[inline]
    pub fn label(&self) -> &Array2<i32> {
        &self.label
    }

    #[inline]
    pub fn label_at(&self, row: usize, col: usize) -> i32 {
        self.label[[row, col]]
    }

    /// Number of accepted clusters in the current sweep.
    #[inline]
    pub fn cluster_count(&self) -> usize {
        (self.label_count - 1) as usize
    }
}
