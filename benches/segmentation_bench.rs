// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! Benchmarks for the per-sweep segmentation pipeline.
//!
//! Measures the full seven-step pipeline and the projection stage alone on
//! a synthetic outdoor scene (flat ground, a ring of walls, scattered
//! poles) at VLP-16 density.
//!
//! Run with: cargo bench --bench segmentation_bench

use criterion::{Criterion, Throughput, criterion_group, criterion_main};
use lidarseg::{PointCloud, SensorParams, SweepSegmenter};

/// Generate a full-density synthetic sweep: ground on the lower beams,
/// building walls on a third of the columns, poles every 100 columns.
fn generate_sweep(params: &SensorParams) -> PointCloud {
    let mut cloud = PointCloud::default();
    let sensor_height = 1.7f32;

    for row in 0..params.beams {
        let elevation =
            (row as f32 * params.ang_res_y - params.ang_bottom).to_radians();
        for col in 0..params.columns {
            let azimuth = ((params.columns as i32 * 3 / 4 - col as i32) as f32
                * params.ang_res_x)
                .to_radians();

            // Walls at 8-20m on one third of the horizon, poles at 5m every
            // 100 columns, otherwise ground where the beam points down.
            let wall_dist = 8.0 + 12.0 * ((col / 200) % 3) as f32 / 2.0;
            let range = if col % 100 == 0 {
                5.0 / elevation.cos()
            } else if col % 3 == 0 {
                wall_dist / elevation.cos()
            } else if elevation < 0.0 {
                let floor_range = sensor_height / (-elevation).sin();
                if floor_range * elevation.cos() > wall_dist {
                    wall_dist / elevation.cos()
                } else {
                    floor_range
                }
            } else {
                continue;
            };

            let horiz = range * elevation.cos();
            cloud.push(
                horiz * azimuth.sin(),
                horiz * azimuth.cos(),
                range * elevation.sin(),
                0.0,
            );
        }
    }
    cloud
}

fn bench_pipeline(c: &mut Criterion) {
    let params = SensorParams::vlp16();
    let sweep = generate_sweep(&params);

    let mut group = c.benchmark_group("pipeline");
    group.throughput(Throughput::Elements(sweep.len() as u64));
    group.bench_function("process_vlp16", |b| {
        let mut segmenter = SweepSegmenter::new(params).unwrap();
        // Warmup: one sweep to touch every buffer.
        segmenter.process(&sweep, None);

        b.iter(|| {
            segmenter.process(&sweep, None);
            segmenter.output().segmented_cloud.len()
        });
    });
    group.finish();
}

fn bench_stages(c: &mut Criterion) {
    let params = SensorParams::vlp16();
    let sweep = generate_sweep(&params);

    let mut group = c.benchmark_group("stages");
    group.bench_function("empty_sweep_reset", |b| {
        let mut segmenter = SweepSegmenter::new(params).unwrap();
        let empty = PointCloud::default();
        segmenter.process(&sweep, None);

        b.iter(|| {
            segmenter.process(&empty, None);
            segmenter.output().segmented_cloud.len()
        });
    });
    group.finish();
}

criterion_group!(benches, bench_pipeline, bench_stages);
criterion_main!(benches);
