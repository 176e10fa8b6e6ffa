// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! Segmentation worker: drains the sweep channel, runs the pipeline, and
//! publishes the seven output channels.
//!
//! The worker keeps only the newest pending sweep. Odometry gains nothing
//! from stale data, so when processing falls behind the sweep rate the
//! backlog is dropped at the ingress rather than queued.

use crate::{
    args::Args,
    cloud::{Error, PointCloud},
    formats::{SegmentedCloudInfo, decode_point_cloud, make_point_cloud2},
    pipeline::SweepSegmenter,
};
use edgefirst_schemas::{builtin_interfaces::Time, sensor_msgs::PointCloud2, serde_cdr};
use kanal::Receiver;
use std::time::Instant;
use tracing::{debug, error, info, trace, warn};
use zenoh::{
    bytes::{Encoding, ZBytes},
    pubsub::Publisher,
    sample::Sample,
};

/// Nominal sweep period of a 10 Hz scanner, for the timing report.
const SWEEP_PERIOD_MS: f64 = 100.0;

/// The seven output channels of the stage.
pub struct SegPublishers {
    pub seg_info: Publisher<'static>,
    pub outlier: Publisher<'static>,
    pub segmented: Publisher<'static>,
    pub full: Publisher<'static>,
    pub ground: Publisher<'static>,
    pub pure: Publisher<'static>,
    pub full_info: Publisher<'static>,
}

async fn publish_cloud(
    publ: &Publisher<'static>,
    cloud: &PointCloud,
    stamp: Time,
    frame_id: &str,
    is_dense: bool,
) {
    let msg = make_point_cloud2(cloud, stamp, frame_id.to_string(), is_dense);
    match serde_cdr::serialize(&msg) {
        Ok(bytes) => {
            let enc = Encoding::APPLICATION_CDR.with_schema("sensor_msgs/msg/PointCloud2");
            if let Err(e) = publ.put(ZBytes::from(bytes)).encoding(enc).await {
                error!("publish error: {:?}", e);
            }
        }
        Err(e) => error!("Could not encode point cloud: {:?}", e),
    }
}

/// Run the segmentation worker until the channel closes.
pub async fn seg_thread(rx: Receiver<Sample>, pubs: SegPublishers, args: Args) {
    let params = args.sensor_params();
    let mut segmenter = match SweepSegmenter::new(params) {
        Ok(s) => s,
        Err(e) => {
            error!("invalid sensor parameters: {}", e);
            std::process::exit(1);
        }
    };

    // Pipeline timing accumulators (microseconds)
    let mut sweep_count: u64 = 0;
    let mut sum_decode_us: u64 = 0;
    let mut sum_project_us: u64 = 0;
    let mut sum_ground_us: u64 = 0;
    let mut sum_segment_us: u64 = 0;
    let mut sum_assemble_us: u64 = 0;
    let mut sum_publish_us: u64 = 0;
    let mut sum_total_us: u64 = 0;
    let mut sum_superseded: u64 = 0;
    let report_interval: u64 = 100;

    loop {
        // Block for the next sweep, then drain anything queued behind it:
        // only the newest pending sweep is worth segmenting.
        let mut sample = match rx.recv() {
            Ok(v) => v,
            Err(_) => return,
        };
        let mut superseded: u64 = 0;
        while let Ok(Some(newer)) = rx.try_recv() {
            sample = newer;
            superseded += 1;
        }
        if superseded > 0 {
            trace!(superseded = superseded, "dropped stale sweeps at ingress");
        }
        sum_superseded += superseded;

        let t_sweep = Instant::now();

        // ── Decode and sanitize ─────────────────────────────────────────
        let t0 = Instant::now();
        let msg: PointCloud2 = match cdr::deserialize(&sample.payload().to_bytes()) {
            Ok(msg) => msg,
            Err(e) => {
                debug!("Could not decode PointCloud2: {:?}", e);
                continue;
            }
        };
        let (cloud, rings, dropped) = match decode_point_cloud(&msg, args.use_cloud_ring) {
            Ok(v) => v,
            Err(Error::NonDenseRing) => {
                // The coordinate and ring views would desynchronize; the
                // indices handed downstream would be invalid.
                error!("{}", Error::NonDenseRing);
                std::process::exit(1);
            }
            Err(e) => {
                debug!("Could not decode sweep: {}", e);
                continue;
            }
        };
        let dt_decode = t0.elapsed();
        if dropped > 0 {
            trace!(dropped = dropped, "stripped non-finite points");
        }

        let stamp = msg.header.stamp;

        // ── Segment ─────────────────────────────────────────────────────
        segmenter.process(&cloud, rings.as_deref());
        let timings = *segmenter.timings();
        trace!(
            n_points = cloud.len(),
            degenerate = segmenter.dropped_points(),
            clusters = segmenter.labeler().cluster_count(),
            segmented = segmenter.output().segmented_cloud.len(),
            "sweep segmented"
        );

        // ── Publish ─────────────────────────────────────────────────────
        let t0 = Instant::now();
        let out = segmenter.output();
        let info_msg = SegmentedCloudInfo::new(&out.seg_info, stamp.clone(), args.frame_id.clone());
        match serde_cdr::serialize(&info_msg) {
            Ok(bytes) => {
                let enc = Encoding::APPLICATION_CDR.with_schema("lidarseg/msg/SegmentedCloudInfo");
                if let Err(e) = pubs.seg_info.put(ZBytes::from(bytes)).encoding(enc).await {
                    error!("publish seg info error: {:?}", e);
                }
            }
            Err(e) => error!("Could not encode seg info: {:?}", e),
        }

        publish_cloud(&pubs.outlier, &out.outlier_cloud, stamp.clone(), &args.frame_id, true).await;
        publish_cloud(
            &pubs.segmented,
            &out.segmented_cloud,
            stamp.clone(),
            &args.frame_id,
            true,
        )
        .await;
        publish_cloud(
            &pubs.full,
            segmenter.full_cloud(),
            stamp.clone(),
            &args.frame_id,
            false,
        )
        .await;
        publish_cloud(&pubs.ground, &out.ground_cloud, stamp.clone(), &args.frame_id, true).await;
        publish_cloud(
            &pubs.pure,
            &out.segmented_cloud_pure,
            stamp.clone(),
            &args.frame_id,
            true,
        )
        .await;
        publish_cloud(
            &pubs.full_info,
            segmenter.full_info_cloud(),
            stamp,
            &args.frame_id,
            false,
        )
        .await;
        let dt_publish = t0.elapsed();

        let dt_total = t_sweep.elapsed();

        // ── Accumulate and report ───────────────────────────────────────
        sweep_count += 1;
        sum_decode_us += dt_decode.as_micros() as u64;
        sum_project_us += (timings.reset + timings.project).as_micros() as u64;
        sum_ground_us += timings.ground.as_micros() as u64;
        sum_segment_us += timings.segment.as_micros() as u64;
        sum_assemble_us += timings.assemble.as_micros() as u64;
        sum_publish_us += dt_publish.as_micros() as u64;
        sum_total_us += dt_total.as_micros() as u64;

        if sweep_count.is_multiple_of(report_interval) {
            let n = report_interval as f64;
            let avg_total_ms = sum_total_us as f64 / n / 1000.0;
            info!(
                "pipeline avg over {} sweeps ({} pts): decode={:.1}ms project={:.1}ms ground={:.1}ms segment={:.1}ms assemble={:.1}ms publish={:.1}ms total={:.1}ms dropped={}",
                report_interval,
                cloud.len(),
                sum_decode_us as f64 / n / 1000.0,
                sum_project_us as f64 / n / 1000.0,
                sum_ground_us as f64 / n / 1000.0,
                sum_segment_us as f64 / n / 1000.0,
                sum_assemble_us as f64 / n / 1000.0,
                sum_publish_us as f64 / n / 1000.0,
                avg_total_ms,
                sum_superseded,
            );
            if avg_total_ms > SWEEP_PERIOD_MS {
                warn!(
                    "processing exceeds the sweep period ({:.1}ms > {:.0}ms), dropping backlog",
                    avg_total_ms, SWEEP_PERIOD_MS
                );
            }
            sum_decode_us = 0;
            sum_project_us = 0;
            sum_ground_us = 0;
            sum_segment_us = 0;
            sum_assemble_us = 0;
            sum_publish_us = 0;
            sum_total_us = 0;
            sum_superseded = 0;
        }
    }
}
