// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! Segmentation stage binary: subscribes to a raw LiDAR sweep topic and
//! publishes the projected, ground-classified, and segmented views.

use clap::Parser as _;
use lidarseg::args::Args;
use lidarseg::seg_thread::{SegPublishers, seg_thread};
use tracing::{error, info};
use tracing_subscriber::{Layer as _, Registry, layer::SubscriberExt as _};
use zenoh::{
    Session,
    pubsub::Publisher,
    qos::{CongestionControl, Priority},
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let stdout_log = tracing_subscriber::fmt::layer()
        .pretty()
        .with_filter(args.rust_log);

    let journald = match tracing_journald::layer() {
        Ok(journald) => Some(journald.with_filter(args.rust_log)),
        Err(_) => None,
    };

    let subscriber = Registry::default().with(stdout_log).with(journald);
    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");
    tracing_log::LogTracer::init()?;

    let params = args.sensor_params();
    params.validate()?;
    info!(
        sensor = %args.sensor,
        beams = params.beams,
        columns = params.columns,
        use_cloud_ring = params.use_cloud_ring,
        "starting segmentation stage"
    );

    let session = zenoh::open(args.clone()).await.unwrap();

    let pubs = SegPublishers {
        seg_info: declare(&session, &args.output_topic, "segmented_cloud_info").await,
        outlier: declare(&session, &args.output_topic, "outlier_cloud").await,
        segmented: declare(&session, &args.output_topic, "segmented_cloud").await,
        full: declare(&session, &args.output_topic, "full_cloud_projected").await,
        ground: declare(&session, &args.output_topic, "ground_cloud").await,
        pure: declare(&session, &args.output_topic, "segmented_cloud_pure").await,
        full_info: declare(&session, &args.output_topic, "full_cloud_info").await,
    };

    // Bounded handoff to the worker; the worker drains to the newest sweep,
    // so a slow pipeline sheds backlog instead of queueing stale data.
    let (tx, rx) = kanal::bounded(8);

    let worker_args = args.clone();
    let worker = std::thread::Builder::new()
        .name("segmentation".to_string())
        .spawn(move || {
            let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                tokio::runtime::Builder::new_multi_thread()
                    .enable_all()
                    .build()
                    .unwrap()
                    .block_on(seg_thread(rx, pubs, worker_args));
            }));
            if let Err(e) = result {
                let msg = if let Some(s) = e.downcast_ref::<&str>() {
                    s.to_string()
                } else if let Some(s) = e.downcast_ref::<String>() {
                    s.clone()
                } else {
                    "unknown panic".to_string()
                };
                error!("Segmentation thread panicked: {}", msg);
            }
        })?;

    let sweeps = session
        .declare_subscriber(args.input_topic.clone())
        .await
        .unwrap();
    info!("Listening for sweeps on {}", args.input_topic);

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("shutdown requested");
                break;
            }
            sample = sweeps.recv_async() => {
                match sample {
                    Ok(sample) => {
                        let _ = tx.send(sample);
                    }
                    Err(e) => {
                        error!("subscriber closed: {:?}", e);
                        break;
                    }
                }
            }
        }
    }

    // Closing the channel lets the worker finish the sweep in flight and
    // return before the session drops.
    drop(tx);
    let _ = worker.join();

    Ok(())
}

async fn declare(session: &Session, prefix: &str, channel: &str) -> Publisher<'static> {
    session
        .declare_publisher(format!("{}/{}", prefix, channel))
        .priority(Priority::DataHigh)
        .congestion_control(CongestionControl::Drop)
        .await
        .unwrap()
}
