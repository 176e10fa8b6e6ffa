// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

use crate::params::{SensorModel, SensorParams};
use clap::Parser;
use serde_json::json;
use tracing::level_filters::LevelFilter;
use zenoh::config::{Config, WhatAmI};

#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Topic carrying the raw LiDAR sweep to segment
    #[arg(long, env, default_value = "rt/lidar/points")]
    pub input_topic: String,

    /// Base topic under which the output channels are published
    #[arg(long, env, default_value = "rt/lidar/seg")]
    pub output_topic: String,

    /// Frame id stamped on every published cloud
    #[arg(long, env, default_value = "base_link")]
    pub frame_id: String,

    /// Sensor model preset providing the beam geometry
    #[arg(long, env, default_value = "vlp16")]
    pub sensor: SensorModel,

    /// Take row indices from the per-point ring channel instead of deriving
    /// them from elevation. The input must then be dense (no removed points).
    #[arg(long, env)]
    pub use_cloud_ring: bool,

    /// Sensor tilt from horizontal in degrees
    #[arg(long, env, default_value = "0.0")]
    pub mount_angle: f32,

    /// Minimum valid return range in meters
    #[arg(long, env, default_value = "1.0")]
    pub min_range: f32,

    /// Application log level
    #[arg(long, env, default_value = "info")]
    pub rust_log: LevelFilter,

    /// zenoh connection mode
    #[arg(long, env, default_value = "peer")]
    mode: WhatAmI,

    /// connect to zenoh endpoints
    #[arg(long, env)]
    connect: Vec<String>,

    /// listen to zenoh endpoints
    #[arg(long, env)]
    listen: Vec<String>,

    /// disable zenoh multicast scouting
    #[arg(long, env)]
    no_multicast_scouting: bool,
}

impl Args {
    /// Build the immutable sensor record from the preset and overrides.
    pub fn sensor_params(&self) -> SensorParams {
        let mut params = SensorParams::for_model(self.sensor);
        params.use_cloud_ring = self.use_cloud_ring;
        params.mount_angle = self.mount_angle;
        params.min_range = self.min_range;
        params
    }
}

impl From<Args> for Config {
    fn from(args: Args) -> Self {
        let mut config = Config::default();

        config
            .insert_json5("mode", &json!(args.mode).to_string())
            .unwrap();

        if !args.connect.is_empty() {
            config
                .insert_json5("connect/endpoints", &json!(args.connect).to_string())
                .unwrap();
        }

        if !args.listen.is_empty() {
            config
                .insert_json5("listen/endpoints", &json!(args.listen).to_string())
                .unwrap();
        }

        if args.no_multicast_scouting {
            config
                .insert_json5("scouting/multicast/enabled", &json!(false).to_string())
                .unwrap();
        }

        config
    }
}
