// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! Point cloud wire formats.
//!
//! This module converts between the internal SoA [`PointCloud`] and ROS
//! `sensor_msgs/PointCloud2` payloads, and defines the metadata message
//! mirroring the segmented cloud.
//!
//! # Emitted format
//!
//! 16-byte stride, all little-endian:
//!
//! ```text
//! ┌───────┬───────┬───────┬───────────────┐
//! │ x:f32 │ y:f32 │ z:f32 │ intensity:f32 │
//! │ 4B    │ 4B    │ 4B    │ 4B            │
//! └───────┴───────┴───────┴───────────────┘
//! ```
//!
//! The intensity channel is load-bearing: depending on the channel it holds
//! a packed `row + col/10000` grid index, a range in meters, or a cluster
//! id, so it stays a full float on the wire.
//!
//! # Accepted input
//!
//! Arbitrary field layouts are accepted on the subscribe side as long as
//! `x`, `y` and `z` are FLOAT32; intensity may be FLOAT32, UINT8 or UINT16
//! and an optional `ring` field may be UINT8 or UINT16.

use crate::cloud::{Error, PointCloud, SegInfo};
use edgefirst_schemas::{
    builtin_interfaces::Time,
    sensor_msgs::{PointCloud2, PointField},
    std_msgs::Header,
};
use serde::{Deserialize, Serialize};

/// Point field data types for PointCloud2 messages.
///
/// These values correspond to the ROS sensor_msgs/PointField datatype field.
/// All variants are defined for completeness, even if not all are currently
/// used.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
#[allow(dead_code)]
pub enum PointFieldType {
    INT8 = 1,
    UINT8 = 2,
    INT16 = 3,
    UINT16 = 4,
    INT32 = 5,
    UINT32 = 6,
    FLOAT32 = 7,
    FLOAT64 = 8,
}

/// Build the XYZ + float intensity point fields (16-byte stride).
pub fn xyz_intensity_fields() -> Vec<PointField> {
    vec![
        PointField {
            name: String::from("x"),
            offset: 0,
            datatype: PointFieldType::FLOAT32 as u8,
            count: 1,
        },
        PointField {
            name: String::from("y"),
            offset: 4,
            datatype: PointFieldType::FLOAT32 as u8,
            count: 1,
        },
        PointField {
            name: String::from("z"),
            offset: 8,
            datatype: PointFieldType::FLOAT32 as u8,
            count: 1,
        },
        PointField {
            name: String::from("intensity"),
            offset: 12,
            datatype: PointFieldType::FLOAT32 as u8,
            count: 1,
        },
    ]
}

/// Pack a cloud into the 16-byte XYZ + intensity format.
pub fn format_points_16byte(cloud: &PointCloud) -> Vec<u8> {
    let n = cloud.len();
    let mut data = Vec::with_capacity(n * 16);
    for i in 0..n {
        data.extend_from_slice(&cloud.x[i].to_le_bytes());
        data.extend_from_slice(&cloud.y[i].to_le_bytes());
        data.extend_from_slice(&cloud.z[i].to_le_bytes());
        data.extend_from_slice(&cloud.intensity[i].to_le_bytes());
    }
    data
}

/// Wrap a cloud into a PointCloud2 message.
///
/// `is_dense` must be false for the projected grid clouds, whose empty
/// cells carry NaN sentinels.
pub fn make_point_cloud2(
    cloud: &PointCloud,
    stamp: Time,
    frame_id: String,
    is_dense: bool,
) -> PointCloud2 {
    let n = cloud.len();
    PointCloud2 {
        header: Header { stamp, frame_id },
        height: 1,
        width: n as u32,
        fields: xyz_intensity_fields(),
        is_bigendian: false,
        point_step: 16,
        row_step: 16 * n as u32,
        data: format_points_16byte(cloud),
        is_dense,
    }
}

/// Metadata record published alongside the segmented cloud.
///
/// The per-point arrays are indexed identically to the segmented cloud;
/// `start_ring_index`/`end_ring_index` bracket each beam's run with a
/// five-point inset on both sides.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SegmentedCloudInfo {
    pub header: Header,
    pub start_ring_index: Vec<i32>,
    pub end_ring_index: Vec<i32>,
    pub start_orientation: f32,
    pub end_orientation: f32,
    pub orientation_diff: f32,
    pub ground_flag: Vec<bool>,
    pub col_index: Vec<u32>,
    pub range: Vec<f32>,
}

impl SegmentedCloudInfo {
    pub fn new(info: &SegInfo, stamp: Time, frame_id: String) -> Self {
        Self {
            header: Header { stamp, frame_id },
            start_ring_index: info.start_ring_index.clone(),
            end_ring_index: info.end_ring_index.clone(),
            start_orientation: info.start_orientation,
            end_orientation: info.end_orientation,
            orientation_diff: info.orientation_diff,
            ground_flag: info.ground_flag.clone(),
            col_index: info.col_index.clone(),
            range: info.range.clone(),
        }
    }
}

fn find_field<'a>(msg: &'a PointCloud2, name: &str) -> Result<&'a PointField, Error> {
    msg.fields
        .iter()
        .find(|f| f.name == name)
        .ok_or_else(|| Error::PointLayout(format!("missing field '{}'", name)))
}

fn read_f32(msg: &PointCloud2, base: usize, field: &PointField) -> Result<f32, Error> {
    let off = base + field.offset as usize;
    let bytes = msg
        .data
        .get(off..off + 4)
        .ok_or_else(|| Error::Decode(format!("truncated data at byte {}", off)))?;
    if field.datatype != PointFieldType::FLOAT32 as u8 {
        return Err(Error::PointLayout(format!(
            "field '{}' has datatype {}, expected FLOAT32",
            field.name, field.datatype
        )));
    }
    Ok(f32::from_le_bytes(bytes.try_into().unwrap()))
}

fn read_intensity(msg: &PointCloud2, base: usize, field: &PointField) -> Result<f32, Error> {
    let off = base + field.offset as usize;
    let need = match field.datatype {
        d if d == PointFieldType::FLOAT32 as u8 => 4,
        d if d == PointFieldType::UINT16 as u8 => 2,
        d if d == PointFieldType::UINT8 as u8 => 1,
        d => {
            return Err(Error::PointLayout(format!(
                "unsupported intensity datatype {}",
                d
            )));
        }
    };
    let bytes = msg
        .data
        .get(off..off + need)
        .ok_or_else(|| Error::Decode(format!("truncated data at byte {}", off)))?;
    Ok(match need {
        4 => f32::from_le_bytes(bytes.try_into().unwrap()),
        2 => u16::from_le_bytes(bytes.try_into().unwrap()) as f32,
        _ => bytes[0] as f32,
    })
}

fn read_ring(msg: &PointCloud2, base: usize, field: &PointField) -> Result<u16, Error> {
    let off = base + field.offset as usize;
    match field.datatype {
        d if d == PointFieldType::UINT16 as u8 => {
            let bytes = msg
                .data
                .get(off..off + 2)
                .ok_or_else(|| Error::Decode(format!("truncated data at byte {}", off)))?;
            Ok(u16::from_le_bytes(bytes.try_into().unwrap()))
        }
        d if d == PointFieldType::UINT8 as u8 => {
            let byte = msg
                .data
                .get(off)
                .ok_or_else(|| Error::Decode(format!("truncated data at byte {}", off)))?;
            Ok(*byte as u16)
        }
        d => Err(Error::PointLayout(format!(
            "unsupported ring datatype {}",
            d
        ))),
    }
}

/// Decode a PointCloud2 payload into a sanitized SoA cloud.
///
/// Points with non-finite coordinates are stripped; the returned count says
/// how many were dropped. With `want_ring` set, the message must declare
/// itself dense ([`Error::NonDenseRing`] otherwise, a fatal configuration
/// error) and the aligned ring indices are returned alongside the cloud.
pub fn decode_point_cloud(
    msg: &PointCloud2,
    want_ring: bool,
) -> Result<(PointCloud, Option<Vec<u16>>, usize), Error> {
    if msg.is_bigendian {
        return Err(Error::PointLayout(
            "big-endian point data is not supported".to_string(),
        ));
    }
    if want_ring && !msg.is_dense {
        return Err(Error::NonDenseRing);
    }

    let fx = find_field(msg, "x")?;
    let fy = find_field(msg, "y")?;
    let fz = find_field(msg, "z")?;
    let fi = find_field(msg, "intensity").ok();
    let fring = if want_ring {
        Some(find_field(msg, "ring")?)
    } else {
        None
    };

    let step = msg.point_step as usize;
    if step == 0 {
        return Err(Error::PointLayout("zero point step".to_string()));
    }
    let n = (msg.width as usize) * (msg.height as usize).max(1);
    let n = n.min(msg.data.len() / step);

    let mut cloud = PointCloud::with_capacity(n);
    let mut rings = fring.map(|_| Vec::with_capacity(n));
    let mut dropped = 0usize;

    for i in 0..n {
        let base = i * step;
        let x = read_f32(msg, base, fx)?;
        let y = read_f32(msg, base, fy)?;
        let z = read_f32(msg, base, fz)?;
        if !x.is_finite() || !y.is_finite() || !z.is_finite() {
            dropped += 1;
            continue;
        }
        let intensity = match fi {
            Some(f) => read_intensity(msg, base, f)?,
            None => 0.0,
        };
        cloud.push(x, y, z, intensity);
        if let (Some(rings), Some(f)) = (&mut rings, fring) {
            rings.push(read_ring(msg, base, f)?);
        }
    }

    Ok((cloud, rings, dropped))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stamp() -> Time {
        Time::from_nanos(1_000_000_000)
    }

    #[test]
    fn test_encode_decode_roundtrip() {
        let mut cloud = PointCloud::default();
        cloud.push(1.0, -2.0, 0.5, 3.1401);
        cloud.push(-4.5, 6.25, -0.125, 7.0002);

        let msg = make_point_cloud2(&cloud, stamp(), "base_link".to_string(), true);
        assert_eq!(msg.width, 2);
        assert_eq!(msg.point_step, 16);
        assert_eq!(msg.data.len(), 32);

        let (decoded, rings, dropped) = decode_point_cloud(&msg, false).unwrap();
        assert_eq!(dropped, 0);
        assert!(rings.is_none());
        assert_eq!(decoded.len(), 2);
        assert_eq!(decoded.x, cloud.x);
        assert_eq!(decoded.intensity, cloud.intensity);
    }

    #[test]
    fn test_decode_strips_non_finite_points() {
        let mut cloud = PointCloud::default();
        cloud.push(1.0, 2.0, 3.0, 0.0);
        cloud.push(f32::NAN, 2.0, 3.0, 0.0);
        cloud.push(4.0, f32::INFINITY, 3.0, 0.0);
        cloud.push(5.0, 6.0, 7.0, 0.0);

        let msg = make_point_cloud2(&cloud, stamp(), "base_link".to_string(), false);
        let (decoded, _, dropped) = decode_point_cloud(&msg, false).unwrap();
        assert_eq!(dropped, 2);
        assert_eq!(decoded.len(), 2);
        assert_eq!(decoded.x, vec![1.0, 5.0]);
    }

    #[test]
    fn test_decode_ring_channel() {
        // Hand-build an 18-byte layout: xyz + intensity:f32 + ring:u16.
        let mut fields = xyz_intensity_fields();
        fields.push(PointField {
            name: String::from("ring"),
            offset: 16,
            datatype: PointFieldType::UINT16 as u8,
            count: 1,
        });

        let mut data = Vec::new();
        for (i, ring) in [(0u16, 3u16), (1, 9)] {
            data.extend_from_slice(&(i as f32).to_le_bytes());
            data.extend_from_slice(&2.0f32.to_le_bytes());
            data.extend_from_slice(&3.0f32.to_le_bytes());
            data.extend_from_slice(&0.5f32.to_le_bytes());
            data.extend_from_slice(&ring.to_le_bytes());
        }

        let msg = PointCloud2 {
            header: Header {
                stamp: stamp(),
                frame_id: "base_link".to_string(),
            },
            height: 1,
            width: 2,
            fields,
            is_bigendian: false,
            point_step: 18,
            row_step: 36,
            data,
            is_dense: true,
        };

        let (decoded, rings, _) = decode_point_cloud(&msg, true).unwrap();
        assert_eq!(decoded.len(), 2);
        assert_eq!(rings.unwrap(), vec![3, 9]);
    }

    #[test]
    fn test_decode_rejects_non_dense_ring_cloud() {
        let mut cloud = PointCloud::default();
        cloud.push(1.0, 2.0, 3.0, 0.0);
        let msg = make_point_cloud2(&cloud, stamp(), "base_link".to_string(), false);

        match decode_point_cloud(&msg, true) {
            Err(Error::NonDenseRing) => {}
            other => panic!("expected NonDenseRing, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_decode_missing_field() {
        let mut msg = make_point_cloud2(&PointCloud::default(), stamp(), "lidar".to_string(), true);
        msg.fields.retain(|f| f.name != "z");

        assert!(matches!(
            decode_point_cloud(&msg, false),
            Err(Error::PointLayout(_))
        ));
    }

    #[test]
    fn test_seg_info_message_mirrors_record() {
        let mut info = SegInfo::with_capacity(2, 8);
        info.start_orientation = 0.1;
        info.orientation_diff = 6.28;
        info.ground_flag.push(true);
        info.col_index.push(15);
        info.range.push(4.2);

        let msg = SegmentedCloudInfo::new(&info, stamp(), "base_link".to_string());
        assert_eq!(msg.header.frame_id, "base_link");
        assert_eq!(msg.start_ring_index.len(), 2);
        assert_eq!(msg.ground_flag, vec![true]);
        assert_eq!(msg.col_index, vec![15]);
    }
}
