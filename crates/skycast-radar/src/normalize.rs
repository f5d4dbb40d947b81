//! Radar metadata normalization.
//!
//! Upstream payloads are untrusted JSON shaped roughly like
//! `{ host, radar: { past: [...], nowcast: [...] } }`. Every field may be
//! missing or of the wrong type. Invalid frames are dropped one by one; only
//! a payload that is not an object at all is rejected as a whole, and
//! [`normalize`] turns that rejection into an empty dataset.

use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::types::{RadarDataset, RadarFrame};

/// Nowcast frames further out than this are discarded.
pub const NOWCAST_HORIZON_SECS: i64 = 90 * 60;

/// Why a single raw frame was dropped.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum FrameRejection {
    #[error("frame is not an object")]
    NotAnObject,
    #[error("frame has no numeric time")]
    MissingTime,
    #[error("frame time {0} is not a positive finite number")]
    InvalidTime(f64),
    #[error("frame has no string path")]
    MissingPath,
    #[error("frame path is blank")]
    BlankPath,
}

/// Why a whole payload was rejected.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum MalformedPayload {
    #[error("payload is not valid JSON: {0}")]
    InvalidJson(String),
    #[error("payload is not a JSON object")]
    NotAnObject,
}

/// Validate one raw frame entry.
pub fn validate_frame(raw: &Value) -> Result<RadarFrame, FrameRejection> {
    let obj = raw.as_object().ok_or(FrameRejection::NotAnObject)?;

    let time = match obj.get("time") {
        Some(Value::Number(n)) => n,
        _ => return Err(FrameRejection::MissingTime),
    };
    let time = match time.as_i64() {
        Some(secs) if secs > 0 => secs,
        Some(secs) => return Err(FrameRejection::InvalidTime(secs as f64)),
        None => {
            let secs = time.as_f64().unwrap_or(f64::NAN);
            if !secs.is_finite() || secs <= 0.0 || secs >= i64::MAX as f64 {
                return Err(FrameRejection::InvalidTime(secs));
            }
            let whole = secs.trunc() as i64;
            if whole <= 0 {
                return Err(FrameRejection::InvalidTime(secs));
            }
            whole
        }
    };

    let path = match obj.get("path") {
        Some(Value::String(s)) => s,
        _ => return Err(FrameRejection::MissingPath),
    };
    if path.trim().is_empty() {
        return Err(FrameRejection::BlankPath);
    }

    Ok(RadarFrame {
        time,
        path: path.clone(),
    })
}

/// Validate every entry of an optional raw array, keeping the valid ones.
fn collect_frames(raw: Option<&Value>, list: &str) -> Vec<RadarFrame> {
    let Some(entries) = raw.and_then(Value::as_array) else {
        return Vec::new();
    };

    entries
        .iter()
        .enumerate()
        .filter_map(|(i, entry)| match validate_frame(entry) {
            Ok(frame) => Some(frame),
            Err(reason) => {
                tracing::debug!("Dropping {} frame {}: {}", list, i, reason);
                None
            }
        })
        .collect()
}

/// Parse a raw payload into a dataset, reporting whole-payload rejection.
pub fn parse_dataset(raw: &Value, now: DateTime<Utc>) -> Result<RadarDataset, MalformedPayload> {
    let obj = raw.as_object().ok_or(MalformedPayload::NotAnObject)?;

    let host = obj
        .get("host")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    let radar = obj.get("radar");

    let mut past_frames = collect_frames(radar.and_then(|r| r.get("past")), "past");
    past_frames.sort_by_key(|f| f.time);

    let now_secs = now.timestamp();
    let horizon = now_secs + NOWCAST_HORIZON_SECS;
    let mut nowcast_frames: Vec<RadarFrame> =
        collect_frames(radar.and_then(|r| r.get("nowcast")), "nowcast")
            .into_iter()
            .filter(|f| f.time > now_secs && f.time <= horizon)
            .collect();
    nowcast_frames.sort_by_key(|f| f.time);

    Ok(RadarDataset::from_parts(host, past_frames, nowcast_frames))
}

/// Normalize raw metadata. Never fails: a rejected payload becomes the
/// empty dataset.
pub fn normalize(raw: &Value, now: DateTime<Utc>) -> RadarDataset {
    parse_dataset(raw, now).unwrap_or_else(|e| {
        tracing::warn!("Malformed radar payload: {}", e);
        RadarDataset::empty()
    })
}

/// Normalize raw metadata that has not been parsed yet.
pub fn normalize_str(raw: &str, now: DateTime<Utc>) -> RadarDataset {
    match serde_json::from_str::<Value>(raw) {
        Ok(value) => normalize(&value, now),
        Err(e) => {
            tracing::warn!("{}", MalformedPayload::InvalidJson(e.to_string()));
            RadarDataset::empty()
        }
    }
}
