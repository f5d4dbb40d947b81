//! Single-slot session cache for the last normalized radar dataset.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

use crate::clock::Clock;
use crate::normalize::validate_frame;
use crate::storage::{write_json, SessionStore};
use crate::types::{FrameMode, RadarDataset};

/// Session key holding the cached dataset.
pub const CACHE_KEY: &str = "radar-frame-cache";

/// How long a cached dataset stays fresh, in seconds.
pub const CACHE_TTL_SECS: i64 = 5 * 60;

#[derive(Debug, Serialize, Deserialize)]
struct CacheEntry {
    data: RadarDataset,
    /// Capture time, epoch milliseconds
    timestamp: i64,
}

pub struct FrameCache {
    store: Arc<dyn SessionStore>,
    clock: Arc<dyn Clock>,
}

impl FrameCache {
    pub fn new(store: Arc<dyn SessionStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Return the cached dataset if present, fresh, and structurally sound.
    /// Expired or corrupt entries are evicted.
    pub fn get(&self) -> Option<RadarDataset> {
        let raw = self.store.get(CACHE_KEY)?;

        let now_ms = self.clock.now().timestamp_millis();

        let Some(entry) = parse_entry(&raw, now_ms) else {
            tracing::debug!("Radar cache entry failed validation, evicting");
            self.store.remove(CACHE_KEY);
            return None;
        };

        let Some(age_ms) = now_ms.checked_sub(entry.timestamp) else {
            tracing::debug!("Radar cache timestamp out of range, evicting");
            self.store.remove(CACHE_KEY);
            return None;
        };
        if age_ms > CACHE_TTL_SECS * 1000 {
            tracing::debug!("Radar cache entry expired ({} ms old), evicting", age_ms);
            self.store.remove(CACHE_KEY);
            return None;
        }

        Some(entry.data)
    }

    /// Like [`get`](Self::get), but a forecast request also needs future data.
    /// An entry that fails that check stays cached for past-mode use.
    pub fn get_for_mode(&self, mode: FrameMode) -> Option<RadarDataset> {
        let data = self.get()?;
        if mode == FrameMode::Forecast && !self.is_usable_for_forecast(&data) {
            tracing::debug!("Cached radar data has no future frames; treating as miss");
            return None;
        }
        Some(data)
    }

    /// Replace the cached dataset, stamping it with the current time.
    pub fn set(&self, data: &RadarDataset) {
        let entry = CacheEntry {
            data: data.clone(),
            timestamp: self.clock.now().timestamp_millis(),
        };
        if let Err(e) = write_json(self.store.as_ref(), CACHE_KEY, &entry) {
            tracing::warn!("Failed to write radar cache: {}", e);
        }
    }

    pub fn clear(&self) {
        self.store.remove(CACHE_KEY);
    }

    pub fn is_usable_for_forecast(&self, data: &RadarDataset) -> bool {
        is_usable_for_forecast(data, self.clock.now_secs())
    }
}

/// True if the dataset can drive forecast playback: it has nowcast frames,
/// or at least one combined frame that has not elapsed yet.
pub fn is_usable_for_forecast(data: &RadarDataset, now_secs: i64) -> bool {
    !data.nowcast_frames.is_empty() || data.frames.iter().any(|f| f.time >= now_secs)
}

/// Structural re-validation of a stored entry: the capture time is not in
/// the future, host is a string and all three lists hold only well-formed
/// frames.
fn parse_entry(raw: &str, now_ms: i64) -> Option<CacheEntry> {
    let value: Value = serde_json::from_str(raw).ok()?;
    let timestamp = value.get("timestamp")?.as_i64()?;
    if timestamp > now_ms {
        return None;
    }
    let data = value.get("data")?;

    data.get("host")?.as_str()?;
    for list in ["frames", "pastFrames", "nowcastFrames"] {
        let frames = data.get(list)?.as_array()?;
        if frames.iter().any(|f| validate_frame(f).is_err()) {
            return None;
        }
    }

    let data: RadarDataset = serde_json::from_value(data.clone()).ok()?;
    Some(CacheEntry { data, timestamp })
}
