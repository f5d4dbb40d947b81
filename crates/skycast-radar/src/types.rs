use serde::{Deserialize, Serialize};
use serde_json::json;
use skycast_core::{AppError, NetworkError};
use std::time::Duration;

/// A single radar snapshot: epoch seconds plus the tile-path fragment
/// appended to the dataset host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RadarFrame {
    pub time: i64,
    pub path: String,
}

impl RadarFrame {
    pub fn new(time: i64, path: impl Into<String>) -> Self {
        Self {
            time,
            path: path.into(),
        }
    }

    /// Build the 256px tile URL for this frame (color scheme 2, smoothed, snow shown).
    pub fn tile_url(&self, host: &str, z: u32, x: u32, y: u32) -> String {
        format!("{}{}/256/{}/{}/{}/2/1_1.png", host, self.path, z, x, y)
    }
}

/// Normalized radar metadata.
///
/// `frames` is always `past_frames` followed by `nowcast_frames`; both halves
/// are sorted ascending by time.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RadarDataset {
    pub host: String,
    pub frames: Vec<RadarFrame>,
    pub past_frames: Vec<RadarFrame>,
    pub nowcast_frames: Vec<RadarFrame>,
}

impl RadarDataset {
    /// Dataset with no host and no frames; what malformed input degrades to.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Assemble a dataset from already validated, sorted halves.
    pub fn from_parts(
        host: impl Into<String>,
        past_frames: Vec<RadarFrame>,
        nowcast_frames: Vec<RadarFrame>,
    ) -> Self {
        let frames = past_frames
            .iter()
            .chain(nowcast_frames.iter())
            .cloned()
            .collect();
        Self {
            host: host.into(),
            frames,
            past_frames,
            nowcast_frames,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Frame list driving playback for the given mode.
    ///
    /// Forecast mode falls back to past frames when there is no nowcast.
    pub fn active_frames(&self, mode: FrameMode) -> &[RadarFrame] {
        match mode {
            FrameMode::Forecast if !self.nowcast_frames.is_empty() => &self.nowcast_frames,
            _ => &self.past_frames,
        }
    }

    /// Identity of this dataset that does not depend on when it is inspected.
    pub fn fingerprint(&self) -> String {
        match (self.frames.first(), self.frames.last()) {
            (Some(first), Some(last)) => {
                format!("{}-{}-{}", first.time, last.time, self.frames.len())
            }
            _ => "empty".to_string(),
        }
    }

    /// Render back into the upstream wire shape
    /// (`{ host, radar: { past, nowcast } }`).
    pub fn to_raw(&self) -> serde_json::Value {
        json!({
            "host": self.host,
            "radar": {
                "past": self.past_frames,
                "nowcast": self.nowcast_frames,
            }
        })
    }
}

/// Which half of the dataset the radar view animates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum FrameMode {
    #[default]
    Forecast,
    Past,
}

/// Geographic location selected by the user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub latitude: f64,
    pub longitude: f64,
    pub city_name: Option<String>,
}

/// Radar feed errors
#[derive(Debug, thiserror::Error)]
pub enum RadarError {
    #[error("Radar request timed out after {0:?}")]
    Timeout(Duration),
    #[error("Network error: {0}")]
    Network(#[from] NetworkError),
    #[error("Radar source returned status {0}")]
    Status(u16),
}

impl RadarError {
    /// User-friendly error message for the radar view.
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::Timeout(_) => "Radar is taking too long to respond. Retrying shortly.",
            Self::Network(e) => e.user_message(),
            Self::Status(status) if *status >= 500 => {
                "Radar service is unavailable. Please try again later."
            }
            Self::Status(_) => "Radar data could not be loaded.",
        }
    }

    /// Timeouts are worth retrying right away; everything else waits for
    /// the next scheduled refresh.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout(_) | Self::Network(NetworkError::Timeout))
    }
}

impl From<RadarError> for AppError {
    fn from(err: RadarError) -> Self {
        match err {
            RadarError::Network(e) => AppError::Network(e),
            RadarError::Timeout(_) => AppError::Network(NetworkError::Timeout),
            other => AppError::Service(other.to_string()),
        }
    }
}
