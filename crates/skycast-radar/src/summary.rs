//! Short textual summary of what the radar loop shows.
//!
//! Intensity is estimated from the number of frames, not from tile pixels.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::types::RadarFrame;

/// Minutes of weather each frame stands for.
const MINUTES_PER_FRAME: usize = 5;

/// When the precipitation shown at the current frame starts, relative to now.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StartTime {
    Minutes(i64),
    Now,
    Started,
    Unknown,
}

impl fmt::Display for StartTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StartTime::Minutes(n) => write!(f, "{} min", n),
            StartTime::Now => write!(f, "Now"),
            StartTime::Started => write!(f, "Started"),
            StartTime::Unknown => write!(f, "--"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NowcastSummary {
    pub start_time: StartTime,
    /// Estimated duration in minutes; `None` without frames
    pub duration_minutes: Option<usize>,
    pub intensity_key: &'static str,
}

impl NowcastSummary {
    pub fn duration_label(&self) -> String {
        match self.duration_minutes {
            Some(m) => format!("~{} min", m),
            None => "--".to_string(),
        }
    }
}

pub fn intensity_key(frame_count: usize) -> &'static str {
    match frame_count {
        0 => "radar.intensity.none",
        1..=10 => "radar.intensity.light",
        11..=20 => "radar.intensity.moderate",
        _ => "radar.intensity.heavy",
    }
}

/// Summarize the active frame list at the current playback position.
pub fn summarize(
    active_frames: &[RadarFrame],
    current_frame_index: usize,
    now_secs: i64,
) -> NowcastSummary {
    if active_frames.is_empty() {
        return NowcastSummary {
            start_time: StartTime::Unknown,
            duration_minutes: None,
            intensity_key: intensity_key(0),
        };
    }

    let start_time = match active_frames.get(current_frame_index) {
        Some(frame) => {
            // Halves round up, toward the future.
            let minutes = ((frame.time - now_secs) as f64 / 60.0 + 0.5).floor() as i64;
            match minutes {
                m if m > 0 => StartTime::Minutes(m),
                0 => StartTime::Now,
                _ => StartTime::Started,
            }
        }
        None => StartTime::Unknown,
    };

    NowcastSummary {
        start_time,
        duration_minutes: Some(active_frames.len() * MINUTES_PER_FRAME),
        intensity_key: intensity_key(active_frames.len()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const NOW: i64 = 1_700_000_000;

    fn frames(offsets_secs: &[i64]) -> Vec<RadarFrame> {
        offsets_secs
            .iter()
            .enumerate()
            .map(|(i, o)| RadarFrame::new(NOW + o, format!("/f{}", i)))
            .collect()
    }

    #[test]
    fn test_empty_list_is_unknown() {
        let summary = summarize(&[], 0, NOW);
        assert_eq!(summary.start_time, StartTime::Unknown);
        assert_eq!(summary.duration_label(), "--");
        assert_eq!(summary.intensity_key, "radar.intensity.none");
    }

    #[test]
    fn test_future_frame_reports_minutes() {
        let list = frames(&[600, 1200, 1800]);
        let summary = summarize(&list, 1, NOW);
        assert_eq!(summary.start_time, StartTime::Minutes(20));
        assert_eq!(summary.start_time.to_string(), "20 min");
        assert_eq!(summary.duration_minutes, Some(15));
        assert_eq!(summary.duration_label(), "~15 min");
        assert_eq!(summary.intensity_key, "radar.intensity.light");
    }

    #[test]
    fn test_rounding_decides_now_vs_started() {
        let list = frames(&[-29, -30, -31, 29, 30]);
        assert_eq!(summarize(&list, 0, NOW).start_time, StartTime::Now);
        assert_eq!(summarize(&list, 1, NOW).start_time, StartTime::Now);
        assert_eq!(summarize(&list, 2, NOW).start_time, StartTime::Started);
        assert_eq!(summarize(&list, 3, NOW).start_time, StartTime::Now);
        assert_eq!(summarize(&list, 4, NOW).start_time, StartTime::Minutes(1));
    }

    #[test]
    fn test_out_of_range_index_is_unknown_start() {
        let list = frames(&[600]);
        let summary = summarize(&list, 5, NOW);
        assert_eq!(summary.start_time, StartTime::Unknown);
        assert_eq!(summary.duration_minutes, Some(5));
    }

    #[test]
    fn test_intensity_thresholds() {
        assert_eq!(intensity_key(10), "radar.intensity.light");
        assert_eq!(intensity_key(11), "radar.intensity.moderate");
        assert_eq!(intensity_key(20), "radar.intensity.moderate");
        assert_eq!(intensity_key(21), "radar.intensity.heavy");
    }
}
