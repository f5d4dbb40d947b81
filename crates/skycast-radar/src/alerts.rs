//! Proximity alerts for the radar view.
//!
//! The heavy-precipitation signal is a coarse proxy read from the shape of
//! the frame list and the playback position, not from tile intensities.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use skycast_core::config::{AlertConfig, MAX_ALERT_RADIUS_KM, MIN_ALERT_RADIUS_KM};
use std::collections::HashSet;
use std::sync::Arc;

use crate::clock::Clock;
use crate::storage::{SessionState, SessionStore};
use crate::types::{Location, RadarDataset, RadarFrame};

/// Session key for the user's alert settings.
pub const SETTINGS_KEY: &str = "radar-alert-settings";

/// Active lists longer than this count as heavy precipitation.
pub const HEAVY_FRAME_COUNT: usize = 15;

/// The alert fires while playback is within this many frames of the end.
pub const TRAILING_WINDOW: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertSettings {
    pub enabled: bool,
    pub radius_km: f64,
}

impl Default for AlertSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            radius_km: 10.0,
        }
    }
}

impl AlertSettings {
    pub fn from_config(config: &AlertConfig) -> Self {
        Self {
            enabled: config.enabled_by_default,
            radius_km: config.default_radius_km,
        }
        .clamped()
    }

    /// Same settings with the radius forced into 5-20 km.
    pub fn clamped(self) -> Self {
        let radius_km = if self.radius_km.is_finite() {
            self.radius_km.clamp(MIN_ALERT_RADIUS_KM, MAX_ALERT_RADIUS_KM)
        } else {
            Self::default().radius_km
        };
        Self { radius_km, ..self }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertSeverity {
    Warning,
    Severe,
}

impl AlertSeverity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Warning => "warning",
            Self::Severe => "severe",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RadarAlert {
    pub id: String,
    pub severity: AlertSeverity,
    pub title_key: String,
    pub message_key: String,
    pub timestamp: DateTime<Utc>,
}

/// Whether the active list and playback position indicate heavy
/// precipitation approaching or ongoing.
pub fn heavy_precipitation(active_frames: &[RadarFrame], current_frame_index: usize) -> bool {
    let len = active_frames.len();
    len > HEAVY_FRAME_COUNT && current_frame_index >= len.saturating_sub(TRAILING_WINDOW)
}

/// Alert id for a condition on a dataset. Only depends on the dataset
/// contents and severity, so re-evaluating the same data yields the same id.
pub fn alert_id(dataset: &RadarDataset, severity: AlertSeverity) -> String {
    format!("heavy-precip-{}-{}", dataset.fingerprint(), severity.as_str())
}

pub struct RadarAlertEvaluator {
    settings: SessionState<AlertSettings>,
    clock: Arc<dyn Clock>,
    active: Option<RadarAlert>,
    dismissed: HashSet<String>,
}

impl RadarAlertEvaluator {
    pub fn new(store: Arc<dyn SessionStore>, clock: Arc<dyn Clock>) -> Self {
        Self::with_defaults(store, clock, AlertSettings::default())
    }

    /// Evaluator whose settings fall back to `defaults` when the session has none.
    pub fn with_defaults(
        store: Arc<dyn SessionStore>,
        clock: Arc<dyn Clock>,
        defaults: AlertSettings,
    ) -> Self {
        Self {
            settings: SessionState::load(store, SETTINGS_KEY, defaults.clamped()),
            clock,
            active: None,
            dismissed: HashSet::new(),
        }
    }

    pub fn settings(&self) -> AlertSettings {
        *self.settings.get()
    }

    /// Persist new settings. Disabling alerts clears the active alert.
    pub fn update_settings(&mut self, settings: AlertSettings) {
        let settings = settings.clamped();
        self.settings.set(settings);
        if !settings.enabled {
            self.active = None;
        }
    }

    pub fn active_alert(&self) -> Option<&RadarAlert> {
        self.active.as_ref()
    }

    /// Re-evaluate against the current radar state and return the active alert.
    ///
    /// An alert raised earlier stays active until alerts are disabled, the
    /// inputs go away, or it is dismissed.
    pub fn evaluate(
        &mut self,
        location: Option<&Location>,
        dataset: Option<&RadarDataset>,
        active_frames: &[RadarFrame],
        current_frame_index: usize,
    ) -> Option<RadarAlert> {
        let (Some(_), Some(dataset)) = (location, dataset) else {
            self.active = None;
            return None;
        };
        if !self.settings.get().enabled {
            self.active = None;
            return None;
        }

        if heavy_precipitation(active_frames, current_frame_index) {
            let severity = AlertSeverity::Severe;
            let id = alert_id(dataset, severity);
            let already_active = self.active.as_ref().is_some_and(|a| a.id == id);

            if !self.dismissed.contains(&id) && !already_active {
                tracing::info!("Raising radar alert {}", id);
                self.active = Some(RadarAlert {
                    id,
                    severity,
                    title_key: "radar.alert.heavy.title".to_string(),
                    message_key: "radar.alert.heavy.message".to_string(),
                    timestamp: self.clock.now(),
                });
            }
        }

        self.active.clone()
    }

    /// Dismiss the active alert for the rest of the session.
    pub fn dismiss(&mut self) {
        if let Some(alert) = self.active.take() {
            tracing::debug!("Dismissed radar alert {}", alert.id);
            self.dismissed.insert(alert.id);
        }
    }

    pub fn is_dismissed(&self, id: &str) -> bool {
        self.dismissed.contains(id)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;
    use crate::clock::ManualClock;
    use crate::storage::MemoryStore;

    const NOW: i64 = 1_700_000_000;

    fn location() -> Location {
        Location {
            latitude: 41.0,
            longitude: 29.0,
            city_name: Some("Istanbul".to_string()),
        }
    }

    fn dataset(count: usize) -> RadarDataset {
        let past = (0..count)
            .map(|i| RadarFrame::new(NOW - 600 * (count - i) as i64, format!("/p{}", i)))
            .collect();
        RadarDataset::from_parts("https://tiles/", past, Vec::new())
    }

    fn evaluator(store: Arc<MemoryStore>) -> (RadarAlertEvaluator, ManualClock) {
        let clock = ManualClock::at_secs(NOW);
        (RadarAlertEvaluator::new(store, Arc::new(clock.clone())), clock)
    }

    fn enabled(ev: &mut RadarAlertEvaluator) {
        ev.update_settings(AlertSettings {
            enabled: true,
            radius_km: 10.0,
        });
    }

    #[test]
    fn test_disabled_by_default() {
        let (mut ev, _) = evaluator(Arc::new(MemoryStore::new()));
        let ds = dataset(20);
        assert!(ev.evaluate(Some(&location()), Some(&ds), &ds.past_frames, 19).is_none());
    }

    #[test]
    fn test_heavy_precipitation_near_end_raises_severe() {
        let (mut ev, _) = evaluator(Arc::new(MemoryStore::new()));
        enabled(&mut ev);
        let ds = dataset(20);

        let alert = ev.evaluate(Some(&location()), Some(&ds), &ds.past_frames, 15);
        let alert = alert.unwrap();
        assert_eq!(alert.severity, AlertSeverity::Severe);
        assert_eq!(alert.title_key, "radar.alert.heavy.title");
        assert_eq!(alert.message_key, "radar.alert.heavy.message");
    }

    #[test]
    fn test_heuristic_thresholds() {
        let frames = dataset(16).past_frames;
        assert!(heavy_precipitation(&frames, 11));
        assert!(!heavy_precipitation(&frames, 10));
        let frames = dataset(15).past_frames;
        assert!(!heavy_precipitation(&frames, 14));
    }

    #[test]
    fn test_out_of_range_index_does_not_overflow() {
        let frames = dataset(20).past_frames;
        assert!(heavy_precipitation(&frames, usize::MAX));
        assert!(!heavy_precipitation(&[], usize::MAX));

        let (mut ev, _) = evaluator(Arc::new(MemoryStore::new()));
        enabled(&mut ev);
        let ds = dataset(20);
        assert!(ev
            .evaluate(Some(&location()), Some(&ds), &ds.past_frames, usize::MAX)
            .is_some());
    }

    #[test]
    fn test_id_is_stable_across_reevaluation() {
        let (mut ev, clock) = evaluator(Arc::new(MemoryStore::new()));
        enabled(&mut ev);
        let ds = dataset(20);

        let first = ev.evaluate(Some(&location()), Some(&ds), &ds.past_frames, 19);
        clock.advance(chrono::Duration::seconds(30));
        let second = ev.evaluate(Some(&location()), Some(&ds), &ds.past_frames, 18);

        assert!(first.is_some());
        assert_eq!(first, second);
    }

    #[test]
    fn test_dismissal_sticks_for_same_condition() {
        let (mut ev, _) = evaluator(Arc::new(MemoryStore::new()));
        enabled(&mut ev);
        let ds = dataset(20);

        let alert = ev.evaluate(Some(&location()), Some(&ds), &ds.past_frames, 19);
        ev.dismiss();
        assert!(ev.active_alert().is_none());
        assert!(alert.is_some_and(|a| ev.is_dismissed(&a.id)));

        assert!(ev.evaluate(Some(&location()), Some(&ds), &ds.past_frames, 19).is_none());
    }

    #[test]
    fn test_new_dataset_can_alert_again_after_dismissal() {
        let (mut ev, _) = evaluator(Arc::new(MemoryStore::new()));
        enabled(&mut ev);
        let ds = dataset(20);
        ev.evaluate(Some(&location()), Some(&ds), &ds.past_frames, 19);
        ev.dismiss();

        let newer = dataset(21);
        assert!(ev
            .evaluate(Some(&location()), Some(&newer), &newer.past_frames, 20)
            .is_some());
    }

    #[test]
    fn test_missing_inputs_clear_active_alert() {
        let (mut ev, _) = evaluator(Arc::new(MemoryStore::new()));
        enabled(&mut ev);
        let ds = dataset(20);
        ev.evaluate(Some(&location()), Some(&ds), &ds.past_frames, 19);
        assert!(ev.active_alert().is_some());

        assert!(ev.evaluate(None, Some(&ds), &ds.past_frames, 19).is_none());
        assert!(ev.active_alert().is_none());

        ev.evaluate(Some(&location()), Some(&ds), &ds.past_frames, 19);
        assert!(ev.evaluate(Some(&location()), None, &[], 0).is_none());
    }

    #[test]
    fn test_disabling_clears_active_alert() {
        let (mut ev, _) = evaluator(Arc::new(MemoryStore::new()));
        enabled(&mut ev);
        let ds = dataset(20);
        ev.evaluate(Some(&location()), Some(&ds), &ds.past_frames, 19);

        ev.update_settings(AlertSettings {
            enabled: false,
            radius_km: 10.0,
        });
        assert!(ev.active_alert().is_none());
    }

    #[test]
    fn test_settings_are_clamped_and_persisted() {
        let store = Arc::new(MemoryStore::new());
        let (mut ev, _) = evaluator(store.clone());
        ev.update_settings(AlertSettings {
            enabled: true,
            radius_km: 50.0,
        });
        assert_eq!(ev.settings().radius_km, 20.0);

        let (reloaded, _) = evaluator(store);
        assert_eq!(
            reloaded.settings(),
            AlertSettings {
                enabled: true,
                radius_km: 20.0
            }
        );
    }

    #[test]
    fn test_settings_from_config() {
        let config = AlertConfig {
            enabled_by_default: true,
            default_radius_km: 2.0,
        };
        let settings = AlertSettings::from_config(&config);
        assert!(settings.enabled);
        assert_eq!(settings.radius_km, 5.0);
    }
}
