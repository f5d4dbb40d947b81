//! Radar screen state: the loaded dataset, the selected mode and location,
//! playback, and the proximity alert.
//!
//! Playback ticks do not call back into the session. Callers that show the
//! alert while animating re-run [`RadarSession::refresh_alert`] after moving
//! the playback position.

use std::sync::Arc;
use std::time::Duration;

use skycast_core::Config;

use crate::alerts::{AlertSettings, RadarAlert, RadarAlertEvaluator};
use crate::clock::Clock;
use crate::playback::PlaybackController;
use crate::scheduler::Scheduler;
use crate::storage::SessionStore;
use crate::summary::{summarize, NowcastSummary};
use crate::types::{FrameMode, Location, RadarDataset, RadarFrame};

pub struct RadarSession<S: Scheduler> {
    dataset: Option<RadarDataset>,
    mode: FrameMode,
    location: Option<Location>,
    playback: PlaybackController<S>,
    alerts: RadarAlertEvaluator,
    clock: Arc<dyn Clock>,
}

impl<S: Scheduler> RadarSession<S> {
    pub fn new(
        playback: PlaybackController<S>,
        alerts: RadarAlertEvaluator,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            dataset: None,
            mode: FrameMode::default(),
            location: None,
            playback,
            alerts,
            clock,
        }
    }

    /// Session wired from the app configuration.
    pub fn from_config(
        config: &Config,
        scheduler: S,
        store: Arc<dyn SessionStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let playback = PlaybackController::with_period(
            scheduler,
            Duration::from_millis(config.radar.frame_interval_ms),
        );
        let alerts = RadarAlertEvaluator::with_defaults(
            store,
            clock.clone(),
            AlertSettings::from_config(&config.alerts),
        );
        Self::new(playback, alerts, clock)
    }

    pub fn dataset(&self) -> Option<&RadarDataset> {
        self.dataset.as_ref()
    }

    pub fn mode(&self) -> FrameMode {
        self.mode
    }

    pub fn location(&self) -> Option<&Location> {
        self.location.as_ref()
    }

    pub fn playback(&self) -> &PlaybackController<S> {
        &self.playback
    }

    pub fn playback_mut(&mut self) -> &mut PlaybackController<S> {
        &mut self.playback
    }

    pub fn alerts(&self) -> &RadarAlertEvaluator {
        &self.alerts
    }

    /// Frames the playback controller animates for the current mode.
    pub fn active_frames(&self) -> &[RadarFrame] {
        self.dataset
            .as_ref()
            .map_or(&[][..], |d| d.active_frames(self.mode))
    }

    /// Install a freshly loaded dataset and reposition playback.
    pub fn apply_dataset(&mut self, dataset: RadarDataset) -> Option<RadarAlert> {
        self.dataset = Some(dataset);
        self.reload_frames();
        self.refresh_alert()
    }

    pub fn set_mode(&mut self, mode: FrameMode) -> Option<RadarAlert> {
        if mode != self.mode {
            self.mode = mode;
            self.reload_frames();
        }
        self.refresh_alert()
    }

    pub fn set_location(&mut self, location: Option<Location>) -> Option<RadarAlert> {
        self.location = location;
        self.refresh_alert()
    }

    pub fn update_alert_settings(&mut self, settings: AlertSettings) -> Option<RadarAlert> {
        self.alerts.update_settings(settings);
        self.refresh_alert()
    }

    pub fn refresh_alert(&mut self) -> Option<RadarAlert> {
        let frames = self
            .dataset
            .as_ref()
            .map_or(&[][..], |d| d.active_frames(self.mode));
        self.alerts.evaluate(
            self.location.as_ref(),
            self.dataset.as_ref(),
            frames,
            self.playback.current_frame_index(),
        )
    }

    pub fn dismiss_alert(&mut self) {
        self.alerts.dismiss();
    }

    pub fn summary(&self) -> NowcastSummary {
        summarize(
            self.active_frames(),
            self.playback.current_frame_index(),
            self.clock.now_secs(),
        )
    }

    /// Tile URL for the current frame.
    pub fn current_tile_url(&self, z: u32, x: u32, y: u32) -> Option<String> {
        let dataset = self.dataset.as_ref()?;
        let frame = self.playback.current_frame()?;
        Some(frame.tile_url(&dataset.host, z, x, y))
    }

    /// Forecast mode that fell back to past frames positions like past mode.
    fn reload_frames(&mut self) {
        let (frames, start_mode) = match &self.dataset {
            Some(d) => {
                let start_mode =
                    if self.mode == FrameMode::Forecast && !d.nowcast_frames.is_empty() {
                        FrameMode::Forecast
                    } else {
                        FrameMode::Past
                    };
                (d.active_frames(self.mode).to_vec(), start_mode)
            }
            None => (Vec::new(), self.mode),
        };
        self.playback.load_frames(frames, start_mode, self.clock.now_secs());
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;
    use crate::clock::ManualClock;
    use crate::scheduler::ManualScheduler;
    use crate::storage::MemoryStore;
    use crate::summary::StartTime;

    const NOW: i64 = 1_700_000_000;

    fn session() -> (RadarSession<ManualScheduler>, ManualScheduler) {
        let scheduler = ManualScheduler::new();
        let clock: Arc<dyn Clock> = Arc::new(ManualClock::at_secs(NOW));
        let store: Arc<dyn SessionStore> = Arc::new(MemoryStore::new());
        let session = RadarSession::from_config(&Config::default(), scheduler.clone(), store, clock);
        (session, scheduler)
    }

    fn dataset(past: usize, nowcast: usize) -> RadarDataset {
        let past = (0..past)
            .map(|i| RadarFrame::new(NOW - 600 * (past - i) as i64, format!("/p{}", i)))
            .collect();
        let nowcast = (0..nowcast)
            .map(|i| RadarFrame::new(NOW + 600 * (i as i64 + 1), format!("/n{}", i)))
            .collect();
        RadarDataset::from_parts("https://tilecache.rainviewer.com", past, nowcast)
    }

    fn location() -> Location {
        Location {
            latitude: 40.4,
            longitude: -3.7,
            city_name: Some("Madrid".to_string()),
        }
    }

    #[test]
    fn test_forecast_mode_animates_nowcast_from_first_frame() {
        let (mut session, _) = session();
        session.apply_dataset(dataset(3, 2));

        assert_eq!(session.active_frames().len(), 2);
        assert_eq!(session.playback().current_frame_index(), 0);
        assert_eq!(
            session.current_tile_url(5, 10, 12).as_deref(),
            Some("https://tilecache.rainviewer.com/n0/256/5/10/12/2/1_1.png")
        );
    }

    #[test]
    fn test_forecast_without_nowcast_starts_at_latest_past_frame() {
        let (mut session, _) = session();
        session.apply_dataset(dataset(4, 0));

        assert_eq!(session.active_frames().len(), 4);
        assert_eq!(session.playback().current_frame_index(), 3);
    }

    #[test]
    fn test_switching_mode_replaces_frames_and_stops() {
        let (mut session, scheduler) = session();
        session.apply_dataset(dataset(3, 2));
        session.playback_mut().play();
        scheduler.advance(Duration::from_millis(500));
        assert!(session.playback().is_playing());

        session.set_mode(FrameMode::Past);
        assert!(!session.playback().is_playing());
        assert_eq!(session.active_frames().len(), 3);
        assert_eq!(session.playback().current_frame_index(), 2);
        assert_eq!(scheduler.active_timers(), 0);
    }

    #[test]
    fn test_alert_requires_location_and_enabled_settings() {
        let (mut session, _) = session();
        assert!(session.apply_dataset(dataset(20, 0)).is_none());
        assert!(session.set_location(Some(location())).is_none());

        let alert = session.update_alert_settings(AlertSettings {
            enabled: true,
            radius_km: 10.0,
        });
        assert!(alert.is_some());

        session.dismiss_alert();
        assert!(session.refresh_alert().is_none());
        assert!(session.alerts().active_alert().is_none());
    }

    #[test]
    fn test_alert_follows_playback_position() {
        let (mut session, _) = session();
        session.set_location(Some(location()));
        session.apply_dataset(dataset(20, 0));
        session.playback_mut().seek_to_frame(2);

        let alert = session.update_alert_settings(AlertSettings {
            enabled: true,
            radius_km: 10.0,
        });
        assert!(alert.is_none());

        session.playback_mut().seek_to_frame(17);
        assert!(session.refresh_alert().is_some());
    }

    #[test]
    fn test_summary_uses_active_frames() {
        let (mut session, _) = session();
        session.apply_dataset(dataset(3, 2));

        let summary = session.summary();
        assert_eq!(summary.start_time, StartTime::Minutes(10));
        assert_eq!(summary.duration_minutes, Some(10));
    }

    #[test]
    fn test_empty_session() {
        let (mut session, _) = session();
        assert!(session.active_frames().is_empty());
        assert!(session.current_tile_url(0, 0, 0).is_none());
        assert_eq!(session.summary().start_time, StartTime::Unknown);

        session.apply_dataset(RadarDataset::empty());
        assert!(session.playback().is_empty());
        assert_eq!(session.playback().current_frame_index(), 0);
    }
}
