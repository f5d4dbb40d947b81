//! Radar feed: cache-first loading plus a periodic background refresh.
//! Network work runs on the tokio runtime; results are sent back via mpsc.

use skycast_core::RadarConfig;
use std::sync::mpsc::Sender;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::cache::FrameCache;
use crate::clock::Clock;
use crate::normalize::normalize;
use crate::source::FrameSource;
use crate::types::{FrameMode, RadarDataset, RadarError};

/// Messages sent from the refresh loop back to the owner of the session
#[derive(Debug)]
pub enum RadarFeedMessage {
    /// Result of a background fetch
    FetchDone(Result<RadarDataset, RadarError>),
}

pub struct RadarFeed<S> {
    source: S,
    cache: FrameCache,
    clock: Arc<dyn Clock>,
}

impl<S: FrameSource> RadarFeed<S> {
    pub fn new(source: S, cache: FrameCache, clock: Arc<dyn Clock>) -> Self {
        Self {
            source,
            cache,
            clock,
        }
    }

    pub fn cache(&self) -> &FrameCache {
        &self.cache
    }

    /// Serve from cache when it has usable data for `mode`, otherwise fetch.
    pub async fn load(&self, mode: FrameMode) -> Result<RadarDataset, RadarError> {
        if let Some(cached) = self.cache.get_for_mode(mode) {
            tracing::info!("Using cached radar data ({} frames)", cached.frames.len());
            return Ok(cached);
        }
        self.refresh().await
    }

    /// Fetch, normalize and cache, bypassing any cached entry.
    pub async fn refresh(&self) -> Result<RadarDataset, RadarError> {
        let raw = self.source.fetch().await?;
        let dataset = normalize(&raw, self.clock.now());
        tracing::info!(
            past = dataset.past_frames.len(),
            nowcast = dataset.nowcast_frames.len(),
            "Fetched radar data"
        );
        self.cache.set(&dataset);
        Ok(dataset)
    }
}

/// Background refresh period from config; `None` when refresh is disabled
/// (`refresh_minutes = 0`).
pub fn refresh_interval(config: &RadarConfig) -> Option<Duration> {
    match config.refresh_minutes {
        0 => None,
        minutes => Some(Duration::from_secs(u64::from(minutes) * 60)),
    }
}

/// Start the refresh loop at the configured period. Returns `None` without
/// spawning anything when refresh is disabled.
pub fn spawn_configured_refresh<S>(
    runtime: &tokio::runtime::Handle,
    feed: Arc<RadarFeed<S>>,
    config: &RadarConfig,
    tx: Sender<RadarFeedMessage>,
    cancel: CancellationToken,
) -> Option<JoinHandle<()>>
where
    S: FrameSource + 'static,
{
    let Some(interval) = refresh_interval(config) else {
        tracing::info!("Radar background refresh disabled");
        return None;
    };
    spawn_refresh(runtime, feed, interval, tx, cancel)
}

/// Refresh the feed every `interval` until `cancel` fires or the receiver
/// goes away. The first refresh happens one interval after the call.
/// A zero interval spawns nothing.
pub fn spawn_refresh<S>(
    runtime: &tokio::runtime::Handle,
    feed: Arc<RadarFeed<S>>,
    interval: Duration,
    tx: Sender<RadarFeedMessage>,
    cancel: CancellationToken,
) -> Option<JoinHandle<()>>
where
    S: FrameSource + 'static,
{
    if interval.is_zero() {
        tracing::warn!("Refusing to start radar refresh with a zero interval");
        return None;
    }

    Some(runtime.spawn(async move {
        let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    let result = feed.refresh().await;
                    if let Err(e) = &result {
                        tracing::warn!("Radar refresh failed: {}", e);
                    }
                    if tx.send(RadarFeedMessage::FetchDone(result)).is_err() {
                        tracing::debug!("Radar feed receiver dropped");
                        break;
                    }
                }
            }
        }
        tracing::debug!("Radar refresh loop stopped");
    }))
}
