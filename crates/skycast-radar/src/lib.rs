//! Radar nowcast pipeline for Skycast
//!
//! Fetches radar frame metadata from RainViewer, splits it into past and
//! nowcast frames, caches it for the session, animates it, and raises
//! proximity and imminent-weather alerts.

pub mod types;
pub mod clock;
pub mod storage;
pub mod normalize;
pub mod cache;
pub mod source;
pub mod feed;
pub mod scheduler;
pub mod playback;
pub mod alerts;
pub mod imminent;
pub mod summary;
pub mod session;

pub use types::*;
pub use alerts::{AlertSettings, AlertSeverity, RadarAlert, RadarAlertEvaluator};
pub use cache::FrameCache;
pub use clock::{Clock, ManualClock, SystemClock};
pub use feed::{refresh_interval, spawn_configured_refresh, RadarFeed, RadarFeedMessage};
pub use imminent::{AlertNotifier, HourlySample, ImminentAlert, ImminentAlertTracker};
pub use normalize::{normalize, normalize_str};
pub use playback::{PlaybackController, PlaybackState};
pub use scheduler::{IntervalHandle, ManualScheduler, Scheduler, TokioScheduler};
pub use session::RadarSession;
pub use source::{FrameSource, RainViewerSource};
pub use storage::{MemoryStore, SessionStore};
pub use summary::{summarize, NowcastSummary};
