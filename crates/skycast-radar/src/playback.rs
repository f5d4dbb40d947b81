//! Radar animation state machine.
//!
//! Two states, Stopped and Playing. While playing, a scheduler interval
//! advances the frame index and wraps to the first frame after the last.
//! Seeking always stops playback; replacing the frame list stops playback
//! and repositions without counting as a user action.

use chrono::{DateTime, Local, TimeZone};
use parking_lot::Mutex;
use std::fmt::Display;
use std::sync::Arc;
use std::time::Duration;

use crate::scheduler::{IntervalHandle, Scheduler};
use crate::types::{FrameMode, RadarFrame};

/// Time each frame stays on screen while playing.
pub const FRAME_INTERVAL: Duration = Duration::from_millis(500);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PlaybackState {
    pub current_frame_index: usize,
    pub is_playing: bool,
}

/// First frame that has not elapsed yet, or 0 when every frame is past.
pub fn initial_frame_index(frames: &[RadarFrame], now_secs: i64) -> usize {
    frames
        .iter()
        .position(|f| f.time >= now_secs)
        .unwrap_or(0)
}

/// Starting index for a freshly loaded list: forecast mode shows the next
/// unelapsed frame, past mode the most recent one.
pub fn starting_index(frames: &[RadarFrame], mode: FrameMode, now_secs: i64) -> usize {
    match mode {
        FrameMode::Forecast => initial_frame_index(frames, now_secs),
        FrameMode::Past => frames.len().saturating_sub(1),
    }
}

#[derive(Debug, Default)]
struct Timeline {
    frames: Vec<RadarFrame>,
    state: PlaybackState,
    /// Bumped whenever playback stops so ticks from an old interval are ignored.
    generation: u64,
}

impl Timeline {
    fn advance(&mut self) {
        let len = self.frames.len();
        if len == 0 {
            self.state.current_frame_index = 0;
            return;
        }
        let next = self.state.current_frame_index + 1;
        self.state.current_frame_index = if next >= len { 0 } else { next };
    }

    fn clamp(&self, index: usize) -> usize {
        index.min(self.frames.len().saturating_sub(1))
    }

    fn stop(&mut self) {
        self.state.is_playing = false;
        self.generation = self.generation.wrapping_add(1);
    }
}

pub struct PlaybackController<S: Scheduler> {
    timeline: Arc<Mutex<Timeline>>,
    scheduler: S,
    period: Duration,
    timer: Option<IntervalHandle>,
}

impl<S: Scheduler> PlaybackController<S> {
    pub fn new(scheduler: S) -> Self {
        Self::with_period(scheduler, FRAME_INTERVAL)
    }

    pub fn with_period(scheduler: S, period: Duration) -> Self {
        Self {
            timeline: Arc::new(Mutex::new(Timeline::default())),
            scheduler,
            period: period.max(Duration::from_millis(1)),
            timer: None,
        }
    }

    pub fn state(&self) -> PlaybackState {
        self.timeline.lock().state
    }

    pub fn is_playing(&self) -> bool {
        self.timeline.lock().state.is_playing
    }

    pub fn current_frame_index(&self) -> usize {
        self.timeline.lock().state.current_frame_index
    }

    pub fn len(&self) -> usize {
        self.timeline.lock().frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timeline.lock().frames.is_empty()
    }

    pub fn frames(&self) -> Vec<RadarFrame> {
        self.timeline.lock().frames.clone()
    }

    pub fn current_frame(&self) -> Option<RadarFrame> {
        let tl = self.timeline.lock();
        tl.frames.get(tl.state.current_frame_index).cloned()
    }

    /// Start animating. Needs at least two frames; otherwise nothing happens.
    pub fn play(&mut self) {
        let generation = {
            let mut tl = self.timeline.lock();
            if tl.state.is_playing || tl.frames.len() <= 1 {
                return;
            }
            tl.state.is_playing = true;
            tl.generation
        };

        let timeline = Arc::clone(&self.timeline);
        let handle = self.scheduler.start_interval(
            self.period,
            Box::new(move || {
                let mut tl = timeline.lock();
                if tl.generation == generation && tl.state.is_playing {
                    tl.advance();
                }
            }),
        );
        self.timer = Some(handle);
        tracing::debug!("Radar playback started");
    }

    pub fn pause(&mut self) {
        self.halt();
    }

    /// User seek: clamp into range, jump there, and stop playing.
    pub fn seek_to_frame(&mut self, index: usize) {
        self.halt();
        let mut tl = self.timeline.lock();
        tl.state.current_frame_index = tl.clamp(index);
    }

    pub fn previous(&mut self) {
        let index = self.current_frame_index();
        if self.is_empty() || index == 0 {
            return;
        }
        self.seek_to_frame(index - 1);
    }

    pub fn next(&mut self) {
        let index = self.current_frame_index();
        if index + 1 >= self.len() {
            return;
        }
        self.seek_to_frame(index + 1);
    }

    /// Replace the frame list. Always stops playback; the index moves to
    /// `initial_index` (clamped), or 0 for an empty list.
    pub fn set_frames(&mut self, frames: Vec<RadarFrame>, initial_index: usize) {
        self.halt();
        let mut tl = self.timeline.lock();
        tl.frames = frames;
        tl.state.current_frame_index = tl.clamp(initial_index);
    }

    /// Replace the frame list, choosing the start position by mode.
    pub fn load_frames(&mut self, frames: Vec<RadarFrame>, mode: FrameMode, now_secs: i64) {
        let initial = starting_index(&frames, mode, now_secs);
        self.set_frames(frames, initial);
    }

    /// Local `HH:MM` label for a frame, empty when out of range.
    pub fn frame_label(&self, index: usize) -> String {
        self.frame_label_in(index, &Local)
    }

    pub fn frame_label_in<Tz>(&self, index: usize, tz: &Tz) -> String
    where
        Tz: TimeZone,
        Tz::Offset: Display,
    {
        let tl = self.timeline.lock();
        tl.frames
            .get(index)
            .and_then(|f| DateTime::from_timestamp(f.time, 0))
            .map(|t| t.with_timezone(tz).format("%H:%M").to_string())
            .unwrap_or_default()
    }

    /// Whether the frame at `index` has already happened. Out-of-range
    /// indices count as past.
    pub fn is_past_frame(&self, index: usize, now_secs: i64) -> bool {
        self.timeline
            .lock()
            .frames
            .get(index)
            .map_or(true, |f| f.time <= now_secs)
    }

    fn halt(&mut self) {
        let was_playing = {
            let mut tl = self.timeline.lock();
            let was_playing = tl.state.is_playing;
            tl.stop();
            was_playing
        };
        if let Some(timer) = self.timer.take() {
            timer.cancel();
        }
        if was_playing {
            tracing::debug!("Radar playback stopped");
        }
    }
}
