use crate::types::*;
use serde::{Deserialize, Serialize};
use std::sync::Mutex;
use std::time::Duration;

/// Preview refresh period (20 Hz).
pub const TICK_INTERVAL: Duration = Duration::from_millis(50);

pub const MIN_ZOOM_LEVEL: f64 = 0.25;
pub const MAX_ZOOM_LEVEL: f64 = 4.0;
const ZOOM_STEP: f64 = 1.25;

/// Time cursor over the timeline. It never owns the clips; callers pass the
/// current total duration in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaybackClock {
    current: TimeUs,
    playing: bool,
    zoom: f64,
}

impl Default for PlaybackClock {
    fn default() -> Self {
        Self {
            current: TimeUs::ZERO,
            playing: false,
            zoom: 1.0,
        }
    }
}

impl PlaybackClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current_time(&self) -> TimeUs {
        self.current
    }

    pub fn is_playing(&self) -> bool {
        self.playing
    }

    pub fn zoom(&self) -> f64 {
        self.zoom
    }

    pub fn play(&mut self) {
        self.playing = true;
    }

    pub fn pause(&mut self) {
        self.playing = false;
    }

    pub fn toggle(&mut self) {
        self.playing = !self.playing;
    }

    /// Move the cursor; play state is left alone.
    pub fn seek(&mut self, t: TimeUs, total: TimeUs) {
        self.current = t.clamp(TimeUs::ZERO, total.max(TimeUs::ZERO));
    }

    pub fn skip_to_start(&mut self) {
        self.current = TimeUs::ZERO;
    }

    pub fn skip_to_end(&mut self, total: TimeUs) {
        self.current = total.max(TimeUs::ZERO);
    }

    /// Advance by `elapsed` while playing. Reaching the end stops playback and
    /// rewinds to zero.
    pub fn tick(&mut self, elapsed: Duration, total: TimeUs) {
        if !self.playing {
            return;
        }
        let next = self.current + TimeUs(elapsed.as_micros() as i64);
        if next >= total {
            self.playing = false;
            self.current = TimeUs::ZERO;
        } else {
            self.current = next;
        }
    }

    /// Stop and rewind, as when the timeline is cleared.
    pub fn reset(&mut self) {
        self.playing = false;
        self.current = TimeUs::ZERO;
    }

    pub fn set_zoom(&mut self, zoom: f64) {
        self.zoom = if zoom.is_finite() {
            zoom.clamp(MIN_ZOOM_LEVEL, MAX_ZOOM_LEVEL)
        } else {
            1.0
        };
    }

    pub fn zoom_in(&mut self) {
        self.set_zoom(self.zoom * ZOOM_STEP);
    }

    pub fn zoom_out(&mut self) {
        self.set_zoom(self.zoom / ZOOM_STEP);
    }
}

/// Fraction of `clip` elapsed at timeline time `t`, in `[0, 1]`.
pub fn clip_progress(clip: &Clip, t: TimeUs) -> f64 {
    if clip.duration().0 <= 0 {
        return 0.0;
    }
    ((t - clip.start()).0 as f64 / clip.duration().0 as f64).clamp(0.0, 1.0)
}

/// Source position a video preview should show at timeline time `t`.
pub fn source_time_at(clip: &Clip, t: TimeUs) -> Option<TimeUs> {
    let (trim_start, trim_end) = clip.trim_window()?;
    let into_clip = (t - clip.start()).clamp(TimeUs::ZERO, clip.duration());
    Some((trim_start + into_clip.scale(clip.speed())).min(trim_end))
}

/// Anything that owns a clock and knows its timeline length.
pub trait Clocked {
    fn clock_mut(&mut self) -> &mut PlaybackClock;
    fn total_duration(&self) -> TimeUs;
}

/// Tick a shared session every [`TICK_INTERVAL`] until playback stops.
///
/// Seeks made through the mutex between ticks take effect on the next tick.
pub async fn drive_playback<S: Clocked>(state: &Mutex<S>) {
    let mut interval = tokio::time::interval(TICK_INTERVAL);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    interval.tick().await;

    loop {
        interval.tick().await;
        let Ok(mut guard) = state.lock() else {
            tracing::warn!("playback state poisoned, stopping ticker");
            return;
        };
        let total = guard.total_duration();
        let clock = guard.clock_mut();
        clock.tick(TICK_INTERVAL, total);
        if !clock.is_playing() {
            return;
        }
    }
}
