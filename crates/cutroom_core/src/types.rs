use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, Div, Mul, Sub};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// TimeUs
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct TimeUs(pub i64);

impl TimeUs {
    pub const ZERO: Self = Self(0);

    pub fn from_seconds(s: f64) -> Self {
        if !s.is_finite() {
            return Self::ZERO;
        }
        Self((s * 1_000_000.0).round() as i64)
    }

    pub fn as_seconds(&self) -> f64 {
        self.0 as f64 / 1_000_000.0
    }

    /// Multiply by a real factor, rounding to the nearest microsecond.
    pub fn scale(self, factor: f64) -> Self {
        Self((self.0 as f64 * factor).round() as i64)
    }

    /// Divide by a real factor, rounding down so the result never overshoots.
    pub fn div_floor(self, factor: f64) -> Self {
        Self((self.0 as f64 / factor).floor() as i64)
    }
}

impl Add for TimeUs {
    type Output = Self;
    fn add(self, rhs: Self) -> Self {
        Self(self.0 + rhs.0)
    }
}

impl Sub for TimeUs {
    type Output = Self;
    fn sub(self, rhs: Self) -> Self {
        Self(self.0 - rhs.0)
    }
}

impl Mul<i64> for TimeUs {
    type Output = Self;
    fn mul(self, rhs: i64) -> Self {
        Self(self.0 * rhs)
    }
}

impl Div<i64> for TimeUs {
    type Output = Self;
    fn div(self, rhs: i64) -> Self {
        Self(self.0 / rhs)
    }
}

impl std::iter::Sum for TimeUs {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        Self(iter.map(|t| t.0).sum())
    }
}

impl fmt::Display for TimeUs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let total_us = self.0.unsigned_abs();
        let total_ms = total_us / 1_000;
        let ms = total_ms % 1_000;
        let total_secs = total_ms / 1_000;
        let secs = total_secs % 60;
        let total_mins = total_secs / 60;
        let mins = total_mins % 60;
        let hours = total_mins / 60;
        if self.0 < 0 {
            write!(f, "-{:02}:{:02}:{:02}.{:03}", hours, mins, secs, ms)
        } else {
            write!(f, "{:02}:{:02}:{:02}.{:03}", hours, mins, secs, ms)
        }
    }
}

// ---------------------------------------------------------------------------
// Limits
// ---------------------------------------------------------------------------

/// Floor applied whenever a clip's duration is edited.
pub const MIN_CLIP_DURATION: TimeUs = TimeUs(500_000);

/// Longest a still image may be held on the timeline.
pub const MAX_STILL_DURATION: TimeUs = TimeUs(30_000_000);

/// Splits closer than this to either clip boundary are rejected.
pub const SPLIT_EPSILON: TimeUs = TimeUs(100_000);

pub const MIN_SPEED: f64 = 0.25;
pub const MAX_SPEED: f64 = 4.0;

/// Ken Burns zoom factors outside this range are clamped.
pub const MIN_ZOOM: f64 = 1.0;
pub const MAX_ZOOM: f64 = 10.0;

pub const DEFAULT_IMAGE_DURATION: TimeUs = TimeUs(3_000_000);

/// Used for video assets whose duration could not be determined.
pub const FALLBACK_VIDEO_DURATION: TimeUs = TimeUs(5_000_000);

// ---------------------------------------------------------------------------
// Transition / FilterEffect
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum Transition {
    #[default]
    None,
    Fade,
    FadeBlack,
    Crossfade,
    SlideLeft,
    SlideRight,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum FilterEffect {
    #[default]
    None,
    Grayscale,
    Sepia,
    Vintage,
    Contrast,
    Brightness,
}

// ---------------------------------------------------------------------------
// KenBurns
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct KenBurns {
    pub start_zoom: f64,
    pub end_zoom: f64,
    pub pan_x: f64,
    pub pan_y: f64,
}

impl Default for KenBurns {
    fn default() -> Self {
        Self {
            start_zoom: 1.0,
            end_zoom: 1.2,
            pan_x: 0.0,
            pan_y: 0.0,
        }
    }
}

/// Zoom and pan offset of a Ken Burns animation at one instant.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KenBurnsFrame {
    pub zoom: f64,
    pub offset_x: f64,
    pub offset_y: f64,
}

impl KenBurns {
    /// Zoom is interpolated linearly; pan grows linearly from zero to its full offset.
    pub fn frame_at(&self, progress: f64) -> KenBurnsFrame {
        let p = if progress.is_finite() {
            progress.clamp(0.0, 1.0)
        } else {
            0.0
        };
        KenBurnsFrame {
            zoom: self.start_zoom + (self.end_zoom - self.start_zoom) * p,
            offset_x: self.pan_x * p,
            offset_y: self.pan_y * p,
        }
    }

    pub fn clamped(&self) -> Self {
        let zoom = |z: f64| {
            if z.is_finite() {
                z.clamp(MIN_ZOOM, MAX_ZOOM)
            } else {
                MIN_ZOOM
            }
        };
        let pan = |p: f64| if p.is_finite() { p } else { 0.0 };
        Self {
            start_zoom: zoom(self.start_zoom),
            end_zoom: zoom(self.end_zoom),
            pan_x: pan(self.pan_x),
            pan_y: pan(self.pan_y),
        }
    }
}

// ---------------------------------------------------------------------------
// ClipKind / ClipMedia
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ClipKind {
    Video,
    Image,
}

/// Kind-specific clip settings. Trim and speed exist only on video, Ken Burns only on images.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ClipMedia {
    #[serde(rename_all = "camelCase")]
    Video {
        trim_start: TimeUs,
        trim_end: TimeUs,
        source_duration: TimeUs,
        speed: f64,
    },
    #[serde(rename_all = "camelCase")]
    Image {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        ken_burns: Option<KenBurns>,
    },
}

impl ClipMedia {
    /// A video that uses the whole source at normal speed.
    pub fn full_video(source_duration: TimeUs) -> Self {
        ClipMedia::Video {
            trim_start: TimeUs::ZERO,
            trim_end: source_duration,
            source_duration,
            speed: 1.0,
        }
    }

    pub fn kind(&self) -> ClipKind {
        match self {
            ClipMedia::Video { .. } => ClipKind::Video,
            ClipMedia::Image { .. } => ClipKind::Image,
        }
    }
}

// ---------------------------------------------------------------------------
// ClipDraft
// ---------------------------------------------------------------------------

/// Everything needed to place a new clip; id and start are assigned by the timeline.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ClipDraft {
    pub source_asset_id: String,
    pub source_url: String,
    pub duration: TimeUs,
    #[serde(default)]
    pub transition_in: Transition,
    #[serde(default)]
    pub transition_out: Transition,
    #[serde(default)]
    pub filter: FilterEffect,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail_url: Option<String>,
    #[serde(flatten)]
    pub media: ClipMedia,
}

// ---------------------------------------------------------------------------
// Clip
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Clip {
    pub id: Uuid,
    pub source_asset_id: String,
    pub source_url: String,
    pub(crate) start: TimeUs,
    pub(crate) duration: TimeUs,
    pub transition_in: Transition,
    pub transition_out: Transition,
    pub filter: FilterEffect,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail_url: Option<String>,
    #[serde(flatten)]
    pub(crate) media: ClipMedia,
}

impl Clip {
    pub(crate) fn from_draft(id: Uuid, start: TimeUs, draft: ClipDraft) -> Self {
        let mut clip = Self {
            id,
            source_asset_id: draft.source_asset_id,
            source_url: draft.source_url,
            start,
            duration: draft.duration,
            transition_in: draft.transition_in,
            transition_out: draft.transition_out,
            filter: draft.filter,
            thumbnail_url: draft.thumbnail_url,
            media: draft.media,
        };
        clip.normalize();
        clip
    }

    pub fn start(&self) -> TimeUs {
        self.start
    }

    pub fn duration(&self) -> TimeUs {
        self.duration
    }

    pub fn end(&self) -> TimeUs {
        self.start + self.duration
    }

    pub fn media(&self) -> &ClipMedia {
        &self.media
    }

    pub fn kind(&self) -> ClipKind {
        self.media.kind()
    }

    pub fn is_video(&self) -> bool {
        self.kind() == ClipKind::Video
    }

    /// Playback rate; always 1 for images.
    pub fn speed(&self) -> f64 {
        match self.media {
            ClipMedia::Video { speed, .. } => speed,
            ClipMedia::Image { .. } => 1.0,
        }
    }

    /// `(trim_start, trim_end)` for video clips.
    pub fn trim_window(&self) -> Option<(TimeUs, TimeUs)> {
        match self.media {
            ClipMedia::Video {
                trim_start,
                trim_end,
                ..
            } => Some((trim_start, trim_end)),
            ClipMedia::Image { .. } => None,
        }
    }

    pub fn ken_burns(&self) -> Option<&KenBurns> {
        match &self.media {
            ClipMedia::Image { ken_burns } => ken_burns.as_ref(),
            ClipMedia::Video { .. } => None,
        }
    }

    /// Source time consumed by this clip: `duration × speed`.
    ///
    /// A 4 s clip at 2x plays 8 s of source; at 0.5x it plays 2 s. Export
    /// trims exactly this span, so rendered length matches the timeline.
    pub fn source_span(&self) -> TimeUs {
        match self.media {
            ClipMedia::Video { speed, .. } => self.duration.scale(speed),
            ClipMedia::Image { .. } => self.duration,
        }
    }

    /// Longest timeline duration this clip can currently take.
    pub fn max_duration(&self) -> TimeUs {
        match self.media {
            ClipMedia::Video {
                trim_start,
                trim_end,
                speed,
                ..
            } => (trim_end - trim_start).div_floor(speed),
            ClipMedia::Image { .. } => MAX_STILL_DURATION,
        }
    }

    /// Images always need encoding; videos only when retimed or filtered.
    pub fn needs_reencode(&self) -> bool {
        match self.media {
            ClipMedia::Video { speed, .. } => speed != 1.0 || self.filter != FilterEffect::None,
            ClipMedia::Image { .. } => true,
        }
    }

    pub fn has_transitions(&self) -> bool {
        self.transition_in != Transition::None || self.transition_out != Transition::None
    }

    /// Half-open containment: a clip does not contain its own end.
    pub fn contains(&self, t: TimeUs) -> bool {
        t >= self.start && t < self.end()
    }

    /// Clamp every field into its valid range. Idempotent.
    pub(crate) fn normalize(&mut self) {
        match &mut self.media {
            ClipMedia::Video {
                trim_start,
                trim_end,
                source_duration,
                speed,
            } => {
                *speed = clamp_speed(*speed);
                if source_duration.0 <= 0 {
                    *source_duration = (*trim_end).max(TimeUs(1));
                }
                *trim_end = (*trim_end).clamp(TimeUs(1), *source_duration);
                *trim_start = (*trim_start).clamp(TimeUs::ZERO, *trim_end - TimeUs(1));

                let max = (*trim_end - *trim_start).div_floor(*speed).max(TimeUs(1));
                let floor = MIN_CLIP_DURATION.min(max);
                self.duration = self.duration.clamp(floor, max);
            }
            ClipMedia::Image { ken_burns } => {
                if let Some(kb) = ken_burns {
                    *kb = kb.clamped();
                }
                self.duration = self.duration.clamp(MIN_CLIP_DURATION, MAX_STILL_DURATION);
            }
        }
    }
}

pub fn clamp_speed(speed: f64) -> f64 {
    if speed.is_finite() {
        speed.clamp(MIN_SPEED, MAX_SPEED)
    } else {
        1.0
    }
}

// ---------------------------------------------------------------------------
// Timeline
// ---------------------------------------------------------------------------

/// Ordered, gap-free clip sequence. Positions are owned by [`Timeline::repack`].
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Timeline {
    pub(crate) clips: Vec<Clip>,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
