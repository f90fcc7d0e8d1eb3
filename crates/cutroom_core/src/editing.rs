use crate::types::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A validated edit to a single clip. Kind-specific edits are ignored on the other kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", content = "value", rename_all = "camelCase")]
pub enum ClipEdit {
    SetDuration(TimeUs),
    /// Video only. The clip's duration becomes the new window at the current speed.
    SetTrim { start: TimeUs, end: TimeUs },
    /// Video only. Keeps the consumed source span, so the timeline duration rescales.
    SetSpeed(f64),
    SetFilter(FilterEffect),
    SetTransitionIn(Transition),
    SetTransitionOut(Transition),
    /// Image only.
    SetKenBurns(Option<KenBurns>),
    SetThumbnail(Option<String>),
}

impl Timeline {
    pub fn new() -> Self {
        Self { clips: vec![] }
    }

    pub fn clips(&self) -> &[Clip] {
        &self.clips
    }

    pub fn len(&self) -> usize {
        self.clips.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clips.is_empty()
    }

    pub fn get(&self, id: Uuid) -> Option<&Clip> {
        self.clips.iter().find(|c| c.id == id)
    }

    pub fn index_of(&self, id: Uuid) -> Option<usize> {
        self.clips.iter().position(|c| c.id == id)
    }

    /// End time of the last clip, zero when empty.
    pub fn total_duration(&self) -> TimeUs {
        self.clips
            .iter()
            .map(|c| c.end())
            .max()
            .unwrap_or(TimeUs::ZERO)
    }

    /// The clip whose `[start, end)` interval contains `t`.
    pub fn clip_at(&self, t: TimeUs) -> Option<&Clip> {
        self.clips.iter().find(|c| c.contains(t))
    }

    pub fn has_neighbour_before(&self, id: Uuid) -> bool {
        matches!(self.index_of(id), Some(i) if i > 0)
    }

    pub fn has_neighbour_after(&self, id: Uuid) -> bool {
        matches!(self.index_of(id), Some(i) if i + 1 < self.clips.len())
    }

    /// Append a clip at the end of the timeline. Returns its fresh id.
    pub fn add_clip(&mut self, draft: ClipDraft) -> Uuid {
        let id = Uuid::new_v4();
        let clip = Clip::from_draft(id, self.total_duration(), draft);
        self.clips.push(clip);
        self.repack();
        id
    }

    /// Remove a clip and close the gap it leaves.
    pub fn remove_clip(&mut self, id: Uuid) -> Option<Clip> {
        let Some(pos) = self.index_of(id) else {
            tracing::debug!(%id, "remove_clip: no such clip");
            return None;
        };
        let removed = self.clips.remove(pos);
        self.repack();
        Some(removed)
    }

    /// Apply an edit in place. Returns false when the clip is unknown or the edit
    /// does not apply to its kind.
    pub fn update_clip(&mut self, id: Uuid, edit: ClipEdit) -> bool {
        let Some(pos) = self.index_of(id) else {
            tracing::debug!(%id, "update_clip: no such clip");
            return false;
        };
        let applied = apply_edit(&mut self.clips[pos], edit);
        if applied {
            self.repack();
        }
        applied
    }

    /// Move the clip at `from` to position `to`, then repack.
    pub fn reorder_clips(&mut self, from: usize, to: usize) -> bool {
        let len = self.clips.len();
        if from >= len || to >= len {
            tracing::debug!(from, to, len, "reorder_clips: index out of range");
            return false;
        }
        let clip = self.clips.remove(from);
        self.clips.insert(to, clip);
        self.repack();
        true
    }

    /// Split a clip at absolute timeline time `at`. The left part keeps the id;
    /// returns the id of the right part, or `None` when the split is rejected.
    pub fn split_clip(&mut self, id: Uuid, at: TimeUs) -> Option<Uuid> {
        let Some(pos) = self.index_of(id) else {
            tracing::debug!(%id, "split_clip: no such clip");
            return None;
        };

        let clip = &self.clips[pos];
        let offset = at - clip.start;
        if offset <= SPLIT_EPSILON || offset >= clip.duration - SPLIT_EPSILON {
            tracing::debug!(%id, at = %at, "split_clip: too close to a clip boundary");
            return None;
        }

        let mut left = clip.clone();
        let mut right = clip.clone();
        let right_id = Uuid::new_v4();

        left.duration = offset;
        left.transition_out = Transition::None;

        right.id = right_id;
        right.start = at;
        right.duration = clip.duration - offset;
        right.transition_in = Transition::None;

        if let (
            ClipMedia::Video {
                trim_start, speed, ..
            },
            ClipMedia::Video { trim_end, .. },
            ClipMedia::Video {
                trim_start: right_in,
                ..
            },
        ) = (&clip.media, &mut left.media, &mut right.media)
        {
            let split_source = *trim_start + offset.scale(*speed);
            *trim_end = split_source;
            *right_in = split_source;
        }

        self.clips[pos] = left;
        self.clips.insert(pos + 1, right);
        self.repack();
        Some(right_id)
    }

    pub fn clear_clips(&mut self) {
        self.clips.clear();
    }

    /// Lay clips end to end from zero in their current order.
    pub(crate) fn repack(&mut self) {
        let mut cursor = TimeUs::ZERO;
        for clip in &mut self.clips {
            clip.start = cursor;
            cursor = cursor + clip.duration;
        }
    }

    pub(crate) fn restore(&mut self, clips: Vec<Clip>) {
        self.clips = clips;
        self.repack();
    }
}

fn apply_edit(clip: &mut Clip, edit: ClipEdit) -> bool {
    let id = clip.id;
    match (edit, &mut clip.media) {
        (ClipEdit::SetDuration(d), _) => {
            clip.duration = d;
        }
        (
            ClipEdit::SetTrim { start, end },
            ClipMedia::Video {
                trim_start,
                trim_end,
                source_duration,
                speed,
            },
        ) => {
            let (start, end) = clamp_trim(start, end, *source_duration, *speed);
            *trim_start = start;
            *trim_end = end;
            clip.duration = (end - start).div_floor(*speed);
        }
        (ClipEdit::SetSpeed(new_speed), ClipMedia::Video { speed, .. }) => {
            let new_speed = clamp_speed(new_speed);
            let span = clip.duration.scale(*speed);
            *speed = new_speed;
            clip.duration = span.div_floor(new_speed);
        }
        (ClipEdit::SetKenBurns(kb), ClipMedia::Image { ken_burns }) => {
            *ken_burns = kb;
        }
        (ClipEdit::SetFilter(f), _) => clip.filter = f,
        (ClipEdit::SetTransitionIn(t), _) => clip.transition_in = t,
        (ClipEdit::SetTransitionOut(t), _) => clip.transition_out = t,
        (ClipEdit::SetThumbnail(url), _) => clip.thumbnail_url = url,
        (edit, media) => {
            tracing::debug!(%id, ?edit, kind = ?media.kind(), "edit does not apply to this clip kind");
            return false;
        }
    }
    clip.normalize();
    true
}

/// Keep the window inside the source and at least `MIN_CLIP_DURATION` of
/// timeline time long (or the whole source, if that is shorter). A window that
/// is too short grows backwards from `end` first, then forwards.
fn clamp_trim(start: TimeUs, end: TimeUs, source_duration: TimeUs, speed: f64) -> (TimeUs, TimeUs) {
    let min_span = MIN_CLIP_DURATION
        .scale(speed)
        .min(source_duration)
        .max(TimeUs(1));
    let mut end = end.clamp(TimeUs(1), source_duration.max(TimeUs(1)));
    let mut start = start.clamp(TimeUs::ZERO, end - TimeUs(1));
    if end - start < min_span {
        start = (end - min_span).max(TimeUs::ZERO);
        end = start + min_span;
    }
    (start, end)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn secs(s: f64) -> TimeUs {
        TimeUs::from_seconds(s)
    }

    fn video(duration: f64) -> ClipDraft {
        ClipDraft {
            source_asset_id: "vid".into(),
            source_url: "/media/vid.mp4".into(),
            duration: secs(duration),
            transition_in: Transition::None,
            transition_out: Transition::None,
            filter: FilterEffect::None,
            thumbnail_url: None,
            media: ClipMedia::full_video(secs(duration)),
        }
    }

    fn image(duration: f64) -> ClipDraft {
        ClipDraft {
            source_asset_id: "img".into(),
            source_url: "/media/img.png".into(),
            duration: secs(duration),
            media: ClipMedia::Image {
                ken_burns: Some(KenBurns::default()),
            },
            ..video(duration)
        }
    }

    fn timeline_of(durations: &[f64]) -> (Timeline, Vec<Uuid>) {
        let mut tl = Timeline::new();
        let ids = durations.iter().map(|d| tl.add_clip(video(*d))).collect();
        (tl, ids)
    }

    fn assert_contiguous(tl: &Timeline) {
        let mut expected = TimeUs::ZERO;
        for clip in tl.clips() {
            assert_eq!(clip.start(), expected, "gap or overlap before {}", clip.id);
            assert!(clip.duration() > TimeUs::ZERO);
            expected = expected + clip.duration();
        }
        assert_eq!(tl.total_duration(), expected);
    }

    // -----------------------------------------------------------------------
    // add_clip
    // -----------------------------------------------------------------------

    #[test]
    fn add_two_clips_places_them_end_to_end() {
        let mut tl = Timeline::new();
        let a = tl.add_clip(image(3.0));
        let b = tl.add_clip(video(5.0));

        assert_eq!(tl.get(a).unwrap().start(), TimeUs::ZERO);
        assert_eq!(tl.get(b).unwrap().start(), secs(3.0));
        assert_eq!(tl.total_duration(), secs(8.0));
    }

    #[test]
    fn add_clip_assigns_unique_ids() {
        let (_, ids) = timeline_of(&[1.0, 1.0, 1.0]);
        assert_ne!(ids[0], ids[1]);
        assert_ne!(ids[1], ids[2]);
    }

    #[test]
    fn add_never_decreases_total_duration() {
        let mut tl = Timeline::new();
        let mut last = tl.total_duration();
        for d in [2.0, 0.1, 7.5, 30.0] {
            tl.add_clip(video(d));
            assert!(tl.total_duration() >= last);
            last = tl.total_duration();
        }
    }

    // -----------------------------------------------------------------------
    // remove_clip
    // -----------------------------------------------------------------------

    #[test]
    fn remove_middle_clip_closes_gap() {
        let (mut tl, ids) = timeline_of(&[2.0, 3.0, 4.0]);
        let starts: Vec<_> = tl.clips().iter().map(|c| c.start()).collect();
        assert_eq!(starts, vec![secs(0.0), secs(2.0), secs(5.0)]);

        let removed = tl.remove_clip(ids[1]).unwrap();
        assert_eq!(removed.id, ids[1]);

        let starts: Vec<_> = tl.clips().iter().map(|c| c.start()).collect();
        let durations: Vec<_> = tl.clips().iter().map(|c| c.duration()).collect();
        assert_eq!(starts, vec![secs(0.0), secs(2.0)]);
        assert_eq!(durations, vec![secs(2.0), secs(4.0)]);
        assert_eq!(tl.total_duration(), secs(6.0));
    }

    #[test]
    fn remove_unknown_clip_is_noop() {
        let (mut tl, _) = timeline_of(&[2.0, 3.0]);
        let before = tl.clone();
        assert!(tl.remove_clip(Uuid::new_v4()).is_none());
        assert_eq!(tl, before);
    }

    #[test]
    fn remove_never_increases_total_duration() {
        let (mut tl, ids) = timeline_of(&[1.0, 2.0, 3.0, 4.0]);
        for id in ids {
            let before = tl.total_duration();
            tl.remove_clip(id);
            assert!(tl.total_duration() <= before);
            assert_contiguous(&tl);
        }
        assert_eq!(tl.total_duration(), TimeUs::ZERO);
    }

    // -----------------------------------------------------------------------
    // reorder_clips
    // -----------------------------------------------------------------------

    #[test]
    fn reorder_moves_and_repacks() {
        let (mut tl, ids) = timeline_of(&[1.0, 2.0, 3.0]);
        assert!(tl.reorder_clips(2, 0));

        let order: Vec<_> = tl.clips().iter().map(|c| c.id).collect();
        assert_eq!(order, vec![ids[2], ids[0], ids[1]]);
        assert_eq!(tl.get(ids[0]).unwrap().start(), secs(3.0));
        assert_eq!(tl.get(ids[1]).unwrap().start(), secs(4.0));
        assert_contiguous(&tl);
    }

    #[test]
    fn reorder_out_of_range_is_noop() {
        let (mut tl, _) = timeline_of(&[1.0, 2.0]);
        let before = tl.clone();
        assert!(!tl.reorder_clips(0, 5));
        assert!(!tl.reorder_clips(7, 0));
        assert_eq!(tl, before);
    }

    // -----------------------------------------------------------------------
    // split_clip
    // -----------------------------------------------------------------------

    #[test]
    fn split_video_at_four_seconds() {
        let (mut tl, ids) = timeline_of(&[10.0]);
        let right_id = tl.split_clip(ids[0], secs(4.0)).unwrap();

        assert_eq!(tl.len(), 2);
        let left = &tl.clips()[0];
        let right = &tl.clips()[1];

        assert_eq!(left.id, ids[0]);
        assert_eq!(left.duration(), secs(4.0));
        assert_eq!(left.trim_window(), Some((secs(0.0), secs(4.0))));

        assert_eq!(right.id, right_id);
        assert_eq!(right.start(), secs(4.0));
        assert_eq!(right.duration(), secs(6.0));
        assert_eq!(right.trim_window(), Some((secs(4.0), secs(10.0))));
    }

    #[test]
    fn split_conserves_duration_and_trim_window() {
        let mut draft = video(12.0);
        draft.media = ClipMedia::Video {
            trim_start: secs(1.0),
            trim_end: secs(11.0),
            source_duration: secs(12.0),
            speed: 2.0,
        };
        draft.duration = secs(5.0);
        let mut tl = Timeline::new();
        tl.add_clip(video(2.0));
        let id = tl.add_clip(draft);
        let original = tl.get(id).unwrap().clone();

        tl.split_clip(id, secs(2.0 + 1.5)).unwrap();
        let left = &tl.clips()[1];
        let right = &tl.clips()[2];

        assert_eq!(left.duration() + right.duration(), original.duration());
        let (l_in, l_out) = left.trim_window().unwrap();
        let (r_in, r_out) = right.trim_window().unwrap();
        assert_eq!(l_in, secs(1.0));
        assert_eq!(l_out, r_in);
        assert_eq!(r_out, secs(11.0));
        // 1.5s of timeline at 2x consumes 3s of source
        assert_eq!(l_out, secs(4.0));
        assert_contiguous(&tl);
    }

    #[test]
    fn split_near_boundaries_is_rejected() {
        let (mut tl, ids) = timeline_of(&[3.0, 10.0]);
        let before: Vec<_> = tl.clips().iter().map(|c| c.id).collect();

        for at in [3.0, 3.05, 3.1, 12.9, 12.95, 13.0, 20.0, 1.0] {
            assert!(tl.split_clip(ids[1], secs(at)).is_none(), "split at {at}");
        }
        assert!(tl.split_clip(Uuid::new_v4(), secs(5.0)).is_none());

        let after: Vec<_> = tl.clips().iter().map(|c| c.id).collect();
        assert_eq!(before, after);
    }

    #[test]
    fn split_image_keeps_ken_burns_on_both_halves() {
        let mut tl = Timeline::new();
        let id = tl.add_clip(image(3.0));
        let right = tl.split_clip(id, secs(1.0)).unwrap();

        assert_eq!(tl.get(id).unwrap().duration(), secs(1.0));
        assert_eq!(tl.get(right).unwrap().duration(), secs(2.0));
        assert!(tl.get(right).unwrap().ken_burns().is_some());
        assert!(tl.get(right).unwrap().trim_window().is_none());
    }

    #[test]
    fn split_drops_transitions_at_the_cut() {
        let mut draft = video(6.0);
        draft.transition_in = Transition::Fade;
        draft.transition_out = Transition::SlideLeft;
        let mut tl = Timeline::new();
        let id = tl.add_clip(draft);
        let right = tl.split_clip(id, secs(3.0)).unwrap();

        let left = tl.get(id).unwrap();
        let right = tl.get(right).unwrap();
        assert_eq!(left.transition_in, Transition::Fade);
        assert_eq!(left.transition_out, Transition::None);
        assert_eq!(right.transition_in, Transition::None);
        assert_eq!(right.transition_out, Transition::SlideLeft);
    }

    // -----------------------------------------------------------------------
    // update_clip
    // -----------------------------------------------------------------------

    #[test]
    fn duration_edit_cascades_to_later_clips() {
        let (mut tl, ids) = timeline_of(&[4.0, 3.0]);
        assert!(tl.update_clip(ids[0], ClipEdit::SetDuration(secs(2.0))));
        assert_eq!(tl.get(ids[1]).unwrap().start(), secs(2.0));
        assert_contiguous(&tl);
    }

    #[test]
    fn duration_edit_is_clamped() {
        let (mut tl, ids) = timeline_of(&[4.0]);
        tl.update_clip(ids[0], ClipEdit::SetDuration(secs(0.1)));
        assert_eq!(tl.get(ids[0]).unwrap().duration(), MIN_CLIP_DURATION);

        tl.update_clip(ids[0], ClipEdit::SetDuration(secs(100.0)));
        assert_eq!(tl.get(ids[0]).unwrap().duration(), secs(4.0));
    }

    #[test]
    fn clamping_is_idempotent() {
        let edits = [
            ClipEdit::SetDuration(secs(-5.0)),
            ClipEdit::SetTrim {
                start: secs(-2.0),
                end: secs(99.0),
            },
            ClipEdit::SetSpeed(100.0),
        ];
        for edit in edits {
            let (mut once, ids) = timeline_of(&[8.0]);
            once.update_clip(ids[0], edit.clone());
            let mut twice = once.clone();
            twice.update_clip(ids[0], edit);
            assert_eq!(once, twice);
        }
    }

    #[test]
    fn trim_edit_resets_duration_to_window() {
        let (mut tl, ids) = timeline_of(&[10.0, 1.0]);
        tl.update_clip(
            ids[0],
            ClipEdit::SetTrim {
                start: secs(2.0),
                end: secs(7.0),
            },
        );
        let clip = tl.get(ids[0]).unwrap();
        assert_eq!(clip.trim_window(), Some((secs(2.0), secs(7.0))));
        assert_eq!(clip.duration(), secs(5.0));
        assert_eq!(tl.get(ids[1]).unwrap().start(), secs(5.0));
    }

    #[test]
    fn empty_trim_window_grows_to_minimum_duration() {
        let (mut tl, ids) = timeline_of(&[10.0, 1.0]);
        tl.update_clip(
            ids[0],
            ClipEdit::SetTrim {
                start: secs(5.0),
                end: secs(5.0),
            },
        );
        let clip = tl.get(ids[0]).unwrap();
        assert_eq!(clip.trim_window(), Some((secs(4.5), secs(5.0))));
        assert_eq!(clip.duration(), MIN_CLIP_DURATION);
        assert_contiguous(&tl);
    }

    #[test]
    fn short_trim_at_source_start_extends_forwards() {
        let (mut tl, ids) = timeline_of(&[10.0]);
        tl.update_clip(
            ids[0],
            ClipEdit::SetTrim {
                start: secs(0.0),
                end: secs(0.1),
            },
        );
        let clip = tl.get(ids[0]).unwrap();
        assert_eq!(clip.trim_window(), Some((TimeUs::ZERO, secs(0.5))));
        assert_eq!(clip.duration(), MIN_CLIP_DURATION);
    }

    #[test]
    fn trim_floor_accounts_for_speed() {
        let (mut tl, ids) = timeline_of(&[10.0]);
        tl.update_clip(ids[0], ClipEdit::SetSpeed(2.0));
        tl.update_clip(
            ids[0],
            ClipEdit::SetTrim {
                start: secs(6.0),
                end: secs(6.2),
            },
        );
        let clip = tl.get(ids[0]).unwrap();
        assert_eq!(clip.trim_window(), Some((secs(5.2), secs(6.2))));
        assert_eq!(clip.duration(), MIN_CLIP_DURATION);
    }

    #[test]
    fn speed_edit_preserves_source_span() {
        let (mut tl, ids) = timeline_of(&[8.0]);
        tl.update_clip(ids[0], ClipEdit::SetSpeed(2.0));
        let clip = tl.get(ids[0]).unwrap();
        assert_eq!(clip.speed(), 2.0);
        assert_eq!(clip.duration(), secs(4.0));
        assert_eq!(clip.source_span(), secs(8.0));

        tl.update_clip(ids[0], ClipEdit::SetSpeed(0.01));
        assert_eq!(tl.get(ids[0]).unwrap().speed(), MIN_SPEED);
    }

    #[test]
    fn kind_mismatched_edits_are_rejected() {
        let mut tl = Timeline::new();
        let img = tl.add_clip(image(3.0));
        let vid = tl.add_clip(video(3.0));
        let before = tl.clone();

        assert!(!tl.update_clip(img, ClipEdit::SetSpeed(2.0)));
        assert!(!tl.update_clip(
            img,
            ClipEdit::SetTrim {
                start: secs(0.0),
                end: secs(1.0)
            }
        ));
        assert!(!tl.update_clip(vid, ClipEdit::SetKenBurns(None)));
        assert!(!tl.update_clip(Uuid::new_v4(), ClipEdit::SetFilter(FilterEffect::Sepia)));
        assert_eq!(tl, before);
    }

    #[test]
    fn cosmetic_edits_apply_to_both_kinds() {
        let mut tl = Timeline::new();
        let img = tl.add_clip(image(3.0));
        assert!(tl.update_clip(img, ClipEdit::SetFilter(FilterEffect::Vintage)));
        assert!(tl.update_clip(img, ClipEdit::SetTransitionOut(Transition::Crossfade)));
        assert!(tl.update_clip(img, ClipEdit::SetThumbnail(Some("data:x".into()))));

        let clip = tl.get(img).unwrap();
        assert_eq!(clip.filter, FilterEffect::Vintage);
        assert_eq!(clip.transition_out, Transition::Crossfade);
        assert_eq!(clip.thumbnail_url.as_deref(), Some("data:x"));
    }

    // -----------------------------------------------------------------------
    // lookups
    // -----------------------------------------------------------------------

    #[test]
    fn clip_at_uses_half_open_intervals() {
        let (tl, ids) = timeline_of(&[2.0, 3.0]);
        assert_eq!(tl.clip_at(secs(0.0)).unwrap().id, ids[0]);
        assert_eq!(tl.clip_at(secs(2.0)).unwrap().id, ids[1]);
        assert!(tl.clip_at(secs(5.0)).is_none());
    }

    #[test]
    fn neighbours() {
        let (tl, ids) = timeline_of(&[1.0, 1.0]);
        assert!(!tl.has_neighbour_before(ids[0]));
        assert!(tl.has_neighbour_after(ids[0]));
        assert!(tl.has_neighbour_before(ids[1]));
        assert!(!tl.has_neighbour_after(ids[1]));
    }

    // -----------------------------------------------------------------------
    // multiple operations in sequence
    // -----------------------------------------------------------------------

    #[test]
    fn contiguity_holds_across_mixed_operations() {
        let (mut tl, ids) = timeline_of(&[5.0, 2.0, 7.0]);
        assert_contiguous(&tl);

        let right = tl.split_clip(ids[0], secs(2.5)).unwrap();
        assert_contiguous(&tl);

        tl.reorder_clips(3, 0);
        assert_contiguous(&tl);

        tl.remove_clip(right);
        assert_contiguous(&tl);

        tl.add_clip(image(3.0));
        assert_contiguous(&tl);

        tl.update_clip(ids[2], ClipEdit::SetSpeed(4.0));
        assert_contiguous(&tl);

        tl.split_clip(ids[1], tl.get(ids[1]).unwrap().start() + secs(1.0));
        assert_contiguous(&tl);
        assert_eq!(tl.len(), 5);
    }
}
