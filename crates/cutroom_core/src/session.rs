use crate::editing::ClipEdit;
use crate::error::Result;
use crate::history::History;
use crate::playback::{Clocked, PlaybackClock};
use crate::types::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Everything a UI event handler can ask the editor to do.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum EditorAction {
    AddClip { draft: ClipDraft },
    RemoveClip { id: Uuid },
    UpdateClip { id: Uuid, edit: ClipEdit },
    ReorderClips { from: usize, to: usize },
    SplitClip { id: Uuid, at: TimeUs },
    /// Split the selected clip, or the clip under the cursor, at the cursor.
    SplitAtPlayhead,
    ClearClips,
    Select { id: Option<Uuid> },
    Seek { to: TimeUs },
    Play,
    Pause,
    TogglePlayback,
    SkipToStart,
    SkipToEnd,
    ZoomIn,
    ZoomOut,
    SetZoom { zoom: f64 },
    Undo,
    Redo,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionResult {
    Unchanged,
    Changed,
    Created(Uuid),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ExportState {
    pub exporting: bool,
    pub progress: u8,
}

/// One editing session: created when the editor opens, dropped when it closes.
#[derive(Debug, Clone, Default)]
pub struct EditorSession {
    timeline: Timeline,
    clock: PlaybackClock,
    selected: Option<Uuid>,
    export: ExportState,
    history: History,
}

impl EditorSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn timeline(&self) -> &Timeline {
        &self.timeline
    }

    pub fn clock(&self) -> &PlaybackClock {
        &self.clock
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    pub fn selected(&self) -> Option<Uuid> {
        self.selected
    }

    pub fn selected_clip(&self) -> Option<&Clip> {
        self.selected.and_then(|id| self.timeline.get(id))
    }

    pub fn total_duration(&self) -> TimeUs {
        self.timeline.total_duration()
    }

    /// Clip under the playback cursor, if any.
    pub fn active_clip(&self) -> Option<&Clip> {
        self.timeline.clip_at(self.clock.current_time())
    }

    pub fn export_state(&self) -> ExportState {
        self.export
    }

    pub fn apply(&mut self, action: EditorAction) -> ActionResult {
        match action {
            EditorAction::AddClip { draft } => ActionResult::Created(self.add_clip(draft)),
            EditorAction::RemoveClip { id } => changed(self.remove_clip(id).is_some()),
            EditorAction::UpdateClip { id, edit } => changed(self.update_clip(id, edit)),
            EditorAction::ReorderClips { from, to } => changed(self.reorder_clips(from, to)),
            EditorAction::SplitClip { id, at } => match self.split_clip(id, at) {
                Some(right) => ActionResult::Created(right),
                None => ActionResult::Unchanged,
            },
            EditorAction::SplitAtPlayhead => match self.split_at_playhead() {
                Some(right) => ActionResult::Created(right),
                None => ActionResult::Unchanged,
            },
            EditorAction::ClearClips => {
                self.clear_clips();
                ActionResult::Changed
            }
            EditorAction::Select { id } => {
                self.select(id);
                ActionResult::Changed
            }
            EditorAction::Seek { to } => {
                self.clock.seek(to, self.timeline.total_duration());
                ActionResult::Changed
            }
            EditorAction::Play => {
                self.clock.play();
                ActionResult::Changed
            }
            EditorAction::Pause => {
                self.clock.pause();
                ActionResult::Changed
            }
            EditorAction::TogglePlayback => {
                self.clock.toggle();
                ActionResult::Changed
            }
            EditorAction::SkipToStart => {
                self.clock.skip_to_start();
                ActionResult::Changed
            }
            EditorAction::SkipToEnd => {
                self.clock.skip_to_end(self.timeline.total_duration());
                ActionResult::Changed
            }
            EditorAction::ZoomIn => {
                self.clock.zoom_in();
                ActionResult::Changed
            }
            EditorAction::ZoomOut => {
                self.clock.zoom_out();
                ActionResult::Changed
            }
            EditorAction::SetZoom { zoom } => {
                self.clock.set_zoom(zoom);
                ActionResult::Changed
            }
            EditorAction::Undo => changed(self.undo().is_ok()),
            EditorAction::Redo => changed(self.redo().is_ok()),
        }
    }

    pub fn add_clip(&mut self, draft: ClipDraft) -> Uuid {
        self.history.record(&self.timeline, "Add clip");
        self.timeline.add_clip(draft)
    }

    pub fn remove_clip(&mut self, id: Uuid) -> Option<Clip> {
        self.history.record(&self.timeline, "Remove clip");
        let removed = self.timeline.remove_clip(id);
        if removed.is_none() {
            self.history.discard_last();
        }
        if self.selected == Some(id) {
            self.selected = None;
        }
        self.clamp_cursor();
        removed
    }

    pub fn update_clip(&mut self, id: Uuid, edit: ClipEdit) -> bool {
        self.history.record(&self.timeline, "Edit clip");
        let applied = self.timeline.update_clip(id, edit);
        if !applied {
            self.history.discard_last();
        }
        self.clamp_cursor();
        applied
    }

    pub fn reorder_clips(&mut self, from: usize, to: usize) -> bool {
        self.history.record(&self.timeline, "Reorder clips");
        let moved = self.timeline.reorder_clips(from, to);
        if !moved {
            self.history.discard_last();
        }
        moved
    }

    pub fn split_clip(&mut self, id: Uuid, at: TimeUs) -> Option<Uuid> {
        self.history.record(&self.timeline, "Split clip");
        let right = self.timeline.split_clip(id, at);
        if right.is_none() {
            self.history.discard_last();
        }
        right
    }

    pub fn split_at_playhead(&mut self) -> Option<Uuid> {
        let at = self.clock.current_time();
        let target = self
            .selected_clip()
            .filter(|c| c.contains(at))
            .or_else(|| self.active_clip())
            .map(|c| c.id)?;
        self.split_clip(target, at)
    }

    /// Empty the timeline, drop the selection and stop playback at zero.
    pub fn clear_clips(&mut self) {
        self.history.record(&self.timeline, "Clear timeline");
        self.timeline.clear_clips();
        self.selected = None;
        self.clock.reset();
    }

    /// Unknown ids clear the selection.
    pub fn select(&mut self, id: Option<Uuid>) {
        self.selected = id.filter(|id| self.timeline.get(*id).is_some());
    }

    pub fn clock_mut(&mut self) -> &mut PlaybackClock {
        &mut self.clock
    }

    pub fn undo(&mut self) -> Result<&'static str> {
        let description = self.history.undo(&mut self.timeline)?;
        self.after_history_jump();
        Ok(description)
    }

    pub fn redo(&mut self) -> Result<&'static str> {
        let description = self.history.redo(&mut self.timeline)?;
        self.after_history_jump();
        Ok(description)
    }

    pub fn begin_export(&mut self) {
        self.clock.pause();
        self.export = ExportState {
            exporting: true,
            progress: 0,
        };
    }

    pub fn set_export_progress(&mut self, progress: u8) {
        self.export.progress = progress.min(100);
    }

    /// Reset after success or failure; the caller reports the outcome.
    pub fn finish_export(&mut self) {
        self.export = ExportState::default();
    }

    fn after_history_jump(&mut self) {
        if let Some(id) = self.selected {
            if self.timeline.get(id).is_none() {
                self.selected = None;
            }
        }
        self.clamp_cursor();
    }

    fn clamp_cursor(&mut self) {
        let total = self.timeline.total_duration();
        let now = self.clock.current_time();
        self.clock.seek(now, total);
    }
}

impl Clocked for EditorSession {
    fn clock_mut(&mut self) -> &mut PlaybackClock {
        &mut self.clock
    }

    fn total_duration(&self) -> TimeUs {
        self.timeline.total_duration()
    }
}

fn changed(flag: bool) -> ActionResult {
    if flag {
        ActionResult::Changed
    } else {
        ActionResult::Unchanged
    }
}
