use crate::error::{CoreError, Result};
use crate::types::*;

/// Clip list as it was before an edit, with a label for the undo menu.
#[derive(Debug, Clone)]
struct Snapshot {
    clips: Vec<Clip>,
    description: &'static str,
}

/// Undo/redo history over timeline snapshots.
///
/// Clip lists are small (one session, tens of clips), so whole-list snapshots
/// are stored rather than inverse operations.
#[derive(Debug, Clone)]
pub struct History {
    undo_stack: Vec<Snapshot>,
    redo_stack: Vec<Snapshot>,
    max_size: usize,
}

impl Default for History {
    fn default() -> Self {
        Self::new(100)
    }
}

impl History {
    pub fn new(max_size: usize) -> Self {
        Self {
            undo_stack: Vec::new(),
            redo_stack: Vec::new(),
            max_size,
        }
    }

    /// Record the state before a change. Clears the redo stack.
    pub fn record(&mut self, before: &Timeline, description: &'static str) {
        self.redo_stack.clear();
        self.undo_stack.push(Snapshot {
            clips: before.clips.clone(),
            description,
        });
        if self.undo_stack.len() > self.max_size {
            self.undo_stack.remove(0);
        }
    }

    /// Drop the most recent record, used when the change turned out to be a no-op.
    pub(crate) fn discard_last(&mut self) {
        self.undo_stack.pop();
    }

    pub fn undo(&mut self, timeline: &mut Timeline) -> Result<&'static str> {
        let snap = self.undo_stack.pop().ok_or(CoreError::NothingToUndo)?;
        self.redo_stack.push(Snapshot {
            clips: timeline.clips.clone(),
            description: snap.description,
        });
        timeline.restore(snap.clips);
        Ok(snap.description)
    }

    pub fn redo(&mut self, timeline: &mut Timeline) -> Result<&'static str> {
        let snap = self.redo_stack.pop().ok_or(CoreError::NothingToRedo)?;
        self.undo_stack.push(Snapshot {
            clips: timeline.clips.clone(),
            description: snap.description,
        });
        timeline.restore(snap.clips);
        Ok(snap.description)
    }

    pub fn clear(&mut self) {
        self.undo_stack.clear();
        self.redo_stack.clear();
    }

    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    pub fn undo_description(&self) -> Option<&str> {
        self.undo_stack.last().map(|s| s.description)
    }

    pub fn redo_description(&self) -> Option<&str> {
        self.redo_stack.last().map(|s| s.description)
    }
}
