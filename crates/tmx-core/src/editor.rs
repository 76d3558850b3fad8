//! Editing one note at a time against a live backend.
//!
//! Local edits are saved through a debounced writer. While a local change
//! is in flight the next remote snapshot is assumed to be its echo and is
//! not applied, so typing is never overwritten by the round trip. This is a
//! one-cycle heuristic: a genuine remote edit arriving in that cycle is
//! skipped too, and last write wins.

use std::time::Duration;

use crate::debounce::{Debouncer, SAVE_IDLE_WINDOW};
use crate::error::{Error, Result};
use crate::models::{Note, NoteId, RichDocument};
use crate::notes::NoteService;

/// What [`EditorSession::apply_remote`] did with a snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteApply {
    /// Remote content replaced the local content.
    Applied,
    /// Skipped as the echo of a local edit.
    SkippedLocalEcho,
    /// Skipped because the user is typing.
    SkippedFocused,
    /// The snapshot is for a different note.
    Ignored,
}

struct OpenNote {
    id: NoteId,
    content: RichDocument,
    local_update: bool,
    writer: Debouncer<RichDocument>,
}

pub struct EditorSession {
    notes: NoteService,
    idle_window: Duration,
    open: Option<OpenNote>,
}

impl EditorSession {
    pub fn new(notes: NoteService) -> Self {
        Self {
            notes,
            idle_window: SAVE_IDLE_WINDOW,
            open: None,
        }
    }

    #[must_use]
    pub fn with_idle_window(mut self, idle_window: Duration) -> Self {
        self.idle_window = idle_window;
        self
    }

    pub fn note_id(&self) -> Option<&NoteId> {
        self.open.as_ref().map(|open| &open.id)
    }

    pub fn content(&self) -> Option<&RichDocument> {
        self.open.as_ref().map(|open| &open.content)
    }

    pub fn has_local_update(&self) -> bool {
        self.open.as_ref().is_some_and(|open| open.local_update)
    }

    pub fn has_pending_save(&self) -> bool {
        self.open
            .as_ref()
            .is_some_and(|open| open.writer.has_pending())
    }

    /// Switch to `note`. Re-opening the current note keeps local state.
    ///
    /// Switching starts a fresh writer and echo flag for `note`; a pending
    /// save of the previous note still lands on that note when its idle
    /// window ends.
    pub fn open(&mut self, note: &Note) {
        if self.note_id() == Some(&note.id) {
            return;
        }

        if let Some(previous) = self.open.take() {
            if previous.writer.has_pending() {
                tracing::debug!("Leaving note {} with a pending save", previous.id);
            }
        }

        self.open = Some(OpenNote {
            id: note.id.clone(),
            content: note.content.clone(),
            local_update: false,
            writer: self.writer_for(note.id.clone()),
        });
    }

    /// Record a local edit and schedule its save.
    pub fn edit(&mut self, content: RichDocument) -> Result<()> {
        let open = self
            .open
            .as_mut()
            .ok_or_else(|| Error::InvalidInput("No note is open".to_string()))?;
        open.local_update = true;
        open.content = content.clone();
        open.writer.call(content);
        Ok(())
    }

    /// Offer a remote snapshot of the open note. The echo flag is cleared
    /// whatever the outcome.
    pub fn apply_remote(&mut self, note: &Note, focused: bool) -> RemoteApply {
        let Some(open) = self.open.as_mut().filter(|open| open.id == note.id) else {
            return RemoteApply::Ignored;
        };

        let outcome = if open.local_update {
            RemoteApply::SkippedLocalEcho
        } else if focused {
            RemoteApply::SkippedFocused
        } else {
            open.content = note.content.clone();
            RemoteApply::Applied
        };
        open.local_update = false;
        outcome
    }

    /// Save any pending edit now.
    pub async fn flush(&self) -> Result<()> {
        match &self.open {
            Some(open) => open.writer.flush().await,
            None => Ok(()),
        }
    }

    /// Flush and close the open note.
    pub async fn close(&mut self) -> Result<()> {
        let result = self.flush().await;
        self.open = None;
        result
    }

    fn writer_for(&self, id: NoteId) -> Debouncer<RichDocument> {
        let notes = self.notes.clone();
        Debouncer::new(self.idle_window, move |content: RichDocument| {
            let notes = notes.clone();
            let id = id.clone();
            async move { notes.update_content(&id, &content).await }
        })
    }
}
