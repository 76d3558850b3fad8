//! Live note lists.
//!
//! Each client keeps a live query over the `notes` collection whose filter
//! depends on who is signed in and which client is running. Every change
//! delivers the full, ordered list.

use std::cmp::Ordering;
use std::sync::Arc;

use crate::auth::AuthUser;
use crate::config::Platform;
use crate::error::Result;
use crate::models::{Note, NoteId, UserRole};
use crate::store::{
    DocumentSnapshot, DocumentStore, FieldFilter, Query, Subscription, NOTES_COLLECTION,
};
use crate::util::normalize_email;

/// Which notes a session sees.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NoteScope {
    /// Live notes owned by `uid` (desktop).
    Owner { uid: String },
    /// Every live note (mobile superadmin).
    All,
    /// Live notes assigned to `email` (other mobile users).
    AssignedTo { email: String },
}

impl NoteScope {
    pub fn for_session(platform: Platform, user: &AuthUser, role: UserRole) -> Self {
        match platform {
            Platform::Desktop => Self::Owner {
                uid: user.uid.clone(),
            },
            Platform::Mobile if role == UserRole::Superadmin => Self::All,
            Platform::Mobile => Self::AssignedTo {
                email: user.email.as_deref().map(normalize_email).unwrap_or_default(),
            },
        }
    }

    pub fn query(&self) -> Query {
        let query =
            Query::collection(NOTES_COLLECTION).filter(FieldFilter::equal("isDeleted", false));
        match self {
            Self::Owner { uid } => query.filter(FieldFilter::equal("userId", uid.as_str())),
            Self::All => query,
            Self::AssignedTo { email } => {
                query.filter(FieldFilter::array_contains("assignedTo", email.as_str()))
            }
        }
    }

    /// Whether `note` would be part of this scope's result set.
    pub fn contains(&self, note: &Note) -> bool {
        if note.is_deleted {
            return false;
        }
        match self {
            Self::Owner { uid } => note.user_id == *uid,
            Self::All => true,
            Self::AssignedTo { email } => !email.is_empty() && note.is_assigned_to(email),
        }
    }
}

/// Pinned notes first, then most recently updated. Stable.
pub fn sort_notes(notes: &mut [Note]) {
    notes.sort_by(compare_notes);
}

fn compare_notes(a: &Note, b: &Note) -> Ordering {
    b.is_pinned
        .cmp(&a.is_pinned)
        .then_with(|| b.updated_at.cmp(&a.updated_at))
}

/// Decode and order a result set, skipping documents that fail to decode.
pub fn notes_from_snapshots(snapshots: &[DocumentSnapshot]) -> Vec<Note> {
    let mut notes: Vec<Note> = snapshots.iter().filter_map(decode_note).collect();
    sort_notes(&mut notes);
    notes
}

fn decode_note(snapshot: &DocumentSnapshot) -> Option<Note> {
    match Note::from_snapshot(snapshot) {
        Ok(note) => Some(note),
        Err(error) => {
            tracing::warn!("Skipping malformed note {}: {}", snapshot.id, error);
            None
        }
    }
}

/// Case-insensitive substring search over title and preview.
pub fn filter_notes(notes: &[Note], query: &str) -> Vec<Note> {
    let query = query.trim().to_lowercase();
    if query.is_empty() {
        return notes.to_vec();
    }

    notes
        .iter()
        .filter(|note| {
            note.title.to_lowercase().contains(&query)
                || note.plain_text_preview.to_lowercase().contains(&query)
        })
        .cloned()
        .collect()
}

#[derive(Clone)]
pub struct NoteFeed {
    store: Arc<dyn DocumentStore>,
}

impl NoteFeed {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    /// One-shot read of the notes in `scope`, ordered.
    pub async fn list_notes(&self, scope: &NoteScope) -> Result<Vec<Note>> {
        let snapshots = self.store.run_query(&scope.query()).await?;
        Ok(notes_from_snapshots(&snapshots))
    }

    /// Live ordered list for `scope`. Drop the handle to stop listening.
    pub fn subscribe(&self, scope: &NoteScope) -> Subscription<Vec<Note>> {
        tracing::debug!("Subscribing to notes: {:?}", scope);
        self.store
            .listen_query(scope.query())
            .map(|snapshots| notes_from_snapshots(&snapshots))
    }

    /// Live single note; `None` while it does not exist or fails to decode.
    pub fn subscribe_note(&self, id: &NoteId) -> Subscription<Option<Note>> {
        self.store
            .listen_document(NOTES_COLLECTION, id.as_str())
            .map(|snapshot| snapshot.as_ref().and_then(decode_note))
    }

    pub async fn get_note(&self, id: &NoteId) -> Result<Option<Note>> {
        let snapshot = self.store.get(NOTES_COLLECTION, id.as_str()).await?;
        Ok(snapshot.as_ref().and_then(decode_note))
    }
}
