//! Per-client session and selection state.

use crate::access::{AccessResolver, Actor};
use crate::auth::AuthUser;
use crate::models::{Note, NoteId, UserRole};
use crate::sync::filter_notes;

/// Who is signed in and what the allowlist says about them.
///
/// `authorized` is `None` until a signed-in user has been checked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionState {
    pub user: Option<AuthUser>,
    pub loading: bool,
    pub role: Option<UserRole>,
    pub authorized: Option<bool>,
}

impl Default for SessionState {
    fn default() -> Self {
        Self {
            user: None,
            loading: true,
            role: None,
            authorized: None,
        }
    }
}

impl SessionState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply a sign-in, sign-out or identity refresh.
    pub async fn on_auth_state_changed(&mut self, user: Option<AuthUser>, resolver: &AccessResolver) {
        let email = user.as_ref().and_then(|user| user.email.clone());
        self.user = user;

        match email {
            Some(email) => match resolver.check_user_allowed(&email).await {
                Ok(authorization) => {
                    self.authorized = Some(authorization.allowed);
                    self.role = Some(authorization.role);
                }
                Err(error) => {
                    tracing::error!("Failed to check access for {}: {}", email, error);
                    self.authorized = Some(false);
                    self.role = None;
                }
            },
            None => {
                self.authorized = None;
                self.role = None;
            }
        }

        self.loading = false;
    }

    pub fn is_authorized(&self) -> bool {
        self.authorized == Some(true)
    }

    /// The signed-in, authorized actor.
    pub fn actor(&self) -> Option<Actor> {
        if !self.is_authorized() {
            return None;
        }
        match (&self.user, self.role) {
            (Some(user), Some(role)) => Some(Actor::new(user.clone(), role)),
            _ => None,
        }
    }
}

/// Which note is open and what the list is filtered by.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NoteSelection {
    pub selected_note_id: Option<NoteId>,
    pub search_query: String,
}

impl NoteSelection {
    pub fn select(&mut self, id: Option<NoteId>) {
        self.selected_note_id = id;
    }

    pub fn set_search_query(&mut self, query: impl Into<String>) {
        self.search_query = query.into();
    }

    /// Clear the selection if it points at `id`.
    pub fn on_note_deleted(&mut self, id: &NoteId) {
        if self.selected_note_id.as_ref() == Some(id) {
            self.selected_note_id = None;
        }
    }

    /// Clear the selection when the selected note left the live list.
    pub fn retain_existing(&mut self, notes: &[Note]) {
        if let Some(id) = &self.selected_note_id {
            if !notes.iter().any(|note| &note.id == id) {
                self.selected_note_id = None;
            }
        }
    }

    pub fn selected_note<'a>(&self, notes: &'a [Note]) -> Option<&'a Note> {
        let id = self.selected_note_id.as_ref()?;
        notes.iter().find(|note| &note.id == id)
    }

    pub fn visible_notes(&self, notes: &[Note]) -> Vec<Note> {
        filter_notes(notes, &self.search_query)
    }
}
