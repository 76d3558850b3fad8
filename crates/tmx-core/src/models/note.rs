//! Note model

use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::auth::AuthUser;
use crate::error::{Error, Result};
use crate::models::RichDocument;
use crate::store::DocumentSnapshot;

/// Document key of a note in the `notes` collection.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NoteId(String);

impl NoteId {
    /// Create a new unique note ID (UUID v7, time-sortable)
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7().simple().to_string())
    }

    /// Get the string representation of this ID
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for NoteId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for NoteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for NoteId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(Error::InvalidInput("Note ID cannot be empty".into()));
        }
        if trimmed.contains('/') {
            return Err(Error::InvalidInput(format!(
                "Note ID must not contain '/': {trimmed}"
            )));
        }
        Ok(Self(trimmed.to_string()))
    }
}

/// Identity snapshot recorded in note audit fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NoteUserInfo {
    pub uid: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default, rename = "photoURL")]
    pub photo_url: Option<String>,
}

impl From<&AuthUser> for NoteUserInfo {
    fn from(user: &AuthUser) -> Self {
        Self {
            uid: user.uid.clone(),
            display_name: user.display_name.clone(),
            email: user.email.clone(),
            photo_url: user.photo_url.clone(),
        }
    }
}

/// A note as seen by the presentation layer.
///
/// `title` and `plain_text_preview` are derived from `content` on every
/// content write and are never edited directly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Note {
    pub id: NoteId,
    #[serde(default = "untitled")]
    pub title: String,
    #[serde(default)]
    pub content: RichDocument,
    #[serde(default)]
    pub plain_text_preview: String,
    /// Creation timestamp (Unix ms, backend clock)
    #[serde(default, deserialize_with = "timestamp_or_zero")]
    pub created_at: i64,
    /// Last update timestamp (Unix ms, backend clock)
    #[serde(default, deserialize_with = "timestamp_or_zero")]
    pub updated_at: i64,
    #[serde(default)]
    pub is_pinned: bool,
    /// Soft delete flag
    #[serde(default)]
    pub is_deleted: bool,
    /// Owner uid
    #[serde(default)]
    pub user_id: String,
    #[serde(default)]
    pub tags: Vec<String>,
    /// Lower-cased emails of assignees
    #[serde(default)]
    pub assigned_to: Vec<String>,
    #[serde(default)]
    pub created_by: Option<NoteUserInfo>,
    #[serde(default)]
    pub last_edited_by: Option<NoteUserInfo>,
}

fn untitled() -> String {
    crate::content::UNTITLED.to_string()
}

// Pending server timestamps arrive as null; they sort as the epoch.
fn timestamp_or_zero<'de, D>(deserializer: D) -> std::result::Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<i64>::deserialize(deserializer)?.unwrap_or(0))
}

impl Note {
    /// Decode a raw `notes` document.
    pub fn from_snapshot(snapshot: &DocumentSnapshot) -> Result<Self> {
        let mut fields = snapshot.fields.clone();
        fields.insert(
            "id".to_string(),
            serde_json::Value::String(snapshot.id.clone()),
        );
        Ok(serde_json::from_value(serde_json::Value::Object(fields))?)
    }

    /// Whether `email` is on the assignment list (case-insensitive).
    pub fn is_assigned_to(&self, email: &str) -> bool {
        let email = crate::util::normalize_email(email);
        self.assigned_to
            .iter()
            .any(|assignee| assignee.eq_ignore_ascii_case(&email))
    }
}
