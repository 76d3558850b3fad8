use std::env;
use std::io;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use chrono::{TimeZone, Utc};
use serde::Serialize;
use tmx_core::access::{AccessResolver, Actor, UserDirectory};
use tmx_core::auth::{AuthSession, AuthUser};
use tmx_core::config::{AppConfig, Platform};
use tmx_core::notes::NoteService;
use tmx_core::session::SessionState;
use tmx_core::store::{DocumentStore, FirestoreStore};
use tmx_core::sync::{NoteFeed, NoteScope};
use tmx_core::{Note, NoteId};

use crate::auth::auth_service;
use crate::error::CliError;

const SHORT_ID_CHARS: usize = 13;

/// An authorized actor bound to a document store.
pub struct Context {
    pub store: Arc<dyn DocumentStore>,
    pub actor: Actor,
    pub platform: Platform,
    pub superadmin_email: String,
}

impl Context {
    pub fn feed(&self) -> NoteFeed {
        NoteFeed::new(Arc::clone(&self.store))
    }

    pub fn notes(&self) -> NoteService {
        NoteService::new(Arc::clone(&self.store), self.actor.clone())
    }

    pub fn users(&self) -> UserDirectory {
        UserDirectory::new(Arc::clone(&self.store), &self.superadmin_email)
    }

    pub fn scope(&self) -> NoteScope {
        NoteScope::for_session(self.platform, &self.actor.user, self.actor.role)
    }
}

/// Restore the stored session and check it against the allowlist.
pub async fn connect() -> Result<Context, CliError> {
    let config = AppConfig::from_env()?;
    let session = auth_service(&config.firebase)?
        .restore_session()
        .await?
        .ok_or(CliError::NotSignedIn)?;
    let store = firestore_for_session(&config, &session)?;
    authorize(store, session.user, &config.superadmin_email, config.platform).await
}

pub fn firestore_for_session(
    config: &AppConfig,
    session: &AuthSession,
) -> Result<Arc<dyn DocumentStore>, CliError> {
    let store = FirestoreStore::new(&config.firebase.project_id, config.firebase.api_key.clone())?
        .with_poll_interval(config.poll_interval);
    store.set_id_token(Some(session.id_token.clone()));
    Ok(Arc::new(store))
}

pub async fn authorize(
    store: Arc<dyn DocumentStore>,
    user: AuthUser,
    superadmin_email: &str,
    platform: Platform,
) -> Result<Context, CliError> {
    let resolver = AccessResolver::new(Arc::clone(&store), superadmin_email);
    let mut state = SessionState::new();
    state
        .on_auth_state_changed(Some(user.clone()), &resolver)
        .await;

    let actor = state
        .actor()
        .ok_or_else(|| CliError::Unauthorized(user.email.unwrap_or(user.uid)))?;
    tracing::debug!("Authorized {} as {}", actor.email(), actor.role);

    Ok(Context {
        store,
        actor,
        platform,
        superadmin_email: superadmin_email.to_string(),
    })
}

/// Find a visible note by full ID or unique ID prefix.
pub async fn resolve_note(ctx: &Context, note_query: &str) -> Result<Note, CliError> {
    let note_query = normalize_note_identifier(note_query)?;
    let feed = ctx.feed();
    let scope = ctx.scope();

    if let Ok(note_id) = note_query.parse::<NoteId>() {
        if let Some(note) = feed.get_note(&note_id).await? {
            if scope.contains(&note) {
                return Ok(note);
            }
        }
    }

    let notes = feed.list_notes(&scope).await?;
    let mut matching = notes
        .into_iter()
        .filter(|note| note.id.as_str().starts_with(&note_query))
        .collect::<Vec<_>>();

    match matching.len() {
        0 => Err(CliError::NoteNotFound(note_query)),
        1 => Ok(matching.remove(0)),
        _ => {
            let options = matching
                .iter()
                .take(3)
                .map(|note| short_id(&note.id))
                .collect::<Vec<_>>()
                .join(", ");

            Err(CliError::AmbiguousNoteId(format!(
                "ID prefix '{note_query}' is ambiguous; matches: {options}"
            )))
        }
    }
}

pub fn normalize_note_identifier(id: &str) -> Result<String, CliError> {
    let trimmed = id.trim();
    if trimmed.is_empty() {
        Err(CliError::EmptyNoteId)
    } else {
        Ok(trimmed.to_string())
    }
}

#[derive(Debug, Serialize)]
pub struct NoteListItem {
    pub id: String,
    pub title: String,
    pub preview: String,
    pub pinned: bool,
    pub assigned_to: Vec<String>,
    pub created_at: i64,
    pub updated_at: i64,
    pub relative_time: String,
}

pub fn note_to_list_item(note: &Note) -> NoteListItem {
    let now_ms = Utc::now().timestamp_millis();
    NoteListItem {
        id: note.id.to_string(),
        title: note.title.clone(),
        preview: note.plain_text_preview.clone(),
        pinned: note.is_pinned,
        assigned_to: note.assigned_to.clone(),
        created_at: note.created_at,
        updated_at: note.updated_at,
        relative_time: format_relative_time(note.updated_at, now_ms),
    }
}

pub fn format_note_lines(notes: &[Note], now_ms: i64) -> Vec<String> {
    notes
        .iter()
        .map(|note| {
            let short_id = short_id(&note.id);
            let marker = if note.is_pinned { '*' } else { ' ' };
            let title = truncate(&note.title, 40);
            let relative_time = format_relative_time(note.updated_at, now_ms);
            format!("{short_id:<13} {marker} {title:<40}  {relative_time}")
        })
        .collect()
}

pub fn short_id(id: &NoteId) -> String {
    id.as_str().chars().take(SHORT_ID_CHARS).collect()
}

pub fn truncate(text: &str, max_chars: usize) -> String {
    let flattened = text.replace('\n', " ");
    if flattened.chars().count() <= max_chars {
        return flattened;
    }
    let mut truncated = flattened
        .chars()
        .take(max_chars.saturating_sub(3))
        .collect::<String>();
    truncated.push_str("...");
    truncated
}

pub fn format_relative_time(timestamp_ms: i64, now_ms: i64) -> String {
    if timestamp_ms <= 0 {
        return "pending".to_string();
    }

    let diff = now_ms.saturating_sub(timestamp_ms);
    let minute = 60_000;
    let hour = 60 * minute;
    let day = 24 * hour;
    let week = 7 * day;
    let month = 30 * day;
    let year = 365 * day;

    if diff < minute {
        "just now".to_string()
    } else if diff < hour {
        format!("{}m ago", diff / minute)
    } else if diff < day {
        format!("{}h ago", diff / hour)
    } else if diff < week {
        format!("{}d ago", diff / day)
    } else if diff < month {
        format!("{}w ago", diff / week)
    } else if diff < year {
        format!("{}mo ago", diff / month)
    } else {
        format!("{}y ago", diff / year)
    }
}

/// Unix seconds as a UTC label.
pub fn format_timestamp(timestamp_secs: i64) -> String {
    Utc.timestamp_opt(timestamp_secs, 0).single().map_or_else(
        || timestamp_secs.to_string(),
        |time| time.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
    )
}

pub fn normalize_content(content: &str) -> Option<String> {
    let trimmed = content.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

pub fn capture_editor_input_with_initial(
    initial_content: &str,
) -> Result<Option<String>, CliError> {
    let editor = preferred_editor();
    let temp_file = create_temp_note_file_path();
    std::fs::write(&temp_file, initial_content)?;

    let launch_result = launch_editor(&editor, &temp_file);
    let note_content = std::fs::read_to_string(&temp_file)?;
    let _ = std::fs::remove_file(&temp_file);

    launch_result?;
    Ok(normalize_content(&note_content))
}

pub fn launch_editor(editor: &str, file_path: &Path) -> Result<(), CliError> {
    match Command::new(editor).arg(file_path).status() {
        Ok(status) if status.success() => Ok(()),
        Ok(status) => Err(CliError::EditorFailed(format!(
            "`{editor}` exited with status {status}"
        ))),
        // EDITOR may carry arguments, e.g. `code --wait`
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            let mut parts = editor.split_whitespace();
            let Some(program) = parts.next() else {
                return Err(CliError::EditorFailed("empty EDITOR command".into()));
            };

            let status = Command::new(program).args(parts).arg(file_path).status()?;
            if status.success() {
                Ok(())
            } else {
                Err(CliError::EditorFailed(format!(
                    "`{editor}` exited with status {status}"
                )))
            }
        }
        Err(err) => Err(CliError::Io(err)),
    }
}

pub fn preferred_editor() -> String {
    env::var("VISUAL")
        .or_else(|_| env::var("EDITOR"))
        .unwrap_or_else(|_| default_editor().to_string())
}

pub const fn default_editor() -> &'static str {
    if cfg!(windows) {
        "notepad"
    } else {
        "vi"
    }
}

pub fn create_temp_note_file_path() -> PathBuf {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |duration| duration.as_nanos());
    env::temp_dir().join(format!("tmx-note-{}-{now}.txt", std::process::id()))
}
