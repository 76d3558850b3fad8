use std::io;

use thiserror::Error;
use tmx_core::auth::AuthError;
use tmx_core::config::ConfigError;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Core(#[from] tmx_core::Error),
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
    #[error("Not signed in. Run `tmx auth login` first.")]
    NotSignedIn,
    #[error("{0} is not authorized to use TMX Notes")]
    Unauthorized(String),
    #[error("Provide --email and --password, or --google-id-token")]
    MissingCredentials,
    #[error("Note ID cannot be empty")]
    EmptyNoteId,
    #[error("Note not found for id/prefix: {0}")]
    NoteNotFound(String),
    #[error("{0}")]
    AmbiguousNoteId(String),
    #[error("Editor command failed: {0}")]
    EditorFailed(String),
}
