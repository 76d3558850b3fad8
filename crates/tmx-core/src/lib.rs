//! tmx-core - Core library for TMX Notes
//!
//! This crate contains the shared models, authorization rules, document store
//! access, and live sync/editing logic used by every TMX Notes client
//! (desktop, mobile, CLI).

pub mod access;
pub mod auth;
pub mod config;
pub mod content;
pub mod debounce;
pub mod editor;
pub mod error;
pub mod models;
pub mod notes;
pub mod session;
pub mod shell;
pub mod store;
pub mod sync;
pub mod util;

pub use error::{Error, Result};
pub use models::{AllowedUser, Note, NoteId, UserRole};
