//! Data models for TMX Notes

mod document;
mod note;
mod user;

pub use document::{RichDocument, RichMark, RichNode};
pub use note::{Note, NoteId, NoteUserInfo};
pub use user::{AllowedUser, UserRole};
