//! Note writes performed by a signed-in actor.

use std::collections::HashSet;
use std::sync::Arc;

use serde_json::Value;

use crate::access::Actor;
use crate::content::{DerivedText, UNTITLED};
use crate::error::{Error, Result};
use crate::models::{NoteId, NoteUserInfo, RichDocument};
use crate::store::{DocumentStore, Write, NOTES_COLLECTION};
use crate::util::normalize_email;

/// Creates and mutates notes. Every mutation stamps `updatedAt` with the
/// backend clock and records the actor in `lastEditedBy`.
#[derive(Clone)]
pub struct NoteService {
    store: Arc<dyn DocumentStore>,
    actor: Actor,
}

impl NoteService {
    pub fn new(store: Arc<dyn DocumentStore>, actor: Actor) -> Self {
        Self { store, actor }
    }

    pub fn actor(&self) -> &Actor {
        &self.actor
    }

    /// Create an empty note owned by the actor.
    pub async fn create_note(&self) -> Result<NoteId> {
        self.require_note_manager("create notes")?;

        let id = NoteId::new();
        let editor = self.editor_info()?;
        let content = serde_json::to_value(RichDocument::blank())?;
        let write = Write::new()
            .set("title", UNTITLED)
            .set("content", content)
            .set("plainTextPreview", "")
            .set("isPinned", false)
            .set("isDeleted", false)
            .set("userId", self.actor.user.uid.as_str())
            .set("tags", Value::Array(Vec::new()))
            .set("assignedTo", Value::Array(Vec::new()))
            .set("createdBy", editor.clone())
            .set("lastEditedBy", editor)
            .server_timestamp("createdAt")
            .server_timestamp("updatedAt");

        self.store
            .create(NOTES_COLLECTION, id.as_str(), write)
            .await?;
        tracing::info!("Created note {}", id);
        Ok(id)
    }

    /// Replace the content and recompute title and preview from it.
    pub async fn update_content(&self, id: &NoteId, content: &RichDocument) -> Result<()> {
        let derived = DerivedText::from_document(content);
        let write = self
            .edit_write()?
            .set("content", serde_json::to_value(content)?)
            .set("title", derived.title)
            .set("plainTextPreview", derived.preview);

        self.store
            .update(NOTES_COLLECTION, id.as_str(), write)
            .await?;
        tracing::debug!("Saved content of note {}", id);
        Ok(())
    }

    /// Flip the pin flag, given the value the caller last saw.
    pub async fn toggle_pin(&self, id: &NoteId, currently_pinned: bool) -> Result<()> {
        let write = self.edit_write()?.set("isPinned", !currently_pinned);
        self.store
            .update(NOTES_COLLECTION, id.as_str(), write)
            .await
    }

    /// Soft delete; the note stays in storage with `isDeleted` set.
    pub async fn delete_note(&self, id: &NoteId) -> Result<()> {
        self.require_note_manager("delete notes")?;

        let write = self.edit_write()?.set("isDeleted", true);
        self.store
            .update(NOTES_COLLECTION, id.as_str(), write)
            .await?;
        tracing::info!("Deleted note {}", id);
        Ok(())
    }

    /// Replace the assignee list.
    pub async fn assign_note(&self, id: &NoteId, emails: &[String]) -> Result<Vec<String>> {
        self.require_note_manager("assign notes")?;

        let assignees = normalize_assignees(emails);
        let write = self.edit_write()?.set("assignedTo", assignees.clone());
        self.store
            .update(NOTES_COLLECTION, id.as_str(), write)
            .await?;
        tracing::info!("Assigned note {} to {} user(s)", id, assignees.len());
        Ok(assignees)
    }

    fn require_note_manager(&self, action: &str) -> Result<()> {
        if self.actor.role.can_manage_notes() {
            Ok(())
        } else {
            Err(Error::PermissionDenied(format!("Only admins can {action}")))
        }
    }

    fn editor_info(&self) -> Result<Value> {
        Ok(serde_json::to_value(NoteUserInfo::from(&self.actor.user))?)
    }

    fn edit_write(&self) -> Result<Write> {
        Ok(Write::new()
            .set("lastEditedBy", self.editor_info()?)
            .server_timestamp("updatedAt"))
    }
}

/// Trim, lower-case and de-duplicate, keeping first-seen order.
pub fn normalize_assignees(emails: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    emails
        .iter()
        .map(|email| normalize_email(email))
        .filter(|email| !email.is_empty())
        .filter(|email| seen.insert(email.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::AuthUser;
    use crate::models::{Note, UserRole};
    use crate::store::MemoryStore;
    use pretty_assertions::assert_eq;

    fn service(store: &MemoryStore, role: UserRole) -> NoteService {
        let mut user = AuthUser::new("uid-admin", Some("admin@example.com".to_string()));
        user.display_name = Some("Admin".to_string());
        NoteService::new(Arc::new(store.clone()), Actor::new(user, role))
    }

    async fn load(store: &MemoryStore, id: &NoteId) -> Note {
        let snapshot = store
            .get(NOTES_COLLECTION, id.as_str())
            .await
            .unwrap()
            .unwrap();
        Note::from_snapshot(&snapshot).unwrap()
    }

    #[tokio::test]
    async fn create_note_writes_defaults() {
        let store = MemoryStore::new();
        let service = service(&store, UserRole::Admin);

        let id = service.create_note().await.unwrap();
        let note = load(&store, &id).await;

        assert_eq!(note.title, "Untitled");
        assert_eq!(note.content, RichDocument::blank());
        assert_eq!(note.plain_text_preview, "");
        assert!(!note.is_pinned);
        assert!(!note.is_deleted);
        assert!(note.tags.is_empty());
        assert!(note.assigned_to.is_empty());
        assert_eq!(note.user_id, "uid-admin");
        assert!(note.created_at > 0);
        assert_eq!(note.created_at, note.updated_at);
        assert_eq!(note.created_by, note.last_edited_by);
        assert_eq!(
            note.created_by.unwrap().display_name.as_deref(),
            Some("Admin")
        );
    }

    #[tokio::test]
    async fn users_cannot_create_delete_or_assign() {
        let store = MemoryStore::new();
        let admin = service(&store, UserRole::Admin);
        let id = admin.create_note().await.unwrap();
        let user = service(&store, UserRole::User);

        assert!(matches!(
            user.create_note().await,
            Err(Error::PermissionDenied(_))
        ));
        assert!(matches!(
            user.delete_note(&id).await,
            Err(Error::PermissionDenied(_))
        ));
        assert!(matches!(
            user.assign_note(&id, &["a@example.com".to_string()]).await,
            Err(Error::PermissionDenied(_))
        ));
    }

    #[tokio::test]
    async fn update_content_derives_title_and_preview() {
        let store = MemoryStore::new();
        let service = service(&store, UserRole::Admin);
        let id = service.create_note().await.unwrap();
        let before = load(&store, &id).await;

        let content = RichDocument::from_plain_text("  Groceries \nmilk\neggs");
        service.update_content(&id, &content).await.unwrap();
        let note = load(&store, &id).await;

        assert_eq!(note.title, "Groceries");
        assert_eq!(note.plain_text_preview, "Groceries  milk eggs");
        assert_eq!(note.content, content);
        assert!(note.updated_at > before.updated_at);
        assert_eq!(note.created_at, before.created_at);
    }

    #[tokio::test]
    async fn plain_user_may_edit_and_pin() {
        let store = MemoryStore::new();
        let id = service(&store, UserRole::Admin).create_note().await.unwrap();
        let user = service(&store, UserRole::User);

        user.update_content(&id, &RichDocument::from_plain_text("hi"))
            .await
            .unwrap();
        user.toggle_pin(&id, false).await.unwrap();
        assert!(load(&store, &id).await.is_pinned);
        user.toggle_pin(&id, true).await.unwrap();
        assert!(!load(&store, &id).await.is_pinned);
    }

    #[tokio::test]
    async fn updates_on_missing_note_are_not_found() {
        let store = MemoryStore::new();
        let service = service(&store, UserRole::Admin);
        let missing: NoteId = "missing".parse().unwrap();

        assert!(matches!(
            service.toggle_pin(&missing, false).await,
            Err(Error::NotFound(_))
        ));
        assert!(matches!(
            service.delete_note(&missing).await,
            Err(Error::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn delete_is_soft() {
        let store = MemoryStore::new();
        let service = service(&store, UserRole::Admin);
        let id = service.create_note().await.unwrap();

        service.delete_note(&id).await.unwrap();
        assert!(load(&store, &id).await.is_deleted);
    }

    #[tokio::test]
    async fn assign_normalizes_emails() {
        let store = MemoryStore::new();
        let service = service(&store, UserRole::Admin);
        let id = service.create_note().await.unwrap();

        let assigned = service
            .assign_note(
                &id,
                &[
                    " Ann@Example.com".to_string(),
                    "ann@example.com".to_string(),
                    String::new(),
                    "BOB@example.com".to_string(),
                ],
            )
            .await
            .unwrap();

        assert_eq!(assigned, vec!["ann@example.com", "bob@example.com"]);
        assert_eq!(load(&store, &id).await.assigned_to, assigned);
    }
}
