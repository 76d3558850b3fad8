//! Remote document store access.
//!
//! The notes backend is a managed document database. Everything above this
//! module talks to it through [`DocumentStore`], which exposes the handful of
//! operations the clients need: field-level writes with server timestamps,
//! equality/array-contains queries, and live queries that push the full
//! result set on every change.

mod firestore;
mod live;
mod memory;

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::Result;

pub use firestore::{FirestoreStore, DEFAULT_FIRESTORE_URL};
pub use live::Subscription;
pub use memory::MemoryStore;

/// Collection holding notes.
pub const NOTES_COLLECTION: &str = "notes";
/// Collection holding the allowlist, keyed by normalized email.
pub const ALLOWED_USERS_COLLECTION: &str = "allowedUsers";

/// Top-level fields of a stored document. Timestamps read as Unix ms.
pub type Fields = Map<String, Value>;

/// One document as returned by reads and live queries.
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentSnapshot {
    pub id: String,
    pub fields: Fields,
}

/// A single field predicate.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldFilter {
    Equal { field: String, value: Value },
    ArrayContains { field: String, value: Value },
}

impl FieldFilter {
    pub fn equal(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::Equal {
            field: field.into(),
            value: value.into(),
        }
    }

    pub fn array_contains(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::ArrayContains {
            field: field.into(),
            value: value.into(),
        }
    }

    pub fn matches(&self, fields: &Fields) -> bool {
        match self {
            Self::Equal { field, value } => fields.get(field) == Some(value),
            Self::ArrayContains { field, value } => fields
                .get(field)
                .and_then(Value::as_array)
                .is_some_and(|items| items.contains(value)),
        }
    }
}

/// A conjunction of filters over one collection.
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    pub collection: String,
    pub filters: Vec<FieldFilter>,
}

impl Query {
    pub fn collection(collection: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            filters: Vec::new(),
        }
    }

    #[must_use]
    pub fn filter(mut self, filter: FieldFilter) -> Self {
        self.filters.push(filter);
        self
    }

    pub fn matches(&self, fields: &Fields) -> bool {
        self.filters.iter().all(|filter| filter.matches(fields))
    }
}

/// Field values to write plus fields the backend stamps with its own clock.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Write {
    pub fields: Fields,
    pub server_timestamps: Vec<String>,
}

impl Write {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn set(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(field.into(), value.into());
        self
    }

    #[must_use]
    pub fn server_timestamp(mut self, field: impl Into<String>) -> Self {
        self.server_timestamps.push(field.into());
        self
    }

    /// Names of every field this write touches.
    pub fn field_paths(&self) -> Vec<String> {
        self.fields
            .keys()
            .cloned()
            .chain(self.server_timestamps.iter().cloned())
            .collect()
    }
}

/// How [`DocumentStore::set`] treats fields not named in the write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetMode {
    /// Replace the whole document.
    Overwrite,
    /// Keep unnamed fields, creating the document if needed.
    Merge,
}

/// Operations the clients need from the remote document database.
///
/// Each write is atomic per document; there are no multi-document
/// transactions and the last write to a field wins.
#[async_trait]
pub trait DocumentStore: Send + Sync + 'static {
    /// Create a document; fails with `AlreadyExists` if the id is taken.
    async fn create(&self, collection: &str, id: &str, write: Write) -> Result<()>;

    /// Write a document whether or not it exists.
    async fn set(&self, collection: &str, id: &str, write: Write, mode: SetMode) -> Result<()>;

    /// Update named fields of an existing document; fails with `NotFound`.
    async fn update(&self, collection: &str, id: &str, write: Write) -> Result<()>;

    /// Hard delete. Deleting a missing document is not an error.
    async fn delete(&self, collection: &str, id: &str) -> Result<()>;

    async fn get(&self, collection: &str, id: &str) -> Result<Option<DocumentSnapshot>>;

    /// Run a query once. Results are ordered by document id.
    async fn run_query(&self, query: &Query) -> Result<Vec<DocumentSnapshot>>;

    /// Live query: the current result set, then the full result set again
    /// every time it changes. An error ends the subscription.
    fn listen_query(&self, query: Query) -> Subscription<Vec<DocumentSnapshot>>;

    /// Live single-document subscription (`None` while it does not exist).
    fn listen_document(&self, collection: &str, id: &str) -> Subscription<Option<DocumentSnapshot>>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn fields(value: Value) -> Fields {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn equal_filter_compares_exact_values() {
        let filter = FieldFilter::equal("isDeleted", false);
        assert!(filter.matches(&fields(json!({ "isDeleted": false }))));
        assert!(!filter.matches(&fields(json!({ "isDeleted": true }))));
        assert!(!filter.matches(&fields(json!({}))));
    }

    #[test]
    fn array_contains_filter_requires_array_member() {
        let filter = FieldFilter::array_contains("assignedTo", "bob@example.com");
        assert!(filter.matches(&fields(json!({ "assignedTo": ["bob@example.com"] }))));
        assert!(!filter.matches(&fields(json!({ "assignedTo": [] }))));
        assert!(!filter.matches(&fields(json!({ "assignedTo": "bob@example.com" }))));
    }

    #[test]
    fn query_requires_every_filter() {
        let query = Query::collection(NOTES_COLLECTION)
            .filter(FieldFilter::equal("isDeleted", false))
            .filter(FieldFilter::equal("userId", "u1"));
        assert!(query.matches(&fields(json!({ "isDeleted": false, "userId": "u1" }))));
        assert!(!query.matches(&fields(json!({ "isDeleted": false, "userId": "u2" }))));
    }

    #[test]
    fn write_lists_all_touched_fields() {
        let write = Write::new().set("title", "x").server_timestamp("updatedAt");
        assert_eq!(write.field_paths(), vec!["title", "updatedAt"]);
    }
}
