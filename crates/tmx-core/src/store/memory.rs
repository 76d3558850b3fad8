//! In-process document store.
//!
//! Behaves like the managed backend from a client's point of view: writes
//! are atomic per document, server timestamps come from a single monotonic
//! clock, and every write wakes all live queries, which push a new result
//! set when theirs changed. Used by tests and offline demos.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::watch;

use super::{DocumentSnapshot, DocumentStore, Fields, Query, SetMode, Subscription, Write};
use crate::error::{Error, Result};
use crate::util::unix_millis_now;

/// Thread-safe in-memory [`DocumentStore`]. Clones share state.
#[derive(Clone)]
pub struct MemoryStore {
    inner: Arc<MemoryInner>,
}

struct MemoryInner {
    state: Mutex<MemoryState>,
    revision: watch::Sender<u64>,
}

#[derive(Default)]
struct MemoryState {
    collections: HashMap<String, BTreeMap<String, Fields>>,
    last_timestamp: i64,
    unavailable: bool,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        let (revision, _) = watch::channel(0);
        Self {
            inner: Arc::new(MemoryInner {
                state: Mutex::new(MemoryState::default()),
                revision,
            }),
        }
    }

    /// Simulate losing the backend: every operation and live query fails
    /// until availability is restored.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.lock().unavailable = unavailable;
        self.notify();
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        self.inner
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn notify(&self) {
        self.inner.revision.send_modify(|revision| *revision += 1);
    }

    fn write_with<F>(&self, collection: &str, id: &str, apply: F) -> Result<()>
    where
        F: FnOnce(&mut MemoryState, i64) -> Result<()>,
    {
        {
            let mut state = self.lock();
            state.ensure_available()?;
            let timestamp = state.next_timestamp();
            apply(&mut state, timestamp)?;
        }
        tracing::debug!("Wrote {}/{}", collection, id);
        self.notify();
        Ok(())
    }

    fn query_now(&self, query: &Query) -> Result<Vec<DocumentSnapshot>> {
        let state = self.lock();
        state.ensure_available()?;
        Ok(state
            .collections
            .get(&query.collection)
            .map(|documents| {
                documents
                    .iter()
                    .filter(|(_, fields)| query.matches(fields))
                    .map(|(id, fields)| DocumentSnapshot {
                        id: id.clone(),
                        fields: fields.clone(),
                    })
                    .collect()
            })
            .unwrap_or_default())
    }

    fn get_now(&self, collection: &str, id: &str) -> Result<Option<DocumentSnapshot>> {
        let state = self.lock();
        state.ensure_available()?;
        Ok(state
            .collections
            .get(collection)
            .and_then(|documents| documents.get(id))
            .map(|fields| DocumentSnapshot {
                id: id.to_string(),
                fields: fields.clone(),
            }))
    }
}

impl MemoryState {
    fn ensure_available(&self) -> Result<()> {
        if self.unavailable {
            Err(Error::Store("backend unavailable".to_string()))
        } else {
            Ok(())
        }
    }

    // Strictly increasing so back-to-back writes never share a timestamp.
    fn next_timestamp(&mut self) -> i64 {
        let timestamp = unix_millis_now().max(self.last_timestamp + 1);
        self.last_timestamp = timestamp;
        timestamp
    }

    fn documents(&mut self, collection: &str) -> &mut BTreeMap<String, Fields> {
        self.collections.entry(collection.to_string()).or_default()
    }
}

fn apply_write(target: &mut Fields, write: Write, timestamp: i64) {
    target.extend(write.fields);
    for field in write.server_timestamps {
        target.insert(field, Value::from(timestamp));
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn create(&self, collection: &str, id: &str, write: Write) -> Result<()> {
        self.write_with(collection, id, |state, timestamp| {
            let documents = state.documents(collection);
            if documents.contains_key(id) {
                return Err(Error::AlreadyExists(format!("{collection}/{id}")));
            }
            let mut fields = Fields::new();
            apply_write(&mut fields, write, timestamp);
            documents.insert(id.to_string(), fields);
            Ok(())
        })
    }

    async fn set(&self, collection: &str, id: &str, write: Write, mode: SetMode) -> Result<()> {
        self.write_with(collection, id, |state, timestamp| {
            let documents = state.documents(collection);
            let fields = documents.entry(id.to_string()).or_default();
            if mode == SetMode::Overwrite {
                fields.clear();
            }
            apply_write(fields, write, timestamp);
            Ok(())
        })
    }

    async fn update(&self, collection: &str, id: &str, write: Write) -> Result<()> {
        self.write_with(collection, id, |state, timestamp| {
            let fields = state
                .documents(collection)
                .get_mut(id)
                .ok_or_else(|| Error::NotFound(format!("{collection}/{id}")))?;
            apply_write(fields, write, timestamp);
            Ok(())
        })
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<()> {
        self.write_with(collection, id, |state, _| {
            state.documents(collection).remove(id);
            Ok(())
        })
    }

    async fn get(&self, collection: &str, id: &str) -> Result<Option<DocumentSnapshot>> {
        self.get_now(collection, id)
    }

    async fn run_query(&self, query: &Query) -> Result<Vec<DocumentSnapshot>> {
        self.query_now(query)
    }

    fn listen_query(&self, query: Query) -> Subscription<Vec<DocumentSnapshot>> {
        let store = self.clone();
        let mut changes = self.inner.revision.subscribe();
        Subscription::spawn(move |mut emitter| async move {
            loop {
                if !emitter.emit(store.query_now(&query)).await {
                    return;
                }
                if changes.changed().await.is_err() {
                    return;
                }
            }
        })
    }

    fn listen_document(
        &self,
        collection: &str,
        id: &str,
    ) -> Subscription<Option<DocumentSnapshot>> {
        let store = self.clone();
        let collection = collection.to_string();
        let id = id.to_string();
        let mut changes = self.inner.revision.subscribe();
        Subscription::spawn(move |mut emitter| async move {
            loop {
                if !emitter.emit(store.get_now(&collection, &id)).await {
                    return;
                }
                if changes.changed().await.is_err() {
                    return;
                }
            }
        })
    }
}
