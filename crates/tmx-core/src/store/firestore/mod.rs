//! Cloud Firestore backend over the REST v1 API.
//!
//! Writes go through `documents:commit` so server timestamps and existence
//! preconditions are applied atomically. The REST surface has no push
//! channel, so live queries poll `runQuery` and only emit when the result set
//! differs from the previous one.

mod value;

use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::time::MissedTickBehavior;

use super::{DocumentSnapshot, DocumentStore, Query, SetMode, Subscription, Write};
use crate::error::{Error, Result};
use crate::util::{compact_text, is_http_url};

/// Production REST endpoint.
pub const DEFAULT_FIRESTORE_URL: &str = "https://firestore.googleapis.com/v1";

const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(2);

/// [`DocumentStore`] backed by a Firestore database. Clones share the
/// HTTP client and the signed-in user's ID token.
#[derive(Clone)]
pub struct FirestoreStore {
    base_url: String,
    database: String,
    api_key: String,
    client: Client,
    id_token: Arc<RwLock<Option<String>>>,
    poll_interval: Duration,
}

impl std::fmt::Debug for FirestoreStore {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("FirestoreStore")
            .field("base_url", &self.base_url)
            .field("database", &self.database)
            .field("api_key", &"[REDACTED]")
            .field("poll_interval", &self.poll_interval)
            .finish_non_exhaustive()
    }
}

impl FirestoreStore {
    pub fn new(project_id: &str, api_key: impl Into<String>) -> Result<Self> {
        let project_id = project_id.trim();
        if project_id.is_empty() || project_id.contains('/') {
            return Err(Error::InvalidInput(
                "Firestore project id must be a non-empty path segment".to_string(),
            ));
        }

        Ok(Self {
            base_url: DEFAULT_FIRESTORE_URL.to_string(),
            database: format!("projects/{project_id}/databases/(default)/documents"),
            api_key: api_key.into().trim().to_string(),
            client: Client::builder().build()?,
            id_token: Arc::new(RwLock::new(None)),
            poll_interval: DEFAULT_POLL_INTERVAL,
        })
    }

    /// Point at another REST endpoint (e.g. the local emulator).
    pub fn with_base_url(mut self, base_url: &str) -> Result<Self> {
        let base_url = base_url.trim().trim_end_matches('/');
        if !is_http_url(base_url) {
            return Err(Error::InvalidInput(
                "Firestore URL must include http:// or https://".to_string(),
            ));
        }
        self.base_url = base_url.to_string();
        Ok(self)
    }

    #[must_use]
    pub const fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// Install (or clear) the Firebase ID token sent with every request.
    pub fn set_id_token(&self, id_token: Option<String>) {
        *self
            .id_token
            .write()
            .unwrap_or_else(PoisonError::into_inner) = id_token;
    }

    fn document_name(&self, collection: &str, id: &str) -> String {
        format!("{}/{collection}/{id}", self.database)
    }

    fn document_url(&self, collection: &str, id: &str) -> String {
        format!(
            "{}/{}/{collection}/{}",
            self.base_url,
            self.database,
            urlencoding::encode(id)
        )
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        let request = if self.api_key.is_empty() {
            request
        } else {
            request.query(&[("key", self.api_key.as_str())])
        };
        let token = self
            .id_token
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        match token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn commit(&self, write: Value) -> Result<()> {
        let request = self
            .client
            .post(format!("{}/{}:commit", self.base_url, self.database))
            .json(&json!({ "writes": [write] }));
        let response = self.authorize(request).send().await?;
        ensure_success(response).await?;
        Ok(())
    }
}

#[async_trait]
impl DocumentStore for FirestoreStore {
    async fn create(&self, collection: &str, id: &str, write: Write) -> Result<()> {
        let name = self.document_name(collection, id);
        self.commit(update_write(&name, &write, false, Some(false)))
            .await
    }

    async fn set(&self, collection: &str, id: &str, write: Write, mode: SetMode) -> Result<()> {
        let name = self.document_name(collection, id);
        self.commit(update_write(&name, &write, mode == SetMode::Merge, None))
            .await
    }

    async fn update(&self, collection: &str, id: &str, write: Write) -> Result<()> {
        let name = self.document_name(collection, id);
        self.commit(update_write(&name, &write, true, Some(true)))
            .await
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<()> {
        let name = self.document_name(collection, id);
        self.commit(json!({ "delete": name })).await
    }

    async fn get(&self, collection: &str, id: &str) -> Result<Option<DocumentSnapshot>> {
        let request = self.client.get(self.document_url(collection, id));
        let response = self.authorize(request).send().await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let document = ensure_success(response).await?.json::<RawDocument>().await?;
        document.into_snapshot().map(Some)
    }

    async fn run_query(&self, query: &Query) -> Result<Vec<DocumentSnapshot>> {
        let request = self
            .client
            .post(format!("{}/{}:runQuery", self.base_url, self.database))
            .json(&structured_query(query));
        let response = self.authorize(request).send().await?;
        let items = ensure_success(response)
            .await?
            .json::<Vec<RunQueryItem>>()
            .await?;

        items
            .into_iter()
            .filter_map(|item| item.document)
            .map(RawDocument::into_snapshot)
            .collect()
    }

    fn listen_query(&self, query: Query) -> Subscription<Vec<DocumentSnapshot>> {
        let store = self.clone();
        Subscription::spawn(move |mut emitter| async move {
            let mut ticker = tokio::time::interval(store.poll_interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                if !emitter.emit(store.run_query(&query).await).await {
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
        Subscription::spawn(move |mut emitter| async move {
            let mut ticker = tokio::time::interval(store.poll_interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                if !emitter.emit(store.get(&collection, &id).await).await {
                    return;
                }
            }
        })
    }
}

/// One `commit` write: field update plus server timestamp transforms.
///
/// `masked` limits the update to the named fields; `exists` adds an
/// existence precondition.
fn update_write(name: &str, write: &Write, masked: bool, exists: Option<bool>) -> Value {
    let mut body = json!({
        "update": {
            "name": name,
            "fields": value::encode_fields(&write.fields),
        }
    });

    if masked {
        body["updateMask"] = json!({ "fieldPaths": write.fields.keys().collect::<Vec<_>>() });
    }
    if !write.server_timestamps.is_empty() {
        body["updateTransforms"] = Value::Array(
            write
                .server_timestamps
                .iter()
                .map(|field| json!({ "fieldPath": field, "setToServerValue": "REQUEST_TIME" }))
                .collect(),
        );
    }
    if let Some(exists) = exists {
        body["currentDocument"] = json!({ "exists": exists });
    }
    body
}

fn structured_query(query: &Query) -> Value {
    let mut structured = json!({
        "from": [{ "collectionId": query.collection }],
        "orderBy": [{ "field": { "fieldPath": "__name__" }, "direction": "ASCENDING" }],
    });
    if let Some(clause) = value::encode_where(&query.filters) {
        structured["where"] = clause;
    }
    json!({ "structuredQuery": structured })
}

#[derive(Debug, Deserialize)]
struct RawDocument {
    name: String,
    fields: Option<Value>,
}

impl RawDocument {
    fn into_snapshot(self) -> Result<DocumentSnapshot> {
        let id = self
            .name
            .rsplit('/')
            .next()
            .filter(|id| !id.is_empty())
            .ok_or_else(|| Error::Store(format!("invalid document name '{}'", self.name)))?
            .to_string();
        Ok(DocumentSnapshot {
            id,
            fields: value::decode_fields(self.fields.as_ref())?,
        })
    }
}

#[derive(Debug, Deserialize)]
struct RunQueryItem {
    document: Option<RawDocument>,
}

#[derive(Debug, Deserialize)]
struct FirestoreErrorBody {
    error: Option<FirestoreErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct FirestoreErrorDetail {
    message: Option<String>,
    status: Option<String>,
}

async fn ensure_success(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let message = parse_api_error(status, &body);
    Err(match status {
        StatusCode::NOT_FOUND => Error::NotFound(message),
        StatusCode::CONFLICT => Error::AlreadyExists(message),
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Error::PermissionDenied(message),
        _ => Error::Store(message),
    })
}

fn parse_api_error(status: StatusCode, body: &str) -> String {
    if let Ok(payload) = serde_json::from_str::<FirestoreErrorBody>(body) {
        if let Some(detail) = payload.error {
            if let Some(message) = detail.message.or(detail.status) {
                return format!("{} ({})", message.trim(), status.as_u16());
            }
        }
    }

    let trimmed = compact_text(body);
    if trimmed.is_empty() {
        format!("HTTP {}", status.as_u16())
    } else {
        format!("{} ({})", trimmed, status.as_u16())
    }
}
