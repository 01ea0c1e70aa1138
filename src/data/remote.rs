//! Remote Data Service seam
//!
//! The backend (accounts, sessions, document collections and the blob
//! bucket) is reached only through [`RemoteDataService`]. Documents travel
//! as JSON maps; the service layer decodes them into typed models.

use std::future::Future;
use std::time::Instant;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use url::Url;

use crate::config::PreviewConfig;
use crate::data::{Account, ImageFile, Session};
use crate::error::AppError;

/// Document collections used by the app
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Collection {
    Users,
    Posts,
    Saves,
}

impl Collection {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Users => "users",
            Self::Posts => "posts",
            Self::Saves => "saves",
        }
    }
}

/// A stored document: system fields plus user attributes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    #[serde(rename = "$id")]
    pub id: String,
    #[serde(rename = "$createdAt")]
    pub created_at: DateTime<Utc>,
    #[serde(rename = "$updatedAt")]
    pub updated_at: DateTime<Utc>,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl Document {
    /// Decode into a typed model
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, AppError> {
        let value = serde_json::to_value(self)?;
        Ok(serde_json::from_value(value)?)
    }

    /// Attribute lookup that also resolves system fields
    pub fn field(&self, name: &str) -> Option<Value> {
        match name {
            "$id" => Some(Value::String(self.id.clone())),
            "$createdAt" => Some(Value::String(self.created_at.to_rfc3339())),
            "$updatedAt" => Some(Value::String(self.updated_at.to_rfc3339())),
            _ => self.fields.get(name).cloned(),
        }
    }
}

/// One page of a document listing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentList {
    /// Matches before limit/cursor were applied
    pub total: u64,
    pub documents: Vec<Document>,
}

impl DocumentList {
    pub fn decode<T: DeserializeOwned>(&self) -> Result<Vec<T>, AppError> {
        self.documents.iter().map(Document::decode).collect()
    }
}

/// Listing constraint
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    Equal(String, Value),
    /// Full-text search on an attribute
    Search(String, String),
    OrderAsc(String),
    OrderDesc(String),
    Limit(usize),
    /// Start strictly after the document with this ID
    CursorAfter(String),
}

impl Filter {
    pub fn equal(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::Equal(field.into(), value.into())
    }

    pub fn search(field: impl Into<String>, term: impl Into<String>) -> Self {
        Self::Search(field.into(), term.into())
    }

    pub fn order_desc(field: impl Into<String>) -> Self {
        Self::OrderDesc(field.into())
    }

    pub fn order_asc(field: impl Into<String>) -> Self {
        Self::OrderAsc(field.into())
    }

    /// Wire syntax of the `queries[]` parameter
    ///
    /// e.g. `equal("accountId", ["abc"])`, `orderDesc("$updatedAt")`
    pub fn to_query_string(&self) -> String {
        fn quoted(value: &str) -> String {
            Value::String(value.to_string()).to_string()
        }

        match self {
            Self::Equal(field, value) => {
                let values = match value {
                    Value::Array(items) => Value::Array(items.clone()),
                    other => Value::Array(vec![other.clone()]),
                };
                format!("equal({}, {})", quoted(field), values)
            }
            Self::Search(field, term) => {
                format!("search({}, [{}])", quoted(field), quoted(term))
            }
            Self::OrderAsc(field) => format!("orderAsc({})", quoted(field)),
            Self::OrderDesc(field) => format!("orderDesc({})", quoted(field)),
            Self::Limit(limit) => format!("limit({})", limit),
            Self::CursorAfter(id) => format!("cursorAfter({})", quoted(id)),
        }
    }
}

/// An uploaded blob
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredFile {
    #[serde(rename = "$id")]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(rename = "sizeOriginal", default)]
    pub size: u64,
}

/// Backend contract consumed by the domain operations
///
/// Every call may fail; failures are uniformly `AppError`.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RemoteDataService: Send + Sync {
    /// Create an account with credentials
    async fn create_account(
        &self,
        id: &str,
        email: &str,
        password: &str,
        name: &str,
    ) -> Result<Account, AppError>;

    /// Account of the current session
    async fn get_account(&self) -> Result<Account, AppError>;

    /// Open an email/password session
    async fn create_session(&self, email: &str, password: &str) -> Result<Session, AppError>;

    /// Close a session; `"current"` closes the active one
    async fn delete_session(&self, session_id: &str) -> Result<(), AppError>;

    /// Generated initials avatar for a display name
    fn avatar_initials_url(&self, name: &str) -> Result<Url, AppError>;

    async fn create_document(
        &self,
        collection: Collection,
        id: &str,
        fields: Value,
    ) -> Result<Document, AppError>;

    async fn get_document(&self, collection: Collection, id: &str) -> Result<Document, AppError>;

    async fn list_documents(
        &self,
        collection: Collection,
        filters: &[Filter],
    ) -> Result<DocumentList, AppError>;

    /// Partial update: only the given attributes change
    async fn update_document(
        &self,
        collection: Collection,
        id: &str,
        fields: Value,
    ) -> Result<Document, AppError>;

    async fn delete_document(&self, collection: Collection, id: &str) -> Result<(), AppError>;

    async fn upload_blob(&self, id: &str, file: &ImageFile) -> Result<StoredFile, AppError>;

    /// Resized preview URL for a stored blob
    fn blob_preview_url(&self, blob_id: &str, preview: &PreviewConfig) -> Result<Url, AppError>;

    async fn delete_blob(&self, blob_id: &str) -> Result<(), AppError>;
}

/// Run a backend call, recording count and duration
pub(crate) async fn instrumented<T, F>(operation: &'static str, call: F) -> Result<T, AppError>
where
    F: Future<Output = Result<T, AppError>>,
{
    use crate::metrics::{REMOTE_CALL_DURATION_SECONDS, REMOTE_CALLS_TOTAL};

    let started = Instant::now();
    let result = call.await;
    REMOTE_CALL_DURATION_SECONDS
        .with_label_values(&[operation])
        .observe(started.elapsed().as_secs_f64());

    let outcome = if result.is_ok() { "ok" } else { "error" };
    REMOTE_CALLS_TOTAL
        .with_label_values(&[operation, outcome])
        .inc();

    if let Err(error) = &result {
        tracing::debug!(operation, %error, "Backend call failed");
    }
    result
}
