//! In-process backend
//!
//! A deterministic [`RemoteDataService`] kept entirely in memory. Used by the
//! test suites and for offline demos. Supports one-shot or permanent failure
//! injection per operation and records every call in order, so callers can
//! assert on orphaned blobs and on the order of compensating deletes.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde_json::{Map, Value};
use url::Url;

use crate::config::PreviewConfig;
use crate::data::remote::{Collection, Document, DocumentList, Filter, StoredFile};
use crate::data::{Account, ImageFile, RemoteDataService, Session};
use crate::error::AppError;

/// Default listing size when no limit is given
const DEFAULT_LIST_LIMIT: usize = 25;

/// Operations that can be failed on purpose
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RemoteOp {
    CreateAccount,
    GetAccount,
    CreateSession,
    DeleteSession,
    AvatarUrl,
    CreateDocument,
    GetDocument,
    ListDocuments,
    UpdateDocument,
    DeleteDocument,
    UploadBlob,
    BlobPreview,
    DeleteBlob,
}

/// One recorded backend call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteCall {
    pub op: RemoteOp,
    pub collection: Option<Collection>,
    /// Document or blob ID, when the call targets one
    pub target: Option<String>,
    pub succeeded: bool,
}

#[derive(Debug, Clone)]
enum Failure {
    Times(usize),
    Always,
}

#[derive(Debug, Clone)]
struct StoredAccount {
    account: Account,
    password: String,
}

#[derive(Default)]
struct MemoryState {
    accounts: Vec<StoredAccount>,
    session: Option<Session>,
    documents: HashMap<Collection, BTreeMap<String, Document>>,
    blobs: BTreeMap<String, usize>,
    failures: HashMap<RemoteOp, Failure>,
    calls: Vec<RemoteCall>,
    clock: Option<DateTime<Utc>>,
}

impl MemoryState {
    /// Strictly increasing timestamps so ordering keys never tie
    fn tick(&mut self) -> DateTime<Utc> {
        let now = Utc::now();
        let next = match self.clock {
            Some(last) if now <= last => last + Duration::microseconds(1),
            _ => now,
        };
        self.clock = Some(next);
        next
    }

    fn should_fail(&mut self, op: RemoteOp) -> bool {
        match self.failures.get_mut(&op) {
            Some(Failure::Always) => true,
            Some(Failure::Times(remaining)) => {
                *remaining -= 1;
                if *remaining == 0 {
                    self.failures.remove(&op);
                }
                true
            }
            None => false,
        }
    }

    /// Record the call and decide whether it fails
    fn begin(
        &mut self,
        op: RemoteOp,
        collection: Option<Collection>,
        target: Option<&str>,
    ) -> Result<(), AppError> {
        let failed = self.should_fail(op);
        self.calls.push(RemoteCall {
            op,
            collection,
            target: target.map(str::to_string),
            succeeded: !failed,
        });
        if failed {
            return Err(AppError::Remote {
                status: 503,
                message: format!("injected failure for {:?}", op),
            });
        }
        Ok(())
    }

    /// Mark the last recorded call as failed (error raised after begin)
    fn fail_last(&mut self, error: AppError) -> AppError {
        if let Some(call) = self.calls.last_mut() {
            call.succeeded = false;
        }
        error
    }

    fn collection(&mut self, collection: Collection) -> &mut BTreeMap<String, Document> {
        self.documents.entry(collection).or_default()
    }
}

/// In-memory Remote Data Service
pub struct InMemoryRemote {
    state: Mutex<MemoryState>,
    base_url: Url,
}

impl InMemoryRemote {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(MemoryState::default()),
            base_url: Url::parse("memory://snapgram/").expect("static URL is valid"),
        }
    }

    fn state(&self) -> MutexGuard<'_, MemoryState> {
        // A panic while holding the lock leaves plain data behind; keep using it.
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Fail the next call of `op`
    pub fn fail_next(&self, op: RemoteOp) {
        self.fail_times(op, 1);
    }

    /// Fail the next `times` calls of `op`
    pub fn fail_times(&self, op: RemoteOp, times: usize) {
        if times > 0 {
            self.state().failures.insert(op, Failure::Times(times));
        }
    }

    /// Fail every call of `op` until cleared
    pub fn fail_always(&self, op: RemoteOp) {
        self.state().failures.insert(op, Failure::Always);
    }

    pub fn clear_failures(&self) {
        self.state().failures.clear();
    }

    /// Every call made so far, in order
    pub fn calls(&self) -> Vec<RemoteCall> {
        self.state().calls.clone()
    }

    /// Number of successful calls of `op`
    pub fn call_count(&self, op: RemoteOp) -> usize {
        self.state()
            .calls
            .iter()
            .filter(|call| call.op == op && call.succeeded)
            .count()
    }

    /// IDs of blobs currently stored
    pub fn blob_ids(&self) -> Vec<String> {
        self.state().blobs.keys().cloned().collect()
    }

    pub fn has_blob(&self, blob_id: &str) -> bool {
        self.state().blobs.contains_key(blob_id)
    }

    /// Stored blobs that no user or post document references
    pub fn orphaned_blobs(&self) -> Vec<String> {
        let state = self.state();
        let referenced: Vec<String> = [Collection::Posts, Collection::Users]
            .iter()
            .filter_map(|collection| state.documents.get(collection))
            .flat_map(|documents| documents.values())
            .filter_map(|document| document.fields.get("imageId"))
            .filter_map(|value| value.as_str().map(str::to_string))
            .collect();
        state
            .blobs
            .keys()
            .filter(|id| !referenced.contains(id))
            .cloned()
            .collect()
    }

    pub fn document(&self, collection: Collection, id: &str) -> Option<Document> {
        self.state()
            .documents
            .get(&collection)
            .and_then(|documents| documents.get(id))
            .cloned()
    }

    pub fn document_count(&self, collection: Collection) -> usize {
        self.state()
            .documents
            .get(&collection)
            .map(BTreeMap::len)
            .unwrap_or(0)
    }

    /// Insert a document directly, bypassing failure injection
    pub fn seed_document(&self, collection: Collection, id: &str, fields: Value) -> Document {
        let mut state = self.state();
        let now = state.tick();
        let document = Document {
            id: id.to_string(),
            created_at: now,
            updated_at: now,
            fields: into_map(fields),
        };
        state
            .collection(collection)
            .insert(id.to_string(), document.clone());
        document
    }

    /// Store a blob directly, bypassing failure injection
    pub fn seed_blob(&self, blob_id: &str, size: usize) {
        self.state().blobs.insert(blob_id.to_string(), size);
    }

    fn preview_url(&self, blob_id: &str, preview: &PreviewConfig) -> Result<Url, AppError> {
        let mut url = self
            .base_url
            .join(&format!("files/{}/preview", blob_id))
            .map_err(|e| AppError::Storage(e.to_string()))?;
        url.query_pairs_mut()
            .append_pair("width", &preview.width.to_string())
            .append_pair("height", &preview.height.to_string())
            .append_pair("gravity", &preview.gravity)
            .append_pair("quality", &preview.quality.to_string());
        Ok(url)
    }
}

impl Default for InMemoryRemote {
    fn default() -> Self {
        Self::new()
    }
}

fn into_map(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

fn compare_values(a: &Option<Value>, b: &Option<Value>) -> std::cmp::Ordering {
    use std::cmp::Ordering;

    match (a, b) {
        (Some(Value::Number(a)), Some(Value::Number(b))) => a
            .as_f64()
            .partial_cmp(&b.as_f64())
            .unwrap_or(Ordering::Equal),
        (Some(Value::String(a)), Some(Value::String(b))) => a.cmp(b),
        (Some(Value::Bool(a)), Some(Value::Bool(b))) => a.cmp(b),
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        _ => Ordering::Equal,
    }
}

fn matches_equal(document: &Document, field: &str, expected: &Value) -> bool {
    let Some(actual) = document.field(field) else {
        return false;
    };
    match expected {
        Value::Array(options) => options.contains(&actual),
        other => &actual == other,
    }
}

fn matches_search(document: &Document, field: &str, term: &str) -> bool {
    let Some(Value::String(text)) = document.field(field) else {
        return false;
    };
    let text = text.to_lowercase();
    term.split_whitespace()
        .any(|word| text.contains(&word.to_lowercase()))
}

fn merge_fields(target: &mut Map<String, Value>, fields: Value) {
    for (key, value) in into_map(fields) {
        target.insert(key, value);
    }
}

#[async_trait]
impl RemoteDataService for InMemoryRemote {
    async fn create_account(
        &self,
        id: &str,
        email: &str,
        password: &str,
        name: &str,
    ) -> Result<Account, AppError> {
        let mut state = self.state();
        state.begin(RemoteOp::CreateAccount, None, Some(id))?;

        if state
            .accounts
            .iter()
            .any(|stored| stored.account.email == email || stored.account.id == id)
        {
            return Err(state.fail_last(AppError::Remote {
                status: 409,
                message: "A user with the same id or email already exists".to_string(),
            }));
        }

        let registration = state.tick();
        let account = Account {
            id: id.to_string(),
            name: name.to_string(),
            email: email.to_string(),
            registration: Some(registration),
        };
        state.accounts.push(StoredAccount {
            account: account.clone(),
            password: password.to_string(),
        });
        Ok(account)
    }

    async fn get_account(&self) -> Result<Account, AppError> {
        let mut state = self.state();
        state.begin(RemoteOp::GetAccount, None, None)?;

        let Some(session) = state.session.clone() else {
            return Err(state.fail_last(AppError::Unauthorized));
        };
        let account = state
            .accounts
            .iter()
            .find(|stored| stored.account.id == session.user_id)
            .map(|stored| stored.account.clone());
        account.ok_or_else(|| state.fail_last(AppError::Unauthorized))
    }

    async fn create_session(&self, email: &str, password: &str) -> Result<Session, AppError> {
        let mut state = self.state();
        state.begin(RemoteOp::CreateSession, None, None)?;

        let Some(account_id) = state
            .accounts
            .iter()
            .find(|stored| stored.account.email == email && stored.password == password)
            .map(|stored| stored.account.id.clone())
        else {
            return Err(state.fail_last(AppError::Unauthorized));
        };

        let expire = state.tick() + Duration::days(365);
        let session = Session {
            id: ulid::Ulid::new().to_string(),
            user_id: account_id,
            expire: Some(expire),
        };
        state.session = Some(session.clone());
        Ok(session)
    }

    async fn delete_session(&self, session_id: &str) -> Result<(), AppError> {
        let mut state = self.state();
        state.begin(RemoteOp::DeleteSession, None, Some(session_id))?;

        let matches = state
            .session
            .as_ref()
            .is_some_and(|session| session_id == "current" || session.id == session_id);
        if !matches {
            return Err(state.fail_last(AppError::Unauthorized));
        }
        state.session = None;
        Ok(())
    }

    fn avatar_initials_url(&self, name: &str) -> Result<Url, AppError> {
        let mut state = self.state();
        state.begin(RemoteOp::AvatarUrl, None, None)?;

        let mut url = self
            .base_url
            .join("avatars/initials")
            .map_err(|e| state.fail_last(AppError::Storage(e.to_string())))?;
        url.query_pairs_mut().append_pair("name", name);
        Ok(url)
    }

    async fn create_document(
        &self,
        collection: Collection,
        id: &str,
        fields: Value,
    ) -> Result<Document, AppError> {
        let mut state = self.state();
        state.begin(RemoteOp::CreateDocument, Some(collection), Some(id))?;

        if state.collection(collection).contains_key(id) {
            return Err(state.fail_last(AppError::Remote {
                status: 409,
                message: format!("Document {} already exists", id),
            }));
        }

        let now = state.tick();
        let document = Document {
            id: id.to_string(),
            created_at: now,
            updated_at: now,
            fields: into_map(fields),
        };
        state
            .collection(collection)
            .insert(id.to_string(), document.clone());
        Ok(document)
    }

    async fn get_document(&self, collection: Collection, id: &str) -> Result<Document, AppError> {
        let mut state = self.state();
        state.begin(RemoteOp::GetDocument, Some(collection), Some(id))?;

        match state.collection(collection).get(id).cloned() {
            Some(document) => Ok(document),
            None => Err(state.fail_last(AppError::NotFound)),
        }
    }

    async fn list_documents(
        &self,
        collection: Collection,
        filters: &[Filter],
    ) -> Result<DocumentList, AppError> {
        let mut state = self.state();
        state.begin(RemoteOp::ListDocuments, Some(collection), None)?;

        let mut documents: Vec<Document> = state
            .collection(collection)
            .values()
            .filter(|document| {
                filters.iter().all(|filter| match filter {
                    Filter::Equal(field, value) => matches_equal(document, field, value),
                    Filter::Search(field, term) => matches_search(document, field, term),
                    _ => true,
                })
            })
            .cloned()
            .collect();
        let total = documents.len() as u64;

        for filter in filters.iter().rev() {
            match filter {
                Filter::OrderAsc(field) => {
                    documents.sort_by(|a, b| compare_values(&a.field(field), &b.field(field)))
                }
                Filter::OrderDesc(field) => {
                    documents.sort_by(|a, b| compare_values(&b.field(field), &a.field(field)))
                }
                _ => {}
            }
        }

        let cursor = filters.iter().find_map(|filter| match filter {
            Filter::CursorAfter(id) => Some(id.clone()),
            _ => None,
        });
        if let Some(cursor) = cursor {
            let Some(position) = documents.iter().position(|document| document.id == cursor)
            else {
                return Err(state.fail_last(AppError::Remote {
                    status: 400,
                    message: format!("Cursor document {} could not be found", cursor),
                }));
            };
            documents.drain(..=position);
        }

        let limit = filters
            .iter()
            .find_map(|filter| match filter {
                Filter::Limit(limit) => Some(*limit),
                _ => None,
            })
            .unwrap_or(DEFAULT_LIST_LIMIT);
        documents.truncate(limit);

        Ok(DocumentList { total, documents })
    }

    async fn update_document(
        &self,
        collection: Collection,
        id: &str,
        fields: Value,
    ) -> Result<Document, AppError> {
        let mut state = self.state();
        state.begin(RemoteOp::UpdateDocument, Some(collection), Some(id))?;

        if !state.collection(collection).contains_key(id) {
            return Err(state.fail_last(AppError::NotFound));
        }
        let now = state.tick();
        let documents = state.collection(collection);
        let document = documents
            .get_mut(id)
            .ok_or(AppError::NotFound)?;
        merge_fields(&mut document.fields, fields);
        document.updated_at = now;
        Ok(document.clone())
    }

    async fn delete_document(&self, collection: Collection, id: &str) -> Result<(), AppError> {
        let mut state = self.state();
        state.begin(RemoteOp::DeleteDocument, Some(collection), Some(id))?;

        if state.collection(collection).remove(id).is_none() {
            return Err(state.fail_last(AppError::NotFound));
        }
        Ok(())
    }

    async fn upload_blob(&self, id: &str, file: &ImageFile) -> Result<StoredFile, AppError> {
        let mut state = self.state();
        state.begin(RemoteOp::UploadBlob, None, Some(id))?;

        if state.blobs.contains_key(id) {
            return Err(state.fail_last(AppError::Remote {
                status: 409,
                message: format!("File {} already exists", id),
            }));
        }
        state.blobs.insert(id.to_string(), file.bytes.len());
        Ok(StoredFile {
            id: id.to_string(),
            name: file.file_name.clone(),
            size: file.bytes.len() as u64,
        })
    }

    fn blob_preview_url(&self, blob_id: &str, preview: &PreviewConfig) -> Result<Url, AppError> {
        let mut state = self.state();
        state.begin(RemoteOp::BlobPreview, None, Some(blob_id))?;

        if !state.blobs.contains_key(blob_id) {
            return Err(state.fail_last(AppError::NotFound));
        }
        drop(state);
        self.preview_url(blob_id, preview)
    }

    async fn delete_blob(&self, blob_id: &str) -> Result<(), AppError> {
        let mut state = self.state();
        state.begin(RemoteOp::DeleteBlob, None, Some(blob_id))?;

        if state.blobs.remove(blob_id).is_none() {
            return Err(state.fail_last(AppError::NotFound));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn list_orders_pages_and_honours_cursor() {
        let remote = InMemoryRemote::new();
        for index in 0..5 {
            remote.seed_document(Collection::Posts, &format!("p{}", index), json!({ "n": index }));
        }

        let filters = [Filter::order_desc("$updatedAt"), Filter::Limit(2)];
        let first = remote.list_documents(Collection::Posts, &filters).await.unwrap();
        let ids: Vec<_> = first.documents.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, vec!["p4", "p3"]);
        assert_eq!(first.total, 5);

        let filters = [
            Filter::order_desc("$updatedAt"),
            Filter::Limit(2),
            Filter::CursorAfter("p3".to_string()),
        ];
        let second = remote.list_documents(Collection::Posts, &filters).await.unwrap();
        let ids: Vec<_> = second.documents.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, vec!["p2", "p1"]);
    }

    #[tokio::test]
    async fn injected_failures_are_one_shot_and_recorded() {
        let remote = InMemoryRemote::new();
        remote.fail_next(RemoteOp::UploadBlob);
        let file = ImageFile::new("a.png", "image/png", vec![1, 2, 3]);

        assert!(remote.upload_blob("b1", &file).await.is_err());
        assert!(remote.upload_blob("b1", &file).await.is_ok());

        let calls = remote.calls();
        assert_eq!(calls.len(), 2);
        assert!(!calls[0].succeeded);
        assert!(calls[1].succeeded);
        assert_eq!(remote.call_count(RemoteOp::UploadBlob), 1);
        assert_eq!(remote.orphaned_blobs(), vec!["b1".to_string()]);
    }

    #[tokio::test]
    async fn session_round_trip() {
        let remote = InMemoryRemote::new();
        remote
            .create_account("a1", "ada@example.com", "password1", "Ada")
            .await
            .unwrap();

        assert!(matches!(
            remote.get_account().await,
            Err(AppError::Unauthorized)
        ));
        assert!(remote.create_session("ada@example.com", "nope").await.is_err());

        remote
            .create_session("ada@example.com", "password1")
            .await
            .unwrap();
        assert_eq!(remote.get_account().await.unwrap().id, "a1");

        remote.delete_session("current").await.unwrap();
        assert!(remote.get_account().await.is_err());
    }
}
