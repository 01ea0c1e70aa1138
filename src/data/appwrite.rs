//! Appwrite REST backend
//!
//! Implements [`RemoteDataService`] over the platform's HTTP API. The session
//! is held as a cookie inside the `reqwest` client, so one backend instance
//! corresponds to one signed-in user.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Method, RequestBuilder, StatusCode};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use url::Url;

use crate::config::{AppConfig, PreviewConfig};
use crate::data::remote::{Collection, Document, DocumentList, Filter, StoredFile, instrumented};
use crate::data::{Account, ImageFile, RemoteDataService, Session};
use crate::error::AppError;

/// HTTP client for the BaaS REST API
pub struct AppwriteBackend {
    http: reqwest::Client,
    /// e.g. "https://cloud.appwrite.io/v1/"
    endpoint: Url,
    project_id: String,
    database_id: String,
    user_collection_id: String,
    post_collection_id: String,
    saves_collection_id: String,
    bucket_id: String,
}

/// Error body returned by the API
#[derive(Debug, Deserialize)]
struct ApiError {
    message: String,
    #[serde(rename = "type", default)]
    kind: Option<String>,
}

impl AppwriteBackend {
    /// Create a backend client from configuration
    ///
    /// # Errors
    /// Returns error if the endpoint is invalid or the HTTP client cannot be built
    pub fn new(config: &AppConfig) -> Result<Self, AppError> {
        let mut endpoint = config.endpoint_url()?;
        // Keep the version segment when joining relative paths.
        if !endpoint.path().ends_with('/') {
            let path = format!("{}/", endpoint.path());
            endpoint.set_path(&path);
        }

        let http = reqwest::Client::builder()
            .user_agent("Snapgram/0.1.0")
            .cookie_store(true)
            .timeout(Duration::from_secs(config.backend.timeout_seconds))
            .build()?;

        Ok(Self {
            http,
            endpoint,
            project_id: config.backend.project_id.clone(),
            database_id: config.database.database_id.clone(),
            user_collection_id: config.database.user_collection_id.clone(),
            post_collection_id: config.database.post_collection_id.clone(),
            saves_collection_id: config.database.saves_collection_id.clone(),
            bucket_id: config.storage.bucket_id.clone(),
        })
    }

    fn collection_id(&self, collection: Collection) -> &str {
        match collection {
            Collection::Users => &self.user_collection_id,
            Collection::Posts => &self.post_collection_id,
            Collection::Saves => &self.saves_collection_id,
        }
    }

    fn url(&self, path: &str) -> Result<Url, AppError> {
        self.endpoint
            .join(path.trim_start_matches('/'))
            .map_err(|e| AppError::Internal(e.into()))
    }

    fn documents_path(&self, collection: Collection) -> String {
        format!(
            "databases/{}/collections/{}/documents",
            self.database_id,
            self.collection_id(collection)
        )
    }

    fn request(&self, method: Method, path: &str) -> Result<RequestBuilder, AppError> {
        let url = self.url(path)?;
        Ok(self
            .http
            .request(method, url)
            .header("X-Appwrite-Project", &self.project_id)
            .header("X-Appwrite-Response-Format", "1.4.0"))
    }

    /// Send a request and decode a JSON body
    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, AppError> {
        let response = request.send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response.json::<T>().await?);
        }
        Err(Self::error_from(status, response.text().await.unwrap_or_default()))
    }

    /// Send a request whose success body is empty
    async fn send_empty(&self, request: RequestBuilder) -> Result<(), AppError> {
        let response = request.send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        Err(Self::error_from(status, response.text().await.unwrap_or_default()))
    }

    fn error_from(status: StatusCode, body: String) -> AppError {
        match status {
            StatusCode::NOT_FOUND => AppError::NotFound,
            StatusCode::UNAUTHORIZED => AppError::Unauthorized,
            _ => {
                let message = serde_json::from_str::<ApiError>(&body)
                    .map(|error| match error.kind {
                        Some(kind) => format!("{} ({})", error.message, kind),
                        None => error.message,
                    })
                    .unwrap_or(body);
                AppError::Remote {
                    status: status.as_u16(),
                    message,
                }
            }
        }
    }

    fn with_project(&self, mut url: Url) -> Url {
        url.query_pairs_mut().append_pair("project", &self.project_id);
        url
    }
}

#[async_trait]
impl RemoteDataService for AppwriteBackend {
    async fn create_account(
        &self,
        id: &str,
        email: &str,
        password: &str,
        name: &str,
    ) -> Result<Account, AppError> {
        instrumented("create_account", async {
            let request = self.request(Method::POST, "account")?.json(&json!({
                "userId": id,
                "email": email,
                "password": password,
                "name": name,
            }));
            self.send(request).await
        })
        .await
    }

    async fn get_account(&self) -> Result<Account, AppError> {
        instrumented("get_account", async {
            self.send(self.request(Method::GET, "account")?).await
        })
        .await
    }

    async fn create_session(&self, email: &str, password: &str) -> Result<Session, AppError> {
        instrumented("create_session", async {
            let request = self
                .request(Method::POST, "account/sessions/email")?
                .json(&json!({ "email": email, "password": password }));
            self.send(request).await
        })
        .await
    }

    async fn delete_session(&self, session_id: &str) -> Result<(), AppError> {
        instrumented("delete_session", async {
            let path = format!("account/sessions/{}", session_id);
            self.send_empty(self.request(Method::DELETE, &path)?).await
        })
        .await
    }

    fn avatar_initials_url(&self, name: &str) -> Result<Url, AppError> {
        let mut url = self.url("avatars/initials")?;
        url.query_pairs_mut().append_pair("name", name);
        Ok(self.with_project(url))
    }

    async fn create_document(
        &self,
        collection: Collection,
        id: &str,
        fields: Value,
    ) -> Result<Document, AppError> {
        instrumented("create_document", async {
            let request = self
                .request(Method::POST, &self.documents_path(collection))?
                .json(&json!({ "documentId": id, "data": fields }));
            self.send(request).await
        })
        .await
    }

    async fn get_document(&self, collection: Collection, id: &str) -> Result<Document, AppError> {
        instrumented("get_document", async {
            let path = format!("{}/{}", self.documents_path(collection), id);
            self.send(self.request(Method::GET, &path)?).await
        })
        .await
    }

    async fn list_documents(
        &self,
        collection: Collection,
        filters: &[Filter],
    ) -> Result<DocumentList, AppError> {
        instrumented("list_documents", async {
            let queries: Vec<(&str, String)> = filters
                .iter()
                .map(|filter| ("queries[]", filter.to_query_string()))
                .collect();
            let request = self
                .request(Method::GET, &self.documents_path(collection))?
                .query(&queries);
            self.send(request).await
        })
        .await
    }

    async fn update_document(
        &self,
        collection: Collection,
        id: &str,
        fields: Value,
    ) -> Result<Document, AppError> {
        instrumented("update_document", async {
            let path = format!("{}/{}", self.documents_path(collection), id);
            let request = self
                .request(Method::PATCH, &path)?
                .json(&json!({ "data": fields }));
            self.send(request).await
        })
        .await
    }

    async fn delete_document(&self, collection: Collection, id: &str) -> Result<(), AppError> {
        instrumented("delete_document", async {
            let path = format!("{}/{}", self.documents_path(collection), id);
            self.send_empty(self.request(Method::DELETE, &path)?).await
        })
        .await
    }

    async fn upload_blob(&self, id: &str, file: &ImageFile) -> Result<StoredFile, AppError> {
        use reqwest::multipart::{Form, Part};

        instrumented("upload_blob", async {
            let part = Part::bytes(file.bytes.clone())
                .file_name(file.file_name.clone())
                .mime_str(&file.content_type)
                .map_err(|e| AppError::Storage(format!("invalid content type: {}", e)))?;
            let form = Form::new().text("fileId", id.to_string()).part("file", part);

            let path = format!("storage/buckets/{}/files", self.bucket_id);
            self.send(self.request(Method::POST, &path)?.multipart(form))
                .await
        })
        .await
    }

    fn blob_preview_url(&self, blob_id: &str, preview: &PreviewConfig) -> Result<Url, AppError> {
        if blob_id.trim().is_empty() {
            return Err(AppError::missing("blob id for preview"));
        }

        let path = format!("storage/buckets/{}/files/{}/preview", self.bucket_id, blob_id);
        let mut url = self.url(&path)?;
        url.query_pairs_mut()
            .append_pair("width", &preview.width.to_string())
            .append_pair("height", &preview.height.to_string())
            .append_pair("gravity", &preview.gravity)
            .append_pair("quality", &preview.quality.to_string());
        Ok(self.with_project(url))
    }

    async fn delete_blob(&self, blob_id: &str) -> Result<(), AppError> {
        instrumented("delete_blob", async {
            let path = format!("storage/buckets/{}/files/{}", self.bucket_id, blob_id);
            self.send_empty(self.request(Method::DELETE, &path)?).await
        })
        .await
    }
}
