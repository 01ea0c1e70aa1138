//! Media storage on the backend blob bucket
//!
//! Handles upload, preview URL derivation and deletion of images.
//! An upload is "staged" until a record references it; staged blobs that
//! never get committed are discarded by the operation that uploaded them.

use std::sync::Arc;

use url::Url;

use crate::config::PreviewConfig;
use crate::data::{EntityId, ImageFile, RemoteDataService};
use crate::error::AppError;

/// Uploaded image not yet referenced by any record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedImage {
    /// Blob ID
    pub id: String,
    /// Preview URL stored on the record
    pub url: Url,
}

/// Media storage service
pub struct MediaStorage {
    remote: Arc<dyn RemoteDataService>,
    preview: PreviewConfig,
}

impl MediaStorage {
    /// Create new media storage
    ///
    /// # Arguments
    /// * `remote` - Backend holding the blob bucket
    /// * `preview` - Preview render parameters stored on records
    pub fn new(remote: Arc<dyn RemoteDataService>, preview: PreviewConfig) -> Self {
        Self { remote, preview }
    }

    /// Upload an image and derive its preview URL
    ///
    /// # Returns
    /// The staged image; the caller must either commit it to a record or
    /// [`discard`](Self::discard) it.
    ///
    /// # Errors
    /// Fails if the upload fails, or if the preview cannot be derived (the
    /// uploaded blob is deleted first).
    pub async fn stage(&self, file: &ImageFile) -> Result<StagedImage, AppError> {
        use crate::metrics::{MEDIA_BYTES_UPLOADED, MEDIA_UPLOADS_TOTAL};

        if file.bytes.is_empty() {
            return Err(AppError::missing("image file contents"));
        }

        let blob_id = EntityId::new().0;
        let stored = self.remote.upload_blob(&blob_id, file).await?;
        MEDIA_UPLOADS_TOTAL.inc();
        MEDIA_BYTES_UPLOADED.inc_by(file.bytes.len() as f64);

        let url = match self.remote.blob_preview_url(&stored.id, &self.preview) {
            Ok(url) => url,
            Err(error) => {
                tracing::warn!(blob_id = %stored.id, %error, "Preview derivation failed");
                self.discard(&stored.id).await;
                return Err(error);
            }
        };

        tracing::debug!(blob_id = %stored.id, size = file.bytes.len(), "Image staged");
        Ok(StagedImage { id: stored.id, url })
    }

    /// Delete a staged blob after the operation that uploaded it failed
    ///
    /// Never fails: a blob that cannot be deleted is logged and counted as
    /// orphaned, and the caller propagates its original error.
    pub async fn discard(&self, blob_id: &str) {
        use crate::metrics::{BLOB_COMPENSATIONS_TOTAL, ORPHANED_BLOBS_TOTAL};

        match self.remote.delete_blob(blob_id).await {
            Ok(()) => {
                BLOB_COMPENSATIONS_TOTAL.with_label_values(&["ok"]).inc();
                tracing::info!(blob_id = %blob_id, "Discarded uncommitted blob");
            }
            Err(error) => {
                BLOB_COMPENSATIONS_TOTAL.with_label_values(&["error"]).inc();
                ORPHANED_BLOBS_TOTAL.inc();
                tracing::error!(blob_id = %blob_id, %error, "Failed to discard uncommitted blob");
            }
        }
    }

    /// Delete a blob that is no longer referenced
    pub async fn delete(&self, blob_id: &str) -> Result<(), AppError> {
        self.remote.delete_blob(blob_id).await
    }

    /// Delete a replaced or detached blob, logging instead of failing
    ///
    /// Used once the owning record is already consistent, so a failure here
    /// only leaves an unreferenced blob behind.
    pub async fn release(&self, blob_id: &str) {
        use crate::metrics::ORPHANED_BLOBS_TOTAL;

        if let Err(error) = self.delete(blob_id).await {
            ORPHANED_BLOBS_TOTAL.inc();
            tracing::warn!(blob_id = %blob_id, %error, "Failed to delete released blob");
        }
    }
}
