//! User service
//!
//! Profile listing and profile edits.

use std::sync::Arc;

use serde_json::json;

use crate::data::{Collection, Filter, RemoteDataService, UpdateUser, User};
use crate::error::AppError;
use crate::storage::MediaStorage;

/// User service
pub struct UserService {
    remote: Arc<dyn RemoteDataService>,
    media: Arc<MediaStorage>,
}

impl UserService {
    pub fn new(remote: Arc<dyn RemoteDataService>, media: Arc<MediaStorage>) -> Self {
        Self { remote, media }
    }

    /// Users, newest first
    ///
    /// # Arguments
    /// * `limit` - Maximum number of users; the backend default when None
    pub async fn get_users(&self, limit: Option<usize>) -> Result<Vec<User>, AppError> {
        let mut filters = vec![Filter::order_desc("$createdAt")];
        if let Some(limit) = limit {
            filters.push(Filter::Limit(limit));
        }
        self.remote
            .list_documents(Collection::Users, &filters)
            .await?
            .decode()
    }

    pub async fn get_user_by_id(&self, user_id: &str) -> Result<User, AppError> {
        if user_id.trim().is_empty() {
            return Err(AppError::missing("user id"));
        }
        self.remote
            .get_document(Collection::Users, user_id)
            .await?
            .decode()
    }

    /// Edit a profile, optionally replacing the avatar
    ///
    /// # Side Effects
    /// - Uploads the new avatar before writing the profile
    /// - Deletes the new avatar if the write fails
    /// - Deletes the previous uploaded avatar after a successful write
    pub async fn update_user(&self, user: UpdateUser) -> Result<User, AppError> {
        if user.user_id.trim().is_empty() {
            return Err(AppError::missing("user id"));
        }

        let staged = match &user.file {
            Some(file) => Some(self.media.stage(file).await?),
            None => None,
        };
        let (image_id, image_url) = match &staged {
            Some(image) => (Some(image.id.clone()), image.url.to_string()),
            None => (user.image_id.clone(), user.image_url.clone()),
        };

        let fields = json!({
            "name": user.name,
            "username": user.username,
            "bio": user.bio,
            "imageUrl": image_url,
            "imageId": image_id,
        });
        let written = match self
            .remote
            .update_document(Collection::Users, &user.user_id, fields)
            .await
        {
            Ok(document) => document.decode::<User>(),
            Err(error) => Err(error),
        };

        let updated = match written {
            Ok(updated) => updated,
            Err(error) => {
                if let Some(image) = &staged {
                    tracing::warn!(user_id = %user.user_id, image_id = %image.id, %error, "Profile write failed, discarding avatar");
                    self.media.discard(&image.id).await;
                }
                return Err(error);
            }
        };

        if staged.is_some() {
            if let Some(previous) = user.image_id.as_deref().filter(|id| !id.is_empty()) {
                self.media.release(previous).await;
            }
        }

        tracing::info!(user_id = %updated.id, avatar_replaced = staged.is_some(), "Profile updated");
        Ok(updated)
    }
}
