//! Post service
//!
//! Creates, edits, deletes, likes and saves posts, and lists them for the
//! feeds. Operations that upload an image delete it again if the record
//! write that should reference it fails.

use std::future::Future;
use std::sync::Arc;

use serde_json::json;

use crate::data::{
    Collection, Document, EntityId, Filter, NewPost, Post, RemoteDataService, SavedPost,
    UpdatePost,
};
use crate::error::AppError;
use crate::query::{Page, PageRequest};
use crate::storage::{MediaStorage, StagedImage};

/// Split free-text tags into a list
///
/// All whitespace is removed, then the text is split on commas; empty
/// segments are dropped.
pub fn normalize_tags(tags: Option<&str>) -> Vec<String> {
    let Some(tags) = tags else {
        return Vec::new();
    };
    let compact: String = tags.chars().filter(|c| !c.is_whitespace()).collect();
    compact
        .split(',')
        .filter(|tag| !tag.is_empty())
        .map(str::to_string)
        .collect()
}

/// Post service
pub struct PostService {
    remote: Arc<dyn RemoteDataService>,
    media: Arc<MediaStorage>,
    page_size: usize,
    recent_limit: usize,
}

impl PostService {
    /// Create new post service
    ///
    /// # Arguments
    /// * `page_size` - Infinite feed page size
    /// * `recent_limit` - Length of the recent posts list
    pub fn new(
        remote: Arc<dyn RemoteDataService>,
        media: Arc<MediaStorage>,
        page_size: usize,
        recent_limit: usize,
    ) -> Self {
        Self {
            remote,
            media,
            page_size,
            recent_limit,
        }
    }

    // =========================================================================
    // Mutations
    // =========================================================================

    /// Create a post
    ///
    /// # Side Effects
    /// - Uploads the image
    /// - Deletes it again if the post document cannot be written
    pub async fn create_post(&self, post: NewPost) -> Result<Post, AppError> {
        if post.user_id.trim().is_empty() {
            return Err(AppError::missing("creator user id"));
        }

        let image = self.media.stage(&post.file).await?;
        let fields = json!({
            "creator": post.user_id,
            "caption": post.caption,
            "imageUrl": image.url.as_str(),
            "imageId": image.id,
            "location": post.location,
            "tags": normalize_tags(post.tags.as_deref()),
        });

        let post_id = EntityId::new().0;
        let created = self
            .commit(&image, || {
                self.remote
                    .create_document(Collection::Posts, &post_id, fields)
            })
            .await?;

        tracing::info!(post_id = %created.id, image_id = %created.image_id, "Post created");
        Ok(created)
    }

    /// Edit a post, optionally replacing its image
    ///
    /// The previous image is deleted only after the post document points at
    /// the new one. A new image whose record write failed is deleted.
    pub async fn update_post(&self, post: UpdatePost) -> Result<Post, AppError> {
        if post.post_id.trim().is_empty() {
            return Err(AppError::missing("post id"));
        }

        let staged = match &post.file {
            Some(file) => Some(self.media.stage(file).await?),
            None => None,
        };
        let (image_id, image_url) = match &staged {
            Some(image) => (image.id.clone(), image.url.to_string()),
            None => (post.image_id.clone(), post.image_url.clone()),
        };

        let fields = json!({
            "caption": post.caption,
            "imageUrl": image_url,
            "imageId": image_id,
            "location": post.location,
            "tags": normalize_tags(post.tags.as_deref()),
        });
        let write = self
            .remote
            .update_document(Collection::Posts, &post.post_id, fields);

        let updated: Post = match &staged {
            Some(image) => self.commit(image, || write).await?,
            None => write.await?.decode()?,
        };

        if staged.is_some() && !post.image_id.is_empty() && post.image_id != updated.image_id {
            self.media.release(&post.image_id).await;
        }

        tracing::info!(post_id = %updated.id, image_replaced = staged.is_some(), "Post updated");
        Ok(updated)
    }

    /// Delete a post and its image
    ///
    /// The image is deleted only after the document is gone. If that delete
    /// fails the blob is counted as orphaned and the call still succeeds.
    /// Saved-post records pointing at the post are not removed.
    pub async fn delete_post(&self, post_id: &str, image_id: &str) -> Result<(), AppError> {
        if post_id.trim().is_empty() || image_id.trim().is_empty() {
            return Err(AppError::missing("post id and image id"));
        }

        self.remote
            .delete_document(Collection::Posts, post_id)
            .await?;
        self.media.release(image_id).await;

        tracing::info!(post_id = %post_id, image_id = %image_id, "Post deleted");
        Ok(())
    }

    /// Replace a post's likes list
    pub async fn like_post(&self, post_id: &str, likes: Vec<String>) -> Result<Post, AppError> {
        if post_id.trim().is_empty() {
            return Err(AppError::missing("post id"));
        }

        let post: Post = self
            .remote
            .update_document(Collection::Posts, post_id, json!({ "likes": likes }))
            .await?
            .decode()?;
        tracing::debug!(post_id = %post.id, likes = post.likes.len(), "Post likes updated");
        Ok(post)
    }

    /// Save a post for a user
    pub async fn save_post(&self, user_id: &str, post_id: &str) -> Result<SavedPost, AppError> {
        if user_id.trim().is_empty() || post_id.trim().is_empty() {
            return Err(AppError::missing("user id and post id"));
        }

        let saved: SavedPost = self
            .remote
            .create_document(
                Collection::Saves,
                &EntityId::new().0,
                json!({ "user": user_id, "post": post_id }),
            )
            .await?
            .decode()?;
        tracing::debug!(saved_id = %saved.id, post_id = %post_id, "Post saved");
        Ok(saved)
    }

    /// Remove a saved-post record
    pub async fn delete_saved_post(&self, saved_id: &str) -> Result<(), AppError> {
        if saved_id.trim().is_empty() {
            return Err(AppError::missing("saved record id"));
        }
        self.remote
            .delete_document(Collection::Saves, saved_id)
            .await
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// Newest posts by creation time
    pub async fn get_recent_posts(&self) -> Result<Vec<Post>, AppError> {
        self.list(&[
            Filter::order_desc("$createdAt"),
            Filter::Limit(self.recent_limit),
        ])
        .await
    }

    /// One page of the infinite feed
    ///
    /// # Arguments
    /// * `cursor` - ID of the last post of the previous page; None for the first page
    pub async fn get_infinite_posts(&self, cursor: Option<String>) -> Result<Page<Post>, AppError> {
        let request = PageRequest {
            cursor,
            page_size: self.page_size,
        };
        let listing = self
            .remote
            .list_documents(Collection::Posts, &request.filters())
            .await?;
        Ok(Page::new(listing.decode()?, listing.total))
    }

    pub async fn get_post_by_id(&self, post_id: &str) -> Result<Post, AppError> {
        if post_id.trim().is_empty() {
            return Err(AppError::missing("post id"));
        }
        self.remote
            .get_document(Collection::Posts, post_id)
            .await?
            .decode()
    }

    /// Posts by one creator, newest first
    pub async fn get_user_posts(&self, user_id: &str) -> Result<Vec<Post>, AppError> {
        if user_id.trim().is_empty() {
            return Err(AppError::missing("user id"));
        }
        self.list(&[
            Filter::equal("creator", user_id),
            Filter::order_desc("$createdAt"),
        ])
        .await
    }

    /// Full-text search on captions
    pub async fn search_posts(&self, term: &str) -> Result<Vec<Post>, AppError> {
        self.list(&[Filter::search("caption", term)]).await
    }

    async fn list(&self, filters: &[Filter]) -> Result<Vec<Post>, AppError> {
        self.remote
            .list_documents(Collection::Posts, filters)
            .await?
            .decode()
    }

    /// Write a record referencing a staged image
    ///
    /// Discards the image when the write or its decoding fails.
    async fn commit<W, Fut>(&self, image: &StagedImage, write: W) -> Result<Post, AppError>
    where
        W: FnOnce() -> Fut,
        Fut: Future<Output = Result<Document, AppError>>,
    {
        let result = match write().await {
            Ok(document) => document.decode::<Post>(),
            Err(error) => Err(error),
        };
        if let Err(error) = &result {
            tracing::warn!(image_id = %image.id, %error, "Post write failed, discarding image");
            self.media.discard(&image.id).await;
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PreviewConfig;
    use crate::data::{ImageFile, InMemoryRemote, RemoteOp};

    fn service(remote: &Arc<InMemoryRemote>) -> PostService {
        let media = Arc::new(MediaStorage::new(remote.clone(), PreviewConfig::default()));
        PostService::new(remote.clone(), media, 9, 20)
    }

    fn image() -> ImageFile {
        ImageFile::new("sunset.jpg", "image/jpeg", vec![1, 2, 3])
    }

    fn new_post(caption: &str) -> NewPost {
        NewPost {
            user_id: "u1".to_string(),
            caption: caption.to_string(),
            file: image(),
            location: Some("Lisbon".to_string()),
            tags: Some("sun, sea ,  travel".to_string()),
        }
    }

    #[test]
    fn tags_are_split_and_compacted() {
        assert_eq!(normalize_tags(Some("a, b ,c")), vec!["a", "b", "c"]);
        assert_eq!(normalize_tags(Some("")), Vec::<String>::new());
        assert_eq!(normalize_tags(None), Vec::<String>::new());
        assert_eq!(normalize_tags(Some("a,,b, ")), vec!["a", "b"]);
        assert_eq!(normalize_tags(Some("new york")), vec!["newyork"]);
    }

    #[tokio::test]
    async fn create_post_references_uploaded_blob() {
        let remote = Arc::new(InMemoryRemote::new());
        let post = service(&remote).create_post(new_post("Golden hour")).await.unwrap();

        assert_eq!(remote.blob_ids(), vec![post.image_id.clone()]);
        assert_eq!(post.tags, vec!["sun", "sea", "travel"]);
        assert!(remote.orphaned_blobs().is_empty());
    }

    #[tokio::test]
    async fn failed_write_discards_uploaded_blob() {
        let remote = Arc::new(InMemoryRemote::new());
        remote.fail_next(RemoteOp::CreateDocument);

        let error = service(&remote)
            .create_post(new_post("Golden hour"))
            .await
            .unwrap_err();

        assert!(matches!(error, AppError::Remote { .. }));
        assert!(remote.blob_ids().is_empty());
        assert_eq!(remote.call_count(RemoteOp::DeleteBlob), 1);
    }

    #[tokio::test]
    async fn delete_requires_both_ids_before_any_call() {
        let remote = Arc::new(InMemoryRemote::new());
        let error = service(&remote).delete_post("p1", "").await.unwrap_err();

        assert!(matches!(error, AppError::MissingPrerequisite(_)));
        assert!(remote.calls().is_empty());
    }

    #[tokio::test]
    async fn delete_keeps_blob_when_record_delete_fails() {
        let remote = Arc::new(InMemoryRemote::new());
        let posts = service(&remote);
        let post = posts.create_post(new_post("Golden hour")).await.unwrap();
        remote.fail_next(RemoteOp::DeleteDocument);

        assert!(posts.delete_post(&post.id, &post.image_id).await.is_err());
        assert!(remote.has_blob(&post.image_id));
        assert_eq!(remote.call_count(RemoteOp::DeleteBlob), 0);
    }

    #[tokio::test]
    async fn delete_succeeds_when_blob_delete_fails() {
        let remote = Arc::new(InMemoryRemote::new());
        let posts = service(&remote);
        let post = posts.create_post(new_post("Golden hour")).await.unwrap();
        remote.fail_next(RemoteOp::DeleteBlob);

        posts.delete_post(&post.id, &post.image_id).await.unwrap();
        assert!(remote.document(Collection::Posts, &post.id).is_none());
        assert!(remote.has_blob(&post.image_id));
    }

    #[tokio::test]
    async fn search_matches_caption_words() {
        let remote = Arc::new(InMemoryRemote::new());
        let posts = service(&remote);
        posts.create_post(new_post("Golden hour")).await.unwrap();
        posts.create_post(new_post("Rainy morning")).await.unwrap();

        let found = posts.search_posts("golden").await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].caption, "Golden hour");
    }
}
