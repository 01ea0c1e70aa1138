//! Data models
//!
//! Typed views of the documents stored by the backend, plus the input value
//! objects accepted by the domain operations.
//! Record IDs are ULIDs; timestamps use chrono.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::query::pagination::Identified;

// =============================================================================
// ID Types
// =============================================================================

/// Entity ID wrapper (ULID format, 26 characters)
///
/// Example: "01ARZ3NDEKTSV4RRFFQ69G5FAV"
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(pub String);

impl EntityId {
    /// Generate a new ULID
    pub fn new() -> Self {
        Self(ulid::Ulid::new().to_string())
    }

    /// Create from existing string
    pub fn from_string(s: String) -> Self {
        Self(s)
    }
}

impl Default for EntityId {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// Account & Session
// =============================================================================

/// Backend account record (credentials live on the backend)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    #[serde(rename = "$id")]
    pub id: String,
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub registration: Option<DateTime<Utc>>,
}

/// Login session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    #[serde(rename = "$id")]
    pub id: String,
    #[serde(rename = "userId")]
    pub user_id: String,
    #[serde(default)]
    pub expire: Option<DateTime<Utc>>,
}

// =============================================================================
// User
// =============================================================================

/// Profile document, mirrors one account 1:1
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    #[serde(rename = "$id")]
    pub id: String,
    pub account_id: String,
    pub name: String,
    #[serde(default)]
    pub username: Option<String>,
    pub email: String,
    #[serde(default)]
    pub bio: Option<String>,
    pub image_url: String,
    /// Blob ID of an uploaded avatar; None for generated initials
    #[serde(default)]
    pub image_id: Option<String>,
    #[serde(rename = "$createdAt")]
    pub created_at: DateTime<Utc>,
    #[serde(rename = "$updatedAt")]
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Username for display; empty when the profile has none
    pub fn handle(&self) -> &str {
        self.username.as_deref().unwrap_or_default()
    }
}

impl Identified for User {
    fn id(&self) -> &str {
        &self.id
    }
}

/// The signed-in user with their saved posts
#[derive(Debug, Clone, PartialEq)]
pub struct CurrentUser {
    pub user: User,
    pub saves: Vec<SavedPost>,
}

impl CurrentUser {
    /// Saved record for a post, if the user saved it
    pub fn saved_record(&self, post_id: &str) -> Option<&SavedPost> {
        self.saves.iter().find(|saved| saved.post == post_id)
    }
}

// =============================================================================
// Post
// =============================================================================

/// A photo post
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Post {
    #[serde(rename = "$id")]
    pub id: String,
    /// Creator user ID
    pub creator: String,
    pub caption: String,
    pub image_url: String,
    /// Blob ID backing `image_url`
    pub image_id: String,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    /// IDs of users who liked this post
    #[serde(default)]
    pub likes: Vec<String>,
    #[serde(rename = "$createdAt")]
    pub created_at: DateTime<Utc>,
    #[serde(rename = "$updatedAt")]
    pub updated_at: DateTime<Utc>,
}

impl Post {
    pub fn is_liked_by(&self, user_id: &str) -> bool {
        self.likes.iter().any(|id| id == user_id)
    }

    /// Likes list after toggling `user_id`
    pub fn toggled_likes(&self, user_id: &str) -> Vec<String> {
        if self.is_liked_by(user_id) {
            self.likes
                .iter()
                .filter(|id| id.as_str() != user_id)
                .cloned()
                .collect()
        } else {
            let mut likes = self.likes.clone();
            likes.push(user_id.to_string());
            likes
        }
    }
}

impl Identified for Post {
    fn id(&self) -> &str {
        &self.id
    }
}

// =============================================================================
// Saved Post
// =============================================================================

/// Join record: a user saved a post
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SavedPost {
    #[serde(rename = "$id")]
    pub id: String,
    /// User ID
    pub user: String,
    /// Post ID
    pub post: String,
    #[serde(rename = "$createdAt")]
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Inputs
// =============================================================================

/// An image selected for upload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageFile {
    pub file_name: String,
    /// MIME type (e.g., "image/jpeg")
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl ImageFile {
    pub fn new(
        file_name: impl Into<String>,
        content_type: impl Into<String>,
        bytes: Vec<u8>,
    ) -> Self {
        Self {
            file_name: file_name.into(),
            content_type: content_type.into(),
            bytes,
        }
    }
}

/// Sign-up input
#[derive(Debug, Clone)]
pub struct NewUser {
    pub name: String,
    pub username: String,
    pub email: String,
    pub password: String,
}

/// Profile document written after the account exists
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewUserDocument {
    pub account_id: String,
    pub name: String,
    pub email: String,
    pub username: String,
    pub image_url: String,
}

/// Post creation input
#[derive(Debug, Clone)]
pub struct NewPost {
    pub user_id: String,
    pub caption: String,
    pub file: ImageFile,
    pub location: Option<String>,
    /// Free-text, comma separated
    pub tags: Option<String>,
}

/// Post edit input
///
/// `image_id`/`image_url` describe the current image; `file` replaces it.
#[derive(Debug, Clone)]
pub struct UpdatePost {
    pub post_id: String,
    pub caption: String,
    pub image_id: String,
    pub image_url: String,
    pub file: Option<ImageFile>,
    pub location: Option<String>,
    pub tags: Option<String>,
}

/// Profile edit input
#[derive(Debug, Clone)]
pub struct UpdateUser {
    pub user_id: String,
    pub name: String,
    pub username: String,
    pub bio: Option<String>,
    pub image_id: Option<String>,
    pub image_url: String,
    pub file: Option<ImageFile>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn post_decodes_backend_document_shape() {
        let post: Post = serde_json::from_value(serde_json::json!({
            "$id": "p1",
            "$createdAt": "2024-01-01T00:00:00Z",
            "$updatedAt": "2024-01-02T00:00:00Z",
            "creator": "u1",
            "caption": "Hello",
            "imageUrl": "https://cdn.example.com/p1",
            "imageId": "b1",
            "tags": ["a", "b"]
        }))
        .unwrap();

        assert_eq!(post.image_id, "b1");
        assert_eq!(post.tags, vec!["a", "b"]);
        assert!(post.likes.is_empty());
        assert!(post.location.is_none());
    }

    #[test]
    fn toggled_likes_adds_then_removes() {
        let post: Post = serde_json::from_value(serde_json::json!({
            "$id": "p1",
            "$createdAt": "2024-01-01T00:00:00Z",
            "$updatedAt": "2024-01-01T00:00:00Z",
            "creator": "u1",
            "caption": "Hello",
            "imageUrl": "u",
            "imageId": "b",
            "likes": ["u2"]
        }))
        .unwrap();

        assert_eq!(post.toggled_likes("u3"), vec!["u2", "u3"]);
        assert!(post.toggled_likes("u2").is_empty());
    }

    #[test]
    fn handle_falls_back_to_empty_without_username() {
        let mut user: User = serde_json::from_value(serde_json::json!({
            "$id": "u1",
            "$createdAt": "2024-01-01T00:00:00Z",
            "$updatedAt": "2024-01-01T00:00:00Z",
            "accountId": "a1",
            "name": "Sunny",
            "email": "sunny@example.com",
            "imageUrl": "https://cdn.example.com/avatar"
        }))
        .unwrap();
        assert_eq!(user.handle(), "");

        user.username = Some("sunny".to_string());
        assert_eq!(user.handle(), "sunny");
    }
}
