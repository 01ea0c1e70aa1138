//! Post bindings
//!
//! Feeds, post detail, search and every post mutation.

use std::sync::Arc;

use futures::FutureExt;
use futures::future::BoxFuture;

use crate::data::{NewPost, Post, SavedPost, UpdatePost};
use crate::error::AppError;
use crate::query::{InfiniteData, Mutation, Page, QueryCoordinator, QueryKey, QueryObserver};
use crate::service::PostService;
use crate::validation::{PostForm, check};

/// Post queries and mutations
#[derive(Clone)]
pub struct PostsApi {
    coordinator: QueryCoordinator,
    posts: Arc<PostService>,
}

impl PostsApi {
    pub fn new(coordinator: QueryCoordinator, posts: Arc<PostService>) -> Self {
        Self { coordinator, posts }
    }

    // =========================================================================
    // Mutations
    // =========================================================================

    /// Validate and publish a new post
    pub async fn create_post(&self, user_id: &str, form: PostForm) -> Result<Post, AppError> {
        check(&form)?;
        let file = form.file.ok_or_else(|| AppError::missing("image file"))?;
        let input = NewPost {
            user_id: user_id.to_string(),
            caption: form.caption,
            file,
            location: Some(form.location),
            tags: Some(form.tags),
        };

        self.coordinator
            .run_mutation(
                Mutation::CreatePost,
                |post: &Post| Some(post.id.clone()),
                self.posts.create_post(input),
            )
            .await
    }

    /// Validate and apply an edit; a picked file replaces the image
    pub async fn update_post(&self, post: &Post, form: PostForm) -> Result<Post, AppError> {
        check(&form)?;
        let input = UpdatePost {
            post_id: post.id.clone(),
            caption: form.caption,
            image_id: post.image_id.clone(),
            image_url: post.image_url.clone(),
            file: form.file,
            location: Some(form.location),
            tags: Some(form.tags),
        };

        self.coordinator
            .run_mutation(
                Mutation::UpdatePost,
                |post: &Post| Some(post.id.clone()),
                self.posts.update_post(input),
            )
            .await
    }

    pub async fn delete_post(&self, post_id: &str, image_id: &str) -> Result<(), AppError> {
        let subject = post_id.to_string();
        self.coordinator
            .run_mutation(
                Mutation::DeletePost,
                move |_| Some(subject),
                self.posts.delete_post(post_id, image_id),
            )
            .await
    }

    /// Like or unlike `post` as `user_id`
    pub async fn toggle_like(&self, post: &Post, user_id: &str) -> Result<Post, AppError> {
        self.like_post(&post.id, post.toggled_likes(user_id)).await
    }

    /// Replace a post's likes list
    pub async fn like_post(&self, post_id: &str, likes: Vec<String>) -> Result<Post, AppError> {
        self.coordinator
            .run_mutation(
                Mutation::LikePost,
                |post: &Post| Some(post.id.clone()),
                self.posts.like_post(post_id, likes),
            )
            .await
    }

    pub async fn save_post(&self, user_id: &str, post_id: &str) -> Result<SavedPost, AppError> {
        self.coordinator
            .run_mutation(
                Mutation::SavePost,
                |saved: &SavedPost| Some(saved.post.clone()),
                self.posts.save_post(user_id, post_id),
            )
            .await
    }

    pub async fn delete_saved_post(&self, saved_id: &str) -> Result<(), AppError> {
        self.coordinator
            .run_mutation(
                Mutation::DeleteSavedPost,
                |_| None,
                self.posts.delete_saved_post(saved_id),
            )
            .await
    }

    // =========================================================================
    // Queries
    // =========================================================================

    pub async fn get_recent_posts(&self) -> Result<Vec<Post>, AppError> {
        let posts = self.posts.clone();
        self.coordinator
            .run_query(QueryKey::recent_posts(), move || {
                let posts = posts.clone();
                async move { posts.get_recent_posts().await }
            })
            .await
    }

    pub async fn observe_recent_posts(&self) -> QueryObserver<Vec<Post>> {
        let posts = self.posts.clone();
        self.coordinator
            .observe(QueryKey::recent_posts(), move || {
                let posts = posts.clone();
                async move { posts.get_recent_posts().await }
            })
            .await
    }

    /// Loaded pages of the explore feed
    pub async fn get_infinite_posts(&self) -> Result<InfiniteData<Post>, AppError> {
        self.coordinator
            .run_infinite_query(QueryKey::infinite_posts(), page_fetcher(self.posts.clone()))
            .await
    }

    /// Load one more page of the explore feed
    pub async fn fetch_next_page(&self) -> Result<InfiniteData<Post>, AppError> {
        self.coordinator
            .fetch_next_page(QueryKey::infinite_posts(), page_fetcher(self.posts.clone()))
            .await
    }

    pub async fn observe_infinite_posts(&self) -> QueryObserver<InfiniteData<Post>> {
        self.coordinator
            .observe_infinite(QueryKey::infinite_posts(), page_fetcher(self.posts.clone()))
            .await
    }

    /// Post detail; `None` while no ID is known
    pub async fn get_post_by_id(&self, post_id: &str) -> Result<Option<Post>, AppError> {
        if post_id.is_empty() {
            return Ok(None);
        }
        let posts = self.posts.clone();
        let id = post_id.to_string();
        self.coordinator
            .run_query(QueryKey::post_by_id(post_id), move || {
                let posts = posts.clone();
                let id = id.clone();
                async move { posts.get_post_by_id(&id).await }
            })
            .await
            .map(Some)
    }

    /// Posts by one creator; `None` while no ID is known
    pub async fn get_user_posts(&self, user_id: &str) -> Result<Option<Vec<Post>>, AppError> {
        if user_id.is_empty() {
            return Ok(None);
        }
        let posts = self.posts.clone();
        let id = user_id.to_string();
        self.coordinator
            .run_query(QueryKey::user_posts(user_id), move || {
                let posts = posts.clone();
                let id = id.clone();
                async move { posts.get_user_posts(&id).await }
            })
            .await
            .map(Some)
    }

    /// Caption search; `None` for an empty term
    pub async fn search_posts(&self, term: &str) -> Result<Option<Vec<Post>>, AppError> {
        if term.is_empty() {
            return Ok(None);
        }
        let posts = self.posts.clone();
        let term_owned = term.to_string();
        self.coordinator
            .run_query(QueryKey::search_posts(term), move || {
                let posts = posts.clone();
                let term = term_owned.clone();
                async move { posts.search_posts(&term).await }
            })
            .await
            .map(Some)
    }
}

/// Fetches one explore page after a cursor
fn page_fetcher(
    posts: Arc<PostService>,
) -> impl Fn(Option<String>) -> BoxFuture<'static, Result<Page<Post>, AppError>> + Send + Sync + 'static
{
    move |cursor: Option<String>| {
        let posts = posts.clone();
        async move { posts.get_infinite_posts(cursor).await }.boxed()
    }
}
