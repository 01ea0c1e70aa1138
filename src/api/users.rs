//! User bindings

use std::sync::Arc;

use crate::data::{UpdateUser, User};
use crate::error::AppError;
use crate::query::{Mutation, QueryCoordinator, QueryKey, QueryObserver};
use crate::service::UserService;
use crate::validation::{ProfileForm, check};

/// People directory and profile edits
#[derive(Clone)]
pub struct UsersApi {
    coordinator: QueryCoordinator,
    users: Arc<UserService>,
}

impl UsersApi {
    pub fn new(coordinator: QueryCoordinator, users: Arc<UserService>) -> Self {
        Self { coordinator, users }
    }

    pub async fn get_users(&self, limit: Option<usize>) -> Result<Vec<User>, AppError> {
        let users = self.users.clone();
        self.coordinator
            .run_query(QueryKey::users(limit), move || {
                let users = users.clone();
                async move { users.get_users(limit).await }
            })
            .await
    }

    pub async fn observe_users(&self, limit: Option<usize>) -> QueryObserver<Vec<User>> {
        let users = self.users.clone();
        self.coordinator
            .observe(QueryKey::users(limit), move || {
                let users = users.clone();
                async move { users.get_users(limit).await }
            })
            .await
    }

    /// Profile by ID; `None` while no ID is known
    pub async fn get_user_by_id(&self, user_id: &str) -> Result<Option<User>, AppError> {
        if user_id.is_empty() {
            return Ok(None);
        }
        let users = self.users.clone();
        let id = user_id.to_string();
        self.coordinator
            .run_query(QueryKey::user_by_id(user_id), move || {
                let users = users.clone();
                let id = id.clone();
                async move { users.get_user_by_id(&id).await }
            })
            .await
            .map(Some)
    }

    /// Validate and apply a profile edit; a picked file replaces the avatar
    pub async fn update_user(&self, user: &User, form: ProfileForm) -> Result<User, AppError> {
        check(&form)?;
        let input = UpdateUser {
            user_id: user.id.clone(),
            name: form.name,
            username: form.username,
            bio: Some(form.bio).filter(|bio| !bio.is_empty()),
            image_id: user.image_id.clone(),
            image_url: user.image_url.clone(),
            file: form.file,
        };

        self.coordinator
            .run_mutation(
                Mutation::UpdateUser,
                |user: &User| Some(user.id.clone()),
                self.users.update_user(input),
            )
            .await
    }
}
