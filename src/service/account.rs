//! Account service
//!
//! Sign-up, sign-in and the signed-in user.

use std::sync::Arc;

use crate::data::{
    Account, Collection, CurrentUser, EntityId, Filter, NewUser, NewUserDocument,
    RemoteDataService, SavedPost, Session, User,
};
use crate::error::AppError;

/// Account service
pub struct AccountService {
    remote: Arc<dyn RemoteDataService>,
}

impl AccountService {
    /// Create new account service
    pub fn new(remote: Arc<dyn RemoteDataService>) -> Self {
        Self { remote }
    }

    /// Register a new user
    ///
    /// Creates the backend account, derives an initials avatar and writes
    /// the matching profile document.
    ///
    /// # Errors
    /// Fails if any step fails. An account whose profile write failed is
    /// left in place; the client has no call to remove it.
    pub async fn create_user_account(&self, user: NewUser) -> Result<User, AppError> {
        let account_id = EntityId::new().0;
        let account = self
            .remote
            .create_account(&account_id, &user.email, &user.password, &user.name)
            .await?;

        let avatar = self.remote.avatar_initials_url(&user.name)?;

        let saved = self
            .save_user_to_db(NewUserDocument {
                account_id: account.id.clone(),
                name: account.name,
                email: account.email,
                username: user.username,
                image_url: avatar.to_string(),
            })
            .await;

        match saved {
            Ok(user) => {
                tracing::info!(user_id = %user.id, account_id = %user.account_id, "User account created");
                Ok(user)
            }
            Err(error) => {
                tracing::error!(account_id = %account.id, %error, "Account created without profile document");
                Err(error)
            }
        }
    }

    /// Write the profile document for an existing account
    pub async fn save_user_to_db(&self, user: NewUserDocument) -> Result<User, AppError> {
        let fields = serde_json::to_value(&user)?;
        self.remote
            .create_document(Collection::Users, &EntityId::new().0, fields)
            .await?
            .decode()
    }

    /// Open an email/password session
    pub async fn sign_in_account(&self, email: &str, password: &str) -> Result<Session, AppError> {
        let session = self.remote.create_session(email, password).await?;
        tracing::info!(user_id = %session.user_id, "Signed in");
        Ok(session)
    }

    /// Account of the current session
    pub async fn get_account(&self) -> Result<Account, AppError> {
        self.remote.get_account().await
    }

    /// Profile of the signed-in user with their saved posts
    ///
    /// # Errors
    /// `Unauthorized` without a session; `MissingPrerequisite` when the
    /// account has no profile document.
    pub async fn get_current_user(&self) -> Result<CurrentUser, AppError> {
        let account = self.get_account().await?;

        let users = self
            .remote
            .list_documents(
                Collection::Users,
                &[Filter::equal("accountId", account.id.as_str())],
            )
            .await?;
        let user: User = users
            .documents
            .first()
            .ok_or_else(|| AppError::missing(format!("profile for account {}", account.id)))?
            .decode()?;

        let saves: Vec<SavedPost> = self
            .remote
            .list_documents(
                Collection::Saves,
                &[
                    Filter::equal("user", user.id.as_str()),
                    Filter::order_desc("$createdAt"),
                ],
            )
            .await?
            .decode()?;

        Ok(CurrentUser { user, saves })
    }

    /// Close the active session
    pub async fn sign_out_account(&self) -> Result<(), AppError> {
        self.remote.delete_session("current").await?;
        tracing::info!("Signed out");
        Ok(())
    }
}
