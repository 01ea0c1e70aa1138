//! Auth bindings
//!
//! Sign-up, sign-in, sign-out and the current user query.

use std::sync::Arc;

use crate::data::{CurrentUser, Session, User};
use crate::error::AppError;
use crate::query::{Mutation, QueryCoordinator, QueryKey, QueryObserver};
use crate::service::AccountService;
use crate::validation::{SigninForm, SignupForm, check};

#[derive(Clone)]
pub struct AuthApi {
    coordinator: QueryCoordinator,
    accounts: Arc<AccountService>,
}

impl AuthApi {
    pub fn new(coordinator: QueryCoordinator, accounts: Arc<AccountService>) -> Self {
        Self {
            coordinator,
            accounts,
        }
    }

    /// Validate and register a new user
    pub async fn create_user_account(&self, form: SignupForm) -> Result<User, AppError> {
        check(&form)?;
        self.coordinator
            .run_mutation(
                Mutation::CreateUserAccount,
                |user: &User| Some(user.id.clone()),
                self.accounts.create_user_account(form.into()),
            )
            .await
    }

    /// Register, then open a session with the same credentials
    pub async fn sign_up(&self, form: SignupForm) -> Result<CurrentUser, AppError> {
        let credentials = SigninForm {
            email: form.email.clone(),
            password: form.password.clone(),
        };
        self.create_user_account(form).await?;
        self.sign_in_account(credentials).await?;
        self.get_current_user().await
    }

    pub async fn sign_in_account(&self, form: SigninForm) -> Result<Session, AppError> {
        check(&form)?;
        self.coordinator
            .run_mutation(
                Mutation::SignInAccount,
                |_| None,
                self.accounts.sign_in_account(&form.email, &form.password),
            )
            .await
    }

    pub async fn sign_out_account(&self) -> Result<(), AppError> {
        self.coordinator
            .run_mutation(
                Mutation::SignOutAccount,
                |_| None,
                self.accounts.sign_out_account(),
            )
            .await
    }

    /// Signed-in user with saved posts
    pub async fn get_current_user(&self) -> Result<CurrentUser, AppError> {
        let accounts = self.accounts.clone();
        self.coordinator
            .run_query(QueryKey::current_user(), move || {
                let accounts = accounts.clone();
                async move { accounts.get_current_user().await }
            })
            .await
    }

    pub async fn observe_current_user(&self) -> QueryObserver<CurrentUser> {
        let accounts = self.accounts.clone();
        self.coordinator
            .observe(QueryKey::current_user(), move || {
                let accounts = accounts.clone();
                async move { accounts.get_current_user().await }
            })
            .await
    }
}
