//! Bindings layer
//!
//! What the app shell calls. Forms are validated here, then each domain
//! operation runs through the query coordinator: reads as cached queries,
//! writes as mutations that invalidate the queries they affect.
//! - Auth (sign-up, sign-in, current user)
//! - Posts (feeds, detail, search, post mutations)
//! - Users (people directory, profile edits)

mod auth;
mod posts;
mod users;

pub use auth::AuthApi;
pub use posts::PostsApi;
pub use users::UsersApi;
