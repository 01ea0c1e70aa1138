//! Service layer
//!
//! Domain operations over the Remote Data Service. Each operation runs its
//! remote calls in order and cleans up uploaded blobs on partial failure.
//! Caching and invalidation live one layer up, in the bindings.

mod account;
mod post;
mod user;

pub use account::AccountService;
pub use post::{PostService, normalize_tags};
pub use user::UserService;
