//! Data layer module
//!
//! Everything that talks to the backend:
//! - Remote Data Service contract and document types
//! - Appwrite REST backend
//! - In-memory backend (tests, offline demos)
//! - Typed models

mod appwrite;
pub mod memory;
mod models;
pub mod remote;

pub use appwrite::AppwriteBackend;
pub use memory::{InMemoryRemote, RemoteCall, RemoteOp};
pub use models::*;
pub use remote::{Collection, Document, DocumentList, Filter, RemoteDataService, StoredFile};

#[cfg(test)]
pub use remote::MockRemoteDataService;
