//! Blob storage module
//!
//! Handles image upload, preview derivation and cleanup on the backend
//! bucket.

mod media;

pub use media::{MediaStorage, StagedImage};
