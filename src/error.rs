//! Error types for Snapgram
//!
//! Every domain operation returns `Result<T, AppError>`. Callers branch on
//! [`AppError::kind`] instead of probing for empty results.

use std::collections::BTreeMap;
use std::fmt;

use thiserror::Error;

/// Application-wide error type
///
/// This enum represents all possible errors that can occur while talking
/// to the backend, validating forms or coordinating the query cache.
#[derive(Debug, Error)]
pub enum AppError {
    /// Record, account or blob not found
    #[error("Resource not found")]
    NotFound,

    /// No active session, or the session is not allowed to act
    #[error("Authentication required")]
    Unauthorized,

    /// Input rejected by form rules before any remote call
    #[error("Validation error: {0}")]
    Validation(FieldErrors),

    /// A required upstream result or argument is absent
    #[error("Missing prerequisite: {0}")]
    MissingPrerequisite(String),

    /// The backend answered with an error status
    #[error("Remote call failed ({status}): {message}")]
    Remote { status: u16, message: String },

    /// Transport-level HTTP failure
    #[error("HTTP client error: {0}")]
    HttpClient(#[from] reqwest::Error),

    /// Payload could not be encoded or decoded
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Blob storage error
    #[error("Storage error: {0}")]
    Storage(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

/// Coarse failure classes callers branch on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Any backend call rejected (transport, status, decoding)
    RemoteCallFailure,
    /// A required upstream result was absent
    MissingPrerequisite,
    /// Input failed form rules
    ValidationFailure,
    /// Invalid configuration
    Configuration,
    /// Bug or runtime failure inside the client
    Internal,
}

impl AppError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AppError::NotFound
            | AppError::Unauthorized
            | AppError::Remote { .. }
            | AppError::HttpClient(_)
            | AppError::Serialization(_)
            | AppError::Storage(_) => ErrorKind::RemoteCallFailure,
            AppError::MissingPrerequisite(_) => ErrorKind::MissingPrerequisite,
            AppError::Validation(_) => ErrorKind::ValidationFailure,
            AppError::Config(_) => ErrorKind::Configuration,
            AppError::Internal(_) => ErrorKind::Internal,
        }
    }

    /// Short label used for metrics
    pub fn error_type(&self) -> &'static str {
        match self {
            AppError::NotFound => "not_found",
            AppError::Unauthorized => "unauthorized",
            AppError::Validation(_) => "validation",
            AppError::MissingPrerequisite(_) => "missing_prerequisite",
            AppError::Remote { .. } => "remote",
            AppError::HttpClient(_) => "http_client",
            AppError::Serialization(_) => "serialization",
            AppError::Storage(_) => "storage",
            AppError::Config(_) => "config",
            AppError::Internal(_) => "internal",
        }
    }

    /// Record this error against an operation in the error counter
    pub fn record(&self, operation: &str) {
        use crate::metrics::ERRORS_TOTAL;
        ERRORS_TOTAL
            .with_label_values(&[self.error_type(), operation])
            .inc();
    }

    pub(crate) fn missing(what: impl Into<String>) -> Self {
        AppError::MissingPrerequisite(what.into())
    }
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::Config(err.to_string())
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        AppError::Validation(FieldErrors::from(errors))
    }
}

// =============================================================================
// Field errors
// =============================================================================

/// Field-keyed, human-readable validation messages
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldErrors(BTreeMap<String, Vec<String>>);

impl FieldErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.0.entry(field.into()).or_default().push(message.into());
    }

    /// Messages for one field (empty when the field passed)
    pub fn get(&self, field: &str) -> &[String] {
        self.0.get(field).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn contains(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }
}

impl From<validator::ValidationErrors> for FieldErrors {
    fn from(errors: validator::ValidationErrors) -> Self {
        let mut mapped = FieldErrors::new();
        for (field, field_errors) in errors.field_errors() {
            for error in field_errors.iter() {
                let message = error
                    .message
                    .as_ref()
                    .map(|message| message.to_string())
                    .unwrap_or_else(|| format!("{} is invalid", field));
                mapped.add(field.to_string(), message);
            }
        }
        mapped
    }
}

impl fmt::Display for FieldErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (field, messages) in &self.0 {
            for message in messages {
                if !first {
                    f.write_str("; ")?;
                }
                write!(f, "{}: {}", field, message)?;
                first = false;
            }
        }
        Ok(())
    }
}

/// Result type alias using AppError
pub type Result<T> = std::result::Result<T, AppError>;
