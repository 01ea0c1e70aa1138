//! Snapgram - client core for a photo-sharing app on a BaaS backend
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    Bindings (api)                            │
//! │  - Form validation                                          │
//! │  - One entry point per screen operation                     │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//! ┌─────────────────────────────────────────────────────────────┐
//! │                 Query Coordinator (query)                    │
//! │  - Keyed result cache, observers                            │
//! │  - Mutation → invalidation table                            │
//! │  - Cursor pagination                                        │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//! ┌─────────────────────────────────────────────────────────────┐
//! │                   Service Layer (service)                    │
//! │  - Accounts, posts, users                                   │
//! │  - Blob lifecycle via media storage                         │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//! ┌─────────────────────────────────────────────────────────────┐
//! │               Remote Data Service (data)                     │
//! │  - Appwrite REST backend                                    │
//! │  - In-memory backend                                        │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Modules
//!
//! - `api`: Bindings called by the app shell
//! - `query`: Query cache, invalidation and pagination
//! - `service`: Domain operations
//! - `data`: Remote Data Service contract, backends and models
//! - `storage`: Image blob lifecycle
//! - `validation`: Form schemas
//! - `debounce`: Debounced search input
//! - `navigation`: Sidebar and bottom bar links
//! - `config`: Configuration management
//! - `error`: Error types
//! - `metrics`: Prometheus metrics

pub mod api;
pub mod config;
pub mod data;
pub mod debounce;
pub mod error;
pub mod metrics;
pub mod navigation;
pub mod query;
pub mod service;
pub mod storage;
pub mod validation;

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Application state shared with the app shell
///
/// Cheap to clone; every clone shares the same backend and query cache.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration
    pub config: Arc<config::AppConfig>,

    /// Remote Data Service every operation goes through
    pub remote: Arc<dyn data::RemoteDataService>,

    /// Query cache shared by all bindings
    pub coordinator: query::QueryCoordinator,

    pub auth: api::AuthApi,
    pub posts: api::PostsApi,
    pub users: api::UsersApi,
}

impl AppState {
    /// Initialize application state against the configured Appwrite project
    ///
    /// # Errors
    /// Returns error if the HTTP client cannot be built
    pub fn new(config: config::AppConfig) -> Result<Self, error::AppError> {
        let backend = data::AppwriteBackend::new(&config)?;
        tracing::info!(
            endpoint = %config.backend.endpoint,
            project = %config.backend.project_id,
            "Appwrite backend ready"
        );
        Ok(Self::with_remote(config, Arc::new(backend)))
    }

    /// Initialize application state over any Remote Data Service
    pub fn with_remote(config: config::AppConfig, remote: Arc<dyn data::RemoteDataService>) -> Self {
        let media = Arc::new(storage::MediaStorage::new(
            remote.clone(),
            config.storage.preview.clone(),
        ));
        let coordinator = query::QueryCoordinator::new(&config.cache);

        let accounts = Arc::new(service::AccountService::new(remote.clone()));
        let posts = Arc::new(service::PostService::new(
            remote.clone(),
            media.clone(),
            config.cache.page_size,
            config.cache.recent_posts_limit,
        ));
        let users = Arc::new(service::UserService::new(remote.clone(), media));

        tracing::debug!(
            page_size = config.cache.page_size,
            stale_time_seconds = config.cache.stale_time_seconds,
            "Query cache initialized"
        );

        Self {
            auth: api::AuthApi::new(coordinator.clone(), accounts),
            posts: api::PostsApi::new(coordinator.clone(), posts),
            users: api::UsersApi::new(coordinator.clone(), users),
            config: Arc::new(config),
            remote,
            coordinator,
        }
    }

    /// Search box input, debounced by `search.debounce_ms`
    ///
    /// Must be called within a Tokio runtime.
    pub fn search_input(&self) -> (debounce::DebounceInput<String>, watch::Receiver<String>) {
        debounce::debounce(
            String::new(),
            Duration::from_millis(self.config.search.debounce_ms),
        )
    }
}

/// Install the global tracing subscriber
///
/// `RUST_LOG` wins over `logging.level` when set.
pub fn init_tracing(logging: &config::LoggingConfig) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("snapgram={}", logging.level).into());

    if logging.format == "json" {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().pretty())
            .init();
    }
}
