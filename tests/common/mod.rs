//! Common test utilities for E2E tests

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use snapgram::config;
use snapgram::data::{CurrentUser, ImageFile, InMemoryRemote, Post};
use snapgram::query::QueryState;
use snapgram::validation::{PostForm, ProfileForm, SignupForm};
use snapgram::{AppState, query::QueryObserver};

pub const PASSWORD: &str = "correct horse battery";

/// App state over an in-memory backend
pub struct TestApp {
    pub state: AppState,
    pub remote: Arc<InMemoryRemote>,
}

impl TestApp {
    pub fn new() -> Self {
        let remote = Arc::new(InMemoryRemote::new());
        let state = AppState::with_remote(test_config(), remote.clone());
        Self { state, remote }
    }

    /// Register and sign in a user
    pub async fn sign_up(&self, username: &str) -> CurrentUser {
        self.state
            .auth
            .sign_up(signup_form(username))
            .await
            .unwrap()
    }

    /// Publish a post with a fresh image
    pub async fn create_post(&self, user_id: &str, caption: &str) -> Post {
        self.state
            .posts
            .create_post(user_id, post_form(caption))
            .await
            .unwrap()
    }
}

/// Test configuration
pub fn test_config() -> config::AppConfig {
    config::AppConfig {
        backend: config::BackendConfig {
            endpoint: "http://localhost/v1".to_string(),
            project_id: "test-project".to_string(),
            timeout_seconds: 5,
        },
        database: config::DatabaseConfig {
            database_id: "test-db".to_string(),
            user_collection_id: "users".to_string(),
            post_collection_id: "posts".to_string(),
            saves_collection_id: "saves".to_string(),
        },
        storage: config::StorageConfig {
            bucket_id: "media".to_string(),
            preview: config::PreviewConfig::default(),
        },
        cache: config::CacheConfig::default(),
        search: config::SearchConfig { debounce_ms: 500 },
        logging: config::LoggingConfig {
            level: "debug".to_string(),
            format: "pretty".to_string(),
        },
    }
}

pub fn signup_form(username: &str) -> SignupForm {
    SignupForm {
        name: format!("{} Tester", username),
        username: username.to_string(),
        email: format!("{}@example.com", username),
        password: PASSWORD.to_string(),
    }
}

pub fn image(name: &str) -> ImageFile {
    ImageFile::new(name, "image/jpeg", vec![0xff, 0xd8, 0xff, 0xe0])
}

pub fn post_form(caption: &str) -> PostForm {
    PostForm {
        caption: caption.to_string(),
        file: Some(image("photo.jpg")),
        location: "Lisbon".to_string(),
        tags: "travel, sea".to_string(),
    }
}

pub fn profile_form(current: &CurrentUser, file: Option<ImageFile>) -> ProfileForm {
    ProfileForm {
        file,
        name: current.user.name.clone(),
        username: current.user.username.clone().unwrap_or_default(),
        email: current.user.email.clone(),
        bio: "Photos of the sea".to_string(),
    }
}

/// Wait until the observer reports data matching `ready`
pub async fn wait_for<T, F>(observer: &mut QueryObserver<T>, ready: F) -> QueryState<T>
where
    T: Clone + Send + Sync + 'static,
    F: Fn(&QueryState<T>) -> bool,
{
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            let state = observer.state();
            if ready(&state) {
                return state;
            }
            observer.changed().await.unwrap();
        }
    })
    .await
    .expect("observer did not reach the expected state")
}
