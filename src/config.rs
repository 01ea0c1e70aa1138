//! Configuration management
//!
//! Loads configuration from:
//! 1. Default values
//! 2. Configuration file (config/default.toml, config/local.toml)
//! 3. Environment variables (override)

use serde::Deserialize;
use std::net::IpAddr;
use std::path::Path;

/// Main application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub backend: BackendConfig,
    pub database: DatabaseConfig,
    pub storage: StorageConfig,
    pub cache: CacheConfig,
    pub search: SearchConfig,
    pub logging: LoggingConfig,
}

/// BaaS connection configuration
#[derive(Debug, Clone, Deserialize)]
pub struct BackendConfig {
    /// REST endpoint including the version path
    /// e.g., "https://cloud.appwrite.io/v1"
    pub endpoint: String,
    /// Project identifier sent with every request
    pub project_id: String,
    /// Request timeout in seconds (default: 30)
    pub timeout_seconds: u64,
}

/// Document database configuration
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub database_id: String,
    pub user_collection_id: String,
    pub post_collection_id: String,
    pub saves_collection_id: String,
}

/// Blob storage configuration
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// Bucket holding post and avatar images
    pub bucket_id: String,
    pub preview: PreviewConfig,
}

/// Image preview rendering parameters
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct PreviewConfig {
    /// Width in pixels (default: 2000)
    pub width: u32,
    /// Height in pixels (default: 2000)
    pub height: u32,
    /// Crop gravity (default: "top")
    pub gravity: String,
    /// JPEG quality 0-100 (default: 100)
    pub quality: u8,
}

impl Default for PreviewConfig {
    fn default() -> Self {
        Self {
            width: 2000,
            height: 2000,
            gravity: "top".to_string(),
            quality: 100,
        }
    }
}

/// Query cache configuration
#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
    /// How long a fetched result counts as fresh, in seconds (default: 0)
    ///
    /// With 0, cached results never age out and only invalidation or an
    /// empty entry triggers a fetch.
    pub stale_time_seconds: u64,
    /// Infinite feed page size (default: 9)
    pub page_size: usize,
    /// Recent posts list length (default: 20)
    pub recent_posts_limit: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            stale_time_seconds: 0,
            page_size: 9,
            recent_posts_limit: 20,
        }
    }
}

/// Search configuration
#[derive(Debug, Clone, Deserialize)]
pub struct SearchConfig {
    /// Debounce delay for search input in milliseconds (default: 500)
    pub debounce_ms: u64,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error
    pub level: String,
    /// Log format: "pretty" or "json"
    pub format: String,
}

impl AppConfig {
    /// Load configuration from file and environment
    ///
    /// # Loading Order
    /// 1. Default values
    /// 2. config/default.toml (if exists)
    /// 3. config/local.toml (if exists)
    /// 4. Environment variables (SNAPGRAM__*)
    ///
    /// # Errors
    /// Returns error if configuration is invalid
    pub fn load() -> Result<Self, crate::error::AppError> {
        use config::File;

        let builder = Self::builder_with_defaults()?
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name("config/local").required(false));
        Self::finish(builder)
    }

    /// Load configuration from an explicit file, then environment
    pub fn load_from(path: &Path) -> Result<Self, crate::error::AppError> {
        use config::File;

        let builder = Self::builder_with_defaults()?.add_source(File::from(path).required(true));
        Self::finish(builder)
    }

    fn builder_with_defaults()
    -> Result<config::ConfigBuilder<config::builder::DefaultState>, crate::error::AppError> {
        let builder = config::Config::builder()
            .set_default("backend.endpoint", "https://cloud.appwrite.io/v1")?
            .set_default("backend.timeout_seconds", 30)?
            .set_default("database.user_collection_id", "users")?
            .set_default("database.post_collection_id", "posts")?
            .set_default("database.saves_collection_id", "saves")?
            .set_default("storage.preview.width", 2000)?
            .set_default("storage.preview.height", 2000)?
            .set_default("storage.preview.gravity", "top")?
            .set_default("storage.preview.quality", 100)?
            .set_default("cache.stale_time_seconds", 0)?
            .set_default("cache.page_size", 9)?
            .set_default("cache.recent_posts_limit", 20)?
            .set_default("search.debounce_ms", 500)?
            .set_default("logging.level", "info")?
            .set_default("logging.format", "pretty")?;
        Ok(builder)
    }

    fn finish(
        builder: config::ConfigBuilder<config::builder::DefaultState>,
    ) -> Result<Self, crate::error::AppError> {
        use config::Environment;

        let config = builder
            // Load from environment variables (SNAPGRAM__*)
            .add_source(
                Environment::with_prefix("SNAPGRAM")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| crate::error::AppError::Config(e.to_string()))?;

        let app_config: Self = config
            .try_deserialize()
            .map_err(|e| crate::error::AppError::Config(e.to_string()))?;
        app_config.validate()?;
        Ok(app_config)
    }

    /// Parsed backend endpoint
    pub fn endpoint_url(&self) -> Result<url::Url, crate::error::AppError> {
        url::Url::parse(self.backend.endpoint.trim()).map_err(|e| {
            crate::error::AppError::Config(format!("backend.endpoint is not a valid URL: {}", e))
        })
    }

    pub(crate) fn validate(&self) -> Result<(), crate::error::AppError> {
        use crate::error::AppError;

        let endpoint = self.endpoint_url()?;
        match endpoint.scheme() {
            "https" => {}
            "http" => {
                let host = endpoint.host_str().unwrap_or_default();
                if !is_local_host(host) {
                    return Err(AppError::Config(
                        "backend.endpoint must use https for non-local hosts".to_string(),
                    ));
                }
                tracing::warn!(host = %host, "Using plain http backend endpoint for local development");
            }
            other => {
                return Err(AppError::Config(format!(
                    "backend.endpoint has unsupported scheme: {}",
                    other
                )));
            }
        }

        let required = [
            ("backend.project_id", &self.backend.project_id),
            ("database.database_id", &self.database.database_id),
            ("database.user_collection_id", &self.database.user_collection_id),
            ("database.post_collection_id", &self.database.post_collection_id),
            ("database.saves_collection_id", &self.database.saves_collection_id),
            ("storage.bucket_id", &self.storage.bucket_id),
        ];
        for (name, value) in required {
            if value.trim().is_empty() {
                return Err(AppError::Config(format!("{} must not be empty", name)));
            }
        }

        if self.cache.page_size == 0 {
            return Err(AppError::Config(
                "cache.page_size must be greater than 0".to_string(),
            ));
        }

        if self.storage.preview.quality > 100 {
            return Err(AppError::Config(
                "storage.preview.quality must be between 0 and 100".to_string(),
            ));
        }

        Ok(())
    }
}

fn is_local_host(host: &str) -> bool {
    let host = host
        .trim_start_matches('[')
        .trim_end_matches(']')
        .trim_end_matches('.')
        .to_ascii_lowercase();
    if host == "localhost" || host.ends_with(".localhost") {
        return true;
    }

    if let Ok(ip) = host.parse::<IpAddr>() {
        return ip.is_loopback() || ip.is_unspecified();
    }

    false
}

#[cfg(test)]
pub(crate) fn test_config() -> AppConfig {
    AppConfig {
        backend: BackendConfig {
            endpoint: "http://localhost/v1".to_string(),
            project_id: "test-project".to_string(),
            timeout_seconds: 30,
        },
        database: DatabaseConfig {
            database_id: "test-db".to_string(),
            user_collection_id: "users".to_string(),
            post_collection_id: "posts".to_string(),
            saves_collection_id: "saves".to_string(),
        },
        storage: StorageConfig {
            bucket_id: "media".to_string(),
            preview: PreviewConfig::default(),
        },
        cache: CacheConfig::default(),
        search: SearchConfig { debounce_ms: 500 },
        logging: LoggingConfig {
            level: "info".to_string(),
            format: "pretty".to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn validate_accepts_http_on_localhost() {
        let config = test_config();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn validate_rejects_http_for_remote_host() {
        let mut config = test_config();
        config.backend.endpoint = "http://cloud.appwrite.io/v1".to_string();

        let error = config
            .validate()
            .expect_err("remote endpoints must require https");
        assert!(matches!(
            error,
            crate::error::AppError::Config(message)
                if message.contains("must use https")
        ));
    }

    #[test]
    fn validate_rejects_empty_ids_and_zero_page_size() {
        let mut config = test_config();
        config.storage.bucket_id = "  ".to_string();
        let error = config.validate().unwrap_err();
        assert!(error.to_string().contains("storage.bucket_id"));

        let mut config = test_config();
        config.cache.page_size = 0;
        let error = config.validate().unwrap_err();
        assert!(error.to_string().contains("cache.page_size"));
    }

    #[test]
    fn load_from_file_applies_defaults() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
[backend]
endpoint = "https://baas.example.com/v1"
project_id = "snapgram"

[database]
database_id = "main"

[storage]
bucket_id = "media"
"#
        )
        .unwrap();

        let config = AppConfig::load_from(file.path()).unwrap();
        assert_eq!(config.backend.project_id, "snapgram");
        assert_eq!(config.database.post_collection_id, "posts");
        assert_eq!(config.cache.page_size, 9);
        assert_eq!(config.cache.recent_posts_limit, 20);
        assert_eq!(config.storage.preview, PreviewConfig::default());
        assert_eq!(config.search.debounce_ms, 500);
    }
}
