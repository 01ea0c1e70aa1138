//! Snapgram binary entry point

use snapgram::{AppState, config, error::AppError};

/// Application entry point
///
/// # Setup
/// 1. Load configuration from file and environment
/// 2. Initialize tracing/logging
/// 3. Initialize metrics
/// 4. Initialize AppState
/// 5. Load the session user and the home feed
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 1. Load configuration
    let config = config::AppConfig::load()?;

    // 2. Initialize tracing/logging
    snapgram::init_tracing(&config.logging);
    tracing::info!(
        endpoint = %config.backend.endpoint,
        database = %config.database.database_id,
        "Starting Snapgram..."
    );

    // 3. Initialize metrics
    snapgram::metrics::init_metrics();

    // 4. Initialize application state
    let state = AppState::new(config)?;

    // 5. Session user and home feed
    match state.auth.get_current_user().await {
        Ok(current) => tracing::info!(
            user_id = %current.user.id,
            username = current.user.handle(),
            saves = current.saves.len(),
            "Signed in"
        ),
        Err(AppError::Unauthorized) => tracing::info!("No active session"),
        Err(error) => tracing::warn!(%error, "Failed to load current user"),
    }

    let recent = state.posts.get_recent_posts().await?;
    tracing::info!(count = recent.len(), "Recent posts loaded");

    match snapgram::metrics::encode_metrics() {
        Ok(text) => tracing::debug!(metrics = %text, "Metrics snapshot"),
        Err(error) => tracing::warn!(%error, "Failed to encode metrics"),
    }

    Ok(())
}
