//! Shared HTTP client construction.

use std::time::Duration;

use crate::core::tts::{TTSError, TTSResult};

/// Builds the pooled client handed to every engine.
pub fn build_http_client(timeout_secs: u64, connect_timeout_secs: u64) -> TTSResult<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .connect_timeout(Duration::from_secs(connect_timeout_secs))
        .pool_max_idle_per_host(4)
        .pool_idle_timeout(Duration::from_secs(90))
        .build()
        .map_err(|e| TTSError::InvalidConfiguration(format!("Failed to create HTTP client: {e}")))
}
