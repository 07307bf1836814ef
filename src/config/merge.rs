//! Merging environment and YAML configuration.

use std::path::PathBuf;

use super::AppConfig;
use super::env::EnvConfig;
use super::yaml::YamlConfig;
use crate::core::tts::{DEFAULT_SYSTEM_RATE, RetryConfig};

/// Default location of the engine store.
pub const DEFAULT_STORE_PATH: &str = "tts-hub-engines.json";

/// Default streaming chunk size in bytes.
pub const DEFAULT_CHUNK_SIZE: usize = 4096;

pub const DEFAULT_HTTP_TIMEOUT_SECONDS: u64 = 60;
pub const DEFAULT_HTTP_CONNECT_TIMEOUT_SECONDS: u64 = 10;

/// Builds the final configuration. YAML values win over environment values,
/// which win over defaults.
pub fn merge_config(yaml: Option<YamlConfig>) -> Result<AppConfig, Box<dyn std::error::Error>> {
    let env = EnvConfig::load()?;
    let yaml = yaml.unwrap_or_default();

    let store = yaml.store.unwrap_or_default();
    let stream = yaml.stream.unwrap_or_default();
    let http = yaml.http.unwrap_or_default();
    let system = yaml.system.unwrap_or_default();
    let providers = yaml.providers.unwrap_or_default();

    let defaults = RetryConfig::default();
    let retry = RetryConfig {
        max_attempts: stream
            .max_attempts
            .or(env.max_attempts)
            .unwrap_or(defaults.max_attempts),
        initial_delay_ms: stream.initial_delay_ms.unwrap_or(defaults.initial_delay_ms),
        max_delay_ms: stream.max_delay_ms.unwrap_or(defaults.max_delay_ms),
        backoff_multiplier: stream
            .backoff_multiplier
            .unwrap_or(defaults.backoff_multiplier),
        jitter: stream.jitter.unwrap_or(defaults.jitter),
    };

    Ok(AppConfig {
        store_path: PathBuf::from(
            store
                .path
                .or(env.store_path)
                .unwrap_or_else(|| DEFAULT_STORE_PATH.to_string()),
        ),
        chunk_size: stream
            .chunk_size
            .or(env.chunk_size)
            .unwrap_or(DEFAULT_CHUNK_SIZE),
        retry,
        http_timeout_seconds: http
            .timeout_seconds
            .or(env.http_timeout_seconds)
            .unwrap_or(DEFAULT_HTTP_TIMEOUT_SECONDS),
        http_connect_timeout_seconds: http
            .connect_timeout_seconds
            .unwrap_or(DEFAULT_HTTP_CONNECT_TIMEOUT_SECONDS),
        system_rate: system
            .default_rate
            .or(env.system_rate)
            .unwrap_or(DEFAULT_SYSTEM_RATE),
        openai_api_key: providers.openai_api_key.or(env.openai_api_key),
        lmnt_api_key: providers.lmnt_api_key.or(env.lmnt_api_key),
    })
}
