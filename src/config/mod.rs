//! Configuration module for tts-hub
//!
//! Configuration comes from `.env` files, environment variables and an
//! optional YAML file. Priority: YAML > ENV vars > .env values > defaults.
//!
//! # Modules
//! - `yaml`: YAML configuration file loading
//! - `env`: Environment variable loading
//! - `merge`: Merging YAML and environment configurations
//! - `store`: Persisted engine list
//!
//! # Example
//! ```rust,no_run
//! use tts_hub::config::AppConfig;
//! use std::path::PathBuf;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! // Load from environment variables only
//! let config = AppConfig::from_env()?;
//!
//! // Load from YAML file with environment variable base
//! let config = AppConfig::from_file(&PathBuf::from("config.yaml"))?;
//! let ctx = config.engine_context()?;
//! # Ok(())
//! # }
//! ```

use std::path::PathBuf;

mod env;
mod merge;
pub mod store;
mod yaml;

pub use env::{
    ENV_CHUNK_SIZE, ENV_HTTP_TIMEOUT, ENV_LMNT_API_KEY, ENV_MAX_ATTEMPTS, ENV_OPENAI_API_KEY,
    ENV_STORE_PATH, ENV_SYSTEM_RATE,
};
pub use merge::{DEFAULT_CHUNK_SIZE, DEFAULT_STORE_PATH};
pub use store::{EngineStore, StoreError, StoredEngine};

use crate::core::tts::{EngineContext, LMNT_TYPE, OPENAI_TYPE, RetryConfig, TTSResult};
use crate::utils::build_http_client;

/// Application configuration
#[derive(Clone)]
pub struct AppConfig {
    /// JSON file holding the engine list
    pub store_path: PathBuf,
    /// Streaming chunk size in bytes, 0 keeps backend framing
    pub chunk_size: usize,
    pub retry: RetryConfig,
    pub http_timeout_seconds: u64,
    pub http_connect_timeout_seconds: u64,
    /// Rate used for engines that follow the system rate
    pub system_rate: i32,
    pub openai_api_key: Option<String>,
    pub lmnt_api_key: Option<String>,
}

/// Zeroize provider keys when the configuration is dropped.
impl Drop for AppConfig {
    fn drop(&mut self) {
        use zeroize::Zeroize;

        if let Some(ref mut key) = self.openai_api_key {
            key.zeroize();
        }
        if let Some(ref mut key) = self.lmnt_api_key {
            key.zeroize();
        }
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("store_path", &self.store_path)
            .field("chunk_size", &self.chunk_size)
            .field("retry", &self.retry)
            .field("http_timeout_seconds", &self.http_timeout_seconds)
            .field(
                "http_connect_timeout_seconds",
                &self.http_connect_timeout_seconds,
            )
            .field("system_rate", &self.system_rate)
            .field("openai_api_key", &self.openai_api_key.as_ref().map(|_| "<redacted>"))
            .field("lmnt_api_key", &self.lmnt_api_key.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl AppConfig {
    /// Load configuration from environment variables and defaults.
    ///
    /// The `.env` file is loaded by the binary before this is called.
    pub fn from_env() -> Result<Self, Box<dyn std::error::Error>> {
        let config = merge::merge_config(None)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a YAML file with environment variable base.
    ///
    /// Priority order (highest to lowest):
    /// 1. YAML file values
    /// 2. Environment variables (actual ENV vars override .env values)
    /// 3. .env file values
    /// 4. Default values
    pub fn from_file(path: &PathBuf) -> Result<Self, Box<dyn std::error::Error>> {
        let yaml_config = yaml::YamlConfig::from_file(path)?;
        let config = merge::merge_config(Some(yaml_config))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), String> {
        if !(1..=100).contains(&self.system_rate) {
            return Err(format!(
                "system default_rate must be between 1 and 100, got {}",
                self.system_rate
            ));
        }
        if self.retry.backoff_multiplier < 1.0 {
            return Err(format!(
                "backoff_multiplier must be >= 1.0, got {}",
                self.retry.backoff_multiplier
            ));
        }
        if self.retry.initial_delay_ms > self.retry.max_delay_ms {
            return Err("initial_delay_ms must not exceed max_delay_ms".to_string());
        }
        if self.http_timeout_seconds == 0 {
            return Err("http timeout_seconds must be greater than 0".to_string());
        }
        Ok(())
    }

    /// Shared engine resources built from this configuration.
    pub fn engine_context(&self) -> TTSResult<EngineContext> {
        let http = build_http_client(
            self.http_timeout_seconds,
            self.http_connect_timeout_seconds,
        )?;
        let mut ctx = EngineContext::new(http).with_system_rate(self.system_rate);
        if let Some(key) = self.openai_api_key.as_deref() {
            ctx = ctx.with_api_key(OPENAI_TYPE, key);
        }
        if let Some(key) = self.lmnt_api_key.as_deref() {
            ctx = ctx.with_api_key(LMNT_TYPE, key);
        }
        Ok(ctx)
    }

    /// Opens the engine store at `store_path`.
    pub fn engine_store(&self) -> EngineStore {
        EngineStore::new(self.store_path.clone())
    }
}
