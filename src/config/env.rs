//! Environment variable loading.
//!
//! Every variable is optional; defaults are applied during the merge.

use std::env;
use std::str::FromStr;

pub const ENV_STORE_PATH: &str = "TTS_HUB_STORE_PATH";
pub const ENV_CHUNK_SIZE: &str = "TTS_HUB_CHUNK_SIZE";
pub const ENV_MAX_ATTEMPTS: &str = "TTS_HUB_MAX_ATTEMPTS";
pub const ENV_SYSTEM_RATE: &str = "TTS_HUB_SYSTEM_RATE";
pub const ENV_HTTP_TIMEOUT: &str = "TTS_HUB_HTTP_TIMEOUT";
pub const ENV_OPENAI_API_KEY: &str = "OPENAI_API_KEY";
pub const ENV_LMNT_API_KEY: &str = "LMNT_API_KEY";

/// Values read from the environment.
#[derive(Debug, Clone, Default)]
pub struct EnvConfig {
    pub store_path: Option<String>,
    pub chunk_size: Option<usize>,
    pub max_attempts: Option<u32>,
    pub system_rate: Option<i32>,
    pub http_timeout_seconds: Option<u64>,
    pub openai_api_key: Option<String>,
    pub lmnt_api_key: Option<String>,
}

impl EnvConfig {
    pub fn load() -> Result<Self, Box<dyn std::error::Error>> {
        Ok(Self {
            store_path: string_var(ENV_STORE_PATH),
            chunk_size: parse_var(ENV_CHUNK_SIZE)?,
            max_attempts: parse_var(ENV_MAX_ATTEMPTS)?,
            system_rate: parse_var(ENV_SYSTEM_RATE)?,
            http_timeout_seconds: parse_var(ENV_HTTP_TIMEOUT)?,
            openai_api_key: string_var(ENV_OPENAI_API_KEY),
            lmnt_api_key: string_var(ENV_LMNT_API_KEY),
        })
    }
}

/// Non-empty value of `name`.
fn string_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn parse_var<T: FromStr>(name: &str) -> Result<Option<T>, Box<dyn std::error::Error>>
where
    T::Err: std::fmt::Display,
{
    match string_var(name) {
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|e| format!("Invalid value for {name}: {e}").into()),
        None => Ok(None),
    }
}
