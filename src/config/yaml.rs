use serde::Deserialize;
use std::path::PathBuf;

/// Complete YAML configuration structure
///
/// All fields are optional to allow partial configuration. Values present
/// here override environment variables.
///
/// # Example YAML structure
/// ```yaml
/// store:
///   path: "/var/lib/tts-hub/engines.json"
///
/// stream:
///   chunk_size: 4096
///   max_attempts: 3
///   initial_delay_ms: 500
///   max_delay_ms: 8000
///   backoff_multiplier: 2.0
///   jitter: true
///
/// http:
///   timeout_seconds: 60
///   connect_timeout_seconds: 10
///
/// system:
///   default_rate: 50
///
/// providers:
///   openai_api_key: "sk-..."
///   lmnt_api_key: "your-lmnt-key"
/// ```
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct YamlConfig {
    pub store: Option<StoreYaml>,
    pub stream: Option<StreamYaml>,
    pub http: Option<HttpYaml>,
    pub system: Option<SystemYaml>,
    pub providers: Option<ProvidersYaml>,
}

/// Engine store location from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct StoreYaml {
    pub path: Option<String>,
}

/// Streaming and retry settings from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct StreamYaml {
    /// 0 keeps backend framing
    pub chunk_size: Option<usize>,
    pub max_attempts: Option<u32>,
    pub initial_delay_ms: Option<u64>,
    pub max_delay_ms: Option<u64>,
    pub backoff_multiplier: Option<f32>,
    pub jitter: Option<bool>,
}

/// HTTP client settings from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct HttpYaml {
    pub timeout_seconds: Option<u64>,
    pub connect_timeout_seconds: Option<u64>,
}

/// Host settings from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct SystemYaml {
    /// Rate used by engines that follow the system rate
    pub default_rate: Option<i32>,
}

/// Shared provider API keys from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct ProvidersYaml {
    pub openai_api_key: Option<String>,
    pub lmnt_api_key: Option<String>,
}

impl YamlConfig {
    /// Load YAML configuration from a file
    pub fn from_file(path: &PathBuf) -> Result<Self, Box<dyn std::error::Error>> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read config file {}: {e}", path.display()))?;

        let config: YamlConfig = serde_yaml::from_str(&contents)
            .map_err(|e| format!("Failed to parse YAML config: {e}"))?;

        Ok(config)
    }
}
