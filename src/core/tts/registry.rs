//! Engine registry and persisted engine records.
//!
//! Engine variants register themselves at compile time with
//! `inventory::submit!`, keyed by their `#type` tag. Restoring an engine from
//! a record only needs the tag, so a heterogeneous engine list can be stored
//! and loaded without any code listing every variant.
//!
//! # Registering a variant
//!
//! ```ignore
//! inventory::submit! {
//!     EngineConstructor::new("http", "HTTP endpoint", create_http_tts)
//! }
//! ```

use std::collections::BTreeMap;
use std::sync::OnceLock;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;
use zeroize::Zeroizing;

use super::base::{BoxedTTS, TTSConfig, TTSError, TTSResult};

// =============================================================================
// Engine Record
// =============================================================================

/// Persisted form of one engine.
///
/// ```json
/// {"#type": "openai", "config": {"pitch": 0, "volume": 50, "rate": 100}, "voice": "nova"}
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineRecord {
    /// Variant discriminator
    #[serde(rename = "#type")]
    pub type_tag: String,
    #[serde(default)]
    pub config: TTSConfig,
    /// Variant-specific fields
    #[serde(flatten)]
    pub settings: Map<String, Value>,
}

impl EngineRecord {
    /// Builds a record from a variant's settings struct.
    pub fn from_settings<S: Serialize>(
        type_tag: &str,
        config: &TTSConfig,
        settings: &S,
    ) -> TTSResult<Self> {
        let settings = match serde_json::to_value(settings) {
            Ok(Value::Object(map)) => map,
            Ok(other) => {
                return Err(TTSError::InvalidConfiguration(format!(
                    "{type_tag} settings must serialize to an object, got {other}"
                )));
            }
            Err(e) => return Err(TTSError::InvalidConfiguration(e.to_string())),
        };
        Ok(Self {
            type_tag: type_tag.to_string(),
            config: config.clone(),
            settings,
        })
    }

    /// Decodes the variant-specific fields.
    pub fn settings<S: DeserializeOwned>(&self) -> TTSResult<S> {
        serde_json::from_value(Value::Object(self.settings.clone())).map_err(|e| {
            TTSError::InvalidConfiguration(format!("invalid {} record: {e}", self.type_tag))
        })
    }
}

// =============================================================================
// Engine Context
// =============================================================================

/// Immutable resources shared by all engines built from one configuration.
#[derive(Clone)]
pub struct EngineContext {
    /// Pooled HTTP client
    pub http: reqwest::Client,
    /// Rate substituted for the follow-system sentinel by engines that translate it
    pub system_rate: i32,
    /// Fallback API keys by engine type, used when a record carries none.
    /// Wiped from memory when the context is dropped.
    pub api_keys: BTreeMap<String, Zeroizing<String>>,
}

impl EngineContext {
    pub fn new(http: reqwest::Client) -> Self {
        Self {
            http,
            system_rate: DEFAULT_SYSTEM_RATE,
            api_keys: BTreeMap::new(),
        }
    }

    pub fn with_system_rate(mut self, rate: i32) -> Self {
        self.system_rate = rate;
        self
    }

    pub fn with_api_key(mut self, engine_type: &str, key: impl Into<String>) -> Self {
        self.api_keys
            .insert(engine_type.to_string(), Zeroizing::new(key.into()));
        self
    }

    /// Picks the record's own key, falling back to the shared one.
    pub fn resolve_api_key(&self, engine_type: &str, own: Option<&str>) -> Option<String> {
        own.filter(|k| !k.is_empty())
            .map(str::to_string)
            .or_else(|| self.api_keys.get(engine_type).map(|k| k.as_str().to_string()))
    }
}

impl Default for EngineContext {
    fn default() -> Self {
        Self::new(reqwest::Client::new())
    }
}

impl std::fmt::Debug for EngineContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineContext")
            .field("system_rate", &self.system_rate)
            .field("api_keys", &self.api_keys.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Default rate used for "follow system" when nothing else is configured.
pub const DEFAULT_SYSTEM_RATE: i32 = 50;

// =============================================================================
// Constructors
// =============================================================================

/// Factory function pointer for one engine variant.
pub type EngineFactoryPtr = fn(&EngineRecord, &EngineContext) -> TTSResult<BoxedTTS>;

/// Compile-time registration entry of an engine variant.
pub struct EngineConstructor {
    pub type_tag: &'static str,
    pub display_name: &'static str,
    pub create: EngineFactoryPtr,
}

impl EngineConstructor {
    pub const fn new(
        type_tag: &'static str,
        display_name: &'static str,
        create: EngineFactoryPtr,
    ) -> Self {
        Self {
            type_tag,
            display_name,
            create,
        }
    }
}

inventory::collect!(EngineConstructor);

static CONSTRUCTORS: OnceLock<BTreeMap<&'static str, &'static EngineConstructor>> =
    OnceLock::new();

fn constructors() -> &'static BTreeMap<&'static str, &'static EngineConstructor> {
    CONSTRUCTORS.get_or_init(|| {
        let mut map = BTreeMap::new();
        for constructor in inventory::iter::<EngineConstructor> {
            debug!(engine = constructor.type_tag, "Registered TTS engine");
            map.insert(constructor.type_tag, constructor);
        }
        map
    })
}

/// Restores an engine from its record.
pub fn create_tts_engine(record: &EngineRecord, ctx: &EngineContext) -> TTSResult<BoxedTTS> {
    match constructors().get(record.type_tag.as_str()) {
        Some(constructor) => (constructor.create)(record, ctx),
        None => Err(TTSError::InvalidConfiguration(format!(
            "Unsupported TTS engine type: {}. Supported types: {}",
            record.type_tag,
            get_supported_engine_types().join(", ")
        ))),
    }
}

/// Registered engine type tags, sorted.
pub fn get_supported_engine_types() -> Vec<&'static str> {
    constructors().keys().copied().collect()
}

/// Registered engine types with their display names.
pub fn get_engine_display_names() -> Vec<(&'static str, &'static str)> {
    constructors()
        .values()
        .map(|c| (c.type_tag, c.display_name))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct Sample {
        voice: String,
        #[serde(default)]
        seed: Option<u64>,
    }

    #[test]
    fn test_record_json_shape() {
        let record = EngineRecord::from_settings(
            "sample",
            &TTSConfig::default(),
            &Sample {
                voice: "lily".into(),
                seed: Some(7),
            },
        )
        .unwrap();

        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["#type"], "sample");
        assert_eq!(json["voice"], "lily");
        assert_eq!(json["seed"], 7);
        assert_eq!(json["config"]["volume"], 50);

        let back: EngineRecord = serde_json::from_value(json).unwrap();
        assert_eq!(back, record);
        let settings: Sample = back.settings().unwrap();
        assert_eq!(settings.voice, "lily");
    }

    #[test]
    fn test_record_settings_error() {
        let record: EngineRecord =
            serde_json::from_str(r##"{"#type": "sample", "seed": "nope"}"##).unwrap();
        let err = record.settings::<Sample>().unwrap_err();
        assert!(matches!(err, TTSError::InvalidConfiguration(_)));
    }

    #[test]
    fn test_unknown_type_rejected() {
        let record: EngineRecord = serde_json::from_str(r##"{"#type": "carrier-pigeon"}"##).unwrap();
        let Err(err) = create_tts_engine(&record, &EngineContext::default()) else {
            panic!("Expected unknown engine type to be rejected");
        };
        match err {
            TTSError::InvalidConfiguration(msg) => {
                assert!(msg.contains("carrier-pigeon"));
                assert!(msg.contains("http"));
            }
            other => panic!("Expected InvalidConfiguration error, got: {other:?}"),
        }
    }

    #[test]
    fn test_builtin_types_registered() {
        let types = get_supported_engine_types();
        assert!(types.contains(&"http"));
        assert!(types.contains(&"openai"));
        assert!(types.contains(&"lmnt"));
    }

    #[test]
    fn test_api_key_resolution() {
        let ctx = EngineContext::default().with_api_key("openai", "shared");
        assert_eq!(
            ctx.resolve_api_key("openai", Some("own")).as_deref(),
            Some("own")
        );
        assert_eq!(ctx.resolve_api_key("openai", Some("")).as_deref(), Some("shared"));
        assert_eq!(ctx.resolve_api_key("openai", None).as_deref(), Some("shared"));
        assert_eq!(ctx.resolve_api_key("lmnt", None), None);
    }

    #[test]
    fn test_api_keys_are_wiped_and_hidden() {
        let ctx = EngineContext::default().with_api_key("lmnt", "secret-key");
        let stored: &Zeroizing<String> = &ctx.api_keys["lmnt"];
        assert_eq!(stored.as_str(), "secret-key");

        let debug = format!("{ctx:?}");
        assert!(debug.contains("lmnt"));
        assert!(!debug.contains("secret-key"));
    }
}
