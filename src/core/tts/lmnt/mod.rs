//! LMNT TTS engine (`#type: "lmnt"`).
//!
//! Low-latency speech synthesis over the LMNT HTTP bytes endpoint.
//!
//! # Rate
//!
//! `rate` is a speed percentage (25 to 200). The engine follows the system
//! rate: with `rate == 0` no speed is sent and the backend default applies.
//!
//! # Resume
//!
//! Only records with a fixed `seed` resume interrupted streams, by replaying
//! the request and skipping already delivered bytes.
//!
//! # Authentication
//!
//! API key in the `X-API-Key` header.

pub mod config;
pub mod provider;

pub use config::{LmntAudioFormat, LmntTtsSettings};
pub use provider::LmntTts;

use crate::core::tts::registry::EngineConstructor;

// =============================================================================
// API Constants
// =============================================================================

/// Record tag of this engine.
pub const LMNT_TYPE: &str = "lmnt";

/// LMNT speech bytes endpoint.
pub const LMNT_TTS_URL: &str = "https://api.lmnt.com/v1/ai/speech/bytes";

// =============================================================================
// Limits and Defaults
// =============================================================================

/// Maximum characters per request.
pub const MAX_TEXT_LENGTH: usize = 5000;

pub const DEFAULT_MODEL: &str = "blizzard";

/// Auto-detect.
pub const DEFAULT_LANGUAGE: &str = "auto";

pub const DEFAULT_SAMPLE_RATE: u32 = 24000;

pub const MIN_TOP_P: f32 = 0.0;
pub const MAX_TOP_P: f32 = 1.0;
pub const DEFAULT_TOP_P: f32 = 0.8;

pub const MIN_TEMPERATURE: f32 = 0.0;
pub const DEFAULT_TEMPERATURE: f32 = 1.0;

inventory::submit! {
    EngineConstructor::new(LMNT_TYPE, "LMNT", provider::create_lmnt_tts)
}
