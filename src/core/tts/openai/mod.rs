//! OpenAI TTS engine (`#type: "openai"`).
//!
//! # Supported Models
//!
//! - `tts-1` - Standard quality, lower latency
//! - `tts-1-hd` - High definition quality, higher latency
//! - `gpt-4o-mini-tts` - Accepts voice instructions
//!
//! # Supported Voices
//!
//! alloy, ash, ballad, coral, echo, fable, onyx, nova, sage, shimmer, verse
//!
//! # Rate
//!
//! `rate` is a literal speed percentage (100 = normal). This engine does not
//! follow the system rate, so `rate == 0` is out of range rather than a
//! sentinel.
//!
//! # Example
//!
//! ```rust,ignore
//! use tts_hub::core::tts::{BaseTTS, EngineContext, OpenAITTS, OpenAITtsSettings, OpenAIVoice};
//!
//! let settings = OpenAITtsSettings {
//!     voice: OpenAIVoice::Nova,
//!     ..Default::default()
//! };
//! let ctx = EngineContext::default().with_api_key("openai", "sk-...");
//! let tts = OpenAITTS::new(settings, &ctx);
//! let audio = tts.get_audio("Hello, world!").await?;
//! ```

mod config;
mod provider;

pub use config::{
    AudioOutputFormat, OPENAI_SAMPLE_RATE, OpenAITTSModel, OpenAITtsSettings, OpenAIVoice,
};
pub use provider::{OPENAI_DEFAULT_RATE, OPENAI_TTS_URL, OPENAI_TYPE, OpenAITTS};

use crate::core::tts::registry::EngineConstructor;

inventory::submit! {
    EngineConstructor::new(OPENAI_TYPE, "OpenAI", provider::create_openai_tts)
}
