//! LMNT engine settings.
//!
//! Everything except pitch, volume and rate lives here and is persisted as
//! the variant fields of an `lmnt` engine record.

use serde::{Deserialize, Serialize};

use super::{
    DEFAULT_LANGUAGE, DEFAULT_MODEL, DEFAULT_SAMPLE_RATE, DEFAULT_TEMPERATURE, DEFAULT_TOP_P,
    MAX_TOP_P, MIN_TEMPERATURE, MIN_TOP_P,
};
use crate::core::tts::base::{AudioEncoding, AudioFormat, TTSError, TTSResult};

// =============================================================================
// Audio Format
// =============================================================================

/// Output formats of the LMNT speech endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum LmntAudioFormat {
    /// 16-bit signed PCM, little-endian
    #[default]
    PcmS16le,
    /// 32-bit float PCM, little-endian
    PcmF32le,
    /// 8-bit G.711 µ-law
    Ulaw,
    /// 96kbps MP3
    Mp3,
    /// WebM container with Opus
    Webm,
    /// Not streamable, delivered after full generation
    Aac,
    /// Not streamable, delivered after full generation
    Wav,
}

impl LmntAudioFormat {
    #[inline]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Mp3 => "mp3",
            Self::PcmS16le => "pcm_s16le",
            Self::PcmF32le => "pcm_f32le",
            Self::Ulaw => "ulaw",
            Self::Webm => "webm",
            Self::Aac => "aac",
            Self::Wav => "wav",
        }
    }

    /// MIME type for the `Accept` header.
    #[inline]
    pub const fn content_type(&self) -> &'static str {
        match self {
            Self::Mp3 => "audio/mpeg",
            Self::PcmS16le | Self::PcmF32le => "audio/pcm",
            Self::Ulaw => "audio/basic",
            Self::Webm => "audio/webm",
            Self::Aac => "audio/aac",
            Self::Wav => "audio/wav",
        }
    }

    #[inline]
    pub const fn is_streamable(&self) -> bool {
        !matches!(self, Self::Aac | Self::Wav)
    }

    /// The audio format this output produces at `sample_rate`.
    pub const fn audio_format(&self, sample_rate: u32) -> AudioFormat {
        match self {
            Self::PcmS16le => AudioFormat::pcm16(sample_rate),
            Self::PcmF32le => AudioFormat::new(AudioEncoding::PcmF32, sample_rate, 1, 32),
            Self::Ulaw => AudioFormat::new(AudioEncoding::Mulaw, sample_rate, 1, 8),
            Self::Wav => AudioFormat::new(AudioEncoding::Wav, sample_rate, 1, 16),
            Self::Mp3 => AudioFormat::compressed(AudioEncoding::Mp3, sample_rate),
            Self::Webm => AudioFormat::compressed(AudioEncoding::Webm, sample_rate),
            Self::Aac => AudioFormat::compressed(AudioEncoding::Aac, sample_rate),
        }
    }
}

impl std::fmt::Display for LmntAudioFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Settings
// =============================================================================

fn default_voice() -> String {
    "lily".to_string()
}

fn default_model() -> String {
    DEFAULT_MODEL.to_string()
}

fn default_language() -> String {
    DEFAULT_LANGUAGE.to_string()
}

fn default_sample_rate() -> u32 {
    DEFAULT_SAMPLE_RATE
}

fn default_top_p() -> f32 {
    DEFAULT_TOP_P
}

fn default_temperature() -> f32 {
    DEFAULT_TEMPERATURE
}

/// Variant fields of an LMNT engine record.
#[derive(Clone, Serialize, Deserialize)]
pub struct LmntTtsSettings {
    /// Falls back to the shared LMNT key when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(default = "default_voice")]
    pub voice: String,
    #[serde(default = "default_model")]
    pub model: String,
    /// ISO 639-1 code or "auto"
    #[serde(default = "default_language")]
    pub language: String,
    #[serde(default)]
    pub output_format: LmntAudioFormat,
    /// 8000, 16000 or 24000
    #[serde(default = "default_sample_rate")]
    pub sample_rate: u32,
    /// Speech stability, 0 to 1
    #[serde(default = "default_top_p")]
    pub top_p: f32,
    /// Expressiveness, >= 0
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    /// Fixed seed makes output deterministic, which enables replay resume
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
}

impl Default for LmntTtsSettings {
    fn default() -> Self {
        Self {
            api_key: None,
            voice: default_voice(),
            model: default_model(),
            language: default_language(),
            output_format: LmntAudioFormat::default(),
            sample_rate: default_sample_rate(),
            top_p: default_top_p(),
            temperature: default_temperature(),
            seed: None,
            endpoint: None,
        }
    }
}

impl LmntTtsSettings {
    /// Checks the values the backend would reject.
    pub fn validate(&self) -> TTSResult<()> {
        if self.voice.is_empty() {
            return Err(TTSError::InvalidConfiguration(
                "LMNT voice must not be empty".to_string(),
            ));
        }
        if !(MIN_TOP_P..=MAX_TOP_P).contains(&self.top_p) {
            return Err(TTSError::InvalidConfiguration(format!(
                "top_p must be between {MIN_TOP_P} and {MAX_TOP_P}, got {}",
                self.top_p
            )));
        }
        if self.temperature < MIN_TEMPERATURE {
            return Err(TTSError::InvalidConfiguration(format!(
                "temperature must be >= {MIN_TEMPERATURE}, got {}",
                self.temperature
            )));
        }
        if !matches!(self.sample_rate, 8000 | 16000 | 24000) {
            return Err(TTSError::InvalidConfiguration(format!(
                "sample_rate must be 8000, 16000, or 24000, got {}",
                self.sample_rate
            )));
        }
        Ok(())
    }

    /// Output is reproducible only with a fixed seed.
    #[inline]
    pub fn is_deterministic(&self) -> bool {
        self.seed.is_some()
    }
}

impl std::fmt::Debug for LmntTtsSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LmntTtsSettings")
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("voice", &self.voice)
            .field("model", &self.model)
            .field("language", &self.language)
            .field("output_format", &self.output_format)
            .field("sample_rate", &self.sample_rate)
            .field("top_p", &self.top_p)
            .field("temperature", &self.temperature)
            .field("seed", &self.seed)
            .field("endpoint", &self.endpoint)
            .finish()
    }
}
