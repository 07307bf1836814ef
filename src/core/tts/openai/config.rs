//! Configuration types for the OpenAI engine.
//!
//! - Model selection (tts-1, tts-1-hd, gpt-4o-mini-tts)
//! - Voice selection
//! - Response format and the audio format it implies
//! - The persisted settings of an OpenAI engine record

use serde::{Deserialize, Serialize};

use crate::core::tts::base::{AudioEncoding, AudioFormat};

/// Sample rate of every OpenAI speech response.
pub const OPENAI_SAMPLE_RATE: u32 = 24000;

// =============================================================================
// Models
// =============================================================================

/// Supported OpenAI speech models.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum OpenAITTSModel {
    /// Standard quality, lower latency
    #[default]
    #[serde(rename = "tts-1")]
    Tts1,
    /// High definition, higher latency
    #[serde(rename = "tts-1-hd")]
    Tts1Hd,
    /// Accepts free-form voice instructions
    #[serde(rename = "gpt-4o-mini-tts")]
    Gpt4oMiniTts,
}

impl OpenAITTSModel {
    #[inline]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Tts1 => "tts-1",
            Self::Tts1Hd => "tts-1-hd",
            Self::Gpt4oMiniTts => "gpt-4o-mini-tts",
        }
    }

    /// Whether the model honours the `instructions` field.
    #[inline]
    pub fn supports_instructions(&self) -> bool {
        matches!(self, Self::Gpt4oMiniTts)
    }
}

impl std::fmt::Display for OpenAITTSModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Voices
// =============================================================================

/// Voices offered by the speech endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OpenAIVoice {
    #[default]
    Alloy,
    Ash,
    Ballad,
    Coral,
    Echo,
    Fable,
    Onyx,
    Nova,
    Sage,
    Shimmer,
    Verse,
}

impl OpenAIVoice {
    #[inline]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Alloy => "alloy",
            Self::Ash => "ash",
            Self::Ballad => "ballad",
            Self::Coral => "coral",
            Self::Echo => "echo",
            Self::Fable => "fable",
            Self::Onyx => "onyx",
            Self::Nova => "nova",
            Self::Sage => "sage",
            Self::Shimmer => "shimmer",
            Self::Verse => "verse",
        }
    }

    pub fn all() -> &'static [OpenAIVoice] {
        &[
            Self::Alloy,
            Self::Ash,
            Self::Ballad,
            Self::Coral,
            Self::Echo,
            Self::Fable,
            Self::Onyx,
            Self::Nova,
            Self::Sage,
            Self::Shimmer,
            Self::Verse,
        ]
    }
}

impl std::fmt::Display for OpenAIVoice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Response Format
// =============================================================================

/// `response_format` values of the speech endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AudioOutputFormat {
    Mp3,
    Opus,
    Aac,
    Flac,
    Wav,
    /// 24kHz 16-bit mono little-endian
    #[default]
    Pcm,
}

impl AudioOutputFormat {
    #[inline]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Mp3 => "mp3",
            Self::Opus => "opus",
            Self::Aac => "aac",
            Self::Flac => "flac",
            Self::Wav => "wav",
            Self::Pcm => "pcm",
        }
    }

    /// The audio format the endpoint produces for this response format.
    pub fn audio_format(&self) -> AudioFormat {
        match self {
            Self::Pcm => AudioFormat::pcm16(OPENAI_SAMPLE_RATE),
            Self::Wav => AudioFormat::new(AudioEncoding::Wav, OPENAI_SAMPLE_RATE, 1, 16),
            Self::Mp3 => AudioFormat::compressed(AudioEncoding::Mp3, OPENAI_SAMPLE_RATE),
            Self::Opus => AudioFormat::compressed(AudioEncoding::Opus, OPENAI_SAMPLE_RATE),
            Self::Aac => AudioFormat::compressed(AudioEncoding::Aac, OPENAI_SAMPLE_RATE),
            Self::Flac => AudioFormat::compressed(AudioEncoding::Flac, OPENAI_SAMPLE_RATE),
        }
    }
}

impl std::fmt::Display for AudioOutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Settings
// =============================================================================

/// Variant fields of an OpenAI engine record.
#[derive(Clone, Default, Serialize, Deserialize)]
pub struct OpenAITtsSettings {
    /// Falls back to the shared OpenAI key when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(default)]
    pub model: OpenAITTSModel,
    #[serde(default)]
    pub voice: OpenAIVoice,
    #[serde(default)]
    pub response_format: AudioOutputFormat,
    /// Voice instructions, sent only to models that support them
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instructions: Option<String>,
    /// Overrides the public endpoint (proxies, compatible servers)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
}

impl std::fmt::Debug for OpenAITtsSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAITtsSettings")
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("model", &self.model)
            .field("voice", &self.voice)
            .field("response_format", &self.response_format)
            .field("instructions", &self.instructions)
            .field("endpoint", &self.endpoint)
            .finish()
    }
}
