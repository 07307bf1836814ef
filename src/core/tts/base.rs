//! Base traits and types for TTS engines.
//!
//! This module defines the contract every engine variant implements:
//!
//! - [`AudioFormat`] / [`AudioEncoding`]: the negotiated output format
//! - [`TTSConfig`]: pitch, volume, rate and audio format of one engine
//! - [`BaseTTS`]: full-buffer and resumable streaming synthesis
//! - [`TTSError`]: the error kinds surfaced by every operation
//!
//! # Rate sentinel
//!
//! `rate == VALUE_FOLLOW_SYSTEM` only means "use the system default" when the
//! engine reports [`BaseTTS::is_rate_follow_system`]. For every other engine the
//! value is used verbatim.

use std::fmt;

use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::editor::{DescriptionEditor, EditDone};
use super::provider::ResumeMode;
use super::registry::EngineRecord;

/// Reserved rate value meaning "follow the system default".
pub const VALUE_FOLLOW_SYSTEM: i32 = 0;

/// Chunk size meaning "the backend decides the framing".
pub const BACKEND_CHUNKING: usize = 0;

// =============================================================================
// Error Types
// =============================================================================

/// Errors that can occur during TTS operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TTSError {
    /// Pitch, volume, rate or format outside what the engine accepts
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// Credentials missing or rejected by the backend
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    /// Transport failure; streaming sessions stay resumable
    #[error("Network error: {0}")]
    Network(String),

    /// Backend quota or rate limit exhausted
    #[error("Quota exceeded: {0}")]
    QuotaExceeded(String),

    /// Malformed request or response
    #[error("Backend protocol error: {0}")]
    Protocol(String),
}

impl TTSError {
    /// Returns true for errors after which a streaming session may resume.
    #[inline]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Network(_))
    }

    /// Short machine-readable name of the error kind.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidConfiguration(_) => "configuration",
            Self::AuthenticationFailed(_) => "authentication",
            Self::Network(_) => "network",
            Self::QuotaExceeded(_) => "quota",
            Self::Protocol(_) => "protocol",
        }
    }
}

impl From<reqwest::Error> for TTSError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            TTSError::Protocol(err.to_string())
        } else if err.is_builder() {
            TTSError::InvalidConfiguration(err.to_string())
        } else {
            TTSError::Network(err.to_string())
        }
    }
}

/// Result type for TTS operations.
pub type TTSResult<T> = Result<T, TTSError>;

// =============================================================================
// Audio Format
// =============================================================================

/// Audio encoding produced by a backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AudioEncoding {
    /// 16-bit signed little-endian PCM
    #[default]
    Pcm16,
    /// 32-bit float little-endian PCM
    PcmF32,
    /// 8-bit G.711 µ-law
    Mulaw,
    Mp3,
    Opus,
    Aac,
    Flac,
    Wav,
    Webm,
}

impl AudioEncoding {
    #[inline]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Pcm16 => "pcm16",
            Self::PcmF32 => "pcm_f32",
            Self::Mulaw => "mulaw",
            Self::Mp3 => "mp3",
            Self::Opus => "opus",
            Self::Aac => "aac",
            Self::Flac => "flac",
            Self::Wav => "wav",
            Self::Webm => "webm",
        }
    }

    /// Returns whether the encoding is raw, headerless sample data.
    #[inline]
    pub const fn is_pcm(&self) -> bool {
        matches!(self, Self::Pcm16 | Self::PcmF32 | Self::Mulaw)
    }

    /// Parse from a format string, with fallback to PCM.
    pub fn from_str_or_default(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "pcm" | "pcm16" | "linear16" | "pcm_s16le" => Self::Pcm16,
            "pcm_f32" | "pcm_f32le" | "float32" => Self::PcmF32,
            "mulaw" | "ulaw" => Self::Mulaw,
            "mp3" | "mpeg" => Self::Mp3,
            "opus" => Self::Opus,
            "aac" => Self::Aac,
            "flac" => Self::Flac,
            "wav" | "wave" => Self::Wav,
            "webm" => Self::Webm,
            _ => Self::default(),
        }
    }
}

impl fmt::Display for AudioEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Output format negotiated with a backend.
///
/// Immutable once constructed and compared by value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AudioFormat {
    pub encoding: AudioEncoding,
    pub sample_rate: u32,
    pub channels: u16,
    pub bits_per_sample: u16,
}

impl AudioFormat {
    pub const fn new(
        encoding: AudioEncoding,
        sample_rate: u32,
        channels: u16,
        bits_per_sample: u16,
    ) -> Self {
        Self {
            encoding,
            sample_rate,
            channels,
            bits_per_sample,
        }
    }

    /// Mono 16-bit PCM at the given sample rate.
    pub const fn pcm16(sample_rate: u32) -> Self {
        Self::new(AudioEncoding::Pcm16, sample_rate, 1, 16)
    }

    /// Mono compressed audio at the given sample rate.
    pub const fn compressed(encoding: AudioEncoding, sample_rate: u32) -> Self {
        Self::new(encoding, sample_rate, 1, 0)
    }

    #[inline]
    pub const fn is_pcm(&self) -> bool {
        self.encoding.is_pcm()
    }

    /// Bytes per second of audio, `None` for compressed encodings.
    pub fn bytes_per_second(&self) -> Option<u64> {
        if !self.is_pcm() {
            return None;
        }
        Some(self.sample_rate as u64 * self.channels as u64 * (self.bits_per_sample as u64 / 8))
    }
}

impl Default for AudioFormat {
    fn default() -> Self {
        Self::pcm16(24000)
    }
}

impl fmt::Display for AudioFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let layout = match self.channels {
            1 => "mono".to_string(),
            2 => "stereo".to_string(),
            n => format!("{n}ch"),
        };
        let rate = if self.sample_rate % 1000 == 0 {
            format!("{}kHz", self.sample_rate / 1000)
        } else {
            format!("{:.1}kHz", self.sample_rate as f64 / 1000.0)
        };
        if self.bits_per_sample > 0 {
            write!(
                f,
                "{} {} {}-bit {}",
                self.encoding, rate, self.bits_per_sample, layout
            )
        } else {
            write!(f, "{} {} {}", self.encoding, rate, layout)
        }
    }
}

// =============================================================================
// Engine Configuration
// =============================================================================

/// Per-engine synthesis settings.
///
/// Units of `pitch`, `volume` and `rate` are engine-defined. All three are
/// always present; the follow-system sentinel is a value of `rate`, not a
/// separate field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TTSConfig {
    #[serde(default)]
    pub audio_format: AudioFormat,
    #[serde(default)]
    pub pitch: i32,
    #[serde(default = "default_volume")]
    pub volume: i32,
    #[serde(default)]
    pub rate: i32,
}

fn default_volume() -> i32 {
    50
}

impl Default for TTSConfig {
    fn default() -> Self {
        Self {
            audio_format: AudioFormat::default(),
            pitch: 0,
            volume: default_volume(),
            rate: VALUE_FOLLOW_SYSTEM,
        }
    }
}

impl TTSConfig {
    /// Returns true when `rate` must be read as "system default".
    ///
    /// Only engines that honour the sentinel ever get `true` here.
    #[inline]
    pub fn rate_follows_system(&self, is_rate_follow_system: bool) -> bool {
        is_rate_follow_system && self.rate == VALUE_FOLLOW_SYSTEM
    }
}

/// Inclusive range of values an engine accepts for one parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParamRange {
    pub min: i32,
    pub max: i32,
}

impl ParamRange {
    pub const fn new(min: i32, max: i32) -> Self {
        Self { min, max }
    }

    #[inline]
    pub fn contains(&self, value: i32) -> bool {
        (self.min..=self.max).contains(&value)
    }

    /// Returns an error naming `param` when `value` is out of range.
    pub fn check(&self, param: &str, value: i32) -> TTSResult<()> {
        if self.contains(value) {
            Ok(())
        } else {
            Err(TTSError::InvalidConfiguration(format!(
                "{param} {value} out of range [{}, {}]",
                self.min, self.max
            )))
        }
    }
}

/// Parameter ranges accepted by an engine variant.
///
/// `None` means the engine ignores that parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProsodyRanges {
    pub pitch: Option<ParamRange>,
    pub volume: Option<ParamRange>,
    pub rate: ParamRange,
}

impl ProsodyRanges {
    /// Validates `config` against these ranges.
    ///
    /// The follow-system sentinel is accepted regardless of the rate range
    /// when the engine honours it.
    pub fn validate(&self, config: &TTSConfig, rate_follow_system: bool) -> TTSResult<()> {
        if let Some(pitch) = self.pitch {
            pitch.check("pitch", config.pitch)?;
        }
        if let Some(volume) = self.volume {
            volume.check("volume", config.volume)?;
        }
        if !config.rate_follows_system(rate_follow_system) {
            self.rate.check("rate", config.rate)?;
        }
        Ok(())
    }
}

/// Renders the rate part of an engine description.
pub fn describe_rate(config: &TTSConfig, is_rate_follow_system: bool) -> String {
    if config.rate_follows_system(is_rate_follow_system) {
        "follow system".to_string()
    } else {
        config.rate.to_string()
    }
}

// =============================================================================
// Streaming Sink
// =============================================================================

/// Receiver of streamed audio.
///
/// `Some(chunk)` carries audio in increasing offset order; `None` is the
/// terminal end-of-stream call and is delivered exactly once, only on success.
pub trait AudioSink: Send {
    fn on_data(&mut self, chunk: Option<Bytes>);
}

impl<F> AudioSink for F
where
    F: FnMut(Option<Bytes>) + Send,
{
    fn on_data(&mut self, chunk: Option<Bytes>) {
        self(chunk)
    }
}

// =============================================================================
// BaseTTS Trait
// =============================================================================

/// Uniform invocation surface over heterogeneous TTS backends.
///
/// Implementations are not shared between threads for streaming: the
/// breakpoint state lives in the instance, so `get_audio_stream` takes
/// `&mut self`.
#[async_trait]
pub trait BaseTTS: Send + Sync {
    /// Current synthesis settings.
    fn config(&self) -> &TTSConfig;

    /// Mutable access for the owner of this engine.
    fn config_mut(&mut self) -> &mut TTSConfig;

    /// Whether `rate == VALUE_FOLLOW_SYSTEM` means "system default" for this engine.
    fn is_rate_follow_system(&self) -> bool;

    /// Stable short identifier of the backend family, equal to the `#type` tag.
    fn get_type(&self) -> &'static str;

    /// Human-readable summary of the audio format.
    fn get_bottom_content(&self) -> String {
        self.config().audio_format.to_string()
    }

    /// Human-readable summary of pitch, volume and rate.
    fn get_description(&self) -> String;

    /// Ranges the engine accepts, handed to editors.
    fn prosody_ranges(&self) -> ProsodyRanges;

    /// How this engine continues an interrupted stream.
    fn resume_mode(&self) -> ResumeMode;

    /// Opens a variant-specific editor.
    ///
    /// `done` receives exactly one value: a modified copy of this engine as a
    /// record, or `None` for "no change".
    fn on_description_click(&self, editor: &dyn DescriptionEditor, done: EditDone);

    /// Synthesizes `speak_text` and returns the complete payload.
    ///
    /// Never returns partial or empty audio.
    async fn get_audio(&self, speak_text: &str) -> TTSResult<Bytes>;

    /// Streams `speak_text` to `on_data`, resuming from a recorded breakpoint
    /// when possible.
    ///
    /// With `chunk_size > 0` every chunk is exactly `chunk_size` bytes except
    /// the last. Returns `true` when this call continued a previous session.
    async fn get_audio_stream(
        &mut self,
        speak_text: &str,
        chunk_size: usize,
        on_data: &mut dyn AudioSink,
    ) -> TTSResult<bool>;

    /// Drops any interrupted session so the next stream starts fresh.
    fn reset_stream(&mut self);

    /// Persisted form of this engine.
    fn to_record(&self) -> TTSResult<EngineRecord>;

    /// Static information about the backend.
    fn get_engine_info(&self) -> serde_json::Value;
}

/// Boxed engine as restored from a record.
pub type BoxedTTS = Box<dyn BaseTTS>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_audio_format_display() {
        assert_eq!(AudioFormat::pcm16(24000).to_string(), "pcm16 24kHz 16-bit mono");
        assert_eq!(
            AudioFormat::compressed(AudioEncoding::Mp3, 22050).to_string(),
            "mp3 22.1kHz mono"
        );
        assert_eq!(
            AudioFormat::new(AudioEncoding::Pcm16, 48000, 2, 16).to_string(),
            "pcm16 48kHz 16-bit stereo"
        );
    }

    #[test]
    fn test_audio_format_value_equality() {
        assert_eq!(AudioFormat::pcm16(16000), AudioFormat::pcm16(16000));
        assert_ne!(AudioFormat::pcm16(16000), AudioFormat::pcm16(24000));
    }

    #[test]
    fn test_bytes_per_second() {
        assert_eq!(AudioFormat::pcm16(16000).bytes_per_second(), Some(32000));
        assert_eq!(
            AudioFormat::compressed(AudioEncoding::Opus, 48000).bytes_per_second(),
            None
        );
    }

    #[test]
    fn test_encoding_parsing() {
        assert_eq!(AudioEncoding::from_str_or_default("linear16"), AudioEncoding::Pcm16);
        assert_eq!(AudioEncoding::from_str_or_default("MP3"), AudioEncoding::Mp3);
        assert_eq!(AudioEncoding::from_str_or_default("ulaw"), AudioEncoding::Mulaw);
        assert_eq!(AudioEncoding::from_str_or_default("unknown"), AudioEncoding::Pcm16);
    }

    #[test]
    fn test_rate_sentinel_requires_follow_system() {
        let config = TTSConfig {
            rate: VALUE_FOLLOW_SYSTEM,
            ..Default::default()
        };
        assert!(config.rate_follows_system(true));
        assert!(!config.rate_follows_system(false));

        let config = TTSConfig {
            rate: 30,
            ..Default::default()
        };
        assert!(!config.rate_follows_system(true));
    }

    #[test]
    fn test_describe_rate() {
        let config = TTSConfig {
            rate: 0,
            ..Default::default()
        };
        assert_eq!(describe_rate(&config, true), "follow system");
        assert_eq!(describe_rate(&config, false), "0");
    }

    #[test]
    fn test_prosody_validation() {
        let ranges = ProsodyRanges {
            pitch: Some(ParamRange::new(0, 100)),
            volume: None,
            rate: ParamRange::new(25, 400),
        };

        let ok = TTSConfig {
            pitch: 50,
            volume: -5,
            rate: 100,
            ..Default::default()
        };
        assert!(ranges.validate(&ok, false).is_ok());

        let sentinel = TTSConfig {
            rate: 0,
            ..Default::default()
        };
        assert!(ranges.validate(&sentinel, true).is_ok());
        assert!(matches!(
            ranges.validate(&sentinel, false),
            Err(TTSError::InvalidConfiguration(_))
        ));

        let bad_pitch = TTSConfig {
            pitch: 101,
            rate: 100,
            ..Default::default()
        };
        assert!(ranges.validate(&bad_pitch, false).is_err());
    }

    #[test]
    fn test_error_transience() {
        assert!(TTSError::Network("reset".into()).is_transient());
        assert!(!TTSError::QuotaExceeded("limit".into()).is_transient());
        assert!(!TTSError::AuthenticationFailed("bad key".into()).is_transient());
        assert!(!TTSError::Protocol("garbage".into()).is_transient());
        assert_eq!(TTSError::Protocol("x".into()).kind(), "protocol");
    }

    #[test]
    fn test_closure_sink() {
        let mut seen = Vec::new();
        {
            let mut sink = |chunk: Option<Bytes>| seen.push(chunk.map(|b| b.len()));
            let sink: &mut dyn AudioSink = &mut sink;
            sink.on_data(Some(Bytes::from_static(b"abc")));
            sink.on_data(None);
        }
        assert_eq!(seen, vec![Some(3), None]);
    }
}
