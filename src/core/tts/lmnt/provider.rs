//! LMNT engine implementation.
//!
//! Synthesis goes through the HTTP bytes endpoint. With a fixed `seed` the
//! backend output is deterministic, so an interrupted stream is continued by
//! replaying the request and skipping what was already delivered.

use async_trait::async_trait;
use bytes::Bytes;
use serde_json::json;
use tracing::debug;
use zeroize::Zeroize;

use super::config::LmntTtsSettings;
use super::{LMNT_TTS_URL, LMNT_TYPE, MAX_TEXT_LENGTH};
use crate::core::tts::base::{
    AudioSink, BaseTTS, ParamRange, ProsodyRanges, TTSConfig, TTSError, TTSResult,
    describe_rate,
};
use crate::core::tts::editor::{DescriptionEditor, EditDone, launch_editor};
use crate::core::tts::provider::{ResumeMode, TTSProvider, TTSRequestBuilder};
use crate::core::tts::registry::{EngineContext, EngineRecord};
use crate::core::tts::session::SessionKey;

/// Speed range in percent (0.25x to 2.0x).
const RATE_RANGE: ParamRange = ParamRange::new(25, 200);

// =============================================================================
// Request Builder
// =============================================================================

struct LmntRequestBuilder<'a> {
    settings: &'a LmntTtsSettings,
    api_key: &'a str,
    /// `None` leaves the backend default (1.0) in place
    speed: Option<f32>,
}

impl<'a> LmntRequestBuilder<'a> {
    fn prepare(
        config: &TTSConfig,
        settings: &'a LmntTtsSettings,
        api_key: Option<&'a str>,
        text: &str,
    ) -> TTSResult<Self> {
        settings.validate()?;
        let speed = if config.rate_follows_system(true) {
            None
        } else {
            RATE_RANGE.check("rate", config.rate)?;
            Some(config.rate as f32 / 100.0)
        };
        if text.chars().count() > MAX_TEXT_LENGTH {
            return Err(TTSError::InvalidConfiguration(format!(
                "text exceeds {MAX_TEXT_LENGTH} characters"
            )));
        }
        let api_key = api_key.ok_or_else(|| {
            TTSError::AuthenticationFailed("no LMNT API key configured".to_string())
        })?;
        Ok(Self {
            settings,
            api_key,
            speed,
        })
    }
}

impl TTSRequestBuilder for LmntRequestBuilder<'_> {
    fn build_http_request(
        &self,
        client: &reqwest::Client,
        text: &str,
    ) -> TTSResult<reqwest::RequestBuilder> {
        let settings = self.settings;
        let mut body = json!({
            "voice": settings.voice,
            "text": text,
            "model": settings.model,
            "language": settings.language,
            "format": settings.output_format.as_str(),
            "sample_rate": settings.sample_rate,
            "top_p": settings.top_p,
            "temperature": settings.temperature,
        });
        if let Some(speed) = self.speed {
            body["speed"] = json!(speed);
        }
        if let Some(seed) = settings.seed {
            body["seed"] = json!(seed);
        }

        let url = settings.endpoint.as_deref().unwrap_or(LMNT_TTS_URL);
        Ok(client
            .post(url)
            .header("X-API-Key", self.api_key)
            .header("Accept", settings.output_format.content_type())
            .json(&body))
    }

    fn backend_name(&self) -> &'static str {
        LMNT_TYPE
    }
}

fn settings_fingerprint(settings: &LmntTtsSettings) -> String {
    format!(
        "{}|{}|{}|{}|{}|{}|{}|{:?}|{}",
        settings.voice,
        settings.model,
        settings.language,
        settings.output_format,
        settings.sample_rate,
        settings.top_p,
        settings.temperature,
        settings.seed,
        settings.endpoint.as_deref().unwrap_or(LMNT_TTS_URL)
    )
}

// =============================================================================
// LMNT Engine
// =============================================================================

/// Engine backed by the LMNT speech API.
pub struct LmntTts {
    config: TTSConfig,
    settings: LmntTtsSettings,
    api_key: Option<String>,
    provider: TTSProvider,
}

impl LmntTts {
    /// Creates an engine that follows the system rate.
    pub fn new(settings: LmntTtsSettings, ctx: &EngineContext) -> TTSResult<Self> {
        Self::with_config(TTSConfig::default(), settings, ctx)
    }

    pub fn with_config(
        mut config: TTSConfig,
        settings: LmntTtsSettings,
        ctx: &EngineContext,
    ) -> TTSResult<Self> {
        settings.validate()?;
        config.audio_format = settings.output_format.audio_format(settings.sample_rate);
        let api_key = ctx.resolve_api_key(LMNT_TYPE, settings.api_key.as_deref());
        debug!(
            voice = %settings.voice,
            deterministic = settings.is_deterministic(),
            "Created LMNT engine"
        );
        Ok(Self {
            config,
            settings,
            api_key,
            provider: TTSProvider::new(ctx.http.clone()),
        })
    }

    pub fn settings(&self) -> &LmntTtsSettings {
        &self.settings
    }
}

impl Drop for LmntTts {
    fn drop(&mut self) {
        if let Some(key) = self.api_key.as_mut() {
            key.zeroize();
        }
        if let Some(key) = self.settings.api_key.as_mut() {
            key.zeroize();
        }
    }
}

#[async_trait]
impl BaseTTS for LmntTts {
    fn config(&self) -> &TTSConfig {
        &self.config
    }

    fn config_mut(&mut self) -> &mut TTSConfig {
        &mut self.config
    }

    fn is_rate_follow_system(&self) -> bool {
        true
    }

    fn get_type(&self) -> &'static str {
        LMNT_TYPE
    }

    fn get_description(&self) -> String {
        format!(
            "Rate: {} | Voice: {}",
            describe_rate(&self.config, true),
            self.settings.voice
        )
    }

    fn prosody_ranges(&self) -> ProsodyRanges {
        ProsodyRanges {
            pitch: None,
            volume: None,
            rate: RATE_RANGE,
        }
    }

    fn resume_mode(&self) -> ResumeMode {
        if self.settings.is_deterministic() {
            ResumeMode::Replay
        } else {
            ResumeMode::None
        }
    }

    fn on_description_click(&self, editor: &dyn DescriptionEditor, done: EditDone) {
        launch_editor(self, editor, done);
    }

    async fn get_audio(&self, speak_text: &str) -> TTSResult<Bytes> {
        let builder = LmntRequestBuilder::prepare(
            &self.config,
            &self.settings,
            self.api_key.as_deref(),
            speak_text,
        )?;
        self.provider.generic_get_audio(&builder, speak_text).await
    }

    async fn get_audio_stream(
        &mut self,
        speak_text: &str,
        chunk_size: usize,
        on_data: &mut dyn AudioSink,
    ) -> TTSResult<bool> {
        let resume = self.resume_mode();
        let builder = LmntRequestBuilder::prepare(
            &self.config,
            &self.settings,
            self.api_key.as_deref(),
            speak_text,
        )?;
        let key = SessionKey::compute(
            LMNT_TYPE,
            &settings_fingerprint(&self.settings),
            &self.config,
            speak_text,
        );
        self.provider
            .generic_get_audio_stream(&builder, key, resume, speak_text, chunk_size, on_data)
            .await
    }

    fn reset_stream(&mut self) {
        self.provider.reset_session();
    }

    fn to_record(&self) -> TTSResult<EngineRecord> {
        EngineRecord::from_settings(LMNT_TYPE, &self.config, &self.settings)
    }

    fn get_engine_info(&self) -> serde_json::Value {
        json!({
            "provider": "lmnt",
            "version": "1.0.0",
            "api_type": "HTTP Streaming",
            "endpoint": self.settings.endpoint.as_deref().unwrap_or(LMNT_TTS_URL),
            "supported_formats": ["pcm_s16le", "pcm_f32le", "ulaw", "mp3", "webm", "aac", "wav"],
            "supported_sample_rates": [8000, 16000, 24000],
            "rate_range_percent": [RATE_RANGE.min, RATE_RANGE.max],
            "max_text_length": MAX_TEXT_LENGTH,
            "resume": self.resume_mode().as_str(),
            "documentation": "https://docs.lmnt.com/api-reference/speech/synthesize-speech-bytes",
        })
    }
}

pub(super) fn create_lmnt_tts(
    record: &EngineRecord,
    ctx: &EngineContext,
) -> TTSResult<Box<dyn BaseTTS>> {
    let settings: LmntTtsSettings = record.settings()?;
    Ok(Box::new(LmntTts::with_config(
        record.config.clone(),
        settings,
        ctx,
    )?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::tts::base::VALUE_FOLLOW_SYSTEM;

    fn body_of(builder: &LmntRequestBuilder<'_>) -> serde_json::Value {
        let request = builder
            .build_http_request(&reqwest::Client::new(), "Hello")
            .unwrap()
            .build()
            .unwrap();
        assert_eq!(request.headers().get("X-API-Key").unwrap(), "key");
        let bytes = request.body().and_then(|b| b.as_bytes()).unwrap();
        serde_json::from_slice(bytes).unwrap()
    }

    #[test]
    fn test_follow_system_omits_speed() {
        let settings = LmntTtsSettings::default();
        let config = TTSConfig {
            rate: VALUE_FOLLOW_SYSTEM,
            ..Default::default()
        };
        let builder = LmntRequestBuilder::prepare(&config, &settings, Some("key"), "Hello").unwrap();
        let body = body_of(&builder);
        assert!(body.get("speed").is_none());
        assert_eq!(body["voice"], "lily");
        assert_eq!(body["format"], "pcm_s16le");
        assert_eq!(body["sample_rate"], 24000);
    }

    #[test]
    fn test_explicit_rate_sets_speed() {
        let settings = LmntTtsSettings {
            seed: Some(42),
            ..Default::default()
        };
        let config = TTSConfig {
            rate: 150,
            ..Default::default()
        };
        let builder = LmntRequestBuilder::prepare(&config, &settings, Some("key"), "Hello").unwrap();
        let body = body_of(&builder);
        assert_eq!(body["speed"], 1.5);
        assert_eq!(body["seed"], 42);
    }

    #[test]
    fn test_rate_out_of_range() {
        let settings = LmntTtsSettings::default();
        let config = TTSConfig {
            rate: 300,
            ..Default::default()
        };
        let err = LmntRequestBuilder::prepare(&config, &settings, Some("key"), "Hello")
            .err()
            .unwrap();
        assert!(matches!(err, TTSError::InvalidConfiguration(_)));
    }

    #[test]
    fn test_text_too_long() {
        let settings = LmntTtsSettings::default();
        let text = "a".repeat(MAX_TEXT_LENGTH + 1);
        let err = LmntRequestBuilder::prepare(&TTSConfig::default(), &settings, Some("key"), &text)
            .err()
            .unwrap();
        assert!(matches!(err, TTSError::InvalidConfiguration(_)));
    }

    #[test]
    fn test_resume_mode_follows_seed() {
        let ctx = EngineContext::default();
        let tts = LmntTts::new(LmntTtsSettings::default(), &ctx).unwrap();
        assert_eq!(tts.resume_mode(), ResumeMode::None);

        let tts = LmntTts::new(
            LmntTtsSettings {
                seed: Some(7),
                ..Default::default()
            },
            &ctx,
        )
        .unwrap();
        assert_eq!(tts.resume_mode(), ResumeMode::Replay);
    }

    #[test]
    fn test_engine_surface() {
        let tts = LmntTts::new(LmntTtsSettings::default(), &EngineContext::default()).unwrap();
        assert_eq!(tts.get_type(), "lmnt");
        assert!(tts.is_rate_follow_system());
        assert_eq!(tts.get_description(), "Rate: follow system | Voice: lily");
        assert_eq!(tts.get_bottom_content(), "pcm16 24kHz 16-bit mono");
        assert_eq!(tts.get_engine_info()["provider"], "lmnt");
    }

    #[test]
    fn test_invalid_settings_rejected_at_creation() {
        let result = LmntTts::new(
            LmntTtsSettings {
                sample_rate: 11025,
                ..Default::default()
            },
            &EngineContext::default(),
        );
        assert!(matches!(result, Err(TTSError::InvalidConfiguration(_))));
    }

    #[tokio::test]
    async fn test_missing_key_fails_without_network() {
        let tts = LmntTts::new(
            LmntTtsSettings {
                endpoint: Some("http://127.0.0.1:9/speech".to_string()),
                ..Default::default()
            },
            &EngineContext::default(),
        )
        .unwrap();
        let err = tts.get_audio("Hello").await.unwrap_err();
        assert!(matches!(err, TTSError::AuthenticationFailed(_)));
    }

    #[test]
    fn test_record_round_trip() {
        let ctx = EngineContext::default();
        let mut tts = LmntTts::new(
            LmntTtsSettings {
                voice: "morgan".to_string(),
                seed: Some(3),
                ..Default::default()
            },
            &ctx,
        )
        .unwrap();
        tts.config_mut().rate = 120;

        let record = tts.to_record().unwrap();
        assert_eq!(record.type_tag, "lmnt");
        let restored = create_lmnt_tts(&record, &ctx).unwrap();
        assert_eq!(restored.config(), tts.config());
        assert_eq!(restored.resume_mode(), ResumeMode::Replay);
    }
}
