//! OpenAI TTS engine.
//!
//! # API Reference
//!
//! - Endpoint: `POST https://api.openai.com/v1/audio/speech`
//! - Models: tts-1, tts-1-hd, gpt-4o-mini-tts
//! - Output: mp3, opus, aac, flac, wav, pcm (24kHz)
//! - Speed: 0.25 to 4.0, configured here as `rate` in percent (25 to 400)
//!
//! The endpoint is not deterministic and has no byte-range support, so
//! interrupted streams always restart from the beginning.

use async_trait::async_trait;
use bytes::Bytes;
use serde_json::json;
use zeroize::Zeroize;

use super::config::{AudioOutputFormat, OpenAITTSModel, OpenAITtsSettings, OpenAIVoice};
use crate::core::tts::base::{
    AudioSink, BaseTTS, ParamRange, ProsodyRanges, TTSConfig, TTSError, TTSResult,
};
use crate::core::tts::editor::{DescriptionEditor, EditDone, launch_editor};
use crate::core::tts::provider::{ResumeMode, TTSProvider, TTSRequestBuilder};
use crate::core::tts::registry::{EngineContext, EngineRecord};
use crate::core::tts::session::SessionKey;

/// OpenAI TTS API endpoint
pub const OPENAI_TTS_URL: &str = "https://api.openai.com/v1/audio/speech";

/// Record tag of this engine.
pub const OPENAI_TYPE: &str = "openai";

/// Speed range in percent of normal speed.
const RATE_RANGE: ParamRange = ParamRange::new(25, 400);

/// Rate of a freshly created engine (normal speed).
pub const OPENAI_DEFAULT_RATE: i32 = 100;

// =============================================================================
// Request Builder
// =============================================================================

/// Request for one synthesis call, built from the engine's current state.
struct OpenAIRequestBuilder<'a> {
    settings: &'a OpenAITtsSettings,
    api_key: &'a str,
    /// Speaking speed (0.25 to 4.0)
    speed: f32,
}

impl<'a> OpenAIRequestBuilder<'a> {
    /// Validates the config and resolves credentials without touching the network.
    fn prepare(
        config: &TTSConfig,
        settings: &'a OpenAITtsSettings,
        api_key: Option<&'a str>,
    ) -> TTSResult<Self> {
        RATE_RANGE.check("rate", config.rate)?;
        let api_key = api_key.ok_or_else(|| {
            TTSError::AuthenticationFailed("no OpenAI API key configured".to_string())
        })?;
        Ok(Self {
            settings,
            api_key,
            speed: config.rate as f32 / 100.0,
        })
    }
}

impl TTSRequestBuilder for OpenAIRequestBuilder<'_> {
    fn build_http_request(
        &self,
        client: &reqwest::Client,
        text: &str,
    ) -> TTSResult<reqwest::RequestBuilder> {
        let mut body = json!({
            "model": self.settings.model.as_str(),
            "input": text,
            "voice": self.settings.voice.as_str(),
            "response_format": self.settings.response_format.as_str(),
        });

        // Omit speed at the default (1.0)
        if (self.speed - 1.0).abs() > 0.001 {
            body["speed"] = json!(self.speed);
        }
        if let Some(instructions) = self.settings.instructions.as_deref() {
            if self.settings.model.supports_instructions() {
                body["instructions"] = json!(instructions);
            }
        }

        let url = self.settings.endpoint.as_deref().unwrap_or(OPENAI_TTS_URL);
        Ok(client
            .post(url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&body))
    }

    fn backend_name(&self) -> &'static str {
        OPENAI_TYPE
    }
}

/// Variant settings that change the produced audio.
fn settings_fingerprint(settings: &OpenAITtsSettings) -> String {
    format!(
        "{}|{}|{}|{}|{}",
        settings.model,
        settings.voice,
        settings.response_format,
        settings.endpoint.as_deref().unwrap_or(OPENAI_TTS_URL),
        settings.instructions.as_deref().unwrap_or_default()
    )
}

// =============================================================================
// OpenAI TTS Engine
// =============================================================================

/// Engine backed by the OpenAI Audio Speech API.
pub struct OpenAITTS {
    config: TTSConfig,
    settings: OpenAITtsSettings,
    /// Record key or the shared key from the context
    api_key: Option<String>,
    provider: TTSProvider,
}

impl OpenAITTS {
    /// Creates an engine at normal speed.
    pub fn new(settings: OpenAITtsSettings, ctx: &EngineContext) -> Self {
        let config = TTSConfig {
            rate: OPENAI_DEFAULT_RATE,
            ..Default::default()
        };
        Self::with_config(config, settings, ctx)
    }

    /// Creates an engine with an existing config.
    ///
    /// The audio format is always the one implied by `response_format`.
    pub fn with_config(
        mut config: TTSConfig,
        settings: OpenAITtsSettings,
        ctx: &EngineContext,
    ) -> Self {
        config.audio_format = settings.response_format.audio_format();
        let api_key = ctx.resolve_api_key(OPENAI_TYPE, settings.api_key.as_deref());
        Self {
            config,
            settings,
            api_key,
            provider: TTSProvider::new(ctx.http.clone()),
        }
    }

    pub fn model(&self) -> OpenAITTSModel {
        self.settings.model
    }

    pub fn voice(&self) -> OpenAIVoice {
        self.settings.voice
    }

    pub fn response_format(&self) -> AudioOutputFormat {
        self.settings.response_format
    }
}

impl Drop for OpenAITTS {
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
impl BaseTTS for OpenAITTS {
    fn config(&self) -> &TTSConfig {
        &self.config
    }

    fn config_mut(&mut self) -> &mut TTSConfig {
        &mut self.config
    }

    fn is_rate_follow_system(&self) -> bool {
        false
    }

    fn get_type(&self) -> &'static str {
        OPENAI_TYPE
    }

    fn get_description(&self) -> String {
        format!(
            "Rate: {}% | Voice: {} | Model: {}",
            self.config.rate, self.settings.voice, self.settings.model
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
        ResumeMode::None
    }

    fn on_description_click(&self, editor: &dyn DescriptionEditor, done: EditDone) {
        launch_editor(self, editor, done);
    }

    async fn get_audio(&self, speak_text: &str) -> TTSResult<Bytes> {
        let builder =
            OpenAIRequestBuilder::prepare(&self.config, &self.settings, self.api_key.as_deref())?;
        self.provider.generic_get_audio(&builder, speak_text).await
    }

    async fn get_audio_stream(
        &mut self,
        speak_text: &str,
        chunk_size: usize,
        on_data: &mut dyn AudioSink,
    ) -> TTSResult<bool> {
        let builder =
            OpenAIRequestBuilder::prepare(&self.config, &self.settings, self.api_key.as_deref())?;
        let key = SessionKey::compute(
            OPENAI_TYPE,
            &settings_fingerprint(&self.settings),
            &self.config,
            speak_text,
        );
        self.provider
            .generic_get_audio_stream(
                &builder,
                key,
                ResumeMode::None,
                speak_text,
                chunk_size,
                on_data,
            )
            .await
    }

    fn reset_stream(&mut self) {
        self.provider.reset_session();
    }

    fn to_record(&self) -> TTSResult<EngineRecord> {
        EngineRecord::from_settings(OPENAI_TYPE, &self.config, &self.settings)
    }

    fn get_engine_info(&self) -> serde_json::Value {
        json!({
            "provider": "openai",
            "version": "1.0.0",
            "api_type": "HTTP REST",
            "endpoint": self.settings.endpoint.as_deref().unwrap_or(OPENAI_TTS_URL),
            "supported_formats": ["mp3", "opus", "aac", "flac", "wav", "pcm"],
            "supported_sample_rates": [24000],
            "supported_models": ["tts-1", "tts-1-hd", "gpt-4o-mini-tts"],
            "supported_voices": OpenAIVoice::all().iter().map(|v| v.as_str()).collect::<Vec<_>>(),
            "rate_range_percent": [RATE_RANGE.min, RATE_RANGE.max],
            "resume": ResumeMode::None.as_str(),
            "documentation": "https://platform.openai.com/docs/api-reference/audio/createSpeech",
        })
    }
}

/// Registry factory.
pub(super) fn create_openai_tts(
    record: &EngineRecord,
    ctx: &EngineContext,
) -> TTSResult<Box<dyn BaseTTS>> {
    let settings: OpenAITtsSettings = record.settings()?;
    Ok(Box::new(OpenAITTS::with_config(
        record.config.clone(),
        settings,
        ctx,
    )))
}
