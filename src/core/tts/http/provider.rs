//! Generic HTTP engine.
//!
//! Talks to any endpoint that returns raw audio for a templated GET or POST
//! request, such as self-hosted synthesis servers.

use async_trait::async_trait;
use bytes::Bytes;
use serde_json::json;

use super::HTTP_TYPE;
use super::config::{Escape, HttpMethod, HttpTtsSettings, TemplateValues, render_template};
use crate::core::tts::base::{
    AudioSink, BaseTTS, ParamRange, ProsodyRanges, TTSConfig, TTSResult, describe_rate,
};
use crate::core::tts::editor::{DescriptionEditor, EditDone, launch_editor};
use crate::core::tts::provider::{ResumeMode, TTSProvider, TTSRequestBuilder};
use crate::core::tts::registry::{EngineContext, EngineRecord};
use crate::core::tts::session::SessionKey;

const PROSODY_RANGE: ParamRange = ParamRange::new(0, 100);

// =============================================================================
// Request Builder
// =============================================================================

struct HttpRequestBuilder<'a> {
    settings: &'a HttpTtsSettings,
    pitch: i32,
    volume: i32,
    /// Effective rate, sentinel already translated
    rate: i32,
}

impl<'a> HttpRequestBuilder<'a> {
    fn prepare(config: &TTSConfig, settings: &'a HttpTtsSettings, system_rate: i32) -> TTSResult<Self> {
        HttpTTS::ranges().validate(config, true)?;
        let rate = if config.rate_follows_system(true) {
            system_rate
        } else {
            config.rate
        };
        Ok(Self {
            settings,
            pitch: config.pitch,
            volume: config.volume,
            rate,
        })
    }
}

impl TTSRequestBuilder for HttpRequestBuilder<'_> {
    fn build_http_request(
        &self,
        client: &reqwest::Client,
        text: &str,
    ) -> TTSResult<reqwest::RequestBuilder> {
        let values = TemplateValues {
            text,
            rate: self.rate,
            volume: self.volume,
            pitch: self.pitch,
        };
        let url = render_template(&self.settings.url, &values, Escape::Url);

        let mut request = match self.settings.method {
            HttpMethod::Get => client.get(url),
            HttpMethod::Post => client.post(url),
        };
        for (name, value) in &self.settings.headers {
            request = request.header(name.as_str(), value.as_str());
        }
        if let Some(body) = self.settings.body.as_deref() {
            let escape = if self.settings.body_is_json() {
                Escape::Json
            } else {
                Escape::Raw
            };
            request = request.body(render_template(body, &values, escape));
        }
        Ok(request)
    }

    fn backend_name(&self) -> &'static str {
        HTTP_TYPE
    }
}

fn settings_fingerprint(settings: &HttpTtsSettings) -> String {
    let mut s = String::new();
    s.push_str(&settings.url);
    s.push('|');
    s.push_str(match settings.method {
        HttpMethod::Get => "GET",
        HttpMethod::Post => "POST",
    });
    s.push('|');
    s.push_str(settings.body.as_deref().unwrap_or_default());
    for (name, value) in &settings.headers {
        s.push('|');
        s.push_str(name);
        s.push('=');
        s.push_str(value);
    }
    s
}

// =============================================================================
// HTTP Engine
// =============================================================================

/// Engine for user-configured HTTP endpoints.
pub struct HttpTTS {
    config: TTSConfig,
    settings: HttpTtsSettings,
    /// Substituted for the follow-system sentinel
    system_rate: i32,
    provider: TTSProvider,
}

impl HttpTTS {
    pub fn new(settings: HttpTtsSettings, ctx: &EngineContext) -> TTSResult<Self> {
        Self::with_config(TTSConfig::default(), settings, ctx)
    }

    /// The audio format in `config` is taken as declared; the endpoint is
    /// expected to produce it.
    pub fn with_config(
        config: TTSConfig,
        settings: HttpTtsSettings,
        ctx: &EngineContext,
    ) -> TTSResult<Self> {
        settings.validate()?;
        Ok(Self {
            config,
            settings,
            system_rate: ctx.system_rate,
            provider: TTSProvider::new(ctx.http.clone()),
        })
    }

    pub fn settings(&self) -> &HttpTtsSettings {
        &self.settings
    }

    fn ranges() -> ProsodyRanges {
        ProsodyRanges {
            pitch: Some(PROSODY_RANGE),
            volume: Some(PROSODY_RANGE),
            rate: PROSODY_RANGE,
        }
    }
}

#[async_trait]
impl BaseTTS for HttpTTS {
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
        HTTP_TYPE
    }

    fn get_description(&self) -> String {
        format!(
            "Pitch: {} | Volume: {} | Rate: {}",
            self.config.pitch,
            self.config.volume,
            describe_rate(&self.config, true)
        )
    }

    fn prosody_ranges(&self) -> ProsodyRanges {
        Self::ranges()
    }

    fn resume_mode(&self) -> ResumeMode {
        self.settings.resume
    }

    fn on_description_click(&self, editor: &dyn DescriptionEditor, done: EditDone) {
        launch_editor(self, editor, done);
    }

    async fn get_audio(&self, speak_text: &str) -> TTSResult<Bytes> {
        let builder = HttpRequestBuilder::prepare(&self.config, &self.settings, self.system_rate)?;
        self.provider.generic_get_audio(&builder, speak_text).await
    }

    async fn get_audio_stream(
        &mut self,
        speak_text: &str,
        chunk_size: usize,
        on_data: &mut dyn AudioSink,
    ) -> TTSResult<bool> {
        let builder = HttpRequestBuilder::prepare(&self.config, &self.settings, self.system_rate)?;
        let key = SessionKey::compute(
            HTTP_TYPE,
            &settings_fingerprint(&self.settings),
            &self.config,
            speak_text,
        );
        self.provider
            .generic_get_audio_stream(
                &builder,
                key,
                self.settings.resume,
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
        EngineRecord::from_settings(HTTP_TYPE, &self.config, &self.settings)
    }

    fn get_engine_info(&self) -> serde_json::Value {
        json!({
            "provider": "http",
            "version": "1.0.0",
            "api_type": "HTTP REST",
            "method": match self.settings.method {
                HttpMethod::Get => "GET",
                HttpMethod::Post => "POST",
            },
            "placeholders": ["{{text}}", "{{rate}}", "{{volume}}", "{{pitch}}"],
            "prosody_range": [PROSODY_RANGE.min, PROSODY_RANGE.max],
            "system_rate": self.system_rate,
            "resume": self.settings.resume.as_str(),
        })
    }
}

pub(super) fn create_http_tts(
    record: &EngineRecord,
    ctx: &EngineContext,
) -> TTSResult<Box<dyn BaseTTS>> {
    let settings: HttpTtsSettings = record.settings()?;
    Ok(Box::new(HttpTTS::with_config(
        record.config.clone(),
        settings,
        ctx,
    )?))
}
