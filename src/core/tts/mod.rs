pub mod base;
pub mod editor;
pub mod http;
pub mod lmnt;
pub mod openai;
pub mod provider;
pub mod registry;
pub mod retry;
pub mod session;
pub mod stream;

pub use base::{
    AudioEncoding, AudioFormat, AudioSink, BACKEND_CHUNKING, BaseTTS, BoxedTTS, ParamRange,
    ProsodyRanges, TTSConfig, TTSError, TTSResult, VALUE_FOLLOW_SYSTEM, describe_rate,
};
pub use editor::{
    DescriptionEditor, EditCompletion, EditDone, EditOutcome, EditRequest, PresetEditor,
    RateValue, edit_channel, launch_editor,
};
pub use http::{HTTP_TYPE, HttpMethod, HttpTTS, HttpTtsSettings};
pub use lmnt::{LMNT_TTS_URL, LMNT_TYPE, LmntAudioFormat, LmntTts, LmntTtsSettings};
pub use openai::{
    AudioOutputFormat, OPENAI_TTS_URL, OPENAI_TYPE, OpenAITTS, OpenAITTSModel, OpenAITtsSettings,
    OpenAIVoice,
};
pub use provider::{ResumeMode, TTSProvider, TTSRequestBuilder, classify_status};
pub use registry::{
    DEFAULT_SYSTEM_RATE, EngineConstructor, EngineContext, EngineRecord, create_tts_engine,
    get_engine_display_names, get_supported_engine_types,
};
pub use retry::{RetryConfig, synthesize_resumable};
pub use session::{SessionKey, SessionSlot, SessionState, StreamSession};
pub use stream::{AudioByteStream, ChunkAssembler, drive_stream};

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_records() -> Vec<EngineRecord> {
        let ctx = EngineContext::default();
        vec![
            HttpTTS::new(HttpTtsSettings::new("http://localhost:5002/api/tts?text={{text}}"), &ctx)
                .unwrap()
                .to_record()
                .unwrap(),
            OpenAITTS::new(OpenAITtsSettings::default(), &ctx)
                .to_record()
                .unwrap(),
            LmntTts::new(LmntTtsSettings::default(), &ctx)
                .unwrap()
                .to_record()
                .unwrap(),
        ]
    }

    #[test]
    fn test_registry_round_trip_every_engine() {
        let ctx = EngineContext::default();
        for record in sample_records() {
            let engine = create_tts_engine(&record, &ctx).unwrap();
            assert_eq!(engine.get_type(), record.type_tag);
            assert_eq!(engine.config(), &record.config);
            assert_eq!(engine.to_record().unwrap(), record);
        }
    }

    #[test]
    fn test_heterogeneous_list_serializes() {
        let records = sample_records();
        let json = serde_json::to_string(&records).unwrap();
        let restored: Vec<EngineRecord> = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, records);

        let tags: Vec<_> = restored.iter().map(|r| r.type_tag.as_str()).collect();
        assert_eq!(tags, vec!["http", "openai", "lmnt"]);
    }

    #[test]
    fn test_display_names() {
        let names = get_engine_display_names();
        assert!(names.contains(&("openai", "OpenAI")));
        assert!(names.contains(&("http", "HTTP endpoint")));
    }

    #[tokio::test]
    async fn test_description_click_round_trip() {
        let ctx = EngineContext::default();
        let engine = LmntTts::new(LmntTtsSettings::default(), &ctx).unwrap();
        let editor = PresetEditor {
            rate: Some(RateValue::Value(120)),
            ..Default::default()
        };
        let (done, outcome) = edit_channel();
        engine.on_description_click(&editor, done);

        let edited = outcome.await.unwrap().unwrap();
        assert_eq!(edited.config.rate, 120);
        let rebuilt = create_tts_engine(&edited, &ctx).unwrap();
        assert_eq!(rebuilt.get_description(), "Rate: 120 | Voice: lily");
    }

    #[tokio::test]
    async fn test_description_click_rejected_edit() {
        let ctx = EngineContext::default();
        let engine = OpenAITTS::new(OpenAITtsSettings::default(), &ctx);
        let editor = PresetEditor {
            rate: Some(RateValue::System),
            ..Default::default()
        };
        let (done, outcome) = edit_channel();
        engine.on_description_click(&editor, done);
        assert_eq!(outcome.await.unwrap(), None);
    }
}
