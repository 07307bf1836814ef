pub mod tts;

// Re-export commonly used types for convenience
pub use tts::{
    AudioFormat, BaseTTS, BoxedTTS, EngineContext, EngineRecord, TTSConfig, TTSError, TTSResult,
    create_tts_engine, get_supported_engine_types,
};
