//! Operations behind the command line interface.
//!
//! Each function works on an [`EngineStore`] and an [`EngineContext`] and
//! returns plain data; printing is left to the binary.

use std::path::Path;

use anyhow::{Context, bail};
use bytes::Bytes;
use tracing::{info, warn};

use crate::config::{EngineStore, StoredEngine};
use crate::core::tts::{
    AudioFormat, BACKEND_CHUNKING, BoxedTTS, EngineContext, EngineRecord, PresetEditor,
    RetryConfig, create_tts_engine, edit_channel, get_engine_display_names,
    synthesize_resumable,
};
use crate::utils::write_audio_file;

/// One row of `list`.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineSummary {
    pub id: String,
    pub name: String,
    pub engine_type: String,
    /// `None` when the record cannot be restored by this build
    pub description: Option<String>,
    pub bottom_content: Option<String>,
}

/// Registered engine types with display names.
pub fn engine_types() -> Vec<(&'static str, &'static str)> {
    get_engine_display_names()
}

/// Summaries of every stored engine.
pub fn list_engines(store: &EngineStore, ctx: &EngineContext) -> anyhow::Result<Vec<EngineSummary>> {
    let engines = store.load()?;
    Ok(engines
        .iter()
        .map(|stored| {
            let engine = match create_tts_engine(&stored.engine, ctx) {
                Ok(engine) => Some(engine),
                Err(e) => {
                    warn!(name = %stored.name, error = %e, "Cannot restore engine");
                    None
                }
            };
            EngineSummary {
                id: stored.id.to_string(),
                name: stored.name.clone(),
                engine_type: stored.engine.type_tag.clone(),
                description: engine.as_ref().map(|e| e.get_description()),
                bottom_content: engine.as_ref().map(|e| e.get_bottom_content()),
            }
        })
        .collect())
}

/// Validates `record_json` by constructing the engine, then stores it.
pub fn add_engine(
    store: &EngineStore,
    ctx: &EngineContext,
    name: &str,
    record_json: &str,
) -> anyhow::Result<StoredEngine> {
    let record: EngineRecord =
        serde_json::from_str(record_json).context("Engine record is not valid JSON")?;
    let engine = create_tts_engine(&record, ctx)?;
    // Store the normalized form, with defaults filled in
    let record = engine.to_record()?;
    Ok(store.add(name, record)?)
}

pub fn remove_engine(store: &EngineStore, id_or_name: &str) -> anyhow::Result<StoredEngine> {
    Ok(store.remove(id_or_name)?)
}

fn restore(
    store: &EngineStore,
    ctx: &EngineContext,
    id_or_name: &str,
) -> anyhow::Result<(StoredEngine, BoxedTTS)> {
    let stored = store.get(id_or_name)?;
    let engine = create_tts_engine(&stored.engine, ctx)
        .with_context(|| format!("Cannot restore engine '{}'", stored.name))?;
    Ok((stored, engine))
}

/// Options of `speak`.
#[derive(Debug, Clone)]
pub struct SpeakOptions {
    pub stream: bool,
    pub chunk_size: usize,
    pub retry: RetryConfig,
}

impl Default for SpeakOptions {
    fn default() -> Self {
        Self {
            stream: false,
            chunk_size: BACKEND_CHUNKING,
            retry: RetryConfig::default(),
        }
    }
}

/// Result of `speak`.
#[derive(Debug, Clone)]
pub struct SpeakOutcome {
    pub bytes: usize,
    pub format: AudioFormat,
    /// Whether a WAV header was added
    pub wav_wrapped: bool,
}

/// Synthesizes `text` with a stored engine and writes the audio to `output`.
pub async fn speak(
    store: &EngineStore,
    ctx: &EngineContext,
    id_or_name: &str,
    text: &str,
    output: &Path,
    options: &SpeakOptions,
) -> anyhow::Result<SpeakOutcome> {
    if text.trim().is_empty() {
        bail!("Nothing to say: text is empty");
    }
    let (stored, mut engine) = restore(store, ctx, id_or_name)?;
    let format = engine.config().audio_format;

    let audio: Bytes = if options.stream {
        synthesize_resumable(engine.as_mut(), text, options.chunk_size, &options.retry).await?
    } else {
        engine.get_audio(text).await?
    };

    let wav_wrapped = write_audio_file(output, &audio, &format)
        .with_context(|| format!("Failed to write {}", output.display()))?;
    info!(
        engine = %stored.name,
        bytes = audio.len(),
        output = %output.display(),
        "Audio written"
    );
    Ok(SpeakOutcome {
        bytes: audio.len(),
        format,
        wav_wrapped,
    })
}

/// Opens the engine's editor with preset values and stores the result.
///
/// Returns `None` when the edit produced no change.
pub async fn edit_engine(
    store: &EngineStore,
    ctx: &EngineContext,
    id_or_name: &str,
    editor: &PresetEditor,
) -> anyhow::Result<Option<StoredEngine>> {
    let (stored, engine) = restore(store, ctx, id_or_name)?;
    let (done, outcome) = edit_channel();
    engine.on_description_click(editor, done);

    match outcome.await.context("Editor closed without answering")? {
        Some(record) => {
            // Reject records the engine would not accept back
            create_tts_engine(&record, ctx)?;
            Ok(Some(store.update(&stored.id.to_string(), record)?))
        }
        None => Ok(None),
    }
}
