//! Description editor contract.
//!
//! Clicking an engine's description opens a variant-specific editor. The
//! engine hands the editor an [`EditRequest`] and an [`EditCompletion`]; the
//! editor finishes the completion with the edited settings or with `None`.
//! The caller receives exactly one value on the [`EditDone`] channel: a
//! modified copy of the engine record, or `None` for "no change".

use tokio::sync::oneshot;
use tracing::{debug, warn};

use super::base::{BaseTTS, ProsodyRanges, TTSConfig, VALUE_FOLLOW_SYSTEM};
use super::registry::EngineRecord;

/// Sending half handed to [`BaseTTS::on_description_click`](super::BaseTTS::on_description_click).
pub type EditDone = oneshot::Sender<Option<EngineRecord>>;

/// Receiving half kept by the caller.
pub type EditOutcome = oneshot::Receiver<Option<EngineRecord>>;

/// Creates the channel pair for one description click.
pub fn edit_channel() -> (EditDone, EditOutcome) {
    oneshot::channel()
}

/// What an editor is asked to edit.
#[derive(Debug, Clone)]
pub struct EditRequest {
    pub engine_type: &'static str,
    pub config: TTSConfig,
    pub ranges: ProsodyRanges,
    pub rate_follow_system: bool,
}

/// Single-shot completion of an edit.
///
/// Consumed by [`finish`](Self::finish). Dropping it unfinished reports
/// "no change", so the caller is answered exactly once either way.
#[derive(Debug)]
pub struct EditCompletion {
    snapshot: Option<EngineRecord>,
    done: Option<EditDone>,
}

impl EditCompletion {
    /// `snapshot` is the engine's current record; `None` when it could not
    /// be produced, in which case the edit always reports "no change".
    pub fn new(snapshot: Option<EngineRecord>, done: EditDone) -> Self {
        Self {
            snapshot,
            done: Some(done),
        }
    }

    /// Completes the edit. `Some(config)` yields a modified engine record.
    pub fn finish(mut self, edited: Option<TTSConfig>) {
        let result = match (edited, self.snapshot.take()) {
            (Some(config), Some(mut record)) => {
                record.config = config;
                Some(record)
            }
            _ => None,
        };
        self.send(result);
    }

    fn send(&mut self, result: Option<EngineRecord>) {
        if let Some(done) = self.done.take() {
            if done.send(result).is_err() {
                debug!("Edit result dropped, caller no longer waiting");
            }
        }
    }
}

impl Drop for EditCompletion {
    fn drop(&mut self) {
        self.send(None);
    }
}

/// External editor component.
pub trait DescriptionEditor: Send + Sync {
    fn edit(&self, request: EditRequest, done: EditCompletion);
}

/// Hands `engine`'s current settings to `editor`.
///
/// Shared body of every variant's `on_description_click`.
pub fn launch_editor(engine: &dyn BaseTTS, editor: &dyn DescriptionEditor, done: EditDone) {
    let snapshot = match engine.to_record() {
        Ok(record) => Some(record),
        Err(e) => {
            warn!(engine = engine.get_type(), error = %e, "Cannot snapshot engine for editing");
            None
        }
    };
    let request = EditRequest {
        engine_type: engine.get_type(),
        config: engine.config().clone(),
        ranges: engine.prosody_ranges(),
        rate_follow_system: engine.is_rate_follow_system(),
    };
    editor.edit(request, EditCompletion::new(snapshot, done));
}

/// Requested rate in a [`PresetEditor`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateValue {
    /// Follow the system default
    System,
    Value(i32),
}

/// Non-interactive editor applying preset values.
///
/// Values the engine does not accept abort the edit with "no change".
#[derive(Debug, Clone, Default)]
pub struct PresetEditor {
    pub pitch: Option<i32>,
    pub volume: Option<i32>,
    pub rate: Option<RateValue>,
}

impl PresetEditor {
    fn apply(&self, request: &EditRequest) -> Result<Option<TTSConfig>, String> {
        if self.pitch.is_none() && self.volume.is_none() && self.rate.is_none() {
            return Ok(None);
        }

        let mut config = request.config.clone();
        if let Some(pitch) = self.pitch {
            let range = request
                .ranges
                .pitch
                .ok_or_else(|| format!("{} has no pitch control", request.engine_type))?;
            range.check("pitch", pitch).map_err(|e| e.to_string())?;
            config.pitch = pitch;
        }
        if let Some(volume) = self.volume {
            let range = request
                .ranges
                .volume
                .ok_or_else(|| format!("{} has no volume control", request.engine_type))?;
            range.check("volume", volume).map_err(|e| e.to_string())?;
            config.volume = volume;
        }
        match self.rate {
            Some(RateValue::System) if request.rate_follow_system => {
                config.rate = VALUE_FOLLOW_SYSTEM;
            }
            Some(RateValue::System) => {
                return Err(format!(
                    "{} cannot follow the system rate",
                    request.engine_type
                ));
            }
            Some(RateValue::Value(rate)) => {
                request
                    .ranges
                    .rate
                    .check("rate", rate)
                    .map_err(|e| e.to_string())?;
                config.rate = rate;
            }
            None => {}
        }

        Ok((config != request.config).then_some(config))
    }
}

impl DescriptionEditor for PresetEditor {
    fn edit(&self, request: EditRequest, done: EditCompletion) {
        match self.apply(&request) {
            Ok(edited) => done.finish(edited),
            Err(reason) => {
                warn!(engine = request.engine_type, %reason, "Edit rejected");
                done.finish(None);
            }
        }
    }
}
