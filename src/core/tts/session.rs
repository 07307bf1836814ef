//! Stream session bookkeeping for resumable synthesis.
//!
//! A session records how many bytes of one synthesis request were handed to
//! the caller (the breakpoint). It moves through:
//!
//! ```text
//! Created ──▶ Streaming ──▶ Completed
//!    │            │
//!    └────────────┴──▶ Failed { resumable }
//! ```
//!
//! Only `Failed { resumable: true }` (and a `Streaming` session whose caller
//! went away) can be continued. Completed and terminally failed sessions are
//! dropped from the slot.

use std::fmt;

use tracing::debug;
use uuid::Uuid;
use xxhash_rust::xxh3::xxh3_128;

use super::base::{TTSConfig, TTSError};

/// Identity of a synthesis request: engine family, effective config and text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionKey(u128);

impl SessionKey {
    /// Computes the key for `text` under `config`.
    ///
    /// `variant_fingerprint` covers variant settings that change the audio
    /// (voice, model, endpoint...).
    pub fn compute(
        engine_type: &str,
        variant_fingerprint: &str,
        config: &TTSConfig,
        text: &str,
    ) -> Self {
        let mut s = String::with_capacity(64 + variant_fingerprint.len() + text.len());
        s.push_str(engine_type);
        s.push('|');
        s.push_str(variant_fingerprint);
        s.push('|');
        s.push_str(&format!(
            "{}:{}:{}:{}|{}|{}|{}",
            config.audio_format.encoding,
            config.audio_format.sample_rate,
            config.audio_format.channels,
            config.audio_format.bits_per_sample,
            config.pitch,
            config.volume,
            config.rate
        ));
        s.push('|');
        s.push_str(text);
        Self(xxh3_128(s.as_bytes()))
    }
}

impl fmt::Display for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:032x}", self.0)
    }
}

/// Lifecycle state of a stream session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Allocated, nothing delivered yet
    Created,
    /// At least one chunk delivered
    Streaming,
    /// Terminal end-of-stream delivered
    Completed,
    /// Backend failed; `resumable` keeps the breakpoint for the next call
    Failed { resumable: bool },
}

impl SessionState {
    /// Whether a later call with the same key may continue this session.
    #[inline]
    pub fn is_resumable(&self) -> bool {
        matches!(self, Self::Streaming | Self::Failed { resumable: true })
    }
}

/// State of one streaming call.
#[derive(Debug, Clone)]
pub struct StreamSession {
    id: Uuid,
    key: SessionKey,
    state: SessionState,
    breakpoint: u64,
}

impl StreamSession {
    pub fn new(key: SessionKey) -> Self {
        Self {
            id: Uuid::new_v4(),
            key,
            state: SessionState::Created,
            breakpoint: 0,
        }
    }

    #[inline]
    pub fn id(&self) -> Uuid {
        self.id
    }

    #[inline]
    pub fn key(&self) -> SessionKey {
        self.key
    }

    #[inline]
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Bytes delivered to the caller so far.
    #[inline]
    pub fn breakpoint(&self) -> u64 {
        self.breakpoint
    }

    /// Records `delivered` more bytes handed to the caller.
    ///
    /// Zero-length deliveries do not move the session forward.
    pub fn advance(&mut self, delivered: usize) {
        if delivered == 0 {
            return;
        }
        self.breakpoint += delivered as u64;
        self.state = SessionState::Streaming;
    }

    fn complete(&mut self) {
        self.state = SessionState::Completed;
    }

    fn fail(&mut self, resumable: bool) {
        self.state = SessionState::Failed { resumable };
        if !resumable {
            self.breakpoint = 0;
        }
    }
}

/// Holder of the at most one live session of an engine instance.
#[derive(Debug, Default)]
pub struct SessionSlot {
    current: Option<StreamSession>,
}

/// Outcome of [`SessionSlot::begin`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionStart {
    /// True when an earlier session is being continued
    pub resumed: bool,
    /// Offset the backend must deliver from
    pub offset: u64,
}

impl SessionSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// The live session, if any.
    pub fn current(&self) -> Option<&StreamSession> {
        self.current.as_ref()
    }

    /// Starts a session for `key`, continuing the stored one when allowed.
    ///
    /// A stored session is continued only if its key matches, it is in a
    /// resumable state, it has delivered at least one byte, and
    /// `allow_resume` is set. Anything else is replaced by a fresh session.
    pub fn begin(&mut self, key: SessionKey, allow_resume: bool) -> SessionStart {
        if let Some(session) = self.current.as_mut() {
            let continuable = allow_resume
                && session.key == key
                && session.state.is_resumable()
                && session.breakpoint > 0;
            if continuable {
                debug!(
                    session = %session.id,
                    breakpoint = session.breakpoint,
                    "Resuming stream session"
                );
                session.state = SessionState::Streaming;
                return SessionStart {
                    resumed: true,
                    offset: session.breakpoint,
                };
            }
        }

        let session = StreamSession::new(key);
        debug!(session = %session.id, key = %key, "Starting stream session");
        self.current = Some(session);
        SessionStart {
            resumed: false,
            offset: 0,
        }
    }

    /// Records bytes delivered by the live session.
    pub fn advance(&mut self, delivered: usize) {
        if let Some(session) = self.current.as_mut() {
            session.advance(delivered);
        }
    }

    /// Breakpoint of the live session, zero without one.
    pub fn breakpoint(&self) -> u64 {
        self.current.as_ref().map_or(0, StreamSession::breakpoint)
    }

    /// Marks the live session complete and releases it.
    pub fn complete(&mut self) -> Option<StreamSession> {
        let mut session = self.current.take()?;
        session.complete();
        debug!(
            session = %session.id,
            bytes = session.breakpoint,
            "Stream session completed"
        );
        Some(session)
    }

    /// Records a failure of the live session.
    ///
    /// Transient errors keep the breakpoint; every other error discards the
    /// session so the next call starts from zero.
    pub fn fail(&mut self, error: &TTSError) {
        let resumable = error.is_transient();
        let Some(session) = self.current.as_mut() else {
            return;
        };
        session.fail(resumable);
        if resumable {
            debug!(
                session = %session.id,
                breakpoint = session.breakpoint,
                error = %error,
                "Stream session interrupted, breakpoint kept"
            );
        } else {
            debug!(session = %session.id, error = %error, "Stream session failed");
            self.current = None;
        }
    }

    /// Drops any stored session.
    pub fn reset(&mut self) {
        self.current = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(text: &str) -> SessionKey {
        SessionKey::compute("test", "", &TTSConfig::default(), text)
    }

    #[test]
    fn test_key_depends_on_text_and_config() {
        let config = TTSConfig::default();
        let a = SessionKey::compute("http", "v1", &config, "hello");
        let b = SessionKey::compute("http", "v1", &config, "hello");
        let c = SessionKey::compute("http", "v1", &config, "hello!");
        let d = SessionKey::compute(
            "http",
            "v1",
            &TTSConfig {
                rate: 40,
                ..config.clone()
            },
            "hello",
        );
        let e = SessionKey::compute("http", "v2", &config, "hello");
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_ne!(a, d);
        assert_ne!(a, e);
    }

    #[test]
    fn test_fresh_session_starts_at_zero() {
        let mut slot = SessionSlot::new();
        let start = slot.begin(key("a"), true);
        assert!(!start.resumed);
        assert_eq!(start.offset, 0);
        assert_eq!(slot.current().unwrap().state(), SessionState::Created);
    }

    #[test]
    fn test_breakpoint_advances_monotonically() {
        let mut slot = SessionSlot::new();
        slot.begin(key("a"), true);
        slot.advance(100);
        slot.advance(0);
        slot.advance(50);
        assert_eq!(slot.breakpoint(), 150);
        assert_eq!(slot.current().unwrap().state(), SessionState::Streaming);
    }

    #[test]
    fn test_transient_failure_resumes() {
        let mut slot = SessionSlot::new();
        slot.begin(key("a"), true);
        slot.advance(500);
        slot.fail(&TTSError::Network("reset".into()));
        assert_eq!(
            slot.current().unwrap().state(),
            SessionState::Failed { resumable: true }
        );

        let start = slot.begin(key("a"), true);
        assert!(start.resumed);
        assert_eq!(start.offset, 500);
    }

    #[test]
    fn test_resume_requires_matching_key() {
        let mut slot = SessionSlot::new();
        slot.begin(key("a"), true);
        slot.advance(500);
        slot.fail(&TTSError::Network("reset".into()));

        let start = slot.begin(key("b"), true);
        assert!(!start.resumed);
        assert_eq!(start.offset, 0);
    }

    #[test]
    fn test_resume_not_allowed() {
        let mut slot = SessionSlot::new();
        slot.begin(key("a"), false);
        slot.advance(500);
        slot.fail(&TTSError::Network("reset".into()));

        let start = slot.begin(key("a"), false);
        assert!(!start.resumed);
        assert_eq!(start.offset, 0);
    }

    #[test]
    fn test_failure_before_any_byte_starts_fresh() {
        let mut slot = SessionSlot::new();
        slot.begin(key("a"), true);
        slot.fail(&TTSError::Network("refused".into()));

        let start = slot.begin(key("a"), true);
        assert!(!start.resumed);
    }

    #[test]
    fn test_terminal_failure_discards_session() {
        let mut slot = SessionSlot::new();
        slot.begin(key("a"), true);
        slot.advance(500);
        slot.fail(&TTSError::QuotaExceeded("limit".into()));
        assert!(slot.current().is_none());

        let start = slot.begin(key("a"), true);
        assert!(!start.resumed);
    }

    #[test]
    fn test_completed_session_is_not_resumed() {
        let mut slot = SessionSlot::new();
        slot.begin(key("a"), true);
        slot.advance(3000);
        let done = slot.complete().unwrap();
        assert_eq!(done.state(), SessionState::Completed);
        assert_eq!(done.breakpoint(), 3000);

        let start = slot.begin(key("a"), true);
        assert!(!start.resumed);
        assert_eq!(start.offset, 0);
    }

    #[test]
    fn test_abandoned_streaming_session_resumes() {
        let mut slot = SessionSlot::new();
        slot.begin(key("a"), true);
        slot.advance(1024);
        // caller dropped the call without an error being recorded
        let start = slot.begin(key("a"), true);
        assert!(start.resumed);
        assert_eq!(start.offset, 1024);
    }
}
