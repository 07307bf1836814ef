//! Generic HTTP execution shared by HTTP-based engines.
//!
//! Each engine variant describes its backend request through
//! [`TTSRequestBuilder`]; [`TTSProvider`] sends it, maps failures onto
//! [`TTSError`] and runs streaming calls through the stream driver with the
//! engine's own session slot.

use bytes::Bytes;
use futures::StreamExt;
use reqwest::StatusCode;
use reqwest::header::{CONTENT_RANGE, RANGE};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::base::{AudioSink, TTSError, TTSResult};
use super::session::{SessionKey, SessionSlot};
use super::stream::{AudioByteStream, drive_stream};

/// Maximum characters of an error body quoted in error messages.
const ERROR_BODY_PREVIEW: usize = 256;

// =============================================================================
// Resume Mode
// =============================================================================

/// How an engine continues a stream interrupted by a transient error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResumeMode {
    /// Always restart from the beginning
    #[default]
    None,
    /// Ask the backend for the remaining bytes with an HTTP `Range` header
    Range,
    /// Re-request the whole payload and drop what was already delivered.
    /// Only valid for backends with deterministic output.
    Replay,
}

impl ResumeMode {
    #[inline]
    pub fn allows_resume(&self) -> bool {
        !matches!(self, Self::None)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Range => "range",
            Self::Replay => "replay",
        }
    }
}

// =============================================================================
// Request Builder
// =============================================================================

/// Backend-specific request construction.
pub trait TTSRequestBuilder: Send + Sync {
    /// Builds the synthesis request for `text`.
    fn build_http_request(
        &self,
        client: &reqwest::Client,
        text: &str,
    ) -> TTSResult<reqwest::RequestBuilder>;

    /// Short backend name used in logs.
    fn backend_name(&self) -> &'static str;
}

// =============================================================================
// Status Mapping
// =============================================================================

/// Maps a non-success HTTP status onto the matching error kind.
pub fn classify_status(status: StatusCode, body: &str) -> TTSError {
    let preview: String = body.chars().take(ERROR_BODY_PREVIEW).collect();
    let message = if preview.is_empty() {
        format!("HTTP {status}")
    } else {
        format!("HTTP {status}: {preview}")
    };

    match status.as_u16() {
        401 | 403 => TTSError::AuthenticationFailed(message),
        402 | 429 => TTSError::QuotaExceeded(message),
        408 => TTSError::Network(message),
        s if s >= 500 => TTSError::Network(message),
        _ => TTSError::Protocol(message),
    }
}

/// Reads the start offset from a `Content-Range: bytes N-M/T` header.
fn parse_content_range_start(value: &str) -> Option<u64> {
    let rest = value.trim().strip_prefix("bytes")?.trim_start();
    let (range, _) = rest.split_once('/')?;
    let (start, _) = range.split_once('-')?;
    start.trim().parse().ok()
}

// =============================================================================
// Provider
// =============================================================================

/// HTTP executor plus the session slot of one engine instance.
pub struct TTSProvider {
    client: reqwest::Client,
    session: SessionSlot,
}

impl TTSProvider {
    pub fn new(client: reqwest::Client) -> Self {
        Self {
            client,
            session: SessionSlot::new(),
        }
    }

    /// Session slot of this engine.
    pub fn session(&self) -> &SessionSlot {
        &self.session
    }

    /// Forgets the stored session.
    pub fn reset_session(&mut self) {
        self.session.reset();
    }

    async fn send<B: TTSRequestBuilder + ?Sized>(
        &self,
        builder: &B,
        text: &str,
    ) -> TTSResult<reqwest::Response> {
        let request = builder.build_http_request(&self.client, text)?;
        let response = request.send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let err = classify_status(status, &body);
        warn!(
            backend = builder.backend_name(),
            status = status.as_u16(),
            error = %err,
            "Synthesis request rejected"
        );
        Err(err)
    }

    /// Full-buffer synthesis. Fails instead of returning empty audio.
    pub async fn generic_get_audio<B: TTSRequestBuilder + ?Sized>(
        &self,
        builder: &B,
        text: &str,
    ) -> TTSResult<Bytes> {
        let response = self.send(builder, text).await?;
        let audio = response.bytes().await?;
        if audio.is_empty() {
            return Err(TTSError::Protocol(format!(
                "{} returned an empty audio payload",
                builder.backend_name()
            )));
        }
        info!(
            backend = builder.backend_name(),
            bytes = audio.len(),
            "Synthesis complete"
        );
        Ok(audio)
    }

    /// Streaming synthesis with breakpoint resume according to `resume`.
    pub async fn generic_get_audio_stream<B: TTSRequestBuilder + ?Sized>(
        &mut self,
        builder: &B,
        key: SessionKey,
        resume: ResumeMode,
        text: &str,
        chunk_size: usize,
        sink: &mut dyn AudioSink,
    ) -> TTSResult<bool> {
        let Self { client, session } = self;
        let opener = StreamOpener {
            client: &*client,
            builder,
            text,
            resume,
        };
        let resumed = drive_stream(
            session,
            key,
            resume.allows_resume(),
            chunk_size,
            |offset| opener.open(offset),
            sink,
        )
        .await?;

        info!(
            backend = builder.backend_name(),
            resumed, "Streaming synthesis complete"
        );
        Ok(resumed)
    }
}

/// Opens the backend stream for one driver call.
struct StreamOpener<'a, B: ?Sized> {
    client: &'a reqwest::Client,
    builder: &'a B,
    text: &'a str,
    resume: ResumeMode,
}

impl<B: TTSRequestBuilder + ?Sized> StreamOpener<'_, B> {
    async fn open(self, offset: u64) -> TTSResult<AudioByteStream> {
        let ranged = offset > 0 && self.resume == ResumeMode::Range;
        let mut request = self.builder.build_http_request(self.client, self.text)?;
        if ranged {
            request = request.header(RANGE, format!("bytes={offset}-"));
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_status(status, &body));
        }

        let start_offset = if status == StatusCode::PARTIAL_CONTENT {
            response
                .headers()
                .get(CONTENT_RANGE)
                .and_then(|v| v.to_str().ok())
                .and_then(parse_content_range_start)
                .ok_or_else(|| {
                    TTSError::Protocol("206 response without a usable Content-Range".to_string())
                })?
        } else {
            if ranged {
                debug!(
                    backend = self.builder.backend_name(),
                    offset, "Range ignored by backend, replaying from start"
                );
            }
            0
        };

        let body = response
            .bytes_stream()
            .map(|item| item.map_err(TTSError::from))
            .boxed();
        Ok(AudioByteStream::new(start_offset, body))
    }
}
