//! Chunked delivery of backend audio with breakpoint resume.
//!
//! [`drive_stream`] is the single implementation of the streaming contract:
//! every engine variant hands it a way to open its backend at an offset and a
//! sink, and the driver takes care of chunk sizing, breakpoint accounting,
//! prefix skipping on replay and the terminal end-of-stream call.

use std::future::Future;

use bytes::{Bytes, BytesMut};
use futures::stream::BoxStream;
use futures::StreamExt;
use tracing::{debug, warn};

use super::base::{AudioSink, TTSError, TTSResult};
use super::session::{SessionKey, SessionSlot};

/// Byte stream returned by a backend.
pub struct AudioByteStream {
    /// Offset of the first byte of `body` within the full payload
    pub start_offset: u64,
    pub body: BoxStream<'static, TTSResult<Bytes>>,
}

impl AudioByteStream {
    pub fn new(start_offset: u64, body: BoxStream<'static, TTSResult<Bytes>>) -> Self {
        Self { start_offset, body }
    }

    /// Stream over an in-memory payload, split into `frame` sized pieces.
    pub fn from_bytes(start_offset: u64, payload: Bytes, frame: usize) -> Self {
        let frame = frame.max(1);
        let mut frames = Vec::with_capacity(payload.len() / frame + 1);
        let mut rest = payload;
        while !rest.is_empty() {
            let take = frame.min(rest.len());
            frames.push(Ok(rest.split_to(take)));
        }
        Self::new(start_offset, futures::stream::iter(frames).boxed())
    }
}

// =============================================================================
// Chunk Assembler
// =============================================================================

/// Re-frames backend bytes into fixed size chunks.
///
/// With `chunk_size == 0` backend frames pass through untouched (empty frames
/// are dropped).
#[derive(Debug)]
pub struct ChunkAssembler {
    chunk_size: usize,
    pending: BytesMut,
}

impl ChunkAssembler {
    pub fn new(chunk_size: usize) -> Self {
        Self {
            chunk_size,
            pending: BytesMut::new(),
        }
    }

    /// Feeds `data` and returns every chunk that became complete.
    pub fn push(&mut self, data: Bytes) -> Vec<Bytes> {
        if data.is_empty() {
            return Vec::new();
        }
        if self.chunk_size == 0 {
            return vec![data];
        }

        self.pending.extend_from_slice(&data);
        let mut ready = Vec::with_capacity(self.pending.len() / self.chunk_size);
        while self.pending.len() >= self.chunk_size {
            ready.push(self.pending.split_to(self.chunk_size).freeze());
        }
        ready
    }

    /// Returns the remaining partial chunk, if any.
    pub fn finish(&mut self) -> Option<Bytes> {
        if self.pending.is_empty() {
            None
        } else {
            Some(self.pending.split().freeze())
        }
    }

    /// Bytes buffered but not yet emitted.
    #[inline]
    pub fn buffered(&self) -> usize {
        self.pending.len()
    }
}

// =============================================================================
// Stream Driver
// =============================================================================

/// Runs one streaming call against `slot`.
///
/// `open` receives the offset delivery must continue from and returns the
/// backend byte stream. Returns whether the call resumed an earlier session.
pub async fn drive_stream<F, Fut>(
    slot: &mut SessionSlot,
    key: SessionKey,
    allow_resume: bool,
    chunk_size: usize,
    open: F,
    sink: &mut dyn AudioSink,
) -> TTSResult<bool>
where
    F: FnOnce(u64) -> Fut,
    Fut: Future<Output = TTSResult<AudioByteStream>>,
{
    let start = slot.begin(key, allow_resume);

    let stream = match open(start.offset).await {
        Ok(stream) => stream,
        Err(e) => {
            slot.fail(&e);
            return Err(e);
        }
    };

    if stream.start_offset > start.offset {
        let err = TTSError::Protocol(format!(
            "backend resumed at byte {} but {} were delivered",
            stream.start_offset, start.offset
        ));
        slot.fail(&err);
        return Err(err);
    }

    let mut skip = start.offset - stream.start_offset;
    if skip > 0 {
        debug!(skip, "Discarding replayed prefix");
    }

    let mut assembler = ChunkAssembler::new(chunk_size);
    let mut body = stream.body;
    while let Some(item) = body.next().await {
        let mut data = match item {
            Ok(data) => data,
            Err(e) => {
                if assembler.buffered() > 0 {
                    debug!(
                        buffered = assembler.buffered(),
                        "Dropping undelivered bytes, they will be refetched"
                    );
                }
                slot.fail(&e);
                return Err(e);
            }
        };

        if skip > 0 {
            let n = (skip as usize).min(data.len());
            let _ = data.split_to(n);
            skip -= n as u64;
        }

        for chunk in assembler.push(data) {
            let len = chunk.len();
            sink.on_data(Some(chunk));
            slot.advance(len);
        }
    }

    if skip > 0 {
        warn!(missing = skip, "Replayed audio ended before the breakpoint");
        let err = TTSError::Protocol(format!(
            "replayed audio ended {skip} bytes before the breakpoint"
        ));
        slot.fail(&err);
        return Err(err);
    }

    if let Some(rest) = assembler.finish() {
        let len = rest.len();
        sink.on_data(Some(rest));
        slot.advance(len);
    }

    if slot.breakpoint() == 0 {
        let err = TTSError::Protocol("backend returned no audio".to_string());
        slot.fail(&err);
        return Err(err);
    }

    sink.on_data(None);
    slot.complete();
    Ok(start.resumed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::tts::base::TTSConfig;
    use crate::core::tts::session::SessionState;

    fn payload(len: usize) -> Bytes {
        Bytes::from((0..len).map(|i| (i % 251) as u8).collect::<Vec<u8>>())
    }

    fn key(text: &str) -> SessionKey {
        SessionKey::compute("test", "", &TTSConfig::default(), text)
    }

    /// Collects sink calls.
    #[derive(Default)]
    struct Recorder {
        chunks: Vec<Bytes>,
        ends: usize,
        after_end: usize,
    }

    impl AudioSink for Recorder {
        fn on_data(&mut self, chunk: Option<Bytes>) {
            if self.ends > 0 {
                self.after_end += 1;
            }
            match chunk {
                Some(c) => self.chunks.push(c),
                None => self.ends += 1,
            }
        }
    }

    impl Recorder {
        fn sizes(&self) -> Vec<usize> {
            self.chunks.iter().map(Bytes::len).collect()
        }

        fn joined(&self) -> Vec<u8> {
            self.chunks.iter().flat_map(|c| c.iter().copied()).collect()
        }
    }

    /// Stream yielding `ok` bytes then a network error.
    fn broken_stream(data: Bytes, ok: usize, frame: usize) -> AudioByteStream {
        let AudioByteStream { body, .. } = AudioByteStream::from_bytes(0, data.slice(..ok), frame);
        let failing = body.chain(futures::stream::iter(vec![Err(TTSError::Network(
            "connection reset".to_string(),
        ))]));
        AudioByteStream::new(0, failing.boxed())
    }

    #[test]
    fn test_assembler_fixed_chunks() {
        let mut asm = ChunkAssembler::new(4);
        assert_eq!(asm.push(Bytes::from_static(b"ab")).len(), 0);
        let out = asm.push(Bytes::from_static(b"cdefghij"));
        assert_eq!(out, vec![Bytes::from_static(b"abcd"), Bytes::from_static(b"efgh")]);
        assert_eq!(asm.buffered(), 2);
        assert_eq!(asm.finish(), Some(Bytes::from_static(b"ij")));
        assert_eq!(asm.finish(), None);
    }

    #[test]
    fn test_assembler_pass_through() {
        let mut asm = ChunkAssembler::new(0);
        assert_eq!(asm.push(Bytes::from_static(b"abc")), vec![Bytes::from_static(b"abc")]);
        assert!(asm.push(Bytes::new()).is_empty());
        assert_eq!(asm.finish(), None);
    }

    #[tokio::test]
    async fn test_chunking_3000_bytes_by_1024() {
        let data = payload(3000);
        let mut slot = SessionSlot::new();
        let mut rec = Recorder::default();

        let body = data.clone();
        let resumed = drive_stream(
            &mut slot,
            key("t"),
            true,
            1024,
            |_| async move { Ok(AudioByteStream::from_bytes(0, body, 700)) },
            &mut rec,
        )
        .await
        .unwrap();

        assert!(!resumed);
        assert_eq!(rec.sizes(), vec![1024, 1024, 952]);
        assert_eq!(rec.ends, 1);
        assert_eq!(rec.after_end, 0);
        assert_eq!(rec.joined(), data.to_vec());
        assert!(slot.current().is_none());
    }

    #[tokio::test]
    async fn test_backend_framing_when_chunk_size_zero() {
        let data = payload(2500);
        let mut slot = SessionSlot::new();
        let mut rec = Recorder::default();

        let body = data.clone();
        drive_stream(
            &mut slot,
            key("t"),
            true,
            0,
            |_| async move { Ok(AudioByteStream::from_bytes(0, body, 1000)) },
            &mut rec,
        )
        .await
        .unwrap();

        assert_eq!(rec.sizes(), vec![1000, 1000, 500]);
        assert_eq!(rec.ends, 1);
    }

    #[tokio::test]
    async fn test_network_error_then_replay_resume() {
        let data = payload(3000);
        let mut slot = SessionSlot::new();
        let mut first = Recorder::default();

        let body = data.clone();
        let err = drive_stream(
            &mut slot,
            key("t"),
            true,
            0,
            |_| async move { Ok(broken_stream(body, 500, 250)) },
            &mut first,
        )
        .await
        .unwrap_err();

        assert!(err.is_transient());
        assert_eq!(first.joined().len(), 500);
        assert_eq!(first.ends, 0);
        assert_eq!(
            slot.current().unwrap().state(),
            SessionState::Failed { resumable: true }
        );

        let mut second = Recorder::default();
        let body = data.clone();
        let mut requested = None;
        let resumed = drive_stream(
            &mut slot,
            key("t"),
            true,
            0,
            |offset| {
                requested = Some(offset);
                async move { Ok(AudioByteStream::from_bytes(0, body, 400)) }
            },
            &mut second,
        )
        .await
        .unwrap();

        assert!(resumed);
        assert_eq!(requested, Some(500));
        assert_eq!(second.ends, 1);

        let mut all = first.joined();
        all.extend(second.joined());
        assert_eq!(all, data.to_vec());
    }

    #[tokio::test]
    async fn test_native_offset_resume() {
        let data = payload(3000);
        let mut slot = SessionSlot::new();
        let mut first = Recorder::default();

        let body = data.clone();
        let _ = drive_stream(
            &mut slot,
            key("t"),
            true,
            1024,
            |_| async move { Ok(broken_stream(body, 1500, 300)) },
            &mut first,
        )
        .await
        .unwrap_err();

        // one full chunk delivered, 476 buffered bytes dropped
        assert_eq!(first.sizes(), vec![1024]);

        let mut second = Recorder::default();
        let body = data.clone();
        let resumed = drive_stream(
            &mut slot,
            key("t"),
            true,
            1024,
            |offset| async move {
                let tail = body.slice(offset as usize..);
                Ok(AudioByteStream::from_bytes(offset, tail, 512))
            },
            &mut second,
        )
        .await
        .unwrap();

        assert!(resumed);
        assert_eq!(second.sizes(), vec![1024, 952]);
        let mut all = first.joined();
        all.extend(second.joined());
        assert_eq!(all, data.to_vec());
    }

    #[tokio::test]
    async fn test_no_resume_restarts_from_zero() {
        let data = payload(1200);
        let mut slot = SessionSlot::new();
        let mut first = Recorder::default();

        let body = data.clone();
        let _ = drive_stream(
            &mut slot,
            key("t"),
            false,
            0,
            |_| async move { Ok(broken_stream(body, 600, 600)) },
            &mut first,
        )
        .await
        .unwrap_err();

        let mut second = Recorder::default();
        let body = data.clone();
        let resumed = drive_stream(
            &mut slot,
            key("t"),
            false,
            0,
            |offset| {
                assert_eq!(offset, 0);
                async move { Ok(AudioByteStream::from_bytes(0, body, 1200)) }
            },
            &mut second,
        )
        .await
        .unwrap();

        assert!(!resumed);
        assert_eq!(second.joined(), data.to_vec());
    }

    #[tokio::test]
    async fn test_open_failure_keeps_breakpoint_for_transient() {
        let data = payload(1000);
        let mut slot = SessionSlot::new();
        let mut rec = Recorder::default();

        let body = data.clone();
        let _ = drive_stream(
            &mut slot,
            key("t"),
            true,
            0,
            |_| async move { Ok(broken_stream(body, 400, 400)) },
            &mut rec,
        )
        .await
        .unwrap_err();

        let err = drive_stream(
            &mut slot,
            key("t"),
            true,
            0,
            |_| async { Err(TTSError::Network("unreachable".to_string())) },
            &mut rec,
        )
        .await
        .unwrap_err();
        assert!(err.is_transient());
        assert_eq!(slot.breakpoint(), 400);

        let err = drive_stream(
            &mut slot,
            key("t"),
            true,
            0,
            |_| async { Err(TTSError::AuthenticationFailed("revoked".to_string())) },
            &mut rec,
        )
        .await
        .unwrap_err();
        assert!(!err.is_transient());
        assert!(slot.current().is_none());
    }

    #[tokio::test]
    async fn test_empty_stream_is_an_error() {
        let mut slot = SessionSlot::new();
        let mut rec = Recorder::default();

        let err = drive_stream(
            &mut slot,
            key("t"),
            true,
            1024,
            |_| async { Ok(AudioByteStream::from_bytes(0, Bytes::new(), 1)) },
            &mut rec,
        )
        .await
        .unwrap_err();

        assert!(matches!(err, TTSError::Protocol(_)));
        assert_eq!(rec.ends, 0);
        assert!(rec.chunks.is_empty());
    }

    #[tokio::test]
    async fn test_short_replay_is_an_error() {
        let data = payload(1000);
        let mut slot = SessionSlot::new();
        let mut rec = Recorder::default();

        let body = data.clone();
        let _ = drive_stream(
            &mut slot,
            key("t"),
            true,
            0,
            |_| async move { Ok(broken_stream(body, 800, 800)) },
            &mut rec,
        )
        .await
        .unwrap_err();

        let short = data.slice(..600);
        let err = drive_stream(
            &mut slot,
            key("t"),
            true,
            0,
            |_| async move { Ok(AudioByteStream::from_bytes(0, short, 600)) },
            &mut rec,
        )
        .await
        .unwrap_err();

        assert!(matches!(err, TTSError::Protocol(_)));
        assert_eq!(rec.ends, 0);
        assert!(slot.current().is_none());
    }

    #[tokio::test]
    async fn test_backend_skipping_ahead_is_an_error() {
        let data = payload(1000);
        let mut slot = SessionSlot::new();
        let mut rec = Recorder::default();

        let err = drive_stream(
            &mut slot,
            key("t"),
            true,
            0,
            |_| async move { Ok(AudioByteStream::from_bytes(10, data, 100)) },
            &mut rec,
        )
        .await
        .unwrap_err();

        assert!(matches!(err, TTSError::Protocol(_)));
        assert!(rec.chunks.is_empty());
    }
}
