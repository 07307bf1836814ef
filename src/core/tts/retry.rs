//! Retrying streaming synthesis across transient failures.
//!
//! [`synthesize_resumable`] drives an engine's `get_audio_stream` until it
//! completes, sleeping with exponential backoff between attempts. When the
//! engine resumes, the new bytes are appended to what was already received;
//! when it restarts, the partial audio is replaced.

use std::time::{Duration, SystemTime};

use bytes::{Bytes, BytesMut};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::base::{BaseTTS, TTSError, TTSResult};

/// Backoff policy of [`synthesize_resumable`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Total attempts including the first one. Values below 1 act as 1.
    pub max_attempts: u32,
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
    pub backoff_multiplier: f32,
    /// Spread delays by up to 25%
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay_ms: 500,
            max_delay_ms: 8000,
            backoff_multiplier: 2.0,
            jitter: true,
        }
    }
}

impl RetryConfig {
    /// A single attempt, no retries.
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            ..Default::default()
        }
    }

    /// Delay in milliseconds before retry number `attempt` (1-based).
    pub fn calculate_delay(&self, attempt: u32) -> u64 {
        let base_delay = self.initial_delay_ms as f64;
        let multiplier = self.backoff_multiplier as f64;

        let delay = base_delay * multiplier.powi(attempt.saturating_sub(1) as i32);
        let delay = delay.min(self.max_delay_ms as f64);

        if self.jitter {
            let jitter = rand_jitter(delay * 0.25);
            (delay + jitter).max(0.0) as u64
        } else {
            delay as u64
        }
    }

    /// Whether another attempt may follow attempt number `attempt`.
    pub fn should_retry(&self, attempt: u32) -> bool {
        attempt < self.max_attempts.max(1)
    }
}

/// Pseudo-random value in `-range..range` from the clock.
fn rand_jitter(range: f64) -> f64 {
    let seed = SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos() as u64;
    let random = ((seed.wrapping_mul(1103515245).wrapping_add(12345)) % (1 << 31)) as f64;
    let normalized = random / (1u64 << 31) as f64;
    (normalized - 0.5) * 2.0 * range
}

/// Streams `text` through `engine`, retrying transient errors.
///
/// Returns the complete payload, identical to what one uninterrupted call
/// would have delivered. Any session left over from an earlier call is
/// dropped first, so only breakpoints recorded here are resumed.
pub async fn synthesize_resumable(
    engine: &mut dyn BaseTTS,
    text: &str,
    chunk_size: usize,
    retry: &RetryConfig,
) -> TTSResult<Bytes> {
    let can_resume = engine.resume_mode().allows_resume();
    let mut audio = BytesMut::new();
    let mut attempt = 0u32;
    engine.reset_stream();

    loop {
        attempt += 1;
        let mut received = BytesMut::new();
        let mut sink = |chunk: Option<Bytes>| {
            if let Some(chunk) = chunk {
                received.extend_from_slice(&chunk);
            }
        };
        let result = engine.get_audio_stream(text, chunk_size, &mut sink).await;

        match result {
            Ok(resumed) => {
                if resumed {
                    if audio.is_empty() {
                        return Err(TTSError::Protocol(
                            "engine resumed a stream this call did not start".to_string(),
                        ));
                    }
                    audio.extend_from_slice(&received);
                } else {
                    audio = received;
                }
                info!(
                    engine = engine.get_type(),
                    attempts = attempt,
                    bytes = audio.len(),
                    "Synthesis finished"
                );
                return Ok(audio.freeze());
            }
            Err(e) if e.is_transient() && retry.should_retry(attempt) => {
                // The engine keeps its breakpoint at everything delivered so far
                if can_resume {
                    audio.extend_from_slice(&received);
                } else {
                    audio.clear();
                }
                let delay = retry.calculate_delay(attempt);
                warn!(
                    engine = engine.get_type(),
                    attempt,
                    delay_ms = delay,
                    received = audio.len(),
                    error = %e,
                    "Transient synthesis failure, retrying"
                );
                tokio::time::sleep(Duration::from_millis(delay)).await;
            }
            Err(e) => {
                debug!(engine = engine.get_type(), attempt, error = %e, "Giving up");
                return Err(e);
            }
        }
    }
}
