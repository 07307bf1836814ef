//! WAV container output for raw PCM audio.

use std::io::{Cursor, Write};
use std::path::Path;

use hound::{SampleFormat, WavSpec, WavWriter};

use crate::core::tts::{AudioEncoding, AudioFormat};

/// Errors raised while writing audio files.
#[derive(Debug, thiserror::Error)]
pub enum WavError {
    #[error("{0} audio cannot be wrapped in a WAV container")]
    Unsupported(AudioEncoding),

    #[error("PCM payload of {len} bytes is not a whole number of {frame}-byte frames")]
    Truncated { len: usize, frame: usize },

    #[error(transparent)]
    Hound(#[from] hound::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

fn spec_for(format: &AudioFormat) -> Result<WavSpec, WavError> {
    let (bits_per_sample, sample_format) = match format.encoding {
        AudioEncoding::Pcm16 => (16, SampleFormat::Int),
        AudioEncoding::PcmF32 => (32, SampleFormat::Float),
        other => return Err(WavError::Unsupported(other)),
    };
    Ok(WavSpec {
        channels: format.channels.max(1),
        sample_rate: format.sample_rate,
        bits_per_sample,
        sample_format,
    })
}

/// Wraps little-endian PCM samples in a WAV header.
pub fn pcm_to_wav(pcm: &[u8], format: &AudioFormat) -> Result<Vec<u8>, WavError> {
    let spec = spec_for(format)?;
    let sample_bytes = usize::from(spec.bits_per_sample / 8);
    let frame = sample_bytes * usize::from(spec.channels);
    if pcm.len() % frame != 0 {
        return Err(WavError::Truncated {
            len: pcm.len(),
            frame,
        });
    }

    let mut cursor = Cursor::new(Vec::with_capacity(pcm.len() + 44));
    {
        let mut writer = WavWriter::new(&mut cursor, spec)?;
        match spec.sample_format {
            SampleFormat::Int => {
                for sample in pcm.chunks_exact(2) {
                    writer.write_sample(i16::from_le_bytes([sample[0], sample[1]]))?;
                }
            }
            SampleFormat::Float => {
                for sample in pcm.chunks_exact(4) {
                    writer.write_sample(f32::from_le_bytes([
                        sample[0], sample[1], sample[2], sample[3],
                    ]))?;
                }
            }
        }
        writer.finalize()?;
    }
    Ok(cursor.into_inner())
}

/// Writes `audio` to `path`, adding a WAV header when the path ends in
/// `.wav` and the audio is raw PCM.
///
/// Returns whether a header was added.
pub fn write_audio_file(path: &Path, audio: &[u8], format: &AudioFormat) -> Result<bool, WavError> {
    let wants_wav = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("wav"));
    let wrap = wants_wav && matches!(format.encoding, AudioEncoding::Pcm16 | AudioEncoding::PcmF32);

    let bytes = if wrap {
        pcm_to_wav(audio, format)?
    } else {
        audio.to_vec()
    };
    let mut file = std::fs::File::create(path)?;
    file.write_all(&bytes)?;
    Ok(wrap)
}
