//! Utterance payload packaging
//!
//! Assembles the ordered chunks of a finished utterance into a single
//! encoded payload for the transcription request. No transcoding happens
//! here: `Raw` mode concatenates the recorder's own container stream, and
//! `Wav` mode wraps bare PCM chunks in a WAV header for hosts whose
//! recorder emits unframed samples.

use super::chunk::AudioChunk;
use crate::config::PayloadEncoding;
use std::io::Cursor;

/// Convert f32 samples to i16 with proper scaling
pub fn f32_to_i16(samples: &[f32]) -> Vec<i16> {
    samples
        .iter()
        .map(|&s| (s * 32767.0).clamp(-32768.0, 32767.0) as i16)
        .collect()
}

/// Convert i16 samples to f32 with proper scaling
pub fn i16_to_f32(samples: &[i16]) -> Vec<f32> {
    samples.iter().map(|&s| s as f32 / 32768.0).collect()
}

/// Wrap mono 16-bit PCM samples in an in-memory WAV container
pub fn encode_wav(samples: &[i16], sample_rate: u32) -> Result<Vec<u8>, hound::Error> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = hound::WavWriter::new(&mut cursor, spec)?;
        for &sample in samples {
            writer.write_sample(sample)?;
        }
        writer.finalize()?;
    }

    Ok(cursor.into_inner())
}

/// Reinterpret chunk bytes as little-endian i16 PCM samples
fn bytes_to_pcm(chunks: &[AudioChunk]) -> Vec<i16> {
    let total: usize = chunks.iter().map(|c| c.len()).sum();
    let mut samples = Vec::with_capacity(total / 2);
    for chunk in chunks {
        for pair in chunk.data.chunks_exact(2) {
            samples.push(i16::from_le_bytes([pair[0], pair[1]]));
        }
    }
    samples
}

/// Assemble ordered utterance chunks into one payload
pub fn assemble_payload(
    chunks: &[AudioChunk],
    encoding: PayloadEncoding,
    sample_rate: u32,
) -> Result<Vec<u8>, hound::Error> {
    match encoding {
        PayloadEncoding::Raw => {
            let total: usize = chunks.iter().map(|c| c.len()).sum();
            let mut payload = Vec::with_capacity(total);
            for chunk in chunks {
                payload.extend_from_slice(&chunk.data);
            }
            Ok(payload)
        }
        PayloadEncoding::Wav => encode_wav(&bytes_to_pcm(chunks), sample_rate),
    }
}
