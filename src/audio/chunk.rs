//! Utterance chunk accumulation
//!
//! Collects the binary chunks the recorder emits while an utterance is in
//! progress, plus the single retained chunk held while listening so the
//! onset of speech is not truncated: the analysis tick that notices the
//! threshold crossing lags the actual onset by one buffering interval, and
//! the retained chunk covers exactly that gap.

use chrono::{DateTime, Utc};

/// An opaque, ordered, timestamped binary buffer emitted by the recorder
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioChunk {
    /// Encoded audio bytes, exactly as the recorder produced them
    pub data: Vec<u8>,
    /// Wall-clock receipt time, for diagnostics
    pub received_at: DateTime<Utc>,
}

impl AudioChunk {
    /// Wrap recorder bytes, stamping the receipt time
    pub fn new(data: Vec<u8>) -> Self {
        Self {
            data,
            received_at: Utc::now(),
        }
    }

    /// Size of the chunk in bytes
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether the chunk carries no bytes
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Accumulates recorder chunks into the current utterance
///
/// Not state-aware: the session's effect interpreter decides whether an
/// incoming chunk is retained, promoted, or appended. The only chunk ever
/// silently dropped is a retained chunk superseded by a newer one.
#[derive(Debug, Default)]
pub struct ChunkAssembler {
    /// Most recent pre-onset chunk, held while listening
    retained: Option<AudioChunk>,
    /// Ordered chunks of the utterance in progress
    chunks: Vec<AudioChunk>,
}

impl ChunkAssembler {
    /// Create an empty assembler
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the retained slot with the given chunk.
    ///
    /// The previously retained chunk, if any, is discarded.
    pub fn retain(&mut self, chunk: AudioChunk) {
        if self.retained.is_some() {
            tracing::trace!("Superseding retained chunk");
        }
        self.retained = Some(chunk);
    }

    /// Move the retained chunk (if any) to the front of the utterance.
    ///
    /// Called on the listening-to-recording edge so the audio slice that
    /// preceded the detected onset opens the utterance.
    pub fn promote_retained(&mut self) {
        if let Some(chunk) = self.retained.take() {
            self.chunks.insert(0, chunk);
        }
    }

    /// Append a chunk to the utterance in progress
    pub fn append(&mut self, chunk: AudioChunk) {
        self.chunks.push(chunk);
    }

    /// Drain and return the accumulated utterance.
    ///
    /// Safe to call repeatedly: a second call without new chunks returns an
    /// empty list.
    pub fn take_utterance(&mut self) -> Vec<AudioChunk> {
        std::mem::take(&mut self.chunks)
    }

    /// Drop the retained chunk and any accumulated utterance
    pub fn clear(&mut self) {
        self.retained = None;
        self.chunks.clear();
    }

    /// Number of chunks in the utterance in progress
    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    /// Whether the utterance in progress is empty
    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// Whether a pre-onset chunk is currently retained
    pub fn has_retained(&self) -> bool {
        self.retained.is_some()
    }
}
