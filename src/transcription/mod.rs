//! Utterance transcription
//!
//! Packages the chunks of a finished utterance, sends them to the
//! transcription endpoint, filters the text, and delivers it to the host —
//! guarding against stale responses from superseded utterances.

pub mod client;
pub mod dispatcher;
pub mod filter;

pub use client::HttpTranscriber;
pub use dispatcher::TranscriptionDispatcher;

use async_trait::async_trait;

/// Errors from the transcription endpoint
#[derive(Debug, Clone, thiserror::Error)]
pub enum TranscribeError {
    /// Could not reach the endpoint
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// The request exceeded the configured timeout
    #[error("Request timeout after {0} seconds")]
    Timeout(u64),

    /// The endpoint answered with a non-success status
    #[error("Server error ({status}): {message}")]
    ServerError { status: u16, message: String },

    /// The response body was not in the expected shape
    #[error("Failed to parse response: {0}")]
    ParseError(String),
}

/// The transcription service seam
///
/// Implemented by [`HttpTranscriber`] for the real endpoint; tests
/// substitute scripted implementations.
#[async_trait]
pub trait Transcribe: Send + Sync {
    /// Transcribe one base64-encoded audio payload
    async fn transcribe(&self, audio_base64: &str) -> Result<String, TranscribeError>;
}
