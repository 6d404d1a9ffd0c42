//! HTTP client for the transcription endpoint
//!
//! Sends one `POST` per finalised utterance with the base64-encoded audio
//! payload and reads back the transcribed text. Failures are not retried:
//! an utterance is dropped on error and the next one is independent.

use super::{Transcribe, TranscribeError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Request body for the transcription endpoint
#[derive(Debug, Serialize)]
struct TranscribeRequest<'a> {
    audio: &'a str,
}

/// Response from the transcription endpoint.
///
/// A missing or null `text` field is a valid empty result, not an error.
#[derive(Debug, Deserialize)]
struct TranscribeResponse {
    #[serde(default)]
    text: Option<String>,
}

/// HTTP transcriber
///
/// One client per session; connection pooling and the request timeout are
/// handled by `reqwest`.
#[derive(Debug, Clone)]
pub struct HttpTranscriber {
    endpoint_url: String,
    client: reqwest::Client,
    timeout: Duration,
}

impl HttpTranscriber {
    /// Create a transcriber for the given endpoint with the given timeout
    pub fn new(endpoint_url: impl Into<String>, timeout_secs: u64) -> Self {
        let timeout = Duration::from_secs(timeout_secs);
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .expect("Failed to create HTTP client");

        Self {
            endpoint_url: endpoint_url.into(),
            client,
            timeout,
        }
    }

    /// The configured request timeout
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// The configured endpoint URL
    pub fn endpoint_url(&self) -> &str {
        &self.endpoint_url
    }
}

#[async_trait]
impl Transcribe for HttpTranscriber {
    async fn transcribe(&self, audio_base64: &str) -> Result<String, TranscribeError> {
        let request = TranscribeRequest {
            audio: audio_base64,
        };

        tracing::debug!(
            "Sending transcription request ({} base64 bytes)",
            audio_base64.len()
        );

        let response = self
            .client
            .post(&self.endpoint_url)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    TranscribeError::Timeout(self.timeout.as_secs())
                } else {
                    TranscribeError::ConnectionFailed(e.to_string())
                }
            })?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = response
                .text()
                .await
                .unwrap_or_else(|_| "unknown error".to_string());
            return Err(TranscribeError::ServerError { status, message });
        }

        let body: TranscribeResponse = response
            .json()
            .await
            .map_err(|e| TranscribeError::ParseError(e.to_string()))?;

        Ok(body.text.unwrap_or_default())
    }
}
