//! Host callback surface
//!
//! The session delivers its outputs through this trait: accepted utterance
//! text, non-fatal transcription warnings, and capture-acquisition errors.
//! Implementations run on the session's threads and must be cheap; a panic
//! inside `on_utterance_text` is caught and logged so it cannot wedge the
//! session.

use crate::capture::CaptureError;

/// Callbacks into the embedding application
pub trait HostCallbacks: Send + Sync {
    /// A finalised utterance was transcribed and accepted.
    ///
    /// Invoked at most once per utterance.
    fn on_utterance_text(&self, text: &str);

    /// A transcription attempt failed; capture continues regardless.
    fn on_warning(&self, message: &str) {
        tracing::warn!("{}", message);
    }

    /// Acquiring the capture source failed; the session stays inactive.
    fn on_capture_error(&self, error: &CaptureError) {
        tracing::error!("Capture error: {}", error);
    }
}
