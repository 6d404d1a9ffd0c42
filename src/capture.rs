//! Capture collaborator interfaces
//!
//! The crate never touches device APIs: the host owns microphone access,
//! permissions, and the actual sample stream, and hands the session a pair
//! of collaborators through these traits. Analysis frames and recorder
//! chunks are pushed by the host through the session handle; the session
//! only ever tells the collaborators to start and stop.

use serde::Serialize;

/// Errors surfaced by the host's capture backend
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error, Serialize)]
pub enum CaptureError {
    /// The user denied microphone access
    #[error("Microphone permission denied")]
    PermissionDenied,

    /// No usable input device
    #[error("Input device unavailable: {0}")]
    DeviceUnavailable(String),

    /// Any other backend failure
    #[error("Capture backend error: {0}")]
    Backend(String),
}

/// The analysis sample stream
///
/// Started when the session activates; once started, the host pushes frame
/// windows through `SessionHandle::push_frame` on every scheduling tick.
/// `stop` must take effect synchronously: after it returns, the host must
/// push no further frames.
pub trait CaptureSource: Send {
    /// Begin supplying analysis frames
    fn start(&mut self) -> Result<(), CaptureError>;

    /// Stop the stream synchronously
    fn stop(&mut self);
}

/// The chunk-emitting recorder
///
/// Started when speech is detected; while running, the host pushes encoded
/// chunks through `SessionHandle::push_chunk` as the recorder produces
/// them. The session may call `start` while already running (re-entry from
/// the waiting pause); implementations must treat that as a no-op.
pub trait Recorder: Send {
    /// Begin emitting chunks
    fn start(&mut self) -> Result<(), CaptureError>;

    /// Stop emitting chunks synchronously
    fn stop(&mut self);

    /// Whether the recorder is currently emitting
    fn is_running(&self) -> bool;
}
