//! Recording session state machine
//!
//! Defines the states of a capture session and the pure transition table
//! that drives them. `transition` decides what the next state is and which
//! side effects the runtime must perform; it never performs any itself, so
//! the whole table is testable without mocking I/O.

use crate::audio::chunk::AudioChunk;
use crate::capture::CaptureError;
use serde::{Deserialize, Serialize};

/// Recording session state
///
/// Exactly one state at a time. `Inactive` is the resting state; the
/// machine is otherwise cyclic, looping through `Listening` → `Recording`
/// → `Waiting` → `Processing` → `Listening` for each utterance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    /// Capture is off
    #[default]
    Inactive,
    /// Acquiring the capture source
    Activating,
    /// Monitoring levels, waiting for speech to begin
    Listening,
    /// Speech detected; recorder running, chunks accumulating
    Recording,
    /// Sustained silence; grace period for the speaker to resume
    Waiting,
    /// Utterance finished; handing it to the dispatcher
    Processing,
}

impl SessionState {
    /// Returns a human-readable description of the state
    pub fn description(&self) -> &'static str {
        match self {
            SessionState::Inactive => "Capture off",
            SessionState::Activating => "Acquiring microphone",
            SessionState::Listening => "Listening for speech",
            SessionState::Recording => "Recording speech",
            SessionState::Waiting => "Waiting for speech to resume",
            SessionState::Processing => "Finalising utterance",
        }
    }

    /// Whether analysis frames are being consumed in this state
    pub fn is_monitoring(&self) -> bool {
        !matches!(self, SessionState::Inactive | SessionState::Activating)
    }

    /// Whether recorder chunks accumulate into the utterance in this state
    pub fn accumulates_chunks(&self) -> bool {
        matches!(self, SessionState::Recording | SessionState::Waiting)
    }
}

/// Inputs to the state machine
///
/// The four externally-sourced event kinds (analysis tick, recorder chunk,
/// timer firing, user command) plus the acknowledgements the runtime feeds
/// back after performing an effect.
#[derive(Debug, Clone)]
pub enum SessionInput {
    /// User asked to begin capture
    Start,
    /// User asked to end capture
    Stop,
    /// The capture source was acquired
    SourceReady,
    /// The capture source could not be acquired
    SourceFailed { error: CaptureError },
    /// Per-tick level evaluation of the latest analysis frame
    Level { voice: bool, playback_active: bool },
    /// The recorder produced a chunk
    Chunk(AudioChunk),
    /// The silence window elapsed without renewed energy
    SilenceElapsed,
    /// The waiting window elapsed without renewed energy
    WaitingElapsed,
    /// The finished utterance was handed to the dispatcher
    Finalized,
}

/// Side effects requested by a transition, executed by the runtime
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// Start the capture source (analysis stream)
    AcquireSource,
    /// Stop the capture source
    ReleaseSource,
    /// Start the chunk recorder if it is not already running
    StartRecorder,
    /// Stop the chunk recorder
    StopRecorder,
    /// Replace the retained pre-onset chunk
    RetainChunk(AudioChunk),
    /// Move the retained chunk to the front of the utterance
    PromoteRetained,
    /// Append a chunk to the utterance
    AppendChunk(AudioChunk),
    /// Drop the retained chunk and the accumulated utterance
    ClearChunks,
    /// Start the silence timer if it is not already running
    ArmSilenceTimer,
    /// Cancel the silence timer
    CancelSilenceTimer,
    /// Start the waiting timer
    ArmWaitingTimer,
    /// Cancel the waiting timer
    CancelWaitingTimer,
    /// Cancel every pending timer
    CancelAllTimers,
    /// Take the utterance and dispatch it for transcription
    FinalizeUtterance,
    /// Report a capture failure to the host
    SurfaceError { error: CaptureError },
}

/// Result of a state transition
#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
    /// The state after the transition
    pub next: SessionState,
    /// Effects to execute, in order
    pub effects: Vec<Effect>,
}

/// Process one input against the current state.
///
/// Returns `None` when the input does not apply to the state — notably,
/// ticks and chunks arriving after teardown are ignored in `Inactive`, and
/// a chunk landing in `Processing` after the recorder was told to stop
/// belongs to the already-finalised utterance and is dropped.
pub fn transition(state: SessionState, input: SessionInput) -> Option<Transition> {
    match (state, input) {
        // User stop wins from every active state
        (SessionState::Inactive, SessionInput::Stop) => None,
        (_, SessionInput::Stop) => Some(Transition {
            next: SessionState::Inactive,
            effects: vec![
                Effect::StopRecorder,
                Effect::ReleaseSource,
                Effect::CancelAllTimers,
                Effect::ClearChunks,
            ],
        }),

        (SessionState::Inactive, SessionInput::Start) => Some(Transition {
            next: SessionState::Activating,
            effects: vec![Effect::AcquireSource],
        }),

        (SessionState::Activating, SessionInput::SourceReady) => Some(Transition {
            next: SessionState::Listening,
            effects: vec![Effect::ClearChunks, Effect::CancelAllTimers],
        }),
        (SessionState::Activating, SessionInput::SourceFailed { error }) => Some(Transition {
            next: SessionState::Inactive,
            effects: vec![Effect::ReleaseSource, Effect::SurfaceError { error }],
        }),

        // Speech onset requires energy above threshold AND no synthesized
        // speech currently playing, so the session cannot re-trigger on its
        // own spoken output.
        (
            SessionState::Listening,
            SessionInput::Level {
                voice: true,
                playback_active: false,
            },
        ) => Some(Transition {
            next: SessionState::Recording,
            effects: vec![Effect::PromoteRetained, Effect::StartRecorder],
        }),
        (SessionState::Listening, SessionInput::Level { .. }) => None,
        (SessionState::Listening, SessionInput::Chunk(chunk)) => Some(Transition {
            next: SessionState::Listening,
            effects: vec![Effect::RetainChunk(chunk)],
        }),

        (SessionState::Recording, SessionInput::Chunk(chunk)) => Some(Transition {
            next: SessionState::Recording,
            effects: vec![Effect::AppendChunk(chunk)],
        }),
        (SessionState::Recording, SessionInput::Level { voice: true, .. }) => Some(Transition {
            next: SessionState::Recording,
            effects: vec![Effect::CancelSilenceTimer],
        }),
        (SessionState::Recording, SessionInput::Level { voice: false, .. }) => Some(Transition {
            next: SessionState::Recording,
            effects: vec![Effect::ArmSilenceTimer],
        }),
        (SessionState::Recording, SessionInput::SilenceElapsed) => Some(Transition {
            next: SessionState::Waiting,
            effects: vec![Effect::ArmWaitingTimer],
        }),

        // The recorder keeps running through the grace period: a natural
        // pause inside a sentence must not clip the utterance.
        (SessionState::Waiting, SessionInput::Chunk(chunk)) => Some(Transition {
            next: SessionState::Waiting,
            effects: vec![Effect::AppendChunk(chunk)],
        }),
        (SessionState::Waiting, SessionInput::Level { voice: true, .. }) => Some(Transition {
            next: SessionState::Recording,
            effects: vec![Effect::CancelWaitingTimer],
        }),
        (SessionState::Waiting, SessionInput::WaitingElapsed) => Some(Transition {
            next: SessionState::Processing,
            effects: vec![Effect::StopRecorder, Effect::FinalizeUtterance],
        }),

        (SessionState::Processing, SessionInput::Finalized) => Some(Transition {
            next: SessionState::Listening,
            effects: vec![Effect::ClearChunks, Effect::CancelAllTimers],
        }),

        _ => None,
    }
}
