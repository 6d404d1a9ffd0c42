//! Capture session runtime
//!
//! Owns the single-consumer event queue and the side-effect interpreter
//! around the pure state machine in [`state`]. Analysis ticks, recorder
//! chunks and user commands arrive on one channel and are applied as
//! cooperative, non-overlapping steps on a dedicated thread; timer firings
//! are synthesised by the same loop from its deadline table, so no two
//! state mutations ever race. The only concurrent element is the
//! transcription request, which runs on the async runtime and is fenced by
//! the generation counter rather than by locking.

pub mod state;
pub mod timers;

pub use state::{Effect, SessionInput, SessionState, Transition};

use crate::audio::chunk::{AudioChunk, ChunkAssembler};
use crate::capture::{CaptureSource, Recorder};
use crate::config::Config;
use crate::host::HostCallbacks;
use crate::level::LevelDetector;
use crate::transcription::{HttpTranscriber, Transcribe, TranscriptionDispatcher};
use anyhow::anyhow;
use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender};
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;
use timers::{TimerKind, TimerTable};
use uuid::Uuid;

/// Events funnelled onto the single session queue.
///
/// Ticks and chunks are pushed by the host, commands come from the handle,
/// and timer firings are synthesised by the loop itself when a deadline
/// passes. All four kinds mutate state on the one consumer thread.
#[derive(Debug)]
enum SessionEvent {
    /// Analysis frame window from the host's scheduling callback
    Tick { frame: Vec<f32> },
    /// Encoded chunk from the recorder
    ChunkReady { chunk: AudioChunk },
    /// A single-shot deadline passed
    TimerFired { kind: TimerKind },
    /// User/host command
    Command { command: SessionCommand },
}

/// Commands accepted through the session handle
#[derive(Debug)]
enum SessionCommand {
    Start,
    Stop,
    Reconfigure(Box<Config>),
    Shutdown,
}

/// External collaborators wired into a session
pub struct Collaborators {
    /// The analysis sample stream
    pub source: Box<dyn CaptureSource>,
    /// The chunk-emitting recorder
    pub recorder: Box<dyn Recorder>,
    /// Callbacks into the embedding application
    pub host: Arc<dyn HostCallbacks>,
    /// True while the host is playing synthesized speech; suppresses
    /// re-triggering on the session's own spoken output
    pub playback_active: Arc<AtomicBool>,
}

/// Cross-thread snapshot of the session
struct Shared {
    state: Mutex<SessionState>,
    generation: Arc<AtomicU64>,
    activity: Mutex<Activity>,
}

/// Activity timestamps for the diagnostic snapshot
#[derive(Debug, Clone, Copy, Default)]
struct Activity {
    /// When the last analysis frame arrived
    last_audio: Option<Instant>,
    /// When the current silence window opened
    silence_started: Option<Instant>,
}

/// Diagnostic snapshot of a running session
#[derive(Debug, Clone, Serialize)]
pub struct SessionStatus {
    /// Current state
    pub state: SessionState,
    /// Current utterance generation
    pub generation: u64,
    /// State description for display
    pub description: String,
    /// Milliseconds since the last analysis frame arrived
    pub last_audio_ms: Option<u64>,
    /// Milliseconds the current silence window has been open
    pub silence_ms: Option<u64>,
}

/// Cloneable handle for driving a session
///
/// Frames and chunks pushed after teardown are accepted onto the queue but
/// ignored by the machine, so host callbacks racing a stop can never mutate
/// session state.
#[derive(Clone)]
pub struct SessionHandle {
    tx: Sender<SessionEvent>,
    shared: Arc<Shared>,
}

impl SessionHandle {
    /// Begin capture (Inactive → Activating → Listening)
    pub fn start(&self) {
        self.send(SessionEvent::Command {
            command: SessionCommand::Start,
        });
    }

    /// End capture from any state
    pub fn stop(&self) {
        self.send(SessionEvent::Command {
            command: SessionCommand::Stop,
        });
    }

    /// Push one analysis frame window (host scheduling callback)
    pub fn push_frame(&self, frame: &[f32]) {
        self.send(SessionEvent::Tick {
            frame: frame.to_vec(),
        });
    }

    /// Push one encoded recorder chunk
    pub fn push_chunk(&self, data: Vec<u8>) {
        self.send(SessionEvent::ChunkReady {
            chunk: AudioChunk::new(data),
        });
    }

    /// Hand the session a reloaded configuration.
    ///
    /// Applied immediately when idle or listening; otherwise deferred to
    /// the next return to listening so an in-progress utterance is never
    /// disturbed.
    pub fn reconfigure(&self, config: Config) {
        self.send(SessionEvent::Command {
            command: SessionCommand::Reconfigure(Box::new(config)),
        });
    }

    /// Current state snapshot
    pub fn state(&self) -> SessionState {
        *self.shared.state.lock()
    }

    /// Current utterance generation
    pub fn generation(&self) -> u64 {
        self.shared.generation.load(Ordering::SeqCst)
    }

    /// Diagnostic snapshot
    pub fn status(&self) -> SessionStatus {
        let state = self.state();
        let activity = *self.shared.activity.lock();
        SessionStatus {
            state,
            generation: self.generation(),
            description: state.description().to_string(),
            last_audio_ms: activity.last_audio.map(|t| t.elapsed().as_millis() as u64),
            silence_ms: activity.silence_started.map(|t| t.elapsed().as_millis() as u64),
        }
    }

    fn send(&self, event: SessionEvent) {
        if self.tx.send(event).is_err() {
            tracing::warn!("Session loop is gone; event dropped");
        }
    }
}

/// A spawned capture session
///
/// Each session is independent: multiple sessions can run side by side
/// (separate tests, separate microphones) with no shared state.
pub struct Session {
    handle: SessionHandle,
    thread: Option<std::thread::JoinHandle<()>>,
}

impl Session {
    /// Spawn a session with the default HTTP transcriber from `config`
    pub fn spawn(
        config: Config,
        collaborators: Collaborators,
        runtime: tokio::runtime::Handle,
    ) -> Session {
        let transcriber = Arc::new(HttpTranscriber::new(
            config.transcription.endpoint_url.clone(),
            config.transcription.timeout_secs,
        ));
        Self::spawn_with_transcriber(config, collaborators, transcriber, runtime)
    }

    /// Spawn a session with an explicit transcription backend
    pub fn spawn_with_transcriber(
        config: Config,
        collaborators: Collaborators,
        transcriber: Arc<dyn Transcribe>,
        runtime: tokio::runtime::Handle,
    ) -> Session {
        let (tx, rx) = unbounded();
        let generation = Arc::new(AtomicU64::new(0));
        let shared = Arc::new(Shared {
            state: Mutex::new(SessionState::Inactive),
            generation: generation.clone(),
            activity: Mutex::new(Activity::default()),
        });

        let dispatcher = TranscriptionDispatcher::new(
            transcriber,
            collaborators.host.clone(),
            generation,
            config.transcription.payload,
            config.capture.sample_rate,
            runtime,
        );

        let worker = SessionWorker {
            id: Uuid::new_v4(),
            detector: LevelDetector::new(config.detection.silence_threshold),
            config,
            pending_config: None,
            state: SessionState::Inactive,
            assembler: ChunkAssembler::new(),
            timers: TimerTable::new(),
            source: collaborators.source,
            recorder: collaborators.recorder,
            host: collaborators.host,
            playback_active: collaborators.playback_active,
            dispatcher,
            shared: shared.clone(),
        };

        tracing::info!("Spawning capture session {}", worker.id);
        let thread = std::thread::Builder::new()
            .name("seshat-session".to_string())
            .spawn(move || run_loop(worker, rx))
            .expect("Failed to spawn session thread");

        Session {
            handle: SessionHandle { tx, shared },
            thread: Some(thread),
        }
    }

    /// A cloneable handle for driving this session
    pub fn handle(&self) -> SessionHandle {
        self.handle.clone()
    }

    /// Current state snapshot
    pub fn state(&self) -> SessionState {
        self.handle.state()
    }

    /// Stop capture, end the loop thread, and wait for it to exit
    pub fn shutdown(mut self) -> anyhow::Result<()> {
        self.handle.send(SessionEvent::Command {
            command: SessionCommand::Shutdown,
        });
        if let Some(thread) = self.thread.take() {
            thread
                .join()
                .map_err(|_| anyhow!("Session thread panicked"))?;
        }
        Ok(())
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if self.thread.is_some() {
            let _ = self.handle.tx.send(SessionEvent::Command {
                command: SessionCommand::Shutdown,
            });
        }
    }
}

/// Loop-owned session state and collaborators
struct SessionWorker {
    id: Uuid,
    config: Config,
    /// Config received mid-utterance, applied on the next return to listening
    pending_config: Option<Config>,
    detector: LevelDetector,
    state: SessionState,
    assembler: ChunkAssembler,
    timers: TimerTable,
    source: Box<dyn CaptureSource>,
    recorder: Box<dyn Recorder>,
    host: Arc<dyn HostCallbacks>,
    playback_active: Arc<AtomicBool>,
    dispatcher: TranscriptionDispatcher,
    shared: Arc<Shared>,
}

/// Consume the queue until shutdown.
///
/// When a timer is armed the wait is bounded by its deadline; on expiry the
/// fired timer is fed through the same event path as everything else.
fn run_loop(mut worker: SessionWorker, rx: Receiver<SessionEvent>) {
    loop {
        let event = match worker.timers.next_deadline() {
            Some(deadline) => match rx.recv_deadline(deadline) {
                Ok(event) => event,
                Err(RecvTimeoutError::Timeout) => {
                    match worker.timers.take_expired(Instant::now()) {
                        Some(kind) => SessionEvent::TimerFired { kind },
                        None => continue,
                    }
                }
                Err(RecvTimeoutError::Disconnected) => break,
            },
            None => match rx.recv() {
                Ok(event) => event,
                Err(_) => break,
            },
        };

        if matches!(
            event,
            SessionEvent::Command {
                command: SessionCommand::Shutdown
            }
        ) {
            worker.teardown();
            break;
        }

        worker.handle_event(event);
    }

    tracing::debug!("Session {} loop exiting", worker.id);
}

impl SessionWorker {
    /// Translate a queue event into a machine input and apply it
    fn handle_event(&mut self, event: SessionEvent) {
        let input = match event {
            SessionEvent::Tick { frame } => {
                self.shared.activity.lock().last_audio = Some(Instant::now());
                Some(SessionInput::Level {
                    voice: self.detector.is_voice(&frame),
                    playback_active: self.playback_active.load(Ordering::Relaxed),
                })
            }
            SessionEvent::ChunkReady { chunk } => Some(SessionInput::Chunk(chunk)),
            SessionEvent::TimerFired { kind } => Some(match kind {
                TimerKind::Silence => SessionInput::SilenceElapsed,
                TimerKind::Waiting => SessionInput::WaitingElapsed,
            }),
            SessionEvent::Command { command } => match command {
                SessionCommand::Start => Some(SessionInput::Start),
                SessionCommand::Stop => Some(SessionInput::Stop),
                SessionCommand::Reconfigure(config) => {
                    self.reconfigure(*config);
                    None
                }
                SessionCommand::Shutdown => None,
            },
        };

        if let Some(input) = input {
            self.apply(input);
        }
    }

    /// Run the machine on one input, executing effects and any follow-up
    /// inputs they produce, until the step settles
    fn apply(&mut self, input: SessionInput) {
        let mut pending = VecDeque::from([input]);

        while let Some(input) = pending.pop_front() {
            let Some(Transition { next, effects }) = state::transition(self.state, input) else {
                continue;
            };

            if next != self.state {
                tracing::info!(
                    "Session {} transition: {:?} -> {:?}",
                    self.id,
                    self.state,
                    next
                );
            }
            self.state = next;
            *self.shared.state.lock() = next;

            for effect in effects {
                self.run_effect(effect, &mut pending);
            }

            if next == SessionState::Listening {
                self.apply_pending_config();
            }
        }
    }

    /// Execute one side effect requested by the machine
    fn run_effect(&mut self, effect: Effect, follow_ups: &mut VecDeque<SessionInput>) {
        match effect {
            Effect::AcquireSource => match self.source.start() {
                Ok(()) => follow_ups.push_back(SessionInput::SourceReady),
                Err(error) => follow_ups.push_back(SessionInput::SourceFailed { error }),
            },
            Effect::ReleaseSource => self.source.stop(),
            Effect::StartRecorder => {
                if !self.recorder.is_running() {
                    if let Err(error) = self.recorder.start() {
                        tracing::error!("Failed to start recorder: {}", error);
                        self.host.on_capture_error(&error);
                    }
                }
            }
            Effect::StopRecorder => {
                if self.recorder.is_running() {
                    self.recorder.stop();
                }
            }
            Effect::RetainChunk(chunk) => self.assembler.retain(chunk),
            Effect::PromoteRetained => self.assembler.promote_retained(),
            Effect::AppendChunk(chunk) => self.assembler.append(chunk),
            Effect::ClearChunks => self.assembler.clear(),
            Effect::ArmSilenceTimer => {
                if !self.timers.is_armed(TimerKind::Silence) {
                    self.shared.activity.lock().silence_started = Some(Instant::now());
                }
                self.timers
                    .arm(TimerKind::Silence, self.config.detection.silence_duration());
            }
            Effect::CancelSilenceTimer => {
                self.timers.cancel(TimerKind::Silence);
                self.shared.activity.lock().silence_started = None;
            }
            Effect::ArmWaitingTimer => {
                self.timers
                    .arm(TimerKind::Waiting, self.config.detection.waiting_timeout());
            }
            Effect::CancelWaitingTimer => self.timers.cancel(TimerKind::Waiting),
            Effect::CancelAllTimers => {
                self.timers.cancel_all();
                self.shared.activity.lock().silence_started = None;
            }
            Effect::FinalizeUtterance => {
                let utterance = self.assembler.take_utterance();
                let generation = self.dispatcher.begin_generation();
                self.dispatcher.finalize(utterance, generation);
                follow_ups.push_back(SessionInput::Finalized);
            }
            Effect::SurfaceError { error } => {
                tracing::error!("Session {} capture failed: {}", self.id, error);
                self.host.on_capture_error(&error);
            }
        }
    }

    /// Accept a reloaded configuration.
    ///
    /// Mid-utterance reloads are stashed and applied on the next entry to
    /// listening; otherwise they take effect immediately.
    fn reconfigure(&mut self, config: Config) {
        match self.state {
            SessionState::Inactive | SessionState::Activating | SessionState::Listening => {
                self.apply_config(config);
            }
            _ => {
                tracing::debug!("Deferring settings reload until utterance completes");
                self.pending_config = Some(config);
            }
        }
    }

    fn apply_pending_config(&mut self) {
        if let Some(config) = self.pending_config.take() {
            self.apply_config(config);
        }
    }

    fn apply_config(&mut self, config: Config) {
        self.detector
            .set_threshold(config.detection.silence_threshold);
        self.dispatcher
            .set_encoding(config.transcription.payload, config.capture.sample_rate);
        tracing::info!(
            "Session {} settings applied (threshold {}, silence {}ms, waiting {}ms)",
            self.id,
            config.detection.silence_threshold,
            config.detection.silence_duration_ms,
            config.detection.waiting_timeout_ms
        );
        self.config = config;
    }

    /// Final teardown on shutdown: equivalent to a user stop
    fn teardown(&mut self) {
        self.apply(SessionInput::Stop);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::CaptureError;
    use crate::transcription::TranscribeError;
    use async_trait::async_trait;

    struct NullHost;

    impl HostCallbacks for NullHost {
        fn on_utterance_text(&self, _text: &str) {}
    }

    struct NullSource;

    impl CaptureSource for NullSource {
        fn start(&mut self) -> Result<(), CaptureError> {
            Ok(())
        }
        fn stop(&mut self) {}
    }

    struct NullRecorder {
        running: bool,
    }

    impl Recorder for NullRecorder {
        fn start(&mut self) -> Result<(), CaptureError> {
            self.running = true;
            Ok(())
        }
        fn stop(&mut self) {
            self.running = false;
        }
        fn is_running(&self) -> bool {
            self.running
        }
    }

    struct NullTranscriber;

    #[async_trait]
    impl Transcribe for NullTranscriber {
        async fn transcribe(&self, _audio_base64: &str) -> Result<String, TranscribeError> {
            Ok(String::new())
        }
    }

    fn collaborators() -> Collaborators {
        Collaborators {
            source: Box::new(NullSource),
            recorder: Box::new(NullRecorder { running: false }),
            host: Arc::new(NullHost),
            playback_active: Arc::new(AtomicBool::new(false)),
        }
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_spawned_session_is_inactive() {
        let session = Session::spawn_with_transcriber(
            Config::default(),
            collaborators(),
            Arc::new(NullTranscriber),
            tokio::runtime::Handle::current(),
        );
        assert_eq!(session.state(), SessionState::Inactive);
        session.shutdown().unwrap();
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_status_snapshot() {
        let session = Session::spawn_with_transcriber(
            Config::default(),
            collaborators(),
            Arc::new(NullTranscriber),
            tokio::runtime::Handle::current(),
        );
        let status = session.handle().status();
        assert_eq!(status.state, SessionState::Inactive);
        assert_eq!(status.generation, 0);
        assert_eq!(status.description, "Capture off");
        session.shutdown().unwrap();
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_handles_are_cloneable() {
        let session = Session::spawn_with_transcriber(
            Config::default(),
            collaborators(),
            Arc::new(NullTranscriber),
            tokio::runtime::Handle::current(),
        );
        let a = session.handle();
        let b = a.clone();
        assert_eq!(a.state(), b.state());
        session.shutdown().unwrap();
    }
}
