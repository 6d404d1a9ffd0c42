//! Seshat - voice-activity utterance capture
//!
//! Turns a host-supplied microphone stream into discrete spoken utterances
//! and dispatches them to an HTTP transcription endpoint, driving a text
//! input in a conversational interface. The host owns the devices and the
//! UI; this crate owns the level sensing, the recording state machine,
//! chunk retention and assembly, and the generation-safe dispatch of
//! finished utterances.
//!
//! ```no_run
//! use seshat::config::Config;
//! use seshat::session::{Collaborators, Session};
//! # use seshat::capture::{CaptureError, CaptureSource, Recorder};
//! # use seshat::host::HostCallbacks;
//! # use std::sync::atomic::AtomicBool;
//! # use std::sync::Arc;
//! # struct Mic;
//! # impl CaptureSource for Mic {
//! #     fn start(&mut self) -> Result<(), CaptureError> { Ok(()) }
//! #     fn stop(&mut self) {}
//! # }
//! # struct Rec;
//! # impl Recorder for Rec {
//! #     fn start(&mut self) -> Result<(), CaptureError> { Ok(()) }
//! #     fn stop(&mut self) {}
//! #     fn is_running(&self) -> bool { false }
//! # }
//! # struct Chat;
//! # impl HostCallbacks for Chat {
//! #     fn on_utterance_text(&self, text: &str) { println!("{text}"); }
//! # }
//!
//! let runtime = tokio::runtime::Runtime::new().unwrap();
//! let session = Session::spawn(
//!     Config::default(),
//!     Collaborators {
//!         source: Box::new(Mic),
//!         recorder: Box::new(Rec),
//!         host: Arc::new(Chat),
//!         playback_active: Arc::new(AtomicBool::new(false)),
//!     },
//!     runtime.handle().clone(),
//! );
//!
//! let handle = session.handle();
//! handle.start();
//! // ...host pushes frames and chunks from its capture callbacks...
//! handle.push_frame(&[0.0; 512]);
//! handle.stop();
//! ```

pub mod audio;
pub mod capture;
pub mod config;
pub mod host;
pub mod level;
pub mod session;
pub mod transcription;

pub use audio::{AudioChunk, ChunkAssembler};
pub use capture::{CaptureError, CaptureSource, Recorder};
pub use config::Config;
pub use host::HostCallbacks;
pub use level::LevelDetector;
pub use session::{Collaborators, Session, SessionHandle, SessionState};
