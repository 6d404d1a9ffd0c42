//! Generation-safe utterance dispatch
//!
//! Packages the ordered chunks of a finished utterance, issues the
//! transcription request on the async runtime, and delivers the filtered
//! text to the host. The capture loop never waits on the network: it hands
//! the utterance over and resumes listening immediately. Responses that
//! arrive after a newer utterance has begun finalising are discarded via
//! the generation counter, and delivery is bounded to once per utterance
//! even if finalisation is somehow invoked twice for the same chunk list.

use super::{filter, Transcribe};
use crate::audio::chunk::AudioChunk;
use crate::audio::format;
use crate::config::PayloadEncoding;
use crate::host::HostCallbacks;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Dispatches finalised utterances to the transcription service
pub struct TranscriptionDispatcher {
    transcriber: Arc<dyn Transcribe>,
    host: Arc<dyn HostCallbacks>,
    /// Monotonic utterance tag; a response is stale once this has advanced
    generation: Arc<AtomicU64>,
    /// Highest generation already delivered to the host
    last_delivered: Arc<AtomicU64>,
    encoding: PayloadEncoding,
    sample_rate: u32,
    runtime: tokio::runtime::Handle,
}

impl TranscriptionDispatcher {
    /// Create a dispatcher
    pub fn new(
        transcriber: Arc<dyn Transcribe>,
        host: Arc<dyn HostCallbacks>,
        generation: Arc<AtomicU64>,
        encoding: PayloadEncoding,
        sample_rate: u32,
        runtime: tokio::runtime::Handle,
    ) -> Self {
        Self {
            transcriber,
            host,
            generation,
            last_delivered: Arc::new(AtomicU64::new(0)),
            encoding,
            sample_rate,
            runtime,
        }
    }

    /// Begin finalising a new utterance.
    ///
    /// Advances the generation counter, superseding any in-flight response.
    pub fn begin_generation(&self) -> u64 {
        self.generation.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// The current generation tag
    pub fn current_generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    /// Update the payload packaging mode (settings reload)
    pub fn set_encoding(&mut self, encoding: PayloadEncoding, sample_rate: u32) {
        self.encoding = encoding;
        self.sample_rate = sample_rate;
    }

    /// Dispatch a finalised utterance tagged with `generation`.
    ///
    /// Never blocks the caller. An empty utterance makes no network call at
    /// all; otherwise the request runs as a task on the async runtime.
    pub fn finalize(&self, utterance: Vec<AudioChunk>, generation: u64) {
        if utterance.is_empty() {
            tracing::debug!("Empty utterance, skipping dispatch");
            return;
        }

        let payload = match format::assemble_payload(&utterance, self.encoding, self.sample_rate) {
            Ok(payload) => payload,
            Err(e) => {
                self.host
                    .on_warning(&format!("Failed to package utterance audio: {}", e));
                return;
            }
        };

        tracing::info!(
            "Dispatching utterance generation {} ({} chunks, {} bytes)",
            generation,
            utterance.len(),
            payload.len()
        );

        let audio = BASE64.encode(payload);
        let transcriber = self.transcriber.clone();
        let host = self.host.clone();
        let current = self.generation.clone();
        let last_delivered = self.last_delivered.clone();

        self.runtime.spawn(async move {
            let result = transcriber.transcribe(&audio).await;

            // A newer utterance has begun finalising; this response must
            // not corrupt its downstream effects.
            if current.load(Ordering::SeqCst) != generation {
                tracing::debug!(
                    "Discarding stale transcription response (generation {})",
                    generation
                );
                return;
            }

            match result {
                Ok(text) => match filter::filter_result(&text) {
                    Some(text) => deliver(&host, &last_delivered, generation, &text),
                    None => {
                        tracing::debug!(
                            "Transcription result discarded by filter (generation {})",
                            generation
                        );
                    }
                },
                Err(e) => {
                    host.on_warning(&format!("Transcription failed: {}", e));
                }
            }
        });
    }
}

/// Deliver accepted text to the host at most once per generation.
///
/// A panic inside the host callback is caught and logged; the session keeps
/// capturing regardless.
fn deliver(host: &Arc<dyn HostCallbacks>, last_delivered: &AtomicU64, generation: u64, text: &str) {
    let previous = last_delivered.fetch_max(generation, Ordering::SeqCst);
    if previous >= generation {
        tracing::debug!(
            "Suppressing duplicate delivery for generation {}",
            generation
        );
        return;
    }

    tracing::info!("Delivering utterance text ({} chars)", text.len());
    if catch_unwind(AssertUnwindSafe(|| host.on_utterance_text(text))).is_err() {
        tracing::error!("Host utterance callback panicked");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transcription::TranscribeError;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use crossbeam_channel::{bounded, Receiver, Sender};
    use std::time::Duration;

    /// Transcriber scripted to return a fixed outcome after a fixed delay
    struct ScriptedTranscriber {
        text: Result<String, TranscribeError>,
        delay: Duration,
        calls: AtomicU64,
    }

    impl ScriptedTranscriber {
        fn ok(text: &str) -> Self {
            Self {
                text: Ok(text.to_string()),
                delay: Duration::ZERO,
                calls: AtomicU64::new(0),
            }
        }

        fn ok_after(text: &str, delay: Duration) -> Self {
            Self {
                text: Ok(text.to_string()),
                delay,
                calls: AtomicU64::new(0),
            }
        }

        fn failing() -> Self {
            Self {
                text: Err(TranscribeError::ConnectionFailed("refused".into())),
                delay: Duration::ZERO,
                calls: AtomicU64::new(0),
            }
        }
    }

    #[async_trait]
    impl Transcribe for ScriptedTranscriber {
        async fn transcribe(&self, _audio_base64: &str) -> Result<String, TranscribeError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            self.text.clone()
        }
    }

    /// Host that reports deliveries and warnings over channels
    struct RecordingHost {
        texts: Sender<String>,
        warnings: Mutex<Vec<String>>,
        panic_on_delivery: bool,
    }

    impl RecordingHost {
        fn new(texts: Sender<String>) -> Self {
            Self {
                texts,
                warnings: Mutex::new(Vec::new()),
                panic_on_delivery: false,
            }
        }
    }

    impl HostCallbacks for RecordingHost {
        fn on_utterance_text(&self, text: &str) {
            if self.panic_on_delivery {
                panic!("host exploded");
            }
            let _ = self.texts.send(text.to_string());
        }

        fn on_warning(&self, message: &str) {
            self.warnings.lock().push(message.to_string());
        }
    }

    fn chunk(byte: u8) -> AudioChunk {
        AudioChunk::new(vec![byte; 8])
    }

    fn channel() -> (Sender<String>, Receiver<String>) {
        bounded(16)
    }

    fn dispatcher(
        transcriber: Arc<ScriptedTranscriber>,
        host: Arc<RecordingHost>,
    ) -> TranscriptionDispatcher {
        TranscriptionDispatcher::new(
            transcriber,
            host,
            Arc::new(AtomicU64::new(0)),
            PayloadEncoding::Raw,
            16000,
            tokio::runtime::Handle::current(),
        )
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_empty_utterance_makes_no_network_call() {
        let (tx, _rx) = channel();
        let transcriber = Arc::new(ScriptedTranscriber::ok("hello"));
        let d = dispatcher(transcriber.clone(), Arc::new(RecordingHost::new(tx)));

        let generation = d.begin_generation();
        d.finalize(Vec::new(), generation);

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(transcriber.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_successful_dispatch_delivers_text() {
        let (tx, rx) = channel();
        let transcriber = Arc::new(ScriptedTranscriber::ok("  hello world  "));
        let d = dispatcher(transcriber, Arc::new(RecordingHost::new(tx)));

        let generation = d.begin_generation();
        d.finalize(vec![chunk(1), chunk(2)], generation);

        let text = rx.recv_timeout(Duration::from_secs(2)).unwrap();
        assert_eq!(text, "hello world");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_stale_generation_is_discarded() {
        let (tx, rx) = channel();
        let transcriber = Arc::new(ScriptedTranscriber::ok_after(
            "late answer",
            Duration::from_millis(100),
        ));
        let d = dispatcher(transcriber, Arc::new(RecordingHost::new(tx)));

        let first = d.begin_generation();
        d.finalize(vec![chunk(1)], first);

        // A newer utterance begins finalising before the response lands
        d.begin_generation();

        assert!(rx.recv_timeout(Duration::from_millis(400)).is_err());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_duplicate_finalize_delivers_once() {
        let (tx, rx) = channel();
        let transcriber = Arc::new(ScriptedTranscriber::ok("once"));
        let d = dispatcher(transcriber, Arc::new(RecordingHost::new(tx)));

        let generation = d.begin_generation();
        d.finalize(vec![chunk(1)], generation);
        d.finalize(vec![chunk(1)], generation);

        assert_eq!(rx.recv_timeout(Duration::from_secs(2)).unwrap(), "once");
        assert!(rx.recv_timeout(Duration::from_millis(200)).is_err());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_filtered_noise_is_not_delivered() {
        let (tx, rx) = channel();
        let transcriber = Arc::new(ScriptedTranscriber::ok("(wind blowing)"));
        let d = dispatcher(transcriber, Arc::new(RecordingHost::new(tx)));

        let generation = d.begin_generation();
        d.finalize(vec![chunk(1)], generation);

        assert!(rx.recv_timeout(Duration::from_millis(300)).is_err());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_failure_warns_host() {
        let (tx, rx) = channel();
        let host = Arc::new(RecordingHost::new(tx));
        let transcriber = Arc::new(ScriptedTranscriber::failing());
        let d = dispatcher(transcriber, host.clone());

        let generation = d.begin_generation();
        d.finalize(vec![chunk(1)], generation);

        assert!(rx.recv_timeout(Duration::from_millis(300)).is_err());
        // Warning surfaced, nothing delivered
        let warnings = host.warnings.lock();
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("Transcription failed"));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_host_panic_does_not_poison_dispatch() {
        let (tx, rx) = channel();
        let mut host = RecordingHost::new(tx);
        host.panic_on_delivery = true;
        let transcriber = Arc::new(ScriptedTranscriber::ok("boom"));
        let d = dispatcher(transcriber.clone(), Arc::new(host));

        let generation = d.begin_generation();
        d.finalize(vec![chunk(1)], generation);

        // The panicking callback never sends; the dispatcher must survive
        assert!(rx.recv_timeout(Duration::from_millis(300)).is_err());

        // A later utterance with a healthy host still flows end-to-end
        let (tx2, rx2) = channel();
        let d2 = TranscriptionDispatcher::new(
            transcriber,
            Arc::new(RecordingHost::new(tx2)),
            Arc::new(AtomicU64::new(0)),
            PayloadEncoding::Raw,
            16000,
            tokio::runtime::Handle::current(),
        );
        let generation = d2.begin_generation();
        d2.finalize(vec![chunk(2)], generation);
        assert_eq!(rx2.recv_timeout(Duration::from_secs(2)).unwrap(), "boom");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_generation_counter_is_monotonic() {
        let (tx, _rx) = channel();
        let transcriber = Arc::new(ScriptedTranscriber::ok("x"));
        let d = dispatcher(transcriber, Arc::new(RecordingHost::new(tx)));

        assert_eq!(d.current_generation(), 0);
        assert_eq!(d.begin_generation(), 1);
        assert_eq!(d.begin_generation(), 2);
        assert_eq!(d.current_generation(), 2);
    }
}
