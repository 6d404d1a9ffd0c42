//! Single-shot session timers
//!
//! Deadline bookkeeping for the silence and waiting windows. Timers never
//! run on their own threads: the session loop asks for the next deadline,
//! waits on the event queue until then, and collects whichever timer has
//! expired. Arming is idempotent while a timer is running, matching the
//! "start or continue the silence window" behaviour; every cancel is
//! explicit so a stale deadline cannot fire into a state it no longer
//! applies to.

use std::time::{Duration, Instant};

/// The two utterance-boundary timers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerKind {
    /// Silence window inside an utterance (Recording → Waiting)
    Silence,
    /// Grace period before finalisation (Waiting → Processing)
    Waiting,
}

/// Pending single-shot deadlines
#[derive(Debug, Default)]
pub struct TimerTable {
    silence: Option<Instant>,
    waiting: Option<Instant>,
}

impl TimerTable {
    /// Create an empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Arm a timer `window` from now, unless it is already running
    pub fn arm(&mut self, kind: TimerKind, window: Duration) {
        let slot = self.slot_mut(kind);
        if slot.is_none() {
            *slot = Some(Instant::now() + window);
        }
    }

    /// Cancel a timer
    pub fn cancel(&mut self, kind: TimerKind) {
        *self.slot_mut(kind) = None;
    }

    /// Cancel every pending timer
    pub fn cancel_all(&mut self) {
        self.silence = None;
        self.waiting = None;
    }

    /// Whether a timer is currently running
    pub fn is_armed(&self, kind: TimerKind) -> bool {
        self.slot(kind).is_some()
    }

    /// The earliest pending deadline, if any
    pub fn next_deadline(&self) -> Option<Instant> {
        match (self.silence, self.waiting) {
            (Some(s), Some(w)) => Some(s.min(w)),
            (Some(s), None) => Some(s),
            (None, Some(w)) => Some(w),
            (None, None) => None,
        }
    }

    /// Take one timer whose deadline has passed, clearing it.
    ///
    /// Single-shot: a collected timer will not fire again unless re-armed.
    pub fn take_expired(&mut self, now: Instant) -> Option<TimerKind> {
        if matches!(self.silence, Some(deadline) if deadline <= now) {
            self.silence = None;
            return Some(TimerKind::Silence);
        }
        if matches!(self.waiting, Some(deadline) if deadline <= now) {
            self.waiting = None;
            return Some(TimerKind::Waiting);
        }
        None
    }

    fn slot(&self, kind: TimerKind) -> &Option<Instant> {
        match kind {
            TimerKind::Silence => &self.silence,
            TimerKind::Waiting => &self.waiting,
        }
    }

    fn slot_mut(&mut self, kind: TimerKind) -> &mut Option<Instant> {
        match kind {
            TimerKind::Silence => &mut self.silence,
            TimerKind::Waiting => &mut self.waiting,
        }
    }
}
