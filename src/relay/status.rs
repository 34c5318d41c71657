// src/relay/status.rs
//
// The status word shared by the generation and audio contexts.
//
// One field per concern:
// - `produced` / `consumed`: monotonic chunk counters. The playable slot is
//   `consumed % slot_count`; the next writable slot is `produced % slot_count`
//   and is free while `produced - consumed < slot_count`.
// - `end_step` / `feed_out_step`: 1-based step markers, 0 when unarmed.
// - `state`: session state machine.
// - `cancelled`: stop sentinel.
// - `faulted`: the engine failed; the end marker is a halt, not end of track.
//
// Only the generation context ever blocks (`wait_until`). The audio context
// only performs atomic loads/stores and `wake`, which never blocks.

use std::sync::OnceLock;
use std::sync::atomic::{AtomicBool, AtomicU8, AtomicU64, Ordering, fence};
use std::thread::{self, Thread};

/// Session state.
///
/// `idle → buffering → playing → {feedOut → stopped | stopped}`.
/// `stopped` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SessionState {
    Idle = 0,
    Buffering = 1,
    Playing = 2,
    FeedOut = 3,
    Stopped = 4,
}

impl SessionState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Idle,
            1 => Self::Buffering,
            2 => Self::Playing,
            3 => Self::FeedOut,
            _ => Self::Stopped,
        }
    }

    /// Whether `self → next` is a legal transition.
    pub fn can_advance_to(self, next: SessionState) -> bool {
        use SessionState::*;
        matches!(
            (self, next),
            (Idle, Buffering)
                | (Buffering, Playing)
                | (Playing, FeedOut)
                | (Idle | Buffering | Playing | FeedOut, Stopped)
        )
    }
}

pub struct StatusWord {
    slot_count: u64,
    produced: AtomicU64,
    consumed: AtomicU64,
    end_step: AtomicU64,
    feed_out_step: AtomicU64,
    state: AtomicU8,
    cancelled: AtomicBool,
    faulted: AtomicBool,
    /// Generation-context thread parked in `wait_until`.
    waiter: OnceLock<Thread>,
}

impl StatusWord {
    pub fn new(slot_count: usize) -> Self {
        Self {
            slot_count: slot_count as u64,
            produced: AtomicU64::new(0),
            consumed: AtomicU64::new(0),
            end_step: AtomicU64::new(0),
            feed_out_step: AtomicU64::new(0),
            state: AtomicU8::new(SessionState::Idle as u8),
            cancelled: AtomicBool::new(false),
            faulted: AtomicBool::new(false),
            waiter: OnceLock::new(),
        }
    }

    #[inline]
    pub fn slot_count(&self) -> usize {
        self.slot_count as usize
    }

    #[inline]
    pub fn produced(&self) -> u64 {
        self.produced.load(Ordering::Acquire)
    }

    #[inline]
    pub fn consumed(&self) -> u64 {
        self.consumed.load(Ordering::Acquire)
    }

    /// Slot the audio context reads from (or will read next).
    #[inline]
    pub fn playable_slot(&self) -> usize {
        (self.consumed() % self.slot_count) as usize
    }

    /// Slot the generation context writes next.
    #[inline]
    pub fn next_write_slot(&self) -> usize {
        (self.produced() % self.slot_count) as usize
    }

    /// A slot is free when the writer is less than a full ring ahead.
    #[inline]
    pub fn has_free_slot(&self) -> bool {
        self.produced() - self.consumed() < self.slot_count
    }

    /// Publish one fully written chunk. Returns the new step count.
    #[inline]
    pub(crate) fn publish(&self) -> u64 {
        self.produced.fetch_add(1, Ordering::AcqRel) + 1
    }

    /// Mark one chunk fully delivered and wake the generation context.
    #[inline]
    pub(crate) fn release(&self) -> u64 {
        let consumed = self.consumed.fetch_add(1, Ordering::AcqRel) + 1;
        self.wake();
        consumed
    }

    #[inline]
    pub fn end_step(&self) -> Option<u64> {
        match self.end_step.load(Ordering::Acquire) {
            0 => None,
            step => Some(step),
        }
    }

    #[inline]
    pub fn feed_out_step(&self) -> Option<u64> {
        match self.feed_out_step.load(Ordering::Acquire) {
            0 => None,
            step => Some(step),
        }
    }

    /// Arm the end-of-track marker. The first marker wins.
    pub(crate) fn arm_end(&self, step: u64) {
        let _ = self
            .end_step
            .compare_exchange(0, step, Ordering::AcqRel, Ordering::Acquire);
    }

    /// Arm the fade-out marker. The first marker wins.
    pub(crate) fn arm_feed_out(&self, step: u64) {
        let _ = self
            .feed_out_step
            .compare_exchange(0, step, Ordering::AcqRel, Ordering::Acquire);
    }

    #[inline]
    pub fn state(&self) -> SessionState {
        SessionState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Move to `next` if the transition is legal. Returns `true` if the
    /// state changed.
    pub fn advance(&self, next: SessionState) -> bool {
        let mut current = self.state.load(Ordering::Acquire);
        loop {
            if !SessionState::from_u8(current).can_advance_to(next) {
                return false;
            }
            match self.state.compare_exchange_weak(
                current,
                next as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return true,
                Err(actual) => current = actual,
            }
        }
    }

    #[inline]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    #[inline]
    pub fn is_faulted(&self) -> bool {
        self.faulted.load(Ordering::Acquire)
    }

    /// Record an engine failure. Set before the end marker is armed.
    pub(crate) fn fault(&self) {
        self.faulted.store(true, Ordering::Release);
    }

    /// Stop sentinel: cancel the session and wake any waiting generator.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
        self.advance(SessionState::Stopped);
        self.wake();
    }

    /// Block the calling (generation) thread until `ready` holds or the
    /// session is cancelled. Returns `false` on cancellation.
    ///
    /// Must never be called from the audio context. The first thread to
    /// wait is the one [`wake`](Self::wake) unparks; any other thread polls
    /// with `yield_now` instead of parking.
    pub fn wait_until(&self, mut ready: impl FnMut(&Self) -> bool) -> bool {
        let current = thread::current();
        let parks = self.waiter.get_or_init(|| current.clone()).id() == current.id();

        // Pairs with the fence in `wake`: either the waker sees our
        // registration, or we see its update below.
        fence(Ordering::SeqCst);
        loop {
            if self.is_cancelled() {
                return false;
            }
            if ready(self) {
                return true;
            }
            if parks {
                thread::park();
            } else {
                thread::yield_now();
            }
        }
    }

    /// Wake the generation context. Non-blocking.
    #[inline]
    pub fn wake(&self) {
        fence(Ordering::SeqCst);
        if let Some(thread) = self.waiter.get() {
            thread.unpark();
        }
    }
}

impl std::fmt::Debug for StatusWord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StatusWord")
            .field("state", &self.state())
            .field("produced", &self.produced())
            .field("consumed", &self.consumed())
            .field("end_step", &self.end_step())
            .field("feed_out_step", &self.feed_out_step())
            .field("cancelled", &self.is_cancelled())
            .field("faulted", &self.is_faulted())
            .finish()
    }
}
