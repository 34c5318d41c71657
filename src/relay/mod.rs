//! Buffer relay between the generation context and the audio context.
//!
//! Fixed-size stereo chunks are produced by a background loop that calls
//! into the synthesis engine, and drained a quantum at a time by a real-time
//! audio callback that must never block.
//!
//! # Architecture
//!
//! - **Generation context** owns the [`RelayWriter`]: writes a free slot,
//!   publishes it, arms end/fade-out markers, and parks while the ring is full.
//! - **Audio context** owns the [`RelayReader`]: copies quanta out of the
//!   playable slot and releases it once fully delivered.
//! - Both share a [`StatusWord`] (atomics only) and a ring of slots
//!   allocated once per session by [`create`].
//!
//! # Usage
//!
//! ```ignore
//! let (mut writer, mut reader) = relay::create(&config)?;
//!
//! // generation context
//! let mut generator = Generator::new(engine, writer);
//! generator.run()?;
//!
//! // audio context
//! let outcome = reader.consume_step(&mut left, &mut right);
//! ```

mod ring;
mod status;

pub use status::{SessionState, StatusWord};

use std::sync::Arc;

use ring::RingSlots;

use crate::config::RelayConfig;
use crate::error::RelayResult;

struct RelayShared {
    config: RelayConfig,
    status: StatusWord,
    slots: RingSlots,
}

/// Allocate the slots and status word for one playback session.
///
/// Configuration errors are reported here, never from the audio callback.
pub fn create(config: &RelayConfig) -> RelayResult<(RelayWriter, RelayReader)> {
    config.validate()?;

    let shared = Arc::new(RelayShared {
        config: *config,
        status: StatusWord::new(config.slot_count),
        slots: RingSlots::new(config.slot_count, config.chunk_size),
    });

    let writer = RelayWriter {
        shared: Arc::clone(&shared),
    };
    let reader = RelayReader {
        shared,
        position: 0,
        fade: None,
        ended_reported: false,
    };
    Ok((writer, reader))
}

/// Result of waiting for a writable slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotWait {
    /// This slot is free for writing.
    Ready(usize),
    /// The session was stopped.
    Cancelled,
}

// ═══════════════════════════════════════════════════════════════════
// RelayWriter - generation context
// ═══════════════════════════════════════════════════════════════════

/// Producer half. Exactly one per session.
pub struct RelayWriter {
    shared: Arc<RelayShared>,
}

impl RelayWriter {
    #[inline]
    pub fn status(&self) -> &StatusWord {
        &self.shared.status
    }

    #[inline]
    pub fn config(&self) -> &RelayConfig {
        &self.shared.config
    }

    /// Block until the slot after `previous` may be written, or the session
    /// is cancelled.
    ///
    /// `previous` is the slot written last (`None` before the first write).
    /// Must never be called from the audio context.
    pub fn wait_for_next_slot(&self, previous: Option<usize>) -> SlotWait {
        let status = &self.shared.status;
        let next = status.next_write_slot();
        debug_assert!(
            previous.is_none_or(|p| (p + 1) % status.slot_count() == next),
            "slots must be written in ring order"
        );

        if status.wait_until(|s| s.has_free_slot()) {
            SlotWait::Ready(next)
        } else {
            SlotWait::Cancelled
        }
    }

    /// Non-blocking variant of [`wait_for_next_slot`](Self::wait_for_next_slot).
    pub fn try_next_slot(&self) -> Option<usize> {
        let status = &self.shared.status;
        if status.is_cancelled() || !status.has_free_slot() {
            return None;
        }
        Some(status.next_write_slot())
    }

    /// Copy one engine chunk into `slot` and publish it.
    ///
    /// Returns the 1-based step number of the published chunk. Panics if
    /// `slot` is not the next free slot in ring order.
    pub(crate) fn write(&mut self, slot: usize, left: &[f32], right: &[f32]) -> u64 {
        let status = &self.shared.status;
        assert!(
            slot == status.next_write_slot() && status.has_free_slot(),
            "slot {slot} is not writable"
        );
        // SAFETY: `slot` is outside the consumer window (checked above) and
        // `&mut self` makes this the only writer.
        let chunk = unsafe { self.shared.slots.slot_mut(slot) };
        chunk.copy_from(left, right);

        let step = status.publish();
        if step == 1 {
            status.advance(SessionState::Buffering);
        }
        step
    }

    /// Arm the fade-out marker at `step`.
    pub fn arm_feed_out(&self, step: u64) {
        self.shared.status.arm_feed_out(step);
    }

    /// Arm the end-of-track marker at `step`.
    pub fn arm_end(&self, step: u64) {
        self.shared.status.arm_end(step);
        self.shared.status.wake();
    }

    /// Halt production after an engine failure.
    ///
    /// Chunks already published still play out; a session with nothing
    /// published is stopped outright.
    pub fn halt(&self) {
        let status = &self.shared.status;
        status.fault();
        match status.produced() {
            0 => status.cancel(),
            produced => self.arm_end(produced),
        }
    }

    #[inline]
    pub fn is_cancelled(&self) -> bool {
        self.shared.status.is_cancelled()
    }
}

// ═══════════════════════════════════════════════════════════════════
// RelayReader - audio context
// ═══════════════════════════════════════════════════════════════════

/// What a call to [`RelayReader::consume_step`] delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsumeOutcome {
    /// A quantum of audio was delivered.
    Played,
    /// Audio was delivered and the fade-out window began with it.
    FeedOutStarted,
    /// The last chunk of the track finished with this quantum.
    Ended,
    /// No chunk was ready; silence was delivered.
    Underrun,
    /// The session is over; silence was delivered.
    Stopped,
}

/// Linear fade to silence across the feed-out window.
#[derive(Debug, Clone, Copy)]
struct FadeOut {
    position: usize,
    length: usize,
}

impl FadeOut {
    #[inline]
    fn apply(&mut self, left: &mut [f32], right: &mut [f32]) {
        for (l, r) in left.iter_mut().zip(right.iter_mut()) {
            let gain = if self.position >= self.length {
                0.0
            } else {
                1.0 - self.position as f32 / self.length as f32
            };
            *l *= gain;
            *r *= gain;
            self.position += 1;
        }
    }
}

/// Consumer half. Exactly one per session.
///
/// Every method is non-blocking and allocation-free.
pub struct RelayReader {
    shared: Arc<RelayShared>,
    /// Frames already delivered from the playable chunk.
    position: usize,
    fade: Option<FadeOut>,
    ended_reported: bool,
}

impl RelayReader {
    #[inline]
    pub fn status(&self) -> &StatusWord {
        &self.shared.status
    }

    #[inline]
    pub fn config(&self) -> &RelayConfig {
        &self.shared.config
    }

    /// Handle that can stop this session from another context.
    pub fn stop_handle(&self) -> StopHandle {
        StopHandle {
            shared: Arc::clone(&self.shared),
        }
    }

    /// Stop the session and wake the generation context.
    pub fn stop(&self) {
        self.shared.status.cancel();
    }

    /// Deliver one quantum into `left`/`right`.
    ///
    /// At most the remainder of the playable chunk is copied; any further
    /// output frames are silence. Never blocks.
    pub fn consume_step(&mut self, left: &mut [f32], right: &mut [f32]) -> ConsumeOutcome {
        let frames = left.len().min(right.len());
        let (left, right) = (&mut left[..frames], &mut right[..frames]);
        let status = &self.shared.status;

        if status.is_cancelled() {
            silence(left, right);
            return ConsumeOutcome::Stopped;
        }

        let consumed = status.consumed();
        if status.end_step().is_some_and(|end| consumed >= end) {
            silence(left, right);
            return self.finish();
        }
        if consumed >= status.produced() {
            silence(left, right);
            return ConsumeOutcome::Underrun;
        }

        // Reading chunk `consumed`, i.e. step `consumed + 1`.
        let mut outcome = ConsumeOutcome::Played;
        if self.position == 0 {
            status.advance(SessionState::Playing);
            if status.feed_out_step() == Some(consumed + 1) && self.fade.is_none() {
                status.advance(SessionState::FeedOut);
                self.fade = Some(FadeOut {
                    position: 0,
                    length: self.shared.config.feed_out_remain.max(1) * self.shared.config.chunk_size,
                });
                outcome = ConsumeOutcome::FeedOutStarted;
            }
        }

        let slot = (consumed % status.slot_count() as u64) as usize;
        // SAFETY: chunk `consumed` is published (checked above) and the
        // writer cannot reuse its slot until we release it.
        let chunk = unsafe { self.shared.slots.slot(slot) };
        let n = frames.min(chunk.frames() - self.position);
        chunk.read_into(self.position, &mut left[..n], &mut right[..n]);
        silence(&mut left[n..], &mut right[n..]);

        if let Some(fade) = self.fade.as_mut() {
            fade.apply(&mut left[..n], &mut right[..n]);
        }

        self.position += n;
        if self.position >= chunk.frames() {
            self.position = 0;
            let consumed = status.release();
            if status.end_step().is_some_and(|end| consumed >= end) {
                return self.finish();
            }
        }

        outcome
    }

    /// Report `Ended` once, `Stopped` afterwards.
    fn finish(&mut self) -> ConsumeOutcome {
        self.shared.status.advance(SessionState::Stopped);
        if self.ended_reported {
            ConsumeOutcome::Stopped
        } else {
            self.ended_reported = true;
            ConsumeOutcome::Ended
        }
    }

    /// Snapshot of the relay for UI display.
    pub fn readback(&self) -> RelayReadback {
        let status = &self.shared.status;
        RelayReadback {
            state: status.state(),
            playable_slot: status.playable_slot(),
            produced: status.produced(),
            consumed: status.consumed(),
            end_step: status.end_step(),
            feed_out_step: status.feed_out_step(),
        }
    }
}

impl std::fmt::Debug for RelayReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RelayReader")
            .field("status", &self.shared.status)
            .field("position", &self.position)
            .finish()
    }
}

#[inline]
fn silence(left: &mut [f32], right: &mut [f32]) {
    left.fill(0.0);
    right.fill(0.0);
}

/// Cloneable handle that stops a session from the control context.
#[derive(Clone)]
pub struct StopHandle {
    shared: Arc<RelayShared>,
}

impl StopHandle {
    pub fn stop(&self) {
        self.shared.status.cancel();
    }

    pub fn state(&self) -> SessionState {
        self.shared.status.state()
    }

    /// Whether the session ended because the engine failed.
    pub fn is_faulted(&self) -> bool {
        self.shared.status.is_faulted()
    }
}

/// Read-only relay state for UI display.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RelayReadback {
    pub state: SessionState,
    pub playable_slot: usize,
    pub produced: u64,
    pub consumed: u64,
    pub end_step: Option<u64>,
    pub feed_out_step: Option<u64>,
}
