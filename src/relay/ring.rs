use std::cell::UnsafeCell;

use crate::chunk::SampleChunk;

/// Fixed ring of pre-allocated chunk slots.
///
/// Single producer (generation context)
/// Single consumer (audio context)
///
/// The ring itself does no synchronisation; exclusive access to a slot is
/// granted by the produced/consumed counters in the status word.
pub(crate) struct RingSlots {
    slots: Box<[UnsafeCell<SampleChunk>]>,
}

// SAFETY: a slot is only written by the writer while it is outside the
// consumer's window and only read by the reader after it was published.
unsafe impl Sync for RingSlots {}

impl RingSlots {
    pub fn new(count: usize, frames: usize) -> Self {
        Self {
            slots: (0..count)
                .map(|_| UnsafeCell::new(SampleChunk::new(frames)))
                .collect(),
        }
    }

    /// Get the slot for writing.
    ///
    /// # Safety
    /// The caller must be the single writer and the slot must not be
    /// readable by the consumer (published and not yet released).
    #[inline]
    #[allow(clippy::mut_from_ref)]
    pub unsafe fn slot_mut(&self, index: usize) -> &mut SampleChunk {
        unsafe { &mut *self.slots[index].get() }
    }

    /// Get the slot for reading.
    ///
    /// # Safety
    /// The slot must be published and the writer must not be writing it.
    #[inline]
    pub unsafe fn slot(&self, index: usize) -> &SampleChunk {
        unsafe { &*self.slots[index].get() }
    }
}
