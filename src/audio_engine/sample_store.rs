//! Control-side view of the sample pool.
//!
//! The store keeps its own reference to every published buffer. When a sample
//! is destroyed the slot moves to `Releasing` and its handle stays out of
//! circulation until the mixer hands its reference back, so buffer memory is
//! only ever freed here and a handle is never reissued while the audio thread
//! can still read the old data.

use crate::audio_engine::handles::{HandlePool, SampleHandle};
use crate::messages::SampleBuffer;

#[derive(Debug)]
enum SampleSlot {
    Vacant,
    Loaded(SampleBuffer),
    Releasing,
}

#[derive(Debug)]
pub(crate) struct SampleStore {
    slots: Vec<SampleSlot>,
    handles: HandlePool,
}

impl SampleStore {
    pub fn new(capacity: u32) -> Self {
        Self {
            slots: (0..=capacity).map(|_| SampleSlot::Vacant).collect(),
            handles: HandlePool::new(capacity),
        }
    }

    pub fn has_free_handle(&self) -> bool {
        self.handles.has_available()
    }

    /// Stores `sample` under a fresh handle.
    pub fn insert(&mut self, sample: SampleBuffer) -> Option<SampleHandle> {
        let raw = self.handles.allocate()?;
        self.slots[raw as usize] = SampleSlot::Loaded(sample);
        Some(SampleHandle::from_raw(raw))
    }

    /// Undoes an [`Self::insert`] that was never published to the mixer.
    pub fn remove_unpublished(&mut self, handle: SampleHandle) {
        if self.handles.retire(handle.raw()) {
            self.slots[handle.index()] = SampleSlot::Vacant;
            self.handles.recycle(handle.raw());
        }
    }

    pub fn get(&self, handle: SampleHandle) -> Option<&SampleBuffer> {
        if !self.handles.is_allocated(handle.raw()) {
            return None;
        }
        match self.slots.get(handle.index()) {
            Some(SampleSlot::Loaded(sample)) => Some(sample),
            _ => None,
        }
    }

    pub fn is_loaded(&self, handle: SampleHandle) -> bool {
        self.get(handle).is_some()
    }

    /// Marks a loaded sample as waiting for the mixer to let go of it.
    pub fn begin_release(&mut self, handle: SampleHandle) -> bool {
        if !self.is_loaded(handle) {
            return false;
        }
        self.handles.retire(handle.raw());
        self.slots[handle.index()] = SampleSlot::Releasing;
        true
    }

    /// Reverts [`Self::begin_release`] when the unload request could not be sent.
    pub fn cancel_release(&mut self, handle: SampleHandle, sample: SampleBuffer) {
        if let Some(slot @ SampleSlot::Releasing) = self.slots.get_mut(handle.index()) {
            *slot = SampleSlot::Loaded(sample);
            // The handle was retired, not recycled, so it is still ours to reclaim.
            self.handles.reclaim(handle.raw());
        }
    }

    /// Completes a release once the mixer has returned its reference.
    ///
    /// Dropping `returned` (and the slot's copy) frees the buffer here, on the
    /// control thread.
    pub fn finish_release(&mut self, slot: usize, returned: SampleBuffer) {
        drop(returned);
        if let Some(entry @ SampleSlot::Releasing) = self.slots.get_mut(slot) {
            *entry = SampleSlot::Vacant;
            self.handles.recycle(slot as u32);
        }
    }

    pub fn loaded(&self) -> Vec<SampleHandle> {
        self.handles
            .allocated()
            .map(SampleHandle::from_raw)
            .collect()
    }

    pub fn clear(&mut self) {
        for slot in &mut self.slots {
            *slot = SampleSlot::Vacant;
        }
        self.handles.clear();
    }
}
