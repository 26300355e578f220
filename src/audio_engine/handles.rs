//! Recyclable integer handles for the sample and clip pools.
//!
//! Handles index directly into fixed-size slot arrays. Handle `0` is reserved
//! as "invalid" in both namespaces, so a pool of capacity `n` hands out
//! `1..=n` and its slot arrays carry one unused entry at index 0.

use std::collections::VecDeque;
use std::fmt;

macro_rules! pool_handle {
    ($(#[$meta:meta])* $name:ident, $label:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
        pub struct $name(u32);

        impl $name {
            /// The reserved invalid handle.
            pub const INVALID: Self = Self(0);

            /// Wraps a raw handle value without checking it.
            pub const fn from_raw(raw: u32) -> Self {
                Self(raw)
            }

            pub const fn raw(self) -> u32 {
                self.0
            }

            /// False only for [`Self::INVALID`]; an allocated handle is not implied.
            pub const fn is_valid(self) -> bool {
                self.0 != 0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($label, " #{}"), self.0)
            }
        }
    };
}

pool_handle!(
    /// Handle to a decoded sample in the sample store.
    SampleHandle,
    "sample"
);

impl SampleHandle {
    /// Slot index in the sample store and the mixer's sample bank.
    pub(crate) const fn index(self) -> usize {
        self.0 as usize
    }
}

pool_handle!(
    /// Handle to a playback clip in the clip pool.
    ClipHandle,
    "clip"
);

/// FIFO free list of raw handles.
///
/// A handle is in exactly one of three places: the free queue, the allocated
/// set, or "retired" (neither), where it waits until the caller proves the
/// realtime thread can no longer observe its slot and calls [`Self::recycle`].
#[derive(Debug)]
pub(crate) struct HandlePool {
    available: VecDeque<u32>,
    allocated: Vec<bool>,
}

impl HandlePool {
    pub fn new(capacity: u32) -> Self {
        Self {
            available: (1..=capacity).collect(),
            allocated: vec![false; capacity as usize + 1],
        }
    }

    pub fn allocate(&mut self) -> Option<u32> {
        let raw = self.available.pop_front()?;
        self.allocated[raw as usize] = true;
        Some(raw)
    }

    pub fn is_allocated(&self, raw: u32) -> bool {
        raw != 0 && self.allocated.get(raw as usize).copied().unwrap_or(false)
    }

    /// Takes an allocated handle out of circulation without making it available.
    pub fn retire(&mut self, raw: u32) -> bool {
        if !self.is_allocated(raw) {
            return false;
        }
        self.allocated[raw as usize] = false;
        true
    }

    /// Puts a retired handle straight back into the allocated set.
    pub fn reclaim(&mut self, raw: u32) {
        if raw == 0 {
            return;
        }
        if let Some(allocated) = self.allocated.get_mut(raw as usize) {
            *allocated = true;
        }
    }

    /// Returns a retired handle to the back of the free queue.
    pub fn recycle(&mut self, raw: u32) {
        debug_assert!(!self.is_allocated(raw));
        self.available.push_back(raw);
    }

    pub fn has_available(&self) -> bool {
        !self.available.is_empty()
    }

    pub fn allocated(&self) -> impl Iterator<Item = u32> + '_ {
        self.allocated
            .iter()
            .enumerate()
            .filter(|(_, allocated)| **allocated)
            .map(|(raw, _)| raw as u32)
    }

    pub fn clear(&mut self) {
        self.available.clear();
        self.allocated.fill(false);
    }
}
