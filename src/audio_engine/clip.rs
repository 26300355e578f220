//! Clip slots shared between the control thread and the realtime mixer.
//!
//! Every field of a [`ClipSlot`] is a single atomic word. The control thread
//! stores parameters and requests state changes; the mixer owns the cursor
//! and is the only writer of [`ClipState::Complete`]. A clip becomes visible
//! to the mixer when its state is stored as `Playing` (release), so every
//! parameter written before that store is observed by the callback that picks
//! the clip up.

use std::sync::atomic::{AtomicI32, AtomicU8, AtomicU32, AtomicU64, AtomicUsize, Ordering};

use crate::audio_engine::constants::{
    DEFAULT_LOOP_COUNT, DEFAULT_PAN, DEFAULT_VOLUME, LOOP_FOREVER,
};

const NO_SEEK: usize = usize::MAX;

/// Playback state of a clip.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ClipState {
    /// Mixed into the output by every callback.
    Playing = 0,
    /// Allocated, silent, cursor preserved. Initial state of a new clip.
    Paused = 1,
    /// Reached the end of its sample with no loops left. Terminal until the
    /// clip is destroyed (explicitly or by a flush).
    Complete = 2,
}

impl ClipState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Playing,
            2 => Self::Complete,
            _ => Self::Paused,
        }
    }
}

/// `f32` stored as its bit pattern.
#[derive(Debug)]
struct AtomicF32(AtomicU32);

impl AtomicF32 {
    fn new(value: f32) -> Self {
        Self(AtomicU32::new(value.to_bits()))
    }

    fn load(&self) -> f32 {
        f32::from_bits(self.0.load(Ordering::Relaxed))
    }

    fn store(&self, value: f32) {
        self.0.store(value.to_bits(), Ordering::Relaxed);
    }
}

/// One pooled playback cursor.
#[derive(Debug)]
pub(crate) struct ClipSlot {
    state: AtomicU8,
    /// Raw sample handle; 0 when unbound.
    sample: AtomicU32,
    volume: AtomicF32,
    pan: AtomicF32,
    loops: AtomicI32,
    /// Index into the interleaved sample data.
    cursor: AtomicUsize,
    /// Cursor requested by the control thread, consumed by the mixer.
    seek: AtomicUsize,
}

impl ClipSlot {
    fn new() -> Self {
        Self {
            state: AtomicU8::new(ClipState::Paused as u8),
            sample: AtomicU32::new(0),
            volume: AtomicF32::new(DEFAULT_VOLUME),
            pan: AtomicF32::new(DEFAULT_PAN),
            loops: AtomicI32::new(DEFAULT_LOOP_COUNT),
            cursor: AtomicUsize::new(0),
            seek: AtomicUsize::new(NO_SEEK),
        }
    }

    /// Restores defaults and unbinds the sample. State is cleared first so
    /// the mixer stops picking the slot up before anything else changes.
    pub fn reset(&self) {
        self.state.store(ClipState::Paused as u8, Ordering::Release);
        self.sample.store(0, Ordering::Release);
        self.volume.store(DEFAULT_VOLUME);
        self.pan.store(DEFAULT_PAN);
        self.loops.store(DEFAULT_LOOP_COUNT, Ordering::Relaxed);
        self.cursor.store(0, Ordering::Relaxed);
        self.seek.store(NO_SEEK, Ordering::Relaxed);
    }

    /// Resets the slot and binds it to `sample`. The clip starts paused.
    pub fn bind(&self, sample: u32) {
        self.reset();
        self.sample.store(sample, Ordering::Release);
    }

    pub fn sample(&self) -> u32 {
        self.sample.load(Ordering::Acquire)
    }

    pub fn state(&self) -> ClipState {
        ClipState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Paused or Playing becomes Playing. Complete is terminal and stays put.
    pub fn play(&self) -> bool {
        self.state
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |state| {
                (state != ClipState::Complete as u8).then_some(ClipState::Playing as u8)
            })
            .is_ok()
    }

    /// Playing becomes Paused; any other state is left alone.
    pub fn pause(&self) -> bool {
        self.state
            .compare_exchange(
                ClipState::Playing as u8,
                ClipState::Paused as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
    }

    /// Playing becomes Complete. Loses to a concurrent pause or reset.
    pub fn mark_complete(&self) -> bool {
        self.state
            .compare_exchange(
                ClipState::Playing as u8,
                ClipState::Complete as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
    }

    pub fn volume(&self) -> f32 {
        self.volume.load()
    }

    pub fn set_volume(&self, volume: f32) {
        self.volume.store(volume);
    }

    pub fn pan(&self) -> f32 {
        self.pan.load()
    }

    pub fn set_pan(&self, pan: f32) {
        self.pan.store(pan);
    }

    pub fn loops(&self) -> i32 {
        self.loops.load(Ordering::Relaxed)
    }

    pub fn set_loops(&self, loops: i32) {
        let loops = if loops < 0 { LOOP_FOREVER } else { loops };
        self.loops.store(loops, Ordering::Relaxed);
    }

    /// Consumes one pass at a sample boundary.
    ///
    /// Returns `true` when the clip should wrap to the start, `false` when it
    /// has no passes left. A decrement that races a control-thread store is
    /// dropped so the new count wins.
    pub fn take_loop(&self) -> bool {
        let loops = self.loops.load(Ordering::Relaxed);
        if loops < 0 {
            return true;
        }
        if loops == 0 {
            return false;
        }
        let _ = self
            .loops
            .compare_exchange(loops, loops - 1, Ordering::Relaxed, Ordering::Relaxed);
        true
    }

    pub fn cursor(&self) -> usize {
        self.cursor.load(Ordering::Relaxed)
    }

    pub fn store_cursor(&self, cursor: usize) {
        self.cursor.store(cursor, Ordering::Relaxed);
    }

    pub fn request_seek(&self, cursor: usize) {
        self.seek.store(cursor, Ordering::Relaxed);
    }

    pub fn pending_seek(&self) -> Option<usize> {
        let seek = self.seek.load(Ordering::Relaxed);
        (seek != NO_SEEK).then_some(seek)
    }

    pub fn take_seek(&self) -> Option<usize> {
        let seek = self.seek.swap(NO_SEEK, Ordering::Relaxed);
        (seek != NO_SEEK).then_some(seek)
    }
}

/// Fixed-capacity array of clip slots plus the mixer's render counter.
///
/// Slot addresses never move after construction. Index 0 is never bound.
#[derive(Debug)]
pub(crate) struct ClipPool {
    slots: Box<[ClipSlot]>,
    renders: AtomicU64,
}

impl ClipPool {
    pub fn new(capacity: u32) -> Self {
        Self {
            slots: (0..=capacity).map(|_| ClipSlot::new()).collect(),
            renders: AtomicU64::new(0),
        }
    }

    pub fn slot(&self, raw: u32) -> Option<&ClipSlot> {
        if raw == 0 {
            return None;
        }
        self.slots.get(raw as usize)
    }

    pub fn slots(&self) -> &[ClipSlot] {
        &self.slots
    }

    pub fn playing_count(&self) -> usize {
        self.slots
            .iter()
            .filter(|slot| slot.state() == ClipState::Playing)
            .count()
    }

    /// Number of mixer callbacks that have run to completion.
    pub fn renders(&self) -> u64 {
        self.renders.load(Ordering::Acquire)
    }

    pub fn finish_render(&self) {
        self.renders.fetch_add(1, Ordering::Release);
    }
}
