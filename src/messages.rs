//! Message definitions for communication between the control thread and the realtime mixer.
//!
//! This module defines the enums that serve as the wire format for messages passed through the
//! ring buffers between the control thread and the audio callback. Only sample buffer ownership
//! travels through the queues; clip parameters are shared through atomic slots.

use std::sync::Arc;

/// Immutable decoded PCM shared between the sample store and the mixer.
#[derive(Debug, Clone)]
pub(crate) struct SampleBuffer {
    /// 1 (mono) or 2 (interleaved stereo).
    pub channels: usize,
    pub samples: Arc<[f32]>,
}

impl SampleBuffer {
    pub fn frames(&self) -> usize {
        self.samples.len() / self.channels.max(1)
    }
}

/// Message that is emitted from the control thread.
#[derive(Debug)]
pub(crate) enum ControlMessage {
    /// Publish a loaded sample into a mixer bank slot.
    ///
    /// # Parameters
    /// * `slot` - Raw sample handle
    /// * `sample` - Pre-decoded immutable sample buffer (shared handle)
    LoadSample { slot: usize, sample: SampleBuffer },

    /// Drop the mixer's reference to a bank slot.
    ///
    /// The mixer answers with [`AudioMessage::SampleReleased`].
    UnloadSample { slot: usize },
}

/// Message that is emitted from the audio thread.
#[derive(Debug)]
pub(crate) enum AudioMessage {
    /// The mixer no longer references `slot`. The buffer travels back so the
    /// last reference is dropped on the control thread.
    SampleReleased { slot: usize, sample: SampleBuffer },
}
