//! Real-time audio mixer implementation.
//!
//! This module provides the [`RtMixer`] struct which runs inside the device callback. It owns
//! the realtime copy of the sample bank, reads the shared clip slots, and sums every playing
//! clip into an interleaved stereo output buffer.
//!
//! Samples arrive and leave through the control queue
//! ([`ControlMessage`](crate::messages::ControlMessage)); clip parameters are read from the
//! shared [`ClipPool`]. Nothing in [`RtMixer::render`] allocates, locks, or blocks.

use std::sync::Arc;

use cpal::Sample;
use rtrb::{Consumer, Producer, PushError};

use crate::audio_engine::clip::{ClipPool, ClipSlot, ClipState};
use crate::audio_engine::constants::{AMPLITUDE_MAX, AMPLITUDE_MIN, OUTPUT_CHANNELS};
use crate::audio_engine::properties::PanLaw;
use crate::messages::{AudioMessage, ControlMessage, SampleBuffer};

/// Real-time mixer that sums playing clips into the device buffer.
pub struct RtMixer {
    /// Clip slots shared with the control thread.
    clips: Arc<ClipPool>,

    pan_law: PanLaw,

    /// Realtime copy of the sample pool, indexed by raw sample handle.
    sample_bank: Box<[Option<SampleBuffer>]>,

    /// Released buffers the feedback queue had no room for yet.
    parked: Box<[Option<SampleBuffer>]>,
    parked_count: usize,

    /// Incoming control messages.
    consumer: Consumer<ControlMessage>,

    /// Outgoing feedback messages.
    producer: Producer<AudioMessage>,
}

impl RtMixer {
    pub(crate) fn new(
        clips: Arc<ClipPool>,
        sample_capacity: u32,
        pan_law: PanLaw,
        consumer: Consumer<ControlMessage>,
        producer: Producer<AudioMessage>,
    ) -> Self {
        let slots = sample_capacity as usize + 1;
        Self {
            clips,
            pan_law,
            sample_bank: (0..slots).map(|_| None).collect(),
            parked: (0..slots).map(|_| None).collect(),
            parked_count: 0,
            consumer,
            producer,
        }
    }

    /// Drains the control queue.
    fn process_messages(&mut self) {
        while let Ok(message) = self.consumer.pop() {
            match message {
                ControlMessage::LoadSample { slot, sample } => {
                    if let Some(entry) = self.sample_bank.get_mut(slot) {
                        *entry = Some(sample);
                    }
                }
                ControlMessage::UnloadSample { slot } => {
                    if let Some(sample) = self.sample_bank.get_mut(slot).and_then(Option::take) {
                        self.release(slot, sample);
                    }
                }
            }
        }
    }

    /// Hands a buffer back to the control thread, parking it if the queue is full.
    fn release(&mut self, slot: usize, sample: SampleBuffer) {
        if let Err(PushError::Full(AudioMessage::SampleReleased { slot, sample })) = self
            .producer
            .push(AudioMessage::SampleReleased { slot, sample })
        {
            self.parked[slot] = Some(sample);
            self.parked_count += 1;
        }
    }

    fn retry_parked(&mut self) {
        if self.parked_count == 0 {
            return;
        }

        for slot in 0..self.parked.len() {
            if let Some(sample) = self.parked[slot].take() {
                self.parked_count -= 1;
                self.release(slot, sample);
            }
        }
    }

    /// Renders one device buffer.
    ///
    /// `output` holds interleaved stereo frames. It is silenced, every playing clip is summed
    /// into it, and the sum is clamped to `[-1.0, 1.0]`.
    ///
    /// # Parameters
    ///
    /// - `output`: Output buffer to fill with mixed audio samples
    pub fn render(&mut self, output: &mut [f32]) {
        output.fill(Sample::EQUILIBRIUM);

        self.process_messages();
        self.retry_parked();

        for slot in self.clips.slots() {
            if slot.state() != ClipState::Playing {
                continue;
            }

            // Unbound, or published after this callback drained the queue.
            let Some(Some(sample)) = self.sample_bank.get(slot.sample() as usize) else {
                continue;
            };

            mix_clip(slot, sample, self.pan_law, output);
        }

        for value in output.iter_mut() {
            *value = value.clamp(AMPLITUDE_MIN, AMPLITUDE_MAX);
        }

        self.clips.finish_render();
    }
}

/// Accumulates one clip into `output` and advances its cursor.
fn mix_clip(slot: &ClipSlot, sample: &SampleBuffer, pan_law: PanLaw, output: &mut [f32]) {
    let len = sample.samples.len();
    if len == 0 {
        return;
    }

    let step = sample.channels.clamp(1, 2);
    let volume = slot.volume();
    let (left_gain, right_gain) = pan_law.gains(slot.pan());

    let mut cursor = slot.take_seek().unwrap_or_else(|| slot.cursor());
    if cursor >= len && !wrap_at_boundary(slot, &mut cursor) {
        slot.store_cursor(len);
        return;
    }

    for frame in output.chunks_exact_mut(OUTPUT_CHANNELS) {
        let left = sample.samples.get(cursor).copied().unwrap_or_default();
        let right = if step == 1 {
            left
        } else {
            sample.samples.get(cursor + 1).copied().unwrap_or_default()
        };

        frame[0] += left * volume * left_gain;
        frame[1] += right * volume * right_gain;

        cursor += step;
        if cursor >= len && !wrap_at_boundary(slot, &mut cursor) {
            cursor = len;
            break;
        }
    }

    slot.store_cursor(cursor);
}

/// Applies the loop rule at the end of the sample. Returns `false` once the clip is done.
fn wrap_at_boundary(slot: &ClipSlot, cursor: &mut usize) -> bool {
    if slot.take_loop() {
        *cursor = 0;
        true
    } else {
        slot.mark_complete();
        false
    }
}
