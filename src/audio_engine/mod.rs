//! Audio Engine Module
//!
//! This module provides pooled sample/clip management and real-time mixing.
//! It is organized into sub-modules, each with a specific responsibility:
//!
//! - [`audio_stream`]: CPAL audio stream management and real-time callback
//! - [`clip`]: Clip slots and the clip state machine
//! - [`constants`]: Configuration constants and limits
//! - [`errors`]: Audio-specific error types
//! - [`handles`]: Recyclable sample and clip handles
//! - [`mixer`]: Real-time mixing engine
//! - [`properties`]: Engine configuration
//! - [`sample_loader`]: Audio file loading and decoding
//! - [`sample_store`]: Control-side sample pool
//!
//! The main [`AudioEngine`] struct is the control-thread side: it owns both pools and the
//! output stream, and every operation on samples and clips goes through it.

use std::path::Path;
use std::sync::Arc;

use cpal::Stream;
use rtrb::{Consumer, Producer, RingBuffer};

use crate::audio_engine::audio_stream::{create_audio_stream, setup_logger, start_stream, stop_stream};
use crate::audio_engine::clip::{ClipPool, ClipSlot};
use crate::audio_engine::constants::QUEUE_SLACK;
use crate::audio_engine::handles::HandlePool;
use crate::audio_engine::sample_loader::{
    decode_audio_file_to_sample_buffer, sample_buffer_from_pcm,
};
use crate::audio_engine::sample_store::SampleStore;
use crate::messages::{AudioMessage, ControlMessage, SampleBuffer};

pub use crate::audio_engine::clip::ClipState;
pub use crate::audio_engine::errors::{EngineError, SampleLoadError};
pub use crate::audio_engine::handles::{ClipHandle, SampleHandle};
pub use crate::audio_engine::mixer::RtMixer;
pub use crate::audio_engine::properties::{
    EngineProperties, PanLaw, PlayMode, SampleDestroyPolicy,
};

mod audio_stream;
mod clip;
pub mod constants;
mod errors;
mod handles;
mod mixer;
mod properties;
mod sample_loader;
mod sample_store;

/// Format details of a loaded sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SampleInfo {
    /// 1 (mono) or 2 (stereo).
    pub channels: usize,
    /// Length in frames.
    pub frames: usize,
}

/// AudioEngine owns the sample and clip pools and drives the realtime mixer.
///
/// An engine is either running (created by [`AudioEngine::initialize`], mixing into the
/// default output device) or detached (created by [`AudioEngine::detached`], with the
/// [`RtMixer`] handed to the caller for offline rendering).
///
/// Clips are reclaimed only by [`AudioEngine::flush`]; call it regularly from the control
/// loop. Destroyed clip handles and destroyed sample handles return to their free queues only
/// once the mixer can no longer be reading the old slot.
pub struct AudioEngine {
    properties: EngineProperties,
    samples: SampleStore,
    clips: Arc<ClipPool>,
    clip_handles: HandlePool,
    /// Destroyed clips with the render count observed when they were reset.
    retired_clips: Vec<(u32, u64)>,
    producer: Producer<ControlMessage>,
    consumer: Consumer<AudioMessage>,
    stream: Option<Stream>,
    error: String,
}

impl AudioEngine {
    fn build(properties: EngineProperties) -> Result<(Self, RtMixer), EngineError> {
        properties.validate()?;

        let sample_capacity = properties.max_sample_count as usize;
        // At most one load and one unload can be outstanding per sample slot, and at most
        // one release per slot on the way back.
        let (producer, control_consumer) = RingBuffer::new(sample_capacity * 2 + QUEUE_SLACK);
        let (feedback_producer, consumer) = RingBuffer::new(sample_capacity + QUEUE_SLACK);

        let clips = Arc::new(ClipPool::new(properties.max_clip_count));
        let mixer = RtMixer::new(
            Arc::clone(&clips),
            properties.max_sample_count,
            properties.pan_law,
            control_consumer,
            feedback_producer,
        );

        let engine = Self {
            samples: SampleStore::new(properties.max_sample_count),
            clip_handles: HandlePool::new(properties.max_clip_count),
            retired_clips: Vec::new(),
            clips,
            producer,
            consumer,
            stream: None,
            error: String::new(),
            properties,
        };

        Ok((engine, mixer))
    }

    /// Allocates both pools, opens the default output device and starts mixing into it.
    ///
    /// On failure no engine exists; the returned error's message is the error string.
    pub fn initialize(properties: EngineProperties) -> Result<Self, EngineError> {
        setup_logger();
        log::info!("Initializing audio engine");

        let (mut engine, mixer) = Self::build(properties).inspect_err(|e| {
            log::error!("Audio engine error: {e}");
        })?;

        let stream = create_audio_stream(&engine.properties, mixer).inspect_err(|e| {
            log::error!("Audio engine error: {e}");
        })?;
        start_stream(&stream).inspect_err(|e| {
            log::error!("Audio engine error: {e}");
        })?;
        engine.stream = Some(stream);

        log::info!("Audio engine initialized");
        Ok(engine)
    }

    /// Builds an engine without an output device.
    ///
    /// The caller drives the returned mixer, one [`RtMixer::render`] per buffer, from
    /// whichever thread plays the role of the audio callback.
    pub fn detached(properties: EngineProperties) -> Result<(Self, RtMixer), EngineError> {
        Self::build(properties)
    }

    /// Stops and closes the output device and releases every pooled resource.
    pub fn terminate(mut self) -> Result<(), EngineError> {
        log::info!("Terminating audio engine");

        let mut result = Ok(());
        if let Some(stream) = self.stream.take() {
            result = stop_stream(&stream);
            if let Err(e) = &result {
                log::error!("Audio engine error: {e}");
            }
            // Dropping the stream closes the device and drops the mixer with it.
            drop(stream);
        }

        self.samples.clear();
        self.clip_handles.clear();
        self.retired_clips.clear();

        log::info!("Audio engine terminated");
        result
    }

    /// Whether the engine is mixing into an output device.
    pub fn is_running(&self) -> bool {
        self.stream.is_some()
    }

    pub fn properties(&self) -> &EngineProperties {
        &self.properties
    }

    /// Message of the most recent failed operation, or an empty string.
    pub fn error_string(&self) -> &str {
        &self.error
    }

    fn fail<T>(&mut self, err: EngineError) -> Result<T, EngineError> {
        self.error = err.to_string();
        log::error!("Audio engine error: {}", self.error);
        Err(err)
    }

    /// Loads and decodes an audio file into a new sample.
    ///
    /// Fails when no sample handle is free, the path is missing or not a regular file, the
    /// file cannot be decoded, it is neither mono nor stereo, or its rate differs from the
    /// configured sample rate.
    pub fn create_sample(&mut self, path: impl AsRef<Path>) -> Result<SampleHandle, EngineError> {
        let path = path.as_ref();
        log::info!("Loading sample '{}'", path.display());

        if !self.has_free_sample_handle() {
            log::warn!("Sample pool exhausted while loading '{}'", path.display());
            return self.fail(EngineError::SamplePoolExhausted);
        }

        let sample = match decode_audio_file_to_sample_buffer(path, self.properties.sample_rate) {
            Ok(sample) => sample,
            Err(source) => {
                return self.fail(EngineError::Load {
                    path: path.to_path_buf(),
                    source,
                });
            }
        };

        let handle = self.publish_sample(sample)?;
        log::info!("Loaded sample '{}' as {handle}", path.display());
        Ok(handle)
    }

    /// Creates a sample from already-decoded interleaved PCM.
    ///
    /// The same channel and sample-rate rules as [`Self::create_sample`] apply.
    pub fn create_sample_from_buffer(
        &mut self,
        samples: Vec<f32>,
        channels: usize,
        sample_rate: u32,
    ) -> Result<SampleHandle, EngineError> {
        if !self.has_free_sample_handle() {
            return self.fail(EngineError::SamplePoolExhausted);
        }

        let sample = match sample_buffer_from_pcm(
            samples,
            channels,
            sample_rate,
            self.properties.sample_rate,
        ) {
            Ok(sample) => sample,
            Err(source) => return self.fail(EngineError::InvalidBuffer(source)),
        };

        self.publish_sample(sample)
    }

    fn has_free_sample_handle(&mut self) -> bool {
        if !self.samples.has_free_handle() {
            self.drain_feedback();
        }
        self.samples.has_free_handle()
    }

    fn publish_sample(&mut self, sample: SampleBuffer) -> Result<SampleHandle, EngineError> {
        let Some(handle) = self.samples.insert(sample.clone()) else {
            return self.fail(EngineError::SamplePoolExhausted);
        };

        let message = ControlMessage::LoadSample {
            slot: handle.index(),
            sample,
        };
        if self.producer.push(message).is_err() {
            self.samples.remove_unpublished(handle);
            return self.fail(EngineError::QueueFull);
        }

        Ok(handle)
    }

    /// Destroys a sample.
    ///
    /// Clips bound to it are destroyed first, or the call is refused, depending on
    /// [`EngineProperties::sample_destroy_policy`]. The handle becomes reusable once the
    /// mixer has let go of the buffer, which a later [`Self::flush`] observes.
    pub fn destroy_sample(&mut self, sample: SampleHandle) -> Result<(), EngineError> {
        if !self.samples.is_loaded(sample) {
            return self.fail(EngineError::InvalidSample(sample));
        }

        let bound: Vec<u32> = self
            .clip_handles
            .allocated()
            .filter(|raw| {
                self.clips
                    .slot(*raw)
                    .is_some_and(|slot| slot.sample() == sample.raw())
            })
            .collect();

        if !bound.is_empty() {
            match self.properties.sample_destroy_policy {
                SampleDestroyPolicy::Reject => {
                    return self.fail(EngineError::SampleInUse {
                        sample,
                        clips: bound.len(),
                    });
                }
                SampleDestroyPolicy::DestroyBoundClips => {
                    log::debug!("Destroying {} clip(s) bound to {sample}", bound.len());
                    for raw in bound {
                        self.retire_clip(raw);
                    }
                }
            }
        }

        let Some(buffer) = self.samples.get(sample).cloned() else {
            return self.fail(EngineError::InvalidSample(sample));
        };
        self.samples.begin_release(sample);

        let message = ControlMessage::UnloadSample {
            slot: sample.index(),
        };
        if self.producer.push(message).is_err() {
            self.samples.cancel_release(sample, buffer);
            return self.fail(EngineError::QueueFull);
        }

        log::debug!("Destroyed {sample}");
        Ok(())
    }

    /// Format details of a loaded sample.
    pub fn sample_info(&self, sample: SampleHandle) -> Option<SampleInfo> {
        self.samples.get(sample).map(|buffer| SampleInfo {
            channels: buffer.channels,
            frames: buffer.frames(),
        })
    }

    /// Creates a paused clip bound to `sample`, at full volume, centered, playing once.
    pub fn create_clip(&mut self, sample: SampleHandle) -> Result<ClipHandle, EngineError> {
        if !self.samples.is_loaded(sample) {
            return self.fail(EngineError::InvalidSample(sample));
        }

        if !self.clip_handles.has_available() {
            self.reclaim_clip_handles();
        }
        let Some(raw) = self.clip_handles.allocate() else {
            log::warn!("Clip pool exhausted");
            return self.fail(EngineError::ClipPoolExhausted);
        };

        if let Some(slot) = self.clips.slot(raw) {
            slot.bind(sample.raw());
        }

        Ok(ClipHandle::from_raw(raw))
    }

    /// Creates a clip for `sample` and starts it.
    pub fn play_sample(&mut self, sample: SampleHandle) -> Result<ClipHandle, EngineError> {
        let clip = self.create_clip(sample)?;
        self.play(clip);
        Ok(clip)
    }

    /// Resets a clip and queues its handle for reuse.
    pub fn destroy_clip(&mut self, clip: ClipHandle) -> Result<(), EngineError> {
        if !self.clip_handles.is_allocated(clip.raw()) {
            return self.fail(EngineError::InvalidClip(clip));
        }
        self.retire_clip(clip.raw());
        Ok(())
    }

    fn retire_clip(&mut self, raw: u32) {
        if let Some(slot) = self.clips.slot(raw) {
            slot.reset();
        }
        if self.clip_handles.retire(raw) {
            self.retired_clips.push((raw, self.clips.renders()));
        }
    }

    /// Recycles retired clip handles once a full callback has completed since they were reset.
    fn reclaim_clip_handles(&mut self) {
        let renders = self.clips.renders();
        let handles = &mut self.clip_handles;
        self.retired_clips.retain(|&(raw, retired_at)| {
            if renders > retired_at {
                handles.recycle(raw);
                false
            } else {
                true
            }
        });
    }

    /// Applies buffers returned by the mixer.
    fn drain_feedback(&mut self) {
        while let Ok(message) = self.consumer.pop() {
            match message {
                AudioMessage::SampleReleased { slot, sample } => {
                    self.samples.finish_release(slot, sample);
                }
            }
        }
    }

    fn clip_slot(&self, clip: ClipHandle) -> Option<&ClipSlot> {
        if !self.clip_handles.is_allocated(clip.raw()) {
            log::debug!("Ignoring request for unallocated {clip}");
            return None;
        }
        self.clips.slot(clip.raw())
    }

    /// Starts or resumes a clip. Complete clips stay complete.
    ///
    /// With [`PlayMode::Restart`] the clip is rewound to the start first.
    pub fn play(&self, clip: ClipHandle) {
        let Some(slot) = self.clip_slot(clip) else {
            return;
        };
        if self.properties.play_mode == PlayMode::Restart && slot.state() != ClipState::Complete
        {
            slot.request_seek(0);
        }
        if !slot.play() {
            log::debug!("{clip} is complete and cannot be played");
        }
    }

    /// Pauses a playing clip, keeping its position.
    pub fn pause(&self, clip: ClipHandle) {
        if let Some(slot) = self.clip_slot(clip) {
            slot.pause();
        }
    }

    /// Sets the clip gain. Intended range is `[0, 1]`; non-finite values are ignored.
    pub fn set_clip_volume(&self, clip: ClipHandle, volume: f32) {
        if !volume.is_finite() {
            return;
        }
        if let Some(slot) = self.clip_slot(clip) {
            slot.set_volume(volume);
        }
    }

    /// Sets the clip pan. Intended range is `[-1, 1]` with 0 centered; non-finite values are
    /// ignored.
    pub fn set_clip_pan(&self, clip: ClipHandle, pan: f32) {
        if !pan.is_finite() {
            return;
        }
        if let Some(slot) = self.clip_slot(clip) {
            slot.set_pan(pan);
        }
    }

    /// Sets how many more times the clip wraps at the end of its sample.
    ///
    /// 0 plays through once more; any negative value (see
    /// [`LOOP_FOREVER`](constants::LOOP_FOREVER)) loops until paused or destroyed.
    pub fn set_clip_loop(&self, clip: ClipHandle, count: i32) {
        if let Some(slot) = self.clip_slot(clip) {
            slot.set_loops(count);
        }
    }

    /// Moves the clip to `position`, a fraction in `[0, 1]` of the sample length.
    pub fn set_clip_position(&self, clip: ClipHandle, position: f32) {
        if !position.is_finite() {
            return;
        }
        let Some(slot) = self.clip_slot(clip) else {
            return;
        };
        let Some(sample) = self
            .samples
            .get(SampleHandle::from_raw(slot.sample()))
        else {
            return;
        };

        let frames = sample.frames();
        let frame = ((position.clamp(0.0, 1.0) * frames as f32) as usize).min(frames);
        slot.request_seek(frame * sample.channels);
    }

    pub fn clip_volume(&self, clip: ClipHandle) -> Option<f32> {
        self.clip_slot(clip).map(ClipSlot::volume)
    }

    pub fn clip_pan(&self, clip: ClipHandle) -> Option<f32> {
        self.clip_slot(clip).map(ClipSlot::pan)
    }

    /// Remaining loop count; [`LOOP_FOREVER`](constants::LOOP_FOREVER) when infinite.
    pub fn clip_loop(&self, clip: ClipHandle) -> Option<i32> {
        self.clip_slot(clip).map(ClipSlot::loops)
    }

    /// Playback position as a fraction of the sample length.
    pub fn clip_position(&self, clip: ClipHandle) -> Option<f32> {
        let slot = self.clip_slot(clip)?;
        let sample = self.samples.get(SampleHandle::from_raw(slot.sample()))?;
        let cursor = slot.pending_seek().unwrap_or_else(|| slot.cursor());
        Some((cursor as f32 / sample.samples.len() as f32).min(1.0))
    }

    pub fn clip_state(&self, clip: ClipHandle) -> Option<ClipState> {
        self.clip_slot(clip).map(ClipSlot::state)
    }

    pub fn is_clip_playing(&self, clip: ClipHandle) -> bool {
        self.clip_state(clip) == Some(ClipState::Playing)
    }

    /// Number of clips the mixer is currently playing.
    pub fn playing_clip_count(&self) -> usize {
        self.clips.playing_count()
    }

    /// Reclaims finished work.
    ///
    /// Complete clips are destroyed, clip handles retired at least one callback ago are
    /// recycled, and sample buffers released by the mixer are freed. Playing and paused clips
    /// are never touched. Returns `true` while any clip is still playing.
    pub fn flush(&mut self) -> bool {
        self.drain_feedback();

        let complete: Vec<u32> = self
            .clip_handles
            .allocated()
            .filter(|raw| {
                self.clips
                    .slot(*raw)
                    .is_some_and(|slot| slot.state() == ClipState::Complete)
            })
            .collect();
        for raw in complete {
            self.retire_clip(raw);
        }

        self.reclaim_clip_handles();

        self.playing_clip_count() > 0
    }

    /// Destroys every clip and every sample.
    pub fn reset(&mut self) {
        log::info!("Resetting audio engine");

        let clips: Vec<u32> = self.clip_handles.allocated().collect();
        for raw in clips {
            self.retire_clip(raw);
        }

        for sample in self.samples.loaded() {
            // Bound clips are already gone, so only a full queue can refuse this.
            let _ = self.destroy_sample(sample);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio_engine::constants::{LOOP_FOREVER, OUTPUT_CHANNELS};
    use crate::audio_engine::sample_loader::tests::write_pcm16_wav;

    fn small_properties() -> EngineProperties {
        EngineProperties {
            buffer_size: 256,
            sample_rate: 44_100,
            max_sample_count: 4,
            max_clip_count: 4,
            ..EngineProperties::default()
        }
    }

    fn detached_engine() -> (AudioEngine, RtMixer) {
        AudioEngine::detached(small_properties()).unwrap()
    }

    fn render(mixer: &mut RtMixer, frames: usize) -> Vec<f32> {
        let mut output = vec![0.0; frames * OUTPUT_CHANNELS];
        mixer.render(&mut output);
        output
    }

    fn constant_sample(engine: &mut AudioEngine, channels: usize, frames: usize, value: f32) -> SampleHandle {
        engine
            .create_sample_from_buffer(vec![value; frames * channels], channels, 44_100)
            .unwrap()
    }

    #[test]
    fn test_detached_engine_creation() {
        let (engine, _mixer) = detached_engine();
        assert!(!engine.is_running());
        assert_eq!(engine.error_string(), "");
        assert_eq!(engine.playing_clip_count(), 0);
    }

    #[test]
    fn test_invalid_properties_rejected() {
        let properties = EngineProperties {
            max_clip_count: 0,
            ..small_properties()
        };
        assert!(matches!(
            AudioEngine::detached(properties),
            Err(EngineError::InvalidProperties(_))
        ));
    }

    #[test]
    fn test_audio_engine_initialize_terminate() {
        // Actual stream creation requires audio hardware
        if cpal::traits::HostTrait::default_output_device(&cpal::default_host()).is_none() {
            return;
        }

        // Devices may still refuse the fixed buffer size; only a running engine is checked.
        if let Ok(engine) = AudioEngine::initialize(EngineProperties::default()) {
            assert!(engine.is_running());
            let _ = engine.terminate();
        }
    }

    #[test]
    fn test_new_clip_is_paused_with_defaults() {
        let (mut engine, _mixer) = detached_engine();
        let sample = constant_sample(&mut engine, 1, 100, 0.5);

        let clip = engine.create_clip(sample).unwrap();

        assert!(!engine.is_clip_playing(clip));
        assert_eq!(engine.clip_state(clip), Some(ClipState::Paused));
        assert_eq!(engine.clip_volume(clip), Some(1.0));
        assert_eq!(engine.clip_pan(clip), Some(0.0));
        assert_eq!(engine.clip_loop(clip), Some(0));
        assert_eq!(engine.clip_position(clip), Some(0.0));
    }

    #[test]
    fn test_one_second_sample_scenario() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("half.wav");
        write_pcm16_wav(&path, 1, 44_100, &vec![16_384i16; 44_100]).unwrap();

        let (mut engine, mut mixer) = detached_engine();
        let sample = engine.create_sample(&path).unwrap();
        assert_eq!(
            engine.sample_info(sample),
            Some(SampleInfo {
                channels: 1,
                frames: 44_100
            })
        );

        let clip = engine.create_clip(sample).unwrap();
        engine.set_clip_volume(clip, 1.0);
        engine.set_clip_pan(clip, 0.0);
        engine.play(clip);
        assert!(engine.is_clip_playing(clip));

        let buffers = 44_100usize.div_ceil(256);
        assert_eq!(buffers, 173);

        for buffer in 0..buffers {
            let output = render(&mut mixer, 256);
            let audible_frames = if buffer + 1 < buffers {
                256
            } else {
                44_100 - 256 * (buffers - 1)
            };
            for (frame_index, frame) in output.chunks_exact(2).enumerate() {
                let expected = if frame_index < audible_frames { 0.5 } else { 0.0 };
                assert!((frame[0] - expected).abs() < 1e-6);
                assert!((frame[1] - expected).abs() < 1e-6);
            }
        }

        assert_eq!(engine.clip_state(clip), Some(ClipState::Complete));
        assert!(!engine.is_clip_playing(clip));
        assert_eq!(engine.clip_position(clip), Some(1.0));
    }

    #[test]
    fn test_missing_file_reports_error() {
        let (mut engine, _mixer) = detached_engine();

        let result = engine.create_sample("/nonexistent.wav");

        assert!(matches!(result, Err(EngineError::Load { .. })));
        assert!(!engine.error_string().is_empty());
        assert!(engine.error_string().contains("/nonexistent.wav"));
    }

    #[test]
    fn test_wrong_rate_file_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("48k.wav");
        write_pcm16_wav(&path, 1, 48_000, &[0; 64]).unwrap();
        let (mut engine, _mixer) = detached_engine();

        let result = engine.create_sample(&path);

        assert!(matches!(
            result,
            Err(EngineError::Load {
                source: SampleLoadError::SampleRateMismatch { .. },
                ..
            })
        ));
    }

    #[test]
    fn test_invalid_buffer_rejected() {
        let (mut engine, _mixer) = detached_engine();

        assert!(matches!(
            engine.create_sample_from_buffer(vec![0.1; 12], 3, 44_100),
            Err(EngineError::InvalidBuffer(SampleLoadError::UnsupportedChannels { channels: 3 }))
        ));
        assert!(matches!(
            engine.create_sample_from_buffer(Vec::new(), 1, 44_100),
            Err(EngineError::InvalidBuffer(SampleLoadError::Empty))
        ));
        assert!(engine.create_sample_from_buffer(vec![0.1; 4], 1, 22_050).is_err());
    }

    #[test]
    fn test_play_on_invalid_handles_is_noop() {
        let (mut engine, mut mixer) = detached_engine();
        let sample = constant_sample(&mut engine, 1, 100, 0.5);
        let clip = engine.create_clip(sample).unwrap();

        engine.play(ClipHandle::from_raw(0));
        engine.play(ClipHandle::from_raw(9999));
        engine.pause(ClipHandle::INVALID);
        engine.set_clip_volume(ClipHandle::from_raw(9999), 0.0);

        assert_eq!(engine.clip_state(clip), Some(ClipState::Paused));
        assert_eq!(engine.playing_clip_count(), 0);
        assert!(render(&mut mixer, 8).iter().all(|&s| s == 0.0));

        assert!(!engine.is_clip_playing(ClipHandle::INVALID));
        assert_eq!(engine.clip_volume(ClipHandle::from_raw(9999)), None);
        assert_eq!(engine.clip_position(ClipHandle::INVALID), None);
    }

    #[test]
    fn test_create_clip_from_invalid_sample() {
        let (mut engine, _mixer) = detached_engine();

        assert!(matches!(
            engine.create_clip(SampleHandle::INVALID),
            Err(EngineError::InvalidSample(_))
        ));
        assert!(matches!(
            engine.create_clip(SampleHandle::from_raw(3)),
            Err(EngineError::InvalidSample(_))
        ));
        assert!(!engine.error_string().is_empty());
    }

    #[test]
    fn test_sample_pool_exhaustion() {
        let (mut engine, _mixer) = detached_engine();
        for _ in 0..4 {
            constant_sample(&mut engine, 1, 4, 0.1);
        }

        let result = engine.create_sample_from_buffer(vec![0.1; 4], 1, 44_100);

        assert!(matches!(result, Err(EngineError::SamplePoolExhausted)));
        assert_eq!(engine.error_string(), "no available sample handles");
    }

    #[test]
    fn test_clip_pool_exhaustion_recovered_by_flush() {
        let (mut engine, mut mixer) = detached_engine();
        let sample = constant_sample(&mut engine, 1, 4, 0.1);
        let clips: Vec<ClipHandle> = (0..4).map(|_| engine.create_clip(sample).unwrap()).collect();

        assert!(matches!(
            engine.create_clip(sample),
            Err(EngineError::ClipPoolExhausted)
        ));

        engine.destroy_clip(clips[0]).unwrap();
        // Not reusable until a callback has completed since the reset.
        assert!(engine.create_clip(sample).is_err());

        render(&mut mixer, 4);
        engine.flush();
        assert_eq!(engine.create_clip(sample).unwrap(), clips[0]);
    }

    #[test]
    fn test_destroyed_clip_handle_not_reissued_immediately() {
        let (mut engine, _mixer) = detached_engine();
        let sample = constant_sample(&mut engine, 1, 4, 0.1);
        let a = engine.create_clip(sample).unwrap();

        engine.destroy_clip(a).unwrap();
        let b = engine.create_clip(sample).unwrap();

        assert_ne!(a, b);
        assert_eq!(engine.clip_state(a), None);
        assert!(engine.destroy_clip(a).is_err());
    }

    #[test]
    fn test_play_pause_resume() {
        let (mut engine, mut mixer) = detached_engine();
        let sample = constant_sample(&mut engine, 1, 1000, 0.5);
        let clip = engine.create_clip(sample).unwrap();

        engine.play(clip);
        render(&mut mixer, 100);
        engine.pause(clip);
        assert!(!engine.is_clip_playing(clip));
        assert!(render(&mut mixer, 100).iter().all(|&s| s == 0.0));
        assert!((engine.clip_position(clip).unwrap() - 0.1).abs() < 1e-6);

        engine.play(clip);
        render(&mut mixer, 100);
        assert!((engine.clip_position(clip).unwrap() - 0.2).abs() < 1e-6);
    }

    #[test]
    fn test_restart_play_mode_rewinds() {
        let properties = EngineProperties {
            play_mode: PlayMode::Restart,
            ..small_properties()
        };
        let (mut engine, mut mixer) = AudioEngine::detached(properties).unwrap();
        let sample = constant_sample(&mut engine, 1, 1000, 0.5);
        let clip = engine.create_clip(sample).unwrap();

        engine.play(clip);
        render(&mut mixer, 100);
        engine.pause(clip);
        engine.play(clip);
        assert_eq!(engine.clip_position(clip), Some(0.0));

        render(&mut mixer, 100);
        assert!((engine.clip_position(clip).unwrap() - 0.1).abs() < 1e-6);
    }

    #[test]
    fn test_complete_clip_not_resumed_by_play() {
        let (mut engine, mut mixer) = detached_engine();
        let sample = constant_sample(&mut engine, 1, 4, 0.5);
        let clip = engine.play_sample(sample).unwrap();

        render(&mut mixer, 8);
        assert_eq!(engine.clip_state(clip), Some(ClipState::Complete));

        engine.play(clip);
        assert_eq!(engine.clip_state(clip), Some(ClipState::Complete));
        assert!(render(&mut mixer, 8).iter().all(|&s| s == 0.0));
    }

    #[test]
    fn test_set_position_fraction() {
        let (mut engine, mut mixer) = detached_engine();
        let samples: Vec<f32> = (0..20).map(|i| i as f32 / 100.0).collect();
        // Ten stereo frames.
        let sample = engine.create_sample_from_buffer(samples, 2, 44_100).unwrap();
        let clip = engine.create_clip(sample).unwrap();

        engine.set_clip_position(clip, 0.5);
        assert_eq!(engine.clip_position(clip), Some(0.5));

        engine.play(clip);
        let output = render(&mut mixer, 1);
        // Frame 5 starts at interleaved index 10.
        assert!((output[0] - 0.10).abs() < 1e-6);
        assert!((output[1] - 0.11).abs() < 1e-6);

        engine.set_clip_position(clip, 7.0);
        assert_eq!(engine.clip_position(clip), Some(1.0));
    }

    #[test]
    fn test_setters_and_getters() {
        let (mut engine, _mixer) = detached_engine();
        let sample = constant_sample(&mut engine, 1, 10, 0.5);
        let clip = engine.create_clip(sample).unwrap();

        engine.set_clip_volume(clip, 0.25);
        engine.set_clip_pan(clip, -0.5);
        engine.set_clip_loop(clip, 3);

        assert_eq!(engine.clip_volume(clip), Some(0.25));
        assert_eq!(engine.clip_pan(clip), Some(-0.5));
        assert_eq!(engine.clip_loop(clip), Some(3));

        engine.set_clip_volume(clip, f32::NAN);
        assert_eq!(engine.clip_volume(clip), Some(0.25));

        engine.set_clip_loop(clip, -3);
        assert_eq!(engine.clip_loop(clip), Some(LOOP_FOREVER));
    }

    #[test]
    fn test_two_clips_mix_additively() {
        let (mut engine, mut mixer) = detached_engine();
        let sample = constant_sample(&mut engine, 1, 64, 0.3);
        engine.play_sample(sample).unwrap();
        engine.play_sample(sample).unwrap();

        let output = render(&mut mixer, 16);
        assert!(output.iter().all(|&s| (s - 0.6).abs() < 1e-6));

        let loud = constant_sample(&mut engine, 1, 64, 0.8);
        engine.play_sample(loud).unwrap();
        engine.play_sample(loud).unwrap();
        let output = render(&mut mixer, 16);
        assert!(output.iter().all(|&s| (s - 1.0).abs() < f32::EPSILON));
    }

    #[test]
    fn test_looping_clip_flush_cycle() {
        let (mut engine, mut mixer) = detached_engine();
        let sample = constant_sample(&mut engine, 1, 10, 0.5);
        let clip = engine.create_clip(sample).unwrap();
        engine.set_clip_loop(clip, 2);
        engine.play(clip);

        // Three passes over ten frames fit in 30 frames.
        render(&mut mixer, 20);
        assert!(engine.is_clip_playing(clip));
        assert_eq!(engine.clip_loop(clip), Some(0));
        render(&mut mixer, 10);
        assert_eq!(engine.clip_state(clip), Some(ClipState::Complete));

        assert!(!engine.flush());
        assert_eq!(engine.clip_state(clip), None);
    }

    #[test]
    fn test_flush_only_reclaims_complete_clips() {
        let (mut engine, mut mixer) = detached_engine();
        let short = constant_sample(&mut engine, 1, 4, 0.1);
        let long = constant_sample(&mut engine, 1, 4000, 0.1);

        let finished = engine.play_sample(short).unwrap();
        let playing = engine.play_sample(long).unwrap();
        let paused = engine.create_clip(long).unwrap();

        render(&mut mixer, 16);
        assert!(engine.flush());

        assert_eq!(engine.clip_state(finished), None);
        assert_eq!(engine.clip_state(playing), Some(ClipState::Playing));
        assert_eq!(engine.clip_state(paused), Some(ClipState::Paused));
        assert_eq!(engine.playing_clip_count(), 1);
    }

    #[test]
    fn test_flush_loop_ends_when_audio_finishes() {
        let (mut engine, mut mixer) = detached_engine();
        let sample = constant_sample(&mut engine, 2, 300, 0.1);
        engine.play_sample(sample).unwrap();

        let mut callbacks = 0;
        while engine.flush() {
            render(&mut mixer, 256);
            callbacks += 1;
            assert!(callbacks < 10);
        }

        assert_eq!(callbacks, 2);
        assert_eq!(engine.playing_clip_count(), 0);
    }

    #[test]
    fn test_destroy_sample_destroys_bound_clips() {
        let (mut engine, mut mixer) = detached_engine();
        let sample = constant_sample(&mut engine, 1, 100, 0.5);
        let other = constant_sample(&mut engine, 1, 100, 0.25);
        let bound = engine.play_sample(sample).unwrap();
        let unrelated = engine.play_sample(other).unwrap();
        render(&mut mixer, 4);

        engine.destroy_sample(sample).unwrap();

        assert_eq!(engine.clip_state(bound), None);
        assert_eq!(engine.clip_state(unrelated), Some(ClipState::Playing));
        assert_eq!(engine.sample_info(sample), None);
        assert!(engine.create_clip(sample).is_err());

        let output = render(&mut mixer, 4);
        assert!(output.iter().all(|&s| (s - 0.25).abs() < 1e-6));
    }

    #[test]
    fn test_destroy_sample_reject_policy() {
        let properties = EngineProperties {
            sample_destroy_policy: SampleDestroyPolicy::Reject,
            ..small_properties()
        };
        let (mut engine, _mixer) = AudioEngine::detached(properties).unwrap();
        let sample = constant_sample(&mut engine, 1, 100, 0.5);
        let clip = engine.create_clip(sample).unwrap();

        assert!(matches!(
            engine.destroy_sample(sample),
            Err(EngineError::SampleInUse { clips: 1, .. })
        ));
        assert!(engine.sample_info(sample).is_some());

        engine.destroy_clip(clip).unwrap();
        assert!(engine.destroy_sample(sample).is_ok());
    }

    #[test]
    fn test_destroy_invalid_sample_records_error() {
        let (mut engine, _mixer) = detached_engine();

        assert!(engine.destroy_sample(SampleHandle::INVALID).is_err());
        assert_eq!(engine.error_string(), "invalid sample #0");
        assert!(engine.destroy_sample(SampleHandle::from_raw(2)).is_err());
    }

    #[test]
    fn test_sample_handle_recycled_after_mixer_release() {
        let properties = EngineProperties {
            max_sample_count: 1,
            ..small_properties()
        };
        let (mut engine, mut mixer) = AudioEngine::detached(properties).unwrap();
        let first = constant_sample(&mut engine, 1, 10, 0.5);

        engine.destroy_sample(first).unwrap();
        assert!(matches!(
            engine.create_sample_from_buffer(vec![0.1; 4], 1, 44_100),
            Err(EngineError::SamplePoolExhausted)
        ));

        render(&mut mixer, 1);
        engine.flush();
        let second = constant_sample(&mut engine, 1, 10, 0.25);
        assert_eq!(second, first);
        assert_eq!(engine.sample_info(second).unwrap().frames, 10);
    }

    #[test]
    fn test_reset_frees_everything() {
        let (mut engine, mut mixer) = detached_engine();
        let a = constant_sample(&mut engine, 1, 100, 0.5);
        let b = constant_sample(&mut engine, 2, 100, 0.5);
        let clip_a = engine.play_sample(a).unwrap();
        let clip_b = engine.play_sample(b).unwrap();

        engine.reset();

        assert_eq!(engine.clip_state(clip_a), None);
        assert_eq!(engine.clip_state(clip_b), None);
        assert_eq!(engine.sample_info(a), None);
        assert_eq!(engine.sample_info(b), None);
        assert!(render(&mut mixer, 8).iter().all(|&s| s == 0.0));

        engine.flush();
        for _ in 0..4 {
            constant_sample(&mut engine, 1, 4, 0.1);
        }
    }

    #[test]
    fn test_terminate_detached_engine() {
        let (mut engine, _mixer) = detached_engine();
        constant_sample(&mut engine, 1, 4, 0.1);

        assert!(engine.terminate().is_ok());
    }
}
