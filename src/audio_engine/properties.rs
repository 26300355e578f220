//! Engine configuration.

use crate::audio_engine::constants::{
    CONSTANT_POWER_GAIN, DEFAULT_BUFFER_SIZE, DEFAULT_MAX_CLIP_COUNT, DEFAULT_MAX_SAMPLE_COUNT,
    DEFAULT_SAMPLE_RATE,
};
use crate::audio_engine::errors::EngineError;

/// What [`AudioEngine::play`](crate::AudioEngine::play) does with a clip that already has a cursor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlayMode {
    /// Continue from the stored cursor.
    #[default]
    Resume,
    /// Rewind to the start of the sample on every play.
    Restart,
}

/// Gain law used to spread a clip across the stereo pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PanLaw {
    /// `left *= 1 - pan`, `right *= 1 + pan`.
    #[default]
    Linear,
    /// The linear law scaled by 0.707 on both channels.
    ConstantPower,
}

impl PanLaw {
    /// Returns the `(left, right)` gains for `pan`.
    pub fn gains(self, pan: f32) -> (f32, f32) {
        let left = 1.0 - pan;
        let right = 1.0 + pan;
        match self {
            Self::Linear => (left, right),
            Self::ConstantPower => (left * CONSTANT_POWER_GAIN, right * CONSTANT_POWER_GAIN),
        }
    }
}

/// How [`AudioEngine::destroy_sample`](crate::AudioEngine::destroy_sample) treats clips
/// that are still bound to the sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SampleDestroyPolicy {
    /// Destroy every bound clip, then the sample.
    #[default]
    DestroyBoundClips,
    /// Refuse with [`EngineError::SampleInUse`] while any clip is bound.
    Reject,
}

/// Audio system properties.
///
/// `buffer_size` is the number of frames processed per device callback,
/// `sample_rate` the only rate samples may be loaded at, and the two
/// `max_*` counts size the handle pools once for the lifetime of the engine.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineProperties {
    pub buffer_size: u32,
    pub sample_rate: u32,
    pub max_sample_count: u32,
    pub max_clip_count: u32,
    pub play_mode: PlayMode,
    pub pan_law: PanLaw,
    pub sample_destroy_policy: SampleDestroyPolicy,
}

impl Default for EngineProperties {
    fn default() -> Self {
        Self {
            buffer_size: DEFAULT_BUFFER_SIZE,
            sample_rate: DEFAULT_SAMPLE_RATE,
            max_sample_count: DEFAULT_MAX_SAMPLE_COUNT,
            max_clip_count: DEFAULT_MAX_CLIP_COUNT,
            play_mode: PlayMode::default(),
            pan_law: PanLaw::default(),
            sample_destroy_policy: SampleDestroyPolicy::default(),
        }
    }
}

impl EngineProperties {
    /// Checks that every size is usable.
    pub fn validate(&self) -> Result<(), EngineError> {
        if self.buffer_size == 0 {
            return Err(EngineError::InvalidProperties("buffer size must be non-zero"));
        }
        if self.sample_rate == 0 {
            return Err(EngineError::InvalidProperties("sample rate must be non-zero"));
        }
        if self.max_sample_count == 0 {
            return Err(EngineError::InvalidProperties(
                "max sample count must be non-zero",
            ));
        }
        if self.max_clip_count == 0 {
            return Err(EngineError::InvalidProperties("max clip count must be non-zero"));
        }
        // Handle `u32::MAX` would be one past the last slot index.
        if self.max_sample_count == u32::MAX || self.max_clip_count == u32::MAX {
            return Err(EngineError::InvalidProperties("pool capacity too large"));
        }
        Ok(())
    }
}
