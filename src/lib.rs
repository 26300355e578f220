//! Realtime sample and clip mixing.
//!
//! Decoded samples live in a fixed-size sample pool, playback instances ("clips") in a
//! fixed-size clip pool, and a realtime mixer sums every playing clip into a stereo output
//! stream. All control goes through [`AudioEngine`].

mod audio_engine;
mod messages;

pub use audio_engine::constants::LOOP_FOREVER;
pub use audio_engine::{
    AudioEngine, ClipHandle, ClipState, EngineError, EngineProperties, PanLaw, PlayMode,
    RtMixer, SampleDestroyPolicy, SampleHandle, SampleInfo, SampleLoadError,
};
