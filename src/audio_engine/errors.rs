//! Audio-specific error types.

use std::path::PathBuf;

use thiserror::Error;

use crate::audio_engine::handles::{ClipHandle, SampleHandle};

/// Errors that can occur while loading audio files.
#[derive(Debug, Error)]
pub enum SampleLoadError {
    /// Failed to open the audio file.
    #[error("failed to open file: {0}")]
    Io(#[from] std::io::Error),

    /// The path exists but does not name a regular file.
    #[error("path is not a file")]
    NotAFile,

    /// Failed to decode the audio file.
    #[error("failed to decode audio file: {0}")]
    Decode(#[from] symphonia::core::errors::Error),

    /// Audio file has no default track.
    #[error("audio file has no default track")]
    NoDefaultTrack,

    /// Audio file is missing sample rate information.
    #[error("audio file is missing a sample rate")]
    MissingSampleRate,

    /// Audio file is missing channel information.
    #[error("audio file is missing channel information")]
    MissingChannels,

    /// Only mono and stereo material can be mixed.
    #[error("unsupported channel count {channels} (sample must be mono or stereo)")]
    UnsupportedChannels {
        /// Number of channels in the source.
        channels: usize,
    },

    /// The source rate differs from the configured system rate.
    #[error("sample rate mismatch: file is {file_rate} Hz, system runs at {output_rate} Hz")]
    SampleRateMismatch {
        /// Sample rate of the source.
        file_rate: u32,
        /// Sample rate the engine was initialized with.
        output_rate: u32,
    },

    /// Decoding produced no audio frames.
    #[error("audio file contains no samples")]
    Empty,
}

/// Errors reported by [`AudioEngine`](crate::AudioEngine) operations.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("invalid engine properties: {0}")]
    InvalidProperties(&'static str),

    #[error("no default output device")]
    NoOutputDevice,

    #[error("failed to build audio stream: {0}")]
    BuildStream(#[from] cpal::BuildStreamError),

    #[error("failed to start audio stream: {0}")]
    PlayStream(#[from] cpal::PlayStreamError),

    #[error("failed to stop audio stream: {0}")]
    PauseStream(#[from] cpal::PauseStreamError),

    #[error("error loading sample '{}': {source}", path.display())]
    Load {
        path: PathBuf,
        #[source]
        source: SampleLoadError,
    },

    #[error("invalid sample buffer: {0}")]
    InvalidBuffer(#[source] SampleLoadError),

    #[error("no available sample handles")]
    SamplePoolExhausted,

    #[error("no available clip handles")]
    ClipPoolExhausted,

    #[error("invalid {0}")]
    InvalidSample(SampleHandle),

    #[error("invalid {0}")]
    InvalidClip(ClipHandle),

    #[error("sample {sample} is still referenced by {clips} clip(s)")]
    SampleInUse { sample: SampleHandle, clips: usize },

    #[error("control queue is full")]
    QueueFull,
}
