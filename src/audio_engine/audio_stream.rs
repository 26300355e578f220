//! Audio Stream Module
//!
//! This module handles CPAL audio stream management including:
//! - Logger setup for the engine
//! - Opening the default output device with the configured buffer size and rate
//! - Installing the [`RtMixer`] as the realtime callback
//! - Starting and stopping the stream

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{BufferSize, Stream, StreamConfig};
use env_logger::{Builder, Env};

use crate::audio_engine::constants::OUTPUT_CHANNELS;
use crate::audio_engine::errors::EngineError;
use crate::audio_engine::mixer::RtMixer;
use crate::audio_engine::properties::EngineProperties;

/// Setup and configure the logger for audio operations
pub fn setup_logger() {
    // Default to `info`; override via `RUST_LOG`, e.g. `RUST_LOG=debug` when troubleshooting.
    Builder::from_env(Env::default().default_filter_or("info"))
        .format_timestamp(None)
        .try_init()
        .unwrap_or(()); // Ignore initialization errors
}

fn stream_config(properties: &EngineProperties) -> StreamConfig {
    StreamConfig {
        channels: OUTPUT_CHANNELS as u16,
        sample_rate: properties.sample_rate,
        buffer_size: BufferSize::Fixed(properties.buffer_size),
    }
}

/// Create the output stream with `mixer` as its callback.
///
/// The stream is built on the default host's default output device as stereo f32 at the
/// configured sample rate and fixed buffer size. It is returned stopped.
pub fn create_audio_stream(
    properties: &EngineProperties,
    mut mixer: RtMixer,
) -> Result<Stream, EngineError> {
    let host = cpal::default_host();
    let device = host
        .default_output_device()
        .ok_or(EngineError::NoOutputDevice)?;

    log::info!(
        "Opening output stream ({} ch@{} Hz, {} frames)",
        OUTPUT_CHANNELS,
        properties.sample_rate,
        properties.buffer_size
    );

    let stream = device.build_output_stream(
        &stream_config(properties),
        move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
            mixer.render(data);
        },
        |err| {
            log::error!("Audio stream error: {}", err);
        },
        None,
    )?;

    Ok(stream)
}

/// Start playing the audio stream
pub fn start_stream(stream: &Stream) -> Result<(), EngineError> {
    stream.play()?;
    Ok(())
}

/// Stop the audio stream; the callback is not invoked again once this returns.
pub fn stop_stream(stream: &Stream) -> Result<(), EngineError> {
    stream.pause()?;
    Ok(())
}
