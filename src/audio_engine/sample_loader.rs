//! Audio file loading and decoding functionality.
//!
//! This module provides functions for loading and decoding audio files into sample buffers
//! that can be used by the real-time mixer. Nothing is converted: the source must already be
//! mono or stereo at the system sample rate.

use std::fs::File;
use std::path::Path;
use std::sync::Arc;
use symphonia::core::{
    audio::SampleBuffer as SymphoniaSampleBuffer, codecs::DecoderOptions,
    errors::Error as SymphoniaError, formats::FormatOptions, io::MediaSourceStream,
    meta::MetadataOptions, probe::Hint,
};
use symphonia::default::{get_codecs, get_probe};

use crate::audio_engine::errors::SampleLoadError;
use crate::messages::SampleBuffer;

/// Checks that material with `channels` and `rate_hz` can be mixed by a system running at
/// `output_rate_hz`.
pub fn validate_format(
    channels: usize,
    rate_hz: u32,
    output_rate_hz: u32,
) -> Result<(), SampleLoadError> {
    if channels != 1 && channels != 2 {
        return Err(SampleLoadError::UnsupportedChannels { channels });
    }

    if rate_hz != output_rate_hz {
        return Err(SampleLoadError::SampleRateMismatch {
            file_rate: rate_hz,
            output_rate: output_rate_hz,
        });
    }

    Ok(())
}

/// Wraps already-decoded interleaved PCM in a sample buffer.
///
/// A trailing partial frame is dropped so the length always matches the channel count.
pub fn sample_buffer_from_pcm(
    mut samples: Vec<f32>,
    channels: usize,
    rate_hz: u32,
    output_rate_hz: u32,
) -> Result<SampleBuffer, SampleLoadError> {
    validate_format(channels, rate_hz, output_rate_hz)?;

    samples.truncate(samples.len() - samples.len() % channels);
    if samples.is_empty() {
        return Err(SampleLoadError::Empty);
    }

    Ok(SampleBuffer {
        channels,
        samples: Arc::from(samples.into_boxed_slice()),
    })
}

/// Decodes an audio file into a sample buffer.
///
/// # Parameters
///
/// - `path`: Path to the audio file to load
/// - `output_rate_hz`: System sample rate in Hz; files at any other rate are rejected
///
/// # Errors
///
/// - File not found, or the path is not a regular file
/// - Audio format not recognized or corrupted
/// - Channel count other than mono or stereo
/// - Sample rate mismatch
/// - No audio frames in the file
pub fn decode_audio_file_to_sample_buffer(
    path: &Path,
    output_rate_hz: u32,
) -> Result<SampleBuffer, SampleLoadError> {
    if !std::fs::metadata(path)?.is_file() {
        return Err(SampleLoadError::NotAFile);
    }

    let file = File::open(path)?;
    let mss = MediaSourceStream::new(Box::new(file), Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(ext);
    }

    let probed = get_probe().format(
        &hint,
        mss,
        &FormatOptions::default(),
        &MetadataOptions::default(),
    )?;
    let mut format = probed.format;

    let track = format
        .default_track()
        .ok_or(SampleLoadError::NoDefaultTrack)?;
    let track_id = track.id;
    let file_rate_hz = track
        .codec_params
        .sample_rate
        .ok_or(SampleLoadError::MissingSampleRate)?;
    let file_channels = track
        .codec_params
        .channels
        .ok_or(SampleLoadError::MissingChannels)?
        .count();

    validate_format(file_channels, file_rate_hz, output_rate_hz)?;

    let mut decoder = get_codecs().make(&track.codec_params, &DecoderOptions::default())?;

    let mut decoded: Vec<f32> = Vec::new();
    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(err))
                if err.kind() == std::io::ErrorKind::UnexpectedEof =>
            {
                break;
            }
            Err(err) => return Err(SampleLoadError::Decode(err)),
        };

        if packet.track_id() != track_id {
            continue;
        }

        let audio_buf = decoder.decode(&packet)?;
        let spec = *audio_buf.spec();
        let duration = audio_buf.capacity() as u64;

        let mut sample_buf = SymphoniaSampleBuffer::<f32>::new(duration, spec);
        sample_buf.copy_interleaved_ref(audio_buf);
        decoded.extend_from_slice(sample_buf.samples());
    }

    log::debug!(
        "Decoded {} samples ({} ch @ {} Hz) from '{}'",
        decoded.len(),
        file_channels,
        file_rate_hz,
        path.display()
    );

    sample_buffer_from_pcm(decoded, file_channels, file_rate_hz, output_rate_hz)
}
