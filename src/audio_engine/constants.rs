//! Audio engine configuration constants and limits.

/// Number of interleaved output channels written by the mixer (stereo).
pub const OUTPUT_CHANNELS: usize = 2;

/// Loop count that makes a clip repeat until it is paused or destroyed.
pub const LOOP_FOREVER: i32 = -1;

/// Lowest amplitude the mixer will emit.
pub const AMPLITUDE_MIN: f32 = -1.0;

/// Highest amplitude the mixer will emit.
pub const AMPLITUDE_MAX: f32 = 1.0;

/// Per-channel scale applied by [`PanLaw::ConstantPower`](crate::PanLaw::ConstantPower).
pub const CONSTANT_POWER_GAIN: f32 = 0.707;

/// Default frames per device callback.
pub const DEFAULT_BUFFER_SIZE: u32 = 256;

/// Default system sample rate; samples at any other rate are rejected.
pub const DEFAULT_SAMPLE_RATE: u32 = 44_100;

/// Default number of sample handles.
pub const DEFAULT_MAX_SAMPLE_COUNT: u32 = 2048;

/// Default number of clip handles.
pub const DEFAULT_MAX_CLIP_COUNT: u32 = 2048;

/// Extra ring buffer room on top of the per-slot message bound.
pub const QUEUE_SLACK: usize = 64;

/// Default clip volume.
pub const DEFAULT_VOLUME: f32 = 1.0;

/// Default clip pan (center).
pub const DEFAULT_PAN: f32 = 0.0;

/// Default loop count (play once).
pub const DEFAULT_LOOP_COUNT: i32 = 0;
