//! Real-time voice enhancement pipeline.
//!
//! Cleans up a microphone signal in 10 ms frames: high-pass filtering,
//! echo control against a loudspeaker reference, spectral noise suppression
//! and a fixed gain with limiter. Any input and output sample rate in
//! `8000..=384000` Hz is accepted; internally the pipeline runs at 16 kHz, or
//! at 48 kHz split into three 16 kHz bands.
//!
//! # Quick Start
//!
//! ```
//! use vesper::{AudioProcessing, Config, StreamConfig};
//! use vesper::config::{EchoCanceller, NoiseSuppression};
//!
//! let config = Config {
//!     echo_canceller: Some(EchoCanceller::default()),
//!     noise_suppression: Some(NoiseSuppression::default()),
//!     ..Default::default()
//! };
//!
//! let mut apm = AudioProcessing::builder().config(config).build()?;
//! let stream = StreamConfig::new(16000, 1);
//!
//! // For each 10 ms frame:
//! let far_end = vec![0.0f32; stream.num_frames()];
//! let mut far_end_out = vec![0.0f32; stream.num_frames()];
//! apm.process_reverse_stream_f32(&[&far_end], &stream, &stream, &mut [&mut far_end_out])?;
//!
//! let near_end = vec![0.0f32; stream.num_frames()];
//! let mut cleaned = vec![0.0f32; stream.num_frames()];
//! apm.process_stream_f32(&[&near_end], &stream, &stream, &mut [&mut cleaned])?;
//! # Ok::<(), vesper::Error>(())
//! ```

pub(crate) mod audio_buffer;
mod audio_processing;
pub(crate) mod audio_processing_impl;
pub(crate) mod capture_levels_adjuster;
pub mod config;
pub mod echo_control;
#[cfg(feature = "ffi")]
pub mod ffi;
pub(crate) mod gain_controller2;
pub(crate) mod high_pass_filter;
pub(crate) mod render_queue;
pub mod stats;
pub(crate) mod stream_config;
pub(crate) mod three_band_filter_bank;

// Public re-exports.
pub use audio_processing::{AudioProcessing, AudioProcessingBuilder, Error};
pub use config::Config;
pub use stats::AudioProcessingStats;
pub use stream_config::{
    CheckedStreamConfig, MAX_SAMPLE_RATE_HZ, MIN_SAMPLE_RATE_HZ, StreamConfig, StreamConfigError,
};

/// Stages usable on their own, outside the pipeline.
pub mod components {
    pub use crate::high_pass_filter::HighPassFilter;
    pub use crate::three_band_filter_bank::{
        FULL_BAND_SIZE, NUM_BANDS, ROUND_TRIP_DELAY, SPLIT_BAND_SIZE, ThreeBandFilterBank,
    };
    pub use vesper_ns::{NoiseSuppressor, NsConfig, NsError, SuppressionLevel};
}
