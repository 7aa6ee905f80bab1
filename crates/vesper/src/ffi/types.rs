//! C-compatible type definitions for the C API.
//!
//! All types here are `#[repr(C)]` and safe to pass across FFI boundaries.

use crate::AudioProcessing;

/// Status codes returned by C API functions.
///
/// `0` = success, negative = error.
#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VspError {
    /// Operation succeeded.
    None = 0,
    /// Unspecified error, including a panic caught at the FFI boundary.
    Unspecified = -1,
    /// The pipeline could not be built from the given configuration.
    ConstructionFailure = -2,
    /// Null pointer passed to a function that requires non-null.
    NullPointer = -5,
    /// Bad sample rate.
    BadSampleRate = -7,
    /// A buffer length differs from the stream configuration.
    InvalidFrameSize = -8,
    /// Bad number of channels.
    BadNumberChannels = -9,
    /// A stream parameter was out of range and has been clamped; the call
    /// still took effect.
    BadStreamParameterWarning = -13,
    /// A two-phase stage was driven out of order.
    SequenceViolation = -14,
    /// An enabled stage failed to process the frame.
    InternalStageFailure = -15,
}

/// Noise suppression aggressiveness level.
#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VspNoiseSuppressionLevel {
    Low = 0,
    Moderate = 1,
    High = 2,
    VeryHigh = 3,
}

/// Downmix method for multi-channel capture.
#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VspDownmixMethod {
    AverageChannels = 0,
    UseFirstChannel = 1,
}

/// Flat configuration struct for the pipeline.
///
/// Obtain a default-initialized instance via `vsp_config_default()`.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct VspConfig {
    // -- Pipeline --
    /// 16000 or 48000; any other value selects 48000.
    pub pipeline_maximum_internal_processing_rate: i32,
    pub pipeline_capture_downmix_method: VspDownmixMethod,

    // -- Pre-amplifier --
    pub pre_amplifier_enabled: bool,
    pub pre_amplifier_fixed_gain_factor: f32,

    // -- Capture level adjustment --
    pub capture_level_adjustment_enabled: bool,
    pub capture_level_adjustment_pre_gain_factor: f32,
    pub capture_level_adjustment_post_gain_factor: f32,

    // -- High-pass filter --
    pub high_pass_filter_enabled: bool,
    pub high_pass_filter_apply_in_full_band: bool,

    // -- Echo canceller --
    pub echo_canceller_enabled: bool,
    pub echo_canceller_enforce_high_pass_filtering: bool,

    // -- Noise suppression --
    pub noise_suppression_enabled: bool,
    pub noise_suppression_level: VspNoiseSuppressionLevel,

    // -- Gain controller 2 --
    pub agc2_enabled: bool,
    pub agc2_fixed_digital_gain_db: f32,
}

/// Audio stream configuration (sample rate and channel count).
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct VspStreamConfig {
    pub sample_rate_hz: i32,
    pub num_channels: i32,
}

/// Processing statistics.
///
/// Each statistic has a `has_*` flag; when it is `false` the value field is
/// meaningless.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct VspStats {
    pub has_output_rms_dbfs: bool,
    pub output_rms_dbfs: f64,

    pub has_speech_probability: bool,
    pub speech_probability: f64,

    pub has_echo_return_loss_enhancement: bool,
    pub echo_return_loss_enhancement: f64,
}

/// Opaque handle to the processing pipeline.
///
/// Created via `vsp_create()` or `vsp_create_with_config()`, destroyed via
/// `vsp_destroy()`.
///
/// **NOT thread-safe**: all calls on the same handle must be serialized.
#[derive(Debug)]
pub struct VspAudioProcessing {
    pub(crate) inner: AudioProcessing,
}
