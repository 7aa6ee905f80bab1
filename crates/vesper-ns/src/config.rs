//! Suppressor configuration and the constants shared by its estimators.

/// Length of the analysis FFT.
pub const FFT_SIZE: usize = 256;

/// Number of unique frequency bins of a real FFT of [`FFT_SIZE`].
pub const FFT_SIZE_BY_2_PLUS_1: usize = FFT_SIZE / 2 + 1;

/// Samples per frame: 10 ms at 16 kHz.
pub const NS_FRAME_SIZE: usize = 160;

/// Samples shared between consecutive analysis windows.
pub const OVERLAP_SIZE: usize = FFT_SIZE - NS_FRAME_SIZE;

/// Frames during which the parametric noise model is blended in.
pub const SHORT_STARTUP_PHASE_BLOCKS: i32 = 50;

/// Frames before the quantile trackers and the overall scaling settle.
pub const LONG_STARTUP_PHASE_BLOCKS: i32 = 200;

/// Frames between two prior-model re-estimations.
pub const FEATURE_UPDATE_WINDOW_SIZE: i32 = 500;

/// Initial value and threshold of the likelihood-ratio feature.
pub const LRT_FEATURE_THR: f32 = 0.5;

pub const BIN_SIZE_LRT: f32 = 0.1;
pub const BIN_SIZE_SPEC_FLAT: f32 = 0.05;
pub const BIN_SIZE_SPEC_DIFF: f32 = 0.1;

/// Target attenuation of stationary noise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SuppressionLevel {
    /// About 6 dB.
    K6dB,
    /// About 12 dB.
    #[default]
    K12dB,
    /// About 18 dB.
    K18dB,
    /// About 21 dB.
    K21dB,
}

/// Construction-time settings of a [`NoiseSuppressor`](crate::NoiseSuppressor).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NsConfig {
    pub target_level: SuppressionLevel,
}
