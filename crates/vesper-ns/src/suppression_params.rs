//! Gain limits for each suppression level.

use crate::config::SuppressionLevel;

/// How aggressively the Wiener filter removes the estimated noise.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SuppressionParams {
    /// Scales the noise estimate before it is subtracted.
    pub over_subtraction_factor: f32,
    /// Lower bound of every per-bin gain.
    pub minimum_attenuating_gain: f32,
    /// Whether the frame gain is rescaled from the energy lost to filtering.
    pub use_attenuation_adjustment: bool,
}

impl SuppressionParams {
    pub const fn for_level(level: SuppressionLevel) -> Self {
        let (over_subtraction_factor, minimum_attenuating_gain, use_attenuation_adjustment) =
            match level {
                SuppressionLevel::K6dB => (1.0, 0.5, false),
                SuppressionLevel::K12dB => (1.0, 0.25, true),
                SuppressionLevel::K18dB => (1.1, 0.125, true),
                SuppressionLevel::K21dB => (1.25, 0.09, true),
            };
        Self {
            over_subtraction_factor,
            minimum_attenuating_gain,
            use_attenuation_adjustment,
        }
    }
}
