//! Pipeline configuration.

use vesper_ns::SuppressionLevel;

use crate::audio_processing::Error;

/// Largest fixed digital gain accepted by [`FixedDigital::gain_db`].
pub const MAX_FIXED_GAIN_DB: f32 = 90.0;

/// Largest linear factor accepted by the capture level stages.
pub const MAX_CAPTURE_GAIN_FACTOR: f32 = 1000.0;

/// Top-level configuration for the processing pipeline.
///
/// A `Config` is an immutable snapshot: the pipeline replaces its active
/// config wholesale at the start of the next frame after
/// [`AudioProcessing::apply_config()`](crate::AudioProcessing::apply_config),
/// so every frame is processed under exactly one config.
///
/// All stages are disabled (`None`) by default. Setting a stage to
/// `Some(...)` enables it.
///
/// # Example
///
/// ```
/// use vesper::Config;
/// use vesper::config::{HighPassFilter, NoiseSuppression, NoiseSuppressionLevel};
///
/// let config = Config {
///     high_pass_filter: Some(HighPassFilter::default()),
///     noise_suppression: Some(NoiseSuppression {
///         level: NoiseSuppressionLevel::High,
///     }),
///     ..Default::default()
/// };
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Config {
    /// Pipeline processing properties.
    pub pipeline: Pipeline,
    /// Linear gain applied to the capture signal before any other stage.
    /// Set to `Some(...)` to enable.
    pub pre_amplifier: Option<PreAmplifier>,
    /// Linear gains applied to the capture signal before and after every
    /// other stage. Combines with [`Config::pre_amplifier`] when both are
    /// set. Set to `Some(...)` to enable.
    pub capture_level_adjustment: Option<CaptureLevelAdjustment>,
    /// High-pass filter settings. Set to `Some(...)` to enable.
    pub high_pass_filter: Option<HighPassFilter>,
    /// Echo control settings. Set to `Some(...)` to enable.
    pub echo_canceller: Option<EchoCanceller>,
    /// Noise suppression settings. Set to `Some(...)` to enable.
    pub noise_suppression: Option<NoiseSuppression>,
    /// Fixed digital gain followed by a limiter. Set to `Some(...)` to enable.
    pub gain_controller2: Option<GainController2>,
}

impl Config {
    /// Checks the numeric fields of every enabled stage.
    ///
    /// Returns [`Error::ConstructionFailure`] when the fixed digital gain is
    /// not a finite value in `0.0..=90.0` dB, or a capture gain factor is not
    /// a finite value in `0.0..=1000.0`.
    pub fn validate(&self) -> Result<(), Error> {
        if let Some(gc2) = &self.gain_controller2
            && !valid_fixed_gain_db(gc2.fixed_digital.gain_db)
        {
            return Err(Error::ConstructionFailure);
        }
        if let Some(pre) = &self.pre_amplifier
            && !valid_gain_factor(pre.fixed_gain_factor)
        {
            return Err(Error::ConstructionFailure);
        }
        if let Some(cla) = &self.capture_level_adjustment
            && !(valid_gain_factor(cla.pre_gain_factor) && valid_gain_factor(cla.post_gain_factor))
        {
            return Err(Error::ConstructionFailure);
        }
        Ok(())
    }

    /// Whether the capture level stage runs.
    pub(crate) fn capture_levels_required(&self) -> bool {
        self.pre_amplifier.is_some() || self.capture_level_adjustment.is_some()
    }

    /// Combined linear gain applied before every other capture stage.
    pub(crate) fn capture_pre_gain(&self) -> f32 {
        let pre_amplifier = self
            .pre_amplifier
            .as_ref()
            .map_or(1.0, |pre| pre.fixed_gain_factor);
        let adjustment = self
            .capture_level_adjustment
            .as_ref()
            .map_or(1.0, |cla| cla.pre_gain_factor);
        pre_amplifier * adjustment
    }

    /// Linear gain applied after every other capture stage.
    pub(crate) fn capture_post_gain(&self) -> f32 {
        self.capture_level_adjustment
            .as_ref()
            .map_or(1.0, |cla| cla.post_gain_factor)
    }

    /// Whether the high-pass filter must run, either because it is enabled
    /// or because the echo stage enforces it.
    pub(crate) fn high_pass_filter_required(&self) -> bool {
        self.high_pass_filter.is_some()
            || self
                .echo_canceller
                .as_ref()
                .is_some_and(|ec| ec.enforce_high_pass_filtering)
    }

    /// Whether the high-pass filter operates on the full band.
    pub(crate) fn high_pass_filter_full_band(&self) -> bool {
        self.high_pass_filter
            .as_ref()
            .is_none_or(|hpf| hpf.apply_in_full_band)
    }
}

/// Maximum internal processing rate.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum MaxProcessingRate {
    /// 16 kHz, a single band.
    Rate16kHz,
    /// 48 kHz, split into three 16 kHz bands.
    #[default]
    Rate48kHz,
}

impl MaxProcessingRate {
    /// Returns the rate in Hz.
    pub fn as_hz(self) -> u32 {
        match self {
            Self::Rate16kHz => 16000,
            Self::Rate48kHz => 48000,
        }
    }
}

/// Pipeline processing properties.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Pipeline {
    /// Maximum allowed processing rate used internally.
    pub maximum_internal_processing_rate: MaxProcessingRate,
    /// How to downmix multi-channel capture audio when the output is mono.
    pub capture_downmix_method: DownmixMethod,
}

/// Ways to downmix a multi-channel track to mono.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DownmixMethod {
    /// Average across channels.
    #[default]
    AverageChannels,
    /// Use the first channel.
    UseFirstChannel,
}

/// High-pass filter settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HighPassFilter {
    /// When true, the filter operates on the full-band signal rather than
    /// only the lowest split band (default: true).
    pub apply_in_full_band: bool,
}

impl Default for HighPassFilter {
    fn default() -> Self {
        Self {
            apply_in_full_band: true,
        }
    }
}

/// Echo control settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EchoCanceller {
    /// Run the high-pass filter whenever echo control is enabled, even if
    /// [`Config::high_pass_filter`] is `None` (default: true).
    pub enforce_high_pass_filtering: bool,
}

impl Default for EchoCanceller {
    fn default() -> Self {
        Self {
            enforce_high_pass_filtering: true,
        }
    }
}

/// Background noise suppression settings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NoiseSuppression {
    /// Aggressiveness level for noise suppression (default: `Moderate`).
    pub level: NoiseSuppressionLevel,
}

/// Noise suppression aggressiveness level.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum NoiseSuppressionLevel {
    /// Low suppression (~6 dB).
    Low,
    /// Moderate suppression (~12 dB, default).
    #[default]
    Moderate,
    /// High suppression (~18 dB).
    High,
    /// Very high suppression (~21 dB).
    VeryHigh,
}

impl From<NoiseSuppressionLevel> for SuppressionLevel {
    fn from(level: NoiseSuppressionLevel) -> Self {
        match level {
            NoiseSuppressionLevel::Low => Self::K6dB,
            NoiseSuppressionLevel::Moderate => Self::K12dB,
            NoiseSuppressionLevel::High => Self::K18dB,
            NoiseSuppressionLevel::VeryHigh => Self::K21dB,
        }
    }
}

/// Pre-amplifier settings.
#[derive(Debug, Clone, PartialEq)]
pub struct PreAmplifier {
    /// Linear gain factor in `0.0..=1000.0` (default: 1.0).
    pub fixed_gain_factor: f32,
}

impl Default for PreAmplifier {
    fn default() -> Self {
        Self {
            fixed_gain_factor: 1.0,
        }
    }
}

/// Capture level adjustment settings.
#[derive(Debug, Clone, PartialEq)]
pub struct CaptureLevelAdjustment {
    /// Linear gain factor applied before any processing, in
    /// `0.0..=1000.0` (default: 1.0).
    pub pre_gain_factor: f32,
    /// Linear gain factor applied after all processing, in
    /// `0.0..=1000.0` (default: 1.0).
    pub post_gain_factor: f32,
}

impl Default for CaptureLevelAdjustment {
    fn default() -> Self {
        Self {
            pre_gain_factor: 1.0,
            post_gain_factor: 1.0,
        }
    }
}

/// Gain stage settings: a fixed digital gain followed by a limiter.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GainController2 {
    /// Applies a fixed digital gain before the limiter.
    pub fixed_digital: FixedDigital,
}

/// Fixed digital gain settings.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FixedDigital {
    /// Fixed gain in dB, in `0.0..=90.0` (default: 0.0). A value greater than
    /// zero turns the limiter into a compressor that first applies the gain.
    pub gain_db: f32,
}

/// Settings that change without a new [`Config`].
///
/// Queued by
/// [`AudioProcessing::set_runtime_setting()`](crate::AudioProcessing::set_runtime_setting)
/// and applied at the start of the next capture frame, after any pending
/// config. A setting whose stage is disabled, or whose value is out of
/// range, is logged and dropped.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RuntimeSetting {
    /// Linear capture pre-gain. Replaces [`PreAmplifier::fixed_gain_factor`]
    /// when the pre-amplifier is enabled, otherwise
    /// [`CaptureLevelAdjustment::pre_gain_factor`].
    CapturePreGain(f32),
    /// Linear capture post-gain; replaces
    /// [`CaptureLevelAdjustment::post_gain_factor`].
    CapturePostGain(f32),
    /// Fixed digital gain in dB, in `0.0..=90.0`; replaces
    /// [`FixedDigital::gain_db`].
    CaptureFixedPostGain(f32),
}

impl RuntimeSetting {
    /// Writes the setting into `config`. Returns `false`, leaving `config`
    /// untouched, when the value is out of range or the stage is disabled.
    pub(crate) fn apply_to(self, config: &mut Config) -> bool {
        match self {
            Self::CapturePreGain(factor) if valid_gain_factor(factor) => {
                if let Some(pre) = &mut config.pre_amplifier {
                    pre.fixed_gain_factor = factor;
                    true
                } else if let Some(cla) = &mut config.capture_level_adjustment {
                    cla.pre_gain_factor = factor;
                    true
                } else {
                    false
                }
            }
            Self::CapturePostGain(factor) if valid_gain_factor(factor) => {
                match &mut config.capture_level_adjustment {
                    Some(cla) => {
                        cla.post_gain_factor = factor;
                        true
                    }
                    None => false,
                }
            }
            Self::CaptureFixedPostGain(gain_db) if valid_fixed_gain_db(gain_db) => {
                match &mut config.gain_controller2 {
                    Some(gc2) => {
                        gc2.fixed_digital.gain_db = gain_db;
                        true
                    }
                    None => false,
                }
            }
            _ => false,
        }
    }
}

fn valid_fixed_gain_db(gain_db: f32) -> bool {
    gain_db.is_finite() && (0.0..=MAX_FIXED_GAIN_DB).contains(&gain_db)
}

fn valid_gain_factor(factor: f32) -> bool {
    factor.is_finite() && (0.0..=MAX_CAPTURE_GAIN_FACTOR).contains(&factor)
}
