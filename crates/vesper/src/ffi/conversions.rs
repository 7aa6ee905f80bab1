//! Conversions between C API types and Rust types.

use crate::audio_processing::Error;
use crate::config::{
    CaptureLevelAdjustment, Config, DownmixMethod, EchoCanceller, FixedDigital, GainController2,
    HighPassFilter, MaxProcessingRate, NoiseSuppression, NoiseSuppressionLevel, Pipeline,
    PreAmplifier,
};
use crate::stats::AudioProcessingStats;
use crate::stream_config::StreamConfig;

use super::types::{
    VspConfig, VspDownmixMethod, VspError, VspNoiseSuppressionLevel, VspStats, VspStreamConfig,
};

impl VspConfig {
    /// Converts the flat C config into a nested [`Config`].
    pub(crate) fn to_rust(self) -> Config {
        Config {
            pipeline: Pipeline {
                maximum_internal_processing_rate: if self
                    .pipeline_maximum_internal_processing_rate
                    == 16000
                {
                    MaxProcessingRate::Rate16kHz
                } else {
                    MaxProcessingRate::Rate48kHz
                },
                capture_downmix_method: self.pipeline_capture_downmix_method.to_rust(),
            },
            pre_amplifier: self.pre_amplifier_enabled.then_some(PreAmplifier {
                fixed_gain_factor: self.pre_amplifier_fixed_gain_factor,
            }),
            capture_level_adjustment: self.capture_level_adjustment_enabled.then_some(
                CaptureLevelAdjustment {
                    pre_gain_factor: self.capture_level_adjustment_pre_gain_factor,
                    post_gain_factor: self.capture_level_adjustment_post_gain_factor,
                },
            ),
            high_pass_filter: self.high_pass_filter_enabled.then_some(HighPassFilter {
                apply_in_full_band: self.high_pass_filter_apply_in_full_band,
            }),
            echo_canceller: self.echo_canceller_enabled.then_some(EchoCanceller {
                enforce_high_pass_filtering: self.echo_canceller_enforce_high_pass_filtering,
            }),
            noise_suppression: self.noise_suppression_enabled.then_some(NoiseSuppression {
                level: self.noise_suppression_level.to_rust(),
            }),
            gain_controller2: self.agc2_enabled.then_some(GainController2 {
                fixed_digital: FixedDigital {
                    gain_db: self.agc2_fixed_digital_gain_db,
                },
            }),
        }
    }

    /// Converts a nested [`Config`] into the flat C config. Disabled stages
    /// carry their default settings.
    pub(crate) fn from_rust(config: &Config) -> Self {
        let pre = config.pre_amplifier.clone().unwrap_or_default();
        let cla = config.capture_level_adjustment.clone().unwrap_or_default();
        let hpf = config.high_pass_filter.clone().unwrap_or_default();
        let ec = config.echo_canceller.clone().unwrap_or_default();
        let ns = config.noise_suppression.clone().unwrap_or_default();
        let gc2 = config.gain_controller2.clone().unwrap_or_default();

        Self {
            pipeline_maximum_internal_processing_rate: config
                .pipeline
                .maximum_internal_processing_rate
                .as_hz() as i32,
            pipeline_capture_downmix_method: VspDownmixMethod::from_rust(
                config.pipeline.capture_downmix_method,
            ),

            pre_amplifier_enabled: config.pre_amplifier.is_some(),
            pre_amplifier_fixed_gain_factor: pre.fixed_gain_factor,

            capture_level_adjustment_enabled: config.capture_level_adjustment.is_some(),
            capture_level_adjustment_pre_gain_factor: cla.pre_gain_factor,
            capture_level_adjustment_post_gain_factor: cla.post_gain_factor,

            high_pass_filter_enabled: config.high_pass_filter.is_some(),
            high_pass_filter_apply_in_full_band: hpf.apply_in_full_band,

            echo_canceller_enabled: config.echo_canceller.is_some(),
            echo_canceller_enforce_high_pass_filtering: ec.enforce_high_pass_filtering,

            noise_suppression_enabled: config.noise_suppression.is_some(),
            noise_suppression_level: VspNoiseSuppressionLevel::from_rust(ns.level),

            agc2_enabled: config.gain_controller2.is_some(),
            agc2_fixed_digital_gain_db: gc2.fixed_digital.gain_db,
        }
    }
}

impl VspNoiseSuppressionLevel {
    pub(crate) fn to_rust(self) -> NoiseSuppressionLevel {
        match self {
            Self::Low => NoiseSuppressionLevel::Low,
            Self::Moderate => NoiseSuppressionLevel::Moderate,
            Self::High => NoiseSuppressionLevel::High,
            Self::VeryHigh => NoiseSuppressionLevel::VeryHigh,
        }
    }

    pub(crate) fn from_rust(level: NoiseSuppressionLevel) -> Self {
        match level {
            NoiseSuppressionLevel::Low => Self::Low,
            NoiseSuppressionLevel::Moderate => Self::Moderate,
            NoiseSuppressionLevel::High => Self::High,
            NoiseSuppressionLevel::VeryHigh => Self::VeryHigh,
        }
    }
}

impl VspDownmixMethod {
    pub(crate) fn to_rust(self) -> DownmixMethod {
        match self {
            Self::AverageChannels => DownmixMethod::AverageChannels,
            Self::UseFirstChannel => DownmixMethod::UseFirstChannel,
        }
    }

    pub(crate) fn from_rust(method: DownmixMethod) -> Self {
        match method {
            DownmixMethod::AverageChannels => Self::AverageChannels,
            DownmixMethod::UseFirstChannel => Self::UseFirstChannel,
        }
    }
}

impl VspStreamConfig {
    /// Converts and validates a C stream config.
    pub(crate) fn to_rust(self) -> Result<StreamConfig, Error> {
        let sample_rate_hz = u32::try_from(self.sample_rate_hz).map_err(|_| Error::BadSampleRate)?;
        let num_channels = u16::try_from(self.num_channels).map_err(|_| Error::BadNumberChannels)?;
        let config = StreamConfig::new(sample_rate_hz, num_channels);
        config.validate()?;
        Ok(config)
    }
}

impl VspStats {
    pub(crate) fn from_rust(stats: &AudioProcessingStats) -> Self {
        Self {
            has_output_rms_dbfs: stats.output_rms_dbfs.is_some(),
            output_rms_dbfs: stats.output_rms_dbfs.unwrap_or(0.0),

            has_speech_probability: stats.speech_probability.is_some(),
            speech_probability: stats.speech_probability.unwrap_or(0.0),

            has_echo_return_loss_enhancement: stats.echo_return_loss_enhancement.is_some(),
            echo_return_loss_enhancement: stats.echo_return_loss_enhancement.unwrap_or(0.0),
        }
    }
}

impl From<Error> for VspError {
    fn from(err: Error) -> Self {
        match err {
            Error::ConstructionFailure => Self::ConstructionFailure,
            Error::BadSampleRate => Self::BadSampleRate,
            Error::BadNumberChannels => Self::BadNumberChannels,
            Error::InvalidFrameSize { .. } => Self::InvalidFrameSize,
            Error::SequenceViolation => Self::SequenceViolation,
            Error::InternalStageFailure { .. } => Self::InternalStageFailure,
        }
    }
}

impl From<Result<(), Error>> for VspError {
    fn from(result: Result<(), Error>) -> Self {
        match result {
            Ok(()) => Self::None,
            Err(err) => err.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_roundtrip_default() {
        let rust_config = Config::default();
        let roundtrip = VspConfig::from_rust(&rust_config).to_rust();
        assert_eq!(rust_config, roundtrip);
    }

    #[test]
    fn config_roundtrip_all_enabled() {
        let rust_config = Config {
            pipeline: Pipeline {
                maximum_internal_processing_rate: MaxProcessingRate::Rate16kHz,
                capture_downmix_method: DownmixMethod::UseFirstChannel,
            },
            pre_amplifier: Some(PreAmplifier {
                fixed_gain_factor: 2.0,
            }),
            capture_level_adjustment: Some(CaptureLevelAdjustment {
                pre_gain_factor: 1.5,
                post_gain_factor: 0.8,
            }),
            high_pass_filter: Some(HighPassFilter {
                apply_in_full_band: false,
            }),
            echo_canceller: Some(EchoCanceller {
                enforce_high_pass_filtering: false,
            }),
            noise_suppression: Some(NoiseSuppression {
                level: NoiseSuppressionLevel::VeryHigh,
            }),
            gain_controller2: Some(GainController2 {
                fixed_digital: FixedDigital { gain_db: 6.0 },
            }),
        };
        let c_config = VspConfig::from_rust(&rust_config);
        assert_eq!(c_config.pipeline_maximum_internal_processing_rate, 16000);
        assert!(c_config.agc2_enabled);
        assert_eq!(c_config.capture_level_adjustment_post_gain_factor, 0.8);
        assert_eq!(c_config.to_rust(), rust_config);
    }

    #[test]
    fn unknown_rate_selects_48k() {
        let mut c_config = VspConfig::from_rust(&Config::default());
        c_config.pipeline_maximum_internal_processing_rate = 32000;
        assert_eq!(
            c_config.to_rust().pipeline.maximum_internal_processing_rate,
            MaxProcessingRate::Rate48kHz
        );
    }

    #[test]
    fn stream_config_rejects_negative_values() {
        let bad_rate = VspStreamConfig {
            sample_rate_hz: -16000,
            num_channels: 1,
        };
        assert_eq!(bad_rate.to_rust(), Err(Error::BadSampleRate));
        let bad_channels = VspStreamConfig {
            sample_rate_hz: 16000,
            num_channels: -1,
        };
        assert_eq!(bad_channels.to_rust(), Err(Error::BadNumberChannels));
        let zero = VspStreamConfig {
            sample_rate_hz: 16000,
            num_channels: 0,
        };
        assert_eq!(zero.to_rust(), Err(Error::BadNumberChannels));
    }

    #[test]
    fn error_codes() {
        assert_eq!(VspError::from(Ok(())) as i32, 0);
        assert_eq!(VspError::from(Error::ConstructionFailure) as i32, -2);
        assert_eq!(VspError::from(Error::BadSampleRate) as i32, -7);
        assert_eq!(
            VspError::from(Error::InvalidFrameSize {
                expected: 1,
                actual: 2
            }) as i32,
            -8
        );
        assert_eq!(VspError::from(Error::BadNumberChannels) as i32, -9);
        assert_eq!(VspError::from(Error::SequenceViolation) as i32, -14);
        assert_eq!(
            VspError::from(Error::InternalStageFailure { stage: "echo control" }) as i32,
            -15
        );
    }

    #[test]
    fn stats_flags() {
        let stats = AudioProcessingStats {
            output_rms_dbfs: Some(-20.0),
            ..Default::default()
        };
        let c_stats = VspStats::from_rust(&stats);
        assert!(c_stats.has_output_rms_dbfs);
        assert_eq!(c_stats.output_rms_dbfs, -20.0);
        assert!(!c_stats.has_speech_probability);
        assert!(!c_stats.has_echo_return_loss_enhancement);
    }
}
