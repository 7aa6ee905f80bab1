#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use vesper::config::{
    CaptureLevelAdjustment, DownmixMethod, EchoCanceller, FixedDigital, GainController2,
    HighPassFilter, MaxProcessingRate, NoiseSuppression, NoiseSuppressionLevel, Pipeline,
    PreAmplifier,
};
use vesper::{AudioProcessing, Config, StreamConfig};

#[derive(Debug, Arbitrary)]
struct FuzzInput {
    rate_48k: bool,
    stereo: bool,
    steps: Vec<FuzzStep>,
    samples: Vec<i16>,
}

#[derive(Debug, Arbitrary)]
struct FuzzStep {
    config: Option<FuzzConfig>,
    render: bool,
}

#[derive(Debug, Arbitrary)]
struct FuzzConfig {
    max_rate_16k: bool,
    first_channel: bool,
    hpf: Option<bool>,
    ec: Option<bool>,
    ns: Option<u8>,
    /// Out-of-range gains must be rejected without disturbing processing.
    gain_db: Option<f32>,
    pre_gain: Option<f32>,
    level_gains: Option<(f32, f32)>,
}

fn ns_level(idx: u8) -> NoiseSuppressionLevel {
    match idx % 4 {
        0 => NoiseSuppressionLevel::Low,
        1 => NoiseSuppressionLevel::Moderate,
        2 => NoiseSuppressionLevel::High,
        _ => NoiseSuppressionLevel::VeryHigh,
    }
}

impl FuzzConfig {
    fn to_config(&self) -> Config {
        Config {
            pipeline: Pipeline {
                maximum_internal_processing_rate: if self.max_rate_16k {
                    MaxProcessingRate::Rate16kHz
                } else {
                    MaxProcessingRate::Rate48kHz
                },
                capture_downmix_method: if self.first_channel {
                    DownmixMethod::UseFirstChannel
                } else {
                    DownmixMethod::AverageChannels
                },
            },
            pre_amplifier: self.pre_gain.map(|fixed_gain_factor| PreAmplifier {
                fixed_gain_factor,
            }),
            capture_level_adjustment: self.level_gains.map(
                |(pre_gain_factor, post_gain_factor)| CaptureLevelAdjustment {
                    pre_gain_factor,
                    post_gain_factor,
                },
            ),
            high_pass_filter: self.hpf.map(|apply_in_full_band| HighPassFilter {
                apply_in_full_band,
            }),
            echo_canceller: self.ec.map(|enforce_high_pass_filtering| EchoCanceller {
                enforce_high_pass_filtering,
            }),
            noise_suppression: self.ns.map(|level| NoiseSuppression {
                level: ns_level(level),
            }),
            gain_controller2: self.gain_db.map(|gain_db| GainController2 {
                fixed_digital: FixedDigital { gain_db },
            }),
        }
    }
}

fuzz_target!(|input: FuzzInput| {
    let rate = if input.rate_48k { 48000 } else { 16000 };
    let channels = if input.stereo { 2 } else { 1 };
    let stream = StreamConfig::new(rate, channels);
    let frame_len = stream.num_samples();
    if input.samples.len() < frame_len {
        return;
    }

    let mut apm = AudioProcessing::new();
    let src = &input.samples[..frame_len];
    let mut dest = vec![0i16; frame_len];

    for step in &input.steps {
        if let Some(config) = &step.config {
            let config = config.to_config();
            let valid = config.validate().is_ok();
            let before = apm.config().clone();
            apm.apply_config(config.clone());
            if valid {
                assert_eq!(apm.config(), &config);
            } else {
                assert_eq!(apm.config(), &before);
            }
        }
        let result = if step.render {
            apm.process_reverse_stream_i16(src, &stream, &stream, &mut dest)
        } else {
            apm.process_stream_i16(src, &stream, &stream, &mut dest)
        };
        assert_eq!(result, Ok(()));
    }
});
