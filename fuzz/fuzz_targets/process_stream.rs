#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use vesper::config::{
    EchoCanceller, FixedDigital, GainController2, HighPassFilter, NoiseSuppression,
    NoiseSuppressionLevel,
};
use vesper::{AudioProcessing, Config, StreamConfig};

const RATES: [u32; 6] = [8000, 16000, 32000, 44100, 48000, 96000];

#[derive(Debug, Arbitrary)]
struct FuzzInput {
    input_rate_idx: u8,
    output_rate_idx: u8,
    /// Input channels, clamped to 1-2.
    channels: u8,
    /// Downmix the output to mono.
    mono_output: bool,
    ns_level: u8,
    gain_db: u8,
    /// Interleaved render and capture samples, consumed frame by frame.
    samples: Vec<f32>,
}

fn sanitize_sample(s: f32) -> f32 {
    if s.is_finite() { s.clamp(-1.0, 1.0) } else { 0.0 }
}

fn ns_level(idx: u8) -> NoiseSuppressionLevel {
    match idx % 4 {
        0 => NoiseSuppressionLevel::Low,
        1 => NoiseSuppressionLevel::Moderate,
        2 => NoiseSuppressionLevel::High,
        _ => NoiseSuppressionLevel::VeryHigh,
    }
}

fuzz_target!(|input: FuzzInput| {
    let in_channels = u16::from(input.channels % 2) + 1;
    let out_channels = if input.mono_output { 1 } else { in_channels };
    let input_config = StreamConfig::new(
        RATES[usize::from(input.input_rate_idx) % RATES.len()],
        in_channels,
    );
    let output_config = StreamConfig::new(
        RATES[usize::from(input.output_rate_idx) % RATES.len()],
        out_channels,
    );

    let config = Config {
        high_pass_filter: Some(HighPassFilter::default()),
        echo_canceller: Some(EchoCanceller::default()),
        noise_suppression: Some(NoiseSuppression {
            level: ns_level(input.ns_level),
        }),
        gain_controller2: Some(GainController2 {
            fixed_digital: FixedDigital {
                gain_db: f32::from(input.gain_db % 50),
            },
        }),
        ..Default::default()
    };
    let mut apm = AudioProcessing::builder()
        .config(config)
        .build()
        .expect("valid config");

    let frames = input_config.num_frames();
    let sanitized: Vec<f32> = input.samples.iter().copied().map(sanitize_sample).collect();
    let frame_len = frames * usize::from(in_channels);
    let mut dest_data = vec![vec![0.0f32; output_config.num_frames()]; usize::from(out_channels)];

    for (i, chunk) in sanitized.chunks_exact(frame_len).enumerate() {
        let src: Vec<&[f32]> = chunk.chunks_exact(frames).collect();
        let mut dest: Vec<&mut [f32]> = dest_data.iter_mut().map(Vec::as_mut_slice).collect();
        let result = if i % 2 == 0 {
            apm.process_reverse_stream_f32(&src, &input_config, &output_config, &mut dest)
        } else {
            apm.process_stream_f32(&src, &input_config, &output_config, &mut dest)
        };
        assert_eq!(result, Ok(()));
        assert!(dest_data.iter().flatten().all(|v| v.is_finite()));
    }
});
