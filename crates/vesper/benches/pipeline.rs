//! Benchmarks for the capture pipeline and its building blocks.

use core::array;

use criterion::{Criterion, black_box, criterion_group, criterion_main};
use vesper::components::{
    FULL_BAND_SIZE, NUM_BANDS, NoiseSuppressor, NsConfig, SPLIT_BAND_SIZE, SuppressionLevel,
    ThreeBandFilterBank,
};
use vesper::config::{EchoCanceller, GainController2, HighPassFilter, NoiseSuppression};
use vesper::{AudioProcessing, Config, StreamConfig};
use vesper_common_audio::push_resampler::PushResampler;

fn tone(num_frames: usize) -> Vec<f32> {
    (0..num_frames)
        .map(|i| (i as f32 * 0.01).sin() * 0.1)
        .collect()
}

fn make_apm(sample_rate: u32, channels: u16) -> (AudioProcessing, StreamConfig) {
    let config = Config {
        high_pass_filter: Some(HighPassFilter::default()),
        echo_canceller: Some(EchoCanceller::default()),
        noise_suppression: Some(NoiseSuppression::default()),
        gain_controller2: Some(GainController2::default()),
        ..Default::default()
    };
    let mut apm = AudioProcessing::builder()
        .config(config)
        .build()
        .expect("valid config");
    let stream = StreamConfig::new(sample_rate, channels);

    // Warm up so the benchmark measures steady state.
    let src_channel = tone(stream.num_frames());
    let src: Vec<&[f32]> = (0..channels).map(|_| src_channel.as_slice()).collect();
    let mut dst_data = vec![vec![0.0f32; stream.num_frames()]; usize::from(channels)];
    for _ in 0..20 {
        let mut dst: Vec<&mut [f32]> = dst_data.iter_mut().map(Vec::as_mut_slice).collect();
        apm.process_reverse_stream_f32(&src, &stream, &stream, &mut dst)
            .expect("render frame");
        let mut dst: Vec<&mut [f32]> = dst_data.iter_mut().map(Vec::as_mut_slice).collect();
        apm.process_stream_f32(&src, &stream, &stream, &mut dst)
            .expect("capture frame");
    }
    (apm, stream)
}

fn bench_process_stream(c: &mut Criterion) {
    let mut group = c.benchmark_group("process_stream");

    for (name, rate, channels) in [
        ("16k_mono", 16000, 1),
        ("44k1_mono", 44100, 1),
        ("48k_mono", 48000, 1),
        ("48k_stereo", 48000, 2),
    ] {
        let (mut apm, stream) = make_apm(rate, channels);
        let src_channel = tone(stream.num_frames());
        let src: Vec<&[f32]> = (0..channels).map(|_| src_channel.as_slice()).collect();
        let mut dst_data = vec![vec![0.0f32; stream.num_frames()]; usize::from(channels)];

        group.bench_function(name, |b| {
            b.iter(|| {
                let mut dst: Vec<&mut [f32]> =
                    dst_data.iter_mut().map(Vec::as_mut_slice).collect();
                apm.process_stream_f32(black_box(&src), &stream, &stream, &mut dst)
                    .unwrap();
            });
        });
    }

    group.finish();
}

fn bench_process_stream_i16(c: &mut Criterion) {
    let (mut apm, stream) = make_apm(48000, 1);
    let src: Vec<i16> = (0..stream.num_samples())
        .map(|i| ((i as f32 * 0.01).sin() * 3000.0) as i16)
        .collect();
    let mut dst = vec![0i16; stream.num_samples()];

    c.bench_function("process_stream_i16/48k_mono", |b| {
        b.iter(|| {
            apm.process_stream_i16(black_box(&src), &stream, &stream, &mut dst)
                .unwrap();
        });
    });
}

fn bench_noise_suppressor(c: &mut Criterion) {
    let mut group = c.benchmark_group("noise_suppressor");
    let mut ns = NoiseSuppressor::new(
        NsConfig {
            target_level: SuppressionLevel::K12dB,
        },
        1,
    );
    let mut frame: [f32; SPLIT_BAND_SIZE] = array::from_fn(|i| (i as f32 * 0.05).sin() * 3000.0);

    for _ in 0..50 {
        ns.analyze(&[&frame]).unwrap();
        ns.process(&mut [&mut frame]).unwrap();
    }

    group.bench_function("analyze_and_process", |b| {
        b.iter(|| {
            ns.analyze(black_box(&[&frame])).unwrap();
            ns.process(black_box(&mut [&mut frame])).unwrap();
        });
    });

    group.finish();
}

fn bench_three_band_filter_bank(c: &mut Criterion) {
    let mut bank = ThreeBandFilterBank::new();
    let input: [f32; FULL_BAND_SIZE] = array::from_fn(|i| (i as f32 * 0.02).sin() * 1000.0);
    let mut bands = [[0.0f32; SPLIT_BAND_SIZE]; NUM_BANDS];
    let mut output = [0.0f32; FULL_BAND_SIZE];

    c.bench_function("three_band_filter_bank/round_trip", |b| {
        b.iter(|| {
            bank.analysis(black_box(&input), &mut bands);
            bank.synthesis(&bands, &mut output);
        });
    });
}

fn bench_push_resampler(c: &mut Criterion) {
    let mut group = c.benchmark_group("push_resampler");

    for (name, src_frames, dst_frames) in [("44k1_to_48k", 441, 480), ("48k_to_16k", 480, 160)] {
        let mut resampler = PushResampler::new(src_frames, dst_frames);
        let src = tone(src_frames);
        let mut dst = vec![0.0f32; dst_frames];

        group.bench_function(name, |b| {
            b.iter(|| {
                resampler.resample(black_box(&src), &mut dst);
            });
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_process_stream,
    bench_process_stream_i16,
    bench_noise_suppressor,
    bench_three_band_filter_bank,
    bench_push_resampler,
);
criterion_main!(benches);
