//! Buffers whose length disagrees with the stream configuration are rejected
//! before any processing happens.

use proptest::prelude::*;
use proptest::sample::select;
use test_strategy::proptest;
use vesper::config::NoiseSuppression;
use vesper::{AudioProcessing, Config, Error, StreamConfig};

const RATES: [u32; 6] = [8000, 16000, 32000, 44100, 48000, 96000];

fn stream() -> impl Strategy<Value = StreamConfig> {
    (select(RATES.to_vec()), 1u16..=2)
        .prop_map(|(rate, channels)| StreamConfig::new(rate, channels))
}

fn nonzero_delta() -> impl Strategy<Value = isize> {
    prop_oneof![-40isize..=-1, 1isize..=40]
}

fn resize(len: usize, delta: isize) -> usize {
    len.saturating_add_signed(delta)
}

fn pipeline() -> AudioProcessing {
    AudioProcessing::builder()
        .config(Config {
            noise_suppression: Some(NoiseSuppression::default()),
            ..Default::default()
        })
        .build()
        .unwrap()
}

#[proptest]
fn wrong_planar_length_leaves_dest_untouched(
    #[strategy(stream())] config: StreamConfig,
    #[strategy(nonzero_delta())] delta: isize,
    wrong_input: bool,
    reverse: bool,
) {
    let mut apm = pipeline();
    let frames = config.num_frames();
    let channels = usize::from(config.num_channels());
    let (src_len, dest_len) = if wrong_input {
        (resize(frames, delta), frames)
    } else {
        (frames, resize(frames, delta))
    };

    let src = vec![vec![0.25f32; src_len]; channels];
    let src_refs: Vec<&[f32]> = src.iter().map(Vec::as_slice).collect();
    let mut dest = vec![vec![-7.0f32; dest_len]; channels];
    let mut dest_refs: Vec<&mut [f32]> = dest.iter_mut().map(Vec::as_mut_slice).collect();

    let result = if reverse {
        apm.process_reverse_stream_f32(&src_refs, &config, &config, &mut dest_refs)
    } else {
        apm.process_stream_f32(&src_refs, &config, &config, &mut dest_refs)
    };

    let actual = if wrong_input { src_len } else { dest_len };
    prop_assert_eq!(
        result,
        Err(Error::InvalidFrameSize {
            expected: frames,
            actual
        })
    );
    prop_assert!(dest.iter().flatten().all(|&v| v == -7.0));
}

#[proptest]
fn wrong_interleaved_length_leaves_dest_untouched(
    #[strategy(stream())] config: StreamConfig,
    #[strategy(nonzero_delta())] delta: isize,
    wrong_input: bool,
    reverse: bool,
) {
    let mut apm = pipeline();
    let samples = config.num_samples();
    let (src_len, dest_len) = if wrong_input {
        (resize(samples, delta), samples)
    } else {
        (samples, resize(samples, delta))
    };

    let src = vec![1000i16; src_len];
    let mut dest = vec![-7i16; dest_len];
    let result = if reverse {
        apm.process_reverse_stream_i16(&src, &config, &config, &mut dest)
    } else {
        apm.process_stream_i16(&src, &config, &config, &mut dest)
    };

    let actual = if wrong_input { src_len } else { dest_len };
    prop_assert_eq!(
        result,
        Err(Error::InvalidFrameSize {
            expected: samples,
            actual
        })
    );
    prop_assert!(dest.iter().all(|&v| v == -7));
}

#[proptest]
fn matching_lengths_are_accepted(#[strategy(stream())] config: StreamConfig) {
    let mut apm = pipeline();
    let src = vec![500i16; config.num_samples()];
    let mut dest = vec![0i16; config.num_samples()];
    prop_assert_eq!(
        apm.process_stream_i16(&src, &config, &config, &mut dest),
        Ok(())
    );
}
