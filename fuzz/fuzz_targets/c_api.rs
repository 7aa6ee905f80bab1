#![no_main]

use std::mem::MaybeUninit;

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use vesper::ffi::functions::*;
use vesper::ffi::types::*;

#[derive(Debug, Arbitrary)]
struct FuzzInput {
    sample_rate: i32,
    channels: i32,
    operations: Vec<FuzzOp>,
    samples: Vec<i16>,
}

#[derive(Debug, Arbitrary)]
enum FuzzOp {
    ProcessI16 { src_delta: i8, dest_delta: i8 },
    ProcessReverseI16,
    ProcessF32,
    ApplyConfig {
        max_rate: i32,
        ec: bool,
        ns: bool,
        ns_level: u8,
        agc2: bool,
        gain_db: f32,
    },
    SetPreGain(f32),
    SetPostGain(f32),
    SetStreamDelay(i32),
    GetConfig,
    GetStatistics,
}

fn resize(len: usize, delta: i8) -> usize {
    len.saturating_add_signed(isize::from(delta))
}

fuzz_target!(|input: FuzzInput| {
    // Arbitrary rates and channel counts exercise the error paths; keep the
    // valid ones small enough to allocate.
    let stream = VspStreamConfig {
        sample_rate_hz: input.sample_rate.clamp(-1, 96_000),
        num_channels: input.channels.clamp(-1, 4),
    };
    let frames = usize::try_from(stream.sample_rate_hz / 100).unwrap_or(0);
    let channels = usize::try_from(stream.num_channels).unwrap_or(0);
    let total = frames * channels;

    let apm = vsp_create();
    if apm.is_null() {
        return;
    }

    let mut src_i16 = input.samples.clone();
    src_i16.resize(total, 0);
    let src_f32: Vec<Vec<f32>> = (0..channels)
        .map(|ch| {
            (0..frames)
                .map(|i| f32::from(src_i16[i * channels + ch]) / 32768.0)
                .collect()
        })
        .collect();
    let mut dest_f32 = vec![vec![0.0f32; frames]; channels];

    for op in &input.operations {
        match op {
            FuzzOp::ProcessI16 {
                src_delta,
                dest_delta,
            } => {
                let src_len = resize(total, *src_delta).min(src_i16.len());
                let mut dest = vec![0i16; resize(total, *dest_delta)];
                let _ = unsafe {
                    vsp_process_stream_i16(
                        apm,
                        src_i16.as_ptr(),
                        src_len,
                        stream,
                        stream,
                        dest.as_mut_ptr(),
                        dest.len(),
                    )
                };
            }
            FuzzOp::ProcessReverseI16 => {
                let mut dest = vec![0i16; total];
                let _ = unsafe {
                    vsp_process_reverse_stream_i16(
                        apm,
                        src_i16.as_ptr(),
                        src_i16.len(),
                        stream,
                        stream,
                        dest.as_mut_ptr(),
                        dest.len(),
                    )
                };
            }
            FuzzOp::ProcessF32 => {
                let src_ptrs: Vec<*const f32> = src_f32.iter().map(|c| c.as_ptr()).collect();
                let dest_ptrs: Vec<*mut f32> =
                    dest_f32.iter_mut().map(|c| c.as_mut_ptr()).collect();
                if src_ptrs.is_empty() {
                    continue;
                }
                let _ = unsafe {
                    vsp_process_stream_f32(
                        apm,
                        src_ptrs.as_ptr(),
                        stream,
                        stream,
                        dest_ptrs.as_ptr(),
                    )
                };
            }
            FuzzOp::ApplyConfig {
                max_rate,
                ec,
                ns,
                ns_level,
                agc2,
                gain_db,
            } => {
                let mut config = vsp_config_default();
                config.pipeline_maximum_internal_processing_rate = *max_rate;
                config.echo_canceller_enabled = *ec;
                config.noise_suppression_enabled = *ns;
                config.noise_suppression_level = match ns_level % 4 {
                    0 => VspNoiseSuppressionLevel::Low,
                    1 => VspNoiseSuppressionLevel::Moderate,
                    2 => VspNoiseSuppressionLevel::High,
                    _ => VspNoiseSuppressionLevel::VeryHigh,
                };
                config.agc2_enabled = *agc2;
                config.agc2_fixed_digital_gain_db = *gain_db;
                config.capture_level_adjustment_enabled = *agc2;
                let _ = unsafe { vsp_apply_config(apm, config) };
            }
            FuzzOp::SetPreGain(gain) => {
                let status = unsafe { vsp_set_capture_pre_gain(apm, *gain) };
                assert_eq!(status, VspError::None);
            }
            FuzzOp::SetPostGain(gain) => {
                let status = unsafe { vsp_set_capture_post_gain(apm, *gain) };
                assert_eq!(status, VspError::None);
            }
            FuzzOp::SetStreamDelay(delay_ms) => {
                let status = unsafe { vsp_set_stream_delay_ms(apm, *delay_ms) };
                assert!(matches!(
                    status,
                    VspError::None | VspError::BadStreamParameterWarning
                ));
            }
            FuzzOp::GetConfig => {
                let mut config = MaybeUninit::<VspConfig>::uninit();
                let status = unsafe { vsp_get_config(apm, config.as_mut_ptr()) };
                assert_eq!(status, VspError::None);
            }
            FuzzOp::GetStatistics => {
                let mut stats = MaybeUninit::<VspStats>::uninit();
                let status = unsafe { vsp_get_statistics(apm, stats.as_mut_ptr()) };
                assert_eq!(status, VspError::None);
            }
        }
    }

    unsafe { vsp_destroy(apm) };
});
