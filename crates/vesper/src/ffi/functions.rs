//! Exported `extern "C"` functions for the C API.
//!
//! All public symbols use the `vsp_` prefix. Source and destination buffers
//! may alias: input is copied before processing and output is written only
//! after the frame succeeded.

use std::ffi::c_char;
use std::{ptr, slice};

use crate::AudioProcessing;
use crate::config::{Config, RuntimeSetting};
use crate::stream_config::StreamConfig;

use super::panic_guard::{ffi_guard, ffi_guard_ptr};
use super::types::{VspAudioProcessing, VspConfig, VspError, VspStats, VspStreamConfig};

/// Copies planar channels described by `config` out of caller memory.
///
/// Returns `None` when any channel pointer is null.
///
/// # Safety
///
/// `channels` must be non-null and point to `config.num_channels()`
/// pointers, each either null or valid for `config.num_frames()` reads.
unsafe fn read_planar(
    channels: *const *const f32,
    config: &StreamConfig,
) -> Option<Vec<Vec<f32>>> {
    // Safety: guaranteed by the caller.
    let pointers = unsafe { slice::from_raw_parts(channels, usize::from(config.num_channels())) };
    pointers
        .iter()
        .map(|&p| {
            (!p.is_null()).then(|| {
                // Safety: non-null and valid for `num_frames` reads per the caller.
                unsafe { slice::from_raw_parts(p, config.num_frames()) }.to_vec()
            })
        })
        .collect()
}

/// Collects the planar destination pointers described by `config`.
///
/// # Safety
///
/// `channels` must be non-null and point to `config.num_channels()`
/// pointers.
unsafe fn dest_pointers(
    channels: *const *mut f32,
    config: &StreamConfig,
) -> Option<Vec<*mut f32>> {
    // Safety: guaranteed by the caller.
    let pointers = unsafe { slice::from_raw_parts(channels, usize::from(config.num_channels())) };
    pointers
        .iter()
        .all(|p| !p.is_null())
        .then(|| pointers.to_vec())
}

type PlanarFn = fn(
    &mut AudioProcessing,
    &[&[f32]],
    &StreamConfig,
    &StreamConfig,
    &mut [&mut [f32]],
) -> Result<(), crate::Error>;

type InterleavedFn = fn(
    &mut AudioProcessing,
    &[i16],
    &StreamConfig,
    &StreamConfig,
    &mut [i16],
) -> Result<(), crate::Error>;

/// Shared body of the planar f32 entry points.
///
/// # Safety
///
/// Same contract as [`vsp_process_stream_f32`].
unsafe fn process_planar(
    apm: *mut VspAudioProcessing,
    src: *const *const f32,
    input_config: VspStreamConfig,
    output_config: VspStreamConfig,
    dest: *const *mut f32,
    process: PlanarFn,
) -> VspError {
    if apm.is_null() || src.is_null() || dest.is_null() {
        return VspError::NullPointer;
    }
    let (input, output) = match (input_config.to_rust(), output_config.to_rust()) {
        (Ok(input), Ok(output)) => (input, output),
        (Err(err), _) | (_, Err(err)) => return err.into(),
    };
    // Safety: the caller guarantees the pointer arrays match the configs.
    let Some(src_data) = (unsafe { read_planar(src, &input) }) else {
        return VspError::NullPointer;
    };
    // Safety: as above.
    let Some(dest_ptrs) = (unsafe { dest_pointers(dest, &output) }) else {
        return VspError::NullPointer;
    };

    // Safety: the caller guarantees the handle is valid and not aliased.
    let apm = unsafe { &mut *apm };
    let src_refs: Vec<&[f32]> = src_data.iter().map(Vec::as_slice).collect();
    let mut out = vec![vec![0.0f32; output.num_frames()]; dest_ptrs.len()];
    let mut out_refs: Vec<&mut [f32]> = out.iter_mut().map(Vec::as_mut_slice).collect();
    if let Err(err) = process(&mut apm.inner, &src_refs, &input, &output, &mut out_refs) {
        return err.into();
    }
    for (&p, channel) in dest_ptrs.iter().zip(&out) {
        // Safety: non-null and valid for `num_frames` writes per the caller.
        unsafe { ptr::copy_nonoverlapping(channel.as_ptr(), p, channel.len()) };
    }
    VspError::None
}

/// Shared body of the interleaved i16 entry points.
///
/// # Safety
///
/// Same contract as [`vsp_process_stream_i16`].
#[expect(clippy::too_many_arguments, reason = "mirrors the C signature")]
unsafe fn process_interleaved(
    apm: *mut VspAudioProcessing,
    src: *const i16,
    src_len: usize,
    input_config: VspStreamConfig,
    output_config: VspStreamConfig,
    dest: *mut i16,
    dest_len: usize,
    process: InterleavedFn,
) -> VspError {
    if apm.is_null() || src.is_null() || dest.is_null() {
        return VspError::NullPointer;
    }
    let (input, output) = match (input_config.to_rust(), output_config.to_rust()) {
        (Ok(input), Ok(output)) => (input, output),
        (Err(err), _) | (_, Err(err)) => return err.into(),
    };
    // Safety: the caller guarantees `src` is valid for `src_len` reads.
    let src_data = unsafe { slice::from_raw_parts(src, src_len) }.to_vec();
    let mut out = vec![0i16; dest_len];
    // Safety: the caller guarantees the handle is valid and not aliased.
    let apm = unsafe { &mut *apm };
    if let Err(err) = process(&mut apm.inner, &src_data, &input, &output, &mut out) {
        return err.into();
    }
    // Safety: the caller guarantees `dest` is valid for `dest_len` writes.
    unsafe { ptr::copy_nonoverlapping(out.as_ptr(), dest, dest_len) };
    VspError::None
}

/// Returns a pointer to a static NUL-terminated version string.
#[unsafe(no_mangle)]
pub extern "C" fn vsp_version() -> *const c_char {
    c"0.1.0".as_ptr()
}

/// Returns a configuration with every stage disabled.
#[unsafe(no_mangle)]
pub extern "C" fn vsp_config_default() -> VspConfig {
    VspConfig::from_rust(&Config::default())
}

/// Creates a pipeline with the default configuration.
///
/// The caller owns the returned pointer and must free it with
/// [`vsp_destroy()`]. Returns `NULL` on internal error.
#[unsafe(no_mangle)]
pub extern "C" fn vsp_create() -> *mut VspAudioProcessing {
    ffi_guard_ptr! {
        let boxed = Box::new(VspAudioProcessing {
            inner: AudioProcessing::new(),
        });
        Box::into_raw(boxed)
    }
}

/// Creates a pipeline with the given configuration.
///
/// Returns `NULL` when the configuration is invalid (for example a fixed
/// gain outside `0..=90` dB) or on internal error. The caller owns the
/// returned pointer and must free it with [`vsp_destroy()`].
#[unsafe(no_mangle)]
pub extern "C" fn vsp_create_with_config(config: VspConfig) -> *mut VspAudioProcessing {
    ffi_guard_ptr! {
        match AudioProcessing::builder().config(config.to_rust()).build() {
            Ok(inner) => Box::into_raw(Box::new(VspAudioProcessing { inner })),
            Err(_) => ptr::null_mut(),
        }
    }
}

/// Destroys a pipeline. Passing `NULL` is a no-op.
///
/// # Safety
///
/// `apm` must be `NULL` or a pointer returned by `vsp_create*` that was not
/// destroyed yet. It is invalid after this call.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn vsp_destroy(apm: *mut VspAudioProcessing) {
    if !apm.is_null() {
        // Safety: created by Box::into_raw in vsp_create*, owned by the caller.
        drop(unsafe { Box::from_raw(apm) });
    }
}

/// Applies a configuration starting with the next frame.
///
/// An invalid configuration is ignored and the previous one stays active.
///
/// # Safety
///
/// `apm` must be `NULL` or a valid handle not used concurrently.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn vsp_apply_config(
    apm: *mut VspAudioProcessing,
    config: VspConfig,
) -> VspError {
    ffi_guard! {
        if apm.is_null() {
            return VspError::NullPointer;
        }
        // Safety: the caller guarantees the pointer is valid and not aliased.
        let apm = unsafe { &mut *apm };
        apm.inner.apply_config(config.to_rust());
        VspError::None
    }
}

/// Queues a linear capture pre-gain for the next capture frame.
///
/// Takes effect only when the pre-amplifier or capture level adjustment is
/// enabled; otherwise, or when `gain` is outside `0..=1000`, the setting is
/// logged and dropped at the next capture frame.
///
/// # Safety
///
/// `apm` must be `NULL` or a valid handle not used concurrently.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn vsp_set_capture_pre_gain(
    apm: *mut VspAudioProcessing,
    gain: f32,
) -> VspError {
    ffi_guard! {
        if apm.is_null() {
            return VspError::NullPointer;
        }
        // Safety: the caller guarantees the pointer is valid and not aliased.
        let apm = unsafe { &mut *apm };
        apm.inner.set_runtime_setting(RuntimeSetting::CapturePreGain(gain));
        VspError::None
    }
}

/// Queues a linear capture post-gain for the next capture frame.
///
/// Takes effect only when capture level adjustment is enabled.
///
/// # Safety
///
/// `apm` must be `NULL` or a valid handle not used concurrently.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn vsp_set_capture_post_gain(
    apm: *mut VspAudioProcessing,
    gain: f32,
) -> VspError {
    ffi_guard! {
        if apm.is_null() {
            return VspError::NullPointer;
        }
        // Safety: the caller guarantees the pointer is valid and not aliased.
        let apm = unsafe { &mut *apm };
        apm.inner.set_runtime_setting(RuntimeSetting::CapturePostGain(gain));
        VspError::None
    }
}

/// Sets the render-to-capture delay hint in milliseconds.
///
/// Values outside `0..=500` are clamped and reported with
/// `VSP_ERROR_BAD_STREAM_PARAMETER_WARNING`; the clamped value is still
/// used.
///
/// # Safety
///
/// `apm` must be `NULL` or a valid handle not used concurrently.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn vsp_set_stream_delay_ms(
    apm: *mut VspAudioProcessing,
    delay_ms: i32,
) -> VspError {
    ffi_guard! {
        if apm.is_null() {
            return VspError::NullPointer;
        }
        // Safety: the caller guarantees the pointer is valid and not aliased.
        let apm = unsafe { &mut *apm };
        apm.inner.set_stream_delay_ms(delay_ms);
        if apm.inner.stream_delay_ms() != delay_ms {
            return VspError::BadStreamParameterWarning;
        }
        VspError::None
    }
}

/// Writes the most recently applied configuration to `config_out`.
///
/// # Safety
///
/// `apm` must be `NULL` or a valid handle; `config_out` must be `NULL` or
/// valid for one write.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn vsp_get_config(
    apm: *const VspAudioProcessing,
    config_out: *mut VspConfig,
) -> VspError {
    ffi_guard! {
        if apm.is_null() || config_out.is_null() {
            return VspError::NullPointer;
        }
        // Safety: the caller guarantees the pointers are valid.
        let apm = unsafe { &*apm };
        let c_config = VspConfig::from_rust(apm.inner.config());
        unsafe { ptr::write(config_out, c_config) };
        VspError::None
    }
}

/// Writes statistics of the last capture frame to `stats_out`.
///
/// # Safety
///
/// `apm` must be `NULL` or a valid handle; `stats_out` must be `NULL` or
/// valid for one write.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn vsp_get_statistics(
    apm: *const VspAudioProcessing,
    stats_out: *mut VspStats,
) -> VspError {
    ffi_guard! {
        if apm.is_null() || stats_out.is_null() {
            return VspError::NullPointer;
        }
        // Safety: the caller guarantees the pointers are valid.
        let apm = unsafe { &*apm };
        let stats = VspStats::from_rust(&apm.inner.statistics());
        unsafe { ptr::write(stats_out, stats) };
        VspError::None
    }
}

/// Processes one interleaved i16 capture frame.
///
/// `src_len` must equal `input_config.sample_rate_hz / 100 *
/// input_config.num_channels`, and `dest_len` likewise for `output_config`;
/// otherwise `VSP_ERROR_INVALID_FRAME_SIZE` is returned and `dest` is left
/// untouched.
///
/// # Safety
///
/// `apm` must be `NULL` or a valid handle. `src` must be `NULL` or valid
/// for `src_len` reads, `dest` `NULL` or valid for `dest_len` writes.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn vsp_process_stream_i16(
    apm: *mut VspAudioProcessing,
    src: *const i16,
    src_len: usize,
    input_config: VspStreamConfig,
    output_config: VspStreamConfig,
    dest: *mut i16,
    dest_len: usize,
) -> VspError {
    ffi_guard! {
        // Safety: forwarded caller contract.
        unsafe {
            process_interleaved(
                apm,
                src,
                src_len,
                input_config,
                output_config,
                dest,
                dest_len,
                AudioProcessing::process_stream_i16,
            )
        }
    }
}

/// Processes one interleaved i16 render (far-end) frame.
///
/// # Safety
///
/// Same contract as [`vsp_process_stream_i16`].
#[unsafe(no_mangle)]
pub unsafe extern "C" fn vsp_process_reverse_stream_i16(
    apm: *mut VspAudioProcessing,
    src: *const i16,
    src_len: usize,
    input_config: VspStreamConfig,
    output_config: VspStreamConfig,
    dest: *mut i16,
    dest_len: usize,
) -> VspError {
    ffi_guard! {
        // Safety: forwarded caller contract.
        unsafe {
            process_interleaved(
                apm,
                src,
                src_len,
                input_config,
                output_config,
                dest,
                dest_len,
                AudioProcessing::process_reverse_stream_i16,
            )
        }
    }
}

/// Processes one planar f32 capture frame with samples in `[-1.0, 1.0]`.
///
/// # Safety
///
/// `apm` must be `NULL` or a valid handle. `src` must be `NULL` or point to
/// `input_config.num_channels` channel pointers, each valid for
/// `input_config.sample_rate_hz / 100` reads; `dest` likewise for
/// `output_config` and writes.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn vsp_process_stream_f32(
    apm: *mut VspAudioProcessing,
    src: *const *const f32,
    input_config: VspStreamConfig,
    output_config: VspStreamConfig,
    dest: *const *mut f32,
) -> VspError {
    ffi_guard! {
        // Safety: forwarded caller contract.
        unsafe {
            process_planar(
                apm,
                src,
                input_config,
                output_config,
                dest,
                AudioProcessing::process_stream_f32,
            )
        }
    }
}

/// Processes one planar f32 render (far-end) frame.
///
/// # Safety
///
/// Same contract as [`vsp_process_stream_f32`].
#[unsafe(no_mangle)]
pub unsafe extern "C" fn vsp_process_reverse_stream_f32(
    apm: *mut VspAudioProcessing,
    src: *const *const f32,
    input_config: VspStreamConfig,
    output_config: VspStreamConfig,
    dest: *const *mut f32,
) -> VspError {
    ffi_guard! {
        // Safety: forwarded caller contract.
        unsafe {
            process_planar(
                apm,
                src,
                input_config,
                output_config,
                dest,
                AudioProcessing::process_reverse_stream_f32,
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use std::ffi::CStr;

    use super::*;
    use crate::ffi::types::VspNoiseSuppressionLevel;

    const MONO_16K: VspStreamConfig = VspStreamConfig {
        sample_rate_hz: 16000,
        num_channels: 1,
    };

    #[test]
    fn version_is_nul_terminated() {
        // Safety: vsp_version returns a static NUL-terminated string.
        let version = unsafe { CStr::from_ptr(vsp_version()) };
        assert_eq!(version.to_str().unwrap(), "0.1.0");
    }

    #[test]
    fn create_and_destroy() {
        let apm = vsp_create();
        assert!(!apm.is_null());
        unsafe { vsp_destroy(apm) };
        unsafe { vsp_destroy(ptr::null_mut()) };
    }

    #[test]
    fn create_with_config_roundtrips() {
        let mut config = vsp_config_default();
        config.echo_canceller_enabled = true;
        config.noise_suppression_enabled = true;
        config.noise_suppression_level = VspNoiseSuppressionLevel::VeryHigh;

        let apm = vsp_create_with_config(config);
        assert!(!apm.is_null());
        let mut config_out = vsp_config_default();
        assert_eq!(unsafe { vsp_get_config(apm, &mut config_out) }, VspError::None);
        assert!(config_out.echo_canceller_enabled);
        assert_eq!(
            config_out.noise_suppression_level,
            VspNoiseSuppressionLevel::VeryHigh
        );
        unsafe { vsp_destroy(apm) };
    }

    #[test]
    fn create_with_invalid_config_returns_null() {
        let mut config = vsp_config_default();
        config.agc2_enabled = true;
        config.agc2_fixed_digital_gain_db = 200.0;
        assert!(vsp_create_with_config(config).is_null());
    }

    #[test]
    fn null_handles_are_rejected() {
        let config = vsp_config_default();
        assert_eq!(
            unsafe { vsp_apply_config(ptr::null_mut(), config) },
            VspError::NullPointer
        );
        assert_eq!(
            unsafe { vsp_get_config(ptr::null(), ptr::null_mut()) },
            VspError::NullPointer
        );
        assert_eq!(
            unsafe { vsp_get_statistics(ptr::null(), ptr::null_mut()) },
            VspError::NullPointer
        );
        let mut dest = [0i16; 160];
        assert_eq!(
            unsafe {
                vsp_process_stream_i16(
                    ptr::null_mut(),
                    dest.as_ptr(),
                    160,
                    MONO_16K,
                    MONO_16K,
                    dest.as_mut_ptr(),
                    160,
                )
            },
            VspError::NullPointer
        );
    }

    #[test]
    fn process_i16_in_place() {
        let apm = vsp_create();
        let mut frame = [1000i16; 160];
        let err = unsafe {
            vsp_process_stream_i16(
                apm,
                frame.as_ptr(),
                frame.len(),
                MONO_16K,
                MONO_16K,
                frame.as_mut_ptr(),
                frame.len(),
            )
        };
        assert_eq!(err, VspError::None);
        assert!(frame.iter().all(|&v| v == 1000));

        let mut stats = VspStats::from_rust(&Default::default());
        assert_eq!(unsafe { vsp_get_statistics(apm, &mut stats) }, VspError::None);
        assert!(stats.has_output_rms_dbfs);
        unsafe { vsp_destroy(apm) };
    }

    #[test]
    fn process_i16_wrong_length_leaves_dest_untouched() {
        let apm = vsp_create();
        let src = [0i16; 160];
        let mut dest = [7i16; 159];
        let err = unsafe {
            vsp_process_stream_i16(
                apm,
                src.as_ptr(),
                src.len(),
                MONO_16K,
                MONO_16K,
                dest.as_mut_ptr(),
                dest.len(),
            )
        };
        assert_eq!(err, VspError::InvalidFrameSize);
        assert!(dest.iter().all(|&v| v == 7));
        unsafe { vsp_destroy(apm) };
    }

    #[test]
    fn process_f32_stereo() {
        let apm = vsp_create();
        let stereo = VspStreamConfig {
            sample_rate_hz: 48000,
            num_channels: 2,
        };
        let left = [0.25f32; 480];
        let right = [-0.25f32; 480];
        let src = [left.as_ptr(), right.as_ptr()];
        let mut out_left = [0.0f32; 480];
        let mut out_right = [0.0f32; 480];
        let dest = [out_left.as_mut_ptr(), out_right.as_mut_ptr()];
        let err = unsafe { vsp_process_stream_f32(apm, src.as_ptr(), stereo, stereo, dest.as_ptr()) };
        assert_eq!(err, VspError::None);
        assert!((out_left[100] - 0.25).abs() < 1e-6);
        assert!((out_right[100] + 0.25).abs() < 1e-6);

        let err = unsafe {
            vsp_process_reverse_stream_f32(apm, src.as_ptr(), stereo, stereo, dest.as_ptr())
        };
        assert_eq!(err, VspError::None);
        unsafe { vsp_destroy(apm) };
    }

    #[test]
    fn capture_gains_apply_from_the_next_frame() {
        let mut config = vsp_config_default();
        config.capture_level_adjustment_enabled = true;
        let apm = vsp_create_with_config(config);
        assert!(!apm.is_null());

        assert_eq!(unsafe { vsp_set_capture_pre_gain(apm, 2.0) }, VspError::None);
        assert_eq!(unsafe { vsp_set_capture_post_gain(apm, 0.25) }, VspError::None);
        for _ in 0..2 {
            let mut frame = [1000i16; 160];
            let err = unsafe {
                vsp_process_stream_i16(
                    apm,
                    frame.as_ptr(),
                    frame.len(),
                    MONO_16K,
                    MONO_16K,
                    frame.as_mut_ptr(),
                    frame.len(),
                )
            };
            assert_eq!(err, VspError::None);
            assert_eq!(frame[159], 500);
        }

        let mut config_out = vsp_config_default();
        assert_eq!(unsafe { vsp_get_config(apm, &mut config_out) }, VspError::None);
        assert_eq!(config_out.capture_level_adjustment_pre_gain_factor, 2.0);
        assert_eq!(config_out.capture_level_adjustment_post_gain_factor, 0.25);
        unsafe { vsp_destroy(apm) };
    }

    #[test]
    fn stream_delay_is_clamped_with_a_warning() {
        let apm = vsp_create();
        assert_eq!(unsafe { vsp_set_stream_delay_ms(apm, 60) }, VspError::None);
        assert_eq!(
            unsafe { vsp_set_stream_delay_ms(apm, -1) },
            VspError::BadStreamParameterWarning
        );
        assert_eq!(
            unsafe { vsp_set_stream_delay_ms(ptr::null_mut(), 0) },
            VspError::NullPointer
        );
        assert_eq!(
            unsafe { vsp_set_capture_pre_gain(ptr::null_mut(), 1.0) },
            VspError::NullPointer
        );
        unsafe { vsp_destroy(apm) };
    }

    #[test]
    fn process_f32_bad_rate() {
        let apm = vsp_create();
        let bad = VspStreamConfig {
            sample_rate_hz: 12345,
            num_channels: 1,
        };
        let channel = [0.0f32; 160];
        let src = [channel.as_ptr()];
        let mut out = [0.0f32; 160];
        let dest = [out.as_mut_ptr()];
        let err = unsafe { vsp_process_stream_f32(apm, src.as_ptr(), bad, MONO_16K, dest.as_ptr()) };
        assert_eq!(err, VspError::BadSampleRate);
        unsafe { vsp_destroy(apm) };
    }
}
