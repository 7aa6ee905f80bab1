//! Sample format conversions and channel layout helpers.
//!
//! # Format conventions
//!
//! | Name      | Type    | Range                          |
//! |-----------|---------|--------------------------------|
//! | S16       | `i16`   | \[-32768, 32767\]              |
//! | Float     | `f32`   | \[-1.0, 1.0\]                  |
//! | FloatS16  | `f32`   | \[-32768.0, 32767.0\]          |
//! | Dbfs      | `f32`   | \[-90.31, 0\] (approx)         |

const S16_TO_FLOAT_SCALING: f32 = 1.0 / 32768.0;

/// Smallest FloatS16 sample value.
pub const MIN_FLOAT_S16_VALUE: f32 = -32768.0;
/// Largest FloatS16 sample value.
pub const MAX_FLOAT_S16_VALUE: f32 = 32767.0;
/// Full-scale magnitude of a FloatS16 sample.
pub const MAX_ABS_FLOAT_S16_VALUE: f32 = 32768.0;
/// Level of a one-LSB signal in dBFS (`20 * log10(1 / 32768)`).
pub const MIN_LEVEL_DBFS: f32 = -90.309;

/// Convert a single S16 sample to Float.
#[inline]
pub fn s16_to_float(v: i16) -> f32 {
    f32::from(v) * S16_TO_FLOAT_SCALING
}

/// Convert a single FloatS16 sample to S16, rounding to nearest.
#[inline]
pub fn float_s16_to_s16(v: f32) -> i16 {
    let v = v.clamp(MIN_FLOAT_S16_VALUE, MAX_FLOAT_S16_VALUE);
    (v + f32::copysign(0.5, v)) as i16
}

/// Convert a single Float sample to FloatS16.
#[inline]
pub fn float_to_float_s16(v: f32) -> f32 {
    v.clamp(-1.0, 1.0) * MAX_ABS_FLOAT_S16_VALUE
}

/// Convert a single FloatS16 sample to Float.
#[inline]
pub fn float_s16_to_float(v: f32) -> f32 {
    v.clamp(MIN_FLOAT_S16_VALUE, MAX_ABS_FLOAT_S16_VALUE) * S16_TO_FLOAT_SCALING
}

/// Convert a dB value to a linear amplitude ratio.
#[inline]
pub fn db_to_ratio(v: f32) -> f32 {
    10.0_f32.powf(v / 20.0)
}

/// Convert a dBFS level to FloatS16 amplitude.
#[inline]
pub fn dbfs_to_float_s16(v: f32) -> f32 {
    db_to_ratio(v) * MAX_ABS_FLOAT_S16_VALUE
}

/// Convert a non-negative FloatS16 amplitude to dBFS.
#[inline]
pub fn float_s16_to_dbfs(v: f32) -> f32 {
    debug_assert!(v >= 0.0);
    if v <= 1.0 {
        return MIN_LEVEL_DBFS;
    }
    20.0 * v.log10() + MIN_LEVEL_DBFS
}

/// Convert Float samples to FloatS16.
///
/// # Panics
///
/// Panics if `src` and `dest` have different lengths.
pub fn float_to_float_s16_slice(src: &[f32], dest: &mut [f32]) {
    assert_eq!(src.len(), dest.len());
    for (d, &s) in dest.iter_mut().zip(src) {
        *d = float_to_float_s16(s);
    }
}

/// Convert FloatS16 samples to Float.
///
/// # Panics
///
/// Panics if `src` and `dest` have different lengths.
pub fn float_s16_to_float_slice(src: &[f32], dest: &mut [f32]) {
    assert_eq!(src.len(), dest.len());
    for (d, &s) in dest.iter_mut().zip(src) {
        *d = float_s16_to_float(s);
    }
}

/// Convert FloatS16 samples to S16 with rounding.
///
/// # Panics
///
/// Panics if `src` and `dest` have different lengths.
pub fn float_s16_to_s16_slice(src: &[f32], dest: &mut [i16]) {
    assert_eq!(src.len(), dest.len());
    for (d, &s) in dest.iter_mut().zip(src) {
        *d = float_s16_to_s16(s);
    }
}

/// Root mean square of a FloatS16 block, in dBFS.
pub fn rms_dbfs(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return MIN_LEVEL_DBFS;
    }
    let energy: f32 = samples.iter().map(|&v| v * v).sum();
    float_s16_to_dbfs((energy / samples.len() as f32).sqrt())
}

/// Split an interleaved buffer into per-channel buffers.
///
/// `interleaved.len()` must equal `channels.len() * channels[0].len()`.
pub fn deinterleave<T: Copy>(interleaved: &[T], channels: &mut [&mut [T]]) {
    let num_channels = channels.len();
    if num_channels == 0 {
        return;
    }
    let num_frames = channels[0].len();
    debug_assert_eq!(interleaved.len(), num_channels * num_frames);
    for (ch, channel) in channels.iter_mut().enumerate() {
        for (i, sample) in channel.iter_mut().enumerate() {
            *sample = interleaved[i * num_channels + ch];
        }
    }
}

/// Merge per-channel buffers into an interleaved buffer.
pub fn interleave<T: Copy>(channels: &[&[T]], interleaved: &mut [T]) {
    let num_channels = channels.len();
    if num_channels == 0 {
        return;
    }
    let num_frames = channels[0].len();
    debug_assert_eq!(interleaved.len(), num_channels * num_frames);
    for (ch, channel) in channels.iter().enumerate() {
        for (i, &sample) in channel.iter().enumerate() {
            interleaved[i * num_channels + ch] = sample;
        }
    }
}

/// Average all channels into `mono`.
pub fn downmix_to_mono(channels: &[&[f32]], mono: &mut [f32]) {
    let Some((first, rest)) = channels.split_first() else {
        mono.fill(0.0);
        return;
    };
    mono.copy_from_slice(&first[..mono.len()]);
    for channel in rest {
        for (m, &s) in mono.iter_mut().zip(channel.iter()) {
            *m += s;
        }
    }
    let scale = 1.0 / channels.len() as f32;
    for m in mono.iter_mut() {
        *m *= scale;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn s16_round_trip_is_exact() {
        for v in [i16::MIN, -1234, -1, 0, 1, 4321, i16::MAX] {
            let f = f32::from(v);
            assert_eq!(float_s16_to_s16(f), v);
        }
    }

    #[test]
    fn float_s16_to_s16_rounds_and_saturates() {
        assert_eq!(float_s16_to_s16(1.4), 1);
        assert_eq!(float_s16_to_s16(1.6), 2);
        assert_eq!(float_s16_to_s16(-1.6), -2);
        assert_eq!(float_s16_to_s16(40000.0), i16::MAX);
        assert_eq!(float_s16_to_s16(-40000.0), i16::MIN);
    }

    #[test]
    fn float_and_float_s16_scale() {
        assert_eq!(float_to_float_s16(0.5), 16384.0);
        assert_eq!(float_to_float_s16(2.0), 32768.0);
        assert_eq!(float_s16_to_float(-32768.0), -1.0);
        assert_eq!(s16_to_float(16384), 0.5);
    }

    #[test]
    fn dbfs_conversions() {
        assert_eq!(float_s16_to_dbfs(0.0), MIN_LEVEL_DBFS);
        assert!((float_s16_to_dbfs(32768.0)).abs() < 0.01);
        assert!((dbfs_to_float_s16(0.0) - 32768.0).abs() < 0.5);
        assert!((db_to_ratio(20.0) - 10.0).abs() < 1e-4);
    }

    #[test]
    fn interleave_and_deinterleave_are_inverse() {
        let interleaved = [1, 10, 2, 20, 3, 30];
        let mut left = [0; 3];
        let mut right = [0; 3];
        deinterleave(&interleaved, &mut [&mut left, &mut right]);
        assert_eq!(left, [1, 2, 3]);
        assert_eq!(right, [10, 20, 30]);

        let mut out = [0; 6];
        interleave(&[&left, &right], &mut out);
        assert_eq!(out, interleaved);
    }

    #[test]
    fn downmix_averages_channels() {
        let a = [1.0, 2.0];
        let b = [3.0, -2.0];
        let mut mono = [0.0; 2];
        downmix_to_mono(&[&a, &b], &mut mono);
        assert_eq!(mono, [2.0, 0.0]);
    }

    #[test]
    fn rms_of_silence_is_floor() {
        assert_eq!(rms_dbfs(&[0.0; 160]), MIN_LEVEL_DBFS);
    }
}
