//! Push-based windowed-sinc resampler for fixed-size frames.
//!
//! Every call consumes exactly one input frame and produces exactly one
//! output frame. Because both frame lengths cover the same 10 ms, the
//! fractional read positions repeat every frame, so the interpolation kernel
//! for every output index is computed once at construction.
//!
//! # Usage
//!
//! ```
//! use vesper_common_audio::push_resampler::PushResampler;
//!
//! // 44.1 kHz -> 48 kHz, 10 ms frames.
//! let mut resampler = PushResampler::new(441, 480);
//! let input = vec![0.0_f32; 441];
//! let mut output = vec![0.0_f32; 480];
//! resampler.resample(&input, &mut output);
//! ```

use core::f64::consts::PI;

use derive_more::Debug;
use tracing::debug;

/// Taps per output sample when upsampling. Downsampling by a factor `r`
/// widens the kernel to `ceil(r)` times this length.
pub const KERNEL_SIZE: usize = 32;
/// Fraction of the lower Nyquist frequency kept by the anti-aliasing kernel.
const CUTOFF_SCALE: f64 = 0.9;

/// Blackman window centered on zero, nonzero on `(-half, half)`.
fn blackman(t: f64, half: f64) -> f64 {
    if t.abs() >= half {
        return 0.0;
    }
    let phase = PI * t / half;
    0.42 + 0.5 * phase.cos() + 0.08 * (2.0 * phase).cos()
}

fn sinc(x: f64) -> f64 {
    if x.abs() < 1e-12 {
        1.0
    } else {
        let px = PI * x;
        px.sin() / px
    }
}

/// Single-channel resampler between two fixed frame sizes.
///
/// Introduces a constant delay of half a kernel (in input samples) when the
/// rates differ and is a plain copy when they match.
#[derive(Debug)]
pub struct PushResampler {
    src_frames: usize,
    dst_frames: usize,
    kernel_size: usize,
    /// First buffer index read for each output sample.
    starts: Vec<usize>,
    /// `dst_frames * kernel_size` normalized taps.
    #[debug(skip)]
    weights: Vec<f32>,
    /// `kernel_size` samples of history followed by the current frame.
    #[debug(skip)]
    buffer: Vec<f32>,
}

impl PushResampler {
    /// Creates a resampler turning `src_frames` input samples into
    /// `dst_frames` output samples per call.
    ///
    /// # Panics
    ///
    /// Panics if either frame size is zero.
    pub fn new(src_frames: usize, dst_frames: usize) -> Self {
        assert!(src_frames > 0 && dst_frames > 0, "frame sizes must be non-zero");

        let ratio = src_frames as f64 / dst_frames as f64;
        let kernel_size = KERNEL_SIZE * ratio.ceil().max(1.0) as usize;
        let half = kernel_size / 2;
        // Normalized to the input Nyquist frequency.
        let cutoff = (dst_frames as f64 / src_frames as f64).min(1.0) * CUTOFF_SCALE;

        let mut starts = Vec::with_capacity(dst_frames);
        let mut weights = Vec::with_capacity(dst_frames * kernel_size);
        for j in 0..dst_frames {
            // Read position inside the buffer, delayed by half a kernel.
            let position = half as f64 + j as f64 * ratio;
            let base = position.floor() as usize;
            let start = base + 1 - half;
            starts.push(start);

            let taps: Vec<f64> = (0..kernel_size)
                .map(|k| {
                    let t = (start + k) as f64 - position;
                    cutoff * sinc(cutoff * t) * blackman(t, half as f64)
                })
                .collect();
            let sum: f64 = taps.iter().sum();
            weights.extend(taps.iter().map(|&w| (w / sum) as f32));
        }

        debug!(src_frames, dst_frames, kernel_size, "created push resampler");

        Self {
            src_frames,
            dst_frames,
            kernel_size,
            starts,
            weights,
            buffer: vec![0.0; kernel_size + src_frames],
        }
    }

    /// Input samples consumed per call.
    pub fn src_frames(&self) -> usize {
        self.src_frames
    }

    /// Output samples produced per call.
    pub fn dst_frames(&self) -> usize {
        self.dst_frames
    }

    /// Resamples one frame. Returns the number of samples written.
    ///
    /// # Panics
    ///
    /// Panics if `src` or `dst` do not match the configured frame sizes.
    pub fn resample(&mut self, src: &[f32], dst: &mut [f32]) -> usize {
        assert_eq!(src.len(), self.src_frames);
        assert_eq!(dst.len(), self.dst_frames);

        if self.src_frames == self.dst_frames {
            dst.copy_from_slice(src);
            return dst.len();
        }

        let kernel_size = self.kernel_size;
        self.buffer[kernel_size..].copy_from_slice(src);
        for ((out, &start), taps) in dst
            .iter_mut()
            .zip(&self.starts)
            .zip(self.weights.chunks_exact(kernel_size))
        {
            *out = self.buffer[start..start + kernel_size]
                .iter()
                .zip(taps)
                .map(|(&x, &w)| x * w)
                .sum();
        }
        self.buffer.copy_within(self.src_frames.., 0);

        dst.len()
    }

    /// Clears the history.
    pub fn reset(&mut self) {
        self.buffer.fill(0.0);
    }
}

#[cfg(test)]
mod tests {
    use core::f32::consts::{FRAC_1_SQRT_2, TAU};

    use super::*;

    fn sine(rate: f32, freq: f32, frame: usize, len: usize) -> Vec<f32> {
        (0..len)
            .map(|i| {
                let t = (frame * len + i) as f32 / rate;
                (TAU * freq * t).sin()
            })
            .collect()
    }

    fn rms(x: &[f32]) -> f32 {
        (x.iter().map(|v| v * v).sum::<f32>() / x.len() as f32).sqrt()
    }

    #[test]
    fn equal_rates_copy_through() {
        let mut resampler = PushResampler::new(160, 160);
        let input: Vec<f32> = (0..160).map(|i| i as f32).collect();
        let mut output = vec![0.0; 160];
        assert_eq!(resampler.resample(&input, &mut output), 160);
        assert_eq!(input, output);
    }

    #[test]
    fn silence_stays_silent() {
        let mut resampler = PushResampler::new(441, 480);
        let input = vec![0.0; 441];
        let mut output = vec![1.0; 480];
        for _ in 0..5 {
            resampler.resample(&input, &mut output);
            assert!(output.iter().all(|&v| v == 0.0));
        }
    }

    #[test]
    fn dc_gain_is_unity_after_warm_up() {
        let mut resampler = PushResampler::new(480, 160);
        let input = vec![0.5; 480];
        let mut output = vec![0.0; 160];
        for _ in 0..3 {
            resampler.resample(&input, &mut output);
        }
        for &v in &output {
            assert!((v - 0.5).abs() < 1e-3, "dc output {v}");
        }
    }

    #[test]
    fn upsampled_tone_keeps_its_level() {
        let mut resampler = PushResampler::new(160, 480);
        let mut output = vec![0.0; 480];
        for frame in 0..10 {
            let input = sine(16000.0, 1000.0, frame, 160);
            resampler.resample(&input, &mut output);
        }
        let level = rms(&output);
        let expected = FRAC_1_SQRT_2;
        assert!(
            (level - expected).abs() < 0.05 * expected,
            "rms {level} vs {expected}"
        );
    }

    #[test]
    fn tone_above_target_nyquist_is_attenuated() {
        let mut resampler = PushResampler::new(480, 160);
        let mut output = vec![0.0; 160];
        for frame in 0..10 {
            let input = sine(48000.0, 12000.0, frame, 480);
            resampler.resample(&input, &mut output);
        }
        assert!(rms(&output) < 0.05, "alias leaked: {}", rms(&output));
    }
}
