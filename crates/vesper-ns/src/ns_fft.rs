//! 256-point real transform between time frames and split spectra.

use std::sync::Arc;

use derive_more::Debug;
use rustfft::num_complex::Complex32;
use rustfft::{Fft, FftPlanner};

use crate::config::{FFT_SIZE, FFT_SIZE_BY_2_PLUS_1};

/// Forward and inverse transform of one [`FFT_SIZE`] window.
///
/// The forward transform is unscaled; the inverse divides by [`FFT_SIZE`] so
/// that `ifft(fft(x)) == x`.
#[derive(Debug)]
pub(crate) struct NsFft {
    #[debug(skip)]
    forward: Arc<dyn Fft<f32>>,
    #[debug(skip)]
    inverse: Arc<dyn Fft<f32>>,
    #[debug(skip)]
    buffer: Vec<Complex32>,
    #[debug(skip)]
    scratch: Vec<Complex32>,
}

impl NsFft {
    pub(crate) fn new() -> Self {
        let mut planner = FftPlanner::<f32>::new();
        let forward = planner.plan_fft_forward(FFT_SIZE);
        let inverse = planner.plan_fft_inverse(FFT_SIZE);
        let scratch_len = forward
            .get_inplace_scratch_len()
            .max(inverse.get_inplace_scratch_len());
        Self {
            forward,
            inverse,
            buffer: vec![Complex32::default(); FFT_SIZE],
            scratch: vec![Complex32::default(); scratch_len],
        }
    }

    /// Transforms `time_data` into the non-negative frequency bins.
    pub(crate) fn fft(
        &mut self,
        time_data: &[f32; FFT_SIZE],
        real: &mut [f32; FFT_SIZE_BY_2_PLUS_1],
        imag: &mut [f32; FFT_SIZE_BY_2_PLUS_1],
    ) {
        for (b, &x) in self.buffer.iter_mut().zip(time_data) {
            *b = Complex32::new(x, 0.0);
        }
        self.forward
            .process_with_scratch(&mut self.buffer, &mut self.scratch);

        for (k, bin) in self.buffer[..FFT_SIZE_BY_2_PLUS_1].iter().enumerate() {
            real[k] = bin.re;
            imag[k] = bin.im;
        }
        imag[0] = 0.0;
        imag[FFT_SIZE_BY_2_PLUS_1 - 1] = 0.0;
    }

    /// Rebuilds a real frame from its non-negative frequency bins.
    pub(crate) fn ifft(
        &mut self,
        real: &[f32; FFT_SIZE_BY_2_PLUS_1],
        imag: &[f32; FFT_SIZE_BY_2_PLUS_1],
        time_data: &mut [f32; FFT_SIZE],
    ) {
        let last = FFT_SIZE_BY_2_PLUS_1 - 1;
        self.buffer[0] = Complex32::new(real[0], 0.0);
        self.buffer[last] = Complex32::new(real[last], 0.0);
        for k in 1..last {
            let bin = Complex32::new(real[k], imag[k]);
            self.buffer[k] = bin;
            self.buffer[FFT_SIZE - k] = bin.conj();
        }
        self.inverse
            .process_with_scratch(&mut self.buffer, &mut self.scratch);

        let scale = 1.0 / FFT_SIZE as f32;
        for (t, b) in time_data.iter_mut().zip(&self.buffer) {
            *t = b.re * scale;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inverse_restores_the_frame() {
        let mut fft = NsFft::new();
        let mut frame = [0.0_f32; FFT_SIZE];
        for (i, v) in frame.iter_mut().enumerate() {
            *v = (i as f32 * 0.05).sin() * 1000.0 + (i as f32 * 0.31).cos() * 200.0;
        }

        let mut real = [0.0; FFT_SIZE_BY_2_PLUS_1];
        let mut imag = [0.0; FFT_SIZE_BY_2_PLUS_1];
        fft.fft(&frame, &mut real, &mut imag);
        let mut restored = [0.0; FFT_SIZE];
        fft.ifft(&real, &imag, &mut restored);

        for (i, (&a, &b)) in frame.iter().zip(&restored).enumerate() {
            assert!((a - b).abs() < 1e-2, "sample {i}: {a} vs {b}");
        }
    }

    #[test]
    fn constant_frame_lands_in_dc() {
        let mut fft = NsFft::new();
        let mut real = [0.0; FFT_SIZE_BY_2_PLUS_1];
        let mut imag = [0.0; FFT_SIZE_BY_2_PLUS_1];
        fft.fft(&[1.0; FFT_SIZE], &mut real, &mut imag);

        assert!((real[0] - FFT_SIZE as f32).abs() < 1e-3);
        for k in 1..FFT_SIZE_BY_2_PLUS_1 {
            assert!(real[k].abs() < 1e-3 && imag[k].abs() < 1e-3, "bin {k}");
        }
    }

    #[test]
    fn impulse_has_flat_spectrum() {
        let mut fft = NsFft::new();
        let mut impulse = [0.0; FFT_SIZE];
        impulse[0] = 1.0;
        let mut real = [0.0; FFT_SIZE_BY_2_PLUS_1];
        let mut imag = [0.0; FFT_SIZE_BY_2_PLUS_1];
        fft.fft(&impulse, &mut real, &mut imag);

        for k in 0..FFT_SIZE_BY_2_PLUS_1 {
            assert!((real[k] - 1.0).abs() < 1e-5);
            assert!(imag[k].abs() < 1e-5);
        }
    }
}
