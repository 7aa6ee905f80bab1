//! Noise spectrum estimate combining quantile tracking, a parametric startup
//! model and a speech-probability-weighted refinement.

use derive_more::Debug;

use crate::config::{FFT_SIZE_BY_2_PLUS_1, SHORT_STARTUP_PHASE_BLOCKS};
use crate::quantile_noise_estimator::QuantileNoiseEstimator;
use crate::suppression_params::SuppressionParams;

/// First bin used when fitting the pink noise model.
const START_BAND: usize = 5;
/// Smoothing of the noise spectrum in frames unlikely to hold speech.
const NOISE_UPDATE: f32 = 0.9;
/// Speech probability above which the noise update is slowed down.
const PROB_RANGE: f32 = 0.2;

#[derive(Debug)]
pub(crate) struct NoiseEstimator {
    white_noise_level: f32,
    pink_noise_numerator: f32,
    pink_noise_exp: f32,
    #[debug(skip)]
    prev_noise_spectrum: [f32; FFT_SIZE_BY_2_PLUS_1],
    #[debug(skip)]
    conservative_noise_spectrum: [f32; FFT_SIZE_BY_2_PLUS_1],
    #[debug(skip)]
    parametric_noise_spectrum: [f32; FFT_SIZE_BY_2_PLUS_1],
    #[debug(skip)]
    noise_spectrum: [f32; FFT_SIZE_BY_2_PLUS_1],
    quantile_noise_estimator: QuantileNoiseEstimator,
}

impl NoiseEstimator {
    pub(crate) fn new() -> Self {
        Self {
            white_noise_level: 0.0,
            pink_noise_numerator: 0.0,
            pink_noise_exp: 0.0,
            prev_noise_spectrum: [0.0; FFT_SIZE_BY_2_PLUS_1],
            conservative_noise_spectrum: [0.0; FFT_SIZE_BY_2_PLUS_1],
            parametric_noise_spectrum: [0.0; FFT_SIZE_BY_2_PLUS_1],
            noise_spectrum: [0.0; FFT_SIZE_BY_2_PLUS_1],
            quantile_noise_estimator: QuantileNoiseEstimator::new(),
        }
    }

    /// Remembers the current estimate as the previous frame's.
    pub(crate) fn prepare_analysis(&mut self) {
        self.prev_noise_spectrum = self.noise_spectrum;
    }

    /// Updates the quantile estimate and, during the short startup phase,
    /// blends it with a white or pink noise model fitted to the signal.
    pub(crate) fn pre_update(
        &mut self,
        params: &SuppressionParams,
        num_analyzed_frames: i32,
        signal_spectrum: &[f32; FFT_SIZE_BY_2_PLUS_1],
        signal_spectral_sum: f32,
    ) {
        self.quantile_noise_estimator
            .estimate(signal_spectrum, &mut self.noise_spectrum);

        if num_analyzed_frames >= SHORT_STARTUP_PHASE_BLOCKS {
            return;
        }

        // Least-squares fit of log(magnitude) against log(bin).
        let mut sum_log_i = 0.0_f32;
        let mut sum_log_i_square = 0.0_f32;
        let mut sum_log_magn = 0.0_f32;
        let mut sum_log_i_log_magn = 0.0_f32;
        for (i, &magnitude) in signal_spectrum.iter().enumerate().skip(START_BAND) {
            let log_i = (i as f32).ln();
            let log_magn = magnitude.ln();
            sum_log_i += log_i;
            sum_log_i_square += log_i * log_i;
            sum_log_magn += log_magn;
            sum_log_i_log_magn += log_i * log_magn;
        }
        let num_bins = (FFT_SIZE_BY_2_PLUS_1 - START_BAND) as f32;
        let denom = sum_log_i_square * num_bins - sum_log_i * sum_log_i;

        self.white_noise_level += signal_spectral_sum / FFT_SIZE_BY_2_PLUS_1 as f32
            * params.over_subtraction_factor;

        let numerator = (sum_log_i_square * sum_log_magn - sum_log_i * sum_log_i_log_magn) / denom;
        self.pink_noise_numerator += numerator.max(0.0);

        let exponent = (sum_log_i * sum_log_magn - num_bins * sum_log_i_log_magn) / denom;
        self.pink_noise_exp += exponent.clamp(0.0, 1.0);

        let frames = num_analyzed_frames as f32 + 1.0;
        if self.pink_noise_exp > 0.0 {
            let parametric_num = (self.pink_noise_numerator / frames).exp() * frames;
            let parametric_exp = self.pink_noise_exp / frames;
            for (i, p) in self.parametric_noise_spectrum.iter_mut().enumerate() {
                let band = i.max(START_BAND) as f32;
                *p = parametric_num / band.powf(parametric_exp);
            }
        } else {
            self.parametric_noise_spectrum.fill(self.white_noise_level);
        }

        // Weight the quantile estimate against the model as startup progresses.
        let model_weight = (SHORT_STARTUP_PHASE_BLOCKS - num_analyzed_frames) as f32 / frames;
        for (noise, &parametric) in self
            .noise_spectrum
            .iter_mut()
            .zip(&self.parametric_noise_spectrum)
        {
            *noise = (*noise * num_analyzed_frames as f32 + parametric * model_weight)
                / SHORT_STARTUP_PHASE_BLOCKS as f32;
        }
    }

    /// Refines the estimate with the per-bin speech probability so that
    /// speech energy is not absorbed into the noise floor.
    pub(crate) fn post_update(
        &mut self,
        speech_probability: &[f32; FFT_SIZE_BY_2_PLUS_1],
        signal_spectrum: &[f32; FFT_SIZE_BY_2_PLUS_1],
    ) {
        let mut gamma = NOISE_UPDATE;
        for i in 0..FFT_SIZE_BY_2_PLUS_1 {
            let prob_speech = speech_probability[i];
            let prev = self.prev_noise_spectrum[i];
            let target = (1.0 - prob_speech) * signal_spectrum[i] + prob_speech * prev;

            let noise_update_tmp = gamma * prev + (1.0 - gamma) * target;

            let gamma_old = gamma;
            gamma = if prob_speech > PROB_RANGE { 0.99 } else { NOISE_UPDATE };

            if prob_speech < PROB_RANGE {
                self.conservative_noise_spectrum[i] +=
                    0.05 * (signal_spectrum[i] - self.conservative_noise_spectrum[i]);
            }

            self.noise_spectrum[i] = if gamma == gamma_old {
                noise_update_tmp
            } else {
                // Downward updates are always accepted.
                (gamma * prev + (1.0 - gamma) * target).min(noise_update_tmp)
            };
        }
    }

    pub(crate) fn noise_spectrum(&self) -> &[f32; FFT_SIZE_BY_2_PLUS_1] {
        &self.noise_spectrum
    }

    pub(crate) fn prev_noise_spectrum(&self) -> &[f32; FFT_SIZE_BY_2_PLUS_1] {
        &self.prev_noise_spectrum
    }

    pub(crate) fn parametric_noise_spectrum(&self) -> &[f32; FFT_SIZE_BY_2_PLUS_1] {
        &self.parametric_noise_spectrum
    }

    pub(crate) fn conservative_noise_spectrum(&self) -> &[f32; FFT_SIZE_BY_2_PLUS_1] {
        &self.conservative_noise_spectrum
    }
}
