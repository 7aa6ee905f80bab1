//! Per-bin speech probability.
//!
//! A prior probability is derived from how the frame features compare with
//! the prior model's thresholds, then combined with each bin's averaged
//! likelihood ratio.

use derive_more::Debug;

use crate::config::{FFT_SIZE_BY_2_PLUS_1, LONG_STARTUP_PHASE_BLOCKS};
use crate::signal_model_estimator::SignalModelEstimator;

/// Sigmoid width for features on the speech side of their threshold.
const WIDTH_PRIOR_0: f32 = 4.0;
/// Wider sigmoid for the pause side, where feature ranges are smaller.
const WIDTH_PRIOR_1: f32 = 2.0 * WIDTH_PRIOR_0;

/// Spectra and statistics of one analyzed frame.
pub(crate) struct SignalAnalysis<'a> {
    pub(crate) num_analyzed_frames: i32,
    pub(crate) prior_snr: &'a [f32; FFT_SIZE_BY_2_PLUS_1],
    pub(crate) post_snr: &'a [f32; FFT_SIZE_BY_2_PLUS_1],
    pub(crate) conservative_noise_spectrum: &'a [f32; FFT_SIZE_BY_2_PLUS_1],
    pub(crate) signal_spectrum: &'a [f32; FFT_SIZE_BY_2_PLUS_1],
    pub(crate) signal_spectral_sum: f32,
    pub(crate) signal_energy: f32,
}

/// Maps `value - threshold` through a sigmoid whose width depends on the
/// side of the threshold `value` lies on.
fn indicator(value: f32, threshold: f32, pause_side: bool) -> f32 {
    let width = if pause_side { WIDTH_PRIOR_1 } else { WIDTH_PRIOR_0 };
    0.5 * ((width * (value - threshold)).tanh() + 1.0)
}

#[derive(Debug)]
pub(crate) struct SpeechProbabilityEstimator {
    signal_model_estimator: SignalModelEstimator,
    prior_speech_prob: f32,
    #[debug(skip)]
    speech_probability: [f32; FFT_SIZE_BY_2_PLUS_1],
}

impl SpeechProbabilityEstimator {
    pub(crate) fn new() -> Self {
        Self {
            signal_model_estimator: SignalModelEstimator::new(),
            prior_speech_prob: 0.5,
            speech_probability: [0.0; FFT_SIZE_BY_2_PLUS_1],
        }
    }

    pub(crate) fn update(&mut self, analysis: &SignalAnalysis<'_>) {
        if analysis.num_analyzed_frames < LONG_STARTUP_PHASE_BLOCKS {
            self.signal_model_estimator
                .adjust_normalization(analysis.num_analyzed_frames, analysis.signal_energy);
        }
        self.signal_model_estimator.update(
            analysis.prior_snr,
            analysis.post_snr,
            analysis.conservative_noise_spectrum,
            analysis.signal_spectrum,
            analysis.signal_spectral_sum,
            analysis.signal_energy,
        );

        let model = self.signal_model_estimator.model();
        let prior = self.signal_model_estimator.prior_model();

        // High LRT, low flatness and high template difference indicate speech.
        let lrt = indicator(model.lrt, prior.lrt, model.lrt < prior.lrt);
        let flatness = indicator(
            prior.flatness_threshold,
            model.spectral_flatness,
            model.spectral_flatness > prior.flatness_threshold,
        );
        let difference = indicator(
            model.spectral_diff,
            prior.template_diff_threshold,
            model.spectral_diff < prior.template_diff_threshold,
        );

        let ind_prior = prior.lrt_weighting * lrt
            + prior.flatness_weighting * flatness
            + prior.difference_weighting * difference;

        self.prior_speech_prob += 0.1 * (ind_prior - self.prior_speech_prob);
        self.prior_speech_prob = self.prior_speech_prob.clamp(0.01, 1.0);

        let gain_prior = (1.0 - self.prior_speech_prob) / (self.prior_speech_prob + 0.0001);
        for (p, &log_lrt) in self
            .speech_probability
            .iter_mut()
            .zip(&model.avg_log_lrt)
        {
            *p = 1.0 / (1.0 + gain_prior * (-log_lrt).exp());
        }
    }

    /// Frequency-independent prior probability of speech.
    pub(crate) fn prior_probability(&self) -> f32 {
        self.prior_speech_prob
    }

    pub(crate) fn probability(&self) -> &[f32; FFT_SIZE_BY_2_PLUS_1] {
        &self.speech_probability
    }
}
