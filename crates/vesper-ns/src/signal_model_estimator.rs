//! Feature extraction and periodic re-estimation of the prior model.
//!
//! Three features summarize each analyzed frame: the average log-likelihood
//! ratio (LRT), spectral flatness and the spectral difference against the
//! conservative noise estimate. Their histograms over
//! [`FEATURE_UPDATE_WINDOW_SIZE`] frames decide which features the prior
//! model trusts and at which thresholds.

use derive_more::Debug;

use crate::config::{
    BIN_SIZE_LRT, BIN_SIZE_SPEC_DIFF, BIN_SIZE_SPEC_FLAT, FEATURE_UPDATE_WINDOW_SIZE,
    FFT_SIZE_BY_2_PLUS_1, LRT_FEATURE_THR,
};
use crate::histograms::{HISTOGRAM_SIZE, Histograms};
use crate::signal_model::{PriorSignalModel, SignalModel};

const ONE_BY_FFT_SIZE_BY_2_PLUS_1: f32 = 1.0 / FFT_SIZE_BY_2_PLUS_1 as f32;
/// Minimum histogram peak mass (30 % of a window) for a feature to be used.
const MIN_PEAK_WEIGHT: f32 = 0.3 * FEATURE_UPDATE_WINDOW_SIZE as f32;

/// Normalized residual variance of the signal after projecting out the
/// noise spectrum shape.
fn spectral_diff(
    conservative_noise_spectrum: &[f32; FFT_SIZE_BY_2_PLUS_1],
    signal_spectrum: &[f32; FFT_SIZE_BY_2_PLUS_1],
    signal_spectral_sum: f32,
    diff_normalization: f32,
) -> f32 {
    let noise_average =
        conservative_noise_spectrum.iter().sum::<f32>() * ONE_BY_FFT_SIZE_BY_2_PLUS_1;
    let signal_average = signal_spectral_sum * ONE_BY_FFT_SIZE_BY_2_PLUS_1;

    let mut covariance = 0.0_f32;
    let mut noise_variance = 0.0_f32;
    let mut signal_variance = 0.0_f32;
    for (&s, &n) in signal_spectrum.iter().zip(conservative_noise_spectrum) {
        let signal_diff = s - signal_average;
        let noise_diff = n - noise_average;
        covariance += signal_diff * noise_diff;
        noise_variance += noise_diff * noise_diff;
        signal_variance += signal_diff * signal_diff;
    }
    covariance *= ONE_BY_FFT_SIZE_BY_2_PLUS_1;
    noise_variance *= ONE_BY_FFT_SIZE_BY_2_PLUS_1;
    signal_variance *= ONE_BY_FFT_SIZE_BY_2_PLUS_1;

    let diff = signal_variance - covariance * covariance / (noise_variance + 0.0001);
    diff / (diff_normalization + 0.0001)
}

/// Ratio of geometric to arithmetic mean of the spectrum, DC excluded.
fn spectral_flatness(
    signal_spectrum: &[f32; FFT_SIZE_BY_2_PLUS_1],
    signal_spectral_sum: f32,
) -> Option<f32> {
    let bins = &signal_spectrum[1..];
    if bins.iter().any(|&s| s == 0.0) {
        return None;
    }
    let log_mean = bins.iter().map(|s| s.ln()).sum::<f32>() * ONE_BY_FFT_SIZE_BY_2_PLUS_1;
    let mean = (signal_spectral_sum - signal_spectrum[0]) * ONE_BY_FFT_SIZE_BY_2_PLUS_1;
    Some(log_mean.exp() / mean)
}

/// Returns the position and mass of the dominant histogram peak, merging the
/// runner-up into it when the two are adjacent and comparable.
fn dominant_peak(bin_size: f32, histogram: &[i32; HISTOGRAM_SIZE]) -> (f32, i32) {
    let mut first = (0.0_f32, 0_i32);
    let mut second = (0.0_f32, 0_i32);
    for (i, &count) in histogram.iter().enumerate() {
        let position = (i as f32 + 0.5) * bin_size;
        if count > first.1 {
            second = first;
            first = (position, count);
        } else if count > second.1 {
            second = (position, count);
        }
    }

    if (second.0 - first.0).abs() < 2.0 * bin_size && second.1 as f32 > 0.5 * first.1 as f32 {
        (0.5 * (first.0 + second.0), first.1 + second.1)
    } else {
        first
    }
}

/// Derives the LRT threshold and whether the LRT barely fluctuated, which
/// indicates a noise-only window.
fn lrt_threshold(histogram: &[i32; HISTOGRAM_SIZE]) -> (f32, bool) {
    const MAX_LRT: f32 = 1.0;
    const MIN_LRT: f32 = 0.2;

    let mut low_average = 0.0_f32;
    let mut low_count = 0;
    for (i, &count) in histogram.iter().enumerate().take(10) {
        low_average += count as f32 * (i as f32 + 0.5) * BIN_SIZE_LRT;
        low_count += count;
    }
    if low_count > 0 {
        low_average /= low_count as f32;
    }

    let mut average = 0.0_f32;
    let mut average_squared = 0.0_f32;
    for (i, &count) in histogram.iter().enumerate() {
        let position = (i as f32 + 0.5) * BIN_SIZE_LRT;
        average += count as f32 * position;
        average_squared += count as f32 * position * position;
    }
    average /= FEATURE_UPDATE_WINDOW_SIZE as f32;
    average_squared /= FEATURE_UPDATE_WINDOW_SIZE as f32;

    let low_fluctuations = average_squared - low_average * average < 0.05;
    let threshold = if low_fluctuations {
        MAX_LRT
    } else {
        (1.2 * low_average).clamp(MIN_LRT, MAX_LRT)
    };
    (threshold, low_fluctuations)
}

#[derive(Debug)]
pub(crate) struct SignalModelEstimator {
    diff_normalization: f32,
    signal_energy_sum: f32,
    histograms: Histograms,
    histogram_analysis_counter: i32,
    prior_model: PriorSignalModel,
    features: SignalModel,
}

impl SignalModelEstimator {
    pub(crate) fn new() -> Self {
        Self {
            diff_normalization: 0.0,
            signal_energy_sum: 0.0,
            histograms: Histograms::new(),
            histogram_analysis_counter: FEATURE_UPDATE_WINDOW_SIZE,
            prior_model: PriorSignalModel::new(LRT_FEATURE_THR),
            features: SignalModel::new(),
        }
    }

    /// Running mean of the frame energy used to normalize the spectral
    /// difference during startup.
    pub(crate) fn adjust_normalization(&mut self, num_analyzed_frames: i32, signal_energy: f32) {
        let n = num_analyzed_frames as f32;
        self.diff_normalization = (self.diff_normalization * n + signal_energy) / (n + 1.0);
    }

    pub(crate) fn update(
        &mut self,
        prior_snr: &[f32; FFT_SIZE_BY_2_PLUS_1],
        post_snr: &[f32; FFT_SIZE_BY_2_PLUS_1],
        conservative_noise_spectrum: &[f32; FFT_SIZE_BY_2_PLUS_1],
        signal_spectrum: &[f32; FFT_SIZE_BY_2_PLUS_1],
        signal_spectral_sum: f32,
        signal_energy: f32,
    ) {
        const AVERAGING: f32 = 0.3;

        match spectral_flatness(signal_spectrum, signal_spectral_sum) {
            Some(flatness) => {
                self.features.spectral_flatness +=
                    AVERAGING * (flatness - self.features.spectral_flatness);
            }
            None => self.features.spectral_flatness *= 1.0 - AVERAGING,
        }

        let diff = spectral_diff(
            conservative_noise_spectrum,
            signal_spectrum,
            signal_spectral_sum,
            self.diff_normalization,
        );
        self.features.spectral_diff += AVERAGING * (diff - self.features.spectral_diff);

        self.signal_energy_sum += signal_energy;

        self.histogram_analysis_counter -= 1;
        if self.histogram_analysis_counter > 0 {
            self.histograms.update(&self.features);
        } else {
            self.update_prior_model();
            self.histograms.clear();
            self.histogram_analysis_counter = FEATURE_UPDATE_WINDOW_SIZE;

            let mean_energy = self.signal_energy_sum / FEATURE_UPDATE_WINDOW_SIZE as f32;
            self.diff_normalization = 0.5 * (mean_energy + self.diff_normalization);
            self.signal_energy_sum = 0.0;
        }

        for ((avg, &prior), &post) in self
            .features
            .avg_log_lrt
            .iter_mut()
            .zip(prior_snr)
            .zip(post_snr)
        {
            let tmp1 = 1.0 + 2.0 * prior;
            let tmp2 = 2.0 * prior / (tmp1 + 0.0001);
            let bessel = (post + 1.0) * tmp2;
            *avg += 0.5 * (bessel - tmp1.ln() - *avg);
        }
        self.features.lrt =
            self.features.avg_log_lrt.iter().sum::<f32>() * ONE_BY_FFT_SIZE_BY_2_PLUS_1;
    }

    fn update_prior_model(&mut self) {
        let (lrt, low_lrt_fluctuations) = lrt_threshold(&self.histograms.lrt);
        let (flatness_position, flatness_weight) =
            dominant_peak(BIN_SIZE_SPEC_FLAT, &self.histograms.spectral_flatness);
        let (diff_position, diff_weight) =
            dominant_peak(BIN_SIZE_SPEC_DIFF, &self.histograms.spectral_diff);

        let use_flatness = flatness_weight as f32 >= MIN_PEAK_WEIGHT && flatness_position >= 0.6;
        let use_diff = diff_weight as f32 >= MIN_PEAK_WEIGHT && !low_lrt_fluctuations;

        let weight =
            1.0 / (1.0 + f32::from(u8::from(use_flatness)) + f32::from(u8::from(use_diff)));

        let prior = &mut self.prior_model;
        prior.lrt = lrt;
        prior.template_diff_threshold = (1.2 * diff_position).clamp(0.16, 1.0);
        prior.lrt_weighting = weight;
        if use_flatness {
            prior.flatness_threshold = (0.9 * flatness_position).clamp(0.1, 0.95);
            prior.flatness_weighting = weight;
        } else {
            prior.flatness_weighting = 0.0;
        }
        prior.difference_weighting = if use_diff { weight } else { 0.0 };
    }

    pub(crate) fn model(&self) -> &SignalModel {
        &self.features
    }

    pub(crate) fn prior_model(&self) -> &PriorSignalModel {
        &self.prior_model
    }
}
