//! Per-bin Wiener gains from a decision-directed SNR estimate.

use derive_more::Debug;

use crate::config::{FFT_SIZE_BY_2_PLUS_1, LONG_STARTUP_PHASE_BLOCKS, SHORT_STARTUP_PHASE_BLOCKS};
use crate::suppression_params::SuppressionParams;

/// Energy-gain threshold separating the two overall scaling regimes.
const B_LIM: f32 = 0.5;

#[derive(Debug)]
pub(crate) struct WienerFilter {
    #[debug(skip)]
    spectrum_prev_process: [f32; FFT_SIZE_BY_2_PLUS_1],
    #[debug(skip)]
    initial_spectral_estimate: [f32; FFT_SIZE_BY_2_PLUS_1],
    #[debug(skip)]
    filter: [f32; FFT_SIZE_BY_2_PLUS_1],
}

impl WienerFilter {
    pub(crate) fn new() -> Self {
        Self {
            spectrum_prev_process: [0.0; FFT_SIZE_BY_2_PLUS_1],
            initial_spectral_estimate: [0.0; FFT_SIZE_BY_2_PLUS_1],
            filter: [1.0; FFT_SIZE_BY_2_PLUS_1],
        }
    }

    /// Recomputes the gains for the frame whose magnitude is `signal_spectrum`.
    pub(crate) fn update(
        &mut self,
        params: &SuppressionParams,
        num_analyzed_frames: i32,
        noise_spectrum: &[f32; FFT_SIZE_BY_2_PLUS_1],
        prev_noise_spectrum: &[f32; FFT_SIZE_BY_2_PLUS_1],
        parametric_noise_spectrum: &[f32; FFT_SIZE_BY_2_PLUS_1],
        signal_spectrum: &[f32; FFT_SIZE_BY_2_PLUS_1],
    ) {
        let over_sub = params.over_subtraction_factor;
        let min_gain = params.minimum_attenuating_gain;

        for i in 0..FFT_SIZE_BY_2_PLUS_1 {
            let prev_snr =
                self.spectrum_prev_process[i] / (prev_noise_spectrum[i] + 0.0001) * self.filter[i];
            let current_snr = if signal_spectrum[i] > noise_spectrum[i] {
                signal_spectrum[i] / (noise_spectrum[i] + 0.0001) - 1.0
            } else {
                0.0
            };
            let prior_snr = 0.98 * prev_snr + 0.02 * current_snr;
            self.filter[i] = (prior_snr / (over_sub + prior_snr)).clamp(min_gain, 1.0);
        }

        if num_analyzed_frames < SHORT_STARTUP_PHASE_BLOCKS {
            // Blend with a spectral-subtraction gain based on the parametric model.
            let n = num_analyzed_frames as f32;
            let remaining = (SHORT_STARTUP_PHASE_BLOCKS - num_analyzed_frames) as f32;
            for i in 0..FFT_SIZE_BY_2_PLUS_1 {
                self.initial_spectral_estimate[i] += signal_spectrum[i];
                let initial = ((self.initial_spectral_estimate[i]
                    - over_sub * parametric_noise_spectrum[i])
                    / (self.initial_spectral_estimate[i] + 0.0001))
                    .clamp(min_gain, 1.0);
                self.filter[i] = (self.filter[i] * n + initial * remaining)
                    / SHORT_STARTUP_PHASE_BLOCKS as f32;
            }
        }

        self.spectrum_prev_process = *signal_spectrum;
    }

    /// Frame-level gain correction applied after filtering, based on the
    /// energy lost to the Wiener gains and the prior speech probability.
    pub(crate) fn compute_overall_scaling_factor(
        &self,
        params: &SuppressionParams,
        num_analyzed_frames: i32,
        prior_speech_probability: f32,
        energy_before_filtering: f32,
        energy_after_filtering: f32,
    ) -> f32 {
        if !params.use_attenuation_adjustment || num_analyzed_frames <= LONG_STARTUP_PHASE_BLOCKS {
            return 1.0;
        }

        let gain = (energy_after_filtering / (energy_before_filtering + 1.0)).sqrt();

        let speech_scale = if gain > B_LIM {
            let scale = 1.0 + 1.3 * (gain - B_LIM);
            if gain * scale > 1.0 { 1.0 / gain } else { scale }
        } else {
            1.0
        };

        // Pauses are attenuated by the gain floor, so keep this mild.
        let pause_scale = if gain < B_LIM {
            1.0 - 0.3 * (B_LIM - gain.max(params.minimum_attenuating_gain))
        } else {
            1.0
        };

        prior_speech_probability * speech_scale + (1.0 - prior_speech_probability) * pause_scale
    }

    pub(crate) fn filter(&self) -> &[f32; FFT_SIZE_BY_2_PLUS_1] {
        &self.filter
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SuppressionLevel;

    const MODERATE: SuppressionParams = SuppressionParams::for_level(SuppressionLevel::K12dB);

    fn update(filter: &mut WienerFilter, frame: i32, signal: f32, noise: f32) {
        let noise = [noise; FFT_SIZE_BY_2_PLUS_1];
        filter.update(&MODERATE, frame, &noise, &noise, &noise, &[signal; FFT_SIZE_BY_2_PLUS_1]);
    }

    #[test]
    fn starts_transparent() {
        assert_eq!(*WienerFilter::new().filter(), [1.0; FFT_SIZE_BY_2_PLUS_1]);
    }

    #[test]
    fn clean_signal_keeps_high_gain() {
        let mut filter = WienerFilter::new();
        update(&mut filter, 60, 100.0, 0.001);
        assert!(filter.filter().iter().all(|&g| g > 0.9));
    }

    #[test]
    fn noise_only_hits_the_floor() {
        let mut filter = WienerFilter::new();
        update(&mut filter, 60, 1.0, 100.0);
        assert!(filter.filter().iter().all(|&g| g == MODERATE.minimum_attenuating_gain));
    }

    #[test]
    fn gains_stay_within_floor_and_unity() {
        let mut filter = WienerFilter::new();
        for frame in 0..100 {
            let signal = if frame % 2 == 0 { 100.0 } else { 1.0 };
            update(&mut filter, frame, signal, 10.0);
            for &g in filter.filter() {
                assert!((MODERATE.minimum_attenuating_gain..=1.0).contains(&g), "gain {g}");
            }
        }
    }

    #[test]
    fn no_overall_scaling_during_startup_or_at_mild_level() {
        let filter = WienerFilter::new();
        assert_eq!(filter.compute_overall_scaling_factor(&MODERATE, 0, 0.5, 100.0, 50.0), 1.0);
        let mild = SuppressionParams::for_level(SuppressionLevel::K6dB);
        assert_eq!(filter.compute_overall_scaling_factor(&mild, 300, 0.5, 100.0, 50.0), 1.0);
    }

    #[test]
    fn overall_scaling_never_exceeds_unity_gain() {
        let filter = WienerFilter::new();
        for after in [1.0, 30.0, 90.0, 100.0] {
            let scale = filter.compute_overall_scaling_factor(&MODERATE, 300, 1.0, 100.0, after);
            let gain = (after / 101.0_f32).sqrt();
            assert!(scale * gain <= 1.0 + 1e-6, "scale {scale} for gain {gain}");
        }
    }
}
