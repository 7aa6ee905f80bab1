//! Noise floor tracking by running log-spectrum quantiles.
//!
//! Three trackers estimate the lower quartile of every bin's log magnitude.
//! Their windows are staggered by a third of [`LONG_STARTUP_PHASE_BLOCKS`],
//! and whenever one completes a window its estimate becomes the published
//! noise spectrum. Until the first window completes, the most advanced
//! tracker is published every frame.

use core::array;

use derive_more::Debug;

use crate::config::{FFT_SIZE_BY_2_PLUS_1, LONG_STARTUP_PHASE_BLOCKS};

const SIMULT: usize = 3;
const DENSITY_WIDTH: f32 = 0.01;

#[derive(Debug, Clone, Copy)]
struct Tracker {
    #[debug(skip)]
    density: [f32; FFT_SIZE_BY_2_PLUS_1],
    #[debug(skip)]
    log_quantile: [f32; FFT_SIZE_BY_2_PLUS_1],
    counter: i32,
}

impl Tracker {
    fn update(&mut self, log_spectrum: &[f32; FFT_SIZE_BY_2_PLUS_1]) {
        let one_by_counter_plus_1 = 1.0 / (self.counter as f32 + 1.0);
        let counter = self.counter as f32;
        for ((&log_spec, quantile), density) in log_spectrum
            .iter()
            .zip(self.log_quantile.iter_mut())
            .zip(self.density.iter_mut())
        {
            let delta = if *density > 1.0 { 40.0 / *density } else { 40.0 };
            let step = delta * one_by_counter_plus_1;
            // Asymmetric steps converge on the 25th percentile.
            if log_spec > *quantile {
                *quantile += 0.25 * step;
            } else {
                *quantile -= 0.75 * step;
            }

            if (log_spec - *quantile).abs() < DENSITY_WIDTH {
                *density =
                    (counter * *density + 1.0 / (2.0 * DENSITY_WIDTH)) * one_by_counter_plus_1;
            }
        }
    }
}

#[derive(Debug)]
pub(crate) struct QuantileNoiseEstimator {
    trackers: [Tracker; SIMULT],
    #[debug(skip)]
    quantile: [f32; FFT_SIZE_BY_2_PLUS_1],
    num_updates: i32,
}

impl QuantileNoiseEstimator {
    pub(crate) fn new() -> Self {
        let trackers = array::from_fn(|s| Tracker {
            density: [0.3; FFT_SIZE_BY_2_PLUS_1],
            log_quantile: [8.0; FFT_SIZE_BY_2_PLUS_1],
            counter: LONG_STARTUP_PHASE_BLOCKS * (s as i32 + 1) / SIMULT as i32,
        });
        Self {
            trackers,
            quantile: [0.0; FFT_SIZE_BY_2_PLUS_1],
            num_updates: 1,
        }
    }

    /// Feeds one magnitude spectrum and writes the current noise estimate.
    pub(crate) fn estimate(
        &mut self,
        signal_spectrum: &[f32; FFT_SIZE_BY_2_PLUS_1],
        noise_spectrum: &mut [f32; FFT_SIZE_BY_2_PLUS_1],
    ) {
        let log_spectrum = signal_spectrum.map(f32::ln);

        let mut published = None;
        for (s, tracker) in self.trackers.iter_mut().enumerate() {
            tracker.update(&log_spectrum);
            if tracker.counter >= LONG_STARTUP_PHASE_BLOCKS {
                tracker.counter = 0;
                if self.num_updates >= LONG_STARTUP_PHASE_BLOCKS {
                    published = Some(s);
                }
            }
            tracker.counter += 1;
        }

        if self.num_updates < LONG_STARTUP_PHASE_BLOCKS {
            published = Some(SIMULT - 1);
            self.num_updates += 1;
        }

        if let Some(s) = published {
            self.quantile = self.trackers[s].log_quantile.map(f32::exp);
        }
        *noise_spectrum = self.quantile;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trackers_start_staggered() {
        let estimator = QuantileNoiseEstimator::new();
        let counters: Vec<i32> = estimator.trackers.iter().map(|t| t.counter).collect();
        assert_eq!(counters, [66, 133, 200]);
    }

    #[test]
    fn first_estimate_is_published_immediately() {
        let mut estimator = QuantileNoiseEstimator::new();
        let mut noise = [0.0; FFT_SIZE_BY_2_PLUS_1];
        estimator.estimate(&[1.0; FFT_SIZE_BY_2_PLUS_1], &mut noise);
        assert!(noise.iter().all(|&n| n > 0.0));
    }

    #[test]
    fn converges_on_a_stationary_level() {
        let mut estimator = QuantileNoiseEstimator::new();
        let mut noise = [0.0; FFT_SIZE_BY_2_PLUS_1];
        for _ in 0..300 {
            estimator.estimate(&[10.0; FFT_SIZE_BY_2_PLUS_1], &mut noise);
        }
        for &n in &noise {
            assert!((n - 10.0).abs() < 5.0, "estimate {n}");
        }
    }

    #[test]
    fn ignores_sparse_loud_frames() {
        let mut estimator = QuantileNoiseEstimator::new();
        let mut noise = [0.0; FFT_SIZE_BY_2_PLUS_1];
        for frame in 0..400 {
            let level = if frame % 4 == 0 { 100.0 } else { 1.0 };
            estimator.estimate(&[level; FFT_SIZE_BY_2_PLUS_1], &mut noise);
        }
        let mean = noise.iter().sum::<f32>() / noise.len() as f32;
        assert!(mean < 50.0, "mean estimate {mean}");
    }
}
