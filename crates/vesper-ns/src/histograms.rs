//! Feature histograms gathered between prior-model updates.

use derive_more::Debug;

use crate::config::{BIN_SIZE_LRT, BIN_SIZE_SPEC_DIFF, BIN_SIZE_SPEC_FLAT};
use crate::signal_model::SignalModel;

pub(crate) const HISTOGRAM_SIZE: usize = 1000;

#[derive(Debug, Clone)]
pub(crate) struct Histograms {
    #[debug(skip)]
    pub(crate) lrt: [i32; HISTOGRAM_SIZE],
    #[debug(skip)]
    pub(crate) spectral_flatness: [i32; HISTOGRAM_SIZE],
    #[debug(skip)]
    pub(crate) spectral_diff: [i32; HISTOGRAM_SIZE],
}

/// Counts `value` into `histogram` if it falls inside its range.
fn accumulate(histogram: &mut [i32; HISTOGRAM_SIZE], bin_size: f32, value: f32) {
    if (0.0..HISTOGRAM_SIZE as f32 * bin_size).contains(&value) {
        let bin = ((value / bin_size) as usize).min(HISTOGRAM_SIZE - 1);
        histogram[bin] += 1;
    }
}

impl Histograms {
    pub(crate) fn new() -> Self {
        Self {
            lrt: [0; HISTOGRAM_SIZE],
            spectral_flatness: [0; HISTOGRAM_SIZE],
            spectral_diff: [0; HISTOGRAM_SIZE],
        }
    }

    pub(crate) fn clear(&mut self) {
        self.lrt.fill(0);
        self.spectral_flatness.fill(0);
        self.spectral_diff.fill(0);
    }

    pub(crate) fn update(&mut self, features: &SignalModel) {
        accumulate(&mut self.lrt, BIN_SIZE_LRT, features.lrt);
        accumulate(
            &mut self.spectral_flatness,
            BIN_SIZE_SPEC_FLAT,
            features.spectral_flatness,
        );
        accumulate(
            &mut self.spectral_diff,
            BIN_SIZE_SPEC_DIFF,
            features.spectral_diff,
        );
    }
}
