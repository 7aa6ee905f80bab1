//! Speech/noise feature models.

use derive_more::Debug;

use crate::config::{FFT_SIZE_BY_2_PLUS_1, LRT_FEATURE_THR};

/// Features extracted from the recent signal.
#[derive(Debug, Clone)]
pub(crate) struct SignalModel {
    /// Average log-likelihood ratio over all bins.
    pub(crate) lrt: f32,
    pub(crate) spectral_diff: f32,
    pub(crate) spectral_flatness: f32,
    #[debug(skip)]
    pub(crate) avg_log_lrt: [f32; FFT_SIZE_BY_2_PLUS_1],
}

impl SignalModel {
    pub(crate) fn new() -> Self {
        Self {
            lrt: LRT_FEATURE_THR,
            spectral_diff: 0.5,
            spectral_flatness: 0.5,
            avg_log_lrt: [LRT_FEATURE_THR; FFT_SIZE_BY_2_PLUS_1],
        }
    }
}

/// Thresholds and weights that map the features to a prior speech
/// probability, re-estimated from feature histograms.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct PriorSignalModel {
    pub(crate) lrt: f32,
    pub(crate) flatness_threshold: f32,
    pub(crate) template_diff_threshold: f32,
    pub(crate) lrt_weighting: f32,
    pub(crate) flatness_weighting: f32,
    pub(crate) difference_weighting: f32,
}

impl PriorSignalModel {
    pub(crate) fn new(lrt: f32) -> Self {
        Self {
            lrt,
            flatness_threshold: 0.5,
            template_diff_threshold: 0.5,
            lrt_weighting: 1.0,
            flatness_weighting: 0.0,
            difference_weighting: 0.0,
        }
    }
}
