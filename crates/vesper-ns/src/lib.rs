#![doc = include_str!("../README.md")]

pub mod config;
pub(crate) mod histograms;
pub(crate) mod noise_estimator;
pub mod noise_suppressor;
pub(crate) mod ns_fft;
pub(crate) mod quantile_noise_estimator;
pub(crate) mod signal_model;
pub(crate) mod signal_model_estimator;
pub(crate) mod speech_probability_estimator;
pub mod suppression_params;
pub(crate) mod wiener_filter;

pub use config::{NS_FRAME_SIZE, NsConfig, SuppressionLevel};
pub use noise_suppressor::{NoiseSuppressor, NsError, Phase};
pub use suppression_params::SuppressionParams;
