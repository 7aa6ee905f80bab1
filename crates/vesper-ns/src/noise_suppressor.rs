//! Two-phase noise suppressor.
//!
//! Each 10 ms frame is first analyzed, which stages the unmodified signal
//! for the noise and speech models, and then processed, which updates the
//! models and applies the resulting Wiener gains. The two calls may receive different buffers: the
//! pipeline analyzes the band before echo removal and processes it after.
//!
//! Analysis and synthesis use 256-sample windows over the current frame and
//! the last 96 samples of the previous one, so processed output lags the
//! input by [`OVERLAP_SIZE`] samples.

use core::array;
use core::borrow::{Borrow, BorrowMut};
use core::f32::consts::PI;
use core::fmt;

use derive_more::Debug;
use tracing::debug;

use crate::config::{
    FFT_SIZE, FFT_SIZE_BY_2_PLUS_1, NS_FRAME_SIZE, NsConfig, OVERLAP_SIZE, SuppressionLevel,
};
use crate::noise_estimator::NoiseEstimator;
use crate::ns_fft::NsFft;
use crate::speech_probability_estimator::{SignalAnalysis, SpeechProbabilityEstimator};
use crate::suppression_params::SuppressionParams;
use crate::wiener_filter::WienerFilter;

/// Most bands above the lowest one that [`NoiseSuppressor::process_upper_bands`]
/// accepts per channel.
pub const MAX_UPPER_BANDS: usize = 2;

/// Bins at the top of the lowest band averaged for the upper-band gain.
const NUM_AVG_BINS: usize = 32;

/// Where the suppressor is in the analyze/process cycle of the current frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Nothing analyzed since construction.
    Unanalyzed,
    /// A frame was analyzed and may be processed.
    Analyzed,
    /// The analyzed frame was processed; the next frame must be analyzed.
    Processed,
}

/// Errors reported by [`NoiseSuppressor`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NsError {
    /// The number of channel buffers differs from the construction count.
    ChannelMismatch { expected: usize, actual: usize },
    /// `process` was called without a preceding `analyze` for this frame,
    /// or upper bands were processed before the lowest band.
    SequenceViolation { phase: Phase },
    /// More upper bands were supplied than [`MAX_UPPER_BANDS`].
    TooManyBands { max: usize, actual: usize },
}

impl fmt::Display for NsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Self::ChannelMismatch { expected, actual } => {
                write!(f, "expected {expected} channels, got {actual}")
            }
            Self::SequenceViolation { phase } => {
                write!(f, "call out of sequence in phase {phase:?}")
            }
            Self::TooManyBands { max, actual } => {
                write!(f, "at most {max} upper bands are supported, got {actual}")
            }
        }
    }
}

impl std::error::Error for NsError {}

/// Rising half of the hybrid Hann window spanning the overlap.
fn window_first_half() -> [f32; OVERLAP_SIZE] {
    array::from_fn(|i| (PI * i as f32 / (2 * OVERLAP_SIZE) as f32).sin())
}

/// Tapers both ends of a 256-sample window; samples `96..=160` stay unscaled.
fn apply_window(first_half: &[f32; OVERLAP_SIZE], x: &mut [f32; FFT_SIZE]) {
    for (v, &w) in x[..OVERLAP_SIZE].iter_mut().zip(first_half) {
        *v *= w;
    }
    for (v, &w) in x[NS_FRAME_SIZE + 1..].iter_mut().zip(first_half.iter().rev()) {
        *v *= w;
    }
}

/// Prepends `memory` to `frame` and keeps the newest samples as the next memory.
fn form_extended_frame(
    frame: &[f32; NS_FRAME_SIZE],
    memory: &mut [f32; OVERLAP_SIZE],
    extended: &mut [f32; FFT_SIZE],
) {
    extended[..OVERLAP_SIZE].copy_from_slice(memory);
    extended[OVERLAP_SIZE..].copy_from_slice(frame);
    memory.copy_from_slice(&extended[NS_FRAME_SIZE..]);
}

fn overlap_and_add(
    extended: &[f32; FFT_SIZE],
    memory: &mut [f32; OVERLAP_SIZE],
    output: &mut [f32; NS_FRAME_SIZE],
) {
    for ((out, &m), &x) in output.iter_mut().zip(memory.iter()).zip(extended.iter()) {
        *out = m + x;
    }
    output[OVERLAP_SIZE..].copy_from_slice(&extended[OVERLAP_SIZE..NS_FRAME_SIZE]);
    memory.copy_from_slice(&extended[NS_FRAME_SIZE..]);
}

/// Magnitude spectrum offset by one so that every bin is strictly positive.
fn magnitude_spectrum(
    real: &[f32; FFT_SIZE_BY_2_PLUS_1],
    imag: &[f32; FFT_SIZE_BY_2_PLUS_1],
) -> [f32; FFT_SIZE_BY_2_PLUS_1] {
    array::from_fn(|k| (real[k] * real[k] + imag[k] * imag[k]).sqrt() + 1.0)
}

fn energy(x: &[f32]) -> f32 {
    x.iter().map(|&v| v * v).sum()
}

/// Gain for the bands above the lowest, derived from the speech probability
/// and the Wiener gains at the top of the lowest band.
fn upper_bands_gain(
    params: &SuppressionParams,
    filter: &[f32; FFT_SIZE_BY_2_PLUS_1],
    speech_probability: &[f32; FFT_SIZE_BY_2_PLUS_1],
    analysis_spectrum: &[f32; FFT_SIZE_BY_2_PLUS_1],
    processing_spectrum: &[f32; FFT_SIZE_BY_2_PLUS_1],
) -> f32 {
    let top = FFT_SIZE_BY_2_PLUS_1 - NUM_AVG_BINS - 1..FFT_SIZE_BY_2_PLUS_1 - 1;
    let mut avg_prob_speech = speech_probability[top.clone()].iter().sum::<f32>();
    let avg_filter_gain = filter[top].iter().sum::<f32>() / NUM_AVG_BINS as f32;
    avg_prob_speech /= NUM_AVG_BINS as f32;

    // Speech removed between analysis and processing, e.g. by echo control,
    // no longer counts as speech.
    avg_prob_speech *=
        processing_spectrum.iter().sum::<f32>() / analysis_spectrum.iter().sum::<f32>();

    let gain = 0.5 * (1.0 + (2.0 * avg_prob_speech - 1.0).tanh());
    let gain = if avg_prob_speech >= 0.5 {
        0.25 * gain + 0.75 * avg_filter_gain
    } else {
        0.5 * gain + 0.5 * avg_filter_gain
    };
    gain.clamp(params.minimum_attenuating_gain, 1.0)
}

#[derive(Debug)]
struct ChannelState {
    speech_probability_estimator: SpeechProbabilityEstimator,
    wiener_filter: WienerFilter,
    noise_estimator: NoiseEstimator,
    #[debug(skip)]
    prev_analysis_signal_spectrum: [f32; FFT_SIZE_BY_2_PLUS_1],
    #[debug(skip)]
    analyze_analysis_memory: [f32; OVERLAP_SIZE],
    #[debug(skip)]
    process_analysis_memory: [f32; OVERLAP_SIZE],
    #[debug(skip)]
    process_synthesis_memory: [f32; OVERLAP_SIZE],
    #[debug(skip)]
    upper_bands_delay: [[f32; OVERLAP_SIZE]; MAX_UPPER_BANDS],
    upper_bands_gain: f32,
    /// Frame staged by the latest `analyze`.
    #[debug(skip)]
    pending_frame: [f32; NS_FRAME_SIZE],
}

impl ChannelState {
    fn new() -> Self {
        Self {
            speech_probability_estimator: SpeechProbabilityEstimator::new(),
            wiener_filter: WienerFilter::new(),
            noise_estimator: NoiseEstimator::new(),
            prev_analysis_signal_spectrum: [1.0; FFT_SIZE_BY_2_PLUS_1],
            analyze_analysis_memory: [0.0; OVERLAP_SIZE],
            process_analysis_memory: [0.0; OVERLAP_SIZE],
            process_synthesis_memory: [0.0; OVERLAP_SIZE],
            upper_bands_delay: [[0.0; OVERLAP_SIZE]; MAX_UPPER_BANDS],
            upper_bands_gain: 1.0,
            pending_frame: [0.0; NS_FRAME_SIZE],
        }
    }

    fn staged_energy(&self) -> f32 {
        energy(&self.analyze_analysis_memory) + energy(&self.pending_frame)
    }
}

/// Multi-channel noise suppressor for 160-sample frames at 16 kHz.
///
/// # Example
///
/// ```
/// use vesper_ns::{NoiseSuppressor, NsConfig, NsError, Phase};
///
/// let mut ns = NoiseSuppressor::new(NsConfig::default(), 1);
/// let mut frame = [0.0_f32; 160];
///
/// assert_eq!(
///     ns.process(&mut [&mut frame]),
///     Err(NsError::SequenceViolation { phase: Phase::Unanalyzed }),
/// );
///
/// ns.analyze(&[&frame]).unwrap();
/// ns.process(&mut [&mut frame]).unwrap();
/// assert_eq!(ns.phase(), Phase::Processed);
/// ```
#[derive(Debug)]
pub struct NoiseSuppressor {
    num_analyzed_frames: i32,
    level: SuppressionLevel,
    /// Parameters snapshotted by the latest `analyze`.
    analyzed_params: SuppressionParams,
    phase: Phase,
    upper_bands_processed: bool,
    fft: NsFft,
    #[debug(skip)]
    window: [f32; OVERLAP_SIZE],
    channels: Vec<ChannelState>,
}

impl NoiseSuppressor {
    pub fn new(config: NsConfig, num_channels: usize) -> Self {
        debug!(
            num_channels,
            level = ?config.target_level,
            "creating noise suppressor"
        );
        Self {
            num_analyzed_frames: -1,
            level: config.target_level,
            analyzed_params: SuppressionParams::for_level(config.target_level),
            phase: Phase::Unanalyzed,
            upper_bands_processed: false,
            fft: NsFft::new(),
            window: window_first_half(),
            channels: (0..num_channels).map(|_| ChannelState::new()).collect(),
        }
    }

    pub fn num_channels(&self) -> usize {
        self.channels.len()
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn suppression_level(&self) -> SuppressionLevel {
        self.level
    }

    /// Changes the level used from the next [`analyze`](Self::analyze) on.
    /// A frame that is already analyzed keeps the level it was analyzed with.
    pub fn set_suppression_level(&mut self, level: SuppressionLevel) {
        self.level = level;
    }

    /// Prior speech probability of the first channel as of the latest
    /// processed frame, in `[0.01, 1]`.
    pub fn speech_probability(&self) -> f32 {
        self.channels
            .first()
            .map_or(0.0, |ch| ch.speech_probability_estimator.prior_probability())
    }

    /// Stages one frame per channel for analysis.
    ///
    /// The noise and speech models are updated from the staged frames when
    /// [`process`](Self::process) runs, so a second `analyze` before
    /// `process` replaces the frames and level of the first one.
    ///
    /// A silent channel (frame and analysis history all zero) leaves its
    /// models untouched; the frame still counts as an analysis.
    pub fn analyze<F: Borrow<[f32; NS_FRAME_SIZE]>>(&mut self, frames: &[F]) -> Result<(), NsError> {
        self.check_channels(frames.len())?;

        self.analyzed_params = SuppressionParams::for_level(self.level);
        for (ch, frame) in self.channels.iter_mut().zip(frames) {
            ch.pending_frame = *frame.borrow();
        }
        self.phase = Phase::Analyzed;
        Ok(())
    }

    /// Runs the model update for the frames staged by `analyze`.
    fn update_models(&mut self) {
        let params = self.analyzed_params;
        let silent = self.channels.iter().all(|ch| ch.staged_energy() == 0.0);
        if silent {
            for ch in &mut self.channels {
                ch.noise_estimator.prepare_analysis();
            }
            return;
        }
        self.num_analyzed_frames = self.num_analyzed_frames.saturating_add(1).max(0);

        for ch in &mut self.channels {
            ch.noise_estimator.prepare_analysis();
            if ch.staged_energy() == 0.0 {
                continue;
            }

            let mut extended = [0.0_f32; FFT_SIZE];
            form_extended_frame(
                &ch.pending_frame,
                &mut ch.analyze_analysis_memory,
                &mut extended,
            );
            apply_window(&self.window, &mut extended);

            let mut real = [0.0_f32; FFT_SIZE_BY_2_PLUS_1];
            let mut imag = [0.0_f32; FFT_SIZE_BY_2_PLUS_1];
            self.fft.fft(&extended, &mut real, &mut imag);
            let signal_spectrum = magnitude_spectrum(&real, &imag);

            let signal_energy = (energy(&real) + energy(&imag)) / FFT_SIZE_BY_2_PLUS_1 as f32;
            let signal_spectral_sum: f32 = signal_spectrum.iter().sum();

            ch.noise_estimator.pre_update(
                &params,
                self.num_analyzed_frames,
                &signal_spectrum,
                signal_spectral_sum,
            );

            // Decision-directed prior SNR and instantaneous posterior SNR.
            let filter = ch.wiener_filter.filter();
            let noise = ch.noise_estimator.noise_spectrum();
            let prev_noise = ch.noise_estimator.prev_noise_spectrum();
            let mut prior_snr = [0.0_f32; FFT_SIZE_BY_2_PLUS_1];
            let mut post_snr = [0.0_f32; FFT_SIZE_BY_2_PLUS_1];
            for i in 0..FFT_SIZE_BY_2_PLUS_1 {
                let prev_estimate =
                    ch.prev_analysis_signal_spectrum[i] / (prev_noise[i] + 0.0001) * filter[i];
                post_snr[i] = if signal_spectrum[i] > noise[i] {
                    signal_spectrum[i] / (noise[i] + 0.0001) - 1.0
                } else {
                    0.0
                };
                prior_snr[i] = 0.98 * prev_estimate + 0.02 * post_snr[i];
            }

            ch.speech_probability_estimator.update(&SignalAnalysis {
                num_analyzed_frames: self.num_analyzed_frames,
                prior_snr: &prior_snr,
                post_snr: &post_snr,
                conservative_noise_spectrum: ch.noise_estimator.conservative_noise_spectrum(),
                signal_spectrum: &signal_spectrum,
                signal_spectral_sum,
                signal_energy,
            });
            ch.noise_estimator
                .post_update(ch.speech_probability_estimator.probability(), &signal_spectrum);

            ch.prev_analysis_signal_spectrum = signal_spectrum;
        }
    }

    /// Suppresses noise in one frame per channel, in place.
    ///
    /// Fails with [`NsError::SequenceViolation`] unless the suppressor is in
    /// [`Phase::Analyzed`]; the frames are left untouched in that case.
    pub fn process<F: BorrowMut<[f32; NS_FRAME_SIZE]>>(
        &mut self,
        frames: &mut [F],
    ) -> Result<(), NsError> {
        if self.phase != Phase::Analyzed {
            return Err(NsError::SequenceViolation { phase: self.phase });
        }
        self.check_channels(frames.len())?;
        self.update_models();

        let params = self.analyzed_params;
        for (ch, frame) in self.channels.iter_mut().zip(frames.iter_mut()) {
            let frame = frame.borrow_mut();
            let mut extended = [0.0_f32; FFT_SIZE];
            form_extended_frame(frame, &mut ch.process_analysis_memory, &mut extended);
            apply_window(&self.window, &mut extended);
            let energy_before_filtering = energy(&extended);

            let mut real = [0.0_f32; FFT_SIZE_BY_2_PLUS_1];
            let mut imag = [0.0_f32; FFT_SIZE_BY_2_PLUS_1];
            self.fft.fft(&extended, &mut real, &mut imag);
            let signal_spectrum = magnitude_spectrum(&real, &imag);

            ch.wiener_filter.update(
                &params,
                self.num_analyzed_frames,
                ch.noise_estimator.noise_spectrum(),
                ch.noise_estimator.prev_noise_spectrum(),
                ch.noise_estimator.parametric_noise_spectrum(),
                &signal_spectrum,
            );
            let filter = ch.wiener_filter.filter();
            for ((re, im), &gain) in real.iter_mut().zip(imag.iter_mut()).zip(filter) {
                *re *= gain;
                *im *= gain;
            }

            ch.upper_bands_gain = upper_bands_gain(
                &params,
                filter,
                ch.speech_probability_estimator.probability(),
                &ch.prev_analysis_signal_spectrum,
                &signal_spectrum,
            );

            self.fft.ifft(&real, &imag, &mut extended);
            let energy_after_filtering = energy(&extended);
            apply_window(&self.window, &mut extended);

            let gain_adjustment = ch.wiener_filter.compute_overall_scaling_factor(
                &params,
                self.num_analyzed_frames,
                ch.speech_probability_estimator.prior_probability(),
                energy_before_filtering,
                energy_after_filtering,
            );
            for v in &mut extended {
                *v *= gain_adjustment;
            }

            overlap_and_add(&extended, &mut ch.process_synthesis_memory, frame);
            for v in frame.iter_mut() {
                *v = v.clamp(-32768.0, 32767.0);
            }
        }

        self.phase = Phase::Processed;
        self.upper_bands_processed = false;
        Ok(())
    }

    /// Applies the gain computed by the latest [`process`](Self::process) to
    /// the bands above the lowest, delaying them by [`OVERLAP_SIZE`] samples
    /// to stay aligned with the processed lowest band.
    ///
    /// `upper_bands[ch]` holds the upper bands of channel `ch`. Only one
    /// call is accepted per processed frame.
    pub fn process_upper_bands<B: BorrowMut<[[f32; NS_FRAME_SIZE]]>>(
        &mut self,
        upper_bands: &mut [B],
    ) -> Result<(), NsError> {
        if self.phase != Phase::Processed || self.upper_bands_processed {
            return Err(NsError::SequenceViolation { phase: self.phase });
        }
        self.check_channels(upper_bands.len())?;
        if let Some(actual) = upper_bands
            .iter()
            .map(|bands| bands.borrow().len())
            .find(|&len| len > MAX_UPPER_BANDS)
        {
            return Err(NsError::TooManyBands {
                max: MAX_UPPER_BANDS,
                actual,
            });
        }

        for (ch, bands) in self.channels.iter_mut().zip(upper_bands.iter_mut()) {
            let bands = bands.borrow_mut();
            for (band, delay) in bands.iter_mut().zip(ch.upper_bands_delay.iter_mut()) {
                let mut delayed = [0.0_f32; NS_FRAME_SIZE];
                delayed[..OVERLAP_SIZE].copy_from_slice(delay);
                delayed[OVERLAP_SIZE..].copy_from_slice(&band[..NS_FRAME_SIZE - OVERLAP_SIZE]);
                delay.copy_from_slice(&band[NS_FRAME_SIZE - OVERLAP_SIZE..]);
                for (out, &v) in band.iter_mut().zip(&delayed) {
                    *out = (v * ch.upper_bands_gain).clamp(-32768.0, 32767.0);
                }
            }
        }
        self.upper_bands_processed = true;
        Ok(())
    }

    fn check_channels(&self, actual: usize) -> Result<(), NsError> {
        if actual != self.channels.len() {
            return Err(NsError::ChannelMismatch {
                expected: self.channels.len(),
                actual,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use core::f32::consts::FRAC_1_SQRT_2;

    use super::*;

    fn noise_frame(seed: &mut u32) -> [f32; NS_FRAME_SIZE] {
        array::from_fn(|_| {
            *seed = seed.wrapping_mul(1_664_525).wrapping_add(1_013_904_223);
            ((*seed >> 8) as f32 / (1 << 24) as f32 - 0.5) * 2000.0
        })
    }

    #[test]
    fn window_matches_the_hybrid_hann_taper() {
        let window = window_first_half();
        assert_eq!(window[0], 0.0);
        assert!((window[32] - 0.5).abs() < 1e-6);
        assert!((window[48] - FRAC_1_SQRT_2).abs() < 1e-6);
        assert!((window[95] - 0.999_866_1).abs() < 1e-6);
    }

    #[test]
    fn window_leaves_the_middle_untouched() {
        let mut x = [1.0; FFT_SIZE];
        apply_window(&window_first_half(), &mut x);
        assert!(x[OVERLAP_SIZE..=NS_FRAME_SIZE].iter().all(|&v| v == 1.0));
        assert!(x[FFT_SIZE - 1] < 0.05);
    }

    #[test]
    fn process_before_analyze_is_rejected() {
        let mut ns = NoiseSuppressor::new(NsConfig::default(), 1);
        let mut frame = [7.0; NS_FRAME_SIZE];
        assert_eq!(
            ns.process(&mut [&mut frame]),
            Err(NsError::SequenceViolation {
                phase: Phase::Unanalyzed
            })
        );
        assert_eq!(frame, [7.0; NS_FRAME_SIZE]);
    }

    #[test]
    fn second_process_needs_a_new_analyze() {
        let mut ns = NoiseSuppressor::new(NsConfig::default(), 1);
        let mut seed = 1;
        let mut frame = noise_frame(&mut seed);
        ns.analyze(&[&frame]).unwrap();
        ns.process(&mut [&mut frame]).unwrap();

        let before = frame;
        assert_eq!(
            ns.process(&mut [&mut frame]),
            Err(NsError::SequenceViolation {
                phase: Phase::Processed
            })
        );
        assert_eq!(frame, before);

        ns.analyze(&[&frame]).unwrap();
        ns.process(&mut [&mut frame]).unwrap();
    }

    #[test]
    fn repeated_analyze_is_allowed() {
        let mut ns = NoiseSuppressor::new(NsConfig::default(), 1);
        let mut seed = 3;
        let mut frame = noise_frame(&mut seed);
        ns.analyze(&[&frame]).unwrap();
        ns.analyze(&[&frame]).unwrap();
        assert_eq!(ns.phase(), Phase::Analyzed);
        ns.process(&mut [&mut frame]).unwrap();
    }

    #[test]
    fn second_analyze_replaces_the_first() {
        let mut seed = 13;
        let history: Vec<_> = (0..50).map(|_| noise_frame(&mut seed)).collect();
        let discarded = noise_frame(&mut seed);
        let kept = noise_frame(&mut seed);
        let input = noise_frame(&mut seed);

        let mut twice = NoiseSuppressor::new(NsConfig::default(), 1);
        let mut once = NoiseSuppressor::new(NsConfig::default(), 1);
        for frame in &history {
            for ns in [&mut twice, &mut once] {
                let mut out = *frame;
                ns.analyze(&[frame]).unwrap();
                ns.process(&mut [&mut out]).unwrap();
            }
        }

        twice.set_suppression_level(SuppressionLevel::K6dB);
        twice.analyze(&[&discarded]).unwrap();
        twice.set_suppression_level(SuppressionLevel::K12dB);
        twice.analyze(&[&kept]).unwrap();
        once.analyze(&[&kept]).unwrap();

        let mut a = input;
        let mut b = input;
        twice.process(&mut [&mut a]).unwrap();
        once.process(&mut [&mut b]).unwrap();
        assert_eq!(a, b);
        assert_eq!(twice.num_analyzed_frames, once.num_analyzed_frames);
        assert_eq!(twice.speech_probability(), once.speech_probability());
    }

    #[test]
    fn channel_count_is_checked() {
        let mut ns = NoiseSuppressor::new(NsConfig::default(), 2);
        let frame = [0.0; NS_FRAME_SIZE];
        assert_eq!(
            ns.analyze(&[&frame]),
            Err(NsError::ChannelMismatch {
                expected: 2,
                actual: 1
            })
        );
        assert_eq!(ns.phase(), Phase::Unanalyzed);
    }

    #[test]
    fn silent_analysis_still_counts() {
        let mut ns = NoiseSuppressor::new(NsConfig::default(), 1);
        let mut frame = [0.0; NS_FRAME_SIZE];
        ns.analyze(&[&frame]).unwrap();
        assert_eq!(ns.num_analyzed_frames, -1);
        assert_eq!(ns.phase(), Phase::Analyzed);
        ns.process(&mut [&mut frame]).unwrap();
        assert!(frame.iter().all(|&v| v.abs() < 1e-3));
    }

    #[test]
    fn level_is_snapshotted_at_analyze() {
        let mut seed = 11;
        let frames: Vec<_> = (0..260).map(|_| noise_frame(&mut seed)).collect();

        let mut fixed = NoiseSuppressor::new(NsConfig::default(), 1);
        let mut switched = NoiseSuppressor::new(NsConfig::default(), 1);
        for frame in &frames {
            let mut a = *frame;
            let mut b = *frame;
            fixed.analyze(&[&a]).unwrap();
            fixed.process(&mut [&mut a]).unwrap();

            switched.set_suppression_level(SuppressionLevel::K12dB);
            switched.analyze(&[&b]).unwrap();
            switched.set_suppression_level(SuppressionLevel::K21dB);
            switched.process(&mut [&mut b]).unwrap();

            assert_eq!(a, b);
        }
    }

    #[test]
    fn stationary_noise_is_attenuated() {
        let mut ns = NoiseSuppressor::new(
            NsConfig {
                target_level: SuppressionLevel::K21dB,
            },
            1,
        );
        let mut seed = 5;
        let mut input_energy = 0.0;
        let mut output_energy = 0.0;
        for i in 0..400 {
            let mut frame = noise_frame(&mut seed);
            ns.analyze(&[&frame]).unwrap();
            if i >= 300 {
                input_energy += energy(&frame);
            }
            ns.process(&mut [&mut frame]).unwrap();
            if i >= 300 {
                output_energy += energy(&frame);
            }
        }
        assert!(
            output_energy < 0.5 * input_energy,
            "output/input energy {}",
            output_energy / input_energy
        );
    }

    #[test]
    fn output_stays_in_float_s16_range() {
        let mut ns = NoiseSuppressor::new(NsConfig::default(), 1);
        for _ in 0..50 {
            let mut frame: [f32; NS_FRAME_SIZE] =
                array::from_fn(|i| if i % 2 == 0 { 32767.0 } else { -32768.0 });
            ns.analyze(&[&frame]).unwrap();
            ns.process(&mut [&mut frame]).unwrap();
            assert!(frame.iter().all(|v| (-32768.0..=32767.0).contains(v)));
        }
    }

    #[test]
    fn upper_bands_are_delayed_and_scaled() {
        let mut ns = NoiseSuppressor::new(NsConfig::default(), 1);
        let mut seed = 9;
        let mut low = noise_frame(&mut seed);
        let mut upper = [[100.0_f32; NS_FRAME_SIZE]; 2];

        assert!(matches!(
            ns.process_upper_bands(&mut [&mut upper[..]]),
            Err(NsError::SequenceViolation { .. })
        ));

        ns.analyze(&[&low]).unwrap();
        ns.process(&mut [&mut low]).unwrap();

        let mut too_many = [[0.0_f32; NS_FRAME_SIZE]; 3];
        assert_eq!(
            ns.process_upper_bands(&mut [&mut too_many[..]]),
            Err(NsError::TooManyBands { max: 2, actual: 3 })
        );

        ns.process_upper_bands(&mut [&mut upper[..]]).unwrap();

        let gain = upper[0][OVERLAP_SIZE] / 100.0;
        assert!((0.25..=1.0).contains(&gain), "gain {gain}");
        for band in &upper {
            assert!(band[..OVERLAP_SIZE].iter().all(|&v| v == 0.0));
            assert!(band[OVERLAP_SIZE..].iter().all(|&v| (v - 100.0 * gain).abs() < 1e-3));
        }
    }

    #[test]
    fn upper_bands_run_once_per_frame() {
        let mut ns = NoiseSuppressor::new(NsConfig::default(), 1);
        let mut seed = 17;
        let mut low = noise_frame(&mut seed);
        let mut upper = [[100.0_f32; NS_FRAME_SIZE]; 1];

        ns.analyze(&[&low]).unwrap();
        ns.process(&mut [&mut low]).unwrap();
        ns.process_upper_bands(&mut [&mut upper[..]]).unwrap();

        let once = upper;
        assert_eq!(
            ns.process_upper_bands(&mut [&mut upper[..]]),
            Err(NsError::SequenceViolation {
                phase: Phase::Processed
            })
        );
        assert_eq!(upper, once);

        ns.analyze(&[&low]).unwrap();
        ns.process(&mut [&mut low]).unwrap();
        ns.process_upper_bands(&mut [&mut upper[..]]).unwrap();
    }
}
