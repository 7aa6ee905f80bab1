//! Pluggable echo control on the lowest band.
//!
//! The pipeline hands every render frame (mono, lowest band) to
//! [`EchoControl::analyze_render`] before the next capture frame, then lets
//! [`EchoControl::process_capture`] remove the echo from the lowest capture
//! band of every channel. The built-in [`NlmsEchoCanceller`] is a time-domain
//! normalized least-mean-squares filter; a different implementation can be
//! installed with
//! [`AudioProcessingBuilder::echo_control_factory()`](crate::AudioProcessingBuilder::echo_control_factory).

use core::fmt;

use derive_more::Debug;
use tracing::debug;

use crate::audio_processing::Error;
use crate::three_band_filter_bank::SPLIT_BAND_SIZE;

/// Echo removal stage working on 10 ms frames of the lowest 16 kHz band.
pub trait EchoControl: Send + fmt::Debug {
    /// Records one render (loudspeaker) frame.
    fn analyze_render(&mut self, render: &[f32; SPLIT_BAND_SIZE]);

    /// Removes echo from the lowest band of every capture channel in place.
    ///
    /// An error aborts the capture frame; the pipeline reports it as
    /// [`Error::InternalStageFailure`] and leaves the caller's output
    /// untouched.
    fn process_capture(&mut self, capture: &mut [[f32; SPLIT_BAND_SIZE]]) -> Result<(), Error>;

    /// Render-to-capture delay hint in milliseconds, passed before every
    /// capture frame. See
    /// [`AudioProcessing::set_stream_delay_ms()`](crate::AudioProcessing::set_stream_delay_ms).
    fn set_audio_buffer_delay(&mut self, _delay_ms: i32) {}

    /// Echo return loss enhancement in dB, if the stage measures it.
    fn echo_return_loss_enhancement(&self) -> Option<f64> {
        None
    }
}

/// Creates an [`EchoControl`] whenever the pipeline (re)initializes its
/// capture path.
pub trait EchoControlFactory: Send + fmt::Debug {
    fn create(&self, num_capture_channels: usize) -> Box<dyn EchoControl>;
}

/// Factory for the built-in [`NlmsEchoCanceller`].
#[derive(Debug, Clone, Copy, Default)]
pub struct NlmsEchoCancellerFactory;

impl EchoControlFactory for NlmsEchoCancellerFactory {
    fn create(&self, num_capture_channels: usize) -> Box<dyn EchoControl> {
        Box::new(NlmsEchoCanceller::new(num_capture_channels))
    }
}

/// Filter length in samples (32 ms at 16 kHz).
pub const NLMS_TAPS: usize = 512;
/// Adaptation step size.
const STEP_SIZE: f32 = 0.3;
/// Added to the regressor energy; keeps the step bounded for quiet render.
const REGULARIZATION: f32 = NLMS_TAPS as f32 * 100.0;
/// Frame energy below which the render signal counts as silent.
const RENDER_ACTIVITY_THRESHOLD: f32 = SPLIT_BAND_SIZE as f32 * 100.0;
const ERLE_SMOOTHING: f32 = 0.05;

/// Time-domain NLMS echo canceller, one adaptive filter per capture channel.
///
/// Capture frames without a new render frame are treated as silent render,
/// so a stalled render stream never replays stale echo estimates. The filter
/// adapts to the echo path on its own and ignores the stream delay hint.
#[derive(Debug)]
pub struct NlmsEchoCanceller {
    /// `NLMS_TAPS - 1` samples of history followed by the latest frame.
    #[debug(skip)]
    render_history: Vec<f32>,
    render_pending: bool,
    render_active: bool,
    #[debug(skip)]
    weights: Vec<Vec<f32>>,
    capture_energy: f32,
    output_energy: f32,
}

impl NlmsEchoCanceller {
    pub fn new(num_capture_channels: usize) -> Self {
        debug!(num_capture_channels, taps = NLMS_TAPS, "created NLMS echo canceller");
        Self {
            render_history: vec![0.0; NLMS_TAPS - 1 + SPLIT_BAND_SIZE],
            render_pending: false,
            render_active: false,
            weights: vec![vec![0.0; NLMS_TAPS]; num_capture_channels],
            capture_energy: 0.0,
            output_energy: 0.0,
        }
    }

    fn push_render(&mut self, render: &[f32; SPLIT_BAND_SIZE]) {
        self.render_history.copy_within(SPLIT_BAND_SIZE.., 0);
        let start = self.render_history.len() - SPLIT_BAND_SIZE;
        self.render_history[start..].copy_from_slice(render);
        self.render_active = render.iter().map(|v| v * v).sum::<f32>() > RENDER_ACTIVITY_THRESHOLD;
    }
}

impl EchoControl for NlmsEchoCanceller {
    fn analyze_render(&mut self, render: &[f32; SPLIT_BAND_SIZE]) {
        self.push_render(render);
        self.render_pending = true;
    }

    fn process_capture(&mut self, capture: &mut [[f32; SPLIT_BAND_SIZE]]) -> Result<(), Error> {
        if capture.len() != self.weights.len() {
            return Err(Error::BadNumberChannels);
        }
        if !self.render_pending {
            self.push_render(&[0.0; SPLIT_BAND_SIZE]);
        }
        self.render_pending = false;

        let mut capture_energy = 0.0;
        let mut output_energy = 0.0;
        for (weights, channel) in self.weights.iter_mut().zip(capture.iter_mut()) {
            let mut energy: f32 = self.render_history[..NLMS_TAPS]
                .iter()
                .map(|v| v * v)
                .sum();
            for (n, sample) in channel.iter_mut().enumerate() {
                let regressor = &self.render_history[n..n + NLMS_TAPS];
                if n > 0 {
                    let oldest = self.render_history[n - 1];
                    let newest = regressor[NLMS_TAPS - 1];
                    energy = (energy - oldest * oldest + newest * newest).max(0.0);
                }

                let estimate: f32 = weights.iter().zip(regressor).map(|(w, x)| w * x).sum();
                let error = *sample - estimate;
                let step = STEP_SIZE * error / (energy + REGULARIZATION);
                for (w, &x) in weights.iter_mut().zip(regressor) {
                    *w += step * x;
                }

                capture_energy += *sample * *sample;
                output_energy += error * error;
                *sample = error;
            }
        }

        if self.render_active {
            self.capture_energy += ERLE_SMOOTHING * (capture_energy - self.capture_energy);
            self.output_energy += ERLE_SMOOTHING * (output_energy - self.output_energy);
        }
        Ok(())
    }

    fn echo_return_loss_enhancement(&self) -> Option<f64> {
        if self.capture_energy <= 0.0 {
            return None;
        }
        Some(10.0 * f64::from((self.capture_energy + 1.0) / (self.output_energy + 1.0)).log10())
    }
}
