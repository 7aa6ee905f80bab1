//! Public audio processing API.
//!
//! Provides the user-facing [`AudioProcessing`] struct and
//! [`AudioProcessingBuilder`] for constructing configured instances.

use core::fmt;

use crate::audio_processing_impl::AudioProcessingImpl;
use crate::config::{Config, RuntimeSetting};
use crate::echo_control::{EchoControlFactory, NlmsEchoCancellerFactory};
use crate::stats::AudioProcessingStats;
use crate::stream_config::StreamConfig;

/// Errors returned by audio processing operations.
///
/// Every error is reported by the call that caused it. A failed processing
/// call never writes to its destination buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// The pipeline could not be built from the given configuration.
    ConstructionFailure,
    /// Sample rate outside `8000..=384000` or not divisible by 100.
    BadSampleRate,
    /// Zero channels, a slice count that differs from the stream config, or
    /// an unsupported input/output channel combination.
    BadNumberChannels,
    /// A buffer length differs from the length the stream config implies.
    InvalidFrameSize { expected: usize, actual: usize },
    /// A two-phase stage was driven out of order.
    SequenceViolation,
    /// An enabled stage failed to process the frame.
    InternalStageFailure { stage: &'static str },
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ConstructionFailure => write!(f, "pipeline construction failed"),
            Self::BadSampleRate => write!(f, "bad sample rate"),
            Self::BadNumberChannels => write!(f, "bad number of channels"),
            Self::InvalidFrameSize { expected, actual } => {
                write!(f, "invalid frame size: expected {expected} samples, got {actual}")
            }
            Self::SequenceViolation => write!(f, "processing stage called out of sequence"),
            Self::InternalStageFailure { stage } => write!(f, "{stage} stage failed"),
        }
    }
}

impl std::error::Error for Error {}

/// Builder for constructing an [`AudioProcessing`] instance.
///
/// # Example
///
/// ```
/// use vesper::{AudioProcessing, Config, StreamConfig};
/// use vesper::config::NoiseSuppression;
///
/// let apm = AudioProcessing::builder()
///     .config(Config {
///         noise_suppression: Some(NoiseSuppression::default()),
///         ..Default::default()
///     })
///     .capture_config(StreamConfig::new(48000, 1))
///     .render_config(StreamConfig::new(48000, 1))
///     .build()
///     .unwrap();
/// assert!(apm.config().noise_suppression.is_some());
/// ```
#[derive(Debug)]
pub struct AudioProcessingBuilder {
    config: Config,
    capture_config: StreamConfig,
    render_config: StreamConfig,
    echo_control_factory: Box<dyn EchoControlFactory>,
}

impl AudioProcessingBuilder {
    fn new() -> Self {
        Self {
            config: Config::default(),
            capture_config: StreamConfig::new(16000, 1),
            render_config: StreamConfig::new(16000, 1),
            echo_control_factory: Box::new(NlmsEchoCancellerFactory),
        }
    }

    /// Sets the initial configuration.
    pub fn config(mut self, config: Config) -> Self {
        self.config = config;
        self
    }

    /// Sets the stream format used by
    /// [`AudioProcessing::process_capture_f32`] (input and output).
    pub fn capture_config(mut self, config: StreamConfig) -> Self {
        self.capture_config = config;
        self
    }

    /// Sets the stream format used by
    /// [`AudioProcessing::process_render_f32`] (input and output).
    pub fn render_config(mut self, config: StreamConfig) -> Self {
        self.render_config = config;
        self
    }

    /// Replaces the built-in NLMS echo canceller.
    pub fn echo_control_factory(mut self, factory: impl EchoControlFactory + 'static) -> Self {
        self.echo_control_factory = Box::new(factory);
        self
    }

    /// Builds the [`AudioProcessing`] instance.
    ///
    /// Fails with [`Error::ConstructionFailure`] when the configuration does
    /// not pass [`Config::validate`].
    pub fn build(self) -> Result<AudioProcessing, Error> {
        self.config.validate()?;
        Ok(AudioProcessing {
            inner: AudioProcessingImpl::new(self.config, self.echo_control_factory),
            capture_config: self.capture_config,
            render_config: self.render_config,
        })
    }
}

/// Voice enhancement pipeline: high-pass filter, echo control, noise
/// suppression and gain, run on 10 ms frames.
///
/// # Usage
///
/// 1. Create an instance via [`AudioProcessing::builder()`] or
///    [`AudioProcessing::new()`].
/// 2. For each 10 ms frame:
///    - Call [`process_reverse_stream_f32()`](AudioProcessing::process_reverse_stream_f32)
///      with the far-end (render/playback) audio.
///    - Call [`process_stream_f32()`](AudioProcessing::process_stream_f32)
///      with the near-end (capture/microphone) audio.
/// 3. Change settings via [`apply_config()`](AudioProcessing::apply_config)
///    or [`set_runtime_setting()`](AudioProcessing::set_runtime_setting);
///    both take effect with the next frame.
///
/// Both f32 (planar) and i16 (interleaved) interfaces are provided. The
/// instance is `Send` but not `Sync`; wrap it in a `Mutex` to share it.
#[derive(Debug)]
pub struct AudioProcessing {
    inner: AudioProcessingImpl,
    capture_config: StreamConfig,
    render_config: StreamConfig,
}

impl AudioProcessing {
    /// Creates an instance with the default configuration (every stage
    /// disabled).
    pub fn new() -> Self {
        Self {
            inner: AudioProcessingImpl::new(Config::default(), Box::new(NlmsEchoCancellerFactory)),
            capture_config: StreamConfig::new(16000, 1),
            render_config: StreamConfig::new(16000, 1),
        }
    }

    /// Returns a builder for constructing an instance with custom settings.
    pub fn builder() -> AudioProcessingBuilder {
        AudioProcessingBuilder::new()
    }

    /// Replaces the configuration, starting with the next frame.
    ///
    /// Never fails: a config rejected by [`Config::validate`] is logged and
    /// ignored, and the previous config stays active.
    pub fn apply_config(&mut self, config: Config) {
        self.inner.apply_config(config);
    }

    /// Queues a gain change for the start of the next capture frame.
    ///
    /// Settings are applied in call order after any config passed to
    /// [`apply_config()`](Self::apply_config). At most 100 settings are held
    /// between capture frames; further ones are logged and dropped.
    ///
    /// ```
    /// use vesper::{AudioProcessing, Config};
    /// use vesper::config::{CaptureLevelAdjustment, RuntimeSetting};
    ///
    /// let mut apm = AudioProcessing::builder()
    ///     .config(Config {
    ///         capture_level_adjustment: Some(CaptureLevelAdjustment::default()),
    ///         ..Default::default()
    ///     })
    ///     .build()
    ///     .unwrap();
    /// apm.set_runtime_setting(RuntimeSetting::CapturePostGain(0.5));
    /// ```
    pub fn set_runtime_setting(&mut self, setting: RuntimeSetting) {
        self.inner.set_runtime_setting(setting);
    }

    /// Sets the delay, in milliseconds, between a render frame reaching
    /// [`process_reverse_stream_f32()`](Self::process_reverse_stream_f32)
    /// and its echo reaching
    /// [`process_stream_f32()`](Self::process_stream_f32).
    ///
    /// The hint is passed to the echo stage before every capture frame.
    /// Values outside `0..=500` are clamped and logged.
    pub fn set_stream_delay_ms(&mut self, delay_ms: i32) {
        self.inner.set_stream_delay_ms(delay_ms);
    }

    /// The stream delay hint after clamping.
    pub fn stream_delay_ms(&self) -> i32 {
        self.inner.stream_delay_ms()
    }

    /// Returns the most recently applied configuration.
    pub fn config(&self) -> &Config {
        self.inner.config()
    }

    /// Returns statistics of the last capture frame.
    pub fn statistics(&self) -> AudioProcessingStats {
        self.inner.statistics()
    }

    /// The internal capture processing rate of the last capture frame.
    pub fn proc_sample_rate_hz(&self) -> Option<u32> {
        self.inner.proc_sample_rate_hz()
    }

    /// Processes a capture frame (planar f32 in `[-1.0, 1.0]`).
    ///
    /// `src` holds `input_config.num_channels()` slices of
    /// `input_config.num_frames()` samples; `dest` likewise for
    /// `output_config`. The output must have the input's channel count or
    /// one channel, unless the input is mono.
    pub fn process_stream_f32(
        &mut self,
        src: &[&[f32]],
        input_config: &StreamConfig,
        output_config: &StreamConfig,
        dest: &mut [&mut [f32]],
    ) -> Result<(), Error> {
        validate_formats(input_config, output_config)?;
        validate_planar(src.iter().map(|c| c.len()), input_config)?;
        validate_planar(dest.iter().map(|c| c.len()), output_config)?;
        self.inner
            .process_stream_f32(src, input_config, output_config, dest)
    }

    /// Processes a capture frame (interleaved i16).
    pub fn process_stream_i16(
        &mut self,
        src: &[i16],
        input_config: &StreamConfig,
        output_config: &StreamConfig,
        dest: &mut [i16],
    ) -> Result<(), Error> {
        validate_formats(input_config, output_config)?;
        validate_interleaved(src.len(), input_config)?;
        validate_interleaved(dest.len(), output_config)?;
        self.inner
            .process_stream_i16(src, input_config, output_config, dest)
    }

    /// Processes a render (far-end) frame (planar f32).
    ///
    /// The frame feeds the echo stage; `dest` receives the input converted
    /// to `output_config`.
    pub fn process_reverse_stream_f32(
        &mut self,
        src: &[&[f32]],
        input_config: &StreamConfig,
        output_config: &StreamConfig,
        dest: &mut [&mut [f32]],
    ) -> Result<(), Error> {
        validate_formats(input_config, output_config)?;
        validate_planar(src.iter().map(|c| c.len()), input_config)?;
        validate_planar(dest.iter().map(|c| c.len()), output_config)?;
        self.inner
            .process_reverse_stream_f32(src, input_config, output_config, dest)
    }

    /// Processes a render (far-end) frame (interleaved i16).
    pub fn process_reverse_stream_i16(
        &mut self,
        src: &[i16],
        input_config: &StreamConfig,
        output_config: &StreamConfig,
        dest: &mut [i16],
    ) -> Result<(), Error> {
        validate_formats(input_config, output_config)?;
        validate_interleaved(src.len(), input_config)?;
        validate_interleaved(dest.len(), output_config)?;
        self.inner
            .process_reverse_stream_i16(src, input_config, output_config, dest)
    }

    /// Processes a capture frame in place using the builder's capture
    /// config for both input and output.
    pub fn process_capture_f32(&mut self, channels: &mut [&mut [f32]]) -> Result<(), Error> {
        let config = self.capture_config;
        let src: Vec<Vec<f32>> = channels.iter().map(|c| c.to_vec()).collect();
        let src: Vec<&[f32]> = src.iter().map(Vec::as_slice).collect();
        self.process_stream_f32(&src, &config, &config, channels)
    }

    /// Processes a render frame in place using the builder's render config
    /// for both input and output.
    pub fn process_render_f32(&mut self, channels: &mut [&mut [f32]]) -> Result<(), Error> {
        let config = self.render_config;
        let src: Vec<Vec<f32>> = channels.iter().map(|c| c.to_vec()).collect();
        let src: Vec<&[f32]> = src.iter().map(Vec::as_slice).collect();
        self.process_reverse_stream_f32(&src, &config, &config, channels)
    }
}

impl Default for AudioProcessing {
    fn default() -> Self {
        Self::new()
    }
}

/// Checks both formats and their channel combination.
fn validate_formats(input: &StreamConfig, output: &StreamConfig) -> Result<(), Error> {
    input.validate()?;
    output.validate()?;
    let (in_ch, out_ch) = (input.num_channels(), output.num_channels());
    if out_ch != in_ch && out_ch != 1 && in_ch != 1 {
        return Err(Error::BadNumberChannels);
    }
    Ok(())
}

fn validate_planar(
    mut lengths: impl ExactSizeIterator<Item = usize>,
    config: &StreamConfig,
) -> Result<(), Error> {
    if lengths.len() != usize::from(config.num_channels()) {
        return Err(Error::BadNumberChannels);
    }
    let expected = config.num_frames();
    match lengths.find(|&len| len != expected) {
        Some(actual) => Err(Error::InvalidFrameSize { expected, actual }),
        None => Ok(()),
    }
}

fn validate_interleaved(len: usize, config: &StreamConfig) -> Result<(), Error> {
    let expected = config.num_samples();
    if len != expected {
        return Err(Error::InvalidFrameSize {
            expected,
            actual: len,
        });
    }
    Ok(())
}
