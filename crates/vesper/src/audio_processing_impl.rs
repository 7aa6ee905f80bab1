//! Core audio processing implementation.
//!
//! Owns every stage and the per-format working buffers, applies pending
//! configuration at frame boundaries, and sequences the capture and render
//! paths. Callers have already validated formats and buffer lengths.

use core::mem;

use derive_more::Debug;
use tracing::{debug, error, warn};
use vesper_common_audio::audio_util::rms_dbfs;
use vesper_ns::{NoiseSuppressor, NsConfig, NsError};

use crate::audio_buffer::AudioBuffer;
use crate::audio_processing::Error;
use crate::capture_levels_adjuster::CaptureLevelsAdjuster;
use crate::config::{Config, DownmixMethod, MaxProcessingRate, RuntimeSetting};
use crate::echo_control::{EchoControl, EchoControlFactory};
use crate::gain_controller2::GainController2;
use crate::high_pass_filter::HighPassFilter;
use crate::render_queue::{RENDER_QUEUE_CAPACITY, RenderQueue};
use crate::stats::AudioProcessingStats;
use crate::stream_config::StreamConfig;

/// Rates the stages run at natively.
const NATIVE_RATES: [u32; 2] = [16000, 48000];
/// Rate of the lowest band, where echo control and noise suppression run.
const BAND_SPLIT_RATE: u32 = 16000;
/// Runtime settings held until the next capture frame before new ones are
/// dropped.
pub(crate) const RUNTIME_SETTINGS_CAPACITY: usize = 100;
/// Largest accepted stream delay hint.
pub(crate) const MAX_STREAM_DELAY_MS: i32 = 500;

/// Picks the lowest native rate at or above both stream rates, capped by the
/// configured maximum.
fn suitable_process_rate(input_rate: u32, output_rate: u32, max: MaxProcessingRate) -> u32 {
    let minimum = input_rate.min(output_rate).min(max.as_hz());
    NATIVE_RATES
        .into_iter()
        .find(|&rate| rate >= minimum)
        .unwrap_or(NATIVE_RATES[NATIVE_RATES.len() - 1])
}

/// Working channels: downmix when the output is mono, upmix on output when
/// the input is mono.
fn num_buffer_channels(input: &StreamConfig, output: &StreamConfig) -> usize {
    if input.num_channels() == 1 || output.num_channels() == 1 {
        1
    } else {
        usize::from(input.num_channels())
    }
}

fn ns_failure(err: NsError) -> Error {
    debug!(%err, "noise suppressor rejected frame");
    match err {
        NsError::SequenceViolation { .. } => Error::SequenceViolation,
        NsError::ChannelMismatch { .. } | NsError::TooManyBands { .. } => {
            Error::InternalStageFailure {
                stage: "noise suppression",
            }
        }
    }
}

/// Stages that run on the capture path, sized for one format.
#[derive(Debug)]
struct Submodules {
    capture_levels_adjuster: Option<CaptureLevelsAdjuster>,
    high_pass_filter: Option<HighPassFilter>,
    high_pass_full_band: bool,
    echo_control: Option<Box<dyn EchoControl>>,
    noise_suppressor: Option<NoiseSuppressor>,
    gain_controller2: Option<GainController2>,
}

impl Submodules {
    fn new(
        config: &Config,
        factory: &dyn EchoControlFactory,
        proc_rate: u32,
        num_channels: usize,
    ) -> Result<Self, Error> {
        let mut submodules = Self {
            capture_levels_adjuster: None,
            high_pass_filter: None,
            high_pass_full_band: config.high_pass_filter_full_band(),
            echo_control: None,
            noise_suppressor: None,
            gain_controller2: None,
        };
        submodules.capture_levels_adjuster = config.capture_levels_required().then(|| {
            CaptureLevelsAdjuster::new(config.capture_pre_gain(), config.capture_post_gain())
        });
        submodules.initialize_high_pass_filter(config, proc_rate, num_channels)?;
        submodules.echo_control = config
            .echo_canceller
            .as_ref()
            .map(|_| factory.create(num_channels));
        submodules.noise_suppressor = config.noise_suppression.as_ref().map(|ns| {
            NoiseSuppressor::new(
                NsConfig {
                    target_level: ns.level.into(),
                },
                num_channels,
            )
        });
        submodules.gain_controller2 = config
            .gain_controller2
            .as_ref()
            .map(|gc| GainController2::new(gc.fixed_digital.gain_db, proc_rate as usize / 100));
        Ok(submodules)
    }

    fn initialize_high_pass_filter(
        &mut self,
        config: &Config,
        proc_rate: u32,
        num_channels: usize,
    ) -> Result<(), Error> {
        self.high_pass_full_band = config.high_pass_filter_full_band();
        self.high_pass_filter = if config.high_pass_filter_required() {
            let rate = if self.high_pass_full_band {
                proc_rate
            } else {
                BAND_SPLIT_RATE
            };
            Some(HighPassFilter::new(rate, num_channels)?)
        } else {
            None
        };
        Ok(())
    }

    /// Whether any stage works on the split bands.
    fn band_stages_active(&self) -> bool {
        self.echo_control.is_some()
            || self.noise_suppressor.is_some()
            || (self.high_pass_filter.is_some() && !self.high_pass_full_band)
    }

    /// Brings the stages in line with `new`, keeping the state of stages
    /// whose settings did not change.
    fn reconfigure(
        &mut self,
        old: &Config,
        new: &Config,
        factory: &dyn EchoControlFactory,
        proc_rate: u32,
        num_channels: usize,
    ) -> Result<(), Error> {
        if !new.capture_levels_required() {
            self.capture_levels_adjuster = None;
        } else if let Some(adjuster) = &mut self.capture_levels_adjuster {
            adjuster.set_gains(new.capture_pre_gain(), new.capture_post_gain());
        } else {
            self.capture_levels_adjuster = Some(CaptureLevelsAdjuster::new(
                new.capture_pre_gain(),
                new.capture_post_gain(),
            ));
        }

        if old.high_pass_filter_required() != new.high_pass_filter_required()
            || old.high_pass_filter_full_band() != new.high_pass_filter_full_band()
        {
            self.initialize_high_pass_filter(new, proc_rate, num_channels)?;
        }

        match (&old.echo_canceller, &new.echo_canceller) {
            (None, Some(_)) => self.echo_control = Some(factory.create(num_channels)),
            (Some(_), None) => self.echo_control = None,
            _ => {}
        }

        match (&old.noise_suppression, &new.noise_suppression) {
            (_, None) => self.noise_suppressor = None,
            (None, Some(ns)) => {
                self.noise_suppressor = Some(NoiseSuppressor::new(
                    NsConfig {
                        target_level: ns.level.into(),
                    },
                    num_channels,
                ));
            }
            (Some(_), Some(ns)) => {
                if let Some(suppressor) = &mut self.noise_suppressor {
                    suppressor.set_suppression_level(ns.level.into());
                }
            }
        }

        match &new.gain_controller2 {
            None => self.gain_controller2 = None,
            Some(gc) => match &mut self.gain_controller2 {
                Some(existing) => existing.set_gain_db(gc.fixed_digital.gain_db),
                None => {
                    self.gain_controller2 = Some(GainController2::new(
                        gc.fixed_digital.gain_db,
                        proc_rate as usize / 100,
                    ));
                }
            },
        }
        Ok(())
    }
}

/// Capture path state for one pair of stream formats.
#[derive(Debug)]
struct CaptureState {
    input: StreamConfig,
    output: StreamConfig,
    proc_rate: u32,
    buffer: AudioBuffer,
    submodules: Submodules,
}

/// Render path state for one pair of stream formats.
#[derive(Debug)]
struct RenderState {
    input: StreamConfig,
    output: StreamConfig,
    buffer: AudioBuffer,
}

/// The pipeline engine behind [`AudioProcessing`](crate::AudioProcessing).
#[derive(Debug)]
pub(crate) struct AudioProcessingImpl {
    config: Config,
    /// Applied at the start of the next frame.
    pending_config: Option<Config>,
    /// Applied at the start of the next capture frame, after `pending_config`.
    #[debug(skip)]
    runtime_settings: Vec<RuntimeSetting>,
    stream_delay_ms: i32,
    echo_control_factory: Box<dyn EchoControlFactory>,
    capture: Option<CaptureState>,
    render: Option<RenderState>,
    render_queue: RenderQueue,
    stats: AudioProcessingStats,
}

impl AudioProcessingImpl {
    pub(crate) fn new(config: Config, echo_control_factory: Box<dyn EchoControlFactory>) -> Self {
        debug!(?config, "created audio processing");
        Self {
            config,
            pending_config: None,
            runtime_settings: Vec::with_capacity(RUNTIME_SETTINGS_CAPACITY),
            stream_delay_ms: 0,
            echo_control_factory,
            capture: None,
            render: None,
            render_queue: RenderQueue::new(RENDER_QUEUE_CAPACITY),
            stats: AudioProcessingStats::default(),
        }
    }

    pub(crate) fn apply_config(&mut self, config: Config) {
        if let Err(err) = config.validate() {
            error!(%err, ?config, "ignoring invalid config");
            return;
        }
        self.pending_config = Some(config);
    }

    pub(crate) fn set_runtime_setting(&mut self, setting: RuntimeSetting) {
        if self.runtime_settings.len() == RUNTIME_SETTINGS_CAPACITY {
            warn!(?setting, "runtime setting queue full, dropping setting");
            return;
        }
        self.runtime_settings.push(setting);
    }

    /// Stores the delay hint for the echo stage, clamped to
    /// `0..=MAX_STREAM_DELAY_MS`. Returns whether the value was in range.
    pub(crate) fn set_stream_delay_ms(&mut self, delay_ms: i32) -> bool {
        self.stream_delay_ms = delay_ms.clamp(0, MAX_STREAM_DELAY_MS);
        if self.stream_delay_ms != delay_ms {
            warn!(delay_ms, clamped = self.stream_delay_ms, "stream delay out of range");
            return false;
        }
        true
    }

    pub(crate) fn stream_delay_ms(&self) -> i32 {
        self.stream_delay_ms
    }

    pub(crate) fn config(&self) -> &Config {
        self.pending_config.as_ref().unwrap_or(&self.config)
    }

    pub(crate) fn statistics(&self) -> AudioProcessingStats {
        self.stats.clone()
    }

    pub(crate) fn proc_sample_rate_hz(&self) -> Option<u32> {
        self.capture.as_ref().map(|c| c.proc_rate)
    }

    /// Swaps in the pending config and updates the stages it touches.
    fn apply_pending_config(&mut self) -> Result<(), Error> {
        let Some(new) = self.pending_config.take() else {
            return Ok(());
        };
        let old = mem::replace(&mut self.config, new);
        debug!(config = ?self.config, "applying config");

        if old.pipeline != self.config.pipeline {
            self.capture = None;
            self.render = None;
        }
        if self.config.echo_canceller.is_none() {
            self.render_queue.clear();
        }
        if let Some(capture) = &mut self.capture {
            capture.submodules.reconfigure(
                &old,
                &self.config,
                self.echo_control_factory.as_ref(),
                capture.proc_rate,
                capture.buffer.num_channels(),
            )?;
        }
        Ok(())
    }

    /// Folds the queued runtime settings into the active config.
    fn apply_runtime_settings(&mut self) -> Result<(), Error> {
        if self.runtime_settings.is_empty() {
            return Ok(());
        }
        let old = self.config.clone();
        for setting in self.runtime_settings.drain(..) {
            if setting.apply_to(&mut self.config) {
                debug!(?setting, "applied runtime setting");
            } else {
                warn!(?setting, "ignoring runtime setting");
            }
        }
        if let Some(capture) = &mut self.capture {
            capture.submodules.reconfigure(
                &old,
                &self.config,
                self.echo_control_factory.as_ref(),
                capture.proc_rate,
                capture.buffer.num_channels(),
            )?;
        }
        Ok(())
    }

    fn maybe_initialize_capture(
        &mut self,
        input: &StreamConfig,
        output: &StreamConfig,
    ) -> Result<&mut CaptureState, Error> {
        let matches = self
            .capture
            .as_ref()
            .is_some_and(|c| c.input == *input && c.output == *output);
        if !matches {
            self.capture = None;
            let pipeline = &self.config.pipeline;
            let proc_rate = suitable_process_rate(
                input.sample_rate_hz(),
                output.sample_rate_hz(),
                pipeline.maximum_internal_processing_rate,
            );
            let num_channels = num_buffer_channels(input, output);
            debug!(?input, ?output, proc_rate, num_channels, "initializing capture path");
            let submodules = Submodules::new(
                &self.config,
                self.echo_control_factory.as_ref(),
                proc_rate,
                num_channels,
            )?;
            let buffer = AudioBuffer::new(
                input.sample_rate_hz(),
                usize::from(input.num_channels()),
                proc_rate,
                num_channels,
                output.sample_rate_hz(),
                pipeline.capture_downmix_method,
            );
            self.capture = Some(CaptureState {
                input: *input,
                output: *output,
                proc_rate,
                buffer,
                submodules,
            });
        }
        self.capture.as_mut().ok_or(Error::ConstructionFailure)
    }

    fn maybe_initialize_render(
        &mut self,
        input: &StreamConfig,
        output: &StreamConfig,
    ) -> Result<&mut RenderState, Error> {
        let matches = self
            .render
            .as_ref()
            .is_some_and(|r| r.input == *input && r.output == *output);
        if !matches {
            let proc_rate = suitable_process_rate(
                input.sample_rate_hz(),
                output.sample_rate_hz(),
                self.config.pipeline.maximum_internal_processing_rate,
            );
            let num_channels = num_buffer_channels(input, output);
            debug!(?input, ?output, proc_rate, num_channels, "initializing render path");
            self.render = Some(RenderState {
                input: *input,
                output: *output,
                buffer: AudioBuffer::new(
                    input.sample_rate_hz(),
                    usize::from(input.num_channels()),
                    proc_rate,
                    num_channels,
                    output.sample_rate_hz(),
                    DownmixMethod::AverageChannels,
                ),
            });
        }
        self.render.as_mut().ok_or(Error::ConstructionFailure)
    }

    pub(crate) fn process_stream_f32(
        &mut self,
        src: &[&[f32]],
        input: &StreamConfig,
        output: &StreamConfig,
        dest: &mut [&mut [f32]],
    ) -> Result<(), Error> {
        self.apply_pending_config()?;
        self.apply_runtime_settings()?;
        let capture = self.maybe_initialize_capture(input, output)?;
        capture.buffer.copy_from_float(src);
        self.process_capture_locked()?;
        if let Some(capture) = &mut self.capture {
            capture.buffer.copy_to_float(dest);
        }
        Ok(())
    }

    pub(crate) fn process_stream_i16(
        &mut self,
        src: &[i16],
        input: &StreamConfig,
        output: &StreamConfig,
        dest: &mut [i16],
    ) -> Result<(), Error> {
        self.apply_pending_config()?;
        self.apply_runtime_settings()?;
        let capture = self.maybe_initialize_capture(input, output)?;
        capture.buffer.copy_from_interleaved_i16(src);
        self.process_capture_locked()?;
        if let Some(capture) = &mut self.capture {
            capture
                .buffer
                .copy_to_interleaved_i16(dest, usize::from(output.num_channels()));
        }
        Ok(())
    }

    pub(crate) fn process_reverse_stream_f32(
        &mut self,
        src: &[&[f32]],
        input: &StreamConfig,
        output: &StreamConfig,
        dest: &mut [&mut [f32]],
    ) -> Result<(), Error> {
        self.apply_pending_config()?;
        let render = self.maybe_initialize_render(input, output)?;
        render.buffer.copy_from_float(src);
        self.process_render_locked();
        if let Some(render) = &mut self.render {
            render.buffer.copy_to_float(dest);
        }
        Ok(())
    }

    pub(crate) fn process_reverse_stream_i16(
        &mut self,
        src: &[i16],
        input: &StreamConfig,
        output: &StreamConfig,
        dest: &mut [i16],
    ) -> Result<(), Error> {
        self.apply_pending_config()?;
        let render = self.maybe_initialize_render(input, output)?;
        render.buffer.copy_from_interleaved_i16(src);
        self.process_render_locked();
        if let Some(render) = &mut self.render {
            render
                .buffer
                .copy_to_interleaved_i16(dest, usize::from(output.num_channels()));
        }
        Ok(())
    }

    /// Queues the mono lowest band of the render frame for the echo stage.
    fn process_render_locked(&mut self) {
        let Some(render) = &mut self.render else {
            return;
        };
        if self.config.echo_canceller.is_none() {
            return;
        }
        render.buffer.split_into_bands();
        self.render_queue.push(render.buffer.mixed_low_band());
    }

    /// Runs the capture stages on the loaded buffer.
    fn process_capture_locked(&mut self) -> Result<(), Error> {
        let stream_delay_ms = self.stream_delay_ms;
        let Some(capture) = &mut self.capture else {
            return Err(Error::InternalStageFailure { stage: "capture" });
        };
        let CaptureState {
            buffer, submodules, ..
        } = capture;

        if let Some(adjuster) = &mut submodules.capture_levels_adjuster {
            adjuster.apply_pre_level_adjustment(buffer.channels_mut());
        }

        if submodules.high_pass_full_band
            && let Some(hpf) = &mut submodules.high_pass_filter
        {
            hpf.process(buffer.channels_mut())
                .map_err(|_| Error::InternalStageFailure {
                    stage: "high-pass filter",
                })?;
        }

        let multi_band = submodules.band_stages_active();
        if multi_band {
            buffer.split_into_bands();
        }

        if !submodules.high_pass_full_band
            && let Some(hpf) = &mut submodules.high_pass_filter
        {
            hpf.process(buffer.low_bands_mut())
                .map_err(|_| Error::InternalStageFailure {
                    stage: "high-pass filter",
                })?;
        }

        if let Some(ns) = &mut submodules.noise_suppressor {
            ns.analyze(buffer.low_bands()).map_err(ns_failure)?;
        }

        if let Some(echo) = &mut submodules.echo_control {
            echo.set_audio_buffer_delay(stream_delay_ms);
            for frame in self.render_queue.drain() {
                echo.analyze_render(&frame);
            }
            echo.process_capture(buffer.low_bands_mut())
                .map_err(|_| Error::InternalStageFailure {
                    stage: "echo control",
                })?;
        }

        if let Some(ns) = &mut submodules.noise_suppressor {
            ns.process(buffer.low_bands_mut()).map_err(ns_failure)?;
            if buffer.num_bands() > 1 {
                ns.process_upper_bands(buffer.upper_bands_mut())
                    .map_err(ns_failure)?;
            }
        }

        if multi_band {
            buffer.merge_from_bands();
        }

        if let Some(gc) = &mut submodules.gain_controller2 {
            gc.process(buffer.channels_mut());
        }

        if let Some(adjuster) = &mut submodules.capture_levels_adjuster {
            adjuster.apply_post_level_adjustment(buffer.channels_mut());
        }

        self.stats = AudioProcessingStats {
            output_rms_dbfs: Some(f64::from(rms_dbfs(buffer.channel(0)))),
            speech_probability: submodules
                .noise_suppressor
                .as_ref()
                .map(|ns| f64::from(ns.speech_probability())),
            echo_return_loss_enhancement: submodules
                .echo_control
                .as_ref()
                .and_then(|echo| echo.echo_return_loss_enhancement()),
        };
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{
        CaptureLevelAdjustment, EchoCanceller, FixedDigital,
        GainController2 as GainController2Config, HighPassFilter as HighPassFilterConfig,
        NoiseSuppression, PreAmplifier,
    };
    use crate::echo_control::NlmsEchoCancellerFactory;

    fn apm(config: Config) -> AudioProcessingImpl {
        AudioProcessingImpl::new(config, Box::new(NlmsEchoCancellerFactory))
    }

    fn run_capture(apm: &mut AudioProcessingImpl, config: &StreamConfig, value: f32) -> Vec<f32> {
        let src = vec![value; config.num_frames()];
        let mut dest = vec![0.0; config.num_frames()];
        apm.process_stream_f32(&[&src], config, config, &mut [&mut dest])
            .unwrap();
        dest
    }

    #[test]
    fn suitable_process_rate_picks_lowest_native_rate() {
        let max = MaxProcessingRate::Rate48kHz;
        assert_eq!(suitable_process_rate(8000, 8000, max), 16000);
        assert_eq!(suitable_process_rate(16000, 48000, max), 16000);
        assert_eq!(suitable_process_rate(22050, 44100, max), 48000);
        assert_eq!(suitable_process_rate(48000, 48000, max), 48000);
        assert_eq!(suitable_process_rate(96000, 192000, max), 48000);
    }

    #[test]
    fn suitable_process_rate_respects_maximum() {
        let max = MaxProcessingRate::Rate16kHz;
        assert_eq!(suitable_process_rate(48000, 48000, max), 16000);
        assert_eq!(suitable_process_rate(8000, 48000, max), 16000);
    }

    #[test]
    fn buffer_channels_follow_output_layout() {
        let mono = StreamConfig::new(16000, 1);
        let stereo = StreamConfig::new(16000, 2);
        assert_eq!(num_buffer_channels(&stereo, &stereo), 2);
        assert_eq!(num_buffer_channels(&stereo, &mono), 1);
        assert_eq!(num_buffer_channels(&mono, &stereo), 1);
    }

    #[test]
    fn config_applies_at_the_next_frame() {
        let mut apm = apm(Config::default());
        let stream = StreamConfig::new(16000, 1);
        run_capture(&mut apm, &stream, 0.0);
        assert!(apm.capture.as_ref().unwrap().submodules.noise_suppressor.is_none());

        apm.apply_config(Config {
            noise_suppression: Some(NoiseSuppression::default()),
            ..Default::default()
        });
        assert!(apm.config().noise_suppression.is_some());
        assert!(apm.capture.as_ref().unwrap().submodules.noise_suppressor.is_none());

        run_capture(&mut apm, &stream, 0.0);
        assert!(apm.capture.as_ref().unwrap().submodules.noise_suppressor.is_some());
        assert!(apm.statistics().speech_probability.is_some());
    }

    #[test]
    fn echo_canceller_enforces_the_high_pass_filter() {
        let mut apm = apm(Config {
            echo_canceller: Some(EchoCanceller::default()),
            ..Default::default()
        });
        run_capture(&mut apm, &StreamConfig::new(48000, 1), 0.0);
        let submodules = &apm.capture.as_ref().unwrap().submodules;
        assert!(submodules.echo_control.is_some());
        let hpf = submodules.high_pass_filter.as_ref().unwrap();
        assert_eq!(hpf.sample_rate_hz(), 48000);
    }

    #[test]
    fn low_band_high_pass_filter_runs_at_split_rate() {
        let mut apm = apm(Config {
            high_pass_filter: Some(HighPassFilterConfig {
                apply_in_full_band: false,
            }),
            ..Default::default()
        });
        let dest = run_capture(&mut apm, &StreamConfig::new(48000, 1), 0.0);
        assert!(dest.iter().all(|&v| v == 0.0));
        let hpf = apm.capture.as_ref().unwrap().submodules.high_pass_filter.as_ref().unwrap();
        assert_eq!(hpf.sample_rate_hz(), 16000);
    }

    #[test]
    fn format_change_reinitializes_capture() {
        let mut apm = apm(Config::default());
        run_capture(&mut apm, &StreamConfig::new(16000, 1), 0.0);
        assert_eq!(apm.proc_sample_rate_hz(), Some(16000));
        run_capture(&mut apm, &StreamConfig::new(48000, 1), 0.0);
        assert_eq!(apm.proc_sample_rate_hz(), Some(48000));
    }

    #[test]
    fn pipeline_change_drops_format_state() {
        let mut apm = apm(Config::default());
        let stream = StreamConfig::new(48000, 1);
        run_capture(&mut apm, &stream, 0.0);
        let mut config = Config::default();
        config.pipeline.maximum_internal_processing_rate = MaxProcessingRate::Rate16kHz;
        apm.apply_config(config);
        run_capture(&mut apm, &stream, 0.0);
        assert_eq!(apm.proc_sample_rate_hz(), Some(16000));
    }

    #[test]
    fn render_frames_are_queued_only_with_echo_control() {
        let stream = StreamConfig::new(16000, 1);
        let src = vec![0.5f32; 160];
        let mut dest = vec![0.0f32; 160];

        let mut plain = apm(Config::default());
        plain
            .process_reverse_stream_f32(&[&src], &stream, &stream, &mut [&mut dest])
            .unwrap();
        assert_eq!(plain.render_queue.len(), 0);

        let mut with_echo = apm(Config {
            echo_canceller: Some(EchoCanceller::default()),
            ..Default::default()
        });
        with_echo
            .process_reverse_stream_f32(&[&src], &stream, &stream, &mut [&mut dest])
            .unwrap();
        assert_eq!(with_echo.render_queue.len(), 1);
        run_capture(&mut with_echo, &stream, 0.0);
        assert_eq!(with_echo.render_queue.len(), 0);
    }

    #[test]
    fn capture_gains_wrap_the_other_stages() {
        let mut apm = apm(Config {
            pre_amplifier: Some(PreAmplifier {
                fixed_gain_factor: 2.0,
            }),
            capture_level_adjustment: Some(CaptureLevelAdjustment {
                pre_gain_factor: 1.5,
                post_gain_factor: 0.5,
            }),
            ..Default::default()
        });
        let dest = run_capture(&mut apm, &StreamConfig::new(16000, 1), 0.25);
        assert!(dest.iter().all(|&v| (v - 0.375).abs() < 1e-6), "{}", dest[0]);
    }

    #[test]
    fn runtime_settings_apply_at_the_next_capture_frame() {
        let mut apm = apm(Config {
            capture_level_adjustment: Some(CaptureLevelAdjustment::default()),
            gain_controller2: Some(GainController2Config::default()),
            ..Default::default()
        });
        let stream = StreamConfig::new(16000, 1);
        run_capture(&mut apm, &stream, 0.1);

        apm.set_runtime_setting(RuntimeSetting::CapturePreGain(2.0));
        apm.set_runtime_setting(RuntimeSetting::CapturePostGain(0.5));
        apm.set_runtime_setting(RuntimeSetting::CaptureFixedPostGain(6.0));
        apm.set_runtime_setting(RuntimeSetting::CaptureFixedPostGain(-1.0));
        assert_eq!(apm.config().capture_post_gain(), 1.0);

        run_capture(&mut apm, &stream, 0.1);
        let cla = apm.config().capture_level_adjustment.clone().unwrap();
        assert_eq!((cla.pre_gain_factor, cla.post_gain_factor), (2.0, 0.5));
        let gc2 = apm.config().gain_controller2.clone().unwrap();
        assert_eq!(gc2.fixed_digital.gain_db, 6.0);
        assert!(apm.runtime_settings.is_empty());

        // The ramp towards the new gains completes within one frame.
        let dest = run_capture(&mut apm, &stream, 0.1);
        let expected = 0.1 * 2.0 * 1.995 * 0.5;
        assert!(dest.iter().all(|&v| (v - expected).abs() < 1e-3), "{}", dest[0]);
    }

    #[test]
    fn runtime_setting_queue_is_bounded() {
        let mut apm = apm(Config {
            capture_level_adjustment: Some(CaptureLevelAdjustment::default()),
            ..Default::default()
        });
        for _ in 0..RUNTIME_SETTINGS_CAPACITY {
            apm.set_runtime_setting(RuntimeSetting::CapturePostGain(0.5));
        }
        apm.set_runtime_setting(RuntimeSetting::CapturePostGain(0.25));
        assert_eq!(apm.runtime_settings.len(), RUNTIME_SETTINGS_CAPACITY);

        run_capture(&mut apm, &StreamConfig::new(16000, 1), 0.0);
        assert_eq!(apm.config().capture_post_gain(), 0.5);
    }

    #[test]
    fn stream_delay_out_of_range_is_reported() {
        let mut apm = apm(Config::default());
        assert!(apm.set_stream_delay_ms(40));
        assert!(!apm.set_stream_delay_ms(501));
        assert_eq!(apm.stream_delay_ms(), MAX_STREAM_DELAY_MS);
    }

    #[test]
    fn invalid_config_is_ignored() {
        let mut apm = apm(Config::default());
        apm.apply_config(Config {
            gain_controller2: Some(GainController2Config {
                fixed_digital: FixedDigital { gain_db: -3.0 },
            }),
            ..Default::default()
        });
        assert!(apm.config().gain_controller2.is_none());
    }
}
