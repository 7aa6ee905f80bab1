//! Stream formats accepted by the pipeline.

use core::fmt;
use core::num::{NonZeroU16, NonZeroU32};
use core::ops::RangeInclusive;

use crate::audio_processing::Error;

/// Minimum supported sample rate in Hz.
pub const MIN_SAMPLE_RATE_HZ: u32 = 8_000;
/// Maximum supported sample rate in Hz.
pub const MAX_SAMPLE_RATE_HZ: u32 = 384_000;

const SUPPORTED_RATES: RangeInclusive<u32> = MIN_SAMPLE_RATE_HZ..=MAX_SAMPLE_RATE_HZ;

/// Error returned when creating a [`CheckedStreamConfig`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamConfigError {
    /// Sample rate is outside the supported range.
    UnsupportedSampleRate { sample_rate_hz: u32 },
    /// Sample rate does not map to an integer number of samples per 10 ms.
    Non10msAlignedSampleRate { sample_rate_hz: u32 },
}

impl fmt::Display for StreamConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Self::UnsupportedSampleRate { sample_rate_hz } => write!(
                f,
                "unsupported sample rate {sample_rate_hz}; expected {MIN_SAMPLE_RATE_HZ}..={MAX_SAMPLE_RATE_HZ}",
            ),
            Self::Non10msAlignedSampleRate { sample_rate_hz } => write!(
                f,
                "sample rate {sample_rate_hz} does not divide into 10 ms frames",
            ),
        }
    }
}

impl std::error::Error for StreamConfigError {}

fn check_sample_rate(sample_rate_hz: u32) -> Result<(), StreamConfigError> {
    if !SUPPORTED_RATES.contains(&sample_rate_hz) {
        return Err(StreamConfigError::UnsupportedSampleRate { sample_rate_hz });
    }
    if sample_rate_hz % 100 != 0 {
        return Err(StreamConfigError::Non10msAlignedSampleRate { sample_rate_hz });
    }
    Ok(())
}

/// Format of one side of a stream: sample rate and channel count.
///
/// Every processing call handles exactly one 10 ms frame, so the format also
/// fixes the buffer lengths a call must receive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamConfig {
    sample_rate_hz: u32,
    num_channels: u16,
}

impl StreamConfig {
    /// Creates a stream configuration without validating it.
    ///
    /// Processing calls reject invalid formats with
    /// [`Error::BadSampleRate`] or [`Error::BadNumberChannels`]; use
    /// [`CheckedStreamConfig::new`] to validate up front.
    pub const fn new(sample_rate_hz: u32, num_channels: u16) -> Self {
        Self {
            sample_rate_hz,
            num_channels,
        }
    }

    /// The sampling rate in Hz.
    #[inline]
    pub fn sample_rate_hz(&self) -> u32 {
        self.sample_rate_hz
    }

    /// The number of channels.
    #[inline]
    pub fn num_channels(&self) -> u16 {
        self.num_channels
    }

    /// Samples per channel in one 10 ms frame.
    #[inline]
    pub fn num_frames(&self) -> usize {
        self.sample_rate_hz as usize / 100
    }

    /// Samples across all channels in one 10 ms frame.
    #[inline]
    pub fn num_samples(&self) -> usize {
        self.num_channels as usize * self.num_frames()
    }

    /// Checks the format before any pipeline state is touched.
    pub(crate) fn validate(&self) -> Result<(), Error> {
        check_sample_rate(self.sample_rate_hz).map_err(|_| Error::BadSampleRate)?;
        if self.num_channels == 0 {
            return Err(Error::BadNumberChannels);
        }
        Ok(())
    }
}

/// Stream configuration that has already been validated.
///
/// Invariants:
/// - `sample_rate_hz` is in `8000..=384000`.
/// - `sample_rate_hz` is divisible by `100`.
/// - `num_channels` is non-zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CheckedStreamConfig {
    sample_rate_hz: NonZeroU32,
    num_channels: NonZeroU16,
}

impl CheckedStreamConfig {
    /// Creates a validated stream configuration.
    pub fn new(
        sample_rate_hz: u32,
        num_channels: NonZeroU16,
    ) -> Result<Self, StreamConfigError> {
        check_sample_rate(sample_rate_hz)?;
        let Some(sample_rate_hz) = NonZeroU32::new(sample_rate_hz) else {
            return Err(StreamConfigError::UnsupportedSampleRate { sample_rate_hz });
        };
        Ok(Self {
            sample_rate_hz,
            num_channels,
        })
    }

    /// The sampling rate in Hz.
    pub const fn sample_rate_hz(self) -> u32 {
        self.sample_rate_hz.get()
    }

    /// The non-zero number of channels.
    pub const fn num_channels(self) -> NonZeroU16 {
        self.num_channels
    }
}

impl From<CheckedStreamConfig> for StreamConfig {
    fn from(value: CheckedStreamConfig) -> Self {
        Self::new(value.sample_rate_hz(), value.num_channels.get())
    }
}
