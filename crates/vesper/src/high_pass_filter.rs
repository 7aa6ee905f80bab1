//! High-pass filter removing DC and low-frequency rumble.
//!
//! Three cascaded biquad sections per channel with a cutoff around 80 Hz.
//! Coefficients exist for 16, 32 and 48 kHz; the pipeline runs the filter on
//! the full band at the processing rate or on the lowest 16 kHz band.

use vesper_common_audio::cascaded_biquad_filter::{BiQuadCoefficients, CascadedBiQuadFilter};

use crate::audio_processing::Error;

const fn section(b: [f32; 3], a: [f32; 2]) -> BiQuadCoefficients {
    BiQuadCoefficients { b, a }
}

const COEFFICIENTS_16KHZ: [BiQuadCoefficients; 3] = [
    section([0.877_353_9, -1.754_683_9, 0.877_353_9], [-1.881_687_3, 0.888_058_5]),
    section([1.0, -1.999_810_1, 1.0], [-1.976_035_4, 0.977_970_9]),
    section([1.0, -1.999_669_2, 1.0], [-1.994_265_8, 0.995_486_2]),
];

const COEFFICIENTS_32KHZ: [BiQuadCoefficients; 3] = [
    section([0.910_205_6, -1.820_404_9, 0.910_205_6], [-1.940_710_9, 0.942_351_3]),
    section([1.0, -1.999_952_5, 1.0], [-1.988_434_6, 0.988_921_3]),
    section([1.0, -1.999_917_3, 1.0], [-1.997_434_7, 0.997_740_2]),
];

const COEFFICIENTS_48KHZ: [BiQuadCoefficients; 3] = [
    section([0.921_379, -1.842_755_2, 0.921_379], [-1.960_450, 0.961_186_3]),
    section([1.0, -1.999_979, 1.0], [-1.992_383_4, 0.992_600_1]),
    section([1.0, -1.999_963_3, 1.0], [-1.998_357, 0.998_492_8]),
];

fn coefficients_for(sample_rate_hz: u32) -> Option<&'static [BiQuadCoefficients; 3]> {
    match sample_rate_hz {
        16000 => Some(&COEFFICIENTS_16KHZ),
        32000 => Some(&COEFFICIENTS_32KHZ),
        48000 => Some(&COEFFICIENTS_48KHZ),
        _ => None,
    }
}

/// Per-channel high-pass filter with persistent state.
///
/// State only resets by constructing a new filter.
///
/// ```
/// use vesper::components::HighPassFilter;
///
/// let mut hpf = HighPassFilter::new(16000, 1).unwrap();
/// let mut frame = vec![1000.0_f32; 160];
/// hpf.process(&mut [&mut frame]).unwrap();
/// assert!(frame[159] < 1000.0);
/// ```
#[derive(Debug, Clone)]
pub struct HighPassFilter {
    sample_rate_hz: u32,
    filters: Vec<CascadedBiQuadFilter>,
}

impl HighPassFilter {
    /// Creates a filter for `num_channels` channels at 16, 32 or 48 kHz.
    ///
    /// Other rates fail with [`Error::BadSampleRate`] and zero channels with
    /// [`Error::BadNumberChannels`].
    pub fn new(sample_rate_hz: u32, num_channels: usize) -> Result<Self, Error> {
        let coefficients = coefficients_for(sample_rate_hz).ok_or(Error::BadSampleRate)?;
        if num_channels == 0 {
            return Err(Error::BadNumberChannels);
        }
        Ok(Self {
            sample_rate_hz,
            filters: (0..num_channels)
                .map(|_| CascadedBiQuadFilter::new(coefficients))
                .collect(),
        })
    }

    pub fn sample_rate_hz(&self) -> u32 {
        self.sample_rate_hz
    }

    pub fn num_channels(&self) -> usize {
        self.filters.len()
    }

    /// Samples per channel in one 10 ms frame.
    pub fn num_frames(&self) -> usize {
        self.sample_rate_hz as usize / 100
    }

    /// Filters one 10 ms frame in place.
    ///
    /// The channel count and every channel length are checked before any
    /// channel is filtered, so an error leaves all channels untouched.
    pub fn process<C: AsRef<[f32]> + AsMut<[f32]>>(
        &mut self,
        channels: &mut [C],
    ) -> Result<(), Error> {
        if channels.len() != self.filters.len() {
            return Err(Error::BadNumberChannels);
        }
        let expected = self.num_frames();
        if let Some(actual) = channels
            .iter()
            .map(|c| c.as_ref().len())
            .find(|&len| len != expected)
        {
            return Err(Error::InvalidFrameSize { expected, actual });
        }

        for (filter, channel) in self.filters.iter_mut().zip(channels.iter_mut()) {
            filter.process_in_place(channel.as_mut());
        }
        Ok(())
    }
}
