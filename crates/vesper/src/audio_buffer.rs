//! Per-frame working buffer of the pipeline.
//!
//! Holds one 10 ms frame in FloatS16 at the internal processing rate, along
//! with its band split. Converting from the caller's format (sample type,
//! channel count, rate) happens on the way in; the reverse conversion happens
//! on the way out, so the stages in between only ever see FloatS16 at 16 or
//! 48 kHz.

use derive_more::Debug;
use vesper_common_audio::audio_util::{
    float_s16_to_float, float_s16_to_s16, float_to_float_s16,
};
use vesper_common_audio::push_resampler::PushResampler;

use crate::config::DownmixMethod;
use crate::three_band_filter_bank::{
    FULL_BAND_SIZE, NUM_BANDS, SPLIT_BAND_SIZE, ThreeBandFilterBank,
};

/// Bands for a processing rate: 48 kHz splits into three, 16 kHz is one band.
fn num_bands_for_frames(num_frames: usize) -> usize {
    if num_frames == FULL_BAND_SIZE {
        NUM_BANDS
    } else {
        1
    }
}

#[derive(Debug)]
pub(crate) struct AudioBuffer {
    input_num_frames: usize,
    input_num_channels: usize,
    output_num_frames: usize,
    num_channels: usize,
    num_bands: usize,
    downmix: DownmixMethod,
    /// `num_channels` x `input_num_frames`, FloatS16 at the input rate.
    #[debug(skip)]
    input_staging: Vec<Vec<f32>>,
    /// `num_channels` x `output_num_frames`, FloatS16 at the output rate.
    #[debug(skip)]
    output_staging: Vec<Vec<f32>>,
    /// `num_channels` x `buffer_num_frames`, FloatS16 at the processing rate.
    #[debug(skip)]
    data: Vec<Vec<f32>>,
    /// Lowest band of every channel.
    #[debug(skip)]
    low_bands: Vec<[f32; SPLIT_BAND_SIZE]>,
    /// Bands above the lowest; only filled at 48 kHz.
    #[debug(skip)]
    upper_bands: Vec<[[f32; SPLIT_BAND_SIZE]; NUM_BANDS - 1]>,
    filter_banks: Vec<ThreeBandFilterBank>,
    input_resamplers: Vec<PushResampler>,
    output_resamplers: Vec<PushResampler>,
}

impl AudioBuffer {
    /// Creates a buffer converting `input_num_channels` channels at
    /// `input_rate` into `num_channels` channels at `buffer_rate` (16 or
    /// 48 kHz), and back out at `output_rate`.
    ///
    /// `num_channels` is either `input_num_channels` or 1 (downmix).
    pub(crate) fn new(
        input_rate: u32,
        input_num_channels: usize,
        buffer_rate: u32,
        num_channels: usize,
        output_rate: u32,
        downmix: DownmixMethod,
    ) -> Self {
        let input_num_frames = input_rate as usize / 100;
        let buffer_num_frames = buffer_rate as usize / 100;
        let output_num_frames = output_rate as usize / 100;
        debug_assert!(buffer_num_frames == SPLIT_BAND_SIZE || buffer_num_frames == FULL_BAND_SIZE);
        debug_assert!(num_channels == input_num_channels || num_channels == 1);
        let num_bands = num_bands_for_frames(buffer_num_frames);

        let input_resamplers = if input_num_frames == buffer_num_frames {
            Vec::new()
        } else {
            (0..num_channels)
                .map(|_| PushResampler::new(input_num_frames, buffer_num_frames))
                .collect()
        };
        let output_resamplers = if output_num_frames == buffer_num_frames {
            Vec::new()
        } else {
            (0..num_channels)
                .map(|_| PushResampler::new(buffer_num_frames, output_num_frames))
                .collect()
        };
        let filter_banks = if num_bands == NUM_BANDS {
            (0..num_channels).map(|_| ThreeBandFilterBank::new()).collect()
        } else {
            Vec::new()
        };

        Self {
            input_num_frames,
            input_num_channels,
            output_num_frames,
            num_channels,
            num_bands,
            downmix,
            input_staging: vec![vec![0.0; input_num_frames]; num_channels],
            output_staging: vec![vec![0.0; output_num_frames]; num_channels],
            data: vec![vec![0.0; buffer_num_frames]; num_channels],
            low_bands: vec![[0.0; SPLIT_BAND_SIZE]; num_channels],
            upper_bands: vec![[[0.0; SPLIT_BAND_SIZE]; NUM_BANDS - 1]; num_channels],
            filter_banks,
            input_resamplers,
            output_resamplers,
        }
    }

    pub(crate) fn num_channels(&self) -> usize {
        self.num_channels
    }

    pub(crate) fn num_bands(&self) -> usize {
        self.num_bands
    }

    /// Full-band samples of one channel.
    pub(crate) fn channel(&self, channel: usize) -> &[f32] {
        &self.data[channel]
    }

    /// Full-band samples of every channel.
    pub(crate) fn channels_mut(&mut self) -> &mut [Vec<f32>] {
        &mut self.data
    }

    /// Lowest band of every channel.
    pub(crate) fn low_bands(&self) -> &[[f32; SPLIT_BAND_SIZE]] {
        &self.low_bands
    }

    pub(crate) fn low_bands_mut(&mut self) -> &mut [[f32; SPLIT_BAND_SIZE]] {
        &mut self.low_bands
    }

    /// Bands above the lowest for every channel; only meaningful when
    /// [`num_bands`](Self::num_bands) is above one.
    pub(crate) fn upper_bands_mut(&mut self) -> &mut [[[f32; SPLIT_BAND_SIZE]; NUM_BANDS - 1]] {
        &mut self.upper_bands
    }

    /// Mono mix of the lowest band across channels.
    pub(crate) fn mixed_low_band(&self) -> [f32; SPLIT_BAND_SIZE] {
        let mut mixed = [0.0; SPLIT_BAND_SIZE];
        for band in &self.low_bands {
            for (m, &v) in mixed.iter_mut().zip(band) {
                *m += v;
            }
        }
        let scale = 1.0 / self.num_channels as f32;
        for m in &mut mixed {
            *m *= scale;
        }
        mixed
    }

    /// Loads planar float samples in `[-1, 1]`.
    ///
    /// `src` must hold `input_num_channels` slices of `input_num_frames`.
    pub(crate) fn copy_from_float(&mut self, src: &[&[f32]]) {
        debug_assert_eq!(src.len(), self.input_num_channels);
        if self.num_channels == self.input_num_channels {
            for (staged, channel) in self.input_staging.iter_mut().zip(src) {
                for (s, &v) in staged.iter_mut().zip(channel.iter()) {
                    *s = float_to_float_s16(v);
                }
            }
        } else {
            let staged = &mut self.input_staging[0];
            match self.downmix {
                DownmixMethod::UseFirstChannel => {
                    for (s, &v) in staged.iter_mut().zip(src[0].iter()) {
                        *s = float_to_float_s16(v);
                    }
                }
                DownmixMethod::AverageChannels => {
                    let scale = 1.0 / src.len() as f32;
                    for (i, s) in staged.iter_mut().enumerate() {
                        let sum: f32 = src.iter().map(|c| c[i]).sum();
                        *s = float_to_float_s16(sum * scale);
                    }
                }
            }
        }
        self.resample_input();
    }

    /// Loads interleaved `i16` samples.
    ///
    /// `src` must hold `input_num_frames * input_num_channels` samples.
    pub(crate) fn copy_from_interleaved_i16(&mut self, src: &[i16]) {
        let stride = self.input_num_channels;
        debug_assert_eq!(src.len(), stride * self.input_num_frames);
        if self.num_channels == self.input_num_channels {
            for (ch, staged) in self.input_staging.iter_mut().enumerate() {
                for (s, frame) in staged.iter_mut().zip(src.chunks_exact(stride)) {
                    *s = f32::from(frame[ch]);
                }
            }
        } else {
            let staged = &mut self.input_staging[0];
            let scale = 1.0 / stride as f32;
            for (s, frame) in staged.iter_mut().zip(src.chunks_exact(stride)) {
                *s = match self.downmix {
                    DownmixMethod::UseFirstChannel => f32::from(frame[0]),
                    DownmixMethod::AverageChannels => {
                        frame.iter().map(|&v| f32::from(v)).sum::<f32>() * scale
                    }
                };
            }
        }
        self.resample_input();
    }

    fn resample_input(&mut self) {
        if self.input_resamplers.is_empty() {
            for (data, staged) in self.data.iter_mut().zip(&self.input_staging) {
                data.copy_from_slice(staged);
            }
        } else {
            for ((data, staged), resampler) in self
                .data
                .iter_mut()
                .zip(&self.input_staging)
                .zip(&mut self.input_resamplers)
            {
                resampler.resample(staged, data);
            }
        }
    }

    /// Fills the bands from the full-band data.
    pub(crate) fn split_into_bands(&mut self) {
        if self.num_bands == NUM_BANDS {
            let mut bands = [[0.0; SPLIT_BAND_SIZE]; NUM_BANDS];
            for (((data, low), upper), bank) in self
                .data
                .iter()
                .zip(&mut self.low_bands)
                .zip(&mut self.upper_bands)
                .zip(&mut self.filter_banks)
            {
                bank.analysis(data, &mut bands);
                let [first, rest @ ..] = bands;
                *low = first;
                *upper = rest;
            }
        } else {
            for (data, low) in self.data.iter().zip(&mut self.low_bands) {
                low.copy_from_slice(data);
            }
        }
    }

    /// Rebuilds the full-band data from the bands.
    pub(crate) fn merge_from_bands(&mut self) {
        if self.num_bands == NUM_BANDS {
            for (((data, low), upper), bank) in self
                .data
                .iter_mut()
                .zip(&self.low_bands)
                .zip(&self.upper_bands)
                .zip(&mut self.filter_banks)
            {
                let [second, third] = *upper;
                bank.synthesis(&[*low, second, third], data);
            }
        } else {
            for (data, low) in self.data.iter_mut().zip(&self.low_bands) {
                data.copy_from_slice(low);
            }
        }
    }

    fn resample_output(&mut self) {
        if self.output_resamplers.is_empty() {
            for (staged, data) in self.output_staging.iter_mut().zip(&self.data) {
                staged.copy_from_slice(data);
            }
        } else {
            for ((staged, data), resampler) in self
                .output_staging
                .iter_mut()
                .zip(&self.data)
                .zip(&mut self.output_resamplers)
            {
                resampler.resample(data, staged);
            }
        }
    }

    /// Writes planar float samples; a mono buffer fills every output channel.
    pub(crate) fn copy_to_float(&mut self, dest: &mut [&mut [f32]]) {
        self.resample_output();
        for (ch, channel) in dest.iter_mut().enumerate() {
            let staged = &self.output_staging[ch.min(self.num_channels - 1)];
            for (d, &v) in channel.iter_mut().zip(staged) {
                *d = float_s16_to_float(v);
            }
        }
    }

    /// Writes interleaved `i16` samples; a mono buffer fills every output
    /// channel.
    pub(crate) fn copy_to_interleaved_i16(&mut self, dest: &mut [i16], num_channels: usize) {
        debug_assert_eq!(dest.len(), num_channels * self.output_num_frames);
        self.resample_output();
        for (i, frame) in dest.chunks_exact_mut(num_channels).enumerate() {
            for (ch, d) in frame.iter_mut().enumerate() {
                *d = float_s16_to_s16(self.output_staging[ch.min(self.num_channels - 1)][i]);
            }
        }
    }
}
