//! Gain stage: fixed digital gain followed by a peak limiter.
//!
//! The limiter estimates the peak level of 20 sub-frames per 10 ms frame
//! with instant attack and slow decay, maps each level to a gain that keeps
//! the output under [`LIMITER_THRESHOLD_DBFS`], and interpolates the gain
//! per sample between sub-frame boundaries.

use derive_more::Debug;
use tracing::debug;
use vesper_common_audio::audio_util::{
    MAX_FLOAT_S16_VALUE, MIN_FLOAT_S16_VALUE, db_to_ratio, dbfs_to_float_s16,
};

/// Output peak level the limiter converges to.
pub(crate) const LIMITER_THRESHOLD_DBFS: f32 = -1.0;
const SUB_FRAMES_IN_FRAME: usize = 20;
/// Per-sub-frame decay of the level envelope.
const DECAY_FILTER_CONSTANT: f32 = 0.997_125_9;
/// Interpolation power for the first sub-frame of an attack.
const ATTACK_INTERPOLATION_POWER: i32 = 8;

#[derive(Debug)]
struct Limiter {
    threshold: f32,
    envelope: f32,
    last_scaling_factor: f32,
    #[debug(skip)]
    scaling_factors: [f32; SUB_FRAMES_IN_FRAME + 1],
    #[debug(skip)]
    per_sample_factors: Vec<f32>,
}

impl Limiter {
    fn new(samples_per_channel: usize) -> Self {
        debug_assert_eq!(samples_per_channel % SUB_FRAMES_IN_FRAME, 0);
        Self {
            threshold: dbfs_to_float_s16(LIMITER_THRESHOLD_DBFS),
            envelope: 0.0,
            last_scaling_factor: 1.0,
            scaling_factors: [1.0; SUB_FRAMES_IN_FRAME + 1],
            per_sample_factors: vec![1.0; samples_per_channel],
        }
    }

    fn gain_for_level(&self, level: f32) -> f32 {
        if level <= self.threshold {
            1.0
        } else {
            self.threshold / level
        }
    }

    fn process<C: AsRef<[f32]> + AsMut<[f32]>>(&mut self, channels: &mut [C]) {
        let subframe_size = self.per_sample_factors.len() / SUB_FRAMES_IN_FRAME;

        self.scaling_factors[0] = self.last_scaling_factor;
        for sub in 0..SUB_FRAMES_IN_FRAME {
            let range = sub * subframe_size..(sub + 1) * subframe_size;
            let peak = channels
                .iter()
                .flat_map(|c| c.as_ref()[range.clone()].iter())
                .fold(0.0_f32, |acc, v| acc.max(v.abs()));
            self.envelope = if peak > self.envelope {
                peak
            } else {
                peak + DECAY_FILTER_CONSTANT * (self.envelope - peak)
            };
            self.scaling_factors[sub + 1] = self.gain_for_level(self.envelope);
        }

        self.interpolate_factors(subframe_size);
        for channel in channels.iter_mut() {
            for (sample, &factor) in channel.as_mut().iter_mut().zip(&self.per_sample_factors) {
                *sample = (*sample * factor).clamp(MIN_FLOAT_S16_VALUE, MAX_FLOAT_S16_VALUE);
            }
        }
        self.last_scaling_factor = self.scaling_factors[SUB_FRAMES_IN_FRAME];
    }

    fn interpolate_factors(&mut self, subframe_size: usize) {
        let factors = &self.scaling_factors;
        let is_attack = factors[0] > factors[1];
        for (sub, chunk) in self
            .per_sample_factors
            .chunks_exact_mut(subframe_size)
            .enumerate()
        {
            let (start, end) = (factors[sub], factors[sub + 1]);
            for (j, factor) in chunk.iter_mut().enumerate() {
                let t = j as f32 / subframe_size as f32;
                *factor = if sub == 0 && is_attack {
                    // Steep start so a sudden peak is caught early.
                    (1.0 - t).powi(ATTACK_INTERPOLATION_POWER) * (start - end) + end
                } else {
                    start + (end - start) * t
                };
            }
        }
    }
}

/// Fixed gain plus limiter, operating on FloatS16 full-band channels.
#[derive(Debug)]
pub(crate) struct GainController2 {
    gain: f32,
    limiter: Limiter,
}

impl GainController2 {
    pub(crate) fn new(gain_db: f32, samples_per_channel: usize) -> Self {
        debug!(gain_db, samples_per_channel, "created gain controller");
        Self {
            gain: db_to_ratio(gain_db),
            limiter: Limiter::new(samples_per_channel),
        }
    }

    /// Changes the fixed gain without resetting the limiter.
    pub(crate) fn set_gain_db(&mut self, gain_db: f32) {
        self.gain = db_to_ratio(gain_db);
    }

    pub(crate) fn process<C: AsRef<[f32]> + AsMut<[f32]>>(&mut self, channels: &mut [C]) {
        if self.gain != 1.0 {
            for sample in channels.iter_mut().flat_map(|c| c.as_mut().iter_mut()) {
                *sample *= self.gain;
            }
        }
        self.limiter.process(channels);
    }
}

#[cfg(test)]
mod tests {
    use core::f32::consts::TAU;

    use super::*;

    fn tone(amplitude: f32, frame: usize) -> Vec<f32> {
        (0..480)
            .map(|i| {
                let t = (frame * 480 + i) as f32 / 48000.0;
                amplitude * (TAU * 440.0 * t).sin()
            })
            .collect()
    }

    #[test]
    fn quiet_signal_passes_unchanged_at_zero_gain() {
        let mut gc = GainController2::new(0.0, 480);
        for frame in 0..5 {
            let input = tone(1000.0, frame);
            let mut output = input.clone();
            gc.process(&mut [&mut output]);
            assert_eq!(input, output);
        }
    }

    #[test]
    fn fixed_gain_amplifies() {
        let mut gc = GainController2::new(20.0, 480);
        let mut output = tone(100.0, 0);
        gc.process(&mut [&mut output]);
        let peak = output.iter().fold(0.0_f32, |a, v| a.max(v.abs()));
        assert!((peak - 1000.0).abs() < 10.0, "peak {peak}");
    }

    #[test]
    fn limiter_holds_loud_signal_below_full_scale() {
        let mut gc = GainController2::new(12.0, 480);
        let threshold = dbfs_to_float_s16(LIMITER_THRESHOLD_DBFS);
        for frame in 0..20 {
            let mut output = tone(20000.0, frame);
            gc.process(&mut [&mut output]);
            let peak = output.iter().fold(0.0_f32, |a, v| a.max(v.abs()));
            assert!(peak <= MAX_FLOAT_S16_VALUE);
            if frame > 2 {
                assert!(peak <= threshold * 1.05, "frame {frame}: peak {peak}");
            }
        }
    }

    #[test]
    fn silence_stays_silent() {
        let mut gc = GainController2::new(30.0, 160);
        let mut left = vec![0.0; 160];
        let mut right = vec![0.0; 160];
        gc.process(&mut [&mut left, &mut right]);
        assert!(left.iter().chain(&right).all(|&v| v == 0.0));
    }

    #[test]
    fn set_gain_db_takes_effect_next_frame() {
        let mut gc = GainController2::new(0.0, 160);
        gc.set_gain_db(6.0);
        let mut frame = vec![100.0; 160];
        gc.process(&mut [&mut frame]);
        assert!((frame[0] - 199.5).abs() < 1.0, "{}", frame[0]);
    }
}
