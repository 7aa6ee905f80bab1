//! Linear capture gains applied around the rest of the capture path.
//!
//! The pre-gain scales the full-band capture signal before any other stage;
//! the post-gain scales it after every other stage. A gain change is ramped
//! linearly over the next frame so that it never produces a step.

use derive_more::Debug;
use tracing::debug;
use vesper_common_audio::audio_util::{MAX_FLOAT_S16_VALUE, MIN_FLOAT_S16_VALUE};

/// One linear gain with a per-frame ramp towards its target.
#[derive(Debug, Clone, Copy)]
struct LevelScaler {
    previous: f32,
    target: f32,
}

impl LevelScaler {
    fn new(gain: f32) -> Self {
        Self {
            previous: gain,
            target: gain,
        }
    }

    fn set_gain(&mut self, gain: f32) {
        self.target = gain;
    }

    fn process<C: AsMut<[f32]>>(&mut self, channels: &mut [C]) {
        if self.previous == self.target {
            if self.target != 1.0 {
                for channel in channels.iter_mut() {
                    for sample in channel.as_mut() {
                        *sample = (*sample * self.target)
                            .clamp(MIN_FLOAT_S16_VALUE, MAX_FLOAT_S16_VALUE);
                    }
                }
            }
            return;
        }

        for channel in channels.iter_mut() {
            let channel = channel.as_mut();
            let step = (self.target - self.previous) / channel.len() as f32;
            let mut gain = self.previous;
            for sample in channel {
                gain += step;
                *sample = (*sample * gain).clamp(MIN_FLOAT_S16_VALUE, MAX_FLOAT_S16_VALUE);
            }
        }
        self.previous = self.target;
    }
}

/// Pre- and post-gain stage on FloatS16 full-band channels.
#[derive(Debug)]
pub(crate) struct CaptureLevelsAdjuster {
    pre: LevelScaler,
    post: LevelScaler,
}

impl CaptureLevelsAdjuster {
    pub(crate) fn new(pre_gain: f32, post_gain: f32) -> Self {
        debug!(pre_gain, post_gain, "created capture levels adjuster");
        Self {
            pre: LevelScaler::new(pre_gain),
            post: LevelScaler::new(post_gain),
        }
    }

    pub(crate) fn set_gains(&mut self, pre_gain: f32, post_gain: f32) {
        self.pre.set_gain(pre_gain);
        self.post.set_gain(post_gain);
    }

    pub(crate) fn apply_pre_level_adjustment<C: AsMut<[f32]>>(&mut self, channels: &mut [C]) {
        self.pre.process(channels);
    }

    pub(crate) fn apply_post_level_adjustment<C: AsMut<[f32]>>(&mut self, channels: &mut [C]) {
        self.post.process(channels);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unity_gains_leave_samples_untouched() {
        let mut adjuster = CaptureLevelsAdjuster::new(1.0, 1.0);
        let mut frame = vec![1234.5; 160];
        adjuster.apply_pre_level_adjustment(&mut [&mut frame]);
        adjuster.apply_post_level_adjustment(&mut [&mut frame]);
        assert!(frame.iter().all(|&v| v == 1234.5));
    }

    #[test]
    fn steady_gain_scales_and_clamps() {
        let mut adjuster = CaptureLevelsAdjuster::new(2.0, 1.0);
        let mut quiet = vec![100.0; 160];
        let mut loud = vec![-30000.0; 160];
        adjuster.apply_pre_level_adjustment(&mut [&mut quiet, &mut loud]);
        assert!(quiet.iter().all(|&v| v == 200.0));
        assert!(loud.iter().all(|&v| v == MIN_FLOAT_S16_VALUE));
    }

    #[test]
    fn gain_change_ramps_over_one_frame() {
        let mut adjuster = CaptureLevelsAdjuster::new(1.0, 1.0);
        adjuster.set_gains(1.0, 3.0);

        let mut frame = vec![100.0; 160];
        adjuster.apply_post_level_adjustment(&mut [&mut frame]);
        assert!(frame[0] > 100.0 && frame[0] < 102.0, "{}", frame[0]);
        assert!(frame.windows(2).all(|w| w[1] > w[0]));
        assert!((frame[159] - 300.0).abs() < 1e-2, "{}", frame[159]);

        let mut next = vec![100.0; 160];
        adjuster.apply_post_level_adjustment(&mut [&mut next]);
        assert!(next.iter().all(|&v| (v - 300.0).abs() < 1e-3));
    }

    #[test]
    fn zero_gain_mutes() {
        let mut adjuster = CaptureLevelsAdjuster::new(0.0, 1.0);
        let mut frame = vec![5000.0; 480];
        adjuster.apply_pre_level_adjustment(&mut [&mut frame]);
        assert!(frame.iter().all(|&v| v == 0.0));
    }
}
