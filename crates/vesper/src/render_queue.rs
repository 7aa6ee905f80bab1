//! Bounded hand-off of render frames to the echo stage.
//!
//! Render frames arrive through `process_reverse_stream_*` and are consumed
//! by the next capture frame. When capture stalls, the oldest frames are
//! dropped so the queue never holds more than one second of audio.

use std::collections::VecDeque;

use derive_more::Debug;
use tracing::warn;

use crate::three_band_filter_bank::SPLIT_BAND_SIZE;

/// Frames held before the oldest is dropped (1 s of 10 ms frames).
pub(crate) const RENDER_QUEUE_CAPACITY: usize = 100;

#[derive(Debug)]
pub(crate) struct RenderQueue {
    #[debug(skip)]
    frames: VecDeque<[f32; SPLIT_BAND_SIZE]>,
    capacity: usize,
    dropped: u64,
}

impl RenderQueue {
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            frames: VecDeque::with_capacity(capacity),
            capacity,
            dropped: 0,
        }
    }

    pub(crate) fn push(&mut self, frame: [f32; SPLIT_BAND_SIZE]) {
        if self.frames.len() == self.capacity {
            self.frames.pop_front();
            self.dropped += 1;
            warn!(
                dropped = self.dropped,
                capacity = self.capacity,
                "render queue full, dropping oldest frame"
            );
        }
        self.frames.push_back(frame);
    }

    /// Removes and yields every queued frame, oldest first.
    pub(crate) fn drain(&mut self) -> impl Iterator<Item = [f32; SPLIT_BAND_SIZE]> + '_ {
        self.frames.drain(..)
    }

    pub(crate) fn clear(&mut self) {
        self.frames.clear();
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.frames.len()
    }

    #[cfg(test)]
    pub(crate) fn dropped(&self) -> u64 {
        self.dropped
    }
}
