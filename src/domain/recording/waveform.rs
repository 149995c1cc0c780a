//! Bounded waveform history

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

/// Default number of amplitude samples kept for visualization
pub const DEFAULT_WAVEFORM_CAPACITY: usize = 100;

/// Ring buffer of recent amplitude samples; the oldest sample is evicted
/// once capacity is reached.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WaveformBuffer {
    capacity: usize,
    samples: VecDeque<f32>,
}

impl WaveformBuffer {
    /// A zero capacity is bumped to one so the buffer can always hold
    /// the latest sample.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            samples: VecDeque::with_capacity(capacity),
        }
    }

    /// Append a sample, clamped into [0, 1]. NaN is stored as silence.
    pub fn push(&mut self, sample: f32) {
        if self.samples.len() == self.capacity {
            self.samples.pop_front();
        }
        self.samples.push_back(normalize_amplitude(sample));
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn latest(&self) -> Option<f32> {
        self.samples.back().copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = f32> + '_ {
        self.samples.iter().copied()
    }

    pub fn to_vec(&self) -> Vec<f32> {
        self.samples.iter().copied().collect()
    }

    pub fn clear(&mut self) {
        self.samples.clear();
    }
}

impl Default for WaveformBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_WAVEFORM_CAPACITY)
    }
}

/// Clamp a raw amplitude reading into [0, 1]
pub fn normalize_amplitude(sample: f32) -> f32 {
    if sample.is_nan() {
        0.0
    } else {
        sample.clamp(0.0, 1.0)
    }
}
