//! Fixed-size moving average used to smooth each posture metric.

use std::collections::VecDeque;

/// Number of samples averaged per metric channel
pub const SMOOTHING_WINDOW: usize = 5;

/// Moving average over the most recent samples, oldest evicted first
#[derive(Debug, Clone)]
pub struct SmoothingBuffer {
    samples: VecDeque<f64>,
    capacity: usize,
}

impl SmoothingBuffer {
    pub fn new() -> Self {
        Self::with_capacity(SMOOTHING_WINDOW)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            samples: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Push a sample, then return the mean including it.
    pub fn push(&mut self, value: f64) -> f64 {
        if self.samples.len() == self.capacity {
            self.samples.pop_front();
        }
        self.samples.push_back(value);
        self.mean()
    }

    /// Mean of the retained samples (0.0 when empty)
    pub fn mean(&self) -> f64 {
        if self.samples.is_empty() {
            return 0.0;
        }
        self.samples.iter().sum::<f64>() / self.samples.len() as f64
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Whether the window has been filled
    pub fn is_full(&self) -> bool {
        self.samples.len() >= self.capacity
    }

    pub fn clear(&mut self) {
        self.samples.clear();
    }
}

impl Default for SmoothingBuffer {
    fn default() -> Self {
        Self::new()
    }
}
