use std::collections::VecDeque;

/// Fixed-capacity moving window; the oldest value is evicted once full.
#[derive(Debug, Clone)]
pub struct MovingWindow {
    values: VecDeque<f32>,
    capacity: usize,
}

impl MovingWindow {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            values: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn push(&mut self, value: f32) {
        if self.values.len() >= self.capacity {
            self.values.pop_front();
        }
        self.values.push_back(value);
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.values.len() >= self.capacity
    }

    /// Mean of the window, 0 when empty.
    pub fn average(&self) -> f32 {
        if self.values.is_empty() {
            return 0.0;
        }
        self.values.iter().sum::<f32>() / self.values.len() as f32
    }

    /// Population variance of the window, 0 when empty.
    pub fn variance(&self) -> f32 {
        if self.values.is_empty() {
            return 0.0;
        }
        let mean = self.average();
        self.values
            .iter()
            .map(|value| (value - mean) * (value - mean))
            .sum::<f32>()
            / self.values.len() as f32
    }

    pub fn iter(&self) -> impl Iterator<Item = &f32> {
        self.values.iter()
    }

    pub fn clear(&mut self) {
        self.values.clear();
    }
}
