use super::window::MovingWindow;

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

use crate::log_warn;

/// Weight given to gravity history by the low-pass filter.
pub const GRAVITY_ALPHA: f32 = 0.8;
/// Base scale applied to the linear-acceleration magnitude before sensitivity gain.
pub const MOTION_SCALE: f32 = 0.1;
pub const MOTION_WINDOW_SIZE: usize = 30;
pub const SIGNIFICANT_MOTION_THRESHOLD: f32 = 0.3;
pub const MAX_MOTION: f32 = 1.0;

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct MotionReading {
    /// Scaled magnitude of the latest event.
    pub magnitude: f32,
    /// Window average, clamped to `[0, MAX_MOTION]`.
    pub average: f32,
    /// Variance of the scaled magnitudes in the window.
    pub variance: f32,
    pub is_significant: bool,
}

/// Gravity-removing motion filter fed with raw accelerometer vectors.
#[derive(Debug, Clone)]
pub struct MotionFilter {
    gravity: [f32; 3],
    window: MovingWindow,
    gain: f32,
    last: MotionReading,
    last_significant_motion_ms: Option<i64>,
}

impl MotionFilter {
    pub fn new(gain: f32) -> Self {
        Self {
            gravity: [0.0; 3],
            window: MovingWindow::new(MOTION_WINDOW_SIZE),
            gain,
            last: MotionReading::default(),
            last_significant_motion_ms: None,
        }
    }

    pub fn process(&mut self, raw: [f32; 3], now_ms: i64) -> MotionReading {
        let raw = sanitize_vector(raw);

        let mut linear = [0.0f32; 3];
        for axis in 0..3 {
            self.gravity[axis] =
                GRAVITY_ALPHA * self.gravity[axis] + (1.0 - GRAVITY_ALPHA) * raw[axis];
            linear[axis] = raw[axis] - self.gravity[axis];
        }

        let norm = linear.iter().map(|v| v * v).sum::<f32>().sqrt();
        let magnitude = norm * MOTION_SCALE * self.gain;
        self.window.push(magnitude);

        let average = self.window.average().clamp(0.0, MAX_MOTION);
        let is_significant = average > SIGNIFICANT_MOTION_THRESHOLD;
        if is_significant {
            self.last_significant_motion_ms = Some(now_ms);
        }

        self.last = MotionReading {
            magnitude,
            average,
            variance: self.window.variance(),
            is_significant,
        };
        self.last
    }

    pub fn last(&self) -> MotionReading {
        self.last
    }

    pub fn gravity(&self) -> [f32; 3] {
        self.gravity
    }

    pub fn last_significant_motion_ms(&self) -> Option<i64> {
        self.last_significant_motion_ms
    }

    pub fn reset(&mut self) {
        *self = Self::new(self.gain);
    }
}

fn sanitize_vector(raw: [f32; 3]) -> [f32; 3] {
    if raw.iter().all(|v| v.is_finite()) {
        return raw;
    }
    log_warn!("Dropping non-finite accelerometer components: {raw:?}");
    raw.map(|v| if v.is_finite() { v } else { 0.0 })
}

#[cfg(test)]
mod tests {
    use super::*;

    const RESTING: [f32; 3] = [0.3, -0.2, 9.81];

    #[test]
    fn gravity_converges_to_constant_input() {
        let mut filter = MotionFilter::new(1.0);
        let mut reading = MotionReading::default();
        for tick in 0..300 {
            reading = filter.process(RESTING, tick);
        }

        let gravity = filter.gravity();
        for axis in 0..3 {
            assert!((gravity[axis] - RESTING[axis]).abs() < 1e-4);
        }
        assert!(reading.magnitude < 1e-4);
        assert!(reading.average < 1e-4);
        assert!(!reading.is_significant);
    }

    #[test]
    fn higher_sensitivity_yields_larger_motion() {
        let stream: Vec<[f32; 3]> = (0..60)
            .map(|i| if i % 2 == 0 { [0.0, 0.0, 9.8] } else { [0.0, 0.6, 9.8] })
            .collect();

        let mut low = MotionFilter::new(0.2);
        let mut high = MotionFilter::new(2.0);
        let mut low_reading = MotionReading::default();
        let mut high_reading = MotionReading::default();
        for (tick, raw) in stream.iter().enumerate() {
            low_reading = low.process(*raw, tick as i64);
            high_reading = high.process(*raw, tick as i64);
        }

        assert!(high_reading.average > low_reading.average);
        assert!(high_reading.average < MAX_MOTION);
    }

    #[test]
    fn vigorous_shaking_is_significant() {
        let mut filter = MotionFilter::new(1.0);
        let mut reading = MotionReading::default();
        for tick in 0..MOTION_WINDOW_SIZE as i64 {
            let raw = if tick % 2 == 0 { [12.0, -8.0, 20.0] } else { [-12.0, 8.0, -4.0] };
            reading = filter.process(raw, 1_000 + tick);
        }
        assert!(reading.is_significant);
        assert!(reading.average <= MAX_MOTION);
        assert_eq!(filter.last_significant_motion_ms(), Some(1_000 + 29));
    }

    #[test]
    fn non_finite_components_are_zeroed() {
        let mut filter = MotionFilter::new(1.0);
        let reading = filter.process([f32::NAN, 0.0, f32::INFINITY], 0);
        assert!(reading.magnitude.is_finite());
        assert_eq!(reading.magnitude, 0.0);
    }

    #[test]
    fn reset_clears_filter_state() {
        let mut filter = MotionFilter::new(1.0);
        filter.process([5.0, 5.0, 5.0], 0);
        filter.reset();
        assert_eq!(filter.gravity(), [0.0; 3]);
        assert_eq!(filter.last(), MotionReading::default());
    }
}
