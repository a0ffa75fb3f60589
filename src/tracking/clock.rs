use chrono::Utc;

/// Wall-clock source for sample timestamps, in epoch millis.
pub trait Clock: Send + Sync {
    fn now_ms(&self) -> i64;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> i64 {
        Utc::now().timestamp_millis()
    }
}

/// Epoch clock driven by tokio's (pausable) time, so tests control both ticks
/// and timestamps.
#[cfg(test)]
pub(crate) struct TokioClock {
    origin: tokio::time::Instant,
    base_ms: i64,
}

#[cfg(test)]
impl TokioClock {
    pub(crate) fn new(base_ms: i64) -> Self {
        Self {
            origin: tokio::time::Instant::now(),
            base_ms,
        }
    }
}

#[cfg(test)]
impl Clock for TokioClock {
    fn now_ms(&self) -> i64 {
        self.base_ms + self.origin.elapsed().as_millis() as i64
    }
}
