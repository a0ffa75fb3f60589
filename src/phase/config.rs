/// Tunable thresholds for the phase classifier.
///
/// These are heuristic constants, not derived values; defaults reproduce the
/// behaviour the rest of the app was tuned against.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassifierConfig {
    /// Above this smoothed motion the sleeper is considered awake.
    pub significant_motion: f32,
    /// Above this smoothed audio level the sleeper is considered awake.
    pub high_noise: f32,

    /// Deep sleep requires motion and audio both under these.
    pub deep_motion: f32,
    pub deep_noise: f32,

    /// Light sleep requires motion under this.
    pub light_motion: f32,

    /// REM requires motion variance above this...
    pub rem_variance: f32,
    /// ...after at least this long in the previous phase.
    pub rem_min_dwell_ms: i64,

    /// Qualifying readings needed before switching phase
    pub deep_streak: u32,
    pub rem_streak: u32,
    pub light_streak: u32,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            significant_motion: 0.3,
            high_noise: 0.4,
            deep_motion: 0.1,
            deep_noise: 0.15,
            light_motion: 0.2,
            rem_variance: 0.25,
            rem_min_dwell_ms: 45 * 60 * 1000,
            deep_streak: 10,
            rem_streak: 5,
            light_streak: 5,
        }
    }
}
