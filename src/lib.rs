//! Sleep tracking core: turns accelerometer and microphone readings into a live
//! sleep-phase state machine, persists per-tick samples, and scores finished
//! sessions.

pub mod analysis;
pub mod db;
pub mod error;
pub mod phase;
pub mod sessions;
pub mod settings;
pub mod signal;
pub mod tracking;
pub mod utils;

pub use analysis::{QualityLabel, QualityMetrics, SessionSummary};
pub use db::{Database, MemoryStore, Sample, SampleStore};
pub use error::TrackingError;
pub use phase::{ClassifierConfig, PhaseClassifier, SleepPhase};
pub use sessions::SessionSelector;
pub use settings::{SettingsStore, TrackingSettings};
pub use signal::{SignalFrame, SignalPreprocessor};
pub use tracking::{
    AudioSource, MotionSource, SensorHub, StopReason, TrackingConfig, TrackingController,
    TrackingEvent, TrackingState, WakeReason,
};
pub use utils::logging::init_logging;
