pub mod classifier;
pub mod config;
pub mod state;

pub use classifier::{PhaseClassifier, PhaseUpdate};
pub use config::ClassifierConfig;
pub use state::{PhaseState, SleepPhase};
