pub mod aggregates;
pub mod sample;

pub use aggregates::{PhaseDuration, PhaseStat, SessionSummaryRow};
pub use sample::Sample;
