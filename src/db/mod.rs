pub mod connection;
pub mod helpers;
pub mod memory;
mod migrations;
pub mod models;
mod repositories;
pub mod store;

pub use connection::Database;
pub use memory::MemoryStore;
pub use models::{PhaseDuration, PhaseStat, Sample, SessionSummaryRow};
pub use store::SampleStore;
