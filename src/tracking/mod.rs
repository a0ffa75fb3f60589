//! Live tracking: one tick loop per session turns sensor input into phases and
//! samples, a writer task persists them, and the controller owns the lifecycle.

pub mod alarm;
pub mod clock;
pub mod controller;
pub mod events;
pub mod loop_worker;
pub mod recorder;
pub mod sensors;
pub mod state;
pub mod writer;

pub use alarm::AlarmSchedule;
pub use clock::{Clock, SystemClock};
pub use controller::{TrackingConfig, TrackingController};
pub use events::{StopReason, TrackingEvent, WakeReason};
pub use recorder::SampleRecorder;
pub use sensors::{AudioSource, MotionSource, SensorHub};
pub use state::{TrackingState, TrackingStatus};
