//! Persisted timers and the task that fires them.

mod clock;
mod driver;
mod registry;

pub use clock::{Clock, ManualClock, SystemClock};
pub use driver::TimerDriver;
pub use registry::{TimerEntry, TimerFire, TimerInfo, TimerRegistry};
