mod clock;
mod engine;
mod schedule;

pub use clock::{Clock, ManualClock, SystemClock};
pub use engine::{RunState, TickOutcome, TimerAction, TimerEngine, TimerRecord};
pub use schedule::{DurationConfig, ModeCycle, TimerMode, MAX_DURATION_MIN, MIN_DURATION_MIN};
