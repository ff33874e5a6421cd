#![forbid(unsafe_code)]

pub mod model;
pub mod progression;
pub mod time;

pub use progression::{ProgressionError, ProgressionOutcome, detect_finished, next_action};
pub use time::{Clock, fixed_clock, fixed_now};
