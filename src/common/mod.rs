//! Small shared types.

pub mod time;

pub use time::{Stamp, Time, duration_from_secs_saturating};
