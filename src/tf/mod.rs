//! Coordinate frame tree: a time-indexed transform buffer plus the listener
//! thread that keeps it fed.

mod buffer;
mod error;
pub mod listener;
pub mod time_cache;

pub use buffer::{DEFAULT_CACHE_DURATION, LookupTransform, TransformBuffer};
pub use error::TfError;
pub use listener::TransformListener;
