//! Dataset loaders.

pub mod euroc;
