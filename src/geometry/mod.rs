//! Geometry utilities: rigid transforms.

pub mod rigid3;

pub use rigid3::Rigid3;
