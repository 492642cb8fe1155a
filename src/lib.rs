pub mod bridge;
pub mod common;
pub mod config;
pub mod geometry;
pub mod io;
pub mod msg;
pub mod tf;
