//! Security utilities for the protocol engines.

pub mod constant_time;

pub use constant_time::{constant_time_eq, constant_time_is_zero};
