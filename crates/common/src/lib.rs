//! Small utilities shared by the relay crates.

pub mod time;

pub use time::{unix_now, unix_now_ms};
