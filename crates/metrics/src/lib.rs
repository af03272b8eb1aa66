//! Metrics collection and export for wa-relay.
//!
//! Everything records through the `metrics` crate facade. With the
//! `prometheus` feature the recorder is a Prometheus exporter whose text
//! output is served on `/metrics`; without it all recordings are discarded.
//!
//! ```rust,ignore
//! use relay_metrics::{counter, delivery, labels};
//!
//! counter!(delivery::DELIVERED_TOTAL).increment(1);
//! counter!(delivery::ABANDONED_TOTAL, labels::REASON => "retries_exhausted").increment(1);
//! ```

mod definitions;
pub mod error;
mod recorder;

pub use {
    definitions::*,
    error::{Error, Result},
    recorder::{MetricsHandle, MetricsRecorderConfig, init_metrics},
};

// Re-export metrics macros for convenience
pub use metrics::{counter, gauge, histogram};
