//! HTTP surface of the relay.
//!
//! Lets an operator fetch the login QR code, lets the workflow send replies
//! through the WhatsApp session, and exposes the delivery queue status.

pub mod api_routes;
pub mod error;
#[cfg(feature = "metrics")]
pub mod metrics_middleware;
#[cfg(feature = "prometheus")]
pub mod metrics_routes;
pub mod server;

pub use {
    error::ApiError,
    server::{AppState, build_app, start_server},
};
