//! WhatsApp Web session for the relay.
//!
//! The WhatsApp Web protocol itself runs in a Node.js sidecar process. This
//! crate spawns and supervises that process, talks to it over a local
//! WebSocket, and exposes it to the rest of the relay through the
//! `relay-channels` session traits.

pub mod process;
pub mod session;
pub mod sidecar;
pub mod state;
pub mod types;

pub use {
    process::{SidecarConfig, SidecarProcess, find_sidecar_dir, start_sidecar},
    session::WhatsAppSession,
    sidecar::{DEFAULT_SIDECAR_PORT, SidecarHandle, connect_with_retry},
    state::{ConnectionState, SessionState},
    types::{GatewayMessage, SidecarMessage},
};
