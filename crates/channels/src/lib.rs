//! Session-facing seams of the relay.
//!
//! The WhatsApp session implements [`SessionOutbound`], [`SessionStatus`] and
//! [`MediaFetcher`], and pushes every arriving [`InboundMessage`] into an
//! [`InboundSender`]. The delivery core and the HTTP gateway only see these
//! traits.

pub mod error;
pub mod message;
pub mod session;

pub use {
    error::{Error, Result},
    message::{InboundMessage, InboundReceiver, InboundSender, inbound_channel},
    session::{
        MediaContent, MediaFetcher, QrCode, SendReceipt, SessionHealthSnapshot, SessionOutbound,
        SessionStatus,
    },
};
