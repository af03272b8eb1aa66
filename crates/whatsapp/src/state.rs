//! Login state of the WhatsApp session, driven by sidecar events.

use std::sync::{Arc, RwLock};

use tracing::{debug, info, warn};

use relay_channels::{QrCode, SessionHealthSnapshot};

use crate::types::SidecarMessage;

/// Where the session is in the link-and-login flow.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    /// Login sent, no QR produced yet.
    WaitingForQr,
    /// A QR code is waiting to be scanned.
    QrReceived(QrCode),
    Connected {
        phone_number: Option<String>,
    },
}

impl ConnectionState {
    #[must_use]
    pub fn is_connected(&self) -> bool {
        matches!(self, Self::Connected { .. })
    }

    #[must_use]
    pub fn qr_code(&self) -> Option<&QrCode> {
        match self {
            Self::QrReceived(qr) => Some(qr),
            _ => None,
        }
    }

    #[must_use]
    pub fn health(&self) -> SessionHealthSnapshot {
        match self {
            Self::Connected { phone_number } => SessionHealthSnapshot {
                connected: true,
                details: phone_number.as_ref().map(|p| format!("Phone: {p}")),
            },
            Self::QrReceived(_) => SessionHealthSnapshot {
                connected: false,
                details: Some("waiting for QR code scan".into()),
            },
            Self::WaitingForQr => SessionHealthSnapshot {
                connected: false,
                details: Some("generating QR code".into()),
            },
            Self::Disconnected => SessionHealthSnapshot {
                connected: false,
                details: Some("disconnected".into()),
            },
        }
    }
}

/// Shared, lock-protected session state.
#[derive(Debug, Clone)]
pub struct SessionState {
    name: String,
    inner: Arc<RwLock<ConnectionState>>,
}

impl SessionState {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            inner: Arc::new(RwLock::new(ConnectionState::Disconnected)),
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn get(&self) -> ConnectionState {
        self.inner
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn set(&self, state: ConnectionState) {
        *self.inner.write().unwrap_or_else(|e| e.into_inner()) = state;
    }

    /// Apply a lifecycle event addressed to this session.
    ///
    /// Events for other sessions and request replies are ignored. Returns
    /// whether the state changed.
    pub fn apply(&self, message: &SidecarMessage) -> bool {
        let next = match message {
            SidecarMessage::Qr { session, qr } if session == &self.name => {
                info!(
                    session = %self.name,
                    attempts = qr.attempts,
                    "QR code received, scan it with the WhatsApp app:\n{}",
                    qr.ascii
                );
                ConnectionState::QrReceived(qr.clone())
            },
            SidecarMessage::Connected {
                session,
                phone_number,
            } if session == &self.name => {
                info!(session = %self.name, ?phone_number, "whatsapp web session logged in");
                ConnectionState::Connected {
                    phone_number: phone_number.clone(),
                }
            },
            SidecarMessage::Disconnected { session, reason } if session == &self.name => {
                warn!(session = %self.name, ?reason, "whatsapp web session disconnected");
                ConnectionState::Disconnected
            },
            SidecarMessage::LoggedOut { session } if session == &self.name => {
                info!(session = %self.name, "whatsapp web session logged out");
                ConnectionState::Disconnected
            },
            _ => return false,
        };

        let mut state = self.inner.write().unwrap_or_else(|e| e.into_inner());
        if *state == next {
            return false;
        }
        debug!(session = %self.name, from = ?*state, to = ?next, "session state transition");
        *state = next;
        true
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    fn qr(attempts: u32) -> QrCode {
        QrCode {
            base64: "data:image/png;base64,AAAA".into(),
            ascii: "█▀█".into(),
            url: "2@pairing".into(),
            attempts,
        }
    }

    #[test]
    fn qr_then_login_clears_qr() {
        let state = SessionState::new("bot");
        state.set(ConnectionState::WaitingForQr);

        assert!(state.apply(&SidecarMessage::Qr {
            session: "bot".into(),
            qr: qr(1),
        }));
        assert_eq!(state.get().qr_code().map(|q| q.attempts), Some(1));

        assert!(state.apply(&SidecarMessage::Connected {
            session: "bot".into(),
            phone_number: Some("15550001111".into()),
        }));
        let current = state.get();
        assert!(current.is_connected());
        assert!(current.qr_code().is_none());
    }

    #[test]
    fn refreshed_qr_replaces_previous() {
        let state = SessionState::new("bot");
        state.apply(&SidecarMessage::Qr {
            session: "bot".into(),
            qr: qr(1),
        });
        state.apply(&SidecarMessage::Qr {
            session: "bot".into(),
            qr: qr(2),
        });
        assert_eq!(state.get().qr_code().unwrap().attempts, 2);
    }

    #[test]
    fn events_for_other_sessions_are_ignored() {
        let state = SessionState::new("bot");
        assert!(!state.apply(&SidecarMessage::Connected {
            session: "someone-else".into(),
            phone_number: None,
        }));
        assert_eq!(state.get(), ConnectionState::Disconnected);
    }

    #[test]
    fn logout_and_disconnect_return_to_disconnected() {
        let state = SessionState::new("bot");
        state.set(ConnectionState::Connected { phone_number: None });
        assert!(state.apply(&SidecarMessage::LoggedOut {
            session: "bot".into(),
        }));
        assert_eq!(state.get(), ConnectionState::Disconnected);

        state.set(ConnectionState::Connected { phone_number: None });
        assert!(state.apply(&SidecarMessage::Disconnected {
            session: "bot".into(),
            reason: Some("conflict".into()),
        }));
        assert!(!state.get().is_connected());
    }

    #[test]
    fn health_reflects_state() {
        let connected = ConnectionState::Connected {
            phone_number: Some("15550001111".into()),
        }
        .health();
        assert!(connected.connected);
        assert_eq!(connected.details.as_deref(), Some("Phone: 15550001111"));

        let waiting = ConnectionState::QrReceived(qr(1)).health();
        assert!(!waiting.connected);
        assert_eq!(waiting.details.as_deref(), Some("waiting for QR code scan"));
    }
}
