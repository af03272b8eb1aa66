#![allow(clippy::unwrap_used, clippy::expect_used)]
//! Session behaviour against an in-process WebSocket server that speaks the
//! sidecar protocol.

use std::time::Duration;

use {
    futures::{SinkExt, StreamExt},
    relay_channels::{
        InboundReceiver, MediaFetcher, SessionOutbound, SessionStatus, inbound_channel,
    },
    relay_config::SessionConfig,
    relay_whatsapp::{ConnectionState, WhatsAppSession},
    serde_json::{Value, json},
    tokio::{net::TcpListener, sync::mpsc},
    tokio_tungstenite::{accept_async, tungstenite::Message},
};

/// Test side of the fake sidecar: frames the session sent, and a way to
/// push frames back.
struct FakeSidecar {
    port: u16,
    from_session: mpsc::UnboundedReceiver<Value>,
    to_session: mpsc::UnboundedSender<Value>,
}

impl FakeSidecar {
    async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let (from_tx, from_session) = mpsc::unbounded_channel();
        let (to_session, mut to_rx) = mpsc::unbounded_channel::<Value>();

        tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let ws = accept_async(stream).await.unwrap();
            let (mut sink, mut reader) = ws.split();
            loop {
                tokio::select! {
                    frame = reader.next() => match frame {
                        Some(Ok(Message::Text(text))) => {
                            let value: Value = serde_json::from_str(text.as_str()).unwrap();
                            let _ = from_tx.send(value);
                        },
                        Some(Ok(_)) => {},
                        _ => break,
                    },
                    outgoing = to_rx.recv() => match outgoing {
                        Some(value) => {
                            sink.send(Message::Text(value.to_string().into())).await.unwrap();
                        },
                        None => break,
                    },
                }
            }
        });

        Self {
            port,
            from_session,
            to_session,
        }
    }

    async fn next_frame(&mut self) -> Value {
        tokio::time::timeout(Duration::from_secs(5), self.from_session.recv())
            .await
            .expect("session sent nothing")
            .expect("fake sidecar stopped")
    }

    fn push(&self, value: Value) {
        self.to_session.send(value).unwrap();
    }
}

async fn eventually(mut check: impl FnMut() -> bool) {
    for _ in 0..100 {
        if check() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("condition never became true");
}

fn config(port: u16) -> SessionConfig {
    SessionConfig {
        name: "bot".into(),
        sidecar_port: port,
        auto_start_sidecar: false,
        ..Default::default()
    }
}

/// Start a session and walk it through QR and login.
async fn logged_in(sidecar: &mut FakeSidecar) -> (WhatsAppSession, InboundReceiver) {
    let (tx, rx) = inbound_channel();
    let session = WhatsAppSession::new(config(sidecar.port), tx);
    session.start().await.unwrap();

    let login = sidecar.next_frame().await;
    assert_eq!(login["type"], "login");
    assert_eq!(login["session"], "bot");

    sidecar.push(json!({ "type": "connected", "session": "bot", "phone_number": "15550001111" }));
    eventually(|| session.state().is_connected()).await;
    (session, rx)
}

#[tokio::test]
async fn qr_code_is_exposed_until_login() {
    let mut sidecar = FakeSidecar::start().await;
    let (tx, _rx) = inbound_channel();
    let session = WhatsAppSession::new(config(sidecar.port), tx);
    session.start().await.unwrap();
    assert_eq!(session.state(), ConnectionState::WaitingForQr);
    sidecar.next_frame().await;

    sidecar.push(json!({
        "type": "qr",
        "session": "bot",
        "qr": { "base64": "data:image/png;base64,AAAA", "ascii": "##", "url": "2@ref", "attempts": 1 },
    }));
    eventually(|| session.qr_code().is_some()).await;
    assert_eq!(session.qr_code().unwrap().url, "2@ref");
    assert!(!session.is_connected().await);

    sidecar.push(json!({ "type": "connected", "session": "bot" }));
    eventually(|| session.qr_code().is_none()).await;
    assert!(session.is_connected().await);
}

#[tokio::test]
async fn send_text_waits_for_matching_result() {
    let mut sidecar = FakeSidecar::start().await;
    let (session, _rx) = logged_in(&mut sidecar).await;

    let send = tokio::spawn(async move {
        let receipt = session.send_text("15550002222@c.us", "hello").await;
        (session, receipt)
    });

    let request = sidecar.next_frame().await;
    assert_eq!(request["type"], "send_text");
    assert_eq!(request["text"], "hello");
    // A reply for some other request must not complete this one.
    sidecar.push(json!({ "type": "send_result", "request_id": "stale", "success": true }));
    sidecar.push(json!({
        "type": "send_result",
        "request_id": request["request_id"],
        "success": true,
        "message_id": "true_15550002222@c.us_XYZ",
    }));

    let (_session, receipt) = send.await.unwrap();
    let receipt = receipt.unwrap();
    assert_eq!(receipt.to, "15550002222@c.us");
    assert_eq!(receipt.message_id.as_deref(), Some("true_15550002222@c.us_XYZ"));
}

#[tokio::test]
async fn failed_send_is_reported_as_rejection() {
    let mut sidecar = FakeSidecar::start().await;
    let (session, _rx) = logged_in(&mut sidecar).await;

    let send = tokio::spawn(async move {
        session
            .send_file("15550002222@c.us", "/srv/files/menu.pdf", Some("menu"))
            .await
    });
    let request = sidecar.next_frame().await;
    assert_eq!(request["type"], "send_file");
    assert_eq!(request["caption"], "menu");
    sidecar.push(json!({
        "type": "send_result",
        "request_id": request["request_id"],
        "success": false,
        "error": "file not found",
    }));

    let err = send.await.unwrap().unwrap_err();
    assert!(err.to_string().contains("file not found"), "{err}");
}

#[tokio::test]
async fn unanswered_request_times_out() {
    let mut sidecar = FakeSidecar::start().await;
    let (tx, _rx) = inbound_channel();
    let session = WhatsAppSession::new(config(sidecar.port), tx)
        .with_request_timeouts(Duration::from_millis(200), Duration::from_millis(200));
    session.start().await.unwrap();
    sidecar.next_frame().await;
    sidecar.push(json!({ "type": "connected", "session": "bot" }));
    eventually(|| session.state().is_connected()).await;

    let err = session.send_text("15550002222@c.us", "hi").await.unwrap_err();
    assert!(matches!(err, relay_channels::Error::Timeout { .. }), "{err}");
}

#[tokio::test]
async fn inbound_messages_reach_the_channel_and_media_downloads() {
    let mut sidecar = FakeSidecar::start().await;
    let (session, mut rx) = logged_in(&mut sidecar).await;

    sidecar.push(json!({
        "type": "inbound_message",
        "session": "bot",
        "message": {
            "id": "wamid-7",
            "from": "15550003333@c.us",
            "type": "image",
            "mimeType": "image/png",
            "timestamp": 1_700_000_000,
        },
    }));
    let message = tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(message.id, "wamid-7");

    let fetch = tokio::spawn(async move { session.fetch_media(&message).await });
    let request = sidecar.next_frame().await;
    assert_eq!(request["type"], "download_media");
    assert_eq!(request["message_id"], "wamid-7");
    sidecar.push(json!({
        "type": "media_result",
        "request_id": request["request_id"],
        "success": true,
        "data": "iVBORw==",
        "mime_type": "image/png",
    }));

    let media = fetch.await.unwrap().unwrap();
    assert_eq!(media.data, b"\x89PNG");
    assert_eq!(media.mime_type.as_deref(), Some("image/png"));
}

#[tokio::test]
async fn logout_event_disconnects() {
    let mut sidecar = FakeSidecar::start().await;
    let (session, _rx) = logged_in(&mut sidecar).await;

    sidecar.push(json!({ "type": "logged_out", "session": "bot" }));
    eventually(|| !session.state().is_connected()).await;
    let err = session.send_text("15550002222@c.us", "hi").await.unwrap_err();
    assert!(err.is_unavailable());
}
