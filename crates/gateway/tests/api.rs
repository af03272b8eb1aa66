#![allow(clippy::unwrap_used, clippy::expect_used)]
//! End-to-end tests of the HTTP API against stub session and queue.

use std::{
    net::SocketAddr,
    sync::{
        Arc, Mutex,
        atomic::{AtomicBool, Ordering},
    },
};

use {
    async_trait::async_trait,
    relay_channels::{
        Error as SessionError, QrCode, SendReceipt, SessionHealthSnapshot, SessionOutbound,
        SessionStatus,
    },
    relay_delivery::{QueueStatus, StatusReporter},
    relay_gateway::{AppState, build_app},
    serde_json::{Value, json},
    tokio::net::TcpListener,
};

#[derive(Debug, Clone, PartialEq)]
enum Sent {
    Text { to: String, text: String },
    File { to: String, path: String, caption: Option<String> },
}

#[derive(Default)]
struct StubSession {
    connected: AtomicBool,
    qr: Mutex<Option<QrCode>>,
    sent: Mutex<Vec<Sent>>,
    fail_with: Mutex<Option<String>>,
}

impl StubSession {
    fn connected() -> Arc<Self> {
        let session = Self::default();
        session.connected.store(true, Ordering::SeqCst);
        Arc::new(session)
    }

    fn sent(&self) -> Vec<Sent> {
        self.sent.lock().unwrap().clone()
    }

    fn result(&self, to: &str, operation: &str) -> relay_channels::Result<SendReceipt> {
        if let Some(reason) = self.fail_with.lock().unwrap().clone() {
            return Err(SessionError::rejected(operation, reason));
        }
        Ok(SendReceipt {
            to: to.to_string(),
            message_id: Some("true_msg_1".into()),
        })
    }
}

#[async_trait]
impl SessionOutbound for StubSession {
    async fn send_text(&self, to: &str, text: &str) -> relay_channels::Result<SendReceipt> {
        self.sent.lock().unwrap().push(Sent::Text {
            to: to.into(),
            text: text.into(),
        });
        self.result(to, "send text")
    }

    async fn send_file(
        &self,
        to: &str,
        file_path: &str,
        caption: Option<&str>,
    ) -> relay_channels::Result<SendReceipt> {
        self.sent.lock().unwrap().push(Sent::File {
            to: to.into(),
            path: file_path.into(),
            caption: caption.map(str::to_string),
        });
        self.result(to, "send file")
    }
}

#[async_trait]
impl SessionStatus for StubSession {
    async fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    fn qr_code(&self) -> Option<QrCode> {
        self.qr.lock().unwrap().clone()
    }

    async fn probe(&self) -> SessionHealthSnapshot {
        SessionHealthSnapshot {
            connected: self.connected.load(Ordering::SeqCst),
            details: None,
        }
    }
}

struct FixedQueue(QueueStatus);

impl StatusReporter for FixedQueue {
    fn report(&self) -> QueueStatus {
        self.0
    }
}

async fn start(session: Arc<StubSession>, queue: QueueStatus) -> SocketAddr {
    let state = AppState::new(
        Arc::clone(&session) as Arc<dyn SessionOutbound>,
        session as Arc<dyn SessionStatus>,
        Arc::new(FixedQueue(queue)),
    );
    let app = build_app(state);
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .await
        .unwrap();
    });
    addr
}

fn idle() -> QueueStatus {
    QueueStatus {
        queue_length: 0,
        processing: false,
    }
}

async fn post(addr: SocketAddr, path: &str, body: Value) -> (u16, Value) {
    let resp = reqwest::Client::new()
        .post(format!("http://{addr}{path}"))
        .json(&body)
        .send()
        .await
        .unwrap();
    let status = resp.status().as_u16();
    (status, resp.json().await.unwrap())
}

async fn get(addr: SocketAddr, path: &str) -> (u16, Value) {
    let resp = reqwest::get(format!("http://{addr}{path}")).await.unwrap();
    let status = resp.status().as_u16();
    (status, resp.json().await.unwrap())
}

#[tokio::test]
async fn health_reports_version() {
    let addr = start(StubSession::connected(), idle()).await;
    let (status, body) = get(addr, "/health").await;
    assert_eq!(status, 200);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
}

#[tokio::test]
async fn qr_code_pending_then_available() {
    let session = Arc::new(StubSession::default());
    let addr = start(Arc::clone(&session), idle()).await;

    let (status, body) = get(addr, "/api/qr-code").await;
    assert_eq!(status, 202);
    assert_eq!(
        body,
        json!({
            "success": false,
            "message": "QR code not yet available or session not started.",
        })
    );

    *session.qr.lock().unwrap() = Some(QrCode {
        base64: "data:image/png;base64,AAAA".into(),
        ascii: "##".into(),
        url: "2@ref".into(),
        attempts: 1,
    });
    let (status, body) = get(addr, "/api/qr-code").await;
    assert_eq!(status, 200);
    assert_eq!(body["success"], true);
    assert_eq!(
        body["qrCode"],
        json!({
            "base64": "data:image/png;base64,AAAA",
            "ascii": "##",
            "url": "2@ref",
            "attempts": 1,
        })
    );
}

#[tokio::test]
async fn send_message_requires_both_fields() {
    let session = StubSession::connected();
    let addr = start(Arc::clone(&session), idle()).await;

    for body in [
        json!({ "to": "15550001111@c.us" }),
        json!({ "message": "hi" }),
        json!({ "to": "", "message": "hi" }),
        json!({}),
    ] {
        let (status, resp) = post(addr, "/api/send-message", body).await;
        assert_eq!(status, 400);
        assert_eq!(resp["success"], false);
        assert_eq!(resp["message"], "Phone number and message are required.");
    }
    assert!(session.sent().is_empty());
}

#[tokio::test]
async fn non_json_body_is_a_bad_request() {
    let addr = start(StubSession::connected(), idle()).await;
    let resp = reqwest::Client::new()
        .post(format!("http://{addr}/api/n8n-reply"))
        .body("to=1&reply=2")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 400);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(
        body["message"],
        "Recipient (to) and reply message are required."
    );
}

#[tokio::test]
async fn sends_are_refused_while_logged_out() {
    let session = Arc::new(StubSession::default());
    let addr = start(Arc::clone(&session), idle()).await;

    let (status, body) = post(
        addr,
        "/api/send-message",
        json!({ "to": "15550001111@c.us", "message": "hi" }),
    )
    .await;
    assert_eq!(status, 401);
    assert_eq!(
        body,
        json!({
            "success": false,
            "message": "WhatsApp session not authenticated or not ready.",
        })
    );

    let (status, body) = post(
        addr,
        "/api/send-media",
        json!({ "to": "15550001111@c.us", "filePath": "/srv/menu.pdf" }),
    )
    .await;
    assert_eq!(status, 401);
    assert_eq!(
        body["message"],
        "WhatsApp session not authenticated or not ready."
    );

    let (status, body) = post(
        addr,
        "/api/n8n-reply",
        json!({ "to": "15550001111@c.us", "reply": "hi" }),
    )
    .await;
    assert_eq!(status, 401);
    assert_eq!(
        body["message"],
        "WhatsApp session not authenticated or not ready to send reply."
    );
    assert!(session.sent().is_empty());
}

#[tokio::test]
async fn send_message_succeeds() {
    let session = StubSession::connected();
    let addr = start(Arc::clone(&session), idle()).await;

    let (status, body) = post(
        addr,
        "/api/send-message",
        json!({ "to": "15550001111@c.us", "message": "hello" }),
    )
    .await;
    assert_eq!(status, 200);
    assert_eq!(body["success"], true);
    assert_eq!(body["message"], "Message sent successfully.");
    assert_eq!(body["result"]["to"], "15550001111@c.us");
    assert_eq!(body["result"]["messageId"], "true_msg_1");
    assert_eq!(session.sent(), vec![Sent::Text {
        to: "15550001111@c.us".into(),
        text: "hello".into(),
    }]);
}

#[tokio::test]
async fn send_media_passes_path_and_caption() {
    let session = StubSession::connected();
    let addr = start(Arc::clone(&session), idle()).await;

    let (status, body) = post(
        addr,
        "/api/send-media",
        json!({ "to": "15550001111@c.us", "filePath": "/srv/menu.pdf", "caption": "today" }),
    )
    .await;
    assert_eq!(status, 200);
    assert_eq!(body["message"], "Media sent successfully.");
    assert_eq!(session.sent(), vec![Sent::File {
        to: "15550001111@c.us".into(),
        path: "/srv/menu.pdf".into(),
        caption: Some("today".into()),
    }]);

    let (status, body) = post(addr, "/api/send-media", json!({ "to": "15550001111@c.us" })).await;
    assert_eq!(status, 400);
    assert_eq!(body["message"], "Phone number and file path are required.");
}

#[tokio::test]
async fn n8n_reply_failure_is_a_server_error() {
    let session = StubSession::connected();
    *session.fail_with.lock().unwrap() = Some("chat not found".into());
    let addr = start(Arc::clone(&session), idle()).await;

    let (status, body) = post(
        addr,
        "/api/n8n-reply",
        json!({ "to": "15550001111@c.us", "reply": "Thanks!" }),
    )
    .await;
    assert_eq!(status, 500);
    assert_eq!(body["success"], false);
    let message = body["message"].as_str().unwrap();
    assert!(
        message.starts_with("Failed to send AI reply via WhatsApp: "),
        "{message}"
    );
    assert!(message.contains("chat not found"), "{message}");
}

#[tokio::test]
async fn n8n_reply_succeeds() {
    let session = StubSession::connected();
    let addr = start(Arc::clone(&session), idle()).await;

    let (status, body) = post(
        addr,
        "/api/n8n-reply",
        json!({ "to": "15550001111@c.us", "reply": "Thanks!" }),
    )
    .await;
    assert_eq!(status, 200);
    assert_eq!(body["message"], "AI reply sent successfully via WhatsApp.");
}

#[tokio::test]
async fn queue_status_uses_wire_names() {
    let addr = start(StubSession::connected(), QueueStatus {
        queue_length: 3,
        processing: true,
    })
    .await;
    let (status, body) = get(addr, "/api/queue-status").await;
    assert_eq!(status, 200);
    assert_eq!(body, json!({ "queueLength": 3, "processing": true }));
}

#[tokio::test]
async fn cors_preflight_is_allowed() {
    let addr = start(StubSession::connected(), idle()).await;
    let resp = reqwest::Client::new()
        .request(
            reqwest::Method::OPTIONS,
            format!("http://{addr}/api/send-message"),
        )
        .header("Origin", "http://localhost:3000")
        .header("Access-Control-Request-Method", "POST")
        .send()
        .await
        .unwrap();
    assert!(resp.status().is_success());
    assert_eq!(
        resp.headers()
            .get("access-control-allow-origin")
            .and_then(|v| v.to_str().ok()),
        Some("*")
    );
}
