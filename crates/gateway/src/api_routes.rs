//! Session control and outbound send endpoints.
//!
//! `/api/send-message`, `/api/send-media` and `/api/n8n-reply` share one
//! contract: 400 when a required field is missing or empty, 401 while the
//! session is not logged in, 500 when the send fails, otherwise
//! `{ "success": true, "message", "result" }`.

use std::future::Future;

use {
    axum::{
        Json,
        extract::{State, rejection::JsonRejection},
        http::StatusCode,
        response::IntoResponse,
    },
    serde::Deserialize,
    serde_json::{Value, json},
    tracing::{debug, info, warn},
};

#[cfg(feature = "metrics")]
use relay_metrics::{counter, labels, outbound as outbound_metrics};

use relay_channels::SendReceipt;

use crate::{error::ApiError, server::AppState};

/// Per-endpoint wording and metric label.
struct SendRoute {
    kind: &'static str,
    missing: &'static str,
    not_ready: &'static str,
    failed: &'static str,
    sent: &'static str,
}

const SEND_MESSAGE: SendRoute = SendRoute {
    kind: "text",
    missing: "Phone number and message are required.",
    not_ready: "WhatsApp session not authenticated or not ready.",
    failed: "Failed to send message",
    sent: "Message sent successfully.",
};

const SEND_MEDIA: SendRoute = SendRoute {
    kind: "media",
    missing: "Phone number and file path are required.",
    not_ready: "WhatsApp session not authenticated or not ready.",
    failed: "Failed to send media",
    sent: "Media sent successfully.",
};

const N8N_REPLY: SendRoute = SendRoute {
    kind: "reply",
    missing: "Recipient (to) and reply message are required.",
    not_ready: "WhatsApp session not authenticated or not ready to send reply.",
    failed: "Failed to send AI reply via WhatsApp",
    sent: "AI reply sent successfully via WhatsApp.",
};

#[derive(Debug, Default, Deserialize)]
pub struct SendMessageRequest {
    pub to: Option<String>,
    pub message: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendMediaRequest {
    pub to: Option<String>,
    /// Path (or URL) the session process can read.
    pub file_path: Option<String>,
    pub caption: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ReplyRequest {
    pub to: Option<String>,
    pub reply: Option<String>,
}

/// A missing, unparseable or non-JSON body reads as an empty request so the
/// handler answers with its own 400.
fn body_or_default<T: Default>(body: Result<Json<T>, JsonRejection>) -> T {
    match body {
        Ok(Json(request)) => request,
        Err(rejection) => {
            debug!(error = %rejection, "unreadable request body");
            T::default()
        },
    }
}

fn present(field: &Option<String>) -> Option<&str> {
    field.as_deref().filter(|v| !v.is_empty())
}

/// `GET /api/qr-code`
pub async fn qr_code_handler(State(state): State<AppState>) -> impl IntoResponse {
    match state.session.qr_code() {
        Some(qr) => Json(json!({ "success": true, "qrCode": qr })).into_response(),
        None => (
            StatusCode::ACCEPTED,
            Json(json!({
                "success": false,
                "message": "QR code not yet available or session not started.",
            })),
        )
            .into_response(),
    }
}

/// `POST /api/send-message`
pub async fn send_message_handler(
    State(state): State<AppState>,
    body: Result<Json<SendMessageRequest>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let request = body_or_default(body);
    let (Some(to), Some(message)) = (present(&request.to), present(&request.message)) else {
        return Err(ApiError::MissingFields(SEND_MESSAGE.missing));
    };
    info!(%to, "sending text message");
    dispatch(&state, &SEND_MESSAGE, state.outbound.send_text(to, message)).await
}

/// `POST /api/send-media`
pub async fn send_media_handler(
    State(state): State<AppState>,
    body: Result<Json<SendMediaRequest>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let request = body_or_default(body);
    let (Some(to), Some(file_path)) = (present(&request.to), present(&request.file_path)) else {
        return Err(ApiError::MissingFields(SEND_MEDIA.missing));
    };
    info!(%to, %file_path, "sending media");
    let send = state
        .outbound
        .send_file(to, file_path, present(&request.caption));
    dispatch(&state, &SEND_MEDIA, send).await
}

/// `POST /api/n8n-reply`: the workflow's answer to an inbound message.
pub async fn n8n_reply_handler(
    State(state): State<AppState>,
    body: Result<Json<ReplyRequest>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let request = body_or_default(body);
    let (Some(to), Some(reply)) = (present(&request.to), present(&request.reply)) else {
        return Err(ApiError::MissingFields(N8N_REPLY.missing));
    };
    info!(%to, "sending workflow reply");
    dispatch(&state, &N8N_REPLY, state.outbound.send_text(to, reply)).await
}

/// `GET /api/queue-status`
pub async fn queue_status_handler(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.queue.report())
}

/// Check readiness, then drive the (not yet polled) send.
async fn dispatch(
    state: &AppState,
    route: &SendRoute,
    send: impl Future<Output = relay_channels::Result<SendReceipt>>,
) -> Result<Json<Value>, ApiError> {
    if !state.session.is_connected().await {
        return Err(ApiError::NotReady(route.not_ready));
    }

    match send.await {
        Ok(receipt) => {
            #[cfg(feature = "metrics")]
            counter!(outbound_metrics::MESSAGES_SENT_TOTAL, labels::KIND => route.kind)
                .increment(1);
            debug!(kind = route.kind, to = %receipt.to, message_id = ?receipt.message_id, "sent");
            Ok(Json(json!({
                "success": true,
                "message": route.sent,
                "result": receipt,
            })))
        },
        Err(e) => {
            #[cfg(feature = "metrics")]
            counter!(outbound_metrics::SEND_ERRORS_TOTAL, labels::KIND => route.kind)
                .increment(1);
            warn!(kind = route.kind, error = %e, "outbound send failed");
            // Logged out between the readiness check and the send.
            if e.is_unavailable() {
                return Err(ApiError::NotReady(route.not_ready));
            }
            Err(ApiError::SendFailed {
                context: route.failed,
                source: e,
            })
        },
    }
}
