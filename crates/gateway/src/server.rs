use std::{future::Future, net::SocketAddr, sync::Arc};

use {
    axum::{
        Router,
        extract::State,
        response::{IntoResponse, Json},
        routing::{get, post},
    },
    tower_http::{
        cors::{Any, CorsLayer},
        trace::TraceLayer,
    },
    tracing::info,
};

use {
    relay_channels::{SessionOutbound, SessionStatus},
    relay_delivery::StatusReporter,
};

use crate::api_routes::{
    n8n_reply_handler, qr_code_handler, queue_status_handler, send_media_handler,
    send_message_handler,
};

// ── Shared app state ─────────────────────────────────────────────────────────

#[derive(Clone)]
pub struct AppState {
    pub outbound: Arc<dyn SessionOutbound>,
    pub session: Arc<dyn SessionStatus>,
    pub queue: Arc<dyn StatusReporter>,
    pub version: String,
    #[cfg(feature = "metrics")]
    pub metrics_handle: Option<relay_metrics::MetricsHandle>,
}

impl AppState {
    pub fn new(
        outbound: Arc<dyn SessionOutbound>,
        session: Arc<dyn SessionStatus>,
        queue: Arc<dyn StatusReporter>,
    ) -> Self {
        Self {
            outbound,
            session,
            queue,
            version: env!("CARGO_PKG_VERSION").to_string(),
            #[cfg(feature = "metrics")]
            metrics_handle: None,
        }
    }

    #[cfg(feature = "metrics")]
    #[must_use]
    pub fn with_metrics_handle(mut self, handle: Option<relay_metrics::MetricsHandle>) -> Self {
        self.metrics_handle = handle;
        self
    }
}

// ── Server startup ───────────────────────────────────────────────────────────

/// Build the router (shared between production startup and tests).
pub fn build_app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let router = Router::new()
        .route("/health", get(health_handler))
        .route("/api/qr-code", get(qr_code_handler))
        .route("/api/send-message", post(send_message_handler))
        .route("/api/send-media", post(send_media_handler))
        .route("/api/n8n-reply", post(n8n_reply_handler))
        .route("/api/queue-status", get(queue_status_handler));

    #[cfg(feature = "prometheus")]
    let router = router.route(
        "/metrics",
        get(crate::metrics_routes::prometheus_metrics_handler),
    );

    #[cfg(feature = "metrics")]
    let router = router.route_layer(axum::middleware::from_fn(
        crate::metrics_middleware::http_metrics_middleware,
    ));

    router
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Serve the API until `shutdown` resolves.
pub async fn start_server(
    bind: &str,
    port: u16,
    state: AppState,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> anyhow::Result<()> {
    let app = build_app(state);

    let listener = tokio::net::TcpListener::bind((bind, port)).await?;
    let addr = listener.local_addr()?;
    info!(%addr, "HTTP API listening");
    info!("point the workflow's reply step at http://{addr}/api/n8n-reply");
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown)
    .await?;
    info!("HTTP API stopped");
    Ok(())
}

// ── Handlers ─────────────────────────────────────────────────────────────────

async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    let session = state.session.probe().await;
    Json(serde_json::json!({
        "status": "ok",
        "version": state.version,
        "session": session,
        "queue": state.queue.report(),
    }))
}
