use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};

/// Failure of an API handler, rendered as `{ "success": false, "message" }`.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// A required body field is missing or empty.
    #[error("{0}")]
    MissingFields(&'static str),

    /// The session is not logged in.
    #[error("{0}")]
    NotReady(&'static str),

    /// The session failed the send.
    #[error("{context}: {source}")]
    SendFailed {
        context: &'static str,
        #[source]
        source: relay_channels::Error,
    },
}

impl ApiError {
    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            Self::MissingFields(_) => StatusCode::BAD_REQUEST,
            Self::NotReady(_) => StatusCode::UNAUTHORIZED,
            Self::SendFailed { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status(),
            Json(serde_json::json!({
                "success": false,
                "message": self.to_string(),
            })),
        )
            .into_response()
    }
}
