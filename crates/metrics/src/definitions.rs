//! Metric name and label definitions.
//!
//! Every metric the relay records is named here so the `/metrics` output is
//! documented in one place.

/// Delivery queue and webhook worker
pub mod delivery {
    /// Records appended to the queue
    pub const ENQUEUED_TOTAL: &str = "relay_delivery_enqueued_total";
    /// Records the webhook accepted
    pub const DELIVERED_TOTAL: &str = "relay_delivery_delivered_total";
    /// Failed attempts that were followed by another attempt
    pub const RETRIES_TOTAL: &str = "relay_delivery_retries_total";
    /// Records dropped after a terminal failure or exhausted retries
    pub const ABANDONED_TOTAL: &str = "relay_delivery_abandoned_total";
    /// Records currently waiting in the queue
    pub const QUEUE_DEPTH: &str = "relay_delivery_queue_depth";
    /// Wall time of one webhook attempt in seconds
    pub const ATTEMPT_SECONDS: &str = "relay_delivery_attempt_seconds";
}

/// Inbound session messages
pub mod inbound {
    /// Messages received from the session, before filtering
    pub const MESSAGES_RECEIVED_TOTAL: &str = "relay_inbound_messages_received_total";
    /// Messages dropped before normalization (own, group, control)
    pub const MESSAGES_IGNORED_TOTAL: &str = "relay_inbound_messages_ignored_total";
    /// Media downloads that failed
    pub const MEDIA_DOWNLOAD_ERRORS_TOTAL: &str = "relay_inbound_media_download_errors_total";
}

/// Outbound sends through the session
pub mod outbound {
    /// Text and media messages sent through the session
    pub const MESSAGES_SENT_TOTAL: &str = "relay_outbound_messages_sent_total";
    /// Sends the session refused or failed
    pub const SEND_ERRORS_TOTAL: &str = "relay_outbound_send_errors_total";
}

/// HTTP request metrics
pub mod http {
    /// Total number of HTTP requests handled
    pub const REQUESTS_TOTAL: &str = "relay_http_requests_total";
    /// Duration of HTTP requests in seconds
    pub const REQUEST_DURATION_SECONDS: &str = "relay_http_request_duration_seconds";
    /// Number of currently in-flight HTTP requests
    pub const REQUESTS_IN_FLIGHT: &str = "relay_http_requests_in_flight";
}

/// Common label keys
pub mod labels {
    pub const ENDPOINT: &str = "endpoint";
    pub const METHOD: &str = "method";
    pub const STATUS: &str = "status";
    pub const KIND: &str = "kind";
    pub const REASON: &str = "reason";
    pub const MESSAGE_TYPE: &str = "message_type";
}

/// Histogram buckets
pub mod buckets {
    /// HTTP request duration buckets (in seconds), 1ms to 60s
    pub const HTTP_DURATION: &[f64] = &[
        0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0,
    ];

    /// Webhook attempt buckets (in seconds), bounded by the request timeout
    pub const WEBHOOK_ATTEMPT: &[f64] = &[
        0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.0, 5.0, 10.0, 15.0, 30.0,
    ];
}
