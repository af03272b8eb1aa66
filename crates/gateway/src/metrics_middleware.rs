//! HTTP request metrics middleware.
//!
//! Records, per endpoint, method and status:
//! - `relay_http_requests_total`
//! - `relay_http_request_duration_seconds`
//! - `relay_http_requests_in_flight` (no status label)

use std::time::Instant;

use {
    axum::{body::Body, extract::MatchedPath, http::Request, middleware::Next, response::Response},
    relay_metrics::{counter, gauge, histogram, http as http_metrics, labels},
};

pub async fn http_metrics_middleware(request: Request<Body>, next: Next) -> Response {
    let start = Instant::now();
    let method = request.method().to_string();
    let endpoint = endpoint_label(
        request.extensions().get::<MatchedPath>().map(MatchedPath::as_str),
        request.uri().path(),
    );

    gauge!(http_metrics::REQUESTS_IN_FLIGHT, labels::ENDPOINT => endpoint.clone(), labels::METHOD => method.clone())
        .increment(1.0);

    let response = next.run(request).await;

    let status = response.status().as_u16().to_string();
    let duration = start.elapsed().as_secs_f64();

    counter!(
        http_metrics::REQUESTS_TOTAL,
        labels::ENDPOINT => endpoint.clone(),
        labels::METHOD => method.clone(),
        labels::STATUS => status.clone()
    )
    .increment(1);

    histogram!(
        http_metrics::REQUEST_DURATION_SECONDS,
        labels::ENDPOINT => endpoint.clone(),
        labels::METHOD => method.clone(),
        labels::STATUS => status
    )
    .record(duration);

    gauge!(http_metrics::REQUESTS_IN_FLIGHT, labels::ENDPOINT => endpoint, labels::METHOD => method)
        .decrement(1.0);

    response
}

/// Label for a request: the matched route, or a fixed bucket for unrouted
/// paths so scanners cannot blow up label cardinality.
fn endpoint_label(matched: Option<&str>, path: &str) -> String {
    match matched {
        Some(route) => route.to_string(),
        None if path == "/" => "/".to_string(),
        None => "unmatched".to_string(),
    }
}
