//! Per-request counters and latency histograms.
//!
//! Requests are labelled by route template (`/api/v1/tariffs/{id}`), never
//! by the concrete URI, so ids stay out of the label set.

use std::time::Instant;

use axum::{body::Body, extract::MatchedPath, http::Request, middleware::Next, response::Response};

pub const REQUESTS_TOTAL: &str = "tariff_http_requests_total";
pub const REQUEST_DURATION: &str = "tariff_http_request_duration_seconds";

fn route_label(request: &Request<Body>) -> String {
    request
        .extensions()
        .get::<MatchedPath>()
        .map_or_else(|| "unmatched".to_string(), |p| p.as_str().to_string())
}

pub async fn http_metrics_middleware(request: Request<Body>, next: Next) -> Response {
    let method = request.method().as_str().to_string();
    let route = route_label(&request);

    let started = Instant::now();
    let response = next.run(request).await;
    let elapsed = started.elapsed().as_secs_f64();

    let status = response.status().as_u16().to_string();
    metrics::counter!(
        REQUESTS_TOTAL,
        "method" => method.clone(),
        "path" => route.clone(),
        "status" => status
    )
    .increment(1);
    metrics::histogram!(REQUEST_DURATION, "method" => method, "path" => route).record(elapsed);

    response
}
