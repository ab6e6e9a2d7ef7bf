use axum::body::Body;
use axum::extract::Request;
use axum::http::StatusCode;
use axum::middleware::Next;
use axum::response::Response;
use once_cell::sync::Lazy;
use prometheus::{register_histogram_vec, register_int_counter_vec, Encoder, HistogramVec, IntCounterVec, TextEncoder};
use std::time::Instant;

/// `once_cell::sync::Lazy` stands in for the teacher's `lazy_static!`: the
/// workspace already carries `once_cell` for other crates, so this avoids
/// introducing a second "lazily-initialized static" dependency.
static HTTP_REQUESTS_TOTAL: Lazy<IntCounterVec> =
	Lazy::new(|| register_int_counter_vec!("tts_gateway_http_requests_total", "Total number of HTTP requests", &["method", "route", "status"]).expect("metric registration is infallible at startup"));

static HTTP_REQUEST_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
	register_histogram_vec!("tts_gateway_http_request_duration_seconds", "HTTP request duration in seconds", &["method", "route"]).expect("metric registration is infallible at startup")
});

pub async fn metrics_middleware(request: Request<Body>, next: Next) -> Response {
	let method = request.method().to_string();
	let route = normalize_path(request.uri().path());

	let start = Instant::now();
	let response = next.run(request).await;
	let duration = start.elapsed().as_secs_f64();

	let status = response.status().as_u16().to_string();
	HTTP_REQUESTS_TOTAL.with_label_values(&[&method, &route, &status]).inc();
	HTTP_REQUEST_DURATION.with_label_values(&[&method, &route]).observe(duration);

	response
}

fn normalize_path(path: &str) -> String {
	path.trim_end_matches('/').split('?').next().unwrap_or("/").to_string()
}

pub async fn get_metrics() -> Result<String, StatusCode> {
	let encoder = TextEncoder::new();
	let metric_families = prometheus::gather();
	let mut buffer = Vec::new();
	if encoder.encode(&metric_families, &mut buffer).is_err() {
		return Err(StatusCode::INTERNAL_SERVER_ERROR);
	}
	String::from_utf8(buffer).map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)
}
