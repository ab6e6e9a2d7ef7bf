use crate::state::AppState;
use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;
use std::collections::HashMap;

#[derive(Debug, Serialize)]
pub struct WorkersSummary {
	pub active: usize,
	pub ids: Vec<String>,
	pub by_quality: HashMap<String, Vec<String>>,
}

/// Wire schema for `GET /health`, per spec.md 157's
/// `{status, queue_size, queue_sizes, workers:{active,ids,by_quality}, metrics?}`.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
	pub status: &'static str,
	pub queue_size: usize,
	pub queue_sizes: HashMap<String, usize>,
	pub workers: WorkersSummary,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub metrics: Option<HashMap<String, i64>>,
}

/// Never fails outright: a broker outage is reported as `status: "unhealthy"`
/// rather than a 5xx, per spec.md 184's "`BrokerUnavailable` ... `/health`
/// returns `unhealthy`".
pub async fn get_health(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
	let broker_reachable = state.queue.ping().await.unwrap_or(false);

	if !broker_reachable {
		return (
			StatusCode::SERVICE_UNAVAILABLE,
			Json(HealthResponse {
				status: "unhealthy",
				queue_size: 0,
				queue_sizes: HashMap::new(),
				workers: WorkersSummary { active: 0, ids: Vec::new(), by_quality: HashMap::new() },
				metrics: None,
			}),
		);
	}

	let queue_sizes = state.queue.queue_sizes().await.map_or_else(|_| HashMap::new(), |sizes| sizes.into_iter().map(|(q, n)| (q.as_str().to_string(), n)).collect());
	let queue_size = queue_sizes.values().sum();

	let by_quality = state.queue.get_workers_by_quality().await.map_or_else(|_| HashMap::new(), |by_quality| by_quality.into_iter().map(|(q, ids)| (q.as_str().to_string(), ids)).collect());
	let ids: Vec<String> = by_quality.values().flatten().cloned().collect();
	let active = ids.len();

	let metrics = state.queue.get_metrics().await.ok();

	(
		StatusCode::OK,
		Json(HealthResponse { status: "healthy", queue_size, queue_sizes, workers: WorkersSummary { active, ids, by_quality }, metrics }),
	)
}
