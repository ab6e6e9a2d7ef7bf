pub mod auth;
pub mod config;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod state;

use axum::middleware::from_fn_with_state;
use axum::routing::{delete, get, post};
use axum::Router;
use some_services::rate_limiter::token_bucket::{rate_limit_middleware, TokenBucketRateLimiter};
use state::AppState;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

const RATE_LIMIT_MAX_TOKENS: u32 = 120;
const RATE_LIMIT_REFILL_PERIOD_MS: u64 = 60_000;

/// Assembles the full router: the synthesis/job/voice endpoints behind
/// rate limiting, plus unauthenticated `/` and `/metrics`. Credential
/// enforcement happens per-handler via `auth::authenticate`, not as
/// middleware, since only `/synthesize*` charges usage.
#[must_use]
pub fn build_router(state: AppState) -> Router {
	let limiter = Arc::new(TokenBucketRateLimiter::new_with_refill_period(RATE_LIMIT_MAX_TOKENS, RATE_LIMIT_REFILL_PERIOD_MS));

	let api_routes = Router::new()
		.route("/synthesize", post(handlers::synthesize::post_synthesize))
		.route("/synthesize/async", post(handlers::synthesize::post_synthesize_async))
		.route("/job/:id", get(handlers::job::get_job_status))
		.route("/job/:id/audio", get(handlers::job::get_job_audio))
		.route("/health", get(handlers::health::get_health))
		.route("/voices", get(handlers::voices::get_voices))
		.route("/voice-samples", post(handlers::voice_samples::post_voice_sample))
		.route("/voice-samples", get(handlers::voice_samples::get_voice_samples))
		.route("/voice-samples/:id/audio", get(handlers::voice_samples::get_voice_sample_audio))
		.route("/voice-samples/:id", delete(handlers::voice_samples::delete_voice_sample))
		.layer(from_fn_with_state(limiter, rate_limit_middleware));

	let public_routes = Router::new().route("/", get(handlers::root::get_root)).route("/metrics", get(metrics::get_metrics));

	Router::new()
		.merge(api_routes)
		.merge(public_routes)
		.with_state(state)
		.layer(axum::middleware::from_fn(metrics::metrics_middleware))
		.layer(TraceLayer::new_for_http())
		.layer(CorsLayer::permissive())
}
