use crate::auth::authenticate;
use crate::error::GatewayError;
use crate::state::AppState;
use axum::extract::{ConnectInfo, Query, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use tts_queue::{Area, Emotion, Gender, Job, JobStatus, Quality, VoiceAttributes, VoiceReference};
use uuid::Uuid;

fn default_speed() -> f64 {
	1.0
}

fn default_quality() -> Quality {
	Quality::High
}

/// Wire schema for both `/synthesize` and `/synthesize/async`, per spec.md
/// 6's TTSRequest table.
#[derive(Debug, Deserialize)]
pub struct TtsRequest {
	pub text: String,
	pub gender: Option<Gender>,
	pub area: Option<Area>,
	pub emotion: Option<Emotion>,
	#[serde(default = "default_speed")]
	pub speed: f64,
	#[serde(default = "default_quality")]
	pub quality: Quality,
	pub reference_audio: Option<String>,
	pub reference_text: Option<String>,
	pub trim_audio_to: Option<f64>,
}

impl TtsRequest {
	fn validate(&self) -> Result<(), GatewayError> {
		let len = self.text.chars().count();
		if !(1..=5000).contains(&len) {
			return Err(GatewayError::Validation("text must be between 1 and 5000 characters".to_string()));
		}
		if !(0.5..=2.0).contains(&self.speed) {
			return Err(GatewayError::Validation("speed must be between 0.5 and 2.0".to_string()));
		}
		if let Some(trim) = self.trim_audio_to {
			if !(1.0..=60.0).contains(&trim) {
				return Err(GatewayError::Validation("trim_audio_to must be between 1 and 60 seconds".to_string()));
			}
		}
		if self.reference_audio.is_some() != self.reference_text.is_some() {
			return Err(GatewayError::Validation("reference_audio and reference_text must be supplied together".to_string()));
		}
		if let Some(reference_audio) = &self.reference_audio {
			BASE64.decode(reference_audio).map_err(|_| GatewayError::Validation("reference_audio is not valid base64".to_string()))?;
		}
		Ok(())
	}

	fn into_job(self, job_id: Uuid, timeout_secs: u64) -> Job {
		let reference = self.reference_audio.map(|reference_audio| VoiceReference { reference_audio, reference_text: self.reference_text.unwrap_or_default(), trim_audio_to: self.trim_audio_to });
		Job {
			job_id,
			text: self.text,
			voice: VoiceAttributes { gender: self.gender, area: self.area, emotion: self.emotion },
			speed: self.speed,
			quality: self.quality,
			reference,
			created_at: chrono::Utc::now(),
			timeout_secs,
		}
	}
}

#[derive(Debug, Deserialize)]
pub struct ApiKeyQuery {
	pub api_key: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct AsyncSubmissionResponse {
	pub job_id: String,
	pub status: &'static str,
	pub queue_position: i64,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub estimated_wait: Option<f64>,
}

async fn active_worker_count(state: &AppState, quality: Quality) -> Result<usize, GatewayError> {
	let by_quality = state.queue.get_workers_by_quality().await?;
	Ok(by_quality.get(&quality).map_or(0, Vec::len))
}

/// `queue_position` counts jobs strictly ahead of this one; the job's own
/// turn still costs roughly one generation cycle, hence the `+1` — without
/// it, the head-of-queue job (position 0) would report a zero estimate,
/// which disagrees with spec.md 8's worked example (`queue_position:0,
/// estimated_wait≈3.0`). Resolved and recorded in DESIGN.md.
fn estimate_wait(queue_position: i64, worker_count: usize, avg_generation_time: f64) -> Option<f64> {
	if worker_count == 0 {
		return None;
	}
	#[allow(clippy::cast_precision_loss)]
	Some((queue_position as f64 + 1.0) / worker_count as f64 * avg_generation_time)
}

async fn submit(state: &AppState, request: TtsRequest) -> Result<(Uuid, i64, Quality), GatewayError> {
	request.validate()?;
	let job_id = Uuid::new_v4();
	let quality = request.quality;
	let job = request.into_job(job_id, state.config.job_timeout.as_secs());
	state.queue.enqueue(&job).await?;
	let queue_position = state.queue.queue_position(&job_id.to_string(), quality).await?;
	Ok((job_id, queue_position, quality))
}

fn ascii_header(value: impl ToString) -> axum::http::HeaderValue {
	axum::http::HeaderValue::from_str(&value.to_string()).expect("numeric/uuid header values are always valid ASCII")
}

/// Blocks on the rendezvous for `job.timeout`, then renders the audio as a
/// binary response, or surfaces the worker's error, or a timeout. The wait
/// is an ordinary `.await` against the async broker client — see
/// `tts_broker::RedisBroker` — so it never monopolizes a request-handling
/// thread, per spec.md 5.
///
/// # Errors
/// `GatewayError::AuthMissing`/`AuthInvalid` if the credential gate
/// rejects the caller, `GatewayError::Validation` if the request body
/// fails validation, `GatewayError::Timeout` if no terminal result
/// arrives within `JOB_TIMEOUT`, `GatewayError::WorkerError` if the job
/// finished in an error state, or a broker/credential error.
pub async fn post_synthesize(State(state): State<AppState>, ConnectInfo(addr): ConnectInfo<SocketAddr>, Query(query): Query<ApiKeyQuery>, headers: HeaderMap, Json(request): Json<TtsRequest>) -> Result<Response, GatewayError> {
	let credential = authenticate(&state.credentials, state.config.trust_proxy, addr, &headers, query.api_key.as_deref()).await?;
	let (job_id, queue_position, _quality) = submit(&state, request).await?;

	let result = state.queue.wait_for_result_default_poll(&job_id.to_string(), state.config.job_timeout).await?;
	let Some(result) = result else {
		return Err(GatewayError::Timeout);
	};

	match result.status {
		JobStatus::Completed => {
			let audio_duration = result.audio_duration.unwrap_or(0.0);
			if let Some(info) = &credential {
				state.credentials.increment(&info.key_id, audio_duration).await?;
			}
			let audio = BASE64.decode(result.audio.unwrap_or_default())?;
			let mut response = (StatusCode::OK, audio).into_response();
			let response_headers = response.headers_mut();
			response_headers.insert("x-job-id", ascii_header(job_id));
			response_headers.insert("x-generation-time", ascii_header(result.generation_time.unwrap_or(0.0)));
			response_headers.insert("x-audio-duration", ascii_header(audio_duration));
			response_headers.insert("x-queue-position", ascii_header(queue_position));
			response_headers.insert(header::CONTENT_TYPE, axum::http::HeaderValue::from_static("audio/wav"));
			Ok(response)
		}
		JobStatus::Error => Err(GatewayError::WorkerError(result.error.unwrap_or_else(|| "synthesis failed".to_string()))),
		JobStatus::Pending | JobStatus::Processing => Err(GatewayError::Timeout),
	}
}

/// Returns an identifier immediately; the client polls `/job/{id}`.
///
/// # Errors
/// Same authentication and validation errors as `post_synthesize`, plus
/// any broker/credential error.
pub async fn post_synthesize_async(
	State(state): State<AppState>,
	ConnectInfo(addr): ConnectInfo<SocketAddr>,
	Query(query): Query<ApiKeyQuery>,
	headers: HeaderMap,
	Json(request): Json<TtsRequest>,
) -> Result<Json<AsyncSubmissionResponse>, GatewayError> {
	let credential = authenticate(&state.credentials, state.config.trust_proxy, addr, &headers, query.api_key.as_deref()).await?;
	let (job_id, queue_position, quality) = submit(&state, request).await?;
	let worker_count = active_worker_count(&state, quality).await?;
	let estimated_wait = estimate_wait(queue_position, worker_count, state.config.avg_generation_time);

	// Async callers are charged a bare request; audio seconds are charged
	// only on the synchronous path (spec.md 9's preserved open question).
	if let Some(info) = &credential {
		state.credentials.increment(&info.key_id, 0.0).await?;
	}

	Ok(Json(AsyncSubmissionResponse { job_id: job_id.to_string(), status: "pending", queue_position, estimated_wait }))
}

#[cfg(test)]
mod tests {
	use super::*;

	fn base_request() -> TtsRequest {
		TtsRequest { text: "xin chào".to_string(), gender: None, area: None, emotion: None, speed: 1.0, quality: Quality::High, reference_audio: None, reference_text: None, trim_audio_to: None }
	}

	#[test]
	fn rejects_empty_text() {
		let mut request = base_request();
		request.text = String::new();
		assert!(request.validate().is_err());
	}

	#[test]
	fn rejects_text_over_5000_chars() {
		let mut request = base_request();
		request.text = "a".repeat(5001);
		assert!(request.validate().is_err());
	}

	#[test]
	fn accepts_boundary_lengths() {
		let mut request = base_request();
		request.text = "a".to_string();
		assert!(request.validate().is_ok());
		request.text = "a".repeat(5000);
		assert!(request.validate().is_ok());
	}

	#[test]
	fn rejects_speed_outside_bounds() {
		let mut request = base_request();
		request.speed = 0.49;
		assert!(request.validate().is_err());
		request.speed = 2.01;
		assert!(request.validate().is_err());
		request.speed = 0.5;
		assert!(request.validate().is_ok());
		request.speed = 2.0;
		assert!(request.validate().is_ok());
	}

	#[test]
	fn rejects_reference_text_without_reference_audio() {
		let mut request = base_request();
		request.reference_text = Some("hi".to_string());
		assert!(request.validate().is_err());
	}

	#[test]
	fn estimate_wait_is_none_with_zero_workers() {
		assert_eq!(estimate_wait(0, 0, 3.0), None);
	}

	#[test]
	fn estimate_wait_accounts_for_this_jobs_own_turn() {
		assert!((estimate_wait(0, 1, 3.0).unwrap() - 3.0).abs() < f64::EPSILON);
	}
}
