use crate::error::GatewayError;
use crate::state::AppState;
use axum::extract::{Path, State};
use axum::response::{IntoResponse, Response};
use axum::Json;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde::Serialize;
use tts_queue::{JobStatus, Quality};

/// Wire schema for `GET /job/{id}`, per spec.md 155's
/// `{job_id, status, queue_position?, audio_url?, generation_time?, error?}`.
/// `job_id` is duplicated onto every variant so it serializes alongside the
/// internally-tagged `status` field on all of them.
#[derive(Debug, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum JobStatusResponse {
	Pending {
		job_id: String,
		queue_position: i64,
	},
	Processing {
		job_id: String,
	},
	Completed {
		job_id: String,
		generation_time: f64,
		audio_url: String,
	},
	Error {
		job_id: String,
		error: String,
		error_code: String,
	},
}

/// A job not yet dequeued has no `status:{id}` distinction from one still
/// being worked beyond the stored status string, but its original quality
/// class isn't recorded outside the queue list it rides on. Trying both
/// classes and taking whichever reports a non-negative position resolves
/// this without adding a persisted `job:{id}` record — recorded in
/// DESIGN.md.
async fn find_pending_queue_position(state: &AppState, job_id: &str) -> Result<i64, GatewayError> {
	for quality in Quality::all() {
		let position = state.queue.queue_position(job_id, quality).await?;
		if position >= 0 {
			return Ok(position);
		}
	}
	Ok(0)
}

/// # Errors
/// `GatewayError::NotFound` if no status is recorded for `job_id` (expired
/// or never existed).
pub async fn get_job_status(State(state): State<AppState>, Path(job_id): Path<String>) -> Result<Json<JobStatusResponse>, GatewayError> {
	let Some(status) = state.queue.get_status(&job_id).await? else {
		return Err(GatewayError::NotFound);
	};

	let response = match status {
		JobStatus::Pending => {
			let queue_position = find_pending_queue_position(&state, &job_id).await?;
			JobStatusResponse::Pending { job_id, queue_position }
		}
		JobStatus::Processing => JobStatusResponse::Processing { job_id },
		JobStatus::Completed => {
			let result = state.queue.get_result(&job_id).await?.ok_or(GatewayError::NotFound)?;
			let audio_url = format!("/job/{job_id}/audio");
			JobStatusResponse::Completed { job_id, generation_time: result.generation_time.unwrap_or(0.0), audio_url }
		}
		JobStatus::Error => {
			let result = state.queue.get_result(&job_id).await?.ok_or(GatewayError::NotFound)?;
			JobStatusResponse::Error { job_id, error: result.error.unwrap_or_default(), error_code: result.error_code.unwrap_or_default() }
		}
	};
	Ok(Json(response))
}

/// # Errors
/// `GatewayError::NotFound` if the job has no stored result;
/// `GatewayError::StateMismatch` if it exists but hasn't completed
/// successfully.
pub async fn get_job_audio(State(state): State<AppState>, Path(job_id): Path<String>) -> Result<Response, GatewayError> {
	let result = state.queue.get_result(&job_id).await?.ok_or(GatewayError::NotFound)?;
	if result.status != JobStatus::Completed {
		return Err(GatewayError::StateMismatch);
	}
	let audio = BASE64.decode(result.audio.unwrap_or_default())?;
	let mut response = (axum::http::StatusCode::OK, audio).into_response();
	response.headers_mut().insert(axum::http::header::CONTENT_TYPE, axum::http::HeaderValue::from_static("audio/wav"));
	Ok(response)
}
