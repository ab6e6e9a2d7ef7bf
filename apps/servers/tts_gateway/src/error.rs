use axum::body::Body;
use axum::http::{Response, StatusCode};
use axum::response::IntoResponse;
use axum::Json;
use serde::Serialize;

/// Central `IntoResponse` boundary. One arm per entry in spec.md 7's error
/// taxonomy; the gateway never leaks a worker panic message, only the
/// terminal `error`/`error_code` a worker itself chose to store.
#[derive(thiserror::Error, Debug)]
pub enum GatewayError {
	#[error("{0}")]
	Validation(String),

	#[error("API key required")]
	AuthMissing,

	#[error("Invalid API key")]
	AuthInvalid,

	#[error("not found")]
	NotFound,

	#[error("job is not in a completed state")]
	StateMismatch,

	#[error("Synthesis timeout")]
	Timeout,

	#[error("{0}")]
	WorkerError(String),

	#[error("broker unavailable")]
	BrokerUnavailable,

	#[error("queue error: {0}")]
	Queue(#[from] tts_queue::QueueError),

	#[error("credential error: {0}")]
	Credential(#[from] tts_credentials::error::CredentialError),

	#[error("voice sample error: {0}")]
	VoiceSample(#[from] tts_voice_samples::error::VoiceSampleError),

	#[error("invalid reference audio: not valid base64")]
	Base64Decode(#[from] base64::DecodeError),
}

#[derive(Serialize)]
struct ErrorBody {
	error: String,
}

impl GatewayError {
	const fn status_code(&self) -> StatusCode {
		match self {
			Self::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
			Self::AuthMissing | Self::AuthInvalid => StatusCode::UNAUTHORIZED,
			Self::NotFound => StatusCode::NOT_FOUND,
			Self::StateMismatch => StatusCode::BAD_REQUEST,
			Self::Timeout => StatusCode::REQUEST_TIMEOUT,
			Self::WorkerError(_) => StatusCode::INTERNAL_SERVER_ERROR,
			Self::BrokerUnavailable | Self::Queue(_) | Self::Credential(_) | Self::VoiceSample(_) => StatusCode::INTERNAL_SERVER_ERROR,
			Self::Base64Decode(_) => StatusCode::UNPROCESSABLE_ENTITY,
		}
	}
}

impl IntoResponse for GatewayError {
	fn into_response(self) -> Response<Body> {
		if matches!(self, Self::Queue(_) | Self::Credential(_) | Self::VoiceSample(_)) {
			tracing::error!(error = %self, "request failed on a broker-backed dependency");
		}
		let status = self.status_code();
		(status, Json(ErrorBody { error: self.to_string() })).into_response()
	}
}
