use crate::error::GatewayError;
use crate::state::AppState;
use axum::extract::{Path, State};
use axum::Json;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use std::io::Cursor;
use tts_engine::{HoundPreprocessor, ReferencePreprocessor};
use tts_voice_samples::VoiceSampleRecord;

#[derive(Debug, Deserialize)]
pub struct CreateVoiceSampleRequest {
	pub audio: String,
	pub reference_text: String,
	pub name: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct VoiceSamplesResponse {
	pub samples: Vec<VoiceSampleRecord>,
}

#[derive(Debug, Serialize)]
pub struct VoiceSampleAudioResponse {
	pub audio: String,
	pub reference_text: String,
}

#[derive(Debug, Serialize)]
pub struct DeleteVoiceSampleResponse {
	pub status: &'static str,
	pub id: String,
}

fn encode_wav(samples: &[i16], sample_rate: u32) -> Result<Vec<u8>, GatewayError> {
	let spec = hound::WavSpec { channels: 1, sample_rate, bits_per_sample: 16, sample_format: hound::SampleFormat::Int };
	let mut cursor = Cursor::new(Vec::new());
	{
		let mut writer = hound::WavWriter::new(&mut cursor, spec).map_err(|e| GatewayError::WorkerError(e.to_string()))?;
		for &sample in samples {
			writer.write_sample(sample).map_err(|e| GatewayError::WorkerError(e.to_string()))?;
		}
		writer.finalize().map_err(|e| GatewayError::WorkerError(e.to_string()))?;
	}
	Ok(cursor.into_inner())
}

/// Trims silence before storage, matching spec.md 4's "Create trims
/// silence before storage" invariant. Re-encodes the trimmed samples as a
/// fresh WAV rather than storing the raw upload verbatim.
///
/// # Errors
/// `GatewayError::Base64Decode` if `audio` isn't valid base64,
/// `GatewayError::Validation` if the decoded bytes aren't a decodable WAV
/// or are silent end-to-end, or a storage error.
pub async fn post_voice_sample(State(state): State<AppState>, Json(request): Json<CreateVoiceSampleRequest>) -> Result<Json<VoiceSampleRecord>, GatewayError> {
	let raw_bytes = BASE64.decode(&request.audio)?;
	let prepared = HoundPreprocessor.prepare(&raw_bytes, &request.reference_text, None).map_err(|e| GatewayError::Validation(e.to_string()))?;
	let trimmed_wav = encode_wav(&prepared.samples, prepared.sample_rate)?;
	let record = state.voice_samples.create(&trimmed_wav, prepared.reference_text, request.name).await?;
	Ok(Json(record))
}

/// # Errors
/// Returns a broker/storage error if the index cannot be read.
pub async fn get_voice_samples(State(state): State<AppState>) -> Result<Json<VoiceSamplesResponse>, GatewayError> {
	let samples = state.voice_samples.list().await?;
	Ok(Json(VoiceSamplesResponse { samples }))
}

/// # Errors
/// `GatewayError::NotFound` if no sample exists for `id`.
pub async fn get_voice_sample_audio(State(state): State<AppState>, Path(id): Path<String>) -> Result<Json<VoiceSampleAudioResponse>, GatewayError> {
	let Some((audio, reference_text)) = state.voice_samples.get_audio(&id).await? else {
		return Err(GatewayError::NotFound);
	};
	Ok(Json(VoiceSampleAudioResponse { audio: BASE64.encode(audio), reference_text }))
}

/// # Errors
/// `GatewayError::NotFound` if no sample exists for `id`.
pub async fn delete_voice_sample(State(state): State<AppState>, Path(id): Path<String>) -> Result<Json<DeleteVoiceSampleResponse>, GatewayError> {
	if !state.voice_samples.delete(&id).await? {
		return Err(GatewayError::NotFound);
	}
	Ok(Json(DeleteVoiceSampleResponse { status: "deleted", id }))
}
