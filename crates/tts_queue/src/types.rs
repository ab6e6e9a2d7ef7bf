use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
	Male,
	Female,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Area {
	Northern,
	Southern,
	Central,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Emotion {
	Neutral,
	Serious,
	Monotone,
	Sad,
	Surprised,
	Happy,
	Angry,
}

/// The two named quality classes. Selects both the broker queue a job rides
/// on and the engine's internal refinement cost.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Quality {
	High,
	Fast,
}

impl Quality {
	#[must_use]
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::High => "high",
			Self::Fast => "fast",
		}
	}

	#[must_use]
	pub const fn all() -> [Self; 2] {
		[Self::High, Self::Fast]
	}
}

impl std::str::FromStr for Quality {
	type Err = ();

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s {
			"high" => Ok(Self::High),
			"fast" => Ok(Self::Fast),
			_ => Err(()),
		}
	}
}

impl std::fmt::Display for Quality {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.write_str(self.as_str())
	}
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VoiceAttributes {
	#[serde(skip_serializing_if = "Option::is_none")]
	pub gender: Option<Gender>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub area: Option<Area>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub emotion: Option<Emotion>,
}

/// Reference audio carried for voice cloning. `reference_audio` is base64
/// on the wire and in the broker, matching `spec.md`'s "opaque bytes,
/// base64-carried" field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoiceReference {
	pub reference_audio: String,
	pub reference_text: String,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub trim_audio_to: Option<f64>,
}

/// Immutable once enqueued. Destroyed implicitly when its broker keys
/// expire; never mutated after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
	pub job_id: Uuid,
	pub text: String,
	#[serde(flatten)]
	pub voice: VoiceAttributes,
	pub speed: f64,
	pub quality: Quality,
	#[serde(flatten, skip_serializing_if = "Option::is_none")]
	pub reference: Option<VoiceReference>,
	pub created_at: DateTime<Utc>,
	pub timeout_secs: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
	Pending,
	Processing,
	Completed,
	Error,
}

impl JobStatus {
	#[must_use]
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::Pending => "pending",
			Self::Processing => "processing",
			Self::Completed => "completed",
			Self::Error => "error",
		}
	}

	/// `pending -> processing -> {completed, error}` is the only legal
	/// order; there are no back-transitions and no retries.
	#[must_use]
	pub const fn can_transition_to(self, next: Self) -> bool {
		matches!((self, next), (Self::Pending, Self::Processing) | (Self::Processing, Self::Completed) | (Self::Processing, Self::Error))
	}
}

impl std::str::FromStr for JobStatus {
	type Err = ();

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s {
			"pending" => Ok(Self::Pending),
			"processing" => Ok(Self::Processing),
			"completed" => Ok(Self::Completed),
			"error" => Ok(Self::Error),
			_ => Err(()),
		}
	}
}

impl std::fmt::Display for JobStatus {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.write_str(self.as_str())
	}
}

/// Terminal or in-flight outcome of a job. `audio` is present iff
/// `status == Completed`; `error`/`error_code` are present iff
/// `status == Error`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobResult {
	pub status: JobStatus,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub audio: Option<String>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub generation_time: Option<f64>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub audio_duration: Option<f64>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub error: Option<String>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub error_code: Option<String>,
	pub completed_at: DateTime<Utc>,
}

impl JobResult {
	#[must_use]
	pub fn completed(audio: String, generation_time: f64, audio_duration: f64) -> Self {
		Self {
			status: JobStatus::Completed,
			audio: Some(audio),
			generation_time: Some(generation_time),
			audio_duration: Some(audio_duration),
			error: None,
			error_code: None,
			completed_at: Utc::now(),
		}
	}

	#[must_use]
	pub fn error(message: String, error_code: String) -> Self {
		Self {
			status: JobStatus::Error,
			audio: None,
			generation_time: None,
			audio_duration: None,
			error: Some(message),
			error_code: Some(error_code),
			completed_at: Utc::now(),
		}
	}
}

/// `worker:{worker_id}` value. A worker is active iff this key exists.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkerRegistration {
	pub timestamp: DateTime<Utc>,
	pub quality: Quality,
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn legal_transitions_only() {
		assert!(JobStatus::Pending.can_transition_to(JobStatus::Processing));
		assert!(JobStatus::Processing.can_transition_to(JobStatus::Completed));
		assert!(JobStatus::Processing.can_transition_to(JobStatus::Error));
		assert!(!JobStatus::Pending.can_transition_to(JobStatus::Completed));
		assert!(!JobStatus::Completed.can_transition_to(JobStatus::Processing));
		assert!(!JobStatus::Error.can_transition_to(JobStatus::Pending));
	}

	#[test]
	fn quality_round_trips_through_str() {
		assert_eq!("high".parse::<Quality>().unwrap(), Quality::High);
		assert_eq!("fast".parse::<Quality>().unwrap(), Quality::Fast);
		assert!("medium".parse::<Quality>().is_err());
	}
}
