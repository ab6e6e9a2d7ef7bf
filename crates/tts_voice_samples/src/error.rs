use thiserror::Error;

#[derive(Error, Debug)]
pub enum VoiceSampleError {
	#[error("voice sample storage I/O error: {0}")]
	Io(#[from] std::io::Error),
	#[error("voice sample index is corrupt: {0}")]
	Corrupt(#[from] serde_json::Error),
	#[error("failed to persist voice sample index: {0}")]
	Persist(#[from] tempfile::PersistError),
}
