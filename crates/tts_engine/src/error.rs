use thiserror::Error;

#[derive(Error, Debug)]
pub enum EngineError {
	#[error("synthesis failed: {0}")]
	Synthesis(String),
	#[error("reference audio could not be decoded: {0}")]
	Decode(#[from] hound::Error),
	#[error("reference audio is empty after trimming")]
	EmptyAfterTrim,
}
