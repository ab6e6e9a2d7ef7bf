use crate::types::JobStatus;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum QueueError {
	#[error("broker error: {0}")]
	Broker(#[from] tts_broker::BrokerError),
	#[error("corrupt job record: {0}")]
	Corrupt(#[from] serde_json::Error),
	#[error("illegal status transition from {from} to {to}")]
	IllegalTransition { from: JobStatus, to: JobStatus },
}
