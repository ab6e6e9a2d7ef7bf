use thiserror::Error;

#[derive(Error, Debug)]
pub enum BrokerError {
	#[error("broker connection error: {0}")]
	Connection(#[from] redis::RedisError),
	#[error("broker unavailable")]
	Unavailable,
}
