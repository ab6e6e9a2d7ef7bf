use thiserror::Error;

#[derive(Error, Debug)]
pub enum CredentialError {
	#[error("broker error: {0}")]
	Broker(#[from] tts_broker::BrokerError),
	#[error("credential record is corrupt: {0}")]
	Corrupt(#[from] serde_json::Error),
}
