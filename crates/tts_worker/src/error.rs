use thiserror::Error;

#[derive(Error, Debug)]
pub enum WorkerError {
	#[error("broker error: {0}")]
	Broker(#[from] tts_broker::BrokerError),
	#[error("queue error: {0}")]
	Queue(#[from] tts_queue::QueueError),
	#[error("engine error: {0}")]
	Engine(#[from] tts_engine::error::EngineError),
	#[error("reference audio is not valid base64: {0}")]
	Base64(#[from] base64::DecodeError),
	#[error("result channel closed")]
	ChannelClosed,
}
