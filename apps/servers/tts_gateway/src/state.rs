use crate::config::GatewayConfig;
use std::sync::Arc;
use tts_broker::RedisBroker;
use tts_credentials::CredentialStore;
use tts_queue::JobQueueService;
use tts_voice_samples::VoiceSampleStore;

/// Everything an axum handler needs, built once at startup and cloned
/// cheaply (every field is `Arc`-backed or itself cheap to clone) into
/// every request.
#[derive(Clone)]
pub struct AppState {
	pub config: Arc<GatewayConfig>,
	pub queue: JobQueueService<RedisBroker>,
	pub credentials: CredentialStore<RedisBroker>,
	pub voice_samples: VoiceSampleStore,
}

impl AppState {
	/// # Errors
	/// Returns an error if the broker cannot be reached or the voice-sample
	/// directory cannot be created.
	pub async fn build(config: Arc<GatewayConfig>) -> anyhow::Result<Self> {
		let broker = Arc::new(RedisBroker::connect(&config.broker_url).await?);
		let queue = JobQueueService::new(broker.clone());
		let credentials = CredentialStore::new(broker);
		let voice_samples = VoiceSampleStore::new(&config.voice_samples_dir)?;
		Ok(Self { config, queue, credentials, voice_samples })
	}
}
