pub mod config;
pub mod error;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use error::WorkerError;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};
use tts_broker::Broker;
use tts_engine::{default_nfe_steps, ReferencePreprocessor, SynthesisEngine, SynthesisRequest};
use tts_queue::{Job, JobQueueService, JobResult, Quality, VoiceReference};

/// Blocking-dequeue timeout for one poll of the assigned quality's queue.
/// On a `None` result the loop returns to the heartbeat check rather than
/// blocking forever, per spec.md 4.5's main-loop step 1/2.
const DEQUEUE_TIMEOUT: Duration = Duration::from_secs(5);

/// A long-lived process that holds one loaded `SynthesisEngine` and
/// consumes exactly one quality class. `engine` and `preprocessor` are
/// owned exclusively by this worker; nothing here is `Sync` by
/// requirement, matching spec.md 5's "single-threaded cooperative" model.
pub struct Worker<B: Broker, E: SynthesisEngine, P: ReferencePreprocessor> {
	worker_id: String,
	quality: Quality,
	nfe_steps: u32,
	heartbeat_interval: Duration,
	queue: JobQueueService<B>,
	engine: E,
	preprocessor: P,
}

impl<B: Broker, E: SynthesisEngine, P: ReferencePreprocessor> Worker<B, E, P> {
	pub fn new(worker_id: String, quality: Quality, nfe_steps_override: Option<u32>, heartbeat_interval: Duration, queue: JobQueueService<B>, engine: E, preprocessor: P) -> Self {
		let nfe_steps = nfe_steps_override.unwrap_or_else(|| default_nfe_steps(quality));
		Self { worker_id, quality, nfe_steps, heartbeat_interval, queue, engine, preprocessor }
	}

	/// Initialization order per spec.md 4.5: caller has already opened and
	/// pinged the broker and loaded the engine before constructing `Self`;
	/// `run` registers as active and enters the main loop.
	///
	/// # Errors
	/// Returns an error if broker registration or dequeue fails in a way
	/// that is not a simple "nothing to do" timeout.
	pub async fn run(&self, shutdown: CancellationToken) -> Result<(), WorkerError> {
		self.queue.register_worker(&self.worker_id, self.quality).await?;
		info!(worker_id = %self.worker_id, quality = %self.quality, "worker registered");

		let mut last_heartbeat = Instant::now();

		loop {
			if last_heartbeat.elapsed() >= self.heartbeat_interval {
				self.queue.register_worker(&self.worker_id, self.quality).await?;
				last_heartbeat = Instant::now();
			}

			let dequeued = tokio::select! {
				biased;
				() = shutdown.cancelled() => {
					info!(worker_id = %self.worker_id, "shutdown signal received, exiting main loop");
					break;
				}
				result = self.queue.dequeue(self.quality, DEQUEUE_TIMEOUT) => result?,
			};

			let Some(job) = dequeued else {
				continue;
			};

			// A job already picked up is completed or failed before the
			// process exits; it is never re-enqueued, even mid-shutdown.
			if let Err(e) = self.process_job(&job).await {
				warn!(worker_id = %self.worker_id, job_id = %job.job_id, error = %e, "failed to finalize job");
			}
		}

		self.queue.unregister_worker(&self.worker_id).await?;
		info!(worker_id = %self.worker_id, "worker unregistered, shutting down");
		Ok(())
	}

	#[instrument(skip(self, job), fields(job_id = %job.job_id, quality = %job.quality))]
	async fn process_job(&self, job: &Job) -> Result<(), WorkerError> {
		let job_id = job.job_id.to_string();
		self.queue.transition_status(&job_id, tts_queue::JobStatus::Processing).await?;

		let prepared = match self.prepare_reference(job.reference.as_ref()) {
			Ok(prepared) => prepared,
			Err(e) => return self.finish_with_error(&job_id, &e, "reference_preprocessing_failed").await,
		};

		let request = SynthesisRequest {
			text: &job.text,
			voice: &job.voice,
			speed: job.speed,
			quality: job.quality,
			nfe_steps: self.nfe_steps,
			reference: prepared.as_ref(),
		};

		let started = Instant::now();
		match self.engine.synthesize(&request) {
			Ok(output) => {
				let generation_time = started.elapsed().as_secs_f64();
				let audio_b64 = BASE64.encode(&output.audio);
				let result = JobResult::completed(audio_b64, generation_time, output.audio_duration);
				self.queue.store_result(&job_id, &result).await?;
				self.queue.increment_metric("jobs_completed", 1).await?;
				Ok(())
			}
			Err(e) => self.finish_with_error(&job_id, &e, "synthesis_failed").await,
		}
	}

	fn prepare_reference(&self, reference: Option<&VoiceReference>) -> Result<Option<tts_engine::PreparedReference>, WorkerError> {
		let Some(reference) = reference else {
			return Ok(None);
		};
		let raw = BASE64.decode(&reference.reference_audio)?;
		let prepared = self.preprocessor.prepare(&raw, &reference.reference_text, reference.trim_audio_to)?;
		Ok(Some(prepared))
	}

	/// Converts any engine-facing failure into a terminal `error` result
	/// and increments `jobs_failed`. Workers never propagate an engine
	/// exception to the caller; per spec.md 7 they catch it and continue.
	async fn finish_with_error(&self, job_id: &str, error: &impl std::fmt::Display, error_code: &str) -> Result<(), WorkerError> {
		let result = JobResult::error(error.to_string(), error_code.to_string());
		self.queue.store_result(job_id, &result).await?;
		self.queue.increment_metric("jobs_failed", 1).await?;
		Ok(())
	}
}

/// Convenience alias for the production worker: real broker, stub engine,
/// `hound`-based preprocessing. Swapping `StubEngine` for a real model only
/// requires a different `SynthesisEngine` impl behind this same seam.
pub type ProductionWorker = Worker<tts_broker::RedisBroker, tts_engine::StubEngine, tts_engine::HoundPreprocessor>;

#[must_use]
pub fn build_production_worker(worker_id: String, quality: Quality, nfe_steps_override: Option<u32>, heartbeat_interval: Duration, broker: Arc<tts_broker::RedisBroker>) -> ProductionWorker {
	Worker::new(
		worker_id,
		quality,
		nfe_steps_override,
		heartbeat_interval,
		JobQueueService::new(broker),
		tts_engine::StubEngine::default(),
		tts_engine::HoundPreprocessor,
	)
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::sync::Arc;
	use tts_broker::MemoryBroker;
	use tts_queue::{JobStatus, Quality, VoiceAttributes};

	fn worker(quality: Quality) -> Worker<MemoryBroker, tts_engine::StubEngine, tts_engine::HoundPreprocessor> {
		let broker = Arc::new(MemoryBroker::new());
		Worker::new(
			"test-worker".to_string(),
			quality,
			None,
			Duration::from_secs(30),
			JobQueueService::new(broker),
			tts_engine::StubEngine::default(),
			tts_engine::HoundPreprocessor,
		)
	}

	fn sample_job(quality: Quality) -> Job {
		Job {
			job_id: uuid::Uuid::new_v4(),
			text: "hello there friend".to_string(),
			voice: VoiceAttributes::default(),
			speed: 1.0,
			quality,
			reference: None,
			created_at: chrono::Utc::now(),
			timeout_secs: 30,
		}
	}

	#[tokio::test]
	async fn dequeued_job_completes_and_increments_metric() {
		let worker = worker(Quality::High);
		let job = sample_job(Quality::High);
		worker.queue.enqueue(&job).await.unwrap();

		let dequeued = worker.queue.dequeue(Quality::High, Duration::from_millis(50)).await.unwrap().unwrap();
		worker.process_job(&dequeued).await.unwrap();

		let status = worker.queue.get_status(&job.job_id.to_string()).await.unwrap();
		assert_eq!(status, Some(JobStatus::Completed));

		let result = worker.queue.get_result(&job.job_id.to_string()).await.unwrap().unwrap();
		assert!(result.audio.is_some());

		let metrics = worker.queue.get_metrics().await.unwrap();
		assert_eq!(metrics.get("jobs_completed"), Some(&1));
	}

	#[tokio::test]
	async fn empty_text_job_finishes_as_error_not_propagated() {
		let worker = worker(Quality::Fast);
		let mut job = sample_job(Quality::Fast);
		job.text = "   ".to_string();
		worker.queue.enqueue(&job).await.unwrap();

		let dequeued = worker.queue.dequeue(Quality::Fast, Duration::from_millis(50)).await.unwrap().unwrap();
		worker.process_job(&dequeued).await.unwrap();

		let status = worker.queue.get_status(&job.job_id.to_string()).await.unwrap();
		assert_eq!(status, Some(JobStatus::Error));

		let metrics = worker.queue.get_metrics().await.unwrap();
		assert_eq!(metrics.get("jobs_failed"), Some(&1));
	}

	#[tokio::test]
	async fn shutdown_token_stops_the_main_loop_and_unregisters() {
		let worker = worker(Quality::High);
		let shutdown = CancellationToken::new();
		shutdown.cancel();

		worker.run(shutdown).await.unwrap();

		let by_quality = worker.queue.get_workers_by_quality().await.unwrap();
		assert!(by_quality[&Quality::High].is_empty());
	}
}
