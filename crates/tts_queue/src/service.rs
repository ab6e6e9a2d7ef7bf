use crate::error::QueueError;
use crate::types::{Job, JobResult, JobStatus, Quality, WorkerRegistration};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tts_broker::Broker;

const DEFAULT_RESULT_TTL: Duration = Duration::from_secs(300);
const DEFAULT_WORKER_TTL: Duration = Duration::from_secs(60);
const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);

const METRICS_KEY: &str = "metrics";

fn queue_key(quality: Quality) -> String {
	format!("jobs:{}", quality.as_str())
}

fn status_key(job_id: &str) -> String {
	format!("status:{job_id}")
}

fn result_key(job_id: &str) -> String {
	format!("result:{job_id}")
}

fn worker_key(worker_id: &str) -> String {
	format!("worker:{worker_id}")
}

/// Owns the enqueue/dequeue contract, the result rendezvous, worker
/// registration, and metrics. All state lives in the broker; this is
/// stateless dispatch logic layered over it.
pub struct JobQueueService<B: Broker> {
	broker: Arc<B>,
	result_ttl: Duration,
	worker_ttl: Duration,
}

impl<B: Broker> Clone for JobQueueService<B> {
	fn clone(&self) -> Self {
		Self {
			broker: Arc::clone(&self.broker),
			result_ttl: self.result_ttl,
			worker_ttl: self.worker_ttl,
		}
	}
}

impl<B: Broker> JobQueueService<B> {
	#[must_use]
	pub fn new(broker: Arc<B>) -> Self {
		Self {
			broker,
			result_ttl: DEFAULT_RESULT_TTL,
			worker_ttl: DEFAULT_WORKER_TTL,
		}
	}

	#[must_use]
	pub fn with_ttls(broker: Arc<B>, result_ttl: Duration, worker_ttl: Duration) -> Self {
		Self { broker, result_ttl, worker_ttl }
	}

	/// # Errors
	/// Returns an error if the broker write fails.
	pub async fn enqueue(&self, job: &Job) -> Result<(), QueueError> {
		let serialized = serde_json::to_string(job)?;
		self.broker.push(&queue_key(job.quality), &serialized).await?;
		self.broker.set(&status_key(&job.job_id.to_string()), JobStatus::Pending.as_str(), Some(self.result_ttl)).await?;
		Ok(())
	}

	/// Blocks up to `timeout` for the oldest job on `quality`'s queue.
	///
	/// # Errors
	/// Returns an error if the broker call fails or a popped entry is
	/// corrupt JSON.
	pub async fn dequeue(&self, quality: Quality, timeout: Duration) -> Result<Option<Job>, QueueError> {
		let Some(raw) = self.broker.blocking_pop(&queue_key(quality), timeout).await? else {
			return Ok(None);
		};
		Ok(Some(serde_json::from_str(&raw)?))
	}

	/// Unconditionally (re)writes a job's status, refreshing its TTL so a
	/// long-running job's status key doesn't expire out from under it
	/// before a terminal result is stored.
	///
	/// # Errors
	/// Returns an error if the broker write fails.
	pub async fn set_status(&self, job_id: &str, status: JobStatus) -> Result<(), QueueError> {
		self.broker.set(&status_key(job_id), status.as_str(), Some(self.result_ttl)).await?;
		Ok(())
	}

	/// Like `set_status`, but enforces the legal transition order,
	/// rejecting any call that would regress or skip a state.
	///
	/// # Errors
	/// Returns `QueueError::IllegalTransition` if the move from the
	/// currently stored status to `status` is not legal, or a broker error.
	pub async fn transition_status(&self, job_id: &str, status: JobStatus) -> Result<(), QueueError> {
		if let Some(current) = self.get_status(job_id).await? {
			if !current.can_transition_to(status) {
				return Err(QueueError::IllegalTransition { from: current, to: status });
			}
		}
		self.set_status(job_id, status).await
	}

	/// # Errors
	/// Returns an error if the broker write fails.
	pub async fn store_result(&self, job_id: &str, result: &JobResult) -> Result<(), QueueError> {
		let serialized = serde_json::to_string(result)?;
		self.broker.set(&result_key(job_id), &serialized, Some(self.result_ttl)).await?;
		self.broker.set(&status_key(job_id), result.status.as_str(), Some(self.result_ttl)).await?;
		Ok(())
	}

	/// # Errors
	/// Returns an error if the broker read fails.
	pub async fn get_status(&self, job_id: &str) -> Result<Option<JobStatus>, QueueError> {
		let Some(raw) = self.broker.get(&status_key(job_id)).await? else {
			return Ok(None);
		};
		Ok(raw.parse().ok())
	}

	/// # Errors
	/// Returns an error if the broker read fails or the stored result is
	/// corrupt JSON.
	pub async fn get_result(&self, job_id: &str) -> Result<Option<JobResult>, QueueError> {
		let Some(raw) = self.broker.get(&result_key(job_id)).await? else {
			return Ok(None);
		};
		Ok(Some(serde_json::from_str(&raw)?))
	}

	/// Bounded poll for a terminal result: samples `get_result` every
	/// `poll_interval` until one appears or `timeout` elapses. Returns
	/// `Ok(None)` on timeout, never an error for "not yet ready."
	///
	/// # Errors
	/// Returns an error if a broker read fails.
	pub async fn wait_for_result(&self, job_id: &str, timeout: Duration, poll_interval: Duration) -> Result<Option<JobResult>, QueueError> {
		let deadline = tokio::time::Instant::now() + timeout;
		loop {
			if let Some(result) = self.get_result(job_id).await? {
				return Ok(Some(result));
			}
			if tokio::time::Instant::now() >= deadline {
				return Ok(None);
			}
			let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
			tokio::time::sleep(poll_interval.min(remaining.max(Duration::from_millis(1)))).await;
			if tokio::time::Instant::now() >= deadline {
				return Ok(self.get_result(job_id).await?);
			}
		}
	}

	/// Convenience wrapper using the default 100ms poll interval.
	///
	/// # Errors
	/// See `wait_for_result`.
	pub async fn wait_for_result_default_poll(&self, job_id: &str, timeout: Duration) -> Result<Option<JobResult>, QueueError> {
		self.wait_for_result(job_id, timeout, DEFAULT_POLL_INTERVAL).await
	}

	/// Size of one quality's queue, or the total across both if `quality`
	/// is `None`.
	///
	/// # Errors
	/// Returns an error if the broker call fails.
	pub async fn queue_size(&self, quality: Option<Quality>) -> Result<usize, QueueError> {
		match quality {
			Some(q) => Ok(self.broker.len(&queue_key(q)).await?),
			None => {
				let mut total = 0;
				for q in Quality::all() {
					total += self.broker.len(&queue_key(q)).await?;
				}
				Ok(total)
			}
		}
	}

	/// Sizes for every quality class.
	///
	/// # Errors
	/// Returns an error if a broker call fails.
	pub async fn queue_sizes(&self) -> Result<HashMap<Quality, usize>, QueueError> {
		let mut sizes = HashMap::new();
		for q in Quality::all() {
			sizes.insert(q, self.broker.len(&queue_key(q)).await?);
		}
		Ok(sizes)
	}

	/// Zero-based FIFO position of `job_id` within `quality`'s queue, or
	/// `-1` if it is not present (already dequeued, or never enqueued on
	/// this class). Position 0 is the next job a worker of that quality
	/// will consume.
	///
	/// # Errors
	/// Returns an error if the broker call fails or an entry is corrupt
	/// JSON.
	pub async fn queue_position(&self, job_id: &str, quality: Quality) -> Result<i64, QueueError> {
		let raw_jobs = self.broker.range(&queue_key(quality), 0, -1).await?;
		// `push` inserts at the head and `blocking_pop` removes from the
		// tail, so walking the list tail-to-head gives consumption order.
		for (position, raw) in raw_jobs.iter().rev().enumerate() {
			let job: Job = serde_json::from_str(raw)?;
			if job.job_id.to_string() == job_id {
				return Ok(i64::try_from(position).unwrap_or(i64::MAX));
			}
		}
		Ok(-1)
	}

	/// Refreshes (or creates) this worker's heartbeat membership.
	///
	/// # Errors
	/// Returns an error if the broker write fails.
	pub async fn register_worker(&self, worker_id: &str, quality: Quality) -> Result<(), QueueError> {
		let registration = WorkerRegistration { timestamp: chrono::Utc::now(), quality };
		let serialized = serde_json::to_string(&registration)?;
		self.broker.set(&worker_key(worker_id), &serialized, Some(self.worker_ttl)).await?;
		Ok(())
	}

	/// # Errors
	/// Returns an error if the broker write fails.
	pub async fn unregister_worker(&self, worker_id: &str) -> Result<(), QueueError> {
		self.broker.delete(&worker_key(worker_id)).await?;
		Ok(())
	}

	/// Active worker ids grouped by the quality class they consume.
	/// Unparseable registrations are skipped rather than failing the call.
	///
	/// # Errors
	/// Returns an error if the broker scan fails.
	pub async fn get_workers_by_quality(&self) -> Result<HashMap<Quality, Vec<String>>, QueueError> {
		let mut by_quality: HashMap<Quality, Vec<String>> = HashMap::new();
		for q in Quality::all() {
			by_quality.insert(q, Vec::new());
		}

		for key in self.broker.scan_prefix("worker:").await? {
			let Some(worker_id) = key.strip_prefix("worker:") else { continue };
			let Some(raw) = self.broker.get(&key).await? else { continue };
			let Ok(registration) = serde_json::from_str::<WorkerRegistration>(&raw) else { continue };
			by_quality.entry(registration.quality).or_default().push(worker_id.to_string());
		}
		Ok(by_quality)
	}

	/// All active worker ids, across quality classes.
	///
	/// # Errors
	/// Returns an error if the broker scan fails.
	pub async fn get_active_worker_ids(&self) -> Result<Vec<String>, QueueError> {
		Ok(self.get_workers_by_quality().await?.into_values().flatten().collect())
	}

	/// # Errors
	/// Returns an error if the broker write fails.
	pub async fn increment_metric(&self, name: &str, delta: i64) -> Result<(), QueueError> {
		self.broker.hash_incr(METRICS_KEY, name, delta).await?;
		Ok(())
	}

	/// # Errors
	/// Returns an error if the broker read fails.
	pub async fn get_metrics(&self) -> Result<HashMap<String, i64>, QueueError> {
		let raw = self.broker.hash_getall(METRICS_KEY).await?;
		Ok(raw.into_iter().filter_map(|(k, v)| v.parse().ok().map(|n| (k, n))).collect())
	}

	/// # Errors
	/// Never returns `Err`; kept fallible for symmetry with other broker
	/// calls and to allow a future backend to surface connection errors.
	pub async fn ping(&self) -> Result<bool, QueueError> {
		Ok(self.broker.ping().await)
	}
}
