pub mod error;
pub mod service;
pub mod types;

pub use error::QueueError;
pub use service::JobQueueService;
pub use types::{Area, Emotion, Gender, Job, JobResult, JobStatus, Quality, VoiceAttributes, VoiceReference, WorkerRegistration};

#[cfg(test)]
mod tests {
	use super::*;
	use std::sync::Arc;
	use std::time::Duration;
	use tts_broker::MemoryBroker;

	fn service() -> JobQueueService<MemoryBroker> {
		JobQueueService::new(Arc::new(MemoryBroker::new()))
	}

	fn sample_job(quality: Quality) -> Job {
		Job {
			job_id: uuid::Uuid::new_v4(),
			text: "hello there".to_string(),
			voice: VoiceAttributes::default(),
			speed: 1.0,
			quality,
			reference: None,
			created_at: chrono::Utc::now(),
			timeout_secs: 30,
		}
	}

	#[tokio::test]
	async fn enqueue_sets_pending_status_and_dequeue_returns_fifo_order() {
		let svc = service();
		let first = sample_job(Quality::High);
		let second = sample_job(Quality::High);
		svc.enqueue(&first).await.unwrap();
		svc.enqueue(&second).await.unwrap();

		assert_eq!(svc.get_status(&first.job_id.to_string()).await.unwrap(), Some(JobStatus::Pending));

		let dequeued = svc.dequeue(Quality::High, Duration::from_millis(50)).await.unwrap().unwrap();
		assert_eq!(dequeued.job_id, first.job_id);
	}

	#[tokio::test]
	async fn dequeue_times_out_on_empty_queue() {
		let svc = service();
		let result = svc.dequeue(Quality::Fast, Duration::from_millis(20)).await.unwrap();
		assert!(result.is_none());
	}

	#[tokio::test]
	async fn transition_status_rejects_illegal_jump() {
		let svc = service();
		let job = sample_job(Quality::High);
		svc.enqueue(&job).await.unwrap();
		let id = job.job_id.to_string();

		let err = svc.transition_status(&id, JobStatus::Completed).await.unwrap_err();
		assert!(matches!(err, QueueError::IllegalTransition { from: JobStatus::Pending, to: JobStatus::Completed }));

		svc.transition_status(&id, JobStatus::Processing).await.unwrap();
		svc.transition_status(&id, JobStatus::Completed).await.unwrap();
		assert_eq!(svc.get_status(&id).await.unwrap(), Some(JobStatus::Completed));
	}

	#[tokio::test]
	async fn store_result_is_retrievable_and_wait_for_result_observes_it() {
		let svc = service();
		let job = sample_job(Quality::Fast);
		let id = job.job_id.to_string();
		svc.enqueue(&job).await.unwrap();

		let result = JobResult::completed("YXVkaW8=".to_string(), 0.4, 1.2);
		svc.store_result(&id, &result).await.unwrap();

		let fetched = svc.wait_for_result(&id, Duration::from_millis(200), Duration::from_millis(10)).await.unwrap();
		assert_eq!(fetched, Some(result));
	}

	#[tokio::test]
	async fn wait_for_result_times_out_when_never_stored() {
		let svc = service();
		let result = svc.wait_for_result("nonexistent", Duration::from_millis(30), Duration::from_millis(10)).await.unwrap();
		assert!(result.is_none());
	}

	#[tokio::test]
	async fn queue_position_reports_fifo_slot_and_minus_one_when_absent() {
		let svc = service();
		let first = sample_job(Quality::High);
		let second = sample_job(Quality::High);
		svc.enqueue(&first).await.unwrap();
		svc.enqueue(&second).await.unwrap();

		assert_eq!(svc.queue_position(&first.job_id.to_string(), Quality::High).await.unwrap(), 0);
		assert_eq!(svc.queue_position(&second.job_id.to_string(), Quality::High).await.unwrap(), 1);
		assert_eq!(svc.queue_position("unknown-id", Quality::High).await.unwrap(), -1);
	}

	#[tokio::test]
	async fn queue_size_counts_per_quality_and_total() {
		let svc = service();
		svc.enqueue(&sample_job(Quality::High)).await.unwrap();
		svc.enqueue(&sample_job(Quality::High)).await.unwrap();
		svc.enqueue(&sample_job(Quality::Fast)).await.unwrap();

		assert_eq!(svc.queue_size(Some(Quality::High)).await.unwrap(), 2);
		assert_eq!(svc.queue_size(Some(Quality::Fast)).await.unwrap(), 1);
		assert_eq!(svc.queue_size(None).await.unwrap(), 3);
	}

	#[tokio::test]
	async fn register_and_unregister_worker_changes_membership() {
		let svc = service();
		svc.register_worker("worker-a", Quality::High).await.unwrap();
		svc.register_worker("worker-b", Quality::Fast).await.unwrap();

		let by_quality = svc.get_workers_by_quality().await.unwrap();
		assert_eq!(by_quality[&Quality::High], vec!["worker-a".to_string()]);
		assert_eq!(by_quality[&Quality::Fast], vec!["worker-b".to_string()]);

		svc.unregister_worker("worker-a").await.unwrap();
		let by_quality = svc.get_workers_by_quality().await.unwrap();
		assert!(by_quality[&Quality::High].is_empty());
	}

	#[tokio::test]
	async fn increment_metric_accumulates() {
		let svc = service();
		svc.increment_metric("jobs_completed", 1).await.unwrap();
		svc.increment_metric("jobs_completed", 1).await.unwrap();
		svc.increment_metric("jobs_failed", 1).await.unwrap();

		let metrics = svc.get_metrics().await.unwrap();
		assert_eq!(metrics.get("jobs_completed"), Some(&2));
		assert_eq!(metrics.get("jobs_failed"), Some(&1));
	}
}
