use clap::Parser;
use std::time::Duration;
use tts_queue::Quality;

fn parse_duration_secs(s: &str) -> Result<Duration, std::num::ParseIntError> {
	s.parse::<u64>().map(Duration::from_secs)
}

fn parse_quality(s: &str) -> Result<Quality, String> {
	s.parse().map_err(|()| format!("invalid quality '{s}', expected 'high' or 'fast'"))
}

/// Environment-driven configuration for one worker process. A process is
/// configured for exactly one `quality` at startup; it never switches.
#[derive(Parser, Clone, Debug)]
#[command(author, version, about, long_about = None)]
pub struct WorkerConfig {
	#[arg(long, env = "BROKER_URL", default_value = "redis://127.0.0.1:6379")]
	pub broker_url: String,

	/// Stable identity for `worker:{id}` heartbeat registration. Generated
	/// if not supplied.
	#[arg(long, env = "WORKER_ID")]
	pub worker_id: Option<String>,

	#[arg(long, env = "QUALITY", value_parser = parse_quality)]
	pub quality: Quality,

	/// Overrides the engine's internal refinement step count; defaults to
	/// the quality-class preset (32 for high, 16 for fast).
	#[arg(long, env = "NFE_STEPS")]
	pub nfe_steps: Option<u32>,

	#[arg(long, env = "HEARTBEAT_INTERVAL", default_value = "30", value_parser = parse_duration_secs)]
	pub heartbeat_interval: Duration,

	#[arg(long, env = "LOG_FORMAT", default_value = "pretty")]
	pub log_format: String,

	#[arg(long, env = "RUST_LOG", default_value = "info")]
	pub rust_log: String,
}

impl WorkerConfig {
	#[must_use]
	pub fn worker_id_or_generated(&self) -> String {
		self.worker_id.clone().unwrap_or_else(|| format!("worker-{}", uuid::Uuid::new_v4()))
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn parses_quality_and_defaults() {
		let config = WorkerConfig::try_parse_from(["worker", "--quality", "fast"]).unwrap();
		assert_eq!(config.quality, Quality::Fast);
		assert_eq!(config.heartbeat_interval, Duration::from_secs(30));
		assert!(config.nfe_steps.is_none());
	}

	#[test]
	fn rejects_unknown_quality() {
		assert!(WorkerConfig::try_parse_from(["worker", "--quality", "medium"]).is_err());
	}

	#[test]
	fn generates_worker_id_when_absent() {
		let config = WorkerConfig::try_parse_from(["worker", "--quality", "high"]).unwrap();
		assert!(config.worker_id.is_none());
		assert!(config.worker_id_or_generated().starts_with("worker-"));
	}
}
