use clap::Parser;
use std::time::Duration;

fn parse_duration_secs(s: &str) -> Result<Duration, std::num::ParseFloatError> {
	s.parse::<f64>().map(Duration::from_secs_f64)
}

/// Environment-driven gateway configuration. Every variable in spec.md 6's
/// Environment table that applies to the gateway process, plus the
/// SPEC_FULL additions (`TRUST_PROXY`, `LOG_FORMAT`).
#[derive(Parser, Clone, Debug)]
#[command(author, version, about, long_about = None)]
pub struct GatewayConfig {
	#[arg(long, env = "BROKER_URL", default_value = "redis://127.0.0.1:6379")]
	pub broker_url: String,

	#[arg(long, env = "JOB_TIMEOUT", default_value = "120", value_parser = parse_duration_secs)]
	pub job_timeout: Duration,

	#[arg(long, env = "API_PORT", default_value = "8000")]
	pub api_port: u16,

	/// Only an HTTP proxy operator should enable this: it makes the
	/// localhost credential bypass trust the client-supplied
	/// `X-Forwarded-For` header. See spec.md 9's design note.
	#[arg(long, env = "TRUST_PROXY", default_value = "false")]
	pub trust_proxy: bool,

	/// Average generation time used to estimate an async submission's
	/// wait, per spec.md 4.4's `estimated_wait` formula.
	#[arg(long, env = "AVG_GENERATION_TIME", default_value = "3.0")]
	pub avg_generation_time: f64,

	#[arg(long, env = "VOICE_SAMPLES_DIR", default_value = "./voice_samples")]
	pub voice_samples_dir: String,

	#[arg(long, env = "LOG_FORMAT", default_value = "pretty")]
	pub log_format: String,

	#[arg(long, env = "RUST_LOG", default_value = "info")]
	pub rust_log: String,
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn defaults_match_spec() {
		let config = GatewayConfig::try_parse_from(["gateway"]).unwrap();
		assert_eq!(config.job_timeout, Duration::from_secs(120));
		assert_eq!(config.api_port, 8000);
		assert!(!config.trust_proxy);
	}

	#[test]
	fn job_timeout_of_zero_is_accepted() {
		let config = GatewayConfig::try_parse_from(["gateway", "--job-timeout", "0"]).unwrap();
		assert_eq!(config.job_timeout, Duration::from_secs(0));
	}
}
