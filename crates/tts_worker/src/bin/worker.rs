use clap::Parser;
use std::str::FromStr;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{filter::EnvFilter, fmt::format::JsonFields, layer::SubscriberExt, util::SubscriberInitExt, Layer};
use tts_broker::{Broker, RedisBroker};
use tts_worker::{build_production_worker, config::WorkerConfig};

fn init_tracing(config: &WorkerConfig) {
	let filter = EnvFilter::from_str(&config.rust_log).unwrap_or_else(|_| EnvFilter::new("info"));

	tracing_subscriber::registry()
		.with(if config.log_format == "json" {
			Box::new(
				tracing_subscriber::fmt::layer()
					.fmt_fields(JsonFields::default())
					.event_format(tracing_subscriber::fmt::format().json().flatten_event(true).with_span_list(false))
					.with_filter(filter),
			) as Box<dyn Layer<_> + Send + Sync>
		} else {
			Box::new(tracing_subscriber::fmt::layer().event_format(tracing_subscriber::fmt::format().pretty()).with_filter(filter))
		})
		.init();
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
	dotenv::dotenv().ok();
	let config = WorkerConfig::parse();
	init_tracing(&config);

	let worker_id = config.worker_id_or_generated();
	tracing::info!(worker_id = %worker_id, quality = %config.quality, broker_url = %config.broker_url, "starting tts worker");

	// Initialization order per spec.md 4.5: open broker, ping, load the
	// engine (instant for the stub; a real model load belongs here), then
	// register and loop.
	let broker = Arc::new(RedisBroker::connect(&config.broker_url).await?);
	anyhow::ensure!(broker.ping().await, "broker did not respond to ping at startup");

	let worker = build_production_worker(worker_id, config.quality, config.nfe_steps, config.heartbeat_interval, broker);

	let shutdown = CancellationToken::new();
	let signal_token = shutdown.clone();
	tokio::spawn(async move {
		wait_for_termination().await;
		tracing::info!("termination signal received, draining current job before exit");
		signal_token.cancel();
	});

	worker.run(shutdown).await?;
	Ok(())
}

#[cfg(unix)]
async fn wait_for_termination() {
	let mut terminate = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()).expect("failed to install SIGTERM handler");
	tokio::select! {
		_ = tokio::signal::ctrl_c() => {}
		_ = terminate.recv() => {}
	}
}

#[cfg(not(unix))]
async fn wait_for_termination() {
	let _ = tokio::signal::ctrl_c().await;
}
