use anyhow::Context;
use clap::Parser;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tts_gateway::config::GatewayConfig;
use tts_gateway::state::AppState;
use tts_gateway::build_router;

fn init_tracing(config: &GatewayConfig) {
	use tracing_subscriber::layer::SubscriberExt;
	use tracing_subscriber::util::SubscriberInitExt;
	use tracing_subscriber::EnvFilter;

	let filter = EnvFilter::try_new(&config.rust_log).unwrap_or_else(|_| EnvFilter::new("info"));

	let registry = tracing_subscriber::registry().with(filter);
	if config.log_format == "json" {
		registry.with(tracing_subscriber::fmt::layer().json().flatten_event(true)).init();
	} else {
		registry.with(tracing_subscriber::fmt::layer()).init();
	}
}

#[cfg(unix)]
async fn wait_for_termination() {
	use tokio::signal::unix::{signal, SignalKind};
	let mut sigterm = signal(SignalKind::terminate()).expect("failed to install SIGTERM handler");
	tokio::select! {
		_ = sigterm.recv() => {}
		_ = tokio::signal::ctrl_c() => {}
	}
}

#[cfg(not(unix))]
async fn wait_for_termination() {
	let _ = tokio::signal::ctrl_c().await;
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
	dotenv::dotenv().ok();
	let config = GatewayConfig::parse();
	init_tracing(&config);

	let config = Arc::new(config);
	let state = AppState::build(config.clone()).await.context("failed to build gateway state")?;
	anyhow::ensure!(state.queue.ping().await?, "broker did not respond to ping at startup");

	let app = build_router(state).into_make_service_with_connect_info::<SocketAddr>();
	let listener = TcpListener::bind(("0.0.0.0", config.api_port)).await?;
	tracing::info!(addr = %listener.local_addr()?, "tts_gateway listening");

	let shutdown = CancellationToken::new();
	let shutdown_signal = shutdown.clone();
	tokio::spawn(async move {
		wait_for_termination().await;
		tracing::info!("shutdown signal received");
		shutdown_signal.cancel();
	});

	axum::serve(listener, app).with_graceful_shutdown(async move { shutdown.cancelled().await }).await?;
	tracing::info!("tts_gateway stopped");
	Ok(())
}
