use axum::Json;
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct RootResponse {
	pub service: &'static str,
	pub version: &'static str,
}

pub async fn get_root() -> Json<RootResponse> {
	Json(RootResponse { service: "tts-gateway", version: env!("CARGO_PKG_VERSION") })
}
