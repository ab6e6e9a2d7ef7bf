use axum::Json;
use serde::Serialize;

/// Static enumeration of the closed voice-attribute sets, per spec.md 6's
/// `GET /voices` contract. `group` is a content-category grouping distinct
/// from the raw `area` enum; its values come from the original gateway
/// implementation, not the distilled spec — see DESIGN.md.
#[derive(Debug, Serialize)]
pub struct VoicesResponse {
	pub gender: &'static [&'static str],
	pub area: &'static [&'static str],
	pub emotion: &'static [&'static str],
	pub group: &'static [&'static str],
}

pub async fn get_voices() -> Json<VoicesResponse> {
	Json(VoicesResponse {
		gender: &["male", "female"],
		area: &["northern", "southern", "central"],
		emotion: &["neutral", "serious", "monotone", "sad", "surprised", "happy", "angry"],
		group: &["story", "news", "audiobook", "interview", "review"],
	})
}
