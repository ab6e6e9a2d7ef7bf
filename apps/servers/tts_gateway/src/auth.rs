use crate::error::GatewayError;
use axum::http::HeaderMap;
use std::net::SocketAddr;
use tts_broker::Broker;
use tts_credentials::{CredentialInfo, CredentialStore};

const LOCALHOST_TOKENS: [&str; 3] = ["127.0.0.1", "::1", "localhost"];

fn is_localhost_token(s: &str) -> bool {
	LOCALHOST_TOKENS.contains(&s)
}

/// `client_host ∈ {127.0.0.1, ::1, localhost}`, OR (only when `trust_proxy`
/// is set) `X-Forwarded-For`'s first comma-separated element is in that
/// set. Trusting the header unconditionally would let any client spoof a
/// localhost identity, hence the config gate (spec.md 9).
fn is_localhost(addr: SocketAddr, headers: &HeaderMap, trust_proxy: bool) -> bool {
	if addr.ip().is_loopback() {
		return true;
	}
	if trust_proxy {
		if let Some(forwarded) = headers.get("x-forwarded-for").and_then(|v| v.to_str().ok()) {
			if let Some(first) = forwarded.split(',').next() {
				return is_localhost_token(first.trim());
			}
		}
	}
	false
}

fn extract_api_key(headers: &HeaderMap, query_api_key: Option<&str>) -> Option<String> {
	headers
		.get("x-api-key")
		.and_then(|v| v.to_str().ok())
		.map(str::to_string)
		.or_else(|| query_api_key.map(str::to_string))
}

/// The credential gate: accepts iff the request is from localhost, or a
/// supplied key validates. Returns `None` for the localhost bypass (no
/// credential to charge usage against) and `Some(info)` for an
/// authenticated caller.
///
/// # Errors
/// Returns `GatewayError::AuthMissing` if neither localhost nor a key is
/// present, `GatewayError::AuthInvalid` if a key is present but does not
/// validate, or a broker error surfaced through `validate`.
pub async fn authenticate<B: Broker>(
	credentials: &CredentialStore<B>,
	trust_proxy: bool,
	addr: SocketAddr,
	headers: &HeaderMap,
	query_api_key: Option<&str>,
) -> Result<Option<CredentialInfo>, GatewayError> {
	if is_localhost(addr, headers, trust_proxy) {
		return Ok(None);
	}

	let Some(secret) = extract_api_key(headers, query_api_key) else {
		return Err(GatewayError::AuthMissing);
	};

	credentials.validate(&secret).await?.map_or(Err(GatewayError::AuthInvalid), |info| Ok(Some(info)))
}

#[cfg(test)]
mod tests {
	use super::*;
	use axum::http::HeaderValue;
	use std::sync::Arc;
	use tts_broker::MemoryBroker;

	fn store() -> CredentialStore<MemoryBroker> {
		CredentialStore::new(Arc::new(MemoryBroker::new()))
	}

	fn remote_addr() -> SocketAddr {
		"203.0.113.7:443".parse().unwrap()
	}

	fn loopback_addr() -> SocketAddr {
		"127.0.0.1:12345".parse().unwrap()
	}

	#[tokio::test]
	async fn loopback_address_bypasses_credential() {
		let store = store();
		let result = authenticate(&store, false, loopback_addr(), &HeaderMap::new(), None).await.unwrap();
		assert!(result.is_none());
	}

	#[tokio::test]
	async fn remote_address_without_key_is_rejected() {
		let store = store();
		let err = authenticate(&store, false, remote_addr(), &HeaderMap::new(), None).await.unwrap_err();
		assert!(matches!(err, GatewayError::AuthMissing));
	}

	#[tokio::test]
	async fn remote_address_with_valid_key_is_accepted() {
		let store = store();
		let (secret, info) = store.create("friend").await.unwrap();
		let mut headers = HeaderMap::new();
		headers.insert("x-api-key", HeaderValue::from_str(&secret).unwrap());
		let result = authenticate(&store, false, remote_addr(), &headers, None).await.unwrap();
		assert_eq!(result.unwrap().key_id, info.key_id);
	}

	#[tokio::test]
	async fn remote_address_with_invalid_key_is_rejected() {
		let store = store();
		let mut headers = HeaderMap::new();
		headers.insert("x-api-key", HeaderValue::from_static("ttsk_0000000000000000000000000000aa"));
		let err = authenticate(&store, false, remote_addr(), &headers, None).await.unwrap_err();
		assert!(matches!(err, GatewayError::AuthInvalid));
	}

	#[tokio::test]
	async fn query_param_key_is_accepted_when_header_absent() {
		let store = store();
		let (secret, _) = store.create("friend").await.unwrap();
		let result = authenticate(&store, false, remote_addr(), &HeaderMap::new(), Some(&secret)).await.unwrap();
		assert!(result.is_some());
	}

	#[tokio::test]
	async fn x_forwarded_for_is_ignored_unless_trust_proxy_is_set() {
		let store = store();
		let mut headers = HeaderMap::new();
		headers.insert("x-forwarded-for", HeaderValue::from_static("127.0.0.1, 10.0.0.5"));

		let err = authenticate(&store, false, remote_addr(), &headers, None).await.unwrap_err();
		assert!(matches!(err, GatewayError::AuthMissing));

		let result = authenticate(&store, true, remote_addr(), &headers, None).await.unwrap();
		assert!(result.is_none());
	}
}
