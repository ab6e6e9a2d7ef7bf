pub mod error;

use chrono::{DateTime, Utc};
use error::CredentialError;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::sync::Arc;
use tts_broker::Broker;

/// `{KEY_PREFIX}{32 hex chars}`; the public `key_id` is the trailing 8 chars
/// of the random token, stable across the secret's lifetime.
const KEY_PREFIX: &str = "ttsk_";
const TOKEN_HEX_LEN: usize = 32;
const KEY_ID_LEN: usize = 8;

fn record_key(key_id: &str) -> String {
	format!("apikey:{key_id}")
}

fn usage_key(key_id: &str) -> String {
	format!("apikey:{key_id}:usage")
}

fn hash_secret(full_secret: &str) -> String {
	let digest = Sha256::digest(full_secret.as_bytes());
	format!("{digest:x}")
}

fn generate_secret() -> (String, String) {
	let mut bytes = [0u8; TOKEN_HEX_LEN / 2];
	rand::thread_rng().fill_bytes(&mut bytes);
	let token = bytes.iter().map(|b| format!("{b:02x}")).collect::<String>();
	let full_secret = format!("{KEY_PREFIX}{token}");
	let key_id = token[token.len() - KEY_ID_LEN..].to_string();
	(full_secret, key_id)
}

fn key_id_from_secret(full_secret: &str) -> Option<String> {
	let token = full_secret.strip_prefix(KEY_PREFIX)?;
	if token.len() != TOKEN_HEX_LEN {
		return None;
	}
	Some(token[token.len() - KEY_ID_LEN..].to_string())
}

/// The immutable part of a credential: everything but the usage counters,
/// which live in a separate broker hash so they can be incremented
/// atomically (see `increment`).
#[derive(Debug, Clone, Serialize, Deserialize)]
struct CredentialRecord {
	key_id: String,
	name: String,
	created_at: DateTime<Utc>,
	secret_hash: String,
}

/// Public view of a credential: descriptive fields plus the current usage
/// counters, merged at read time.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CredentialInfo {
	pub key_id: String,
	pub name: String,
	pub created_at: DateTime<Utc>,
	pub requests_count: i64,
	pub audio_seconds: f64,
}

impl CredentialInfo {
	fn from_record(record: CredentialRecord, requests_count: i64, audio_seconds: f64) -> Self {
		Self {
			key_id: record.key_id,
			name: record.name,
			created_at: record.created_at,
			requests_count,
			audio_seconds,
		}
	}
}

/// Keyed records holding a hashed secret and running usage counters.
pub struct CredentialStore<B: Broker> {
	broker: Arc<B>,
}

impl<B: Broker> Clone for CredentialStore<B> {
	fn clone(&self) -> Self {
		Self { broker: Arc::clone(&self.broker) }
	}
}

impl<B: Broker> CredentialStore<B> {
	pub fn new(broker: Arc<B>) -> Self {
		Self { broker }
	}

	/// Creates a new credential. The returned `String` is the only time the
	/// full secret is ever available — only its hash is stored.
	///
	/// # Errors
	/// Returns an error if the broker write fails.
	pub async fn create(&self, name: &str) -> Result<(String, CredentialInfo), CredentialError> {
		let (full_secret, key_id) = generate_secret();
		let record = CredentialRecord {
			key_id: key_id.clone(),
			name: name.to_string(),
			created_at: Utc::now(),
			secret_hash: hash_secret(&full_secret),
		};
		let serialized = serde_json::to_string(&record)?;
		self.broker.set(&record_key(&key_id), &serialized, None).await?;
		let info = CredentialInfo::from_record(record, 0, 0.0);
		Ok((full_secret, info))
	}

	/// Validates a full secret, returning its current info iff the record
	/// exists and the secret's hash matches.
	///
	/// # Errors
	/// Returns an error if the broker read fails or a stored record is
	/// corrupt JSON.
	pub async fn validate(&self, full_secret: &str) -> Result<Option<CredentialInfo>, CredentialError> {
		let Some(key_id) = key_id_from_secret(full_secret) else {
			return Ok(None);
		};

		let Some(raw) = self.broker.get(&record_key(&key_id)).await? else {
			return Ok(None);
		};
		let record: CredentialRecord = serde_json::from_str(&raw)?;

		if record.secret_hash != hash_secret(full_secret) {
			return Ok(None);
		}

		let info = self.load_info(record).await?;
		Ok(Some(info))
	}

	/// Deletes a credential by its public `key_id`. Returns `true` iff a
	/// record existed.
	///
	/// # Errors
	/// Returns an error if the broker write fails.
	pub async fn delete(&self, key_id: &str) -> Result<bool, CredentialError> {
		let existed = self.broker.get(&record_key(key_id)).await?.is_some();
		self.broker.delete(&record_key(key_id)).await?;
		self.broker.delete(&usage_key(key_id)).await?;
		Ok(existed)
	}

	/// Lists all credentials, newest first.
	///
	/// # Errors
	/// Returns an error if the broker scan fails or a stored record is
	/// corrupt JSON.
	pub async fn list(&self) -> Result<Vec<CredentialInfo>, CredentialError> {
		let keys = self.broker.scan_prefix("apikey:").await?;
		let mut infos = Vec::new();
		for key in keys {
			// usage_key() entries also start with "apikey:"; skip them.
			if key.ends_with(":usage") {
				continue;
			}
			let Some(raw) = self.broker.get(&key).await? else {
				continue;
			};
			let record: CredentialRecord = serde_json::from_str(&raw)?;
			infos.push(self.load_info(record).await?);
		}
		infos.sort_by(|a, b| b.created_at.cmp(&a.created_at));
		Ok(infos)
	}

	/// Atomically increments the usage counters for `key_id`. A single
	/// request is always counted; `audio_seconds` may be zero (the gateway
	/// charges audio only on the synchronous path, per design).
	///
	/// # Errors
	/// Returns an error if the broker write fails.
	pub async fn increment(&self, key_id: &str, audio_seconds: f64) -> Result<(), CredentialError> {
		self.broker.hash_incr(&usage_key(key_id), "requests_count", 1).await?;
		if audio_seconds > 0.0 {
			self.broker.hash_incr_float(&usage_key(key_id), "audio_seconds", audio_seconds).await?;
		}
		Ok(())
	}

	async fn load_info(&self, record: CredentialRecord) -> Result<CredentialInfo, CredentialError> {
		let usage = self.broker.hash_getall(&usage_key(&record.key_id)).await?;
		let requests_count = usage.get("requests_count").and_then(|v| v.parse().ok()).unwrap_or(0);
		let audio_seconds = usage.get("audio_seconds").and_then(|v| v.parse().ok()).unwrap_or(0.0);
		Ok(CredentialInfo::from_record(record, requests_count, audio_seconds))
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use tts_broker::MemoryBroker;

	fn store() -> CredentialStore<MemoryBroker> {
		CredentialStore::new(Arc::new(MemoryBroker::new()))
	}

	#[tokio::test]
	async fn create_then_validate_round_trips() {
		let store = store();
		let (secret, info) = store.create("friend").await.unwrap();
		let validated = store.validate(&secret).await.unwrap().unwrap();
		assert_eq!(validated.key_id, info.key_id);
		assert_eq!(validated.name, "friend");
	}

	#[tokio::test]
	async fn validate_rejects_tampered_secret() {
		let store = store();
		let (secret, _) = store.create("friend").await.unwrap();
		let mut tampered = secret.clone();
		let last = tampered.pop().unwrap();
		tampered.push(if last == '0' { '1' } else { '0' });
		assert!(store.validate(&tampered).await.unwrap().is_none());
	}

	#[tokio::test]
	async fn validate_rejects_unknown_key() {
		let store = store();
		assert!(store.validate("ttsk_0000000000000000000000000000aa").await.unwrap().is_none());
		assert!(store.validate("garbage").await.unwrap().is_none());
	}

	#[tokio::test]
	async fn increment_is_additive_and_accumulates_audio_seconds() {
		let store = store();
		let (_, info) = store.create("friend").await.unwrap();
		for _ in 0..5 {
			store.increment(&info.key_id, 2.5).await.unwrap();
		}
		let refreshed = store.list().await.unwrap().into_iter().next().unwrap();
		assert_eq!(refreshed.requests_count, 5);
		assert!((refreshed.audio_seconds - 12.5).abs() < f64::EPSILON);
	}

	#[tokio::test]
	async fn delete_removes_the_record() {
		let store = store();
		let (secret, info) = store.create("friend").await.unwrap();
		assert!(store.delete(&info.key_id).await.unwrap());
		assert!(store.validate(&secret).await.unwrap().is_none());
		assert!(!store.delete(&info.key_id).await.unwrap());
	}

	#[tokio::test]
	async fn list_orders_newest_first() {
		let store = store();
		let (_, first) = store.create("a").await.unwrap();
		tokio::time::sleep(std::time::Duration::from_millis(5)).await;
		let (_, second) = store.create("b").await.unwrap();
		let listed = store.list().await.unwrap();
		assert_eq!(listed[0].key_id, second.key_id);
		assert_eq!(listed[1].key_id, first.key_id);
	}
}
