pub mod error;

use chrono::{DateTime, Utc};
use error::VoiceSampleError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;

/// Unnamed samples beyond this count (newest kept) are evicted on every
/// `create` call.
const MAX_UNNAMED_SAMPLES: usize = 3;
const INDEX_FILE_NAME: &str = "index.json";
const ID_LEN: usize = 8;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoiceSampleRecord {
	pub id: String,
	pub name: Option<String>,
	pub reference_text: String,
	pub created_at: DateTime<Utc>,
	pub is_named: bool,
}

fn audio_path(base_dir: &Path, id: &str) -> PathBuf {
	base_dir.join(format!("{id}.wav"))
}

fn generate_id() -> String {
	let token = uuid::Uuid::new_v4().simple().to_string();
	token[..ID_LEN].to_string()
}

/// File-backed catalog: one `.wav` per sample plus a JSON index rewritten
/// atomically (write-temp-then-rename) on every mutation. The `Mutex`
/// serializes read-modify-write access to the index across concurrent
/// gateway requests.
pub struct VoiceSampleStore {
	base_dir: PathBuf,
	guard: Arc<Mutex<()>>,
}

impl Clone for VoiceSampleStore {
	fn clone(&self) -> Self {
		Self { base_dir: self.base_dir.clone(), guard: Arc::clone(&self.guard) }
	}
}

impl VoiceSampleStore {
	/// # Errors
	/// Returns an error if `base_dir` cannot be created.
	pub fn new(base_dir: impl Into<PathBuf>) -> Result<Self, VoiceSampleError> {
		let base_dir = base_dir.into();
		std::fs::create_dir_all(&base_dir)?;
		Ok(Self { base_dir, guard: Arc::new(Mutex::new(())) })
	}

	fn index_path(&self) -> PathBuf {
		self.base_dir.join(INDEX_FILE_NAME)
	}

	async fn load_index(&self) -> Result<Vec<VoiceSampleRecord>, VoiceSampleError> {
		match tokio::fs::read(self.index_path()).await {
			Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
			Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
			Err(e) => Err(e.into()),
		}
	}

	async fn save_index(&self, records: &[VoiceSampleRecord]) -> Result<(), VoiceSampleError> {
		let serialized = serde_json::to_vec_pretty(records)?;
		let base_dir = self.base_dir.clone();
		let index_path = self.index_path();
		tokio::task::spawn_blocking(move || -> Result<(), VoiceSampleError> {
			let mut temp = tempfile::NamedTempFile::new_in(&base_dir)?;
			std::io::Write::write_all(&mut temp, &serialized)?;
			temp.persist(&index_path)?;
			Ok(())
		})
		.await
		.map_err(|e| VoiceSampleError::Io(std::io::Error::other(e)))??;
		Ok(())
	}

	/// Stores `audio_bytes` (already decoded/trimmed by the caller) under a
	/// fresh id. If `name` is `None` the sample is unnamed and subject to
	/// the retention cap; naming a sample makes it permanent.
	///
	/// # Errors
	/// Returns an error on any index or file I/O failure.
	pub async fn create(&self, audio_bytes: &[u8], reference_text: String, name: Option<String>) -> Result<VoiceSampleRecord, VoiceSampleError> {
		let _permit = self.guard.lock().await;

		let id = generate_id();
		tokio::fs::write(audio_path(&self.base_dir, &id), audio_bytes).await?;

		let record = VoiceSampleRecord { id, name: name.clone(), reference_text, created_at: Utc::now(), is_named: name.is_some() };

		let mut records = self.load_index().await?;
		records.push(record.clone());
		self.evict_overflow(&mut records).await?;
		self.save_index(&records).await?;

		Ok(record)
	}

	/// Deletes unnamed samples beyond `MAX_UNNAMED_SAMPLES`, oldest first.
	async fn evict_overflow(&self, records: &mut Vec<VoiceSampleRecord>) -> Result<(), VoiceSampleError> {
		let mut unnamed_indices: Vec<usize> = records.iter().enumerate().filter(|(_, r)| !r.is_named).map(|(i, _)| i).collect();
		unnamed_indices.sort_by_key(|&i| records[i].created_at);

		if unnamed_indices.len() <= MAX_UNNAMED_SAMPLES {
			return Ok(());
		}

		let evict_count = unnamed_indices.len() - MAX_UNNAMED_SAMPLES;
		let to_evict: Vec<usize> = unnamed_indices.into_iter().take(evict_count).collect();

		for &i in &to_evict {
			let path = audio_path(&self.base_dir, &records[i].id);
			if let Err(e) = tokio::fs::remove_file(&path).await {
				if e.kind() != std::io::ErrorKind::NotFound {
					return Err(e.into());
				}
			}
		}

		let to_evict_ids: std::collections::HashSet<usize> = to_evict.into_iter().collect();
		let mut kept = Vec::with_capacity(records.len() - to_evict_ids.len());
		for (i, record) in records.drain(..).enumerate() {
			if !to_evict_ids.contains(&i) {
				kept.push(record);
			}
		}
		*records = kept;
		Ok(())
	}

	/// Named samples first (newest first among them), then unnamed (newest
	/// first).
	///
	/// # Errors
	/// Returns an error if the index is corrupt or unreadable.
	pub async fn list(&self) -> Result<Vec<VoiceSampleRecord>, VoiceSampleError> {
		let _permit = self.guard.lock().await;
		let mut records = self.load_index().await?;
		records.sort_by(|a, b| match (b.is_named, a.is_named) {
			(true, false) => std::cmp::Ordering::Greater,
			(false, true) => std::cmp::Ordering::Less,
			_ => b.created_at.cmp(&a.created_at),
		});
		Ok(records)
	}

	/// Returns the raw audio bytes and reference text for `id`, or `None`
	/// if no such sample exists.
	///
	/// # Errors
	/// Returns an error if the index or audio file cannot be read.
	pub async fn get_audio(&self, id: &str) -> Result<Option<(Vec<u8>, String)>, VoiceSampleError> {
		let _permit = self.guard.lock().await;
		let records = self.load_index().await?;
		let Some(record) = records.into_iter().find(|r| r.id == id) else {
			return Ok(None);
		};
		match tokio::fs::read(audio_path(&self.base_dir, id)).await {
			Ok(bytes) => Ok(Some((bytes, record.reference_text))),
			Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
			Err(e) => Err(e.into()),
		}
	}

	/// Deletes a sample by id. Returns `true` iff it existed.
	///
	/// # Errors
	/// Returns an error on index I/O failure.
	pub async fn delete(&self, id: &str) -> Result<bool, VoiceSampleError> {
		let _permit = self.guard.lock().await;
		let mut records = self.load_index().await?;
		let Some(position) = records.iter().position(|r| r.id == id) else {
			return Ok(false);
		};
		records.remove(position);
		self.save_index(&records).await?;

		if let Err(e) = tokio::fs::remove_file(audio_path(&self.base_dir, id)).await {
			if e.kind() != std::io::ErrorKind::NotFound {
				return Err(e.into());
			}
		}
		Ok(true)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	async fn store() -> (VoiceSampleStore, tempfile::TempDir) {
		let dir = tempfile::tempdir().unwrap();
		let store = VoiceSampleStore::new(dir.path()).unwrap();
		(store, dir)
	}

	#[tokio::test]
	async fn create_then_get_audio_round_trips() {
		let (store, _dir) = store().await;
		let record = store.create(b"wav-bytes", "hello".to_string(), None).await.unwrap();
		let (audio, reference_text) = store.get_audio(&record.id).await.unwrap().unwrap();
		assert_eq!(audio, b"wav-bytes");
		assert_eq!(reference_text, "hello");
	}

	#[tokio::test]
	async fn named_sample_is_exempt_from_retention_cap() {
		let (store, _dir) = store().await;
		let named = store.create(b"a", "t".to_string(), Some("keepsake".to_string())).await.unwrap();
		for _ in 0..5 {
			store.create(b"b", "t".to_string(), None).await.unwrap();
		}
		let listed = store.list().await.unwrap();
		assert!(listed.iter().any(|r| r.id == named.id));
	}

	#[tokio::test]
	async fn unnamed_samples_beyond_cap_are_evicted_oldest_first() {
		let (store, _dir) = store().await;
		let mut ids = Vec::new();
		for _ in 0..5 {
			let record = store.create(b"x", "t".to_string(), None).await.unwrap();
			ids.push(record.id);
			tokio::time::sleep(std::time::Duration::from_millis(2)).await;
		}
		let listed = store.list().await.unwrap();
		assert_eq!(listed.len(), MAX_UNNAMED_SAMPLES);
		// the three newest survive
		assert!(listed.iter().all(|r| ids[2..].contains(&r.id)));
	}

	#[tokio::test]
	async fn list_orders_named_before_unnamed_then_newest_first() {
		let (store, _dir) = store().await;
		store.create(b"a", "t".to_string(), None).await.unwrap();
		tokio::time::sleep(std::time::Duration::from_millis(2)).await;
		let named = store.create(b"b", "t".to_string(), Some("n".to_string())).await.unwrap();
		tokio::time::sleep(std::time::Duration::from_millis(2)).await;
		store.create(b"c", "t".to_string(), None).await.unwrap();

		let listed = store.list().await.unwrap();
		assert_eq!(listed[0].id, named.id);
	}

	#[tokio::test]
	async fn delete_removes_record_and_audio_file() {
		let (store, _dir) = store().await;
		let record = store.create(b"x", "t".to_string(), None).await.unwrap();
		assert!(store.delete(&record.id).await.unwrap());
		assert!(store.get_audio(&record.id).await.unwrap().is_none());
		assert!(!store.delete(&record.id).await.unwrap());
	}

	#[tokio::test]
	async fn get_audio_returns_none_for_unknown_id() {
		let (store, _dir) = store().await;
		assert!(store.get_audio("missing").await.unwrap().is_none());
	}
}
