use crate::error::BrokerError;
use crate::Broker;
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, Notify};
use tokio::time::timeout;

struct Inner {
	lists: HashMap<String, VecDeque<String>>,
	strings: HashMap<String, (String, Option<Instant>)>,
	hashes: HashMap<String, HashMap<String, String>>,
}

impl Inner {
	fn new() -> Self {
		Self {
			lists: HashMap::new(),
			strings: HashMap::new(),
			hashes: HashMap::new(),
		}
	}

	fn expire_if_needed(&mut self, key: &str) {
		if let Some((_, Some(expires_at))) = self.strings.get(key) {
			if Instant::now() >= *expires_at {
				self.strings.remove(key);
			}
		}
	}
}

/// In-memory `Broker` for local development and tests. Not a second
/// production backend: single process, no persistence across restarts.
#[derive(Clone)]
pub struct MemoryBroker {
	inner: Arc<Mutex<Inner>>,
	notify: Arc<Notify>,
}

impl MemoryBroker {
	#[must_use]
	pub fn new() -> Self {
		Self {
			inner: Arc::new(Mutex::new(Inner::new())),
			notify: Arc::new(Notify::new()),
		}
	}
}

impl Default for MemoryBroker {
	fn default() -> Self {
		Self::new()
	}
}

#[async_trait]
impl Broker for MemoryBroker {
	async fn push(&self, list_key: &str, value: &str) -> Result<(), BrokerError> {
		let mut inner = self.inner.lock().await;
		inner.lists.entry(list_key.to_string()).or_default().push_front(value.to_string());
		drop(inner);
		self.notify.notify_waiters();
		Ok(())
	}

	async fn blocking_pop(&self, list_key: &str, timeout_dur: Duration) -> Result<Option<String>, BrokerError> {
		let deadline = Instant::now() + timeout_dur;
		loop {
			{
				let mut inner = self.inner.lock().await;
				if let Some(value) = inner.lists.get_mut(list_key).and_then(VecDeque::pop_back) {
					return Ok(Some(value));
				}
			}

			let remaining = deadline.saturating_duration_since(Instant::now());
			if remaining.is_zero() {
				return Ok(None);
			}

			let notified = self.notify.notified();
			if timeout(remaining, notified).await.is_err() {
				return Ok(None);
			}
		}
	}

	async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<(), BrokerError> {
		let mut inner = self.inner.lock().await;
		let expires_at = ttl.map(|ttl| Instant::now() + ttl);
		inner.strings.insert(key.to_string(), (value.to_string(), expires_at));
		Ok(())
	}

	async fn get(&self, key: &str) -> Result<Option<String>, BrokerError> {
		let mut inner = self.inner.lock().await;
		inner.expire_if_needed(key);
		Ok(inner.strings.get(key).map(|(value, _)| value.clone()))
	}

	async fn delete(&self, key: &str) -> Result<(), BrokerError> {
		let mut inner = self.inner.lock().await;
		inner.strings.remove(key);
		inner.hashes.remove(key);
		Ok(())
	}

	async fn len(&self, list_key: &str) -> Result<usize, BrokerError> {
		let inner = self.inner.lock().await;
		Ok(inner.lists.get(list_key).map_or(0, VecDeque::len))
	}

	async fn range(&self, list_key: &str, lo: isize, hi: isize) -> Result<Vec<String>, BrokerError> {
		let inner = self.inner.lock().await;
		let Some(list) = inner.lists.get(list_key) else {
			return Ok(Vec::new());
		};
		let len = list.len() as isize;
		let resolve = |index: isize| -> isize {
			if index < 0 {
				(len + index).max(0)
			} else {
				index.min(len)
			}
		};
		let start = resolve(lo);
		let end = if hi < 0 { resolve(hi) } else { hi.min(len - 1) };
		if start > end || len == 0 {
			return Ok(Vec::new());
		}
		#[allow(clippy::cast_sign_loss)]
		Ok(list.iter().skip(start as usize).take((end - start + 1) as usize).cloned().collect())
	}

	async fn hash_incr(&self, key: &str, field: &str, delta: i64) -> Result<i64, BrokerError> {
		let mut inner = self.inner.lock().await;
		let hash = inner.hashes.entry(key.to_string()).or_default();
		let current: i64 = hash.get(field).and_then(|v| v.parse().ok()).unwrap_or(0);
		let updated = current + delta;
		hash.insert(field.to_string(), updated.to_string());
		Ok(updated)
	}

	async fn hash_incr_float(&self, key: &str, field: &str, delta: f64) -> Result<f64, BrokerError> {
		let mut inner = self.inner.lock().await;
		let hash = inner.hashes.entry(key.to_string()).or_default();
		let current: f64 = hash.get(field).and_then(|v| v.parse().ok()).unwrap_or(0.0);
		let updated = current + delta;
		hash.insert(field.to_string(), updated.to_string());
		Ok(updated)
	}

	async fn hash_getall(&self, key: &str) -> Result<HashMap<String, String>, BrokerError> {
		let inner = self.inner.lock().await;
		Ok(inner.hashes.get(key).cloned().unwrap_or_default())
	}

	async fn scan_prefix(&self, prefix: &str) -> Result<Vec<String>, BrokerError> {
		let mut inner = self.inner.lock().await;
		let keys: Vec<String> = inner.strings.keys().filter(|k| k.starts_with(prefix)).cloned().collect();
		for key in &keys {
			inner.expire_if_needed(key);
		}
		Ok(inner.strings.keys().filter(|k| k.starts_with(prefix)).cloned().collect())
	}

	async fn ping(&self) -> bool {
		true
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[tokio::test]
	async fn fifo_push_pop() {
		let broker = MemoryBroker::new();
		broker.push("q", "a").await.unwrap();
		broker.push("q", "b").await.unwrap();
		assert_eq!(broker.blocking_pop("q", Duration::from_millis(50)).await.unwrap(), Some("a".to_string()));
		assert_eq!(broker.blocking_pop("q", Duration::from_millis(50)).await.unwrap(), Some("b".to_string()));
	}

	#[tokio::test]
	async fn blocking_pop_times_out_on_empty_queue() {
		let broker = MemoryBroker::new();
		let result = broker.blocking_pop("empty", Duration::from_millis(50)).await.unwrap();
		assert!(result.is_none());
	}

	#[tokio::test]
	async fn ttl_expires_values() {
		let broker = MemoryBroker::new();
		broker.set("k", "v", Some(Duration::from_millis(10))).await.unwrap();
		assert_eq!(broker.get("k").await.unwrap(), Some("v".to_string()));
		tokio::time::sleep(Duration::from_millis(30)).await;
		assert_eq!(broker.get("k").await.unwrap(), None);
	}

	#[tokio::test]
	async fn hash_incr_is_additive() {
		let broker = MemoryBroker::new();
		broker.hash_incr("m", "jobs_completed", 1).await.unwrap();
		broker.hash_incr("m", "jobs_completed", 1).await.unwrap();
		let map = broker.hash_getall("m").await.unwrap();
		assert_eq!(map.get("jobs_completed").unwrap(), "2");
	}

	#[tokio::test]
	async fn range_reports_fifo_order_head_to_tail() {
		let broker = MemoryBroker::new();
		broker.push("q", "first").await.unwrap();
		broker.push("q", "second").await.unwrap();
		// push is LPUSH-like (head insert); range(0,-1) walks head to tail.
		let values = broker.range("q", 0, -1).await.unwrap();
		assert_eq!(values, vec!["second".to_string(), "first".to_string()]);
	}
}
