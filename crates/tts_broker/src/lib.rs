pub mod error;
pub mod memory;
pub mod redis_broker;

use async_trait::async_trait;
use std::collections::HashMap;
use std::time::Duration;

pub use error::BrokerError;
pub use memory::MemoryBroker;
pub use redis_broker::RedisBroker;

/// Contract over a shared in-memory/networked key-value+list store.
///
/// FIFO lists with blocking pop, string keys with TTL, hash counters, and
/// prefix scan. `push` appends to the head; `blocking_pop` removes from the
/// tail, so the oldest pushed element is always popped first.
#[async_trait]
pub trait Broker: Send + Sync {
	async fn push(&self, list_key: &str, value: &str) -> Result<(), BrokerError>;

	/// Blocks up to `timeout` for an element to appear, then pops the oldest
	/// one. Returns `None` on timeout, never on a genuine empty-queue probe.
	async fn blocking_pop(&self, list_key: &str, timeout: Duration) -> Result<Option<String>, BrokerError>;

	/// Sets `key` to `value`. A `ttl` of `None` means no expiry. Re-setting
	/// an existing key resets its expiry to the newly supplied `ttl`.
	async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<(), BrokerError>;

	async fn get(&self, key: &str) -> Result<Option<String>, BrokerError>;

	async fn delete(&self, key: &str) -> Result<(), BrokerError>;

	async fn len(&self, list_key: &str) -> Result<usize, BrokerError>;

	/// Inclusive range over a list, head to tail. Negative indices count
	/// from the tail, matching Redis `LRANGE` semantics (`-1` is the last
	/// element).
	async fn range(&self, list_key: &str, lo: isize, hi: isize) -> Result<Vec<String>, BrokerError>;

	/// Atomically increments an integer hash field and returns the new value.
	async fn hash_incr(&self, key: &str, field: &str, delta: i64) -> Result<i64, BrokerError>;

	/// Atomically increments a float hash field and returns the new value.
	async fn hash_incr_float(&self, key: &str, field: &str, delta: f64) -> Result<f64, BrokerError>;

	async fn hash_getall(&self, key: &str) -> Result<HashMap<String, String>, BrokerError>;

	async fn scan_prefix(&self, prefix: &str) -> Result<Vec<String>, BrokerError>;

	async fn ping(&self) -> bool;
}
