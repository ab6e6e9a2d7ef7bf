use crate::error::BrokerError;
use crate::Broker;
use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use std::collections::HashMap;
use std::time::Duration;

/// Broker backed by Redis (or a Redis-compatible server) via an async,
/// auto-reconnecting connection manager. Cheap to clone: all clones share
/// the same underlying multiplexed connection, so a single `RedisBroker` can
/// be handed to every axum handler.
#[derive(Clone)]
pub struct RedisBroker {
	conn: ConnectionManager,
}

impl RedisBroker {
	/// # Errors
	/// Returns an error if the broker URL is invalid or the initial
	/// connection cannot be established.
	pub async fn connect(url: &str) -> Result<Self, BrokerError> {
		let client = redis::Client::open(url)?;
		let conn = client.get_connection_manager().await?;
		Ok(Self { conn })
	}
}

#[async_trait]
impl Broker for RedisBroker {
	async fn push(&self, list_key: &str, value: &str) -> Result<(), BrokerError> {
		let mut conn = self.conn.clone();
		let _: i64 = conn.lpush(list_key, value).await?;
		Ok(())
	}

	async fn blocking_pop(&self, list_key: &str, timeout: Duration) -> Result<Option<String>, BrokerError> {
		let mut conn = self.conn.clone();
		let result: Option<(String, String)> = conn.brpop(list_key, timeout.as_secs_f64()).await?;
		Ok(result.map(|(_, value)| value))
	}

	async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<(), BrokerError> {
		let mut conn = self.conn.clone();
		match ttl {
			Some(ttl) => {
				let _: () = conn.set_ex(key, value, ttl.as_secs().max(1)).await?;
			}
			None => {
				let _: () = conn.set(key, value).await?;
			}
		}
		Ok(())
	}

	async fn get(&self, key: &str) -> Result<Option<String>, BrokerError> {
		let mut conn = self.conn.clone();
		let value: Option<String> = conn.get(key).await?;
		Ok(value)
	}

	async fn delete(&self, key: &str) -> Result<(), BrokerError> {
		let mut conn = self.conn.clone();
		let _: i64 = conn.del(key).await?;
		Ok(())
	}

	async fn len(&self, list_key: &str) -> Result<usize, BrokerError> {
		let mut conn = self.conn.clone();
		let len: usize = conn.llen(list_key).await?;
		Ok(len)
	}

	async fn range(&self, list_key: &str, lo: isize, hi: isize) -> Result<Vec<String>, BrokerError> {
		let mut conn = self.conn.clone();
		let values: Vec<String> = conn.lrange(list_key, lo, hi).await?;
		Ok(values)
	}

	async fn hash_incr(&self, key: &str, field: &str, delta: i64) -> Result<i64, BrokerError> {
		let mut conn = self.conn.clone();
		let value: i64 = conn.hincr(key, field, delta).await?;
		Ok(value)
	}

	async fn hash_incr_float(&self, key: &str, field: &str, delta: f64) -> Result<f64, BrokerError> {
		let mut conn = self.conn.clone();
		let value: f64 = conn.hincr(key, field, delta).await?;
		Ok(value)
	}

	async fn hash_getall(&self, key: &str) -> Result<HashMap<String, String>, BrokerError> {
		let mut conn = self.conn.clone();
		let map: HashMap<String, String> = conn.hgetall(key).await?;
		Ok(map)
	}

	async fn scan_prefix(&self, prefix: &str) -> Result<Vec<String>, BrokerError> {
		let mut conn = self.conn.clone();
		let pattern = format!("{prefix}*");
		let mut cursor = 0u64;
		let mut keys = Vec::new();
		loop {
			let (next_cursor, batch): (u64, Vec<String>) = redis::cmd("SCAN")
				.arg(cursor)
				.arg("MATCH")
				.arg(&pattern)
				.arg("COUNT")
				.arg(200)
				.query_async(&mut conn)
				.await?;
			keys.extend(batch);
			if next_cursor == 0 {
				break;
			}
			cursor = next_cursor;
		}
		Ok(keys)
	}

	async fn ping(&self) -> bool {
		let mut conn = self.conn.clone();
		redis::cmd("PING").query_async::<_, String>(&mut conn).await.is_ok()
	}
}
