//! Redis-backed durable store.
//!
//! Uses a multiplexed async connection; every trait method maps onto a
//! single Redis command so atomicity comes from the server:
//!
//! - sorted sets: `ZADD` / `ZRANGEBYSCORE` / `ZREM` / `ZCARD`
//! - lists: `LPUSH` / `RPOP` / `LLEN`
//! - strings: `GET` / `SET [PX]` / `DEL`

use std::time::Duration;

use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use tracing::instrument;

use crate::application::repos::{DurableStore, StoreError};

#[derive(Clone)]
pub struct RedisStore {
    connection: MultiplexedConnection,
}

impl RedisStore {
    /// Open a multiplexed connection to `redis_url` (e.g. `redis://localhost:6379`).
    #[instrument(skip(redis_url), err)]
    pub async fn connect(redis_url: impl AsRef<str>) -> Result<Self, StoreError> {
        let client = redis::Client::open(redis_url.as_ref())
            .map_err(|e| StoreError::Connection(e.to_string()))?;
        let connection = client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| StoreError::Connection(e.to_string()))?;

        Ok(Self { connection })
    }
}

fn lower_bound(min: i64) -> String {
    if min == i64::MIN {
        "-inf".to_string()
    } else {
        min.to_string()
    }
}

fn upper_bound(max: i64) -> String {
    if max == i64::MAX {
        "+inf".to_string()
    } else {
        max.to_string()
    }
}

#[async_trait]
impl DurableStore for RedisStore {
    async fn zadd(&self, key: &str, member: &str, score: i64) -> Result<bool, StoreError> {
        let mut conn = self.connection.clone();
        let added: i64 = redis::cmd("ZADD")
            .arg(key)
            .arg(score)
            .arg(member)
            .query_async(&mut conn)
            .await
            .map_err(|e| StoreError::command("ZADD", e))?;
        Ok(added > 0)
    }

    async fn zrangebyscore(
        &self,
        key: &str,
        min: i64,
        max: i64,
    ) -> Result<Vec<String>, StoreError> {
        let mut conn = self.connection.clone();
        redis::cmd("ZRANGEBYSCORE")
            .arg(key)
            .arg(lower_bound(min))
            .arg(upper_bound(max))
            .query_async(&mut conn)
            .await
            .map_err(|e| StoreError::command("ZRANGEBYSCORE", e))
    }

    async fn zrem(&self, key: &str, member: &str) -> Result<bool, StoreError> {
        let mut conn = self.connection.clone();
        let removed: i64 = redis::cmd("ZREM")
            .arg(key)
            .arg(member)
            .query_async(&mut conn)
            .await
            .map_err(|e| StoreError::command("ZREM", e))?;
        Ok(removed > 0)
    }

    async fn zcard(&self, key: &str) -> Result<usize, StoreError> {
        let mut conn = self.connection.clone();
        redis::cmd("ZCARD")
            .arg(key)
            .query_async(&mut conn)
            .await
            .map_err(|e| StoreError::command("ZCARD", e))
    }

    async fn lpush(&self, key: &str, value: &str) -> Result<usize, StoreError> {
        let mut conn = self.connection.clone();
        redis::cmd("LPUSH")
            .arg(key)
            .arg(value)
            .query_async(&mut conn)
            .await
            .map_err(|e| StoreError::command("LPUSH", e))
    }

    async fn rpop(&self, key: &str) -> Result<Option<String>, StoreError> {
        let mut conn = self.connection.clone();
        redis::cmd("RPOP")
            .arg(key)
            .query_async(&mut conn)
            .await
            .map_err(|e| StoreError::command("RPOP", e))
    }

    async fn llen(&self, key: &str) -> Result<usize, StoreError> {
        let mut conn = self.connection.clone();
        redis::cmd("LLEN")
            .arg(key)
            .query_async(&mut conn)
            .await
            .map_err(|e| StoreError::command("LLEN", e))
    }

    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let mut conn = self.connection.clone();
        redis::cmd("GET")
            .arg(key)
            .query_async(&mut conn)
            .await
            .map_err(|e| StoreError::command("GET", e))
    }

    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<(), StoreError> {
        let mut cmd = redis::cmd("SET");
        cmd.arg(key).arg(value);
        if let Some(ttl) = ttl {
            // PX 0 is rejected by Redis.
            let millis = u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX).max(1);
            cmd.arg("PX").arg(millis);
        }

        let mut conn = self.connection.clone();
        let _: () = cmd
            .query_async(&mut conn)
            .await
            .map_err(|e| StoreError::command("SET", e))?;
        Ok(())
    }

    async fn del(&self, key: &str) -> Result<bool, StoreError> {
        let mut conn = self.connection.clone();
        let removed: i64 = redis::cmd("DEL")
            .arg(key)
            .query_async(&mut conn)
            .await
            .map_err(|e| StoreError::command("DEL", e))?;
        Ok(removed > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unbounded_scores_map_to_infinity() {
        assert_eq!(lower_bound(i64::MIN), "-inf");
        assert_eq!(upper_bound(i64::MAX), "+inf");
        assert_eq!(lower_bound(-5), "-5");
        assert_eq!(upper_bound(250), "250");
    }
}
