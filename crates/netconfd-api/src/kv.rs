// Redis client for the shared key-value store
//
// Holds the AAA settings (`AAA|*`, `TACPLUS|*`, `TACPLUS_SERVER|*`,
// `TACACS|*`) and the `CONFIG_LOCK` key. The connection manager reconnects
// on its own, so each call clones the handle instead of locking it.

use std::collections::HashMap;

use redis::AsyncCommands;
use redis::aio::ConnectionManager;
use tracing::{debug, trace};

use crate::error::Error;

/// DEL only while the key still holds the expected value.
const DEL_IF_EQ: &str = r#"
if redis.call("GET", KEYS[1]) == ARGV[1] then
    return redis.call("DEL", KEYS[1])
end
return 0
"#;

/// Thin async wrapper over a multiplexed Redis connection.
#[derive(Clone)]
pub struct RedisKv {
    conn: ConnectionManager,
}

impl RedisKv {
    /// Connect to `url`, e.g. `redis+unix:///var/run/redis/redis.sock?db=4`.
    pub async fn connect(url: &str) -> Result<Self, Error> {
        debug!(url, "connecting to key-value store");
        let client = redis::Client::open(url)?;
        let conn = ConnectionManager::new(client).await?;
        Ok(Self { conn })
    }

    pub async fn hget(&self, key: &str, field: &str) -> Result<Option<String>, Error> {
        let mut conn = self.conn.clone();
        let value: Option<String> = conn.hget(key, field).await?;
        trace!(key, field, found = value.is_some(), "HGET");
        Ok(value)
    }

    pub async fn hgetall(&self, key: &str) -> Result<HashMap<String, String>, Error> {
        let mut conn = self.conn.clone();
        let value: HashMap<String, String> = conn.hgetall(key).await?;
        Ok(value)
    }

    pub async fn hexists(&self, key: &str, field: &str) -> Result<bool, Error> {
        let mut conn = self.conn.clone();
        let exists: bool = conn.hexists(key, field).await?;
        Ok(exists)
    }

    pub async fn keys(&self, pattern: &str) -> Result<Vec<String>, Error> {
        let mut conn = self.conn.clone();
        let keys: Vec<String> = conn.keys(pattern).await?;
        Ok(keys)
    }

    /// `SET key value NX EX ttl`. Returns `true` when the key was written.
    pub async fn set_nx_ex(&self, key: &str, value: &str, ttl_secs: u64) -> Result<bool, Error> {
        let mut conn = self.conn.clone();
        let reply: Option<String> = redis::cmd("SET")
            .arg(key)
            .arg(value)
            .arg("NX")
            .arg("EX")
            .arg(ttl_secs)
            .query_async(&mut conn)
            .await?;
        Ok(reply.is_some())
    }

    pub async fn get(&self, key: &str) -> Result<Option<String>, Error> {
        let mut conn = self.conn.clone();
        let value: Option<String> = conn.get(key).await?;
        Ok(value)
    }

    /// Atomically delete `key` if its value is `expected`. Returns `true`
    /// when the key was removed.
    pub async fn del_if_eq(&self, key: &str, expected: &str) -> Result<bool, Error> {
        let mut conn = self.conn.clone();
        let removed: i64 = redis::Script::new(DEL_IF_EQ)
            .key(key)
            .arg(expected)
            .invoke_async(&mut conn)
            .await?;
        trace!(key, removed, "DEL if equal");
        Ok(removed == 1)
    }
}
