// ── Key-value store seam ──
//
// AAA settings and the datastore lock live in a shared key-value store.
// `RedisKv` is the production backend; `MemoryKv` backs tests and
// single-host setups without Redis.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::time::Instant;

use netconfd_api::RedisKv;

use crate::error::CoreError;

#[async_trait]
pub trait KvStore: Send + Sync {
    async fn hget(&self, key: &str, field: &str) -> Result<Option<String>, CoreError>;
    async fn hgetall(&self, key: &str) -> Result<HashMap<String, String>, CoreError>;
    async fn hexists(&self, key: &str, field: &str) -> Result<bool, CoreError>;
    /// Keys matching a glob pattern (`*` wildcard).
    async fn keys(&self, pattern: &str) -> Result<Vec<String>, CoreError>;
    /// Set `key` to `value` with an expiry unless it already exists.
    /// Returns whether the key was written.
    async fn set_nx_ex(&self, key: &str, value: &str, ttl: Duration) -> Result<bool, CoreError>;
    async fn get(&self, key: &str) -> Result<Option<String>, CoreError>;
    /// Delete `key` only if it currently holds `expected`, as one atomic
    /// step. Returns whether it was deleted.
    async fn del_if_eq(&self, key: &str, expected: &str) -> Result<bool, CoreError>;
}

#[async_trait]
impl KvStore for RedisKv {
    async fn hget(&self, key: &str, field: &str) -> Result<Option<String>, CoreError> {
        Ok(RedisKv::hget(self, key, field).await?)
    }

    async fn hgetall(&self, key: &str) -> Result<HashMap<String, String>, CoreError> {
        Ok(RedisKv::hgetall(self, key).await?)
    }

    async fn hexists(&self, key: &str, field: &str) -> Result<bool, CoreError> {
        Ok(RedisKv::hexists(self, key, field).await?)
    }

    async fn keys(&self, pattern: &str) -> Result<Vec<String>, CoreError> {
        Ok(RedisKv::keys(self, pattern).await?)
    }

    async fn set_nx_ex(&self, key: &str, value: &str, ttl: Duration) -> Result<bool, CoreError> {
        Ok(RedisKv::set_nx_ex(self, key, value, ttl.as_secs().max(1)).await?)
    }

    async fn get(&self, key: &str) -> Result<Option<String>, CoreError> {
        Ok(RedisKv::get(self, key).await?)
    }

    async fn del_if_eq(&self, key: &str, expected: &str) -> Result<bool, CoreError> {
        Ok(RedisKv::del_if_eq(self, key, expected).await?)
    }
}

// ── In-memory backend ────────────────────────────────────────────────

#[derive(Debug, Clone)]
enum Entry {
    Hash(HashMap<String, String>),
    String {
        value: String,
        expires: Option<Instant>,
    },
}

impl Entry {
    fn is_live(&self) -> bool {
        match self {
            Self::Hash(_) => true,
            Self::String { expires, .. } => expires.is_none_or(|at| Instant::now() < at),
        }
    }
}

/// `KvStore` over a `DashMap`, with expiry on the tokio clock.
#[derive(Debug, Default)]
pub struct MemoryKv {
    entries: DashMap<String, Entry>,
}

impl MemoryKv {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn hset(&self, key: &str, field: &str, value: &str) {
        let mut entry = self
            .entries
            .entry(key.to_owned())
            .or_insert_with(|| Entry::Hash(HashMap::new()));
        if !matches!(*entry, Entry::Hash(_)) {
            *entry = Entry::Hash(HashMap::new());
        }
        if let Entry::Hash(ref mut fields) = *entry {
            fields.insert(field.to_owned(), value.to_owned());
        }
    }

    fn hash(&self, key: &str) -> Option<HashMap<String, String>> {
        match self.entries.get(key).as_deref() {
            Some(Entry::Hash(fields)) => Some(fields.clone()),
            _ => None,
        }
    }
}

fn glob_match(pattern: &str, key: &str) -> bool {
    let Some((head, tail)) = pattern.split_once('*') else {
        return pattern == key;
    };
    let Some(rest) = key.strip_prefix(head) else {
        return false;
    };
    if tail.is_empty() {
        return true;
    }
    (0..=rest.len())
        .filter(|&i| rest.is_char_boundary(i))
        .any(|i| glob_match(tail, &rest[i..]))
}

#[async_trait]
impl KvStore for MemoryKv {
    async fn hget(&self, key: &str, field: &str) -> Result<Option<String>, CoreError> {
        Ok(self.hash(key).and_then(|mut h| h.remove(field)))
    }

    async fn hgetall(&self, key: &str) -> Result<HashMap<String, String>, CoreError> {
        Ok(self.hash(key).unwrap_or_default())
    }

    async fn hexists(&self, key: &str, field: &str) -> Result<bool, CoreError> {
        Ok(self.hash(key).is_some_and(|h| h.contains_key(field)))
    }

    async fn keys(&self, pattern: &str) -> Result<Vec<String>, CoreError> {
        let mut keys: Vec<String> = self
            .entries
            .iter()
            .filter(|e| e.value().is_live() && glob_match(pattern, e.key()))
            .map(|e| e.key().clone())
            .collect();
        keys.sort();
        Ok(keys)
    }

    async fn set_nx_ex(&self, key: &str, value: &str, ttl: Duration) -> Result<bool, CoreError> {
        let fresh = Entry::String {
            value: value.to_owned(),
            expires: Some(Instant::now() + ttl),
        };
        match self.entries.entry(key.to_owned()) {
            dashmap::mapref::entry::Entry::Occupied(mut slot) => {
                if slot.get().is_live() {
                    return Ok(false);
                }
                slot.insert(fresh);
            }
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                slot.insert(fresh);
            }
        }
        Ok(true)
    }

    async fn get(&self, key: &str) -> Result<Option<String>, CoreError> {
        Ok(match self.entries.get(key).as_deref() {
            Some(entry @ Entry::String { value, .. }) if entry.is_live() => Some(value.clone()),
            _ => None,
        })
    }

    async fn del_if_eq(&self, key: &str, expected: &str) -> Result<bool, CoreError> {
        let removed = self.entries.remove_if(key, |_, entry| {
            entry.is_live() && matches!(entry, Entry::String { value, .. } if value == expected)
        });
        Ok(removed.is_some())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn glob_patterns() {
        assert!(glob_match("TACPLUS_SERVER|*", "TACPLUS_SERVER|10.0.0.1"));
        assert!(!glob_match("TACPLUS_SERVER|*", "TACPLUS|global"));
        assert!(glob_match("*|global", "TACPLUS|global"));
        assert!(glob_match("CONFIG_LOCK", "CONFIG_LOCK"));
    }

    #[tokio::test(start_paused = true)]
    async fn set_nx_respects_expiry() {
        let kv = MemoryKv::new();
        assert!(kv.set_nx_ex("k", "a", Duration::from_secs(15)).await.unwrap());
        assert!(!kv.set_nx_ex("k", "b", Duration::from_secs(15)).await.unwrap());
        assert_eq!(kv.get("k").await.unwrap().as_deref(), Some("a"));

        tokio::time::advance(Duration::from_secs(16)).await;
        assert_eq!(kv.get("k").await.unwrap(), None);
        assert!(kv.set_nx_ex("k", "b", Duration::from_secs(15)).await.unwrap());
        assert_eq!(kv.get("k").await.unwrap().as_deref(), Some("b"));
    }

    #[tokio::test]
    async fn del_if_eq_only_removes_matching_value() {
        let kv = MemoryKv::new();
        assert!(!kv.del_if_eq("k", "a").await.unwrap());
        kv.set_nx_ex("k", "a", Duration::from_secs(15)).await.unwrap();
        assert!(!kv.del_if_eq("k", "b").await.unwrap());
        assert_eq!(kv.get("k").await.unwrap().as_deref(), Some("a"));
        assert!(kv.del_if_eq("k", "a").await.unwrap());
        assert_eq!(kv.get("k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn hashes() {
        let kv = MemoryKv::new();
        kv.hset("AAA|authentication", "login", "tacacs+,local");
        assert_eq!(
            kv.hget("AAA|authentication", "login").await.unwrap().as_deref(),
            Some("tacacs+,local")
        );
        assert!(kv.hexists("AAA|authentication", "login").await.unwrap());
        assert!(!kv.hexists("AAA|authentication", "failthrough").await.unwrap());
        assert_eq!(kv.hgetall("missing").await.unwrap().len(), 0);
    }
}
