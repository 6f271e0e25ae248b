// ── Datastore lock ──
//
// One process-wide key in the shared KV store, holding the owning session's
// token with a TTL. Advisory: only edit-config consults it.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info};
use uuid::Uuid;

use crate::error::CoreError;
use crate::kv::KvStore;

pub const LOCK_KEY: &str = "CONFIG_LOCK";
pub const DEFAULT_LOCK_TTL: Duration = Duration::from_secs(15);

#[derive(Clone)]
pub struct DatastoreLock {
    kv: Arc<dyn KvStore>,
    ttl: Duration,
}

impl std::fmt::Debug for DatastoreLock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DatastoreLock")
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}

impl DatastoreLock {
    pub fn new(kv: Arc<dyn KvStore>, ttl: Duration) -> Self {
        Self { kv, ttl }
    }

    /// Claim the lock for `token`.
    pub async fn acquire(&self, token: &Uuid) -> Result<(), CoreError> {
        let written = self
            .kv
            .set_nx_ex(LOCK_KEY, &token.to_string(), self.ttl)
            .await?;
        if !written {
            debug!(%token, "lock already held");
            return Err(CoreError::LockHeld);
        }
        info!(%token, ttl_secs = self.ttl.as_secs(), "datastore locked");
        Ok(())
    }

    /// Drop the lock if `token` holds it.
    pub async fn release(&self, token: &Uuid) -> Result<(), CoreError> {
        let holder = self.holder().await?.ok_or(CoreError::NoActiveLock)?;
        if holder != token.to_string() {
            debug!(%token, %holder, "unlock by non-owner");
            return Err(CoreError::LockNotOwned);
        }
        if !self.kv.del_if_eq(LOCK_KEY, &holder).await? {
            debug!(%token, "lock expired or changed hands before release");
            return Err(match self.holder().await? {
                None => CoreError::NoActiveLock,
                Some(_) => CoreError::LockNotOwned,
            });
        }
        info!(%token, "datastore unlocked");
        Ok(())
    }

    /// Writes are allowed when nobody holds the lock or `token` does.
    pub async fn check_writable(&self, token: &Uuid) -> Result<(), CoreError> {
        match self.holder().await? {
            Some(holder) if holder != token.to_string() => Err(CoreError::DatastoreLocked),
            _ => Ok(()),
        }
    }

    pub async fn holder(&self) -> Result<Option<String>, CoreError> {
        self.kv.get(LOCK_KEY).await
    }
}
