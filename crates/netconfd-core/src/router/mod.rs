//! RPC dispatch.
//!
//! [`Router::process`] turns one framed message into exactly one
//! `<rpc-reply>`. Parse failures, handler errors and panics all become an
//! `<rpc-error>` addressed to the best message-id available.

mod handlers;
mod request;

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::path::PathBuf;
use std::sync::Arc;

use futures_util::FutureExt;
use tracing::{debug, error, info_span, Instrument};

use crate::catalog::KeyCatalog;
use crate::error::CoreError;
use crate::lock::DatastoreLock;
use crate::modules::{ModuleCache, ModuleSet};
use crate::reply::{create_response, error_response, extract_message_id};
use crate::session::SessionState;
use crate::store::{ConfigStore, Persistence};

pub use request::{Request, Rpc, parse};

pub const DEFAULT_SCHEMA_DIR: &str = "/usr/models/yang";

/// Shared, per-process request handling state. Cheap to clone.
#[derive(Clone)]
pub struct Router {
    store: Arc<dyn ConfigStore>,
    persistence: Arc<dyn Persistence>,
    lock: DatastoreLock,
    catalog: Arc<KeyCatalog>,
    modules: Arc<ModuleCache>,
    schema_dir: PathBuf,
}

impl std::fmt::Debug for Router {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Router")
            .field("lock", &self.lock)
            .field("schema_dir", &self.schema_dir)
            .finish_non_exhaustive()
    }
}

impl Router {
    pub fn new(
        store: Arc<dyn ConfigStore>,
        persistence: Arc<dyn Persistence>,
        lock: DatastoreLock,
        catalog: Arc<KeyCatalog>,
    ) -> Self {
        Self {
            store,
            persistence,
            lock,
            catalog,
            modules: Arc::new(ModuleCache::new()),
            schema_dir: PathBuf::from(DEFAULT_SCHEMA_DIR),
        }
    }

    #[must_use]
    pub fn with_schema_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.schema_dir = dir.into();
        self
    }

    /// Module list for the hello and schema operations, fetched once.
    pub async fn modules(&self) -> Result<Arc<ModuleSet>, CoreError> {
        self.modules.get(self.store.as_ref()).await
    }

    /// Handle one message and return the serialized reply.
    pub async fn process(&self, session: &mut SessionState, raw: &str) -> String {
        let span = info_span!("rpc", session_id = session.id);
        let outcome = AssertUnwindSafe(self.dispatch(session, raw))
            .catch_unwind()
            .instrument(span)
            .await;

        outcome.unwrap_or_else(|panic| {
            let message = panic_message(panic.as_ref());
            error!(panic = %message, request = raw, "panic while handling request");
            error_response(&extract_message_id(raw), &CoreError::Internal(message))
        })
    }

    async fn dispatch(&self, session: &mut SessionState, raw: &str) -> String {
        let request = match request::parse(raw, &self.catalog) {
            Ok(request) => request,
            Err(e) => {
                let message_id = extract_message_id(raw);
                debug!(%message_id, error = %e, "rejected request");
                return error_response(&message_id, &e);
            }
        };

        let Request { message_id, rpc } = request;
        let operation = rpc.name();
        debug!(%message_id, operation, "handling request");
        match self.handle(session, rpc).await {
            Ok(reply) => create_response(&message_id, reply.payload()),
            Err(e) => {
                debug!(%message_id, operation, error = %e, "request failed");
                error_response(&message_id, &e)
            }
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    panic
        .downcast_ref::<&str>()
        .map(ToString::to_string)
        .or_else(|| panic.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_owned())
}
