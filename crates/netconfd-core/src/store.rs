// ── Collaborator traits: configuration store and persistence ──
//
// The router only sees these traits; `netconfd-api` clients implement them
// below so the binary can plug them in directly.

use async_trait::async_trait;
use serde_json::Value as Json;
use tracing::debug;

use netconfd_api::{RestconfClient, SystemPersistence};

use crate::compile::{ConfigEdit, EditOperation};
use crate::error::CoreError;
use crate::modules::{ModuleInfo, ModuleSet};
use crate::value::Value;

/// The configuration datastore, addressed by canonical paths.
#[async_trait]
pub trait ConfigStore: Send + Sync {
    async fn get(&self, path: &str) -> Result<Json, CoreError>;
    async fn create(&self, path: &str, payload: &Json) -> Result<(), CoreError>;
    async fn merge(&self, path: &str, payload: &Json) -> Result<(), CoreError>;
    async fn replace(&self, path: &str, payload: &Json) -> Result<(), CoreError>;
    async fn delete(&self, path: &str) -> Result<(), CoreError>;
    async fn action(&self, path: &str, input: &Json) -> Result<Json, CoreError>;
    async fn modules(&self) -> Result<ModuleSet, CoreError>;
}

/// Saving and exporting the startup configuration.
#[async_trait]
pub trait Persistence: Send + Sync {
    async fn save_running(&self) -> Result<(), CoreError>;
    async fn upload_startup(&self, url: &str) -> Result<(), CoreError>;
}

/// Run one compiled edit. `remove` of something already absent succeeds;
/// `delete` of it does not.
pub async fn apply_edit(store: &dyn ConfigStore, edit: &ConfigEdit) -> Result<(), CoreError> {
    debug!(path = %edit.path, operation = %edit.operation, "applying edit");
    let payload = Value::Map(edit.payload.clone()).to_json();
    match edit.operation {
        EditOperation::Merge => store.merge(&edit.path, &payload).await,
        EditOperation::Create => store.create(&edit.path, &payload).await,
        EditOperation::Replace => store.replace(&edit.path, &payload).await,
        EditOperation::Delete => store.delete(&edit.path).await,
        EditOperation::Remove => match store.delete(&edit.path).await {
            Err(e) if e.is_not_found() => {
                debug!(path = %edit.path, "remove of absent node");
                Ok(())
            }
            other => other,
        },
    }
}

// ── netconfd-api implementations ─────────────────────────────────────

#[async_trait]
impl ConfigStore for RestconfClient {
    async fn get(&self, path: &str) -> Result<Json, CoreError> {
        Ok(RestconfClient::get(self, path).await?)
    }

    async fn create(&self, path: &str, payload: &Json) -> Result<(), CoreError> {
        Ok(RestconfClient::create(self, path, payload).await?)
    }

    async fn merge(&self, path: &str, payload: &Json) -> Result<(), CoreError> {
        Ok(RestconfClient::merge(self, path, payload).await?)
    }

    async fn replace(&self, path: &str, payload: &Json) -> Result<(), CoreError> {
        Ok(RestconfClient::replace(self, path, payload).await?)
    }

    async fn delete(&self, path: &str) -> Result<(), CoreError> {
        RestconfClient::delete(self, path).await.map_err(|e| {
            if e.is_not_found() {
                CoreError::NotFound {
                    path: path.to_owned(),
                }
            } else {
                e.into()
            }
        })
    }

    async fn action(&self, path: &str, input: &Json) -> Result<Json, CoreError> {
        Ok(self.invoke(path, input).await?)
    }

    async fn modules(&self) -> Result<ModuleSet, CoreError> {
        let state = self.modules_state().await?;
        Ok(ModuleSet {
            module_set_id: state.module_set_id,
            modules: state
                .module
                .into_iter()
                .map(|m| ModuleInfo {
                    name: m.name,
                    revision: m.revision,
                    namespace: m.namespace,
                    schema: m.schema,
                    conformance: m.conformance_type,
                })
                .collect(),
        })
    }
}

#[async_trait]
impl Persistence for SystemPersistence {
    async fn save_running(&self) -> Result<(), CoreError> {
        Ok(SystemPersistence::save_running(self).await?)
    }

    async fn upload_startup(&self, url: &str) -> Result<(), CoreError> {
        Ok(SystemPersistence::upload_startup(self, url).await?)
    }
}
