// ── Operation handlers ──

use tracing::{debug, info, warn};

use super::Router;
use super::request::Rpc;
use crate::aaa::{AuthKind, with_auth};
use crate::compile::reshape::response_xml;
use crate::compile::{ActionRequest, ConfigEdit, CopyRequest, GetRequest, SchemaRequest};
use crate::error::CoreError;
use crate::modules::schema_data;
use crate::reply::Reply;
use crate::session::SessionState;
use crate::store::apply_edit;
use crate::xml::{Escaping, XmlBuilder};

const MODULES_STATE_PATH: &str = "/modules-state:modules-state";
const SCHEMAS_PATH: &str = "/netconf-state:netconf-state/schemas";
const OPERATION_PATH: &str = "/operation:operation";

impl Router {
    pub(super) async fn handle(
        &self,
        session: &mut SessionState,
        rpc: Rpc,
    ) -> Result<Reply, CoreError> {
        match rpc {
            Rpc::Get { command, reads } => self.get(session, command, &reads).await,
            Rpc::EditConfig { edits } => self.edit_config(session, edits).await,
            Rpc::GetSchema(request) => self.get_schema(session, request).await,
            Rpc::Commit => {
                let persistence = &self.persistence;
                with_auth(session.principal()?, "commit", "", || persistence.save_running()).await?;
                Ok(Reply::Ok)
            }
            Rpc::CloseSession => self.close_session(session).await,
            Rpc::Lock => {
                let token = session.token;
                with_auth(session.principal()?, "lock", "", || self.lock.acquire(&token)).await?;
                Ok(Reply::Ok)
            }
            Rpc::Unlock => {
                let token = session.token;
                with_auth(session.principal()?, "unlock", "", || self.lock.release(&token)).await?;
                Ok(Reply::Ok)
            }
            Rpc::SonicRpc(actions) => self.sonic_rpc(&actions).await,
            Rpc::CopyConfig(request) => self.copy_config(session, &request).await,
        }
    }

    // ── Reads ────────────────────────────────────────────────────────

    async fn get(
        &self,
        session: &SessionState,
        command: &str,
        reads: &[GetRequest],
    ) -> Result<Reply, CoreError> {
        let principal = session.principal()?;
        for read in reads {
            if !principal.authorize(command, &read.path).await {
                warn!(user = principal.user(), path = %read.path, "read not authorized");
                return Err(CoreError::Unauthorized {
                    command: read.path.clone(),
                });
            }
        }

        let mut body = String::new();
        for read in reads {
            body.push_str(&self.read(read).await?);
        }

        let args = reads
            .iter()
            .map(|read| read.path.as_str())
            .collect::<Vec<_>>()
            .join(", ");
        if !principal.account(command, &args).await {
            return Err(CoreError::AccountingFailed {
                command: command.to_owned(),
            });
        }

        Ok(Reply::Data(data(&body)))
    }

    /// One resolved read, as an embeddable XML fragment.
    async fn read(&self, read: &GetRequest) -> Result<String, CoreError> {
        if read.path.starts_with(MODULES_STATE_PATH) {
            return Ok(self.modules().await?.modules_state_xml());
        }
        if read.path.starts_with(SCHEMAS_PATH) {
            return Ok(self.modules().await?.schemas_xml(&read.filters));
        }
        if read.path == OPERATION_PATH {
            return Ok(String::new());
        }

        let response = match self.store.get(&read.path).await {
            Ok(response) => response,
            Err(e) if e.is_not_found() => {
                debug!(path = %read.path, "nothing stored at path");
                return Ok(String::new());
            }
            Err(e) => return Err(e),
        };
        if response.as_object().is_some_and(serde_json::Map::is_empty) {
            return Ok(String::new());
        }

        let modules = match self.modules().await {
            Ok(modules) => Some(modules),
            Err(e) => {
                warn!(error = %e, "module list unavailable, replying without namespaces");
                None
            }
        };
        Ok(response_xml(response, read, &self.catalog, |module| {
            modules.as_deref().and_then(|set| set.namespace_of(module))
        }))
    }

    async fn get_schema(
        &self,
        session: &SessionState,
        request: Result<SchemaRequest, CoreError>,
    ) -> Result<Reply, CoreError> {
        let body = with_auth(session.principal()?, "get-schema", "", || async {
            let request = request?;
            let modules = self.modules().await?;
            let module = modules
                .find_schema(
                    &request.identifier,
                    request.version.as_deref(),
                    request.format.as_deref(),
                )
                .ok_or_else(|| CoreError::SchemaNotFound {
                    identifier: request.identifier.clone(),
                })?;
            schema_data(&self.schema_dir, module).await
        })
        .await?;
        Ok(Reply::Data(body))
    }

    // ── Writes ───────────────────────────────────────────────────────

    async fn edit_config(
        &self,
        session: &SessionState,
        edits: Result<Vec<ConfigEdit>, CoreError>,
    ) -> Result<Reply, CoreError> {
        let principal = session.principal()?;
        self.lock.check_writable(&session.token).await?;
        let edits = edits?;
        debug!(count = edits.len(), "edit-config compiled");

        for edit in &edits {
            if !principal.authorize("edit-config", &edit.path).await {
                warn!(user = principal.user(), path = %edit.path, "edit not authorized");
                return Err(CoreError::Unauthorized {
                    command: edit.path.clone(),
                });
            }
        }

        for edit in &edits {
            apply_edit(self.store.as_ref(), edit).await?;
            if !principal.account("edit-config", &edit.path).await {
                return Err(CoreError::AccountingFailed {
                    command: "edit-config".to_owned(),
                });
            }
        }

        Ok(Reply::Ok)
    }

    async fn sonic_rpc(&self, actions: &[ActionRequest]) -> Result<Reply, CoreError> {
        for action in actions {
            let response = self.store.action(&action.path, &action.input).await?;
            debug!(path = %action.path, %response, "action invoked");
        }
        Ok(Reply::Ok)
    }

    async fn copy_config(
        &self,
        session: &SessionState,
        request: &CopyRequest,
    ) -> Result<Reply, CoreError> {
        with_auth(session.principal()?, "copy-config", "", || async {
            match (request.source.as_str(), request.target.as_str()) {
                ("running", "startup") => self.persistence.save_running().await,
                ("startup", "url") => {
                    let url = request
                        .url
                        .as_deref()
                        .ok_or(CoreError::MissingElement { element: "url" })?;
                    info!(url, "backing up startup configuration");
                    self.persistence.upload_startup(url).await
                }
                _ => Err(CoreError::UnsupportedCopy),
            }
        })
        .await?;
        Ok(Reply::Ok)
    }

    // ── Session ──────────────────────────────────────────────────────

    async fn close_session(&self, session: &mut SessionState) -> Result<Reply, CoreError> {
        with_auth(session.principal()?, "close-session", "", || async { Ok(()) }).await?;
        if session
            .principal
            .as_deref()
            .is_some_and(|p| p.kind() == AuthKind::Remote)
        {
            session.release().await;
        }
        Ok(Reply::Ok)
    }
}

/// `<data>` around already-embedded fragments.
fn data(body: &str) -> String {
    let mut b = XmlBuilder::new(Escaping::Embedded);
    b.open("data").raw(body).close("data");
    b.finish()
}
