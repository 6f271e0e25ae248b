// ── Remote AAA ──
//
// The wire protocol lives behind `AaaClient`; this module only binds a
// connected client to a session and routes the three AAA phases through it.

use async_trait::async_trait;
use secrecy::SecretString;
use tracing::{debug, info, warn};

use super::pool::TacacsInfo;
use super::{AuthKind, Authenticator};
use crate::error::CoreError;
use crate::kv::KvStore;

pub const SERVICE_KEY: &str = "TACACS|NETCONF";
pub const DEFAULT_SERVICE: &str = "netconf";
pub const DEFAULT_PROTOCOL: &str = "ssh";

/// Who is asking, as presented to the AAA server.
#[derive(Debug, Clone)]
pub struct AaaContext {
    pub user: String,
    pub password: SecretString,
    pub remote_addr: Option<String>,
    pub service: String,
    pub protocol: String,
}

/// A client bound to one remote AAA server.
#[async_trait]
pub trait AaaClient: Send + Sync {
    /// Connectivity probe used during server selection.
    async fn test_connection(&self) -> bool;

    async fn authenticate(&self, ctx: &AaaContext) -> Result<bool, CoreError>;

    async fn authorize(&self, ctx: &AaaContext, command: &str, args: &str) -> Result<bool, CoreError>;

    async fn account(&self, ctx: &AaaContext, command: &str, args: &str) -> Result<bool, CoreError>;

    async fn disconnect(&self);
}

/// Builds a client for a configured server.
pub trait AaaConnector: Send + Sync {
    fn client_for(&self, info: &TacacsInfo) -> Box<dyn AaaClient>;
}

/// `(service, protocol)` reported to the AAA server for NETCONF sessions.
pub async fn remote_service(kv: &dyn KvStore) -> Result<(String, String), CoreError> {
    let mut service = DEFAULT_SERVICE.to_owned();
    let mut protocol = DEFAULT_PROTOCOL.to_owned();
    if kv.hexists(SERVICE_KEY, "service").await? {
        if let Some(custom) = kv.hget(SERVICE_KEY, "service").await? {
            info!(service = %custom, "custom AAA service");
            service = custom;
        }
    }
    if kv.hexists(SERVICE_KEY, "protocol").await? {
        if let Some(custom) = kv.hget(SERVICE_KEY, "protocol").await? {
            info!(protocol = %custom, "custom AAA protocol");
            protocol = custom;
        }
    }
    Ok((service, protocol))
}

/// Session principal backed by a remote AAA server. Client errors count as
/// denials.
pub struct RemoteAuthenticator {
    server: TacacsInfo,
    client: Box<dyn AaaClient>,
    context: AaaContext,
}

impl RemoteAuthenticator {
    pub fn new(server: TacacsInfo, client: Box<dyn AaaClient>, context: AaaContext) -> Self {
        Self {
            server,
            client,
            context,
        }
    }

    fn verdict(&self, phase: &str, result: Result<bool, CoreError>) -> bool {
        match result {
            Ok(allowed) => allowed,
            Err(e) => {
                warn!(server = %self.server.addr(), phase, error = %e, "AAA request failed");
                false
            }
        }
    }
}

#[async_trait]
impl Authenticator for RemoteAuthenticator {
    fn user(&self) -> &str {
        &self.context.user
    }

    fn kind(&self) -> AuthKind {
        AuthKind::Remote
    }

    async fn authenticate(&self) -> bool {
        let result = self.client.authenticate(&self.context).await;
        self.verdict("authenticate", result)
    }

    async fn authorize(&self, command: &str, args: &str) -> bool {
        let result = self.client.authorize(&self.context, command, args).await;
        let allowed = self.verdict("authorize", result);
        debug!(user = %self.context.user, command, args, allowed, "remote authorization");
        allowed
    }

    async fn account(&self, command: &str, args: &str) -> bool {
        let result = self.client.account(&self.context, command, args).await;
        self.verdict("account", result)
    }

    async fn release(&self) {
        info!(server = %self.server.addr(), user = %self.context.user, "closing AAA connection");
        self.client.disconnect().await;
    }
}
