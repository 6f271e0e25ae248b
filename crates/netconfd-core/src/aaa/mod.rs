//! Authentication, authorization and accounting.
//!
//! Every session is bound to one [`Authenticator`] at login. Which variant
//! depends on the `AAA|authentication` entry in the shared KV store: when
//! its `login` field names `tacacs+`, the session authenticates against the
//! first reachable remote AAA server; otherwise a local password check is
//! used.

mod gate;
mod local;
mod pool;
mod remote;

use std::sync::Arc;

use async_trait::async_trait;
use secrecy::SecretString;
use strum::{Display, EnumString};
use tracing::{info, warn};

use crate::error::CoreError;
use crate::kv::KvStore;

pub use gate::with_auth;
pub use local::{LocalAuthenticator, PasswordVerifier, TransportVerified};
pub use pool::{AuthType, TacacsInfo, load_pool, select_server};
pub use remote::{AaaClient, AaaConnector, AaaContext, RemoteAuthenticator, remote_service};

pub const AAA_AUTHENTICATION_KEY: &str = "AAA|authentication";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum AuthKind {
    Local,
    Remote,
}

/// A session's authenticated identity and its authorization and accounting
/// capability.
#[async_trait]
pub trait Authenticator: Send + Sync {
    fn user(&self) -> &str;

    fn kind(&self) -> AuthKind;

    async fn authenticate(&self) -> bool;

    async fn authorize(&self, command: &str, args: &str) -> bool;

    async fn account(&self, command: &str, args: &str) -> bool;

    /// Drop whatever connection backs the principal.
    async fn release(&self) {}
}

/// Credentials presented by the transport at login.
#[derive(Debug, Clone)]
pub struct LoginRequest {
    pub user: String,
    pub password: SecretString,
    pub remote_addr: Option<String>,
}

/// Picks and authenticates the session principal.
#[derive(Clone)]
pub struct AaaService {
    kv: Arc<dyn KvStore>,
    verifier: Arc<dyn PasswordVerifier>,
    connector: Option<Arc<dyn AaaConnector>>,
}

impl std::fmt::Debug for AaaService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AaaService")
            .field("remote_capable", &self.connector.is_some())
            .finish_non_exhaustive()
    }
}

impl AaaService {
    pub fn new(kv: Arc<dyn KvStore>, verifier: Arc<dyn PasswordVerifier>) -> Self {
        Self {
            kv,
            verifier,
            connector: None,
        }
    }

    #[must_use]
    pub fn with_connector(mut self, connector: Arc<dyn AaaConnector>) -> Self {
        self.connector = Some(connector);
        self
    }

    /// Whether logins go to remote AAA servers. An unreadable setting counts
    /// as disabled.
    pub async fn remote_enabled(&self) -> bool {
        match self.kv.hget(AAA_AUTHENTICATION_KEY, "login").await {
            Ok(Some(login)) => login.contains("tacacs+"),
            Ok(None) => false,
            Err(e) => {
                warn!(error = %e, "cannot read AAA login setting");
                false
            }
        }
    }

    /// Authenticate `request` and return the principal to bind to the
    /// session.
    pub async fn login(&self, request: LoginRequest) -> Result<Box<dyn Authenticator>, CoreError> {
        let principal: Box<dyn Authenticator> = if self.remote_enabled().await {
            let connector = self.connector.as_deref().ok_or(CoreError::NoAaaConnector)?;
            let (service, protocol) = remote_service(self.kv.as_ref()).await?;
            let (server, client) = select_server(self.kv.as_ref(), connector).await?;
            let context = AaaContext {
                user: request.user.clone(),
                password: request.password,
                remote_addr: request.remote_addr,
                service,
                protocol,
            };
            Box::new(RemoteAuthenticator::new(server, client, context))
        } else {
            Box::new(LocalAuthenticator::new(
                request.user.clone(),
                request.password,
                Arc::clone(&self.verifier),
            ))
        };

        if !principal.authenticate().await {
            warn!(user = %request.user, kind = %principal.kind(), "authentication failed");
            principal.release().await;
            return Err(CoreError::AuthenticationFailed { user: request.user });
        }
        info!(user = %request.user, kind = %principal.kind(), "authentication succeeded");
        Ok(principal)
    }
}
