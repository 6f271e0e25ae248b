// ── Local login ──

use std::sync::Arc;

use async_trait::async_trait;
use secrecy::SecretString;
use tracing::debug;

use super::{AuthKind, Authenticator};

/// Checks a username/password pair against the host's accounts.
#[async_trait]
pub trait PasswordVerifier: Send + Sync {
    async fn verify(&self, user: &str, password: &SecretString) -> bool;
}

/// Accepts every login. For transports that authenticated the user before
/// handing over the stream (an sshd subsystem, a trusted local socket).
#[derive(Debug, Clone, Copy, Default)]
pub struct TransportVerified;

#[async_trait]
impl PasswordVerifier for TransportVerified {
    async fn verify(&self, user: &str, _password: &SecretString) -> bool {
        debug!(user, "user verified by transport");
        true
    }
}

/// Local principal. Once authenticated, every command is authorized and
/// accounting is a no-op.
pub struct LocalAuthenticator {
    user: String,
    password: SecretString,
    verifier: Arc<dyn PasswordVerifier>,
}

impl LocalAuthenticator {
    pub fn new(user: String, password: SecretString, verifier: Arc<dyn PasswordVerifier>) -> Self {
        Self {
            user,
            password,
            verifier,
        }
    }
}

#[async_trait]
impl Authenticator for LocalAuthenticator {
    fn user(&self) -> &str {
        &self.user
    }

    fn kind(&self) -> AuthKind {
        AuthKind::Local
    }

    async fn authenticate(&self) -> bool {
        self.verifier.verify(&self.user, &self.password).await
    }

    async fn authorize(&self, _command: &str, _args: &str) -> bool {
        true
    }

    async fn account(&self, _command: &str, _args: &str) -> bool {
        true
    }
}
