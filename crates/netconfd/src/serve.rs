//! Wiring the collaborators into a router and running sessions over TCP or
//! stdio.

use std::sync::Arc;

use secrecy::SecretString;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpListener;
use tracing::{debug, info, warn};

use netconfd_api::{RedisKv, RestconfClient, SystemPersistence};
use netconfd_config::Config;
use netconfd_core::aaa::TransportVerified;
use netconfd_core::{
    AaaService, CoreError, DatastoreLock, KeyCatalog, KvStore, LoginRequest, Router,
    SessionState, session,
};

use crate::error::CliError;

/// Everything a session needs, shared across connections.
#[derive(Clone)]
pub struct Services {
    router: Router,
    aaa: AaaService,
}

impl Services {
    pub async fn build(config: &Config) -> Result<Self, CliError> {
        let transport = config.transport();

        let store = RestconfClient::new(
            config.store_url()?,
            config.store_credentials(),
            &transport,
        )
        .map_err(connection_error("the configuration store"))?;
        let persistence = SystemPersistence::new(
            config.persistence.save_command.clone(),
            config.persistence.startup_file.clone(),
            &transport,
        )
        .map_err(connection_error("the backup target"))?;
        let kv: Arc<dyn KvStore> = Arc::new(
            RedisKv::connect(&config.redis.url)
                .await
                .map_err(connection_error("redis"))?,
        );
        let catalog = KeyCatalog::load(&config.catalog.path).await?;
        debug!(path = %config.catalog.path.display(), "key catalog loaded");

        let router = Router::new(
            Arc::new(store),
            Arc::new(persistence),
            DatastoreLock::new(Arc::clone(&kv), config.lock_ttl()),
            Arc::new(catalog),
        )
        .with_schema_dir(config.schemas.dir.clone());
        let aaa = AaaService::new(kv, Arc::new(TransportVerified));
        if aaa.remote_enabled().await {
            warn!("TACACS+ login is enabled but no remote AAA client is built in; logins will fail");
        }

        Ok(Self { router, aaa })
    }

    /// Log `user` in and run one session over `io`.
    pub async fn session<T>(
        &self,
        io: T,
        user: String,
        remote_addr: Option<String>,
    ) -> Result<(), CoreError>
    where
        T: AsyncRead + AsyncWrite + Unpin,
    {
        let principal = self
            .aaa
            .login(LoginRequest {
                user,
                password: SecretString::from(String::new()),
                remote_addr,
            })
            .await?;
        let state = SessionState::new(principal);
        debug!(session_id = state.id, user = %state.user, "principal authenticated");
        session::run(&self.router, state, io).await
    }
}

fn connection_error(service: &'static str) -> impl FnOnce(netconfd_api::Error) -> CliError {
    move |source| CliError::Connection { service, source }
}

/// Sessions over TCP are unauthenticated, so only loopback binds are
/// accepted unless the operator opts in.
pub fn check_bind(config: &Config, allow_remote: bool) -> Result<(), CliError> {
    let addr = config.listen_addr();
    if addr.ip().is_loopback() {
        return Ok(());
    }
    if !allow_remote {
        return Err(CliError::InsecureBind {
            addr: addr.to_string(),
        });
    }
    warn!(%addr, "serving unauthenticated NETCONF on a non-loopback address");
    Ok(())
}

/// Accept TCP connections until interrupted, one task per session.
pub async fn serve_tcp(config: &Config, services: &Services) -> Result<(), CliError> {
    let addr = config.listen_addr();
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|source| CliError::Bind {
            addr: addr.to_string(),
            source,
        })?;
    info!(%addr, "listening for NETCONF sessions");

    loop {
        tokio::select! {
            accepted = listener.accept() => {
                let (stream, peer) = match accepted {
                    Ok(accepted) => accepted,
                    Err(e) => {
                        warn!(error = %e, "accept failed");
                        continue;
                    }
                };
                let services = services.clone();
                let user = config.session.user.clone();
                tokio::spawn(async move {
                    debug!(%peer, "connection accepted");
                    if let Err(e) = services.session(stream, user, Some(peer.to_string())).await {
                        warn!(%peer, error = %e, "session ended with error");
                    }
                });
            }
            _ = tokio::signal::ctrl_c() => {
                info!("shutting down");
                return Ok(());
            }
        }
    }
}

/// One session over stdin/stdout, for use as an sshd subsystem.
pub async fn serve_stdio(services: &Services, user: String) -> Result<(), CliError> {
    let remote_addr = std::env::var("SSH_CLIENT")
        .ok()
        .and_then(|client| client.split_whitespace().next().map(str::to_owned));
    let io = tokio::io::join(tokio::io::stdin(), tokio::io::stdout());
    services.session(io, user, remote_addr).await?;
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn loopback_binds_need_no_opt_in() {
        let mut config = Config::default();
        check_bind(&config, false).unwrap();

        config.listen.addr = "::1".parse().unwrap();
        check_bind(&config, false).unwrap();

        config.listen.addr = "10.1.2.3".parse().unwrap();
        assert!(matches!(check_bind(&config, false), Err(CliError::InsecureBind { .. })));
        check_bind(&config, true).unwrap();
    }
}
