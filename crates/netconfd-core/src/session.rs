//! One NETCONF session: hello exchange, then a strictly sequential
//! read → process → reply loop until the transport closes.

use std::sync::atomic::{AtomicU32, Ordering};

use futures_util::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_util::codec::Framed;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::aaa::Authenticator;
use crate::error::CoreError;
use crate::framing::{NetconfCodec, Outbound};
use crate::hello::{server_hello, validate_client_hello};
use crate::reply::{FALLBACK_MESSAGE_ID, error_response};
use crate::router::Router;

static NEXT_SESSION_ID: AtomicU32 = AtomicU32::new(1);

/// Process-wide, monotonically increasing session id.
pub fn next_session_id() -> u32 {
    NEXT_SESSION_ID.fetch_add(1, Ordering::Relaxed)
}

/// Per-connection state handed to the router with every message.
pub struct SessionState {
    pub id: u32,
    pub user: String,
    /// Bound at login; taken when a remote principal is released.
    pub principal: Option<Box<dyn Authenticator>>,
    /// Identity used for datastore lock ownership.
    pub token: Uuid,
}

impl std::fmt::Debug for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionState")
            .field("id", &self.id)
            .field("user", &self.user)
            .field("principal", &self.principal.as_ref().map(|p| p.kind()))
            .field("token", &self.token)
            .finish()
    }
}

impl SessionState {
    pub fn new(principal: Box<dyn Authenticator>) -> Self {
        Self {
            id: next_session_id(),
            user: principal.user().to_owned(),
            principal: Some(principal),
            token: Uuid::new_v4(),
        }
    }

    pub fn principal(&self) -> Result<&dyn Authenticator, CoreError> {
        self.principal.as_deref().ok_or(CoreError::NotAuthenticated)
    }

    /// Drop the principal, closing any connection behind it.
    pub async fn release(&mut self) {
        if let Some(principal) = self.principal.take() {
            principal.release().await;
        }
    }
}

/// Drive a session over `io` until the peer disconnects.
///
/// Fails only when the hello exchange does, or when a reply cannot be
/// written.
pub async fn run<T>(router: &Router, mut state: SessionState, io: T) -> Result<(), CoreError>
where
    T: AsyncRead + AsyncWrite + Unpin,
{
    let result = serve(router, &mut state, io).await;
    state.release().await;
    info!(session_id = state.id, user = %state.user, "session closed");
    result
}

async fn serve<T>(router: &Router, state: &mut SessionState, io: T) -> Result<(), CoreError>
where
    T: AsyncRead + AsyncWrite + Unpin,
{
    let mut framed = Framed::new(io, NetconfCodec);

    let modules = match router.modules().await {
        Ok(modules) => Some(modules),
        Err(e) => {
            warn!(error = %e, "module list unavailable, advertising base capabilities only");
            None
        }
    };
    framed
        .send(Outbound::Hello(server_hello(state.id, modules.as_deref())))
        .await?;

    let hello = match framed.next().await {
        Some(Ok(raw)) => validate_client_hello(&raw),
        Some(Err(e)) => Err(e),
        None => Err(CoreError::InvalidHello),
    };
    if let Err(e) = hello {
        warn!(session_id = state.id, error = %e, "client hello rejected");
        let reply = error_response(FALLBACK_MESSAGE_ID, &CoreError::InvalidHello);
        if let Err(write) = framed.send(Outbound::Reply(reply)).await {
            debug!(error = %write, "could not report hello failure");
        }
        return Err(CoreError::InvalidHello);
    }
    info!(session_id = state.id, user = %state.user, "session established");

    while let Some(frame) = framed.next().await {
        let raw = match frame {
            Ok(raw) => raw,
            Err(e) => {
                warn!(session_id = state.id, error = %e, "read failed");
                break;
            }
        };
        let reply = router.process(state, &raw).await;
        framed.send(Outbound::Reply(reply)).await?;
    }
    Ok(())
}
