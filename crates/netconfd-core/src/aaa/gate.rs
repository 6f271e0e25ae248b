// ── AAA gate ──
//
// authorize → run → account. A denied authorization skips the operation; a
// failed accounting fails the RPC after the operation already ran.

use std::future::Future;

use tracing::{debug, warn};

use super::Authenticator;
use crate::error::CoreError;

pub async fn with_auth<T, F, Fut>(
    principal: &dyn Authenticator,
    command: &str,
    args: &str,
    op: F,
) -> Result<T, CoreError>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T, CoreError>>,
{
    if !principal.authorize(command, args).await {
        warn!(user = principal.user(), command, args, "authorization denied");
        return Err(CoreError::Unauthorized {
            command: command.to_owned(),
        });
    }
    debug!(command, "authorization passed");

    let output = op().await?;

    if !principal.account(command, args).await {
        warn!(user = principal.user(), command, args, "accounting failed");
        return Err(CoreError::AccountingFailed {
            command: command.to_owned(),
        });
    }
    debug!(command, "accounting passed");
    Ok(output)
}
