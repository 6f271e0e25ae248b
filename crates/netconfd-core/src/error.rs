// ── Core error types ──
//
// Every variant renders as the `error-message` of an `rpc-error`, so the
// Display strings are what NETCONF clients see. The
// `From<netconfd_api::Error>` impl folds transport failures into
// store/kv/persistence variants.

use thiserror::Error;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Request parsing ──────────────────────────────────────────────
    #[error("Malformed XML")]
    MalformedXml,

    #[error("Unable to read message-id in rpc")]
    MissingMessageId,

    #[error("Invalid client capabilities, exiting")]
    InvalidHello,

    #[error("Unsupported command")]
    Unsupported { operation: String },

    #[error("Need filter element, cannot return unfiltered configuration")]
    MissingFilter,

    #[error("{element} unspecified")]
    MissingElement { element: &'static str },

    #[error("Target must be running config")]
    TargetNotRunning,

    #[error("Unsupported combination of source and target nodes")]
    UnsupportedCopy,

    #[error("Identifier not passed")]
    MissingIdentifier,

    // ── AAA ──────────────────────────────────────────────────────────
    #[error("Unauthorized access {command}")]
    Unauthorized { command: String },

    #[error("Accounting failed cmd:{command}")]
    AccountingFailed { command: String },

    #[error("Authentication failed for user {user}")]
    AuthenticationFailed { user: String },

    #[error("Session has no authenticated principal")]
    NotAuthenticated,

    #[error("No remote AAA configuration found")]
    NoAaaConfig,

    #[error("Unable to connect to any remote AAA servers")]
    NoReachableAaaServer,

    #[error("Remote AAA is enabled but no AAA client is available")]
    NoAaaConnector,

    // ── Datastore lock ───────────────────────────────────────────────
    #[error("Datastore locked")]
    DatastoreLocked,

    #[error("Lock failed, lock is already held")]
    LockHeld,

    #[error("No active lock")]
    NoActiveLock,

    #[error("Current session doesn't own active lock")]
    LockNotOwned,

    // ── Collaborators ────────────────────────────────────────────────
    #[error("Resource not found: {path}")]
    NotFound { path: String },

    #[error("{message}")]
    Store { message: String },

    #[error("Key-value store error: {message}")]
    Kv { message: String },

    #[error("{message}")]
    Persistence { message: String },

    #[error("Schema not found: {identifier}")]
    SchemaNotFound { identifier: String },

    #[error("Invalid key catalog: {message}")]
    Catalog { message: String },

    // ── Transport ────────────────────────────────────────────────────
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // ── Internal errors ──────────────────────────────────────────────
    #[error("Unable to handle request")]
    Internal(String),
}

impl CoreError {
    /// Returns `true` if the store reported the target as absent.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

// ── Conversion from transport-layer errors ───────────────────────────

impl From<netconfd_api::Error> for CoreError {
    fn from(err: netconfd_api::Error) -> Self {
        use netconfd_api::Error as Api;

        if err.is_not_found() {
            let path = match &err {
                Api::Transport(e) => e.url().map(ToString::to_string).unwrap_or_default(),
                _ => String::new(),
            };
            return Self::NotFound { path };
        }

        match err {
            Api::Redis(e) => Self::Kv {
                message: e.to_string(),
            },
            Api::Command { .. } | Api::UploadRejected { .. } | Api::Io(_) => Self::Persistence {
                message: err.to_string(),
            },
            other => Self::Store {
                message: other.to_string(),
            },
        }
    }
}
