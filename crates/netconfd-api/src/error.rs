use thiserror::Error;

/// Top-level error type for the `netconfd-api` crate.
///
/// `netconfd-core` maps these into `CoreError`, keeping HTTP status codes
/// and Redis error kinds out of NETCONF replies.
#[derive(Debug, Error)]
pub enum Error {
    // ── Transport ───────────────────────────────────────────────────
    /// HTTP transport error (connection refused, DNS failure, etc.)
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// TLS setup or certificate error.
    #[error("TLS error: {0}")]
    Tls(String),

    // ── RESTCONF ────────────────────────────────────────────────────
    /// Error reported by the RESTCONF server, parsed from the
    /// `ietf-restconf:errors` body when one is present.
    #[error("{message}")]
    Restconf {
        status: u16,
        tag: Option<String>,
        message: String,
    },

    /// A datastore path that cannot be mapped onto a RESTCONF URL.
    #[error("Invalid datastore path: {path}")]
    InvalidPath { path: String },

    // ── Key-value store ─────────────────────────────────────────────
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    // ── Persistence ─────────────────────────────────────────────────
    /// A shell command exited unsuccessfully.
    #[error("Command `{command}` failed: {message}")]
    Command { command: String, message: String },

    /// The backup endpoint answered with a status other than 200/201/204.
    #[error("Upload to {url} rejected with HTTP {status}")]
    UploadRejected { url: String, status: u16 },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // ── Data ────────────────────────────────────────────────────────
    /// JSON deserialization failed, with the raw body for debugging.
    #[error("Deserialization error: {message}")]
    Deserialization { message: String, body: String },
}

impl Error {
    /// Returns `true` if the datastore reported the resource as missing.
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::Transport(e) => e.status() == Some(reqwest::StatusCode::NOT_FOUND),
            Self::Restconf { status: 404, .. } => true,
            Self::Restconf { tag: Some(tag), .. } => tag == "data-missing",
            _ => false,
        }
    }
}
