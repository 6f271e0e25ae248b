//! CLI error types with miette diagnostics.

use miette::Diagnostic;
use thiserror::Error;

use netconfd_config::ConfigError;
use netconfd_core::CoreError;

pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const CONFIG: i32 = 3;
    pub const CONNECTION: i32 = 7;
    pub const PROTOCOL: i32 = 9;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    #[error(transparent)]
    #[diagnostic(
        code(netconfd::config),
        help("Check the configuration file and NETCONFD_* environment variables.")
    )]
    Config(Box<ConfigError>),

    #[error("Could not listen on {addr}")]
    #[diagnostic(
        code(netconfd::bind),
        help("Is another NETCONF server running? Port 830 needs elevated privileges.")
    )]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Refusing to serve unauthenticated TCP on non-loopback address {addr}")]
    #[diagnostic(
        code(netconfd::insecure_bind),
        help("Bind to 127.0.0.1, pass --allow-remote, or run `netconfd stdio` behind sshd.")
    )]
    InsecureBind { addr: String },

    #[error("Could not reach {service}")]
    #[diagnostic(code(netconfd::connection))]
    Connection {
        service: &'static str,
        #[source]
        source: netconfd_api::Error,
    },

    #[error(transparent)]
    #[diagnostic(code(netconfd::session))]
    Session(#[from] CoreError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        Self::Config(Box::new(err))
    }
}

impl CliError {
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Config(err) => match **err {
                ConfigError::Validation { .. } => exit_code::USAGE,
                _ => exit_code::CONFIG,
            },
            Self::InsecureBind { .. } => exit_code::USAGE,
            Self::Bind { .. } | Self::Connection { .. } => exit_code::CONNECTION,
            Self::Session(CoreError::InvalidHello | CoreError::AuthenticationFailed { .. }) => {
                exit_code::PROTOCOL
            }
            Self::Session(_) | Self::Io(_) => exit_code::GENERAL,
        }
    }
}
