// HTTP client construction for the datastore and the backup target.

use std::path::PathBuf;
use std::time::Duration;

use reqwest::ClientBuilder;

use crate::error::Error;

/// How the datastore's certificate is checked.
#[derive(Debug, Clone)]
pub enum TlsMode {
    System,
    /// Trust this PEM file in addition to the system roots.
    CustomCa(PathBuf),
    /// Skip verification; the on-box REST server usually has a self-signed
    /// certificate.
    DangerAcceptInvalid,
}

impl TlsMode {
    fn configure(&self, builder: ClientBuilder) -> Result<ClientBuilder, Error> {
        match self {
            Self::System => Ok(builder),
            Self::CustomCa(path) => {
                let pem = std::fs::read(path)
                    .map_err(|e| Error::Tls(format!("cannot read {}: {e}", path.display())))?;
                let cert = reqwest::Certificate::from_pem(&pem)
                    .map_err(|e| Error::Tls(format!("{} is not a PEM certificate: {e}", path.display())))?;
                Ok(builder.add_root_certificate(cert))
            }
            Self::DangerAcceptInvalid => Ok(builder.danger_accept_invalid_certs(true)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct TransportConfig {
    pub tls: TlsMode,
    /// Per-request timeout.
    pub timeout: Duration,
}

impl TransportConfig {
    pub fn build_client(&self) -> Result<reqwest::Client, Error> {
        let builder = reqwest::Client::builder()
            .timeout(self.timeout)
            .user_agent(concat!("netconfd/", env!("CARGO_PKG_VERSION")));
        self.tls
            .configure(builder)?
            .build()
            .map_err(|e| Error::Tls(e.to_string()))
    }
}
