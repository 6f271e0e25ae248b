//! Configuration for the netconfd daemon.
//!
//! Defaults, then `/etc/netconfd/config.toml` (or `--config`), then
//! `NETCONFD_*` environment variables, layered with figment. Nested keys use
//! a double underscore: `NETCONFD_LOCK__TTL_SECS=30`.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

use netconfd_api::{Credentials, TlsMode, TransportConfig};

/// Where the daemon looks when `--config` is not given.
pub const DEFAULT_CONFIG_PATH: &str = "/etc/netconfd/config.toml";

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level daemon configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub listen: ListenConfig,

    #[serde(default)]
    pub store: StoreConfig,

    #[serde(default)]
    pub redis: RedisConfig,

    #[serde(default)]
    pub catalog: CatalogConfig,

    #[serde(default)]
    pub schemas: SchemaConfig,

    #[serde(default)]
    pub lock: LockConfig,

    #[serde(default)]
    pub persistence: PersistenceConfig,

    #[serde(default)]
    pub session: SessionConfig,
}

/// TCP listener used by `netconfd serve`.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ListenConfig {
    #[serde(default = "default_listen_addr")]
    pub addr: IpAddr,

    #[serde(default = "default_listen_port")]
    pub port: u16,
}

impl Default for ListenConfig {
    fn default() -> Self {
        Self {
            addr: default_listen_addr(),
            port: default_listen_port(),
        }
    }
}

fn default_listen_addr() -> IpAddr {
    IpAddr::V4(Ipv4Addr::LOCALHOST)
}
fn default_listen_port() -> u16 {
    830
}

/// RESTCONF endpoint of the configuration datastore.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StoreConfig {
    #[serde(default = "default_store_url")]
    pub url: String,

    pub username: Option<String>,

    /// Plaintext password (prefer `NETCONFD_STORE__PASSWORD`).
    pub password: Option<String>,

    /// Path to a custom CA certificate.
    pub ca_cert: Option<PathBuf>,

    #[serde(default = "default_insecure")]
    pub insecure: bool,

    /// Request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            url: default_store_url(),
            username: None,
            password: None,
            ca_cert: None,
            insecure: default_insecure(),
            timeout: default_timeout(),
        }
    }
}

fn default_store_url() -> String {
    "https://127.0.0.1:443".into()
}
fn default_insecure() -> bool {
    true
}
fn default_timeout() -> u64 {
    30
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RedisConfig {
    #[serde(default = "default_redis_url")]
    pub url: String,
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            url: default_redis_url(),
        }
    }
}

fn default_redis_url() -> String {
    "redis+unix:///var/run/redis/redis.sock?db=4".into()
}

/// JSON file mapping list paths to their key names.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CatalogConfig {
    #[serde(default = "default_catalog_path")]
    pub path: PathBuf,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            path: default_catalog_path(),
        }
    }
}

fn default_catalog_path() -> PathBuf {
    PathBuf::from("/usr/share/netconfd/key_catalog.json")
}

/// Directory holding `<module>.yang` files served by get-schema.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SchemaConfig {
    #[serde(default = "default_schema_dir")]
    pub dir: PathBuf,
}

impl Default for SchemaConfig {
    fn default() -> Self {
        Self {
            dir: default_schema_dir(),
        }
    }
}

fn default_schema_dir() -> PathBuf {
    PathBuf::from("/usr/models/yang")
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LockConfig {
    #[serde(default = "default_lock_ttl")]
    pub ttl_secs: u64,
}

impl Default for LockConfig {
    fn default() -> Self {
        Self {
            ttl_secs: default_lock_ttl(),
        }
    }
}

fn default_lock_ttl() -> u64 {
    15
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PersistenceConfig {
    #[serde(default = "default_save_command")]
    pub save_command: String,

    #[serde(default = "default_startup_file")]
    pub startup_file: PathBuf,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            save_command: default_save_command(),
            startup_file: default_startup_file(),
        }
    }
}

fn default_save_command() -> String {
    netconfd_api::backup::DEFAULT_SAVE_COMMAND.into()
}
fn default_startup_file() -> PathBuf {
    PathBuf::from(netconfd_api::backup::DEFAULT_STARTUP_FILE)
}

/// Identity used when the transport has already authenticated the peer.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SessionConfig {
    #[serde(default = "default_session_user")]
    pub user: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            user: default_session_user(),
        }
    }
}

fn default_session_user() -> String {
    "admin".into()
}

// ── Config loading ──────────────────────────────────────────────────

/// Load the full Config from defaults, the TOML file, and the environment.
///
/// A missing file is not an error; the defaults and env still apply.
pub fn load_config(path: Option<&Path>) -> Result<Config, ConfigError> {
    let path = path.unwrap_or_else(|| Path::new(DEFAULT_CONFIG_PATH));

    let figment = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed("NETCONFD_").split("__"));

    let config: Config = figment.extract()?;
    config.validate()?;
    Ok(config)
}

// ── Translation into runtime settings ───────────────────────────────

impl Config {
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.store_url()?;
        if self.lock.ttl_secs == 0 {
            return Err(ConfigError::Validation {
                field: "lock.ttl_secs".into(),
                reason: "must be at least 1 second".into(),
            });
        }
        if self.persistence.save_command.trim().is_empty() {
            return Err(ConfigError::Validation {
                field: "persistence.save_command".into(),
                reason: "must not be empty".into(),
            });
        }
        Ok(())
    }

    pub fn listen_addr(&self) -> SocketAddr {
        SocketAddr::new(self.listen.addr, self.listen.port)
    }

    pub fn store_url(&self) -> Result<Url, ConfigError> {
        Url::parse(&self.store.url).map_err(|e| ConfigError::Validation {
            field: "store.url".into(),
            reason: format!("invalid URL {}: {e}", self.store.url),
        })
    }

    /// Basic-auth credentials for the store, when a username is configured.
    pub fn store_credentials(&self) -> Option<Credentials> {
        let username = self.store.username.clone()?;
        Some(Credentials {
            username,
            password: SecretString::from(self.store.password.clone().unwrap_or_default()),
        })
    }

    pub fn transport(&self) -> TransportConfig {
        let tls = if let Some(ref ca) = self.store.ca_cert {
            TlsMode::CustomCa(ca.clone())
        } else if self.store.insecure {
            TlsMode::DangerAcceptInvalid
        } else {
            TlsMode::System
        };
        TransportConfig {
            tls,
            timeout: Duration::from_secs(self.store.timeout),
        }
    }

    pub fn lock_ttl(&self) -> Duration {
        Duration::from_secs(self.lock.ttl_secs)
    }

    /// Effective config as TOML with secrets blanked out.
    pub fn to_redacted_toml(&self) -> Result<String, ConfigError> {
        let mut redacted = self.clone();
        if redacted.store.password.is_some() {
            redacted.store.password = Some("********".into());
        }
        Ok(toml::to_string_pretty(&redacted)?)
    }
}
