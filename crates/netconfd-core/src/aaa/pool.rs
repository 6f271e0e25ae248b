// ── Remote AAA server pool ──
//
// Servers are read from the KV store on every login and never cached.
// Selection walks them in ascending priority and stops at the first one that
// answers a connectivity probe.

use std::collections::HashMap;
use std::time::Duration;

use secrecy::SecretString;
use strum::{Display, EnumString};
use tracing::{debug, info, warn};

use super::remote::{AaaClient, AaaConnector};
use crate::error::CoreError;
use crate::kv::KvStore;

pub const GLOBAL_KEY: &str = "TACPLUS|global";
pub const SERVER_PATTERN: &str = "TACPLUS_SERVER|*";

const DEFAULT_PORT: u16 = 49;
const DEFAULT_TIMEOUT_SECS: u64 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Display, EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum AuthType {
    #[default]
    Pap,
    Chap,
    #[strum(to_string = "ascii", serialize = "login")]
    Ascii,
}

/// One candidate remote AAA server.
#[derive(Debug, Clone)]
pub struct TacacsInfo {
    pub ip: String,
    pub port: u16,
    /// Lower is tried first.
    pub priority: i64,
    pub secret: SecretString,
    pub timeout: Duration,
    pub auth_type: AuthType,
}

impl TacacsInfo {
    /// `host:port`, bracketing IPv6 literals.
    pub fn addr(&self) -> String {
        if self.ip.contains(':') {
            format!("[{}]:{}", self.ip, self.port)
        } else {
            format!("{}:{}", self.ip, self.port)
        }
    }
}

struct Defaults {
    secret: String,
    timeout: Duration,
    auth_type: AuthType,
}

fn parse_or<T: std::str::FromStr>(value: Option<&String>, field: &str, default: T) -> T {
    match value {
        None => default,
        Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
            warn!(field, value = %raw, "unparseable AAA setting, using default");
            default
        }),
    }
}

fn defaults(global: &HashMap<String, String>) -> Defaults {
    Defaults {
        secret: global.get("passkey").cloned().unwrap_or_default(),
        timeout: Duration::from_secs(parse_or(
            global.get("timeout"),
            "timeout",
            DEFAULT_TIMEOUT_SECS,
        )),
        auth_type: parse_or(global.get("auth_type"), "auth_type", AuthType::default()),
    }
}

fn server(key: &str, fields: &HashMap<String, String>, defaults: &Defaults) -> TacacsInfo {
    let ip = key.split_once('|').map_or(key, |(_, ip)| ip).to_owned();
    TacacsInfo {
        ip,
        port: parse_or(fields.get("tcp_port"), "tcp_port", DEFAULT_PORT),
        priority: parse_or(fields.get("priority"), "priority", 0),
        secret: SecretString::from(
            fields
                .get("passkey")
                .cloned()
                .unwrap_or_else(|| defaults.secret.clone()),
        ),
        timeout: Duration::from_secs(parse_or(
            fields.get("timeout"),
            "timeout",
            defaults.timeout.as_secs(),
        )),
        auth_type: parse_or(fields.get("auth_type"), "auth_type", defaults.auth_type),
    }
}

/// Every configured server, in ascending priority. Servers with equal
/// priority keep the order the store listed them in.
pub async fn load_pool(kv: &dyn KvStore) -> Result<Vec<TacacsInfo>, CoreError> {
    let global = kv.hgetall(GLOBAL_KEY).await?;
    let defaults = defaults(&global);

    let mut pool = Vec::new();
    for key in kv.keys(SERVER_PATTERN).await? {
        let fields = kv.hgetall(&key).await?;
        pool.push(server(&key, &fields, &defaults));
    }
    pool.sort_by_key(|info| info.priority);
    debug!(servers = pool.len(), "remote AAA pool loaded");
    Ok(pool)
}

/// First server, by priority, whose probe succeeds, with a client bound to
/// it. Each server is probed at most once.
pub async fn select_server(
    kv: &dyn KvStore,
    connector: &dyn AaaConnector,
) -> Result<(TacacsInfo, Box<dyn AaaClient>), CoreError> {
    let pool = load_pool(kv).await?;
    if pool.is_empty() {
        return Err(CoreError::NoAaaConfig);
    }

    for info in pool {
        debug!(server = %info.addr(), priority = info.priority, "probing AAA server");
        let client = connector.client_for(&info);
        if client.test_connection().await {
            info!(server = %info.addr(), "connected to AAA server");
            return Ok((info, client));
        }
        warn!(server = %info.addr(), "AAA server unreachable, skipping");
        client.disconnect().await;
    }
    Err(CoreError::NoReachableAaaServer)
}
