// RESTCONF client for the configuration datastore
//
// Datastore paths arrive in the canonical `/module:container/list[key=value]`
// form produced by the NETCONF compiler and are rewritten into RESTCONF
// resource URLs (`/restconf/data/module:container/list=value`).

use reqwest::Method;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, trace};
use url::Url;

use crate::error::Error;
use crate::transport::TransportConfig;

const YANG_JSON: &str = "application/yang-data+json";
const MODULES_STATE_PATH: &str = "/ietf-yang-library:modules-state";

/// Basic-auth credentials for the RESTCONF server.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub username: String,
    pub password: SecretString,
}

/// `ietf-yang-library:modules-state` as served by the datastore.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ModulesState {
    #[serde(rename = "module-set-id", default)]
    pub module_set_id: String,
    #[serde(default)]
    pub module: Vec<YangModule>,
}

/// One entry of the YANG library module list.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct YangModule {
    pub name: String,
    #[serde(default)]
    pub revision: String,
    #[serde(default)]
    pub namespace: String,
    #[serde(default)]
    pub schema: Option<String>,
    #[serde(rename = "conformance-type", default)]
    pub conformance_type: Option<String>,
}

#[derive(Deserialize)]
struct ModulesStateEnvelope {
    #[serde(rename = "ietf-yang-library:modules-state")]
    modules_state: ModulesState,
}

#[derive(Deserialize)]
struct RestconfErrors {
    #[serde(rename = "ietf-restconf:errors")]
    errors: RestconfErrorList,
}

#[derive(Deserialize)]
struct RestconfErrorList {
    #[serde(default)]
    error: Vec<RestconfErrorEntry>,
}

#[derive(Deserialize)]
struct RestconfErrorEntry {
    #[serde(rename = "error-tag")]
    tag: Option<String>,
    #[serde(rename = "error-message")]
    message: Option<String>,
}

/// Raw HTTP client for the datastore's RESTCONF interface.
pub struct RestconfClient {
    http: reqwest::Client,
    base_url: Url,
    credentials: Option<Credentials>,
}

impl RestconfClient {
    /// Create a client from a `TransportConfig`.
    ///
    /// `base_url` is the server root, e.g. `https://127.0.0.1:8443`.
    pub fn new(
        base_url: Url,
        credentials: Option<Credentials>,
        transport: &TransportConfig,
    ) -> Result<Self, Error> {
        let http = transport.build_client()?;
        Ok(Self::with_client(http, base_url, credentials))
    }

    /// Create a client around a pre-built `reqwest::Client`.
    pub fn with_client(
        http: reqwest::Client,
        base_url: Url,
        credentials: Option<Credentials>,
    ) -> Self {
        Self {
            http,
            base_url,
            credentials,
        }
    }

    // ── URL builders ─────────────────────────────────────────────────

    /// `{base}/restconf/data/{path}` for a canonical datastore path.
    pub fn data_url(&self, path: &str) -> Result<Url, Error> {
        self.resource_url("data", path)
    }

    /// `{base}/restconf/operations/{path}` for an action path.
    pub fn operations_url(&self, path: &str) -> Result<Url, Error> {
        self.resource_url("operations", path)
    }

    fn resource_url(&self, root: &str, path: &str) -> Result<Url, Error> {
        let base = self.base_url.as_str().trim_end_matches('/');
        let resource = to_restconf_path(path)?;
        Ok(Url::parse(&format!("{base}/restconf/{root}/{resource}"))?)
    }

    // ── Datastore operations ─────────────────────────────────────────

    /// Read a subtree. A `204 No Content` answer reads as an empty object.
    pub async fn get(&self, path: &str) -> Result<Value, Error> {
        let url = self.data_url(path)?;
        debug!("GET {}", url);
        let resp = self.request(Method::GET, url, None).send().await?;
        self.parse_json(resp).await
    }

    /// RESTCONF `POST`: create children of `path`, failing if they exist.
    pub async fn create(&self, path: &str, body: &Value) -> Result<(), Error> {
        let url = self.data_url(path)?;
        debug!("POST {}", url);
        let resp = self.request(Method::POST, url, Some(body)).send().await?;
        self.expect_success(resp).await
    }

    /// RESTCONF `PATCH`: merge `body` into `path`.
    pub async fn merge(&self, path: &str, body: &Value) -> Result<(), Error> {
        let url = self.data_url(path)?;
        debug!("PATCH {}", url);
        let resp = self.request(Method::PATCH, url, Some(body)).send().await?;
        self.expect_success(resp).await
    }

    /// RESTCONF `PUT`: replace the subtree at `path` with `body`.
    pub async fn replace(&self, path: &str, body: &Value) -> Result<(), Error> {
        let url = self.data_url(path)?;
        debug!("PUT {}", url);
        let resp = self.request(Method::PUT, url, Some(body)).send().await?;
        self.expect_success(resp).await
    }

    /// RESTCONF `DELETE` of the resource at `path`.
    pub async fn delete(&self, path: &str) -> Result<(), Error> {
        let url = self.data_url(path)?;
        debug!("DELETE {}", url);
        let resp = self.request(Method::DELETE, url, None).send().await?;
        self.expect_success(resp).await
    }

    /// Invoke an RPC/action under `/restconf/operations`.
    pub async fn invoke(&self, path: &str, input: &Value) -> Result<Value, Error> {
        let url = self.operations_url(path)?;
        debug!("POST {}", url);
        let resp = self.request(Method::POST, url, Some(input)).send().await?;
        self.parse_json(resp).await
    }

    /// Fetch the YANG library module list.
    pub async fn modules_state(&self) -> Result<ModulesState, Error> {
        let value = self.get(MODULES_STATE_PATH).await?;
        let envelope: ModulesStateEnvelope =
            serde_json::from_value(value.clone()).map_err(|e| Error::Deserialization {
                message: e.to_string(),
                body: value.to_string(),
            })?;
        Ok(envelope.modules_state)
    }

    // ── Request helpers ──────────────────────────────────────────────

    fn request(&self, method: Method, url: Url, body: Option<&Value>) -> reqwest::RequestBuilder {
        let mut builder = self.http.request(method, url).header(ACCEPT, YANG_JSON);
        if let Some(body) = body {
            builder = builder.header(CONTENT_TYPE, YANG_JSON).body(body.to_string());
        }
        match &self.credentials {
            Some(creds) => {
                builder.basic_auth(&creds.username, Some(creds.password.expose_secret()))
            }
            None => builder,
        }
    }

    async fn expect_success(&self, resp: reqwest::Response) -> Result<(), Error> {
        let status = resp.status();
        if status.is_success() {
            return Ok(());
        }
        let body = resp.text().await.unwrap_or_default();
        Err(restconf_error(status.as_u16(), &body))
    }

    async fn parse_json(&self, resp: reqwest::Response) -> Result<Value, Error> {
        let status = resp.status();
        let body = resp.text().await?;
        if !status.is_success() {
            return Err(restconf_error(status.as_u16(), &body));
        }
        trace!(bytes = body.len(), "RESTCONF response body");
        if body.trim().is_empty() {
            return Ok(Value::Object(serde_json::Map::new()));
        }
        serde_json::from_str(&body).map_err(|e| {
            let shown = preview(&body);
            Error::Deserialization {
                message: format!("{e} (body preview: {shown:?})"),
                body: body.clone(),
            }
        })
    }
}

const PREVIEW_CHARS: usize = 200;

/// At most the first 200 characters of `body`.
fn preview(body: &str) -> &str {
    body.char_indices()
        .nth(PREVIEW_CHARS)
        .map_or(body, |(end, _)| &body[..end])
}

/// Build an `Error::Restconf` from a failed response, preferring the
/// server's own `error-message` over the raw body.
fn restconf_error(status: u16, body: &str) -> Error {
    let entry = serde_json::from_str::<RestconfErrors>(body)
        .ok()
        .and_then(|errs| errs.errors.error.into_iter().next());

    match entry {
        Some(entry) => Error::Restconf {
            status,
            message: entry
                .message
                .unwrap_or_else(|| entry.tag.clone().unwrap_or_else(|| format!("HTTP {status}"))),
            tag: entry.tag,
        },
        None if body.trim().is_empty() => Error::Restconf {
            status,
            tag: None,
            message: format!("HTTP {status}"),
        },
        None => Error::Restconf {
            status,
            tag: None,
            message: format!("HTTP {status}: {}", preview(body)),
        },
    }
}

// ── Path conversion ──────────────────────────────────────────────────

/// Rewrite `/m:c/l[k1=v1][k2=v2]/leaf` as `m:c/l=v1,v2/leaf`.
///
/// Key values are percent-encoded so that `/`, `,` and friends inside a key
/// do not split the resource identifier.
pub fn to_restconf_path(path: &str) -> Result<String, Error> {
    let invalid = || Error::InvalidPath {
        path: path.to_owned(),
    };

    let trimmed = path.strip_prefix('/').ok_or_else(invalid)?;
    let mut out = String::with_capacity(trimmed.len());
    let mut rest = trimmed;

    while !rest.is_empty() {
        let (segment, tail) = split_segment(rest).ok_or_else(invalid)?;
        if !out.is_empty() {
            out.push('/');
        }
        out.push_str(&render_segment(segment).ok_or_else(invalid)?);
        rest = tail;
    }

    if out.is_empty() {
        return Err(invalid());
    }
    Ok(out)
}

/// Split off the first path segment, honouring `/` inside `[...]`.
fn split_segment(input: &str) -> Option<(&str, &str)> {
    let mut depth = 0usize;
    for (idx, ch) in input.char_indices() {
        match ch {
            '[' => depth += 1,
            ']' => depth = depth.checked_sub(1)?,
            '/' if depth == 0 => return Some((&input[..idx], &input[idx + 1..])),
            _ => {}
        }
    }
    (depth == 0).then_some((input, ""))
}

fn render_segment(segment: &str) -> Option<String> {
    let Some(open) = segment.find('[') else {
        return (!segment.is_empty()).then(|| segment.to_owned());
    };

    let name = &segment[..open];
    let mut values = Vec::new();
    let mut rest = &segment[open..];
    while let Some(body) = rest.strip_prefix('[') {
        let close = body.find(']')?;
        let (_, value) = body[..close].split_once('=')?;
        values.push(encode_key_value(value));
        rest = &body[close + 1..];
    }
    if !rest.is_empty() || name.is_empty() {
        return None;
    }
    Some(format!("{name}={}", values.join(",")))
}

fn encode_key_value(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for byte in value.bytes() {
        if byte.is_ascii_alphanumeric() || matches!(byte, b'-' | b'.' | b'_' | b'~' | b':') {
            out.push(char::from(byte));
        } else {
            out.push_str(&format!("%{byte:02X}"));
        }
    }
    out
}
