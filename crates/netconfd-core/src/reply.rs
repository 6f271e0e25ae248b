//! `<rpc-reply>` assembly.

use std::sync::LazyLock;

use quick_xml::escape::escape;
use regex::Regex;

use crate::error::CoreError;
use crate::xml::{Escaping, XmlBuilder};

pub const BASE_NAMESPACE: &str = "urn:ietf:params:xml:ns:netconf:base:1.0";

const XML_DECLARATION: &str = r#"<?xml version="1.0" encoding="utf-8"?>"#;

/// Message-id used when none can be recovered from the request.
pub const FALLBACK_MESSAGE_ID: &str = "1";

static MESSAGE_ID: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"message-id\s*=\s*["']([^"'\s]+)["']"#).expect("message-id pattern is valid")
});

/// What a handler produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// `<ok/>`.
    Ok,
    /// A body fragment, escaped for embedding.
    Data(String),
}

impl Reply {
    /// The wire-level payload: `ok` or the body.
    pub fn payload(&self) -> &str {
        match self {
            Self::Ok => "ok",
            Self::Data(body) => body,
        }
    }
}

/// Wrap `payload` in an `<rpc-reply>` for `message_id`.
///
/// `{}` yields an empty reply and `ok` yields `<ok/>`. Any other payload is
/// embedded, then every `&amp;` in it becomes `&`. This is the only place
/// that happens; fragments are escaped twice when they are built.
pub fn create_response(message_id: &str, payload: &str) -> String {
    let mut out = format!(
        r#"{XML_DECLARATION}<rpc-reply xmlns="{BASE_NAMESPACE}" message-id="{}">"#,
        escape(message_id)
    );
    match payload {
        "{}" => {}
        "ok" => out.push_str("<ok/>"),
        body => out.push_str(&body.replace("&amp;", "&")),
    }
    out.push_str("</rpc-reply>");
    out
}

/// `<rpc-error>` body for `message`.
pub fn error_body(message: &str) -> String {
    let mut builder = XmlBuilder::new(Escaping::Embedded);
    builder
        .open("rpc-error")
        .leaf("error-type", "rpc")
        .leaf("error-severity", "error")
        .open_with("error-message", &[("xml:lang", "en")])
        .text(message)
        .close("error-message")
        .close("rpc-error");
    builder.finish()
}

pub fn error_response(message_id: &str, err: &CoreError) -> String {
    create_response(message_id, &error_body(&err.to_string()))
}

/// Best-effort message-id from raw request text, for replies to requests
/// that could not be parsed.
pub fn extract_message_id(raw: &str) -> String {
    MESSAGE_ID
        .captures(raw)
        .and_then(|caps| caps.get(1))
        .map_or_else(|| FALLBACK_MESSAGE_ID.to_owned(), |m| m.as_str().to_owned())
}
