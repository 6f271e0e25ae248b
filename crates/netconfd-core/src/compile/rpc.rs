// Smaller RPC bodies: get-schema, sonic-rpc, copy-config, datastore targets.

use roxmltree::Node;
use serde_json::{Map, Value as Json};

use super::leaf_value;
use crate::error::CoreError;
use crate::xml;

/// Name of the datastore under the first `<target>` element.
pub fn target_datastore<'a>(rpc: Node<'a, '_>) -> Result<&'a str, CoreError> {
    datastore_under(rpc, "target", "target store")
}

fn datastore_under<'a>(
    rpc: Node<'a, '_>,
    wrapper: &str,
    element: &'static str,
) -> Result<&'a str, CoreError> {
    xml::find(rpc, wrapper)
        .and_then(xml::first_child_element)
        .map(xml::local_name)
        .ok_or(CoreError::MissingElement { element })
}

// ── get-schema ───────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaRequest {
    pub identifier: String,
    pub version: Option<String>,
    pub format: Option<String>,
}

pub fn compile_get_schema(rpc: Node<'_, '_>) -> Result<SchemaRequest, CoreError> {
    let text = |name: &str| {
        xml::find(rpc, name)
            .and_then(xml::trimmed_text)
            .map(str::to_owned)
    };
    Ok(SchemaRequest {
        identifier: text("identifier").ok_or(CoreError::MissingIdentifier)?,
        version: text("version"),
        format: text("format"),
    })
}

// ── sonic-rpc ────────────────────────────────────────────────────────

/// One action invocation under `<sonic-rpc>`.
#[derive(Debug, Clone, PartialEq)]
pub struct ActionRequest {
    pub path: String,
    pub input: Json,
}

/// Each child `R` of `<sonic-rpc>` becomes an action at `/sonic-rpc:R`
/// with input `{"sonic-rpc:input": {leaf: value, ...}}`.
pub fn compile_sonic_rpc(rpc_node: Node<'_, '_>) -> Vec<ActionRequest> {
    xml::child_elements(rpc_node)
        .map(|action| {
            let leaves: Map<String, Json> = xml::child_elements(action)
                .map(|leaf| (xml::local_name(leaf).to_owned(), leaf_value(leaf).to_json()))
                .collect();
            let mut input = Map::new();
            input.insert("sonic-rpc:input".to_owned(), Json::Object(leaves));
            ActionRequest {
                path: format!("/sonic-rpc:{}", xml::local_name(action)),
                input: Json::Object(input),
            }
        })
        .collect()
}

// ── copy-config ──────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CopyRequest {
    pub source: String,
    pub target: String,
    /// Text of `<target><url>`, when the target is a URL.
    pub url: Option<String>,
}

pub fn compile_copy_config(rpc: Node<'_, '_>) -> Result<CopyRequest, CoreError> {
    let source = datastore_under(rpc, "source", "source store")?;
    let target_node = xml::find(rpc, "target")
        .and_then(xml::first_child_element)
        .ok_or(CoreError::MissingElement {
            element: "target store",
        })?;
    let target = xml::local_name(target_node);
    let url = (target == "url")
        .then(|| xml::trimmed_text(target_node).map(str::to_owned))
        .flatten();

    Ok(CopyRequest {
        source: source.to_owned(),
        target: target.to_owned(),
        url,
    })
}
