//! Capability exchange.

use tracing::debug;

use crate::error::CoreError;
use crate::modules::ModuleSet;
use crate::reply::BASE_NAMESPACE;
use crate::xml::{self, Escaping, XmlBuilder};

pub const BASE_CAPABILITIES: [&str; 5] = [
    "urn:ietf:params:netconf:base:1.0",
    "urn:ietf:params:netconf:base:1.1",
    "urn:ietf:params:netconf:capability:writable-running:1.0",
    "urn:ietf:params:netconf:capability:xpath:1.0",
    "urn:ietf:params:xml:ns:yang:ietf-netconf-monitoring",
];

/// The server `<hello>`. Without a module list only the base capabilities
/// are advertised.
pub fn server_hello(session_id: u32, modules: Option<&ModuleSet>) -> String {
    let mut b = XmlBuilder::new(Escaping::Direct);
    b.open_with("hello", &[("xmlns", BASE_NAMESPACE)])
        .open("capabilities");
    for cap in BASE_CAPABILITIES {
        b.leaf("capability", cap);
    }
    for cap in modules.map(ModuleSet::capabilities).unwrap_or_default() {
        b.leaf("capability", &cap);
    }
    b.close("capabilities")
        .leaf("session-id", &session_id.to_string())
        .close("hello");
    b.finish()
}

/// A client hello is acceptable when it parses and its `<hello>` has at
/// least one child element.
pub fn validate_client_hello(raw: &str) -> Result<(), CoreError> {
    let doc = xml::parse(raw).map_err(|e| {
        debug!(error = %e, "client hello is not XML");
        CoreError::InvalidHello
    })?;
    let hello = xml::find(doc.root_element(), "hello").ok_or(CoreError::InvalidHello)?;
    if xml::has_child_elements(hello) {
        Ok(())
    } else {
        Err(CoreError::InvalidHello)
    }
}
