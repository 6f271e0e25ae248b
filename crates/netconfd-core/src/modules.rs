//! YANG module list: hello capabilities, `modules-state`,
//! `netconf-state/schemas` and get-schema.
//!
//! The list is fetched from the store the first time a session needs it and
//! kept for the life of the process. A failed fetch is not cached.

use std::path::Path;
use std::sync::Arc;

use tokio::sync::OnceCell;
use tracing::{debug, warn};

use crate::error::CoreError;
use crate::store::ConfigStore;
use crate::xml::{Escaping, XmlBuilder};

pub const YANG_LIBRARY_NAMESPACE: &str = "urn:ietf:params:xml:ns:yang:ietf-yang-library";
pub const MONITORING_NAMESPACE: &str = "urn:ietf:params:xml:ns:yang:ietf-netconf-monitoring";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModuleInfo {
    pub name: String,
    pub revision: String,
    pub namespace: String,
    pub schema: Option<String>,
    pub conformance: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModuleSet {
    pub module_set_id: String,
    pub modules: Vec<ModuleInfo>,
}

impl ModuleSet {
    /// `yang-library` capability plus one capability per module.
    pub fn capabilities(&self) -> Vec<String> {
        let mut caps = Vec::with_capacity(self.modules.len() + 1);
        caps.push(format!(
            "urn:ietf:params:netconf:capability:yang-library:1.0?module-set-id={}",
            self.module_set_id
        ));
        caps.extend(self.modules.iter().map(|m| {
            format!("{}?module={}&revision={}", m.namespace, m.name, m.revision)
        }));
        caps
    }

    pub fn module(&self, name: &str) -> Option<&ModuleInfo> {
        self.modules
            .iter()
            .find(|m| m.name.eq_ignore_ascii_case(name))
    }

    pub fn namespace_of(&self, name: &str) -> Option<&str> {
        self.module(name)
            .map(|m| m.namespace.as_str())
            .filter(|ns| !ns.is_empty())
    }

    /// `<modules-state>` as served for `/modules-state:modules-state`.
    pub fn modules_state_xml(&self) -> String {
        let mut b = XmlBuilder::new(Escaping::Embedded);
        b.open_with("modules-state", &[("xmlns", YANG_LIBRARY_NAMESPACE)])
            .leaf("module-set-id", &self.module_set_id);
        for m in &self.modules {
            b.open("module").leaf("name", &m.name).leaf("revision", &m.revision);
            if let Some(ref schema) = m.schema {
                b.leaf("schema", schema);
            }
            b.leaf("namespace", &m.namespace);
            if let Some(ref conformance) = m.conformance {
                b.leaf("conformance-type", conformance);
            }
            b.close("module");
        }
        b.close("modules-state");
        b.finish()
    }

    /// `<netconf-state><schemas>`, limited to `fields` when any are given.
    pub fn schemas_xml(&self, fields: &[String]) -> String {
        let wanted = |field: &str| fields.is_empty() || fields.iter().any(|f| f == field);
        let mut b = XmlBuilder::new(Escaping::Embedded);
        b.open_with("netconf-state", &[("xmlns", MONITORING_NAMESPACE)])
            .open("schemas");
        for m in &self.modules {
            b.open("schema");
            for (field, value) in [
                ("identifier", m.name.as_str()),
                ("version", m.revision.as_str()),
                ("format", "yang"),
                ("namespace", m.namespace.as_str()),
                ("location", "NETCONF"),
            ] {
                if wanted(field) {
                    b.leaf(field, value);
                }
            }
            b.close("schema");
        }
        b.close("schemas").close("netconf-state");
        b.finish()
    }

    /// Module matching a get-schema request. Only the `yang` format exists.
    pub fn find_schema(
        &self,
        identifier: &str,
        version: Option<&str>,
        format: Option<&str>,
    ) -> Option<&ModuleInfo> {
        if format.is_some_and(|f| !f.eq_ignore_ascii_case("yang") && !f.ends_with(":yang")) {
            return None;
        }
        self.modules.iter().find(|m| {
            m.name.eq_ignore_ascii_case(identifier) && version.is_none_or(|v| v == m.revision)
        })
    }
}

/// Read `<dir>/<module>.yang` and wrap it as get-schema `<data>`.
pub async fn schema_data(dir: &Path, module: &ModuleInfo) -> Result<String, CoreError> {
    let path = dir.join(format!("{}.yang", module.name));
    debug!(path = %path.display(), "reading schema");
    let text = tokio::fs::read_to_string(&path).await.map_err(|e| {
        warn!(path = %path.display(), error = %e, "schema file unreadable");
        CoreError::SchemaNotFound {
            identifier: module.name.clone(),
        }
    })?;

    let mut b = XmlBuilder::new(Escaping::Embedded);
    b.open_with("data", &[("xmlns", MONITORING_NAMESPACE)])
        .text(&text)
        .close("data");
    Ok(b.finish())
}

/// Process-wide, fetch-once module list.
#[derive(Debug, Default)]
pub struct ModuleCache {
    cell: OnceCell<Arc<ModuleSet>>,
}

impl ModuleCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self, store: &dyn ConfigStore) -> Result<Arc<ModuleSet>, CoreError> {
        self.cell
            .get_or_try_init(|| async {
                let modules = store.modules().await?;
                debug!(count = modules.modules.len(), set = %modules.module_set_id, "module list cached");
                Ok::<_, CoreError>(Arc::new(modules))
            })
            .await
            .cloned()
    }
}
