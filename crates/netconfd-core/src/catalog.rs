//! List-key catalog: which leaves key each YANG list.
//!
//! Two tables are kept, one for the native `sonic-*` models and one for the
//! common (OpenConfig/IETF) models. A path containing `sonic` is looked up in
//! the former. The catalog is loaded once at startup and shared read-only.

use std::collections::BTreeMap;
use std::path::Path;

use serde::Deserialize;
use tracing::debug;

use crate::error::CoreError;

/// Path (without predicates) → ordered key leaf names.
pub type KeyTable = BTreeMap<String, Vec<String>>;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct KeyCatalog {
    #[serde(default)]
    sonic: KeyTable,
    #[serde(default)]
    common: KeyTable,
}

impl KeyCatalog {
    pub fn new(sonic: KeyTable, common: KeyTable) -> Self {
        Self { sonic, common }
    }

    /// Parse `{"sonic": {path: [keys]}, "common": {...}}`.
    pub fn from_json(json: &str) -> Result<Self, CoreError> {
        serde_json::from_str(json).map_err(|e| CoreError::Catalog {
            message: e.to_string(),
        })
    }

    pub async fn load(path: &Path) -> Result<Self, CoreError> {
        let json = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| CoreError::Catalog {
                message: format!("{}: {e}", path.display()),
            })?;
        let catalog = Self::from_json(&json)?;
        debug!(
            sonic = catalog.sonic.len(),
            common = catalog.common.len(),
            "key catalog loaded"
        );
        Ok(catalog)
    }

    /// The table a given path resolves against.
    pub fn table_for(&self, path: &str) -> &KeyTable {
        if path.contains("sonic") {
            &self.sonic
        } else {
            &self.common
        }
    }

    /// Whether the catalog knows `path` as a list.
    pub fn is_list(&self, path: &str) -> bool {
        self.table_for(path).contains_key(path)
    }

    /// Key names for a list path; empty for unkeyed or unknown paths.
    pub fn keys(&self, path: &str) -> &[String] {
        self.table_for(path).get(path).map_or(&[], Vec::as_slice)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn sonic_paths_use_sonic_table() {
        let catalog = KeyCatalog::from_json(
            r#"{
                "sonic": { "/sonic-port:sonic-port/PORT/PORT_LIST": ["name"] },
                "common": { "/openconfig-interfaces:interfaces/interface": ["name"] }
            }"#,
        )
        .unwrap();

        assert_eq!(catalog.keys("/sonic-port:sonic-port/PORT/PORT_LIST"), ["name"]);
        assert_eq!(
            catalog.keys("/openconfig-interfaces:interfaces/interface"),
            ["name"]
        );
        assert!(catalog.keys("/sonic-vlan:sonic-vlan/VLAN/VLAN_LIST").is_empty());
    }

    #[test]
    fn malformed_catalog_is_reported() {
        assert!(matches!(
            KeyCatalog::from_json("{\"sonic\": []}"),
            Err(CoreError::Catalog { .. })
        ));
    }
}
