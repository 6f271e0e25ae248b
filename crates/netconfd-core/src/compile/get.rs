use roxmltree::Node;

use super::{Site, model_path, sites};
use crate::catalog::KeyCatalog;
use crate::error::CoreError;
use crate::xml;

/// One datastore read resolved from a `<filter>` subtree.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct GetRequest {
    pub path: String,
    /// Leaves the caller asked for; empty means everything.
    pub filters: Vec<String>,
    /// Module the path is qualified with.
    pub module: String,
    /// Inner container, when the read targets a list below one.
    pub container: Option<String>,
    /// Targeted list name.
    pub list: Option<String>,
}

impl GetRequest {
    fn container(module: &str, path: String) -> Self {
        Self {
            path,
            module: module.to_owned(),
            ..Self::default()
        }
    }
}

/// Resolve every read a `<get>`/`<get-config>` filter asks for, in document
/// order.
pub fn compile_get(rpc: Node<'_, '_>, catalog: &KeyCatalog) -> Result<Vec<GetRequest>, CoreError> {
    let filter = xml::find(rpc, "filter").ok_or(CoreError::MissingFilter)?;

    let mut requests = Vec::new();
    for model in xml::child_elements(filter) {
        let (module, base) = model_path(model);
        for site in sites(model, &base, catalog) {
            let list = match site {
                Site::Container(path) => {
                    requests.push(GetRequest::container(&module, path));
                    continue;
                }
                Site::List(list) => list,
            };

            let (path, _) = list.keyed_path();
            let filters = xml::child_elements(list.node)
                .filter(|leaf| !xml::has_child_elements(*leaf) && xml::trimmed_text(*leaf).is_none())
                .map(|leaf| xml::local_name(leaf).to_owned())
                .collect();

            requests.push(GetRequest {
                path,
                filters,
                module: module.clone(),
                container: list.container.map(str::to_owned),
                list: Some(list.name().to_owned()),
            });
        }
    }
    Ok(requests)
}
