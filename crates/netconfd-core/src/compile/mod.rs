//! XML → datastore compiler.
//!
//! Filter and edit-config trees are walked as model container → inner
//! container → list → leaf. A child of the model container whose path the
//! key catalog knows is taken as a list directly, without an inner
//! container. Paths are qualified with the prefix the model element was
//! written with, falling back to its local name:
//! `<sonic-port>` → `/sonic-port:sonic-port`, `<if:interfaces>` →
//! `/if:interfaces`.

mod edit;
mod get;
pub mod reshape;
mod rpc;

use roxmltree::Node;

use crate::catalog::KeyCatalog;
use crate::value::Value;
use crate::xml;

pub use edit::{ConfigEdit, EditOperation, compile_edit};
pub use get::{GetRequest, compile_get};
pub use rpc::{
    ActionRequest, CopyRequest, SchemaRequest, compile_copy_config, compile_get_schema,
    compile_sonic_rpc, target_datastore,
};

/// `(module, "/module:name")` for a top-level model element.
pub(crate) fn model_path(model: Node<'_, '_>) -> (String, String) {
    let name = xml::local_name(model);
    let module = xml::written_prefix(model).unwrap_or(name);
    (module.to_owned(), format!("/{module}:{name}"))
}

/// A list element found under a model container.
pub(crate) struct ListSite<'a, 'input, 'c> {
    pub node: Node<'a, 'input>,
    /// Inner container name, `None` for a list directly under the model.
    pub container: Option<&'a str>,
    /// List path without key predicates.
    pub path: String,
    pub keys: &'c [String],
}

impl ListSite<'_, '_, '_> {
    pub fn name(&self) -> &str {
        xml::local_name(self.node)
    }

    /// List path with `[key=value]` appended for every key present in the
    /// request, plus the number of keys resolved.
    pub fn keyed_path(&self) -> (String, usize) {
        let mut path = self.path.clone();
        let mut resolved = 0;
        for key in self.keys {
            let value = self
                .node
                .descendants()
                .skip(1)
                .find(|n| n.is_element() && xml::local_name(*n) == key.as_str())
                .and_then(xml::trimmed_text);
            if let Some(value) = value {
                path.push_str(&format!("[{key}={value}]"));
                resolved += 1;
            }
        }
        (path, resolved)
    }

    pub fn is_key(&self, leaf: &str) -> bool {
        self.keys.iter().any(|k| k == leaf)
    }
}

/// What a model container resolves to.
pub(crate) enum Site<'a, 'input, 'c> {
    /// A container (or the model itself) with nothing below it.
    Container(String),
    List(ListSite<'a, 'input, 'c>),
}

pub(crate) fn sites<'a, 'input, 'c>(
    model: Node<'a, 'input>,
    base: &str,
    catalog: &'c KeyCatalog,
) -> Vec<Site<'a, 'input, 'c>> {
    if !xml::has_child_elements(model) {
        return vec![Site::Container(base.to_owned())];
    }

    let mut out = Vec::new();
    for child in xml::child_elements(model) {
        let path = format!("{base}/{}", xml::local_name(child));
        if catalog.is_list(&path) {
            out.push(Site::List(ListSite {
                node: child,
                container: None,
                keys: catalog.keys(&path),
                path,
            }));
            continue;
        }
        if !xml::has_child_elements(child) {
            out.push(Site::Container(path));
            continue;
        }
        for list in xml::child_elements(child) {
            let list_path = format!("{path}/{}", xml::local_name(list));
            out.push(Site::List(ListSite {
                node: list,
                container: Some(xml::local_name(child)),
                keys: catalog.keys(&list_path),
                path: list_path,
            }));
        }
    }
    out
}

/// Typed value of a leaf element.
///
/// `conversion="none"` on the leaf keeps its trimmed text verbatim;
/// otherwise the text is inferred and unquoted.
pub(crate) fn leaf_value(leaf: Node<'_, '_>) -> Value {
    let text = leaf.text().map_or("", str::trim);
    if xml::attribute(leaf, "conversion") == Some("none") {
        return Value::String(text.to_owned());
    }
    Value::infer(text).unquoted()
}
