use std::collections::BTreeMap;

use indexmap::IndexMap;
use roxmltree::Node;
use strum::{Display, EnumString};
use tracing::debug;

use super::{ListSite, Site, leaf_value, model_path, rpc::target_datastore, sites};
use crate::catalog::KeyCatalog;
use crate::error::CoreError;
use crate::value::{Value, ValueMap};
use crate::xml;

/// edit-config `operation` attribute values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum EditOperation {
    Merge,
    Create,
    Delete,
    Remove,
    Replace,
}

impl EditOperation {
    /// Pass order. Deletions run before anything is written.
    pub const ORDER: [Self; 5] = [
        Self::Delete,
        Self::Remove,
        Self::Merge,
        Self::Create,
        Self::Replace,
    ];

    /// Atomic passes emit one edit per list entry or leaf; the others emit
    /// one subtree per model container.
    pub fn is_atomic(self) -> bool {
        matches!(self, Self::Delete | Self::Remove)
    }
}

/// One unit of work for the datastore.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigEdit {
    pub path: String,
    pub operation: EditOperation,
    pub payload: ValueMap,
    /// Key predicates resolved into `path`.
    pub keys: usize,
}

/// Effective operation of a node: its own attribute, else the inherited one.
/// `None` is an unrecognised operation, which no pass picks up.
fn operation_of(node: Node<'_, '_>, inherited: Option<EditOperation>) -> Option<EditOperation> {
    match xml::attribute(node, "operation") {
        Some(op) => op.trim().parse().ok(),
        None => inherited,
    }
}

fn list_operation(list: &ListSite<'_, '_, '_>) -> Option<EditOperation> {
    operation_of(list.node, Some(EditOperation::Merge))
}

/// Compile an `<edit-config>` into datastore edits in execution order.
pub fn compile_edit(rpc: Node<'_, '_>, catalog: &KeyCatalog) -> Result<Vec<ConfigEdit>, CoreError> {
    if target_datastore(rpc)? != "running" {
        return Err(CoreError::TargetNotRunning);
    }
    let config = xml::find(rpc, "config").ok_or(CoreError::MissingElement { element: "config" })?;

    let mut edits = Vec::new();
    for op in EditOperation::ORDER {
        if op.is_atomic() {
            edits.extend(atomic_pass(config, op, catalog));
        } else {
            edits.extend(subtree_pass(config, op, catalog));
        }
    }
    debug!(count = edits.len(), "edit-config compiled");
    Ok(edits)
}

fn atomic_pass(config: Node<'_, '_>, op: EditOperation, catalog: &KeyCatalog) -> Vec<ConfigEdit> {
    let mut edits = Vec::new();
    for model in xml::child_elements(config) {
        let (module, base) = model_path(model);
        for site in sites(model, &base, catalog) {
            let Site::List(list) = site else {
                continue;
            };
            let list_op = list_operation(&list);
            let (path, keys) = list.keyed_path();

            if list_op == Some(op) {
                edits.push(ConfigEdit {
                    path: path.clone(),
                    operation: op,
                    payload: ValueMap::new(),
                    keys,
                });
            }

            for leaf in xml::child_elements(list.node) {
                let name = xml::local_name(leaf);
                if list.is_key(name) || operation_of(leaf, list_op) != Some(op) {
                    continue;
                }
                let mut payload = ValueMap::new();
                payload.insert(format!("{module}:{name}"), leaf_value(leaf));
                edits.push(ConfigEdit {
                    path: format!("{path}/{name}"),
                    operation: op,
                    payload,
                    keys,
                });
            }
        }
    }
    // Stable: list-level edits stay ahead of their own leaves.
    edits.sort_by(|a, b| b.keys.cmp(&a.keys));
    edits
}

/// Lists grouped under their inner container (`None` = directly under the
/// model), in document order.
type Grouped = IndexMap<Option<String>, IndexMap<String, Vec<Value>>>;

fn subtree_pass(config: Node<'_, '_>, op: EditOperation, catalog: &KeyCatalog) -> Vec<ConfigEdit> {
    let mut edits = Vec::new();
    for model in xml::child_elements(config) {
        let (module, base) = model_path(model);
        let mut grouped = Grouped::new();

        for site in sites(model, &base, catalog) {
            let Site::List(list) = site else {
                continue;
            };
            let item = list_item(&list, op);
            if item.is_empty() {
                continue;
            }
            grouped
                .entry(list.container.map(str::to_owned))
                .or_default()
                .entry(list.name().to_owned())
                .or_default()
                .push(Value::Map(item));
        }

        if grouped.is_empty() {
            continue;
        }
        let payload = match op {
            EditOperation::Replace => replace_payload(&module, xml::local_name(model), grouped),
            _ => merge_payload(&module, grouped),
        };
        edits.push(ConfigEdit {
            path: base,
            operation: op,
            payload,
            keys: 0,
        });
    }
    edits
}

/// Leaves of one list entry whose effective operation is `op`. Repeated
/// leaves (leaf-lists) collect into a list.
fn list_item(list: &ListSite<'_, '_, '_>, op: EditOperation) -> ValueMap {
    let list_op = list_operation(list);
    let mut repeated: BTreeMap<String, usize> = BTreeMap::new();
    let mut item = ValueMap::new();

    for leaf in xml::child_elements(list.node) {
        if operation_of(leaf, list_op) != Some(op) {
            continue;
        }
        let name = xml::local_name(leaf);
        if xml::has_child_elements(leaf) {
            debug!(leaf = name, list = list.name(), "skipping nested element in list entry");
            continue;
        }
        let value = leaf_value(leaf);
        let count = repeated.entry(name.to_owned()).or_insert(0);
        *count += 1;
        match item.get_mut(name) {
            Some(Value::List(values)) if *count > 2 => values.push(value),
            Some(existing) => {
                let first = std::mem::replace(existing, Value::List(Vec::new()));
                *existing = Value::List(vec![first, value]);
            }
            None => {
                item.insert(name.to_owned(), value);
            }
        }
    }
    item
}

/// `{"M:C": {L: [...]}}`, or `{"M:L": [...]}` for lists under the model.
fn merge_payload(module: &str, grouped: Grouped) -> ValueMap {
    let mut payload = ValueMap::new();
    for (container, lists) in grouped {
        match container {
            Some(container) => {
                let inner = lists
                    .into_iter()
                    .map(|(name, items)| (name, Value::List(items)))
                    .collect();
                payload.insert(format!("{module}:{container}"), Value::Map(inner));
            }
            None => {
                for (name, items) in lists {
                    payload.insert(format!("{module}:{name}"), Value::List(items));
                }
            }
        }
    }
    payload
}

/// `{"M:M": {C: {L: [...]}}}`.
fn replace_payload(module: &str, model: &str, grouped: Grouped) -> ValueMap {
    let mut body = ValueMap::new();
    for (container, lists) in grouped {
        let lists: ValueMap = lists
            .into_iter()
            .map(|(name, items)| (name, Value::List(items)))
            .collect();
        match container {
            Some(container) => {
                body.insert(container, Value::Map(lists));
            }
            None => body.extend(lists),
        }
    }
    let mut payload = ValueMap::new();
    payload.insert(format!("{module}:{model}"), Value::Map(body));
    payload
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::catalog::KeyTable;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn catalog() -> KeyCatalog {
        let mut sonic = KeyTable::new();
        sonic.insert("/sonic-port:sonic-port/PORT/PORT_LIST".into(), vec!["name".into()]);
        sonic.insert("/sonic-vlan:sonic-vlan/VLAN/VLAN_LIST".into(), vec!["name".into()]);
        sonic.insert(
            "/sonic-portchannel:sonic-portchannel/PORTCHANNEL_MEMBER/PORTCHANNEL_MEMBER_LIST".into(),
            vec!["name".into(), "ifname".into()],
        );
        KeyCatalog::new(sonic, KeyTable::new())
    }

    fn compile(body: &str) -> Result<Vec<ConfigEdit>, CoreError> {
        let text = format!(
            r#"<rpc message-id="3" xmlns="urn:ietf:params:xml:ns:netconf:base:1.0"
                    xmlns:nc="urn:ietf:params:xml:ns:netconf:base:1.0">
                 <edit-config><target><running/></target><config>{body}</config></edit-config>
               </rpc>"#
        );
        let doc = xml::parse(&text).unwrap();
        compile_edit(doc.root_element(), &catalog())
    }

    fn json_of(payload: &ValueMap) -> serde_json::Value {
        Value::Map(payload.clone()).to_json()
    }

    #[test]
    fn merge_is_grouped_per_model() {
        let edits = compile(
            r#"<sonic-port><PORT>
                 <PORT_LIST><name>Ethernet0</name><mtu>9100</mtu><description>"100"</description></PORT_LIST>
                 <PORT_LIST><name>Ethernet4</name><admin_status>up</admin_status></PORT_LIST>
               </PORT></sonic-port>"#,
        )
        .unwrap();

        assert_eq!(edits.len(), 1);
        assert_eq!(edits[0].path, "/sonic-port:sonic-port");
        assert_eq!(edits[0].operation, EditOperation::Merge);
        assert_eq!(
            json_of(&edits[0].payload),
            json!({ "sonic-port:PORT": { "PORT_LIST": [
                { "name": "Ethernet0", "mtu": 9100, "description": "100" },
                { "name": "Ethernet4", "admin_status": "up" }
            ]}})
        );
    }

    #[test]
    fn passes_run_in_fixed_order() {
        let edits = compile(
            r#"<sonic-vlan><VLAN>
                 <VLAN_LIST nc:operation="replace"><name>Vlan20</name></VLAN_LIST>
                 <VLAN_LIST nc:operation="create"><name>Vlan30</name></VLAN_LIST>
                 <VLAN_LIST><name>Vlan40</name></VLAN_LIST>
                 <VLAN_LIST nc:operation="remove"><name>Vlan50</name></VLAN_LIST>
                 <VLAN_LIST nc:operation="delete"><name>Vlan10</name></VLAN_LIST>
               </VLAN></sonic-vlan>"#,
        )
        .unwrap();

        let ops: Vec<_> = edits.iter().map(|e| e.operation).collect();
        assert_eq!(
            ops,
            [
                EditOperation::Delete,
                EditOperation::Remove,
                EditOperation::Merge,
                EditOperation::Create,
                EditOperation::Replace,
            ]
        );
        assert_eq!(edits[0].path, "/sonic-vlan:sonic-vlan/VLAN/VLAN_LIST[name=Vlan10]");
        assert_eq!(
            json_of(&edits[4].payload),
            json!({ "sonic-vlan:sonic-vlan": { "VLAN": { "VLAN_LIST": [{ "name": "Vlan20" }] } } })
        );
    }

    #[test]
    fn multi_key_list_delete_precedes_leaf_deletes() {
        let edits = compile(
            r#"<sonic-port><PORT><PORT_LIST>
                 <name>Ethernet0</name><mtu nc:operation="delete">9100</mtu>
               </PORT_LIST></PORT></sonic-port>
               <sonic-portchannel><PORTCHANNEL_MEMBER>
                 <PORTCHANNEL_MEMBER_LIST nc:operation="delete">
                   <name>PortChannel1</name><ifname>Ethernet8</ifname><admin>up</admin>
                 </PORTCHANNEL_MEMBER_LIST>
               </PORTCHANNEL_MEMBER></sonic-portchannel>"#,
        )
        .unwrap();

        let deletes: Vec<_> = edits
            .iter()
            .filter(|e| e.operation == EditOperation::Delete)
            .map(|e| (e.path.as_str(), e.keys))
            .collect();
        assert_eq!(
            deletes,
            [
                (
                    "/sonic-portchannel:sonic-portchannel/PORTCHANNEL_MEMBER/PORTCHANNEL_MEMBER_LIST[name=PortChannel1][ifname=Ethernet8]",
                    2
                ),
                (
                    "/sonic-portchannel:sonic-portchannel/PORTCHANNEL_MEMBER/PORTCHANNEL_MEMBER_LIST[name=PortChannel1][ifname=Ethernet8]/admin",
                    2
                ),
                ("/sonic-port:sonic-port/PORT/PORT_LIST[name=Ethernet0]/mtu", 1),
            ]
        );

        let leaf = edits.iter().find(|e| e.path.ends_with("/mtu")).unwrap();
        assert_eq!(json_of(&leaf.payload), json!({ "sonic-port:mtu": 9100 }));
    }

    #[test]
    fn conversion_none_keeps_raw_text() {
        let edits = compile(
            r#"<sonic-port><PORT><PORT_LIST>
                 <name>Ethernet0</name><speed conversion="none">100000</speed><fec>true</fec>
               </PORT_LIST></PORT></sonic-port>"#,
        )
        .unwrap();

        assert_eq!(
            json_of(&edits[0].payload),
            json!({ "sonic-port:PORT": { "PORT_LIST": [
                { "name": "Ethernet0", "speed": "100000", "fec": true }
            ]}})
        );
    }

    #[test]
    fn unknown_operation_is_ignored() {
        let edits = compile(
            r#"<sonic-vlan><VLAN><VLAN_LIST nc:operation="none"><name>Vlan10</name></VLAN_LIST></VLAN></sonic-vlan>"#,
        )
        .unwrap();
        assert!(edits.is_empty());
    }

    #[test]
    fn leaf_lists_collect() {
        let edits = compile(
            r#"<sonic-vlan><VLAN><VLAN_LIST>
                 <name>Vlan10</name><dhcp_servers>10.0.0.1</dhcp_servers>
                 <dhcp_servers>10.0.0.2</dhcp_servers><dhcp_servers>10.0.0.3</dhcp_servers>
               </VLAN_LIST></VLAN></sonic-vlan>"#,
        )
        .unwrap();
        assert_eq!(
            json_of(&edits[0].payload),
            json!({ "sonic-vlan:VLAN": { "VLAN_LIST": [
                { "name": "Vlan10", "dhcp_servers": ["10.0.0.1", "10.0.0.2", "10.0.0.3"] }
            ]}})
        );
    }

    #[test]
    fn target_must_be_running() {
        let doc = xml::parse(
            r#"<rpc message-id="3"><edit-config><target><candidate/></target><config/></edit-config></rpc>"#,
        )
        .unwrap();
        assert!(matches!(
            compile_edit(doc.root_element(), &catalog()),
            Err(CoreError::TargetNotRunning)
        ));

        let doc = xml::parse(r#"<rpc message-id="3"><edit-config><config/></edit-config></rpc>"#).unwrap();
        let err = compile_edit(doc.root_element(), &catalog()).unwrap_err();
        assert_eq!(err.to_string(), "target store unspecified");
    }
}
