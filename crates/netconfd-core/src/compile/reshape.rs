//! Store response → NETCONF `<data>` XML.
//!
//! The store answers a read with JSON rooted at `"module:node"`. Before it
//! becomes XML the response is re-rooted under the module, narrowed to the
//! requested leaves, re-nested under the inner container the store dropped,
//! and has list keys moved to the front of every entry.

use serde_json::{Map, Value as Json};

use super::GetRequest;
use crate::catalog::KeyCatalog;
use crate::xml::{Escaping, XmlBuilder};

/// Run every corrective pass and render the result.
///
/// `namespace` maps a module name to the XML namespace put on its element.
pub fn response_xml<'n>(
    response: Json,
    request: &GetRequest,
    catalog: &KeyCatalog,
    namespace: impl Fn(&str) -> Option<&'n str>,
) -> String {
    let mut json = normalize_root(response);
    filter_list(&mut json, request);
    promote(&mut json, request);
    order_keys(&mut json, &request.path, catalog);
    render(&json, namespace)
}

/// `{"m:n": v}` → `{"m": {"n": v}}`, or `{"m": v}` when `m == n`.
pub fn normalize_root(response: Json) -> Json {
    let Json::Object(root) = response else {
        return response;
    };

    let mut out = Map::new();
    for (key, value) in root {
        match key.split_once(':') {
            Some((module, name)) if module == name => {
                out.insert(module.to_owned(), value);
            }
            Some((module, name)) => {
                let mut inner = Map::new();
                inner.insert(name.to_owned(), value);
                out.insert(module.to_owned(), Json::Object(inner));
            }
            None => {
                out.insert(key, value);
            }
        }
    }
    Json::Object(out)
}

/// Drop every field outside `request.filters` from the targeted list's
/// entries. The list name is the last path segment, predicates removed.
pub fn filter_list(json: &mut Json, request: &GetRequest) {
    if request.filters.is_empty() {
        return;
    }
    let Some(list_name) = last_segment(&request.path) else {
        return;
    };
    let Json::Object(root) = json else {
        return;
    };

    for module in root.values_mut() {
        let Json::Object(module) = module else {
            continue;
        };
        for (name, list) in module.iter_mut() {
            if name.as_str() != list_name {
                continue;
            }
            let Json::Array(entries) = list else {
                continue;
            };
            for entry in entries {
                if let Json::Object(fields) = entry {
                    fields.retain(|field, _| request.filters.iter().any(|f| f == field));
                }
            }
        }
    }
}

/// Put a list the store returned directly under its module back under the
/// inner container: `{"m": {"L": [...]}}` → `{"m": {"C": {"L": [...]}}}`.
pub fn promote(json: &mut Json, request: &GetRequest) {
    let (Some(container), Some(list)) = (&request.container, &request.list) else {
        return;
    };
    let Some(module) = json.get_mut(request.module.as_str()) else {
        return;
    };
    let present = match module.get(list.as_str()) {
        Some(Json::Array(entries)) => !entries.is_empty(),
        Some(Json::Object(fields)) => !fields.is_empty(),
        Some(Json::Null) | None => false,
        Some(_) => true,
    };
    if !present {
        return;
    }
    let flattened = std::mem::take(module);
    let mut wrapper = Map::new();
    wrapper.insert(container.clone(), flattened);
    *module = Json::Object(wrapper);
}

/// Move catalog keys to the front of each entry of every list related to
/// `path`, in catalog order.
pub fn order_keys(json: &mut Json, path: &str, catalog: &KeyCatalog) {
    let bare = strip_predicates(path);
    for (list_path, keys) in catalog.table_for(path) {
        if !related(list_path, &bare) {
            continue;
        }
        let mut segments = list_path.split('/').skip(1);
        let Some(module) = segments
            .next()
            .and_then(|qualified| qualified.split(':').next())
        else {
            continue;
        };
        let rest: Vec<&str> = segments.collect();

        let mut node = json.get_mut(module);
        for segment in &rest {
            node = node.and_then(|n| n.get_mut(*segment));
        }
        match node {
            Some(Json::Array(entries)) => {
                for entry in entries {
                    if let Json::Object(fields) = entry {
                        rank_keys(fields, keys);
                    }
                }
            }
            Some(Json::Object(fields)) => rank_keys(fields, keys),
            _ => {}
        }
    }
}

/// Keys get negative ranks, `-n` for the first down to `-1` for the last;
/// every other field ranks 0 and keeps its position (the sort is stable).
fn rank_keys(fields: &mut Map<String, Json>, keys: &[String]) {
    let rank = |name: &str| -> i64 {
        keys.iter()
            .rev()
            .position(|k| k == name)
            .map_or(0, |pos| -i64::try_from(pos + 1).unwrap_or(i64::MAX))
    };
    let mut entries: Vec<(String, Json)> = std::mem::take(fields).into_iter().collect();
    entries.sort_by_key(|(name, _)| rank(name.as_str()));
    fields.extend(entries);
}

fn related(list_path: &str, path: &str) -> bool {
    list_path == path
        || list_path
            .strip_prefix(path)
            .is_some_and(|rest| rest.starts_with('/'))
        || path
            .strip_prefix(list_path)
            .is_some_and(|rest| rest.starts_with('/'))
}

fn strip_predicates(path: &str) -> String {
    let mut out = String::with_capacity(path.len());
    let mut depth = 0usize;
    for ch in path.chars() {
        match ch {
            '[' => depth += 1,
            ']' => depth = depth.saturating_sub(1),
            _ if depth == 0 => out.push(ch),
            _ => {}
        }
    }
    out
}

fn last_segment(path: &str) -> Option<&str> {
    let last = path.rsplit('/').next()?;
    let name = last.split('[').next()?;
    (!name.is_empty()).then_some(name)
}

// ── JSON → XML ───────────────────────────────────────────────────────

/// Render JSON as XML: objects nest, arrays repeat the element, scalars
/// become text. Module prefixes on nested names are dropped.
pub fn render<'n>(json: &Json, namespace: impl Fn(&str) -> Option<&'n str>) -> String {
    let mut builder = XmlBuilder::new(Escaping::Embedded);
    if let Json::Object(root) = json {
        for (name, value) in root {
            let local = local_part(name);
            match namespace(local) {
                Some(ns) => write_value(&mut builder, local, value, &[("xmlns", ns)]),
                None => write_value(&mut builder, local, value, &[]),
            }
        }
    }
    builder.finish()
}

fn write_value(builder: &mut XmlBuilder, name: &str, value: &Json, attrs: &[(&str, &str)]) {
    match value {
        Json::Array(items) => {
            for item in items {
                write_value(builder, name, item, attrs);
            }
        }
        Json::Object(fields) => {
            builder.open_with(name, attrs);
            for (child, child_value) in fields {
                write_value(builder, local_part(child), child_value, &[]);
            }
            builder.close(name);
        }
        Json::Null => {
            builder.open_with(name, attrs).close(name);
        }
        Json::String(text) => {
            builder.open_with(name, attrs).text(text).close(name);
        }
        Json::Number(n) => {
            builder.open_with(name, attrs).text(&n.to_string()).close(name);
        }
        Json::Bool(b) => {
            builder.open_with(name, attrs).text(&b.to_string()).close(name);
        }
    }
}

fn local_part(name: &str) -> &str {
    name.split_once(':').map_or(name, |(_, local)| local)
}
