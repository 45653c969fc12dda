use std::sync::Arc;

use serde_json::{Map, Value};

use crate::authz::tables::AliasTable;
use crate::authz::types::{CanonicalPermission, PermissionMap};

const NAME_FIELDS: &[&str] = &["module_name", "module", "name"];
const VIEW_FIELDS: &[&str] = &["is_read", "view", "can_view", "read"];
const CREATE_FIELDS: &[&str] = &["is_create", "create", "can_create"];
const UPDATE_FIELDS: &[&str] = &["is_update", "update", "can_update", "edit", "can_edit"];
const DELETE_FIELDS: &[&str] = &["is_delete", "delete", "can_delete"];

/// Boolean-ish coercion: `true`, `"true"`, `1` and `"1"` are true, anything else is false.
pub fn coerce_bool(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64() == Some(1.0),
        Value::String(s) => s == "true" || s == "1",
        _ => false,
    }
}

/// First field in `fields` that is present and not null.
fn first_defined<'a>(record: &'a Map<String, Value>, fields: &[&str]) -> Option<&'a Value> {
    fields
        .iter()
        .filter_map(|f| record.get(*f))
        .find(|v| !v.is_null())
}

fn capability(record: &Map<String, Value>, fields: &[&str]) -> bool {
    first_defined(record, fields).map(coerce_bool).unwrap_or(false)
}

/// Backend module name of a record, trimmed. `None` when no field yields a non-empty string.
pub fn backend_name(record: &Map<String, Value>) -> Option<&str> {
    NAME_FIELDS
        .iter()
        .filter_map(|f| record.get(*f).and_then(|v| v.as_str()))
        .map(str::trim)
        .find(|s| !s.is_empty())
}

fn map_key(name: &str) -> String {
    name.trim().to_lowercase()
}

/// Map insertions for one privilege record.
///
/// The canonical key always comes first. When the alias table renamed the
/// module, the backend name is inserted too, pointing at the same permission.
pub fn entries_for(record: &Value, aliases: &AliasTable) -> Vec<(String, Arc<CanonicalPermission>)> {
    let Some(fields) = record.as_object() else {
        return Vec::new();
    };
    let Some(backend) = backend_name(fields) else {
        return Vec::new();
    };
    let canonical = aliases.resolve(backend);

    let permission = Arc::new(CanonicalPermission {
        view: capability(fields, VIEW_FIELDS),
        create: capability(fields, CREATE_FIELDS),
        update: capability(fields, UPDATE_FIELDS),
        delete: capability(fields, DELETE_FIELDS),
        record: record.clone(),
    });

    let mut entries = vec![(map_key(canonical), Arc::clone(&permission))];
    if canonical != backend {
        entries.push((map_key(backend), permission));
    }
    entries
}

/// Build the lookup map for a list of privilege records. Later records win on key collisions.
pub fn normalize(records: &[Value], aliases: &AliasTable) -> PermissionMap {
    let mut map = PermissionMap::new();
    for record in records {
        let entries = entries_for(record, aliases);
        if entries.is_empty() {
            tracing::debug!(?record, "skipping privilege record without a module name");
        }
        map.extend(entries);
    }
    map
}
