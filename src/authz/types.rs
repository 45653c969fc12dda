use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use crate::authz::menu::MenuNode;

/// Capability within a module. `edit` is accepted as a synonym of `update`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    #[default]
    View,
    Create,
    Update,
    Delete,
}

impl Action {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "view" => Some(Action::View),
            "create" => Some(Action::Create),
            "update" | "edit" => Some(Action::Update),
            "delete" => Some(Action::Delete),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Action::View => "view",
            Action::Create => "create",
            Action::Update => "update",
            Action::Delete => "delete",
        }
    }
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The four booleans of a module, without the raw record.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capabilities {
    pub view: bool,
    pub create: bool,
    pub update: bool,
    pub delete: bool,
}

/// Normalized privileges for one module, computed once per fetch cycle.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CanonicalPermission {
    pub view: bool,
    pub create: bool,
    pub update: bool,
    pub delete: bool,
    /// The privilege record exactly as the backend reported it
    pub record: Value,
}

impl CanonicalPermission {
    pub fn allows(&self, action: Action) -> bool {
        match action {
            Action::View => self.view,
            Action::Create => self.create,
            Action::Update => self.update,
            Action::Delete => self.delete,
        }
    }

    pub fn capabilities(&self) -> Capabilities {
        Capabilities {
            view: self.view,
            create: self.create,
            update: self.update,
            delete: self.delete,
        }
    }
}

/// lower-cased module key -> permission. Alias and canonical keys share the same `Arc`.
pub type PermissionMap = HashMap<String, Arc<CanonicalPermission>>;

// ---------- API request/response types ----------

#[derive(Debug, Deserialize)]
pub struct CheckRequest {
    /// e.g. "Invoices"
    pub module: String,
    /// view | create | update | edit | delete
    #[serde(default = "default_action")]
    pub action: String,
}

fn default_action() -> String {
    Action::View.as_str().to_string()
}

#[derive(Debug, Serialize)]
pub struct CheckResponse {
    pub allowed: bool,
}

#[derive(Debug, Deserialize)]
pub struct GuardRequest {
    /// Module name; absent means the subtree is public
    #[serde(default)]
    pub permission: Option<String>,
    #[serde(default)]
    pub action: Option<String>,
    /// Where to send the operator on denial
    #[serde(default)]
    pub fallback: Option<String>,
}

#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct GuardResponse {
    /// "render" or "redirect"
    pub outcome: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub redirect_to: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SnapshotResponse {
    pub is_logged_in: bool,
    pub is_loading: bool,
    pub generation: u64,
    pub modules: BTreeMap<String, Capabilities>,
}

#[derive(Debug, Serialize)]
pub struct SignalResponse {
    pub signal: &'static str,
    pub accepted: bool,
}

#[derive(Debug, Serialize)]
pub struct MenuResponse {
    pub menu: Vec<MenuNode>,
}

// ---------- Table domain types ----------

/// `alias "Service Contract" to="Contracts"`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AliasEntry {
    pub backend: String,
    pub canonical: String,
}

/// `route "/admin/tax" module="Tax"`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteEntry {
    pub prefix: String,
    pub module: String,
}

/// Intermediate result from parsing a single KDL table file.
#[derive(Debug, Clone, Default)]
pub struct ParsedTables {
    pub aliases: Vec<AliasEntry>,
    pub routes: Vec<RouteEntry>,
    pub menu: Vec<MenuNode>,
}
