pub mod engine;
pub mod errors;
pub mod guard;
pub mod loader;
pub mod menu;
pub mod normalize;
pub mod policy;
pub mod store;
pub mod tables;
pub mod types;
pub mod web;

use std::sync::Arc;

use guard::ComponentGate;
use menu::MenuNode;
use store::PermissionStore;
use tables::{AliasTable, PathModuleTable};

/// Static lookup tables, built in and optionally extended from KDL files.
/// Immutable after construction; changes require a service reload.
#[derive(Debug, Clone, Default)]
pub struct Tables {
    /// backend module name -> canonical module name
    pub aliases: AliasTable,
    /// route prefix -> module name, consulted by the route guard
    pub routes: PathModuleTable,
    /// console navigation, filtered per snapshot
    pub menu: Vec<MenuNode>,
}

impl Tables {
    pub fn builtin() -> Self {
        Self {
            aliases: AliasTable::builtin(),
            routes: PathModuleTable::builtin(),
            menu: menu::builtin_menu(),
        }
    }
}

/// Shared state of the permission API.
pub struct AuthzState {
    pub store: Arc<PermissionStore>,
    pub tables: Arc<Tables>,
    pub gate: Arc<ComponentGate>,
}
