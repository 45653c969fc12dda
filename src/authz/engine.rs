use crate::authz::store::PermissionSnapshot;
use crate::authz::types::Action;

/// Module that every signed-in operator may open.
pub const DASHBOARD_MODULE: &str = "dashboard";

/// Check whether the current operator may perform `action` on `module`.
///
/// Open while nothing is known yet: signed out, no module, the dashboard, or
/// still loading without any rows. Closed once the map is populated: a module
/// missing from it is denied, and so is an unrecognized action.
pub fn can_access(snapshot: &PermissionSnapshot, module: &str, action: &str) -> bool {
    if !snapshot.is_logged_in {
        return true;
    }

    let key = module.trim().to_lowercase();
    if key.is_empty() || key == DASHBOARD_MODULE {
        return true;
    }

    if snapshot.is_loading && snapshot.permissions.is_empty() {
        return true;
    }

    match snapshot.permission_map.get(&key) {
        Some(permission) => Action::parse(action)
            .map(|a| permission.allows(a))
            .unwrap_or(false),
        None => snapshot.permission_map.is_empty(),
    }
}
