//! Menu visibility.
//!
//! Items hide individually; submenus and groups hide as a whole when nothing
//! inside them is reachable. Nothing is cached: every call evaluates against
//! the snapshot it is given.
use serde::Serialize;

use crate::authz::store::PermissionSnapshot;
use crate::authz::types::Action;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MenuItem {
    pub label: String,
    /// Unset means the entry is always shown
    #[serde(skip_serializing_if = "Option::is_none")]
    pub module: Option<String>,
    pub action: Action,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

/// A collapsible submenu, or a section header block (`Group`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MenuSection {
    pub label: String,
    /// Explicit modules deciding visibility. Empty: decided by the children.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub modules: Vec<String>,
    pub children: Vec<MenuNode>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MenuNode {
    Item(MenuItem),
    Submenu(MenuSection),
    Group(MenuSection),
}

impl MenuItem {
    pub fn new(label: &str, module: Option<&str>, path: Option<&str>) -> Self {
        Self {
            label: label.to_string(),
            module: module.map(str::to_string),
            action: Action::View,
            path: path.map(str::to_string),
        }
    }
}

impl MenuSection {
    pub fn new(label: &str, children: Vec<MenuNode>) -> Self {
        Self {
            label: label.to_string(),
            modules: Vec::new(),
            children,
        }
    }

    pub fn with_modules(mut self, modules: &[&str]) -> Self {
        self.modules = modules.iter().map(|m| m.to_string()).collect();
        self
    }
}

/// Item-level check.
pub fn item_visible(snapshot: &PermissionSnapshot, item: &MenuItem) -> bool {
    snapshot.can_access(item.module.as_deref().unwrap_or(""), item.action.as_str())
}

/// Submenu/group check: any explicit module, else any visible child.
pub fn section_visible(snapshot: &PermissionSnapshot, section: &MenuSection) -> bool {
    if !section.modules.is_empty() {
        return section
            .modules
            .iter()
            .any(|m| snapshot.can_access(m, Action::View.as_str()));
    }
    section.children.iter().any(|c| node_visible(snapshot, c))
}

pub fn node_visible(snapshot: &PermissionSnapshot, node: &MenuNode) -> bool {
    match node {
        MenuNode::Item(item) => item_visible(snapshot, item),
        MenuNode::Submenu(section) | MenuNode::Group(section) => section_visible(snapshot, section),
    }
}

/// The menu tree with every hidden node removed.
pub fn visible_menu(snapshot: &PermissionSnapshot, nodes: &[MenuNode]) -> Vec<MenuNode> {
    nodes
        .iter()
        .filter(|n| node_visible(snapshot, n))
        .map(|n| match n {
            MenuNode::Item(item) => MenuNode::Item(item.clone()),
            MenuNode::Submenu(section) => MenuNode::Submenu(filter_section(snapshot, section)),
            MenuNode::Group(section) => MenuNode::Group(filter_section(snapshot, section)),
        })
        .collect()
}

fn filter_section(snapshot: &PermissionSnapshot, section: &MenuSection) -> MenuSection {
    MenuSection {
        label: section.label.clone(),
        modules: section.modules.clone(),
        children: visible_menu(snapshot, &section.children),
    }
}

/// Default console navigation.
pub fn builtin_menu() -> Vec<MenuNode> {
    use MenuNode::{Group, Item, Submenu};

    vec![
        Item(MenuItem::new(
            "Dashboard",
            Some("dashboard"),
            Some("/admin/dashboard"),
        )),
        Group(MenuSection::new(
            "Operations",
            vec![
                Item(MenuItem::new(
                    "Contracts",
                    Some("Contracts"),
                    Some("/admin/contracts"),
                )),
                Item(MenuItem::new(
                    "Work orders",
                    Some("WorkOrders"),
                    Some("/admin/work-orders"),
                )),
                Item(MenuItem::new(
                    "Customers",
                    Some("Customers"),
                    Some("/admin/customers"),
                )),
            ],
        )),
        Group(MenuSection::new(
            "Finance",
            vec![
                Item(MenuItem::new(
                    "Invoices",
                    Some("Invoices"),
                    Some("/admin/invoices"),
                )),
                Item(MenuItem::new("Tax", Some("Tax"), Some("/admin/tax"))),
            ],
        )),
        Group(MenuSection::new(
            "Inventory",
            vec![Item(MenuItem::new(
                "Stock transfer",
                Some("StockTransfer"),
                Some("/admin/stock-transfer"),
            ))],
        )),
        Group(MenuSection::new(
            "People",
            vec![
                Item(MenuItem::new(
                    "Employees",
                    Some("Employees"),
                    Some("/admin/employees"),
                )),
                Item(MenuItem::new(
                    "Attendance",
                    Some("Attendance"),
                    Some("/admin/attendance"),
                )),
                Submenu(
                    MenuSection::new(
                        "Reports",
                        vec![Item(MenuItem::new(
                            "HR reports",
                            Some("HrReports"),
                            Some("/admin/hr-reports"),
                        ))],
                    )
                    .with_modules(&["HrReports", "Attendance"]),
                ),
            ],
        )),
        Group(
            MenuSection::new(
                "Administration",
                vec![
                    Item(MenuItem::new("Roles", Some("Roles"), Some("/admin/roles"))),
                    Item(MenuItem::new(
                        "Privileges",
                        Some("Privileges"),
                        Some("/admin/privileges"),
                    )),
                ],
            )
            .with_modules(&["Roles", "Privileges"]),
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::authz::normalize::normalize;
    use crate::authz::tables::AliasTable;
    use serde_json::{json, Value};
    use std::sync::Arc;

    fn snapshot(records: Vec<Value>) -> PermissionSnapshot {
        let map = normalize(&records, &AliasTable::new());
        PermissionSnapshot {
            permissions: Arc::new(records),
            permission_map: Arc::new(map),
            is_loading: false,
            is_logged_in: true,
            generation: 1,
        }
    }

    fn item(module: &str) -> MenuNode {
        MenuNode::Item(MenuItem::new(module, Some(module), None))
    }

    #[test]
    fn test_submenu_explicit_modules() {
        let section = MenuSection::new("AB", vec![item("C")]).with_modules(&["A", "B"]);

        let only_b = snapshot(vec![
            json!({ "module_name": "B", "is_read": true }),
            json!({ "module_name": "C", "is_read": true }),
        ]);
        assert!(section_visible(&only_b, &section));

        let only_c = snapshot(vec![json!({ "module_name": "C", "is_read": true })]);
        assert!(!section_visible(&only_c, &section));
    }

    #[test]
    fn test_submenu_from_children() {
        let section = MenuSection::new("AB", vec![item("A"), item("B")]);

        let a = snapshot(vec![json!({ "module_name": "A", "is_read": true })]);
        assert!(section_visible(&a, &section));

        let none = snapshot(vec![json!({ "module_name": "A", "is_read": false })]);
        assert!(!section_visible(&none, &section));
    }

    #[test]
    fn test_item_uses_action() {
        let s = snapshot(vec![json!({ "module_name": "Tax", "is_read": true })]);
        let mut entry = MenuItem::new("New tax code", Some("Tax"), None);
        assert!(item_visible(&s, &entry));
        entry.action = Action::Create;
        assert!(!item_visible(&s, &entry));
    }

    #[test]
    fn test_visible_menu_prunes() {
        let s = snapshot(vec![
            json!({ "module_name": "Invoices", "is_read": true }),
            json!({ "module_name": "Roles", "is_read": false }),
        ]);
        let menu = visible_menu(&s, &builtin_menu());
        let labels: Vec<_> = menu
            .iter()
            .map(|n| match n {
                MenuNode::Item(i) => i.label.as_str(),
                MenuNode::Submenu(s) | MenuNode::Group(s) => s.label.as_str(),
            })
            .collect();
        assert_eq!(labels, vec!["Dashboard", "Finance"]);

        let MenuNode::Group(finance) = &menu[1] else {
            panic!("expected a group");
        };
        assert_eq!(finance.children.len(), 1);
    }

    #[test]
    fn test_everything_visible_while_loading() {
        let s = PermissionSnapshot {
            is_loading: true,
            is_logged_in: true,
            ..Default::default()
        };
        assert_eq!(visible_menu(&s, &builtin_menu()), builtin_menu());
    }
}
