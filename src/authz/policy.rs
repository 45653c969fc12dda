use crate::authz::errors::AuthzError;
use crate::authz::menu::{MenuItem, MenuNode, MenuSection};
use crate::authz::types::*;
use kdl::KdlDocument;

/// Parse a KDL document string into alias, route and menu tables.
pub fn parse_kdl_document(source: &str) -> Result<ParsedTables, AuthzError> {
    let doc: KdlDocument = source
        .parse()
        .map_err(|e: kdl::KdlError| AuthzError::KdlParse(e.to_string()))?;

    let mut tables = ParsedTables::default();

    for node in doc.nodes() {
        match node.name().value() {
            "alias" => {
                let backend = first_string_arg(node).ok_or_else(|| {
                    AuthzError::InvalidTable(
                        "alias node requires a backend name (e.g. alias \"Tax Master\" to=\"Tax\")"
                            .into(),
                    )
                })?;
                let canonical = string_prop(node, "to").ok_or_else(|| {
                    AuthzError::InvalidTable(format!(
                        "alias `{backend}` missing `to` property (e.g. to=\"Tax\")"
                    ))
                })?;
                tables.aliases.push(AliasEntry { backend, canonical });
            }
            "route" => {
                let prefix = first_string_arg(node).ok_or_else(|| {
                    AuthzError::InvalidTable(
                        "route node requires a path prefix (e.g. route \"/admin/tax\" module=\"Tax\")"
                            .into(),
                    )
                })?;
                if !prefix.starts_with('/') {
                    return Err(AuthzError::InvalidTable(format!(
                        "route prefix `{prefix}` must start with `/`"
                    )));
                }
                let module = string_prop(node, "module").ok_or_else(|| {
                    AuthzError::InvalidTable(format!(
                        "route `{prefix}` missing `module` property (e.g. module=\"Tax\")"
                    ))
                })?;
                tables.routes.push(RouteEntry { prefix, module });
            }
            "menu" => {
                tables.menu.push(MenuNode::Group(parse_section(node)?));
            }
            other => {
                // Ignore comments and unknown top-level nodes with a warning
                tracing::warn!("ignoring unknown top-level KDL node `{other}`");
            }
        }
    }

    Ok(tables)
}

fn parse_section(node: &kdl::KdlNode) -> Result<MenuSection, AuthzError> {
    let kind = node.name().value();
    let label = first_string_arg(node).ok_or_else(|| {
        AuthzError::InvalidTable(format!(
            "{kind} node requires a label (e.g. {kind} \"Finance\" {{ ... }})"
        ))
    })?;

    let mut section = MenuSection::new(&label, Vec::new());

    if let Some(children) = node.children() {
        for child in children.nodes() {
            match child.name().value() {
                "modules" => {
                    section.modules = dash_list(child);
                }
                "item" => {
                    section.children.push(MenuNode::Item(parse_item(child)?));
                }
                "submenu" => {
                    section.children.push(MenuNode::Submenu(parse_section(child)?));
                }
                "group" => {
                    section.children.push(MenuNode::Group(parse_section(child)?));
                }
                other => {
                    return Err(AuthzError::InvalidTable(format!(
                        "unexpected child `{other}` in {kind} `{label}` (expected `item`, `submenu`, `group` or `modules`)"
                    )));
                }
            }
        }
    }

    Ok(section)
}

fn parse_item(node: &kdl::KdlNode) -> Result<MenuItem, AuthzError> {
    let label = first_string_arg(node).ok_or_else(|| {
        AuthzError::InvalidTable(
            "item node requires a label (e.g. item \"Invoices\" module=\"Invoices\")".into(),
        )
    })?;

    let action = match string_prop(node, "action") {
        Some(raw) => Action::parse(&raw).ok_or_else(|| {
            AuthzError::InvalidTable(format!(
                "item `{label}` has unknown action `{raw}` (expected view, create, update or delete)"
            ))
        })?,
        None => Action::View,
    };

    let mut item = MenuItem::new(
        &label,
        string_prop(node, "module").as_deref(),
        string_prop(node, "path").as_deref(),
    );
    item.action = action;
    Ok(item)
}

/// Extract the first string argument from a KDL node.
fn first_string_arg(node: &kdl::KdlNode) -> Option<String> {
    node.entries()
        .iter()
        .find(|e| e.name().is_none())
        .and_then(|e| e.value().as_string())
        .map(|s| s.to_string())
}

fn string_prop(node: &kdl::KdlNode, key: &str) -> Option<String> {
    node.get(key)
        .and_then(|v| v.as_string())
        .map(|s| s.to_string())
}

/// Extract dash-list children: nodes named "-" whose first argument is a string.
/// Example KDL:
/// ```kdl
/// modules {
///     - "Roles"
///     - "Privileges"
/// }
/// ```
fn dash_list(node: &kdl::KdlNode) -> Vec<String> {
    let Some(children) = node.children() else {
        return Vec::new();
    };
    children
        .nodes()
        .iter()
        .filter(|n| n.name().value() == "-")
        .filter_map(first_string_arg)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_alias() {
        let kdl = r#"
alias "Service Contract" to="Contracts"
alias "Tax Master" to="Tax"
"#;
        let tables = parse_kdl_document(kdl).unwrap();
        assert_eq!(
            tables.aliases,
            vec![
                AliasEntry {
                    backend: "Service Contract".into(),
                    canonical: "Contracts".into()
                },
                AliasEntry {
                    backend: "Tax Master".into(),
                    canonical: "Tax".into()
                },
            ]
        );
    }

    #[test]
    fn test_parse_route() {
        let kdl = r#"route "/admin/tax" module="Tax""#;
        let tables = parse_kdl_document(kdl).unwrap();
        assert_eq!(
            tables.routes,
            vec![RouteEntry {
                prefix: "/admin/tax".into(),
                module: "Tax".into()
            }]
        );
    }

    #[test]
    fn test_parse_menu() {
        let kdl = r#"
menu "Finance" {
    item "Invoices" module="Invoices" path="/admin/invoices"
    item "New invoice" module="Invoices" action="create"
    submenu "Tax" {
        modules {
            - "Tax"
        }
        item "Tax codes" module="Tax" path="/admin/tax"
    }
}
"#;
        let tables = parse_kdl_document(kdl).unwrap();
        assert_eq!(tables.menu.len(), 1);
        let MenuNode::Group(finance) = &tables.menu[0] else {
            panic!("expected a group");
        };
        assert_eq!(finance.label, "Finance");
        assert_eq!(finance.children.len(), 3);

        let MenuNode::Item(new_invoice) = &finance.children[1] else {
            panic!("expected an item");
        };
        assert_eq!(new_invoice.action, Action::Create);
        assert!(new_invoice.path.is_none());

        let MenuNode::Submenu(tax) = &finance.children[2] else {
            panic!("expected a submenu");
        };
        assert_eq!(tax.modules, vec!["Tax"]);
        assert_eq!(tax.children.len(), 1);
    }

    #[test]
    fn test_parse_missing_alias_target() {
        let err = parse_kdl_document(r#"alias "Invoice""#).unwrap_err();
        assert!(matches!(err, AuthzError::InvalidTable(_)));
    }

    #[test]
    fn test_parse_relative_route() {
        let err = parse_kdl_document(r#"route "admin/tax" module="Tax""#).unwrap_err();
        assert!(matches!(err, AuthzError::InvalidTable(_)));
    }

    #[test]
    fn test_parse_unknown_action() {
        let kdl = r#"
menu "Finance" {
    item "Invoices" module="Invoices" action="approve"
}
"#;
        let err = parse_kdl_document(kdl).unwrap_err();
        assert!(matches!(err, AuthzError::InvalidTable(_)));
    }

    #[test]
    fn test_parse_unknown_node_ignored() {
        let tables = parse_kdl_document(r#"theme "dark""#).unwrap();
        assert!(tables.aliases.is_empty());
        assert!(tables.routes.is_empty());
        assert!(tables.menu.is_empty());
    }

    #[test]
    fn test_parse_syntax_error() {
        let err = parse_kdl_document(r#"alias "unterminated"#).unwrap_err();
        assert!(matches!(err, AuthzError::KdlParse(_)));
    }
}
