use std::path::Path;

use crate::authz::errors::AuthzError;
use crate::authz::menu::MenuNode;
use crate::authz::policy::parse_kdl_document;
use crate::authz::types::*;
use crate::authz::Tables;

/// Load all `.kdl` table files from the given directory and merge them over
/// the built-in tables.
pub fn load_tables(dir: &Path) -> Result<Tables, AuthzError> {
    if !dir.is_dir() {
        return Err(AuthzError::InvalidTable(format!(
            "tables directory `{}` does not exist or is not a directory",
            dir.display()
        )));
    }

    let mut all_parsed = Vec::new();
    let mut file_count = 0;

    let mut entries: Vec<_> = std::fs::read_dir(dir)?
        .filter_map(|e| e.ok())
        .filter(|e| {
            e.path()
                .extension()
                .map(|ext| ext == "kdl")
                .unwrap_or(false)
        })
        .collect();
    entries.sort_by_key(|e| e.path());

    for entry in entries {
        let path = entry.path();
        let contents =
            std::fs::read_to_string(&path).map_err(|source| AuthzError::TableLoadError {
                path: path.display().to_string(),
                source,
            })?;
        let parsed = parse_kdl_document(&contents)?;
        all_parsed.push(parsed);
        file_count += 1;
    }

    let tables = compile_tables(all_parsed);

    tracing::info!(
        files = file_count,
        aliases = tables.aliases.len(),
        routes = tables.routes.len(),
        menu_sections = tables.menu.len(),
        "Loaded permission tables"
    );

    Ok(tables)
}

/// Merge parsed files, in order, over the built-in tables.
///
/// Aliases and routes override per key. A top-level menu section replaces the
/// built-in section with the same label, or is appended.
pub fn compile_tables(parsed: Vec<ParsedTables>) -> Tables {
    let mut tables = Tables::builtin();

    for p in parsed {
        for alias in p.aliases {
            tables.aliases.insert(&alias.backend, &alias.canonical);
        }
        for route in p.routes {
            tables.routes.insert(&route.prefix, &route.module);
        }
        for node in p.menu {
            merge_menu_node(&mut tables.menu, node);
        }
    }

    tables
}

fn node_label(node: &MenuNode) -> &str {
    match node {
        MenuNode::Item(item) => &item.label,
        MenuNode::Submenu(section) | MenuNode::Group(section) => &section.label,
    }
}

fn merge_menu_node(menu: &mut Vec<MenuNode>, node: MenuNode) {
    match menu.iter_mut().find(|n| node_label(n) == node_label(&node)) {
        Some(existing) => *existing = node,
        None => menu.push(node),
    }
}
