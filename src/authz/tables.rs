use std::collections::HashMap;

/// Backend module name -> canonical console module key, as shipped.
/// Backend naming drifts; absorb it here rather than in callers.
pub const BUILTIN_ALIASES: &[(&str, &str)] = &[
    ("Service Contract", "Contracts"),
    ("Contract", "Contracts"),
    ("Invoice", "Invoices"),
    ("Tax Master", "Tax"),
    ("Stock Transfer", "StockTransfer"),
    ("Attendance Report", "Attendance"),
    ("Employee", "Employees"),
    ("HR Report", "HrReports"),
    ("Customer", "Customers"),
    ("Work Order", "WorkOrders"),
    ("User Role", "Roles"),
    ("User Privilege", "Privileges"),
];

/// Console route prefix -> module name, as shipped.
pub const BUILTIN_ROUTES: &[(&str, &str)] = &[
    ("/admin/dashboard", "dashboard"),
    ("/admin/contracts", "Contracts"),
    ("/admin/invoices", "Invoices"),
    ("/admin/tax", "Tax"),
    ("/admin/stock-transfer", "StockTransfer"),
    ("/admin/attendance", "Attendance"),
    ("/admin/hr-reports", "HrReports"),
    ("/admin/employees", "Employees"),
    ("/admin/customers", "Customers"),
    ("/admin/work-orders", "WorkOrders"),
    ("/admin/roles", "Roles"),
    ("/admin/privileges", "Privileges"),
];

/// Read-only mapping from backend module names to canonical names.
/// Unmapped names resolve to themselves.
#[derive(Debug, Clone, Default)]
pub struct AliasTable {
    entries: HashMap<String, String>,
}

impl AliasTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn builtin() -> Self {
        let mut table = Self::new();
        for (backend, canonical) in BUILTIN_ALIASES {
            table.insert(backend, canonical);
        }
        table
    }

    pub fn insert(&mut self, backend: &str, canonical: &str) {
        self.entries
            .insert(backend.trim().to_string(), canonical.trim().to_string());
    }

    /// Canonical name for `backend`, or `backend` itself when unmapped.
    pub fn resolve<'a>(&'a self, backend: &'a str) -> &'a str {
        self.entries
            .get(backend.trim())
            .map(|s| s.as_str())
            .unwrap_or(backend)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Route prefix -> module table consulted by the route guard.
///
/// Entries are kept ordered longest prefix first, so the first match is also
/// the longest match.
#[derive(Debug, Clone, Default)]
pub struct PathModuleTable {
    entries: Vec<(String, String)>,
}

impl PathModuleTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn builtin() -> Self {
        let mut table = Self::new();
        for (prefix, module) in BUILTIN_ROUTES {
            table.insert(prefix, module);
        }
        table
    }

    /// Insert or replace the module for `prefix`.
    pub fn insert(&mut self, prefix: &str, module: &str) {
        let prefix = prefix.trim().to_string();
        let module = module.trim().to_string();
        if let Some(entry) = self.entries.iter_mut().find(|(p, _)| *p == prefix) {
            entry.1 = module;
        } else {
            self.entries.push((prefix, module));
        }
        self.entries
            .sort_by(|(a, _), (b, _)| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));
    }

    /// Module for an already locale-stripped path.
    pub fn resolve(&self, path: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(prefix, _)| path.starts_with(prefix.as_str()))
            .map(|(_, module)| module.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Strip a leading two-letter locale segment: `/en/admin/tax` -> `/admin/tax`.
pub fn strip_locale(path: &str) -> &str {
    let Some(rest) = path.strip_prefix('/') else {
        return path;
    };
    let (segment, tail) = match rest.find('/') {
        Some(idx) => (&rest[..idx], &rest[idx..]),
        None => (rest, ""),
    };
    if segment.len() == 2 && segment.chars().all(|c| c.is_ascii_alphabetic()) {
        if tail.is_empty() {
            "/"
        } else {
            tail
        }
    } else {
        path
    }
}
