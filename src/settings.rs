use miette::{IntoDiagnostic, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Settings {
    pub server: Server,
    pub backend: Backend,
    pub identity: Identity,
    pub guard: Guard,
    pub console: Console,
    #[serde(default)]
    pub authz: Authz,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Server {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Backend {
    /// Console REST backend, e.g. https://api.example.com
    pub base_url: String,
    /// Applied by the HTTP client to every backend call
    pub timeout_secs: u64,
    /// Employee detail path; `{id}` is replaced with the user id
    pub employee_path: String,
    /// Role privilege list path; `{role_id}` is replaced with the role id
    pub privileges_path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Identity {
    /// JSON file the login flow writes for the signed-in operator
    pub marker_path: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Guard {
    /// Where the route guard sends denied navigations
    pub not_authorized_path: String,
    /// Fallback for denied component guards
    pub fallback_path: String,
    /// Turn component guard enforcement off. Route guarding stays on.
    #[serde(default)]
    pub enforcement_disabled: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Console {
    /// Built console bundle served behind the route guard
    pub assets_dir: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Authz {
    /// Directory of `.kdl` table files merged over the built-in tables
    pub tables_dir: Option<PathBuf>,
}

impl Default for Server {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8090,
        }
    }
}

impl Default for Backend {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8000".to_string(),
            timeout_secs: 15,
            employee_path: "api/employees/{id}/".to_string(),
            privileges_path: "api/user-privileges/?role_id={role_id}".to_string(),
        }
    }
}

impl Default for Identity {
    fn default() -> Self {
        Self {
            marker_path: PathBuf::from("data/current_user.json"),
        }
    }
}

impl Default for Guard {
    fn default() -> Self {
        Self {
            not_authorized_path: "/not-authorized".to_string(),
            fallback_path: "/admin/dashboard".to_string(),
            enforcement_disabled: false,
        }
    }
}

impl Default for Console {
    fn default() -> Self {
        Self {
            assets_dir: PathBuf::from("console"),
        }
    }
}

impl Settings {
    pub fn load(path: &str) -> Result<Self> {
        let backend = Backend::default();
        let guard = Guard::default();
        let mut builder = config::Config::builder()
            .set_default("server.host", Server::default().host)
            .into_diagnostic()?
            .set_default("server.port", Server::default().port)
            .into_diagnostic()?
            .set_default("backend.base_url", backend.base_url)
            .into_diagnostic()?
            .set_default("backend.timeout_secs", backend.timeout_secs)
            .into_diagnostic()?
            .set_default("backend.employee_path", backend.employee_path)
            .into_diagnostic()?
            .set_default("backend.privileges_path", backend.privileges_path)
            .into_diagnostic()?
            .set_default(
                "identity.marker_path",
                Identity::default().marker_path.to_string_lossy().to_string(),
            )
            .into_diagnostic()?
            .set_default("guard.not_authorized_path", guard.not_authorized_path)
            .into_diagnostic()?
            .set_default("guard.fallback_path", guard.fallback_path)
            .into_diagnostic()?
            .set_default("guard.enforcement_disabled", guard.enforcement_disabled)
            .into_diagnostic()?
            .set_default(
                "console.assets_dir",
                Console::default().assets_dir.to_string_lossy().to_string(),
            )
            .into_diagnostic()?;

        // Optional file
        if Path::new(path).exists() {
            builder = builder.add_source(config::File::with_name(path));
        }

        // Environment overrides: GATEHOUSE__SERVER__PORT=9090, etc.
        builder = builder.add_source(config::Environment::with_prefix("GATEHOUSE").separator("__"));

        let cfg = builder.build().into_diagnostic()?;
        let mut s: Settings = cfg.try_deserialize().into_diagnostic()?;

        // Normalize paths to be relative to current dir
        let cwd = std::env::current_dir().into_diagnostic()?;
        if s.identity.marker_path.is_relative() {
            s.identity.marker_path = cwd.join(&s.identity.marker_path);
        }
        if s.console.assets_dir.is_relative() {
            s.console.assets_dir = cwd.join(&s.console.assets_dir);
        }
        if let Some(dir) = s.authz.tables_dir.as_mut() {
            if dir.is_relative() {
                *dir = cwd.join(&*dir);
            }
        }

        Ok(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_settings_load_defaults() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let config_path = temp_dir.path().join("nonexistent.toml");

        let settings =
            Settings::load(config_path.to_str().unwrap()).expect("Failed to load settings");

        assert_eq!(settings.server.host, "127.0.0.1");
        assert_eq!(settings.backend.timeout_secs, 15);
        assert_eq!(settings.guard.not_authorized_path, "/not-authorized");
        assert!(!settings.guard.enforcement_disabled);
        assert!(settings.authz.tables_dir.is_none());
        assert!(settings.identity.marker_path.is_absolute());
    }

    #[test]
    fn test_settings_load_from_file() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let config_path = temp_dir.path().join("gatehouse.toml");

        let config_content = r#"
[backend]
base_url = "https://api.pestcontrol.example"
timeout_secs = 5

[guard]
not_authorized_path = "/denied"
enforcement_disabled = true

[authz]
tables_dir = "tables"
"#;
        fs::write(&config_path, config_content).expect("Failed to write config");

        let settings =
            Settings::load(config_path.to_str().unwrap()).expect("Failed to load settings");

        assert_eq!(settings.backend.base_url, "https://api.pestcontrol.example");
        assert_eq!(settings.backend.timeout_secs, 5);
        assert_eq!(settings.backend.employee_path, "api/employees/{id}/");
        assert_eq!(settings.guard.not_authorized_path, "/denied");
        assert!(settings.guard.enforcement_disabled);
        let tables_dir = settings.authz.tables_dir.unwrap();
        assert!(tables_dir.is_absolute());
        assert!(tables_dir.ends_with("tables"));
    }

    #[test]
    fn test_settings_env_override() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let config_path = temp_dir.path().join("gatehouse.toml");

        let config_content = r#"
[server]
host = "127.0.0.1"
port = 8090
"#;
        fs::write(&config_path, config_content).expect("Failed to write config");

        env::set_var("GATEHOUSE__SERVER__PORT", "9999");

        let settings =
            Settings::load(config_path.to_str().unwrap()).expect("Failed to load settings");

        assert_eq!(settings.server.port, 9999);

        env::remove_var("GATEHOUSE__SERVER__PORT");
    }
}
