//! Read access to the "current user" marker written by the login flow.
//!
//! The marker is owned by the console's login/logout handling. Gatehouse only
//! reads it: its presence means someone is signed in, and its contents carry
//! the user id, an optional cached role id and an optional bearer token.
use std::path::PathBuf;
use std::sync::Mutex;

use serde_json::{Map, Value};

use crate::authz::errors::AuthzError;

/// The parsed marker. Always a JSON object.
#[derive(Debug, Clone, PartialEq)]
pub struct IdentityMarker(Map<String, Value>);

impl IdentityMarker {
    pub fn parse(contents: &str) -> Result<Self, AuthzError> {
        let value: Value = serde_json::from_str(contents)
            .map_err(|e| AuthzError::InvalidMarker(e.to_string()))?;
        Self::from_value(value)
    }

    pub fn from_value(value: Value) -> Result<Self, AuthzError> {
        match value {
            Value::Object(map) => Ok(Self(map)),
            other => Err(AuthzError::InvalidMarker(format!(
                "expected a JSON object, got `{other}`"
            ))),
        }
    }

    /// `id`, then `user_id`.
    pub fn user_id(&self) -> Option<String> {
        ["id", "user_id"]
            .iter()
            .find_map(|f| self.0.get(*f).and_then(id_string))
    }

    /// Role id cached at login: `role_id`, then `user_role_id`.
    pub fn cached_role_id(&self) -> Option<String> {
        ["role_id", "user_role_id"]
            .iter()
            .find_map(|f| self.0.get(*f).and_then(id_string))
    }

    pub fn bearer_token(&self) -> Option<&str> {
        ["access", "access_token", "token"]
            .iter()
            .filter_map(|f| self.0.get(*f).and_then(|v| v.as_str()))
            .find(|s| !s.is_empty())
    }
}

/// Render an id-like JSON value. Non-empty strings and numbers only.
pub fn id_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Synchronous key-value read of the current-user marker.
pub trait IdentityStore: Send + Sync {
    /// `Ok(None)` when nobody is signed in.
    fn read_marker(&self) -> Result<Option<IdentityMarker>, AuthzError>;

    /// Whether a marker exists at all, without interpreting it.
    fn has_marker(&self) -> bool {
        matches!(self.read_marker(), Ok(Some(_)))
    }
}

/// Marker kept as a JSON file, written by the console's login flow.
#[derive(Debug, Clone)]
pub struct FileIdentityStore {
    path: PathBuf,
}

impl FileIdentityStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl IdentityStore for FileIdentityStore {
    fn read_marker(&self) -> Result<Option<IdentityMarker>, AuthzError> {
        let contents = match std::fs::read_to_string(&self.path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(source) => {
                return Err(AuthzError::MarkerRead {
                    path: self.path.display().to_string(),
                    source,
                })
            }
        };
        if contents.trim().is_empty() {
            return Ok(None);
        }
        IdentityMarker::parse(&contents).map(Some)
    }

    /// Same emptiness rule as `read_marker`, without parsing the JSON.
    fn has_marker(&self) -> bool {
        std::fs::read_to_string(&self.path)
            .map(|contents| !contents.trim().is_empty())
            .unwrap_or(false)
    }
}

/// In-process marker, for embedding and tests.
#[derive(Debug, Default)]
pub struct MemoryIdentityStore {
    marker: Mutex<Option<Value>>,
}

impl MemoryIdentityStore {
    pub fn new(marker: Option<Value>) -> Self {
        Self {
            marker: Mutex::new(marker),
        }
    }

    pub fn set(&self, marker: Option<Value>) {
        let mut guard = self.marker.lock().unwrap_or_else(|e| e.into_inner());
        *guard = marker;
    }
}

impl IdentityStore for MemoryIdentityStore {
    fn read_marker(&self) -> Result<Option<IdentityMarker>, AuthzError> {
        let guard = self.marker.lock().unwrap_or_else(|e| e.into_inner());
        guard.clone().map(IdentityMarker::from_value).transpose()
    }
}
