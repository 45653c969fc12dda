//! Backend calls the permission store depends on.
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;

use crate::authz::errors::AuthzError;
use crate::identity::{id_string, IdentityMarker};
use crate::settings;

#[async_trait]
pub trait PermissionBackend: Send + Sync {
    /// Fresh user details for `user_id`.
    async fn employee_details(&self, user_id: &str, token: Option<&str>)
        -> Result<Value, AuthzError>;

    /// Privilege rows for `role_id`, in any of the shapes the backend uses.
    async fn user_privilege_list(
        &self,
        role_id: &str,
        token: Option<&str>,
    ) -> Result<Value, AuthzError>;
}

/// REST client for the console backend.
#[derive(Debug, Clone)]
pub struct HttpBackend {
    client: Client,
    base_url: String,
    employee_path: String,
    privileges_path: String,
}

impl HttpBackend {
    pub fn new(config: &settings::Backend) -> Result<Self, AuthzError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url.clone(),
            employee_path: config.employee_path.clone(),
            privileges_path: config.privileges_path.clone(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    fn employee_url(&self, user_id: &str) -> Result<String, AuthzError> {
        Ok(self.url(&self.employee_path.replace("{id}", &encode_id(user_id)?)))
    }

    fn privileges_url(&self, role_id: &str) -> Result<String, AuthzError> {
        Ok(self.url(&self.privileges_path.replace("{role_id}", &encode_id(role_id)?)))
    }

    async fn get_json(&self, url: String, token: Option<&str>) -> Result<Value, AuthzError> {
        let mut request = self.client.get(&url);
        if let Some(token) = token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(AuthzError::BackendStatus {
                url,
                status: status.as_u16(),
            });
        }

        Ok(response.json().await?)
    }
}

#[async_trait]
impl PermissionBackend for HttpBackend {
    async fn employee_details(
        &self,
        user_id: &str,
        token: Option<&str>,
    ) -> Result<Value, AuthzError> {
        let url = self.employee_url(user_id)?;
        tracing::debug!(%url, "fetching employee details");
        self.get_json(url, token).await
    }

    async fn user_privilege_list(
        &self,
        role_id: &str,
        token: Option<&str>,
    ) -> Result<Value, AuthzError> {
        let url = self.privileges_url(role_id)?;
        tracing::debug!(%url, "fetching role privileges");
        self.get_json(url, token).await
    }
}

/// Percent-encode an id for a single path segment or query value.
///
/// Dot segments are rejected: URL parsing resolves them even when encoded.
fn encode_id(id: &str) -> Result<String, AuthzError> {
    match id {
        "" | "." | ".." => Err(AuthzError::InvalidIdentifier(id.to_string())),
        _ => Ok(urlencoding::encode(id).into_owned()),
    }
}

/// Role id from user details, falling back to the marker's cached role id.
///
/// Order: `role_id`, `user_role_id`, `role.id`, `user_roles[0].id`, marker.
pub fn resolve_role_id(details: &Value, marker: &IdentityMarker) -> Option<String> {
    details
        .get("role_id")
        .and_then(id_string)
        .or_else(|| details.get("user_role_id").and_then(id_string))
        .or_else(|| details.pointer("/role/id").and_then(id_string))
        .or_else(|| details.pointer("/user_roles/0/id").and_then(id_string))
        .or_else(|| marker.cached_role_id())
}

/// Privilege rows out of whichever envelope the backend returned.
///
/// Tries `results`, `data.results`, `data`, then the bare value; the first
/// non-empty array wins.
pub fn extract_privilege_rows(response: &Value) -> Vec<Value> {
    [
        response.get("results"),
        response.pointer("/data/results"),
        response.get("data"),
        Some(response),
    ]
    .into_iter()
    .flatten()
    .filter_map(|v| v.as_array())
    .find(|rows| !rows.is_empty())
    .cloned()
    .unwrap_or_default()
}
