use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use miette::Diagnostic;
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum AuthzError {
    #[error("Failed to load table file `{path}`")]
    #[diagnostic(
        code(gatehouse::authz::table_load),
        help("Check that the file exists and contains valid KDL syntax")
    )]
    TableLoadError {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid table: {0}")]
    #[diagnostic(
        code(gatehouse::authz::invalid_table),
        help("Table files may contain `alias`, `route` and `menu` KDL nodes")
    )]
    InvalidTable(String),

    #[error("KDL parse error: {0}")]
    #[diagnostic(
        code(gatehouse::authz::kdl_parse),
        help("Check your KDL file syntax, see https://kdl.dev for the specification")
    )]
    KdlParse(String),

    #[error("Failed to read identity marker `{path}`")]
    #[diagnostic(code(gatehouse::authz::marker_read))]
    MarkerRead {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid identity marker: {0}")]
    #[diagnostic(
        code(gatehouse::authz::invalid_marker),
        help("The marker must be a JSON object with an `id` or `user_id` field")
    )]
    InvalidMarker(String),

    #[error("Backend request failed: {0}")]
    #[diagnostic(code(gatehouse::authz::backend))]
    Backend(#[from] reqwest::Error),

    #[error("Backend returned {status} for `{url}`")]
    #[diagnostic(code(gatehouse::authz::backend_status))]
    BackendStatus { url: String, status: u16 },

    #[error("Identifier `{0}` cannot be used in a backend path")]
    #[diagnostic(
        code(gatehouse::authz::invalid_identifier),
        help("User and role ids must not be empty, `.` or `..`")
    )]
    InvalidIdentifier(String),

    #[error("Unknown refresh signal `{0}`")]
    #[diagnostic(
        code(gatehouse::authz::unknown_signal),
        help("Known signals: privilege-update, user-info-update")
    )]
    UnknownSignal(String),

    #[error("I/O error: {0}")]
    #[diagnostic(code(gatehouse::authz::io))]
    Io(#[from] std::io::Error),
}

impl IntoResponse for AuthzError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            AuthzError::UnknownSignal(_) => (StatusCode::NOT_FOUND, self.to_string()),
            AuthzError::Backend(_) | AuthzError::BackendStatus { .. } => {
                (StatusCode::BAD_GATEWAY, self.to_string())
            }
            _ => (StatusCode::INTERNAL_SERVER_ERROR, self.to_string()),
        };
        let body = json!({ "error": message });
        (status, Json(body)).into_response()
    }
}
