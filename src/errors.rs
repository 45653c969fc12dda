use miette::Diagnostic;
use thiserror::Error;

use crate::authz::errors::AuthzError;

#[derive(Debug, Error, Diagnostic)]
pub enum GatehouseError {
    #[error("I/O error: {0}")]
    #[diagnostic(code(gatehouse::io))]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    #[diagnostic(code(gatehouse::serde))]
    Serde(#[from] serde_json::Error),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Authz(#[from] AuthzError),

    #[error("{0}")]
    #[diagnostic(code(gatehouse::other))]
    Other(String),
}
