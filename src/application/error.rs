use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::config::LoadError;
use crate::infra::error::InfraError;
use crate::infra::store::StoreError;

/// Why a request could not be served. Every variant maps to a 404 with the
/// fixed plain-text body the edge contract promises; nothing on the delivery
/// path ever surfaces a 5xx.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DeliveryError {
    /// The `Host` header is missing or carries no non-empty first label.
    #[error("host header carries no subdomain")]
    InvalidHost,
    /// The subdomain has no pointer record, or the pointer lookup failed.
    #[error("subdomain has no active deployment")]
    UnresolvedTenant,
    /// No object matches the requested path, and the SPA fallback missed or
    /// did not apply.
    #[error("no object matches the requested path")]
    ContentNotFound,
}

impl DeliveryError {
    fn body(&self) -> &'static str {
        match self {
            DeliveryError::InvalidHost => "Invalid subdomain",
            DeliveryError::UnresolvedTenant => "Not found",
            DeliveryError::ContentNotFound => "File not found",
        }
    }
}

impl IntoResponse for DeliveryError {
    fn into_response(self) -> Response {
        (StatusCode::NOT_FOUND, self.body()).into_response()
    }
}

/// Process-level failures surfaced by bootstrap, never by request handling.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("failed to load configuration: {0}")]
    Config(#[from] LoadError),
    #[error(transparent)]
    Infra(#[from] InfraError),
    #[error("store client initialization failed: {0}")]
    Store(#[from] StoreError),
    #[error("server error: {0}")]
    Server(String),
}

impl AppError {
    pub fn server(message: impl Into<String>) -> Self {
        Self::Server(message.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delivery_errors_map_to_their_contract_bodies() {
        assert_eq!(DeliveryError::InvalidHost.body(), "Invalid subdomain");
        assert_eq!(DeliveryError::UnresolvedTenant.body(), "Not found");
        assert_eq!(DeliveryError::ContentNotFound.body(), "File not found");
    }
}
