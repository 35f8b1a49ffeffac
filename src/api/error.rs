//! Error taxonomy shared by every handler.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use tracing::{debug, error};
use utoipa::ToSchema;

/// JSON body returned for every failed request.
#[derive(Serialize, ToSchema, Debug)]
pub struct ErrorBody {
    pub error: String,
}

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Malformed or missing request fields.
    #[error("{0}")]
    InvalidInput(String),

    /// Wrong, expired or already used code. Never says which.
    #[error("Invalid or expired OTP")]
    InvalidCredential,

    #[error("{0}")]
    NotFound(String),

    /// Mail dispatch failed; the upstream error is echoed to the caller.
    #[error("Email failed: {0}")]
    DependencyFailure(String),

    #[error("{context}")]
    StorageFailure {
        context: &'static str,
        #[source]
        source: anyhow::Error,
    },

    #[error("Please login")]
    Unauthenticated,

    #[error("Forbidden")]
    Forbidden,
}

impl ApiError {
    /// Wrap a storage error with the sanitized message shown to the client.
    pub fn storage(context: &'static str) -> impl FnOnce(anyhow::Error) -> Self {
        move |source| Self::StorageFailure { context, source }
    }

    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            Self::InvalidInput(_) | Self::InvalidCredential => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::DependencyFailure(_) | Self::StorageFailure { .. } => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            Self::Unauthenticated => StatusCode::UNAUTHORIZED,
            Self::Forbidden => StatusCode::FORBIDDEN,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match &self {
            Self::StorageFailure { context, source } => error!("{context}: {source:#}"),
            Self::DependencyFailure(upstream) => error!("Mail dispatch failed: {upstream}"),
            other => debug!("Request rejected: {other}"),
        }

        let status = self.status();
        let body = ErrorBody {
            error: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;

    #[test]
    fn status_mapping() {
        assert_eq!(
            ApiError::InvalidInput("Email is required".to_string()).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::InvalidCredential.status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::NotFound("User not found".to_string()).status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ApiError::DependencyFailure("smtp down".to_string()).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(ApiError::Unauthenticated.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(ApiError::Forbidden.status(), StatusCode::FORBIDDEN);
    }

    #[test]
    fn storage_failure_hides_source() {
        let err = ApiError::storage("Failed to fetch cart")(anyhow!("connection reset by peer"));
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.to_string(), "Failed to fetch cart");
    }

    #[test]
    fn dependency_failure_echoes_upstream() {
        let err = ApiError::DependencyFailure("421 service not available".to_string());
        assert_eq!(err.to_string(), "Email failed: 421 service not available");
    }

    #[test]
    fn credential_failure_is_unspecific() {
        assert_eq!(ApiError::InvalidCredential.to_string(), "Invalid or expired OTP");
    }
}
