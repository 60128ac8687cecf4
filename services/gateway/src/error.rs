use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use types::errors::ReconError;

/// Central error type for the gateway application
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error(transparent)]
    Recon(#[from] ReconError),

    #[error("Internal server error")]
    Internal(#[from] anyhow::Error),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message, code) = match self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg, "BAD_REQUEST"),
            AppError::Recon(err) => {
                let (status, code) = match &err {
                    ReconError::Validation(_) => (StatusCode::BAD_REQUEST, "VALIDATION"),
                    ReconError::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
                    ReconError::Conflict(_) => (StatusCode::CONFLICT, "CONFLICT"),
                    ReconError::RateLimited { .. } => {
                        (StatusCode::TOO_MANY_REQUESTS, "RATE_LIMIT_EXCEEDED")
                    }
                    ReconError::Upstream(_) => (StatusCode::BAD_GATEWAY, "UPSTREAM_ERROR"),
                    ReconError::TransientStorage(_) => {
                        (StatusCode::SERVICE_UNAVAILABLE, "STORAGE_UNAVAILABLE")
                    }
                    ReconError::Parse(_) => (StatusCode::UNPROCESSABLE_ENTITY, "PARSE_ERROR"),
                };
                (status, err.to_string(), code)
            }
            AppError::Internal(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error".to_string(),
                "INTERNAL_ERROR",
            ),
        };

        let body = Json(json!({
            "error": code,
            "message": error_message
        }));

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let cases = [
            (ReconError::Validation("x".into()), StatusCode::BAD_REQUEST),
            (ReconError::NotFound("x".into()), StatusCode::NOT_FOUND),
            (ReconError::Conflict("x".into()), StatusCode::CONFLICT),
            (
                ReconError::RateLimited { attempts: 5 },
                StatusCode::TOO_MANY_REQUESTS,
            ),
            (
                ReconError::TransientStorage("x".into()),
                StatusCode::SERVICE_UNAVAILABLE,
            ),
        ];
        for (err, expected) in cases {
            let response = AppError::Recon(err).into_response();
            assert_eq!(response.status(), expected);
        }
    }
}
