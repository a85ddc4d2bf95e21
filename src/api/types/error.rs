//! Error envelope returned by every failing endpoint

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::domain::DomainError;

/// `{success: false, errorKind, error}`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiErrorResponse {
    pub success: bool,
    pub error_kind: String,
    pub error: String,
}

/// API error with status code
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub response: ApiErrorResponse,
}

impl ApiError {
    pub fn new(status: StatusCode, error_kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            status,
            response: ApiErrorResponse {
                success: false,
                error_kind: error_kind.into(),
                error: message.into(),
            },
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "validation_error", message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "internal_error", message)
    }
}

/// HTTP status for a domain failure
pub fn status_for(err: &DomainError) -> StatusCode {
    match err {
        DomainError::Validation { .. } => StatusCode::BAD_REQUEST,
        DomainError::NotFound { .. } => StatusCode::NOT_FOUND,
        DomainError::Conflict { .. } => StatusCode::CONFLICT,
        DomainError::Remote {
            retryable: false, ..
        } => StatusCode::BAD_GATEWAY,
        DomainError::Remote { .. }
        | DomainError::CircuitOpen { .. }
        | DomainError::Credential { .. } => StatusCode::SERVICE_UNAVAILABLE,
        DomainError::Configuration { .. }
        | DomainError::NotSupported { .. }
        | DomainError::Injection { .. }
        | DomainError::Storage { .. }
        | DomainError::Cache { .. }
        | DomainError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.response)).into_response()
    }
}

impl From<DomainError> for ApiError {
    fn from(err: DomainError) -> Self {
        Self::new(status_for(&err), err.kind(), err.to_string())
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.response.error_kind, self.response.error)
    }
}

impl std::error::Error for ApiError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_domain_error_status_mapping() {
        let cases = [
            (DomainError::validation("tenantId is required"), StatusCode::BAD_REQUEST),
            (DomainError::not_found("Tenant 't' not found"), StatusCode::NOT_FOUND),
            (DomainError::configuration("no keys"), StatusCode::INTERNAL_SERVER_ERROR),
            (DomainError::injection("bad template"), StatusCode::INTERNAL_SERVER_ERROR),
            (
                DomainError::remote_retryable("engine", "HTTP 502", Some(502)),
                StatusCode::SERVICE_UNAVAILABLE,
            ),
            (
                DomainError::remote_rejected("engine", "HTTP 422", Some(422)),
                StatusCode::BAD_GATEWAY,
            ),
            (DomainError::circuit_open("engine", 30_000), StatusCode::SERVICE_UNAVAILABLE),
            (DomainError::credential("engine", "401"), StatusCode::SERVICE_UNAVAILABLE),
        ];

        for (err, expected) in cases {
            assert_eq!(ApiError::from(err).status, expected);
        }
    }

    #[test]
    fn test_envelope_serialization() {
        let err: ApiError = DomainError::not_found("Tenant 'acme' not found").into();
        let json = serde_json::to_value(&err.response).unwrap();

        assert_eq!(json["success"], false);
        assert_eq!(json["errorKind"], "not_found");
        assert_eq!(json["error"], "Not found: Tenant 'acme' not found");
    }
}
