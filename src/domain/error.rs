use thiserror::Error;

/// Core domain errors
#[derive(Debug, Clone, Error)]
pub enum DomainError {
    #[error("Not found: {message}")]
    NotFound { message: String },

    #[error("Validation error: {message}")]
    Validation { message: String },

    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Credential error: {service} - {message}")]
    Credential { service: String, message: String },

    #[error("Remote error: {service} - {message}")]
    Remote {
        service: String,
        message: String,
        status: Option<u16>,
        retryable: bool,
    },

    #[error("Circuit breaker open for {dependency}, retry after {retry_after_ms}ms")]
    CircuitOpen {
        dependency: String,
        retry_after_ms: u64,
    },

    #[error("Not supported: {message}")]
    NotSupported { message: String },

    #[error("Template injection error: {message}")]
    Injection { message: String },

    #[error("Conflict: {message}")]
    Conflict { message: String },

    #[error("Storage error: {message}")]
    Storage { message: String },

    #[error("Cache error: {message}")]
    Cache { message: String },

    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl DomainError {
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound {
            message: message.into(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    pub fn credential(service: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Credential {
            service: service.into(),
            message: message.into(),
        }
    }

    /// Transport failure, timeout or 5xx/429 from a remote dependency
    pub fn remote_retryable(
        service: impl Into<String>,
        message: impl Into<String>,
        status: Option<u16>,
    ) -> Self {
        Self::Remote {
            service: service.into(),
            message: message.into(),
            status,
            retryable: true,
        }
    }

    /// Request rejected by a remote dependency (4xx other than 429)
    pub fn remote_rejected(
        service: impl Into<String>,
        message: impl Into<String>,
        status: Option<u16>,
    ) -> Self {
        Self::Remote {
            service: service.into(),
            message: message.into(),
            status,
            retryable: false,
        }
    }

    pub fn circuit_open(dependency: impl Into<String>, retry_after_ms: u64) -> Self {
        Self::CircuitOpen {
            dependency: dependency.into(),
            retry_after_ms,
        }
    }

    pub fn not_supported(message: impl Into<String>) -> Self {
        Self::NotSupported {
            message: message.into(),
        }
    }

    pub fn injection(message: impl Into<String>) -> Self {
        Self::Injection {
            message: message.into(),
        }
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict {
            message: message.into(),
        }
    }

    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage {
            message: message.into(),
        }
    }

    pub fn cache(message: impl Into<String>) -> Self {
        Self::Cache {
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Whether a retry of the same call has a chance to succeed
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Remote { retryable: true, .. })
    }

    pub fn is_not_supported(&self) -> bool {
        matches!(self, Self::NotSupported { .. })
    }

    pub fn is_credential(&self) -> bool {
        matches!(self, Self::Credential { .. })
    }

    /// Stable machine-readable error kind used in response envelopes
    pub fn kind(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "not_found",
            Self::Validation { .. } => "validation_error",
            Self::Configuration { .. } => "configuration_error",
            Self::Credential { .. } => "credential_error",
            Self::Remote {
                retryable: true, ..
            } => "retryable_external_error",
            Self::Remote { .. } => "external_error",
            Self::CircuitOpen { .. } => "circuit_open",
            Self::NotSupported { .. } => "not_supported",
            Self::Injection { .. } => "injection_error",
            Self::Conflict { .. } => "conflict",
            Self::Storage { .. } => "storage_error",
            Self::Cache { .. } => "cache_error",
            Self::Internal { .. } => "internal_error",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_error() {
        let error = DomainError::not_found("Tenant 'abc' not found");
        assert_eq!(error.to_string(), "Not found: Tenant 'abc' not found");
    }

    #[test]
    fn test_validation_error() {
        let error = DomainError::validation("tenantId is required");
        assert_eq!(error.to_string(), "Validation error: tenantId is required");
        assert!(!error.is_retryable());
    }

    #[test]
    fn test_retryable_classification() {
        assert!(DomainError::remote_retryable("engine", "HTTP 503", Some(503)).is_retryable());
        assert!(!DomainError::remote_rejected("engine", "HTTP 400", Some(400)).is_retryable());
        assert!(!DomainError::circuit_open("engine", 1000).is_retryable());
        assert!(!DomainError::configuration("missing key").is_retryable());
    }

    #[test]
    fn test_circuit_open_message() {
        let error = DomainError::circuit_open("workflow_engine", 2500);
        assert_eq!(
            error.to_string(),
            "Circuit breaker open for workflow_engine, retry after 2500ms"
        );
        assert_eq!(error.kind(), "circuit_open");
    }

    #[test]
    fn test_error_kinds() {
        assert_eq!(DomainError::validation("x").kind(), "validation_error");
        assert_eq!(DomainError::configuration("x").kind(), "configuration_error");
        assert_eq!(
            DomainError::remote_retryable("e", "x", None).kind(),
            "retryable_external_error"
        );
        assert_eq!(DomainError::injection("x").kind(), "injection_error");
    }
}
