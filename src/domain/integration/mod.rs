//! Mailbox integrations - OAuth tokens and the remote credential bound to them

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::tenant::EmailProvider;
use crate::domain::DomainError;

/// Integration status
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntegrationStatus {
    #[default]
    Active,
    Inactive,
    Error,
}

impl IntegrationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Inactive => "inactive",
            Self::Error => "error",
        }
    }

    pub fn parse(value: &str) -> Result<Self, DomainError> {
        match value {
            "active" => Ok(Self::Active),
            "inactive" => Ok(Self::Inactive),
            "error" => Ok(Self::Error),
            other => Err(DomainError::storage(format!(
                "Unknown integration status '{}'",
                other
            ))),
        }
    }
}

/// One mailbox connection per (tenant, provider)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Integration {
    pub tenant_id: String,
    pub provider: EmailProvider,
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub status: IntegrationStatus,
    pub remote_credential_id: Option<String>,
    pub token_expires_at: Option<DateTime<Utc>>,
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

impl Integration {
    pub fn new(tenant_id: impl Into<String>, provider: EmailProvider) -> Self {
        Self {
            tenant_id: tenant_id.into(),
            provider,
            access_token: None,
            refresh_token: None,
            status: IntegrationStatus::Active,
            remote_credential_id: None,
            token_expires_at: None,
            updated_at: Utc::now(),
        }
    }

    pub fn with_tokens(
        mut self,
        access_token: impl Into<String>,
        refresh_token: impl Into<String>,
    ) -> Self {
        self.access_token = Some(access_token.into());
        self.refresh_token = Some(refresh_token.into());
        self
    }

    pub fn with_remote_credential_id(mut self, id: impl Into<String>) -> Self {
        self.remote_credential_id = Some(id.into());
        self
    }

    /// Refresh token if present and non-blank
    pub fn usable_refresh_token(&self) -> Option<&str> {
        self.refresh_token
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
    }

    pub fn apply_refreshed_tokens(&mut self, tokens: &OAuthTokens) {
        self.access_token = Some(tokens.access_token.clone());

        if let Some(refresh) = &tokens.refresh_token {
            self.refresh_token = Some(refresh.clone());
        }

        self.token_expires_at = tokens.expires_at;
        self.updated_at = Utc::now();
    }

    pub fn bind_remote_credential(&mut self, id: impl Into<String>) {
        self.remote_credential_id = Some(id.into());
        self.updated_at = Utc::now();
    }
}

/// Tokens returned by a refresh-token grant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OAuthTokens {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
    pub scope: Option<String>,
}

/// Persistence for integrations
#[async_trait]
pub trait IntegrationRepository: Send + Sync + std::fmt::Debug {
    /// Active integration for the tenant and provider
    async fn get_active(
        &self,
        tenant_id: &str,
        provider: EmailProvider,
    ) -> Result<Option<Integration>, DomainError>;

    /// Insert or update keyed by (tenant, provider)
    async fn save(&self, integration: Integration) -> Result<Integration, DomainError>;
}

/// OAuth2 refresh-token grant against a mailbox provider
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TokenRefresher: Send + Sync + std::fmt::Debug {
    async fn refresh(
        &self,
        provider: EmailProvider,
        refresh_token: &str,
    ) -> Result<OAuthTokens, DomainError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_usable_refresh_token() {
        let integration = Integration::new("t1", EmailProvider::Gmail).with_tokens("a", "  ");
        assert!(integration.usable_refresh_token().is_none());

        let integration = Integration::new("t1", EmailProvider::Gmail).with_tokens("a", "r-1");
        assert_eq!(integration.usable_refresh_token(), Some("r-1"));
    }

    #[test]
    fn test_apply_refreshed_tokens_keeps_refresh_token_when_absent() {
        let mut integration =
            Integration::new("t1", EmailProvider::Outlook).with_tokens("old", "refresh");

        integration.apply_refreshed_tokens(&OAuthTokens {
            access_token: "new".to_string(),
            refresh_token: None,
            expires_at: None,
            scope: None,
        });

        assert_eq!(integration.access_token.as_deref(), Some("new"));
        assert_eq!(integration.refresh_token.as_deref(), Some("refresh"));
    }

    #[test]
    fn test_status_round_trip() {
        for status in [
            IntegrationStatus::Active,
            IntegrationStatus::Inactive,
            IntegrationStatus::Error,
        ] {
            assert_eq!(IntegrationStatus::parse(status.as_str()).unwrap(), status);
        }
    }
}
