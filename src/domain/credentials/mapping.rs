//! Per-tenant cache of remote credential identifiers

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::CredentialKind;
use crate::domain::DomainError;

/// Denormalized remote credential ids, one row per tenant.
///
/// A non-null id either references a credential that exists remotely or is
/// unverifiable because the engine does not list credentials.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CredentialMapping {
    pub tenant_id: String,
    pub gmail_credential_id: Option<String>,
    pub outlook_credential_id: Option<String>,
    pub openai_credential_id: Option<String>,
    pub datastore_credential_id: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl CredentialMapping {
    pub fn new(tenant_id: impl Into<String>) -> Self {
        Self {
            tenant_id: tenant_id.into(),
            gmail_credential_id: None,
            outlook_credential_id: None,
            openai_credential_id: None,
            datastore_credential_id: None,
            updated_at: Utc::now(),
        }
    }

    pub fn get(&self, kind: CredentialKind) -> Option<&str> {
        match kind {
            CredentialKind::Gmail => self.gmail_credential_id.as_deref(),
            CredentialKind::Outlook => self.outlook_credential_id.as_deref(),
            CredentialKind::OpenAi => self.openai_credential_id.as_deref(),
            CredentialKind::Datastore => self.datastore_credential_id.as_deref(),
        }
    }

    /// Returns true when the stored value changed
    pub fn set(&mut self, kind: CredentialKind, id: Option<String>) -> bool {
        let slot = match kind {
            CredentialKind::Gmail => &mut self.gmail_credential_id,
            CredentialKind::Outlook => &mut self.outlook_credential_id,
            CredentialKind::OpenAi => &mut self.openai_credential_id,
            CredentialKind::Datastore => &mut self.datastore_credential_id,
        };

        if *slot == id {
            return false;
        }

        *slot = id;
        self.updated_at = Utc::now();
        true
    }
}

/// Persistence for credential mappings
#[async_trait]
pub trait CredentialMappingRepository: Send + Sync + std::fmt::Debug {
    async fn get(&self, tenant_id: &str) -> Result<Option<CredentialMapping>, DomainError>;

    /// Insert or replace the tenant's row
    async fn upsert(&self, mapping: CredentialMapping) -> Result<CredentialMapping, DomainError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_reports_changes() {
        let mut mapping = CredentialMapping::new("t1");

        assert!(mapping.set(CredentialKind::Gmail, Some("g-1".to_string())));
        assert!(!mapping.set(CredentialKind::Gmail, Some("g-1".to_string())));
        assert_eq!(mapping.get(CredentialKind::Gmail), Some("g-1"));

        assert!(mapping.set(CredentialKind::Gmail, None));
        assert_eq!(mapping.get(CredentialKind::Gmail), None);
    }
}
