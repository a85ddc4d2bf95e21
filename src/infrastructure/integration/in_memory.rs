use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;

use crate::domain::integration::{Integration, IntegrationRepository, IntegrationStatus};
use crate::domain::tenant::EmailProvider;
use crate::domain::DomainError;

type IntegrationKey = (String, EmailProvider);

/// In-memory implementation of IntegrationRepository
#[derive(Debug, Default)]
pub struct InMemoryIntegrationRepository {
    integrations: RwLock<HashMap<IntegrationKey, Integration>>,
}

impl InMemoryIntegrationRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_integrations(integrations: impl IntoIterator<Item = Integration>) -> Self {
        let map = integrations
            .into_iter()
            .map(|i| ((i.tenant_id.clone(), i.provider), i))
            .collect();

        Self {
            integrations: RwLock::new(map),
        }
    }

    /// Current row regardless of status
    pub fn find(&self, tenant_id: &str, provider: EmailProvider) -> Option<Integration> {
        self.integrations
            .read()
            .ok()
            .and_then(|map| map.get(&(tenant_id.to_string(), provider)).cloned())
    }
}

#[async_trait]
impl IntegrationRepository for InMemoryIntegrationRepository {
    async fn get_active(
        &self,
        tenant_id: &str,
        provider: EmailProvider,
    ) -> Result<Option<Integration>, DomainError> {
        let integrations = self
            .integrations
            .read()
            .map_err(|_| DomainError::internal("Failed to acquire lock"))?;

        Ok(integrations
            .get(&(tenant_id.to_string(), provider))
            .filter(|i| i.status == IntegrationStatus::Active)
            .cloned())
    }

    async fn save(&self, integration: Integration) -> Result<Integration, DomainError> {
        let mut integrations = self
            .integrations
            .write()
            .map_err(|_| DomainError::internal("Failed to acquire lock"))?;

        integrations.insert(
            (integration.tenant_id.clone(), integration.provider),
            integration.clone(),
        );
        Ok(integration)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_inactive_integration_is_hidden() {
        let mut integration = Integration::new("t1", EmailProvider::Gmail);
        integration.status = IntegrationStatus::Inactive;
        let repo = InMemoryIntegrationRepository::with_integrations(vec![integration]);

        assert!(repo.get_active("t1", EmailProvider::Gmail).await.unwrap().is_none());
        assert!(repo.find("t1", EmailProvider::Gmail).is_some());
    }

    #[tokio::test]
    async fn test_save_replaces_by_tenant_and_provider() {
        let repo = InMemoryIntegrationRepository::new();

        repo.save(Integration::new("t1", EmailProvider::Gmail)).await.unwrap();
        repo.save(Integration::new("t1", EmailProvider::Gmail).with_remote_credential_id("c1"))
            .await
            .unwrap();

        let stored = repo.get_active("t1", EmailProvider::Gmail).await.unwrap().unwrap();
        assert_eq!(stored.remote_credential_id.as_deref(), Some("c1"));
    }
}
