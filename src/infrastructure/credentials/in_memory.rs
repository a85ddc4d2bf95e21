use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;

use crate::domain::credentials::{CredentialMapping, CredentialMappingRepository};
use crate::domain::DomainError;

/// In-memory implementation of CredentialMappingRepository
#[derive(Debug, Default)]
pub struct InMemoryCredentialMappingRepository {
    mappings: RwLock<HashMap<String, CredentialMapping>>,
}

impl InMemoryCredentialMappingRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CredentialMappingRepository for InMemoryCredentialMappingRepository {
    async fn get(&self, tenant_id: &str) -> Result<Option<CredentialMapping>, DomainError> {
        let mappings = self
            .mappings
            .read()
            .map_err(|_| DomainError::internal("Failed to acquire lock"))?;

        Ok(mappings.get(tenant_id).cloned())
    }

    async fn upsert(&self, mapping: CredentialMapping) -> Result<CredentialMapping, DomainError> {
        let mut mappings = self
            .mappings
            .write()
            .map_err(|_| DomainError::internal("Failed to acquire lock"))?;

        mappings.insert(mapping.tenant_id.clone(), mapping.clone());
        Ok(mapping)
    }
}
