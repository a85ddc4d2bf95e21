use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;

use crate::domain::tenant::{TenantProfile, TenantProfileRepository};
use crate::domain::DomainError;

/// In-memory implementation of TenantProfileRepository
#[derive(Debug, Default)]
pub struct InMemoryTenantProfileRepository {
    profiles: RwLock<HashMap<String, TenantProfile>>,
}

impl InMemoryTenantProfileRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_profiles(profiles: impl IntoIterator<Item = TenantProfile>) -> Self {
        let map = profiles
            .into_iter()
            .map(|p| (p.tenant_id().to_string(), p))
            .collect();

        Self {
            profiles: RwLock::new(map),
        }
    }

    /// Insert or replace a profile
    pub fn put(&self, profile: TenantProfile) -> Result<(), DomainError> {
        let mut profiles = self
            .profiles
            .write()
            .map_err(|_| DomainError::internal("Failed to acquire lock"))?;

        profiles.insert(profile.tenant_id().to_string(), profile);
        Ok(())
    }
}

#[async_trait]
impl TenantProfileRepository for InMemoryTenantProfileRepository {
    async fn get(&self, tenant_id: &str) -> Result<Option<TenantProfile>, DomainError> {
        let profiles = self
            .profiles
            .read()
            .map_err(|_| DomainError::internal("Failed to acquire lock"))?;

        Ok(profiles.get(tenant_id).cloned())
    }
}
