use async_trait::async_trait;

use super::TenantProfile;
use crate::domain::DomainError;

/// Read access to tenant profiles owned by the surrounding application
#[async_trait]
pub trait TenantProfileRepository: Send + Sync + std::fmt::Debug {
    async fn get(&self, tenant_id: &str) -> Result<Option<TenantProfile>, DomainError>;
}
