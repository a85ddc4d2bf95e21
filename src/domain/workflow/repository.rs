use async_trait::async_trait;

use super::WorkflowRecord;
use crate::domain::DomainError;

/// Persistence for workflow bookkeeping records
#[async_trait]
pub trait WorkflowRecordRepository: Send + Sync + std::fmt::Debug {
    /// The tenant's single active record, if any
    async fn get_active(&self, tenant_id: &str) -> Result<Option<WorkflowRecord>, DomainError>;

    /// All records for a tenant, newest version first
    async fn list_for_tenant(&self, tenant_id: &str) -> Result<Vec<WorkflowRecord>, DomainError>;

    /// Insert a new record; fails with `Conflict` if an active record already exists
    async fn insert(&self, record: WorkflowRecord) -> Result<WorkflowRecord, DomainError>;

    /// Update an existing record in place
    async fn update(&self, record: WorkflowRecord) -> Result<WorkflowRecord, DomainError>;
}
