//! In-memory workflow record repository implementation

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::domain::workflow::{WorkflowRecord, WorkflowRecordRepository};
use crate::domain::DomainError;

/// In-memory implementation of WorkflowRecordRepository
#[derive(Debug)]
pub struct InMemoryWorkflowRecordRepository {
    records: Arc<RwLock<HashMap<Uuid, WorkflowRecord>>>,
}

impl InMemoryWorkflowRecordRepository {
    /// Create a new empty repository
    pub fn new() -> Self {
        Self {
            records: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Create a repository pre-populated with records
    pub fn with_records(records: Vec<WorkflowRecord>) -> Self {
        let map: HashMap<Uuid, WorkflowRecord> =
            records.into_iter().map(|r| (r.id, r)).collect();

        Self {
            records: Arc::new(RwLock::new(map)),
        }
    }
}

impl Default for InMemoryWorkflowRecordRepository {
    fn default() -> Self {
        Self::new()
    }
}

fn has_other_active(records: &HashMap<Uuid, WorkflowRecord>, record: &WorkflowRecord) -> bool {
    record.is_active()
        && records
            .values()
            .any(|r| r.tenant_id == record.tenant_id && r.is_active() && r.id != record.id)
}

#[async_trait]
impl WorkflowRecordRepository for InMemoryWorkflowRecordRepository {
    async fn get_active(&self, tenant_id: &str) -> Result<Option<WorkflowRecord>, DomainError> {
        let records = self.records.read().await;
        Ok(records
            .values()
            .find(|r| r.tenant_id == tenant_id && r.is_active())
            .cloned())
    }

    async fn list_for_tenant(&self, tenant_id: &str) -> Result<Vec<WorkflowRecord>, DomainError> {
        let records = self.records.read().await;
        let mut result: Vec<WorkflowRecord> = records
            .values()
            .filter(|r| r.tenant_id == tenant_id)
            .cloned()
            .collect();

        result.sort_by(|a, b| b.version.cmp(&a.version));
        Ok(result)
    }

    async fn insert(&self, record: WorkflowRecord) -> Result<WorkflowRecord, DomainError> {
        let mut records = self.records.write().await;

        if records.contains_key(&record.id) {
            return Err(DomainError::conflict(format!(
                "Workflow record '{}' already exists",
                record.id
            )));
        }

        if has_other_active(&records, &record) {
            return Err(DomainError::conflict(format!(
                "Tenant '{}' already has an active workflow record",
                record.tenant_id
            )));
        }

        records.insert(record.id, record.clone());
        Ok(record)
    }

    async fn update(&self, record: WorkflowRecord) -> Result<WorkflowRecord, DomainError> {
        let mut records = self.records.write().await;

        if !records.contains_key(&record.id) {
            return Err(DomainError::not_found(format!(
                "Workflow record '{}' not found",
                record.id
            )));
        }

        if has_other_active(&records, &record) {
            return Err(DomainError::conflict(format!(
                "Tenant '{}' already has an active workflow record",
                record.tenant_id
            )));
        }

        records.insert(record.id, record.clone());
        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_one_active_record_per_tenant() {
        let repo = InMemoryWorkflowRecordRepository::new();

        repo.insert(WorkflowRecord::new_active("t1", "wf-1", 1, json!({})))
            .await
            .unwrap();

        let err = repo
            .insert(WorkflowRecord::new_active("t1", "wf-2", 2, json!({})))
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::Conflict { .. }));

        repo.insert(WorkflowRecord::new_active("t2", "wf-3", 1, json!({})))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_archive_then_insert() {
        let repo = InMemoryWorkflowRecordRepository::new();
        let mut first = repo
            .insert(WorkflowRecord::new_active("t1", "wf-1", 1, json!({})))
            .await
            .unwrap();

        first.archive("stale");
        repo.update(first).await.unwrap();
        repo.insert(WorkflowRecord::new_active("t1", "wf-2", 2, json!({})))
            .await
            .unwrap();

        let active = repo.get_active("t1").await.unwrap().unwrap();
        assert_eq!(active.remote_workflow_id, "wf-2");

        let all = repo.list_for_tenant("t1").await.unwrap();
        assert_eq!(all.iter().map(|r| r.version).collect::<Vec<_>>(), vec![2, 1]);
    }

    #[tokio::test]
    async fn test_update_missing_record() {
        let repo = InMemoryWorkflowRecordRepository::new();

        let err = repo
            .update(WorkflowRecord::new_active("t1", "wf-1", 1, json!({})))
            .await
            .unwrap_err();

        assert!(matches!(err, DomainError::NotFound { .. }));
    }
}
