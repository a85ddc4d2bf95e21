//! PostgreSQL workflow record repository implementation

use async_trait::async_trait;
use sqlx::{PgPool, Row};

use crate::domain::workflow::{WorkflowRecord, WorkflowRecordRepository, WorkflowRecordStatus};
use crate::domain::DomainError;
use crate::infrastructure::storage::map_write_error;

const RECORD_COLUMNS: &str = "id, tenant_id, remote_workflow_id, version, status, \
     workflow_snapshot, archived_reason, created_at, updated_at";

/// PostgreSQL implementation of WorkflowRecordRepository.
///
/// The partial unique index on `(tenant_id) WHERE status = 'active'` turns a second
/// active row into a `Conflict`.
#[derive(Debug, Clone)]
pub struct PostgresWorkflowRecordRepository {
    pool: PgPool,
}

impl PostgresWorkflowRecordRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl WorkflowRecordRepository for PostgresWorkflowRecordRepository {
    async fn get_active(&self, tenant_id: &str) -> Result<Option<WorkflowRecord>, DomainError> {
        let query = format!(
            "SELECT {} FROM workflow_records WHERE tenant_id = $1 AND status = 'active'",
            RECORD_COLUMNS
        );

        let row = sqlx::query(&query)
            .bind(tenant_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| DomainError::storage(format!("Failed to get workflow record: {}", e)))?;

        row.map(|row| row_to_record(&row)).transpose()
    }

    async fn list_for_tenant(&self, tenant_id: &str) -> Result<Vec<WorkflowRecord>, DomainError> {
        let query = format!(
            "SELECT {} FROM workflow_records WHERE tenant_id = $1 ORDER BY version DESC",
            RECORD_COLUMNS
        );

        let rows = sqlx::query(&query)
            .bind(tenant_id)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| DomainError::storage(format!("Failed to list workflow records: {}", e)))?;

        rows.iter().map(row_to_record).collect()
    }

    async fn insert(&self, record: WorkflowRecord) -> Result<WorkflowRecord, DomainError> {
        sqlx::query(
            r#"
            INSERT INTO workflow_records (id, tenant_id, remote_workflow_id, version, status,
                                          workflow_snapshot, archived_reason, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(record.id)
        .bind(&record.tenant_id)
        .bind(&record.remote_workflow_id)
        .bind(record.version)
        .bind(record.status.as_str())
        .bind(&record.workflow_snapshot)
        .bind(&record.archived_reason)
        .bind(record.created_at)
        .bind(record.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| map_write_error("Failed to insert workflow record", e))?;

        Ok(record)
    }

    async fn update(&self, record: WorkflowRecord) -> Result<WorkflowRecord, DomainError> {
        let result = sqlx::query(
            r#"
            UPDATE workflow_records
            SET remote_workflow_id = $2, version = $3, status = $4, workflow_snapshot = $5,
                archived_reason = $6, updated_at = $7
            WHERE id = $1
            "#,
        )
        .bind(record.id)
        .bind(&record.remote_workflow_id)
        .bind(record.version)
        .bind(record.status.as_str())
        .bind(&record.workflow_snapshot)
        .bind(&record.archived_reason)
        .bind(record.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| map_write_error("Failed to update workflow record", e))?;

        if result.rows_affected() == 0 {
            return Err(DomainError::not_found(format!(
                "Workflow record '{}' not found",
                record.id
            )));
        }

        Ok(record)
    }
}

fn row_to_record(row: &sqlx::postgres::PgRow) -> Result<WorkflowRecord, DomainError> {
    let read =
        |e: sqlx::Error| DomainError::storage(format!("Failed to read workflow record: {}", e));

    let status: String = row.try_get("status").map_err(read)?;

    Ok(WorkflowRecord {
        id: row.try_get("id").map_err(read)?,
        tenant_id: row.try_get("tenant_id").map_err(read)?,
        remote_workflow_id: row.try_get("remote_workflow_id").map_err(read)?,
        version: row.try_get("version").map_err(read)?,
        status: WorkflowRecordStatus::parse(&status)?,
        workflow_snapshot: row.try_get("workflow_snapshot").map_err(read)?,
        archived_reason: row.try_get("archived_reason").map_err(read)?,
        created_at: row.try_get("created_at").map_err(read)?,
        updated_at: row.try_get("updated_at").map_err(read)?,
    })
}
