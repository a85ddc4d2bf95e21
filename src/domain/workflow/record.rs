//! Local shadow of the tenant's deployed workflow

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::DomainError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowRecordStatus {
    Active,
    Archived,
}

impl WorkflowRecordStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Archived => "archived",
        }
    }

    pub fn parse(value: &str) -> Result<Self, DomainError> {
        match value {
            "active" => Ok(Self::Active),
            "archived" => Ok(Self::Archived),
            other => Err(DomainError::storage(format!(
                "Unknown workflow record status '{}'",
                other
            ))),
        }
    }
}

/// Bookkeeping row for a deployed remote workflow.
///
/// At most one `Active` row exists per tenant; archived rows are kept for audit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowRecord {
    pub id: Uuid,
    pub tenant_id: String,
    pub remote_workflow_id: String,
    pub version: i32,
    pub status: WorkflowRecordStatus,
    pub workflow_snapshot: serde_json::Value,
    pub archived_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl WorkflowRecord {
    pub fn new_active(
        tenant_id: impl Into<String>,
        remote_workflow_id: impl Into<String>,
        version: i32,
        workflow_snapshot: serde_json::Value,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            tenant_id: tenant_id.into(),
            remote_workflow_id: remote_workflow_id.into(),
            version,
            status: WorkflowRecordStatus::Active,
            workflow_snapshot,
            archived_reason: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == WorkflowRecordStatus::Active
    }

    pub fn archive(&mut self, reason: impl Into<String>) {
        self.status = WorkflowRecordStatus::Archived;
        self.archived_reason = Some(reason.into());
        self.updated_at = Utc::now();
    }

    pub fn replace_snapshot(&mut self, snapshot: serde_json::Value) {
        self.workflow_snapshot = snapshot;
        self.updated_at = Utc::now();
    }

    pub fn repoint(&mut self, remote_workflow_id: impl Into<String>) {
        self.remote_workflow_id = remote_workflow_id.into();
        self.updated_at = Utc::now();
    }
}

/// Reconciliation state of a tenant, evaluated fresh on every deployment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReconcileState {
    NoRecord,
    RecordValid,
    RecordStale,
    RemoteDuplicated,
}

impl std::fmt::Display for ReconcileState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let value = match self {
            Self::NoRecord => "no_record",
            Self::RecordValid => "record_valid",
            Self::RecordStale => "record_stale",
            Self::RemoteDuplicated => "remote_duplicated",
        };
        write!(f, "{}", value)
    }
}

/// What the reconciler did to reach the final workflow
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReconcileAction {
    Created,
    Updated,
    Recreated,
}

impl ReconcileAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Updated => "updated",
            Self::Recreated => "recreated",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReconcileOutcome {
    pub remote_workflow_id: String,
    pub version: i32,
    pub action: ReconcileAction,
    pub duplicates_removed: usize,
    /// Whether the final remote activation succeeded
    pub activated: bool,
}
