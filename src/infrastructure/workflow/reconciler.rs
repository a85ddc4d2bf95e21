//! Converges the remote engine onto exactly one active workflow per tenant

use std::sync::Arc;
use std::time::Duration;

use metrics::counter;
use serde::Deserialize;
use tokio::time::{sleep, Instant};
use tracing::{debug, info, instrument, warn};

use crate::domain::tenant::{TenantProfile, TenantTag};
use crate::domain::workflow::{
    ReconcileAction, ReconcileOutcome, ReconcileState, RemoteWorkflow, WorkflowPayload,
    WorkflowRecord, WorkflowRecordRepository,
};
use crate::domain::{DomainError, WorkflowEngine};

/// Timing of the wait between deactivation and reactivation
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ReconcilerConfig {
    pub settle_poll_interval_ms: u64,
    pub settle_timeout_ms: u64,
    /// Fixed wait used when the engine cannot be polled
    pub settle_fallback_delay_ms: u64,
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self {
            settle_poll_interval_ms: 250,
            settle_timeout_ms: 3000,
            settle_fallback_delay_ms: 1000,
        }
    }
}

#[derive(Debug, Default)]
struct DedupOutcome {
    removed: usize,
    survivor: Option<String>,
    deleted: Vec<String>,
}

/// Reconciles the local workflow record with the remote engine.
///
/// State is evaluated fresh on every call, so a run interrupted halfway is repaired by
/// the next one.
#[derive(Debug)]
pub struct WorkflowReconciler {
    engine: Arc<dyn WorkflowEngine>,
    records: Arc<dyn WorkflowRecordRepository>,
    config: ReconcilerConfig,
}

impl WorkflowReconciler {
    pub fn new(
        engine: Arc<dyn WorkflowEngine>,
        records: Arc<dyn WorkflowRecordRepository>,
        config: ReconcilerConfig,
    ) -> Self {
        Self {
            engine,
            records,
            config,
        }
    }

    #[instrument(skip_all, fields(tenant_id = %profile.tenant_id(), workflow = %payload.name))]
    pub async fn reconcile(
        &self,
        profile: &TenantProfile,
        payload: &WorkflowPayload,
    ) -> Result<ReconcileOutcome, DomainError> {
        let tenant_id = profile.tenant_id();
        let mut record = self.records.get_active(tenant_id).await?;

        let referenced = record.as_ref().map(|r| r.remote_workflow_id.as_str());
        let dedup = self.remove_duplicates(&profile.tag(), referenced).await;

        if let Some(current) = record.as_mut() {
            if dedup.deleted.contains(&current.remote_workflow_id) {
                if let Some(survivor) = &dedup.survivor {
                    info!(from = %current.remote_workflow_id, to = %survivor, "Repointing workflow record at surviving duplicate");
                    current.repoint(survivor.as_str());
                    *current = self.records.update(current.clone()).await?;
                }
            }
        }

        let record = match record {
            Some(record) => record,
            None => match &dedup.survivor {
                // A tagged workflow without a local record is adopted rather than duplicated
                Some(survivor) => {
                    info!(remote_workflow_id = %survivor, "Adopting existing remote workflow");
                    self.records
                        .insert(WorkflowRecord::new_active(
                            tenant_id,
                            survivor.as_str(),
                            1,
                            payload.to_snapshot(),
                        ))
                        .await?
                }
                None => {
                    debug!(state = %ReconcileState::NoRecord, "Evaluated reconcile state");
                    return self.create(tenant_id, payload, dedup.removed).await;
                }
            },
        };

        let state = match self.engine.get_workflow(&record.remote_workflow_id).await? {
            Some(_) => ReconcileState::RecordValid,
            None => ReconcileState::RecordStale,
        };
        debug!(state = %state, remote_workflow_id = %record.remote_workflow_id, "Evaluated reconcile state");

        match state {
            ReconcileState::RecordStale => {
                warn!(remote_workflow_id = %record.remote_workflow_id, "Recorded workflow no longer exists remotely");
                let reason = format!(
                    "remote workflow {} not found",
                    record.remote_workflow_id
                );
                match dedup.survivor {
                    Some(survivor) => {
                        let record = self.repoint_stale(record, &survivor, reason).await?;
                        self.update(record, payload, dedup.removed).await
                    }
                    None => self.recreate(record, payload, reason, dedup.removed).await,
                }
            }
            _ => self.update(record, payload, dedup.removed).await,
        }
    }

    /// Best-effort removal of tenant workflows beyond the highest-ranked one
    async fn remove_duplicates(&self, tag: &TenantTag, referenced: Option<&str>) -> DedupOutcome {
        let workflows = match self.engine.list_workflows().await {
            Ok(workflows) => workflows,
            Err(e) => {
                warn!(error = %e, "Failed to list workflows, skipping deduplication");
                return DedupOutcome::default();
            }
        };

        let mut candidates: Vec<RemoteWorkflow> = workflows
            .into_iter()
            .filter(|w| tag.matches(&w.name))
            .collect();

        if candidates.len() > 1 {
            info!(state = %ReconcileState::RemoteDuplicated, count = candidates.len(), "Found duplicated remote workflows");
        }

        // Referenced by the record, then active, then most recently updated
        candidates.sort_by(|a, b| {
            let rank = |w: &RemoteWorkflow| (referenced == Some(w.id.as_str()), w.active, w.updated_at);
            rank(b).cmp(&rank(a))
        });

        let mut candidates = candidates.into_iter();
        let mut outcome = DedupOutcome {
            survivor: candidates.next().map(|w| w.id),
            ..Default::default()
        };

        for duplicate in candidates {
            if self.retire(&duplicate.id).await {
                outcome.removed += 1;
                outcome.deleted.push(duplicate.id);
            }
        }

        if outcome.removed > 0 {
            counter!("workflow_duplicates_removed_total").increment(outcome.removed as u64);
        }

        outcome
    }

    async fn create(
        &self,
        tenant_id: &str,
        payload: &WorkflowPayload,
        duplicates_removed: usize,
    ) -> Result<ReconcileOutcome, DomainError> {
        let created = self.engine.create_workflow(payload).await?;
        let activated = self.activate(&created.id).await;

        let record = self
            .records
            .insert(WorkflowRecord::new_active(
                tenant_id,
                created.id.as_str(),
                1,
                payload.to_snapshot(),
            ))
            .await?;

        info!(remote_workflow_id = %record.remote_workflow_id, "Created tenant workflow");

        Ok(ReconcileOutcome {
            remote_workflow_id: record.remote_workflow_id,
            version: record.version,
            action: ReconcileAction::Created,
            duplicates_removed,
            activated,
        })
    }

    async fn update(
        &self,
        mut record: WorkflowRecord,
        payload: &WorkflowPayload,
        duplicates_removed: usize,
    ) -> Result<ReconcileOutcome, DomainError> {
        let remote_id = record.remote_workflow_id.clone();

        match self.engine.update_workflow(&remote_id, payload).await {
            Ok(_) => {}
            Err(e) if e.is_credential() => return Err(e),
            Err(e) => {
                warn!(remote_workflow_id = %remote_id, error = %e, "Update failed, recreating workflow");
                self.retire(&remote_id).await;
                let reason = format!("update of {} failed: {}", remote_id, e);
                return self
                    .recreate(record, payload, reason, duplicates_removed)
                    .await;
            }
        }

        let activated = self.reactivate(&remote_id).await;

        record.replace_snapshot(payload.to_snapshot());
        let record = self.records.update(record).await?;

        info!(remote_workflow_id = %remote_id, version = record.version, "Updated tenant workflow");

        Ok(ReconcileOutcome {
            remote_workflow_id: remote_id,
            version: record.version,
            action: ReconcileAction::Updated,
            duplicates_removed,
            activated,
        })
    }

    async fn recreate(
        &self,
        mut old: WorkflowRecord,
        payload: &WorkflowPayload,
        reason: String,
        duplicates_removed: usize,
    ) -> Result<ReconcileOutcome, DomainError> {
        let created = self.engine.create_workflow(payload).await?;
        let activated = self.activate(&created.id).await;
        let version = old.version + 1;
        let tenant_id = old.tenant_id.clone();

        // Archive first so the one-active-record constraint holds
        old.archive(reason);
        self.records.update(old).await?;

        let record = self
            .records
            .insert(WorkflowRecord::new_active(
                tenant_id,
                created.id.as_str(),
                version,
                payload.to_snapshot(),
            ))
            .await?;

        info!(remote_workflow_id = %record.remote_workflow_id, version, "Recreated tenant workflow");

        Ok(ReconcileOutcome {
            remote_workflow_id: record.remote_workflow_id,
            version: record.version,
            action: ReconcileAction::Recreated,
            duplicates_removed,
            activated,
        })
    }

    /// Archive a stale record and take over the tenant's surviving tagged workflow
    async fn repoint_stale(
        &self,
        mut old: WorkflowRecord,
        survivor: &str,
        reason: String,
    ) -> Result<WorkflowRecord, DomainError> {
        let version = old.version + 1;
        let tenant_id = old.tenant_id.clone();
        let snapshot = old.workflow_snapshot.clone();

        old.archive(reason);
        self.records.update(old).await?;

        info!(remote_workflow_id = %survivor, version, "Adopting surviving workflow for stale record");
        self.records
            .insert(WorkflowRecord::new_active(tenant_id, survivor, version, snapshot))
            .await
    }

    /// Deactivate, wait for the engine to settle, activate again
    async fn reactivate(&self, id: &str) -> bool {
        if let Err(e) = self.engine.deactivate_workflow(id).await {
            warn!(remote_workflow_id = %id, error = %e, "Failed to deactivate workflow");
        }

        self.settle(id).await;
        self.activate(id).await
    }

    async fn settle(&self, id: &str) {
        let deadline = Instant::now() + Duration::from_millis(self.config.settle_timeout_ms);
        let poll = Duration::from_millis(self.config.settle_poll_interval_ms);

        loop {
            match self.engine.get_workflow(id).await {
                Ok(Some(workflow)) if workflow.active => {
                    if Instant::now() >= deadline {
                        warn!(remote_workflow_id = %id, "Workflow still active after settle timeout");
                        return;
                    }
                    sleep(poll).await;
                }
                Ok(_) => return,
                Err(e) => {
                    debug!(remote_workflow_id = %id, error = %e, "Cannot poll workflow state, waiting fixed delay");
                    sleep(Duration::from_millis(self.config.settle_fallback_delay_ms)).await;
                    return;
                }
            }
        }
    }

    async fn activate(&self, id: &str) -> bool {
        match self.engine.activate_workflow(id).await {
            Ok(()) => true,
            Err(e) => {
                warn!(remote_workflow_id = %id, error = %e, "Failed to activate workflow");
                counter!("workflow_activation_failures_total").increment(1);
                false
            }
        }
    }

    /// Deactivate then delete; returns whether the delete succeeded
    async fn retire(&self, id: &str) -> bool {
        if let Err(e) = self.engine.deactivate_workflow(id).await {
            warn!(remote_workflow_id = %id, error = %e, "Failed to deactivate workflow before deletion");
        }

        match self.engine.delete_workflow(id).await {
            Ok(()) => {
                info!(remote_workflow_id = %id, "Deleted workflow");
                true
            }
            Err(e) => {
                warn!(remote_workflow_id = %id, error = %e, "Failed to delete workflow");
                false
            }
        }
    }
}
