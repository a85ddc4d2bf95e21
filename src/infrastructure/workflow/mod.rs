//! Workflow record storage and reconciliation against the remote engine

mod in_memory_repository;
mod postgres_repository;
mod reconciler;

pub use in_memory_repository::InMemoryWorkflowRecordRepository;
pub use postgres_repository::PostgresWorkflowRecordRepository;
pub use reconciler::{ReconcilerConfig, WorkflowReconciler};
