//! Workflow domain - remote workflows and their local bookkeeping records

mod record;
mod remote;
mod repository;

pub use record::{ReconcileAction, ReconcileOutcome, ReconcileState, WorkflowRecord, WorkflowRecordStatus};
pub use remote::{RemoteWorkflow, WorkflowPayload};
pub use repository::WorkflowRecordRepository;
