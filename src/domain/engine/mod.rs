//! Remote workflow engine port

use async_trait::async_trait;

use crate::domain::credentials::{CreateCredentialRequest, RemoteCredential};
use crate::domain::workflow::{RemoteWorkflow, WorkflowPayload};
use crate::domain::DomainError;

/// Operations the provisioning core needs from the remote workflow engine.
///
/// Implementations route every call through the resilient client; callers only see
/// the final outcome.
#[async_trait]
pub trait WorkflowEngine: Send + Sync + std::fmt::Debug {
    async fn list_workflows(&self) -> Result<Vec<RemoteWorkflow>, DomainError>;

    /// `Ok(None)` when the workflow does not exist
    async fn get_workflow(&self, id: &str) -> Result<Option<RemoteWorkflow>, DomainError>;

    async fn create_workflow(&self, payload: &WorkflowPayload)
        -> Result<RemoteWorkflow, DomainError>;

    async fn update_workflow(
        &self,
        id: &str,
        payload: &WorkflowPayload,
    ) -> Result<RemoteWorkflow, DomainError>;

    /// Deleting a workflow that no longer exists succeeds
    async fn delete_workflow(&self, id: &str) -> Result<(), DomainError>;

    async fn activate_workflow(&self, id: &str) -> Result<(), DomainError>;

    async fn deactivate_workflow(&self, id: &str) -> Result<(), DomainError>;

    /// Best-effort: returns `NotSupported` on engine deployments that reject listing
    async fn list_credentials(&self) -> Result<Vec<RemoteCredential>, DomainError>;

    async fn create_credential(
        &self,
        request: &CreateCredentialRequest,
    ) -> Result<RemoteCredential, DomainError>;

    /// Deleting a credential that no longer exists succeeds
    async fn delete_credential(&self, id: &str) -> Result<(), DomainError>;

    /// One lightweight authenticated call used for availability checks
    async fn ping(&self) -> Result<(), DomainError>;
}
