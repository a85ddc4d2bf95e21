//! In-process workflow engine used when no remote engine is configured

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use crate::domain::credentials::{CreateCredentialRequest, RemoteCredential};
use crate::domain::workflow::{RemoteWorkflow, WorkflowPayload};
use crate::domain::{DomainError, WorkflowEngine};

/// Engine calls that change remote state, in order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineCall {
    CreateWorkflow(String),
    UpdateWorkflow(String),
    DeleteWorkflow(String),
    Activate(String),
    Deactivate(String),
    CreateCredential(String),
    DeleteCredential(String),
}

#[derive(Debug, Default)]
struct EngineState {
    workflows: BTreeMap<String, RemoteWorkflow>,
    credentials: BTreeMap<String, RemoteCredential>,
    calls: Vec<EngineCall>,
    next_id: u64,
    update_failure: Option<DomainError>,
    activation_failure: Option<DomainError>,
}

impl EngineState {
    fn next_id(&mut self, prefix: &str) -> String {
        self.next_id += 1;
        format!("{}-{}", prefix, self.next_id)
    }
}

/// Workflow engine kept in memory.
///
/// Serves development mode and exercises the reconciliation logic in tests. Credential
/// listing can be switched off to mimic engine deployments that reject it.
#[derive(Debug, Clone)]
pub struct InMemoryWorkflowEngine {
    state: Arc<RwLock<EngineState>>,
    credential_listing: bool,
}

impl Default for InMemoryWorkflowEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryWorkflowEngine {
    pub fn new() -> Self {
        Self {
            state: Arc::new(RwLock::new(EngineState::default())),
            credential_listing: true,
        }
    }

    pub fn with_credential_listing(mut self, supported: bool) -> Self {
        self.credential_listing = supported;
        self
    }

    pub async fn seed_workflow(&self, workflow: RemoteWorkflow) {
        let mut state = self.state.write().await;
        state.workflows.insert(workflow.id.clone(), workflow);
    }

    pub async fn seed_credential(&self, credential: RemoteCredential) {
        let mut state = self.state.write().await;
        state.credentials.insert(credential.id.clone(), credential);
    }

    /// Make the next update fail with the given error
    pub async fn fail_next_update(&self, error: DomainError) {
        self.state.write().await.update_failure = Some(error);
    }

    /// Make the next activation fail with the given error
    pub async fn fail_next_activation(&self, error: DomainError) {
        self.state.write().await.activation_failure = Some(error);
    }

    pub async fn workflows(&self) -> Vec<RemoteWorkflow> {
        self.state.read().await.workflows.values().cloned().collect()
    }

    pub async fn credentials(&self) -> Vec<RemoteCredential> {
        self.state.read().await.credentials.values().cloned().collect()
    }

    pub async fn calls(&self) -> Vec<EngineCall> {
        self.state.read().await.calls.clone()
    }

    pub async fn clear_calls(&self) {
        self.state.write().await.calls.clear();
    }

    fn missing(id: &str) -> DomainError {
        DomainError::remote_rejected("engine", format!("Workflow '{}' not found", id), Some(404))
    }
}

#[async_trait]
impl WorkflowEngine for InMemoryWorkflowEngine {
    async fn list_workflows(&self) -> Result<Vec<RemoteWorkflow>, DomainError> {
        Ok(self.workflows().await)
    }

    async fn get_workflow(&self, id: &str) -> Result<Option<RemoteWorkflow>, DomainError> {
        Ok(self.state.read().await.workflows.get(id).cloned())
    }

    async fn create_workflow(
        &self,
        payload: &WorkflowPayload,
    ) -> Result<RemoteWorkflow, DomainError> {
        let mut state = self.state.write().await;
        let id = state.next_id("wf");

        let workflow = RemoteWorkflow {
            id: id.clone(),
            name: payload.name.clone(),
            active: false,
            nodes: payload.nodes.clone(),
            connections: payload.connections.clone(),
            updated_at: Some(Utc::now()),
        };

        state.workflows.insert(id.clone(), workflow.clone());
        state.calls.push(EngineCall::CreateWorkflow(id));
        Ok(workflow)
    }

    async fn update_workflow(
        &self,
        id: &str,
        payload: &WorkflowPayload,
    ) -> Result<RemoteWorkflow, DomainError> {
        let mut state = self.state.write().await;

        if let Some(error) = state.update_failure.take() {
            return Err(error);
        }

        let workflow = state.workflows.get_mut(id).ok_or_else(|| Self::missing(id))?;
        workflow.name = payload.name.clone();
        workflow.nodes = payload.nodes.clone();
        workflow.connections = payload.connections.clone();
        workflow.updated_at = Some(Utc::now());
        let updated = workflow.clone();

        state.calls.push(EngineCall::UpdateWorkflow(id.to_string()));
        Ok(updated)
    }

    async fn delete_workflow(&self, id: &str) -> Result<(), DomainError> {
        let mut state = self.state.write().await;
        state.workflows.remove(id);
        state.calls.push(EngineCall::DeleteWorkflow(id.to_string()));
        Ok(())
    }

    async fn activate_workflow(&self, id: &str) -> Result<(), DomainError> {
        let mut state = self.state.write().await;
        state.calls.push(EngineCall::Activate(id.to_string()));

        if let Some(error) = state.activation_failure.take() {
            return Err(error);
        }

        let workflow = state.workflows.get_mut(id).ok_or_else(|| Self::missing(id))?;
        workflow.active = true;
        Ok(())
    }

    async fn deactivate_workflow(&self, id: &str) -> Result<(), DomainError> {
        let mut state = self.state.write().await;
        state.calls.push(EngineCall::Deactivate(id.to_string()));

        let workflow = state.workflows.get_mut(id).ok_or_else(|| Self::missing(id))?;
        workflow.active = false;
        Ok(())
    }

    async fn list_credentials(&self) -> Result<Vec<RemoteCredential>, DomainError> {
        if !self.credential_listing {
            return Err(DomainError::not_supported(
                "Engine does not support listing credentials",
            ));
        }

        Ok(self.credentials().await)
    }

    async fn create_credential(
        &self,
        request: &CreateCredentialRequest,
    ) -> Result<RemoteCredential, DomainError> {
        let mut state = self.state.write().await;
        let id = state.next_id("cred");

        let credential = RemoteCredential {
            id: id.clone(),
            name: request.name.clone(),
            credential_type: request.credential_type.clone(),
            created_at: Some(Utc::now()),
        };

        state.credentials.insert(id.clone(), credential.clone());
        state.calls.push(EngineCall::CreateCredential(id));
        Ok(credential)
    }

    async fn delete_credential(&self, id: &str) -> Result<(), DomainError> {
        let mut state = self.state.write().await;
        state.credentials.remove(id);
        state.calls.push(EngineCall::DeleteCredential(id.to_string()));
        Ok(())
    }

    async fn ping(&self) -> Result<(), DomainError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn payload(name: &str) -> WorkflowPayload {
        WorkflowPayload {
            name: name.to_string(),
            nodes: vec![json!({ "type": "trigger" })],
            connections: json!({}),
            settings: json!({}),
        }
    }

    #[tokio::test]
    async fn test_create_activate_delete() {
        let engine = InMemoryWorkflowEngine::new();

        let created = engine.create_workflow(&payload("wf")).await.unwrap();
        assert!(!created.active);

        engine.activate_workflow(&created.id).await.unwrap();
        let fetched = engine.get_workflow(&created.id).await.unwrap().unwrap();
        assert!(fetched.active);

        engine.delete_workflow(&created.id).await.unwrap();
        assert!(engine.get_workflow(&created.id).await.unwrap().is_none());

        assert_eq!(
            engine.calls().await,
            vec![
                EngineCall::CreateWorkflow(created.id.clone()),
                EngineCall::Activate(created.id.clone()),
                EngineCall::DeleteWorkflow(created.id.clone()),
            ]
        );
    }

    #[tokio::test]
    async fn test_update_failure_is_consumed_once() {
        let engine = InMemoryWorkflowEngine::new();
        let created = engine.create_workflow(&payload("wf")).await.unwrap();

        engine
            .fail_next_update(DomainError::remote_rejected("engine", "bad", Some(400)))
            .await;

        assert!(engine.update_workflow(&created.id, &payload("v2")).await.is_err());
        let updated = engine.update_workflow(&created.id, &payload("v2")).await.unwrap();
        assert_eq!(updated.name, "v2");
    }

    #[tokio::test]
    async fn test_credential_listing_can_be_disabled() {
        let engine = InMemoryWorkflowEngine::new().with_credential_listing(false);

        let err = engine.list_credentials().await.unwrap_err();
        assert!(err.is_not_supported());
    }
}
