//! `POST /deploy` - provision a tenant's pipeline or probe the engine

use axum::{
    extract::State,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};

use crate::api::state::AppState;
use crate::api::types::{ApiError, Json};
use crate::domain::credentials::CredentialKind;
use crate::domain::tenant::EmailProvider;
use crate::domain::workflow::ReconcileAction;
use crate::infrastructure::services::{DeploymentRequest, DeploymentResult, EngineAvailability};

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeployBody {
    #[serde(default)]
    pub tenant_id: Option<String>,
    #[serde(default)]
    pub check_only: bool,
    #[serde(default)]
    pub email_provider: Option<EmailProvider>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeployResponse {
    pub success: bool,
    pub workflow_id: String,
    pub version: i32,
    pub action: ReconcileAction,
    pub provider: EmailProvider,
    pub credentials_created: Vec<CredentialKind>,
    pub duplicates_removed: usize,
    pub activated: bool,
}

impl From<DeploymentResult> for DeployResponse {
    fn from(result: DeploymentResult) -> Self {
        Self {
            success: true,
            workflow_id: result.workflow_id,
            version: result.version,
            action: result.action,
            provider: result.provider,
            credentials_created: result.credentials_created,
            duplicates_removed: result.duplicates_removed,
            activated: result.activated,
        }
    }
}

/// Availability report; always `200`, `success` mirrors `available`
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckResponse {
    pub success: bool,
    #[serde(flatten)]
    pub availability: EngineAvailability,
}

pub async fn deploy(
    State(state): State<AppState>,
    Json(body): Json<DeployBody>,
) -> Result<Response, ApiError> {
    if body.check_only {
        let availability = state.deployments.probe_availability().await;
        let response = CheckResponse {
            success: availability.available,
            availability,
        };
        return Ok(Json(response).into_response());
    }

    let mut request = DeploymentRequest::new(body.tenant_id.unwrap_or_default());
    if let Some(provider) = body.email_provider {
        request = request.with_email_provider(provider);
    }

    let result = state.deployments.deploy(request).await?;

    Ok(Json(DeployResponse::from(result)).into_response())
}
