//! Collaborator ports: business content generation and mailbox label provisioning

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::integration::Integration;
use crate::domain::tenant::TenantProfile;
use crate::domain::DomainError;

/// Natural-language text injected into the workflow template
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GeneratedContent {
    pub classifier_prompt: String,
    pub reply_prompt: String,
}

/// Produces classifier and reply prompts from tenant configuration
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ContentGenerator: Send + Sync + std::fmt::Debug {
    async fn generate(&self, profile: &TenantProfile) -> Result<GeneratedContent, DomainError>;
}

/// Reconciles mailbox labels/folders for a tenant. Dispatched fire-and-forget.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LabelProvisioner: Send + Sync + std::fmt::Debug {
    async fn provision(
        &self,
        profile: &TenantProfile,
        integration: &Integration,
    ) -> Result<(), DomainError>;
}
