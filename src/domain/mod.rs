//! Domain layer - provisioning entities, ports and the pure parts of the engine

pub mod cache;
pub mod content;
pub mod credentials;
pub mod engine;
pub mod error;
pub mod integration;
pub mod resilience;
pub mod template;
pub mod tenant;
pub mod workflow;

pub use cache::{Cache, CacheExt};
pub use content::{ContentGenerator, GeneratedContent, LabelProvisioner};
pub use credentials::{
    CreateCredentialRequest, CredentialKind, CredentialMapping, CredentialMappingRepository,
    RemoteCredential, ResolvedCredentials,
};
pub use engine::WorkflowEngine;
pub use error::DomainError;
pub use integration::{
    Integration, IntegrationRepository, IntegrationStatus, OAuthTokens, TokenRefresher,
};
pub use resilience::{
    CallOptions, CircuitBreaker, CircuitBreakerConfig, CircuitState, ResilientClient, RetryPolicy,
};
pub use template::{InjectionContext, TemplateInjector, WorkflowTemplate};
pub use tenant::{BusinessConfig, Contact, EmailProvider, TenantProfile, TenantProfileRepository, TenantTag};
pub use workflow::{
    ReconcileAction, ReconcileOutcome, ReconcileState, RemoteWorkflow, WorkflowPayload,
    WorkflowRecord, WorkflowRecordRepository, WorkflowRecordStatus,
};
