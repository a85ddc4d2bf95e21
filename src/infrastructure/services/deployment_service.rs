//! Deployment service - sequences credential resolution, injection and reconciliation

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use crate::domain::cache::{keys, Cache, CacheExt};
use crate::domain::content::{ContentGenerator, LabelProvisioner};
use crate::domain::credentials::CredentialKind;
use crate::domain::integration::IntegrationRepository;
use crate::domain::tenant::{EmailProvider, TenantProfile, TenantProfileRepository};
use crate::domain::template::{InjectionContext, TemplateInjector};
use crate::domain::workflow::ReconcileAction;
use crate::domain::{DomainError, WorkflowEngine};
use crate::infrastructure::credentials::CredentialResolver;
use crate::infrastructure::observability::{
    record_availability_check, record_deployment, DeploymentMetricParams,
};
use crate::infrastructure::workflow::WorkflowReconciler;

/// Request to deploy a tenant's pipeline
#[derive(Debug, Clone)]
pub struct DeploymentRequest {
    pub tenant_id: String,
    /// Overrides the provider stored on the tenant profile
    pub email_provider: Option<EmailProvider>,
}

impl DeploymentRequest {
    pub fn new(tenant_id: impl Into<String>) -> Self {
        Self {
            tenant_id: tenant_id.into(),
            email_provider: None,
        }
    }

    pub fn with_email_provider(mut self, provider: EmailProvider) -> Self {
        self.email_provider = Some(provider);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeploymentResult {
    pub workflow_id: String,
    pub version: i32,
    pub action: ReconcileAction,
    pub provider: EmailProvider,
    pub credentials_created: Vec<CredentialKind>,
    pub duplicates_removed: usize,
    pub activated: bool,
}

/// Outcome of a single authenticated engine probe
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineAvailability {
    pub available: bool,
    pub latency_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Cache lifetimes used by the deployment service
#[derive(Debug, Clone)]
pub struct DeploymentSettings {
    pub profile_ttl: Duration,
    pub availability_ttl: Duration,
}

impl Default for DeploymentSettings {
    fn default() -> Self {
        Self {
            profile_ttl: Duration::from_secs(300),
            availability_ttl: Duration::from_secs(5),
        }
    }
}

/// Dependencies for DeploymentService
#[derive(Debug, Clone)]
pub struct DeploymentServiceDeps {
    pub tenants: Arc<dyn TenantProfileRepository>,
    pub integrations: Arc<dyn IntegrationRepository>,
    pub engine: Arc<dyn WorkflowEngine>,
    pub cache: Arc<dyn Cache>,
    pub resolver: Arc<CredentialResolver>,
    pub injector: Arc<TemplateInjector>,
    pub reconciler: Arc<WorkflowReconciler>,
    pub content: Arc<dyn ContentGenerator>,
    pub labels: Arc<dyn LabelProvisioner>,
}

/// Single entry point for provisioning a tenant pipeline.
///
/// Runs sequentially inside the caller's task; only label provisioning is spawned.
#[derive(Debug)]
pub struct DeploymentService {
    deps: DeploymentServiceDeps,
    settings: DeploymentSettings,
}

impl DeploymentService {
    pub fn new(deps: DeploymentServiceDeps, settings: DeploymentSettings) -> Self {
        Self { deps, settings }
    }

    #[instrument(skip(self, request), fields(tenant_id = %request.tenant_id))]
    pub async fn deploy(&self, request: DeploymentRequest) -> Result<DeploymentResult, DomainError> {
        let started = Instant::now();
        let tenant_id = request.tenant_id.trim();

        if tenant_id.is_empty() {
            return Err(DomainError::validation("tenantId is required"));
        }

        let result = self.run(tenant_id, request.email_provider).await;

        // Cleared on failure too, so a retry sees the tenant's corrected data
        self.invalidate(tenant_id).await;

        match &result {
            Ok(deployed) => record_deployment(DeploymentMetricParams {
                provider: deployed.provider.as_str(),
                outcome: deployed.action.as_str(),
                duration: started.elapsed(),
                credentials_created: deployed.credentials_created.len(),
                activated: deployed.activated,
            }),
            Err(e) => {
                warn!(error = %e, kind = e.kind(), "Deployment failed");
                record_deployment(DeploymentMetricParams {
                    provider: request.email_provider.map_or("default", |p| p.as_str()),
                    outcome: e.kind(),
                    duration: started.elapsed(),
                    credentials_created: 0,
                    activated: false,
                });
            }
        }

        result
    }

    async fn run(
        &self,
        tenant_id: &str,
        provider: Option<EmailProvider>,
    ) -> Result<DeploymentResult, DomainError> {
        let mut profile = self.load_profile(tenant_id).await?;
        if let Some(provider) = provider {
            profile = profile.with_provider(provider);
        }

        self.dispatch_label_provisioning(&profile).await;

        let credentials = self.deps.resolver.resolve(&profile).await?;
        let content = self.deps.content.generate(&profile).await?;

        let payload = self.deps.injector.inject(&InjectionContext {
            profile: &profile,
            credentials: &credentials,
            content: &content,
        })?;

        let outcome = self.deps.reconciler.reconcile(&profile, &payload).await?;

        info!(
            workflow_id = %outcome.remote_workflow_id,
            version = outcome.version,
            action = outcome.action.as_str(),
            credentials_created = credentials.created.len(),
            "Tenant pipeline deployed"
        );

        Ok(DeploymentResult {
            workflow_id: outcome.remote_workflow_id,
            version: outcome.version,
            action: outcome.action,
            provider: profile.provider_in_use(),
            credentials_created: credentials.created,
            duplicates_removed: outcome.duplicates_removed,
            activated: outcome.activated,
        })
    }

    /// Engine availability, served from a short-lived cache
    #[instrument(skip(self))]
    pub async fn check_availability(&self) -> EngineAvailability {
        let cached: Result<Option<EngineAvailability>, DomainError> =
            self.deps.cache.get(keys::ENGINE_AVAILABILITY).await;
        if let Ok(Some(availability)) = cached {
            return availability;
        }

        self.probe_availability().await
    }

    /// One authenticated engine ping, bypassing the cache. The result still refreshes
    /// the cached value.
    #[instrument(skip(self))]
    pub async fn probe_availability(&self) -> EngineAvailability {
        let started = Instant::now();
        let result = self.deps.engine.ping().await;
        let latency = started.elapsed();

        let availability = EngineAvailability {
            available: result.is_ok(),
            latency_ms: latency.as_millis() as u64,
            error: result.err().map(|e| e.to_string()),
        };

        record_availability_check(availability.available, latency);

        if let Err(e) = self
            .deps
            .cache
            .set(keys::ENGINE_AVAILABILITY, &availability, self.settings.availability_ttl)
            .await
        {
            warn!(error = %e, "Failed to cache engine availability");
        }

        availability
    }

    async fn load_profile(&self, tenant_id: &str) -> Result<TenantProfile, DomainError> {
        let key = keys::tenant_profile(tenant_id);

        let cached: Result<Option<TenantProfile>, DomainError> = self.deps.cache.get(&key).await;
        match cached {
            Ok(Some(profile)) => {
                debug!("Tenant profile served from cache");
                return Ok(profile);
            }
            Ok(None) => {}
            Err(e) => warn!(error = %e, "Failed to read cached tenant profile"),
        }

        let profile = self
            .deps
            .tenants
            .get(tenant_id)
            .await?
            .ok_or_else(|| DomainError::not_found(format!("Tenant '{}' not found", tenant_id)))?;

        if let Err(e) = self
            .deps
            .cache
            .set(&key, &profile, self.settings.profile_ttl)
            .await
        {
            warn!(error = %e, "Failed to cache tenant profile");
        }

        Ok(profile)
    }

    /// Fire-and-forget; the outcome is only logged
    async fn dispatch_label_provisioning(&self, profile: &TenantProfile) {
        let provider = profile.provider_in_use();

        let integration = match self
            .deps
            .integrations
            .get_active(profile.tenant_id(), provider)
            .await
        {
            Ok(Some(integration)) => integration,
            Ok(None) => {
                debug!(provider = %provider, "No active integration, skipping label provisioning");
                return;
            }
            Err(e) => {
                warn!(provider = %provider, error = %e, "Failed to load integration for label provisioning");
                return;
            }
        };

        let labels = self.deps.labels.clone();
        let profile = profile.clone();

        tokio::spawn(async move {
            match labels.provision(&profile, &integration).await {
                Ok(()) => debug!(tenant_id = %profile.tenant_id(), "Label provisioning finished"),
                Err(e) => warn!(tenant_id = %profile.tenant_id(), error = %e, "Label provisioning failed"),
            }
        });
    }

    async fn invalidate(&self, tenant_id: &str) {
        match self.deps.cache.delete_pattern(&keys::tenant_scope(tenant_id)).await {
            Ok(removed) => debug!(removed, "Invalidated tenant cache entries"),
            Err(e) => warn!(error = %e, "Failed to invalidate tenant cache entries"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::content::MockLabelProvisioner;
    use crate::domain::credentials::CredentialMappingRepository;
    use crate::domain::integration::{Integration, MockTokenRefresher, OAuthTokens};
    use crate::domain::tenant::BusinessConfig;
    use crate::infrastructure::cache::InMemoryCache;
    use crate::infrastructure::content::{NoopLabelProvisioner, TemplateContentGenerator};
    use crate::infrastructure::credentials::{
        InMemoryCredentialMappingRepository, KeyPool, ResolverSettings,
    };
    use crate::infrastructure::engine::{EngineCall, InMemoryWorkflowEngine};
    use crate::infrastructure::integration::InMemoryIntegrationRepository;
    use crate::infrastructure::tenant::InMemoryTenantProfileRepository;
    use crate::infrastructure::workflow::{InMemoryWorkflowRecordRepository, ReconcilerConfig};

    const TENANT: &str = "3f2a9c1e-77aa-4c1b-9e0d-5b6c7d8e9f00";

    fn profile() -> TenantProfile {
        TenantProfile::new(
            TENANT,
            BusinessConfig {
                business_name: "Acme Pools".to_string(),
                ..Default::default()
            },
            EmailProvider::Gmail,
        )
        .with_label("Urgent", "Label_1")
    }

    fn refresher() -> MockTokenRefresher {
        let mut refresher = MockTokenRefresher::new();
        refresher.expect_refresh().returning(|_, _| {
            Ok(OAuthTokens {
                access_token: "at-fresh".to_string(),
                refresh_token: None,
                expires_at: None,
                scope: None,
            })
        });
        refresher
    }

    struct Harness {
        engine: InMemoryWorkflowEngine,
        tenants: Arc<InMemoryTenantProfileRepository>,
        cache: Arc<InMemoryCache>,
        mappings: Arc<InMemoryCredentialMappingRepository>,
        service: DeploymentService,
    }

    fn harness_with_labels(labels: Arc<dyn LabelProvisioner>) -> Harness {
        let engine = InMemoryWorkflowEngine::new();
        let engine_dyn: Arc<dyn WorkflowEngine> = Arc::new(engine.clone());
        let cache = Arc::new(InMemoryCache::new());
        let mappings = Arc::new(InMemoryCredentialMappingRepository::new());
        let integrations = Arc::new(InMemoryIntegrationRepository::with_integrations(vec![
            Integration::new(TENANT, EmailProvider::Gmail).with_tokens("at-1", "rt-1"),
            Integration::new(TENANT, EmailProvider::Outlook).with_tokens("at-2", "rt-2"),
        ]));

        let resolver = CredentialResolver::new(
            engine_dyn.clone(),
            integrations.clone(),
            mappings.clone(),
            Arc::new(refresher()),
            KeyPool::new(vec!["sk-1".to_string()]),
            ResolverSettings::default(),
        );

        let reconciler = WorkflowReconciler::new(
            engine_dyn.clone(),
            Arc::new(InMemoryWorkflowRecordRepository::new()),
            ReconcilerConfig::default(),
        );

        let tenants = Arc::new(InMemoryTenantProfileRepository::with_profiles(vec![profile()]));

        let deps = DeploymentServiceDeps {
            tenants: tenants.clone(),
            integrations,
            engine: engine_dyn,
            cache: cache.clone(),
            resolver: Arc::new(resolver),
            injector: Arc::new(TemplateInjector::builtin().unwrap()),
            reconciler: Arc::new(reconciler),
            content: Arc::new(TemplateContentGenerator::new()),
            labels,
        };

        Harness {
            engine,
            tenants,
            cache,
            mappings,
            service: DeploymentService::new(deps, DeploymentSettings::default()),
        }
    }

    fn harness() -> Harness {
        harness_with_labels(Arc::new(NoopLabelProvisioner))
    }

    #[tokio::test]
    async fn test_first_deployment_creates_credential_and_workflow() {
        let h = harness();

        let result = h.service.deploy(DeploymentRequest::new(TENANT)).await.unwrap();

        assert_eq!(result.action, ReconcileAction::Created);
        assert_eq!(result.version, 1);
        assert!(result.activated);
        assert!(result.credentials_created.contains(&CredentialKind::Gmail));

        let mailbox_credentials = h
            .engine
            .credentials()
            .await
            .into_iter()
            .filter(|c| c.kind() == Some(CredentialKind::Gmail))
            .count();
        assert_eq!(mailbox_credentials, 1);

        let workflows = h.engine.workflows().await;
        assert_eq!(workflows.len(), 1);
        assert!(workflows[0].active);
        assert_eq!(workflows[0].name, "Acme Pools Automation [3f2a9c1e-77aa-4c1b-9e0d-5b6c7d8e9f00]");
    }

    #[tokio::test]
    async fn test_repeated_deployment_is_idempotent() {
        let h = harness();

        let first = h.service.deploy(DeploymentRequest::new(TENANT)).await.unwrap();
        let second = h.service.deploy(DeploymentRequest::new(TENANT)).await.unwrap();

        assert_eq!(second.action, ReconcileAction::Updated);
        assert_eq!(second.workflow_id, first.workflow_id);
        assert_eq!(second.version, first.version);
        assert!(second.credentials_created.is_empty());
        assert_eq!(h.engine.workflows().await.len(), 1);
        assert_eq!(h.engine.credentials().await.len(), 2);
    }

    #[tokio::test]
    async fn test_changed_credentials_update_in_place() {
        let h = harness();
        let first = h.service.deploy(DeploymentRequest::new(TENANT)).await.unwrap();

        let mut mapping = h.mappings.get(TENANT).await.unwrap().unwrap();
        let old_llm = mapping.openai_credential_id.clone().unwrap();
        mapping.set(CredentialKind::OpenAi, None);
        h.mappings.upsert(mapping).await.unwrap();
        h.engine.delete_credential(&old_llm).await.unwrap();
        h.engine.clear_calls().await;

        let second = h.service.deploy(DeploymentRequest::new(TENANT)).await.unwrap();

        assert_eq!(second.workflow_id, first.workflow_id);
        assert_eq!(second.version, 1);
        assert_eq!(second.credentials_created, vec![CredentialKind::OpenAi]);

        let id = first.workflow_id;
        let calls = h.engine.calls().await;
        let deactivated = calls.iter().position(|c| *c == EngineCall::Deactivate(id.clone()));
        let activated = calls.iter().position(|c| *c == EngineCall::Activate(id.clone()));
        assert!(deactivated.unwrap() < activated.unwrap());
    }

    #[tokio::test]
    async fn test_provider_override() {
        let h = harness();

        let result = h
            .service
            .deploy(DeploymentRequest::new(TENANT).with_email_provider(EmailProvider::Outlook))
            .await
            .unwrap();

        assert_eq!(result.provider, EmailProvider::Outlook);
        assert!(result.credentials_created.contains(&CredentialKind::Outlook));
        assert!(!result.credentials_created.contains(&CredentialKind::Gmail));
    }

    #[tokio::test]
    async fn test_unknown_tenant_is_not_found() {
        let h = harness();

        let err = h
            .service
            .deploy(DeploymentRequest::new("missing-tenant"))
            .await
            .unwrap_err();

        assert!(matches!(err, DomainError::NotFound { .. }));
        assert!(h.engine.calls().await.is_empty());
    }

    #[tokio::test]
    async fn test_blank_tenant_is_validation_error() {
        let h = harness();

        let err = h.service.deploy(DeploymentRequest::new("  ")).await.unwrap_err();

        assert!(matches!(err, DomainError::Validation { .. }));
    }

    #[tokio::test]
    async fn test_tenant_cache_is_invalidated_after_deploy() {
        let h = harness();

        h.service.deploy(DeploymentRequest::new(TENANT)).await.unwrap();

        assert!(!h.cache.exists(&keys::tenant_profile(TENANT)).await.unwrap());
    }

    #[tokio::test]
    async fn test_failed_deploy_does_not_pin_stale_profile() {
        let h = harness();
        h.service.deploy(DeploymentRequest::new(TENANT)).await.unwrap();
        h.engine
            .fail_next_update(DomainError::credential("engine", "HTTP 401"))
            .await;

        let err = h.service.deploy(DeploymentRequest::new(TENANT)).await.unwrap_err();
        assert!(err.is_credential());
        assert!(!h.cache.exists(&keys::tenant_profile(TENANT)).await.unwrap());

        let renamed = TenantProfile::new(
            TENANT,
            BusinessConfig {
                business_name: "Acme Spas".to_string(),
                ..Default::default()
            },
            EmailProvider::Gmail,
        );
        h.tenants.put(renamed).unwrap();

        let result = h.service.deploy(DeploymentRequest::new(TENANT)).await.unwrap();

        let workflow = h.engine.get_workflow(&result.workflow_id).await.unwrap().unwrap();
        assert_eq!(
            workflow.name,
            "Acme Spas Automation [3f2a9c1e-77aa-4c1b-9e0d-5b6c7d8e9f00]"
        );
    }

    #[tokio::test]
    async fn test_label_provisioning_failure_does_not_fail_deploy() {
        let mut labels = MockLabelProvisioner::new();
        labels
            .expect_provision()
            .returning(|_, _| Err(DomainError::remote_rejected("gmail", "quota", Some(429))));
        let h = harness_with_labels(Arc::new(labels));

        let result = h.service.deploy(DeploymentRequest::new(TENANT)).await;

        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_check_availability_is_cached() {
        let h = harness();

        let availability = h.service.check_availability().await;

        assert!(availability.available);
        assert!(availability.error.is_none());
        assert!(h.cache.exists(keys::ENGINE_AVAILABILITY).await.unwrap());
        assert_eq!(h.service.check_availability().await, availability);
    }

    #[tokio::test]
    async fn test_probe_availability_ignores_cached_result() {
        let h = harness();
        let stale = EngineAvailability {
            available: false,
            latency_ms: 0,
            error: Some("engine down".to_string()),
        };
        h.cache
            .set(keys::ENGINE_AVAILABILITY, &stale, Duration::from_secs(60))
            .await
            .unwrap();

        assert_eq!(h.service.check_availability().await, stale);

        let probed = h.service.probe_availability().await;
        assert!(probed.available);
        assert!(probed.error.is_none());
        assert_eq!(h.service.check_availability().await, probed);
    }
}
