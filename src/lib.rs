//! Pipeline Provisioner
//!
//! Provisions one email-automation workflow per tenant on a remote workflow engine:
//! - Resolves and deduplicates the credentials the workflow binds
//! - Renders the provider template with tenant data
//! - Reconciles the deployed workflow against the local record, self-healing drift

pub mod api;
pub mod cli;
pub mod config;
pub mod domain;
pub mod infrastructure;

pub use crate::config::AppConfig;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use serde::Deserialize;
use sqlx::PgPool;
use tracing::{info, warn};

use crate::api::state::AppState;
use crate::config::TemplatesConfig;
use crate::domain::{
    CredentialMappingRepository, EmailProvider, Integration, IntegrationRepository,
    ResilientClient, TemplateInjector, TenantProfile, TenantProfileRepository, WorkflowEngine,
    WorkflowRecordRepository, WorkflowTemplate,
};
use crate::infrastructure::{
    cache::InMemoryCache,
    content::{NoopLabelProvisioner, TemplateContentGenerator},
    credentials::{
        CredentialResolver, InMemoryCredentialMappingRepository, KeyPool,
        PostgresCredentialMappingRepository,
    },
    engine::{EngineEndpoint, HttpClient, HttpWorkflowEngine, InMemoryWorkflowEngine, ENGINE_DEPENDENCY},
    integration::{HttpTokenRefresher, InMemoryIntegrationRepository, PostgresIntegrationRepository},
    services::{DeploymentService, DeploymentServiceDeps},
    storage::{connect_pool, run_storage_migrations, StorageBackend},
    tenant::{InMemoryTenantProfileRepository, PostgresTenantProfileRepository},
    workflow::{InMemoryWorkflowRecordRepository, PostgresWorkflowRecordRepository, WorkflowReconciler},
};

/// Read when `credentials.llm_api_keys` is empty
const LLM_API_KEY_ENV: &str = "OPENAI_API_KEY";

/// Tenants and integrations loaded into the in-memory backend at startup
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct SeedData {
    pub tenants: Vec<TenantProfile>,
    pub integrations: Vec<Integration>,
}

/// Repositories behind one deployment service
#[derive(Debug, Clone)]
pub struct Repositories {
    pub tenants: Arc<dyn TenantProfileRepository>,
    pub integrations: Arc<dyn IntegrationRepository>,
    pub mappings: Arc<dyn CredentialMappingRepository>,
    pub records: Arc<dyn WorkflowRecordRepository>,
}

impl Repositories {
    pub fn in_memory(seed: SeedData) -> Self {
        Self {
            tenants: Arc::new(InMemoryTenantProfileRepository::with_profiles(seed.tenants)),
            integrations: Arc::new(InMemoryIntegrationRepository::with_integrations(
                seed.integrations,
            )),
            mappings: Arc::new(InMemoryCredentialMappingRepository::new()),
            records: Arc::new(InMemoryWorkflowRecordRepository::new()),
        }
    }

    pub fn postgres(pool: PgPool) -> Self {
        Self {
            tenants: Arc::new(PostgresTenantProfileRepository::new(pool.clone())),
            integrations: Arc::new(PostgresIntegrationRepository::new(pool.clone())),
            mappings: Arc::new(PostgresCredentialMappingRepository::new(pool.clone())),
            records: Arc::new(PostgresWorkflowRecordRepository::new(pool)),
        }
    }
}

/// Create the application state from configuration
pub async fn create_app_state(config: &AppConfig) -> anyhow::Result<AppState> {
    let backend = StorageBackend::parse(&config.storage.backend)
        .with_context(|| format!("Unknown storage backend '{}'", config.storage.backend))?;
    info!(backend = ?backend, "Storage backend selected");

    let repositories = match backend {
        StorageBackend::Postgres => {
            let pool = connect_pool(&config.storage.postgres()).await?;
            if config.storage.run_migrations {
                let version = run_storage_migrations(&pool).await?;
                info!(version = ?version, "Storage schema up to date");
            }
            Repositories::postgres(pool)
        }
        StorageBackend::InMemory => {
            Repositories::in_memory(load_seed(config.storage.seed_file.as_deref())?)
        }
    };

    let resilience = Arc::new(ResilientClient::new(
        config.resilience.retry.clone(),
        config.resilience.circuit_breaker.clone(),
    ));
    let engine = create_engine(config, resilience.clone())?;

    build_app_state(config, repositories, engine, resilience)
}

/// Wire the deployment service over the given storage and engine
pub fn build_app_state(
    config: &AppConfig,
    repositories: Repositories,
    engine: Arc<dyn WorkflowEngine>,
    resilience: Arc<ResilientClient>,
) -> anyhow::Result<AppState> {
    let oauth_http = HttpClient::new(
        "oauth",
        Duration::from_secs(config.credentials.oauth_timeout_secs),
    )?;
    let token_refresher = HttpTokenRefresher::new(
        Arc::new(oauth_http),
        resilience,
        config.credentials.gmail.clone(),
        config.credentials.outlook.clone(),
    );

    let key_pool =
        KeyPool::with_env_fallback(config.credentials.llm_api_keys.clone(), LLM_API_KEY_ENV);
    if key_pool.is_empty() {
        warn!("No LLM API keys configured, first deployments will fail");
    } else {
        info!(keys = key_pool.len(), "LLM key pool ready");
    }

    let resolver = CredentialResolver::new(
        engine.clone(),
        repositories.integrations.clone(),
        repositories.mappings,
        Arc::new(token_refresher),
        key_pool,
        config.credentials.resolver_settings(),
    );

    let reconciler = WorkflowReconciler::new(
        engine.clone(),
        repositories.records,
        config.reconciler.clone(),
    );

    let deps = DeploymentServiceDeps {
        tenants: repositories.tenants,
        integrations: repositories.integrations,
        engine,
        cache: Arc::new(InMemoryCache::with_config(config.cache.in_memory())),
        resolver: Arc::new(resolver),
        injector: Arc::new(load_templates(&config.templates)?),
        reconciler: Arc::new(reconciler),
        content: Arc::new(TemplateContentGenerator::new()),
        labels: Arc::new(NoopLabelProvisioner),
    };

    Ok(AppState::new(Arc::new(DeploymentService::new(
        deps,
        config.cache.deployment(),
    ))))
}

fn create_engine(
    config: &AppConfig,
    resilience: Arc<ResilientClient>,
) -> anyhow::Result<Arc<dyn WorkflowEngine>> {
    let Some(base_url) = config.engine.base_url.as_deref().filter(|url| !url.is_empty()) else {
        warn!("No engine base URL configured, using the in-memory workflow engine");
        return Ok(Arc::new(InMemoryWorkflowEngine::new()));
    };

    let http = HttpClient::new(ENGINE_DEPENDENCY, config.engine.timeout())?;
    let endpoint = EngineEndpoint::new(base_url.trim_end_matches('/'), &config.engine.api_key)
        .with_api_key_header(&config.engine.api_key_header);

    info!(base_url, "Using remote workflow engine");
    Ok(Arc::new(HttpWorkflowEngine::new(Arc::new(http), resilience, endpoint)))
}

fn load_seed(path: Option<&str>) -> anyhow::Result<SeedData> {
    let Some(path) = path else {
        return Ok(SeedData::default());
    };

    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read seed file '{}'", path))?;
    let seed: SeedData = serde_json::from_str(&raw)
        .with_context(|| format!("Failed to parse seed file '{}'", path))?;

    info!(
        tenants = seed.tenants.len(),
        integrations = seed.integrations.len(),
        "Loaded seed data"
    );
    Ok(seed)
}

/// Built-in templates, replaced per provider by configured files
fn load_templates(config: &TemplatesConfig) -> anyhow::Result<TemplateInjector> {
    let mut injector = TemplateInjector::builtin()?;

    let overrides = [
        (EmailProvider::Gmail, config.gmail_path.as_deref()),
        (EmailProvider::Outlook, config.outlook_path.as_deref()),
    ];

    for (provider, path) in overrides {
        let Some(path) = path else { continue };

        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {} template '{}'", provider, path))?;
        let template = WorkflowTemplate::parse(raw)
            .with_context(|| format!("Invalid {} template '{}'", provider, path))?;

        info!(provider = %provider, path, "Loaded workflow template override");
        injector = injector.with_template(provider, template);
    }

    Ok(injector)
}
