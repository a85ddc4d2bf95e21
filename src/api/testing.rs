//! Fixtures for router-level tests

use std::sync::Arc;

use crate::api::state::AppState;
use crate::config::AppConfig;
use crate::domain::integration::Integration;
use crate::domain::resilience::ResilientClient;
use crate::domain::tenant::{BusinessConfig, EmailProvider, TenantProfile};
use crate::domain::WorkflowEngine;
use crate::infrastructure::engine::InMemoryWorkflowEngine;
use crate::{build_app_state, Repositories, SeedData};

pub const TENANT: &str = "9b1d4e2f-0c3a-4f5e-8d7c-6b5a4f3e2d1c";

/// App state over in-memory storage seeded with one tenant and both mailboxes
pub fn state_with_tenant() -> (AppState, InMemoryWorkflowEngine) {
    let mut config = AppConfig::default();
    config.credentials.llm_api_keys = vec!["sk-test".to_string()];

    let seed = SeedData {
        tenants: vec![TenantProfile::new(
            TENANT,
            BusinessConfig {
                business_name: "Harbor Plumbing".to_string(),
                ..Default::default()
            },
            EmailProvider::Gmail,
        )],
        integrations: vec![
            Integration::new(TENANT, EmailProvider::Gmail).with_tokens("at-1", "rt-1"),
            Integration::new(TENANT, EmailProvider::Outlook).with_tokens("at-2", "rt-2"),
        ],
    };

    let engine = InMemoryWorkflowEngine::new();
    let engine_dyn: Arc<dyn WorkflowEngine> = Arc::new(engine.clone());
    let resilience = Arc::new(ResilientClient::new(
        config.resilience.retry.clone(),
        config.resilience.circuit_breaker.clone(),
    ));

    let state = build_app_state(&config, Repositories::in_memory(seed), engine_dyn, resilience)
        .expect("app state");

    (state, engine)
}
