//! Application state shared by the HTTP handlers

use std::sync::Arc;

use crate::infrastructure::services::DeploymentService;

#[derive(Debug, Clone)]
pub struct AppState {
    pub deployments: Arc<DeploymentService>,
}

impl AppState {
    pub fn new(deployments: Arc<DeploymentService>) -> Self {
        Self { deployments }
    }
}
