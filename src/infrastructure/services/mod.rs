//! Infrastructure services

mod deployment_service;

pub use deployment_service::{
    DeploymentRequest, DeploymentResult, DeploymentService, DeploymentServiceDeps,
    DeploymentSettings, EngineAvailability,
};
