//! Workflow documents as exchanged with the remote engine

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Workflow owned by the remote engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteWorkflow {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub active: bool,
    #[serde(default)]
    pub nodes: Vec<serde_json::Value>,
    #[serde(default)]
    pub connections: serde_json::Value,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

/// Deployable workflow body sent on create and update
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowPayload {
    pub name: String,
    pub nodes: Vec<serde_json::Value>,
    pub connections: serde_json::Value,
    #[serde(default = "default_settings")]
    pub settings: serde_json::Value,
}

fn default_settings() -> serde_json::Value {
    serde_json::json!({ "executionOrder": "v1" })
}

impl WorkflowPayload {
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn to_snapshot(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}
