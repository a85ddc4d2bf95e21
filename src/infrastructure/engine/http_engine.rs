//! Remote workflow engine over its public REST API

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::{Method, Url};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use super::{HttpClientTrait, HttpResponse};
use crate::domain::credentials::{CreateCredentialRequest, RemoteCredential};
use crate::domain::resilience::{CallOptions, ResilientClient, RetryPolicy};
use crate::domain::workflow::{RemoteWorkflow, WorkflowPayload};
use crate::domain::{DomainError, WorkflowEngine};

/// Circuit breaker name for the engine
pub const ENGINE_DEPENDENCY: &str = "engine";

const PAGE_SIZE: u32 = 250;

/// Where and how to reach the engine API
#[derive(Debug, Clone)]
pub struct EngineEndpoint {
    pub base_url: String,
    pub api_key: String,
    pub api_key_header: String,
}

impl EngineEndpoint {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            api_key_header: "X-API-KEY".to_string(),
        }
    }

    pub fn with_api_key_header(mut self, header: impl Into<String>) -> Self {
        self.api_key_header = header.into();
        self
    }
}

/// List endpoints answer either a bare array or a cursor page
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ListResponse<T> {
    Page {
        data: Vec<T>,
        #[serde(default, rename = "nextCursor")]
        next_cursor: Option<String>,
    },
    Bare(Vec<T>),
}

#[derive(Debug)]
pub struct HttpWorkflowEngine {
    http: Arc<dyn HttpClientTrait>,
    resilience: Arc<ResilientClient>,
    endpoint: EngineEndpoint,
}

impl HttpWorkflowEngine {
    pub fn new(
        http: Arc<dyn HttpClientTrait>,
        resilience: Arc<ResilientClient>,
        endpoint: EngineEndpoint,
    ) -> Self {
        Self {
            http,
            resilience,
            endpoint,
        }
    }

    async fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<&serde_json::Value>,
    ) -> Result<HttpResponse, DomainError> {
        let url = format!("{}{}", self.endpoint.base_url, path);
        self.send(method, &url, body).await
    }

    async fn send(
        &self,
        method: Method,
        url: &str,
        body: Option<&serde_json::Value>,
    ) -> Result<HttpResponse, DomainError> {
        let headers = [(
            self.endpoint.api_key_header.as_str(),
            self.endpoint.api_key.as_str(),
        )];

        debug!(method = %method, url, "Engine request");
        self.http.send_json(method, url, &headers, body).await
    }

    /// Page URL with form-encoded query parameters
    fn list_url(&self, resource: &str, cursor: Option<&str>) -> Result<Url, DomainError> {
        let base = format!("{}/api/v1/{}", self.endpoint.base_url, resource);
        let limit = PAGE_SIZE.to_string();

        let mut params = vec![("limit", limit.as_str())];
        if let Some(cursor) = cursor {
            params.push(("cursor", cursor));
        }

        Url::parse_with_params(&base, &params).map_err(|e| {
            DomainError::configuration(format!("Invalid engine URL '{}': {}", base, e))
        })
    }

    async fn list_all<T: DeserializeOwned>(
        &self,
        resource: &str,
        operation: &'static str,
        not_supported: bool,
    ) -> Result<Vec<T>, DomainError> {
        let mut items = Vec::new();
        let mut cursor: Option<String> = None;

        loop {
            let url = self.list_url(resource, cursor.as_deref())?;
            let url = url.as_str();

            let page: ListResponse<T> = self
                .resilience
                .call(ENGINE_DEPENDENCY, operation, || async move {
                    let response = self.send(Method::GET, url, None).await?;
                    if not_supported && listing_not_supported(&response) {
                        return Err(DomainError::not_supported(format!(
                            "Engine does not support listing {} (HTTP {})",
                            resource, response.status
                        )));
                    }
                    expect_success(operation, &response)?;
                    response.json(ENGINE_DEPENDENCY)
                })
                .await?;

            match page {
                ListResponse::Bare(mut data) => {
                    items.append(&mut data);
                    return Ok(items);
                }
                ListResponse::Page {
                    mut data,
                    next_cursor,
                } => {
                    items.append(&mut data);
                    match next_cursor.filter(|c| !c.is_empty()) {
                        Some(next) => cursor = Some(next),
                        None => return Ok(items),
                    }
                }
            }
        }
    }

    async fn send_payload(
        &self,
        method: Method,
        path: &str,
        payload: &serde_json::Value,
        operation: &'static str,
    ) -> Result<RemoteWorkflow, DomainError> {
        self.resilience
            .call(ENGINE_DEPENDENCY, operation, || {
                let method = method.clone();
                async move {
                    let response = self.request(method, path, Some(payload)).await?;
                    expect_success(operation, &response)?;
                    response.json(ENGINE_DEPENDENCY)
                }
            })
            .await
    }

    async fn post_action(&self, id: &str, action: &'static str) -> Result<(), DomainError> {
        let path = format!("/api/v1/workflows/{}/{}", id, action);
        let path = path.as_str();

        self.resilience
            .call(ENGINE_DEPENDENCY, action, || async move {
                let response = self.request(Method::POST, path, None).await?;
                expect_success(action, &response)
            })
            .await
    }

    async fn delete_resource(&self, path: &str, operation: &'static str) -> Result<(), DomainError> {
        self.resilience
            .call(ENGINE_DEPENDENCY, operation, || async move {
                let response = self.request(Method::DELETE, path, None).await?;
                if response.status == 404 {
                    debug!(path, "Engine resource already deleted");
                    return Ok(());
                }
                expect_success(operation, &response)
            })
            .await
    }
}

/// Map a non-success engine response to the error taxonomy
pub fn classify_response(operation: &str, response: &HttpResponse) -> DomainError {
    let status = response.status;
    let message = format!(
        "{} failed with HTTP {}: {}",
        operation,
        status,
        response.body_excerpt()
    );

    match status {
        401 | 403 => DomainError::credential(ENGINE_DEPENDENCY, message),
        429 | 500..=599 => DomainError::remote_retryable(ENGINE_DEPENDENCY, message, Some(status)),
        _ => DomainError::remote_rejected(ENGINE_DEPENDENCY, message, Some(status)),
    }
}

fn expect_success(operation: &str, response: &HttpResponse) -> Result<(), DomainError> {
    if response.is_success() {
        Ok(())
    } else {
        Err(classify_response(operation, response))
    }
}

fn listing_not_supported(response: &HttpResponse) -> bool {
    match response.status {
        404 | 405 | 501 => true,
        400..=499 => response.body.to_lowercase().contains("method not allowed"),
        _ => false,
    }
}

fn to_body<T: serde::Serialize>(value: &T) -> Result<serde_json::Value, DomainError> {
    serde_json::to_value(value)
        .map_err(|e| DomainError::internal(format!("Failed to serialize request: {}", e)))
}

#[async_trait]
impl WorkflowEngine for HttpWorkflowEngine {
    async fn list_workflows(&self) -> Result<Vec<RemoteWorkflow>, DomainError> {
        self.list_all("workflows", "list_workflows", false).await
    }

    async fn get_workflow(&self, id: &str) -> Result<Option<RemoteWorkflow>, DomainError> {
        let path = format!("/api/v1/workflows/{}", id);
        let path = path.as_str();

        self.resilience
            .call(ENGINE_DEPENDENCY, "get_workflow", || async move {
                let response = self.request(Method::GET, path, None).await?;
                if response.status == 404 {
                    return Ok(None);
                }
                expect_success("get_workflow", &response)?;
                response.json(ENGINE_DEPENDENCY).map(Some)
            })
            .await
    }

    async fn create_workflow(
        &self,
        payload: &WorkflowPayload,
    ) -> Result<RemoteWorkflow, DomainError> {
        let body = to_body(payload)?;
        self.send_payload(Method::POST, "/api/v1/workflows", &body, "create_workflow")
            .await
    }

    async fn update_workflow(
        &self,
        id: &str,
        payload: &WorkflowPayload,
    ) -> Result<RemoteWorkflow, DomainError> {
        let body = to_body(payload)?;
        let path = format!("/api/v1/workflows/{}", id);
        self.send_payload(Method::PUT, &path, &body, "update_workflow")
            .await
    }

    async fn delete_workflow(&self, id: &str) -> Result<(), DomainError> {
        let path = format!("/api/v1/workflows/{}", id);
        self.delete_resource(&path, "delete_workflow").await
    }

    async fn activate_workflow(&self, id: &str) -> Result<(), DomainError> {
        self.post_action(id, "activate").await
    }

    async fn deactivate_workflow(&self, id: &str) -> Result<(), DomainError> {
        self.post_action(id, "deactivate").await
    }

    async fn list_credentials(&self) -> Result<Vec<RemoteCredential>, DomainError> {
        self.list_all("credentials", "list_credentials", true).await
    }

    async fn create_credential(
        &self,
        request: &CreateCredentialRequest,
    ) -> Result<RemoteCredential, DomainError> {
        let body = to_body(request)?;
        let body = &body;

        self.resilience
            .call(ENGINE_DEPENDENCY, "create_credential", || async move {
                let response = self
                    .request(Method::POST, "/api/v1/credentials", Some(body))
                    .await?;
                expect_success("create_credential", &response)?;
                response.json(ENGINE_DEPENDENCY)
            })
            .await
    }

    async fn delete_credential(&self, id: &str) -> Result<(), DomainError> {
        let path = format!("/api/v1/credentials/{}", id);
        self.delete_resource(&path, "delete_credential").await
    }

    async fn ping(&self) -> Result<(), DomainError> {
        let options = CallOptions::default().with_retry(RetryPolicy::no_retry());

        self.resilience
            .call_with(ENGINE_DEPENDENCY, "ping", options, || async move {
                let response = self
                    .request(Method::GET, "/api/v1/workflows?limit=1", None)
                    .await?;
                expect_success("ping", &response)
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::engine::HttpClient;
    use serde_json::json;
    use std::time::Duration;
    use wiremock::matchers::{body_partial_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn engine(server: &MockServer) -> HttpWorkflowEngine {
        let http = HttpClient::new("engine", Duration::from_secs(5)).unwrap();
        let resilience = ResilientClient::new(
            RetryPolicy::new(3).with_base_delay(1).with_max_delay(5),
            Default::default(),
        );

        HttpWorkflowEngine::new(
            Arc::new(http),
            Arc::new(resilience),
            EngineEndpoint::new(server.uri(), "test-key"),
        )
    }

    fn workflow_json(id: &str, active: bool) -> serde_json::Value {
        json!({
            "id": id,
            "name": "Acme Automation [acme0001]",
            "active": active,
            "nodes": [],
            "connections": {},
            "updatedAt": "2024-05-01T10:00:00Z"
        })
    }

    #[tokio::test]
    async fn test_get_workflow_sends_api_key() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/workflows/wf-1"))
            .and(header("X-API-KEY", "test-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(workflow_json("wf-1", true)))
            .mount(&server)
            .await;

        let workflow = engine(&server).get_workflow("wf-1").await.unwrap().unwrap();

        assert_eq!(workflow.id, "wf-1");
        assert!(workflow.active);
        assert!(workflow.updated_at.is_some());
    }

    #[tokio::test]
    async fn test_get_missing_workflow_is_none() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/workflows/gone"))
            .respond_with(ResponseTemplate::new(404))
            .expect(1)
            .mount(&server)
            .await;

        assert!(engine(&server).get_workflow("gone").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_server_errors_are_retried() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/workflows/wf-1"))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(2)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/v1/workflows/wf-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(workflow_json("wf-1", false)))
            .mount(&server)
            .await;

        let workflow = engine(&server).get_workflow("wf-1").await.unwrap();
        assert!(workflow.is_some());
    }

    #[tokio::test]
    async fn test_bad_request_is_not_retried() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/v1/workflows"))
            .respond_with(ResponseTemplate::new(400).set_body_string("invalid node"))
            .expect(1)
            .mount(&server)
            .await;

        let payload = WorkflowPayload {
            name: "wf".to_string(),
            nodes: vec![],
            connections: json!({}),
            settings: json!({}),
        };
        let err = engine(&server).create_workflow(&payload).await.unwrap_err();

        assert!(matches!(
            err,
            DomainError::Remote {
                retryable: false,
                status: Some(400),
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_unauthorized_is_credential_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/workflows"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let err = engine(&server).ping().await.unwrap_err();
        assert!(err.is_credential());
    }

    #[tokio::test]
    async fn test_list_cursor_is_form_encoded() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/workflows"))
            .and(query_param("cursor", "ab+c/d=="))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": [workflow_json("wf-2", false)],
                "nextCursor": null
            })))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/v1/workflows"))
            .and(query_param("limit", "250"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": [workflow_json("wf-1", true)],
                "nextCursor": "ab+c/d=="
            })))
            .up_to_n_times(1)
            .mount(&server)
            .await;

        let workflows = engine(&server).list_workflows().await.unwrap();

        let ids: Vec<&str> = workflows.iter().map(|w| w.id.as_str()).collect();
        assert_eq!(ids, vec!["wf-1", "wf-2"]);
    }

    #[test]
    fn test_list_url_escapes_cursor() {
        let http = HttpClient::new("engine", Duration::from_secs(5)).unwrap();
        let engine = HttpWorkflowEngine::new(
            Arc::new(http),
            Arc::new(ResilientClient::new(RetryPolicy::new(1), Default::default())),
            EngineEndpoint::new("http://engine.local/", "k"),
        );

        let url = engine.list_url("credentials", Some("ab+c/d==")).unwrap();

        assert_eq!(
            url.as_str(),
            "http://engine.local/api/v1/credentials?limit=250&cursor=ab%2Bc%2Fd%3D%3D"
        );
    }

    #[tokio::test]
    async fn test_list_workflows_follows_cursor() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/workflows"))
            .and(query_param("cursor", "page2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": [workflow_json("wf-2", false)],
                "nextCursor": null
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/v1/workflows"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": [workflow_json("wf-1", true)],
                "nextCursor": "page2"
            })))
            .mount(&server)
            .await;

        let workflows = engine(&server).list_workflows().await.unwrap();

        let ids: Vec<&str> = workflows.iter().map(|w| w.id.as_str()).collect();
        assert_eq!(ids, vec!["wf-1", "wf-2"]);
    }

    #[tokio::test]
    async fn test_credential_listing_not_supported() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/credentials"))
            .respond_with(ResponseTemplate::new(405).set_body_string("GET method not allowed"))
            .expect(1)
            .mount(&server)
            .await;

        let err = engine(&server).list_credentials().await.unwrap_err();
        assert!(err.is_not_supported());
    }

    #[tokio::test]
    async fn test_create_credential_posts_type() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/v1/credentials"))
            .and(body_partial_json(json!({ "type": "openAiApi" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "cred-9",
                "name": "Acme OpenAI [acme0001]",
                "type": "openAiApi"
            })))
            .mount(&server)
            .await;

        let request = CreateCredentialRequest::new(
            "Acme OpenAI [acme0001]",
            crate::domain::CredentialKind::OpenAi,
            json!({ "apiKey": "sk-test" }),
        );
        let credential = engine(&server).create_credential(&request).await.unwrap();

        assert_eq!(credential.id, "cred-9");
    }

    #[tokio::test]
    async fn test_delete_missing_workflow_succeeds() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/api/v1/workflows/gone"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        engine(&server).delete_workflow("gone").await.unwrap();
    }

    #[tokio::test]
    async fn test_activate_posts_action() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/v1/workflows/wf-1/activate"))
            .respond_with(ResponseTemplate::new(200).set_body_json(workflow_json("wf-1", true)))
            .expect(1)
            .mount(&server)
            .await;

        engine(&server).activate_workflow("wf-1").await.unwrap();
    }

    #[test]
    fn test_classify_response() {
        let rate_limited = classify_response("op", &HttpResponse::new(429, ""));
        assert!(rate_limited.is_retryable());

        let forbidden = classify_response("op", &HttpResponse::new(403, ""));
        assert!(forbidden.is_credential());

        let conflict = classify_response("op", &HttpResponse::new(409, ""));
        assert!(!conflict.is_retryable());
    }
}
