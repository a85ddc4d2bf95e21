use std::time::Duration;

use async_trait::async_trait;
use reqwest::Method;
use serde::de::DeserializeOwned;

use crate::domain::DomainError;

/// Raw HTTP response; status interpretation is left to the adapter
#[derive(Debug, Clone, PartialEq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

impl HttpResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn json<T: DeserializeOwned>(&self, service: &str) -> Result<T, DomainError> {
        serde_json::from_str(&self.body).map_err(|e| {
            DomainError::remote_rejected(
                service,
                format!("Failed to parse response: {}", e),
                Some(self.status),
            )
        })
    }

    /// Body trimmed for log and error messages
    pub fn body_excerpt(&self) -> &str {
        let body = self.body.trim();
        match body.char_indices().nth(200) {
            Some((idx, _)) => &body[..idx],
            None => body,
        }
    }
}

/// Trait for HTTP client operations (for mocking)
#[async_trait]
pub trait HttpClientTrait: Send + Sync + std::fmt::Debug {
    async fn send_json(
        &self,
        method: Method,
        url: &str,
        headers: &[(&str, &str)],
        body: Option<&serde_json::Value>,
    ) -> Result<HttpResponse, DomainError>;

    async fn post_form(
        &self,
        url: &str,
        form: &[(&str, &str)],
    ) -> Result<HttpResponse, DomainError>;
}

/// Real HTTP client using reqwest.
///
/// Transport failures and timeouts become retryable `Remote` errors attributed to
/// `service`; any HTTP status is returned as a response.
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: reqwest::Client,
    service: String,
}

impl HttpClient {
    pub fn new(service: impl Into<String>, timeout: Duration) -> Result<Self, DomainError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| DomainError::configuration(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            service: service.into(),
        })
    }

    fn transport_error(&self, e: reqwest::Error) -> DomainError {
        let kind = if e.is_timeout() { "timed out" } else { "failed" };
        DomainError::remote_retryable(&self.service, format!("Request {}: {}", kind, e), None)
    }

    async fn read(&self, response: reqwest::Response) -> Result<HttpResponse, DomainError> {
        let status = response.status().as_u16();
        let body = response.text().await.map_err(|e| self.transport_error(e))?;

        Ok(HttpResponse { status, body })
    }
}

#[async_trait]
impl HttpClientTrait for HttpClient {
    async fn send_json(
        &self,
        method: Method,
        url: &str,
        headers: &[(&str, &str)],
        body: Option<&serde_json::Value>,
    ) -> Result<HttpResponse, DomainError> {
        let mut request = self
            .client
            .request(method, url)
            .header("Accept", "application/json");

        for (key, value) in headers {
            request = request.header(*key, *value);
        }

        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await.map_err(|e| self.transport_error(e))?;
        self.read(response).await
    }

    async fn post_form(
        &self,
        url: &str,
        form: &[(&str, &str)],
    ) -> Result<HttpResponse, DomainError> {
        let response = self
            .client
            .post(url)
            .header("Accept", "application/json")
            .form(form)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        self.read(response).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_string_contains, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_send_json_returns_non_success_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/missing"))
            .and(header("X-API-KEY", "secret"))
            .respond_with(ResponseTemplate::new(404).set_body_string("not found"))
            .mount(&server)
            .await;

        let client = HttpClient::new("engine", Duration::from_secs(5)).unwrap();
        let response = client
            .send_json(
                Method::GET,
                &format!("{}/missing", server.uri()),
                &[("X-API-KEY", "secret")],
                None,
            )
            .await
            .unwrap();

        assert_eq!(response.status, 404);
        assert!(!response.is_success());
        assert_eq!(response.body, "not found");
    }

    #[tokio::test]
    async fn test_post_form_encodes_fields() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .and(body_string_contains("grant_type=refresh_token"))
            .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"ok":true}"#))
            .mount(&server)
            .await;

        let client = HttpClient::new("oauth", Duration::from_secs(5)).unwrap();
        let response = client
            .post_form(
                &format!("{}/token", server.uri()),
                &[("grant_type", "refresh_token")],
            )
            .await
            .unwrap();

        let body: serde_json::Value = response.json("oauth").unwrap();
        assert_eq!(body["ok"], true);
    }

    #[tokio::test]
    async fn test_transport_error_is_retryable() {
        let client = HttpClient::new("engine", Duration::from_millis(200)).unwrap();

        let err = client
            .send_json(Method::GET, "http://127.0.0.1:1/unreachable", &[], None)
            .await
            .unwrap_err();

        assert!(err.is_retryable());
    }

    #[test]
    fn test_body_excerpt_truncates() {
        let response = HttpResponse::new(500, "x".repeat(500));
        assert_eq!(response.body_excerpt().len(), 200);
    }
}
