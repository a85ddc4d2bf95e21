//! OAuth2 refresh-token grant against mailbox providers

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, Utc};
use serde::Deserialize;
use tracing::debug;

use crate::domain::integration::{OAuthTokens, TokenRefresher};
use crate::domain::resilience::ResilientClient;
use crate::domain::tenant::EmailProvider;
use crate::domain::DomainError;
use crate::infrastructure::engine::{HttpClientTrait, HttpResponse};

/// OAuth client registered with a mailbox provider
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct OAuthClientConfig {
    pub client_id: String,
    pub client_secret: String,
    pub token_url: String,
}

impl OAuthClientConfig {
    pub fn new(
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        token_url: impl Into<String>,
    ) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            token_url: token_url.into(),
        }
    }

    pub fn is_configured(&self) -> bool {
        !self.client_id.is_empty() && !self.token_url.is_empty()
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    expires_in: Option<i64>,
    #[serde(default)]
    scope: Option<String>,
}

/// Refreshes mailbox access tokens over HTTP
#[derive(Debug)]
pub struct HttpTokenRefresher {
    http: Arc<dyn HttpClientTrait>,
    resilience: Arc<ResilientClient>,
    gmail: OAuthClientConfig,
    outlook: OAuthClientConfig,
}

impl HttpTokenRefresher {
    pub fn new(
        http: Arc<dyn HttpClientTrait>,
        resilience: Arc<ResilientClient>,
        gmail: OAuthClientConfig,
        outlook: OAuthClientConfig,
    ) -> Self {
        Self {
            http,
            resilience,
            gmail,
            outlook,
        }
    }

    fn client_for(&self, provider: EmailProvider) -> &OAuthClientConfig {
        match provider {
            EmailProvider::Gmail => &self.gmail,
            EmailProvider::Outlook => &self.outlook,
        }
    }
}

fn classify(service: &str, response: &HttpResponse) -> DomainError {
    let message = format!(
        "Token refresh failed with HTTP {}: {}",
        response.status,
        response.body_excerpt()
    );

    match response.status {
        429 | 500..=599 => DomainError::remote_retryable(service, message, Some(response.status)),
        400 | 401 | 403 => DomainError::credential(service, message),
        _ => DomainError::remote_rejected(service, message, Some(response.status)),
    }
}

#[async_trait]
impl TokenRefresher for HttpTokenRefresher {
    async fn refresh(
        &self,
        provider: EmailProvider,
        refresh_token: &str,
    ) -> Result<OAuthTokens, DomainError> {
        let client = self.client_for(provider);
        if !client.is_configured() {
            return Err(DomainError::configuration(format!(
                "OAuth client for {} is not configured",
                provider
            )));
        }

        let dependency = format!("oauth:{}", provider);
        let service = dependency.as_str();
        let form = [
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
            ("client_id", client.client_id.as_str()),
            ("client_secret", client.client_secret.as_str()),
        ];
        let form = &form[..];

        let response: TokenResponse = self
            .resilience
            .call(service, "refresh_token", || async move {
                let response = self.http.post_form(&client.token_url, form).await?;
                if !response.is_success() {
                    return Err(classify(service, &response));
                }
                response.json(service)
            })
            .await?;

        debug!(provider = %provider, expires_in = ?response.expires_in, "Refreshed OAuth tokens");

        Ok(OAuthTokens {
            access_token: response.access_token,
            refresh_token: response.refresh_token,
            expires_at: response
                .expires_in
                .map(|secs| Utc::now() + ChronoDuration::seconds(secs)),
            scope: response.scope,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::resilience::RetryPolicy;
    use crate::infrastructure::engine::HttpClient;
    use serde_json::json;
    use std::time::Duration;
    use wiremock::matchers::{body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn refresher(server: &MockServer) -> HttpTokenRefresher {
        let http = HttpClient::new("oauth", Duration::from_secs(5)).unwrap();
        let resilience =
            ResilientClient::new(RetryPolicy::new(2).with_base_delay(1), Default::default());
        let client = OAuthClientConfig::new("client-1", "secret-1", format!("{}/token", server.uri()));

        HttpTokenRefresher::new(
            Arc::new(http),
            Arc::new(resilience),
            client,
            OAuthClientConfig::default(),
        )
    }

    #[tokio::test]
    async fn test_refresh_success() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .and(body_string_contains("refresh_token=rt-1"))
            .and(body_string_contains("client_id=client-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": "at-2",
                "expires_in": 3600,
                "scope": "gmail.modify"
            })))
            .mount(&server)
            .await;

        let tokens = refresher(&server)
            .refresh(EmailProvider::Gmail, "rt-1")
            .await
            .unwrap();

        assert_eq!(tokens.access_token, "at-2");
        assert!(tokens.refresh_token.is_none());
        assert!(tokens.expires_at.unwrap() > Utc::now());
    }

    #[tokio::test]
    async fn test_invalid_grant_is_credential_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .respond_with(
                ResponseTemplate::new(400).set_body_json(json!({ "error": "invalid_grant" })),
            )
            .expect(1)
            .mount(&server)
            .await;

        let err = refresher(&server)
            .refresh(EmailProvider::Gmail, "revoked")
            .await
            .unwrap_err();

        assert!(err.is_credential());
    }

    #[tokio::test]
    async fn test_unconfigured_provider() {
        let server = MockServer::start().await;

        let err = refresher(&server)
            .refresh(EmailProvider::Outlook, "rt-1")
            .await
            .unwrap_err();

        assert!(matches!(err, DomainError::Configuration { .. }));
    }
}
