use std::time::Duration;

use serde::Deserialize;

use crate::domain::resilience::{CircuitBreakerConfig, RetryPolicy};
use crate::infrastructure::cache::InMemoryCacheConfig;
use crate::infrastructure::credentials::{DatastoreSettings, ResolverSettings};
use crate::infrastructure::integration::OAuthClientConfig;
use crate::infrastructure::observability::ObservabilityConfig;
use crate::infrastructure::services::DeploymentSettings;
use crate::infrastructure::storage::PostgresConfig;
use crate::infrastructure::workflow::ReconcilerConfig;

/// Application configuration
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub logging: LoggingConfig,
    pub observability: ObservabilityConfig,
    pub storage: StorageConfig,
    pub engine: EngineConfig,
    pub resilience: ResilienceConfig,
    pub credentials: CredentialsConfig,
    pub reconciler: ReconcilerConfig,
    pub templates: TemplatesConfig,
    pub cache: CacheSettings,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Origins allowed by CORS; empty allows any
    pub cors_origins: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// `memory` or `postgres`
    pub backend: String,
    pub database_url: String,
    pub max_connections: u32,
    pub run_migrations: bool,
    /// JSON file with tenant profiles and integrations loaded into the in-memory backend
    pub seed_file: Option<String>,
}

impl StorageConfig {
    pub fn postgres(&self) -> PostgresConfig {
        PostgresConfig::new(&self.database_url).with_max_connections(self.max_connections)
    }
}

/// Remote workflow engine connection
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Without a base URL the in-memory engine is used
    pub base_url: Option<String>,
    pub api_key: String,
    pub api_key_header: String,
    pub timeout_secs: u64,
}

impl EngineConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ResilienceConfig {
    pub retry: RetryPolicy,
    pub circuit_breaker: CircuitBreakerConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CredentialsConfig {
    /// Shared LLM keys handed out round-robin
    pub llm_api_keys: Vec<String>,
    pub gmail: OAuthClientConfig,
    pub outlook: OAuthClientConfig,
    pub oauth_timeout_secs: u64,
    pub datastore_url: Option<String>,
    pub datastore_service_key: Option<String>,
}

impl CredentialsConfig {
    pub fn resolver_settings(&self) -> ResolverSettings {
        let datastore = match (&self.datastore_url, &self.datastore_service_key) {
            (Some(url), Some(key)) if !url.is_empty() && !key.is_empty() => {
                Some(DatastoreSettings {
                    url: url.clone(),
                    service_key: key.clone(),
                })
            }
            _ => None,
        };

        ResolverSettings {
            gmail_oauth: self.gmail.clone(),
            outlook_oauth: self.outlook.clone(),
            datastore,
        }
    }
}

/// Paths overriding the built-in workflow templates
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct TemplatesConfig {
    pub gmail_path: Option<String>,
    pub outlook_path: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    pub max_capacity: u64,
    pub default_ttl_secs: u64,
    pub profile_ttl_secs: u64,
    pub availability_ttl_secs: u64,
}

impl CacheSettings {
    pub fn in_memory(&self) -> InMemoryCacheConfig {
        InMemoryCacheConfig::default()
            .with_max_capacity(self.max_capacity)
            .with_default_ttl(Duration::from_secs(self.default_ttl_secs))
    }

    pub fn deployment(&self) -> DeploymentSettings {
        DeploymentSettings {
            profile_ttl: Duration::from_secs(self.profile_ttl_secs),
            availability_ttl: Duration::from_secs(self.availability_ttl_secs),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            cors_origins: Vec::new(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::default(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: "memory".to_string(),
            database_url: "postgres://localhost/pipeline_provisioner".to_string(),
            max_connections: 10,
            run_migrations: true,
            seed_file: None,
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            api_key: String::new(),
            api_key_header: "X-API-KEY".to_string(),
            timeout_secs: 30,
        }
    }
}

impl Default for CredentialsConfig {
    fn default() -> Self {
        Self {
            llm_api_keys: Vec::new(),
            gmail: OAuthClientConfig::new("", "", "https://oauth2.googleapis.com/token"),
            outlook: OAuthClientConfig::new(
                "",
                "",
                "https://login.microsoftonline.com/common/oauth2/v2.0/token",
            ),
            oauth_timeout_secs: 15,
            datastore_url: None,
            datastore_service_key: None,
        }
    }
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            max_capacity: 10_000,
            default_ttl_secs: 3600,
            profile_ttl_secs: 300,
            availability_ttl_secs: 5,
        }
    }
}

impl AppConfig {
    pub fn load() -> Result<Self, config::ConfigError> {
        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name("config/local").required(false))
            .add_source(
                config::Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("credentials.llm_api_keys")
                    .with_list_parse_key("server.cors_origins"),
            )
            .build()?;

        config.try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();

        assert_eq!(config.server.port, 8080);
        assert_eq!(config.storage.backend, "memory");
        assert!(config.engine.base_url.is_none());
        assert_eq!(config.engine.api_key_header, "X-API-KEY");
        assert_eq!(config.resilience.retry.max_attempts, 3);
        assert_eq!(config.resilience.circuit_breaker.failure_threshold, 5);
        assert_eq!(config.reconciler.settle_poll_interval_ms, 250);
        assert_eq!(config.cache.availability_ttl_secs, 5);
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let source = r#"{
            "engine": { "base_url": "https://engine.example.com", "api_key": "k" },
            "resilience": { "retry": { "max_attempts": 5 } },
            "credentials": { "llm_api_keys": ["sk-1", "sk-2"] }
        }"#;

        let config: AppConfig = config::Config::builder()
            .add_source(config::File::from_str(source, config::FileFormat::Json))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();

        assert_eq!(config.engine.base_url.as_deref(), Some("https://engine.example.com"));
        assert_eq!(config.engine.timeout_secs, 30);
        assert_eq!(config.resilience.retry.max_attempts, 5);
        assert_eq!(config.resilience.retry.base_delay_ms, 1000);
        assert_eq!(config.credentials.llm_api_keys.len(), 2);
        assert_eq!(
            config.credentials.gmail.token_url,
            "https://oauth2.googleapis.com/token"
        );
    }

    #[test]
    fn test_datastore_requires_url_and_key() {
        let mut credentials = CredentialsConfig::default();
        assert!(credentials.resolver_settings().datastore.is_none());

        credentials.datastore_url = Some("https://db.example.com".to_string());
        assert!(credentials.resolver_settings().datastore.is_none());

        credentials.datastore_service_key = Some("service-key".to_string());
        assert!(credentials.resolver_settings().datastore.is_some());
    }
}
