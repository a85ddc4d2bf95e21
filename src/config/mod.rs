//! Layered application configuration

mod app_config;

pub use app_config::{
    AppConfig, CacheSettings, CredentialsConfig, EngineConfig, LogFormat, LoggingConfig,
    ResilienceConfig, ServerConfig, StorageConfig, TemplatesConfig,
};
