//! Mailbox integrations: storage and OAuth token refresh

mod in_memory;
mod oauth;
mod postgres;

pub use in_memory::InMemoryIntegrationRepository;
pub use oauth::{HttpTokenRefresher, OAuthClientConfig};
pub use postgres::PostgresIntegrationRepository;
