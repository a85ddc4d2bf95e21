//! Credential mapping storage, the shared key pool and credential resolution

mod in_memory;
mod key_pool;
mod postgres;
mod resolver;

pub use in_memory::InMemoryCredentialMappingRepository;
pub use key_pool::KeyPool;
pub use postgres::PostgresCredentialMappingRepository;
pub use resolver::{CredentialResolver, DatastoreSettings, ResolverSettings};
