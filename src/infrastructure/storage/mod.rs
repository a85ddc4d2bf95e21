//! Storage infrastructure - PostgreSQL pool, schema and backend selection

pub mod migrations;
mod postgres;

pub use migrations::{
    revert_last_storage_migration, run_storage_migrations, Migration, PostgresMigrator,
};
pub use postgres::{connect_pool, map_write_error, PostgresConfig};

/// Backing store for repositories
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    /// In-memory storage (for testing/development)
    InMemory,
    Postgres,
}

impl StorageBackend {
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "memory" | "inmemory" | "in-memory" | "in_memory" => Some(Self::InMemory),
            "postgres" | "postgresql" | "pg" => Some(Self::Postgres),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_parse() {
        assert_eq!(StorageBackend::parse("in_memory"), Some(StorageBackend::InMemory));
        assert_eq!(StorageBackend::parse("Postgres"), Some(StorageBackend::Postgres));
        assert_eq!(StorageBackend::parse("redis"), None);
    }
}
