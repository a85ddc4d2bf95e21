//! Database migrations infrastructure

use sqlx::postgres::PgPool;
use tracing::info;

use crate::domain::DomainError;

/// Applies versioned SQL migrations, tracked in `_migrations`
#[derive(Debug)]
pub struct PostgresMigrator {
    pool: PgPool,
}

impl PostgresMigrator {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Creates the migrations table if it doesn't exist
    async fn ensure_migrations_table(&self) -> Result<(), DomainError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS _migrations (
                version BIGINT PRIMARY KEY,
                description TEXT NOT NULL,
                installed_on TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                success BOOLEAN NOT NULL DEFAULT TRUE
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| DomainError::storage(format!("Failed to create migrations table: {}", e)))?;

        Ok(())
    }

    /// Applies one migration unless already recorded
    pub async fn run_migration(&self, migration: &Migration) -> Result<(), DomainError> {
        self.ensure_migrations_table().await?;

        let applied: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM _migrations WHERE version = $1)",
        )
        .bind(migration.version)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| DomainError::storage(format!("Failed to check migration status: {}", e)))?;

        if applied {
            return Ok(());
        }

        sqlx::raw_sql(&migration.up)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                DomainError::storage(format!(
                    "Failed to run migration {}: {}",
                    migration.version, e
                ))
            })?;

        sqlx::query(
            "INSERT INTO _migrations (version, description) VALUES ($1, $2)",
        )
        .bind(migration.version)
        .bind(&migration.description)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            DomainError::storage(format!("Failed to record migration {}: {}", migration.version, e))
        })?;

        Ok(())
    }

    /// Reverts a single migration
    pub async fn revert_migration(&self, migration: &Migration) -> Result<(), DomainError> {
        self.ensure_migrations_table().await?;

        let applied: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM _migrations WHERE version = $1)",
        )
        .bind(migration.version)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| DomainError::storage(format!("Failed to check migration status: {}", e)))?;

        if !applied {
            return Ok(());
        }

        sqlx::raw_sql(&migration.down)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                DomainError::storage(format!(
                    "Failed to revert migration {}: {}",
                    migration.version, e
                ))
            })?;

        sqlx::query("DELETE FROM _migrations WHERE version = $1")
            .bind(migration.version)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                DomainError::storage(format!(
                    "Failed to remove migration record {}: {}",
                    migration.version, e
                ))
            })?;

        Ok(())
    }

    /// Returns the latest applied migration version
    pub async fn current_version(&self) -> Result<Option<i64>, DomainError> {
        self.ensure_migrations_table().await?;

        let version: Option<i64> = sqlx::query_scalar(
            "SELECT MAX(version) FROM _migrations WHERE success = TRUE",
        )
        .fetch_one(&self.pool)
        .await
        .map_err(|e| DomainError::storage(format!("Failed to get migration version: {}", e)))?;

        Ok(version)
    }

    /// Returns all applied migration versions
    pub async fn applied_versions(&self) -> Result<Vec<i64>, DomainError> {
        self.ensure_migrations_table().await?;

        let versions: Vec<i64> = sqlx::query_scalar(
            "SELECT version FROM _migrations WHERE success = TRUE ORDER BY version",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| DomainError::storage(format!("Failed to get applied migrations: {}", e)))?;

        Ok(versions)
    }
}

/// Represents a database migration
#[derive(Debug, Clone)]
pub struct Migration {
    /// Migration version (timestamp-based recommended)
    pub version: i64,
    /// Human-readable description
    pub description: String,
    /// SQL to run when applying the migration
    pub up: String,
    /// SQL to run when reverting the migration
    pub down: String,
}

impl Migration {
    pub fn new(
        version: i64,
        description: impl Into<String>,
        up: impl Into<String>,
        down: impl Into<String>,
    ) -> Self {
        Self {
            version,
            description: description.into(),
            up: up.into(),
            down: down.into(),
        }
    }
}

/// Schema for the provisioning tables, oldest first
pub fn storage_migrations() -> Vec<Migration> {
    vec![
        Migration::new(
            1,
            "Create tenant_profiles table",
            r#"
            CREATE TABLE IF NOT EXISTS tenant_profiles (
                tenant_id VARCHAR(255) PRIMARY KEY,
                business_config JSONB NOT NULL DEFAULT '{}'::jsonb,
                managers JSONB NOT NULL DEFAULT '[]'::jsonb,
                suppliers JSONB NOT NULL DEFAULT '[]'::jsonb,
                label_map JSONB NOT NULL DEFAULT '{}'::jsonb,
                email_provider VARCHAR(32) NOT NULL DEFAULT 'gmail',
                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            );
            "#,
            r#"
            DROP TABLE IF EXISTS tenant_profiles;
            "#,
        ),
        Migration::new(
            2,
            "Create integrations table",
            r#"
            CREATE TABLE IF NOT EXISTS integrations (
                tenant_id VARCHAR(255) NOT NULL,
                provider VARCHAR(32) NOT NULL,
                access_token TEXT,
                refresh_token TEXT,
                status VARCHAR(32) NOT NULL DEFAULT 'active',
                remote_credential_id VARCHAR(255),
                token_expires_at TIMESTAMPTZ,
                updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                PRIMARY KEY (tenant_id, provider)
            );
            CREATE INDEX IF NOT EXISTS idx_integrations_status ON integrations(tenant_id, status);
            "#,
            r#"
            DROP TABLE IF EXISTS integrations;
            "#,
        ),
        Migration::new(
            3,
            "Create credential_mappings table",
            r#"
            CREATE TABLE IF NOT EXISTS credential_mappings (
                tenant_id VARCHAR(255) PRIMARY KEY,
                gmail_credential_id VARCHAR(255),
                outlook_credential_id VARCHAR(255),
                openai_credential_id VARCHAR(255),
                datastore_credential_id VARCHAR(255),
                updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            );
            "#,
            r#"
            DROP TABLE IF EXISTS credential_mappings;
            "#,
        ),
        Migration::new(
            4,
            "Create workflow_records table",
            r#"
            CREATE TABLE IF NOT EXISTS workflow_records (
                id UUID PRIMARY KEY,
                tenant_id VARCHAR(255) NOT NULL,
                remote_workflow_id VARCHAR(255) NOT NULL,
                version INTEGER NOT NULL CHECK (version >= 1),
                status VARCHAR(32) NOT NULL,
                workflow_snapshot JSONB NOT NULL DEFAULT '{}'::jsonb,
                archived_reason TEXT,
                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            );
            CREATE UNIQUE INDEX IF NOT EXISTS idx_workflow_records_one_active
                ON workflow_records(tenant_id) WHERE status = 'active';
            CREATE INDEX IF NOT EXISTS idx_workflow_records_tenant
                ON workflow_records(tenant_id, version DESC);
            "#,
            r#"
            DROP TABLE IF EXISTS workflow_records;
            "#,
        ),
    ]
}

/// Reverts the most recently applied storage migration, returning its version
pub async fn revert_last_storage_migration(pool: &PgPool) -> Result<Option<i64>, DomainError> {
    let migrator = PostgresMigrator::new(pool.clone());

    let Some(version) = migrator.current_version().await? else {
        return Ok(None);
    };

    let migration = storage_migrations()
        .into_iter()
        .find(|m| m.version == version)
        .ok_or_else(|| DomainError::storage(format!("Unknown migration version {}", version)))?;

    migrator.revert_migration(&migration).await?;
    info!(version, description = %migration.description, "Storage migration reverted");
    Ok(Some(version))
}

/// Runs all pending storage migrations, returning the resulting schema version
pub async fn run_storage_migrations(pool: &PgPool) -> Result<Option<i64>, DomainError> {
    let migrator = PostgresMigrator::new(pool.clone());

    for migration in storage_migrations() {
        migrator.run_migration(&migration).await?;
    }

    let version = migrator.current_version().await?;
    info!(version = ?version, "Storage migrations applied");
    Ok(version)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_migration_creation() {
        let migration = Migration::new(1, "Test migration", "CREATE TABLE test", "DROP TABLE test");

        assert_eq!(migration.version, 1);
        assert_eq!(migration.description, "Test migration");
        assert_eq!(migration.up, "CREATE TABLE test");
        assert_eq!(migration.down, "DROP TABLE test");
    }

    #[test]
    fn test_storage_migrations_order() {
        let migrations = storage_migrations();

        assert!(!migrations.is_empty());

        for i in 1..migrations.len() {
            assert!(
                migrations[i].version > migrations[i - 1].version,
                "Migrations should be in ascending order"
            );
        }
    }

    #[test]
    fn test_one_active_record_per_tenant_is_enforced() {
        let migrations = storage_migrations();
        let workflow_records = migrations
            .iter()
            .find(|m| m.up.contains("CREATE TABLE IF NOT EXISTS workflow_records"))
            .unwrap();

        assert!(workflow_records.up.contains("CREATE UNIQUE INDEX"));
        assert!(workflow_records.up.contains("WHERE status = 'active'"));
    }

    #[test]
    fn test_storage_migrations_content() {
        let migrations = storage_migrations();

        for migration in migrations {
            assert!(!migration.description.is_empty());
            assert!(!migration.up.is_empty());
            assert!(!migration.down.is_empty());
        }
    }
}
