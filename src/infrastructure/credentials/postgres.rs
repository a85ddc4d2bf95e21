use async_trait::async_trait;
use sqlx::{PgPool, Row};

use crate::domain::credentials::{CredentialMapping, CredentialMappingRepository};
use crate::domain::DomainError;
use crate::infrastructure::storage::map_write_error;

/// PostgreSQL implementation of CredentialMappingRepository
#[derive(Debug, Clone)]
pub struct PostgresCredentialMappingRepository {
    pool: PgPool,
}

impl PostgresCredentialMappingRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CredentialMappingRepository for PostgresCredentialMappingRepository {
    async fn get(&self, tenant_id: &str) -> Result<Option<CredentialMapping>, DomainError> {
        let row = sqlx::query(
            r#"
            SELECT tenant_id, gmail_credential_id, outlook_credential_id,
                   openai_credential_id, datastore_credential_id, updated_at
            FROM credential_mappings
            WHERE tenant_id = $1
            "#,
        )
        .bind(tenant_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| DomainError::storage(format!("Failed to get credential mapping: {}", e)))?;

        row.map(|row| row_to_mapping(&row)).transpose()
    }

    async fn upsert(&self, mapping: CredentialMapping) -> Result<CredentialMapping, DomainError> {
        sqlx::query(
            r#"
            INSERT INTO credential_mappings (tenant_id, gmail_credential_id, outlook_credential_id,
                                             openai_credential_id, datastore_credential_id, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (tenant_id) DO UPDATE
            SET gmail_credential_id = EXCLUDED.gmail_credential_id,
                outlook_credential_id = EXCLUDED.outlook_credential_id,
                openai_credential_id = EXCLUDED.openai_credential_id,
                datastore_credential_id = EXCLUDED.datastore_credential_id,
                updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(&mapping.tenant_id)
        .bind(&mapping.gmail_credential_id)
        .bind(&mapping.outlook_credential_id)
        .bind(&mapping.openai_credential_id)
        .bind(&mapping.datastore_credential_id)
        .bind(mapping.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| map_write_error("Failed to upsert credential mapping", e))?;

        Ok(mapping)
    }
}

fn row_to_mapping(row: &sqlx::postgres::PgRow) -> Result<CredentialMapping, DomainError> {
    let read =
        |e: sqlx::Error| DomainError::storage(format!("Failed to read credential mapping: {}", e));

    Ok(CredentialMapping {
        tenant_id: row.try_get("tenant_id").map_err(read)?,
        gmail_credential_id: row.try_get("gmail_credential_id").map_err(read)?,
        outlook_credential_id: row.try_get("outlook_credential_id").map_err(read)?,
        openai_credential_id: row.try_get("openai_credential_id").map_err(read)?,
        datastore_credential_id: row.try_get("datastore_credential_id").map_err(read)?,
        updated_at: row.try_get("updated_at").map_err(read)?,
    })
}
