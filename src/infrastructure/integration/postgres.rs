use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row};

use crate::domain::integration::{Integration, IntegrationRepository, IntegrationStatus};
use crate::domain::tenant::EmailProvider;
use crate::domain::DomainError;
use crate::infrastructure::storage::map_write_error;

/// PostgreSQL implementation of IntegrationRepository
#[derive(Debug, Clone)]
pub struct PostgresIntegrationRepository {
    pool: PgPool,
}

impl PostgresIntegrationRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl IntegrationRepository for PostgresIntegrationRepository {
    async fn get_active(
        &self,
        tenant_id: &str,
        provider: EmailProvider,
    ) -> Result<Option<Integration>, DomainError> {
        let row = sqlx::query(
            r#"
            SELECT tenant_id, provider, access_token, refresh_token, status,
                   remote_credential_id, token_expires_at, updated_at
            FROM integrations
            WHERE tenant_id = $1 AND provider = $2 AND status = 'active'
            "#,
        )
        .bind(tenant_id)
        .bind(provider.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| DomainError::storage(format!("Failed to get integration: {}", e)))?;

        row.map(|row| row_to_integration(&row)).transpose()
    }

    async fn save(&self, integration: Integration) -> Result<Integration, DomainError> {
        sqlx::query(
            r#"
            INSERT INTO integrations (tenant_id, provider, access_token, refresh_token, status,
                                      remote_credential_id, token_expires_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT (tenant_id, provider) DO UPDATE
            SET access_token = EXCLUDED.access_token,
                refresh_token = EXCLUDED.refresh_token,
                status = EXCLUDED.status,
                remote_credential_id = EXCLUDED.remote_credential_id,
                token_expires_at = EXCLUDED.token_expires_at,
                updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(&integration.tenant_id)
        .bind(integration.provider.as_str())
        .bind(&integration.access_token)
        .bind(&integration.refresh_token)
        .bind(integration.status.as_str())
        .bind(&integration.remote_credential_id)
        .bind(integration.token_expires_at)
        .bind(integration.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| map_write_error("Failed to save integration", e))?;

        Ok(integration)
    }
}

fn row_to_integration(row: &sqlx::postgres::PgRow) -> Result<Integration, DomainError> {
    let read = |e: sqlx::Error| DomainError::storage(format!("Failed to read integration: {}", e));

    let provider: String = row.try_get("provider").map_err(read)?;
    let status: String = row.try_get("status").map_err(read)?;
    let token_expires_at: Option<DateTime<Utc>> = row.try_get("token_expires_at").map_err(read)?;
    let updated_at: DateTime<Utc> = row.try_get("updated_at").map_err(read)?;

    Ok(Integration {
        tenant_id: row.try_get("tenant_id").map_err(read)?,
        provider: EmailProvider::parse(&provider)
            .map_err(|e| DomainError::storage(format!("Invalid provider in database: {}", e)))?,
        access_token: row.try_get("access_token").map_err(read)?,
        refresh_token: row.try_get("refresh_token").map_err(read)?,
        status: IntegrationStatus::parse(&status)?,
        remote_credential_id: row.try_get("remote_credential_id").map_err(read)?,
        token_expires_at,
        updated_at,
    })
}
