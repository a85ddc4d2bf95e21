use std::collections::BTreeMap;

use async_trait::async_trait;
use sqlx::{PgPool, Row};

use crate::domain::tenant::{
    BusinessConfig, Contact, EmailProvider, TenantProfile, TenantProfileRepository,
};
use crate::domain::DomainError;

/// PostgreSQL implementation of TenantProfileRepository
#[derive(Debug, Clone)]
pub struct PostgresTenantProfileRepository {
    pool: PgPool,
}

impl PostgresTenantProfileRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TenantProfileRepository for PostgresTenantProfileRepository {
    async fn get(&self, tenant_id: &str) -> Result<Option<TenantProfile>, DomainError> {
        let row = sqlx::query(
            r#"
            SELECT tenant_id, business_config, managers, suppliers, label_map, email_provider
            FROM tenant_profiles
            WHERE tenant_id = $1
            "#,
        )
        .bind(tenant_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| DomainError::storage(format!("Failed to get tenant profile: {}", e)))?;

        row.map(|row| row_to_profile(&row)).transpose()
    }
}

fn json_column<T: serde::de::DeserializeOwned>(
    row: &sqlx::postgres::PgRow,
    column: &str,
) -> Result<T, DomainError> {
    let value: serde_json::Value = row
        .try_get(column)
        .map_err(|e| DomainError::storage(format!("Failed to read {}: {}", column, e)))?;

    serde_json::from_value(value)
        .map_err(|e| DomainError::storage(format!("Invalid {} in database: {}", column, e)))
}

fn row_to_profile(row: &sqlx::postgres::PgRow) -> Result<TenantProfile, DomainError> {
    let tenant_id: String = row
        .try_get("tenant_id")
        .map_err(|e| DomainError::storage(format!("Failed to read tenant_id: {}", e)))?;
    let provider: String = row
        .try_get("email_provider")
        .map_err(|e| DomainError::storage(format!("Failed to read email_provider: {}", e)))?;

    let business_config: BusinessConfig = json_column(row, "business_config")?;
    let managers: Vec<Contact> = json_column(row, "managers")?;
    let suppliers: Vec<Contact> = json_column(row, "suppliers")?;
    let label_map: BTreeMap<String, String> = json_column(row, "label_map")?;
    let provider = EmailProvider::parse(&provider)
        .map_err(|e| DomainError::storage(format!("Invalid email provider in database: {}", e)))?;

    Ok(TenantProfile::new(tenant_id, business_config, provider)
        .with_managers(managers)
        .with_suppliers(suppliers)
        .with_label_map(label_map))
}
