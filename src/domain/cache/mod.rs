//! Cache domain - TTL memoization with pattern invalidation

use std::fmt::Debug;
use std::time::Duration;

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};

use crate::domain::DomainError;

/// Key-value cache with per-entry TTL.
///
/// Values are JSON strings so the trait stays dyn-compatible; use [`CacheExt`] for
/// typed access.
#[async_trait]
pub trait Cache: Send + Sync + Debug {
    async fn get_raw(&self, key: &str) -> Result<Option<String>, DomainError>;

    async fn set_raw(&self, key: &str, value: &str, ttl: Duration) -> Result<(), DomainError>;

    /// Returns whether the key existed
    async fn delete(&self, key: &str) -> Result<bool, DomainError>;

    /// Deletes keys matching a glob-style pattern where `*` matches any run of characters
    async fn delete_pattern(&self, pattern: &str) -> Result<usize, DomainError>;

    async fn exists(&self, key: &str) -> Result<bool, DomainError> {
        Ok(self.get_raw(key).await?.is_some())
    }

    async fn clear(&self) -> Result<(), DomainError>;

    /// Approximate number of live entries
    async fn size(&self) -> Result<usize, DomainError>;
}

/// Typed get/set on top of [`Cache`]
pub trait CacheExt: Cache {
    fn get<'a, V>(
        &'a self,
        key: &'a str,
    ) -> impl std::future::Future<Output = Result<Option<V>, DomainError>> + Send
    where
        V: DeserializeOwned + Send,
    {
        async move {
            match self.get_raw(key).await? {
                Some(data) => {
                    let value: V = serde_json::from_str(&data).map_err(|e| {
                        DomainError::cache(format!("Failed to deserialize cache value: {}", e))
                    })?;
                    Ok(Some(value))
                }
                None => Ok(None),
            }
        }
    }

    fn set<'a, V>(
        &'a self,
        key: &'a str,
        value: &'a V,
        ttl: Duration,
    ) -> impl std::future::Future<Output = Result<(), DomainError>> + Send
    where
        V: Serialize + Send + Sync,
    {
        async move {
            let data = serde_json::to_string(value).map_err(|e| {
                DomainError::cache(format!("Failed to serialize cache value: {}", e))
            })?;
            self.set_raw(key, &data, ttl).await
        }
    }
}

impl<T: Cache + ?Sized> CacheExt for T {}

/// Cache key layout shared by every cache user
pub mod keys {
    pub fn tenant_profile(tenant_id: &str) -> String {
        format!("tenant:{}:profile", tenant_id)
    }

    /// Matches every key scoped to one tenant
    pub fn tenant_scope(tenant_id: &str) -> String {
        format!("tenant:{}:*", tenant_id)
    }

    pub const ENGINE_AVAILABILITY: &str = "engine:availability";
}

#[cfg(test)]
mod tests {
    use super::keys;

    #[test]
    fn test_tenant_keys_share_scope() {
        let key = keys::tenant_profile("t-1");
        let scope = keys::tenant_scope("t-1").replace('*', "");

        assert!(key.starts_with(&scope));
        assert!(!keys::tenant_profile("t-10").starts_with(&scope));
    }
}
