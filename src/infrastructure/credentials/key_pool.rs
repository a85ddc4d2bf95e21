use std::env;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::domain::DomainError;

/// Shared LLM API keys handed out round-robin.
///
/// The rotation counter lives for the process lifetime and restarts at zero.
#[derive(Debug, Default)]
pub struct KeyPool {
    keys: Vec<String>,
    cursor: AtomicUsize,
}

impl KeyPool {
    pub fn new(keys: impl IntoIterator<Item = String>) -> Self {
        let keys = keys
            .into_iter()
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty())
            .collect();

        Self {
            keys,
            cursor: AtomicUsize::new(0),
        }
    }

    /// Falls back to a single key read from `env_var` when no keys are configured
    pub fn with_env_fallback(keys: impl IntoIterator<Item = String>, env_var: &str) -> Self {
        let pool = Self::new(keys);

        if pool.is_empty() {
            if let Ok(key) = env::var(env_var) {
                return Self::new([key]);
            }
        }

        pool
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn next_key(&self) -> Result<&str, DomainError> {
        if self.keys.is_empty() {
            return Err(DomainError::configuration("No LLM API keys configured"));
        }

        let idx = self.cursor.fetch_add(1, Ordering::Relaxed) % self.keys.len();
        Ok(&self.keys[idx])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_robin() {
        let pool = KeyPool::new(vec!["a".to_string(), "b".to_string(), "c".to_string()]);

        let picked: Vec<&str> = (0..5).map(|_| pool.next_key().unwrap()).collect();
        assert_eq!(picked, vec!["a", "b", "c", "a", "b"]);
    }

    #[test]
    fn test_blank_keys_are_dropped() {
        let pool = KeyPool::new(vec![" ".to_string(), "k1 ".to_string()]);

        assert_eq!(pool.len(), 1);
        assert_eq!(pool.next_key().unwrap(), "k1");
    }

    #[test]
    fn test_empty_pool_is_configuration_error() {
        let pool = KeyPool::new(Vec::new());

        let err = pool.next_key().unwrap_err();
        assert!(matches!(err, DomainError::Configuration { .. }));
    }
}
