//! In-memory credential storage for provider API keys
//!
//! Credentials live in memory only and are never written back to config.
//! Lookups fall back to the process environment, so a key can come from
//! either the store or an exported variable.

use std::collections::HashMap;
use std::sync::Arc;

use secrecy::{ExposeSecret, SecretString};
use tokio::sync::RwLock;

/// Known credential key identifiers
pub mod keys {
    pub const OPENAI_API_KEY: &str = "OPENAI_API_KEY";
    pub const ANTHROPIC_API_KEY: &str = "ANTHROPIC_API_KEY";
    pub const RETRIEVAL_API_KEY: &str = "CONSILIUM_RETRIEVAL_API_KEY";
    pub const DOCUMENTS_API_KEY: &str = "CONSILIUM_DOCUMENTS_API_KEY";
}

/// In-memory credential store
#[derive(Default)]
pub struct CredentialStore {
    secrets: RwLock<HashMap<String, SecretString>>,
}

impl std::fmt::Debug for CredentialStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialStore").finish_non_exhaustive()
    }
}

impl CredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a credential, replacing any previous value
    pub async fn set(&self, key: impl Into<String>, value: impl Into<String>) {
        let mut secrets = self.secrets.write().await;
        secrets.insert(key.into(), SecretString::from(value.into()));
    }

    /// Get a credential from the store only
    pub async fn get(&self, key: &str) -> Option<SecretString> {
        let secrets = self.secrets.read().await;
        secrets
            .get(key)
            .map(|s| SecretString::from(s.expose_secret().to_owned()))
    }

    pub async fn delete(&self, key: &str) -> bool {
        let mut secrets = self.secrets.write().await;
        secrets.remove(key).is_some()
    }

    /// Stored keys (never values)
    pub async fn list_keys(&self) -> Vec<String> {
        let secrets = self.secrets.read().await;
        let mut keys: Vec<String> = secrets.keys().cloned().collect();
        keys.sort();
        keys
    }

    /// Get a credential with fallback to the environment variable of the same name
    pub async fn get_or_env(&self, key: &str) -> Option<SecretString> {
        if let Some(value) = self.get(key).await {
            return Some(value);
        }
        std::env::var(key)
            .ok()
            .filter(|v| !v.is_empty())
            .map(SecretString::from)
    }
}

/// Thread-safe shared credential store
pub type SharedCredentialStore = Arc<CredentialStore>;

pub fn create_credential_store() -> SharedCredentialStore {
    Arc::new(CredentialStore::new())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_set_and_get() {
        let store = CredentialStore::new();
        store.set("TEST_KEY", "test_value").await;
        let value = store.get("TEST_KEY").await.unwrap();
        assert_eq!(value.expose_secret(), "test_value");
    }

    #[tokio::test]
    async fn test_delete() {
        let store = CredentialStore::new();
        store.set("TEST_KEY", "test_value").await;
        assert!(store.delete("TEST_KEY").await);
        assert!(store.get("TEST_KEY").await.is_none());
    }

    #[tokio::test]
    async fn test_list_keys_sorted() {
        let store = CredentialStore::new();
        store.set("KEY2", "value2").await;
        store.set("KEY1", "value1").await;
        assert_eq!(store.list_keys().await, vec!["KEY1", "KEY2"]);
    }

    #[tokio::test]
    async fn test_store_wins_over_env() {
        let store = CredentialStore::new();
        store.set("PATH", "from-store").await;
        let value = store.get_or_env("PATH").await.unwrap();
        assert_eq!(value.expose_secret(), "from-store");
    }

    #[tokio::test]
    async fn test_missing_everywhere() {
        let store = CredentialStore::new();
        assert!(store
            .get_or_env("CONSILIUM_TEST_SURELY_UNSET_KEY")
            .await
            .is_none());
    }

    #[test]
    fn test_debug_hides_values() {
        let store = CredentialStore::new();
        assert!(!format!("{:?}", store).contains("secrets"));
    }
}
