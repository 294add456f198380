//! In-memory token store.

use std::collections::BTreeMap;

use async_trait::async_trait;
use parking_lot::RwLock;
use tokenwarden_core::TokenStore;
use tokenwarden_domain::{AuthToken, Platform, StoreError};

/// Process-local token store. Tokens are lost on restart.
#[derive(Debug, Default)]
pub struct InMemoryTokenStore {
    tokens: RwLock<BTreeMap<Platform, AuthToken>>,
}

impl InMemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.tokens.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.read().is_empty()
    }
}

#[async_trait]
impl TokenStore for InMemoryTokenStore {
    async fn store(&self, platform: Platform, token: AuthToken) -> Result<(), StoreError> {
        self.tokens.write().insert(platform, token);
        Ok(())
    }

    async fn get(&self, platform: Platform) -> Result<Option<AuthToken>, StoreError> {
        Ok(self.tokens.read().get(&platform).cloned())
    }

    async fn update(&self, platform: Platform, token: AuthToken) -> Result<(), StoreError> {
        match self.tokens.write().get_mut(&platform) {
            Some(slot) => {
                *slot = token;
                Ok(())
            }
            None => Err(StoreError::NotFound { platform }),
        }
    }

    async fn remove(&self, platform: Platform) -> Result<bool, StoreError> {
        Ok(self.tokens.write().remove(&platform).is_some())
    }

    async fn get_all(&self) -> Result<BTreeMap<Platform, AuthToken>, StoreError> {
        Ok(self.tokens.read().clone())
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use chrono::Utc;

    use super::*;

    fn token(platform: Platform, access: &str) -> AuthToken {
        AuthToken::with_lifetime(platform, access, Duration::from_secs(3600), Utc::now()).unwrap()
    }

    /// Validates the store contract.
    ///
    /// Assertions:
    /// - `store` upserts, so one token exists per platform.
    /// - `update` fails with `NotFound` when nothing is stored.
    /// - `remove` reports whether a token existed.
    #[tokio::test]
    async fn test_store_contract() {
        let store = InMemoryTokenStore::new();

        let err = store.update(Platform::Reddit, token(Platform::Reddit, "a")).await.unwrap_err();
        assert_eq!(err, StoreError::NotFound { platform: Platform::Reddit });

        store.store(Platform::Reddit, token(Platform::Reddit, "a")).await.unwrap();
        store.store(Platform::Reddit, token(Platform::Reddit, "b")).await.unwrap();
        assert_eq!(store.len(), 1);
        assert_eq!(store.get(Platform::Reddit).await.unwrap().unwrap().access_token, "b");

        store.update(Platform::Reddit, token(Platform::Reddit, "c")).await.unwrap();
        assert!(store.has(Platform::Reddit).await.unwrap());
        assert_eq!(store.get_all().await.unwrap()[&Platform::Reddit].access_token, "c");

        assert!(store.remove(Platform::Reddit).await.unwrap());
        assert!(!store.remove(Platform::Reddit).await.unwrap());
        assert!(store.is_empty());
    }
}
