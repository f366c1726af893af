use async_trait::async_trait;
use secrecy::ExposeSecret;
use std::collections::HashMap;
use std::sync::Mutex;

use crate::models::TokenPair;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKey {
    Access,
    Refresh,
}

impl TokenKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenKey::Access => "accessToken",
            TokenKey::Refresh => "refreshToken",
        }
    }
}

/// Persistent key-value storage for the session tokens. Writes are last-write-wins.
#[async_trait]
pub trait TokenStore: Send + Sync {
    async fn get(&self, key: TokenKey) -> Result<Option<String>, anyhow::Error>;
    async fn set(&self, key: TokenKey, value: &str) -> Result<(), anyhow::Error>;
    async fn clear(&self, key: TokenKey) -> Result<(), anyhow::Error>;

    async fn store_pair(&self, pair: &TokenPair) -> Result<(), anyhow::Error> {
        self.set(TokenKey::Access, pair.access_token.expose_secret())
            .await?;
        self.set(TokenKey::Refresh, pair.refresh_token.expose_secret())
            .await
    }

    async fn clear_all(&self) -> Result<(), anyhow::Error> {
        self.clear(TokenKey::Access).await?;
        self.clear(TokenKey::Refresh).await
    }
}

/// In-process token store.
pub struct MemoryTokenStore {
    tokens: Mutex<HashMap<TokenKey, String>>,
}

impl Default for MemoryTokenStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self {
            tokens: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_pair(access_token: &str, refresh_token: &str) -> Self {
        let store = Self::new();
        if let Ok(mut tokens) = store.tokens.lock() {
            tokens.insert(TokenKey::Access, access_token.to_string());
            tokens.insert(TokenKey::Refresh, refresh_token.to_string());
        }
        store
    }

    pub fn with_access_token(access_token: &str) -> Self {
        let store = Self::new();
        if let Ok(mut tokens) = store.tokens.lock() {
            tokens.insert(TokenKey::Access, access_token.to_string());
        }
        store
    }

    fn lock(
        &self,
    ) -> Result<std::sync::MutexGuard<'_, HashMap<TokenKey, String>>, anyhow::Error> {
        self.tokens
            .lock()
            .map_err(|_| anyhow::anyhow!("token store lock poisoned"))
    }
}

#[async_trait]
impl TokenStore for MemoryTokenStore {
    async fn get(&self, key: TokenKey) -> Result<Option<String>, anyhow::Error> {
        Ok(self.lock()?.get(&key).cloned())
    }

    async fn set(&self, key: TokenKey, value: &str) -> Result<(), anyhow::Error> {
        self.lock()?.insert(key, value.to_string());
        Ok(())
    }

    async fn clear(&self, key: TokenKey) -> Result<(), anyhow::Error> {
        self.lock()?.remove(&key);
        Ok(())
    }
}
