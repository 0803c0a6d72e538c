//! Storage of the OAuth token pair.
//!
//! The pair is the only state the portal keeps between runs. Every API call
//! reads the access token; login and refresh write both tokens; logout and an
//! unrecoverable 401 clear them.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::Result;
use crate::model::TokenResponse;

/// An access/refresh token pair, serialized under the `access_token` and
/// `refresh_token` keys.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenPair {
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
}

impl From<&TokenResponse> for TokenPair {
    fn from(response: &TokenResponse) -> Self {
        Self {
            access_token: Some(response.access_token.clone()),
            refresh_token: response.refresh_token.clone(),
        }
    }
}

/// Where the client keeps its tokens.
pub trait TokenStore: Send + Sync {
    fn access_token(&self) -> Option<String>;

    fn refresh_token(&self) -> Option<String>;

    fn store(&self, tokens: TokenPair) -> Result<()>;

    fn clear(&self) -> Result<()>;
}

/// In-process token store; nothing survives the process.
#[derive(Debug, Default)]
pub struct MemoryTokenStore {
    tokens: RwLock<TokenPair>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tokens(tokens: TokenPair) -> Self {
        Self {
            tokens: RwLock::new(tokens),
        }
    }
}

impl TokenStore for MemoryTokenStore {
    fn access_token(&self) -> Option<String> {
        self.tokens
            .read()
            .map(|t| t.access_token.clone())
            .unwrap_or_default()
    }

    fn refresh_token(&self) -> Option<String> {
        self.tokens
            .read()
            .map(|t| t.refresh_token.clone())
            .unwrap_or_default()
    }

    fn store(&self, tokens: TokenPair) -> Result<()> {
        let mut guard = self
            .tokens
            .write()
            .map_err(|_| io::Error::other("token store lock poisoned"))?;
        *guard = tokens;
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        self.store(TokenPair::default())
    }
}

/// Token store persisted as a small JSON file, read once on open and
/// rewritten on every change.
#[derive(Debug)]
pub struct FileTokenStore {
    path: PathBuf,
    cache: MemoryTokenStore,
}

impl FileTokenStore {
    /// Open the store at `path`. A missing file is an empty store.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let tokens = match fs::read_to_string(&path) {
            Ok(text) => serde_json::from_str(&text)
                .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?,
            Err(e) if e.kind() == io::ErrorKind::NotFound => TokenPair::default(),
            Err(e) => return Err(e.into()),
        };
        debug!(path = %path.display(), "opened token store");
        Ok(Self {
            path,
            cache: MemoryTokenStore::with_tokens(tokens),
        })
    }

    fn persist(&self, tokens: &TokenPair) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(tokens)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        fs::write(&self.path, json)?;
        Ok(())
    }
}

impl TokenStore for FileTokenStore {
    fn access_token(&self) -> Option<String> {
        self.cache.access_token()
    }

    fn refresh_token(&self) -> Option<String> {
        self.cache.refresh_token()
    }

    fn store(&self, tokens: TokenPair) -> Result<()> {
        self.persist(&tokens)?;
        self.cache.store(tokens)
    }

    fn clear(&self) -> Result<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        self.cache.clear()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pair(access: &str, refresh: &str) -> TokenPair {
        TokenPair {
            access_token: Some(access.to_string()),
            refresh_token: Some(refresh.to_string()),
        }
    }

    #[test]
    fn memory_store_set_and_clear() {
        let store = MemoryTokenStore::new();
        assert!(store.access_token().is_none());
        store.store(pair("a", "r")).unwrap();
        assert_eq!(store.access_token().as_deref(), Some("a"));
        assert_eq!(store.refresh_token().as_deref(), Some("r"));
        store.clear().unwrap();
        assert!(store.refresh_token().is_none());
    }

    #[test]
    fn poisoned_memory_store_reports_error() {
        let store = std::sync::Arc::new(MemoryTokenStore::new());
        let poisoner = store.clone();
        let _ = std::thread::spawn(move || {
            let _guard = poisoner.tokens.write().unwrap();
            panic!("writer died");
        })
        .join();

        let err = store.store(pair("a", "r")).unwrap_err();
        assert!(matches!(err, crate::PortalError::TokenStore(_)));
        assert!(store.clear().is_err());
    }

    #[test]
    fn file_store_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session").join("tokens.json");

        let store = FileTokenStore::open(&path).unwrap();
        store.store(pair("access", "refresh")).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains("\"access_token\""));
        assert!(text.contains("\"refresh_token\""));

        let reopened = FileTokenStore::open(&path).unwrap();
        assert_eq!(reopened.access_token().as_deref(), Some("access"));

        reopened.clear().unwrap();
        assert!(!path.exists());
        assert!(FileTokenStore::open(&path).unwrap().access_token().is_none());
    }

    #[test]
    fn file_store_rejects_garbage() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tokens.json");
        std::fs::write(&path, "not json").unwrap();
        assert!(FileTokenStore::open(&path).is_err());
    }
}
