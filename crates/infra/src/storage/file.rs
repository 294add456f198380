//! JSON file-backed token store.
//!
//! The whole token set lives in one document that is rewritten on every
//! mutation: the new content goes to a sibling temp file which is then
//! renamed over the original, so readers never observe a torn write.

use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokenwarden_core::TokenStore;
use tokenwarden_domain::{AuthToken, Platform, StoreError};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{debug, warn};

const FORMAT_VERSION: u32 = 1;

#[derive(Debug, Default, Serialize, Deserialize)]
struct TokenDocument {
    version: u32,
    #[serde(default)]
    tokens: BTreeMap<Platform, AuthToken>,
}

/// Token store persisted to a single JSON file.
///
/// Mutations are serialized through an async mutex and only committed to
/// memory after the file write succeeds.
#[derive(Debug)]
pub struct FileTokenStore {
    path: PathBuf,
    tokens: Mutex<BTreeMap<Platform, AuthToken>>,
}

impl FileTokenStore {
    /// Open the store at `path`, loading any existing document. A missing
    /// file is an empty store; the file is created on the first write.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let tokens = match tokio::fs::read(&path).await {
            Ok(bytes) => parse_document(&path, &bytes)?,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                debug!(path = %path.display(), "token file not found, starting empty");
                BTreeMap::new()
            }
            Err(err) => {
                return Err(StoreError::backend(format!(
                    "failed to read {}: {err}",
                    path.display()
                )))
            }
        };
        debug!(path = %path.display(), tokens = tokens.len(), "opened token file");
        Ok(Self { path, tokens: Mutex::new(tokens) })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn persist(&self, tokens: &BTreeMap<Platform, AuthToken>) -> Result<(), StoreError> {
        let document = TokenDocument { version: FORMAT_VERSION, tokens: tokens.clone() };
        let bytes = serde_json::to_vec_pretty(&document)
            .map_err(|err| StoreError::backend(format!("failed to encode tokens: {err}")))?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await.map_err(|err| io_error(parent, err))?;
        }

        let tmp = self.path.with_extension("json.tmp");
        write_restricted(&tmp, &bytes).await.map_err(|err| io_error(&tmp, err))?;
        tokio::fs::rename(&tmp, &self.path).await.map_err(|err| io_error(&self.path, err))?;
        Ok(())
    }
}

fn parse_document(path: &Path, bytes: &[u8]) -> Result<BTreeMap<Platform, AuthToken>, StoreError> {
    let document: TokenDocument = serde_json::from_slice(bytes).map_err(|err| {
        StoreError::backend(format!("failed to parse {}: {err}", path.display()))
    })?;
    if document.version != FORMAT_VERSION {
        return Err(StoreError::backend(format!(
            "unsupported token file version {} in {}",
            document.version,
            path.display()
        )));
    }
    Ok(document.tokens)
}

fn io_error(path: &Path, err: std::io::Error) -> StoreError {
    StoreError::backend(format!("failed to write {}: {err}", path.display()))
}

/// Write `bytes` to a fresh file that is owner-only from the moment it
/// exists. A temp file left behind by an earlier crash is replaced, since
/// the creation mode would not apply to it.
async fn write_restricted(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    match tokio::fs::remove_file(path).await {
        Ok(()) => warn!(path = %path.display(), "removed stale token temp file"),
        Err(err) if err.kind() == ErrorKind::NotFound => {}
        Err(err) => return Err(err),
    }

    let mut options = tokio::fs::OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    options.mode(0o600);

    let mut file = options.open(path).await?;
    file.write_all(bytes).await?;
    file.sync_all().await
}

#[async_trait]
impl TokenStore for FileTokenStore {
    async fn store(&self, platform: Platform, token: AuthToken) -> Result<(), StoreError> {
        let mut tokens = self.tokens.lock().await;
        let mut next = tokens.clone();
        next.insert(platform, token);
        self.persist(&next).await?;
        *tokens = next;
        Ok(())
    }

    async fn get(&self, platform: Platform) -> Result<Option<AuthToken>, StoreError> {
        Ok(self.tokens.lock().await.get(&platform).cloned())
    }

    async fn update(&self, platform: Platform, token: AuthToken) -> Result<(), StoreError> {
        let mut tokens = self.tokens.lock().await;
        if !tokens.contains_key(&platform) {
            return Err(StoreError::NotFound { platform });
        }
        let mut next = tokens.clone();
        next.insert(platform, token);
        self.persist(&next).await?;
        *tokens = next;
        Ok(())
    }

    async fn remove(&self, platform: Platform) -> Result<bool, StoreError> {
        let mut tokens = self.tokens.lock().await;
        if !tokens.contains_key(&platform) {
            return Ok(false);
        }
        let mut next = tokens.clone();
        next.remove(&platform);
        self.persist(&next).await?;
        *tokens = next;
        Ok(true)
    }

    async fn get_all(&self) -> Result<BTreeMap<Platform, AuthToken>, StoreError> {
        Ok(self.tokens.lock().await.clone())
    }
}
