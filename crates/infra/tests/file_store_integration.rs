//! Integration tests for the JSON file token store.

use std::time::Duration;

use chrono::Utc;
use tempfile::TempDir;
use tokenwarden_core::TokenStore;
use tokenwarden_domain::{AuthToken, Platform, StoreError, StoreKind, StoreSettings};
use tokenwarden_infra::{open_store, FileTokenStore};

fn token(platform: Platform, access: &str) -> AuthToken {
    AuthToken::with_lifetime(platform, access, Duration::from_secs(3600), Utc::now())
        .unwrap()
        .with_refresh_token(format!("{access}-refresh"))
        .with_scopes(["read"])
}

/// Validates persistence across reopen.
///
/// Assertions:
/// - A missing file opens as an empty store without creating the file.
/// - Writes are visible after reopening the same path.
/// - Removals are persisted too.
#[tokio::test]
async fn test_tokens_survive_reopen() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("nested").join("tokens.json");

    let store = FileTokenStore::open(&path).await.unwrap();
    assert!(store.get_all().await.unwrap().is_empty());
    assert!(!path.exists());

    store.store(Platform::TikTok, token(Platform::TikTok, "tt")).await.unwrap();
    store.store(Platform::Reddit, token(Platform::Reddit, "rd")).await.unwrap();
    drop(store);

    let reopened = FileTokenStore::open(&path).await.unwrap();
    let tokens = reopened.get_all().await.unwrap();
    assert_eq!(tokens.len(), 2);
    assert_eq!(tokens[&Platform::TikTok].access_token, "tt");
    assert_eq!(tokens[&Platform::Reddit].refresh_token.as_deref(), Some("rd-refresh"));

    assert!(reopened.remove(Platform::TikTok).await.unwrap());
    drop(reopened);

    let again = FileTokenStore::open(&path).await.unwrap();
    assert!(!again.has(Platform::TikTok).await.unwrap());
    assert!(again.has(Platform::Reddit).await.unwrap());
}

#[tokio::test]
async fn test_update_requires_existing_token() {
    let dir = TempDir::new().unwrap();
    let store = FileTokenStore::open(dir.path().join("tokens.json")).await.unwrap();

    let err = store.update(Platform::YouTube, token(Platform::YouTube, "yt")).await.unwrap_err();
    assert_eq!(err, StoreError::NotFound { platform: Platform::YouTube });

    store.store(Platform::YouTube, token(Platform::YouTube, "yt")).await.unwrap();
    store.update(Platform::YouTube, token(Platform::YouTube, "yt2")).await.unwrap();
    assert_eq!(store.get(Platform::YouTube).await.unwrap().unwrap().access_token, "yt2");
    assert!(!store.remove(Platform::Rss).await.unwrap());
}

#[tokio::test]
async fn test_corrupt_file_is_a_backend_error() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("tokens.json");
    std::fs::write(&path, "{ not json").unwrap();

    let err = FileTokenStore::open(&path).await.unwrap_err();
    assert!(matches!(err, StoreError::Backend { .. }));

    std::fs::write(&path, r#"{"version": 99, "tokens": {}}"#).unwrap();
    let err = FileTokenStore::open(&path).await.unwrap_err();
    assert!(err.to_string().contains("version 99"));
}

#[tokio::test]
async fn test_document_layout() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("tokens.json");
    let store = FileTokenStore::open(&path).await.unwrap();
    store.store(Platform::Facebook, token(Platform::Facebook, "fb")).await.unwrap();

    let raw: serde_json::Value = serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
    assert_eq!(raw["version"], 1);
    assert_eq!(raw["tokens"]["facebook"]["access_token"], "fb");
    assert!(!dir.path().join("tokens.json.tmp").exists());

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mode = std::fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }
}

/// Validates that a leftover temp file cannot widen token file access.
///
/// Assertions:
/// - A stale world-readable temp file is replaced on the next write.
/// - The persisted token file is owner-only.
/// - No temp file remains afterwards.
#[cfg(unix)]
#[tokio::test]
async fn test_stale_temp_file_does_not_leak_permissions() {
    use std::os::unix::fs::PermissionsExt;

    let dir = TempDir::new().unwrap();
    let path = dir.path().join("tokens.json");
    let tmp = dir.path().join("tokens.json.tmp");
    std::fs::write(&tmp, b"partial").unwrap();
    std::fs::set_permissions(&tmp, std::fs::Permissions::from_mode(0o644)).unwrap();

    let store = FileTokenStore::open(&path).await.unwrap();
    store.store(Platform::YouTube, token(Platform::YouTube, "yt")).await.unwrap();

    let mode = std::fs::metadata(&path).unwrap().permissions().mode();
    assert_eq!(mode & 0o777, 0o600);
    assert!(!tmp.exists());
}

#[tokio::test]
async fn test_open_store_by_settings() {
    let dir = TempDir::new().unwrap();
    let memory = open_store(&StoreSettings::default()).await.unwrap();
    assert!(memory.get_all().await.unwrap().is_empty());

    let settings =
        StoreSettings { kind: StoreKind::File, path: Some(dir.path().join("tokens.json")) };
    let file = open_store(&settings).await.unwrap();
    file.store(Platform::Rss, token(Platform::Rss, "feed")).await.unwrap();
    assert!(dir.path().join("tokens.json").exists());

    let missing_path = StoreSettings { kind: StoreKind::File, path: None };
    assert!(open_store(&missing_path).await.is_err());
}
