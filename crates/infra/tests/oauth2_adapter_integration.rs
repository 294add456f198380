//! Integration tests for the OAuth 2.0 adapter against a mock provider.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde_json::json;
use tokenwarden_common::time::{Clock, SystemClock};
use tokenwarden_core::{AdapterRegistry, AuthCoordinator, PlatformAdapter};
use tokenwarden_domain::{AuthErrorKind, AuthToken, Platform, PlatformCredentials};
use tokenwarden_infra::{HttpClient, InMemoryTokenStore, OAuth2PlatformAdapter, ProviderProfile};
use wiremock::matchers::{body_string_contains, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn adapter(server: &MockServer, profile: ProviderProfile) -> OAuth2PlatformAdapter {
    let profile = profile.with_base_url(&server.uri()).unwrap();
    let http = HttpClient::builder().timeout(Duration::from_secs(5)).build().unwrap();
    OAuth2PlatformAdapter::new(profile, http, Arc::new(SystemClock))
}

fn credentials() -> PlatformCredentials {
    PlatformCredentials::new("ck", "cs")
        .with_redirect_uri("http://localhost:8080/callback")
        .with_scopes(["user.info.basic", "video.list"])
}

fn stored(platform: Platform, lifetime_secs: u64) -> AuthToken {
    AuthToken::with_lifetime(platform, "old-access", Duration::from_secs(lifetime_secs), Utc::now())
        .unwrap()
        .with_refresh_token("old-refresh")
}

/// Validates a TikTok refresh round trip.
///
/// Assertions:
/// - The grant is posted with `client_key` as the client id field.
/// - `expires_in`, rotated refresh token, scopes and `open_id` are mapped.
#[tokio::test]
async fn test_refresh_token_grant() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v2/oauth/token/"))
        .and(body_string_contains("grant_type=refresh_token"))
        .and(body_string_contains("refresh_token=old-refresh"))
        .and(body_string_contains("client_key=ck"))
        .and(body_string_contains("client_secret=cs"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "new-access",
            "refresh_token": "new-refresh",
            "expires_in": 86400,
            "refresh_expires_in": 31536000,
            "open_id": "tiktok-user",
            "scope": "user.info.basic,video.list",
            "token_type": "Bearer"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let adapter = adapter(&server, ProviderProfile::tiktok());
    let token = adapter.refresh_token(&credentials(), &stored(Platform::TikTok, 60)).await.unwrap();

    assert_eq!(token.platform, Platform::TikTok);
    assert_eq!(token.access_token, "new-access");
    assert_eq!(token.refresh_token.as_deref(), Some("new-refresh"));
    assert_eq!(token.user_id.as_deref(), Some("tiktok-user"));
    assert!(token.scopes.contains("video.list"));
    assert!(token.seconds_until_expiry(Utc::now()) > 86_000);
    assert_eq!(token.metadata.get("refresh_expires_in"), Some(&json!(31536000)));
}

#[tokio::test]
async fn test_refresh_keeps_previous_refresh_token_when_omitted() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"access_token": "yt-access", "expires_in": 3599})),
        )
        .mount(&server)
        .await;

    let adapter = adapter(&server, ProviderProfile::youtube());
    let token = adapter.refresh_token(&credentials(), &stored(Platform::YouTube, 60)).await.unwrap();

    assert_eq!(token.refresh_token.as_deref(), Some("old-refresh"));
    assert!(token.seconds_until_expiry(Utc::now()) <= 3599);
}

#[tokio::test]
async fn test_refresh_without_refresh_token_is_token_expired() {
    let server = MockServer::start().await;
    Mock::given(method("POST")).respond_with(ResponseTemplate::new(200)).expect(0).mount(&server).await;

    let adapter = adapter(&server, ProviderProfile::reddit());
    let mut token = stored(Platform::Reddit, 60);
    token.refresh_token = None;

    let err = adapter.refresh_token(&credentials(), &token).await.unwrap_err();
    assert_eq!(err.kind, AuthErrorKind::TokenExpired);
}

#[tokio::test]
async fn test_graph_api_refresh_exchanges_access_token() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v19.0/oauth/access_token"))
        .and(body_string_contains("grant_type=fb_exchange_token"))
        .and(body_string_contains("fb_exchange_token=old-access"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "long-lived",
            "token_type": "bearer"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let adapter = adapter(&server, ProviderProfile::facebook());
    let mut current = stored(Platform::Facebook, 60);
    current.refresh_token = None;
    let token = adapter.refresh_token(&credentials(), &current).await.unwrap();

    assert_eq!(token.access_token, "long-lived");
    // Graph API omits expires_in for long-lived tokens; the 60 day default applies
    assert!(token.seconds_until_expiry(Utc::now()) > 59 * 24 * 60 * 60);
}

/// Validates HTTP status classification.
///
/// Assertions:
/// - 401 is an invalid-credentials failure with the provider's message.
/// - 429 is rate limited and carries `Retry-After`.
/// - 503 is an unclassified platform error with the status attached.
#[tokio::test]
async fn test_error_statuses_are_classified() {
    let cases = [
        (
            ResponseTemplate::new(401).set_body_json(
                json!({"error": "invalid_grant", "error_description": "Refresh token revoked"}),
            ),
            AuthErrorKind::InvalidCredentials,
        ),
        (
            ResponseTemplate::new(429).insert_header("Retry-After", "7"),
            AuthErrorKind::RateLimited,
        ),
        (ResponseTemplate::new(503), AuthErrorKind::PlatformError),
    ];

    for (response, expected) in cases {
        let server = MockServer::start().await;
        Mock::given(method("POST")).respond_with(response).mount(&server).await;

        let adapter = adapter(&server, ProviderProfile::youtube());
        let err =
            adapter.refresh_token(&credentials(), &stored(Platform::YouTube, 60)).await.unwrap_err();

        assert_eq!(err.kind, expected);
        match expected {
            AuthErrorKind::InvalidCredentials => {
                assert_eq!(err.message, "Refresh token revoked");
                assert_eq!(err.status, Some(401));
            }
            AuthErrorKind::RateLimited => assert_eq!(err.retry_after, Some(Duration::from_secs(7))),
            _ => assert_eq!(err.status, Some(503)),
        }
    }
}

#[tokio::test]
async fn test_oauth_error_in_success_body() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "error": "invalid_grant",
            "error_description": "code expired"
        })))
        .mount(&server)
        .await;

    let adapter = adapter(&server, ProviderProfile::tiktok());
    let err = adapter.exchange_authorization_code(&credentials(), "code-1").await.unwrap_err();
    assert_eq!(err.kind, AuthErrorKind::InvalidCredentials);
}

#[tokio::test]
async fn test_client_credentials_use_basic_auth() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v1/access_token"))
        .and(header("authorization", "Basic cmlkOnJzZWNyZXQ="))
        .and(body_string_contains("grant_type=client_credentials"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "app-only",
            "expires_in": 3600,
            "scope": "*"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let adapter = adapter(&server, ProviderProfile::reddit());
    let token = adapter.authenticate(&PlatformCredentials::new("rid", "rsecret")).await.unwrap();

    assert_eq!(token.access_token, "app-only");
    assert!(!token.has_refresh_token());
}

#[tokio::test]
async fn test_client_credentials_unsupported() {
    let server = MockServer::start().await;
    Mock::given(method("POST")).respond_with(ResponseTemplate::new(200)).expect(0).mount(&server).await;

    let adapter = adapter(&server, ProviderProfile::youtube());
    let err = adapter.authenticate(&credentials()).await.unwrap_err();
    assert_eq!(err.kind, AuthErrorKind::InvalidCredentials);
}

#[tokio::test]
async fn test_exchange_authorization_code() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .and(body_string_contains("grant_type=authorization_code"))
        .and(body_string_contains("code=abc"))
        .and(body_string_contains("redirect_uri=http%3A%2F%2Flocalhost%3A8080%2Fcallback"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "first",
            "refresh_token": "first-refresh",
            "expires_in": 3600
        })))
        .expect(1)
        .mount(&server)
        .await;

    let adapter = adapter(&server, ProviderProfile::youtube());
    let token = adapter.exchange_authorization_code(&credentials(), "abc").await.unwrap();

    assert_eq!(token.refresh_token.as_deref(), Some("first-refresh"));
    // Scopes fall back to the requested ones
    assert!(token.scopes.contains("user.info.basic"));
}

#[test]
fn test_authorization_url_parameters() {
    let http = HttpClient::builder().build().unwrap();
    let adapter = OAuth2PlatformAdapter::new(ProviderProfile::youtube(), http, Arc::new(SystemClock));

    let url = url::Url::parse(&adapter.authorization_url(&credentials(), "xyz").unwrap()).unwrap();
    let params: std::collections::HashMap<_, _> = url.query_pairs().into_owned().collect();

    assert_eq!(url.host_str(), Some("accounts.google.com"));
    assert_eq!(params["client_id"], "ck");
    assert_eq!(params["state"], "xyz");
    assert_eq!(params["response_type"], "code");
    assert_eq!(params["scope"], "user.info.basic video.list");
    assert_eq!(params["access_type"], "offline");

    let err = adapter.authorization_url(&PlatformCredentials::new("ck", "cs"), "xyz").unwrap_err();
    assert_eq!(err.kind, AuthErrorKind::InvalidCredentials);
}

#[tokio::test]
async fn test_revoke_methods() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path("/v19.0/me/permissions"))
        .and(query_param("access_token", "old-access"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"success": true})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/revoke"))
        .and(body_string_contains("token=old-refresh"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let facebook = adapter(&server, ProviderProfile::facebook());
    facebook.revoke_token(&credentials(), &stored(Platform::Facebook, 600)).await.unwrap();

    let youtube = adapter(&server, ProviderProfile::youtube());
    youtube.revoke_token(&credentials(), &stored(Platform::YouTube, 600)).await.unwrap();
}

/// Validates the best-effort validity probe.
///
/// Assertions:
/// - 200 means valid, 401 means invalid.
/// - A 500 is inconclusive and reported as valid.
#[tokio::test]
async fn test_validate_token() {
    for (status, expected) in [(200, true), (401, false), (500, true)] {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/oauth2/v3/userinfo"))
            .and(header("authorization", "Bearer old-access"))
            .respond_with(ResponseTemplate::new(status).set_body_json(json!({"sub": "1"})))
            .mount(&server)
            .await;

        let adapter = adapter(&server, ProviderProfile::youtube());
        let valid = adapter.validate_token(&stored(Platform::YouTube, 600)).await.unwrap();
        assert_eq!(valid, expected, "status {status}");
    }
}

#[tokio::test]
async fn test_get_user_info_unwraps_tiktok_envelope() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v2/user/info/"))
        .and(query_param("fields", "open_id,union_id,display_name"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": {"user": {"open_id": "oid-1", "union_id": "uid-1", "display_name": "Creator"}},
            "error": {"code": "ok", "message": ""}
        })))
        .mount(&server)
        .await;

    let adapter = adapter(&server, ProviderProfile::tiktok());
    let info = adapter.get_user_info(&stored(Platform::TikTok, 600)).await.unwrap();

    assert_eq!(info.platform, Platform::TikTok);
    assert_eq!(info.id, "oid-1");
    assert_eq!(info.display_name.as_deref(), Some("Creator"));
    assert_eq!(info.extra.get("union_id"), Some(&json!("uid-1")));
}

/// Validates the coordinator driving a real adapter over HTTP.
///
/// Assertions:
/// - A token inside the refresh threshold is refreshed on access.
/// - The refreshed token is persisted to the store.
#[tokio::test]
async fn test_coordinator_refreshes_through_http() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v1/access_token"))
        .and(body_string_contains("grant_type=refresh_token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "fresh",
            "expires_in": 3600
        })))
        .expect(1)
        .mount(&server)
        .await;

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let http = HttpClient::builder().build().unwrap();
    let profile = ProviderProfile::reddit().with_base_url(&server.uri()).unwrap();
    let registry = AdapterRegistry::new()
        .with(Arc::new(OAuth2PlatformAdapter::new(profile, http, clock.clone())));
    let store = Arc::new(InMemoryTokenStore::new());

    let coordinator = AuthCoordinator::builder(store.clone(), registry)
        .clock(clock)
        .credentials(Platform::Reddit, PlatformCredentials::new("rid", "rsecret"))
        .build()
        .unwrap();
    coordinator.store_token(Platform::Reddit, stored(Platform::Reddit, 120)).await.unwrap();

    let token = coordinator.get_valid_token(Platform::Reddit).await.unwrap();

    assert_eq!(token.access_token, "fresh");
    assert_eq!(token.refresh_token.as_deref(), Some("old-refresh"));
    let persisted = tokenwarden_core::TokenStore::get(store.as_ref(), Platform::Reddit).await.unwrap();
    assert_eq!(persisted.unwrap().access_token, "fresh");
}
