//! Credential records: issued tokens and app-level OAuth registrations.

use std::collections::BTreeSet;
use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use super::Platform;
use crate::impl_domain_str_conversions;

/// How the access token is presented to the provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenType {
    #[default]
    Bearer,
    Basic,
    None,
}

impl_domain_str_conversions!(TokenType {
    Bearer => "bearer",
    Basic => "basic",
    None => "none",
});

/// Rejected token construction.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TokenError {
    #[error("token for {platform} expires at {expires_at}, which is not after {now}")]
    ExpiryNotInFuture { platform: Platform, expires_at: DateTime<Utc>, now: DateTime<Utc> },

    #[error("token for {platform} has an empty access token")]
    EmptyAccessToken { platform: Platform },
}

impl TokenError {
    pub const fn platform(&self) -> Platform {
        match self {
            Self::ExpiryNotInFuture { platform, .. } | Self::EmptyAccessToken { platform } => {
                *platform
            }
        }
    }
}

/// One platform's current credential grant.
///
/// Tokens are replaced wholesale on refresh; nothing mutates a stored token
/// in place. Construction through [`AuthToken::new`] guarantees the expiry is
/// in the future at creation time.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthToken {
    pub access_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub token_type: TokenType,
    pub expires_at: DateTime<Utc>,
    #[serde(default)]
    pub scopes: BTreeSet<String>,
    pub platform: Platform,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub metadata: Map<String, Value>,
}

impl AuthToken {
    pub fn new(
        platform: Platform,
        access_token: impl Into<String>,
        expires_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<Self, TokenError> {
        let access_token = access_token.into();
        if access_token.is_empty() {
            return Err(TokenError::EmptyAccessToken { platform });
        }
        if expires_at <= now {
            return Err(TokenError::ExpiryNotInFuture { platform, expires_at, now });
        }
        Ok(Self {
            access_token,
            refresh_token: None,
            token_type: TokenType::Bearer,
            expires_at,
            scopes: BTreeSet::new(),
            platform,
            user_id: None,
            metadata: Map::new(),
        })
    }

    /// Token valid for `lifetime` starting at `now`.
    pub fn with_lifetime(
        platform: Platform,
        access_token: impl Into<String>,
        lifetime: Duration,
        now: DateTime<Utc>,
    ) -> Result<Self, TokenError> {
        let lifetime = chrono::Duration::from_std(lifetime).unwrap_or(chrono::Duration::MAX);
        let expires_at = now.checked_add_signed(lifetime).unwrap_or(DateTime::<Utc>::MAX_UTC);
        Self::new(platform, access_token, expires_at, now)
    }

    #[must_use]
    pub fn with_refresh_token(mut self, refresh_token: impl Into<String>) -> Self {
        self.refresh_token = Some(refresh_token.into());
        self
    }

    #[must_use]
    pub fn with_token_type(mut self, token_type: TokenType) -> Self {
        self.token_type = token_type;
        self
    }

    #[must_use]
    pub fn with_scopes<I, S>(mut self, scopes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.scopes = scopes.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn with_user_id(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    #[must_use]
    pub fn with_metadata(mut self, key: impl Into<String>, value: Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    /// Seconds until expiry, clamped at zero.
    pub fn seconds_until_expiry(&self, now: DateTime<Utc>) -> u64 {
        u64::try_from((self.expires_at - now).num_seconds()).unwrap_or(0)
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }

    /// True once the remaining lifetime is at or below `threshold`.
    pub fn needs_refresh(&self, now: DateTime<Utc>, threshold: Duration) -> bool {
        self.seconds_until_expiry(now) <= threshold.as_secs()
    }

    pub fn has_refresh_token(&self) -> bool {
        self.refresh_token.as_deref().is_some_and(|t| !t.is_empty())
    }

    /// Whether either secret string embeds `secret`.
    pub fn contains_secret(&self, secret: &str) -> bool {
        if secret.is_empty() {
            return false;
        }
        self.access_token.contains(secret)
            || self.refresh_token.as_deref().is_some_and(|t| t.contains(secret))
    }
}

impl fmt::Debug for AuthToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthToken")
            .field("platform", &self.platform)
            .field("access_token", &"[REDACTED]")
            .field("refresh_token", &self.refresh_token.as_ref().map(|_| "[REDACTED]"))
            .field("token_type", &self.token_type)
            .field("expires_at", &self.expires_at)
            .field("scopes", &self.scopes)
            .field("user_id", &self.user_id)
            .finish_non_exhaustive()
    }
}

/// Static app-level OAuth registration for one platform.
#[derive(Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PlatformCredentials {
    pub client_id: String,
    pub client_secret: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub redirect_uri: Option<String>,
    #[serde(default)]
    pub scopes: Vec<String>,
}

impl PlatformCredentials {
    pub fn new(client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            redirect_uri: None,
            scopes: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_redirect_uri(mut self, redirect_uri: impl Into<String>) -> Self {
        self.redirect_uri = Some(redirect_uri.into());
        self
    }

    #[must_use]
    pub fn with_scopes<I, S>(mut self, scopes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.scopes = scopes.into_iter().map(Into::into).collect();
        self
    }

    /// Names of required fields that are blank.
    pub fn missing_fields(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.client_id.trim().is_empty() {
            missing.push("client_id");
        }
        if self.client_secret.trim().is_empty() {
            missing.push("client_secret");
        }
        missing
    }
}

impl fmt::Debug for PlatformCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PlatformCredentials")
            .field("client_id", &self.client_id)
            .field("client_secret", &"[REDACTED]")
            .field("redirect_uri", &self.redirect_uri)
            .field("scopes", &self.scopes)
            .finish()
    }
}

/// Account details reported by a provider for a token.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserInfo {
    pub platform: Platform,
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub extra: Map<String, Value>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn now() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2024-06-01T12:00:00Z").unwrap().with_timezone(&Utc)
    }

    #[test]
    fn test_new_rejects_past_or_present_expiry() {
        let err = AuthToken::new(Platform::TikTok, "tok", now(), now()).unwrap_err();
        assert!(matches!(err, TokenError::ExpiryNotInFuture { platform: Platform::TikTok, .. }));

        let past = now() - chrono::Duration::seconds(1);
        assert!(AuthToken::new(Platform::TikTok, "tok", past, now()).is_err());
    }

    #[test]
    fn test_new_rejects_empty_access_token() {
        let err =
            AuthToken::with_lifetime(Platform::Reddit, "", Duration::from_secs(60), now()).unwrap_err();
        assert_eq!(err, TokenError::EmptyAccessToken { platform: Platform::Reddit });
        assert_eq!(err.platform(), Platform::Reddit);
    }

    /// Validates expiry arithmetic around the refresh threshold.
    ///
    /// Assertions:
    /// - Remaining seconds count down from the lifetime.
    /// - Remaining seconds clamp at zero after expiry.
    /// - `needs_refresh` is inclusive of the threshold.
    #[test]
    fn test_expiry_helpers() {
        let token =
            AuthToken::with_lifetime(Platform::TikTok, "tok", Duration::from_secs(200), now())
                .unwrap();
        assert_eq!(token.seconds_until_expiry(now()), 200);
        assert!(token.needs_refresh(now(), Duration::from_secs(300)));
        assert!(token.needs_refresh(now(), Duration::from_secs(200)));
        assert!(!token.needs_refresh(now(), Duration::from_secs(199)));

        let later = now() + chrono::Duration::seconds(500);
        assert_eq!(token.seconds_until_expiry(later), 0);
        assert!(token.is_expired(later));
        assert!(!token.is_expired(now()));
    }

    #[test]
    fn test_contains_secret_checks_both_strings() {
        let token = AuthToken::with_lifetime(Platform::YouTube, "abc", Duration::from_secs(60), now())
            .unwrap()
            .with_refresh_token("r-s3cret-x");
        assert!(token.contains_secret("s3cret"));
        assert!(!token.contains_secret("other"));
        assert!(!token.contains_secret(""));
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let token = AuthToken::with_lifetime(Platform::Reddit, "visible-access", Duration::from_secs(60), now())
            .unwrap()
            .with_refresh_token("visible-refresh");
        let rendered = format!("{token:?}");
        assert!(!rendered.contains("visible-access"));
        assert!(!rendered.contains("visible-refresh"));

        let creds = PlatformCredentials::new("id", "hunter2");
        assert!(!format!("{creds:?}").contains("hunter2"));
    }

    #[test]
    fn test_serde_round_trip_keeps_scopes_as_set() {
        let token = AuthToken::with_lifetime(Platform::Facebook, "abc", Duration::from_secs(60), now())
            .unwrap()
            .with_scopes(["b", "a", "a"])
            .with_metadata("page_id", Value::from("42"));
        let json = serde_json::to_string(&token).unwrap();
        let back: AuthToken = serde_json::from_str(&json).unwrap();
        assert_eq!(back, token);
        assert_eq!(back.scopes.len(), 2);
    }

    #[test]
    fn test_credentials_missing_fields() {
        assert_eq!(PlatformCredentials::new(" ", "").missing_fields(), vec!["client_id", "client_secret"]);
        assert!(PlatformCredentials::new("id", "secret").missing_fields().is_empty());
    }
}
