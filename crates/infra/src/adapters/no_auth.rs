//! Adapter for platforms read anonymously.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokenwarden_common::time::Clock;
use tokenwarden_core::PlatformAdapter;
use tokenwarden_domain::constants::NO_AUTH_TOKEN_LIFETIME_SECS;
use tokenwarden_domain::{
    AuthError, AuthToken, Platform, PlatformCredentials, Result, TokenType, UserInfo,
};

/// Placeholder access token for anonymous platforms.
pub const NO_AUTH_ACCESS_TOKEN: &str = "no-auth";

/// Issues long-lived placeholder tokens so anonymous platforms flow through
/// the same lifecycle as OAuth ones.
pub struct NoAuthAdapter {
    platform: Platform,
    clock: Arc<dyn Clock>,
}

impl NoAuthAdapter {
    pub fn new(platform: Platform, clock: Arc<dyn Clock>) -> Self {
        Self { platform, clock }
    }

    fn issue(&self) -> Result<AuthToken> {
        let token = AuthToken::with_lifetime(
            self.platform,
            NO_AUTH_ACCESS_TOKEN,
            Duration::from_secs(NO_AUTH_TOKEN_LIFETIME_SECS),
            self.clock.utc_now(),
        )?;
        Ok(token.with_token_type(TokenType::None))
    }
}

impl std::fmt::Debug for NoAuthAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NoAuthAdapter").field("platform", &self.platform).finish_non_exhaustive()
    }
}

#[async_trait]
impl PlatformAdapter for NoAuthAdapter {
    fn platform(&self) -> Platform {
        self.platform
    }

    fn requires_authentication(&self) -> bool {
        false
    }

    fn authorization_url(&self, _credentials: &PlatformCredentials, _state: &str) -> Result<String> {
        Err(AuthError::invalid_credentials(self.platform, "platform does not use authorization"))
    }

    async fn authenticate(&self, _credentials: &PlatformCredentials) -> Result<AuthToken> {
        self.issue()
    }

    async fn exchange_authorization_code(
        &self,
        _credentials: &PlatformCredentials,
        _code: &str,
    ) -> Result<AuthToken> {
        self.issue()
    }

    async fn refresh_token(
        &self,
        _credentials: &PlatformCredentials,
        _token: &AuthToken,
    ) -> Result<AuthToken> {
        self.issue()
    }

    async fn validate_token(&self, token: &AuthToken) -> Result<bool> {
        Ok(!token.is_expired(self.clock.utc_now()))
    }

    async fn revoke_token(
        &self,
        _credentials: &PlatformCredentials,
        _token: &AuthToken,
    ) -> Result<()> {
        Ok(())
    }

    async fn get_user_info(&self, _token: &AuthToken) -> Result<UserInfo> {
        Ok(UserInfo {
            platform: self.platform,
            id: "anonymous".to_string(),
            username: None,
            display_name: None,
            extra: Default::default(),
        })
    }
}
