//! Static description of each provider's OAuth 2.0 flavour.

use std::time::Duration;

use tokenwarden_domain::Platform;
use url::Url;

const SIXTY_DAYS: Duration = Duration::from_secs(60 * 24 * 60 * 60);
const ONE_DAY: Duration = Duration::from_secs(24 * 60 * 60);
const ONE_HOUR: Duration = Duration::from_secs(60 * 60);

/// How the app authenticates itself at the token endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientAuth {
    /// Client id and secret as form fields.
    FormBody,
    /// HTTP basic auth header.
    BasicAuth,
}

/// Grant used to renew an access token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshGrant {
    /// Standard `refresh_token` grant; requires a stored refresh token.
    RefreshToken,
    /// Graph API long-lived token exchange, keyed by the access token itself.
    FbExchangeToken,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RevokeMethod {
    /// POST the token as a form field to the revoke endpoint.
    PostForm,
    /// DELETE the revoke endpoint with the access token as a query param.
    DeleteWithToken,
}

/// Endpoints and quirks of one provider.
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderProfile {
    pub platform: Platform,
    pub authorize_url: String,
    pub token_url: String,
    pub revoke_url: String,
    pub user_info_url: String,
    /// Name of the client id parameter (`client_key` on TikTok).
    pub client_id_param: &'static str,
    pub scope_delimiter: &'static str,
    /// Lifetime assumed when the provider omits `expires_in`.
    pub default_lifetime: Duration,
    pub client_auth: ClientAuth,
    pub refresh_grant: RefreshGrant,
    pub revoke_method: RevokeMethod,
    pub supports_client_credentials: bool,
    pub extra_authorize_params: Vec<(&'static str, &'static str)>,
}

impl ProviderProfile {
    /// Built-in profile for an OAuth platform; `None` for anonymous ones.
    pub fn for_platform(platform: Platform) -> Option<Self> {
        match platform {
            Platform::TikTok => Some(Self::tiktok()),
            Platform::Instagram => Some(Self::instagram()),
            Platform::Facebook => Some(Self::facebook()),
            Platform::YouTube => Some(Self::youtube()),
            Platform::Reddit => Some(Self::reddit()),
            Platform::Rss => None,
        }
    }

    pub fn tiktok() -> Self {
        Self {
            platform: Platform::TikTok,
            authorize_url: "https://www.tiktok.com/v2/auth/authorize/".to_string(),
            token_url: "https://open.tiktokapis.com/v2/oauth/token/".to_string(),
            revoke_url: "https://open.tiktokapis.com/v2/oauth/revoke/".to_string(),
            user_info_url:
                "https://open.tiktokapis.com/v2/user/info/?fields=open_id,union_id,display_name"
                    .to_string(),
            client_id_param: "client_key",
            scope_delimiter: ",",
            default_lifetime: ONE_DAY,
            client_auth: ClientAuth::FormBody,
            refresh_grant: RefreshGrant::RefreshToken,
            revoke_method: RevokeMethod::PostForm,
            supports_client_credentials: false,
            extra_authorize_params: Vec::new(),
        }
    }

    /// Instagram business accounts authorize through Facebook Login and
    /// share the Graph API endpoints.
    pub fn instagram() -> Self {
        Self::graph_api(Platform::Instagram)
    }

    pub fn facebook() -> Self {
        Self::graph_api(Platform::Facebook)
    }

    fn graph_api(platform: Platform) -> Self {
        Self {
            platform,
            authorize_url: "https://www.facebook.com/v19.0/dialog/oauth".to_string(),
            token_url: "https://graph.facebook.com/v19.0/oauth/access_token".to_string(),
            revoke_url: "https://graph.facebook.com/v19.0/me/permissions".to_string(),
            user_info_url: "https://graph.facebook.com/v19.0/me?fields=id,name".to_string(),
            client_id_param: "client_id",
            scope_delimiter: ",",
            default_lifetime: SIXTY_DAYS,
            client_auth: ClientAuth::FormBody,
            refresh_grant: RefreshGrant::FbExchangeToken,
            revoke_method: RevokeMethod::DeleteWithToken,
            supports_client_credentials: false,
            extra_authorize_params: Vec::new(),
        }
    }

    pub fn youtube() -> Self {
        Self {
            platform: Platform::YouTube,
            authorize_url: "https://accounts.google.com/o/oauth2/v2/auth".to_string(),
            token_url: "https://oauth2.googleapis.com/token".to_string(),
            revoke_url: "https://oauth2.googleapis.com/revoke".to_string(),
            user_info_url: "https://www.googleapis.com/oauth2/v3/userinfo".to_string(),
            client_id_param: "client_id",
            scope_delimiter: " ",
            default_lifetime: ONE_HOUR,
            client_auth: ClientAuth::FormBody,
            refresh_grant: RefreshGrant::RefreshToken,
            revoke_method: RevokeMethod::PostForm,
            supports_client_credentials: false,
            // Google only issues refresh tokens for offline consent
            extra_authorize_params: vec![("access_type", "offline"), ("prompt", "consent")],
        }
    }

    pub fn reddit() -> Self {
        Self {
            platform: Platform::Reddit,
            authorize_url: "https://www.reddit.com/api/v1/authorize".to_string(),
            token_url: "https://www.reddit.com/api/v1/access_token".to_string(),
            revoke_url: "https://www.reddit.com/api/v1/revoke_token".to_string(),
            user_info_url: "https://oauth.reddit.com/api/v1/me".to_string(),
            client_id_param: "client_id",
            scope_delimiter: " ",
            default_lifetime: ONE_HOUR,
            client_auth: ClientAuth::BasicAuth,
            refresh_grant: RefreshGrant::RefreshToken,
            revoke_method: RevokeMethod::PostForm,
            supports_client_credentials: true,
            extra_authorize_params: vec![("duration", "permanent")],
        }
    }

    /// Point every endpoint at `base`, keeping paths and queries. Used to
    /// aim adapters at a local mock server.
    pub fn with_base_url(mut self, base: &str) -> Result<Self, url::ParseError> {
        let base = Url::parse(base)?;
        for endpoint in [
            &mut self.authorize_url,
            &mut self.token_url,
            &mut self.revoke_url,
            &mut self.user_info_url,
        ] {
            let original = Url::parse(endpoint)?;
            let mut rebased = base.clone();
            rebased.set_path(original.path());
            rebased.set_query(original.query());
            *endpoint = rebased.to_string();
        }
        Ok(self)
    }

    pub fn join_scopes(&self, scopes: &[String]) -> String {
        scopes.join(self.scope_delimiter)
    }

    /// Split a scope string as returned by the provider. Providers are not
    /// consistent about their own delimiter, so both commas and whitespace
    /// separate.
    pub fn split_scopes(raw: &str) -> Vec<String> {
        raw.split(|c: char| c == ',' || c.is_whitespace())
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect()
    }
}
