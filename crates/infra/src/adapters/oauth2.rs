//! Generic OAuth 2.0 adapter driven by a [`ProviderProfile`].

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{Map, Value};
use tokenwarden_common::time::Clock;
use tokenwarden_core::PlatformAdapter;
use tokenwarden_domain::{
    AuthError, AuthErrorKind, AuthToken, Platform, PlatformCredentials, Result, TokenType,
    UserInfo,
};
use tracing::{debug, instrument};
use url::Url;

use super::profile::{ClientAuth, ProviderProfile, RefreshGrant, RevokeMethod};
use crate::errors::{oauth_error, status_error};
use crate::http::HttpClient;

/// Token endpoint response. Everything but the access token is optional
/// across providers; some also report OAuth errors with a 200 status.
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
    refresh_token: Option<String>,
    expires_in: Option<u64>,
    refresh_expires_in: Option<u64>,
    scope: Option<String>,
    token_type: Option<String>,
    open_id: Option<String>,
    user_id: Option<Value>,
    error: Option<String>,
    error_description: Option<String>,
}

/// Adapter for any provider speaking standard OAuth 2.0 with the quirks
/// captured in its profile.
pub struct OAuth2PlatformAdapter {
    profile: ProviderProfile,
    http: HttpClient,
    clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for OAuth2PlatformAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OAuth2PlatformAdapter").field("profile", &self.profile).finish_non_exhaustive()
    }
}

impl OAuth2PlatformAdapter {
    pub fn new(profile: ProviderProfile, http: HttpClient, clock: Arc<dyn Clock>) -> Self {
        Self { profile, http, clock }
    }

    pub fn profile(&self) -> &ProviderProfile {
        &self.profile
    }

    fn platform_id(&self) -> Platform {
        self.profile.platform
    }

    /// POST a grant to the token endpoint and convert the answer.
    async fn token_request(
        &self,
        credentials: &PlatformCredentials,
        mut form: Vec<(&'static str, String)>,
        previous: Option<&AuthToken>,
    ) -> Result<AuthToken> {
        let builder = self.http.request(Method::POST, &self.profile.token_url);
        let builder = self.client_auth(builder, credentials, &mut form);
        let response = self.http.send(self.platform_id(), builder.form(&form)).await?;
        let body: TokenResponse = self.read_json(response).await?;
        self.into_token(body, credentials, previous)
    }

    fn client_auth(
        &self,
        builder: RequestBuilder,
        credentials: &PlatformCredentials,
        form: &mut Vec<(&'static str, String)>,
    ) -> RequestBuilder {
        match self.profile.client_auth {
            ClientAuth::FormBody => {
                form.push((self.profile.client_id_param, credentials.client_id.clone()));
                form.push(("client_secret", credentials.client_secret.clone()));
                builder
            }
            ClientAuth::BasicAuth => {
                builder.basic_auth(&credentials.client_id, Some(&credentials.client_secret))
            }
        }
    }

    async fn read_json<T: DeserializeOwned>(&self, response: Response) -> Result<T> {
        let platform = self.platform_id();
        let status = response.status();
        let headers = response.headers().clone();
        let body = response.text().await.map_err(|err| {
            AuthError::network(platform, format!("failed to read response body: {err}"))
        })?;

        if !status.is_success() {
            return Err(status_error(platform, status, &headers, &body));
        }
        serde_json::from_str(&body).map_err(|err| {
            AuthError::platform_error(platform, format!("unexpected response body: {err}"))
                .with_status(status.as_u16())
        })
    }

    fn into_token(
        &self,
        body: TokenResponse,
        credentials: &PlatformCredentials,
        previous: Option<&AuthToken>,
    ) -> Result<AuthToken> {
        let platform = self.platform_id();
        let access_token = match (body.access_token, body.error) {
            (Some(access), _) if !access.is_empty() => access,
            (_, Some(code)) => {
                return Err(oauth_error(platform, &code, body.error_description.as_deref()))
            }
            _ => {
                return Err(AuthError::platform_error(platform, "token response has no access_token"))
            }
        };

        let lifetime = body
            .expires_in
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
            .unwrap_or(self.profile.default_lifetime);
        let mut token =
            AuthToken::with_lifetime(platform, access_token, lifetime, self.clock.utc_now())?;

        token.token_type = match body.token_type.as_deref().map(str::to_ascii_lowercase) {
            Some(kind) if kind == "basic" => TokenType::Basic,
            _ => TokenType::Bearer,
        };

        // Providers that rotate refresh tokens send a new one; the rest
        // expect the old one to be reused.
        token.refresh_token = body
            .refresh_token
            .filter(|t| !t.is_empty())
            .or_else(|| previous.and_then(|p| p.refresh_token.clone()));

        token.scopes = match body.scope.as_deref() {
            Some(raw) => ProviderProfile::split_scopes(raw).into_iter().collect(),
            None => match previous {
                Some(previous) => previous.scopes.clone(),
                None => credentials.scopes.iter().cloned().collect(),
            },
        };

        token.user_id = body
            .open_id
            .or_else(|| body.user_id.as_ref().and_then(value_to_string))
            .or_else(|| previous.and_then(|p| p.user_id.clone()));

        if let Some(secs) = body.refresh_expires_in {
            token.metadata.insert("refresh_expires_in".to_string(), Value::from(secs));
        }
        Ok(token)
    }
}

fn value_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Normalise the assorted user-info shapes into [`UserInfo`].
fn parse_user_info(platform: Platform, body: Value) -> Result<UserInfo> {
    // TikTok wraps the profile as {"data": {"user": {..}}}
    let mut fields = match body {
        Value::Object(mut map) => match map.remove("data") {
            Some(Value::Object(mut data)) => match data.remove("user") {
                Some(Value::Object(user)) => user,
                _ => data,
            },
            Some(other) => {
                map.insert("data".to_string(), other);
                map
            }
            None => map,
        },
        _ => return Err(AuthError::platform_error(platform, "user info is not a JSON object")),
    };

    let id = ["open_id", "id", "sub"]
        .iter()
        .find_map(|key| fields.remove(*key).as_ref().and_then(value_to_string))
        .ok_or_else(|| AuthError::platform_error(platform, "user info has no account id"))?;
    let username = take_string(&mut fields, &["username", "name", "email"]);
    let display_name = take_string(&mut fields, &["display_name", "given_name"]);

    Ok(UserInfo { platform, id, username, display_name, extra: fields })
}

fn take_string(fields: &mut Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| match fields.get(*key) {
        Some(Value::String(_)) => match fields.remove(*key) {
            Some(Value::String(s)) => Some(s),
            _ => None,
        },
        _ => None,
    })
}

#[async_trait]
impl PlatformAdapter for OAuth2PlatformAdapter {
    fn platform(&self) -> Platform {
        self.profile.platform
    }

    fn authorization_url(&self, credentials: &PlatformCredentials, state: &str) -> Result<String> {
        let platform = self.platform_id();
        let redirect_uri = credentials.redirect_uri.as_deref().ok_or_else(|| {
            AuthError::invalid_credentials(platform, "redirect_uri is required for authorization")
        })?;

        let mut url = Url::parse(&self.profile.authorize_url).map_err(|err| {
            AuthError::platform_error(platform, format!("invalid authorize url: {err}"))
        })?;
        {
            let mut query = url.query_pairs_mut();
            query
                .append_pair(self.profile.client_id_param, &credentials.client_id)
                .append_pair("redirect_uri", redirect_uri)
                .append_pair("response_type", "code")
                .append_pair("state", state);
            if !credentials.scopes.is_empty() {
                query.append_pair("scope", &self.profile.join_scopes(&credentials.scopes));
            }
            for (key, value) in &self.profile.extra_authorize_params {
                query.append_pair(key, value);
            }
        }
        Ok(url.to_string())
    }

    #[instrument(skip(self, credentials), fields(platform = %self.profile.platform))]
    async fn authenticate(&self, credentials: &PlatformCredentials) -> Result<AuthToken> {
        if !self.profile.supports_client_credentials {
            return Err(AuthError::invalid_credentials(
                self.platform_id(),
                "platform requires user authorization; use the authorization-code flow",
            ));
        }
        let mut form = vec![("grant_type", "client_credentials".to_string())];
        if !credentials.scopes.is_empty() {
            form.push(("scope", self.profile.join_scopes(&credentials.scopes)));
        }
        self.token_request(credentials, form, None).await
    }

    #[instrument(skip(self, credentials, code), fields(platform = %self.profile.platform))]
    async fn exchange_authorization_code(
        &self,
        credentials: &PlatformCredentials,
        code: &str,
    ) -> Result<AuthToken> {
        let redirect_uri = credentials.redirect_uri.clone().ok_or_else(|| {
            AuthError::invalid_credentials(self.platform_id(), "redirect_uri is required")
        })?;
        let form = vec![
            ("grant_type", "authorization_code".to_string()),
            ("code", code.to_string()),
            ("redirect_uri", redirect_uri),
        ];
        self.token_request(credentials, form, None).await
    }

    #[instrument(skip(self, credentials, token), fields(platform = %self.profile.platform))]
    async fn refresh_token(
        &self,
        credentials: &PlatformCredentials,
        token: &AuthToken,
    ) -> Result<AuthToken> {
        let form = match self.profile.refresh_grant {
            RefreshGrant::RefreshToken => {
                let refresh_token = token
                    .refresh_token
                    .clone()
                    .filter(|t| !t.is_empty())
                    .ok_or_else(|| {
                        AuthError::token_expired(self.platform_id(), "no refresh token available")
                    })?;
                vec![("grant_type", "refresh_token".to_string()), ("refresh_token", refresh_token)]
            }
            RefreshGrant::FbExchangeToken => vec![
                ("grant_type", "fb_exchange_token".to_string()),
                ("fb_exchange_token", token.access_token.clone()),
            ],
        };
        debug!(grant = ?self.profile.refresh_grant, "requesting token refresh");
        self.token_request(credentials, form, Some(token)).await
    }

    async fn validate_token(&self, token: &AuthToken) -> Result<bool> {
        match self.get_user_info(token).await {
            Ok(_) => Ok(true),
            Err(err) if err.is_kind(AuthErrorKind::InvalidCredentials) => Ok(false),
            Err(err) => {
                debug!(platform = %self.platform_id(), error = %err, "validation inconclusive");
                Ok(true)
            }
        }
    }

    #[instrument(skip(self, credentials, token), fields(platform = %self.profile.platform))]
    async fn revoke_token(
        &self,
        credentials: &PlatformCredentials,
        token: &AuthToken,
    ) -> Result<()> {
        let builder = match self.profile.revoke_method {
            RevokeMethod::PostForm => {
                // Revoking the refresh token ends the whole grant
                let secret = token.refresh_token.clone().unwrap_or_else(|| token.access_token.clone());
                let mut form = vec![("token", secret)];
                let builder = self.http.request(Method::POST, &self.profile.revoke_url);
                let builder = self.client_auth(builder, credentials, &mut form);
                builder.form(&form)
            }
            RevokeMethod::DeleteWithToken => self
                .http
                .request(Method::DELETE, &self.profile.revoke_url)
                .query(&[("access_token", token.access_token.as_str())]),
        };

        let response = self.http.send(self.platform_id(), builder).await?;
        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        let headers = response.headers().clone();
        let body = response.text().await.unwrap_or_default();
        Err(status_error(self.platform_id(), status, &headers, &body))
    }

    async fn get_user_info(&self, token: &AuthToken) -> Result<UserInfo> {
        let builder = self
            .http
            .request(Method::GET, &self.profile.user_info_url)
            .bearer_auth(&token.access_token);
        let response = self.http.send(self.platform_id(), builder).await?;
        let body: Value = self.read_json(response).await?;
        parse_user_info(self.platform_id(), body)
    }
}
