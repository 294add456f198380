//! Conversions from provider HTTP failures into domain auth errors.

use std::time::Duration;

use reqwest::header::{HeaderMap, RETRY_AFTER};
use reqwest::StatusCode;
use serde_json::Value;
use tokenwarden_domain::{AuthError, Platform};

const MAX_MESSAGE_LEN: usize = 200;

/// Map a transport-level reqwest failure (no HTTP status) to `NetworkError`.
pub fn transport_error(platform: Platform, err: &reqwest::Error) -> AuthError {
    let reason = if err.is_timeout() {
        "request timed out"
    } else if err.is_connect() {
        "connection failed"
    } else {
        "request failed"
    };
    AuthError::network(platform, format!("{reason}: {err}"))
}

/// Classify a non-success provider response.
///
/// 400 and 401 mean the grant or client is rejected, 403 a missing scope,
/// 429 throttling (honouring `Retry-After` seconds). Anything else,
/// including 5xx, is an unclassified platform error carrying the status.
pub fn status_error(
    platform: Platform,
    status: StatusCode,
    headers: &HeaderMap,
    body: &str,
) -> AuthError {
    let message = provider_message(body).unwrap_or_else(|| {
        status.canonical_reason().unwrap_or("unexpected response").to_string()
    });

    let err = match status.as_u16() {
        400 | 401 => AuthError::invalid_credentials(platform, message),
        403 => AuthError::insufficient_permissions(platform, message),
        429 => AuthError::rate_limited(platform, retry_after(headers)),
        _ => AuthError::platform_error(platform, message),
    };
    err.with_status(status.as_u16())
}

/// Classify an OAuth error code returned inside a response body.
pub fn oauth_error(platform: Platform, code: &str, description: Option<&str>) -> AuthError {
    let message = match description {
        Some(description) => format!("{code}: {description}"),
        None => code.to_string(),
    };
    match code {
        "invalid_grant" | "invalid_client" | "invalid_request" | "unauthorized_client"
        | "access_token_invalid" => AuthError::invalid_credentials(platform, message),
        "invalid_scope" | "scope_not_authorized" | "access_denied" => {
            AuthError::insufficient_permissions(platform, message)
        }
        "rate_limit_exceeded" | "slow_down" => AuthError::rate_limited(platform, None),
        _ => AuthError::platform_error(platform, message),
    }
}

fn retry_after(headers: &HeaderMap) -> Option<Duration> {
    headers
        .get(RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse::<u64>()
        .ok()
        .map(Duration::from_secs)
}

/// Best human-readable message from a provider error body.
fn provider_message(body: &str) -> Option<String> {
    let body = body.trim();
    if body.is_empty() {
        return None;
    }

    let message = match serde_json::from_str::<Value>(body) {
        Ok(json) => extract_json_message(&json)?,
        Err(_) => body.to_string(),
    };
    Some(truncate(message))
}

fn extract_json_message(json: &Value) -> Option<String> {
    // Graph API nests {"error": {"message": ..}}
    if let Some(message) = json.pointer("/error/message").and_then(Value::as_str) {
        return Some(message.to_string());
    }
    ["error_description", "message", "error"]
        .iter()
        .find_map(|key| json.get(*key).and_then(Value::as_str))
        .map(str::to_string)
}

fn truncate(mut message: String) -> String {
    if message.len() > MAX_MESSAGE_LEN {
        let mut cut = MAX_MESSAGE_LEN;
        while !message.is_char_boundary(cut) {
            cut -= 1;
        }
        message.truncate(cut);
        message.push('…');
    }
    message
}

#[cfg(test)]
mod tests {
    use reqwest::header::HeaderValue;
    use tokenwarden_domain::AuthErrorKind;

    use super::*;

    fn classify(status: u16, body: &str) -> AuthError {
        status_error(
            Platform::Reddit,
            StatusCode::from_u16(status).unwrap(),
            &HeaderMap::new(),
            body,
        )
    }

    #[test]
    fn maps_status_codes_to_kinds() {
        assert_eq!(classify(400, "").kind, AuthErrorKind::InvalidCredentials);
        assert_eq!(classify(401, "").kind, AuthErrorKind::InvalidCredentials);
        assert_eq!(classify(403, "").kind, AuthErrorKind::InsufficientPermissions);
        assert_eq!(classify(429, "").kind, AuthErrorKind::RateLimited);
        assert_eq!(classify(500, "").kind, AuthErrorKind::PlatformError);
        assert_eq!(classify(404, "").kind, AuthErrorKind::PlatformError);
        assert_eq!(classify(502, "").status, Some(502));
    }

    #[test]
    fn reads_retry_after_seconds() {
        let mut headers = HeaderMap::new();
        headers.insert(RETRY_AFTER, HeaderValue::from_static("42"));
        let err = status_error(Platform::TikTok, StatusCode::TOO_MANY_REQUESTS, &headers, "");
        assert_eq!(err.retry_after, Some(Duration::from_secs(42)));

        headers.insert(RETRY_AFTER, HeaderValue::from_static("Wed, 21 Oct 2015 07:28:00 GMT"));
        let err = status_error(Platform::TikTok, StatusCode::TOO_MANY_REQUESTS, &headers, "");
        assert_eq!(err.retry_after, None);
    }

    /// Validates message extraction from provider bodies.
    ///
    /// Assertions:
    /// - OAuth `error_description` wins over `error`.
    /// - Graph API nested messages are found.
    /// - Plain text bodies are used verbatim and long ones are truncated.
    #[test]
    fn extracts_provider_messages() {
        let err = classify(400, r#"{"error":"invalid_grant","error_description":"Bad refresh"}"#);
        assert_eq!(err.message, "Bad refresh");

        let err = classify(400, r#"{"error":{"message":"Session expired","code":190}}"#);
        assert_eq!(err.message, "Session expired");

        assert_eq!(classify(500, "upstream down").message, "upstream down");
        assert_eq!(classify(500, "").message, "Internal Server Error");

        let long = "x".repeat(500);
        assert!(classify(500, &long).message.chars().count() <= MAX_MESSAGE_LEN + 1);
    }

    #[test]
    fn maps_oauth_error_codes() {
        let p = Platform::TikTok;
        assert_eq!(oauth_error(p, "invalid_grant", None).kind, AuthErrorKind::InvalidCredentials);
        assert_eq!(oauth_error(p, "invalid_scope", None).kind, AuthErrorKind::InsufficientPermissions);
        assert_eq!(oauth_error(p, "rate_limit_exceeded", None).kind, AuthErrorKind::RateLimited);
        let err = oauth_error(p, "server_error", Some("try later"));
        assert_eq!(err.kind, AuthErrorKind::PlatformError);
        assert_eq!(err.message, "server_error: try later");
    }
}
