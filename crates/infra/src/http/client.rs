use std::time::Duration;

use reqwest::{Client as ReqwestClient, Method, RequestBuilder, Response};
use tokenwarden_domain::{AuthError, HttpSettings, Platform, Result};
use tracing::debug;

use crate::errors::transport_error;

/// Thin reqwest wrapper shared by provider adapters.
///
/// The client never retries on its own; retry and circuit gating belong to
/// the coordinator.
#[derive(Clone, Debug)]
pub struct HttpClient {
    client: ReqwestClient,
}

impl HttpClient {
    /// Start building a new HTTP client.
    pub fn builder() -> HttpClientBuilder {
        HttpClientBuilder::default()
    }

    pub fn from_settings(settings: &HttpSettings) -> std::result::Result<Self, reqwest::Error> {
        Self::builder().timeout(settings.timeout()).user_agent(settings.user_agent.clone()).build()
    }

    /// Create a request builder using the underlying reqwest client.
    pub fn request<U>(&self, method: Method, url: U) -> RequestBuilder
    where
        U: reqwest::IntoUrl,
    {
        self.client.request(method, url)
    }

    /// Execute `builder`, normalising transport failures into
    /// `NetworkError` for `platform`. Any HTTP status is returned as-is.
    pub async fn send(&self, platform: Platform, builder: RequestBuilder) -> Result<Response> {
        let request = builder.build().map_err(|err| {
            AuthError::platform_error(platform, format!("failed to build request: {err}"))
        })?;

        let method = request.method().clone();
        let url = redacted(request.url());
        debug!(platform = %platform, %method, %url, "sending provider request");

        match self.client.execute(request).await {
            Ok(response) => {
                let status = response.status();
                debug!(platform = %platform, %method, %url, %status, "received provider response");
                Ok(response)
            }
            Err(err) => {
                debug!(platform = %platform, %method, %url, error = %err, "provider request failed");
                Err(transport_error(platform, &err))
            }
        }
    }
}

/// URL without its query string, which may carry tokens.
fn redacted(url: &reqwest::Url) -> String {
    let mut url = url.clone();
    url.set_query(None);
    url.to_string()
}

/// Builder for [`HttpClient`].
#[derive(Debug)]
pub struct HttpClientBuilder {
    timeout: Duration,
    user_agent: Option<String>,
}

impl Default for HttpClientBuilder {
    fn default() -> Self {
        Self { timeout: Duration::from_secs(30), user_agent: None }
    }
}

impl HttpClientBuilder {
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn user_agent(mut self, agent: impl Into<String>) -> Self {
        self.user_agent = Some(agent.into());
        self
    }

    pub fn build(self) -> std::result::Result<HttpClient, reqwest::Error> {
        let mut builder = ReqwestClient::builder().timeout(self.timeout).no_proxy();

        if let Some(agent) = self.user_agent {
            builder = builder.user_agent(agent);
        }

        Ok(HttpClient { client: builder.build()? })
    }
}

#[cfg(test)]
mod tests {
    use std::net::TcpListener;

    use reqwest::StatusCode;
    use tokenwarden_domain::AuthErrorKind;
    use wiremock::matchers::{header, method};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    #[tokio::test]
    async fn returns_error_statuses_without_retry() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .expect(1)
            .mount(&server)
            .await;

        let client = HttpClient::builder().build().unwrap();
        let response = client
            .send(Platform::Reddit, client.request(Method::GET, server.uri()))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn sends_configured_user_agent() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(header("user-agent", "tokenwarden-test"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let client = HttpClient::builder().user_agent("tokenwarden-test").build().unwrap();
        let response = client
            .send(Platform::Reddit, client.request(Method::GET, server.uri()))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn connection_failure_is_a_network_error() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener); // release the port so that requests fail with ECONNREFUSED

        let client = HttpClient::builder().timeout(Duration::from_secs(2)).build().unwrap();
        let err = client
            .send(Platform::YouTube, client.request(Method::GET, format!("http://{addr}")))
            .await
            .unwrap_err();

        assert_eq!(err.kind, AuthErrorKind::NetworkError);
        assert_eq!(err.platform, Platform::YouTube);
    }

    #[test]
    fn redacts_query_strings() {
        let url = reqwest::Url::parse("https://graph.example.test/me?access_token=abc").unwrap();
        assert_eq!(redacted(&url), "https://graph.example.test/me");
    }
}
