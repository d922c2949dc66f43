//! Brightbox API client implementation.
//!
//! This module provides the HTTP client for the Brightbox REST API,
//! authenticating with OAuth client credentials.

use async_trait::async_trait;
use reqwest::{Client, Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, trace};

use crate::error::{ApiError, ApiResult};

use super::CloudApi;
use super::types::{ApiClient, ApiClientOptions, CloudIp, CloudIpOptions};

/// Default request timeout in seconds.
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Maximum number of attempts for transient failures.
const MAX_RETRIES: u32 = 3;

/// Delay between retries in milliseconds.
const RETRY_DELAY_MS: u64 = 1000;

/// Refresh the access token this long before it expires.
const TOKEN_EXPIRY_MARGIN_SECS: u64 = 30;

/// Brightbox API client.
#[derive(Debug, Clone)]
pub struct BrightboxClient {
    /// HTTP client.
    client: Client,
    /// API base URL without a trailing slash.
    api_url: String,
    /// API client identifier.
    client_id: String,
    /// API client secret.
    client_secret: String,
    /// Account to scope requests to.
    account: Option<String>,
    /// Base delay between retries.
    retry_delay: Duration,
    /// Cached access token.
    token: Arc<Mutex<Option<AccessToken>>>,
}

#[derive(Debug, Clone)]
struct AccessToken {
    value: String,
    expires_at: Instant,
}

impl AccessToken {
    fn is_fresh(&self) -> bool {
        Instant::now() < self.expires_at
    }
}

#[derive(Debug, Serialize)]
struct TokenRequest {
    grant_type: &'static str,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: u64,
}

#[derive(Debug, Serialize)]
struct MapRequest<'a> {
    destination: &'a str,
}

impl BrightboxClient {
    /// Creates a new Brightbox API client.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be created.
    pub fn new(api_url: &str, client_id: &str, client_secret: &str) -> ApiResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .build()
            .map_err(|e| ApiError::network(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            api_url: api_url.trim_end_matches('/').to_string(),
            client_id: client_id.to_string(),
            client_secret: client_secret.to_string(),
            account: None,
            retry_delay: Duration::from_millis(RETRY_DELAY_MS),
            token: Arc::new(Mutex::new(None)),
        })
    }

    /// Scopes every request to an account.
    #[must_use]
    pub fn with_account(mut self, account: Option<String>) -> Self {
        self.account = account.filter(|a| !a.is_empty());
        self
    }

    /// Sets the base delay between retries.
    #[must_use]
    pub const fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.api_url)
    }

    /// Returns a valid access token, requesting a new one when needed.
    async fn access_token(&self) -> ApiResult<String> {
        let mut cached = self.token.lock().await;
        if let Some(token) = cached.as_ref().filter(|t| t.is_fresh()) {
            return Ok(token.value.clone());
        }

        let token = self.fetch_token().await?;
        let value = token.value.clone();
        *cached = Some(token);
        Ok(value)
    }

    async fn fetch_token(&self) -> ApiResult<AccessToken> {
        debug!("Requesting access token for {}", self.client_id);

        let response = self
            .client
            .post(self.url("/token"))
            .basic_auth(&self.client_id, Some(&self.client_secret))
            .json(&TokenRequest {
                grant_type: "client_credentials",
            })
            .send()
            .await
            .map_err(|e| ApiError::network(format!("Token request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ApiError::Unauthorized {
                message: format!("token request rejected with status {status}"),
            });
        }

        let body: TokenResponse = response.json().await.map_err(|e| ApiError::InvalidResponse {
            message: format!("Failed to parse token response: {e}"),
        })?;

        let lifetime = body.expires_in.saturating_sub(TOKEN_EXPIRY_MARGIN_SECS);
        Ok(AccessToken {
            value: body.access_token,
            expires_at: Instant::now() + Duration::from_secs(lifetime),
        })
    }

    /// Executes a request and decodes the JSON response.
    async fn execute<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Option<serde_json::Value>,
    ) -> ApiResult<T> {
        let text = self.execute_raw(method, path, body).await?;
        serde_json::from_str(&text).map_err(|e| ApiError::InvalidResponse {
            message: format!("Failed to parse response from {path}: {e}"),
        })
    }

    /// Executes a request, retrying transient failures.
    async fn execute_raw(
        &self,
        method: Method,
        path: &str,
        body: Option<serde_json::Value>,
    ) -> ApiResult<String> {
        let mut last_error: Option<ApiError> = None;

        for attempt in 0..MAX_RETRIES {
            if let Some(e) = &last_error {
                let delay = e
                    .retry_delay_secs()
                    .map_or(self.retry_delay * attempt, Duration::from_secs);
                debug!(
                    "Retry attempt {attempt} of {MAX_RETRIES} for {method} {path} in {}ms",
                    delay.as_millis()
                );
                tokio::time::sleep(delay).await;
            }

            match self.execute_once(&method, path, body.as_ref()).await {
                Ok(text) => return Ok(text),
                Err(e) if e.is_retryable() => last_error = Some(e),
                Err(e) => return Err(e),
            }
        }

        Err(last_error.unwrap_or_else(|| ApiError::network("Max retries exceeded")))
    }

    /// Executes a single request.
    async fn execute_once(
        &self,
        method: &Method,
        path: &str,
        body: Option<&serde_json::Value>,
    ) -> ApiResult<String> {
        trace!("{method} {path}");

        let token = self.access_token().await?;
        let mut request = self
            .client
            .request(method.clone(), self.url(path))
            .bearer_auth(token);
        if let Some(account) = &self.account {
            request = request.query(&[("account_id", account)]);
        }
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request
            .send()
            .await
            .map_err(|e| ApiError::network(format!("Request failed: {e}")))?;

        let status = response.status();

        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse().ok())
                .unwrap_or_default();
            let retry_after = if retry_after == 0 { 60 } else { retry_after };

            return Err(ApiError::RateLimited {
                retry_after_secs: retry_after,
            });
        }

        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            self.token.lock().await.take();
            return Err(ApiError::Unauthorized {
                message: format!("{method} {path} returned {status}"),
            });
        }

        if status == StatusCode::NOT_FOUND {
            return Err(ApiError::not_found(path));
        }

        let text = response
            .text()
            .await
            .map_err(|e| ApiError::network(format!("Failed to read response: {e}")))?;

        if !status.is_success() {
            return Err(ApiError::request(status.as_u16(), text));
        }

        Ok(text)
    }
}

fn encode<B: Serialize>(body: &B) -> ApiResult<serde_json::Value> {
    serde_json::to_value(body).map_err(|e| ApiError::InvalidResponse {
        message: format!("Failed to encode request body: {e}"),
    })
}

#[async_trait]
impl CloudApi for BrightboxClient {
    async fn cloud_ip(&self, id: &str) -> ApiResult<CloudIp> {
        self.execute(Method::GET, &format!("/1.0/cloud_ips/{id}"), None)
            .await
    }

    async fn create_cloud_ip(&self, options: &CloudIpOptions) -> ApiResult<CloudIp> {
        self.execute(Method::POST, "/1.0/cloud_ips", Some(encode(options)?))
            .await
    }

    async fn update_cloud_ip(&self, options: &CloudIpOptions) -> ApiResult<CloudIp> {
        self.execute(
            Method::PUT,
            &format!("/1.0/cloud_ips/{}", options.id),
            Some(encode(options)?),
        )
        .await
    }

    async fn destroy_cloud_ip(&self, id: &str) -> ApiResult<()> {
        self.execute_raw(Method::DELETE, &format!("/1.0/cloud_ips/{id}"), None)
            .await
            .map(drop)
    }

    async fn map_cloud_ip(&self, id: &str, target: &str) -> ApiResult<CloudIp> {
        let body = encode(&MapRequest {
            destination: target,
        })?;
        self.execute(Method::POST, &format!("/1.0/cloud_ips/{id}/map"), Some(body))
            .await
    }

    async fn unmap_cloud_ip(&self, id: &str) -> ApiResult<CloudIp> {
        self.execute(Method::POST, &format!("/1.0/cloud_ips/{id}/unmap"), None)
            .await
    }

    async fn api_client(&self, id: &str) -> ApiResult<ApiClient> {
        self.execute(Method::GET, &format!("/1.0/api_clients/{id}"), None)
            .await
    }

    async fn create_api_client(&self, options: &ApiClientOptions) -> ApiResult<ApiClient> {
        self.execute(Method::POST, "/1.0/api_clients", Some(encode(options)?))
            .await
    }

    async fn update_api_client(&self, options: &ApiClientOptions) -> ApiResult<ApiClient> {
        self.execute(
            Method::PUT,
            &format!("/1.0/api_clients/{}", options.id),
            Some(encode(options)?),
        )
        .await
    }

    async fn destroy_api_client(&self, id: &str) -> ApiResult<()> {
        self.execute_raw(Method::DELETE, &format!("/1.0/api_clients/{id}"), None)
            .await
            .map(drop)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::CloudIpStatus;
    use serde_json::json;
    use wiremock::matchers::{body_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn server_with_token() -> MockServer {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": "tok-123",
                "token_type": "Bearer",
                "expires_in": 7200
            })))
            .mount(&server)
            .await;
        server
    }

    fn client_for(server: &MockServer) -> BrightboxClient {
        BrightboxClient::new(&server.uri(), "cli-abc12", "secret")
            .unwrap()
            .with_retry_delay(Duration::from_millis(1))
    }

    fn cloud_ip_json(status: &str) -> serde_json::Value {
        json!({
            "id": "cip-k4a25",
            "status": status,
            "public_ipv4": "109.107.37.180",
            "server": {"id": "srv-lv426"}
        })
    }

    #[tokio::test]
    async fn test_get_cloud_ip_uses_bearer_token() {
        let server = server_with_token().await;
        Mock::given(method("GET"))
            .and(path("/1.0/cloud_ips/cip-k4a25"))
            .and(header("authorization", "Bearer tok-123"))
            .respond_with(ResponseTemplate::new(200).set_body_json(cloud_ip_json("mapped")))
            .expect(2)
            .mount(&server)
            .await;

        let client = client_for(&server);
        let first = client.cloud_ip("cip-k4a25").await.unwrap();
        let second = client.cloud_ip("cip-k4a25").await.unwrap();

        assert_eq!(first.status, CloudIpStatus::Mapped);
        assert_eq!(second.public_ipv4, "109.107.37.180");
    }

    #[tokio::test]
    async fn test_not_found() {
        let server = server_with_token().await;
        Mock::given(method("GET"))
            .and(path("/1.0/cloud_ips/cip-gone1"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let err = client_for(&server).cloud_ip("cip-gone1").await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_map_sends_destination() {
        let server = server_with_token().await;
        Mock::given(method("POST"))
            .and(path("/1.0/cloud_ips/cip-k4a25/map"))
            .and(body_json(json!({"destination": "int-ds42k"})))
            .respond_with(ResponseTemplate::new(202).set_body_json(cloud_ip_json("unmapped")))
            .expect(1)
            .mount(&server)
            .await;

        let cip = client_for(&server)
            .map_cloud_ip("cip-k4a25", "int-ds42k")
            .await
            .unwrap();
        assert_eq!(cip.status, CloudIpStatus::Unmapped);
    }

    #[tokio::test]
    async fn test_account_scoping() {
        let server = server_with_token().await;
        Mock::given(method("DELETE"))
            .and(path("/1.0/api_clients/cli-abc12"))
            .and(query_param("account_id", "acc-12345"))
            .respond_with(ResponseTemplate::new(202))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server).with_account(Some(String::from("acc-12345")));
        client.destroy_api_client("cli-abc12").await.unwrap();
    }

    #[tokio::test]
    async fn test_rate_limit_waits_for_retry_after() {
        let server = server_with_token().await;
        Mock::given(method("GET"))
            .and(path("/1.0/cloud_ips/cip-k4a25"))
            .respond_with(ResponseTemplate::new(429).insert_header("retry-after", "1"))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/1.0/cloud_ips/cip-k4a25"))
            .respond_with(ResponseTemplate::new(200).set_body_json(cloud_ip_json("mapped")))
            .mount(&server)
            .await;

        let start = std::time::Instant::now();
        let cip = client_for(&server).cloud_ip("cip-k4a25").await.unwrap();
        assert_eq!(cip.id, "cip-k4a25");
        assert!(start.elapsed() >= Duration::from_secs(1));
    }

    #[tokio::test]
    async fn test_validation_error_is_not_retried() {
        let server = server_with_token().await;
        Mock::given(method("PUT"))
            .and(path("/1.0/cloud_ips/cip-k4a25"))
            .respond_with(ResponseTemplate::new(422).set_body_string("invalid reverse_dns"))
            .expect(1)
            .mount(&server)
            .await;

        let options = CloudIpOptions {
            id: String::from("cip-k4a25"),
            reverse_dns: Some(String::from("bad name")),
            ..CloudIpOptions::default()
        };
        let err = client_for(&server).update_cloud_ip(&options).await.unwrap_err();

        match err {
            ApiError::Request { status, message } => {
                assert_eq!(status, 422);
                assert_eq!(message, "invalid reverse_dns");
            }
            other => panic!("expected request error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_rejected_credentials() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let err = client_for(&server).cloud_ip("cip-k4a25").await.unwrap_err();
        assert!(matches!(err, ApiError::Unauthorized { .. }));
    }
}
