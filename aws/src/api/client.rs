use reqwest::header::CONTENT_TYPE;
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

use super::error::{sanitize_error_code, ApiError};
use super::http::HttpConfig;

const AMZ_JSON_CONTENT_TYPE: &str = "application/x-amz-json-1.1";
const X_AMZ_TARGET: &str = "X-Amz-Target";
const X_AMZN_ERROR_TYPE: &str = "x-amzn-ErrorType";

/// Control plane services the provider talks to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Service {
    Ec2,
    Kms,
    NetworkMonitor,
    ResourceExplorer2,
    SsoAdmin,
}

impl Service {
    pub const ALL: [Service; 5] = [
        Service::Ec2,
        Service::Kms,
        Service::NetworkMonitor,
        Service::ResourceExplorer2,
        Service::SsoAdmin,
    ];

    /// Key used in the provider's `endpoints` map
    pub fn key(&self) -> &'static str {
        match self {
            Service::Ec2 => "ec2",
            Service::Kms => "kms",
            Service::NetworkMonitor => "networkmonitor",
            Service::ResourceExplorer2 => "resourceexplorer2",
            Service::SsoAdmin => "ssoadmin",
        }
    }

    fn host_prefix(&self) -> &'static str {
        match self {
            Service::Ec2 => "ec2",
            Service::Kms => "kms",
            Service::NetworkMonitor => "networkmonitor",
            Service::ResourceExplorer2 => "resource-explorer-2",
            Service::SsoAdmin => "sso",
        }
    }

    /// `X-Amz-Target` prefix for JSON-RPC services
    fn target_prefix(&self) -> &'static str {
        match self {
            Service::Ec2 => "AmazonEC2",
            Service::Kms => "TrentService",
            Service::SsoAdmin => "SWBExternalService",
            Service::NetworkMonitor => "NetworkMonitor",
            Service::ResourceExplorer2 => "ResourceExplorer",
        }
    }
}

/// Endpoint overrides
#[derive(Debug, Clone, Default)]
pub struct Endpoints {
    /// Applies to every service without a specific override
    pub default: Option<String>,
    /// Keyed by [`Service::key`]
    pub services: HashMap<String, String>,
}

impl Endpoints {
    pub fn resolve(&self, service: Service, region: &str) -> String {
        let url = self
            .services
            .get(service.key())
            .or(self.default.as_ref())
            .cloned()
            .unwrap_or_else(|| format!("https://{}.{}.amazonaws.com", service.host_prefix(), region));

        url.trim_end_matches('/').to_string()
    }
}

/// AWS API client
#[derive(Clone)]
pub struct Client {
    inner: Arc<ClientInner>,
}

struct ClientInner {
    http_client: reqwest::Client,
    region: String,
    endpoints: Endpoints,
    retry_config: RetryConfig,
}

#[derive(Clone)]
pub struct RetryConfig {
    pub max_retries: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
    pub timeout_seconds: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_backoff_ms: 100,
            max_backoff_ms: 10000,
            timeout_seconds: 30,
        }
    }
}

impl RetryConfig {
    /// Delay before retry `attempt` (1-based), doubling up to `max_backoff_ms`
    pub fn backoff_ms(&self, attempt: u32) -> u64 {
        let factor = 1_u64.checked_shl(attempt.saturating_sub(1)).unwrap_or(u64::MAX);
        self.initial_backoff_ms
            .saturating_mul(factor)
            .min(self.max_backoff_ms)
    }
}

#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    #[serde(rename = "__type")]
    error_type: Option<String>,
    #[serde(alias = "Code")]
    code: Option<String>,
    #[serde(alias = "Message")]
    message: Option<String>,
}

impl Client {
    /// Create a new API client with default configuration
    pub fn new(region: &str, endpoints: Endpoints, insecure: bool) -> Result<Self, ApiError> {
        Self::with_config(region, endpoints, insecure, RetryConfig::default())
    }

    /// Create a new API client with custom retry configuration
    pub fn with_config(
        region: &str,
        endpoints: Endpoints,
        insecure: bool,
        retry_config: RetryConfig,
    ) -> Result<Self, ApiError> {
        let http_client = HttpConfig {
            request_timeout: std::time::Duration::from_secs(retry_config.timeout_seconds),
            insecure,
            ..Default::default()
        }
        .build()?;

        Ok(Self {
            inner: Arc::new(ClientInner {
                http_client,
                region: region.to_string(),
                endpoints,
                retry_config,
            }),
        })
    }

    /// Region resources are managed in
    pub fn region(&self) -> &str {
        &self.inner.region
    }

    pub fn endpoint(&self, service: Service, region: &str) -> String {
        self.inner.endpoints.resolve(service, region)
    }

    pub fn ec2(&self) -> crate::api::ec2::Ec2Api<'_> {
        crate::api::ec2::Ec2Api::new(self)
    }

    pub fn kms(&self) -> crate::api::kms::KmsApi<'_> {
        crate::api::kms::KmsApi::new(self)
    }

    pub fn networkmonitor(&self) -> crate::api::networkmonitor::NetworkMonitorApi<'_> {
        crate::api::networkmonitor::NetworkMonitorApi::new(self)
    }

    pub fn resourceexplorer2(&self) -> crate::api::resourceexplorer2::ResourceExplorer2Api<'_> {
        crate::api::resourceexplorer2::ResourceExplorer2Api::new(self)
    }

    pub fn ssoadmin(&self) -> crate::api::ssoadmin::SsoAdminApi<'_> {
        crate::api::ssoadmin::SsoAdminApi::new(self)
    }

    /// Call a JSON-RPC operation in the client's region
    pub async fn json_rpc<T: DeserializeOwned, B: Serialize>(
        &self,
        service: Service,
        operation: &str,
        body: &B,
    ) -> Result<T, ApiError> {
        self.json_rpc_in_region(service, &self.inner.region, operation, body)
            .await
    }

    /// Call a JSON-RPC operation (`POST /` with `X-Amz-Target`) in `region`
    pub async fn json_rpc_in_region<T: DeserializeOwned, B: Serialize>(
        &self,
        service: Service,
        region: &str,
        operation: &str,
        body: &B,
    ) -> Result<T, ApiError> {
        let url = format!("{}/", self.endpoint(service, region));
        let target = format!("{}.{}", service.target_prefix(), operation);

        self.execute_with_retry(
            || async {
                tracing::debug!(amz_target = %target, url = %url, "sending request");

                self.inner
                    .http_client
                    .post(&url)
                    .header(X_AMZ_TARGET, &target)
                    .header(CONTENT_TYPE, AMZ_JSON_CONTENT_TYPE)
                    .json(body)
                    .send()
                    .await
            },
            operation,
        )
        .await
    }

    /// Call a REST-JSON operation. `path` must already be percent-encoded.
    pub async fn rest_json<T: DeserializeOwned, B: Serialize>(
        &self,
        service: Service,
        method: Method,
        path: &str,
        body: Option<&B>,
    ) -> Result<T, ApiError> {
        let url = format!("{}{}", self.endpoint(service, &self.inner.region), path);

        self.execute_with_retry(
            || async {
                tracing::debug!(method = %method, url = %url, "sending request");

                let mut request = self.inner.http_client.request(method.clone(), &url);
                if let Some(body) = body {
                    request = request.json(body);
                }
                request.send().await
            },
            path,
        )
        .await
    }

    /// Execute request with retry logic
    async fn execute_with_retry<F, Fut, T>(&self, request_fn: F, operation: &str) -> Result<T, ApiError>
    where
        F: Fn() -> Fut,
        Fut: std::future::Future<Output = Result<reqwest::Response, reqwest::Error>>,
        T: DeserializeOwned,
    {
        let mut attempt = 0;
        let mut last_error = None;

        while attempt <= self.inner.retry_config.max_retries {
            if attempt > 0 {
                let backoff = self.inner.retry_config.backoff_ms(attempt);
                tracing::debug!(
                    "Retrying {} after {}ms (attempt {})",
                    operation,
                    backoff,
                    attempt
                );
                tokio::time::sleep(tokio::time::Duration::from_millis(backoff)).await;
            }

            match request_fn().await {
                Ok(response) => {
                    let status = response.status();

                    if status.is_success() {
                        return self.parse_success_response(response).await;
                    }

                    let err = self.error_from_response(response).await;
                    if !err.is_retryable() {
                        return Err(err);
                    }
                    last_error = Some(err);
                }
                Err(e) => {
                    if e.is_timeout() {
                        last_error =
                            Some(ApiError::Timeout(self.inner.retry_config.timeout_seconds));
                    } else if e.is_connect() {
                        last_error = Some(ApiError::ServiceUnavailable);
                    } else {
                        return Err(ApiError::Request(e));
                    }
                }
            }

            attempt += 1;
        }

        Err(last_error.unwrap_or(ApiError::ServiceUnavailable))
    }

    /// Parse successful response. An empty body is read as `{}`.
    async fn parse_success_response<T: DeserializeOwned>(
        &self,
        response: reqwest::Response,
    ) -> Result<T, ApiError> {
        let text = response.text().await?;
        tracing::trace!("API response body: {}", text);

        let text = if text.trim().is_empty() { "{}" } else { text.as_str() };
        serde_json::from_str::<T>(text).map_err(|e| {
            tracing::error!("Failed to deserialize response: {}, body: {}", e, text);
            ApiError::Parse(format!("Failed to parse response: {}", e))
        })
    }

    /// Builds the error for a non-2xx response. The code comes from the
    /// `x-amzn-ErrorType` header, else from `__type` or `code` in the body.
    async fn error_from_response(&self, response: reqwest::Response) -> ApiError {
        let status = response.status().as_u16();
        let header_code = response
            .headers()
            .get(X_AMZN_ERROR_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(sanitize_error_code)
            .filter(|c| !c.is_empty());

        let text = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());
        let body = serde_json::from_str::<ErrorBody>(&text).unwrap_or_default();

        let code = header_code.or_else(|| {
            body.error_type
                .or(body.code)
                .map(|c| sanitize_error_code(&c))
                .filter(|c| !c.is_empty())
        });
        let message = body.message.unwrap_or(text);

        tracing::debug!(status, code = ?code, "API error response");

        match code {
            Some(code) => ApiError::Service {
                status,
                code,
                message,
            },
            None if status == 429 => ApiError::RateLimited,
            None if status >= 500 => ApiError::ServiceUnavailable,
            None => ApiError::Service {
                status,
                code: "UnknownError".to_string(),
                message,
            },
        }
    }
}
